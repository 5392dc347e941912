#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealbox_core::{AccessContext, Operation, Policy, PrincipalId, Principals};

#[derive(Debug, Arbitrary)]
struct Input {
    app_access_control: u32,
    device_locality: u32,
    sensitivity_level: u32,
    no_store: bool,
    no_read: bool,
    principal: Option<u64>,
    caller_locality: u32,
    clearance: u32,
    creator: Option<u64>,
    owners: Vec<u64>,
    operation: u8,
}

fuzz_target!(|input: Input| {
    let policy = Policy {
        app_access_control: input.app_access_control,
        device_locality: input.device_locality,
        sensitivity_level: input.sensitivity_level,
        no_store: input.no_store,
        no_read: input.no_read,
    };
    // Only validated policies reach the engine
    if policy.validate().is_err() {
        return;
    }

    let owners: Vec<PrincipalId> = input.owners.into_iter().map(PrincipalId).collect();
    let principals = Principals {
        creator: input.creator.map(PrincipalId),
        owners: &owners,
    };
    let context = AccessContext {
        principal: input.principal.map(PrincipalId),
        device_locality: input.caller_locality,
        clearance: input.clearance,
    };
    let operation = match input.operation % 6 {
        0 => Operation::Read,
        1 => Operation::Export,
        2 => Operation::Reseal,
        3 => Operation::UseAsKey,
        4 => Operation::Inspect,
        _ => Operation::Destroy,
    };

    let decision = policy.evaluate(operation, &principals, &context);
    if matches!(operation, Operation::Inspect | Operation::Destroy) {
        assert!(decision.is_ok());
    }
    if operation == Operation::Read && policy.no_read {
        assert!(decision.is_err());
    }
    if operation == Operation::Export && policy.no_store {
        assert!(decision.is_err());
    }
    if decision.is_ok() {
        assert!(context.clearance >= policy.sensitivity_level);
    }
});
