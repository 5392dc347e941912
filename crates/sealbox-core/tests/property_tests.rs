//! Property-based tests for the sealbox-core policy engine
//!
//! These tests verify invariants that should hold for all policies and callers.

use proptest::prelude::*;
use sealbox_core::{
    policy::{MAX_DEVICE_LOCALITY, MAX_SENSITIVITY_LEVEL},
    AccessContext, Denial, Operation, Policy, PrincipalId, Principals,
};

// ============================================
// Arbitrary Implementations
// ============================================

fn arb_policy() -> impl Strategy<Value = Policy> {
    (
        0u32..=1,
        0u32..=MAX_DEVICE_LOCALITY,
        0u32..=MAX_SENSITIVITY_LEVEL,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(app_access_control, device_locality, sensitivity_level, no_store, no_read)| Policy {
                app_access_control,
                device_locality,
                sensitivity_level,
                no_store,
                no_read,
            },
        )
}

fn arb_context() -> impl Strategy<Value = AccessContext> {
    (
        prop::option::of(0u64..16),
        0u32..=MAX_DEVICE_LOCALITY,
        0u32..=MAX_SENSITIVITY_LEVEL,
    )
        .prop_map(|(principal, device_locality, clearance)| AccessContext {
            principal: principal.map(PrincipalId),
            device_locality,
            clearance,
        })
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Read),
        Just(Operation::Export),
        Just(Operation::Reseal),
        Just(Operation::UseAsKey),
        Just(Operation::Inspect),
        Just(Operation::Destroy),
    ]
}

const OWNERS: &[PrincipalId] = &[PrincipalId(1), PrincipalId(2)];

fn principals() -> Principals<'static> {
    Principals {
        creator: Some(PrincipalId(0)),
        owners: OWNERS,
    }
}

// ============================================
// Property Tests
// ============================================

proptest! {
    #[test]
    fn in_range_policies_validate(policy in arb_policy()) {
        prop_assert!(policy.validate().is_ok());
    }

    #[test]
    fn no_read_always_denies_read(policy in arb_policy(), ctx in arb_context()) {
        let policy = Policy { no_read: true, ..policy };
        prop_assert_eq!(
            policy.evaluate(Operation::Read, &principals(), &ctx),
            Err(Denial::NoRead)
        );
    }

    #[test]
    fn no_store_always_denies_export(policy in arb_policy(), ctx in arb_context()) {
        let policy = Policy { no_store: true, ..policy };
        prop_assert_eq!(
            policy.evaluate(Operation::Export, &principals(), &ctx),
            Err(Denial::NoStore)
        );
    }

    #[test]
    fn metadata_and_destroy_never_gated(
        policy in arb_policy(),
        ctx in arb_context(),
        destroy in any::<bool>(),
    ) {
        let op = if destroy { Operation::Destroy } else { Operation::Inspect };
        prop_assert!(policy.evaluate(op, &principals(), &ctx).is_ok());
    }

    #[test]
    fn allowed_release_implies_attributes_hold(
        policy in arb_policy(),
        ctx in arb_context(),
        op in arb_operation(),
    ) {
        if policy.evaluate(op, &principals(), &ctx).is_ok()
            && matches!(
                op,
                Operation::Read | Operation::Export | Operation::Reseal | Operation::UseAsKey
            )
        {
            prop_assert!(ctx.clearance >= policy.sensitivity_level);
            prop_assert!(policy.device_locality == 0 || policy.device_locality == ctx.device_locality);
            if policy.app_access_control == 1 {
                let p = ctx.principal.unwrap();
                prop_assert!(principals().contains(p));
            }
        }
    }
}
