//! Property-based tests for the instance manager
//!
//! These tests drive the manager through a fresh tokio runtime per case.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use sealbox_core::{CreateOptions, Policy, SealedDataOptions};
use sealbox_enclave::{EnclaveConfig, EnclaveError, InstanceManager, SoftwareOracle};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn manager() -> InstanceManager {
    InstanceManager::new(
        Arc::new(SoftwareOracle::from_platform_key([7u8; 32])),
        EnclaveConfig::default(),
    )
    .unwrap()
}

const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Plaintext comes back byte-for-byte
    #[test]
    fn prop_get_data_round_trips(data in "\\PC{1,256}", tag in prop::option::of("[a-z0-9-]{1,32}")) {
        let rt = runtime();
        rt.block_on(async {
            let m = manager();
            let mut opts = CreateOptions::new(data.clone());
            if let Some(t) = &tag {
                opts = opts.tag(t.clone());
            }
            let id = m.create_from_data(opts).await.unwrap();
            assert_eq!(m.get_data(id).await.unwrap().as_str(), data.as_str());
            assert_eq!(m.get_tag(id).await.unwrap(), tag);
        });
    }

    /// A noStore instance never yields a sealed form
    #[test]
    fn prop_no_store_never_exports(data in "[ -~]{1,64}", no_read in any::<bool>(), attempts in 1usize..4) {
        let rt = runtime();
        rt.block_on(async {
            let m = manager();
            let mut policy = Policy::new().with_no_store();
            if no_read {
                policy = policy.with_no_read();
            }
            let id = m
                .create_from_data(CreateOptions::new(data).policy(policy))
                .await
                .unwrap();
            for _ in 0..attempts {
                assert!(matches!(
                    m.get_sealed_data(id).await,
                    Err(EnclaveError::NoStorePolicy(_))
                ));
            }
        });
    }

    /// Any single-character change to a sealed form is rejected
    #[test]
    fn prop_tampered_sealed_data_fails(
        data in "[ -~]{1,64}",
        position in any::<prop::sample::Index>(),
        replacement in any::<prop::sample::Index>(),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let m = manager();
            let id = m.create_from_data(CreateOptions::new(data)).await.unwrap();
            let sealed = m.get_sealed_data(id).await.unwrap();

            let mut bytes = sealed.clone().into_bytes();
            let i = position.index(bytes.len());
            let mut alphabet: Vec<u8> = BASE64_ALPHABET.to_vec();
            alphabet.push(b'=');
            alphabet.retain(|&c| c != bytes[i]);
            bytes[i] = alphabet[replacement.index(alphabet.len())];
            let tampered = String::from_utf8(bytes).unwrap();

            let result = m
                .create_from_sealed_data(SealedDataOptions::new(tampered))
                .await;
            assert!(
                matches!(result, Err(EnclaveError::UnsealFailed)),
                "tampered blob accepted: {:?}",
                result
            );
        });
    }

    /// Concurrent creations get pairwise distinct IDs
    #[test]
    fn prop_concurrent_creates_unique_ids(count in 2usize..48) {
        let rt = runtime();
        rt.block_on(async {
            let m = manager();
            let mut handles = Vec::with_capacity(count);
            for i in 0..count {
                let m = m.clone();
                handles.push(tokio::spawn(async move {
                    m.create_from_data(CreateOptions::new(format!("value-{}", i)))
                        .await
                        .unwrap()
                }));
            }

            let mut ids = HashSet::new();
            for handle in handles {
                assert!(ids.insert(handle.await.unwrap()));
            }
            assert_eq!(m.live_instances().await, count);
        });
    }
}
