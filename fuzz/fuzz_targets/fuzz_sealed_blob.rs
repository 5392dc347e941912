#![no_main]

use libfuzzer_sys::fuzz_target;
use sealbox_core::InstanceMetadata;
use sealbox_enclave::{SealRequest, SoftwareOracle};

fuzz_target!(|data: &[u8]| {
    let oracle = SoftwareOracle::from_platform_key([0x5a; 32]);

    // Arbitrary strings must never unseal, and must not panic
    if let Ok(text) = std::str::from_utf8(data) {
        assert!(oracle.unseal_blob(text, None).is_err());
        assert!(oracle.unseal_blob(text, Some(b"extra".as_slice())).is_err());
    }

    // A genuine blob with one flipped byte must be rejected
    if data.len() >= 2 {
        let metadata = InstanceMetadata::default();
        let sealed = oracle
            .seal_blob(SealRequest {
                plaintext: "fuzz",
                metadata: &metadata,
                extra_key: None,
            })
            .unwrap();

        let mut bytes = sealed.into_bytes();
        let i = data[0] as usize % bytes.len();
        bytes[i] ^= data[1] | 1;
        if let Ok(tampered) = String::from_utf8(bytes) {
            assert!(oracle.unseal_blob(&tampered, None).is_err());
        }
    }
});
