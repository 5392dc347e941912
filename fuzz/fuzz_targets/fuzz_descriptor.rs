#![no_main]

use libfuzzer_sys::fuzz_target;
use sealbox_transport::{descriptor::substitute, SecureDataDescriptor};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    // Descriptor decoding should not panic
    if let Ok(descriptors) = SecureDataDescriptor::parse_list(&value) {
        for d in &descriptors {
            assert!(d.path.starts_with('/'));
        }
    }

    // Substitution only succeeds on existing nodes, and then places the blob there
    if let Some(obj) = value.as_object() {
        for key in obj.keys() {
            let path = format!("/{}", key.replace('~', "~0").replace('/', "~1"));
            let mut doc = value.clone();
            substitute(&mut doc, &path, "SBX1:blob").unwrap();
            assert_eq!(doc.pointer(&path).and_then(|v| v.as_str()), Some("SBX1:blob"));
        }
    }
});
