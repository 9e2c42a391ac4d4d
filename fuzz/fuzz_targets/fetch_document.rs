#![no_main]

use libfuzzer_sys::fuzz_target;
use pkimatch_lib::{fetch_issuer, list_issuers, MemoryStore};

fuzz_target!(|data: &[u8]| {
    // Snapshot loading and document decoding must never panic.
    if let Ok(store) = MemoryStore::from_json_slice(data) {
        let _ = fetch_issuer(&store, "pki/issuer/fuzz");
        let _ = list_issuers(&store, "pki", true);
        let _ = pkimatch_lib::enumerate(&store, &[], false);
    }

    if let Ok(doc) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(parsed) = pkimatch_lib::IssuerDocument::from_value("fuzz", &doc) {
            let _ = parsed.into_reference("fuzz");
        }
    }
});
