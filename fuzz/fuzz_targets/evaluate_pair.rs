#![no_main]

use libfuzzer_sys::fuzz_target;
use pkimatch_lib::{evaluate, CertificateReference};

fuzz_target!(|data: &[u8]| {
    // Split the input into two DER blobs and evaluate them as a pair.
    // Evaluation may fail on malformed input but must never panic.
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let (issuer, issued) = data.split_at(split);
    let issuer = CertificateReference {
        path: "fuzz/issuer/a".to_string(),
        certificate: issuer.to_vec(),
        key_id: String::new(),
        ca_chain: vec![issued.to_vec()],
    };
    let issued = CertificateReference {
        path: "fuzz/issuer/b".to_string(),
        certificate: issued.to_vec(),
        key_id: String::new(),
        ca_chain: vec![issuer.certificate.clone()],
    };
    let _ = evaluate(&issuer, &issued);
    let _ = evaluate(&issued, &issuer);
});
