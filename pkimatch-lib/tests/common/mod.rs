//! Certificate hierarchies and store fixtures generated with rcgen.

#![allow(dead_code, clippy::unwrap_used)]

use pkimatch_lib::{CertificateReference, MemoryStore, MOUNT_TABLE_PATH};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SignatureAlgorithm,
};
use serde_json::json;

/// A generated certificate together with its private key.
pub struct TestCert {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl TestCert {
    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    /// A reference as the fetcher would produce it.
    pub fn reference(&self, path: &str, chain: &[&TestCert]) -> CertificateReference {
        CertificateReference {
            path: path.to_string(),
            certificate: self.der(),
            key_id: String::new(),
            ca_chain: chain.iter().map(|c| c.der()).collect(),
        }
    }
}

fn params(cn: &str, ca: bool) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params.use_authority_key_identifier_extension = true;
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
    } else {
        params.is_ca = IsCa::NoCa;
    }
    params
}

/// Self-signed CA with an ECDSA P-256 key.
pub fn root(cn: &str) -> TestCert {
    root_with(cn, &rcgen::PKCS_ECDSA_P256_SHA256)
}

/// Self-signed CA with a key for `alg`.
pub fn root_with(cn: &str, alg: &'static SignatureAlgorithm) -> TestCert {
    let key = KeyPair::generate_for(alg).unwrap();
    let cert = params(cn, true).self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// CA signed by `issuer`, with an ECDSA P-256 key.
pub fn intermediate(cn: &str, issuer: &TestCert) -> TestCert {
    intermediate_with(cn, issuer, &rcgen::PKCS_ECDSA_P256_SHA256)
}

/// CA signed by `issuer`, with a key for `alg`.
pub fn intermediate_with(
    cn: &str,
    issuer: &TestCert,
    alg: &'static SignatureAlgorithm,
) -> TestCert {
    let key = KeyPair::generate_for(alg).unwrap();
    let cert = params(cn, true)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    TestCert { cert, key }
}

/// End-entity certificate signed by `issuer`.
pub fn leaf(cn: &str, issuer: &TestCert) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, false)
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    TestCert { cert, key }
}

/// Self-signed CA whose validity ended on 2001-01-01.
pub fn expired_root(cn: &str) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, true);
    params.not_before = rcgen::date_time_ymd(1991, 1, 1);
    params.not_after = rcgen::date_time_ymd(2001, 1, 1);
    let cert = params.self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// Self-signed CA whose Key Usage omits keyCertSign.
pub fn root_without_key_cert_sign(cn: &str) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, true);
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    let cert = params.self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// End-entity certificate signed by `issuer` carrying a critical private
/// extension.
pub fn leaf_with_critical_extension(cn: &str, issuer: &TestCert) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, false);
    let mut ext =
        CustomExtension::from_oid_content(&[1, 3, 6, 1, 4, 1, 55555, 7], vec![0x05, 0x00]);
    ext.set_criticality(true);
    params.custom_extensions.push(ext);
    let cert = params
        .signed_by(&key, &issuer.cert, &issuer.key)
        .unwrap();
    TestCert { cert, key }
}

/// Self-signed end-entity certificate with neither key identifier extension.
pub fn bare_self_signed(cn: &str) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, false);
    params.use_authority_key_identifier_extension = false;
    let cert = params.self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// Issuer document as served by a PKI mount.
pub fn issuer_doc(cert: &TestCert, chain: &[&TestCert], name: &str) -> serde_json::Value {
    json!({
        "certificate": cert.pem(),
        "ca_chain": chain.iter().map(|c| c.pem()).collect::<Vec<_>>(),
        "key_id": format!("key-{}", name),
        "issuer_name": name,
    })
}

/// The `pki-root` hierarchy.
///
/// `RootX1` signs `IntX1`, which signs `IntY`. `RootX2` is a second root
/// with the same subject as `RootX1` and a different key.
pub struct Hierarchy {
    pub root_x1: TestCert,
    pub root_x2: TestCert,
    pub int_x1: TestCert,
    pub int_y: TestCert,
}

impl Hierarchy {
    pub fn new() -> Self {
        let root_x1 = root("Root X1");
        let root_x2 = root("Root X1");
        let int_x1 = intermediate("Int X1", &root_x1);
        let int_y = intermediate("Int Y", &int_x1);
        Hierarchy {
            root_x1,
            root_x2,
            int_x1,
            int_y,
        }
    }

    /// A store with one `pki` mount holding the four issuers, plus a
    /// non-PKI mount that must be ignored.
    pub fn store(&self) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert_document(
            MOUNT_TABLE_PATH,
            json!({
                "pki-root/": { "type": "pki" },
                "secret/": { "type": "kv" },
            }),
        );
        store.insert_list("pki-root/issuers", ["rootx1", "rootx2", "intx1", "inty"]);

        let docs = [
            ("rootx1", "root-x1", issuer_doc(&self.root_x1, &[&self.root_x1], "root-x1")),
            ("rootx2", "root-x2", issuer_doc(&self.root_x2, &[&self.root_x2], "root-x2")),
            ("intx1", "int-x1", issuer_doc(&self.int_x1, &[&self.root_x1], "int-x1")),
            (
                "inty",
                "int-y",
                issuer_doc(&self.int_y, &[&self.int_x1, &self.root_x1], "int-y"),
            ),
        ];
        // Issuers are addressable by id and by name.
        for (id, name, doc) in docs {
            store.insert_document(&format!("pki-root/issuer/{}", id), doc.clone());
            store.insert_document(&format!("pki-root/issuer/{}", name), doc);
        }
        store
    }
}
