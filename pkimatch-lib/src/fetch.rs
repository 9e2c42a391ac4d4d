//! Certificate fetcher: turns an issuer document into a [`CertificateReference`].

use crate::parser::{parse_certificate_pem, parse_pem_chain};
use crate::store::LogicalStore;
use crate::PkiMatchError;
use serde_json::Value;

/// A certificate resolved from a logical path, with its key identifier and
/// supplied CA chain. All certificates are held as DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateReference {
    /// Logical path the certificate was read from.
    pub path: String,
    /// DER encoding of the certificate.
    pub certificate: Vec<u8>,
    /// Key identifier assigned by the backend; empty when absent.
    pub key_id: String,
    /// DER encodings of the CA chain entries, in the order supplied.
    pub ca_chain: Vec<Vec<u8>>,
}

/// Typed view of an issuer (or certificate) document.
///
/// Built by [`IssuerDocument::from_value`], which is the only place loosely
/// typed store fields are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerDocument {
    /// PEM text of the `certificate` field.
    pub certificate: String,
    /// `key_id`, normalized to empty when absent or not a string.
    pub key_id: String,
    /// Non-blank `ca_chain` entries.
    pub ca_chain: Vec<String>,
}

impl IssuerDocument {
    /// Validate a raw store document read from `path`.
    pub fn from_value(path: &str, doc: &Value) -> Result<Self, PkiMatchError> {
        let certificate = match doc.get("certificate") {
            Some(Value::String(pem)) => pem.clone(),
            _ => {
                return Err(PkiMatchError::MissingField {
                    path: path.to_string(),
                    field: "certificate",
                })
            }
        };

        let key_id = match doc.get("key_id") {
            Some(Value::String(id)) => id.clone(),
            _ => String::new(),
        };

        let ca_chain = match doc.get("ca_chain") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(bundle)) => vec![bundle.clone()],
            Some(Value::Array(entries)) => {
                let mut chain = Vec::with_capacity(entries.len());
                for (idx, entry) in entries.iter().enumerate() {
                    match entry {
                        Value::String(pem) => chain.push(pem.clone()),
                        Value::Null => {}
                        other => {
                            return Err(PkiMatchError::InvalidCertificate {
                                path: path.to_string(),
                                field: "ca_chain",
                                reason: format!("entry {} is not a string: {}", idx, other),
                            })
                        }
                    }
                }
                chain
            }
            Some(other) => {
                return Err(PkiMatchError::MalformedDocument {
                    path: path.to_string(),
                    field: "ca_chain",
                    reason: format!("expected a list of PEM strings, got {}", other),
                })
            }
        };

        Ok(IssuerDocument {
            certificate,
            key_id,
            ca_chain: ca_chain
                .into_iter()
                .filter(|pem| !pem.trim().is_empty())
                .collect(),
        })
    }

    /// Decode the PEM material. Either every certificate decodes or the
    /// whole document is rejected.
    pub fn into_reference(self, path: &str) -> Result<CertificateReference, PkiMatchError> {
        let certificate =
            parse_certificate_pem(&self.certificate).map_err(|e| PkiMatchError::InvalidCertificate {
                path: path.to_string(),
                field: "certificate",
                reason: e.to_string(),
            })?;

        let mut ca_chain = Vec::new();
        for pem in &self.ca_chain {
            let ders = parse_pem_chain(pem.as_bytes()).map_err(|e| {
                PkiMatchError::InvalidCertificate {
                    path: path.to_string(),
                    field: "ca_chain",
                    reason: e.to_string(),
                }
            })?;
            ca_chain.extend(ders);
        }

        Ok(CertificateReference {
            path: path.to_string(),
            certificate,
            key_id: self.key_id,
            ca_chain,
        })
    }
}

/// Fetch the certificate, key identifier and CA chain stored at `path`.
///
/// `path` must already be normalized (no leading or trailing `/`).
pub fn fetch_issuer<S: LogicalStore + ?Sized>(
    store: &S,
    path: &str,
) -> Result<CertificateReference, PkiMatchError> {
    if path.trim().is_empty() {
        return Err(PkiMatchError::EmptyPath);
    }

    log::debug!("fetching certificate material from {}", path);
    let doc = store
        .read(path)
        .map_err(|e| PkiMatchError::store(path, e))?
        .ok_or_else(|| PkiMatchError::NotFound {
            path: path.to_string(),
        })?;

    IssuerDocument::from_value(path, &doc)?.into_reference(path)
}
