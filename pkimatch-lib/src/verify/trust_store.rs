//! Trust anchors for path validation.

use crate::PkiMatchError;
use std::collections::HashMap;
use x509_parser::prelude::*;

/// A set of trusted certificates, indexed by raw subject name.
///
/// Relationship evaluation builds a store holding exactly one anchor, the
/// candidate issuer, via [`TrustStore::anchored_at`].
pub struct TrustStore {
    /// Map from raw DER-encoded subject name to DER-encoded certificates.
    certs_by_subject: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    count: usize,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("count", &self.count)
            .finish()
    }
}

impl TrustStore {
    /// Create an empty trust store.
    pub fn new() -> Self {
        TrustStore {
            certs_by_subject: HashMap::new(),
            count: 0,
        }
    }

    /// Create a store whose only trust anchor is `anchor_der`.
    pub fn anchored_at(anchor_der: &[u8]) -> Result<Self, PkiMatchError> {
        let mut store = TrustStore::new();
        store.add_der(anchor_der)?;
        Ok(store)
    }

    /// Add a DER-encoded certificate to the trust store.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), PkiMatchError> {
        let (_, x509) = X509Certificate::from_der(der)
            .map_err(|e| PkiMatchError::DerError(format!("{}", e)))?;

        let subject_raw = x509.subject().as_raw().to_vec();
        self.certs_by_subject
            .entry(subject_raw)
            .or_default()
            .push(der.to_vec());
        self.count += 1;

        Ok(())
    }

    /// Find trusted certificates whose subject matches the given issuer name.
    pub(crate) fn find_by_subject_raw(&self, subject_raw: &[u8]) -> Option<&Vec<Vec<u8>>> {
        self.certs_by_subject.get(subject_raw)
    }

    /// Number of certificates in the store.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if a DER-encoded certificate is in the trust store.
    ///
    /// Matches by subject and raw DER content.
    pub fn contains(&self, der: &[u8]) -> bool {
        if let Ok((_, x509)) = X509Certificate::from_der(der) {
            if let Some(certs) = self.find_by_subject_raw(x509.subject().as_raw()) {
                return certs.iter().any(|c| c == der);
            }
        }
        false
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new()
    }
}
