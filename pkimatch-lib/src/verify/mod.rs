//! Certificate path validation against a single trust anchor.
//!
//! Used by the `trust_match` relationship: the candidate issuer becomes the
//! only trust anchor and the issued certificate is validated against it.
//! Problems are reported as typed [`ChainProblem`] values so callers can tell
//! a fault in the issued certificate apart from an anchor that does not
//! vouch for it.

mod checks;
mod helpers;
mod trust_store;

use crate::parser::parse_x509;
use crate::PkiMatchError;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use x509_parser::prelude::*;

use checks::{check_critical_extensions, check_time, check_trusted_root, find_anchor, Anchor};

pub use trust_store::TrustStore;

use helpers::{extract_serial_hex, extract_short_name};

/// A reason a certificate path failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainProblem {
    /// The anchor did not issue the certificate.
    UnknownAuthority { issuer: String },
    /// The certificate is self-signed and is not the anchor.
    UntrustedRoot { subject: String },
    NotYetValid { depth: usize, subject: String },
    Expired { depth: usize, subject: String },
    NotCa { depth: usize, subject: String },
    MissingKeyCertSign { depth: usize, subject: String },
    UnknownCriticalExtension {
        depth: usize,
        subject: String,
        oid: String,
    },
}

impl ChainProblem {
    /// Whether this problem lies with the certificate being validated
    /// itself, as opposed to the anchor or the link to it.
    pub fn is_end_entity(&self) -> bool {
        matches!(
            self,
            ChainProblem::NotYetValid { depth: 0, .. }
                | ChainProblem::Expired { depth: 0, .. }
                | ChainProblem::UnknownCriticalExtension { depth: 0, .. }
        )
    }
}

impl std::fmt::Display for ChainProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainProblem::UnknownAuthority { issuer } => {
                write!(f, "unable to find trusted root for issuer: {}", issuer)
            }
            ChainProblem::UntrustedRoot { subject } => {
                write!(f, "root certificate ({}) is not in the trust store", subject)
            }
            ChainProblem::NotYetValid { depth, subject } => write!(
                f,
                "certificate at depth {} ({}) is not yet valid",
                depth, subject
            ),
            ChainProblem::Expired { depth, subject } => {
                write!(f, "certificate at depth {} ({}) has expired", depth, subject)
            }
            ChainProblem::NotCa { depth, subject } => write!(
                f,
                "certificate at depth {} ({}) is not a CA but is used as issuer",
                depth, subject
            ),
            ChainProblem::MissingKeyCertSign { depth, subject } => write!(
                f,
                "certificate at depth {} ({}) is a CA but Key Usage does not include keyCertSign",
                depth, subject
            ),
            ChainProblem::UnknownCriticalExtension {
                depth,
                subject,
                oid,
            } => write!(
                f,
                "certificate at depth {} ({}) has unrecognized critical extension {}",
                depth, subject, oid
            ),
        }
    }
}

/// Result of certificate path validation.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Whether the path validated without problems.
    pub is_valid: bool,
    /// The validated certificate, followed by the anchor when the anchor
    /// is a different certificate.
    pub chain: Vec<ChainCertInfo>,
    /// Problems found (empty if `is_valid` is true).
    pub problems: Vec<ChainProblem>,
}

impl VerificationResult {
    /// Problems with the validated certificate itself.
    pub fn end_entity_problems(&self) -> impl Iterator<Item = &ChainProblem> {
        self.problems.iter().filter(|p| p.is_end_entity())
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(leaf) = self.chain.first() {
            write!(f, "{}, {}, ", leaf.short_name, leaf.serial)?;
        }
        if self.is_valid {
            write!(f, "OK")?;
        } else {
            write!(f, "FAIL")?;
            if !self.problems.is_empty() {
                let problems: Vec<String> = self.problems.iter().map(|p| p.to_string()).collect();
                write!(f, ", {}", problems.join("; "))?;
            }
        }
        Ok(())
    }
}

/// Information about a certificate in the validated path.
#[derive(Debug, Clone, Serialize)]
pub struct ChainCertInfo {
    /// Position in chain (0 = leaf).
    pub depth: usize,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Short human-readable name derived from CN, O, or OU.
    pub short_name: String,
    /// Serial number as colon-separated hex.
    pub serial: String,
}

impl ChainCertInfo {
    fn from_x509(depth: usize, x509: &X509Certificate) -> Self {
        ChainCertInfo {
            depth,
            subject: x509.subject().to_string(),
            issuer: x509.issuer().to_string(),
            short_name: extract_short_name(x509),
            serial: extract_serial_hex(x509),
        }
    }
}

/// Options controlling path validation.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Whether to check certificate validity periods.
    pub check_time: bool,
    /// Validate at this Unix timestamp instead of the current time.
    pub at_time: Option<i64>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            check_time: true,
            at_time: None,
        }
    }
}

/// Validate `leaf_der` with `anchor_der` as the only trust anchor.
///
/// Checks performed:
/// 1. Validity period of the leaf (unless `options.check_time` is false)
/// 2. Unknown critical extensions on the leaf
/// 3. Anchoring: the leaf is the anchor, or the anchor's subject names the
///    leaf's issuer and its key verifies the leaf signature
/// 4. The anchor's own validity period, critical extensions, CA flag and
///    keyCertSign when it acts as issuer
pub fn verify_against_anchor(
    leaf_der: &[u8],
    anchor_der: &[u8],
    options: &VerifyOptions,
) -> Result<VerificationResult, PkiMatchError> {
    let trust_store = TrustStore::anchored_at(anchor_der)?;
    let leaf = X509Certificate::from_der(leaf_der)
        .map(|(_, x509)| x509)
        .map_err(|e| PkiMatchError::VerifyError(format!("failed to parse certificate: {}", e)))?;

    let now_ts = options.at_time.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    });

    let subject = leaf.subject().to_string();
    let mut chain = vec![ChainCertInfo::from_x509(0, &leaf)];
    let mut problems = Vec::new();

    if options.check_time {
        check_time(0, &subject, &leaf, now_ts, &mut problems);
    }
    check_critical_extensions(0, &subject, &leaf, &mut problems);

    if let Some(Anchor::Issuer(root_der)) =
        find_anchor(leaf_der, &leaf, &subject, &trust_store, &mut problems)
    {
        let root = parse_x509(&root_der)?;
        chain.push(ChainCertInfo::from_x509(1, &root));
        check_trusted_root(&root, options, now_ts, &mut problems);
    }

    Ok(VerificationResult {
        is_valid: problems.is_empty(),
        chain,
        problems,
    })
}
