//! Individual path validation checks.
//!
//! Each check appends [`ChainProblem`]s. Depth 0 is the certificate being
//! validated; depth 1 is the anchor when it acts as that certificate's
//! issuer.

use super::helpers::{is_known_extension, is_self_issued};
use super::{ChainProblem, TrustStore, VerifyOptions};
use crate::signature::check_signature;
use x509_parser::prelude::*;

/// How the validated certificate was tied to the trust anchor.
#[derive(Debug, Clone)]
pub(crate) enum Anchor {
    /// The certificate is the anchor.
    Itself,
    /// The anchor, given as DER, issued the certificate.
    Issuer(Vec<u8>),
}

pub(crate) fn check_time(
    depth: usize,
    subject: &str,
    x509: &X509Certificate,
    now_ts: i64,
    problems: &mut Vec<ChainProblem>,
) {
    if now_ts < x509.validity().not_before.timestamp() {
        problems.push(ChainProblem::NotYetValid {
            depth,
            subject: subject.to_string(),
        });
    }
    if now_ts > x509.validity().not_after.timestamp() {
        problems.push(ChainProblem::Expired {
            depth,
            subject: subject.to_string(),
        });
    }
}

/// RFC 5280 Section 4.2: reject certificates with unknown critical extensions.
pub(crate) fn check_critical_extensions(
    depth: usize,
    subject: &str,
    x509: &X509Certificate,
    problems: &mut Vec<ChainProblem>,
) {
    for ext in x509.extensions() {
        let oid = ext.oid.to_id_string();
        if ext.critical && !is_known_extension(&oid) {
            problems.push(ChainProblem::UnknownCriticalExtension {
                depth,
                subject: subject.to_string(),
                oid,
            });
        }
    }
}

fn check_ca_constraints(
    depth: usize,
    subject: &str,
    x509: &X509Certificate,
    problems: &mut Vec<ChainProblem>,
) {
    match x509.basic_constraints().ok().flatten().map(|bc| bc.value) {
        Some(constraints) if !constraints.ca => problems.push(ChainProblem::NotCa {
            depth,
            subject: subject.to_string(),
        }),
        Some(_) => {}
        // v1/v2 certificates predate the extension and may act as issuers.
        None if x509.version().0 >= 2 => problems.push(ChainProblem::NotCa {
            depth,
            subject: subject.to_string(),
        }),
        None => {}
    }
}

/// RFC 5280 Section 4.2.1.3: issuers carrying Key Usage must allow keyCertSign.
fn lacks_key_cert_sign(x509: &X509Certificate) -> bool {
    matches!(x509.key_usage(), Ok(Some(ku)) if !ku.value.key_cert_sign())
}

/// Tie the certificate to the trust anchor.
///
/// Records an unknown-authority problem and returns `None` when the anchor
/// is neither the certificate itself nor a verifying issuer of it.
pub(crate) fn find_anchor(
    leaf_der: &[u8],
    leaf: &X509Certificate,
    subject: &str,
    trust_store: &TrustStore,
    problems: &mut Vec<ChainProblem>,
) -> Option<Anchor> {
    if trust_store.contains(leaf_der) {
        return Some(Anchor::Itself);
    }

    if let Some(candidates) = trust_store.find_by_subject_raw(leaf.issuer().as_raw()) {
        for root_der in candidates {
            if let Ok((_, root)) = X509Certificate::from_der(root_der) {
                if check_signature(leaf, root.public_key()).is_ok() {
                    return Some(Anchor::Issuer(root_der.clone()));
                }
            }
        }
    }

    if is_self_issued(leaf) && check_signature(leaf, leaf.public_key()).is_ok() {
        problems.push(ChainProblem::UntrustedRoot {
            subject: subject.to_string(),
        });
    } else {
        problems.push(ChainProblem::UnknownAuthority {
            issuer: leaf.issuer().to_string(),
        });
    }
    None
}

/// Validate a trust anchor that issued the certificate.
///
/// It must be within its validity period, carry no unknown critical
/// extension, be a CA and allow keyCertSign when it carries Key Usage.
pub(crate) fn check_trusted_root(
    root: &X509Certificate,
    options: &VerifyOptions,
    now_ts: i64,
    problems: &mut Vec<ChainProblem>,
) {
    let subject = root.subject().to_string();
    let depth = 1;

    if options.check_time {
        check_time(depth, &subject, root, now_ts, problems);
    }
    check_critical_extensions(depth, &subject, root, problems);
    check_ca_constraints(depth, &subject, root, problems);
    if lacks_key_cert_sign(root) {
        problems.push(ChainProblem::MissingKeyCertSign { depth, subject });
    }
}
