//! pkimatch-lib: Issuer relationship analysis for X.509 certificates.
//!
//! Given an anchor issuer and a set of candidate certificates fetched from
//! PKI mounts in a logical key/value store, computes five independent
//! predicates per pair (subject, key identifier, signature, supplied chain
//! and validated trust path) and filters candidates by a caller-selected
//! policy.

mod display;
mod enumerate;
mod fetch;
mod oid;
mod parser;
mod policy;
mod relationship;
mod scan;
mod signature;
mod store;
mod util;
pub mod verify;

pub use display::{OutputFormat, Renderer};
pub use enumerate::{
    enumerate, enumerate_with_mode, is_certificate_path, list_issuers, list_pki_mounts,
    sanitize_path, Enumeration, MOUNT_TABLE_PATH,
};
pub use fetch::{fetch_issuer, CertificateReference, IssuerDocument};
pub use parser::{parse_certificate_pem, parse_pem_chain};
pub use policy::MatchPolicy;
pub use relationship::{evaluate, evaluate_with_options, Relationship, RelationshipResult};
pub use scan::{
    list_intermediates, list_intermediates_parallel, verify_sign, CandidateFailure,
    Cancellation, ErrorMode, Outcome, ScanOptions, ScanReport,
};
pub use store::{LogicalStore, MemoryStore, StoreError, MAX_SNAPSHOT_BYTES};
pub use verify::{ChainProblem, TrustStore, VerificationResult, VerifyOptions};

/// Errors returned by pkimatch-lib.
///
/// Fetch and enumeration variants carry the logical path that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum PkiMatchError {
    #[error("empty certificate path")]
    EmptyPath,

    #[error("{path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("{path}: no document found")]
    NotFound { path: String },

    #[error("{path}: missing or non-string field `{field}`")]
    MissingField { path: String, field: &'static str },

    #[error("{path}: invalid certificate in `{field}`: {reason}")]
    InvalidCertificate {
        path: String,
        field: &'static str,
        reason: String,
    },

    #[error("{path}: malformed `{field}`: {reason}")]
    MalformedDocument {
        path: String,
        field: &'static str,
        reason: String,
    },

    #[error("Invalid PEM format: {0}")]
    PemError(String),

    #[error("Invalid DER format: {0}")]
    DerError(String),

    #[error("path validation of {issued} against {issuer} failed: {reason}")]
    PathValidation {
        issuer: String,
        issued: String,
        reason: String,
    },

    #[error("Verification error: {0}")]
    VerifyError(String),

    #[error(
        "unknown relationship `{0}` (expected one of: subject_match, path_match, \
         trust_match, key_id_match, signature_match)"
    )]
    UnknownRelationship(String),

    #[error("cancelled before {0} could be fetched")]
    Cancelled(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PkiMatchError {
    pub(crate) fn store(path: &str, source: StoreError) -> Self {
        PkiMatchError::Store {
            path: path.to_string(),
            source,
        }
    }
}
