//! End-to-end operations: `verify_sign` for one pair and
//! `list_intermediates` for an anchor against every enumerated candidate.

use crate::enumerate::enumerate_with_mode;
use crate::fetch::{fetch_issuer, CertificateReference};
use crate::policy::MatchPolicy;
use crate::relationship::{evaluate_with_options, RelationshipResult};
use crate::store::LogicalStore;
use crate::verify::VerifyOptions;
use crate::PkiMatchError;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What to do when a single candidate (or mount) cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Stop the whole run at the first failure.
    #[default]
    Abort,
    /// Record the failure and keep going.
    Collect,
}

/// A candidate or mount that could not be processed.
#[derive(Debug)]
pub struct CandidateFailure {
    pub path: String,
    pub error: PkiMatchError,
}

/// Cooperative cancellation shared between a caller and a running scan.
///
/// Checked before every fetch. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel automatically once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn check(&self, path: &str) -> Result<(), PkiMatchError> {
        if self.is_cancelled() {
            return Err(PkiMatchError::Cancelled(path.to_string()));
        }
        Ok(())
    }
}

/// Options for [`list_intermediates`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Relationships a candidate must satisfy to be accepted.
    pub policy: MatchPolicy,
    /// Replace issuer ids with their configured names.
    pub use_friendly_names: bool,
    pub error_mode: ErrorMode,
    /// Path validation options for `trust_match`.
    pub verify: VerifyOptions,
    /// Worker threads for [`list_intermediates_parallel`]; 0 lets rayon decide.
    pub jobs: usize,
    pub cancellation: Cancellation,
}

/// Overall status of a completed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// At least one candidate or mount failed (collect mode only).
    PartialFailure,
}

/// Results of [`list_intermediates`].
#[derive(Debug)]
pub struct ScanReport {
    /// Path of the anchor issuer.
    pub anchor: String,
    pub policy: MatchPolicy,
    /// Relationship facts for every candidate that was evaluated.
    pub results: BTreeMap<String, RelationshipResult>,
    /// Candidates and mounts that could not be processed.
    pub failures: Vec<CandidateFailure>,
}

impl ScanReport {
    pub fn outcome(&self) -> Outcome {
        if self.failures.is_empty() {
            Outcome::Success
        } else {
            Outcome::PartialFailure
        }
    }

    /// Accept/reject decision per candidate under the report's policy.
    pub fn decisions(&self) -> BTreeMap<String, bool> {
        self.results
            .iter()
            .map(|(path, result)| (path.clone(), self.policy.accepts(result)))
            .collect()
    }

    /// Paths of accepted candidates.
    pub fn accepted(&self) -> impl Iterator<Item = &str> + '_ {
        self.results
            .iter()
            .filter(|(_, result)| self.policy.accepts(result))
            .map(|(path, _)| path.as_str())
    }
}

/// Fetch two certificates and evaluate `issuer_path` as the issuer of
/// `issued_path`.
pub fn verify_sign<S: LogicalStore + ?Sized>(
    store: &S,
    issuer_path: &str,
    issued_path: &str,
    options: &VerifyOptions,
) -> Result<RelationshipResult, PkiMatchError> {
    let issuer = fetch_issuer(store, issuer_path)?;
    let issued = fetch_issuer(store, issued_path)?;
    evaluate_with_options(&issuer, &issued, options)
}

/// Evaluate the issuer at `anchor_path` against every candidate enumerated
/// from `targets`, one candidate at a time.
///
/// Fails if the anchor cannot be fetched or enumeration fails. In
/// [`ErrorMode::Abort`] the first candidate failure is returned as the
/// error; in [`ErrorMode::Collect`] failures are listed in the report.
pub fn list_intermediates<S: LogicalStore + ?Sized>(
    store: &S,
    anchor_path: &str,
    targets: &[String],
    options: &ScanOptions,
) -> Result<ScanReport, PkiMatchError> {
    let (anchor, candidates, mut report) = prepare(store, anchor_path, targets, options)?;

    for path in candidates {
        let outcome = scan_candidate(store, &anchor, &path, options);
        record(&mut report, path, outcome, options.error_mode)?;
    }

    Ok(report)
}

/// Like [`list_intermediates`], fetching and evaluating candidates on a
/// pool of `options.jobs` threads.
///
/// Results are identical to the sequential run; in abort mode the error
/// reported is the first failure in enumeration order.
pub fn list_intermediates_parallel<S: LogicalStore + Sync + ?Sized>(
    store: &S,
    anchor_path: &str,
    targets: &[String],
    options: &ScanOptions,
) -> Result<ScanReport, PkiMatchError> {
    let (anchor, candidates, mut report) = prepare(store, anchor_path, targets, options)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(|e| PkiMatchError::WorkerPool(e.to_string()))?;

    let outcomes: Vec<(String, Result<RelationshipResult, PkiMatchError>)> = pool.install(|| {
        candidates
            .into_par_iter()
            .map(|path| {
                let outcome = scan_candidate(store, &anchor, &path, options);
                (path, outcome)
            })
            .collect()
    });

    for (path, outcome) in outcomes {
        record(&mut report, path, outcome, options.error_mode)?;
    }

    Ok(report)
}

fn prepare<S: LogicalStore + ?Sized>(
    store: &S,
    anchor_path: &str,
    targets: &[String],
    options: &ScanOptions,
) -> Result<(CertificateReference, Vec<String>, ScanReport), PkiMatchError> {
    options.cancellation.check(anchor_path)?;
    let anchor = fetch_issuer(store, anchor_path)?;

    let enumeration =
        enumerate_with_mode(store, targets, options.use_friendly_names, options.error_mode)?;
    log::info!(
        "evaluating {} candidate(s) against {}",
        enumeration.paths.len(),
        anchor_path
    );

    let report = ScanReport {
        anchor: anchor_path.to_string(),
        policy: options.policy.clone(),
        results: BTreeMap::new(),
        failures: enumeration.failures,
    };
    Ok((anchor, enumeration.paths, report))
}

fn scan_candidate<S: LogicalStore + ?Sized>(
    store: &S,
    anchor: &CertificateReference,
    path: &str,
    options: &ScanOptions,
) -> Result<RelationshipResult, PkiMatchError> {
    options.cancellation.check(path)?;
    let candidate = fetch_issuer(store, path)?;
    let result = evaluate_with_options(anchor, &candidate, &options.verify)?;
    log::debug!("{} -> {}: {:?}", anchor.path, path, result);
    Ok(result)
}

/// Fold one candidate outcome into the report. Cancellation always ends the
/// run; other errors end it only in abort mode.
fn record(
    report: &mut ScanReport,
    path: String,
    outcome: Result<RelationshipResult, PkiMatchError>,
    mode: ErrorMode,
) -> Result<(), PkiMatchError> {
    match outcome {
        Ok(result) => {
            report.results.insert(path, result);
            Ok(())
        }
        Err(e @ PkiMatchError::Cancelled(_)) => Err(e),
        Err(e) if mode == ErrorMode::Collect => {
            log::warn!("skipping {}: {}", path, e);
            report.failures.push(CandidateFailure { path, error: e });
            Ok(())
        }
        Err(e) => Err(e),
    }
}
