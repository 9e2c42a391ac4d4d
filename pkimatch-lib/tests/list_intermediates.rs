#![allow(clippy::unwrap_used, clippy::indexing_slicing)]
//! End-to-end candidate scans over the `pki-root` fixture.

mod common;

use common::{issuer_doc, leaf, Hierarchy};
use pkimatch_lib::{
    list_intermediates, list_intermediates_parallel, Cancellation, ErrorMode, LogicalStore,
    MatchPolicy, MemoryStore, Outcome, PkiMatchError, Relationship, ScanOptions, StoreError,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn decisions(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn default_policy_accepts_root_and_direct_children() {
    let h = Hierarchy::new();
    let store = h.store();

    let report = list_intermediates(
        &store,
        "pki-root/issuer/rootx1",
        &["pki-root".to_string()],
        &ScanOptions::default(),
    )
    .unwrap();

    assert_eq!(report.outcome(), Outcome::Success);
    assert_eq!(
        report.decisions(),
        decisions(&[
            ("pki-root/issuer/intx1", true),
            ("pki-root/issuer/inty", false),
            ("pki-root/issuer/rootx1", true),
            ("pki-root/issuer/rootx2", false),
        ])
    );
    assert_eq!(
        report.accepted().collect::<Vec<_>>(),
        vec!["pki-root/issuer/intx1", "pki-root/issuer/rootx1"]
    );

    let sibling = &report.results["pki-root/issuer/rootx2"];
    assert!(sibling.subject_match);
    assert!(!sibling.key_id_match);
}

#[test]
fn no_targets_discovers_pki_mounts() {
    let h = Hierarchy::new();
    let store = h.store();
    let report =
        list_intermediates(&store, "pki-root/issuer/rootx1", &[], &ScanOptions::default())
            .unwrap();
    assert_eq!(report.results.len(), 4);
}

#[test]
fn empty_policy_accepts_every_candidate() {
    let h = Hierarchy::new();
    let store = h.store();
    let options = ScanOptions {
        policy: MatchPolicy::none(),
        ..ScanOptions::default()
    };
    let report = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap();
    assert_eq!(report.decisions().len(), 4);
    assert!(report.decisions().values().all(|accepted| *accepted));
}

#[test]
fn requiring_trust_excludes_roots_that_are_not_the_anchor() {
    let h = Hierarchy::new();
    let store = h.store();
    let mut policy = MatchPolicy::default();
    policy.set(Relationship::TrustMatch, true);
    policy.set(Relationship::PathMatch, true);
    let options = ScanOptions {
        policy,
        ..ScanOptions::default()
    };
    let report = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap();
    assert_eq!(
        report.accepted().collect::<Vec<_>>(),
        vec!["pki-root/issuer/intx1", "pki-root/issuer/rootx1"]
    );
}

#[test]
fn explicit_certificate_paths_are_evaluated_verbatim() {
    let h = Hierarchy::new();
    let mut store = h.store();
    let end = leaf("leaf.example", &h.int_x1);
    store.insert_document(
        "pki-int/certs/0a-0b",
        json!({ "certificate": end.pem(), "ca_chain": [h.int_x1.pem(), h.root_x1.pem()] }),
    );

    let report = list_intermediates(
        &store,
        "pki-root/issuer/intx1",
        &["/pki-int/certs/0a-0b/".to_string()],
        &ScanOptions::default(),
    )
    .unwrap();
    assert_eq!(report.decisions(), decisions(&[("pki-int/certs/0a-0b", true)]));
}

#[test]
fn friendly_names_label_the_results() {
    let h = Hierarchy::new();
    let store = h.store();
    let options = ScanOptions {
        use_friendly_names: true,
        ..ScanOptions::default()
    };
    let report =
        list_intermediates(&store, "pki-root/issuer/rootx1", &["pki-root".into()], &options)
            .unwrap();
    assert_eq!(
        report.decisions(),
        decisions(&[
            ("pki-root/issuer/int-x1", true),
            ("pki-root/issuer/int-y", false),
            ("pki-root/issuer/root-x1", true),
            ("pki-root/issuer/root-x2", false),
        ])
    );
}

fn store_with_broken_candidate(h: &Hierarchy) -> MemoryStore {
    let mut store = h.store();
    store.insert_list(
        "pki-root/issuers",
        ["rootx1", "broken", "rootx2", "intx1", "inty"],
    );
    store.insert_document("pki-root/issuer/broken", json!({ "key_id": "k" }));
    store
}

#[test]
fn abort_mode_stops_at_the_first_bad_candidate() {
    let h = Hierarchy::new();
    let store = store_with_broken_candidate(&h);
    let err = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &ScanOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        PkiMatchError::MissingField { ref path, field: "certificate" }
            if path == "pki-root/issuer/broken"
    ));
}

#[test]
fn collect_mode_reports_bad_candidates_and_keeps_the_rest() {
    let h = Hierarchy::new();
    let store = store_with_broken_candidate(&h);
    let options = ScanOptions {
        error_mode: ErrorMode::Collect,
        ..ScanOptions::default()
    };
    let report = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap();

    assert_eq!(report.outcome(), Outcome::PartialFailure);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "pki-root/issuer/broken");
    assert!(report.decisions()["pki-root/issuer/intx1"]);
}

#[test]
fn missing_anchor_is_fatal_in_every_mode() {
    let h = Hierarchy::new();
    let store = h.store();
    let options = ScanOptions {
        error_mode: ErrorMode::Collect,
        ..ScanOptions::default()
    };
    let err = list_intermediates(&store, "pki-root/issuer/nope", &[], &options).unwrap_err();
    assert!(matches!(err, PkiMatchError::NotFound { .. }));
}

#[test]
fn parallel_scan_matches_sequential_scan() {
    let h = Hierarchy::new();
    let mut store = store_with_broken_candidate(&h);
    store.insert_document(
        "pki-root/issuer/copy",
        issuer_doc(&h.int_x1, &[&h.root_x1], "copy"),
    );
    store.insert_list(
        "pki-root/issuers",
        ["rootx1", "broken", "rootx2", "intx1", "inty", "copy"],
    );

    for jobs in [1, 4] {
        let options = ScanOptions {
            error_mode: ErrorMode::Collect,
            jobs,
            ..ScanOptions::default()
        };
        let sequential =
            list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap();
        let parallel =
            list_intermediates_parallel(&store, "pki-root/issuer/rootx1", &[], &options).unwrap();

        assert_eq!(parallel.results, sequential.results);
        assert_eq!(parallel.decisions(), sequential.decisions());
        let failed = |r: &pkimatch_lib::ScanReport| -> Vec<String> {
            r.failures.iter().map(|f| f.path.clone()).collect()
        };
        assert_eq!(failed(&parallel), failed(&sequential));
    }

    let err = list_intermediates_parallel(
        &store,
        "pki-root/issuer/rootx1",
        &[],
        &ScanOptions {
            jobs: 4,
            ..ScanOptions::default()
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("pki-root/issuer/broken"));
}

#[test]
fn cancelled_scan_does_not_start() {
    let h = Hierarchy::new();
    let store = h.store();
    let options = ScanOptions::default();
    options.cancellation.cancel();
    let err = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap_err();
    assert!(matches!(err, PkiMatchError::Cancelled(_)));
}

/// Cancels the shared token once a given document has been read.
struct CancelAfter {
    inner: MemoryStore,
    trigger: &'static str,
    token: Cancellation,
}

impl LogicalStore for CancelAfter {
    fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if path == self.trigger {
            self.token.cancel();
        }
        self.inner.read(path)
    }

    fn list(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.inner.list(path)
    }
}

#[test]
fn cancellation_ends_a_running_scan_even_in_collect_mode() {
    let h = Hierarchy::new();
    let token = Cancellation::new();
    let store = CancelAfter {
        inner: h.store(),
        trigger: "pki-root/issuer/rootx2",
        token: token.clone(),
    };
    let options = ScanOptions {
        error_mode: ErrorMode::Collect,
        cancellation: token,
        ..ScanOptions::default()
    };
    let err = list_intermediates(&store, "pki-root/issuer/rootx1", &[], &options).unwrap_err();
    assert!(matches!(err, PkiMatchError::Cancelled(path) if path == "pki-root/issuer/intx1"));
}
