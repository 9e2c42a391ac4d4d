//! Mount and issuer enumeration.
//!
//! Expands command-line style targets (explicit certificate paths or bare
//! mount names) into the list of issuer paths to examine.

use crate::scan::{CandidateFailure, ErrorMode};
use crate::store::LogicalStore;
use crate::PkiMatchError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Path of the mount table document.
pub const MOUNT_TABLE_PATH: &str = "sys/mounts";

/// Mount type whose entries are enumerated when no target is given.
const PKI_MOUNT_TYPE: &str = "pki";

/// Path segments marking a target as a certificate rather than a mount.
const CERTIFICATE_PATH_MARKERS: &[&str] = &["/issuer/", "/certs/", "/revoked/"];

#[derive(Debug, Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MountEntry {
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct IssuerName {
    #[serde(default)]
    issuer_name: Option<String>,
}

/// Candidate paths produced by [`enumerate_with_mode`].
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Deduplicated candidate paths, in listing order.
    pub paths: Vec<String>,
    /// Mounts whose listing failed (only populated in collect mode).
    pub failures: Vec<CandidateFailure>,
}

impl Enumeration {
    fn push(&mut self, seen: &mut HashSet<String>, path: String) {
        if seen.insert(path.clone()) {
            self.paths.push(path);
        }
    }
}

/// Trim surrounding slashes from a user supplied path or mount.
pub fn sanitize_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

/// Whether `target` names a certificate directly rather than a mount.
pub fn is_certificate_path(target: &str) -> bool {
    CERTIFICATE_PATH_MARKERS.iter().any(|m| target.contains(m))
}

/// Expand `targets` into issuer paths, aborting on the first listing failure.
///
/// With no targets every `pki` mount in the mount table is enumerated.
pub fn enumerate<S: LogicalStore + ?Sized>(
    store: &S,
    targets: &[String],
    use_friendly_names: bool,
) -> Result<Vec<String>, PkiMatchError> {
    enumerate_with_mode(store, targets, use_friendly_names, ErrorMode::Abort).map(|e| e.paths)
}

/// Expand `targets` into issuer paths.
///
/// In [`ErrorMode::Collect`] a mount whose listing fails is recorded in
/// [`Enumeration::failures`] and the remaining mounts are still listed.
/// Reading the mount table itself is always fatal.
pub fn enumerate_with_mode<S: LogicalStore + ?Sized>(
    store: &S,
    targets: &[String],
    use_friendly_names: bool,
    mode: ErrorMode,
) -> Result<Enumeration, PkiMatchError> {
    let mut enumeration = Enumeration::default();
    let mut seen = HashSet::new();

    let mounts_or_paths: Vec<String> = if targets.is_empty() {
        list_pki_mounts(store)?
    } else {
        targets.iter().map(|t| sanitize_path(t)).collect()
    };

    for target in mounts_or_paths {
        if target.is_empty() {
            continue;
        }
        if is_certificate_path(&target) {
            enumeration.push(&mut seen, target);
            continue;
        }

        match list_issuers(store, &target, use_friendly_names) {
            Ok(paths) => {
                for path in paths {
                    enumeration.push(&mut seen, path);
                }
            }
            Err(e) if mode == ErrorMode::Collect => {
                log::warn!("skipping mount {}: {}", target, e);
                enumeration.failures.push(CandidateFailure {
                    path: target,
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(enumeration)
}

/// Mount paths (without trailing slash) of every mount of type `pki`.
pub fn list_pki_mounts<S: LogicalStore + ?Sized>(store: &S) -> Result<Vec<String>, PkiMatchError> {
    let Some(doc) = store
        .read(MOUNT_TABLE_PATH)
        .map_err(|e| PkiMatchError::store(MOUNT_TABLE_PATH, e))?
    else {
        return Ok(Vec::new());
    };

    let table: BTreeMap<String, Value> =
        serde_json::from_value(doc).map_err(|e| PkiMatchError::MalformedDocument {
            path: MOUNT_TABLE_PATH.to_string(),
            field: "mounts",
            reason: e.to_string(),
        })?;

    Ok(table
        .into_iter()
        .filter(|(_, entry)| {
            serde_json::from_value::<MountEntry>(entry.clone())
                .map(|m| m.kind == PKI_MOUNT_TYPE)
                .unwrap_or(false)
        })
        .map(|(path, _)| sanitize_path(&path))
        .filter(|path| !path.is_empty())
        .collect())
}

/// Issuer paths (`<mount>/issuer/<id>`) registered under `mount`.
///
/// A mount without issuers yields an empty list. With
/// `use_friendly_names`, each id is replaced by the issuer's non-empty
/// `issuer_name` when it can be read.
pub fn list_issuers<S: LogicalStore + ?Sized>(
    store: &S,
    mount: &str,
    use_friendly_names: bool,
) -> Result<Vec<String>, PkiMatchError> {
    let mount = sanitize_path(mount);
    let list_path = format!("{}/issuers", mount);

    let Some(doc) = store
        .list(&list_path)
        .map_err(|e| PkiMatchError::store(&list_path, e))?
    else {
        return Ok(Vec::new());
    };

    let listing: KeyList =
        serde_json::from_value(doc).map_err(|e| PkiMatchError::MalformedDocument {
            path: list_path.clone(),
            field: "keys",
            reason: e.to_string(),
        })?;

    Ok(listing
        .keys
        .unwrap_or_default()
        .into_iter()
        .map(|id| {
            let name = if use_friendly_names {
                resolve_issuer_name(store, &mount, &id)
            } else {
                id
            };
            format!("{}/issuer/{}", mount, name)
        })
        .collect())
}

/// Issuer name for `id`, falling back to `id` itself.
fn resolve_issuer_name<S: LogicalStore + ?Sized>(store: &S, mount: &str, id: &str) -> String {
    let path = format!("{}/issuer/{}", mount, id);
    match store.read(&path) {
        Ok(Some(doc)) => match serde_json::from_value::<IssuerName>(doc) {
            Ok(IssuerName {
                issuer_name: Some(name),
            }) if !name.is_empty() => name,
            Ok(_) => id.to_string(),
            Err(e) => {
                log::warn!("unable to read issuer name from {}: {}", path, e);
                id.to_string()
            }
        },
        Ok(None) => {
            log::warn!("unable to read issuer name from {}: no document found", path);
            id.to_string()
        }
        Err(e) => {
            log::warn!("unable to read issuer name from {}: {}", path, e);
            id.to_string()
        }
    }
}
