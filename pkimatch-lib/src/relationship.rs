//! The five issuer/issued relationship predicates.

use crate::fetch::CertificateReference;
use crate::parser::parse_x509;
use crate::signature::check_signature;
use crate::verify::{verify_against_anchor, VerifyOptions};
use crate::PkiMatchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// One of the five named relationship facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Issuer Subject equals issued Issuer (raw DER).
    SubjectMatch,
    /// Issuer certificate appears in the issued certificate's CA chain.
    PathMatch,
    /// Path validation anchored at the issuer succeeds.
    TrustMatch,
    /// Issued AKID equals issuer SKID.
    KeyIdMatch,
    /// Issued signature verifies with the issuer public key.
    SignatureMatch,
}

impl Relationship {
    /// Every relationship, in presentation order.
    pub const ALL: [Relationship; 5] = [
        Relationship::SubjectMatch,
        Relationship::PathMatch,
        Relationship::TrustMatch,
        Relationship::KeyIdMatch,
        Relationship::SignatureMatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Relationship::SubjectMatch => "subject_match",
            Relationship::PathMatch => "path_match",
            Relationship::TrustMatch => "trust_match",
            Relationship::KeyIdMatch => "key_id_match",
            Relationship::SignatureMatch => "signature_match",
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = PkiMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relationship::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| PkiMatchError::UnknownRelationship(s.to_string()))
    }
}

/// The five facts computed for an (issuer, issued) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipResult {
    pub subject_match: bool,
    pub path_match: bool,
    pub trust_match: bool,
    pub key_id_match: bool,
    pub signature_match: bool,
}

impl RelationshipResult {
    /// Value of a single fact.
    pub fn get(&self, relationship: Relationship) -> bool {
        match relationship {
            Relationship::SubjectMatch => self.subject_match,
            Relationship::PathMatch => self.path_match,
            Relationship::TrustMatch => self.trust_match,
            Relationship::KeyIdMatch => self.key_id_match,
            Relationship::SignatureMatch => self.signature_match,
        }
    }

    /// All five facts in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = (Relationship, bool)> + '_ {
        Relationship::ALL.into_iter().map(move |r| (r, self.get(r)))
    }

    /// The facts keyed by name; always exactly five entries.
    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.iter()
            .map(|(r, value)| (r.as_str().to_string(), value))
            .collect()
    }
}

/// Evaluate all five relationships with `issuer` as the candidate issuer of
/// `issued`, validating time against the current clock.
pub fn evaluate(
    issuer: &CertificateReference,
    issued: &CertificateReference,
) -> Result<RelationshipResult, PkiMatchError> {
    evaluate_with_options(issuer, issued, &VerifyOptions::default())
}

/// Like [`evaluate`], with explicit path validation options for
/// `trust_match`.
///
/// Errors are limited to certificates that cannot be decoded and to an
/// issued certificate that is itself out of its validity period or carries
/// an unknown critical extension. An issuer that cannot act as trust anchor
/// yields a `false` fact.
pub fn evaluate_with_options(
    issuer: &CertificateReference,
    issued: &CertificateReference,
    options: &VerifyOptions,
) -> Result<RelationshipResult, PkiMatchError> {
    let issuer_x509 = parse_reference(issuer)?;
    let issued_x509 = parse_reference(issued)?;

    Ok(RelationshipResult {
        subject_match: issuer_x509.subject().as_raw() == issued_x509.issuer().as_raw(),
        path_match: issued.ca_chain.iter().any(|c| *c == issuer.certificate),
        trust_match: trust_matches(issuer, issued, options)?,
        key_id_match: authority_key_id(&issued_x509) == subject_key_id(&issuer_x509),
        signature_match: check_signature(&issued_x509, issuer_x509.public_key()).is_ok(),
    })
}

fn parse_reference(
    reference: &CertificateReference,
) -> Result<X509Certificate<'_>, PkiMatchError> {
    parse_x509(&reference.certificate).map_err(|e| PkiMatchError::InvalidCertificate {
        path: reference.path.clone(),
        field: "certificate",
        reason: e.to_string(),
    })
}

fn trust_matches(
    issuer: &CertificateReference,
    issued: &CertificateReference,
    options: &VerifyOptions,
) -> Result<bool, PkiMatchError> {
    let result = verify_against_anchor(&issued.certificate, &issuer.certificate, options)?;

    let reasons: Vec<String> = result.end_entity_problems().map(|p| p.to_string()).collect();
    if !reasons.is_empty() {
        return Err(PkiMatchError::PathValidation {
            issuer: issuer.path.clone(),
            issued: issued.path.clone(),
            reason: reasons.join("; "),
        });
    }

    if !result.is_valid {
        log::debug!(
            "{} does not anchor {}: {}",
            issuer.path,
            issued.path,
            result
        );
    }
    Ok(result.is_valid)
}

/// Subject Key Identifier bytes; empty when the extension is absent.
fn subject_key_id<'a>(cert: &X509Certificate<'a>) -> &'a [u8] {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(kid) => Some(kid.0),
            _ => None,
        })
        .unwrap_or(&[])
}

/// Authority Key Identifier keyIdentifier bytes; empty when absent.
fn authority_key_id<'a>(cert: &X509Certificate<'a>) -> &'a [u8] {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                aki.key_identifier.as_ref().map(|kid| kid.0)
            }
            _ => None,
        })
        .unwrap_or(&[])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for r in Relationship::ALL {
            assert_eq!(r.as_str().parse::<Relationship>().unwrap(), r);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "issuer_match".parse::<Relationship>().unwrap_err();
        assert!(matches!(err, PkiMatchError::UnknownRelationship(_)));
    }

    #[test]
    fn map_always_has_five_entries() {
        let result = RelationshipResult {
            subject_match: true,
            ..Default::default()
        };
        let map = result.to_map();
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("subject_match"), Some(&true));
        assert_eq!(map.get("trust_match"), Some(&false));
    }

    #[test]
    fn serializes_with_snake_case_keys() {
        let json = serde_json::to_value(RelationshipResult::default()).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert!(json.get("key_id_match").is_some());
        assert_eq!(
            serde_json::to_value(Relationship::KeyIdMatch).unwrap(),
            serde_json::json!("key_id_match")
        );
    }
}
