//! Match policy: which relationships a candidate must satisfy.

use crate::relationship::{Relationship, RelationshipResult};
use crate::PkiMatchError;
use std::collections::BTreeSet;

/// A set of required relationships.
///
/// A candidate is accepted when every required relationship holds. Facts
/// that are not required never affect the decision, so a candidate with
/// more positive facts than required still matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicy {
    required: BTreeSet<Relationship>,
}

impl MatchPolicy {
    /// A policy requiring exactly the given relationships.
    pub fn new<I: IntoIterator<Item = Relationship>>(required: I) -> Self {
        MatchPolicy {
            required: required.into_iter().collect(),
        }
    }

    /// A policy that accepts every candidate.
    pub fn none() -> Self {
        MatchPolicy::new([])
    }

    /// A policy requiring all five relationships.
    pub fn all() -> Self {
        MatchPolicy::new(Relationship::ALL)
    }

    /// Build a policy from relationship names, rejecting unknown names.
    pub fn from_names<I, S>(names: I) -> Result<Self, PkiMatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let required = names
            .into_iter()
            .map(|name| name.as_ref().parse::<Relationship>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(MatchPolicy { required })
    }

    /// Mark `relationship` as required or not.
    pub fn set(&mut self, relationship: Relationship, required: bool) -> &mut Self {
        if required {
            self.required.insert(relationship);
        } else {
            self.required.remove(&relationship);
        }
        self
    }

    /// Whether `relationship` is required.
    pub fn is_required(&self, relationship: Relationship) -> bool {
        self.required.contains(&relationship)
    }

    /// Required relationships in presentation order.
    pub fn required(&self) -> impl Iterator<Item = Relationship> + '_ {
        self.required.iter().copied()
    }

    /// Whether `result` satisfies every required relationship.
    pub fn accepts(&self, result: &RelationshipResult) -> bool {
        self.required.iter().all(|r| result.get(*r))
    }
}

impl Default for MatchPolicy {
    /// Subject, key identifier and signature are required; supplied chain
    /// and validated trust path are informational.
    fn default() -> Self {
        MatchPolicy::new([
            Relationship::SubjectMatch,
            Relationship::KeyIdMatch,
            Relationship::SignatureMatch,
        ])
    }
}
