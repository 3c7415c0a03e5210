//! Uniform degrade-to-default handling for extracted fields.
//!
//! Extractors report every field as a [`FieldOutcome`]. The [`Resolver`]
//! consumes those outcomes against the entity's policy table: successes pass
//! through, failures are replaced by the rule's default and recorded. Whether
//! the entity is FAILED is then a pure function of the recorded failures.

use std::fmt;

use marquee_model::FieldRule;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::fetch::FetchError;

/// Why a field could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FieldFailure {
    pub reason: String,
}

impl FieldFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<ExtractError> for FieldFailure {
    fn from(err: ExtractError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<FetchError> for FieldFailure {
    fn from(err: FetchError) -> Self {
        Self::new(err.to_string())
    }
}

pub type FieldOutcome<T> = Result<T, FieldFailure>;

/// A field that fell back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFailure {
    pub field: &'static str,
    pub important: bool,
    pub reason: String,
}

/// Collects field outcomes for one entity.
pub struct Resolver {
    entity: String,
    failures: Vec<ResolvedFailure>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("entity", &self.entity)
            .field("failures", &self.failures.len())
            .finish()
    }
}

impl Resolver {
    pub fn new(entity: impl fmt::Display) -> Self {
        Self {
            entity: entity.to_string(),
            failures: Vec::new(),
        }
    }

    /// Returns the resolved value, or the rule's default on failure.
    pub fn resolve<T>(&mut self, rule: &FieldRule<T>, outcome: FieldOutcome<T>) -> T {
        match outcome {
            Ok(value) => value,
            Err(failure) => self.fail(rule, failure),
        }
    }

    /// Records a failure for `rule` and returns its default.
    pub fn fail<T>(&mut self, rule: &FieldRule<T>, failure: FieldFailure) -> T {
        if rule.important {
            tracing::warn!(
                target: "marquee::policy",
                entity = %self.entity,
                field = rule.name,
                reason = %failure.reason,
                "important field failed, using default"
            );
        } else {
            tracing::debug!(
                target: "marquee::policy",
                entity = %self.entity,
                field = rule.name,
                reason = %failure.reason,
                "field failed, using default"
            );
        }
        self.failures.push(ResolvedFailure {
            field: rule.name,
            important: rule.important,
            reason: failure.reason,
        });
        rule.default_value()
    }

    /// True iff any important field fell back to its default.
    pub fn failed(&self) -> bool {
        self.failures.iter().any(|failure| failure.important)
    }

    pub fn failures(&self) -> &[ResolvedFailure] {
        &self.failures
    }
}
