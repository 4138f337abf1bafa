// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster selector parsing and matching.
//!
//! Cluster selection is annotation-driven: the
//! `kuadrant.io/gateway-cluster-label-selector` annotation carries an
//! equality-based selector string (`type=test,region=eu`) that is parsed
//! here and evaluated against the labels of the registered cluster
//! credential secrets. Evaluation follows the Kubernetes label selector
//! semantics: `matchLabels` and `matchExpressions` are ANDed, and the
//! empty selector selects every registered cluster.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use crossgate::selector::parse_selector;
//!
//! let selector = parse_selector("type=test").unwrap();
//!
//! let mut cluster_labels = BTreeMap::new();
//! cluster_labels.insert("type".to_string(), "test".to_string());
//!
//! assert!(selector.matches(&cluster_labels));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Label selector deciding which registered clusters a resource targets.
///
/// The result of matchLabels and matchExpressions are `ANDed`. An empty
/// selector places no constraint and selects every cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. All pairs must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key,
/// and an operator that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. Must be non-empty for In and `NotIn`,
    /// empty for Exists and `DoesNotExist`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl LabelSelector {
    /// Whether a cluster carrying `labels` is selected.
    ///
    /// Both halves of the selector must hold: every `matchLabels` pair is
    /// present verbatim, and every `matchExpressions` requirement is
    /// satisfied. An absent half places no constraint.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let pairs_hold = self.match_labels.as_ref().is_none_or(|wanted| {
            wanted
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
        });

        pairs_hold
            && self
                .match_expressions
                .as_ref()
                .is_none_or(|requirements| requirements.iter().all(|req| req.matches(labels)))
    }
}

impl LabelSelectorRequirement {
    /// Whether a cluster carrying `labels` satisfies this requirement.
    ///
    /// Implements the four Kubernetes operators against the cluster's
    /// label for this requirement's key. A requirement with an operator
    /// the controller does not know selects nothing: silently replicating
    /// a Gateway to an unintended cluster is the failure mode to avoid.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let cluster_value = labels.get(&self.key);
        let values = self.values.as_deref().unwrap_or_default();

        match self.operator.as_str() {
            "In" => cluster_value.is_some_and(|value| values.contains(value)),
            "NotIn" => cluster_value.is_none_or(|value| !values.contains(value)),
            "Exists" => cluster_value.is_some(),
            "DoesNotExist" => cluster_value.is_none(),
            unknown => {
                tracing::warn!(
                    operator = unknown,
                    key = %self.key,
                    "Unknown selector operator, excluding cluster from selection"
                );
                false
            }
        }
    }
}

/// Errors produced while parsing a selector annotation.
#[derive(Debug, Error)]
pub enum SelectorParseError {
    /// A clause was not of the form `key=value`
    #[error("invalid selector clause {0:?}, expected key=value")]
    InvalidClause(String),

    /// A clause had an empty key or value
    #[error("empty key or value in selector clause {0:?}")]
    EmptyClause(String),
}

/// Parse an equality-based selector string into a [`LabelSelector`].
///
/// Accepts the comma-separated `key=value` form used by the
/// `kuadrant.io/gateway-cluster-label-selector` annotation. An empty string
/// parses to the empty selector, which matches every cluster.
///
/// # Errors
///
/// Returns [`SelectorParseError`] when a clause is not `key=value` or has an
/// empty side. Malformed selectors are a user error: the reconciler surfaces
/// them through a condition message rather than retrying.
pub fn parse_selector(selector: &str) -> Result<LabelSelector, SelectorParseError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Ok(LabelSelector::default());
    }

    let mut match_labels = BTreeMap::new();
    for clause in trimmed.split(',') {
        let clause = clause.trim();
        let Some((key, value)) = clause.split_once('=') else {
            return Err(SelectorParseError::InvalidClause(clause.to_string()));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(SelectorParseError::EmptyClause(clause.to_string()));
        }
        match_labels.insert(key.to_string(), value.to_string());
    }

    Ok(LabelSelector {
        match_labels: Some(match_labels),
        match_expressions: None,
    })
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
