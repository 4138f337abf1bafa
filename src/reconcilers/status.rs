// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for Gateway status publication.
//!
//! Gateway status conditions follow the standard Kubernetes shape:
//! - `type`: the aspect being reported (Accepted, Programmed)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: a programmatic CamelCase identifier
//! - `message`: a human-readable explanation
//! - `observedGeneration`: the spec generation this pass observed
//! - `lastTransitionTime`: RFC3339 timestamp of the last status change
//!
//! `observedGeneration` always tracks the generation observed in the
//! current pass; `lastTransitionTime` only moves when the status or reason
//! actually changes.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

/// Condition type published when the gateway class matches.
pub const CONDITION_ACCEPTED: &str = "Accepted";

/// Condition type tracking data-plane programming.
pub const CONDITION_PROGRAMMED: &str = "Programmed";

/// Reason published while a precondition is outstanding.
pub const REASON_PENDING: &str = "Pending";

/// Reason published once DNS and TLS are fully applied.
pub const REASON_PROGRAMMED: &str = "Programmed";

/// Create a condition stamped with the current time.
#[must_use]
pub fn new_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        observed_generation,
        last_transition_time: Time(Utc::now()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == condition_type)
}

/// Insert or replace a condition, preserving the transition time when
/// neither status nor reason changed.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut new_condition: Condition) {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.type_ == new_condition.type_)
    {
        if existing.status == new_condition.status && existing.reason == new_condition.reason {
            new_condition.last_transition_time = existing.last_transition_time.clone();
        }
        *existing = new_condition;
    } else {
        conditions.push(new_condition);
    }
}

/// Whether two condition sets differ in anything the controller publishes.
///
/// Used to skip status writes on converged passes and so avoid write
/// storms against the API server.
#[must_use]
pub fn conditions_changed(existing: &[Condition], desired: &[Condition]) -> bool {
    if existing.len() != desired.len() {
        return true;
    }
    desired.iter().any(|want| {
        find_condition(existing, &want.type_).is_none_or(|have| {
            have.status != want.status
                || have.reason != want.reason
                || have.message != want.message
                || have.observed_generation != want.observed_generation
        })
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
