// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for condition bookkeeping.

use super::*;

#[test]
fn test_new_condition_shape() {
    let condition = new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting for controller",
        Some(3),
    );

    assert_eq!(condition.type_, "Programmed");
    assert_eq!(condition.status, "Unknown");
    assert_eq!(condition.reason, "Pending");
    assert_eq!(condition.message, "Waiting for controller");
    assert_eq!(condition.observed_generation, Some(3));
}

#[test]
fn test_upsert_replaces_by_type() {
    let mut conditions = vec![new_condition(
        CONDITION_PROGRAMMED,
        "False",
        REASON_PENDING,
        "No clusters match selection",
        Some(1),
    )];

    upsert_condition(
        &mut conditions,
        new_condition(
            CONDITION_PROGRAMMED,
            "True",
            REASON_PROGRAMMED,
            "Gateway configured in data plane cluster(s) - [c1]",
            Some(1),
        ),
    );

    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].status, "True");
}

#[test]
fn test_upsert_preserves_transition_time_when_status_and_reason_unchanged() {
    let original = new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting for controller",
        Some(1),
    );
    let original_time = original.last_transition_time.clone();
    let mut conditions = vec![original];

    // Only the observed generation moves; status and reason are identical
    upsert_condition(
        &mut conditions,
        new_condition(
            CONDITION_PROGRAMMED,
            "Unknown",
            REASON_PENDING,
            "Waiting for controller",
            Some(2),
        ),
    );

    assert_eq!(conditions[0].last_transition_time, original_time);
    assert_eq!(conditions[0].observed_generation, Some(2));
}

#[test]
fn test_upsert_moves_transition_time_on_status_change() {
    let mut first = new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting for controller",
        Some(1),
    );
    // Backdate so a fresh timestamp is observably different
    first.last_transition_time = Time(chrono::Utc::now() - chrono::Duration::hours(1));
    let original_time = first.last_transition_time.clone();
    let mut conditions = vec![first];

    upsert_condition(
        &mut conditions,
        new_condition(
            CONDITION_PROGRAMMED,
            "True",
            REASON_PROGRAMMED,
            "Gateway configured in data plane cluster(s) - [c1]",
            Some(1),
        ),
    );

    assert_ne!(conditions[0].last_transition_time, original_time);
}

#[test]
fn test_upsert_appends_unknown_type() {
    let mut conditions = vec![new_condition(
        CONDITION_ACCEPTED,
        "True",
        CONDITION_ACCEPTED,
        "Handled",
        Some(1),
    )];

    upsert_condition(
        &mut conditions,
        new_condition(CONDITION_PROGRAMMED, "Unknown", REASON_PENDING, "Waiting", Some(1)),
    );

    assert_eq!(conditions.len(), 2);
    assert!(find_condition(&conditions, CONDITION_ACCEPTED).is_some());
    assert!(find_condition(&conditions, CONDITION_PROGRAMMED).is_some());
}

#[test]
fn test_conditions_changed_detects_differences() {
    let existing = vec![new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting",
        Some(1),
    )];

    let same = vec![new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting",
        Some(1),
    )];
    assert!(!conditions_changed(&existing, &same));

    let new_status = vec![new_condition(
        CONDITION_PROGRAMMED,
        "True",
        REASON_PROGRAMMED,
        "Done",
        Some(1),
    )];
    assert!(conditions_changed(&existing, &new_status));

    let new_generation = vec![new_condition(
        CONDITION_PROGRAMMED,
        "Unknown",
        REASON_PENDING,
        "Waiting",
        Some(2),
    )];
    assert!(conditions_changed(&existing, &new_generation));
}

#[test]
fn test_programmed_monotonic_walk() {
    // False (no clusters) -> Unknown (awaiting certs) -> True (programmed),
    // with observedGeneration never regressing.
    let mut conditions = Vec::new();

    upsert_condition(
        &mut conditions,
        new_condition(CONDITION_PROGRAMMED, "False", REASON_PENDING, "No clusters match selection", Some(1)),
    );
    upsert_condition(
        &mut conditions,
        new_condition(CONDITION_PROGRAMMED, "Unknown", REASON_PENDING, "Waiting for controller", Some(2)),
    );
    upsert_condition(
        &mut conditions,
        new_condition(
            CONDITION_PROGRAMMED,
            "True",
            REASON_PROGRAMMED,
            "Gateway configured in data plane cluster(s) - [c1,c2]",
            Some(3),
        ),
    );

    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].status, "True");
    assert_eq!(conditions[0].observed_generation, Some(3));
}
