// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the pure endpoint planner and merge semantics.

use super::*;

const HOST: &str = "app.tenant-a.example.com";

fn ip(value: &str, cluster: &str) -> Target {
    Target::new(value, Some(cluster.to_string()))
}

fn endpoint(host: &str, cluster: &str, targets: &[&str], record_type: RecordType) -> Endpoint {
    Endpoint {
        dns_name: host.to_string(),
        record_type,
        targets: targets.iter().map(|t| (*t).to_string()).collect(),
        ttl: Some(DEFAULT_DNS_RECORD_TTL_SECS),
        set_identifier: Some(cluster.to_string()),
        weight: Some(DEFAULT_ENDPOINT_WEIGHT),
    }
}

#[test]
fn test_plan_ip_targets_become_a_rdata() {
    let targets = vec![ip("10.0.0.1", "c1"), ip("10.0.0.2", "c1")];
    let planned = plan_cluster_endpoint(HOST, "c1", &targets).unwrap();

    assert_eq!(planned.record_type, RecordType::A);
    assert_eq!(planned.targets, vec!["10.0.0.1", "10.0.0.2"]);
    assert_eq!(planned.set_identifier.as_deref(), Some("c1"));
    assert_eq!(planned.weight, Some(DEFAULT_ENDPOINT_WEIGHT));
    assert_eq!(planned.ttl, Some(DEFAULT_DNS_RECORD_TTL_SECS));
}

#[test]
fn test_plan_hostname_targets_become_cname_rdata() {
    let targets = vec![Target::new("lb.provider.example.com", Some("c1".to_string()))];
    let planned = plan_cluster_endpoint(HOST, "c1", &targets).unwrap();

    assert_eq!(planned.record_type, RecordType::CNAME);
    assert_eq!(planned.targets, vec!["lb.provider.example.com"]);
}

#[test]
fn test_plan_mixed_targets_prefer_a() {
    let targets = vec![
        Target::new("lb.provider.example.com", Some("c1".to_string())),
        ip("10.0.0.1", "c1"),
    ];
    let planned = plan_cluster_endpoint(HOST, "c1", &targets).unwrap();

    assert_eq!(planned.record_type, RecordType::A);
    assert_eq!(planned.targets, vec!["10.0.0.1"]);
}

#[test]
fn test_plan_no_targets_contributes_nothing() {
    assert!(plan_cluster_endpoint(HOST, "c1", &[]).is_none());
}

#[test]
fn test_plan_deduplicates_rdata() {
    let targets = vec![ip("10.0.0.1", "c1"), ip("10.0.0.1", "c1")];
    let planned = plan_cluster_endpoint(HOST, "c1", &targets).unwrap();
    assert_eq!(planned.targets, vec!["10.0.0.1"]);
}

#[test]
fn test_plan_endpoints_partitions_by_cluster() {
    let targets = vec![
        ip("10.0.0.1", "c1"),
        ip("10.0.0.2", "c2"),
        Target::new("10.9.9.9", None), // no attribution, agent-path only
    ];
    let planned = plan_endpoints(HOST, &targets);

    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].set_identifier.as_deref(), Some("c1"));
    assert_eq!(planned[0].targets, vec!["10.0.0.1"]);
    assert_eq!(planned[1].set_identifier.as_deref(), Some("c2"));
    assert_eq!(planned[1].targets, vec!["10.0.0.2"]);
}

#[test]
fn test_merge_preserves_other_clusters() {
    let existing = vec![endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A)];
    let planned = vec![endpoint(HOST, "c2", &["10.0.0.2"], RecordType::A)];

    let merged = merge_endpoints(&existing, &planned, HOST, &["c2".to_string()]);

    assert_eq!(merged.len(), 2);
    assert!(merged.iter().any(|e| e.set_identifier.as_deref() == Some("c1")));
    assert!(merged.iter().any(|e| e.set_identifier.as_deref() == Some("c2")));
}

#[test]
fn test_merge_replaces_own_cluster_wholesale() {
    let existing = vec![endpoint(HOST, "c1", &["10.0.0.1", "10.0.0.9"], RecordType::A)];
    let planned = vec![endpoint(HOST, "c1", &["10.0.0.3"], RecordType::A)];

    let merged = merge_endpoints(&existing, &planned, HOST, &["c1".to_string()]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].targets, vec!["10.0.0.3"]);
}

#[test]
fn test_merge_drops_own_cluster_when_nothing_planned() {
    let existing = vec![
        endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A),
        endpoint(HOST, "c2", &["10.0.0.2"], RecordType::A),
    ];

    let merged = merge_endpoints(&existing, &[], HOST, &["c1".to_string()]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].set_identifier.as_deref(), Some("c2"));
}

#[test]
fn test_merge_scopes_ownership_to_host() {
    let other_host = "other.tenant-a.example.com";
    let existing = vec![
        endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A),
        endpoint(other_host, "c1", &["10.0.0.5"], RecordType::A),
    ];
    let planned = vec![endpoint(HOST, "c1", &["10.0.0.2"], RecordType::A)];

    let merged = merge_endpoints(&existing, &planned, HOST, &["c1".to_string()]);

    // The same cluster's endpoint for a different host is untouched
    assert_eq!(merged.len(), 2);
    assert!(merged
        .iter()
        .any(|e| e.dns_name == other_host && e.targets == vec!["10.0.0.5"]));
}

#[test]
fn test_union_property_across_interleavings() {
    // Three clusters contribute in every order; the converged record must be
    // the union of the per-cluster contributions regardless of interleaving.
    let contributions = [
        ("c1", vec!["10.0.0.1"]),
        ("c2", vec!["10.0.0.2"]),
        ("c3", vec!["10.0.0.3"]),
    ];

    let orders: Vec<Vec<usize>> = vec![
        vec![0, 1, 2],
        vec![2, 1, 0],
        vec![1, 0, 2],
        vec![0, 2, 1],
        vec![2, 0, 1],
        vec![1, 2, 0],
    ];

    let mut converged: Option<Vec<Endpoint>> = None;
    for order in orders {
        let mut record: Vec<Endpoint> = Vec::new();
        for index in order {
            let (cluster, ips) = &contributions[index];
            let targets: Vec<Target> = ips.iter().map(|ip| Target::new(ip, None)).collect();
            let planned = plan_cluster_endpoint(HOST, cluster, &targets).unwrap();
            record = merge_endpoints(&record, &[planned], HOST, &[(*cluster).to_string()]);
        }

        assert_eq!(record.len(), 3);
        match &converged {
            Some(expected) => assert_eq!(&record, expected),
            None => converged = Some(record),
        }
    }
}

#[test]
fn test_repeated_upsert_is_idempotent() {
    let planned = vec![endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A)];

    let once = merge_endpoints(&[], &planned, HOST, &["c1".to_string()]);
    let twice = merge_endpoints(&once, &planned, HOST, &["c1".to_string()]);

    assert_eq!(once, twice);
}

#[test]
fn test_remove_deletes_exactly_matching_set_identifiers() {
    let existing = vec![
        endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A),
        endpoint(HOST, "c2", &["10.0.0.2"], RecordType::A),
    ];

    let remaining = remove_cluster_endpoints(&existing, &[HOST.to_string()], "c2");

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].set_identifier.as_deref(), Some("c1"));
}

#[test]
fn test_remove_ignores_other_hosts() {
    let other_host = "other.tenant-a.example.com".to_string();
    let existing = vec![endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A)];

    let remaining = remove_cluster_endpoints(&existing, &[other_host], "c1");
    assert_eq!(remaining.len(), 1);
}

#[test]
fn test_remove_last_contributor_empties_record() {
    let existing = vec![endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A)];
    let remaining = remove_cluster_endpoints(&existing, &[HOST.to_string()], "c1");
    assert!(remaining.is_empty());
}

#[test]
fn test_remove_is_idempotent() {
    let existing = vec![endpoint(HOST, "c1", &["10.0.0.1"], RecordType::A)];
    let once = remove_cluster_endpoints(&existing, &[HOST.to_string()], "c1");
    let twice = remove_cluster_endpoints(&once, &[HOST.to_string()], "c1");
    assert_eq!(once, twice);
}
