// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pure endpoint planning and merging for DNS records.
//!
//! Every function here is a pure transformation over endpoint sets, so the
//! multi-writer merge semantics can be tested exhaustively without a
//! cluster. The core rule: an endpoint belongs to the cluster named by its
//! set identifier, a writer only ever replaces endpoints carrying its own
//! set identifiers, and the record is always the union of the per-cluster
//! contributions. Replace-by-owner makes the merge idempotent and
//! commutative across clusters, which is what keeps concurrent agents from
//! deleting each other's endpoints.

use crate::constants::{DEFAULT_DNS_RECORD_TTL_SECS, DEFAULT_ENDPOINT_WEIGHT};
use crate::crd::{Endpoint, RecordType};
use crate::traffic::{Target, TargetType};
use std::collections::BTreeMap;

/// Plan the endpoint one cluster contributes for a host.
///
/// Targets mixing IPs and hostnames collapse to A rdata; CNAME rdata is
/// used only when the cluster reports no IPs at all. Returns `None` when
/// the cluster has no targets, i.e. it contributes nothing.
#[must_use]
pub fn plan_cluster_endpoint(host: &str, cluster_id: &str, targets: &[Target]) -> Option<Endpoint> {
    let ips: Vec<String> = targets
        .iter()
        .filter(|t| t.target_type == TargetType::Ip)
        .map(|t| t.value.clone())
        .collect();

    let (record_type, mut rdata) = if ips.is_empty() {
        let hostnames: Vec<String> = targets
            .iter()
            .filter(|t| t.target_type == TargetType::Hostname)
            .map(|t| t.value.clone())
            .collect();
        (RecordType::CNAME, hostnames)
    } else {
        (RecordType::A, ips)
    };

    if rdata.is_empty() {
        return None;
    }
    rdata.sort();
    rdata.dedup();

    Some(Endpoint {
        dns_name: host.to_string(),
        record_type,
        targets: rdata,
        ttl: Some(DEFAULT_DNS_RECORD_TTL_SECS),
        set_identifier: Some(cluster_id.to_string()),
        weight: Some(DEFAULT_ENDPOINT_WEIGHT),
    })
}

/// Plan endpoints for a host from targets carrying cluster attribution.
///
/// Targets are partitioned by cluster-id; targets without one are ignored
/// (they belong to the agent-side patch path, which names its cluster
/// explicitly). Output ordering is deterministic by cluster-id.
#[must_use]
pub fn plan_endpoints(host: &str, targets: &[Target]) -> Vec<Endpoint> {
    let mut by_cluster: BTreeMap<&str, Vec<Target>> = BTreeMap::new();
    for target in targets {
        if let Some(cluster_id) = &target.cluster_id {
            by_cluster
                .entry(cluster_id.as_str())
                .or_default()
                .push(target.clone());
        }
    }

    by_cluster
        .iter()
        .filter_map(|(cluster_id, cluster_targets)| {
            plan_cluster_endpoint(host, cluster_id, cluster_targets)
        })
        .collect()
}

/// Merge freshly planned endpoints into an existing set.
///
/// Existing endpoints whose (dns name, set identifier) is outside
/// `owned_clusters` are preserved verbatim; endpoints owned by a cluster in
/// `owned_clusters` are replaced wholesale by the planned ones (or dropped,
/// when the cluster planned nothing). The result is sorted for
/// deterministic writes.
#[must_use]
pub fn merge_endpoints(
    existing: &[Endpoint],
    planned: &[Endpoint],
    host: &str,
    owned_clusters: &[String],
) -> Vec<Endpoint> {
    let mut merged: Vec<Endpoint> = existing
        .iter()
        .filter(|endpoint| {
            endpoint.dns_name != host
                || !endpoint
                    .set_identifier
                    .as_ref()
                    .is_some_and(|id| owned_clusters.contains(id))
        })
        .cloned()
        .collect();

    merged.extend(planned.iter().cloned());
    sort_endpoints(&mut merged);
    merged
}

/// Remove every endpoint owned by `cluster_id` for the given hosts.
#[must_use]
pub fn remove_cluster_endpoints(
    existing: &[Endpoint],
    hosts: &[String],
    cluster_id: &str,
) -> Vec<Endpoint> {
    let mut remaining: Vec<Endpoint> = existing
        .iter()
        .filter(|endpoint| {
            !(hosts.contains(&endpoint.dns_name)
                && endpoint.set_identifier.as_deref() == Some(cluster_id))
        })
        .cloned()
        .collect();
    sort_endpoints(&mut remaining);
    remaining
}

fn sort_endpoints(endpoints: &mut [Endpoint]) {
    endpoints.sort_by(|a, b| {
        a.dns_name
            .cmp(&b.dns_name)
            .then_with(|| a.set_identifier.cmp(&b.set_identifier))
    });
}

#[cfg(test)]
#[path = "endpoints_tests.rs"]
mod endpoints_tests;
