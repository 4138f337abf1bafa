// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record materialization.
//!
//! This module brings `DNSRecord` objects in line with the union of all
//! clusters' current traffic targets. The hub reconciler registers hosts
//! and merges the aggregated gateway targets; the data-plane agents patch
//! their own cluster's endpoints in and out through [`DnsService::patch_targets`].
//!
//! The record is the only object written from multiple clusters. All writes
//! go through a bounded read-modify-write loop with optimistic concurrency,
//! and the endpoint merge itself (see [`endpoints`]) only ever replaces
//! endpoints owned by the calling cluster, so any ordering of agents
//! converges to the same record.

pub mod endpoints;
pub mod zones;

use crate::constants::{DNS_RECORD_CONFLICT_RETRIES, HOST_ID_LENGTH, KIND_DNS_RECORD};
use crate::crd::{DNSRecord, DNSRecordSpec, Endpoint, ManagedZone};
use crate::labels::{HOST_ID_LABEL, K8S_MANAGED_BY, MANAGED_BY_CONTROLLER};
use crate::traffic::{Target, Traffic};
use anyhow::{bail, Context, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Derive the stable short host-ID for a traffic resource.
///
/// The ID is a truncated SHA-256 over `namespace/name` and labels every
/// endpoint contributed by that resource, so records belonging to distinct
/// traffic resources can coexist in the same managed zone.
#[must_use]
pub fn host_id(namespace: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..HOST_ID_LENGTH].to_string()
}

/// Object name of the DNSRecord for a host.
///
/// Hostnames are valid object names apart from case and the wildcard label.
#[must_use]
pub fn record_name(host: &str) -> String {
    let lowered = host.to_lowercase();
    match lowered.strip_prefix("*.") {
        Some(rest) => format!("wildcard.{rest}"),
        None => lowered,
    }
}

/// Materializes and patches DNS records from traffic targets.
#[derive(Clone)]
pub struct DnsService {
    client: Client,
    zones: zones::ZoneRegistry,
}

impl DnsService {
    /// Create a service writing records through `client`.
    #[must_use]
    pub fn new(client: Client) -> Self {
        let zones = zones::ZoneRegistry::new(client.clone());
        Self { client, zones }
    }

    /// Create a service with an explicitly configured zone registry.
    #[must_use]
    pub fn with_registry(client: Client, zones: zones::ZoneRegistry) -> Self {
        Self { client, zones }
    }

    /// The zone registry this service resolves hosts against.
    #[must_use]
    pub fn zones(&self) -> &zones::ZoneRegistry {
        &self.zones
    }

    fn api(&self, namespace: &str) -> Api<DNSRecord> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Fetch the record for `host`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error on any API failure other than 404.
    pub async fn get_record(&self, namespace: &str, host: &str) -> Result<Option<DNSRecord>> {
        match self.api(namespace).get(&record_name(host)).await {
            Ok(record) => Ok(Some(record)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e).context(format!("Failed to get DNSRecord for host {host}")),
        }
    }

    /// Register `host` in `zone`: create the empty record if absent.
    ///
    /// The record is created in the owner's namespace, labelled with the
    /// owner's host-ID and owner-referenced so garbage collection removes
    /// it once every owner is gone. Re-registration is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the create fails for any reason other than
    /// the record already existing.
    pub async fn register_host(
        &self,
        traffic: &Traffic,
        host: &str,
        zone: &ManagedZone,
    ) -> Result<DNSRecord> {
        let namespace = traffic.namespace();

        if let Some(existing) = self.get_record(&namespace, host).await? {
            return Ok(existing);
        }

        let mut labels = BTreeMap::new();
        labels.insert(
            HOST_ID_LABEL.to_string(),
            host_id(&namespace, &traffic.name()),
        );
        labels.insert(
            K8S_MANAGED_BY.to_string(),
            MANAGED_BY_CONTROLLER.to_string(),
        );

        let record = DNSRecord {
            metadata: ObjectMeta {
                name: Some(record_name(host)),
                namespace: Some(namespace.clone()),
                labels: Some(labels),
                owner_references: traffic.owner_ref().map(|owner| vec![owner]),
                ..Default::default()
            },
            spec: DNSRecordSpec {
                root_host: host.to_string(),
                zone_ref: zone.metadata.name.clone(),
                endpoints: Vec::new(),
            },
            status: None,
        };

        match self
            .api(&namespace)
            .create(&PostParams::default(), &record)
            .await
        {
            Ok(created) => {
                info!(host, zone = ?zone.metadata.name, "Registered host in managed zone");
                Ok(created)
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                // Lost the create race; the record is there now
                self.get_record(&namespace, host)
                    .await?
                    .context("DNSRecord vanished right after a create conflict")
            }
            Err(e) => Err(e).context(format!("Failed to create DNSRecord for host {host}")),
        }
    }

    /// Bring the record for `host` in line with the accessor's aggregated
    /// targets, preserving endpoints of clusters not represented this pass.
    ///
    /// # Errors
    ///
    /// Returns a retryable error when the bounded conflict retry is
    /// exhausted or the API fails.
    pub async fn ensure_endpoints(&self, traffic: &Traffic, host: &str) -> Result<()> {
        let targets = traffic
            .dns_targets()
            .map_err(|e| anyhow::anyhow!("Failed to aggregate DNS targets: {e}"))?;

        let planned = endpoints::plan_endpoints(host, &targets);
        let owned: Vec<String> = planned
            .iter()
            .filter_map(|endpoint| endpoint.set_identifier.clone())
            .collect();

        if planned.is_empty() {
            debug!(host, "No cluster reported targets yet, leaving record untouched");
            return Ok(());
        }

        let namespace = traffic.namespace();
        self.update_endpoints_with_retry(&namespace, host, |existing| {
            endpoints::merge_endpoints(existing, &planned, host, &owned)
        })
        .await
    }

    /// Upsert or withdraw one cluster's endpoints for a set of hosts.
    ///
    /// With `remove = false` the endpoints for (host, cluster) are replaced
    /// by the plan for `targets`, creating the record if it does not exist
    /// (hosts resolving to no managed zone are skipped). With
    /// `remove = true` the endpoints whose set identifier equals
    /// `cluster_id` are deleted for each host; a record left without
    /// endpoints is deleted, and a missing record is already success.
    ///
    /// Both directions are idempotent and commutative across clusters.
    ///
    /// # Errors
    ///
    /// Returns a retryable error on API failure or conflict exhaustion.
    pub async fn patch_targets(
        &self,
        namespace: &str,
        targets: &[Target],
        hosts: &[String],
        cluster_id: &str,
        remove: bool,
    ) -> Result<()> {
        for host in hosts {
            if remove {
                self.withdraw_host(namespace, host, hosts, cluster_id).await?;
            } else {
                self.upsert_host(namespace, host, targets, cluster_id).await?;
            }
        }
        Ok(())
    }

    async fn upsert_host(
        &self,
        namespace: &str,
        host: &str,
        targets: &[Target],
        cluster_id: &str,
    ) -> Result<()> {
        let Some(planned) = endpoints::plan_cluster_endpoint(host, cluster_id, targets) else {
            // No local targets: equivalent to withdrawing this cluster
            let own_host = vec![host.to_string()];
            return self.withdraw_host(namespace, host, &own_host, cluster_id).await;
        };

        if self.get_record(namespace, host).await?.is_none() {
            let Some(zone) = self.zones.resolve(namespace, host).await? else {
                debug!(host, "Host is outside every managed zone, skipping DNS");
                return Ok(());
            };

            let record = DNSRecord {
                metadata: ObjectMeta {
                    name: Some(record_name(host)),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                spec: DNSRecordSpec {
                    root_host: host.to_string(),
                    zone_ref: zone.metadata.name.clone(),
                    endpoints: vec![planned.clone()],
                },
                status: None,
            };

            match self
                .api(namespace)
                .create(&PostParams::default(), &record)
                .await
            {
                Ok(_) => {
                    info!(host, cluster = cluster_id, "Created DNSRecord with first endpoint");
                    return Ok(());
                }
                Err(kube::Error::Api(ae)) if ae.code == 409 => {
                    // Another cluster created it concurrently; fall through to merge
                }
                Err(e) => {
                    return Err(e).context(format!("Failed to create DNSRecord for host {host}"));
                }
            }
        }

        let owned = vec![cluster_id.to_string()];
        self.update_endpoints_with_retry(namespace, host, move |existing| {
            endpoints::merge_endpoints(existing, std::slice::from_ref(&planned), host, &owned)
        })
        .await
    }

    async fn withdraw_host(
        &self,
        namespace: &str,
        host: &str,
        hosts: &[String],
        cluster_id: &str,
    ) -> Result<()> {
        let Some(record) = self.get_record(namespace, host).await? else {
            // Nothing to withdraw from
            return Ok(());
        };

        let remaining =
            endpoints::remove_cluster_endpoints(&record.spec.endpoints, hosts, cluster_id);

        if remaining.is_empty() {
            match self
                .api(namespace)
                .delete(&record.name_any(), &DeleteParams::default())
                .await
            {
                Ok(_) => {
                    info!(host, cluster = cluster_id, "Deleted DNSRecord after last endpoint was withdrawn");
                }
                Err(kube::Error::Api(ae)) if ae.code == 404 => {}
                Err(e) => {
                    return Err(e).context(format!("Failed to delete DNSRecord for host {host}"));
                }
            }
            return Ok(());
        }

        let hosts = hosts.to_vec();
        let cluster_id = cluster_id.to_string();
        self.update_endpoints_with_retry(namespace, host, move |existing| {
            endpoints::remove_cluster_endpoints(existing, &hosts, &cluster_id)
        })
        .await
    }

    /// Read-modify-write with optimistic concurrency.
    ///
    /// Re-reads and re-applies `compute` on every conflict, up to the
    /// bound; the computation must be a pure function of the endpoints
    /// read so the retry converges with concurrent writers.
    async fn update_endpoints_with_retry<F>(
        &self,
        namespace: &str,
        host: &str,
        compute: F,
    ) -> Result<()>
    where
        F: Fn(&[Endpoint]) -> Vec<Endpoint>,
    {
        let api = self.api(namespace);
        let name = record_name(host);

        for attempt in 1..=DNS_RECORD_CONFLICT_RETRIES {
            let Some(mut record) = self.get_record(namespace, host).await? else {
                // Deleted out from under us; the next pass recreates it
                debug!(host, "DNSRecord disappeared during update, skipping");
                return Ok(());
            };

            let desired = compute(&record.spec.endpoints);
            if desired == record.spec.endpoints {
                debug!(host, "DNSRecord endpoints already converged");
                return Ok(());
            }
            record.spec.endpoints = desired;

            match api.replace(&name, &PostParams::default(), &record).await {
                Ok(_) => {
                    info!(
                        host,
                        endpoints = record.spec.endpoints.len(),
                        "Updated DNSRecord endpoints"
                    );
                    return Ok(());
                }
                Err(kube::Error::Api(ae)) if ae.code == 409 => {
                    warn!(
                        host,
                        attempt,
                        "Conflict updating DNSRecord, re-reading and retrying"
                    );
                }
                Err(e) => {
                    return Err(e).context(format!("Failed to update DNSRecord for host {host}"));
                }
            }
        }

        bail!(
            "{KIND_DNS_RECORD} update for host {host} conflicted {DNS_RECORD_CONFLICT_RETRIES} times, requeueing"
        )
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
