// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Gateway variant of the traffic accessor.
//!
//! Hostnames and TLS bindings come from the Gateway spec listeners. DNS
//! targets come from the per-cluster gateway statuses the data-plane agents
//! publish as annotations on the hub copy: each agent writes
//! `crossgate.firestoned.io/status-<cluster-id>` with a JSON document
//! carrying its local addresses and per-listener attached route counts.
//! Aggregating those documents here is what turns one hub Gateway into a
//! multi-cluster endpoint set.

use crate::labels::CLUSTER_STATUS_ANNOTATION_PREFIX;
use crate::traffic::{is_valid_hostname, Target, TlsConfig, TrafficError};
use gateway_api::apis::standard::gateways::{
    Gateway, GatewayListenersTls, GatewayListenersTlsCertificateRefs, GatewayListenersTlsMode,
};
use k8s_openapi::api::core::v1::Secret;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One address reported by a cluster-local gateway.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAddress {
    /// Address type as reported by the data plane (IPAddress, Hostname)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    /// The address value
    pub value: String,
}

/// Per-listener status reported by a cluster-local gateway.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterListenerStatus {
    /// Listener name, matching the spec listener
    pub name: String,
    /// Number of routes attached to the listener in that cluster
    #[serde(default)]
    pub attached_routes: i32,
}

/// The status document one data-plane cluster publishes for a Gateway.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGatewayStatus {
    /// Addresses the cluster's ingress data plane answers on
    #[serde(default)]
    pub addresses: Vec<ClusterAddress>,
    /// Per-listener attachment state
    #[serde(default)]
    pub listeners: Vec<ClusterListenerStatus>,
}

impl ClusterGatewayStatus {
    /// Whether any listener in this cluster has at least one attached route.
    #[must_use]
    pub fn has_attached_routes(&self) -> bool {
        self.listeners.iter().any(|l| l.attached_routes > 0)
    }
}

/// Annotation key under which a cluster publishes its gateway status.
#[must_use]
pub fn cluster_status_annotation_key(cluster_id: &str) -> String {
    format!("{CLUSTER_STATUS_ANNOTATION_PREFIX}-{cluster_id}")
}

/// Deduplicated listener hostnames, validated.
pub fn hostnames(gateway: &Gateway) -> Result<Vec<String>, TrafficError> {
    let mut hosts = Vec::new();
    for listener in &gateway.spec.listeners {
        let Some(hostname) = &listener.hostname else {
            // Hostname-less listeners cannot receive DNS or TLS
            continue;
        };
        if !is_valid_hostname(hostname) {
            return Err(TrafficError::InvalidListener(hostname.clone()));
        }
        if !hosts.contains(hostname) {
            hosts.push(hostname.clone());
        }
    }
    Ok(hosts)
}

/// Whether any listener carries a TLS block.
#[must_use]
pub fn has_tls(gateway: &Gateway) -> bool {
    gateway.spec.listeners.iter().any(|l| l.tls.is_some())
}

/// One [`TlsConfig`] per (hostname, certificate-ref) pair.
pub fn tls_configs(gateway: &Gateway) -> Result<Vec<TlsConfig>, TrafficError> {
    let mut configs = Vec::new();
    for listener in &gateway.spec.listeners {
        let Some(tls) = &listener.tls else {
            continue;
        };
        let Some(hostname) = &listener.hostname else {
            continue;
        };
        let refs = tls.certificate_refs.as_deref().unwrap_or(&[]);
        if refs.is_empty() {
            return Err(TrafficError::MissingSecretRef(hostname.clone()));
        }
        for cert_ref in refs {
            configs.push(TlsConfig {
                hosts: vec![hostname.clone()],
                secret_name: cert_ref.name.clone(),
            });
        }
    }
    Ok(configs)
}

/// Attach `secret` to every listener whose hostname equals `host`.
///
/// Listeners are mutated in place; the listener list is never shortened.
pub fn add_tls(gateway: &mut Gateway, host: &str, secret: &Secret) {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let namespace = gateway.metadata.namespace.clone();

    for listener in &mut gateway.spec.listeners {
        if listener.hostname.as_deref() != Some(host) {
            continue;
        }
        listener.tls = Some(GatewayListenersTls {
            certificate_refs: Some(vec![GatewayListenersTlsCertificateRefs {
                group: Some(String::new()),
                kind: Some("Secret".to_string()),
                name: secret_name.clone(),
                namespace: namespace.clone(),
            }]),
            mode: Some(GatewayListenersTlsMode::Terminate),
            options: None,
        });
    }
}

/// Clear TLS on every listener whose hostname is in `hosts`.
pub fn remove_tls(gateway: &mut Gateway, hosts: &[String]) {
    for listener in &mut gateway.spec.listeners {
        if let Some(hostname) = &listener.hostname {
            if hosts.contains(hostname) {
                listener.tls = None;
            }
        }
    }
}

/// Parse the per-cluster status annotations into (cluster-id, status) pairs.
///
/// Unparseable documents are skipped with a warning rather than failing the
/// whole aggregation; a single misbehaving agent must not block the rest.
fn cluster_statuses(gateway: &Gateway) -> Vec<(String, ClusterGatewayStatus)> {
    let prefix = format!("{CLUSTER_STATUS_ANNOTATION_PREFIX}-");
    let Some(annotations) = &gateway.metadata.annotations else {
        return Vec::new();
    };

    annotations
        .iter()
        .filter_map(|(key, value)| {
            let cluster_id = key.strip_prefix(&prefix)?;
            match serde_json::from_str::<ClusterGatewayStatus>(value) {
                Ok(status) => Some((cluster_id.to_string(), status)),
                Err(e) => {
                    warn!(
                        cluster = cluster_id,
                        error = %e,
                        "Skipping undecodable cluster gateway status annotation"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Aggregate DNS targets across all reporting clusters.
///
/// A cluster whose listeners show zero attached routes contributes nothing
/// this pass; its targets appear once a route attaches.
pub fn dns_targets(gateway: &Gateway) -> Result<Vec<Target>, TrafficError> {
    let mut targets = Vec::new();
    for (cluster_id, status) in cluster_statuses(gateway) {
        if !status.has_attached_routes() {
            continue;
        }
        for address in &status.addresses {
            targets.push(Target::new(&address.value, Some(cluster_id.clone())));
        }
    }
    Ok(targets)
}

/// Whether at least one reporting cluster shows attached routes for a
/// listener carrying `host`.
///
/// Clusters that have not yet published a status neither contribute nor
/// veto; their endpoints simply arrive on a later pass.
#[must_use]
pub fn host_has_attached_routes(gateway: &Gateway, host: &str) -> bool {
    let listener_names: Vec<&str> = gateway
        .spec
        .listeners
        .iter()
        .filter(|l| l.hostname.as_deref() == Some(host))
        .map(|l| l.name.as_str())
        .collect();

    if listener_names.is_empty() {
        return false;
    }

    cluster_statuses(gateway).iter().any(|(_, status)| {
        status
            .listeners
            .iter()
            .any(|l| listener_names.contains(&l.name.as_str()) && l.attached_routes > 0)
    })
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
