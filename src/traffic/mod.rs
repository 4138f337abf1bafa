// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Uniform façade over the two traffic resource variants.
//!
//! The controller manages two kinds of user intent: Gateway API `Gateway`
//! objects on the hub and core `Ingress` objects in the data-plane
//! clusters. [`Traffic`] is a tagged variant exposing the capability set
//! both reconcilers program against: hostnames, TLS listener mutation, DNS
//! targets and identity. There are no downcasts anywhere; behavior that
//! only one variant supports fails with [`TrafficError::Unsupported`], and
//! [`Traffic::exposes_own_controller`] selects between the hub and agent
//! flows explicitly.

pub mod gateway;
pub mod ingress;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use thiserror::Error;

pub use gateway::{cluster_status_annotation_key, ClusterAddress, ClusterGatewayStatus, ClusterListenerStatus};

/// Errors surfaced by the traffic accessor.
#[derive(Debug, Error)]
pub enum TrafficError {
    /// A listener or rule carries a malformed hostname
    #[error("invalid listener hostname {0:?}")]
    InvalidListener(String),

    /// A TLS block references no secret
    #[error("TLS block for host {0:?} references no secret")]
    MissingSecretRef(String),

    /// The operation is not defined for this variant
    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        /// Name of the unsupported operation
        operation: &'static str,
        /// Variant the operation was invoked on
        kind: &'static str,
    },
}

/// Classification of a DNS traffic target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetType {
    /// An IPv4/IPv6 address, materialized as A-record rdata
    Ip,
    /// A hostname, materialized as CNAME rdata
    Hostname,
}

/// A single traffic target extracted from a resource's live status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// IP or hostname
    pub target_type: TargetType,
    /// The address or hostname value
    pub value: String,
    /// Cluster the target was reported from, when known
    pub cluster_id: Option<String>,
    /// Weight override; equal weights apply when absent
    pub weight: Option<i64>,
}

impl Target {
    /// Build a target, classifying the value as IP or hostname.
    #[must_use]
    pub fn new(value: &str, cluster_id: Option<String>) -> Self {
        let target_type = if value.parse::<std::net::IpAddr>().is_ok() {
            TargetType::Ip
        } else {
            TargetType::Hostname
        };
        Self {
            target_type,
            value: value.to_string(),
            cluster_id,
            weight: None,
        }
    }
}

/// One TLS binding extracted from a traffic resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsConfig {
    /// Hostnames covered by the secret
    pub hosts: Vec<String>,
    /// Name of the secret holding the key material
    pub secret_name: String,
}

/// Validate a hostname: DNS labels of 1-63 alphanumeric/hyphen characters,
/// no leading or trailing hyphen, 253 characters total. A single leading
/// `*` label is accepted for wildcard listeners.
#[must_use]
pub fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    let mut labels = host.split('.').peekable();
    let mut first = true;
    while let Some(label) = labels.next() {
        if first && label == "*" && labels.peek().is_some() {
            first = false;
            continue;
        }
        first = false;
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }
    true
}

/// A traffic resource the controller manages: a Gateway on the hub or an
/// Ingress in a data-plane cluster.
#[derive(Clone, Debug)]
pub enum Traffic {
    /// Gateway API variant (hub)
    Gateway(Box<gateway_api::apis::standard::gateways::Gateway>),
    /// Core Ingress variant (data plane)
    Ingress(Box<Ingress>),
}

impl Traffic {
    /// Kind tag of the wrapped resource.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Traffic::Gateway(_) => "Gateway",
            Traffic::Ingress(_) => "Ingress",
        }
    }

    /// Object metadata of the wrapped resource.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Traffic::Gateway(gw) => &gw.metadata,
            Traffic::Ingress(ing) => &ing.metadata,
        }
    }

    /// Mutable object metadata, used for annotation and finalizer stamping.
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Traffic::Gateway(gw) => &mut gw.metadata,
            Traffic::Ingress(ing) => &mut ing.metadata,
        }
    }

    /// Resource name.
    #[must_use]
    pub fn name(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }

    /// Resource namespace.
    #[must_use]
    pub fn namespace(&self) -> String {
        self.meta().namespace.clone().unwrap_or_default()
    }

    /// Informer-style cache key: `namespace/name`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    /// Whether the resource is being deleted.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    /// Owner reference pointing at the wrapped resource.
    ///
    /// Returns `None` when the resource has not been persisted yet (no UID).
    #[must_use]
    pub fn owner_ref(&self) -> Option<OwnerReference> {
        let meta = self.meta();
        let (api_version, kind) = match self {
            Traffic::Gateway(_) => ("gateway.networking.k8s.io/v1", "Gateway"),
            Traffic::Ingress(_) => ("networking.k8s.io/v1", "Ingress"),
        };
        Some(OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: meta.name.clone()?,
            uid: meta.uid.clone()?,
            controller: Some(false),
            block_owner_deletion: None,
        })
    }

    /// Deduplicated hostnames across all listeners/rules.
    ///
    /// # Errors
    ///
    /// Fails with [`TrafficError::InvalidListener`] when a hostname is
    /// malformed.
    pub fn hostnames(&self) -> Result<Vec<String>, TrafficError> {
        match self {
            Traffic::Gateway(gw) => gateway::hostnames(gw),
            Traffic::Ingress(ing) => ingress::hostnames(ing),
        }
    }

    /// Whether any listener carries a TLS block.
    #[must_use]
    pub fn has_tls(&self) -> bool {
        match self {
            Traffic::Gateway(gw) => gateway::has_tls(gw),
            Traffic::Ingress(ing) => ingress::has_tls(ing),
        }
    }

    /// One [`TlsConfig`] per (hostname, certificate-ref) pair.
    ///
    /// # Errors
    ///
    /// Fails with [`TrafficError::MissingSecretRef`] when a TLS block lacks
    /// a secret reference.
    pub fn tls_configs(&self) -> Result<Vec<TlsConfig>, TrafficError> {
        match self {
            Traffic::Gateway(gw) => gateway::tls_configs(gw),
            Traffic::Ingress(ing) => ingress::tls_configs(ing),
        }
    }

    /// Attach `secret` as TLS material for every listener matching `host`.
    ///
    /// Unknown hosts are a no-op; re-attaching the same secret is a no-op.
    /// Listeners are never dropped by this mutation.
    pub fn add_tls(&mut self, host: &str, secret: &Secret) {
        match self {
            Traffic::Gateway(gw) => gateway::add_tls(gw, host, secret),
            Traffic::Ingress(ing) => ingress::add_tls(ing, host, secret),
        }
    }

    /// Clear TLS configuration for the given hosts.
    ///
    /// Matching listeners/rules survive without TLS; nothing else changes.
    pub fn remove_tls(&mut self, hosts: &[String]) {
        match self {
            Traffic::Gateway(gw) => gateway::remove_tls(gw, hosts),
            Traffic::Ingress(ing) => ingress::remove_tls(ing, hosts),
        }
    }

    /// Synthesize a rule for a controller-issued managed host.
    ///
    /// Only defined for the Ingress variant.
    ///
    /// # Errors
    ///
    /// Fails with [`TrafficError::Unsupported`] on a Gateway and
    /// [`TrafficError::InvalidListener`] when the host is malformed.
    pub fn add_managed_host(&mut self, host: &str) -> Result<(), TrafficError> {
        match self {
            Traffic::Gateway(_) => Err(TrafficError::Unsupported {
                operation: "addManagedHost",
                kind: "Gateway",
            }),
            Traffic::Ingress(ing) => ingress::add_managed_host(ing, host),
        }
    }

    /// Traffic targets aggregated from the resource's live status.
    ///
    /// For a Gateway these come from the per-cluster statuses the agents
    /// publish; clusters whose listeners have no attached routes contribute
    /// nothing. For an Ingress they come from the local load-balancer
    /// status and carry no cluster-id (the agent supplies its own).
    ///
    /// # Errors
    ///
    /// Fails when a published cluster status cannot be decoded.
    pub fn dns_targets(&self) -> Result<Vec<Target>, TrafficError> {
        match self {
            Traffic::Gateway(gw) => gateway::dns_targets(gw),
            Traffic::Ingress(ing) => Ok(ingress::dns_targets(ing)),
        }
    }

    /// Whether `host` is ready for DNS materialization.
    ///
    /// A Gateway host qualifies once at least one reporting cluster shows
    /// `attachedRoutes > 0` for a listener carrying it. An Ingress host
    /// qualifies as soon as a rule declares it.
    #[must_use]
    pub fn host_ready_for_dns(&self, host: &str) -> bool {
        match self {
            Traffic::Gateway(gw) => gateway::host_has_attached_routes(gw, host),
            Traffic::Ingress(ing) => ingress::has_rule_for_host(ing, host),
        }
    }

    /// Whether this variant runs its own data-plane controller.
    ///
    /// Selects the agent flow (Ingress) over the hub flow (Gateway).
    #[must_use]
    pub fn exposes_own_controller(&self) -> bool {
        match self {
            Traffic::Gateway(_) => false,
            Traffic::Ingress(_) => true,
        }
    }
}
