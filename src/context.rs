// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context handed to the controllers.
//!
//! The hub controller and the data-plane agent assemble different
//! contexts: the hub talks to one cluster only, while the agent holds a
//! local client for the workload cluster next to a hub client for the
//! control plane, and knows which cluster-id it contributes endpoints
//! under.

use crate::cluster::ClusterRegistry;
use crate::dns::DnsService;
use crate::sync::SyncMode;
use crate::tls::CertificateService;
use kube::Client;

/// Context for the hub Gateway controller.
#[derive(Clone)]
pub struct Context {
    /// Client for the hub cluster
    pub client: Client,
    /// DNS record materialization service
    pub dns: DnsService,
    /// Certificate issuance service
    pub certificates: CertificateService,
    /// Registry of data-plane clusters
    pub clusters: ClusterRegistry,
    /// Replication annotation mode
    pub sync_mode: SyncMode,
}

impl Context {
    /// Assemble the hub context from a client and the control namespace.
    #[must_use]
    pub fn new(client: Client, control_namespace: &str, sync_mode: SyncMode) -> Self {
        let zones = crate::dns::zones::ZoneRegistry::new(client.clone())
            .with_global_namespace(control_namespace);
        Self {
            dns: DnsService::with_registry(client.clone(), zones),
            certificates: CertificateService::new(client.clone(), None),
            clusters: ClusterRegistry::new(client.clone(), control_namespace),
            client,
            sync_mode,
        }
    }
}

/// Context for the data-plane Ingress agent.
#[derive(Clone)]
pub struct AgentContext {
    /// Client for the local workload cluster
    pub client: Client,
    /// Client for the hub control plane
    pub hub_client: Client,
    /// This cluster's id, used as the DNS endpoint set identifier
    pub cluster_id: String,
    /// DNS record service writing through the hub
    pub dns: DnsService,
    /// Certificate service reading secrets from the hub
    pub certificates: CertificateService,
}

impl AgentContext {
    /// Assemble the agent context from the local and hub clients.
    #[must_use]
    pub fn new(client: Client, hub_client: Client, cluster_id: String) -> Self {
        Self {
            dns: DnsService::new(hub_client.clone()),
            certificates: CertificateService::new(hub_client.clone(), None),
            client,
            hub_client,
            cluster_id,
        }
    }
}
