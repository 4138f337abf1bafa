// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of data-plane clusters known to the hub.
//!
//! Every workload cluster is represented by a credential `Secret` in the
//! control namespace, labelled with
//! `crossgate.firestoned.io/cluster-credentials: "true"`. The secret's
//! `name` data key holds the cluster-id the agents identify themselves
//! with, and the secret's labels are what the
//! `kuadrant.io/gateway-cluster-label-selector` annotation selects over.
//!
//! Cluster discovery is deliberately static in this revision: the registry
//! is the open extension point for dynamic membership.

use crate::labels::CLUSTER_CREDENTIALS_LABEL;
use crate::selector::LabelSelector;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

/// A registered data-plane cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterRef {
    /// The cluster-id agents use as their DNS endpoint set identifier.
    pub id: String,
    /// Labels of the credential secret, matched against cluster selectors.
    pub labels: BTreeMap<String, String>,
}

/// Catalog of the data-plane clusters a resource may replicate to.
#[derive(Clone)]
pub struct ClusterRegistry {
    client: Client,
    namespace: String,
}

impl ClusterRegistry {
    /// Create a registry reading credential secrets from `namespace`.
    #[must_use]
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    /// List every registered cluster.
    ///
    /// The cluster-id comes from the secret's `name` data key, falling back
    /// to the secret's own name when the key is absent or not UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error when the credential secrets cannot be listed.
    pub async fn list(&self) -> Result<Vec<ClusterRef>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let params = ListParams::default().labels(&format!("{CLUSTER_CREDENTIALS_LABEL}=true"));

        let secrets = api
            .list(&params)
            .await
            .context("Failed to list cluster credential secrets")?;

        let mut clusters: Vec<ClusterRef> = secrets
            .items
            .iter()
            .map(|secret| {
                let id = secret
                    .data
                    .as_ref()
                    .and_then(|data| data.get("name"))
                    .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
                    .unwrap_or_else(|| secret.name_any());
                ClusterRef {
                    id,
                    labels: secret.labels().clone(),
                }
            })
            .collect();

        // Stable ordering keeps annotation stamping and status messages deterministic
        clusters.sort_by(|a, b| a.id.cmp(&b.id));
        clusters.dedup_by(|a, b| a.id == b.id);

        debug!(count = clusters.len(), "Listed registered clusters");
        Ok(clusters)
    }

    /// Return the ids of the clusters whose labels satisfy `selector`.
    ///
    /// An empty selection is not an error; the caller publishes
    /// `Programmed=False` and stops.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry cannot be listed.
    pub async fn select(&self, selector: &LabelSelector) -> Result<Vec<String>> {
        let clusters = self.list().await?;
        Ok(clusters
            .into_iter()
            .filter(|cluster| selector.matches(&cluster.labels))
            .map(|cluster| cluster.id)
            .collect())
    }
}
