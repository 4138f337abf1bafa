// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed-zone registry and host-to-zone resolution.
//!
//! `ManagedZone` resources are created administratively and consulted
//! read-only here. Resolution picks the zone whose root domain is the
//! longest suffix of the hostname; among equally specific zones the default
//! zone wins, and with no default the resolution fails deterministically.
//!
//! A host matching no zone at all is not an error: custom domains with
//! user-managed DNS still get certificates, they just skip record
//! materialization.

use crate::crd::ManagedZone;
use anyhow::{Context, Result};
use kube::api::ListParams;
use kube::{Api, Client};
use thiserror::Error;

/// Errors produced by host-to-zone resolution.
#[derive(Debug, Error)]
pub enum ZoneResolveError {
    /// Several zones share the longest matching suffix and none is default
    #[error("host {host:?} matches {count} zones for suffix {suffix:?} and none is default")]
    AmbiguousZone {
        /// The host being resolved
        host: String,
        /// The contested root domain
        suffix: String,
        /// How many zones claim it
        count: usize,
    },
}

/// Whether `root_domain` is a domain suffix of `host`.
///
/// Matches whole labels only: `example.com` covers `app.example.com` and
/// `example.com` itself, but not `notexample.com`.
#[must_use]
pub fn zone_matches_host(root_domain: &str, host: &str) -> bool {
    let host = host.strip_prefix("*.").unwrap_or(host);
    host == root_domain || host.ends_with(&format!(".{root_domain}"))
}

/// Resolve `host` against a zone list.
///
/// Returns `Ok(None)` when no zone matches (the host proceeds without DNS
/// materialization).
///
/// # Errors
///
/// Returns [`ZoneResolveError::AmbiguousZone`] when several zones tie on
/// the longest suffix and none carries `default: true`.
pub fn resolve_zone<'a>(
    host: &str,
    zones: &'a [ManagedZone],
) -> Result<Option<&'a ManagedZone>, ZoneResolveError> {
    let longest = zones
        .iter()
        .filter(|zone| zone_matches_host(&zone.spec.root_domain, host))
        .map(|zone| zone.spec.root_domain.len())
        .max();

    let Some(longest) = longest else {
        return Ok(None);
    };

    let candidates: Vec<&ManagedZone> = zones
        .iter()
        .filter(|zone| {
            zone.spec.root_domain.len() == longest
                && zone_matches_host(&zone.spec.root_domain, host)
        })
        .collect();

    match candidates.as_slice() {
        [single] => Ok(Some(*single)),
        several => several
            .iter()
            .find(|zone| zone.spec.default)
            .copied()
            .map(Some)
            .ok_or_else(|| ZoneResolveError::AmbiguousZone {
                host: host.to_string(),
                suffix: candidates[0].spec.root_domain.clone(),
                count: candidates.len(),
            }),
    }
}

/// Catalog of the DNS zones the controller is authoritative for.
#[derive(Clone)]
pub struct ZoneRegistry {
    client: Client,
    global_namespace: Option<String>,
}

impl ZoneRegistry {
    /// Create a registry backed by the given client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            global_namespace: None,
        }
    }

    /// Also consult `namespace` on every lookup.
    ///
    /// Zones administered centrally (e.g. the env-seeded default zone in
    /// the control namespace) are visible to every tenant; a tenant zone
    /// with the same name shadows the global one.
    #[must_use]
    pub fn with_global_namespace(mut self, namespace: &str) -> Self {
        self.global_namespace = Some(namespace.to_string());
        self
    }

    /// List the managed zones visible in `namespace`, including the
    /// globally administered ones.
    ///
    /// # Errors
    ///
    /// Returns an error when the zones cannot be listed; at process startup
    /// this is fatal (the controller refuses to run blind).
    pub async fn list(&self, namespace: &str) -> Result<Vec<ManagedZone>> {
        let api: Api<ManagedZone> = Api::namespaced(self.client.clone(), namespace);
        let mut zones = api
            .list(&ListParams::default())
            .await
            .context("Failed to list ManagedZones")?
            .items;

        if let Some(global) = &self.global_namespace {
            if global != namespace {
                let api: Api<ManagedZone> = Api::namespaced(self.client.clone(), global);
                let global_zones = api
                    .list(&ListParams::default())
                    .await
                    .context("Failed to list global ManagedZones")?
                    .items;
                for zone in global_zones {
                    let shadowed = zones
                        .iter()
                        .any(|existing| existing.metadata.name == zone.metadata.name);
                    if !shadowed {
                        zones.push(zone);
                    }
                }
            }
        }

        Ok(zones)
    }

    /// Resolve `host` to a zone in `namespace`.
    ///
    /// # Errors
    ///
    /// Propagates listing failures and [`ZoneResolveError::AmbiguousZone`].
    pub async fn resolve(&self, namespace: &str, host: &str) -> Result<Option<ManagedZone>> {
        let zones = self.list(namespace).await?;
        let resolved = resolve_zone(host, &zones)?;
        Ok(resolved.cloned())
    }

    /// The namespace default zone, if one is declared.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub async fn default_zone(&self, namespace: &str) -> Result<Option<ManagedZone>> {
        let zones = self.list(namespace).await?;
        Ok(zones.into_iter().find(|zone| zone.spec.default))
    }
}

#[cfg(test)]
#[path = "zones_tests.rs"]
mod zones_tests;
