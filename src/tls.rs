// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate orchestration.
//!
//! The controller never signs anything itself: it creates [`Certificate`]
//! objects and an external issuer publishes the signed key material as a
//! Secret named deterministically after the host, in the same namespace.
//! A secret existing is treated as ready, because the issuer only
//! publishes after signing; there is no content validation beyond
//! presence.
//!
//! Exactly one Certificate exists per (namespace, host) by construction:
//! the object name is derived from the host. When several traffic
//! resources request the same host the certificate accumulates owner
//! references, so Kubernetes garbage collection only reaps it once every
//! owner is gone.

use crate::crd::{Certificate, CertificateSpec};
use anyhow::{bail, Context, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::{debug, error, info};

/// Deterministic secret (and certificate object) name for a host.
#[must_use]
pub fn secret_name_for_host(host: &str) -> String {
    let lowered = host.to_lowercase();
    match lowered.strip_prefix("*.") {
        Some(rest) => format!("wildcard.{rest}"),
        None => lowered,
    }
}

/// Idempotent issuance and lookup of TLS certificates.
#[derive(Clone)]
pub struct CertificateService {
    client: Client,
    issuer: Option<String>,
}

impl CertificateService {
    /// Create a service requesting certificates from the given issuer.
    #[must_use]
    pub fn new(client: Client, issuer: Option<String>) -> Self {
        Self { client, issuer }
    }

    /// Ensure a Certificate object exists for `host`, owned by `owner`.
    ///
    /// Creating an already existing certificate is a no-op for the caller;
    /// re-invocation with the same owner changes nothing. An existing
    /// certificate gains the new owner reference without losing the ones
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns an error on API failure, or when an object with the derived
    /// name exists but requests a different host (an invariant violation:
    /// the state is left untouched).
    pub async fn ensure(
        &self,
        namespace: &str,
        host: &str,
        owner: Option<OwnerReference>,
    ) -> Result<()> {
        let api: Api<Certificate> = Api::namespaced(self.client.clone(), namespace);
        let name = secret_name_for_host(host);

        match api.get(&name).await {
            Ok(existing) => {
                if existing.spec.host != host {
                    error!(
                        certificate = %name,
                        wanted = host,
                        found = %existing.spec.host,
                        "Certificate name collision across hosts, refusing to write"
                    );
                    bail!(
                        "certificate {name} already requests host {}, cannot also serve {host}",
                        existing.spec.host
                    );
                }
                self.augment_owner(&api, &existing, owner).await
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let certificate = Certificate {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: Some(namespace.to_string()),
                        owner_references: owner.map(|o| vec![o]),
                        ..Default::default()
                    },
                    spec: CertificateSpec {
                        host: host.to_string(),
                        secret_name: name.clone(),
                        issuer: self.issuer.clone(),
                    },
                    status: None,
                };

                match api.create(&PostParams::default(), &certificate).await {
                    Ok(_) => {
                        info!(host, certificate = %name, "Created certificate request");
                        Ok(())
                    }
                    // Lost the create race; treat like it already existed
                    Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
                    Err(e) => {
                        Err(e).context(format!("Failed to create Certificate for host {host}"))
                    }
                }
            }
            Err(e) => Err(e).context(format!("Failed to get Certificate for host {host}")),
        }
    }

    /// Append `owner` to the certificate's owner references if absent.
    async fn augment_owner(
        &self,
        api: &Api<Certificate>,
        existing: &Certificate,
        owner: Option<OwnerReference>,
    ) -> Result<()> {
        let Some(owner) = owner else {
            return Ok(());
        };

        let mut owners = existing
            .metadata
            .owner_references
            .clone()
            .unwrap_or_default();
        if owners.iter().any(|o| o.uid == owner.uid) {
            return Ok(());
        }
        owners.push(owner);

        let name = existing.metadata.name.clone().unwrap_or_default();
        let patch = json!({ "metadata": { "ownerReferences": owners } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .context("Failed to add owner reference to Certificate")?;

        debug!(certificate = %name, "Added owner reference to certificate");
        Ok(())
    }

    /// Fetch the issued TLS secret for `host`.
    ///
    /// `Ok(None)` is the expected answer while issuance is in flight; the
    /// reconciler publishes a Pending condition and requeues.
    ///
    /// # Errors
    ///
    /// Returns an error on any API failure other than 404.
    pub async fn get_secret(&self, namespace: &str, host: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(&secret_name_for_host(host)).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e).context(format!("Failed to get TLS secret for host {host}")),
        }
    }
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tls_tests;
