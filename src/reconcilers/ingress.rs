// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress reconciliation: the data-plane half of the traffic controller.
//!
//! The agent runs in each workload cluster and observes the Ingress and
//! Secret copies the syncer replicates from the hub. For every host it
//! copies the hub TLS secret into the workload namespace under the
//! deterministic name (= host), attaches TLS locally, and patches the hub
//! DNSRecord with this cluster's load-balancer endpoints. A finalizer
//! blocks deletion until the endpoints have been withdrawn, so no record
//! ever advertises a cluster that stopped serving the host.
//!
//! After any converged sequence of create/update/delete across multiple
//! clusters the record's endpoint set equals the union of the live
//! per-cluster contributions; the agents never need to coordinate.

use crate::constants::PENDING_REQUEUE_DURATION_SECS;
use crate::context::AgentContext;
use crate::labels::TRAFFIC_FINALIZER;
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::traffic::Traffic;
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::PostParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reconcile one synced Ingress in the workload cluster.
///
/// # Errors
///
/// Returns an error for transient failures; the wrapper requeues them
/// with backoff.
pub async fn reconcile_ingress(ctx: Arc<AgentContext>, ingress: Ingress) -> Result<Action> {
    let namespace = ingress.namespace().unwrap_or_default();
    let name = ingress.name_any();
    let mut traffic = Traffic::Ingress(Box::new(ingress.clone()));

    info!(
        namespace = %namespace,
        ingress = %name,
        cluster = %ctx.cluster_id,
        "Reconciling Ingress"
    );

    let hosts = traffic
        .hostnames()
        .map_err(|e| anyhow::anyhow!("Invalid ingress host: {e}"))?;

    // Deletion: withdraw this cluster's endpoints, then release the object
    if traffic.is_deleting() {
        info!(ingress = %name, "Ingress deleting, withdrawing DNS endpoints");
        ctx.dns
            .patch_targets(&namespace, &[], &hosts, &ctx.cluster_id, true)
            .await?;
        remove_finalizer(&ctx.client, &ingress, TRAFFIC_FINALIZER).await?;
        return Ok(Action::await_change());
    }

    // TLS: copy each issued hub secret locally and attach it
    for host in &hosts {
        let Some(hub_secret) = ctx.certificates.get_secret(&namespace, host).await? else {
            info!(host = %host, "TLS secret not available on the hub yet, requeueing");
            return Ok(Action::requeue(Duration::from_secs(
                PENDING_REQUEUE_DURATION_SECS,
            )));
        };

        copy_secret_to_workload(&ctx, &namespace, host, &hub_secret).await?;
        traffic.add_tls(host, &hub_secret);
    }

    // DNS: this cluster's live load-balancer endpoints
    let targets = traffic
        .dns_targets()
        .map_err(|e| anyhow::anyhow!("Failed to read load balancer status: {e}"))?;

    if targets.is_empty() {
        // No live endpoints is the same as leaving: withdraw and unblock deletion
        debug!(ingress = %name, "No load balancer endpoints, withdrawing contribution");
        ctx.dns
            .patch_targets(&namespace, &[], &hosts, &ctx.cluster_id, true)
            .await?;
        remove_finalizer(&ctx.client, &ingress, TRAFFIC_FINALIZER).await?;
    } else {
        ctx.dns
            .patch_targets(&namespace, &targets, &hosts, &ctx.cluster_id, false)
            .await?;
        ensure_finalizer(&ctx.client, &ingress, TRAFFIC_FINALIZER).await?;
    }

    write_ingress_if_changed(&ctx, &ingress, &traffic).await?;

    Ok(Action::await_change())
}

/// Build the local copy of a hub TLS secret for the workload namespace.
///
/// The copy keeps the key material and type but sheds the hub metadata:
/// sync annotations, owner references and the resource version must not
/// leak into the workload cluster. The name is the deterministic per-host
/// secret name, so every cluster converges on the same local object.
fn workload_secret_copy(namespace: &str, host: &str, hub_secret: &Secret) -> Secret {
    let mut copy = hub_secret.clone();
    copy.metadata = ObjectMeta {
        name: Some(crate::tls::secret_name_for_host(host)),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    copy
}

/// Copy the hub TLS secret into the workload namespace under the
/// deterministic name (= host), with create-or-update semantics.
async fn copy_secret_to_workload(
    ctx: &AgentContext,
    namespace: &str,
    host: &str,
    hub_secret: &Secret,
) -> Result<()> {
    let api: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
    let copy = workload_secret_copy(namespace, host, hub_secret);

    match api.create(&PostParams::default(), &copy).await {
        Ok(_) => {
            info!(host = %host, "Copied TLS secret into workload namespace");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            let name = copy.metadata.name.clone().unwrap_or_default();
            let mut existing = api
                .get(&name)
                .await
                .context("Failed to re-read local TLS secret")?;
            existing.data = hub_secret.data.clone();
            api.replace(&name, &PostParams::default(), &existing)
                .await
                .context("Failed to refresh local TLS secret")?;
            debug!(host = %host, "Refreshed local TLS secret from hub");
            Ok(())
        }
        Err(e) => Err(e).context(format!("Failed to copy TLS secret for host {host}")),
    }
}

/// Persist the accessor's TLS mutations, skipping the write on converged
/// passes.
async fn write_ingress_if_changed(
    ctx: &AgentContext,
    original: &Ingress,
    traffic: &Traffic,
) -> Result<()> {
    let Traffic::Ingress(updated) = traffic else {
        return Ok(());
    };

    if serde_json::to_value(&original.spec)? == serde_json::to_value(&updated.spec)? {
        return Ok(());
    }

    let namespace = original.namespace().unwrap_or_default();
    let name = original.name_any();
    let api: Api<Ingress> = Api::namespaced(ctx.client.clone(), &namespace);

    info!(ingress = %name, "Updating Ingress TLS configuration");
    api.replace(&name, &PostParams::default(), updated)
        .await
        .context("Failed to update Ingress")?;
    Ok(())
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
