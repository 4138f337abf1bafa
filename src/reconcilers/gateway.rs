// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Gateway reconciliation: the hub half of the traffic controller.
//!
//! One pass walks the whole chain for a Gateway: class filter, cluster
//! selection, per-host certificates, secret sync, TLS attachment, sync
//! annotation stamping, DNS materialization and status publication.
//! Missing preconditions (certificate secret not yet issued, no attached
//! routes anywhere) publish a Pending condition and requeue after a short
//! delay instead of erroring; user errors (bad selector, malformed
//! hostname, ambiguous zone) surface through the condition message and are
//! not retried until the spec changes. Writes are idempotent, so an error
//! after a partial write never needs a rollback; the next pass converges.

use crate::constants::{
    CONTROLLER_NAME, PENDING_REQUEUE_DURATION_SECS, REQUEUE_WHEN_PROGRAMMED_SECS,
    SUPPORTED_GATEWAY_CLASSES,
};
use crate::context::Context;
use crate::dns::zones::ZoneResolveError;
use crate::labels::GATEWAY_CLUSTER_LABEL_SELECTOR_ANNOTATION;
use crate::reconcilers::status::{
    conditions_changed, new_condition, upsert_condition, CONDITION_ACCEPTED, CONDITION_PROGRAMMED,
    REASON_PENDING, REASON_PROGRAMMED,
};
use crate::selector::parse_selector;
use crate::sync::apply_sync_annotations_to_meta;
use crate::traffic::Traffic;
use anyhow::{Context as _, Result};
use gateway_api::apis::standard::gateways::Gateway;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether the gateway's class belongs to the controller's supported set.
#[must_use]
pub fn class_is_supported(gateway: &Gateway) -> bool {
    SUPPORTED_GATEWAY_CLASSES.contains(&gateway.spec.gateway_class_name.as_str())
}

/// Accepted=True message.
#[must_use]
pub fn accepted_message() -> String {
    format!("Handled by {CONTROLLER_NAME}")
}

/// Programmed=True message listing the configured clusters.
#[must_use]
pub fn programmed_message(clusters: &[String]) -> String {
    format!(
        "Gateway configured in data plane cluster(s) - [{}]",
        clusters.join(",")
    )
}

/// Reconcile one Gateway on the hub.
///
/// # Errors
///
/// Returns an error only for transient infrastructure failures; the
/// wrapper requeues those with backoff. Awaiting-precondition and
/// user-error outcomes return an `Action` directly.
pub async fn reconcile_gateway(ctx: Arc<Context>, gateway: Gateway) -> Result<Action> {
    let namespace = gateway.namespace().unwrap_or_default();
    let name = gateway.name_any();

    // Class filter: not ours means not an error, and zero writes
    if !class_is_supported(&gateway) {
        debug!(
            gateway = %name,
            class = %gateway.spec.gateway_class_name,
            "Gateway class is not supported, ignoring"
        );
        return Ok(Action::await_change());
    }

    // The hub never withdraws DNS itself; the agents do that per cluster
    // through their finalizers before the delete completes.
    if gateway.metadata.deletion_timestamp.is_some() {
        info!(gateway = %name, "Gateway is deleting, nothing to reconcile");
        return Ok(Action::await_change());
    }

    info!(namespace = %namespace, gateway = %name, "Reconciling Gateway");

    let generation = gateway.metadata.generation;
    let accepted = new_condition(
        CONDITION_ACCEPTED,
        "True",
        CONDITION_ACCEPTED,
        &accepted_message(),
        generation,
    );

    // Cluster selection from the selector annotation. No annotation means
    // no clusters: nothing replicates and no DNS or certificates happen.
    let selector_value = gateway
        .annotations()
        .get(GATEWAY_CLUSTER_LABEL_SELECTOR_ANNOTATION)
        .cloned();

    let clusters = match &selector_value {
        None => Vec::new(),
        Some(value) => match parse_selector(value) {
            Ok(selector) => ctx.clusters.select(&selector).await?,
            Err(e) => {
                warn!(gateway = %name, error = %e, "Invalid cluster selector annotation");
                let programmed = new_condition(
                    CONDITION_PROGRAMMED,
                    "False",
                    REASON_PENDING,
                    &format!("Invalid cluster selector: {e}"),
                    generation,
                );
                publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
                return Ok(Action::await_change());
            }
        },
    };

    if clusters.is_empty() {
        let programmed = new_condition(
            CONDITION_PROGRAMMED,
            "False",
            REASON_PENDING,
            "No clusters match selection",
            generation,
        );
        publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
        debug!(gateway = %name, "Empty cluster selection, not touching certificates or DNS");
        return Ok(Action::await_change());
    }

    let mut traffic = Traffic::Gateway(Box::new(gateway.clone()));
    let hosts = match traffic.hostnames() {
        Ok(hosts) => hosts,
        Err(e) => {
            warn!(gateway = %name, error = %e, "Gateway has an invalid listener");
            let programmed = new_condition(
                CONDITION_PROGRAMMED,
                "False",
                REASON_PENDING,
                &format!("Invalid listener: {e}"),
                generation,
            );
            publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
            return Ok(Action::await_change());
        }
    };

    // Per-host certificates: ensure, then wait for the issued secret
    let owner = traffic.owner_ref();
    let mut secrets: Vec<(String, Secret)> = Vec::with_capacity(hosts.len());
    for host in &hosts {
        ctx.certificates
            .ensure(&namespace, host, owner.clone())
            .await?;

        match ctx.certificates.get_secret(&namespace, host).await? {
            Some(secret) => secrets.push((host.clone(), secret)),
            None => {
                info!(gateway = %name, host = %host, "TLS secret not issued yet, requeueing");
                let programmed = new_condition(
                    CONDITION_PROGRAMMED,
                    "Unknown",
                    REASON_PENDING,
                    "Waiting for controller",
                    generation,
                );
                publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
                return Ok(Action::requeue(Duration::from_secs(
                    PENDING_REQUEUE_DURATION_SECS,
                )));
            }
        }
    }

    // Sync each issued secret to the selected clusters, then attach TLS
    for (host, secret) in &secrets {
        sync_secret_to_clusters(&ctx, secret, &clusters).await?;
        traffic.add_tls(host, secret);
    }

    // Stamp the replication annotations on the gateway itself
    apply_sync_annotations_to_meta(traffic.meta_mut(), &clusters, ctx.sync_mode);

    // DNS materialization for every host with at least one attached route
    let ready_hosts: Vec<String> = hosts
        .iter()
        .filter(|host| traffic.host_ready_for_dns(host))
        .cloned()
        .collect();

    if ready_hosts.is_empty() {
        // Persist TLS attachment and annotations before parking the pass
        write_spec_if_changed(&ctx, &gateway, &traffic).await?;

        info!(gateway = %name, "No listener has attached routes yet, requeueing");
        let programmed = new_condition(
            CONDITION_PROGRAMMED,
            "Unknown",
            REASON_PENDING,
            "Waiting for controller",
            generation,
        );
        publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
        return Ok(Action::requeue(Duration::from_secs(
            PENDING_REQUEUE_DURATION_SECS,
        )));
    }

    for host in &ready_hosts {
        let zone = match ctx.dns.zones().resolve(&namespace, host).await {
            Ok(zone) => zone,
            Err(e) if e.is::<ZoneResolveError>() => {
                warn!(gateway = %name, host = %host, error = %e, "Ambiguous zone resolution");
                let programmed = new_condition(
                    CONDITION_PROGRAMMED,
                    "False",
                    REASON_PENDING,
                    &format!("Zone resolution failed: {e}"),
                    generation,
                );
                publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e),
        };

        let Some(zone) = zone else {
            // Custom domain with user-managed DNS: certificates only
            debug!(host = %host, "Host is outside every managed zone, skipping DNS");
            continue;
        };

        ctx.dns.register_host(&traffic, host, &zone).await?;
        ctx.dns.ensure_endpoints(&traffic, host).await?;
    }

    write_spec_if_changed(&ctx, &gateway, &traffic).await?;

    let programmed = new_condition(
        CONDITION_PROGRAMMED,
        "True",
        REASON_PROGRAMMED,
        &programmed_message(&clusters),
        generation,
    );
    publish_status(&ctx, &gateway, vec![accepted, programmed]).await?;

    info!(
        namespace = %namespace,
        gateway = %name,
        clusters = %clusters.join(","),
        "Gateway programmed"
    );
    Ok(Action::requeue(Duration::from_secs(
        REQUEUE_WHEN_PROGRAMMED_SECS,
    )))
}

/// Copy the sync annotations onto the certificate secret so the external
/// syncer replicates it, writing only when the annotation set changes.
async fn sync_secret_to_clusters(ctx: &Context, secret: &Secret, clusters: &[String]) -> Result<()> {
    let mut updated = secret.clone();
    if !apply_sync_annotations_to_meta(&mut updated.metadata, clusters, ctx.sync_mode) {
        return Ok(());
    }

    let namespace = updated.metadata.namespace.clone().unwrap_or_default();
    let name = updated.metadata.name.clone().unwrap_or_default();
    let api: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);

    info!(secret = %name, "Updating certificate secret sync annotations");
    api.replace(&name, &PostParams::default(), &updated)
        .await
        .context("Failed to update certificate secret annotations")?;
    Ok(())
}

/// Persist the accessor's spec and annotation mutations, skipping the
/// write when nothing changed.
async fn write_spec_if_changed(ctx: &Context, original: &Gateway, traffic: &Traffic) -> Result<()> {
    let Traffic::Gateway(updated) = traffic else {
        return Ok(());
    };

    let unchanged = serde_json::to_value(&original.spec)? == serde_json::to_value(&updated.spec)?
        && original.metadata.annotations == updated.metadata.annotations;
    if unchanged {
        return Ok(());
    }

    let namespace = original.namespace().unwrap_or_default();
    let name = original.name_any();
    let api: Api<Gateway> = Api::namespaced(ctx.client.clone(), &namespace);

    info!(gateway = %name, "Updating Gateway spec and annotations");
    api.replace(&name, &PostParams::default(), updated)
        .await
        .context("Failed to update Gateway")?;
    Ok(())
}

/// Publish status conditions, preserving transition times and skipping
/// the write when nothing the controller reports has changed.
async fn publish_status(ctx: &Context, gateway: &Gateway, desired: Vec<Condition>) -> Result<()> {
    let existing: Vec<Condition> = gateway
        .status
        .as_ref()
        .and_then(|status| status.conditions.clone())
        .unwrap_or_default();

    let mut updated = existing.clone();
    for condition in desired {
        upsert_condition(&mut updated, condition);
    }

    if !conditions_changed(&existing, &updated) {
        return Ok(());
    }

    let namespace = gateway.namespace().unwrap_or_default();
    let name = gateway.name_any();
    let api: Api<Gateway> = Api::namespaced(ctx.client.clone(), &namespace);

    debug!(gateway = %name, "Updating Gateway status conditions");
    api.patch_status(
        &name,
        &PatchParams::default(),
        &Patch::Merge(&json!({ "status": { "conditions": updated } })),
    )
    .await
    .context("Failed to update Gateway status")?;
    Ok(())
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
