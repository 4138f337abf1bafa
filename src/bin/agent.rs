// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data-plane agent binary.
//!
//! Runs in each workload cluster. Watches the Ingress copies the syncer
//! replicates from the hub, copies TLS secrets locally, and patches the
//! hub DNSRecords with this cluster's endpoints. The agent identifies
//! itself with the cluster-id stored in the control-plane config secret,
//! which also carries the kubeconfig used to reach the hub.

use anyhow::{bail, Context as AnyhowContext, Result};
use axum::{routing::get, Router};
use crossgate::{
    constants::{
        ERROR_REQUEUE_DURATION_SECS, KIND_INGRESS, METRICS_SERVER_BIND_ADDRESS,
        METRICS_SERVER_PATH, METRICS_SERVER_PORT, RECONCILE_TIMEOUT_SECS, TOKIO_WORKER_THREADS,
    },
    context::AgentContext,
    metrics,
    reconcilers::reconcile_ingress,
};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("crossgate-agent")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging, matching the hub controller's format switches.
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting data-plane traffic agent");
}

/// Start the Prometheus metrics HTTP server.
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Hub connection details recovered from the control-plane config secret.
struct ControlPlaneConfig {
    hub_client: Client,
    cluster_id: String,
}

/// Build the hub client and cluster identity from the control-plane
/// config secret.
///
/// The secret carries a `kubeconfig` key with the hub access config and a
/// `name` key with this cluster's id. A missing or malformed secret is a
/// fatal bootstrap error: the agent exits non-zero rather than run
/// without an identity.
async fn load_control_plane_config(client: &Client) -> Result<ControlPlaneConfig> {
    let secret_name = std::env::var("CROSSGATE_CONTROL_PLANE_SECRET")
        .unwrap_or_else(|_| "control-plane-cluster".to_string());
    let secret_namespace = std::env::var("CROSSGATE_CONTROL_PLANE_SECRET_NAMESPACE")
        .unwrap_or_else(|_| "default".to_string());

    let api: Api<Secret> = Api::namespaced(client.clone(), &secret_namespace);
    let secret = api.get(&secret_name).await.with_context(|| {
        format!("Agent missing control plane config secret {secret_namespace}/{secret_name}")
    })?;

    let Some(data) = &secret.data else {
        bail!("Control plane config secret {secret_namespace}/{secret_name} has no data");
    };

    let kubeconfig_bytes = data
        .get("kubeconfig")
        .context("Control plane config secret has no kubeconfig key")?;
    let kubeconfig_yaml = String::from_utf8(kubeconfig_bytes.0.clone())
        .context("Control plane kubeconfig is not UTF-8")?;

    let cluster_id = data
        .get("name")
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
        .context("Control plane config secret has no name key")?;

    let kubeconfig =
        Kubeconfig::from_yaml(&kubeconfig_yaml).context("Failed to parse hub kubeconfig")?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Failed to build hub client config")?;
    let hub_client = Client::try_from(config).context("Failed to build hub client")?;

    Ok(ControlPlaneConfig {
        hub_client,
        cluster_id,
    })
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let client = Client::try_default().await?;
    let control = load_control_plane_config(&client).await?;

    info!(cluster = %control.cluster_id, "Agent identity loaded from control plane secret");

    let ctx = Arc::new(AgentContext::new(
        client.clone(),
        control.hub_client,
        control.cluster_id,
    ));

    let _metrics_handle = start_metrics_server();

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                // On non-Unix platforms, just wait forever
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }

        result = run_ingress_controller(ctx) => {
            error!("CRITICAL: Ingress controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Ingress controller exited unexpectedly without error")
        }
    };

    shutdown_result?;
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Run the Ingress controller.
async fn run_ingress_controller(ctx: Arc<AgentContext>) -> Result<()> {
    info!("Starting Ingress controller");

    let api = Api::<Ingress>::all(ctx.client.clone());

    // The load-balancer status is the DNS source of truth, so status
    // updates must trigger reconciliation; no semantic filtering here.
    Controller::new(api, Config::default())
        .run(reconcile_ingress_wrapper, error_policy_ingress, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Ingress`
async fn reconcile_ingress_wrapper(
    ingress: Arc<Ingress>,
    ctx: Arc<AgentContext>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        ingress = %ingress.name_any(),
        namespace = ?ingress.namespace(),
        "Reconcile wrapper called for Ingress"
    );

    // Per-pass deadline: crossing it aborts and surfaces as retryable.
    let result = tokio::time::timeout(
        Duration::from_secs(RECONCILE_TIMEOUT_SECS),
        reconcile_ingress(ctx, (*ingress).clone()),
    )
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("Reconcile pass exceeded deadline")));
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_INGRESS, duration);
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile Ingress {}: {}", ingress.name_any(), e);
            metrics::record_reconciliation_error(KIND_INGRESS, duration);
            metrics::record_error(KIND_INGRESS, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Error policy for the Ingress controller.
fn error_policy_ingress(
    _resource: Arc<Ingress>,
    _err: &ReconcileError,
    _ctx: Arc<AgentContext>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
