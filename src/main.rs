// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hub controller binary.
//!
//! Runs the Gateway controller, the Ingress admission webhook and the
//! Prometheus metrics server, optionally behind leader election.

use anyhow::Result;
use axum::{routing::get, Router};
use crossgate::{
    admission,
    constants::{
        DEFAULT_CONTROL_NAMESPACE, DEFAULT_LEASE_DURATION_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS,
        ERROR_REQUEUE_DURATION_SECS, KIND_GATEWAY, METRICS_SERVER_BIND_ADDRESS,
        METRICS_SERVER_PATH, METRICS_SERVER_PORT, RECONCILE_TIMEOUT_SECS, TOKIO_WORKER_THREADS,
    },
    context::Context,
    crd::{Certificate, DNSRecord, ManagedZone, ManagedZoneSpec},
    metrics,
    reconcilers::reconcile_gateway,
    sync::SyncMode,
};
use futures::StreamExt;
use gateway_api::apis::standard::gateways::Gateway;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::PostParams,
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use kube_lease_manager::LeaseManagerBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("crossgate-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
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

    info!("Starting multi-cluster traffic controller");
}

/// Start the Prometheus metrics HTTP server
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

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

/// Leader election configuration
struct LeaderElectionConfig {
    enabled: bool,
    lease_name: String,
    lease_namespace: String,
    identity: String,
    lease_duration: u64,
    retry_period: u64,
}

/// Load leader election configuration from environment variables
fn load_leader_election_config(control_namespace: &str) -> LeaderElectionConfig {
    let enabled = std::env::var("CROSSGATE_ENABLE_LEADER_ELECTION")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let lease_name =
        std::env::var("CROSSGATE_LEASE_NAME").unwrap_or_else(|_| "crossgate-leader".to_string());

    let lease_namespace = std::env::var("CROSSGATE_LEASE_NAMESPACE")
        .or_else(|_| std::env::var("POD_NAMESPACE"))
        .unwrap_or_else(|_| control_namespace.to_string());

    let lease_duration = std::env::var("CROSSGATE_LEASE_DURATION_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_DURATION_SECS);

    let retry_period = std::env::var("CROSSGATE_LEASE_RETRY_PERIOD_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_LEASE_RETRY_PERIOD_SECS);

    let identity = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("crossgate-{}", rand::random::<u32>()));

    LeaderElectionConfig {
        enabled,
        lease_name,
        lease_namespace,
        identity,
        lease_duration,
        retry_period,
    }
}

/// The control namespace holding cluster credentials and webhook infra.
fn control_namespace() -> String {
    std::env::var("CROSSGATE_CONTROL_NAMESPACE")
        .unwrap_or_else(|_| DEFAULT_CONTROL_NAMESPACE.to_string())
}

/// Replication mode from the environment.
fn sync_mode() -> SyncMode {
    let wildcard = std::env::var("CROSSGATE_SYNC_WILDCARD")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);
    if wildcard {
        SyncMode::Wildcard
    } else {
        SyncMode::Selected
    }
}

/// Seed the env-configured default zone into the control namespace.
///
/// `ZONE_ROOT_DOMAIN` names the zone, `AWS_DNS_PUBLIC_ZONE_ID` (or the
/// equivalent for other providers) carries the provider handle. An
/// already existing zone is left untouched.
async fn seed_default_zone(client: &Client, namespace: &str) -> Result<()> {
    let Ok(root_domain) = std::env::var("ZONE_ROOT_DOMAIN") else {
        debug!("ZONE_ROOT_DOMAIN not set, no default zone to seed");
        return Ok(());
    };
    let zone_id = std::env::var("AWS_DNS_PUBLIC_ZONE_ID").ok();

    let api: Api<ManagedZone> = Api::namespaced(client.clone(), namespace);
    let name = root_domain.replace('.', "-");

    if api.get(&name).await.is_ok() {
        debug!(zone = %name, "Default zone already present");
        return Ok(());
    }

    let zone = ManagedZone {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: ManagedZoneSpec {
            root_domain,
            id: zone_id,
            default: true,
            description: Some("Seeded from environment".to_string()),
        },
        status: None,
    };

    api.create(&PostParams::default(), &zone).await?;
    info!(zone = %name, "Seeded default managed zone from environment");
    Ok(())
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let client = Client::try_default().await?;
    let namespace = control_namespace();

    // Fatal bootstrap: a controller that cannot see its zones must not run
    let ctx = Arc::new(Context::new(client.clone(), &namespace, sync_mode()));
    seed_default_zone(&client, &namespace).await?;
    let zones = ctx.dns.zones().list(&namespace).await?;
    info!(count = zones.len(), "Managed zone registry loaded");

    // Webhook: mint the serving certificate, publish the CA bundle, serve
    let serving_cert = admission::generate_serving_cert(&namespace)?;
    admission::ensure_webhook_config(&client, &namespace, &serving_cert.cert_pem).await?;
    let webhook_state = Arc::new(admission::WebhookState::new(client.clone(), &namespace));
    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = admission::run_webhook_server(webhook_state, &serving_cert).await {
            error!("Webhook server exited: {e:?}");
        }
    });

    let _metrics_handle = start_metrics_server();

    let config = load_leader_election_config(&namespace);

    if config.enabled {
        info!(
            lease_name = %config.lease_name,
            lease_namespace = %config.lease_namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration,
            "Leader election enabled"
        );

        info!("Starting leader election, waiting to acquire leadership...");

        let lease_manager = LeaseManagerBuilder::new(client.clone(), &config.lease_name)
            .with_namespace(&config.lease_namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration)
            .with_grace(config.retry_period)
            .build()
            .await?;

        let (leader_rx, _lease_handle) = lease_manager.watch().await;

        let mut rx = leader_rx.clone();
        while !*rx.borrow_and_update() {
            rx.changed().await?;
        }

        metrics::record_leader_elected(&config.identity);
        info!("Leadership acquired, starting controllers");

        run_with_shutdown(ctx, Some((leader_rx, config.identity))).await?;
    } else {
        warn!("Leader election DISABLED - running without high availability");
        run_with_shutdown(ctx, None).await?;
    }

    webhook_handle.abort();
    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Monitor leadership status - returns when leadership is lost or an error occurs
async fn monitor_leadership(
    mut leader_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), anyhow::Error> {
    loop {
        leader_rx.changed().await?;
        if !*leader_rx.borrow() {
            // Leadership lost
            return Ok(());
        }
    }
}

/// Run the controllers with signal handling and optional leadership
/// monitoring.
async fn run_with_shutdown(
    ctx: Arc<Context>,
    leadership: Option<(tokio::sync::watch::Receiver<bool>, String)>,
) -> Result<()> {
    let (leader_rx, identity) = match leadership {
        Some((rx, identity)) => (Some(rx), identity),
        None => (None, String::new()),
    };

    let shutdown_result: Result<()> = tokio::select! {
        // Monitor for SIGINT (Ctrl+C)
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        // Monitor for SIGTERM (Kubernetes sends this when deleting pods)
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

        // Monitor leadership - if lost, stop all controllers
        result = async {
            match leader_rx {
                Some(rx) => monitor_leadership(rx).await,
                None => std::future::pending().await,
            }
        } => {
            match result {
                Ok(()) => {
                    metrics::record_leader_lost(&identity);
                    warn!("Leadership lost! Stopping all controllers...");
                    anyhow::bail!("Leadership lost - stepping down")
                }
                Err(e) => {
                    error!("Leadership monitor error: {:?}", e);
                    anyhow::bail!("Leadership monitoring failed: {e}")
                }
            }
        }

        // Run the Gateway controller
        result = run_gateway_controller(ctx) => {
            error!("CRITICAL: Gateway controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Gateway controller exited unexpectedly without error")
        }
    };

    shutdown_result
}

/// Run the Gateway controller
async fn run_gateway_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Gateway controller");

    let api = Api::<Gateway>::all(ctx.client.clone());
    let records = Api::<DNSRecord>::all(ctx.client.clone());
    let certificates = Api::<Certificate>::all(ctx.client.clone());

    // Only spec changes trigger reconciliation; status-only updates are
    // filtered to keep our own status writes from looping the controller.
    let watcher_config = Config::default().any_semantic();

    Controller::new(api, watcher_config)
        .owns(records, Config::default())
        .owns(certificates, Config::default())
        .run(reconcile_gateway_wrapper, error_policy_gateway, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Gateway`
async fn reconcile_gateway_wrapper(
    gateway: Arc<Gateway>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = std::time::Instant::now();

    debug!(
        gateway = %gateway.name_any(),
        namespace = ?gateway.namespace(),
        "Reconcile wrapper called for Gateway"
    );

    // Per-pass deadline: crossing it aborts without a status write and
    // surfaces as a retryable failure.
    let result = tokio::time::timeout(
        Duration::from_secs(RECONCILE_TIMEOUT_SECS),
        reconcile_gateway(ctx, (*gateway).clone()),
    )
    .await
    .unwrap_or_else(|_| Err(anyhow::anyhow!("Reconcile pass exceeded deadline")));
    let duration = start.elapsed();

    match result {
        Ok(action) => {
            metrics::record_reconciliation_success(KIND_GATEWAY, duration);
            Ok(action)
        }
        Err(e) => {
            error!("Failed to reconcile Gateway {}: {}", gateway.name_any(), e);
            metrics::record_reconciliation_error(KIND_GATEWAY, duration);
            metrics::record_error(KIND_GATEWAY, "reconcile_error");
            Err(e.into())
        }
    }
}

/// Error policy for the Gateway controller.
///
/// Requeues the resource after a fixed delay; transient errors clear on a
/// later pass because every write is idempotent.
fn error_policy_gateway(
    _resource: Arc<Gateway>,
    _err: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}
