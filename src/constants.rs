// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the crossgate operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all crossgate CRDs
pub const API_GROUP: &str = "crossgate.firestoned.io";

/// API version for all crossgate CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "crossgate.firestoned.io/v1alpha1";

/// Kind name for the `ManagedZone` resource
pub const KIND_MANAGED_ZONE: &str = "ManagedZone";

/// Kind name for the `DNSRecord` resource
pub const KIND_DNS_RECORD: &str = "DNSRecord";

/// Kind name for the `Certificate` resource
pub const KIND_CERTIFICATE: &str = "Certificate";

/// Kind name for the Gateway API `Gateway` resource
pub const KIND_GATEWAY: &str = "Gateway";

/// Kind name for the core `Ingress` resource
pub const KIND_INGRESS: &str = "Ingress";

// ============================================================================
// Gateway Class Constants
// ============================================================================

/// Gateway classes this controller reconciles.
///
/// A Gateway whose `gatewayClassName` is not in this set is ignored entirely;
/// ignoring it is not an error and produces no writes.
pub const SUPPORTED_GATEWAY_CLASSES: &[&str] = &["mctc"];

/// Controller name published in the Accepted condition message
pub const CONTROLLER_NAME: &str = "crossgate.firestoned.io/gateway-controller";

// ============================================================================
// DNS Constants
// ============================================================================

/// Default TTL for DNS record endpoints (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: i64 = 300;

/// Default weight assigned to every endpoint when no override is present.
///
/// All clusters contribute endpoints at equal weight; weighted routing
/// beyond the default is reserved for a future annotation.
pub const DEFAULT_ENDPOINT_WEIGHT: i64 = 120;

/// Number of hex characters kept from the host-ID hash
pub const HOST_ID_LENGTH: usize = 8;

/// Maximum read-modify-write attempts on a DNSRecord update conflict.
///
/// The DNSRecord is the only object written from multiple clusters; writes
/// use optimistic concurrency and re-read on conflict up to this bound.
pub const DNS_RECORD_CONFLICT_RETRIES: usize = 3;

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue delay while waiting on a precondition such as an unissued
/// certificate secret or a listener with no attached routes (10 seconds)
pub const PENDING_REQUEUE_DURATION_SECS: u64 = 10;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue interval once a resource is fully programmed (5 minutes)
pub const REQUEUE_WHEN_PROGRAMMED_SECS: u64 = 300;

/// Deadline for a single reconcile pass (30 seconds).
///
/// A pass that crosses the deadline is aborted and requeued as a
/// retryable failure; no further work starts after cancellation.
pub const RECONCILE_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds)
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default namespace holding controller infrastructure: cluster credential
/// secrets, the webhook serving certificate and the webhook Service
pub const DEFAULT_CONTROL_NAMESPACE: &str = "crossgate-system";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// Admission Webhook Constants
// ============================================================================

/// Port the admission webhook server listens on
pub const WEBHOOK_SERVER_PORT: u16 = 9443;

/// HTTP path serving Ingress admission reviews
pub const WEBHOOK_INGRESS_PATH: &str = "/ingress";

/// Name of the mutating webhook configuration owned by the controller
pub const WEBHOOK_CONFIGURATION_NAME: &str = "crossgate-ingress-webhook";

/// Name of the Service fronting the webhook server
pub const WEBHOOK_SERVICE_NAME: &str = "crossgate-webhook";
