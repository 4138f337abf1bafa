// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and crossgate-specific
//! labels/annotations to ensure consistency across all resources touched by
//! the controller. The `kuadrant.io` annotation keys and the sync prefix are
//! stable, user-visible contract strings consumed by external tooling and
//! must not be renamed.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/part-of` on resources created by crossgate
pub const PART_OF_CROSSGATE: &str = "crossgate";

/// Value for `app.kubernetes.io/managed-by` on resources the hub controller writes
pub const MANAGED_BY_CONTROLLER: &str = "crossgate-controller";

// ============================================================================
// User-Visible Annotations (stable contract)
// ============================================================================

/// Annotation carrying the equality-based label selector that picks the
/// data-plane clusters a Gateway replicates to
pub const GATEWAY_CLUSTER_LABEL_SELECTOR_ANNOTATION: &str =
    "kuadrant.io/gateway-cluster-label-selector";

/// Prefix for the per-cluster placement annotations consumed by the external
/// syncer: `<prefix>/<cluster-id> = "true"`
pub const CLUSTER_SYNC_ANNOTATION_PREFIX: &str = "clustersync.kuadrant.io";

/// Cluster-id wildcard used when blanket replication is configured:
/// `<prefix>/* = "true"`
pub const CLUSTER_SYNC_WILDCARD: &str = "*";

// ============================================================================
// Crossgate-Specific Labels and Annotations
// ============================================================================

/// Label identifying cluster credential secrets in the control namespace
pub const CLUSTER_CREDENTIALS_LABEL: &str = "crossgate.firestoned.io/cluster-credentials";

/// Annotation marking an Ingress host that was synthesized by the admission
/// webhook under the default managed zone
pub const MANAGED_HOST_ANNOTATION: &str = "crossgate.firestoned.io/managed-host";

/// Prefix for the per-cluster gateway status annotations published by the
/// data-plane agents: `<prefix>-<cluster-id>` holds a JSON document with the
/// cluster-local addresses and per-listener attached route counts
pub const CLUSTER_STATUS_ANNOTATION_PREFIX: &str = "crossgate.firestoned.io/status";

/// Label stamped on DNSRecords with the short host-ID of the owning traffic
/// resource, so records from distinct owners can coexist in one zone
pub const HOST_ID_LABEL: &str = "crossgate.firestoned.io/host-id";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer blocking deletion of a traffic resource until this cluster's
/// DNS contributions have been withdrawn (stable contract string)
pub const TRAFFIC_FINALIZER: &str = "kuadrant.io/traffic-management";
