// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster-sync annotation stamping.
//!
//! Replication to data-plane clusters is driven purely by annotation
//! placement: the external syncer copies any object carrying
//! `clustersync.kuadrant.io/<cluster-id> = "true"` into that cluster, or
//! into every cluster for the wildcard form `clustersync.kuadrant.io/*`.
//!
//! The annotator is a pure function over (annotations, cluster ids). It
//! never removes annotations written by other components and never reports
//! a change when the desired set is already present, so re-stamping cannot
//! feed reconcile loops in the sync infrastructure.

use crate::labels::{CLUSTER_SYNC_ANNOTATION_PREFIX, CLUSTER_SYNC_WILDCARD};
use std::collections::BTreeMap;

/// Replication mode for sync annotation stamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Stamp one annotation per selected cluster.
    #[default]
    Selected,
    /// Stamp the single wildcard annotation; the syncer replicates everywhere.
    Wildcard,
}

/// Build the sync annotation key for a cluster-id.
#[must_use]
pub fn sync_annotation_key(cluster_id: &str) -> String {
    format!("{CLUSTER_SYNC_ANNOTATION_PREFIX}/{cluster_id}")
}

/// Ensure the sync annotations for `clusters` are present in `annotations`.
///
/// Returns `true` when the map was modified. Existing annotations, including
/// sync annotations for clusters outside this call, are left untouched.
pub fn apply_sync_annotations(
    annotations: &mut BTreeMap<String, String>,
    clusters: &[String],
    mode: SyncMode,
) -> bool {
    let mut changed = false;

    match mode {
        SyncMode::Wildcard => {
            changed |= insert_if_absent(annotations, &sync_annotation_key(CLUSTER_SYNC_WILDCARD));
        }
        SyncMode::Selected => {
            for cluster in clusters {
                changed |= insert_if_absent(annotations, &sync_annotation_key(cluster));
            }
        }
    }

    changed
}

fn insert_if_absent(annotations: &mut BTreeMap<String, String>, key: &str) -> bool {
    if annotations.get(key).map(String::as_str) == Some("true") {
        return false;
    }
    annotations.insert(key.to_string(), "true".to_string());
    true
}

/// Ensure the sync annotations on an object's metadata, allocating the
/// annotation map when absent.
///
/// Returns `true` when the metadata was modified, so callers can skip the
/// update write entirely on a no-op pass.
pub fn apply_sync_annotations_to_meta(
    meta: &mut k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    clusters: &[String],
    mode: SyncMode,
) -> bool {
    let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
    apply_sync_annotations(annotations, clusters, mode)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod sync_tests;
