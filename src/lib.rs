// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Crossgate - Multi-Cluster Traffic Controller for Kubernetes
//!
//! Crossgate is a control-plane operator written in Rust that observes
//! declarative traffic intent (Gateway and Ingress resources) in a hub
//! cluster and drives external infrastructure into the matching desired
//! state: authoritative DNS records pointing the advertised hostnames at
//! data-plane cluster ingress addresses, and TLS certificates for those
//! hostnames. Resources are then labelled with sync annotations so a
//! data-plane replicator copies them into the selected workload clusters.
//!
//! ## Overview
//!
//! Two binaries ship from this crate:
//!
//! - the **hub controller** reconciles Gateways: cluster selection,
//!   per-host certificates, secret sync, TLS attachment, DNS record
//!   materialization and status publication, plus the Ingress admission
//!   webhook
//! - the **data-plane agent** reconciles the synced Ingress copies in each
//!   workload cluster, contributing that cluster's load-balancer endpoints
//!   to the shared DNS records and withdrawing them on deletion via a
//!   finalizer
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definitions (ManagedZone, DNSRecord, Certificate)
//! - [`traffic`] - uniform accessor over the Gateway and Ingress variants
//! - [`dns`] - DNS record materialization and host-to-zone resolution
//! - [`tls`] - idempotent certificate issuance and secret lookup
//! - [`reconcilers`] - the hub and agent reconciliation loops
//! - [`admission`] - the Ingress admission webhook
//! - [`cluster`] - the data-plane cluster registry
//! - [`sync`] - cluster-sync annotation stamping
//!
//! ## Example
//!
//! ```rust,no_run
//! use crossgate::crd::ManagedZoneSpec;
//!
//! // Declare the zone the controller may write records into
//! let zone = ManagedZoneSpec {
//!     root_domain: "example.com".to_string(),
//!     id: Some("Z0123456789".to_string()),
//!     default: true,
//!     description: None,
//! };
//! ```
//!
//! ## Features
//!
//! - **Multi-writer safe DNS** - per-cluster endpoint set identifiers make
//!   record merges idempotent and commutative across clusters
//! - **Annotation-driven replication** - placement expressed purely through
//!   sync annotations, consumable by any external syncer
//! - **Gateway API native** - class-filtered Gateway reconciliation with
//!   standard Accepted/Programmed conditions

pub mod admission;
pub mod cluster;
pub mod constants;
pub mod context;
pub mod crd;
pub mod dns;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod selector;
pub mod sync;
pub mod tls;
pub mod traffic;
