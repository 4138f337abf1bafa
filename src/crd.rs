// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for multi-cluster traffic management.
//!
//! This module defines the Kubernetes Custom Resource Definitions owned by
//! crossgate. Gateways and Ingresses are consumed from their upstream API
//! groups; the controller materializes its desired state into these kinds:
//!
//! - [`ManagedZone`] - a DNS zone the controller is authoritative for
//! - [`DNSRecord`] - one hostname's endpoint set across all contributing clusters
//! - [`Certificate`] - a TLS certificate request for a single host
//!
//! # Example: Declaring a Managed Zone
//!
//! ```rust,no_run
//! use crossgate::crd::ManagedZoneSpec;
//!
//! let spec = ManagedZoneSpec {
//!     root_domain: "example.com".to_string(),
//!     id: Some("Z0123456789".to_string()),
//!     default: true,
//!     description: Some("Primary public zone".to_string()),
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Accepted, Programmed.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `ManagedZone` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `ManagedZone` declares a DNS zone the controller may write records into.
///
/// Zones are created administratively and consulted read-only by the
/// reconcilers. Host-to-zone resolution picks the zone whose `rootDomain` is
/// the longest suffix of the hostname; among equally long suffixes the zone
/// with `default: true` wins.
///
/// At most one zone per namespace may set `default: true`. The default zone
/// additionally receives the hosts the admission webhook synthesizes for
/// Ingresses that carry no host inside any managed zone.
///
/// # Example
///
/// ```yaml
/// apiVersion: crossgate.firestoned.io/v1alpha1
/// kind: ManagedZone
/// metadata:
///   name: example-com
///   namespace: tenant-a
/// spec:
///   rootDomain: example.com
///   id: Z0123456789
///   default: true
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "crossgate.firestoned.io",
    version = "v1alpha1",
    kind = "ManagedZone",
    namespaced,
    shortname = "mz",
    doc = "ManagedZone declares a DNS zone the controller is authoritative for. Hostnames resolve to the zone with the longest matching rootDomain suffix; the default zone wins ties and hosts synthesized hostnames.",
    printcolumn = r#"{"name":"Domain","type":"string","jsonPath":".spec.rootDomain"}"#,
    printcolumn = r#"{"name":"Default","type":"boolean","jsonPath":".spec.default"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "ManagedZoneStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedZoneSpec {
    /// Root domain of the zone (e.g., "example.com").
    #[schemars(regex(
        pattern = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$"
    ))]
    pub root_domain: String,

    /// Provider-specific zone handle (e.g., a Route53 hosted zone id).
    ///
    /// Opaque to the core; handed to the DNS provider driver unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Marks this zone as the namespace default.
    ///
    /// The default zone breaks resolution ties and hosts webhook-synthesized
    /// hostnames. At most one zone per namespace may set this.
    #[serde(default)]
    pub default: bool,

    /// Free-form description of the zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// DNS record types the endpoint planner emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Canonical name record
    CNAME,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::CNAME => write!(f, "CNAME"),
        }
    }
}

/// A single weighted endpoint inside a [`DNSRecord`].
///
/// Endpoints from distinct clusters coexist through distinct
/// `setIdentifier` values; the record's endpoint set is always the union of
/// the per-cluster contributions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Fully qualified DNS name the endpoint answers for.
    pub dns_name: String,

    /// Record type of the rdata (A or CNAME).
    pub record_type: RecordType,

    /// Record data: IPv4 addresses for A, hostnames for CNAME.
    pub targets: Vec<String>,

    /// Time to live in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    /// Identifier distinguishing this endpoint within a weighted set.
    ///
    /// Always the contributing cluster-id; the safe multi-writer merge keys
    /// on this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,

    /// Relative weight for weighted routing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

/// `DNSRecord` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `DNSRecord` is the controller-owned object representing one hostname's
/// endpoint set across all contributing clusters.
///
/// Records live in the namespace of the traffic resource that caused them
/// and carry an owner reference to it, so Kubernetes garbage collection
/// reaps the record when the last owner disappears. There is at most one
/// record per (root host, managed zone); the object name is the root host.
///
/// The endpoint set is the union of per-cluster contributions. Writers only
/// ever replace endpoints bearing their own set identifier, so no cluster
/// can silently overwrite another's endpoints regardless of write ordering.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "crossgate.firestoned.io",
    version = "v1alpha1",
    kind = "DNSRecord",
    namespaced,
    shortname = "dnsrec",
    doc = "DNSRecord holds the provider-neutral endpoint set advertised for one hostname, merged across all contributing data-plane clusters.",
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.rootHost"}"#,
    printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.zoneRef"}"#
)]
#[kube(status = "DNSRecordStatus")]
#[serde(rename_all = "camelCase")]
pub struct DNSRecordSpec {
    /// The FQDN advertised by this record.
    #[schemars(regex(
        pattern = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$"
    ))]
    pub root_host: String,

    /// Name of the `ManagedZone` (same namespace) this record belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_ref: Option<String>,

    /// The merged endpoint set.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// `Certificate` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Set by the issuer once the signed secret has been published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `Certificate` requests a TLS certificate for a single host.
///
/// The controller creates exactly one Certificate per (namespace, host); the
/// external issuer watches these objects and publishes the signed key
/// material as a Secret named `secretName` in the same namespace. A secret
/// existing is treated as ready; the issuer only publishes after signing.
///
/// Certificates carry owner references to every traffic resource that
/// requested the host, so garbage collection removes them when all owners
/// are gone. Adding an owner never removes existing ones.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "crossgate.firestoned.io",
    version = "v1alpha1",
    kind = "Certificate",
    namespaced,
    shortname = "cgcert",
    doc = "Certificate requests TLS key material for one host. The external issuer publishes the signed certificate as a Secret with a name derived deterministically from the host.",
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".spec.host"}"#,
    printcolumn = r#"{"name":"Secret","type":"string","jsonPath":".spec.secretName"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.ready"}"#
)]
#[kube(status = "CertificateStatus")]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// Host the certificate is issued for.
    #[schemars(regex(
        pattern = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$"
    ))]
    pub host: String,

    /// Name of the Secret the issuer publishes the key material under.
    ///
    /// Derived deterministically from the host; equal to it.
    pub secret_name: String,

    /// Name of the certificate issuer to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
