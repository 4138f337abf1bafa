// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Gateway traffic accessor.

use super::*;
use crate::traffic::TargetType;
use gateway_api::apis::standard::gateways::{GatewayListeners, GatewaySpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn listener(name: &str, hostname: Option<&str>) -> GatewayListeners {
    GatewayListeners {
        name: name.to_string(),
        hostname: hostname.map(String::from),
        port: 443,
        protocol: "HTTPS".to_string(),
        ..Default::default()
    }
}

fn gateway_with_listeners(listeners: Vec<GatewayListeners>) -> Gateway {
    Gateway {
        metadata: ObjectMeta {
            name: Some("prod-gateway".to_string()),
            namespace: Some("tenant-a".to_string()),
            ..Default::default()
        },
        spec: GatewaySpec {
            gateway_class_name: "mctc".to_string(),
            listeners,
            ..Default::default()
        },
        status: None,
    }
}

fn tls_secret(name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("tenant-a".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn with_cluster_status(gateway: &mut Gateway, cluster_id: &str, status: &ClusterGatewayStatus) {
    let annotations = gateway
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new);
    annotations.insert(
        cluster_status_annotation_key(cluster_id),
        serde_json::to_string(status).unwrap(),
    );
}

fn reporting_status(addresses: &[&str], attached_routes: i32) -> ClusterGatewayStatus {
    ClusterGatewayStatus {
        addresses: addresses
            .iter()
            .map(|a| ClusterAddress {
                address_type: None,
                value: (*a).to_string(),
            })
            .collect(),
        listeners: vec![ClusterListenerStatus {
            name: "https".to_string(),
            attached_routes,
        }],
    }
}

#[test]
fn test_hostnames_deduplicates_and_skips_bare_listeners() {
    let gateway = gateway_with_listeners(vec![
        listener("https", Some("app.tenant-a.example.com")),
        listener("https-alt", Some("app.tenant-a.example.com")),
        listener("tcp", None),
        listener("other", Some("other.example.com")),
    ]);

    let hosts = hostnames(&gateway).unwrap();
    assert_eq!(
        hosts,
        vec![
            "app.tenant-a.example.com".to_string(),
            "other.example.com".to_string()
        ]
    );
}

#[test]
fn test_hostnames_rejects_malformed() {
    let gateway = gateway_with_listeners(vec![listener("bad", Some("not_a_host.example.com"))]);
    assert!(matches!(
        hostnames(&gateway),
        Err(TrafficError::InvalidListener(_))
    ));
}

#[test]
fn test_tls_configs_one_per_cert_ref() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    gateway.spec.listeners[0].tls = Some(GatewayListenersTls {
        certificate_refs: Some(vec![
            GatewayListenersTlsCertificateRefs {
                group: None,
                kind: None,
                name: "app-tls".to_string(),
                namespace: None,
            },
            GatewayListenersTlsCertificateRefs {
                group: None,
                kind: None,
                name: "app-tls-backup".to_string(),
                namespace: None,
            },
        ]),
        mode: None,
        options: None,
    });

    let configs = tls_configs(&gateway).unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0].hosts, vec!["app.example.com".to_string()]);
    assert_eq!(configs[0].secret_name, "app-tls");
    assert_eq!(configs[1].secret_name, "app-tls-backup");
}

#[test]
fn test_tls_configs_rejects_empty_cert_refs() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    gateway.spec.listeners[0].tls = Some(GatewayListenersTls {
        certificate_refs: None,
        mode: None,
        options: None,
    });

    assert!(matches!(
        tls_configs(&gateway),
        Err(TrafficError::MissingSecretRef(host)) if host == "app.example.com"
    ));
}

#[test]
fn test_add_tls_mutates_only_matching_listeners() {
    let mut gateway = gateway_with_listeners(vec![
        listener("https", Some("app.example.com")),
        listener("other", Some("other.example.com")),
    ]);

    add_tls(&mut gateway, "app.example.com", &tls_secret("app.example.com"));

    assert_eq!(gateway.spec.listeners.len(), 2);
    let tls = gateway.spec.listeners[0].tls.as_ref().unwrap();
    let refs = tls.certificate_refs.as_ref().unwrap();
    assert_eq!(refs[0].name, "app.example.com");
    assert_eq!(refs[0].namespace.as_deref(), Some("tenant-a"));
    assert!(gateway.spec.listeners[1].tls.is_none());
}

#[test]
fn test_add_tls_is_idempotent() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    let secret = tls_secret("app.example.com");

    add_tls(&mut gateway, "app.example.com", &secret);
    let first = gateway.clone();
    add_tls(&mut gateway, "app.example.com", &secret);

    assert_eq!(
        serde_json::to_value(&gateway.spec).unwrap(),
        serde_json::to_value(&first.spec).unwrap()
    );
}

#[test]
fn test_add_tls_unknown_host_is_noop() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    add_tls(&mut gateway, "missing.example.com", &tls_secret("x"));
    assert!(gateway.spec.listeners[0].tls.is_none());
}

#[test]
fn test_remove_tls_keeps_listener() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    add_tls(&mut gateway, "app.example.com", &tls_secret("app-tls"));

    remove_tls(&mut gateway, &["app.example.com".to_string()]);

    assert_eq!(gateway.spec.listeners.len(), 1);
    assert!(gateway.spec.listeners[0].tls.is_none());
    assert_eq!(
        gateway.spec.listeners[0].hostname.as_deref(),
        Some("app.example.com")
    );
}

#[test]
fn test_dns_targets_aggregates_reporting_clusters() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    with_cluster_status(&mut gateway, "c1", &reporting_status(&["10.0.0.1"], 1));
    with_cluster_status(&mut gateway, "c2", &reporting_status(&["10.0.0.2"], 2));

    let targets = dns_targets(&gateway).unwrap();
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().any(|t| t.value == "10.0.0.1"
        && t.cluster_id.as_deref() == Some("c1")
        && t.target_type == TargetType::Ip));
    assert!(targets
        .iter()
        .any(|t| t.value == "10.0.0.2" && t.cluster_id.as_deref() == Some("c2")));
}

#[test]
fn test_dns_targets_skips_clusters_without_attached_routes() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    with_cluster_status(&mut gateway, "c1", &reporting_status(&["10.0.0.1"], 1));
    with_cluster_status(&mut gateway, "c2", &reporting_status(&["10.0.0.2"], 0));

    let targets = dns_targets(&gateway).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].cluster_id.as_deref(), Some("c1"));
}

#[test]
fn test_dns_targets_skips_undecodable_status() {
    let mut gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    with_cluster_status(&mut gateway, "c1", &reporting_status(&["10.0.0.1"], 1));
    gateway
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(cluster_status_annotation_key("c2"), "{not json".to_string());

    let targets = dns_targets(&gateway).unwrap();
    assert_eq!(targets.len(), 1);
}

#[test]
fn test_host_attachment_requires_matching_listener_name() {
    let mut gateway = gateway_with_listeners(vec![
        listener("https", Some("app.example.com")),
        listener("other", Some("other.example.com")),
    ]);
    // Cluster reports routes attached to the "https" listener only
    with_cluster_status(&mut gateway, "c1", &reporting_status(&["10.0.0.1"], 1));

    assert!(host_has_attached_routes(&gateway, "app.example.com"));
    assert!(!host_has_attached_routes(&gateway, "other.example.com"));
    assert!(!host_has_attached_routes(&gateway, "unknown.example.com"));
}

#[test]
fn test_host_attachment_false_with_no_reports() {
    let gateway = gateway_with_listeners(vec![listener("https", Some("app.example.com"))]);
    assert!(!host_has_attached_routes(&gateway, "app.example.com"));
}

#[test]
fn test_cluster_status_round_trips_through_annotation_json() {
    let status = reporting_status(&["10.0.0.1", "lb.example.com"], 3);
    let encoded = serde_json::to_string(&status).unwrap();
    let decoded: ClusterGatewayStatus = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, status);
    assert!(encoded.contains("attachedRoutes"));
}
