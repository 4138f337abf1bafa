// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Ingress traffic accessor.

use super::*;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressLoadBalancerIngress,
    IngressLoadBalancerStatus, IngressServiceBackend, IngressSpec, IngressStatus,
    ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn rule(host: &str) -> IngressRule {
    IngressRule {
        host: Some(host.to_string()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some("/".to_string()),
                path_type: "Prefix".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: "app".to_string(),
                        port: Some(ServiceBackendPort {
                            number: Some(8080),
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
            }],
        }),
    }
}

fn ingress_with_rules(hosts: &[&str]) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some("app".to_string()),
            namespace: Some("tenant-a".to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(hosts.iter().map(|h| rule(h)).collect()),
            ..Default::default()
        }),
        status: None,
    }
}

fn secret(name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_hostnames_from_rules() {
    let ingress = ingress_with_rules(&["app.example.com", "other.example.com", "app.example.com"]);
    assert_eq!(
        hostnames(&ingress).unwrap(),
        vec![
            "app.example.com".to_string(),
            "other.example.com".to_string()
        ]
    );
}

#[test]
fn test_hostnames_rejects_malformed() {
    let ingress = ingress_with_rules(&["bad_host.example.com"]);
    assert!(matches!(
        hostnames(&ingress),
        Err(TrafficError::InvalidListener(_))
    ));
}

#[test]
fn test_tls_configs_requires_secret_name() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    ingress.spec.as_mut().unwrap().tls = Some(vec![IngressTLS {
        hosts: Some(vec!["app.example.com".to_string()]),
        secret_name: None,
    }]);

    assert!(matches!(
        tls_configs(&ingress),
        Err(TrafficError::MissingSecretRef(host)) if host == "app.example.com"
    ));
}

#[test]
fn test_add_tls_then_read_back() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    add_tls(&mut ingress, "app.example.com", &secret("app.example.com"));

    assert!(has_tls(&ingress));
    let configs = tls_configs(&ingress).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].hosts, vec!["app.example.com".to_string()]);
    assert_eq!(configs[0].secret_name, "app.example.com");
}

#[test]
fn test_add_tls_is_idempotent() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    add_tls(&mut ingress, "app.example.com", &secret("app.example.com"));
    let first = ingress.clone();
    add_tls(&mut ingress, "app.example.com", &secret("app.example.com"));

    assert_eq!(
        serde_json::to_value(&ingress.spec).unwrap(),
        serde_json::to_value(&first.spec).unwrap()
    );
}

#[test]
fn test_add_tls_replaces_secret_for_existing_host() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    add_tls(&mut ingress, "app.example.com", &secret("old"));
    add_tls(&mut ingress, "app.example.com", &secret("new"));

    let tls = ingress.spec.as_ref().unwrap().tls.as_ref().unwrap();
    assert_eq!(tls.len(), 1);
    assert_eq!(tls[0].secret_name.as_deref(), Some("new"));
}

#[test]
fn test_remove_tls_never_removes_rules() {
    let mut ingress = ingress_with_rules(&["app.example.com", "other.example.com"]);
    add_tls(&mut ingress, "app.example.com", &secret("app-tls"));
    add_tls(&mut ingress, "other.example.com", &secret("other-tls"));

    remove_tls(&mut ingress, &["app.example.com".to_string()]);

    let spec = ingress.spec.as_ref().unwrap();
    assert_eq!(spec.rules.as_ref().unwrap().len(), 2);
    let tls = spec.tls.as_ref().unwrap();
    assert_eq!(tls.len(), 1);
    assert_eq!(
        tls[0].hosts.as_ref().unwrap(),
        &vec!["other.example.com".to_string()]
    );
}

#[test]
fn test_add_managed_host_mirrors_first_rule() {
    let mut ingress = ingress_with_rules(&["foo.bar"]);
    add_managed_host(&mut ingress, "tenant-a-app-1a2b3c4d.example.com").unwrap();

    let rules = ingress.spec.as_ref().unwrap().rules.as_ref().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(
        rules[1].host.as_deref(),
        Some("tenant-a-app-1a2b3c4d.example.com")
    );
    // The synthesized rule routes to the same backend as the original
    assert_eq!(
        serde_json::to_value(&rules[1].http).unwrap(),
        serde_json::to_value(&rules[0].http).unwrap()
    );
}

#[test]
fn test_add_managed_host_is_idempotent() {
    let mut ingress = ingress_with_rules(&["foo.bar"]);
    add_managed_host(&mut ingress, "managed.example.com").unwrap();
    add_managed_host(&mut ingress, "managed.example.com").unwrap();

    let rules = ingress.spec.as_ref().unwrap().rules.as_ref().unwrap();
    assert_eq!(rules.len(), 2);
}

#[test]
fn test_add_managed_host_rejects_malformed() {
    let mut ingress = ingress_with_rules(&["foo.bar"]);
    assert!(matches!(
        add_managed_host(&mut ingress, "bad host!"),
        Err(TrafficError::InvalidListener(_))
    ));
}

#[test]
fn test_dns_targets_from_load_balancer_status() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    ingress.status = Some(IngressStatus {
        load_balancer: Some(IngressLoadBalancerStatus {
            ingress: Some(vec![
                IngressLoadBalancerIngress {
                    ip: Some("10.0.0.1".to_string()),
                    ..Default::default()
                },
                IngressLoadBalancerIngress {
                    hostname: Some("lb.provider.example.com".to_string()),
                    ..Default::default()
                },
            ]),
        }),
    });

    let targets = dns_targets(&ingress);
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].target_type, TargetType::Ip);
    assert_eq!(targets[1].target_type, TargetType::Hostname);
    assert!(targets.iter().all(|t| t.cluster_id.is_none()));
}

#[test]
fn test_dns_targets_prefers_ip_within_one_entry() {
    let mut ingress = ingress_with_rules(&["app.example.com"]);
    ingress.status = Some(IngressStatus {
        load_balancer: Some(IngressLoadBalancerStatus {
            ingress: Some(vec![IngressLoadBalancerIngress {
                ip: Some("10.0.0.1".to_string()),
                hostname: Some("lb.provider.example.com".to_string()),
                ..Default::default()
            }]),
        }),
    });

    let targets = dns_targets(&ingress);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].value, "10.0.0.1");
}

#[test]
fn test_dns_targets_empty_without_status() {
    let ingress = ingress_with_rules(&["app.example.com"]);
    assert!(dns_targets(&ingress).is_empty());
}

#[test]
fn test_has_rule_for_host() {
    let ingress = ingress_with_rules(&["app.example.com"]);
    assert!(has_rule_for_host(&ingress, "app.example.com"));
    assert!(!has_rule_for_host(&ingress, "missing.example.com"));
}
