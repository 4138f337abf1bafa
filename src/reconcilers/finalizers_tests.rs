// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for finalizer presence checks.

use super::*;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn ingress_with_finalizers(finalizers: Option<Vec<&str>>) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            name: Some("app".to_string()),
            namespace: Some("tenant-a".to_string()),
            finalizers: finalizers.map(|f| f.iter().map(|s| (*s).to_string()).collect()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_has_finalizer_with_none_set() {
    let ingress = ingress_with_finalizers(None);
    assert!(!has_finalizer(&ingress, "kuadrant.io/traffic-management"));
}

#[test]
fn test_has_finalizer_detects_presence() {
    let ingress = ingress_with_finalizers(Some(vec!["kuadrant.io/traffic-management"]));
    assert!(has_finalizer(&ingress, "kuadrant.io/traffic-management"));
}

#[test]
fn test_has_finalizer_ignores_other_tokens() {
    let ingress = ingress_with_finalizers(Some(vec!["other.io/protect"]));
    assert!(!has_finalizer(&ingress, "kuadrant.io/traffic-management"));
}
