// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for CRD serialization and schema metadata.

use super::*;
use kube::CustomResourceExt;
use kube::Resource;

#[test]
fn test_managed_zone_crd_identity() {
    let crd = ManagedZone::crd();
    assert_eq!(crd.spec.group, "crossgate.firestoned.io");
    assert_eq!(crd.spec.names.kind, "ManagedZone");
    assert_eq!(ManagedZone::api_version(&()), "crossgate.firestoned.io/v1alpha1");
}

#[test]
fn test_dns_record_crd_identity() {
    let crd = DNSRecord::crd();
    assert_eq!(crd.spec.names.kind, "DNSRecord");
    assert_eq!(crd.spec.names.plural, "dnsrecords");
}

#[test]
fn test_certificate_crd_identity() {
    let crd = Certificate::crd();
    assert_eq!(crd.spec.names.kind, "Certificate");
}

#[test]
fn test_managed_zone_spec_serializes_camel_case() {
    let spec = ManagedZoneSpec {
        root_domain: "example.com".to_string(),
        id: Some("Z0123456789".to_string()),
        default: true,
        description: None,
    };

    let value = serde_json::to_value(&spec).unwrap();
    assert_eq!(value["rootDomain"], "example.com");
    assert_eq!(value["default"], true);
    assert!(value.get("description").is_none());
}

#[test]
fn test_endpoint_serializes_camel_case() {
    let endpoint = Endpoint {
        dns_name: "app.example.com".to_string(),
        record_type: RecordType::A,
        targets: vec!["10.0.0.1".to_string()],
        ttl: Some(300),
        set_identifier: Some("c1".to_string()),
        weight: Some(120),
    };

    let value = serde_json::to_value(&endpoint).unwrap();
    assert_eq!(value["dnsName"], "app.example.com");
    assert_eq!(value["recordType"], "A");
    assert_eq!(value["setIdentifier"], "c1");
    assert_eq!(value["weight"], 120);
}

#[test]
fn test_endpoint_round_trip() {
    let endpoint = Endpoint {
        dns_name: "app.example.com".to_string(),
        record_type: RecordType::CNAME,
        targets: vec!["lb.provider.example.com".to_string()],
        ttl: Some(300),
        set_identifier: Some("c2".to_string()),
        weight: Some(120),
    };

    let encoded = serde_json::to_string(&endpoint).unwrap();
    let decoded: Endpoint = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, endpoint);
}

#[test]
fn test_record_type_display() {
    assert_eq!(RecordType::A.to_string(), "A");
    assert_eq!(RecordType::CNAME.to_string(), "CNAME");
}

#[test]
fn test_dns_record_spec_defaults_to_empty_endpoints() {
    let json = r#"{"rootHost": "app.example.com"}"#;
    let spec: DNSRecordSpec = serde_json::from_str(json).unwrap();
    assert_eq!(spec.root_host, "app.example.com");
    assert!(spec.endpoints.is_empty());
    assert!(spec.zone_ref.is_none());
}

#[test]
fn test_certificate_spec_round_trip() {
    let spec = CertificateSpec {
        host: "app.example.com".to_string(),
        secret_name: "app.example.com".to_string(),
        issuer: None,
    };

    let value = serde_json::to_value(&spec).unwrap();
    assert_eq!(value["host"], "app.example.com");
    assert_eq!(value["secretName"], "app.example.com");
}
