// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for host-ID derivation and record naming.

use super::*;

#[test]
fn test_host_id_is_stable() {
    let first = host_id("tenant-a", "prod-gateway");
    let second = host_id("tenant-a", "prod-gateway");
    assert_eq!(first, second);
}

#[test]
fn test_host_id_length() {
    assert_eq!(host_id("tenant-a", "prod-gateway").len(), HOST_ID_LENGTH);
}

#[test]
fn test_host_id_is_lowercase_hex() {
    let id = host_id("tenant-a", "prod-gateway");
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_host_id_differs_per_resource() {
    assert_ne!(
        host_id("tenant-a", "prod-gateway"),
        host_id("tenant-b", "prod-gateway")
    );
    assert_ne!(
        host_id("tenant-a", "prod-gateway"),
        host_id("tenant-a", "other-gateway")
    );
}

#[test]
fn test_host_id_separator_prevents_concatenation_collisions() {
    // "ab" + "c" must not collide with "a" + "bc"
    assert_ne!(host_id("ab", "c"), host_id("a", "bc"));
}

#[test]
fn test_record_name_passthrough_for_plain_hosts() {
    assert_eq!(record_name("app.tenant-a.example.com"), "app.tenant-a.example.com");
}

#[test]
fn test_record_name_lowercases() {
    assert_eq!(record_name("App.Example.COM"), "app.example.com");
}

#[test]
fn test_record_name_maps_wildcard_label() {
    assert_eq!(record_name("*.example.com"), "wildcard.example.com");
}
