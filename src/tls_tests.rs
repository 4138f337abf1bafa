// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for certificate naming.

use super::*;

#[test]
fn test_secret_name_equals_host() {
    assert_eq!(
        secret_name_for_host("app.tenant-a.example.com"),
        "app.tenant-a.example.com"
    );
}

#[test]
fn test_secret_name_is_deterministic() {
    assert_eq!(
        secret_name_for_host("app.example.com"),
        secret_name_for_host("app.example.com")
    );
}

#[test]
fn test_secret_name_lowercases() {
    assert_eq!(secret_name_for_host("App.Example.COM"), "app.example.com");
}

#[test]
fn test_secret_name_maps_wildcard_label() {
    assert_eq!(secret_name_for_host("*.example.com"), "wildcard.example.com");
}
