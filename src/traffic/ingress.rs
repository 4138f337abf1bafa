// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress variant of the traffic accessor.
//!
//! Hostnames come from the rule hosts, TLS bindings from the `spec.tls`
//! blocks, and DNS targets from the load-balancer ingress status of the
//! local cluster. The agent fills in its own cluster-id when it patches
//! targets back to the hub, so targets produced here carry none.

use crate::traffic::{is_valid_hostname, Target, TlsConfig, TrafficError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressTLS};

/// Deduplicated rule hosts, validated.
pub fn hostnames(ingress: &Ingress) -> Result<Vec<String>, TrafficError> {
    let mut hosts = Vec::new();
    for rule in rules(ingress) {
        let Some(host) = &rule.host else {
            continue;
        };
        if !is_valid_hostname(host) {
            return Err(TrafficError::InvalidListener(host.clone()));
        }
        if !hosts.contains(host) {
            hosts.push(host.clone());
        }
    }
    Ok(hosts)
}

fn rules(ingress: &Ingress) -> &[IngressRule] {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_deref())
        .unwrap_or(&[])
}

/// Whether the Ingress declares any TLS block.
#[must_use]
pub fn has_tls(ingress: &Ingress) -> bool {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty())
}

/// One [`TlsConfig`] per TLS block.
pub fn tls_configs(ingress: &Ingress) -> Result<Vec<TlsConfig>, TrafficError> {
    let blocks = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_deref())
        .unwrap_or(&[]);

    let mut configs = Vec::new();
    for block in blocks {
        let hosts = block.hosts.clone().unwrap_or_default();
        let Some(secret_name) = block.secret_name.clone() else {
            let host = hosts.first().cloned().unwrap_or_default();
            return Err(TrafficError::MissingSecretRef(host));
        };
        configs.push(TlsConfig { hosts, secret_name });
    }
    Ok(configs)
}

/// Upsert a TLS block binding `host` to `secret`.
///
/// An existing block for exactly this host has its secret replaced;
/// otherwise a new block is appended. Re-running with the same secret
/// leaves the spec untouched.
pub fn add_tls(ingress: &mut Ingress, host: &str, secret: &Secret) {
    let secret_name = secret.metadata.name.clone().unwrap_or_default();
    let spec = ingress.spec.get_or_insert_with(Default::default);
    let tls = spec.tls.get_or_insert_with(Vec::new);

    for block in tls.iter_mut() {
        let covers_exactly_host = block
            .hosts
            .as_ref()
            .is_some_and(|hosts| hosts.len() == 1 && hosts[0] == host);
        if covers_exactly_host {
            block.secret_name = Some(secret_name);
            return;
        }
    }

    tls.push(IngressTLS {
        hosts: Some(vec![host.to_string()]),
        secret_name: Some(secret_name),
    });
}

/// Remove the given hosts from every TLS block.
///
/// Blocks whose host list empties are dropped; rules are never touched.
pub fn remove_tls(ingress: &mut Ingress, hosts: &[String]) {
    let Some(tls) = ingress.spec.as_mut().and_then(|spec| spec.tls.as_mut()) else {
        return;
    };

    for block in tls.iter_mut() {
        if let Some(block_hosts) = &mut block.hosts {
            block_hosts.retain(|h| !hosts.contains(h));
        }
    }
    tls.retain(|block| block.hosts.as_ref().is_some_and(|h| !h.is_empty()));
}

/// Synthesize a rule for a controller-issued managed host.
///
/// The new rule mirrors the first existing rule so the managed host serves
/// the same backends; with no rules present a bare host rule is created.
/// Idempotent when the host is already declared.
pub fn add_managed_host(ingress: &mut Ingress, host: &str) -> Result<(), TrafficError> {
    if !is_valid_hostname(host) {
        return Err(TrafficError::InvalidListener(host.to_string()));
    }

    let spec = ingress.spec.get_or_insert_with(Default::default);
    let rules = spec.rules.get_or_insert_with(Vec::new);

    if rules.iter().any(|rule| rule.host.as_deref() == Some(host)) {
        return Ok(());
    }

    let mut rule = rules.first().cloned().unwrap_or_default();
    rule.host = Some(host.to_string());
    rules.push(rule);
    Ok(())
}

/// Whether a rule declares `host`.
#[must_use]
pub fn has_rule_for_host(ingress: &Ingress, host: &str) -> bool {
    rules(ingress)
        .iter()
        .any(|rule| rule.host.as_deref() == Some(host))
}

/// Targets from the local load-balancer status.
///
/// Entries reporting both an IP and a hostname contribute the IP only; the
/// per-cluster planner prefers A rdata anyway.
#[must_use]
pub fn dns_targets(ingress: &Ingress) -> Vec<Target> {
    let entries = ingress
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_deref())
        .unwrap_or(&[]);

    entries
        .iter()
        .filter_map(|entry| {
            if let Some(ip) = &entry.ip {
                Some(Target::new(ip, None))
            } else {
                entry.hostname.as_ref().map(|h| Target::new(h, None))
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
