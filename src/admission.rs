// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Admission webhook for Ingress hostnames.
//!
//! Validates Ingress objects on CREATE/UPDATE against the managed-zone
//! registry. Hosts inside a managed zone pass through (optionally
//! pre-issuing their certificate); malformed hosts are rejected with a
//! clear message; an Ingress whose hosts all fall outside the managed
//! zones, and that carries no managed-host annotation yet, is mutated: a
//! host of the form `<namespace>-<name>-<shortid>.<default-zone-root>` is
//! synthesized under the default zone, with a new rule mirroring an
//! existing one.
//!
//! The webhook is served over TLS with a self-signed certificate minted at
//! startup; the controller installs the webhook configuration itself and
//! rewrites its `caBundle` whenever the serving certificate is reissued.

use crate::constants::{
    WEBHOOK_CONFIGURATION_NAME, WEBHOOK_INGRESS_PATH, WEBHOOK_SERVER_PORT, WEBHOOK_SERVICE_NAME,
};
use crate::crd::ManagedZone;
use crate::dns::host_id;
use crate::dns::zones::{resolve_zone, ZoneRegistry};
use crate::labels::MANAGED_HOST_ANNOTATION;
use crate::tls::CertificateService;
use crate::traffic::is_valid_hostname;
use anyhow::{Context as AnyhowContext, Result};
use axum::{extract::State, routing::post, Json, Router};
use json_patch::{AddOperation, PatchOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::{Api, Client};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Managed zone registry for host validation
    pub zones: ZoneRegistry,
    /// Certificate service for pre-issuance
    pub certificates: CertificateService,
}

impl WebhookState {
    /// Create webhook state over the hub client.
    ///
    /// Zone lookups consult the tenant namespace first, then the control
    /// namespace for globally administered zones.
    #[must_use]
    pub fn new(client: Client, control_namespace: &str) -> Self {
        Self {
            zones: ZoneRegistry::new(client.clone()).with_global_namespace(control_namespace),
            certificates: CertificateService::new(client, None),
        }
    }
}

/// What the webhook decided for one Ingress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionPlan {
    /// Admit unchanged
    Allow,
    /// Admit with a synthesized managed host
    Mutate {
        /// The host to add under the default zone
        managed_host: String,
    },
    /// Reject with a message
    Deny {
        /// Human-readable rejection reason
        reason: String,
    },
}

/// Decide how to admit an Ingress, given the namespace's managed zones.
///
/// Pure so the decision table is unit-testable: malformed host wins over
/// everything, then hosts inside managed zones pass, then the managed-host
/// annotation suppresses re-mutation, then the default zone (when one
/// exists) hosts the synthesized name.
#[must_use]
pub fn plan_admission(ingress: &Ingress, zones: &[ManagedZone]) -> AdmissionPlan {
    let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
    let name = ingress.metadata.name.clone().unwrap_or_default();

    let hosts: Vec<String> = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .map(|rules| {
            let mut v = Vec::new();
            for rule in rules.iter() {
                if let Some(h) = &rule.host { v.push(h.clone()); }
            }
            v
        })
        .unwrap_or_default();

    for host in &hosts {
        if !is_valid_hostname(host) {
            return AdmissionPlan::Deny {
                reason: format!("invalid hostname {host:?}"),
            };
        }
    }

    let any_managed = hosts
        .iter()
        .any(|host| matches!(resolve_zone(host, zones), Ok(Some(_))));
    if any_managed {
        return AdmissionPlan::Allow;
    }

    let already_mutated = ingress
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|annotations| annotations.contains_key(MANAGED_HOST_ANNOTATION));
    if already_mutated {
        return AdmissionPlan::Allow;
    }

    let Some(default_zone) = zones.iter().find(|zone| zone.spec.default) else {
        // Nowhere to host a synthesized name; admit the custom domain as-is
        return AdmissionPlan::Allow;
    };

    let managed_host = format!(
        "{namespace}-{name}-{}.{}",
        host_id(&namespace, &name),
        default_zone.spec.root_domain
    );
    AdmissionPlan::Mutate { managed_host }
}

/// JSON patch operations realizing a managed-host mutation.
///
/// Adds a rule mirroring the first existing rule (or a bare host rule) and
/// records the synthesized host in the managed-host annotation.
#[must_use]
pub fn mutation_patch(ingress: &Ingress, managed_host: &str) -> Vec<PatchOperation> {
    let mut ops = Vec::new();

    let rules = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref());

    let mut mirrored = rules
        .and_then(|rules| rules.first().cloned())
        .unwrap_or_default();
    mirrored.host = Some(managed_host.to_string());

    if rules.is_some_and(|rules| !rules.is_empty()) {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "rules", "-"]),
            value: serde_json::to_value(&mirrored).unwrap_or_default(),
        }));
    } else {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["spec", "rules"]),
            value: serde_json::to_value(vec![mirrored]).unwrap_or_default(),
        }));
    }

    if ingress.metadata.annotations.is_none() {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "annotations"]),
            value: serde_json::json!({ MANAGED_HOST_ANNOTATION: managed_host }),
        }));
    } else {
        ops.push(PatchOperation::Add(AddOperation {
            path: PointerBuf::from_tokens(["metadata", "annotations", MANAGED_HOST_ANNOTATION]),
            value: serde_json::Value::String(managed_host.to_string()),
        }));
    }

    ops
}

/// Create the webhook router.
#[must_use]
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(WEBHOOK_INGRESS_PATH, post(ingress_handler))
        .with_state(state)
}

/// Handle an Ingress admission review.
async fn ingress_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<Ingress>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<Ingress> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = admit_ingress(&state, &request).await;
    Json(response.into_review())
}

/// Process one admission request.
async fn admit_ingress(
    state: &WebhookState,
    request: &AdmissionRequest<Ingress>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);

    let Some(ingress) = &request.object else {
        return response;
    };
    let namespace = ingress.metadata.namespace.clone().unwrap_or_default();

    let zones = match state.zones.list(&namespace).await {
        Ok(zones) => zones,
        Err(e) => {
            error!(error = %e, "Failed to list managed zones, denying for retry");
            return response.deny(format!("managed zones unavailable: {e}"));
        }
    };

    match plan_admission(ingress, &zones) {
        AdmissionPlan::Deny { reason } => {
            warn!(namespace = %namespace, reason = %reason, "Rejecting Ingress");
            response.deny(reason)
        }
        AdmissionPlan::Allow => {
            if !request.dry_run {
                preissue_certificates(state, ingress, &zones, &namespace).await;
            }
            response
        }
        AdmissionPlan::Mutate { managed_host } => {
            info!(
                namespace = %namespace,
                host = %managed_host,
                "Synthesizing managed host for Ingress"
            );

            if !request.dry_run {
                if let Err(e) = state
                    .certificates
                    .ensure(&namespace, &managed_host, None)
                    .await
                {
                    warn!(error = %e, "Failed to pre-issue certificate for managed host");
                }
            }

            let ops = mutation_patch(ingress, &managed_host);
            match response.with_patch(json_patch::Patch(ops)) {
                Ok(patched) => patched,
                Err(e) => {
                    error!(error = %e, "Failed to serialize mutation patch");
                    AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
                }
            }
        }
    }
}

/// Pre-issue certificates for the hosts already inside managed zones.
async fn preissue_certificates(
    state: &WebhookState,
    ingress: &Ingress,
    zones: &[ManagedZone],
    namespace: &str,
) {
    let hosts = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .map(|rules| rules.iter().filter_map(|rule| rule.host.clone()))
        .into_iter()
        .flatten();

    for host in hosts {
        if matches!(resolve_zone(&host, zones), Ok(Some(_))) {
            if let Err(e) = state.certificates.ensure(namespace, &host, None).await {
                warn!(host = %host, error = %e, "Failed to pre-issue certificate");
            }
        }
    }
}

/// Serving certificate PEMs for the webhook.
pub struct ServingCert {
    /// Certificate chain, PEM-encoded
    pub cert_pem: String,
    /// Private key, PEM-encoded
    pub key_pem: String,
}

/// Mint a self-signed serving certificate for the webhook Service DNS names.
///
/// # Errors
///
/// Returns an error when certificate generation fails.
pub fn generate_serving_cert(namespace: &str) -> Result<ServingCert> {
    let sans = vec![
        WEBHOOK_SERVICE_NAME.to_string(),
        format!("{WEBHOOK_SERVICE_NAME}.{namespace}"),
        format!("{WEBHOOK_SERVICE_NAME}.{namespace}.svc"),
        format!("{WEBHOOK_SERVICE_NAME}.{namespace}.svc.cluster.local"),
    ];

    let certified = rcgen::generate_simple_self_signed(sans)
        .context("Failed to generate webhook serving certificate")?;

    Ok(ServingCert {
        cert_pem: certified.cert.pem(),
        key_pem: certified.key_pair.serialize_pem(),
    })
}

/// Install or update the mutating webhook configuration, injecting the CA
/// bundle of the current serving certificate.
///
/// Called at startup and again whenever the serving certificate renews, so
/// the API server always trusts the live endpoint.
///
/// # Errors
///
/// Returns an error when the configuration cannot be applied.
pub async fn ensure_webhook_config(client: &Client, namespace: &str, ca_pem: &str) -> Result<()> {
    let config = MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_CONFIGURATION_NAME.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: format!("ingress.{}", crate::constants::API_GROUP),
            admission_review_versions: vec!["v1".to_string()],
            side_effects: "NoneOnDryRun".to_string(),
            failure_policy: Some("Ignore".to_string()),
            client_config: WebhookClientConfig {
                ca_bundle: Some(k8s_openapi::ByteString(ca_pem.as_bytes().to_vec())),
                service: Some(ServiceReference {
                    name: WEBHOOK_SERVICE_NAME.to_string(),
                    namespace: namespace.to_string(),
                    path: Some(WEBHOOK_INGRESS_PATH.to_string()),
                    port: Some(i32::from(WEBHOOK_SERVER_PORT)),
                }),
                url: None,
            },
            rules: Some(vec![RuleWithOperations {
                api_groups: Some(vec!["networking.k8s.io".to_string()]),
                api_versions: Some(vec!["v1".to_string()]),
                operations: Some(vec!["CREATE".to_string(), "UPDATE".to_string()]),
                resources: Some(vec!["ingresses".to_string()]),
                scope: Some("Namespaced".to_string()),
            }]),
            ..Default::default()
        }]),
    };

    let api: Api<MutatingWebhookConfiguration> = Api::all(client.clone());
    api.patch(
        WEBHOOK_CONFIGURATION_NAME,
        &PatchParams::apply("crossgate-controller").force(),
        &Patch::Apply(&config),
    )
    .await
    .context("Failed to apply mutating webhook configuration")?;

    info!("Webhook configuration installed with current CA bundle");
    Ok(())
}

/// Serve the webhook over TLS until the process shuts down.
///
/// # Errors
///
/// Returns an error when the TLS config is rejected or the listener fails.
pub async fn run_webhook_server(state: Arc<WebhookState>, cert: &ServingCert) -> Result<()> {
    let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem(
        cert.cert_pem.clone().into_bytes(),
        cert.key_pem.clone().into_bytes(),
    )
    .await
    .context("Failed to build webhook TLS configuration")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_SERVER_PORT));
    let app = webhook_router(state);

    info!(address = %addr, "Webhook server listening");
    axum_server::bind_rustls(addr, tls_config)
        .serve(app.into_make_service())
        .await
        .context("Webhook server failed")?;
    Ok(())
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod admission_tests;
