// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the traffic controller.
//!
//! - [`gateway`] runs on the hub and drives certificates, DNS and status
//! - [`ingress`] runs in each data-plane cluster and contributes that
//!   cluster's endpoints
//! - [`finalizers`], [`status`] and [`retry`] are shared plumbing

pub mod finalizers;
pub mod gateway;
pub mod ingress;
pub mod retry;
pub mod status;

pub use gateway::reconcile_gateway;
pub use ingress::reconcile_ingress;
pub use retry::{default_backoff, is_retryable_error, retry_api_call};
