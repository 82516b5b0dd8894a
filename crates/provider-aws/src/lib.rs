#![allow(clippy::missing_errors_doc, clippy::doc_markdown, clippy::module_name_repetitions)]

//! cloudplane AWS provider.
//!
//! Kubernetes custom resources for AWS infrastructure and the controllers
//! that keep them in sync:
//!
//! - `NodeGroup` - EKS managed node groups
//! - `Authorizer` and `APIMapping` - API Gateway v2
//! - `SNSSubscription` - SNS topic subscriptions
//!
//! Credentials come from a cluster-scoped `ProviderConfig` referenced by each
//! resource.

pub mod apis;
pub mod clients;
pub mod config;
pub mod controller;
pub mod telemetry;

pub use config::{ControllerKind, ProviderSettings};
pub use controller::run_all;
