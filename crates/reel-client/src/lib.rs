//! Upload and Status Service clients.
//!
//! This crate provides:
//! - `UploadService` / `StatusService` traits the tracker depends on
//! - A reqwest-backed implementation of both (`ReelApiClient`)
//! - Error classification (transient vs. not found vs. permanent)
//! - Exponential backoff with jitter for submissions
//! - Request metrics

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod retry;
pub mod service;

#[cfg(test)]
mod client_tests;

pub use config::ServiceConfig;
pub use error::{ClientError, ClientResult};
pub use http::ReelApiClient;
pub use retry::{with_retry, RetryConfig};
pub use service::{StatusService, SubmitMetadata, SubmitReceipt, UploadService};
