//! HTTP implementation of the Upload and Status Services.
//!
//! - Multipart upload with retry on transient failures
//! - Status lookup mapping 404 to `ClientError::NotFound`
//! - Tracing spans and request metrics around every call

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use reel_models::RemoteStatus;

use crate::config::ServiceConfig;
use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;
use crate::retry::with_retry;
use crate::service::{StatusService, SubmitMetadata, SubmitReceipt, UploadService};

/// Upper bound on a server-requested `Retry-After` wait.
pub const MAX_RETRY_AFTER_MS: u64 = 60_000;

/// Client for the upload API.
#[derive(Clone)]
pub struct ReelApiClient {
    http: Client,
    config: ServiceConfig,
}

impl ReelApiClient {
    /// Create a new client.
    pub fn new(config: ServiceConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("reel-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ServiceConfig::from_env()?)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn upload_url(&self) -> String {
        format!("{}/videos/upload", self.config.base_url)
    }

    fn status_url(&self, server_id: &str) -> String {
        format!(
            "{}/videos/{}/status",
            self.config.base_url,
            urlencoding::encode(server_id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn submit_once(&self, media: Bytes, metadata: &SubmitMetadata) -> ClientResult<SubmitReceipt> {
        let url = self.upload_url();

        let len = media.len() as u64;
        let part = Part::stream_with_length(media, len)
            .file_name(metadata.file_name())
            .mime_str(&metadata.media_type)?;

        let mut form = Form::new()
            .part("file", part)
            .text("title", metadata.title.clone())
            .text("type", metadata.media_type.clone());
        if let Some(duration) = metadata.duration_secs {
            form = form.text("duration", duration.to_string());
        }
        if let Some(job_id) = &metadata.related_job_id {
            form = form.text("jobId", job_id.clone());
        }

        let started = Instant::now();
        let response = self.authorize(self.http.post(&url)).multipart(form).send().await?;
        let status = response.status();
        record_request("submit", status.as_u16(), started.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            return Err(Self::error_from_response(status, &url, response).await);
        }

        let body = response.text().await?;
        let receipt: SubmitReceipt = serde_json::from_str(&body)
            .map_err(|e| ClientError::invalid_response(format!("upload receipt: {}", e)))?;

        if receipt.server_id.trim().is_empty() {
            return Err(ClientError::invalid_response("upload receipt has an empty id"));
        }

        debug!(server_id = %receipt.server_id, "Upload accepted");
        Ok(receipt)
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> ClientError {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait_ms = retry_after_secs
                .map(|s| s.saturating_mul(1000).min(MAX_RETRY_AFTER_MS))
                .unwrap_or(1000);
            return ClientError::RateLimited(wait_ms);
        }

        ClientError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[async_trait]
impl UploadService for ReelApiClient {
    async fn submit(&self, media: Bytes, metadata: &SubmitMetadata) -> ClientResult<SubmitReceipt> {
        let span = info_span!("reel_submit", title = %metadata.title, bytes = media.len());

        with_retry(&self.config.retry, "submit", || self.submit_once(media.clone(), metadata))
            .instrument(span)
            .await
    }
}

#[async_trait]
impl StatusService for ReelApiClient {
    async fn get_status(&self, server_id: &str) -> ClientResult<RemoteStatus> {
        let url = self.status_url(server_id);
        let span = info_span!("reel_status", upload_id = %server_id);

        async {
            let started = Instant::now();
            let response = self.authorize(self.http.get(&url)).send().await?;
            let status = response.status();
            record_request("get_status", status.as_u16(), started.elapsed().as_secs_f64() * 1000.0);

            match status {
                StatusCode::OK => {
                    let body = response.text().await?;
                    serde_json::from_str::<RemoteStatus>(&body)
                        .map_err(|e| ClientError::invalid_response(format!("status payload: {}", e)))
                }
                StatusCode::NOT_FOUND => Err(ClientError::not_found(server_id)),
                _ => Err(Self::error_from_response(status, &url, response).await),
            }
        }
        .instrument(span)
        .await
    }
}
