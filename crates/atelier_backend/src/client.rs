//! HTTP client for ComfyUI-compatible servers.

use crate::{
    BackendConfig, GenerationBackend, HistoryEntry, PromptAccepted, PromptSubmission,
    UploadedImage, rejection_message, summarize_node_errors,
};
use async_trait::async_trait;
use atelier_core::FlatGraph;
use atelier_error::{AtelierResult, BackendError, BackendErrorKind};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tracing::{debug, error, instrument, warn};

/// Client for a node-graph execution server.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ComfyClient {
    config: BackendConfig,
    base_url: String,
    client_id: String,
    client: reqwest::Client,
}

impl ComfyClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Fails when the base URL does not parse or the HTTP client cannot be built.
    #[instrument(skip(config), fields(base_url = %config.base_url))]
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        debug!("Creating backend client");

        let parsed = url::Url::parse(&config.base_url).map_err(|e| {
            BackendError::new(BackendErrorKind::InvalidUrl(format!(
                "{}: {}",
                config.base_url, e
            )))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(BackendError::new(BackendErrorKind::InvalidUrl(
                config.base_url.clone(),
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                BackendError::new(BackendErrorKind::Connection(format!(
                    "Failed to build HTTP client: {}",
                    e
                )))
            })?;

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            client_id,
            client,
        })
    }

    /// Get the backend configuration
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Client id sent with every submission.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[track_caller]
    fn connection_error(context: &str, err: reqwest::Error) -> BackendError {
        error!("{} failed: {}", context, err);
        BackendError::new(BackendErrorKind::Connection(format!(
            "{} failed: {}",
            context, err
        )))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<(), BackendError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::connection_error(path, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "{} returned error", path);
        Err(BackendError::new(BackendErrorKind::Api {
            status: status.as_u16(),
            message: text,
        }))
    }
}

#[async_trait]
impl GenerationBackend for ComfyClient {
    #[instrument(skip(self, graph), fields(nodes = graph.len()))]
    async fn submit(&self, graph: &FlatGraph) -> AtelierResult<String> {
        let prompt = graph.to_value();
        let body = PromptSubmission {
            prompt: &prompt,
            client_id: &self.client_id,
        };

        let response = self
            .client
            .post(self.url("/prompt"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::connection_error("Submission", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::connection_error("Reading submission response", e))?;

        if !status.is_success() {
            let message = rejection_message(&text);
            warn!(status = status.as_u16(), %message, "Submission rejected");
            return Err(BackendError::new(BackendErrorKind::SubmissionRejected(message)).into());
        }

        let accepted: PromptAccepted = serde_json::from_str(&text).map_err(|e| {
            BackendError::new(BackendErrorKind::UnexpectedResponse(format!(
                "Submission response missing prompt_id: {}",
                e
            )))
        })?;

        if let Some(summary) = summarize_node_errors(&accepted.node_errors) {
            warn!(%summary, "Submission accepted with node errors");
            return Err(BackendError::new(BackendErrorKind::SubmissionRejected(summary)).into());
        }

        debug!(job_id = %accepted.prompt_id, queue_number = ?accepted.number, "Submission accepted");
        Ok(accepted.prompt_id)
    }

    #[instrument(skip(self))]
    async fn history(&self, job_id: &str) -> AtelierResult<Option<HistoryEntry>> {
        let response = self
            .client
            .get(self.url(&format!("/history/{}", job_id)))
            .send()
            .await
            .map_err(|e| Self::connection_error("History request", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::new(BackendErrorKind::Api {
                status: status.as_u16(),
                message: text,
            })
            .into());
        }

        let body: Value = response.json().await.map_err(|e| {
            BackendError::new(BackendErrorKind::UnexpectedResponse(format!(
                "History is not JSON: {}",
                e
            )))
        })?;

        let entry = HistoryEntry::from_history(&body, job_id).map_err(|e| {
            BackendError::new(BackendErrorKind::UnexpectedResponse(format!(
                "Malformed history entry: {}",
                e
            )))
        })?;
        Ok(entry)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_image(&self, filename: &str, bytes: Vec<u8>) -> AtelierResult<UploadedImage> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))
            .map_err(|e| {
                BackendError::new(BackendErrorKind::UploadRejected {
                    status: 0,
                    message: e.to_string(),
                })
            })?;
        let form = Form::new()
            .part("image", part)
            .text("type", "input")
            .text("overwrite", "true");

        let response = self
            .client
            .post(self.url("/upload/image"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::connection_error("Upload", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Upload rejected");
            return Err(BackendError::new(BackendErrorKind::UploadRejected {
                status: status.as_u16(),
                message: text,
            })
            .into());
        }

        let uploaded: UploadedImage = response.json().await.map_err(|e| {
            BackendError::new(BackendErrorKind::UnexpectedResponse(format!(
                "Upload response missing name: {}",
                e
            )))
        })?;
        debug!(handle = %uploaded.handle(), "Uploaded image");
        Ok(uploaded)
    }

    #[instrument(skip(self))]
    async fn delete_queued(&self, job_id: &str) -> AtelierResult<()> {
        self.post_json("/queue", &json!({ "delete": [job_id] }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn interrupt(&self) -> AtelierResult<()> {
        self.post_json("/interrupt", &json!({})).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> AtelierResult<()> {
        let url = self.url("/system_stats");
        debug!("Checking backend health at {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connection_error("Health check", e))?;

        if response.status().is_success() {
            debug!("Backend is healthy");
            Ok(())
        } else {
            let status = response.status();
            error!("Backend health check returned error: {}", status);
            Err(BackendError::new(BackendErrorKind::Api {
                status: status.as_u16(),
                message: format!("Backend returned: {}", status),
            })
            .into())
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
