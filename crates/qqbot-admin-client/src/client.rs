use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::settings::{AdminClientSettings, MIN_TIMEOUT_MS, normalize_base_url};
use crate::types::{
    ActionResponse, AddGroupRequest, BotConfig, BotStatus, ConfigPatch, MemoryStore,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct BotAdminClientConfig {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
}

impl BotAdminClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: None,
        }
    }
}

impl From<&AdminClientSettings> for BotAdminClientConfig {
    fn from(settings: &AdminClientSettings) -> Self {
        Self {
            base_url: settings.base_url.base_url.clone(),
            timeout_ms: settings.timeout_ms,
        }
    }
}

#[derive(Debug, Error)]
pub enum AdminClientError {
    #[error("admin_client_base_url_missing")]
    BaseUrlMissing,
    #[error("admin_client_base_url_invalid")]
    InvalidBaseUrl,
    #[error("admin_client_invalid_path")]
    InvalidPath,
    #[error("admin_request_failed:{message}")]
    Request { message: String },
    #[error("admin_read_failed:{message}")]
    Read { message: String },
    #[error("admin_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("admin_json_decode_failed:{message}")]
    Decode { message: String },
}

/// The backend REST surface the dashboard drives.
///
/// Every call is a single attempt: no retries, no client-side caching.
#[async_trait]
pub trait BotAdminApi: Send + Sync {
    async fn get_status(&self) -> Result<BotStatus, AdminClientError>;
    async fn get_config(&self) -> Result<BotConfig, AdminClientError>;
    async fn save_config(&self, patch: &ConfigPatch) -> Result<ActionResponse, AdminClientError>;
    async fn list_memory(&self) -> Result<MemoryStore, AdminClientError>;
    async fn delete_memory(&self, memory_id: &str) -> Result<ActionResponse, AdminClientError>;
    async fn add_group(&self, group_id: i64) -> Result<ActionResponse, AdminClientError>;
    async fn remove_group(&self, group_id: i64) -> Result<ActionResponse, AdminClientError>;
    async fn start_bot(&self) -> Result<ActionResponse, AdminClientError>;
    async fn stop_bot(&self) -> Result<ActionResponse, AdminClientError>;
}

#[derive(Debug, Clone)]
pub struct BotAdminClient {
    base_url: String,
    timeout: Option<Duration>,
    http: reqwest::Client,
}

impl BotAdminClient {
    pub fn new(config: BotAdminClientConfig) -> Result<Self, AdminClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: config
                .timeout_ms
                .map(|timeout_ms| Duration::from_millis(timeout_ms.max(MIN_TIMEOUT_MS))),
            http: reqwest::Client::new(),
        })
    }

    pub fn from_settings(settings: &AdminClientSettings) -> Result<Self, AdminClientError> {
        Self::new(BotAdminClientConfig::from(settings))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    /// Collection endpoint with one extra, percent-encoded path segment.
    pub fn entry_url(&self, collection: &str, entry_id: &str) -> Result<Url, AdminClientError> {
        let entry_id = entry_id.trim();
        if entry_id.is_empty() {
            return Err(AdminClientError::InvalidPath);
        }
        let collection_url = self
            .endpoint(collection)
            .ok_or(AdminClientError::InvalidPath)?;
        let mut url = Url::parse(&collection_url).map_err(|_| AdminClientError::InvalidPath)?;
        url.path_segments_mut()
            .map_err(|()| AdminClientError::InvalidPath)?
            .pop_if_empty()
            .push(entry_id);
        Ok(url)
    }

    #[must_use]
    pub fn status_path() -> &'static str {
        "/api/status"
    }

    #[must_use]
    pub fn config_path() -> &'static str {
        "/api/config"
    }

    #[must_use]
    pub fn memory_path() -> &'static str {
        "/api/memory"
    }

    #[must_use]
    pub fn groups_path() -> &'static str {
        "/api/groups"
    }

    #[must_use]
    pub fn group_path(group_id: i64) -> String {
        format!("/api/groups/{group_id}")
    }

    #[must_use]
    pub fn bot_start_path() -> &'static str {
        "/api/bot/start"
    }

    #[must_use]
    pub fn bot_stop_path() -> &'static str {
        "/api/bot/stop"
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, AdminClientError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(AdminClientError::InvalidPath)?;
        let response = self.send(Method::GET, url.as_str(), None::<&()>).await?;
        decode_json_response(response).await
    }

    pub async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, AdminClientError>
    where
        Req: Serialize + ?Sized,
        Res: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(AdminClientError::InvalidPath)?;
        let response = self.send(Method::POST, url.as_str(), Some(payload)).await?;
        decode_json_response(response).await
    }

    pub async fn post_empty<Res>(&self, path: &str) -> Result<Res, AdminClientError>
    where
        Res: for<'de> serde::Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(AdminClientError::InvalidPath)?;
        let response = self.send(Method::POST, url.as_str(), None::<&()>).await?;
        decode_json_response(response).await
    }

    pub async fn delete_json<Res>(&self, url: &str) -> Result<Res, AdminClientError>
    where
        Res: for<'de> serde::Deserialize<'de>,
    {
        let response = self.send(Method::DELETE, url, None::<&()>).await?;
        decode_json_response(response).await
    }

    async fn send<B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, AdminClientError>
    where
        B: Serialize + ?Sized,
    {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        tracing::debug!(%method, %url, request_id = %request_id, "admin api request");

        let mut request = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|error| {
            tracing::debug!(request_id = %request_id, error = %error, "admin api request failed");
            AdminClientError::Request {
                message: error.to_string(),
            }
        })
    }
}

#[async_trait]
impl BotAdminApi for BotAdminClient {
    async fn get_status(&self) -> Result<BotStatus, AdminClientError> {
        self.get_json(Self::status_path()).await
    }

    async fn get_config(&self) -> Result<BotConfig, AdminClientError> {
        self.get_json(Self::config_path()).await
    }

    async fn save_config(&self, patch: &ConfigPatch) -> Result<ActionResponse, AdminClientError> {
        self.post_json(Self::config_path(), patch).await
    }

    async fn list_memory(&self) -> Result<MemoryStore, AdminClientError> {
        self.get_json(Self::memory_path()).await
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<ActionResponse, AdminClientError> {
        let url = self.entry_url(Self::memory_path(), memory_id)?;
        self.delete_json(url.as_str()).await
    }

    async fn add_group(&self, group_id: i64) -> Result<ActionResponse, AdminClientError> {
        self.post_json(Self::groups_path(), &AddGroupRequest { group_id })
            .await
    }

    async fn remove_group(&self, group_id: i64) -> Result<ActionResponse, AdminClientError> {
        let url = self
            .endpoint(Self::group_path(group_id).as_str())
            .ok_or(AdminClientError::InvalidPath)?;
        self.delete_json(url.as_str()).await
    }

    async fn start_bot(&self) -> Result<ActionResponse, AdminClientError> {
        self.post_empty(Self::bot_start_path()).await
    }

    async fn stop_bot(&self) -> Result<ActionResponse, AdminClientError> {
        self.post_empty(Self::bot_stop_path()).await
    }
}

pub fn format_http_error(status: StatusCode, body: &[u8]) -> AdminClientError {
    let body = non_empty_string(String::from_utf8_lossy(body).to_string())
        .unwrap_or_else(|| "<empty>".to_string());
    AdminClientError::Http { status, body }
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, AdminClientError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| AdminClientError::Read {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        return Err(format_http_error(status, &bytes));
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| AdminClientError::Decode {
        message: error.to_string(),
    })
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
