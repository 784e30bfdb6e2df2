use crate::client::AdminClientError;

pub const DEFAULT_ADMIN_BASE_URL: &str = "http://127.0.0.1:5000";
pub const ENV_ADMIN_BASE_URL: &str = "QQBOT_ADMIN_BASE_URL";
pub const ENV_ADMIN_TIMEOUT_MS: &str = "QQBOT_ADMIN_TIMEOUT_MS";
pub const BASE_URL_SOURCE_DEFAULT_LOCAL: &str = "default_local";
pub const BASE_URL_SOURCE_EXPLICIT: &str = "explicit";
pub const MIN_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBaseUrl {
    pub base_url: String,
    pub source: String,
}

/// Where the admin client points and how long it waits.
///
/// `timeout_ms: None` means requests never time out on the client side; a
/// failure only surfaces when the transport rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminClientSettings {
    pub base_url: ResolvedBaseUrl,
    pub timeout_ms: Option<u64>,
}

impl AdminClientSettings {
    pub fn from_env() -> Result<Self, AdminClientError> {
        Ok(Self {
            base_url: resolve_admin_base_url(None)?,
            timeout_ms: resolve_timeout_ms(None),
        })
    }

    /// Explicit values (typically command-line flags) win over the environment.
    pub fn resolve(
        explicit_base_url: Option<&str>,
        explicit_timeout_ms: Option<u64>,
    ) -> Result<Self, AdminClientError> {
        Ok(Self {
            base_url: resolve_admin_base_url(explicit_base_url)?,
            timeout_ms: resolve_timeout_ms(explicit_timeout_ms),
        })
    }
}

pub fn resolve_admin_base_url(explicit: Option<&str>) -> Result<ResolvedBaseUrl, AdminClientError> {
    if let Some(base_url) = explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Ok(ResolvedBaseUrl {
            base_url: normalize_base_url(base_url)?,
            source: BASE_URL_SOURCE_EXPLICIT.to_string(),
        });
    }

    if let Some(base_url) = env_non_empty(ENV_ADMIN_BASE_URL) {
        return Ok(ResolvedBaseUrl {
            base_url: normalize_base_url(&base_url)?,
            source: ENV_ADMIN_BASE_URL.to_string(),
        });
    }

    Ok(ResolvedBaseUrl {
        base_url: normalize_base_url(DEFAULT_ADMIN_BASE_URL)?,
        source: BASE_URL_SOURCE_DEFAULT_LOCAL.to_string(),
    })
}

#[must_use]
pub fn resolve_timeout_ms(explicit: Option<u64>) -> Option<u64> {
    explicit
        .or_else(|| env_non_empty(ENV_ADMIN_TIMEOUT_MS).and_then(|raw| raw.parse::<u64>().ok()))
        .map(|timeout_ms| timeout_ms.max(MIN_TIMEOUT_MS))
}

pub fn normalize_base_url(raw: &str) -> Result<String, AdminClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(AdminClientError::BaseUrlMissing);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AdminClientError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(AdminClientError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(AdminClientError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
