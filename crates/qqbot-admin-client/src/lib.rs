//! Typed client for the QQ bot admin backend.
//!
//! Wire payloads are parsed into [`BotStatus`], [`BotConfig`] and
//! [`MemoryStore`] with defaults applied on this side of the boundary.

mod client;
mod settings;
mod types;

pub use client::{
    AdminClientError, BotAdminApi, BotAdminClient, BotAdminClientConfig, REQUEST_ID_HEADER,
    format_http_error,
};
pub use settings::{
    AdminClientSettings, BASE_URL_SOURCE_DEFAULT_LOCAL, BASE_URL_SOURCE_EXPLICIT,
    DEFAULT_ADMIN_BASE_URL, ENV_ADMIN_BASE_URL, ENV_ADMIN_TIMEOUT_MS, MIN_TIMEOUT_MS,
    ResolvedBaseUrl, normalize_base_url, resolve_admin_base_url, resolve_timeout_ms,
};
pub use types::{
    ActionResponse, ActionStatus, AddGroupRequest, BotConfig, BotStatus, ConfigPatch,
    DEFAULT_HISTORY_TIMEOUT_SECONDS, DEFAULT_MESSAGE_COUNT, DEFAULT_REPLY_PROBABILITY_PERCENT,
    MAX_REPLY_PROBABILITY_PERCENT, MemoryRecord, MemoryStore, ModelEntry, STATUS_ONLINE,
};
