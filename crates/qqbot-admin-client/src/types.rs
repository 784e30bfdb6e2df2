use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const DEFAULT_MESSAGE_COUNT: u32 = 1;
pub const DEFAULT_HISTORY_TIMEOUT_SECONDS: u64 = 600;
pub const DEFAULT_REPLY_PROBABILITY_PERCENT: u32 = 0;
pub const MAX_REPLY_PROBABILITY_PERCENT: u32 = 100;
pub const STATUS_ONLINE: &str = "online";

/// Snapshot of the bot process as reported by `GET /api/status`.
///
/// Always replaced wholesale; there is no partial merge between polls.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "StatusPayload")]
pub struct BotStatus {
    pub online: bool,
    pub last_activity: String,
    pub memory_count: u64,
    pub current_model: String,
    pub connections: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    last_activity: String,
    #[serde(default, deserialize_with = "null_as_default")]
    memory_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    current_llm: String,
    #[serde(default, deserialize_with = "null_as_default")]
    connections: Map<String, Value>,
}

impl From<StatusPayload> for BotStatus {
    fn from(payload: StatusPayload) -> Self {
        Self {
            online: payload.status.trim().eq_ignore_ascii_case(STATUS_ONLINE),
            last_activity: payload.last_activity,
            memory_count: payload.memory_count,
            current_model: payload.current_llm,
            connections: payload.connections,
        }
    }
}

/// One entry of the model table. Keys other than `NAME` (API keys, base
/// URLs) are carried through untouched so a full resubmit does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(rename = "NAME", default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Editable bot configuration as served by `GET /api/config`.
///
/// Absent or null keys are defaulted here, at the parse boundary, rather than
/// trusted to the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BotConfig {
    #[serde(rename = "WEBSOCKET_URI", default, deserialize_with = "null_as_default")]
    pub websocket_uri: String,
    #[serde(rename = "SELF_USER_ID", default, deserialize_with = "id_text_or_default")]
    pub self_user_id: String,
    #[serde(
        rename = "MESSAGE_COUNT",
        default = "default_message_count",
        deserialize_with = "message_count_or_default"
    )]
    pub message_count: u32,
    #[serde(
        rename = "HISTORY_TIMEOUT",
        default = "default_history_timeout",
        deserialize_with = "history_timeout_or_default"
    )]
    pub history_timeout_seconds: u64,
    #[serde(
        rename = "RAN_REP_PROBABILITY",
        default,
        deserialize_with = "null_as_default"
    )]
    pub reply_probability_percent: u32,
    #[serde(rename = "PROMPT", default, deserialize_with = "null_as_default")]
    pub prompts: Vec<String>,
    #[serde(rename = "CURRENT_PROMPT", default, deserialize_with = "null_as_default")]
    pub selected_prompt_index: usize,
    #[serde(rename = "LLM", default, deserialize_with = "null_as_default")]
    pub models: BTreeMap<String, ModelEntry>,
    #[serde(
        rename = "CURRENT_COMPLETION",
        default,
        deserialize_with = "null_as_default"
    )]
    pub selected_model_key: String,
    #[serde(rename = "ALLOWED_GROUPS", default, deserialize_with = "group_id_set")]
    pub allowed_groups: BTreeSet<i64>,
    #[serde(rename = "TARGET_USER_ID", default, deserialize_with = "optional_id_text")]
    pub target_user_id: Option<String>,
    #[serde(rename = "EMOJI_POOL", default, deserialize_with = "null_as_default")]
    pub emoji_pool: Vec<String>,
    #[serde(rename = "CURRENT_LLM", default)]
    pub current_llm: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            websocket_uri: String::new(),
            self_user_id: String::new(),
            message_count: DEFAULT_MESSAGE_COUNT,
            history_timeout_seconds: DEFAULT_HISTORY_TIMEOUT_SECONDS,
            reply_probability_percent: DEFAULT_REPLY_PROBABILITY_PERCENT,
            prompts: Vec::new(),
            selected_prompt_index: 0,
            models: BTreeMap::new(),
            selected_model_key: String::new(),
            allowed_groups: BTreeSet::new(),
            target_user_id: None,
            emoji_pool: Vec::new(),
            current_llm: None,
        }
    }
}

impl BotConfig {
    #[must_use]
    pub fn selected_prompt(&self) -> Option<&str> {
        self.prompts
            .get(self.selected_prompt_index)
            .map(String::as_str)
    }

    #[must_use]
    pub fn selected_model(&self) -> Option<&ModelEntry> {
        self.models.get(self.selected_model_key.as_str())
    }
}

/// Body of `POST /api/config`. Only the fields that are `Some` go on the wire.
///
/// The server treats the body as a whole-object overwrite of the keys it
/// carries, so a patch built with [`ConfigPatch::from`] resubmits every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigPatch {
    #[serde(rename = "WEBSOCKET_URI", skip_serializing_if = "Option::is_none")]
    pub websocket_uri: Option<String>,
    #[serde(
        rename = "SELF_USER_ID",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_id"
    )]
    pub self_user_id: Option<String>,
    #[serde(rename = "MESSAGE_COUNT", skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
    #[serde(rename = "HISTORY_TIMEOUT", skip_serializing_if = "Option::is_none")]
    pub history_timeout_seconds: Option<u64>,
    #[serde(rename = "RAN_REP_PROBABILITY", skip_serializing_if = "Option::is_none")]
    pub reply_probability_percent: Option<u32>,
    #[serde(rename = "PROMPT", skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,
    #[serde(rename = "CURRENT_PROMPT", skip_serializing_if = "Option::is_none")]
    pub selected_prompt_index: Option<usize>,
    #[serde(rename = "LLM", skip_serializing_if = "Option::is_none")]
    pub models: Option<BTreeMap<String, ModelEntry>>,
    #[serde(rename = "CURRENT_COMPLETION", skip_serializing_if = "Option::is_none")]
    pub selected_model_key: Option<String>,
    #[serde(rename = "ALLOWED_GROUPS", skip_serializing_if = "Option::is_none")]
    pub allowed_groups: Option<BTreeSet<i64>>,
    #[serde(
        rename = "TARGET_USER_ID",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_id"
    )]
    pub target_user_id: Option<String>,
    #[serde(rename = "EMOJI_POOL", skip_serializing_if = "Option::is_none")]
    pub emoji_pool: Option<Vec<String>>,
}

impl ConfigPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&BotConfig> for ConfigPatch {
    fn from(config: &BotConfig) -> Self {
        Self {
            websocket_uri: Some(config.websocket_uri.clone()),
            self_user_id: Some(config.self_user_id.clone()),
            message_count: Some(config.message_count),
            history_timeout_seconds: Some(config.history_timeout_seconds),
            reply_probability_percent: Some(config.reply_probability_percent),
            prompts: Some(config.prompts.clone()),
            selected_prompt_index: Some(config.selected_prompt_index),
            models: Some(config.models.clone()),
            selected_model_key: Some(config.selected_model_key.clone()),
            allowed_groups: Some(config.allowed_groups.clone()),
            target_user_id: config.target_user_id.clone(),
            emoji_pool: (!config.emoji_pool.is_empty()).then(|| config.emoji_pool.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddGroupRequest {
    #[serde(rename = "groupId")]
    pub group_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Info,
    #[default]
    #[serde(other)]
    Error,
}

impl ActionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// `{status, message?}` envelope returned by every mutating endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub status: ActionStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionResponse {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// One memory entry: field name to text, kept in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryRecord {
    fields: Map<String, Value>,
}

impl MemoryRecord {
    pub fn from_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), Value::String(value.into())))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn field_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.fields.get(key).map(value_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Cow<'_, str>)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value_text(value)))
    }
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(text) => Cow::Borrowed(text.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Memory listing keyed by memory id. Ids carry no ordering from the server.
pub type MemoryStore = BTreeMap<String, MemoryRecord>;

fn default_message_count() -> u32 {
    DEFAULT_MESSAGE_COUNT
}

fn default_history_timeout() -> u64 {
    DEFAULT_HISTORY_TIMEOUT_SECONDS
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn message_count_or_default<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(DEFAULT_MESSAGE_COUNT))
}

fn history_timeout_or_default<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(DEFAULT_HISTORY_TIMEOUT_SECONDS))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl IdRepr {
    fn into_text(self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Text(text) => text.trim().to_string(),
        }
    }
}

fn id_text_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .map(IdRepr::into_text)
        .unwrap_or_default())
}

fn optional_id_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .map(IdRepr::into_text)
        .filter(|text| !text.is_empty()))
}

fn group_id_set<'de, D>(deserializer: D) -> Result<BTreeSet<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<IdRepr>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|id| match id {
            IdRepr::Int(value) => Ok(value),
            IdRepr::Text(text) => text.trim().parse::<i64>().map_err(|_| {
                serde::de::Error::custom(format!("group id is not an integer: {text}"))
            }),
        })
        .collect()
}

// The backend stores user ids as integers; numeric text goes out as a number.
fn serialize_optional_id<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value.as_deref().map(str::trim) {
        Some(text) => match text.parse::<i64>() {
            Ok(number) => serializer.serialize_i64(number),
            Err(_) => serializer.serialize_str(text),
        },
        None => serializer.serialize_none(),
    }
}
