//! View state and fetch/mutate/reload orchestration for the QQ bot admin
//! dashboard.
//!
//! [`SyncController`] owns a [`ViewState`] and never edits it optimistically:
//! every accepted mutation is followed by a re-fetch of the affected resource,
//! and responses that arrive after a newer one, or after [`SyncController::teardown`],
//! are discarded.

mod error;
mod poller;
mod preview;
mod sync;
mod view_state;

pub use error::{
    Notice, NoticeKind, SyncError, ValidationError, ViewError, parse_group_id,
    validate_config_patch,
};
pub use poller::{
    DEFAULT_STATUS_POLL_INTERVAL_MS, ENV_STATUS_POLL_MS, MIN_STATUS_POLL_INTERVAL_MS,
    POLL_INTERVAL_SOURCE_DEFAULT, POLL_INTERVAL_SOURCE_EXPLICIT, POLL_INTERVAL_SOURCE_INVALID_ENV,
    ResolvedPollInterval, StatusPoller, resolve_status_poll_interval, spawn_status_poller,
};
pub use preview::{
    EMPTY_DETAIL, EMPTY_PREVIEW, PREVIEW_CHAR_LIMIT, PREVIEW_FIELD_LIMIT, PreviewOptions,
    memory_detail, memory_preview,
};
pub use sync::{ReloadOutcome, SyncController};
pub use view_state::{MutableResource, MutationPhase, ReloadResource, ViewState};
