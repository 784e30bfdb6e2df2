use std::collections::{BTreeMap, BTreeSet};

use qqbot_admin_client::{BotConfig, BotStatus, MemoryRecord, MemoryStore};

use crate::error::{Notice, ViewError};
use crate::preview::{PreviewOptions, memory_detail, memory_preview};

/// Server-backed resources that are fetched and replaced wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReloadResource {
    Status,
    Config,
    Memory,
}

impl ReloadResource {
    pub const ALL: [Self; 3] = [Self::Status, Self::Config, Self::Memory];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Config => "config",
            Self::Memory => "memory",
        }
    }
}

/// Things the dashboard can change on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutableResource {
    Config,
    Memory,
    Groups,
    Bot,
}

impl MutableResource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Memory => "memory",
            Self::Groups => "groups",
            Self::Bot => "bot",
        }
    }

    /// The resource re-fetched after a successful mutation. The group
    /// allow-list lives inside the config document and bot start/stop shows
    /// up in the status summary.
    #[must_use]
    pub fn reload_target(self) -> ReloadResource {
        match self {
            Self::Config | Self::Groups => ReloadResource::Config,
            Self::Memory => ReloadResource::Memory,
            Self::Bot => ReloadResource::Status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationPhase {
    #[default]
    Idle,
    Submitting,
    Reloading,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MutationTracker {
    submitting: u32,
    reloading: u32,
}

impl MutationTracker {
    fn phase(self) -> MutationPhase {
        if self.submitting > 0 {
            MutationPhase::Submitting
        } else if self.reloading > 0 {
            MutationPhase::Reloading
        } else {
            MutationPhase::Idle
        }
    }
}

/// Last applied value of one resource, tagged with the ticket of the fetch
/// that produced it. `issued_ticket` is the highest ticket handed out so far.
#[derive(Debug, Clone, PartialEq)]
struct ReloadSlot<T> {
    value: Option<T>,
    issued_ticket: u64,
    applied_ticket: u64,
    last_error: Option<String>,
}

impl<T> Default for ReloadSlot<T> {
    fn default() -> Self {
        Self {
            value: None,
            issued_ticket: 0,
            applied_ticket: 0,
            last_error: None,
        }
    }
}

impl<T> ReloadSlot<T> {
    fn issue(&mut self) -> u64 {
        self.issued_ticket = self.issued_ticket.saturating_add(1);
        self.issued_ticket
    }

    fn apply(&mut self, ticket: u64, value: T) -> bool {
        if ticket <= self.applied_ticket {
            return false;
        }
        self.value = Some(value);
        self.applied_ticket = ticket;
        self.issued_ticket = self.issued_ticket.max(ticket);
        self.last_error = None;
        true
    }

    /// Applies `value` under a fresh ticket, so every fetch issued earlier
    /// is stale once it settles.
    fn replace(&mut self, value: T) {
        let ticket = self.issue();
        self.apply(ticket, value);
    }

    fn apply_error(&mut self, ticket: u64, message: String) -> bool {
        if ticket <= self.applied_ticket {
            return false;
        }
        self.applied_ticket = ticket;
        self.issued_ticket = self.issued_ticket.max(ticket);
        self.last_error = Some(message);
        true
    }
}

/// Client-side copy of everything the dashboard renders.
///
/// Status, config and memory are each the most recent successful fetch; an
/// older fetch that settles late never overwrites a newer one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    status: ReloadSlot<BotStatus>,
    config: ReloadSlot<BotConfig>,
    memory: ReloadSlot<MemoryStore>,
    mutations: BTreeMap<MutableResource, MutationTracker>,
    selected_memory_id: Option<String>,
    last_notice: Option<Notice>,
}

impl ViewState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> Option<&BotStatus> {
        self.status.value.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> Option<&BotConfig> {
        self.config.value.as_ref()
    }

    #[must_use]
    pub fn memory(&self) -> Option<&MemoryStore> {
        self.memory.value.as_ref()
    }

    #[must_use]
    pub fn allowed_groups(&self) -> Option<&BTreeSet<i64>> {
        self.config().map(|config| &config.allowed_groups)
    }

    /// Sets the status outright. Fetches issued before this call are
    /// discarded when they settle.
    pub fn replace_status(&mut self, status: BotStatus) {
        self.status.replace(status);
    }

    pub fn replace_config(&mut self, config: BotConfig) {
        self.config.replace(config);
    }

    pub fn replace_memory(&mut self, memory: MemoryStore) {
        self.memory.replace(memory);
        self.drop_missing_selection();
    }

    /// Hands out the ticket for a new fetch of `resource`. Tickets only grow
    /// within one view.
    pub fn issue_ticket(&mut self, resource: ReloadResource) -> u64 {
        match resource {
            ReloadResource::Status => self.status.issue(),
            ReloadResource::Config => self.config.issue(),
            ReloadResource::Memory => self.memory.issue(),
        }
    }

    /// Applies a fetched status when `ticket` is newer than the one already
    /// applied. Returns whether the view changed.
    pub fn apply_status(&mut self, ticket: u64, status: BotStatus) -> bool {
        self.status.apply(ticket, status)
    }

    pub fn apply_config(&mut self, ticket: u64, config: BotConfig) -> bool {
        self.config.apply(ticket, config)
    }

    pub fn apply_memory(&mut self, ticket: u64, memory: MemoryStore) -> bool {
        let applied = self.memory.apply(ticket, memory);
        if applied {
            self.drop_missing_selection();
        }
        applied
    }

    /// Records a failed fetch. The previously applied value stays visible.
    pub fn apply_reload_error(
        &mut self,
        resource: ReloadResource,
        ticket: u64,
        message: impl Into<String>,
    ) -> bool {
        let message = message.into();
        match resource {
            ReloadResource::Status => self.status.apply_error(ticket, message),
            ReloadResource::Config => self.config.apply_error(ticket, message),
            ReloadResource::Memory => self.memory.apply_error(ticket, message),
        }
    }

    #[must_use]
    pub fn applied_ticket(&self, resource: ReloadResource) -> u64 {
        match resource {
            ReloadResource::Status => self.status.applied_ticket,
            ReloadResource::Config => self.config.applied_ticket,
            ReloadResource::Memory => self.memory.applied_ticket,
        }
    }

    #[must_use]
    pub fn reload_error(&self, resource: ReloadResource) -> Option<&str> {
        match resource {
            ReloadResource::Status => self.status.last_error.as_deref(),
            ReloadResource::Config => self.config.last_error.as_deref(),
            ReloadResource::Memory => self.memory.last_error.as_deref(),
        }
    }

    pub fn get_memory_record(&self, id: &str) -> Result<&MemoryRecord, ViewError> {
        self.memory()
            .and_then(|memory| memory.get(id))
            .ok_or_else(|| ViewError::MemoryNotFound { id: id.to_string() })
    }

    pub fn memory_preview(&self, id: &str, options: PreviewOptions) -> Result<String, ViewError> {
        self.get_memory_record(id)
            .map(|record| memory_preview(record, options))
    }

    pub fn memory_detail(&self, id: &str) -> Result<String, ViewError> {
        self.get_memory_record(id).map(memory_detail)
    }

    /// `(id, preview)` for every record, in id order.
    #[must_use]
    pub fn memory_previews(&self, options: PreviewOptions) -> Vec<(String, String)> {
        self.memory()
            .map(|memory| {
                memory
                    .iter()
                    .map(|(id, record)| (id.clone(), memory_preview(record, options)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Marks a memory record as the one open in the detail pane.
    pub fn select_memory(&mut self, id: &str) -> Result<(), ViewError> {
        self.get_memory_record(id)?;
        self.selected_memory_id = Some(id.to_string());
        Ok(())
    }

    pub fn clear_memory_selection(&mut self) {
        self.selected_memory_id = None;
    }

    #[must_use]
    pub fn selected_memory_id(&self) -> Option<&str> {
        self.selected_memory_id.as_deref()
    }

    #[must_use]
    pub fn mutation_phase(&self, resource: MutableResource) -> MutationPhase {
        self.mutations
            .get(&resource)
            .copied()
            .unwrap_or_default()
            .phase()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.mutations
            .values()
            .any(|tracker| tracker.phase() != MutationPhase::Idle)
    }

    #[must_use]
    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.last_notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.last_notice = None;
    }

    pub(crate) fn begin_mutation(&mut self, resource: MutableResource) {
        let tracker = self.mutations.entry(resource).or_default();
        tracker.submitting = tracker.submitting.saturating_add(1);
    }

    pub(crate) fn mutation_submitted(&mut self, resource: MutableResource) {
        let tracker = self.mutations.entry(resource).or_default();
        tracker.submitting = tracker.submitting.saturating_sub(1);
        tracker.reloading = tracker.reloading.saturating_add(1);
    }

    pub(crate) fn mutation_rejected(&mut self, resource: MutableResource) {
        let tracker = self.mutations.entry(resource).or_default();
        tracker.submitting = tracker.submitting.saturating_sub(1);
    }

    pub(crate) fn mutation_reloaded(&mut self, resource: MutableResource) {
        let tracker = self.mutations.entry(resource).or_default();
        tracker.reloading = tracker.reloading.saturating_sub(1);
    }

    fn drop_missing_selection(&mut self) {
        let still_present = match (&self.selected_memory_id, self.memory.value.as_ref()) {
            (Some(id), Some(memory)) => memory.contains_key(id),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if !still_present {
            self.selected_memory_id = None;
        }
    }
}
