use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use qqbot_admin_client::{ActionResponse, ActionStatus, AdminClientError, BotAdminApi, ConfigPatch};
use tokio::sync::watch;

use crate::error::{
    Notice, NoticeKind, SyncError, ValidationError, parse_group_id, require_memory_id,
    validate_config_patch,
};
use crate::view_state::{MutableResource, ReloadResource, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied,
    /// A newer fetch of the same resource already settled, or the session
    /// that issued this fetch was torn down.
    Discarded,
    Failed { message: String },
}

impl ReloadOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct ReloadTicket {
    resource: ReloadResource,
    sequence: u64,
    generation: u64,
}

/// Drives the fetch, mutate and reload cycle against a [`BotAdminApi`] and
/// keeps a [`ViewState`] current.
///
/// Every mutation is followed by a re-fetch of the resource that displays it;
/// there are no optimistic local edits. The view lock is only taken between
/// awaits.
pub struct SyncController<A> {
    api: A,
    view: Mutex<ViewState>,
    generation: AtomicU64,
    revision: watch::Sender<u64>,
}

impl<A: BotAdminApi> SyncController<A> {
    pub fn new(api: A) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            api,
            view: Mutex::new(ViewState::new()),
            generation: AtomicU64::new(0),
            revision,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Copy of the current view.
    pub fn view(&self) -> ViewState {
        self.lock_view().clone()
    }

    pub fn with_view<R>(&self, read: impl FnOnce(&ViewState) -> R) -> R {
        read(&self.lock_view())
    }

    /// Ticks every time the view changes. Renderers await this instead of
    /// polling the view.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Ends the current session. Responses to requests issued before this
    /// call are dropped when they settle, and the view starts over empty.
    pub fn teardown(&self) {
        let generation = {
            let mut view = self.lock_view();
            *view = ViewState::new();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.bump_revision();
        tracing::debug!(generation, "admin dashboard session torn down");
    }

    /// Fetches status, config and memory concurrently.
    pub async fn initial_load(&self) -> [ReloadOutcome; 3] {
        let (status, config, memory) = tokio::join!(
            self.refresh_status(),
            self.reload_config(),
            self.reload_memory()
        );
        [status, config, memory]
    }

    pub async fn refresh_status(&self) -> ReloadOutcome {
        let ticket = self.issue(ReloadResource::Status);
        let result = self.api.get_status().await;
        self.settle(ticket, result, ViewState::apply_status)
    }

    pub async fn reload_config(&self) -> ReloadOutcome {
        let ticket = self.issue(ReloadResource::Config);
        let result = self.api.get_config().await;
        self.settle(ticket, result, ViewState::apply_config)
    }

    pub async fn reload_memory(&self) -> ReloadOutcome {
        let ticket = self.issue(ReloadResource::Memory);
        let result = self.api.list_memory().await;
        self.settle(ticket, result, ViewState::apply_memory)
    }

    pub async fn reload(&self, resource: ReloadResource) -> ReloadOutcome {
        match resource {
            ReloadResource::Status => self.refresh_status().await,
            ReloadResource::Config => self.reload_config().await,
            ReloadResource::Memory => self.reload_memory().await,
        }
    }

    /// Validates the patch, saves it and re-fetches the config.
    pub async fn save_config(&self, patch: &ConfigPatch) -> Notice {
        if let Err(error) = validate_config_patch(patch) {
            return self.reject("save config", error);
        }
        self.mutate(
            MutableResource::Config,
            "save config",
            "configuration saved",
            self.api.save_config(patch),
        )
        .await
    }

    pub async fn delete_memory(&self, id: &str) -> Notice {
        let id = match require_memory_id(id) {
            Ok(id) => id,
            Err(error) => return self.reject("delete memory", error),
        };
        self.mutate(
            MutableResource::Memory,
            "delete memory",
            &format!("memory {id} deleted"),
            self.api.delete_memory(id),
        )
        .await
    }

    /// Adds a group to the allow-list. `raw` must parse as an integer;
    /// otherwise nothing is sent.
    pub async fn add_group(&self, raw: &str) -> Notice {
        let group_id = match parse_group_id(raw) {
            Ok(group_id) => group_id,
            Err(error) => return self.reject("add group", error),
        };
        self.mutate(
            MutableResource::Groups,
            "add group",
            &format!("group {group_id} added"),
            self.api.add_group(group_id),
        )
        .await
    }

    pub async fn remove_group(&self, group_id: i64) -> Notice {
        self.mutate(
            MutableResource::Groups,
            "remove group",
            &format!("group {group_id} removed"),
            self.api.remove_group(group_id),
        )
        .await
    }

    pub async fn start_bot(&self) -> Notice {
        self.mutate(
            MutableResource::Bot,
            "start bot",
            "bot started",
            self.api.start_bot(),
        )
        .await
    }

    pub async fn stop_bot(&self) -> Notice {
        self.mutate(
            MutableResource::Bot,
            "stop bot",
            "bot stopped",
            self.api.stop_bot(),
        )
        .await
    }

    async fn mutate<F>(
        &self,
        resource: MutableResource,
        action: &str,
        success_fallback: &str,
        submit: F,
    ) -> Notice
    where
        F: Future<Output = Result<ActionResponse, AdminClientError>>,
    {
        let generation = self.generation();
        self.update_view(generation, |view| view.begin_mutation(resource));

        let response = match submit.await.map_err(SyncError::from).and_then(|response| {
            if response.is_error() {
                Err(SyncError::Application {
                    message: response.message_or("request rejected"),
                })
            } else {
                Ok(response)
            }
        }) {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    resource = resource.as_str(),
                    error = %error,
                    "admin mutation failed"
                );
                let notice = Notice::from_error(action, &error);
                self.update_view(generation, |view| {
                    view.mutation_rejected(resource);
                    view.set_notice(notice.clone());
                });
                return notice;
            }
        };

        let kind = if response.status == ActionStatus::Info {
            NoticeKind::Info
        } else {
            NoticeKind::Success
        };
        let notice = Notice::new(kind, response.message_or(success_fallback));
        tracing::info!(
            resource = resource.as_str(),
            status = response.status.as_str(),
            message = %notice.message,
            "admin mutation accepted"
        );

        if !self.update_view(generation, |view| view.mutation_submitted(resource)) {
            return notice;
        }
        let reload = self.reload(resource.reload_target()).await;
        if let ReloadOutcome::Failed { message } = &reload {
            tracing::warn!(
                resource = resource.reload_target().as_str(),
                error = %message,
                "reload after mutation failed"
            );
        }
        self.update_view(generation, |view| {
            view.mutation_reloaded(resource);
            view.set_notice(notice.clone());
        });
        notice
    }

    fn reject(&self, action: &str, error: ValidationError) -> Notice {
        tracing::debug!(error = %error, action, "admin input rejected before sending");
        let notice = Notice::from_error(action, &SyncError::from(error));
        let generation = self.generation();
        self.update_view(generation, |view| view.set_notice(notice.clone()));
        notice
    }

    fn issue(&self, resource: ReloadResource) -> ReloadTicket {
        let mut view = self.lock_view();
        ReloadTicket {
            resource,
            sequence: view.issue_ticket(resource),
            generation: self.generation(),
        }
    }

    fn settle<T>(
        &self,
        ticket: ReloadTicket,
        result: Result<T, AdminClientError>,
        apply: impl FnOnce(&mut ViewState, u64, T) -> bool,
    ) -> ReloadOutcome {
        let resource = ticket.resource.as_str();
        let outcome = {
            let mut view = self.lock_view();
            if ticket.generation != self.generation() {
                tracing::debug!(
                    resource,
                    sequence = ticket.sequence,
                    "response from a closed session dropped"
                );
                return ReloadOutcome::Discarded;
            }
            match result {
                Ok(value) => {
                    if apply(&mut *view, ticket.sequence, value) {
                        ReloadOutcome::Applied
                    } else {
                        tracing::debug!(
                            resource,
                            sequence = ticket.sequence,
                            "superseded response discarded"
                        );
                        return ReloadOutcome::Discarded;
                    }
                }
                Err(error) => {
                    let message = error.to_string();
                    tracing::warn!(resource, error = %message, "admin reload failed");
                    if !view.apply_reload_error(ticket.resource, ticket.sequence, message.clone()) {
                        return ReloadOutcome::Discarded;
                    }
                    ReloadOutcome::Failed { message }
                }
            }
        };
        self.bump_revision();
        outcome
    }

    /// Runs `update` only while `generation` is still the live session.
    fn update_view(&self, generation: u64, update: impl FnOnce(&mut ViewState)) -> bool {
        {
            let mut view = self.lock_view();
            if generation != self.generation() {
                return false;
            }
            update(&mut *view);
        }
        self.bump_revision();
        true
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn lock_view(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
