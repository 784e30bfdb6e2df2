use std::sync::Arc;
use std::time::Duration;

use qqbot_admin_client::BotAdminApi;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync::{ReloadOutcome, SyncController};

pub const DEFAULT_STATUS_POLL_INTERVAL_MS: u64 = 10_000;
pub const MIN_STATUS_POLL_INTERVAL_MS: u64 = 250;
pub const ENV_STATUS_POLL_MS: &str = "QQBOT_ADMIN_STATUS_POLL_MS";
pub const POLL_INTERVAL_SOURCE_DEFAULT: &str = "default";
pub const POLL_INTERVAL_SOURCE_EXPLICIT: &str = "explicit";
pub const POLL_INTERVAL_SOURCE_INVALID_ENV: &str = "default_invalid_env";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPollInterval {
    pub interval: Duration,
    pub source: &'static str,
}

/// Explicit value, then `QQBOT_ADMIN_STATUS_POLL_MS`, then ten seconds. An
/// unparseable env value falls back to the default and says so in `source`.
#[must_use]
pub fn resolve_status_poll_interval(explicit_ms: Option<u64>) -> ResolvedPollInterval {
    let (millis, source) = match explicit_ms {
        Some(millis) => (millis, POLL_INTERVAL_SOURCE_EXPLICIT),
        None => match env_non_empty(ENV_STATUS_POLL_MS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(millis) => (millis, ENV_STATUS_POLL_MS),
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring invalid status poll interval");
                    (
                        DEFAULT_STATUS_POLL_INTERVAL_MS,
                        POLL_INTERVAL_SOURCE_INVALID_ENV,
                    )
                }
            },
            None => (DEFAULT_STATUS_POLL_INTERVAL_MS, POLL_INTERVAL_SOURCE_DEFAULT),
        },
    };
    ResolvedPollInterval {
        interval: Duration::from_millis(millis.max(MIN_STATUS_POLL_INTERVAL_MS)),
        source,
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Background status refresh. Dropping the handle also ends polling, without
/// waiting for the task; [`StatusPoller::stop`] waits and reports the count.
pub struct StatusPoller {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
}

impl StatusPoller {
    /// Stops polling and returns how many refreshes were issued.
    pub async fn stop(mut self) -> u64 {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.task.await {
            Ok(ticks) => ticks,
            Err(error) => {
                tracing::warn!(error = %error, "status poller task ended abnormally");
                0
            }
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Refreshes status right away and then once per `period`. A slow refresh
/// delays the next tick instead of bunching them up; failures are logged and
/// polling carries on.
pub fn spawn_status_poller<A>(controller: Arc<SyncController<A>>, period: Duration) -> StatusPoller
where
    A: BotAdminApi + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let period = period.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0_u64;
        loop {
            tokio::select! {
                biased;
                // Resolves on an explicit stop and when the handle is dropped.
                _ = &mut shutdown_rx => break,
                _ = interval.tick() => {
                    ticks += 1;
                    if let ReloadOutcome::Failed { message } = controller.refresh_status().await {
                        tracing::warn!(error = %message, tick = ticks, "status poll failed");
                    }
                }
            }
        }
        tracing::debug!(ticks, "status poller stopped");
        ticks
    });

    StatusPoller {
        shutdown: Some(shutdown_tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn with_env<T>(key: &str, value: Option<&str>, test: impl FnOnce() -> T) -> T {
        let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = std::env::var(key).ok();

        match value {
            Some(value) => unsafe { std::env::set_var(key, value) },
            None => unsafe { std::env::remove_var(key) },
        }
        let result = test();
        match previous {
            Some(value) => unsafe { std::env::set_var(key, value) },
            None => unsafe { std::env::remove_var(key) },
        }
        result
    }

    #[test]
    fn poll_interval_defaults_to_ten_seconds() {
        with_env(ENV_STATUS_POLL_MS, None, || {
            let resolved = resolve_status_poll_interval(None);
            assert_eq!(resolved.interval, Duration::from_secs(10));
            assert_eq!(resolved.source, POLL_INTERVAL_SOURCE_DEFAULT);
        });
    }

    #[test]
    fn poll_interval_reads_env_and_reports_bad_values() {
        with_env(ENV_STATUS_POLL_MS, Some("2500"), || {
            let resolved = resolve_status_poll_interval(None);
            assert_eq!(resolved.interval, Duration::from_millis(2_500));
            assert_eq!(resolved.source, ENV_STATUS_POLL_MS);

            let explicit = resolve_status_poll_interval(Some(1_000));
            assert_eq!(explicit.interval, Duration::from_secs(1));
            assert_eq!(explicit.source, POLL_INTERVAL_SOURCE_EXPLICIT);
        });
        with_env(ENV_STATUS_POLL_MS, Some("often"), || {
            let resolved = resolve_status_poll_interval(None);
            assert_eq!(resolved.interval, Duration::from_secs(10));
            assert_eq!(resolved.source, POLL_INTERVAL_SOURCE_INVALID_ENV);
        });
    }

    #[test]
    fn poll_interval_has_a_floor() {
        let resolved = resolve_status_poll_interval(Some(0));
        assert_eq!(
            resolved.interval,
            Duration::from_millis(MIN_STATUS_POLL_INTERVAL_MS)
        );
    }
}
