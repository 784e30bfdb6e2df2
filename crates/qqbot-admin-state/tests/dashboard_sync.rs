use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use qqbot_admin_client::{BotAdminApi, BotAdminClient, BotAdminClientConfig, ConfigPatch};
use qqbot_admin_state::{
    MutableResource, MutationPhase, NoticeKind, PreviewOptions, ReloadOutcome, SyncController,
    spawn_status_poller,
};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

/// Minimal stateful stand-in for the bot's admin server.
#[derive(Default)]
struct Backend {
    config: Map<String, Value>,
    memory: Map<String, Value>,
    running: bool,
    hits: BTreeMap<String, usize>,
}

type SharedBackend = Arc<Mutex<Backend>>;

struct BackendStub {
    base_url: String,
    backend: SharedBackend,
    shutdown: Option<oneshot::Sender<()>>,
}

impl BackendStub {
    async fn hits(&self, route: &str) -> usize {
        self.backend.lock().await.hits.get(route).copied().unwrap_or(0)
    }

    fn controller(&self) -> SyncController<BotAdminClient> {
        let client = BotAdminClient::new(BotAdminClientConfig::new(self.base_url.clone()))
            .expect("admin client");
        SyncController::new(client)
    }

    async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn seeded_backend() -> Backend {
    let config = json!({
        "WEBSOCKET_URI": "ws://127.0.0.1:3001/?access_token=qwert",
        "SELF_USER_ID": 10001,
        "MESSAGE_COUNT": 5,
        "HISTORY_TIMEOUT": 600,
        "RAN_REP_PROBABILITY": 2,
        "PROMPT": ["be brief", "be playful"],
        "CURRENT_PROMPT": 0,
        "LLM": {
            "ZHIPU": {"NAME": "glm-4.5-flash", "KEY": "secret"},
            "DEEPSEEK-V3": {"NAME": "deepseek-chat", "KEY": "secret"}
        },
        "CURRENT_COMPLETION": "ZHIPU",
        "ALLOWED_GROUPS": [111]
    });
    let memory = json!({
        "42": {"note": "hello world this is a long string"},
        "77": {"name": "Alice", "likes": "tea", "dislikes": "rain"}
    });
    Backend {
        config: config.as_object().cloned().unwrap_or_default(),
        memory: memory.as_object().cloned().unwrap_or_default(),
        running: false,
        hits: BTreeMap::new(),
    }
}

async fn spawn_backend_stub() -> Result<BackendStub> {
    let backend: SharedBackend = Arc::new(Mutex::new(seeded_backend()));
    let app = Router::new()
        .route("/api/status", get(status))
        .route("/api/config", get(config).post(save_config))
        .route("/api/memory", get(memory))
        .route("/api/memory/:id", delete(delete_memory))
        .route("/api/groups", post(add_group))
        .route("/api/groups/:group_id", delete(remove_group))
        .route("/api/bot/start", post(start_bot))
        .route("/api/bot/stop", post(stop_bot))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let _ = server.await;
    });

    Ok(BackendStub {
        base_url: format!("http://{addr}"),
        backend,
        shutdown: Some(shutdown_tx),
    })
}

fn hit(backend: &mut Backend, route: &str) {
    *backend.hits.entry(route.to_string()).or_default() += 1;
}

fn outcome(status: &str, message: &str) -> Json<Value> {
    Json(json!({"status": status, "message": message}))
}

fn allowed_groups(backend: &mut Backend) -> &mut Vec<Value> {
    let groups = backend
        .config
        .entry("ALLOWED_GROUPS")
        .or_insert_with(|| json!([]));
    if !groups.is_array() {
        *groups = json!([]);
    }
    groups.as_array_mut().expect("allow-list is an array")
}

async fn status(State(backend): State<SharedBackend>) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "GET /api/status");
    let state = if backend.running { "online" } else { "offline" };
    Json(json!({
        "status": state,
        "connections": {},
        "last_activity": "2025-03-01 08:00:00",
        "memory_count": backend.memory.len(),
        "current_llm": "glm-4.5-flash"
    }))
}

async fn config(State(backend): State<SharedBackend>) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "GET /api/config");
    Json(Value::Object(backend.config.clone()))
}

async fn save_config(
    State(backend): State<SharedBackend>,
    Json(body): Json<Map<String, Value>>,
) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "POST /api/config");
    backend.config.extend(body);
    outcome("success", "config updated")
}

async fn memory(State(backend): State<SharedBackend>) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "GET /api/memory");
    Json(Value::Object(backend.memory.clone()))
}

async fn delete_memory(
    State(backend): State<SharedBackend>,
    Path(id): Path<String>,
) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "DELETE /api/memory");
    if backend.memory.remove(&id).is_none() {
        return outcome("error", "memory not found");
    }
    Json(json!({"status": "success"}))
}

async fn add_group(
    State(backend): State<SharedBackend>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "POST /api/groups");
    let Some(group_id) = body.get("groupId").and_then(Value::as_i64) else {
        return outcome("error", "groupId must be an integer");
    };
    let groups = allowed_groups(&mut backend);
    if groups.iter().any(|group| group.as_i64() == Some(group_id)) {
        return outcome("info", "group already in allow-list");
    }
    groups.push(json!(group_id));
    outcome("success", "group added")
}

async fn remove_group(
    State(backend): State<SharedBackend>,
    Path(group_id): Path<i64>,
) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "DELETE /api/groups");
    let groups = allowed_groups(&mut backend);
    let before = groups.len();
    groups.retain(|group| group.as_i64() != Some(group_id));
    if groups.len() == before {
        return outcome("error", "group not in allow-list");
    }
    outcome("success", "group removed")
}

async fn start_bot(State(backend): State<SharedBackend>) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "POST /api/bot/start");
    if backend.running {
        return outcome("info", "bot is already running");
    }
    backend.running = true;
    outcome("success", "bot started")
}

async fn stop_bot(State(backend): State<SharedBackend>) -> Json<Value> {
    let mut backend = backend.lock().await;
    hit(&mut backend, "POST /api/bot/stop");
    if !backend.running {
        return outcome("info", "bot is not running");
    }
    backend.running = false;
    outcome("success", "bot stopped")
}

#[tokio::test]
async fn initial_load_fills_every_resource() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();

    let outcomes = controller.initial_load().await;
    assert!(outcomes.iter().all(|outcome| *outcome == ReloadOutcome::Applied));

    let view = controller.view();
    assert!(view.status().is_some_and(|status| !status.online));
    assert_eq!(view.status().map(|status| status.memory_count), Some(2));
    assert_eq!(view.config().map(|config| config.message_count), Some(5));
    assert_eq!(
        view.config().and_then(|config| config.selected_prompt()),
        Some("be brief")
    );
    assert_eq!(view.memory().map(|memory| memory.len()), Some(2));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn saved_config_is_what_the_next_read_returns() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();
    controller.reload_config().await;

    let patch = ConfigPatch {
        reply_probability_percent: Some(35),
        selected_prompt_index: Some(1),
        selected_model_key: Some("DEEPSEEK-V3".to_string()),
        ..ConfigPatch::default()
    };
    let notice = controller.save_config(&patch).await;
    assert_eq!(notice.kind, NoticeKind::Success);
    assert_eq!(notice.message, "config updated");

    let view = controller.view();
    let config = view.config().expect("config loaded");
    assert_eq!(config.reply_probability_percent, 35);
    assert_eq!(config.selected_prompt(), Some("be playful"));
    assert_eq!(
        config.selected_model().map(|model| model.display_name.as_str()),
        Some("deepseek-chat")
    );
    assert_eq!(config.message_count, 5);

    let fetched = controller.api().get_config().await?;
    assert_eq!(&fetched, config);
    assert_eq!(
        view.mutation_phase(MutableResource::Config),
        MutationPhase::Idle
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn full_resubmit_keeps_model_credentials() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();
    controller.reload_config().await;

    let mut edited = controller.view().config().cloned().expect("config loaded");
    edited.history_timeout_seconds = 1_200;
    let notice = controller.save_config(&ConfigPatch::from(&edited)).await;
    assert!(!notice.is_error());

    let stored = stub.backend.lock().await.config.clone();
    assert_eq!(stored["HISTORY_TIMEOUT"], json!(1_200));
    assert_eq!(stored["LLM"]["ZHIPU"]["KEY"], json!("secret"));
    assert_eq!(stored["SELF_USER_ID"], json!(10001));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn out_of_range_probability_never_reaches_the_server() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();

    let notice = controller
        .save_config(&ConfigPatch {
            reply_probability_percent: Some(150),
            ..ConfigPatch::default()
        })
        .await;
    assert_eq!(notice.kind, NoticeKind::ValidationError);
    assert_eq!(stub.hits("POST /api/config").await, 0);
    assert_eq!(stub.hits("GET /api/config").await, 0);

    let notice = controller.add_group("not-a-number").await;
    assert_eq!(notice.kind, NoticeKind::ValidationError);
    assert_eq!(stub.hits("POST /api/groups").await, 0);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn deleted_memory_is_gone_after_reload() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();
    controller.reload_memory().await;
    controller.with_view(|view| assert!(view.get_memory_record("42").is_ok()));

    let notice = controller.delete_memory("42").await;
    assert_eq!(notice.kind, NoticeKind::Success);
    assert_eq!(notice.message, "memory 42 deleted");

    let view = controller.view();
    assert!(view.get_memory_record("42").is_err());
    assert!(view.get_memory_record("77").is_ok());
    assert_eq!(stub.hits("GET /api/memory").await, 2);

    let again = controller.delete_memory("42").await;
    assert_eq!(again.kind, NoticeKind::ApplicationError);
    assert!(again.message.contains("memory not found"));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn memory_previews_and_details_render_from_the_view() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();
    controller.reload_memory().await;

    let view = controller.view();
    assert_eq!(
        view.memory_preview("42", PreviewOptions::default()),
        Ok("note: hello world this is a long str...".to_string())
    );
    assert_eq!(
        view.memory_detail("42"),
        Ok("note:\nhello world this is a long string".to_string())
    );
    assert_eq!(
        view.memory_preview("77", PreviewOptions::default()),
        Ok("name: Alice, likes: tea".to_string())
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn adding_a_group_twice_keeps_a_single_entry() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();

    let first = controller.add_group("222").await;
    assert_eq!(first.kind, NoticeKind::Success);
    let second = controller.add_group(" 222 ").await;
    assert_eq!(second.kind, NoticeKind::Info);

    let groups = controller
        .view()
        .allowed_groups()
        .cloned()
        .expect("config reloaded after add");
    assert_eq!(groups.into_iter().collect::<Vec<_>>(), vec![111, 222]);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn removing_an_unknown_group_leaves_the_allow_list_alone() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();
    controller.reload_config().await;

    let notice = controller.remove_group(999).await;
    assert_eq!(notice.kind, NoticeKind::ApplicationError);
    assert!(notice.message.contains("group not in allow-list"));
    assert_eq!(stub.hits("GET /api/config").await, 1);
    assert_eq!(
        controller
            .view()
            .allowed_groups()
            .map(|groups| groups.iter().copied().collect::<Vec<_>>()),
        Some(vec![111])
    );

    let removed = controller.remove_group(111).await;
    assert_eq!(removed.kind, NoticeKind::Success);
    assert!(
        controller
            .view()
            .allowed_groups()
            .is_some_and(|groups| groups.is_empty())
    );

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn starting_twice_reports_already_running() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = stub.controller();

    let first = controller.start_bot().await;
    assert_eq!(first.kind, NoticeKind::Success);
    let second = controller.start_bot().await;
    assert_eq!(second.kind, NoticeKind::Info);
    assert_eq!(second.message, "bot is already running");
    assert!(controller.view().status().is_some_and(|status| status.online));

    let stopped = controller.stop_bot().await;
    assert_eq!(stopped.kind, NoticeKind::Success);
    assert!(controller.view().status().is_some_and(|status| !status.online));
    assert_eq!(controller.view().last_notice(), Some(&stopped));

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn status_poller_refreshes_until_stopped() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = Arc::new(stub.controller());

    let poller = spawn_status_poller(Arc::clone(&controller), Duration::from_millis(20));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while stub.hits("GET /api/status").await < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let ticks = poller.stop().await;
    assert!(ticks >= 3, "expected at least three polls, got {ticks}");
    assert!(controller.view().status().is_some());

    let settled = stub.hits("GET /api/status").await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(stub.hits("GET /api/status").await, settled);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn dropping_the_poller_handle_stops_polling() -> Result<()> {
    let stub = spawn_backend_stub().await?;
    let controller = Arc::new(stub.controller());

    let poller = spawn_status_poller(Arc::clone(&controller), Duration::from_millis(20));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while stub.hits("GET /api/status").await < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(poller);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let settled = stub.hits("GET /api/status").await;
    assert!(settled >= 2);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(stub.hits("GET /api/status").await, settled);

    stub.stop().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_yields_network_notices() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = BotAdminClient::new(BotAdminClientConfig::new(format!("http://{addr}")))?;
    let controller = SyncController::new(client);

    let notice = controller.stop_bot().await;
    assert_eq!(notice.kind, NoticeKind::NetworkError);
    assert!(controller.refresh_status().await.is_failed());
    assert!(controller.view().status().is_none());
    Ok(())
}
