use std::collections::BTreeSet;

use qqbot_admin_client::{BotConfig, BotStatus};
use qqbot_admin_state::{Notice, PreviewOptions, ViewState};

pub const NO_MEMORIES: &str = "(no memories)";
pub const NO_GROUPS: &str = "(no groups)";

pub fn status_line(status: &BotStatus) -> String {
    format!(
        "{} | model {} | {} memories | last activity {}",
        online_label(status.online),
        or_dash(&status.current_model),
        status.memory_count,
        or_dash(&status.last_activity)
    )
}

pub fn status_block(status: &BotStatus) -> String {
    let mut lines = vec![
        format!("status:        {}", online_label(status.online)),
        format!("model:         {}", or_dash(&status.current_model)),
        format!("memories:      {}", status.memory_count),
        format!("last activity: {}", or_dash(&status.last_activity)),
    ];
    if !status.connections.is_empty() {
        let connections = status
            .connections
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("connections:   {connections}"));
    }
    lines.join("\n")
}

pub fn config_block(config: &BotConfig) -> String {
    let mut lines = vec![
        format!("websocket uri:      {}", or_dash(&config.websocket_uri)),
        format!("self user id:       {}", or_dash(&config.self_user_id)),
        format!("message count:      {}", config.message_count),
        format!("history timeout:    {}s", config.history_timeout_seconds),
        format!("reply probability:  {}%", config.reply_probability_percent),
    ];

    match config.selected_model() {
        Some(model) => lines.push(format!(
            "model:              {} ({})",
            config.selected_model_key,
            or_dash(&model.display_name)
        )),
        None => lines.push(format!(
            "model:              {}",
            or_dash(&config.selected_model_key)
        )),
    }
    if let Some(target) = config.target_user_id.as_deref() {
        lines.push(format!("target user id:     {target}"));
    }
    if !config.emoji_pool.is_empty() {
        lines.push(format!("emoji pool:         {}", config.emoji_pool.join(" ")));
    }
    lines.push(format!("allowed groups:     {}", groups_inline(&config.allowed_groups)));

    lines.push("prompts:".to_string());
    if config.prompts.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (index, prompt) in config.prompts.iter().enumerate() {
        let marker = if index == config.selected_prompt_index {
            '*'
        } else {
            ' '
        };
        lines.push(format!(" {marker}[{index}] {prompt}"));
    }

    if !config.models.is_empty() {
        lines.push("models:".to_string());
        for (key, model) in &config.models {
            let marker = if *key == config.selected_model_key {
                '*'
            } else {
                ' '
            };
            lines.push(format!(" {marker}{key} ({})", or_dash(&model.display_name)));
        }
    }
    lines.join("\n")
}

pub fn memory_list(view: &ViewState) -> String {
    let previews = view.memory_previews(PreviewOptions::default());
    if previews.is_empty() {
        return NO_MEMORIES.to_string();
    }
    previews
        .into_iter()
        .map(|(id, preview)| format!("{id}\t{preview}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn groups_list(groups: &BTreeSet<i64>) -> String {
    if groups.is_empty() {
        return NO_GROUPS.to_string();
    }
    groups
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn notice_line(notice: &Notice) -> String {
    format!("[{}] {}", notice.kind.as_str(), notice.message)
}

fn groups_inline(groups: &BTreeSet<i64>) -> String {
    if groups.is_empty() {
        return NO_GROUPS.to_string();
    }
    groups
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn online_label(online: bool) -> &'static str {
    if online { "online" } else { "offline" }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}
