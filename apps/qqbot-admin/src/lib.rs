#![allow(clippy::print_stdout)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use qqbot_admin_client::{AdminClientSettings, BotAdminApi, BotAdminClient, ConfigPatch};
use qqbot_admin_state::{
    Notice, ReloadOutcome, ReloadResource, SyncController, resolve_status_poll_interval,
    spawn_status_poller,
};

mod render;

#[derive(Parser, Debug)]
#[command(name = "qqbot-admin")]
#[command(about = "Inspect and control a QQ chat bot through its admin API")]
pub struct AdminCli {
    /// Admin API base URL (overrides QQBOT_ADMIN_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Per-request timeout in milliseconds (overrides QQBOT_ADMIN_TIMEOUT_MS)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the bot status summary
    Status,
    /// Keep polling status and print every refresh
    Watch(WatchArgs),
    /// Show or edit the bot configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Browse and delete stored memories
    #[command(subcommand)]
    Memory(MemoryCommand),
    /// Manage the group allow-list
    #[command(subcommand)]
    Groups(GroupsCommand),
    /// Start or stop the bot
    #[command(subcommand)]
    Bot(BotCommand),
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll period in milliseconds (overrides QQBOT_ADMIN_STATUS_POLL_MS)
    #[arg(long)]
    pub poll_ms: Option<u64>,
    /// Stop after this many refreshes
    #[arg(long)]
    pub iterations: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Show,
    /// Change one or more settings; unspecified settings are left alone
    Set(ConfigSetArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    #[arg(long)]
    pub websocket_uri: Option<String>,
    #[arg(long)]
    pub self_user_id: Option<String>,
    #[arg(long)]
    pub message_count: Option<u32>,
    /// Seconds of chat history kept per conversation
    #[arg(long)]
    pub history_timeout: Option<u64>,
    /// Random reply probability, 0-100
    #[arg(long)]
    pub reply_probability: Option<u32>,
    /// Index into the prompt list
    #[arg(long)]
    pub prompt_index: Option<usize>,
    /// Model table key, e.g. ZHIPU
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub target_user_id: Option<String>,
    /// Replaces the emoji pool; repeat for several
    #[arg(long = "emoji")]
    pub emoji_pool: Vec<String>,
}

impl ConfigSetArgs {
    pub fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            websocket_uri: self.websocket_uri,
            self_user_id: self.self_user_id,
            message_count: self.message_count,
            history_timeout_seconds: self.history_timeout,
            reply_probability_percent: self.reply_probability,
            selected_prompt_index: self.prompt_index,
            selected_model_key: self.model,
            target_user_id: self.target_user_id,
            emoji_pool: (!self.emoji_pool.is_empty()).then_some(self.emoji_pool),
            ..ConfigPatch::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    List,
    Show { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum GroupsCommand {
    List,
    /// Add a group id to the allow-list
    Add {
        #[arg(allow_negative_numbers = true)]
        group_id: String,
    },
    Remove {
        #[arg(allow_negative_numbers = true)]
        group_id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum BotCommand {
    Start,
    Stop,
}

pub async fn run(cli: AdminCli) -> Result<ExitCode> {
    let settings = AdminClientSettings::resolve(cli.base_url.as_deref(), cli.timeout_ms)
        .context("resolve admin API settings")?;
    tracing::debug!(
        base_url = %settings.base_url.base_url,
        source = %settings.base_url.source,
        timeout_ms = ?settings.timeout_ms,
        "admin API settings resolved"
    );
    let client = BotAdminClient::from_settings(&settings).context("build admin client")?;
    let controller = Arc::new(SyncController::new(client));

    match cli.command {
        Command::Status => {
            load(&controller, ReloadResource::Status).await?;
            if let Some(status) = controller.view().status() {
                println!("{}", render::status_block(status));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch(args) => watch(controller, args).await,
        Command::Config(ConfigCommand::Show) => {
            load(&controller, ReloadResource::Config).await?;
            if let Some(config) = controller.view().config() {
                println!("{}", render::config_block(config));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config(ConfigCommand::Set(args)) => {
            let patch = args.into_patch();
            if patch.is_empty() {
                bail!("config set needs at least one setting to change");
            }
            let notice = controller.save_config(&patch).await;
            if !notice.is_error()
                && let Some(config) = controller.view().config()
            {
                println!("{}", render::config_block(config));
            }
            Ok(report(&notice))
        }
        Command::Memory(MemoryCommand::List) => {
            load(&controller, ReloadResource::Memory).await?;
            println!("{}", render::memory_list(&controller.view()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Memory(MemoryCommand::Show { id }) => {
            load(&controller, ReloadResource::Memory).await?;
            let detail = controller.view().memory_detail(&id)?;
            println!("{detail}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Memory(MemoryCommand::Delete { id }) => {
            let notice = controller.delete_memory(&id).await;
            Ok(report(&notice))
        }
        Command::Groups(GroupsCommand::List) => {
            load(&controller, ReloadResource::Config).await?;
            print_groups(&controller);
            Ok(ExitCode::SUCCESS)
        }
        Command::Groups(GroupsCommand::Add { group_id }) => {
            let notice = controller.add_group(&group_id).await;
            if !notice.is_error() {
                print_groups(&controller);
            }
            Ok(report(&notice))
        }
        Command::Groups(GroupsCommand::Remove { group_id }) => {
            let notice = controller.remove_group(group_id).await;
            if !notice.is_error() {
                print_groups(&controller);
            }
            Ok(report(&notice))
        }
        Command::Bot(command) => {
            let notice = match command {
                BotCommand::Start => controller.start_bot().await,
                BotCommand::Stop => controller.stop_bot().await,
            };
            if let Some(status) = controller.view().status() {
                println!("{}", render::status_line(status));
            }
            Ok(report(&notice))
        }
    }
}

async fn load<A: BotAdminApi>(
    controller: &SyncController<A>,
    resource: ReloadResource,
) -> Result<()> {
    match controller.reload(resource).await {
        ReloadOutcome::Failed { message } => {
            bail!("load {} failed: {message}", resource.as_str())
        }
        ReloadOutcome::Applied | ReloadOutcome::Discarded => Ok(()),
    }
}

async fn watch<A: BotAdminApi + 'static>(
    controller: Arc<SyncController<A>>,
    args: WatchArgs,
) -> Result<ExitCode> {
    let interval = resolve_status_poll_interval(args.poll_ms);
    tracing::info!(
        interval_ms = interval.interval.as_millis() as u64,
        source = interval.source,
        "watching bot status"
    );

    let mut revisions = controller.subscribe();
    let poller = spawn_status_poller(Arc::clone(&controller), interval.interval);
    let mut last_ticket = 0;
    let mut printed = 0_u64;

    loop {
        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = controller.view();
                let ticket = view.applied_ticket(ReloadResource::Status);
                if ticket <= last_ticket {
                    continue;
                }
                last_ticket = ticket;
                match (view.reload_error(ReloadResource::Status), view.status()) {
                    (Some(error), _) => println!("status unavailable: {error}"),
                    (None, Some(status)) => println!("{}", render::status_line(status)),
                    (None, None) => continue,
                }
                printed += 1;
                if args.iterations.is_some_and(|limit| printed >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let ticks = poller.stop().await;
    tracing::debug!(ticks, printed, "status watch finished");
    Ok(ExitCode::SUCCESS)
}

fn print_groups<A: BotAdminApi>(controller: &SyncController<A>) {
    if let Some(groups) = controller.view().allowed_groups() {
        println!("{}", render::groups_list(groups));
    }
}

fn report(notice: &Notice) -> ExitCode {
    println!("{}", render::notice_line(notice));
    if notice.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
