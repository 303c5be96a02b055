use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postbot_server::approval::{ApprovalStateStore, ApprovalWorkflow, EventRouter};
use postbot_server::background_jobs::jobs::SessionReaperJob;
use postbot_server::background_jobs::{JobContext, JobRunner};
use postbot_server::config;
use postbot_server::generation::llm::{ApiKeySource, LlmProvider, OpenAIProvider};
use postbot_server::generation::{GenerationPipeline, PromptBuilder};
use postbot_server::images::DatedFolderImageSource;
use postbot_server::supervisor::ConnectionSupervisor;
use postbot_server::telegram::{BotApiClient, ChannelPublisher, ChatTarget};
use postbot_server::topic::GoogleSheetsTopicSource;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding one sub-folder of images per day (YYYY-MM-DD).
    #[clap(long, value_parser = parse_path)]
    pub image_root: Option<PathBuf>,

    /// Append-only log file receiving every log line and the session audit trail.
    #[clap(long, value_parser = parse_path)]
    pub audit_log: Option<PathBuf>,

    /// Google service-account JSON key used to read the content plan.
    #[clap(long, value_parser = parse_path)]
    pub credentials: Option<PathBuf>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            image_root: args.image_root.clone(),
            audit_log: args.audit_log.clone(),
            credentials: args.credentials.clone(),
        }
    }
}

fn init_logging(audit_log: &Path) -> Result<()> {
    let audit_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(audit_log)
        .with_context(|| format!("Failed to open audit log {:?}", audit_log))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(audit_file)),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialise logging")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(config::FileConfig::load(path)?),
        None => None,
    };
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    init_logging(&app_config.audit_log_path)?;
    info!("Starting postbot-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded:");
    info!("  approver_id: {}", app_config.approver_id);
    info!("  channel: {}", app_config.telegram.channel_id);
    info!("  image_root: {:?}", app_config.image_root);
    info!("  audit_log: {:?}", app_config.audit_log_path);
    info!("  model: {}", app_config.openai.model);
    info!(
        "  approval timeout: {}s, reaper interval: {}s",
        app_config.approval.timeout.as_secs(),
        app_config.approval.reaper_interval.as_secs()
    );

    if !app_config.sheets.credentials_path.exists() {
        error!(
            "Missing critical file: {:?}",
            app_config.sheets.credentials_path
        );
        std::process::exit(1);
    }

    if !app_config.image_root.exists() {
        std::fs::create_dir_all(&app_config.image_root).with_context(|| {
            format!("Failed to create image directory {:?}", app_config.image_root)
        })?;
        info!("Created image directory: {:?}", app_config.image_root);
    }

    let telegram = &app_config.telegram;
    let bot = Arc::new(BotApiClient::new(
        &telegram.api_base_url,
        &telegram.bot_token,
        telegram.parse_mode.clone(),
    ));
    let publisher = Arc::new(ChannelPublisher::new(
        BotApiClient::new(
            &telegram.api_base_url,
            &telegram.publisher_token,
            telegram.parse_mode.clone(),
        ),
        ChatTarget::parse(&telegram.channel_id),
    ));

    let openai = &app_config.openai;
    let provider = Arc::new(OpenAIProvider::new(
        openai.base_url.clone(),
        openai.model.clone(),
        ApiKeySource::from_settings(openai.api_key.clone(), openai.api_key_command.clone()),
    ));
    match provider.health_check().await {
        Ok(()) => info!("LLM provider {} reachable, model {}", provider.name(), provider.model()),
        Err(e) => warn!("LLM provider {} health check failed: {}", provider.name(), e),
    }
    let max_chars = app_config.generation.max_chars;
    let prompts = match &app_config.generation.style_prompt_path {
        Some(path) => {
            info!("Loading style prompt from {:?}", path);
            PromptBuilder::from_file(path, max_chars)?
        }
        None => PromptBuilder::new(max_chars),
    };
    let generator =
        Arc::new(GenerationPipeline::new(provider, prompts).with_request_timeout(openai.timeout));

    let topics = Arc::new(
        GoogleSheetsTopicSource::from_settings(&app_config.sheets)
            .context("Failed to set up the content plan source")?,
    );
    let images = Arc::new(DatedFolderImageSource::new(app_config.image_root.clone()));

    let store = Arc::new(ApprovalStateStore::new());
    let workflow = Arc::new(ApprovalWorkflow::new(
        store.clone(),
        generator,
        images,
        topics,
        bot.clone(),
        publisher.clone(),
    ));
    let router = Arc::new(EventRouter::new(app_config.approver_id, workflow));

    let shutdown_token = CancellationToken::new();

    let mut job_runner = JobRunner::new(JobContext::new(shutdown_token.child_token(), store));
    job_runner.register_job(Arc::new(SessionReaperJob::from_settings(
        &app_config.approval,
    )));

    let supervisor = ConnectionSupervisor::new(bot.clone(), router, telegram.poll_timeout_secs)
        .with_identity("Approval", bot)
        .with_identity("Publisher", publisher);

    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_token.clone()));
    let runner_handle = tokio::spawn(job_runner.run());

    info!("Bot is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Received Ctrl+C, initiating graceful shutdown");
    shutdown_token.cancel();
    if let Err(e) = supervisor_handle.await {
        error!("Connection supervisor panicked: {}", e);
    }
    if let Err(e) = runner_handle.await {
        error!("Job runner panicked: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}
