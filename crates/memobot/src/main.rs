//! Telegram chat bot with per-user long-term memory.

use anyhow::{Context, Result, bail};
use autoagents_llm::LLMProvider;
use autoagents_llm::backends::openai::OpenAI;
use autoagents_llm::builder::LLMBuilder;
use clap::Parser;
use log::{debug, error, info, warn};
use memobot::config::{LayeredConfigOptions, MemobotConfig};
use memobot::core::{LlmEmbedder, Orchestrator, TurnOutcome};
use memobot::memory::VectorStoreProvider;
use memobot::protocol::InboundMessage;
use memobot::telegram::{BotApi, TelegramListener, TelegramTransport};
use memobot::{init_logging, memory_root};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Environment variable holding the Telegram bot token.
const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";

/// Inbound messages buffered between the listener and the dispatcher.
const INBOUND_BUFFER: usize = 256;

/// Command-line options for the bot.
#[derive(Parser)]
#[command(name = "memobot", version)]
struct Cli {
    /// Extra memobot.json5 layer applied last; repeatable
    #[arg(long)]
    config: Vec<PathBuf>,
    /// Chat model override
    #[arg(long)]
    model: Option<String>,
    /// Root directory for per-user memory stores
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err).context("failed to read .env");
    }
    init_logging();

    let cli = Cli::parse();
    info!(
        "starting memobot (runtime_layers={}, model_set={}, data_dir_set={})",
        cli.config.len(),
        cli.model.is_some(),
        cli.data_dir.is_some()
    );
    let config = load_config(&cli)?;

    let api_key = std::env::var(&config.provider.api_key_env)
        .with_context(|| format!("{} is required", config.provider.api_key_env))?;
    let token = std::env::var(ENV_TELEGRAM_TOKEN)
        .with_context(|| format!("{ENV_TELEGRAM_TOKEN} is required"))?;
    if token.trim().is_empty() {
        bail!("{ENV_TELEGRAM_TOKEN} is empty");
    }

    info!(
        "building LLM provider (model={}, base_url_set={})",
        config.provider.model,
        config.provider.base_url.is_some()
    );
    let mut builder = LLMBuilder::<OpenAI>::new()
        .api_key(api_key)
        .model(config.provider.model.clone());
    if let Some(base_url) = config.provider.base_url.clone() {
        builder = builder.base_url(base_url);
    }
    let llm: Arc<dyn LLMProvider> = builder
        .build()
        .context("failed to build OpenAI LLM provider")?;

    let root = memory_root(cli.data_dir.as_deref(), &config);
    let memory = VectorStoreProvider::new(&root, Arc::new(LlmEmbedder::new(llm.clone())))
        .with_context(|| format!("failed to open memory root {}", root.display()))?;

    if config.telegram.allowed_users.is_empty() {
        warn!("no allowed users configured; every message will be rejected");
    }
    let api = BotApi::new(token, config.telegram.api_base.clone());
    let transport = Arc::new(TelegramTransport::new(api.clone()));
    let listener = TelegramListener::new(api, config.telegram.poll_timeout_secs);
    let orchestrator = Arc::new(
        Orchestrator::builder(llm, transport, memory)
            .config(config)
            .build()
            .context("failed to build orchestrator")?,
    );

    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    let listener_task = tokio::spawn(listener.run(tx));
    tokio::select! {
        _ = dispatch(orchestrator, rx) => {
            warn!("inbound channel closed");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutting down");
        }
    }
    listener_task.abort();
    Ok(())
}

/// Layered config (user, cwd, `--config` layers) plus env and CLI overrides.
fn load_config(cli: &Cli) -> Result<MemobotConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    for path in &cli.config {
        options = options.with_runtime_path(path);
    }
    let layered = MemobotConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let mut config = layered.config;
    config.apply_env();
    if let Some(model) = cli.model.as_ref() {
        config.provider.model = model.clone();
    }
    config.validate().context("invalid config")?;
    Ok(config)
}

/// Run each inbound message as its own turn until the channel closes.
async fn dispatch(orchestrator: Arc<Orchestrator>, mut rx: mpsc::Receiver<InboundMessage>) {
    while let Some(message) = rx.recv().await {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let sender = message.sender.clone();
            match orchestrator.handle_message(message).await {
                TurnOutcome::Aborted { error: err } => {
                    error!("turn aborted (sender={}, error={})", sender, err);
                }
                outcome => debug!("turn finished (sender={}, outcome={:?})", sender, outcome),
            }
        });
    }
}
