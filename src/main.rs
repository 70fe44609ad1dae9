use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use cadence_bot::application::commands::CommandCatalog;
use cadence_bot::application::messaging::{
    InteractionDispatcher, InteractionParser, LoggingMiddleware, MiddlewareChain, RateLimitMiddleware,
    RoleGuardMiddleware,
};
use cadence_bot::application::services::Services;
use cadence_bot::domain::entities::PlatformEvent;
use cadence_bot::domain::traits::Bot;
use cadence_bot::infrastructure::adapters::ConsoleAdapter;
use cadence_bot::infrastructure::config::Config;
use cadence_bot::infrastructure::media::SimulatedGateway;
use cadence_bot::infrastructure::storage::JsonSessionStore;
use cadence_bot::BotError;

#[derive(Parser)]
#[command(name = "cadence-bot")]
#[command(about = "Debounced, coordinated command engine for collaborative chat sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot with the console adapter
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(run_bot(&cli.config)) {
                tracing::error!("Bot stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("cadence-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => init_config(),
    }
}

fn load_config(config_path: &str) -> Config {
    let loaded = if Path::new(config_path).exists() {
        Config::load(config_path).and_then(Config::with_env_overrides)
    } else {
        Config::load_env()
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    })
}

async fn run_bot(config_path: &str) -> Result<(), BotError> {
    let config = load_config(config_path);
    tracing::info!("Starting {}", config.bot.name);

    let settings = config.engine_settings()?;
    let store = JsonSessionStore::new(&config.session.store_path);
    store.init().await?;

    let bot = Arc::new(ConsoleAdapter::new(config.bot.name.as_str()).with_items_per_page(settings.items_per_page));
    let services = Arc::new(Services::new(
        Arc::new(store),
        bot.clone(),
        Arc::new(SimulatedGateway::new()),
        CommandCatalog::standard(),
        settings,
    ));

    let security = &config.security;
    let mut chain = MiddlewareChain::new()
        .add(LoggingMiddleware)
        .add(RoleGuardMiddleware::new(security.required_roles.iter().cloned()));
    if security.rate_limit.enabled {
        chain = chain.add(RateLimitMiddleware::new(
            security.rate_limit.max_requests,
            std::time::Duration::from_secs(security.rate_limit.window_seconds),
        ));
    }
    let dispatcher = InteractionDispatcher::new(services).with_chain(chain.build());

    bot.start().await?;
    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let console = config.adapters.console.clone().unwrap_or_default();
    if !console.enabled {
        tracing::warn!("No adapter enabled, nothing to do");
        return Ok(());
    }
    let parser = InteractionParser::new(console.group_id.as_str(), console.user_id.as_str()).with_roles(console.roles);
    println!("Type `/start` to open a session, a button label to click it, `quit` to leave.");

    let (events, inbox) = mpsc::channel(64);
    if events.send(PlatformEvent::Ready).await.is_err() {
        return Err(BotError::Internal("event channel closed".to_string()));
    }
    tokio::spawn(ConsoleAdapter::read_events(parser, events));

    tokio::select! {
        _ = dispatcher.run(inbox) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            dispatcher.shutdown().await;
        }
    }
    Ok(())
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render config: {}", e),
    }
}
