use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use teloxide::Bot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom_db::db::init_db;
use stockroom_db::{Ledger, PgLedger};
use stockroom_panel::cli::{self, Cli, Commands};
use stockroom_panel::config::PanelConfig;
use stockroom_panel::services::notification_service::{DisabledNotifier, Notifier, TelegramNotifier};
use stockroom_panel::storage::{ObjectStore, SupabaseStorage};
use stockroom_panel::{AppState, build_router};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Warning: Failed to load .env file: {}", e);
    }
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let config = PanelConfig::load()?;

    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockroom_panel=debug,stockroom_db=debug,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let pool = init_db(&config.database_url, config.max_connections).await?;
    tracing::info!("Database initialized");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => {
            println!("Migrations are up to date.");
        }
        Commands::RegisterAdmin { chat_id } => {
            let ledger = PgLedger::new(pool);
            cli::register_admin(&ledger, chat_id).await?;
        }
        Commands::Sweep => {
            let state = build_state(config, PgLedger::new(pool));
            cli::run_sweep(&state.retention).await?;
        }
        Commands::Serve => {
            let listen_port = config.listen_port;
            let state = build_state(config, PgLedger::new(pool));
            run_server(state, listen_port).await?;
        }
    }

    Ok(())
}

fn build_state(config: PanelConfig, ledger: PgLedger) -> AppState {
    let ledger: Arc<dyn Ledger> = Arc::new(ledger);
    let storage: Arc<dyn ObjectStore> = Arc::new(SupabaseStorage::new(
        &config.storage_url,
        &config.storage_service_key,
        &config.storage_bucket,
    ));

    let bot = config.bot_token.as_deref().map(Bot::new);
    let notifier: Arc<dyn Notifier> = match &bot {
        Some(bot) => Arc::new(TelegramNotifier::new(bot.clone())),
        None => {
            tracing::warn!("BOT_TOKEN is not set, admin notifications are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    AppState::new(config, ledger, storage, notifier, bot)
}

async fn run_server(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Panel listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
