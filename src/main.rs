use anyhow::Context;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod database;
mod dtos;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::AppConfig;
use database::connection::get_db_client;
use database::match_store::MongoMatchStore;
use services::cleanup::run_cleanup;
use services::feed_client::HttpFeedClient;
use state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Sync,
    Resync,
    Cleanup,
}

impl Command {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg.map(str::trim) {
            None | Some("") | Some("serve") => Ok(Command::Serve),
            Some("sync") => Ok(Command::Sync),
            Some("resync") => Ok(Command::Resync),
            Some("cleanup") => Ok(Command::Cleanup),
            Some(other) => anyhow::bail!("unknown command '{}' (expected serve|sync|resync|cleanup)", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let command = Command::parse(std::env::args().nth(1).as_deref())?;
    tracing::info!("🔧 Config: {}", config.get_config_info());

    let app_state = initialize_app_state(&config).await?;

    match command {
        Command::Serve => serve(app_state, &config).await,
        Command::Sync => {
            app_state.reconciler.live_pass(Utc::now()).await;
            app_state.reconciler.full_pass(Utc::now()).await;
            Ok(())
        }
        Command::Resync => {
            app_state.reconciler.resync(Utc::now()).await;
            Ok(())
        }
        Command::Cleanup => {
            run_cleanup(app_state.store.as_ref(), Utc::now())
                .await
                .context("cleanup pass")?;
            Ok(())
        }
    }
}

async fn initialize_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let db = get_db_client(config).await.context("connecting to MongoDB")?;

    let store = MongoMatchStore::new(db);
    store.ensure_indexes().await.context("creating match indexes")?;

    let feed = HttpFeedClient::new(config).context("building feed client")?;
    tracing::info!("✅ Feed client ready for {}", config.feed_base_url);

    Ok(AppState::new(
        Arc::new(store),
        Arc::new(feed),
        config.sync.clone(),
        Duration::from_secs(config.odds_cache_ttl_secs),
    ))
}

async fn serve(app_state: AppState, config: &AppConfig) -> anyhow::Result<()> {
    let _passes = app_state.reconciler.clone().spawn();
    tracing::info!(
        "⏱️ Live pass every {:?}, full pass every {:?}",
        config.sync.live_pass_every,
        config.sync.full_pass_every
    );

    let app = routes::build_router(app_state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    tracing::info!("🚀 Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving HTTP")?;
    Ok(())
}
