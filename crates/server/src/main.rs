//! edgecache server entry point.
//!
//! Boots the caching proxy (install, activate, background jobs) and exposes it
//! as an MCP server on stdio. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use edgecache_client::{
    BackgroundConfig, BackgroundTasks, EventQueue, EventSync, ExpirySweep, FetchClient, FetchConfig, HttpEventSink,
    LifecycleController, NotificationHook, ProxyOptions, ProxyState,
};
use edgecache_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use url::Url;

mod error;
mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(db = %config.db_path.display(), "starting edgecache on stdio transport");

    let db = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let origin = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let state = ProxyState::new(db.clone(), origin, ProxyOptions::from_config(&config)?);

    let mut lifecycle = LifecycleController::new(state.clone(), config.manifest.clone());
    match lifecycle.run().await {
        Ok(reclaimed) => tracing::info!(reclaimed = reclaimed.len(), "proxy activated"),
        Err(e) => tracing::warn!(error = %e, "install failed, serving without pre-warmed cache"),
    }

    let sweep = ExpirySweep::new(&state, config.expiry_threshold());
    let sync = match config.require_sink_url() {
        Ok(url) => {
            let sink = HttpEventSink::new(Url::parse(url)?, &config.user_agent, config.timeout())?;
            Some(EventSync::new(db.clone(), Arc::new(sink), config.sync_tag.clone()))
        }
        Err(e) => {
            tracing::info!(reason = %e, "buffered events will not be synced");
            None
        }
    };
    let tasks = BackgroundTasks::start(sweep.clone(), sync, BackgroundConfig::from(&config));

    let notifications = Arc::new(host::PendingNotifications::default());
    let services = handler::Services {
        state: state.clone(),
        sweep,
        events: EventQueue::new(db),
        sync: tasks.sync_trigger(),
        hook: NotificationHook::new(notifications.clone(), config.app_root.clone()),
        notifications,
    };

    let server = serve_server(handler::EdgecacheServer::new(services), stdio()).await?;
    server.waiting().await?;

    state.settle_refreshes().await;
    tasks.shutdown().await;
    Ok(())
}
