use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shardhook::cache::RedisCache;
use shardhook::config::Config;
use shardhook::dispatch::Dispatcher;
use shardhook::github::OctocrabHost;
use shardhook::queue::RedisJobQueue;
use shardhook::server::{AppState, Services, build_router};
use shardhook::shard::ShardResolver;
use shardhook::subscription::CachedSubscriptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardhook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("reading configuration")?;

    let resolver = ShardResolver::from_topology(&config.topology).context("building shard ring")?;
    let cache = Arc::new(
        RedisCache::connect(&config.cache_redis_url)
            .await
            .context("connecting to cache redis")?,
    );
    let queue = Arc::new(
        RedisJobQueue::connect(&config.queue_redis_url)
            .await
            .context("connecting to queue redis")?,
    );

    let pem = std::fs::read(&config.github_private_key_path).with_context(|| {
        format!(
            "reading GitHub App key from {}",
            config.github_private_key_path.display()
        )
    })?;
    let host = OctocrabHost::from_app_key(config.github_app_id, &pem)
        .context("building GitHub App client")?;

    let services = Services {
        subscriptions: Arc::new(CachedSubscriptions::new(cache.clone())),
        cache,
        dispatcher: Dispatcher::new(Arc::new(resolver), queue),
        host: Arc::new(host),
    };
    let app_state = AppState::new(
        config.webhook_secret,
        config.redirect_url,
        config.config_file,
        services,
    );
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
