use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use tasknest::application::error_sink::TracingErrorSink;
use tasknest::application::tasks::TaskService;
use tasknest::cache::{CacheStore, MemoryStore, RedisStore};
use tasknest::config::{CliArgs, Settings};
use tasknest::infra::db::PostgresRepositories;
use tasknest::infra::http::{self, AppState, RateLimiter};
use tasknest::infra::telemetry;
use tasknest::util::clock::SystemClock;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("tasknest failed: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();
    let settings = Settings::load(&cli)?;
    telemetry::init(&settings.logging)?;

    let clock = Arc::new(SystemClock);

    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections,
    )
    .await?;
    PostgresRepositories::run_migrations(&pool).await?;
    let repo = Arc::new(PostgresRepositories::new(pool, clock.clone()));

    let cache: Arc<dyn CacheStore> = match &settings.redis.url {
        Some(url) => {
            info!(backend = "redis", "cache store selected");
            Arc::new(RedisStore::connect(url)?)
        }
        None => {
            info!(backend = "memory", "cache store selected");
            Arc::new(MemoryStore::new(clock))
        }
    };

    let tasks = Arc::new(
        TaskService::new(repo, cache.clone(), Arc::new(TracingErrorSink))
            .with_ttl(settings.cache.ttl),
    );
    let rate_limiter = Arc::new(RateLimiter::new(
        cache,
        settings.rate_limit.window,
        settings.rate_limit.max_requests,
    ));

    let state = AppState {
        tasks,
        rate_limiter,
        cache_max_age_secs: settings.cache.ttl.as_secs(),
    };
    let app = http::router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, mode = ?settings.server.mode, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(settings.server.graceful_shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(
        grace_secs = grace.as_secs(),
        "shutdown signal received, draining connections"
    );
    // In-flight requests get the grace period, then the process exits.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("graceful shutdown window elapsed, exiting");
        process::exit(0);
    });
}
