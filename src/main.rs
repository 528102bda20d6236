use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slidegate::config::AppConfig;
use slidegate::http::{router, ClientIpResolver, RequestAdmission};
use slidegate::ratelimit::{
    Clock, MemoryWindowStore, RateLimiterGate, RedisWindowStore, SystemClock, WindowStore,
};
use slidegate::verification::{
    CodeService, CodeStore, LogSmsSender, MemoryCodeStore, RedisCodeStore, VerificationThrottle,
};

/// How often the in-process store drops idle records.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "slidegate", version, about = "Distributed sliding-window rate limiting")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting Slidegate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    config.validate()?;
    info!(http_addr = %config.server.http_addr, "Configuration loaded");

    let window_store: Arc<dyn WindowStore>;
    let code_store: Arc<dyn CodeStore>;
    if config.redis.is_memory() {
        info!("Using in-process window store");
        let windows = Arc::new(MemoryWindowStore::new());
        let codes = Arc::new(MemoryCodeStore::new());
        spawn_purge_task(windows.clone(), codes.clone());
        window_store = windows;
        code_store = codes;
    } else {
        let store =
            RedisWindowStore::connect(&config.redis.url, config.redis.command_timeout()).await?;
        store.ping().await?;
        info!("Connected to Redis");
        code_store = Arc::new(RedisCodeStore::new(store.connection()));
        window_store = Arc::new(store);
    }

    let ip_gate = RateLimiterGate::new(config.limits.ip.to_policy()?, window_store.clone());
    let admission = RequestAdmission::new(
        ip_gate,
        ClientIpResolver::new(config.server.trusted_proxies.clone()),
    );

    let throttle = VerificationThrottle::new(
        config.verification.send.to_policy()?,
        config.verification.check.to_policy()?,
        window_store,
    )?;
    let codes = CodeService::new(
        throttle,
        code_store,
        Arc::new(LogSmsSender::new()),
        config.verification.code_settings(),
    );

    let app = router(codes, admission);
    let listener = tokio::net::TcpListener::bind(config.server.http_addr).await?;
    info!("Listening on {}", config.server.http_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Slidegate stopped");
    Ok(())
}

/// Periodically drop idle records and expired codes from the in-process stores.
fn spawn_purge_task(windows: Arc<MemoryWindowStore>, codes: Arc<MemoryCodeStore>) {
    let clock = SystemClock::new();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let now_ms = clock.now_ms();
            windows.purge_expired(now_ms);
            codes.purge_expired(now_ms);
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
