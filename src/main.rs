use anyhow::Result;
use iostats::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let (tx, _) = broadcast::channel(app_config.publishing.broadcast_capacity);
    let aggregator = Arc::new(sink::Aggregator::new(tx));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let label_dir = Some(&app_config.source.label_dir)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from);

    let ws_connections = Arc::new(AtomicUsize::new(0));
    let mut workers = Vec::with_capacity(app_config.instances.len());
    for instance in &app_config.instances {
        aggregator.register(&instance.name);
        let source =
            diskstats_repo::DiskstatsRepo::new(&app_config.source.diskstats_path, label_dir.clone());
        let check = check::IoCheck::new(&instance.name, source, instance.blacklist()?);
        tracing::info!(
            check = %instance.name,
            blacklist = instance.device_blacklist_re.as_deref().unwrap_or(""),
            "starting io check"
        );
        workers.push(worker::spawn(
            check,
            worker::WorkerDeps {
                sinks: aggregator.clone(),
                stats: Arc::new(worker::WorkerStats::default()),
                ws_connections: ws_connections.clone(),
                shutdown_rx: shutdown_rx.clone(),
            },
            worker::WorkerConfig {
                sample_interval_ms: app_config.monitoring.sample_interval_ms,
                stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
            },
        ));
    }

    let app = routes::app(aggregator, ws_connections, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    for handle in workers {
        let _ = handle.await;
    }
    Ok(())
}
