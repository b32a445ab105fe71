use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ragdoll_netcore::config::SimConfig;
use ragdoll_netcore::metrics::Metrics;
use ragdoll_netcore::net::session::{run_frames, LoopbackSession, ScriptedInput};

/// Render-loop rate, deliberately not a multiple of the tick rate
const FRAME_RATE: u64 = 144;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Ragdoll netcore v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: tick_rate={}, history={}, policy={:?}, latency={} ticks",
        config.tick_rate,
        config.history_capacity,
        config.reconcile_policy,
        config.loopback_latency_ticks
    );

    let metrics = Arc::new(Metrics::new());

    #[cfg(feature = "metrics")]
    {
        let metrics_port: u16 = std::env::var("METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9090);

        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) =
                ragdoll_netcore::metrics::start_metrics_server(metrics_clone, metrics_port).await
            {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let seed: u64 = std::env::var("INPUT_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0x5eed);

    let mut session = LoopbackSession::new(&config, metrics.clone());
    let mut source = ScriptedInput::new(seed);
    let period = Duration::from_micros(1_000_000 / FRAME_RATE);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        frames = run_frames(&mut session, &mut source, period, None) => {
            info!("Frame loop ended after {} frames", frames);
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    session.log_status();
    info!("{}", metrics.to_json());
    info!("Stopped");

    Ok(())
}
