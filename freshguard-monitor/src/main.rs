use std::path::PathBuf;

use anyhow::Context;
use freshguard_monitor::MonitorConfig;
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FRESHGUARD_CONFIG").ok())
        .map(PathBuf::from);

    let config = MonitorConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let mut monitor = config.build().context("failed to set up monitor")?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => log::warn!("cannot listen for Ctrl-C: {}", e),
            }
        });

        monitor.run(cancel).await;
        Ok::<(), anyhow::Error>(())
    })
}
