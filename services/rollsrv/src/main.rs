//! RollSrv main program

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, Level};

use common::logging::{self, LogConfig};
use common::{shutdown, HotReloadingSettings, DEFAULT_SETTINGS_PATH};
use rollsrv::{watch_schedule, LogSink, RollScheduler};

#[derive(Parser, Debug)]
#[command(author, version, about = "RollSrv - scheduled number rolls")]
struct Args {
    /// Settings file path
    #[arg(short, long, value_name = "FILE", env = "ROLLER_SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Seconds between settings file checks
    #[arg(long, value_name = "SECS", default_value_t = 2)]
    poll_interval: u64,

    /// Directory for daily log files
    #[arg(long, value_name = "DIR", env = "ROLLER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Roll once immediately and exit
    #[arg(long)]
    roll_now: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_with_config(LogConfig {
        service_name: "rollsrv".to_string(),
        log_dir: args.log_dir.clone(),
        level: if args.verbose { Level::DEBUG } else { Level::INFO },
        ansi: true,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting RollSrv v{}", env!("CARGO_PKG_VERSION"));

    let mut reloader = HotReloadingSettings::new(
        &args.settings,
        Duration::from_secs(args.poll_interval.max(1)),
    )
    .with_context(|| format!("Failed to load settings from {}", args.settings.display()))?;

    let snapshot = reloader.snapshot();
    info!(
        "Loaded settings: channel {}, {} users, {} rules",
        snapshot.settings.bot.channel,
        snapshot.settings.bot.users.len(),
        snapshot.rules.len()
    );

    let schedule_rx = watch_schedule(&reloader);
    let mut scheduler = RollScheduler::new(
        reloader.handle(),
        Arc::new(LogSink),
        StdRng::from_entropy(),
        schedule_rx,
    );

    if args.roll_now {
        scheduler.roll_once().await?;
        return Ok(());
    }

    reloader.start();

    let cancel = shutdown::shutdown_token();
    let result = scheduler.run(cancel).await;

    reloader.stop().await;

    match result {
        Ok(()) => {
            info!("RollSrv stopped");
            Ok(())
        },
        Err(e) => {
            error!("Scheduler failed: {}", e);
            Err(e.into())
        },
    }
}
