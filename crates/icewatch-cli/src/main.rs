//! Icewatch sensor fleet simulator.
//!
//! # Usage
//!
//! ```bash
//! # 30 minutes, one reading per sensor every 10 seconds
//! icewatch
//!
//! # Run until Ctrl-C with a faster cadence
//! icewatch --duration-mins 0 --interval-secs 2
//! ```
//!
//! Credentials are supplied out of band, one connection string per
//! location, e.g. `DOWS_LAKE_CONNECTION_STRING`. Exit codes: 0 on normal
//! completion or interrupt, 1 when no sensor could connect, 2 on
//! missing/malformed credentials.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use icewatch_client::TcpTransport;
use icewatch_core::{
    ConfigError, Credential, DEFAULT_FLEET, RunConfig, SensorConfig, connection_env_var,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Skateway ice sensor fleet simulator
#[derive(Parser, Debug)]
#[command(name = "icewatch")]
#[command(about = "Simulates the skateway ice sensor fleet against an ingestion endpoint")]
#[command(version)]
struct Args {
    /// Run duration in minutes; 0 runs until interrupted
    #[arg(long, default_value = "30")]
    duration_mins: u64,

    /// Seconds between readings
    #[arg(long, default_value = "10")]
    interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override the ingestion endpoint host:port for every sensor
    /// (development)
    #[arg(long)]
    endpoint: Option<String>,
}

/// Total run duration for `--duration-mins`; zero means unbounded.
/// Saturates on absurd values instead of overflowing.
fn run_duration(mins: u64) -> Option<Duration> {
    (mins > 0).then(|| Duration::from_secs(mins.saturating_mul(60)))
}

/// Resolve the fleet's credentials through `lookup` (the environment in
/// production). All failures are collected so the operator sees every
/// missing variable at once, not just the first.
fn load_fleet(
    lookup: impl Fn(&str) -> Option<String>,
    endpoint_override: Option<&str>,
) -> Result<Vec<SensorConfig>, Vec<ConfigError>> {
    let mut sensors = Vec::new();
    let mut errors = Vec::new();

    for entry in DEFAULT_FLEET {
        let env_var = connection_env_var(entry.key);
        let Some(raw) = lookup(&env_var) else {
            errors.push(ConfigError::MissingCredential {
                sensor: entry.key.to_string(),
                env_var,
            });
            continue;
        };

        match Credential::parse(&raw) {
            Ok(mut credential) => {
                if let Some(host) = endpoint_override {
                    credential.host = host.to_string();
                }
                sensors.push(SensorConfig {
                    key: entry.key.to_string(),
                    device_id: entry.device_id.to_string(),
                    location: entry.location.to_string(),
                    credential,
                });
            },
            Err(source) => errors.push(ConfigError::MalformedCredential {
                sensor: entry.key.to_string(),
                source,
            }),
        }
    }

    if errors.is_empty() { Ok(sensors) } else { Err(errors) }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    // Surface configuration problems before any connection attempt.
    let sensors = match load_fleet(|var| std::env::var(var).ok(), args.endpoint.as_deref()) {
        Ok(sensors) => sensors,
        Err(errors) => {
            for err in &errors {
                tracing::error!("{err}");
            }
            tracing::error!("set the listed connection strings and retry");
            return ExitCode::from(2);
        },
    };

    let run_config = RunConfig {
        tick_interval: Duration::from_secs(args.interval_secs.max(1)),
        duration: run_duration(args.duration_mins),
        ..RunConfig::default()
    };

    match run_config.duration {
        Some(duration) => tracing::info!(
            "simulating {} locations for {} minutes, one reading every {}s",
            sensors.len(),
            duration.as_secs() / 60,
            run_config.tick_interval.as_secs(),
        ),
        None => tracing::info!(
            "simulating {} locations until interrupted, one reading every {}s",
            sensors.len(),
            run_config.tick_interval.as_secs(),
        ),
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    match icewatch_sim::run(&sensors, &run_config, cancel, |_| TcpTransport::new()).await {
        Ok(report) => {
            tracing::info!(
                "simulation complete: {} ticks, {} readings published, {} skipped",
                report.ticks,
                report.published,
                report.skipped,
            );
            if !report.failed_sensors.is_empty() {
                tracing::warn!("sensors excluded mid-run: {}", report.failed_sensors.join(", "));
            }
            ExitCode::SUCCESS
        },
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(1)
        },
    }
}
