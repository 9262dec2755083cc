//! Iléo to InfluxDB2 Forwarder
//!
//! Periodically logs into the Iléo water-portal, downloads the consumption
//! CSV export, parses it into typed readings, and forwards new statistic
//! points to InfluxDB2, reconciled against the last committed timestamp per
//! series so repeated cycles never duplicate and never leave gaps.
//!
//! # Architecture
//!
//! A single supervised refresh task runs one cycle (fetch → parse → publish
//! snapshot → reconcile sensors) every 12 hours by default, with an immediate
//! first cycle at startup.
//!
//! # Features
//!
//! - Automatic restart of the refresh task on failure
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Stale-but-available snapshot when a cycle fails
//! - Timeout protection for hung cycles

mod config;
mod error;
mod model;
mod orchestrator;
mod portal;
mod reconcile;
mod sensor;
mod store;

#[cfg(test)]
mod test_utils;

use crate::error::Error;
use crate::orchestrator::Orchestrator;
use crate::sensor::MeterSensor;
use crate::store::{InfluxStore, StatsStore};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinError;
use tokio::time;
use tokio::time::{sleep, Duration};

/// Application entry point.
///
/// Loads configuration, wires the portal client, orchestrator, sensors, and
/// statistics store together, and supervises the refresh task until a
/// termination signal arrives.
#[tokio::main]
async fn main() {
    let app_config = config::load_app_config().expect("Failed to load AppConfig");
    tracing_subscriber::fmt()
        .with_max_level(app_config.log_level())
        .init();

    let refresh_config =
        Arc::new(config::load_refresh_config().expect("Failed to load RefreshConfig"));
    let sensor_config = config::load_sensor_config().expect("Failed to load SensorConfig");
    let influx_config = config::load_influx_config().expect("Failed to load InfluxConfig");
    let portal_config = config::load_portal_config().expect("Failed to load PortalConfig");

    let email = portal_config.email.clone();
    let store: Arc<dyn StatsStore> = Arc::new(InfluxStore::new(influx_config));
    let portal_client =
        Arc::new(portal::Client::new(portal_config).expect("Failed to build portal client"));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&portal_client),
        refresh_config.window_days,
    ));
    let sensors: Arc<Vec<MeterSensor>> =
        Arc::new(sensor::standard_sensors(&email, &sensor_config, store));

    // Factory for the refresh task, so the supervision loop can recreate it
    // after a panic or timeout
    let create_refresh_task = || -> tokio::task::JoinHandle<()> {
        let config = Arc::clone(&refresh_config);
        tokio::spawn(run_refresh_cycle(
            Arc::clone(&orchestrator),
            Arc::clone(&sensors),
            Duration::from_secs(config.interval_sec),
            config.task_timeout_seconds,
        ))
    };
    let mut refresh_task = create_refresh_task();

    let mut sig_term = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    tracing::info!("Running... Press Ctrl-C or send SIGTERM to terminate.");
    loop {
        tokio::select! {
            // Handle SIGTERM for graceful shutdown in containers
            _ = sig_term.recv() => {
                tracing::info!("Received SIGTERM. Exiting...");
                break;
            }
            // Handle Ctrl-C for manual termination
            _ = ctrl_c() => {
                tracing::info!("Received SIGINT. Exiting...");
                break;
            }
            // Restart the refresh task when it completes or dies
            result = &mut refresh_task => {
                handle_task_result("refresh_cycle", result);
                refresh_task = create_refresh_task();
            }
        }
    }
}

/// Wraps a future with a timeout to prevent a hung cycle from blocking the
/// supervision loop. A timeout is logged, not propagated; the next spawn
/// retries from scratch.
async fn with_timeout<F>(task_name: &'static str, future: F, timeout_seconds: u64)
where
    F: IntoFuture,
{
    let timeout_duration = Duration::from_secs(timeout_seconds);

    match time::timeout(timeout_duration, future).await {
        Ok(_) => {}
        Err(_) => tracing::error!("Task {} timed out.", task_name),
    }
}

/// Runs one refresh cycle, then sleeps for the interval.
///
/// A failed refresh leaves the previous snapshot standing and is only logged;
/// the task completes normally and the supervision loop schedules the next
/// attempt. Sensor backfill failures are independent per series: one series
/// failing to commit does not stop the others.
async fn run_refresh_cycle(
    orchestrator: Arc<Orchestrator>,
    sensors: Arc<Vec<MeterSensor>>,
    interval: Duration,
    timeout_seconds: u64,
) {
    with_timeout(
        "refresh_cycle",
        async {
            match orchestrator.refresh().await {
                Ok(snapshot) => {
                    for sensor in sensors.iter() {
                        match sensor.handle_update(&snapshot).await {
                            Ok(committed) => tracing::info!(
                                series = %sensor.meta().statistic_id,
                                committed,
                                value = ?sensor.current_value(&snapshot),
                                "sensor updated"
                            ),
                            Err(e) => tracing::error!(
                                series = %sensor.meta().statistic_id,
                                "failed to backfill statistics: {:?}",
                                Error::from(e)
                            ),
                        }
                    }
                }
                Err(e) if e.is_auth() => tracing::error!(
                    "Refresh failed: credentials rejected by the portal; previous snapshot stands: {:?}",
                    e
                ),
                Err(e) => {
                    tracing::error!("Refresh failed; previous snapshot stands: {:?}", e)
                }
            }
        },
        timeout_seconds,
    )
    .await;
    sleep(interval).await;
}

/// Handles the result of the supervised task, logging success or failure
/// before the loop recreates it.
fn handle_task_result(task_name: &str, result: Result<(), JoinError>) {
    match result {
        Ok(_) => {
            tracing::debug!("Task {} completed.", task_name);
        }
        Err(e) => {
            tracing::error!("Task {} failed: {:?}", task_name, e);
        }
    }
}
