//! An async, periodic driver for a `ClockManager`.
//!
//! The driver owns nothing but a shared handle to the manager and the period
//! between passes. Each period it locks the manager and calls
//! `ClockManager::run_once`. Clock time does not depend on wall time: the
//! period only decides how often a pass happens.

use crate::config::{ClockResolution, TickclockConfig};
use crate::error::Result;
use crate::manager::{ClockManager, RunReport};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

/// A cloneable handle that runs a `ClockManager` on a fixed period.
#[derive(Clone)]
pub struct ClockDriver {
    manager: Arc<Mutex<ClockManager>>,
    period: Duration,
}

impl ClockDriver {
    /// Wraps `manager` so it runs once every `resolution` period.
    pub fn new(manager: ClockManager, resolution: &ClockResolution) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            period: resolution.period(),
        }
    }

    /// Builds a fresh manager and driver from one configuration.
    pub fn from_config(config: &TickclockConfig) -> Self {
        Self::new(ClockManager::new(config), &config.resolution)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Locks the manager, e.g. to add clocks or callbacks while running.
    pub async fn lock(&self) -> MutexGuard<'_, ClockManager> {
        self.manager.lock().await
    }

    /// A shared handle to the driven manager.
    pub fn manager(&self) -> Arc<Mutex<ClockManager>> {
        self.manager.clone()
    }

    /// Runs a single pass immediately.
    pub async fn run_once(&self) -> RunReport {
        self.manager.lock().await.run_once()
    }

    /// Runs passes every period until a message arrives on `shutdown_rx`.
    ///
    /// Missed periods are skipped rather than replayed in a burst.
    pub async fn run_until_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> u64 {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut passes: u64 = 0;
        info!(period = ?self.period, "clock driver started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let report = self.run_once().await;
                    passes += 1;
                    trace!(pass = passes, ticked = report.ticked, "driver pass");
                    if report.failed > 0 {
                        warn!(failed = report.failed, "callbacks panicked during pass");
                    }
                }
            }
        }
        info!(passes, "clock driver stopped");
        passes
    }

    /// Runs the driver until Ctrl+C is received.
    pub async fn run(&self) -> Result<()> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Runs the driver in the background until `signal` resolves.
    ///
    /// The driver is stopped and joined whether the signal succeeds or fails;
    /// a failed signal is returned afterwards.
    pub async fn run_until<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = io::Result<()>>,
    {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let driver = self.clone();
        let handle = tokio::spawn(async move { driver.run_until_shutdown(shutdown_rx).await });

        let outcome = signal.await;
        match &outcome {
            Ok(()) => info!("Shutdown signal received. Stopping clock driver..."),
            Err(e) => warn!(error = %e, "shutdown signal failed. Stopping clock driver..."),
        }
        shutdown_tx.send(()).ok();
        if handle.await.is_err() {
            warn!("clock driver task ended abnormally");
        }
        outcome?;
        Ok(())
    }
}
