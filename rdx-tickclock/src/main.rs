use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tickclock::prelude::*;
use tickclock::{ENGINE_NAME, VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the configuration; a missing file falls back to defaults.
    let config = TickclockConfig::load("tickclock.toml")?;
    info!(
        "{} v{} running at {:?} ({} per step)",
        ENGINE_NAME,
        VERSION,
        config.resolution,
        config.count_amount()
    );

    // 3. Create the driver, which owns a fresh manager.
    let driver = ClockDriver::from_config(&config);

    // 4. Listen for clock lifecycle events.
    spawn_event_listener(&driver).await;

    // 5. Register clocks to exercise the engine.
    register_demo_clocks(&driver).await?;

    // 6. Run until Ctrl+C.
    driver.run().await?;

    Ok(())
}

/// Spawns a task that logs every `ClockEvent` the manager broadcasts.
async fn spawn_event_listener(driver: &ClockDriver) {
    let mut events = driver.lock().await.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("[CLOCK] => {:?}", event);
        }
    });
}

/// Registers a timer and a stopwatch with a few callbacks attached.
async fn register_demo_clocks(driver: &ClockDriver) -> Result<()> {
    let mut manager = driver.lock().await;
    let step = manager.count_amount();

    // --- A ten-second timer that reports every second and ends at zero ---
    let timer_id = manager.create_timer(10_000)?;
    if let Some(timer) = manager.timer_mut(timer_id) {
        timer.add_callback(
            |snapshot: &TimerSnapshot| {
                info!("[TIMER] {}ms of {}ms left", snapshot.base.time, snapshot.length);
                true
            },
            1_000,
        );
        timer.set_end_condition(TimerEndCondition);
        timer.start();
    }

    // --- A stopwatch with a callback that mutes itself after three runs ---
    let runs = Arc::new(AtomicU32::new(0));
    let stopwatch_id = manager.create_stopwatch(5_000)?;
    if let Some(stopwatch) = manager.stopwatch_mut(stopwatch_id) {
        let counter = runs.clone();
        stopwatch.add_callback(
            move |snapshot: &StopwatchSnapshot| {
                let run = counter.fetch_add(1, Ordering::Relaxed) + 1;
                info!("[STOPWATCH] run #{} at {}ms", run, snapshot.base.time);
                run < 3
            },
            step * 10,
        );
        stopwatch.set_end_condition(StopwatchEndCondition);
        stopwatch.start();
    }

    Ok(())
}
