use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use tickclock::prelude::*;
use tickclock::{ENGINE_NAME, VERSION as LIB_VERSION};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// A driver running in the background, plus the means to stop it.
struct BackgroundRun {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<u64>,
}

/// Everything the shell keeps between commands.
struct Shell {
    driver: ClockDriver,
    handles: BTreeMap<usize, ClockId>,
    next_handle: usize,
    background: Option<BackgroundRun>,
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", format!("  {} shell", ENGINE_NAME).cyan().bold());
    println!("{}", "-".repeat(60).dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";
    println!("{}", license_blurb.dimmed());
    println!("{}", "-".repeat(60).dimmed());
}

/// Prints evictions and other manager events as they happen.
async fn spawn_event_listener(driver: &ClockDriver) {
    let mut events = driver.lock().await.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("\n<-- [CLOCK EVENT] {:?}", event);
        }
    });
}

fn print_help() {
    println!("Available commands:");
    println!("  timer <LEN>           - Creates a timer counting down from LEN.");
    println!("  stopwatch <END>       - Creates a stopwatch counting up to END.");
    println!("  every <H> <INTERVAL>  - Attaches a printing callback to clock #H.");
    println!("  end <H>               - Attaches the default end condition to clock #H.");
    println!("  start|pause <H>       - Unpauses or pauses clock #H.");
    println!("  cancel|uncancel <H>   - Marks or unmarks clock #H for eviction.");
    println!("  tick [N]              - Runs N passes by hand (default 1).");
    println!("  run | halt            - Starts or stops the background driver.");
    println!("  step <N>              - Sets the global step (0 disables it).");
    println!("  list                  - Shows all clocks and their handles.");
    println!("  exit                  - Quits the shell.");
}

impl Shell {
    fn new(driver: ClockDriver) -> Self {
        Self {
            driver,
            handles: BTreeMap::new(),
            next_handle: 0,
            background: None,
        }
    }

    fn remember(&mut self, id: ClockId) -> usize {
        let handle = self.next_handle;
        self.handles.insert(handle, id);
        self.next_handle += 1;
        handle
    }

    fn resolve(&self, arg: Option<&&str>) -> Option<ClockId> {
        let handle = match arg.map(|s| s.parse::<usize>()) {
            Some(Ok(handle)) => handle,
            _ => {
                println!("Error: expected a clock handle (e.g., '0', '1').");
                return None;
            }
        };
        let id = self.handles.get(&handle).copied();
        if id.is_none() {
            println!("Error: Invalid handle #{}. Use 'list' to see clocks.", handle);
        }
        id
    }

    async fn create(&mut self, kind: ClockKind, arg: Option<&&str>) {
        let Some(Ok(amount)) = arg.map(|s| s.parse::<i64>()) else {
            println!("Usage: timer <LEN> | stopwatch <END>");
            return;
        };
        let created = {
            let mut manager = self.driver.lock().await;
            match kind {
                ClockKind::Timer => manager.create_timer(amount),
                ClockKind::Stopwatch => manager.create_stopwatch(amount),
            }
        };
        match created {
            Ok(id) => {
                let handle = self.remember(id);
                println!("--> Created {:?} with handle #{} (paused).", kind, handle);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    async fn every(&mut self, args: &[&str]) {
        let Some(id) = self.resolve(args.get(1)) else { return };
        let Some(Ok(interval)) = args.get(2).map(|s| s.parse::<i64>()) else {
            println!("Usage: every <H> <INTERVAL>");
            return;
        };
        let mut manager = self.driver.lock().await;
        let registered = match manager.clock_mut(id) {
            Some(ManagedClock::Timer(timer)) => timer.add_callback(
                |s: &TimerSnapshot| {
                    println!("<-- [TIMER] {} of {} left", s.base.time, s.length);
                    true
                },
                interval,
            ),
            Some(ManagedClock::Stopwatch(watch)) => watch.add_callback(
                |s: &StopwatchSnapshot| {
                    println!("<-- [STOPWATCH] {} of {}", s.base.time, s.end_time);
                    true
                },
                interval,
            ),
            None => None,
        };
        match registered {
            Some(callback) => println!("--> Callback {} registered.", callback),
            None => println!("--> Error: clock no longer exists."),
        }
    }

    async fn end(&mut self, args: &[&str]) {
        let Some(id) = self.resolve(args.get(1)) else { return };
        let mut manager = self.driver.lock().await;
        match manager.clock_mut(id) {
            Some(ManagedClock::Timer(timer)) => timer.set_end_condition(TimerEndCondition),
            Some(ManagedClock::Stopwatch(watch)) => {
                watch.set_end_condition(StopwatchEndCondition)
            }
            None => {
                println!("--> Error: clock no longer exists.");
                return;
            }
        }
        println!("--> End condition attached.");
    }

    async fn toggle(&mut self, command: &str, args: &[&str]) {
        let Some(id) = self.resolve(args.get(1)) else { return };
        let mut manager = self.driver.lock().await;
        let Some(clock) = manager.clock_mut(id) else {
            println!("--> Error: clock no longer exists.");
            return;
        };
        match command {
            "start" => clock.unpause(),
            "pause" => clock.pause(),
            "cancel" => clock.cancel(),
            _ => clock.uncancel(),
        }
        println!("--> {} applied.", command);
    }

    async fn tick(&mut self, args: &[&str]) {
        let passes = match args.get(1).map(|s| s.parse::<usize>()) {
            None => 1,
            Some(Ok(n)) => n,
            Some(Err(_)) => {
                println!("Usage: tick [N]");
                return;
            }
        };
        for _ in 0..passes {
            let report = self.driver.run_once().await;
            println!(
                "--> ticked {} / skipped {} / fired {} / evicted {}",
                report.ticked,
                report.skipped,
                report.fired,
                report.evicted.len()
            );
        }
    }

    fn run(&mut self) {
        if self.background.is_some() {
            println!("--> Driver is already running.");
            return;
        }
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let driver = self.driver.clone();
        let handle = tokio::spawn(async move { driver.run_until_shutdown(shutdown_rx).await });
        self.background = Some(BackgroundRun { shutdown_tx, handle });
        println!("--> Driver started every {:?}.", self.driver.period());
    }

    async fn halt(&mut self) {
        let Some(run) = self.background.take() else {
            println!("--> Driver is not running.");
            return;
        };
        run.shutdown_tx.send(()).ok();
        match run.handle.await {
            Ok(passes) => println!("--> Driver stopped after {} passes.", passes),
            Err(e) => println!("--> Driver task failed: {}", e),
        }
    }

    async fn step(&mut self, args: &[&str]) {
        let Some(Ok(step)) = args.get(1).map(|s| s.parse::<i64>()) else {
            println!("Usage: step <N>");
            return;
        };
        self.driver.lock().await.set_global_step(GlobalStep(step));
        println!("--> Global step set to {}.", step);
    }

    async fn list(&mut self) {
        let manager = self.driver.lock().await;
        self.handles.retain(|_, id| manager.contains(*id));
        println!("Clocks (global step {}):", manager.global_step().0);
        for (handle, id) in &self.handles {
            if let Some(clock) = manager.clock(*id) {
                println!(
                    "  #{} {:?} time={} step={} paused={} cancelled={} callbacks={}",
                    handle,
                    clock.kind(),
                    clock.time(),
                    clock.step(),
                    clock.is_paused(),
                    clock.is_cancelled(),
                    clock.callback_count()
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config = TickclockConfig::load("tickclock.toml")?;
    let driver = ClockDriver::from_config(&config);
    spawn_event_listener(&driver).await;
    info!("{} shell ready", ENGINE_NAME);

    let mut shell = Shell::new(driver);
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter {}));

    println!("{} shell is ready. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(_) => {
                println!("Exiting tickshell...");
                break;
            }
        };
        rl.add_history_entry(line.as_str())?;
        let args = line.split_whitespace().collect::<Vec<_>>();
        let Some(command) = args.first().copied() else { continue };

        match command {
            "timer" => shell.create(ClockKind::Timer, args.get(1)).await,
            "stopwatch" => shell.create(ClockKind::Stopwatch, args.get(1)).await,
            "every" => shell.every(&args).await,
            "end" => shell.end(&args).await,
            "start" | "pause" | "cancel" | "uncancel" => shell.toggle(command, &args).await,
            "tick" => shell.tick(&args).await,
            "run" => shell.run(),
            "halt" => shell.halt().await,
            "step" => shell.step(&args).await,
            "list" => shell.list().await,
            "help" => print_help(),
            "exit" => break,
            _ => println!("Unknown command: '{}'. Type 'help'.", line),
        }
    }

    shell.halt_quietly().await;
    Ok(())
}

impl Shell {
    async fn halt_quietly(&mut self) {
        if let Some(run) = self.background.take() {
            run.shutdown_tx.send(()).ok();
            run.handle.await.ok();
        }
    }
}
