//! `hcm-cli` – Hardware Control Manager binary
//!
//! Runs the HCM against a simulated robot:
//!
//! 1. Loads `~/.hcm/config.toml`, writing a default file on first run.
//! 2. Wires the blackboard to the simulated actuation and sensor feed.
//! 3. Runs the control loop at `tick_rate_hz`, printing every state change
//!    and fault published on the event bus.
//! 4. The first **Ctrl-C** requests a shutdown: the robot sits down and the
//!    loop ends once it holds the shut-down state.  A second Ctrl-C stops
//!    the loop immediately.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use colored::Colorize;
use hcm_hal::{SimActuation, SimSensorFeed};
use hcm_kernel::Blackboard;
use hcm_middleware::{EventBus, Topic, TopicReceiver};
use hcm_runtime::telemetry::init_tracing;
use hcm_runtime::{ControlLoop, Hcm};
use hcm_types::EventPayload;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    // Hold the guard for the whole process so pending spans are flushed.
    let _telemetry = init_tracing("hcm");

    print_banner();

    let cfg = match config::load_or_init() {
        Ok((cfg, created)) => {
            let path = config::config_path().display().to_string();
            if created {
                println!("  {} Default config written to {}", "✓".green().bold(), path.bold());
            } else {
                println!("  Config loaded from {}", path.bold());
            }
            cfg
        }
        Err(e) => {
            error!(error = %e, "invalid configuration");
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    info!(?cfg, "configuration");

    let blackboard = match cfg.to_blackboard_config() {
        Ok(bb_config) => Blackboard::new(bb_config),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    // ── Simulated robot ───────────────────────────────────────────────────
    let actuation = SimActuation::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let feed = SimSensorFeed::new(blackboard.clone(), actuation.plant())
        .spawn(cfg.tick_period(), Arc::clone(&shutdown));

    // ── HCM ───────────────────────────────────────────────────────────────
    let bus = EventBus::default();
    let states = bus.subscribe_to(Topic::RobotState);
    let alerts = bus.subscribe_to(Topic::SystemAlerts);
    let hcm = match Hcm::new(blackboard.clone(), Box::new(actuation), cfg.max_hops) {
        Ok(hcm) => hcm.with_bus(bus),
        Err(e) => {
            error!(error = %e, "refusing to start");
            println!("{}: {}", "Startup aborted".red().bold(), e);
            shutdown.store(true, Ordering::SeqCst);
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let presses = Arc::new(AtomicUsize::new(0));
    let ctrlc_blackboard = blackboard.clone();
    let ctrlc_shutdown = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            println!("{}", "⚠  Ctrl-C received – sitting down …".yellow().bold());
            println!("{}", "   Press Ctrl-C again to stop immediately.".dimmed());
            ctrlc_blackboard.request_shutdown();
        } else {
            println!("{}", "⚠  Stopping the control loop now.".yellow().bold());
            ctrlc_shutdown.store(true, Ordering::SeqCst);
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; shutdown on Ctrl-C will not be available");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            shutdown.store(true, Ordering::SeqCst);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "\n  Running at {} Hz{}.  Press {} to shut down.\n",
        cfg.tick_rate_hz,
        if cfg.simulation_active { " (simulation)" } else { "" },
        "Ctrl-C".bold().cyan()
    );

    let mut control = ControlLoop::new(hcm, cfg.tick_period(), Arc::clone(&shutdown));
    let result = runtime.block_on(async {
        tokio::spawn(monitor(states));
        tokio::spawn(monitor(alerts));
        control.run().await
    });

    shutdown.store(true, Ordering::SeqCst);
    if feed.join().is_err() {
        warn!("sensor feed thread panicked");
    }

    match result {
        Ok(ticks) => {
            println!(
                "\n  {} HCM stopped after {} ticks in state {}.",
                "✓".green().bold(),
                ticks,
                blackboard
                    .current_state()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string())
                    .bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "control loop aborted");
            println!("{}: {}", "Control loop aborted".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Print every event published on one topic.
async fn monitor(mut rx: TopicReceiver) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.payload {
                EventPayload::StateChanged { from, to, tick } => println!(
                    "  [{:>6}] {} {} → {}",
                    tick,
                    "state".cyan(),
                    from.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    to.to_string().bold()
                ),
                EventPayload::Fault { fault, state, tick } => println!(
                    "  [{:>6}] {} {:?} on {} ({})",
                    tick,
                    "fault".red().bold(),
                    fault,
                    fault.component(),
                    state
                ),
                EventPayload::FaultCleared { fault, tick } => {
                    println!("  [{:>6}] {} {:?}", tick, "cleared".green(), fault)
                }
            },
            Err(RecvError::Lagged(n)) => warn!(topic = ?rx.topic(), lagged_by = n, "monitor lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   __ __  _____ __  ___"#.bold().cyan());
    println!("{}", r#"  / // / / ___//  |/  /"#.bold().cyan());
    println!("{}", r#" / _  / / /__ / /|_/ / "#.bold().cyan());
    println!("{}", r#"/_//_/  \___//_/  /_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "HCM".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Hardware Control Manager");
    println!();
}
