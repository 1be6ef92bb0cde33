//! Main application entry point and high-level flow coordination.
//!
//! Orchestrates the lifecycle after argument parsing: configuration
//! loading, signal handling, starting the sync worker, and draining its
//! event channel until a terminal status arrives. All sync logic lives in
//! the library; this file only wires it to the process environment.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use cablight::args::{CliAction, ParsedArgs, display_help, display_version};
use cablight::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use cablight::logger::Log;
use cablight::{SyncEvent, SyncService, SyncStatus, config};
use cablight::{log_block_start, log_debug, log_end, log_error, log_pipe, log_version};

fn main() {
    let parsed = ParsedArgs::parse(std::env::args().skip(1));

    let code = match parsed.action {
        CliAction::ShowHelp => {
            display_help();
            EXIT_SUCCESS
        }
        CliAction::ShowVersion => {
            display_version();
            EXIT_SUCCESS
        }
        CliAction::ShowHelpDueToError(message) => {
            display_help();
            log_error!("{message}");
            EXIT_FAILURE
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            simulate,
        } => {
            Log::set_debug(debug_enabled);
            match run(config_dir.as_deref(), simulate) {
                Ok(()) => EXIT_SUCCESS,
                Err(err) => {
                    log_pipe!();
                    log_error!("{err:#}");
                    log_end!();
                    EXIT_FAILURE
                }
            }
        }
    };

    std::process::exit(code);
}

fn run(config_dir: Option<&str>, simulate: Option<(Option<u32>, Option<f64>)>) -> anyhow::Result<()> {
    log_version!();

    let mut config = config::load(config_dir)?;
    if let Some((start, speed)) = simulate {
        config.sim_mode = Some(true);
        if start.is_some() {
            config.sim_time_start = start;
        }
        if speed.is_some() {
            config.sim_time_speed = speed;
        }
        config::validate_config(&config)?;
    }
    if config.sim_mode() {
        log_block_start!(
            "Simulation mode: start {:02}:{:02}, {}x speed",
            config.sim_time_start() / 60,
            config.sim_time_start() % 60,
            config.sim_time_speed()
        );
    }

    // SIGINT/SIGTERM raise a flag; the event loop translates it into a
    // cooperative engine stop.
    let term_requested = Arc::new(AtomicBool::new(false));
    for signal in [
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ] {
        signal_hook::flag::register(signal, Arc::clone(&term_requested))?;
    }

    let (events_tx, events_rx) = mpsc::channel();
    let mut service = SyncService::new(config, events_tx);
    service.start()?;

    let mut stopping = false;
    loop {
        match events_rx.recv_timeout(Duration::from_millis(250)) {
            Ok(SyncEvent::Status(SyncStatus::Stopped)) => break,
            Ok(SyncEvent::Status(status)) => {
                log_debug!("Status: {status}");
            }
            Ok(SyncEvent::LightUpdate {
                game_time,
                brightness,
                kelvin,
            }) => {
                log_debug!(
                    "Light update: game_time={game_time} brightness={brightness} kelvin={kelvin}"
                );
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if term_requested.load(Ordering::SeqCst) && !stopping {
            service.stop();
            stopping = true;
        }
    }

    service.join();
    log_block_start!("Goodbye.");
    log_end!();
    Ok(())
}
