//! Telemetry → light sync engine.
//!
//! One background worker polls the telemetry source on a fixed cadence,
//! tracks game connect/disconnect transitions, evaluates the light curve
//! at the (optionally timezone-shifted) game time, and drives the light
//! controller. Status and light-update events go out over an unbounded
//! channel, fire-and-forget, so observers can never block the worker.
//!
//! Invariants the loop preserves:
//! - telemetry flakiness and network failures never terminate the loop;
//!   only an explicit stop or a fatal configuration error does
//! - the light is reset to its default appearance on every disconnect and
//!   unconditionally on shutdown, whatever state preceded it
//! - a stop request is honored within one sleep slice, not one poll
//!   interval

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::{ApplyMode, Config};
use crate::constants::{MINUTES_PER_DAY, SIM_POLL_INTERVAL};
use crate::curve::Curve;
use crate::geo::GeoResolver;
use crate::ha::{HaClient, LightCommand, LightController};
use crate::telemetry::{SimulatedClock, TelemetrySource};

/// Sleep slice granularity; bounds stop latency.
const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// Engine lifecycle status, mirrored to observers on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Poll loop started, game status not yet known.
    Running,
    /// Telemetry present; the light follows the game clock.
    Connected,
    /// Telemetry absent; waiting for the game to (re)appear.
    Waiting,
    /// Terminal: explicit stop completed, light reset issued.
    Stopped,
    /// Terminal: fatal misconfiguration, no light call was made.
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Connected => "connected",
            SyncStatus::Waiting => "waiting",
            SyncStatus::Stopped => "stopped",
            SyncStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered to external observers (GUI, logs). Never consumed by
/// the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    Status(SyncStatus),
    LightUpdate {
        /// Effective game time the curve was evaluated at.
        game_time: u32,
        brightness: u8,
        kelvin: u32,
    },
}

/// Everything a [`SyncEngine`] needs, bundled to keep construction flat.
pub struct EngineParams {
    pub source: TelemetrySource,
    pub client: Box<dyn LightController>,
    pub geo: Option<GeoResolver>,
    pub curve: Curve,
    pub poll_interval: Duration,
    pub apply_mode: ApplyMode,
    /// Transition passed to each light call, in seconds.
    pub transition: f64,
    pub events: Sender<SyncEvent>,
    pub stop: Arc<AtomicBool>,
}

/// The poll-loop state machine. Owned and driven by exactly one worker;
/// restarting requires a full stop-then-start cycle.
pub struct SyncEngine {
    source: TelemetrySource,
    client: Box<dyn LightController>,
    geo: Option<GeoResolver>,
    curve: Curve,
    poll_interval: Duration,
    apply_mode: ApplyMode,
    transition: f64,
    events: Sender<SyncEvent>,
    stop: Arc<AtomicBool>,
    connected: bool,
    last_applied: Option<(u8, u32)>,
}

impl SyncEngine {
    pub fn new(params: EngineParams) -> Self {
        Self {
            source: params.source,
            client: params.client,
            geo: params.geo,
            curve: params.curve,
            poll_interval: params.poll_interval,
            apply_mode: params.apply_mode,
            transition: params.transition,
            events: params.events,
            stop: params.stop,
            connected: false,
            last_applied: None,
        }
    }

    /// Run the poll loop until the stop flag is raised.
    ///
    /// Always finishes with a best-effort light reset and a `Stopped`
    /// status, whatever state the loop was in.
    pub fn run(&mut self) {
        log_block_start!(
            "Sync running [poll={}s, {}]",
            self.poll_interval.as_secs_f64(),
            match self.apply_mode {
                ApplyMode::Always => "apply=always",
                ApplyMode::OnChange => "apply=on-change",
            }
        );
        self.emit(SyncEvent::Status(SyncStatus::Running));

        while !self.stop.load(Ordering::SeqCst) {
            self.poll_once();
            self.sleep_sliced();
        }

        self.finish();
    }

    /// One evaluation cycle: read telemetry, track connect state, apply.
    pub fn poll_once(&mut self) {
        let Some(snapshot) = self.source.read() else {
            if self.connected {
                log_block_start!("Game disconnected — resetting light");
                self.reset_light();
                self.connected = false;
                self.last_applied = None;
                self.emit(SyncEvent::Status(SyncStatus::Waiting));
            }
            return;
        };

        if !self.connected {
            log_block_start!("Game connected");
            self.connected = true;
            // New session: a stale cached position must not suppress the
            // first timezone lookup.
            if let Some(geo) = &mut self.geo {
                geo.reset();
            }
            self.emit(SyncEvent::Status(SyncStatus::Connected));
        }

        if snapshot.paused {
            log_debug!("Game paused at {}", format_time(snapshot.game_time));
        }

        let game_time = self.effective_time(&snapshot);
        let (brightness, kelvin) = self.curve.evaluate(game_time);

        let should_apply = match self.apply_mode {
            ApplyMode::Always => true,
            ApplyMode::OnChange => self.last_applied != Some((brightness, kelvin)),
        };
        if !should_apply {
            return;
        }

        if brightness == 0 {
            log_decorated!("Game {} → off", format_time(game_time));
        } else {
            log_decorated!(
                "Game {} → brightness={:3}/255 color_temp={}K",
                format_time(game_time),
                brightness,
                kelvin
            );
        }

        let command = LightCommand {
            brightness,
            kelvin,
            transition: self.transition,
        };
        if let Err(err) = self.client.apply(command) {
            log_warning!("Light call failed (will retry next cycle): {err:#}");
        }
        self.last_applied = Some((brightness, kelvin));
        self.emit(SyncEvent::LightUpdate {
            game_time,
            brightness,
            kelvin,
        });
    }

    /// Final cleanup: unconditional reset, then the terminal status.
    pub fn finish(&mut self) {
        log_block_start!("Shutting down — resetting light to default");
        self.reset_light();
        self.emit(SyncEvent::Status(SyncStatus::Stopped));
    }

    fn effective_time(&mut self, snapshot: &crate::telemetry::TelemetrySnapshot) -> u32 {
        let Some(geo) = &mut self.geo else {
            return snapshot.game_time;
        };
        let (offset_minutes, _tz) = geo.resolve(snapshot.truck_x, snapshot.truck_z);
        (snapshot.game_time as i64 + offset_minutes as i64).rem_euclid(MINUTES_PER_DAY as i64)
            as u32
    }

    fn reset_light(&mut self) {
        if let Err(err) = self.client.reset() {
            log_warning!("Light reset failed: {err:#}");
        }
    }

    fn emit(&self, event: SyncEvent) {
        // Fire-and-forget: a dropped receiver must not disturb the loop.
        let _ = self.events.send(event);
    }

    fn sleep_sliced(&self) {
        let mut remaining = self.poll_interval;
        while !remaining.is_zero() && !self.stop.load(Ordering::SeqCst) {
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }
}

fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Worker-thread wrapper enforcing the single-engine rule.
///
/// `start` spawns the engine on a background thread and is a no-op while a
/// worker is still active; restarting requires `stop` and `join` first.
pub struct SyncService {
    config: Config,
    events: Sender<SyncEvent>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(config: Config, events: Sender<SyncEvent>) -> Self {
        Self {
            config,
            events,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Whether a worker thread is currently active.
    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Start the sync worker. No-op if one is already active.
    ///
    /// Fatal misconfiguration (missing token) is reported here: an `Error`
    /// status is emitted, no worker is spawned, and no light call is made.
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.is_active() {
            log_debug!("Sync already active; start request ignored");
            return Ok(());
        }

        let client = match HaClient::new(&self.config) {
            Ok(client) => client,
            Err(err) => {
                let _ = self.events.send(SyncEvent::Status(SyncStatus::Error));
                return Err(err);
            }
        };

        let mut engine = match build_engine(
            &self.config,
            Box::new(client),
            self.events.clone(),
            Arc::clone(&self.stop),
        ) {
            Ok(engine) => engine,
            Err(err) => {
                let _ = self.events.send(SyncEvent::Status(SyncStatus::Error));
                return Err(err);
            }
        };

        self.stop.store(false, Ordering::SeqCst);
        self.worker = Some(std::thread::spawn(move || engine.run()));
        Ok(())
    }

    /// Request the worker to stop after its current sleep slice.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Block until the worker has fully terminated.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Assemble an engine from configuration (source, curve, geo, cadence).
fn build_engine(
    config: &Config,
    client: Box<dyn LightController>,
    events: Sender<SyncEvent>,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<SyncEngine> {
    let curve = config.curve()?;

    let (source, poll_secs) = if config.sim_mode() {
        let clock = SimulatedClock::new(config.sim_time_start(), config.sim_time_speed());
        // Accelerated days need a short cadence to render smoothly.
        (TelemetrySource::Simulated(clock), SIM_POLL_INTERVAL)
    } else {
        (TelemetrySource::SharedMemory, config.poll_interval())
    };

    // Simulated snapshots carry NaN coordinates, so the resolver would sit
    // on its NaN guard; skip building it entirely.
    let geo = (config.timezone_sync() && !config.sim_mode()).then(GeoResolver::new);

    Ok(SyncEngine::new(EngineParams {
        source,
        client,
        geo,
        curve,
        poll_interval: Duration::from_secs(poll_secs),
        apply_mode: config.apply_mode(),
        transition: config.transition_time(),
        events,
        stop,
    }))
}
