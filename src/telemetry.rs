//! Game telemetry sources.
//!
//! The primary source reads the named shared memory published by the
//! RenCloud scs-sdk-plugin (`Local\SCSTelemetry`) inside a running
//! ETS2/ATS process. The mapping is an external, read-only contract owned
//! by the plugin: cablight opens it, copies one frame of bytes, releases
//! the view, and decodes fixed little-endian offsets out of the copy.
//!
//! Frame layout (scsTelemetryMap_s, no packing):
//!
//! ```text
//! 0     bool  sdkActive
//! 4     bool  paused
//! 64    u32   time_abs      in-game minutes since the game epoch
//! 2200  f64   coordinateX   truck world East
//! 2216  f64   coordinateZ   truck world South
//! ```
//!
//! The mapping not existing is the normal "game not running" condition and
//! decodes to `None`, never an error. A secondary simulated source
//! generates a fast-forward game clock for tuning the light curve without
//! launching the game.

use std::time::Instant;

use crate::constants::MINUTES_PER_DAY;

const SDK_ACTIVE_OFFSET: usize = 0;
const PAUSED_OFFSET: usize = 4;
const TIME_ABS_OFFSET: usize = 64;
const TRUCK_X_OFFSET: usize = 2200;
const TRUCK_Z_OFFSET: usize = 2216;

/// Bytes needed to cover the last decoded field (truck Z at 2216 + 8).
const FRAME_LEN: usize = 2224;

#[cfg(windows)]
const SHARED_MEM_NAME: &str = "Local\\SCSTelemetry";

/// One decoded read of the game state. Immutable; absence of telemetry is
/// `None`, never a snapshot with sentinel fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    /// In-game time-of-day, minutes since midnight, 0–1439.
    pub game_time: u32,
    /// True while the game simulation is paused.
    pub paused: bool,
    /// Truck world East coordinate in game units; NaN when unknown.
    pub truck_x: f64,
    /// Truck world South coordinate in game units; NaN when unknown.
    pub truck_z: f64,
}

/// Where game time comes from. A tagged alternative rather than a trait
/// object: the set of sources is closed and the engine matches on it.
pub enum TelemetrySource {
    /// Live telemetry from the scs-sdk-plugin shared memory.
    SharedMemory,
    /// Simulated fast-forward game clock, no game required.
    Simulated(SimulatedClock),
    /// Scripted frames for engine tests.
    #[cfg(any(test, feature = "testing-support"))]
    Scripted(ScriptedTelemetry),
}

impl TelemetrySource {
    /// Read the current snapshot, or `None` when the source has nothing.
    ///
    /// Each call is a fresh, independent read; no caching, no retries.
    pub fn read(&self) -> Option<TelemetrySnapshot> {
        match self {
            TelemetrySource::SharedMemory => read_shared_memory(),
            TelemetrySource::Simulated(clock) => Some(clock.snapshot()),
            #[cfg(any(test, feature = "testing-support"))]
            TelemetrySource::Scripted(script) => script.next_frame(),
        }
    }
}

/// Decode one telemetry frame out of a copied byte buffer.
///
/// Returns `None` for short frames or when the SDK-active flag is clear.
#[cfg_attr(not(windows), allow(dead_code))]
fn decode(data: &[u8]) -> Option<TelemetrySnapshot> {
    if data.len() < FRAME_LEN {
        return None;
    }
    if data[SDK_ACTIVE_OFFSET] == 0 {
        // Mapping exists but the plugin is not feeding it (menu, loading).
        return None;
    }

    let paused = data[PAUSED_OFFSET] != 0;
    let time_abs = u32::from_le_bytes(data[TIME_ABS_OFFSET..TIME_ABS_OFFSET + 4].try_into().ok()?);
    let truck_x = f64::from_le_bytes(data[TRUCK_X_OFFSET..TRUCK_X_OFFSET + 8].try_into().ok()?);
    let truck_z = f64::from_le_bytes(data[TRUCK_Z_OFFSET..TRUCK_Z_OFFSET + 8].try_into().ok()?);

    Some(TelemetrySnapshot {
        game_time: time_abs % MINUTES_PER_DAY,
        paused,
        truck_x,
        truck_z,
    })
}

#[cfg(windows)]
fn read_shared_memory() -> Option<TelemetrySnapshot> {
    match shared_memory::read_frame(SHARED_MEM_NAME, FRAME_LEN) {
        Ok(Some(frame)) => decode(&frame),
        Ok(None) => None, // mapping absent: game or plugin not running
        Err(err) => {
            log_warning!("Telemetry shared memory read error: {err}");
            None
        }
    }
}

#[cfg(not(windows))]
fn read_shared_memory() -> Option<TelemetrySnapshot> {
    // The plugin only exists on Windows; elsewhere live telemetry is
    // permanently absent (development, CI).
    None
}

#[cfg(windows)]
mod shared_memory {
    //! Read-only view of a named Windows file mapping.
    //!
    //! The handle and view are held only long enough to copy the frame out;
    //! no lock is taken beyond the mapping primitive itself.

    use anyhow::{Context, Result};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Memory::{
        FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW,
        UnmapViewOfFile,
    };
    use windows::core::PCWSTR;

    struct MappingGuard {
        handle: HANDLE,
        view: MEMORY_MAPPED_VIEW_ADDRESS,
    }

    impl Drop for MappingGuard {
        fn drop(&mut self) {
            unsafe {
                if !self.view.Value.is_null() {
                    let _ = UnmapViewOfFile(self.view);
                }
                let _ = CloseHandle(self.handle);
            }
        }
    }

    /// Copy `len` bytes out of the named mapping. `Ok(None)` means the
    /// mapping does not exist (owner process not running).
    pub(super) fn read_frame(name: &str, len: usize) -> Result<Option<Vec<u8>>> {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

        let handle = unsafe { OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR(wide.as_ptr())) };
        let handle = match handle {
            Ok(handle) => handle,
            Err(_) => return Ok(None),
        };

        let view = unsafe { MapViewOfFile(handle, FILE_MAP_READ, 0, 0, len) };
        if view.Value.is_null() {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Err(anyhow::anyhow!("MapViewOfFile failed"))
                .context("telemetry mapping exists but could not be mapped");
        }

        let guard = MappingGuard { handle, view };
        let mut frame = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(guard.view.Value as *const u8, frame.as_mut_ptr(), len);
        }
        drop(guard);

        Ok(Some(frame))
    }
}

/// Simulated game clock: advances from a start minute at a configurable
/// number of game minutes per real second.
pub struct SimulatedClock {
    start_minute: u32,
    speed: f64,
    epoch: Instant,
}

impl SimulatedClock {
    pub fn new(start_minute: u32, speed: f64) -> Self {
        Self {
            start_minute: start_minute % MINUTES_PER_DAY,
            speed,
            epoch: Instant::now(),
        }
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        let elapsed = self.epoch.elapsed().as_secs_f64();
        let minutes = self.start_minute as f64 + elapsed * self.speed;
        TelemetrySnapshot {
            game_time: (minutes as u32) % MINUTES_PER_DAY,
            paused: false,
            truck_x: f64::NAN,
            truck_z: f64::NAN,
        }
    }
}

/// Queue of pre-scripted frames, popped one per `read()`. An exhausted
/// queue reads as "telemetry absent".
#[cfg(any(test, feature = "testing-support"))]
pub struct ScriptedTelemetry {
    frames: std::sync::Mutex<std::collections::VecDeque<Option<TelemetrySnapshot>>>,
}

#[cfg(any(test, feature = "testing-support"))]
impl ScriptedTelemetry {
    pub fn new(frames: Vec<Option<TelemetrySnapshot>>) -> Self {
        Self {
            frames: std::sync::Mutex::new(frames.into()),
        }
    }

    fn next_frame(&self) -> Option<TelemetrySnapshot> {
        self.frames
            .lock()
            .map(|mut frames| frames.pop_front().flatten())
            .unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(active: bool, paused: bool, time_abs: u32, x: f64, z: f64) -> Vec<u8> {
        let mut data = vec![0u8; FRAME_LEN];
        data[SDK_ACTIVE_OFFSET] = active as u8;
        data[PAUSED_OFFSET] = paused as u8;
        data[TIME_ABS_OFFSET..TIME_ABS_OFFSET + 4].copy_from_slice(&time_abs.to_le_bytes());
        data[TRUCK_X_OFFSET..TRUCK_X_OFFSET + 8].copy_from_slice(&x.to_le_bytes());
        data[TRUCK_Z_OFFSET..TRUCK_Z_OFFSET + 8].copy_from_slice(&z.to_le_bytes());
        data
    }

    #[test]
    fn decodes_all_fields() {
        let snap = decode(&frame(true, true, 750, -31600.0, -62000.0)).unwrap();
        assert_eq!(snap.game_time, 750);
        assert!(snap.paused);
        assert_eq!(snap.truck_x, -31600.0);
        assert_eq!(snap.truck_z, -62000.0);
    }

    #[test]
    fn absolute_minutes_wrap_to_time_of_day() {
        // 3 full days plus 08:20.
        let snap = decode(&frame(true, false, 3 * 1440 + 500, 0.0, 0.0)).unwrap();
        assert_eq!(snap.game_time, 500);
    }

    #[test]
    fn inactive_sdk_reads_as_unavailable() {
        assert!(decode(&frame(false, false, 100, 0.0, 0.0)).is_none());
    }

    #[test]
    fn short_frame_reads_as_unavailable() {
        let data = frame(true, false, 100, 0.0, 0.0);
        assert!(decode(&data[..FRAME_LEN - 1]).is_none());
        assert!(decode(&[]).is_none());
    }

    #[test]
    fn simulated_clock_starts_at_start_minute() {
        let clock = SimulatedClock::new(360, 60.0);
        let snap = clock.snapshot();
        assert!(snap.game_time >= 360 && snap.game_time < 365);
        assert!(snap.truck_x.is_nan());
        assert!(snap.truck_z.is_nan());
        assert!(!snap.paused);
    }

    #[test]
    fn simulated_clock_wraps_past_midnight() {
        let clock = SimulatedClock::new(1439 + 720, 60.0);
        assert!(clock.snapshot().game_time < MINUTES_PER_DAY);
    }

    #[test]
    fn scripted_source_pops_frames_in_order() {
        let snap = TelemetrySnapshot {
            game_time: 100,
            paused: false,
            truck_x: 12.0,
            truck_z: -7.5,
        };
        let source = TelemetrySource::Scripted(ScriptedTelemetry::new(vec![Some(snap), None]));
        assert_eq!(source.read(), Some(snap));
        assert_eq!(source.read(), None);
        // Exhausted queue keeps reading as absent.
        assert_eq!(source.read(), None);
    }
}
