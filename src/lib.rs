//! # cablight library
//!
//! Internal library for the cablight binary. It exists so the sync
//! internals are testable and to keep CLI dispatch (main.rs) separate from
//! application logic.
//!
//! ## Architecture
//!
//! - **Telemetry**: `telemetry` decodes the scs-sdk-plugin shared memory
//!   (or simulates a game clock) into immutable snapshots
//! - **Curve**: `curve` turns a time-of-day into brightness and color
//!   temperature via cosine-eased waypoint interpolation
//! - **Geo**: `geo` maps truck world coordinates to a real-world UTC
//!   offset with an offline timezone lookup and a distance-keyed cache
//! - **Light client**: `ha` drives a Home Assistant light entity over its
//!   REST API, best-effort
//! - **Engine**: `sync` orchestrates the above on a poll cadence and
//!   emits status/light events to observers
//! - **Infrastructure**: `config`, `args`, `constants`, and the `logger`
//!   macros

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod config;
pub mod constants;
pub mod curve;
pub mod geo;
pub mod ha;
pub mod sync;
pub mod telemetry;

// Re-export the surface the binary and embedders use
pub use sync::{SyncEvent, SyncService, SyncStatus};
