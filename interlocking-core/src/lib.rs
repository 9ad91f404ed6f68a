//! Interlocking Core Library
//!
//! A library for simulating the relay interlocking of a railway signal box: the
//! symbolic interlocking tables are parsed into condition trees once at load time, and
//! every evaluation cycle walks those trees against the live state to decide which
//! routes are set and what each signal may show.
//!
//! # Architecture
//!
//! Load time (single-threaded, immutable afterwards):
//! - `notation` parses lock-condition cells into unresolved trees
//! - `resolver` maps the names in those trees to interlocking objects
//! - `lock_table` stores the resolved trees per object and lock kind, the lock levers of
//!   direction routes and each route's final approach track circuit
//! - `aspect::graph` precomputes the signals up to N ahead of each signal
//!
//! Run time:
//! - `relay` runs the lever, route and signal-control stages over every route
//! - `aspect::propagator` derives signal aspects from relay and track state
//! - `interlocking` owns the live state and serializes cycles with client mutations
//!
//! The library does NOT:
//! - Read the master data from a database
//! - Schedule cycles or talk to clients
//! - Model route-lock release or train movement (route and track locking are inputs)
//! - Run central traffic control (the CHR and CTC relays are inputs)
//!
//! All of that is in the application layer (interlocking-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use interlocking_core::{EngineConfig, Interlocking, LeverPosition, PlantData};
//!
//! // Load master data
//! let json = std::fs::read_to_string("plant.json").unwrap();
//! let data: PlantData = serde_json::from_str(&json).unwrap();
//!
//! // Build the engine
//! let config = EngineConfig::new().with_max_signal_depth(4);
//! let interlocking = Interlocking::from_data(&data, config, chrono::Utc::now()).unwrap();
//!
//! // Throw a lever, press the destination button and run a cycle
//! interlocking.set_lever(1, LeverPosition::Right).unwrap();
//! interlocking.set_button("TH71_AP", true).unwrap();
//! let report = interlocking.run_cycle().unwrap();
//!
//! for change in &report.changes {
//!     println!("route {} {} -> {}", change.route, change.relay, change.raised);
//! }
//!
//! for (signal, aspect) in interlocking.all_aspects().unwrap() {
//!     println!("{}: {}", signal, aspect);
//! }
//! ```

// Public modules
pub mod aspect;
pub mod condition;
pub mod config;
pub mod interlocking;
pub mod lock_table;
pub mod notation;
pub mod plant;
pub mod relay;
pub mod resolver;
pub mod state;
pub mod types;

// Re-export main types for convenience
pub use aspect::{AspectPropagator, NextSignal, NextSignalGraph, SignalDefinition, SignalNetwork, SignalType};
pub use condition::{ConditionNode, ObjectCondition};
pub use config::EngineConfig;
pub use interlocking::Interlocking;
pub use lock_table::{DirectionLeverLocks, DirectionRouteLocks, LockLever, LockTable, LockTableRow};
pub use notation::{NotationError, NotationParser, ParsedCell};
pub use plant::{PlantAdjacency, PlantData, PlantDatabase, PlantStats, RouteDefinition, ThrowOutControl, ThrowOutKind};
pub use relay::{RelayChange, RelayEvaluator, RelayKind, SweepReport};
pub use resolver::{ObjectResolver, ResolveError};
pub use state::{InterlockingState, RouteState, SwitchingMachineState, TrackCircuitState};
pub use types::{
    Aspect, Direction, InterlockingError, InterlockingObject, LeverPosition, LockColumn, LockContext, LockKind,
    ObjectId, ObjectKind, Result, Side, Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty plant loads and sweeps without changes
        let interlocking = Interlocking::from_data(&PlantData::default(), EngineConfig::new(), chrono::Utc::now()).unwrap();
        assert_eq!(interlocking.plant_stats().num_objects, 0);
        assert!(interlocking.run_cycle().unwrap().is_quiescent());
    }
}
