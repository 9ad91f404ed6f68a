//! Signal aspects
//!
//! `graph` precomputes which signals lie up to N ahead of each signal; `propagator`
//! turns live relay and track state into the aspect each signal displays.

pub mod graph;
pub mod propagator;

pub use graph::{NextSignal, NextSignalGraph};
pub use propagator::{AspectPropagator, SignalDefinition, SignalNetwork, SignalType};
