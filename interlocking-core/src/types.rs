//! Core types for the interlocking engine
//!
//! This module defines the identifiers, kind tags and small value enums shared by the
//! load-time pipeline (parser, resolver, lock table) and the run-time evaluators
//! (relay sweep, signal aspects).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::notation::NotationError;

/// Timestamp type used throughout the engine
pub type Timestamp = DateTime<Utc>;

/// Numeric identity of every interlocking object
pub type ObjectId = u64;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, InterlockingError>;

/// The kind tag carried by every interlocking object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Route,
    Lever,
    SwitchingMachine,
    TrackCircuit,
    DirectionRoute,
    DirectionSelfControlLever,
    RouteCentralControlLever,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Route => "route",
            ObjectKind::Lever => "lever",
            ObjectKind::SwitchingMachine => "switching machine",
            ObjectKind::TrackCircuit => "track circuit",
            ObjectKind::DirectionRoute => "direction route",
            ObjectKind::DirectionSelfControlLever => "direction self-control lever",
            ObjectKind::RouteCentralControlLever => "route central-control lever",
        };
        write!(f, "{}", name)
    }
}

/// A named object of a plant (route, lever, switching machine, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockingObject {
    pub id: ObjectId,
    /// Globally unique, plant-prefixed name (e.g. `TH71_1RA`)
    pub name: String,
    pub kind: ObjectKind,
    /// Owning plant (station) identifier
    pub plant: String,
}

impl InterlockingObject {
    pub fn new(id: ObjectId, name: impl Into<String>, kind: ObjectKind, plant: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            plant: plant.into(),
        }
    }
}

/// Normal / reversed position of a switching machine or key lever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Normal,
    Reversed,
}

/// Left / right setting of a direction route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    /// Side named by the trailing `L`/`R` of a table token
    pub fn from_suffix(token: &str) -> Option<Self> {
        match token.chars().last() {
            Some('L') => Some(Side::Left),
            Some('R') => Some(Side::Right),
            _ => None,
        }
    }
}

/// Physical position of a route lever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeverPosition {
    Left,
    #[default]
    Center,
    Right,
}

impl LeverPosition {
    pub fn is_centered(&self) -> bool {
        matches!(self, LeverPosition::Center)
    }

    /// Whether the lever stands where a leaf with `direction` requires it
    pub fn satisfies(&self, direction: Direction) -> bool {
        match direction {
            Direction::Normal => self.is_centered(),
            Direction::Reversed => !self.is_centered(),
        }
    }
}

/// Signal aspect, ordered from most to least restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Aspect {
    /// Stop
    #[default]
    R,
    /// Restricted speed
    YY,
    /// Caution
    Y,
    /// Reduced speed
    YG,
    /// Proceed
    G,
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aspect::R => "R",
            Aspect::YY => "YY",
            Aspect::Y => "Y",
            Aspect::YG => "YG",
            Aspect::G => "G",
        };
        write!(f, "{}", name)
    }
}

/// The kind of lock relationship a resolved tree expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockKind {
    DirectLock,
    RouteLock,
    SignalControl,
    ApproachLock,
    Detector,
    /// Lock levers of the neighbouring plant registered on a direction route
    DirectionLock,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockKind::DirectLock => "direct lock",
            LockKind::RouteLock => "route lock",
            LockKind::SignalControl => "signal control",
            LockKind::ApproachLock => "approach lock",
            LockKind::Detector => "detector",
            LockKind::DirectionLock => "direction lock",
        };
        write!(f, "{}", name)
    }
}

/// Column of the interlocking table a condition string was taken from
///
/// Columns decide how the notation is parsed (route-lock columns yield alternatives)
/// and which resolution strategies apply. Several columns may feed the same [`LockKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockColumn {
    /// Switching machines locked by a route (bare machine numbers)
    SwitchingMachine,
    /// Conflicting routes and other objects locked by a route
    DirectLock,
    SignalControl,
    RouteLock,
    ApproachLock,
    /// Track circuits guarding a switching machine
    Detector,
    /// Lock lever of a direction route's `L` lever (`｢｣` marks the single-locked lever)
    DirectionLockLeft,
    /// Lock lever of a direction route's `R` lever
    DirectionLockRight,
}

impl LockColumn {
    pub fn lock_kind(&self) -> LockKind {
        match self {
            LockColumn::SwitchingMachine | LockColumn::DirectLock => LockKind::DirectLock,
            LockColumn::SignalControl => LockKind::SignalControl,
            LockColumn::RouteLock => LockKind::RouteLock,
            LockColumn::ApproachLock => LockKind::ApproachLock,
            LockColumn::Detector => LockKind::Detector,
            LockColumn::DirectionLockLeft | LockColumn::DirectionLockRight => LockKind::DirectionLock,
        }
    }

    /// Which lever of a direction route the column registers locks for
    pub fn direction_lock_side(&self) -> Option<Side> {
        match self {
            LockColumn::DirectionLockLeft => Some(Side::Left),
            LockColumn::DirectionLockRight => Some(Side::Right),
            _ => None,
        }
    }

    pub fn is_route_lock(&self) -> bool {
        matches!(self, LockColumn::RouteLock)
    }
}

/// Where a lock-table string came from, attached to every load-time error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockContext {
    pub plant: String,
    pub object: String,
    pub kind: LockKind,
    pub raw: String,
}

impl fmt::Display for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}] \"{}\"", self.plant, self.object, self.kind, self.raw)
    }
}

/// Errors that can occur while loading or evaluating the interlocking
#[derive(Debug, thiserror::Error)]
pub enum InterlockingError {
    #[error("Failed to parse lock condition {context}: {source}")]
    Parse {
        context: LockContext,
        #[source]
        source: NotationError,
    },

    #[error("Failed to resolve '{token}' at {plant} in {context}")]
    Resolution {
        context: LockContext,
        token: String,
        plant: String,
    },

    #[error("'{token}' at {plant} matches {candidates} throw-out controls in {context}")]
    AmbiguousResolution {
        context: LockContext,
        token: String,
        plant: String,
        candidates: usize,
    },

    #[error("Evaluation failed: no live state for {0}")]
    Evaluation(String),

    #[error("Invalid plant data: {0}")]
    InvalidPlantData(String),

    #[error("Interlocking state lock poisoned")]
    StatePoisoned,
}

impl InterlockingError {
    pub(crate) fn missing_state(kind: ObjectKind, id: ObjectId) -> Self {
        InterlockingError::Evaluation(format!("{} {}", kind, id))
    }
}
