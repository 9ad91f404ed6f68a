//! Live interlocking state
//!
//! The mutable half of the engine: relay bits of every route and the physical state of
//! levers, buttons, track circuits, switching machines and direction routes, as seen at
//! `now`. Evaluators read it through the accessors below, which turn a missing entry
//! into an evaluation error instead of a silent default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::plant::PlantDatabase;
use crate::types::{Direction, InterlockingError, LeverPosition, ObjectId, ObjectKind, Result, Side, Timestamp};

/// Relay bits of one route (`true` = raised)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteState {
    pub lever_relay: bool,
    pub route_relay: bool,
    pub signal_control_relay: bool,
    pub throw_out_xr: bool,
    pub throw_out_ys: bool,
    /// Lever-less throw-out relay; stands in for the lever of a route without one
    #[serde(default)]
    pub throw_out_x: bool,
    /// Set by the central traffic controller; drives the lever relay under central control
    #[serde(default)]
    pub ctc_relay: bool,
    /// Maintained by the route-lock logic; raised while the route is released
    #[serde(default = "released")]
    pub route_lock_relay: bool,
}

fn released() -> bool {
    true
}

impl Default for RouteState {
    fn default() -> Self {
        Self {
            lever_relay: false,
            route_relay: false,
            signal_control_relay: false,
            throw_out_xr: false,
            throw_out_ys: false,
            throw_out_x: false,
            ctc_relay: false,
            route_lock_relay: released(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCircuitState {
    pub occupied: bool,
    /// When `occupied` last changed, if known
    #[serde(default)]
    pub changed_at: Option<Timestamp>,
    /// Held by route locking; maintained by the route-lock logic
    #[serde(default)]
    pub locked: bool,
}

impl TrackCircuitState {
    /// Occupied, and for at least `seconds` when a timer is given
    pub fn is_occupied_for(&self, now: Timestamp, seconds: Option<u32>) -> bool {
        if !self.occupied {
            return false;
        }
        match (seconds, self.changed_at) {
            (Some(seconds), Some(changed_at)) => (now - changed_at).num_seconds() >= i64::from(seconds),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchingMachineState {
    /// Points are moving
    pub switching: bool,
    pub direction: Direction,
}

impl SwitchingMachineState {
    /// Stationary in the given direction
    pub fn is_settled_at(&self, direction: Direction) -> bool {
        !self.switching && self.direction == direction
    }
}

/// Snapshot of everything the evaluators read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterlockingState {
    pub now: Timestamp,
    #[serde(default)]
    pub routes: HashMap<ObjectId, RouteState>,
    #[serde(default)]
    pub levers: HashMap<ObjectId, LeverPosition>,
    /// Destination buttons by name (`true` = pressed)
    #[serde(default)]
    pub buttons: HashMap<String, bool>,
    #[serde(default)]
    pub track_circuits: HashMap<ObjectId, TrackCircuitState>,
    #[serde(default)]
    pub switching_machines: HashMap<ObjectId, SwitchingMachineState>,
    #[serde(default)]
    pub direction_routes: HashMap<ObjectId, Side>,
    /// Direction self-control and route central-control levers
    #[serde(default)]
    pub key_levers: HashMap<ObjectId, Direction>,
    /// CHR relay of each route central-control lever (raised = central control)
    #[serde(default)]
    pub chr_relays: HashMap<ObjectId, bool>,
}

impl InterlockingState {
    /// Empty state at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            routes: HashMap::new(),
            levers: HashMap::new(),
            buttons: HashMap::new(),
            track_circuits: HashMap::new(),
            switching_machines: HashMap::new(),
            direction_routes: HashMap::new(),
            key_levers: HashMap::new(),
            chr_relays: HashMap::new(),
        }
    }

    /// Relays dropped with routes released, levers centered, tracks clear, machines normal
    pub fn initial(plant: &PlantDatabase, now: Timestamp) -> Self {
        let mut state = Self::new(now);

        for id in plant.route_ids() {
            state.routes.insert(id, RouteState::default());
            if let Some(button) = plant.route(id).and_then(|r| r.destination_button.clone()) {
                state.buttons.insert(button, false);
            }
        }
        for object in plant.objects_of_kind(ObjectKind::Lever) {
            state.levers.insert(object.id, LeverPosition::Center);
        }
        for object in plant.objects_of_kind(ObjectKind::TrackCircuit) {
            state.track_circuits.insert(object.id, TrackCircuitState::default());
        }
        for object in plant.objects_of_kind(ObjectKind::SwitchingMachine) {
            state.switching_machines.insert(object.id, SwitchingMachineState::default());
        }
        for object in plant.objects_of_kind(ObjectKind::DirectionRoute) {
            state.direction_routes.insert(object.id, Side::Left);
        }
        for kind in [ObjectKind::DirectionSelfControlLever, ObjectKind::RouteCentralControlLever] {
            for object in plant.objects_of_kind(kind) {
                state.key_levers.insert(object.id, Direction::Normal);
            }
        }
        for object in plant.objects_of_kind(ObjectKind::RouteCentralControlLever) {
            state.chr_relays.insert(object.id, false);
        }

        state
    }

    pub fn route(&self, id: ObjectId) -> Result<&RouteState> {
        self.routes
            .get(&id)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::Route, id))
    }

    pub fn route_mut(&mut self, id: ObjectId) -> Result<&mut RouteState> {
        self.routes
            .get_mut(&id)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::Route, id))
    }

    pub fn lever(&self, id: ObjectId) -> Result<LeverPosition> {
        self.levers
            .get(&id)
            .copied()
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::Lever, id))
    }

    pub fn button(&self, name: &str) -> Result<bool> {
        self.buttons
            .get(name)
            .copied()
            .ok_or_else(|| InterlockingError::Evaluation(format!("button {}", name)))
    }

    pub fn track_circuit(&self, id: ObjectId) -> Result<&TrackCircuitState> {
        self.track_circuits
            .get(&id)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::TrackCircuit, id))
    }

    pub fn switching_machine(&self, id: ObjectId) -> Result<&SwitchingMachineState> {
        self.switching_machines
            .get(&id)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::SwitchingMachine, id))
    }

    pub fn direction_route(&self, id: ObjectId) -> Result<Side> {
        self.direction_routes
            .get(&id)
            .copied()
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::DirectionRoute, id))
    }

    pub fn key_lever(&self, id: ObjectId) -> Result<Direction> {
        self.key_levers
            .get(&id)
            .copied()
            .ok_or_else(|| InterlockingError::Evaluation(format!("key lever {}", id)))
    }

    pub fn chr_relay(&self, id: ObjectId) -> Result<bool> {
        self.chr_relays
            .get(&id)
            .copied()
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::RouteCentralControlLever, id))
    }
}
