//! Interlocking engine
//!
//! This module provides the stateful entry point of the library. An `Interlocking` owns
//! the immutable load-time products (object database, lock table, signal network) and the
//! live state behind a read/write lock: evaluation cycles and client mutations take the
//! write lock, aspect queries and snapshots the read lock, so a cycle never interleaves
//! with a lever throw or a button press.

use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::aspect::{AspectPropagator, SignalNetwork};
use crate::config::EngineConfig;
use crate::lock_table::LockTable;
use crate::plant::{PlantData, PlantDatabase, PlantStats};
use crate::relay::{RelayEvaluator, SweepReport};
use crate::state::{InterlockingState, SwitchingMachineState};
use crate::types::{
    Aspect, Direction, InterlockingError, LeverPosition, ObjectId, ObjectKind, Result, Side, Timestamp,
};

/// The main engine struct - entry point for evaluation cycles and aspect queries
pub struct Interlocking {
    config: EngineConfig,
    plant: PlantDatabase,
    locks: LockTable,
    signals: SignalNetwork,
    state: RwLock<InterlockingState>,
}

impl Interlocking {
    /// Build an engine from master data
    ///
    /// Parses and resolves the whole lock table and precomputes the next-signal graph.
    /// The live state starts in the initial position at `now`.
    ///
    /// # Arguments
    /// * `data` - Objects, routes, throw-out controls, lock table and signal network
    /// * `config` - Engine configuration
    /// * `now` - Clock of the initial state
    ///
    /// # Returns
    /// * `Result<Interlocking>` - The engine, or the first master-data, parse or
    ///   resolution error
    ///
    /// # Example
    /// ```no_run
    /// use interlocking_core::{EngineConfig, Interlocking, PlantData};
    ///
    /// let data: PlantData = serde_json::from_str(&std::fs::read_to_string("plant.json").unwrap()).unwrap();
    /// let interlocking = Interlocking::from_data(&data, EngineConfig::new(), chrono::Utc::now()).unwrap();
    /// let report = interlocking.run_cycle().unwrap();
    /// println!("{} relays changed", report.changes.len());
    /// ```
    pub fn from_data(data: &PlantData, config: EngineConfig, now: Timestamp) -> Result<Self> {
        log::info!("Loading interlocking ({} lock-table rows)", data.lock_table.len());

        let plant = data.build_database()?;
        let locks = LockTable::build(&data.lock_table, &plant, &config)?;
        let signals = SignalNetwork::new(data.signals.clone(), data.signal_types.clone(), config.max_signal_depth)?;
        signals.validate_objects(&plant)?;
        let state = InterlockingState::initial(&plant, now);

        log::info!("Interlocking loaded successfully");
        Ok(Self {
            config,
            plant,
            locks,
            signals,
            state: RwLock::new(state),
        })
    }

    /// Run one evaluation cycle (lever, route and signal-control stages)
    ///
    /// # Returns
    /// * `Result<SweepReport>` - Every relay that changed, in write order. On error the
    ///   stages completed before the failing one stay committed.
    pub fn run_cycle(&self) -> Result<SweepReport> {
        let mut state = self.write()?;
        RelayEvaluator::new(&self.plant, &self.locks).sweep(&mut state)
    }

    /// Aspects of the named signals; unknown names are R
    ///
    /// # Example
    /// ```no_run
    /// # use interlocking_core::{EngineConfig, Interlocking, PlantData};
    /// # let interlocking = Interlocking::from_data(&PlantData::default(), EngineConfig::new(), chrono::Utc::now()).unwrap();
    /// let aspects = interlocking.aspects(&["TH71_1R", "TH71_2R"]).unwrap();
    /// for (signal, aspect) in &aspects {
    ///     println!("{}: {}", signal, aspect);
    /// }
    /// ```
    pub fn aspects<S: AsRef<str>>(&self, names: &[S]) -> Result<BTreeMap<String, Aspect>> {
        let state = self.read()?;
        AspectPropagator::new(&self.signals, &state).aspects(names)
    }

    /// Aspects of the named signals and of the signals directly ahead of them
    pub fn aspects_with_next<S: AsRef<str>>(&self, names: &[S]) -> Result<BTreeMap<String, Aspect>> {
        let state = self.read()?;
        AspectPropagator::new(&self.signals, &state).aspects_with_next(names)
    }

    /// Aspects of every signal in the network
    pub fn all_aspects(&self) -> Result<BTreeMap<String, Aspect>> {
        self.aspects(self.signals.names().as_slice())
    }

    /// Whether a switching machine is held by an occupied track circuit of its detector section
    pub fn is_detector_locked(&self, machine: ObjectId) -> Result<bool> {
        let state = self.read()?;
        RelayEvaluator::new(&self.plant, &self.locks).is_detector_locked(machine, &state)
    }

    pub fn set_lever(&self, lever: ObjectId, position: LeverPosition) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .levers
            .get_mut(&lever)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::Lever, lever))?;
        *slot = position;
        log::debug!("Lever {} -> {:?}", lever, position);
        Ok(())
    }

    pub fn set_button(&self, button: &str, pressed: bool) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .buttons
            .get_mut(button)
            .ok_or_else(|| InterlockingError::Evaluation(format!("button {}", button)))?;
        *slot = pressed;
        log::debug!("Button {} -> {}", button, if pressed { "pressed" } else { "released" });
        Ok(())
    }

    /// Direction self-control or route central-control lever
    pub fn set_key_lever(&self, lever: ObjectId, direction: Direction) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .key_levers
            .get_mut(&lever)
            .ok_or_else(|| InterlockingError::Evaluation(format!("key lever {}", lever)))?;
        *slot = direction;
        Ok(())
    }

    /// Set occupancy; a change restarts the occupancy timer at the state clock
    pub fn set_track_circuit(&self, track: ObjectId, occupied: bool) -> Result<()> {
        let mut state = self.write()?;
        let now = state.now;
        let slot = state
            .track_circuits
            .get_mut(&track)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::TrackCircuit, track))?;
        if slot.occupied != occupied {
            slot.occupied = occupied;
            slot.changed_at = Some(now);
            log::debug!("Track circuit {} -> {}", track, if occupied { "occupied" } else { "clear" });
        }
        Ok(())
    }

    pub fn set_switching_machine(&self, machine: ObjectId, direction: Direction, switching: bool) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .switching_machines
            .get_mut(&machine)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::SwitchingMachine, machine))?;
        *slot = SwitchingMachineState { switching, direction };
        Ok(())
    }

    pub fn set_direction_route(&self, route: ObjectId, side: Side) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .direction_routes
            .get_mut(&route)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::DirectionRoute, route))?;
        *slot = side;
        Ok(())
    }

    /// `raised` means the route is released
    pub fn set_route_lock_relay(&self, route: ObjectId, raised: bool) -> Result<()> {
        let mut state = self.write()?;
        state.route_mut(route)?.route_lock_relay = raised;
        Ok(())
    }

    /// Held by route locking; drives the lever-less throw-out relay
    pub fn set_track_circuit_lock(&self, track: ObjectId, locked: bool) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .track_circuits
            .get_mut(&track)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::TrackCircuit, track))?;
        slot.locked = locked;
        Ok(())
    }

    /// CHR relay of a route central-control lever; raised hands its routes to central control
    pub fn set_central_control(&self, lever: ObjectId, raised: bool) -> Result<()> {
        let mut state = self.write()?;
        let slot = state
            .chr_relays
            .get_mut(&lever)
            .ok_or_else(|| InterlockingError::missing_state(ObjectKind::RouteCentralControlLever, lever))?;
        *slot = raised;
        log::debug!("Central control {} -> {}", lever, if raised { "CTC" } else { "station" });
        Ok(())
    }

    /// Route request from central control, read while the route is under central control
    pub fn set_ctc_relay(&self, route: ObjectId, raised: bool) -> Result<()> {
        let mut state = self.write()?;
        state.route_mut(route)?.ctc_relay = raised;
        Ok(())
    }

    /// Move the state clock forward
    pub fn advance_clock(&self, by: Duration) -> Result<Timestamp> {
        let mut state = self.write()?;
        state.now = state.now + by;
        Ok(state.now)
    }

    /// Swap in a complete state, e.g. one loaded from storage
    pub fn replace_state(&self, new_state: InterlockingState) -> Result<()> {
        let mut state = self.write()?;
        *state = new_state;
        Ok(())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<InterlockingState> {
        Ok(self.read()?.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plant(&self) -> &PlantDatabase {
        &self.plant
    }

    pub fn plant_stats(&self) -> PlantStats {
        self.plant.stats()
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }

    pub fn signals(&self) -> &SignalNetwork {
        &self.signals
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, InterlockingState>> {
        self.state.read().map_err(|_| InterlockingError::StatePoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, InterlockingState>> {
        self.state.write().map_err(|_| InterlockingError::StatePoisoned)
    }
}
