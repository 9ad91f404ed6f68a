//! Relay evaluator
//!
//! One evaluation cycle is three whole-table sweeps over every route:
//!
//! 1. lever stage: ThrowOutX, ThrowOutXR, ThrowOutYS and the LeverRelay
//! 2. route stage: the RouteRelay
//! 3. signal-control stage: the SignalControlRelay
//!
//! Each stage computes all of its results against the state committed by the stages
//! before it and then writes back only the relays whose value changed. A stage that
//! fails leaves its own results unwritten; earlier stages stay committed.
//!
//! All three stages walk the same resolved trees. What a leaf means is decided by the
//! predicate handed to [`ConditionNode::try_evaluate`]:
//!
//! | Predicate | Route | Track circuit | Switching machine | Direction route | Lever / key lever |
//! |---|---|---|---|---|---|
//! | locking | LeverRelay raised | occupied (timer) | - | - | - |
//! | unlocked | RouteRelay dropped | clear | settled in direction | on side | in position |
//! | route-ready | true | clear | settled in direction | on side | true |
//! | signal-clear | LeverRelay dropped | clear | true | on side | true |
//! | track-clear | true | clear | true | true | true |
//!
//! A route under central control (its central-control lever's CHR relay raised) takes its
//! LeverRelay from the CTC relay alone, with the throw-out relays dropped. A route without
//! a lever of its own is requested by its ThrowOutX relay instead.

use serde::Serialize;
use std::fmt;

use crate::condition::{ConditionNode, ObjectCondition};
use crate::lock_table::LockTable;
use crate::plant::{PlantDatabase, RouteDefinition, ThrowOutControl, ThrowOutKind};
use crate::state::{InterlockingState, RouteState};
use crate::types::{Direction, InterlockingError, LockKind, ObjectId, ObjectKind, Result};

/// The relays written by a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelayKind {
    Lever,
    Route,
    SignalControl,
    ThrowOutX,
    ThrowOutXr,
    ThrowOutYs,
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayKind::Lever => "LR",
            RelayKind::Route => "RR",
            RelayKind::SignalControl => "SC",
            RelayKind::ThrowOutX => "X",
            RelayKind::ThrowOutXr => "XR",
            RelayKind::ThrowOutYs => "YS",
        };
        write!(f, "{}", name)
    }
}

/// A relay whose value changed during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayChange {
    pub route: ObjectId,
    pub relay: RelayKind,
    pub raised: bool,
}

/// Everything a sweep wrote, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub changes: Vec<RelayChange>,
}

impl SweepReport {
    /// No relay changed
    pub fn is_quiescent(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, relay: RelayKind) -> usize {
        self.changes.iter().filter(|c| c.relay == relay).count()
    }
}

/// Freshly computed stage-1 relays of one route
struct LeverRelays {
    x: bool,
    xr: bool,
    ys: bool,
    lever: bool,
}

/// Evaluates the relay logic of all routes against a live state
pub struct RelayEvaluator<'a> {
    plant: &'a PlantDatabase,
    locks: &'a LockTable,
}

impl<'a> RelayEvaluator<'a> {
    pub fn new(plant: &'a PlantDatabase, locks: &'a LockTable) -> Self {
        Self { plant, locks }
    }

    /// Run the three stages and commit their results
    pub fn sweep(&self, state: &mut InterlockingState) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let lever = self.lever_stage(state)?;
        apply(state, &lever)?;
        let route = self.route_stage(state)?;
        apply(state, &route)?;
        let signal = self.signal_control_stage(state)?;
        apply(state, &signal)?;

        log::debug!(
            "Sweep at {}: {} lever-stage, {} route-stage, {} signal-control-stage changes",
            state.now,
            lever.len(),
            route.len(),
            signal.len()
        );
        report.changes.extend(lever);
        report.changes.extend(route);
        report.changes.extend(signal);
        Ok(report)
    }

    /// Stage 1: ThrowOutX, ThrowOutXR, ThrowOutYS, LeverRelay
    pub fn lever_stage(&self, state: &InterlockingState) -> Result<Vec<RelayChange>> {
        let mut changes = Vec::new();
        for route in self.plant.route_ids() {
            let current = *state.route(route)?;
            let next = self.lever_relays(route, &current, state)?;
            push_change(&mut changes, route, RelayKind::ThrowOutX, current.throw_out_x, next.x);
            push_change(&mut changes, route, RelayKind::ThrowOutXr, current.throw_out_xr, next.xr);
            push_change(&mut changes, route, RelayKind::ThrowOutYs, current.throw_out_ys, next.ys);
            push_change(&mut changes, route, RelayKind::Lever, current.lever_relay, next.lever);
        }
        Ok(changes)
    }

    /// Stage 2: RouteRelay
    pub fn route_stage(&self, state: &InterlockingState) -> Result<Vec<RelayChange>> {
        let mut changes = Vec::new();
        for route in self.plant.route_ids() {
            let current = *state.route(route)?;
            let direct = self.locks.clause(route, LockKind::DirectLock);
            let signal = self.locks.clause(route, LockKind::SignalControl);

            let unlocked = check(direct, |leaf| self.is_unlocked(leaf, state))?;
            let ready = check(signal, |leaf| self.is_route_ready(leaf, state))?;
            let locked = self.is_locked_opt(direct, state)?;

            let raised = current.lever_relay && unlocked && ready && !locked;
            push_change(&mut changes, route, RelayKind::Route, current.route_relay, raised);
        }
        Ok(changes)
    }

    /// Stage 3: SignalControlRelay
    pub fn signal_control_stage(&self, state: &InterlockingState) -> Result<Vec<RelayChange>> {
        let mut changes = Vec::new();
        for route in self.plant.route_ids() {
            let current = *state.route(route)?;
            let direct = self.locks.clause(route, LockKind::DirectLock);
            let signal = self.locks.clause(route, LockKind::SignalControl);

            let clear = check(signal, |leaf| self.is_signal_clear(leaf, state))?;
            let locked = self.is_locked_opt(direct, state)?;

            let raised = current.route_relay && clear && !locked;
            push_change(&mut changes, route, RelayKind::SignalControl, current.signal_control_relay, raised);
        }
        Ok(changes)
    }

    /// A switching machine may not move while a track circuit of its detector section is occupied
    pub fn is_detector_locked(&self, machine: ObjectId, state: &InterlockingState) -> Result<bool> {
        self.is_locked_opt(self.locks.clause(machine, LockKind::Detector), state)
    }

    /// A tree is locked unless it holds with every leaf read as "not locking"
    pub fn is_locked(&self, tree: &ConditionNode, state: &InterlockingState) -> Result<bool> {
        let free = tree.try_evaluate(&mut |leaf: &ObjectCondition| Ok(!self.is_locking(leaf, state)?))?;
        Ok(!free)
    }

    fn is_locked_opt(&self, tree: Option<&ConditionNode>, state: &InterlockingState) -> Result<bool> {
        match tree {
            Some(tree) => self.is_locked(tree, state),
            None => Ok(false),
        }
    }

    fn lever_relays(&self, route: ObjectId, current: &RouteState, state: &InterlockingState) -> Result<LeverRelays> {
        let definition = self.route_definition(route)?;
        let direct = self.locks.clause(route, LockKind::DirectLock);
        let unlocked = !self.is_locked_opt(direct, state)?;

        if let Some(central_control) = definition.central_control_lever {
            if state.chr_relay(central_control)? {
                return Ok(LeverRelays {
                    x: false,
                    xr: false,
                    ys: false,
                    lever: unlocked && current.ctc_relay,
                });
            }
        }

        let (x, lever_reversed) = match definition.lever {
            Some(lever) => (false, !state.lever(lever)?.is_centered()),
            None => {
                let x = self.throw_out_x(route, current, unlocked, state)?;
                (x, x)
            }
        };

        let controllers =
            self.active_routes(self.plant.throw_outs_into(route), ThrowOutKind::WithLever, |c| c.source, state)?;
        let downstream =
            self.active_routes(self.plant.throw_outs_from(route), ThrowOutKind::WithLever, |c| c.target, state)?;

        let (xr, ys) = if controllers.is_empty() {
            (false, false)
        } else {
            let xr = self.throw_out_xr(current, &controllers, unlocked, lever_reversed, state)?;
            let ys = self.throw_out_ys(route, current, &controllers, xr, direct, state)?;
            (xr, ys)
        };

        let button = match &definition.destination_button {
            Some(name) => state.button(name)?,
            None => true,
        };
        let mut downstream_xr = false;
        let mut downstream_held = false;
        for target in &downstream {
            let target_state = state.route(*target)?;
            downstream_xr |= target_state.throw_out_xr;
            downstream_held |= target_state.lever_relay && target_state.throw_out_xr;
        }

        let requested = (!xr && !ys && lever_reversed) || ys;
        let held = button || (current.lever_relay && !downstream_xr) || downstream_held;

        Ok(LeverRelays {
            x,
            xr,
            ys,
            lever: unlocked && requested && held,
        })
    }

    /// ThrowOutX of a route without a lever
    ///
    /// Raised by the LeverRelay of a lever-less throw-out source, but only while the final
    /// track circuit of the approach lock is not held; once raised it stays up with the source.
    fn throw_out_x(
        &self,
        route: ObjectId,
        current: &RouteState,
        unlocked: bool,
        state: &InterlockingState,
    ) -> Result<bool> {
        let sources =
            self.active_routes(self.plant.throw_outs_into(route), ThrowOutKind::WithoutLever, |c| c.source, state)?;
        let mut source_raised = false;
        for source in &sources {
            source_raised |= state.route(*source)?.lever_relay;
        }

        let final_track_free = match self.locks.approach_final_track(route) {
            Some(track) => !state.track_circuit(track)?.locked,
            None => true,
        };

        Ok(unlocked && source_raised && (final_track_free || current.throw_out_x))
    }

    /// ThrowOutXR of a route that receives throw-out control from `controllers`
    fn throw_out_xr(
        &self,
        current: &RouteState,
        controllers: &[ObjectId],
        unlocked: bool,
        lever_reversed: bool,
        state: &InterlockingState,
    ) -> Result<bool> {
        let mut any_controller_reversed = false;
        let mut all_controllers_dropped = true;
        for controller in controllers {
            any_controller_reversed |= self.is_lever_reversed(*controller, state)?;
            all_controllers_dropped &= !state.route(*controller)?.lever_relay;
        }

        Ok(unlocked
            && any_controller_reversed
            && ((all_controllers_dropped && !lever_reversed) || current.lever_relay)
            && (!current.lever_relay || current.throw_out_xr))
    }

    fn throw_out_ys(
        &self,
        route: ObjectId,
        current: &RouteState,
        controllers: &[ObjectId],
        xr: bool,
        direct: Option<&ConditionNode>,
        state: &InterlockingState,
    ) -> Result<bool> {
        let mut locked_routes_released = true;
        if let Some(tree) = direct {
            for leaf in tree.objects() {
                if self.kind(leaf.target)? == ObjectKind::Route {
                    locked_routes_released &= state.route(leaf.target)?.route_lock_relay;
                }
            }
        }

        let mut controllers_idle = true;
        for controller in controllers {
            let controller_state = state.route(*controller)?;
            controllers_idle &= !controller_state.route_lock_relay && !controller_state.signal_control_relay;
        }

        let approach = check(self.locks.clause(route, LockKind::ApproachLock), |leaf| {
            self.is_track_clear(leaf, state)
        })?;
        let held = current.throw_out_ys
            && check(self.locks.clause(route, LockKind::SignalControl), |leaf| {
                self.is_track_clear(leaf, state)
            })?;

        Ok(locked_routes_released && (controllers_idle || xr) && (approach || held))
    }

    /// A route's lever is reversed, or for a lever-less route its ThrowOutX is raised
    fn is_lever_reversed(&self, route: ObjectId, state: &InterlockingState) -> Result<bool> {
        match self.route_definition(route)?.lever {
            Some(lever) => Ok(!state.lever(lever)?.is_centered()),
            None => Ok(state.route(route)?.throw_out_x),
        }
    }

    /// Routes at the other end of the active controls of one kind (deduplicated, in edge order)
    fn active_routes<'c, I, F>(
        &self,
        controls: I,
        kind: ThrowOutKind,
        other_end: F,
        state: &InterlockingState,
    ) -> Result<Vec<ObjectId>>
    where
        I: Iterator<Item = &'c ThrowOutControl>,
        F: Fn(&ThrowOutControl) -> ObjectId,
    {
        let mut routes = Vec::new();
        for control in controls.filter(|control| control.kind == kind) {
            let id = other_end(control);
            if self.kind(id)? != ObjectKind::Route || !self.is_control_active(control, state)? {
                continue;
            }
            if !routes.contains(&id) {
                routes.push(id);
            }
        }
        Ok(routes)
    }

    /// A guarded control only acts while its key lever is in the required direction
    fn is_control_active(&self, control: &ThrowOutControl, state: &InterlockingState) -> Result<bool> {
        match control.condition_lever {
            Some(lever) => {
                let required = control.condition_direction.unwrap_or(Direction::Reversed);
                Ok(state.key_lever(lever)? == required)
            }
            None => Ok(true),
        }
    }

    fn is_locking(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        if leaf.subject_to_unlock {
            return Ok(false);
        }
        match self.kind(leaf.target)? {
            ObjectKind::Route => Ok(state.route(leaf.target)?.lever_relay),
            ObjectKind::TrackCircuit => Ok(state
                .track_circuit(leaf.target)?
                .is_occupied_for(state.now, leaf.timer_seconds)),
            _ => Ok(false),
        }
    }

    fn is_unlocked(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        let direction = leaf.direction.unwrap_or_default();
        match self.kind(leaf.target)? {
            ObjectKind::Route => Ok(!state.route(leaf.target)?.route_relay),
            ObjectKind::TrackCircuit => self.is_track_clear(leaf, state),
            ObjectKind::SwitchingMachine => Ok(state.switching_machine(leaf.target)?.is_settled_at(direction)),
            ObjectKind::DirectionRoute => self.is_on_side(leaf, state),
            ObjectKind::Lever => Ok(state.lever(leaf.target)?.satisfies(direction)),
            ObjectKind::DirectionSelfControlLever | ObjectKind::RouteCentralControlLever => {
                Ok(state.key_lever(leaf.target)? == direction)
            }
        }
    }

    fn is_route_ready(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        match self.kind(leaf.target)? {
            ObjectKind::TrackCircuit => self.is_track_clear(leaf, state),
            ObjectKind::SwitchingMachine => Ok(state
                .switching_machine(leaf.target)?
                .is_settled_at(leaf.direction.unwrap_or_default())),
            ObjectKind::DirectionRoute => self.is_on_side(leaf, state),
            _ => Ok(true),
        }
    }

    fn is_signal_clear(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        match self.kind(leaf.target)? {
            ObjectKind::TrackCircuit => self.is_track_clear(leaf, state),
            ObjectKind::Route => Ok(!state.route(leaf.target)?.lever_relay),
            ObjectKind::DirectionRoute => self.is_on_side(leaf, state),
            _ => Ok(true),
        }
    }

    fn is_track_clear(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        match self.kind(leaf.target)? {
            ObjectKind::TrackCircuit => Ok(!state
                .track_circuit(leaf.target)?
                .is_occupied_for(state.now, leaf.timer_seconds)),
            _ => Ok(true),
        }
    }

    fn is_on_side(&self, leaf: &ObjectCondition, state: &InterlockingState) -> Result<bool> {
        match leaf.side {
            Some(side) => Ok(state.direction_route(leaf.target)? == side),
            None => Ok(true),
        }
    }

    fn kind(&self, id: ObjectId) -> Result<ObjectKind> {
        self.plant.object(id).map(|object| object.kind)
    }

    fn route_definition(&self, route: ObjectId) -> Result<&'a RouteDefinition> {
        self.plant
            .route(route)
            .ok_or_else(|| InterlockingError::Evaluation(format!("route definition {}", route)))
    }
}

/// Evaluate an optional tree; an absent tree holds
fn check<F>(tree: Option<&ConditionNode>, mut predicate: F) -> Result<bool>
where
    F: FnMut(&ObjectCondition) -> Result<bool>,
{
    match tree {
        Some(tree) => tree.try_evaluate(&mut predicate),
        None => Ok(true),
    }
}

fn push_change(changes: &mut Vec<RelayChange>, route: ObjectId, relay: RelayKind, current: bool, next: bool) {
    if current != next {
        changes.push(RelayChange { route, relay, raised: next });
    }
}

fn apply(state: &mut InterlockingState, changes: &[RelayChange]) -> Result<()> {
    for change in changes {
        let route = state.route_mut(change.route)?;
        let relay = match change.relay {
            RelayKind::Lever => &mut route.lever_relay,
            RelayKind::Route => &mut route.route_relay,
            RelayKind::SignalControl => &mut route.signal_control_relay,
            RelayKind::ThrowOutX => &mut route.throw_out_x,
            RelayKind::ThrowOutXr => &mut route.throw_out_xr,
            RelayKind::ThrowOutYs => &mut route.throw_out_ys,
        };
        *relay = change.raised;
        log::trace!("Route {} {} -> {}", change.route, change.relay, if change.raised { "raised" } else { "dropped" });
    }
    Ok(())
}
