//! Signal definitions and aspect calculation
//!
//! A signal's aspect depends on its own protection (track circuit, routes, direction
//! routes) and on the best aspect shown by the signals directly ahead of it, mapped
//! through the signal's type table. Look-ahead is bounded by the graph depth so cycles
//! in the signal network terminate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::graph::{NextSignal, NextSignalGraph};
use crate::plant::PlantDatabase;
use crate::state::InterlockingState;
use crate::types::{Aspect, InterlockingError, ObjectId, ObjectKind, Result, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub name: String,
    /// Name of the `SignalType` table this signal indicates with
    pub type_name: String,
    /// Track circuit protected by the signal
    #[serde(default)]
    pub track_circuit: Option<ObjectId>,
    /// Routes of an absolute signal; empty for automatic and repeater signals
    #[serde(default)]
    pub routes: Vec<ObjectId>,
    #[serde(default)]
    pub direction: Option<Side>,
    #[serde(default)]
    pub direction_routes: Vec<ObjectId>,
    #[serde(default)]
    pub next_signals: Vec<String>,
    /// Signal repeated by this one
    #[serde(default)]
    pub repeats: Option<String>,
}

impl SignalDefinition {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            track_circuit: None,
            routes: Vec::new(),
            direction: None,
            direction_routes: Vec::new(),
            next_signals: Vec::new(),
            repeats: None,
        }
    }

    pub fn with_track_circuit(mut self, track_circuit: ObjectId) -> Self {
        self.track_circuit = Some(track_circuit);
        self
    }

    pub fn with_routes(mut self, routes: Vec<ObjectId>) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_direction(mut self, direction: Side, direction_routes: Vec<ObjectId>) -> Self {
        self.direction = Some(direction);
        self.direction_routes = direction_routes;
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next_signals.push(next.into());
        self
    }

    pub fn repeating(mut self, signal: impl Into<String>) -> Self {
        self.repeats = Some(signal.into());
        self
    }

    pub fn is_absolute(&self) -> bool {
        !self.routes.is_empty()
    }
}

/// Indication table: what a signal of this type shows for each aspect ahead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalType {
    pub name: String,
    pub r: Aspect,
    pub yy: Aspect,
    pub y: Aspect,
    pub yg: Aspect,
    pub g: Aspect,
}

impl SignalType {
    /// Table given in `[R, YY, Y, YG, G]` order of the next aspect
    pub fn new(name: impl Into<String>, table: [Aspect; 5]) -> Self {
        let [r, yy, y, yg, g] = table;
        Self { name: name.into(), r, yy, y, yg, g }
    }

    pub fn indication(&self, next: Aspect) -> Aspect {
        match next {
            Aspect::R => self.r,
            Aspect::YY => self.yy,
            Aspect::Y => self.y,
            Aspect::YG => self.yg,
            Aspect::G => self.g,
        }
    }
}

/// Signals, their type tables and the precomputed next-signal graph
#[derive(Debug, Clone, Default)]
pub struct SignalNetwork {
    signals: HashMap<String, SignalDefinition>,
    types: HashMap<String, SignalType>,
    graph: NextSignalGraph,
}

impl SignalNetwork {
    /// Validate the definitions and build the next-signal closure
    ///
    /// # Errors
    /// `InvalidPlantData` for duplicate signal or type names and for a signal whose type
    /// is not defined
    pub fn new(signals: Vec<SignalDefinition>, types: Vec<SignalType>, max_depth: usize) -> Result<Self> {
        let mut type_map = HashMap::new();
        for signal_type in types {
            let name = signal_type.name.clone();
            if type_map.insert(name.clone(), signal_type).is_some() {
                return Err(InterlockingError::InvalidPlantData(format!("duplicate signal type {}", name)));
            }
        }

        let mut signal_map = HashMap::new();
        for signal in signals {
            if !type_map.contains_key(&signal.type_name) {
                return Err(InterlockingError::InvalidPlantData(format!(
                    "signal {} has unknown type {}",
                    signal.name, signal.type_name
                )));
            }
            let name = signal.name.clone();
            if signal_map.insert(name.clone(), signal).is_some() {
                return Err(InterlockingError::InvalidPlantData(format!("duplicate signal {}", name)));
            }
        }

        let repeaters: HashSet<String> = signal_map
            .values()
            .filter(|signal| signal.repeats.is_some())
            .map(|signal| signal.name.clone())
            .collect();
        let edges = signal_map
            .values()
            .flat_map(|signal| signal.next_signals.iter().map(move |next| (signal.name.clone(), next.clone())));
        let graph = NextSignalGraph::build(edges, &repeaters, max_depth);

        log::info!(
            "Signal network built: {} signals, {} types, {} next-signal records (depth {})",
            signal_map.len(),
            type_map.len(),
            graph.len(),
            max_depth
        );

        Ok(Self { signals: signal_map, types: type_map, graph })
    }

    /// Check that every object a signal refers to exists with the expected kind
    pub fn validate_objects(&self, plant: &PlantDatabase) -> Result<()> {
        for signal in self.signals.values() {
            let references = signal
                .track_circuit
                .iter()
                .map(|id| (*id, ObjectKind::TrackCircuit))
                .chain(signal.routes.iter().map(|id| (*id, ObjectKind::Route)))
                .chain(signal.direction_routes.iter().map(|id| (*id, ObjectKind::DirectionRoute)));

            for (id, kind) in references {
                let object = plant.object(id)?;
                if object.kind != kind {
                    return Err(InterlockingError::InvalidPlantData(format!(
                        "signal {} refers to {} {} which is a {}",
                        signal.name, kind, object.name, object.kind
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.get(name)
    }

    pub fn signal_type(&self, name: &str) -> Option<&SignalType> {
        self.types.get(name)
    }

    pub fn graph(&self) -> &NextSignalGraph {
        &self.graph
    }

    /// Signals exactly `depth` ahead of `name`
    pub fn successors(&self, name: &str, depth: usize) -> &[NextSignal] {
        self.graph.successors(name, depth)
    }

    /// All signal names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.signals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Computes aspects against one state snapshot
pub struct AspectPropagator<'a> {
    network: &'a SignalNetwork,
    state: &'a InterlockingState,
}

impl<'a> AspectPropagator<'a> {
    pub fn new(network: &'a SignalNetwork, state: &'a InterlockingState) -> Self {
        Self { network, state }
    }

    /// Aspects of the named signals; unknown names are R
    pub fn aspects<S: AsRef<str>>(&self, names: &[S]) -> Result<BTreeMap<String, Aspect>> {
        let budget = self.network.graph().max_depth();
        let mut memo = HashMap::new();
        let mut aspects = BTreeMap::new();

        for name in names {
            let name = name.as_ref();
            let aspect = self.calc(name, budget, &mut memo)?;
            aspects.insert(name.to_string(), aspect);
        }
        Ok(aspects)
    }

    /// Aspects of the named signals and of the signals directly ahead of them
    pub fn aspects_with_next<S: AsRef<str>>(&self, names: &[S]) -> Result<BTreeMap<String, Aspect>> {
        let mut all: Vec<&str> = Vec::new();
        for name in names {
            let name = name.as_ref();
            all.push(name);
            all.extend(self.network.graph().next_signals(name));
        }
        self.aspects(all.as_slice())
    }

    fn calc(&self, name: &str, budget: usize, memo: &mut HashMap<(String, usize), Aspect>) -> Result<Aspect> {
        if let Some(aspect) = memo.get(&(name.to_string(), budget)) {
            return Ok(*aspect);
        }

        let aspect = match self.network.signal(name) {
            None => Aspect::R,
            Some(signal) if !self.is_proceedable(signal)? => Aspect::R,
            Some(signal) => {
                let signal_type = self.network.signal_type(&signal.type_name).ok_or_else(|| {
                    InterlockingError::InvalidPlantData(format!("unknown signal type {}", signal.type_name))
                })?;

                let mut next = Aspect::R;
                if budget > 0 {
                    for successor in self.network.graph().next_signals(name) {
                        next = next.max(self.calc(successor, budget - 1, memo)?);
                    }
                }
                signal_type.indication(next)
            }
        };

        log::trace!("Aspect {} = {} (budget {})", name, aspect, budget);
        memo.insert((name.to_string(), budget), aspect);
        Ok(aspect)
    }

    fn is_proceedable(&self, signal: &SignalDefinition) -> Result<bool> {
        if let Some(track) = signal.track_circuit {
            if self.state.track_circuit(track)?.occupied {
                return Ok(false);
            }
        }

        if signal.is_absolute() {
            let mut cleared = false;
            for route in &signal.routes {
                cleared |= self.state.route(*route)?.signal_control_relay;
            }
            if !cleared {
                return Ok(false);
            }
        }

        if let Some(direction) = signal.direction {
            for route in &signal.direction_routes {
                if self.state.direction_route(*route)? != direction {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TrackCircuitState;
    use chrono::Utc;

    const TRACK_3: ObjectId = 3;
    const ROUTE: ObjectId = 10;
    const DIRECTION: ObjectId = 40;

    fn four_aspect() -> SignalType {
        SignalType::new("4灯", [Aspect::Y, Aspect::Y, Aspect::YG, Aspect::G, Aspect::G])
    }

    fn state() -> InterlockingState {
        let mut state = InterlockingState::new(Utc::now());
        for track in [1, 2, TRACK_3] {
            state.track_circuits.insert(track, TrackCircuitState::default());
        }
        state.routes.insert(ROUTE, Default::default());
        state.direction_routes.insert(DIRECTION, Side::Left);
        state
    }

    fn chain() -> SignalNetwork {
        SignalNetwork::new(
            vec![
                SignalDefinition::new("S1", "4灯").with_track_circuit(1).with_next("S2"),
                SignalDefinition::new("S2", "4灯").with_track_circuit(2).with_next("S3"),
                SignalDefinition::new("S3", "4灯").with_track_circuit(TRACK_3),
            ],
            vec![four_aspect()],
            4,
        )
        .unwrap()
    }

    #[test]
    fn test_occupied_track_cascades() {
        let network = chain();
        let mut state = state();
        state.track_circuits.get_mut(&TRACK_3).unwrap().occupied = true;

        let aspects = AspectPropagator::new(&network, &state).aspects(&["S1", "S2", "S3"]).unwrap();
        let table = four_aspect();
        assert_eq!(aspects["S3"], Aspect::R);
        assert_eq!(aspects["S2"], table.indication(Aspect::R));
        assert_eq!(aspects["S1"], table.indication(aspects["S2"]));
    }

    #[test]
    fn test_clear_line_and_unknown_signal() {
        let network = chain();
        let state = state();

        let aspects = AspectPropagator::new(&network, &state).aspects(&["S1", "S9"]).unwrap();
        // S3 has nothing ahead: Y, so S2 is YG and S1 is G
        assert_eq!(aspects["S1"], Aspect::G);
        assert_eq!(aspects["S9"], Aspect::R);
    }

    #[test]
    fn test_absolute_signal_needs_signal_control() {
        let network = SignalNetwork::new(
            vec![SignalDefinition::new("1R", "4灯").with_routes(vec![ROUTE])],
            vec![four_aspect()],
            4,
        )
        .unwrap();
        let mut state = state();

        let propagator = AspectPropagator::new(&network, &state);
        assert_eq!(propagator.aspects(&["1R"]).unwrap()["1R"], Aspect::R);

        state.routes.get_mut(&ROUTE).unwrap().signal_control_relay = true;
        let propagator = AspectPropagator::new(&network, &state);
        assert_eq!(propagator.aspects(&["1R"]).unwrap()["1R"], Aspect::Y);
    }

    #[test]
    fn test_direction_route_mismatch() {
        let network = SignalNetwork::new(
            vec![SignalDefinition::new("下り1", "4灯").with_direction(Side::Right, vec![DIRECTION])],
            vec![four_aspect()],
            4,
        )
        .unwrap();
        let mut state = state();

        assert_eq!(AspectPropagator::new(&network, &state).aspects(&["下り1"]).unwrap()["下り1"], Aspect::R);
        state.direction_routes.insert(DIRECTION, Side::Right);
        assert_eq!(AspectPropagator::new(&network, &state).aspects(&["下り1"]).unwrap()["下り1"], Aspect::Y);
    }

    #[test]
    fn test_cycle_is_bounded() {
        let network = SignalNetwork::new(
            vec![
                SignalDefinition::new("A", "4灯").with_next("B"),
                SignalDefinition::new("B", "4灯").with_next("A"),
            ],
            vec![four_aspect()],
            4,
        )
        .unwrap();
        let state = state();

        let aspects = AspectPropagator::new(&network, &state).aspects(&["A", "B"]).unwrap();
        assert_eq!(aspects["A"], Aspect::G);
        assert_eq!(aspects["B"], Aspect::G);
    }

    #[test]
    fn test_aspects_with_next() {
        let network = chain();
        let state = state();

        let aspects = AspectPropagator::new(&network, &state).aspects_with_next(&["S1"]).unwrap();
        assert_eq!(aspects.keys().collect::<Vec<_>>(), vec!["S1", "S2"]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = SignalNetwork::new(vec![SignalDefinition::new("S1", "5灯")], vec![four_aspect()], 4);
        assert!(matches!(result, Err(InterlockingError::InvalidPlantData(_))));
    }

    #[test]
    fn test_missing_track_state_is_error() {
        let network = chain();
        let state = InterlockingState::new(Utc::now());
        assert!(AspectPropagator::new(&network, &state).aspects(&["S1"]).is_err());
    }
}
