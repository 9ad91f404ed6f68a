// Properties that must hold for any input: parser round trips, resolver determinism,
// relay cascading, order independence and bounded aspect look-ahead
mod common;

use chrono::Utc;
use common::*;
use interlocking_core::notation::to_notation;
use interlocking_core::state::TrackCircuitState;
use interlocking_core::{
    Aspect, AspectPropagator, ConditionNode, Direction, EngineConfig, Interlocking, LeverPosition, LockColumn,
    NotationParser, ObjectCondition, ObjectId, ObjectResolver, PlantAdjacency, SignalDefinition, SignalNetwork,
};

const CORPUS: &[(&str, LockColumn)] = &[
    ("1R (2L) 3T", LockColumn::DirectLock),
    ("1T 但 2T", LockColumn::SignalControl),
    ("1T 2T 但 3T 4T", LockColumn::DirectLock),
    ("1R 又は 2R 又は 3R", LockColumn::DirectLock),
    ("1R 又は 2R 但 3T", LockColumn::DirectLock),
    ("5T {1R 又は 2R}", LockColumn::DirectLock),
    ("[｢(21)｣] 3T但 30秒", LockColumn::DirectLock),
    ("[3T 4T] 5T", LockColumn::SignalControl),
    ("1T ((5R 6R)) 2T", LockColumn::DirectLock),
    ("(1T 2T) (1T 3T) 4T", LockColumn::RouteLock),
    ("(21) 22", LockColumn::SwitchingMachine),
];

#[test]
fn test_parse_render_parse_is_stable() {
    let adjacency = PlantAdjacency::builtin();
    let parser = NotationParser::new(&adjacency);

    for (cell, column) in CORPUS {
        let first = parser.parse(cell, PLANT, *column).unwrap().unwrap();
        let rendered = to_notation(&first, PLANT, &adjacency).unwrap();
        let second = parser.parse(&rendered, PLANT, *column).unwrap().unwrap();
        assert_eq!(first, second, "'{}' rendered as '{}'", cell, rendered);
    }
}

#[test]
fn test_resolution_is_deterministic() {
    let plant = station_objects().build().build_database().unwrap();
    let adjacency = PlantAdjacency::builtin();
    let parser = NotationParser::new(&adjacency);
    let resolver = ObjectResolver::new(&plant);

    for (cell, column) in [
        ("1R (2L) 3T", LockColumn::DirectLock),
        ("1RA 又は 2LB 但 4T", LockColumn::DirectLock),
        ("(21)", LockColumn::SwitchingMachine),
    ] {
        let parsed = parser.parse(cell, PLANT, column).unwrap().unwrap();
        for tree in parsed.trees() {
            let first = resolver.resolve_tree(tree, column).unwrap();
            let second = resolver.resolve_tree(tree, column).unwrap();
            assert_eq!(first, second, "'{}'", cell);
        }
    }
}

fn leaf(id: ObjectId) -> ConditionNode {
    ConditionNode::Object(ObjectCondition::new(id))
}

/// Reverse the children of every And/Or node
fn mirrored(node: &ConditionNode) -> ConditionNode {
    match node {
        ConditionNode::And(children) => ConditionNode::And(children.iter().rev().map(mirrored).collect()),
        ConditionNode::Or(children) => ConditionNode::Or(children.iter().rev().map(mirrored).collect()),
        ConditionNode::Not(child) => ConditionNode::Not(Box::new(mirrored(child))),
        ConditionNode::Object(leaf) => ConditionNode::Object(leaf.clone()),
    }
}

/// Rotate the children of every And/Or node by one
fn rotated(node: &ConditionNode) -> ConditionNode {
    let rotate = |children: &[ConditionNode]| {
        let mut children: Vec<ConditionNode> = children.iter().map(rotated).collect();
        children.rotate_left(1);
        children
    };
    match node {
        ConditionNode::And(children) => ConditionNode::And(rotate(children)),
        ConditionNode::Or(children) => ConditionNode::Or(rotate(children)),
        ConditionNode::Not(child) => ConditionNode::Not(Box::new(rotated(child))),
        ConditionNode::Object(leaf) => ConditionNode::Object(leaf.clone()),
    }
}

#[test]
fn test_evaluation_ignores_child_order() {
    let tree = ConditionNode::And(vec![
        ConditionNode::Or(vec![leaf(0), ConditionNode::Not(Box::new(leaf(1)))]),
        leaf(2),
        ConditionNode::Or(vec![
            ConditionNode::And(vec![leaf(3), leaf(0)]),
            ConditionNode::Not(Box::new(ConditionNode::And(vec![leaf(1), leaf(2), leaf(3)]))),
        ]),
    ]);
    let variants = [mirrored(&tree), rotated(&tree), rotated(&rotated(&tree))];

    for bits in 0u32..16 {
        let mut value = |leaf: &ObjectCondition| (bits & (1 << leaf.target)) != 0;
        let expected = tree.evaluate(&mut value);
        for variant in &variants {
            assert_eq!(variant.evaluate(&mut value), expected, "assignment {:04b}", bits);
            let fallible = variant.try_evaluate(&mut |leaf: &ObjectCondition| Ok(value(leaf))).unwrap();
            assert_eq!(fallible, expected);
        }
    }
}

/// Small deterministic generator for mutation sequences
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn test_relays_cascade_after_every_cycle() {
    let data = station().throw_out(ROUTE_1, ROUTE_2).build();
    let interlocking = Interlocking::from_data(&data, EngineConfig::new(), start_time()).unwrap();
    let positions = [LeverPosition::Left, LeverPosition::Center, LeverPosition::Right];
    let mut rng = Lcg(7);

    for step in 0..300 {
        match rng.next(6) {
            0 => {
                let lever = [LEVER_1, LEVER_2, LEVER_3][rng.next(3) as usize];
                interlocking.set_lever(lever, positions[rng.next(3) as usize]).unwrap();
            }
            1 => {
                let button = ["TH71_AP", "TH71_BP", "TH71_CP"][rng.next(3) as usize];
                interlocking.set_button(button, rng.next(2) == 0).unwrap();
            }
            2 => {
                let track = [TRACK_3, TRACK_4, TRACK_5][rng.next(3) as usize];
                interlocking.set_track_circuit(track, rng.next(3) == 0).unwrap();
            }
            3 => {
                let direction = if rng.next(2) == 0 { Direction::Normal } else { Direction::Reversed };
                interlocking.set_switching_machine(MACHINE, direction, rng.next(4) == 0).unwrap();
            }
            4 => {
                interlocking.advance_clock(chrono::Duration::seconds(rng.next(20) as i64)).unwrap();
            }
            _ => {}
        }

        interlocking.run_cycle().unwrap();

        let snapshot = interlocking.snapshot().unwrap();
        for (id, route) in &snapshot.routes {
            assert!(!route.route_relay || route.lever_relay, "step {}: route {} RR without LR", step, id);
            assert!(
                !route.signal_control_relay || route.route_relay,
                "step {}: route {} SC without RR",
                step,
                id
            );
        }
    }
}

#[test]
fn test_aspect_looks_at_most_four_signals_ahead() {
    // S0 -> S1 -> ... -> S6 -> S0, each protecting its own track circuit
    let signals: Vec<SignalDefinition> = (0..7u64)
        .map(|i| {
            SignalDefinition::new(format!("S{}", i), "4灯")
                .with_track_circuit(100 + i)
                .with_next(format!("S{}", (i + 1) % 7))
        })
        .collect();
    let network = SignalNetwork::new(signals, vec![four_aspect()], 4).unwrap();

    for i in 0..7 {
        let name = format!("S{}", i);
        assert!(network.successors(&name, 5).is_empty());
        assert!(network.graph().ahead(&name).all(|next| next.depth <= 4));
    }

    let mut state = interlocking_core::InterlockingState::new(Utc::now());
    for i in 0..7u64 {
        state.track_circuits.insert(100 + i, TrackCircuitState::default());
    }
    let clear = AspectPropagator::new(&network, &state).aspects(&["S0"]).unwrap()["S0"];

    // Five signals ahead is beyond the horizon
    state.track_circuits.get_mut(&105).unwrap().occupied = true;
    let far = AspectPropagator::new(&network, &state).aspects(&["S0"]).unwrap()["S0"];
    assert_eq!(far, clear);

    // Two signals ahead is not
    state.track_circuits.get_mut(&102).unwrap().occupied = true;
    let near = AspectPropagator::new(&network, &state).aspects(&["S0"]).unwrap()["S0"];
    assert_eq!(near, Aspect::YG);
    assert!(near < clear);
}
