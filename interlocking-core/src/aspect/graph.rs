//! Next-signal graph
//!
//! Direct "next signal" edges are expanded once at load time into a closure up to a
//! fixed depth, so that "the signals N ahead of X" is a map lookup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// `target` is `depth` signals ahead of `signal`, reached through `source`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSignal {
    pub signal: String,
    pub source: String,
    pub target: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NextSignalGraph {
    max_depth: usize,
    /// Per signal, the records of depth 1, 2, ... in that order
    levels: HashMap<String, Vec<Vec<NextSignal>>>,
}

impl NextSignalGraph {
    /// Build the closure from direct edges
    ///
    /// # Arguments
    /// * `edges` - Direct `(signal, next signal)` pairs
    /// * `repeaters` - Names of repeater signals
    /// * `max_depth` - Deepest level to precompute
    pub fn build<I>(edges: I, repeaters: &HashSet<String>, max_depth: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut direct: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (from, to) in edges {
            add_edge(&mut direct, from, to);
        }

        // Z -> Y alongside R -> Y for a repeater R: Z also sees R
        let mut synthesized = Vec::new();
        for (repeater, repeater_targets) in direct.iter().filter(|(name, _)| repeaters.contains(*name)) {
            for (other, other_targets) in &direct {
                if other == repeater || repeaters.contains(other) {
                    continue;
                }
                if other_targets.iter().any(|t| repeater_targets.contains(t)) {
                    synthesized.push((other.clone(), repeater.clone()));
                }
            }
        }
        for (from, to) in synthesized {
            log::trace!("Repeater edge {} -> {}", from, to);
            add_edge(&mut direct, from, to);
        }

        let mut levels = HashMap::new();
        for (signal, targets) in &direct {
            let mut seen: HashSet<String> = targets.iter().cloned().collect();
            let mut signal_levels = vec![targets
                .iter()
                .map(|target| NextSignal {
                    signal: signal.clone(),
                    source: signal.clone(),
                    target: target.clone(),
                    depth: 1,
                })
                .collect::<Vec<_>>()];

            for depth in 2..=max_depth {
                let mut level = Vec::new();
                for previous in &signal_levels[depth - 2] {
                    for next in direct.get(&previous.target).into_iter().flatten() {
                        if seen.insert(next.clone()) {
                            level.push(NextSignal {
                                signal: signal.clone(),
                                source: previous.target.clone(),
                                target: next.clone(),
                                depth,
                            });
                        }
                    }
                }
                if level.is_empty() {
                    break;
                }
                signal_levels.push(level);
            }

            levels.insert(signal.clone(), signal_levels);
        }

        Self { max_depth, levels }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Records exactly `depth` signals ahead (1-based)
    pub fn successors(&self, signal: &str, depth: usize) -> &[NextSignal] {
        depth
            .checked_sub(1)
            .and_then(|index| self.levels.get(signal)?.get(index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of the signals directly ahead
    pub fn next_signals<'a>(&'a self, signal: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.successors(signal, 1).iter().map(|next| next.target.as_str())
    }

    /// Every record of a signal, shallowest first
    pub fn ahead<'a>(&'a self, signal: &str) -> impl Iterator<Item = &'a NextSignal> + 'a {
        self.levels.get(signal).into_iter().flatten().flatten()
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.levels.values().flatten().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn add_edge(direct: &mut BTreeMap<String, Vec<String>>, from: String, to: String) {
    let targets = direct.entry(from).or_default();
    if !targets.contains(&to) {
        targets.push(to);
    }
}
