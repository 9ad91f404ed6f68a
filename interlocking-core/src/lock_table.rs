//! Lock table
//!
//! Builds the resolved condition trees of every (object, lock kind) pair from the raw
//! rows of the interlocking tables: parse, resolve, then merge the columns that feed the
//! same kind. Two further products are registered while loading:
//!
//! - the lock levers of each direction route, from its direction-lock cells
//! - the final track circuit of each route's approach-lock clause

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::condition::ConditionNode;
use crate::config::EngineConfig;
use crate::notation::{NotationParser, ParsedCell, RawLeaf};
use crate::plant::PlantDatabase;
use crate::resolver::{ObjectResolver, ResolveError};
use crate::types::{
    InterlockingError, InterlockingObject, LockColumn, LockContext, LockKind, ObjectId, ObjectKind, Result, Side,
};

/// One cell of an interlocking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTableRow {
    /// Plant whose table the cell belongs to
    pub plant: String,
    /// Stored name of the object owning the condition
    pub object: String,
    pub column: LockColumn,
    pub raw: String,
}

impl LockTableRow {
    pub fn new(plant: impl Into<String>, object: impl Into<String>, column: LockColumn, raw: impl Into<String>) -> Self {
        Self {
            plant: plant.into(),
            object: object.into(),
            column,
            raw: raw.into(),
        }
    }

    fn context(&self) -> LockContext {
        LockContext {
            plant: self.plant.clone(),
            object: self.object.clone(),
            kind: self.column.lock_kind(),
            raw: self.raw.clone(),
        }
    }

    /// Object name without the `{plant}_` prefix
    fn local_object(&self) -> &str {
        self.object
            .strip_prefix(self.plant.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(&self.object)
    }
}

/// Areas of the master data known to be incomplete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownDataGap {
    /// Switching machines of a plant that are not modelled
    UnmodeledSwitchingMachines { plant: &'static str, first: u32, last: u32 },
    /// Direction routes of a plant that cannot serve as lock levers of a neighbour
    IncompleteDirectionRoutes { plant: &'static str },
}

pub const KNOWN_DATA_GAPS: [KnownDataGap; 2] = [
    KnownDataGap::UnmodeledSwitchingMachines { plant: "TH66S", first: 61, last: 78 },
    KnownDataGap::IncompleteDirectionRoutes { plant: "TH57" },
];

impl KnownDataGap {
    /// Whether a failure on `token` (owned by `owner`) at `plant` falls into this gap
    ///
    /// The direction-route gap only covers the lock lever of a direction-lock cell; every
    /// other token at that plant must still resolve.
    pub fn covers(&self, plant: &str, owner: &str, token: &str, column: LockColumn) -> bool {
        match *self {
            KnownDataGap::UnmodeledSwitchingMachines { plant: gap_plant, first, last } => {
                let machine = match column {
                    LockColumn::SwitchingMachine => token,
                    LockColumn::Detector => owner,
                    _ => return false,
                };
                plant == gap_plant
                    && machine_number(machine).map_or(false, |n| (first..=last).contains(&n))
            }
            KnownDataGap::IncompleteDirectionRoutes { plant: gap_plant } => {
                plant == gap_plant
                    && column.direction_lock_side().is_some()
                    && Side::from_suffix(token).is_some()
            }
        }
    }
}

fn machine_number(name: &str) -> Option<u32> {
    name.trim_start_matches('W').parse().ok()
}

fn known_gap(plant: &str, owner: &str, token: &str, column: LockColumn) -> Option<KnownDataGap> {
    KNOWN_DATA_GAPS
        .iter()
        .copied()
        .find(|gap| gap.covers(plant, owner, token, column))
}

/// A lever of a neighbouring plant, given as its direction route and side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockLever {
    pub direction_route: ObjectId,
    pub side: Side,
}

/// Neighbouring levers registered for one lever (`L` or `R`) of a direction route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionLeverLocks {
    /// Lever locking this lever
    pub lock: Option<LockLever>,
    /// Lever this lever is single-locked by (`｢｣` in the table)
    pub single_locked: Option<LockLever>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectionRouteLocks {
    pub left: DirectionLeverLocks,
    pub right: DirectionLeverLocks,
}

impl DirectionRouteLocks {
    pub fn lever(&self, side: Side) -> &DirectionLeverLocks {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn lever_mut(&mut self, side: Side) -> &mut DirectionLeverLocks {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Resolved trees keyed by owning object and lock kind
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    clauses: HashMap<(ObjectId, LockKind), Vec<ConditionNode>>,
    direction_locks: HashMap<ObjectId, DirectionRouteLocks>,
    /// Route -> last track circuit of its approach-lock clause
    approach_final_tracks: HashMap<ObjectId, ObjectId>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and resolve every row
    ///
    /// # Arguments
    /// * `rows` - Raw interlocking-table cells
    /// * `plant` - Object database the tokens are resolved against
    /// * `config` - Plant filter and data-gap tolerance
    ///
    /// # Returns
    /// * `Result<LockTable>` - The table, or the first parse/resolution error with the
    ///   plant, object, lock kind and raw string it came from
    pub fn build(rows: &[LockTableRow], plant: &PlantDatabase, config: &EngineConfig) -> Result<Self> {
        let parser = NotationParser::new(plant.adjacency());
        let resolver = ObjectResolver::new(plant);
        let mut table = LockTable::new();
        let mut skipped = 0usize;

        for row in rows {
            if !config.should_process_plant(&row.plant) {
                continue;
            }

            let Some(owner) = plant.find(&row.object) else {
                if config.tolerate_known_data_gaps && known_gap(&row.plant, row.local_object(), "", row.column).is_some() {
                    log::warn!("Skipping {}: owner is in a known data gap", row.context());
                    skipped += 1;
                    continue;
                }
                return Err(InterlockingError::InvalidPlantData(format!(
                    "lock table refers to unknown object {} ({})",
                    row.object,
                    row.context()
                )));
            };

            let parsed = parser
                .parse(&row.raw, &row.plant, row.column)
                .map_err(|source| InterlockingError::Parse {
                    context: row.context(),
                    source,
                })?;

            if let Some(side) = row.column.direction_lock_side() {
                if !table.register_direction_lock(row, owner, side, parsed.as_ref(), &resolver, config)? {
                    skipped += 1;
                }
                continue;
            }

            let Some(parsed) = parsed else {
                continue;
            };

            for raw_tree in parsed.into_trees() {
                match resolver.resolve_tree(&raw_tree, row.column) {
                    Ok(tree) => {
                        log::trace!("{} -> {:?}", row.context(), tree);
                        if row.column == LockColumn::ApproachLock && owner.kind == ObjectKind::Route {
                            table.register_final_track(owner.id, &tree, plant);
                        }
                        table.insert(owner.id, row.column.lock_kind(), tree);
                    }
                    Err(error) => {
                        skip_known_gap(row, error, config)?;
                        skipped += 1;
                    }
                }
            }
        }

        log::info!(
            "Lock table built: {} trees for {} objects, {} direction routes with lock levers ({} clauses skipped)",
            table.len(),
            table.num_objects(),
            table.direction_locks.len(),
            skipped
        );
        Ok(table)
    }

    /// Register the lock lever named by a direction-lock cell
    ///
    /// Returns `Ok(false)` when the cell is skipped: it is empty, names more than one
    /// lever, or names a lever in a known data gap.
    fn register_direction_lock(
        &mut self,
        row: &LockTableRow,
        owner: &InterlockingObject,
        side: Side,
        parsed: Option<&ParsedCell>,
        resolver: &ObjectResolver,
        config: &EngineConfig,
    ) -> Result<bool> {
        if owner.kind != ObjectKind::DirectionRoute {
            return Err(InterlockingError::InvalidPlantData(format!(
                "direction lock on {}, which is a {} ({})",
                owner.name,
                owner.kind,
                row.context()
            )));
        }

        let leaves: Vec<&RawLeaf> = parsed
            .map(|cell| cell.trees().iter().flat_map(|tree| tree.leaves()).collect())
            .unwrap_or_default();
        let [leaf] = leaves.as_slice() else {
            log::warn!("Skipping {}: expected one lock lever, found {}", row.context(), leaves.len());
            return Ok(false);
        };

        let lock = match resolver.resolve_direction_route(leaf, row.column) {
            Ok(lock) => lock,
            Err(error) => {
                skip_known_gap(row, error, config)?;
                return Ok(false);
            }
        };

        let lever = LockLever {
            direction_route: lock.target,
            side: lock.side.unwrap_or_default(),
        };
        let locks = self.direction_locks.entry(owner.id).or_default().lever_mut(side);
        if lock.subject_to_unlock {
            locks.single_locked = Some(lever);
        } else {
            locks.lock = Some(lever);
        }
        Ok(true)
    }

    /// The first approach-lock clause of a route decides its final track circuit
    fn register_final_track(&mut self, route: ObjectId, tree: &ConditionNode, plant: &PlantDatabase) {
        let last_track = tree
            .objects()
            .into_iter()
            .rev()
            .find(|leaf| plant.get(leaf.target).map_or(false, |object| object.kind == ObjectKind::TrackCircuit));
        if let Some(leaf) = last_track {
            self.approach_final_tracks.entry(route).or_insert(leaf.target);
        }
    }

    /// Add a tree; non-route-lock kinds keep a single tree by AND-combining
    pub fn insert(&mut self, object: ObjectId, kind: LockKind, tree: ConditionNode) {
        let trees = self.clauses.entry((object, kind)).or_default();
        if kind == LockKind::RouteLock {
            trees.push(tree);
            return;
        }

        let merged = match trees.pop() {
            None => tree,
            Some(ConditionNode::And(mut children)) => {
                children.push(tree);
                ConditionNode::And(children)
            }
            Some(existing) => ConditionNode::And(vec![existing, tree]),
        };
        trees.push(merged);
    }

    /// The single tree of a non-route-lock kind
    pub fn clause(&self, object: ObjectId, kind: LockKind) -> Option<&ConditionNode> {
        self.clauses.get(&(object, kind)).and_then(|trees| trees.first())
    }

    /// Numbered route-lock alternatives (index 0 is alternative 1)
    ///
    /// The relay sweep reads the route-lock relay as an input; the alternatives are kept
    /// for the route-lock logic that maintains it.
    pub fn route_locks(&self, object: ObjectId) -> &[ConditionNode] {
        self.clauses
            .get(&(object, LockKind::RouteLock))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Neighbouring lock levers of a direction route, kept for the direction-route logic
    pub fn direction_locks(&self, direction_route: ObjectId) -> Option<&DirectionRouteLocks> {
        self.direction_locks.get(&direction_route)
    }

    /// Last track circuit named by a route's approach-lock clause
    pub fn approach_final_track(&self, route: ObjectId) -> Option<ObjectId> {
        self.approach_final_tracks.get(&route).copied()
    }

    /// Number of trees
    pub fn len(&self) -> usize {
        self.clauses.values().map(Vec::len).sum()
    }

    /// No trees
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    fn num_objects(&self) -> usize {
        let mut objects: Vec<ObjectId> = self.clauses.keys().map(|(object, _)| *object).collect();
        objects.sort_unstable();
        objects.dedup();
        objects.len()
    }
}

/// Skip a clause that failed in a known data gap; any other failure is a load error
fn skip_known_gap(row: &LockTableRow, error: ResolveError, config: &EngineConfig) -> Result<()> {
    match error {
        ResolveError::Unresolved { token, plant } => {
            if config.tolerate_known_data_gaps && known_gap(&plant, row.local_object(), &token, row.column).is_some() {
                log::warn!("Skipping clause of {}: '{}' at {} is in a known data gap", row.context(), token, plant);
                return Ok(());
            }
            Err(InterlockingError::Resolution {
                context: row.context(),
                token,
                plant,
            })
        }
        ResolveError::Ambiguous { token, plant, candidates } => Err(InterlockingError::AmbiguousResolution {
            context: row.context(),
            token,
            plant,
            candidates,
        }),
    }
}
