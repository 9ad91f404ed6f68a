//! Object resolution
//!
//! Turns the table tokens of an unresolved tree into object ids. Tokens are ambiguous
//! on their own (`1R` may be a route name or "every route of lever 1"), so resolution
//! tries an ordered list of strategies and the first one that finds something wins.
//!
//! | # | Strategy | Columns |
//! |---|---|---|
//! | 1 | switching machine by number | switching-machine column only |
//! | 2 | direction route by `L`/`R` suffix | all others |
//! | 3 | exact object name | all others |
//! | 4 | all routes of a bare lever | all others |
//! | 5 | lever + destination button via throw-out control | all others |
//! | 6 | block-section track circuit | approach-lock column |
//!
//! Leaves in the block-section pseudo-plant only go through strategy 6. The lock lever
//! of a direction-lock cell is always a direction route and only goes through strategy 2
//! (see [`ObjectResolver::resolve_direction_route`]).

use regex::Regex;
use std::sync::OnceLock;

use crate::condition::{ConditionNode, ObjectCondition};
use crate::notation::{RawLeaf, RawNode};
use crate::plant::naming::{self, BLOCK_SECTION_PLANT};
use crate::plant::PlantDatabase;
use crate::types::{Direction, LockColumn, ObjectId, ObjectKind, Side};

/// Failure to resolve one leaf
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no object found for '{token}' at {plant}")]
    Unresolved { token: String, plant: String },

    #[error("'{token}' at {plant} matches {candidates} throw-out controls")]
    Ambiguous {
        token: String,
        plant: String,
        candidates: usize,
    },
}

/// A resolution strategy
///
/// Returns `Ok(None)` when the strategy does not apply or finds nothing, so the next
/// strategy is tried.
pub trait TryResolve: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError>;
}

fn lever_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(R|L)(Z?)").expect("lever prefix pattern is valid"))
}

fn lever_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(R|L)(Z?)$").expect("lever pattern is valid"))
}

fn block_track_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)T$").expect("track circuit pattern is valid"))
}

fn in_station(leaf: &RawLeaf, column: LockColumn) -> bool {
    leaf.plant != BLOCK_SECTION_PLANT && column != LockColumn::SwitchingMachine
}

/// Strategy 1: `21` in a switching-machine column is machine `W21`
pub struct SwitchingMachineByNumber;

impl TryResolve for SwitchingMachineByNumber {
    fn name(&self) -> &'static str {
        "switching machine"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if column != LockColumn::SwitchingMachine || leaf.plant == BLOCK_SECTION_PLANT {
            return Ok(None);
        }
        let name = naming::switching_machine_name(&leaf.plant, &leaf.token);
        Ok(plant
            .find_kind(&name, ObjectKind::SwitchingMachine)
            .map(|object| vec![object.id]))
    }
}

/// Strategy 2: `51L` is direction route `51F` set to the left
pub struct DirectionRouteBySuffix;

impl TryResolve for DirectionRouteBySuffix {
    fn name(&self) -> &'static str {
        "direction route"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if !in_station(leaf, column) || Side::from_suffix(&leaf.token).is_none() {
            return Ok(None);
        }
        let start = &leaf.token[..leaf.token.len() - 1];
        let name = naming::direction_route_name(&leaf.plant, start);
        Ok(plant
            .find_kind(&name, ObjectKind::DirectionRoute)
            .map(|object| vec![object.id]))
    }
}

/// Strategy 3: the token is the local name of an object
pub struct ExactName;

impl TryResolve for ExactName {
    fn name(&self) -> &'static str {
        "exact name"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if !in_station(leaf, column) {
            return Ok(None);
        }
        let name = naming::to_full_width(&naming::route_name(&leaf.plant, &leaf.token, ""));
        Ok(plant
            .find(&name)
            .filter(|object| object.kind != ObjectKind::SwitchingMachine)
            .map(|object| vec![object.id]))
    }
}

/// Strategy 4: a bare lever (`1R`) stands for every route it starts
pub struct RoutesFromLever;

impl TryResolve for RoutesFromLever {
    fn name(&self) -> &'static str {
        "routes from lever"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if !in_station(leaf, column) {
            return Ok(None);
        }
        let Some(captures) = lever_pattern().captures(&leaf.token) else {
            return Ok(None);
        };
        let lever_local = format!("{}{}", &captures[1], &captures[3]);
        let name = naming::lever_name(&leaf.plant, &lever_local);
        let Some(lever) = plant.find_kind(&name, ObjectKind::Lever) else {
            return Ok(None);
        };

        let routes = plant.routes_from_lever(lever.id);
        if routes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(routes.to_vec()))
        }
    }
}

/// Strategy 5: `1RA` where lever 1 controls, via throw-out, a route ending at button A
pub struct LeverToButton;

impl TryResolve for LeverToButton {
    fn name(&self) -> &'static str {
        "lever to button"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if !in_station(leaf, column) {
            return Ok(None);
        }
        let Some(captures) = lever_prefix_pattern().captures(&leaf.token) else {
            return Ok(None);
        };
        let matched = captures.get(0).map(|m| m.end()).unwrap_or(0);
        let button_local = &leaf.token[matched..];
        if button_local.is_empty() {
            return Ok(None);
        }

        let lever_local = format!("{}{}", &captures[1], &captures[3]);
        let Some(lever) = plant.find_kind(&naming::lever_name(&leaf.plant, &lever_local), ObjectKind::Lever) else {
            return Ok(None);
        };
        let button = naming::button_name(&leaf.plant, button_local);
        let from_lever = plant.routes_from_lever(lever.id);
        let to_button = plant.routes_to_button(&button);

        let candidates: Vec<(ObjectId, ObjectId)> = from_lever
            .iter()
            .flat_map(|source| plant.throw_outs_from(*source))
            .filter(|control| to_button.contains(&control.target))
            .map(|control| (control.source, control.target))
            .collect();

        match candidates.as_slice() {
            [] => Ok(None),
            [(source, target)] => Ok(Some(vec![*source, *target])),
            _ => Err(ResolveError::Ambiguous {
                token: leaf.token.clone(),
                plant: leaf.plant.clone(),
                candidates: candidates.len(),
            }),
        }
    }
}

/// Strategy 6: `12T` in an approach-lock column is the block-section circuit `上り12T`
pub struct ApproachBlockTrackCircuit;

impl TryResolve for ApproachBlockTrackCircuit {
    fn name(&self) -> &'static str {
        "block-section track circuit"
    }

    fn try_resolve(
        &self,
        leaf: &RawLeaf,
        column: LockColumn,
        plant: &PlantDatabase,
    ) -> Result<Option<Vec<ObjectId>>, ResolveError> {
        if column != LockColumn::ApproachLock {
            return Ok(None);
        }
        let name = match block_track_pattern()
            .captures(&leaf.token)
            .and_then(|captures| captures[1].parse::<u32>().ok())
        {
            Some(number) => naming::block_track_circuit_name(number),
            None => leaf.token.clone(),
        };
        Ok(plant
            .find_kind(&name, ObjectKind::TrackCircuit)
            .map(|object| vec![object.id]))
    }
}

/// Resolves unresolved trees against a plant database
pub struct ObjectResolver<'a> {
    plant: &'a PlantDatabase,
    strategies: Vec<Box<dyn TryResolve>>,
}

impl<'a> ObjectResolver<'a> {
    /// Create a resolver with the standard strategy order
    pub fn new(plant: &'a PlantDatabase) -> Self {
        Self {
            plant,
            strategies: vec![
                Box::new(SwitchingMachineByNumber),
                Box::new(DirectionRouteBySuffix),
                Box::new(ExactName),
                Box::new(RoutesFromLever),
                Box::new(LeverToButton),
                Box::new(ApproachBlockTrackCircuit),
            ],
        }
    }

    /// Resolve one leaf to its target objects
    pub fn resolve_leaf(&self, leaf: &RawLeaf, column: LockColumn) -> Result<Vec<ObjectId>, ResolveError> {
        for strategy in &self.strategies {
            if let Some(targets) = strategy.try_resolve(leaf, column, self.plant)? {
                log::trace!(
                    "Resolved '{}' at {} by {} to {:?}",
                    leaf.token,
                    leaf.plant,
                    strategy.name(),
                    targets
                );
                return Ok(targets);
            }
        }

        Err(ResolveError::Unresolved {
            token: leaf.token.clone(),
            plant: leaf.plant.clone(),
        })
    }

    /// Resolve the lock lever named by a direction-lock cell
    pub fn resolve_direction_route(&self, leaf: &RawLeaf, column: LockColumn) -> Result<ObjectCondition, ResolveError> {
        let target = DirectionRouteBySuffix
            .try_resolve(leaf, column, self.plant)?
            .and_then(|targets| targets.first().copied());
        match target {
            Some(target) => Ok(self.condition_for(leaf, target)),
            None => Err(ResolveError::Unresolved {
                token: leaf.token.clone(),
                plant: leaf.plant.clone(),
            }),
        }
    }

    /// Resolve a whole tree, stopping at the first leaf that cannot be resolved
    pub fn resolve_tree(&self, tree: &RawNode, column: LockColumn) -> Result<ConditionNode, ResolveError> {
        match tree {
            RawNode::And(children) => Ok(ConditionNode::And(self.resolve_children(children, column)?)),
            RawNode::Or(children) => Ok(ConditionNode::Or(self.resolve_children(children, column)?)),
            RawNode::Not(child) => Ok(ConditionNode::Not(Box::new(self.resolve_tree(child, column)?))),
            RawNode::Leaf(leaf) => {
                let targets = self.resolve_leaf(leaf, column)?;
                let mut conditions: Vec<ConditionNode> = targets
                    .into_iter()
                    .map(|target| ConditionNode::Object(self.condition_for(leaf, target)))
                    .collect();
                if conditions.len() == 1 {
                    Ok(conditions.remove(0))
                } else {
                    Ok(ConditionNode::And(conditions))
                }
            }
        }
    }

    fn resolve_children(&self, children: &[RawNode], column: LockColumn) -> Result<Vec<ConditionNode>, ResolveError> {
        children.iter().map(|child| self.resolve_tree(child, column)).collect()
    }

    fn condition_for(&self, leaf: &RawLeaf, target: ObjectId) -> ObjectCondition {
        let kind = self.plant.get(target).map(|object| object.kind);
        let direction = if leaf.reversed {
            Direction::Reversed
        } else {
            Direction::Normal
        };

        ObjectCondition {
            target,
            direction: match kind {
                Some(ObjectKind::TrackCircuit) | Some(ObjectKind::DirectionRoute) => None,
                _ => Some(direction),
            },
            side: match kind {
                Some(ObjectKind::DirectionRoute) => Side::from_suffix(&leaf.token),
                _ => None,
            },
            timer_seconds: leaf.timer_seconds,
            subject_to_unlock: leaf.subject_to_unlock,
        }
    }
}
