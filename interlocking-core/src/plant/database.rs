//! Plant object database
//!
//! Holds every interlocking object of all loaded plants together with the route and
//! throw-out-control definitions, indexed for the lookups the resolver and the relay
//! evaluator perform on every leaf.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::adjacency::PlantAdjacency;
use crate::types::{Direction, InterlockingError, InterlockingObject, ObjectId, ObjectKind, Result, Side};

/// Route-specific master data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Id of the route object
    pub id: ObjectId,
    /// Id of the start lever; lever-less routes are only set by throw-out control
    #[serde(default)]
    pub lever: Option<ObjectId>,
    /// Name of the destination button, if the route has one
    #[serde(default)]
    pub destination_button: Option<String>,
    /// Route central-control lever switching the route between station and CTC control
    #[serde(default)]
    pub central_control_lever: Option<ObjectId>,
}

impl RouteDefinition {
    pub fn new(id: ObjectId, lever: ObjectId) -> Self {
        Self {
            id,
            lever: Some(lever),
            destination_button: None,
            central_control_lever: None,
        }
    }

    /// A route without a lever of its own
    pub fn without_lever(id: ObjectId) -> Self {
        Self {
            id,
            lever: None,
            destination_button: None,
            central_control_lever: None,
        }
    }

    pub fn with_button(mut self, button: impl Into<String>) -> Self {
        self.destination_button = Some(button.into());
        self
    }

    pub fn with_central_control(mut self, lever: ObjectId) -> Self {
        self.central_control_lever = Some(lever);
        self
    }
}

/// How a throw-out control extends control to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ThrowOutKind {
    /// The target has its own lever; the source lever raises its XR/YS relays
    #[default]
    WithLever,
    /// The target has no lever; the source lever relay raises its X relay
    WithoutLever,
}

/// Throw-out control: the source route controls the target route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrowOutControl {
    pub source: ObjectId,
    pub target: ObjectId,
    #[serde(default)]
    pub kind: ThrowOutKind,
    /// Side the target must be set to when it is a direction route
    #[serde(default)]
    pub target_side: Option<Side>,
    /// Key lever guarding the control
    #[serde(default)]
    pub condition_lever: Option<ObjectId>,
    /// Required direction of the guard lever
    #[serde(default)]
    pub condition_direction: Option<Direction>,
}

impl ThrowOutControl {
    pub fn new(source: ObjectId, target: ObjectId) -> Self {
        Self {
            source,
            target,
            kind: ThrowOutKind::WithLever,
            target_side: None,
            condition_lever: None,
            condition_direction: None,
        }
    }

    pub fn without_lever(mut self) -> Self {
        self.kind = ThrowOutKind::WithoutLever;
        self
    }

    pub fn with_target_side(mut self, side: Side) -> Self {
        self.target_side = Some(side);
        self
    }

    pub fn with_guard(mut self, lever: ObjectId, direction: Option<Direction>) -> Self {
        self.condition_lever = Some(lever);
        self.condition_direction = direction;
        self
    }
}

/// Object database combining all plants
#[derive(Debug, Clone, Default)]
pub struct PlantDatabase {
    /// Objects indexed by id
    objects: HashMap<ObjectId, InterlockingObject>,
    /// Object ids indexed by name
    name_lookup: HashMap<String, ObjectId>,
    routes: HashMap<ObjectId, RouteDefinition>,
    /// Routes indexed by start lever (insertion order)
    routes_by_lever: HashMap<ObjectId, Vec<ObjectId>>,
    /// Routes indexed by destination button name
    routes_by_button: HashMap<String, Vec<ObjectId>>,
    throw_outs: Vec<ThrowOutControl>,
    throw_outs_by_source: HashMap<ObjectId, Vec<usize>>,
    throw_outs_by_target: HashMap<ObjectId, Vec<usize>>,
    adjacency: PlantAdjacency,
}

impl PlantDatabase {
    /// Create an empty database using the given neighbour table
    pub fn new(adjacency: PlantAdjacency) -> Self {
        Self {
            adjacency,
            ..Self::default()
        }
    }

    /// Add an object; ids and names must be unique
    pub fn add_object(&mut self, object: InterlockingObject) -> Result<()> {
        if self.objects.contains_key(&object.id) {
            return Err(InterlockingError::InvalidPlantData(format!(
                "duplicate object id {}",
                object.id
            )));
        }
        if self.name_lookup.contains_key(&object.name) {
            return Err(InterlockingError::InvalidPlantData(format!(
                "duplicate object name {}",
                object.name
            )));
        }
        self.name_lookup.insert(object.name.clone(), object.id);
        self.objects.insert(object.id, object);
        Ok(())
    }

    /// Add route master data; the route and its levers must already exist
    pub fn add_route(&mut self, route: RouteDefinition) -> Result<()> {
        self.expect_kind(route.id, ObjectKind::Route)?;
        if let Some(lever) = route.lever {
            self.expect_kind(lever, ObjectKind::Lever)?;
        }
        if let Some(lever) = route.central_control_lever {
            self.expect_kind(lever, ObjectKind::RouteCentralControlLever)?;
        }

        if let Some(lever) = route.lever {
            self.routes_by_lever.entry(lever).or_default().push(route.id);
        }
        if let Some(button) = &route.destination_button {
            self.routes_by_button
                .entry(button.clone())
                .or_default()
                .push(route.id);
        }
        self.routes.insert(route.id, route);
        Ok(())
    }

    /// Add a throw-out control edge between two existing objects
    ///
    /// A lever-less control must target a route that was added without a lever.
    pub fn add_throw_out(&mut self, control: ThrowOutControl) -> Result<()> {
        self.expect_kind(control.source, ObjectKind::Route)?;
        for id in [Some(control.target), control.condition_lever].into_iter().flatten() {
            if !self.objects.contains_key(&id) {
                return Err(InterlockingError::InvalidPlantData(format!(
                    "throw-out control from {} refers to unknown object {}",
                    control.source, id
                )));
            }
        }
        if control.kind == ThrowOutKind::WithoutLever {
            match self.routes.get(&control.target) {
                Some(target) if target.lever.is_none() => {}
                _ => {
                    return Err(InterlockingError::InvalidPlantData(format!(
                        "lever-less throw-out control from {} targets {}, which is not a lever-less route",
                        control.source, control.target
                    )))
                }
            }
        }

        let index = self.throw_outs.len();
        self.throw_outs_by_source.entry(control.source).or_default().push(index);
        self.throw_outs_by_target.entry(control.target).or_default().push(index);
        self.throw_outs.push(control);
        Ok(())
    }

    fn expect_kind(&self, id: ObjectId, kind: ObjectKind) -> Result<()> {
        match self.objects.get(&id) {
            Some(object) if object.kind == kind => Ok(()),
            Some(object) => Err(InterlockingError::InvalidPlantData(format!(
                "{} is a {}, expected a {}",
                object.name, object.kind, kind
            ))),
            None => Err(InterlockingError::InvalidPlantData(format!(
                "unknown {} id {}",
                kind, id
            ))),
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&InterlockingObject> {
        self.objects.get(&id)
    }

    /// Look up an object by id, failing evaluation when it is unknown
    pub fn object(&self, id: ObjectId) -> Result<&InterlockingObject> {
        self.objects
            .get(&id)
            .ok_or_else(|| InterlockingError::Evaluation(format!("object {}", id)))
    }

    /// Look up an object by its stored name
    pub fn find(&self, name: &str) -> Option<&InterlockingObject> {
        self.name_lookup.get(name).and_then(|id| self.objects.get(id))
    }

    /// Look up an object by name, only if it has the given kind
    pub fn find_kind(&self, name: &str, kind: ObjectKind) -> Option<&InterlockingObject> {
        self.find(name).filter(|object| object.kind == kind)
    }

    pub fn route(&self, id: ObjectId) -> Option<&RouteDefinition> {
        self.routes.get(&id)
    }

    /// Route ids in ascending order
    pub fn route_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.routes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Routes started by a lever
    pub fn routes_from_lever(&self, lever: ObjectId) -> &[ObjectId] {
        self.routes_by_lever.get(&lever).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Routes ending at a destination button
    pub fn routes_to_button(&self, button: &str) -> &[ObjectId] {
        self.routes_by_button.get(button).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Throw-out controls whose source is the given route
    pub fn throw_outs_from(&self, source: ObjectId) -> impl Iterator<Item = &ThrowOutControl> {
        self.throw_outs_by_source
            .get(&source)
            .into_iter()
            .flatten()
            .map(move |index| &self.throw_outs[*index])
    }

    /// Throw-out controls whose target is the given object
    pub fn throw_outs_into(&self, target: ObjectId) -> impl Iterator<Item = &ThrowOutControl> {
        self.throw_outs_by_target
            .get(&target)
            .into_iter()
            .flatten()
            .map(move |index| &self.throw_outs[*index])
    }

    /// All objects of one kind
    pub fn objects_of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &InterlockingObject> {
        self.objects.values().filter(move |object| object.kind == kind)
    }

    pub fn adjacency(&self) -> &PlantAdjacency {
        &self.adjacency
    }

    /// Get statistics about the database
    pub fn stats(&self) -> PlantStats {
        let mut plants: Vec<&str> = self.objects.values().map(|o| o.plant.as_str()).collect();
        plants.sort_unstable();
        plants.dedup();

        PlantStats {
            num_plants: plants.len(),
            num_objects: self.objects.len(),
            num_routes: self.routes.len(),
            num_throw_outs: self.throw_outs.len(),
        }
    }
}

/// Statistics about the plant database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlantStats {
    pub num_plants: usize,
    pub num_objects: usize,
    pub num_routes: usize,
    pub num_throw_outs: usize,
}
