//! Master-data document
//!
//! The complete load-time input of the engine in one serializable value: objects,
//! route and throw-out definitions, the raw interlocking table and the signal network.
//! How the document is produced (database export, JSON file, test fixture) is up to
//! the caller.

use serde::{Deserialize, Serialize};

use super::adjacency::PlantAdjacency;
use super::database::{PlantDatabase, RouteDefinition, ThrowOutControl};
use crate::aspect::{SignalDefinition, SignalType};
use crate::lock_table::LockTableRow;
use crate::types::{InterlockingObject, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantData {
    /// Neighbour table; the built-in table of the modelled line when absent
    #[serde(default)]
    pub adjacency: Option<PlantAdjacency>,
    pub objects: Vec<InterlockingObject>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub throw_out_controls: Vec<ThrowOutControl>,
    #[serde(default)]
    pub lock_table: Vec<LockTableRow>,
    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
    #[serde(default)]
    pub signal_types: Vec<SignalType>,
}

impl PlantData {
    /// Build the object database from the object, route and throw-out sections
    pub fn build_database(&self) -> Result<PlantDatabase> {
        let adjacency = self.adjacency.clone().unwrap_or_else(PlantAdjacency::builtin);
        let mut db = PlantDatabase::new(adjacency);

        for object in &self.objects {
            db.add_object(object.clone())?;
        }
        for route in &self.routes {
            db.add_route(route.clone())?;
        }
        for control in &self.throw_out_controls {
            db.add_throw_out(control.clone())?;
        }

        let stats = db.stats();
        log::info!(
            "Plant database built: {} plants, {} objects, {} routes, {} throw-out controls",
            stats.num_plants,
            stats.num_objects,
            stats.num_routes,
            stats.num_throw_outs
        );
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectKind;

    #[test]
    fn test_build_database_uses_builtin_adjacency() {
        let data = PlantData {
            objects: vec![
                InterlockingObject::new(1, "TH71_1", ObjectKind::Lever, "TH71"),
                InterlockingObject::new(10, "TH71_1RA", ObjectKind::Route, "TH71"),
            ],
            routes: vec![RouteDefinition::new(10, 1)],
            ..PlantData::default()
        };

        let db = data.build_database().unwrap();
        assert_eq!(db.stats().num_routes, 1);
        assert_eq!(db.adjacency().neighbor("TH71", 1), Some("TH70"));
    }

    #[test]
    fn test_build_database_rejects_dangling_route() {
        let data = PlantData {
            objects: vec![InterlockingObject::new(10, "TH71_1RA", ObjectKind::Route, "TH71")],
            routes: vec![RouteDefinition::new(10, 1)],
            ..PlantData::default()
        };

        assert!(data.build_database().is_err());
    }
}
