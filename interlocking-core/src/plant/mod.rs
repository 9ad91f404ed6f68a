//! Plant master data
//!
//! Objects, routes, throw-out controls and the cross-plant neighbour table, plus the
//! naming rules that map interlocking-table tokens to stored object names.

pub mod adjacency;
pub mod data;
pub mod database;
pub mod naming;

pub use adjacency::PlantAdjacency;
pub use data::PlantData;
pub use database::{PlantDatabase, PlantStats, RouteDefinition, ThrowOutControl, ThrowOutKind};
