//! Cross-plant adjacency
//!
//! A lock condition may name objects of a neighbouring plant by wrapping them in `N`
//! square brackets. The plant `N` hops away from a home plant is looked up in a fixed
//! table: entry `N - 1` of the home plant's neighbour list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::naming::BLOCK_SECTION_PLANT;

/// Fixed neighbour table keyed by home plant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantAdjacency {
    neighbors: HashMap<String, Vec<String>>,
}

impl PlantAdjacency {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the ordered neighbour list of a plant
    pub fn with_plant(mut self, plant: &str, neighbors: &[&str]) -> Self {
        self.neighbors.insert(
            plant.to_string(),
            neighbors.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    /// The table of the modelled line
    pub fn builtin() -> Self {
        Self::new()
            .with_plant("TH58", &["TH59", "TH57"])
            .with_plant("TH59", &["TH58"])
            .with_plant("TH61", &["TH62"])
            .with_plant("TH62", &["TH63", "TH61"])
            .with_plant("TH63", &["TH64", "TH62"])
            .with_plant("TH64", &["TH65", "TH63"])
            .with_plant("TH65", &["TH66S", "TH64"])
            .with_plant("TH66S", &["TH65"])
            .with_plant("TH67", &[])
            .with_plant("TH70", &["TH71"])
            .with_plant("TH71", &["TH70"])
            .with_plant("TH75", &["TH76", BLOCK_SECTION_PLANT])
            .with_plant("TH76", &["TH75"])
    }

    /// Plant `hops` brackets away from `home` (1-based)
    pub fn neighbor(&self, home: &str, hops: usize) -> Option<&str> {
        let index = hops.checked_sub(1)?;
        self.neighbors
            .get(home)
            .and_then(|list| list.get(index))
            .map(String::as_str)
    }

    /// Bracket count that reaches `target` from `home`, if any
    pub fn hops_to(&self, home: &str, target: &str) -> Option<usize> {
        self.neighbors
            .get(home)?
            .iter()
            .position(|n| n == target)
            .map(|index| index + 1)
    }

    /// Number of plants with an entry
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_lookup() {
        let adjacency = PlantAdjacency::builtin();
        assert_eq!(adjacency.neighbor("TH62", 1), Some("TH63"));
        assert_eq!(adjacency.neighbor("TH62", 2), Some("TH61"));
        assert_eq!(adjacency.neighbor("TH62", 3), None);
        assert_eq!(adjacency.neighbor("TH62", 0), None);
        assert_eq!(adjacency.neighbor("TH67", 1), None);
        assert_eq!(adjacency.neighbor("TH99", 1), None);
    }

    #[test]
    fn test_hops_to() {
        let adjacency = PlantAdjacency::builtin();
        assert_eq!(adjacency.hops_to("TH75", BLOCK_SECTION_PLANT), Some(2));
        assert_eq!(adjacency.hops_to("TH58", "TH59"), Some(1));
        assert_eq!(adjacency.hops_to("TH58", "TH62"), None);
    }
}
