//! Canonical notation rendering
//!
//! Renders a parsed cell back into notation such that parsing the output yields the
//! same tree again.

use super::parser::{ParsedCell, RawLeaf, RawNode};
use super::NotationError;
use crate::plant::PlantAdjacency;

/// Render a parsed cell as written at `home_plant`
pub fn to_notation(
    cell: &ParsedCell,
    home_plant: &str,
    adjacency: &PlantAdjacency,
) -> Result<String, NotationError> {
    let writer = Writer { home: home_plant, adjacency };
    match cell {
        ParsedCell::Clause(RawNode::And(children)) => writer.join(children),
        ParsedCell::Clause(tree) => writer.node(tree),
        ParsedCell::Alternatives(trees) => {
            let parts = trees
                .iter()
                .map(|tree| match tree {
                    RawNode::And(children) => Ok(format!("({})", writer.join(children)?)),
                    other => writer.node(other),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(" "))
        }
    }
}

struct Writer<'a> {
    home: &'a str,
    adjacency: &'a PlantAdjacency,
}

impl Writer<'_> {
    fn join(&self, children: &[RawNode]) -> Result<String, NotationError> {
        let parts = children
            .iter()
            .map(|child| self.node(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(" "))
    }

    fn node(&self, node: &RawNode) -> Result<String, NotationError> {
        match node {
            RawNode::Leaf(leaf) => self.leaf(leaf),
            RawNode::And(children) => Ok(format!("{{{}}}", self.join(children)?)),
            RawNode::Or(children) => Ok(format!("{{{}}}", self.or(children)?)),
            RawNode::Not(_) => Err(NotationError::Unrepresentable("negation outside a disjunction")),
        }
    }

    /// `a 又は b 又は c`, with a trailing negated child written as `但`
    fn or(&self, children: &[RawNode]) -> Result<String, NotationError> {
        let (last, init) = children.split_last().ok_or(NotationError::EmptyGroup)?;
        let mut parts = Vec::with_capacity(children.len());
        for child in init {
            parts.push(self.operand(child)?);
        }

        match last {
            RawNode::Not(negated) if !parts.is_empty() => {
                let left = parts.join(" 又は ");
                Ok(format!("{} 但 {}", left, self.operand(negated)?))
            }
            RawNode::Not(_) => Err(NotationError::Unrepresentable("negation without a left operand")),
            other => {
                parts.push(self.operand(other)?);
                Ok(parts.join(" 又は "))
            }
        }
    }

    fn operand(&self, node: &RawNode) -> Result<String, NotationError> {
        match node {
            RawNode::Not(_) => Err(NotationError::Unrepresentable("negation inside a disjunction")),
            other => self.node(other),
        }
    }

    fn leaf(&self, leaf: &RawLeaf) -> Result<String, NotationError> {
        let mut text = leaf.token.clone();
        if leaf.reversed {
            text = format!("({})", text);
        }
        if leaf.subject_to_unlock {
            text = format!("｢{}｣", text);
        }
        if leaf.plant != self.home {
            let hops = self
                .adjacency
                .hops_to(self.home, &leaf.plant)
                .ok_or_else(|| NotationError::UnreachablePlant {
                    home: self.home.to_string(),
                    target: leaf.plant.clone(),
                })?;
            text = format!("{}{}{}", "[".repeat(hops), text, "]".repeat(hops));
        }
        if let Some(seconds) = leaf.timer_seconds {
            text = format!("{}但{}秒", text, seconds);
        }
        Ok(text)
    }
}
