//! Resolved lock-condition trees
//!
//! A [`ConditionNode`] is what the relay evaluator and the detector check walk on every
//! cycle. Leaves point at object ids; what a leaf *means* is supplied by the caller as
//! a predicate, so the same tree answers "is it unlocked", "is it locked" and "is the
//! track clear" depending on who asks.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, ObjectId, Result, Side};

/// Leaf of a resolved tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCondition {
    pub target: ObjectId,
    /// Required normal/reversed position, where the target has one
    pub direction: Option<Direction>,
    /// Required side of a direction route
    pub side: Option<Side>,
    pub timer_seconds: Option<u32>,
    pub subject_to_unlock: bool,
}

impl ObjectCondition {
    pub fn new(target: ObjectId) -> Self {
        Self {
            target,
            direction: None,
            side: None,
            timer_seconds: None,
            subject_to_unlock: false,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn with_timer(mut self, seconds: u32) -> Self {
        self.timer_seconds = Some(seconds);
        self
    }
}

/// Boolean tree over object conditions; `And`/`Or` always hold at least one child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionNode {
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
    Object(ObjectCondition),
}

impl ConditionNode {
    /// Evaluate with a leaf predicate
    pub fn evaluate<F>(&self, predicate: &mut F) -> bool
    where
        F: FnMut(&ObjectCondition) -> bool,
    {
        match self {
            ConditionNode::And(children) => children.iter().all(|c| c.evaluate(predicate)),
            ConditionNode::Or(children) => children.iter().any(|c| c.evaluate(predicate)),
            ConditionNode::Not(child) => !child.evaluate(predicate),
            ConditionNode::Object(leaf) => predicate(leaf),
        }
    }

    /// Evaluate with a fallible leaf predicate
    ///
    /// Every leaf is visited, so a failing leaf is reported regardless of where it sits
    /// among its siblings.
    pub fn try_evaluate<F>(&self, predicate: &mut F) -> Result<bool>
    where
        F: FnMut(&ObjectCondition) -> Result<bool>,
    {
        match self {
            ConditionNode::And(children) => {
                let mut all = true;
                for child in children {
                    all &= child.try_evaluate(predicate)?;
                }
                Ok(all)
            }
            ConditionNode::Or(children) => {
                let mut any = false;
                for child in children {
                    any |= child.try_evaluate(predicate)?;
                }
                Ok(any)
            }
            ConditionNode::Not(child) => Ok(!child.try_evaluate(predicate)?),
            ConditionNode::Object(leaf) => predicate(leaf),
        }
    }

    /// All leaves, left to right
    pub fn objects(&self) -> Vec<&ObjectCondition> {
        let mut leaves = Vec::new();
        self.collect(&mut leaves);
        leaves
    }

    fn collect<'a>(&'a self, leaves: &mut Vec<&'a ObjectCondition>) {
        match self {
            ConditionNode::And(children) | ConditionNode::Or(children) => {
                for child in children {
                    child.collect(leaves);
                }
            }
            ConditionNode::Not(child) => child.collect(leaves),
            ConditionNode::Object(leaf) => leaves.push(leaf),
        }
    }
}
