//! Notation parser
//!
//! Recursive descent over the token stream. Every nested scope carries the plant the
//! leaves belong to and the reversed / subject-to-unlock / total-control flags set by
//! the enclosing brackets.
//!
//! `但` and `又は` are right-associative: their right operand extends to the closing
//! bracket of the current scope, and a multi-item operand is AND-grouped.

use std::mem;

use super::tokenizer::{tokenize, Token};
use super::NotationError;
use crate::plant::PlantAdjacency;
use crate::types::LockColumn;

/// A leaf that still names its target by table token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLeaf {
    pub token: String,
    /// Plant the token is to be looked up in
    pub plant: String,
    pub reversed: bool,
    pub subject_to_unlock: bool,
    pub timer_seconds: Option<u32>,
}

/// Unresolved condition tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNode {
    And(Vec<RawNode>),
    Or(Vec<RawNode>),
    Not(Box<RawNode>),
    Leaf(RawLeaf),
}

impl RawNode {
    /// Visit every leaf, left to right
    pub fn leaves(&self) -> Vec<&RawLeaf> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a RawLeaf>) {
        match self {
            RawNode::And(children) | RawNode::Or(children) => {
                for child in children {
                    child.collect_leaves(leaves);
                }
            }
            RawNode::Not(child) => child.collect_leaves(leaves),
            RawNode::Leaf(leaf) => leaves.push(leaf),
        }
    }
}

/// Result of parsing one non-empty table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCell {
    /// A single clause
    Clause(RawNode),
    /// Numbered alternatives of a route-lock column (1-based in order)
    Alternatives(Vec<RawNode>),
}

impl ParsedCell {
    pub fn trees(&self) -> &[RawNode] {
        match self {
            ParsedCell::Clause(tree) => std::slice::from_ref(tree),
            ParsedCell::Alternatives(trees) => trees,
        }
    }

    pub fn into_trees(self) -> Vec<RawNode> {
        match self {
            ParsedCell::Clause(tree) => vec![tree],
            ParsedCell::Alternatives(trees) => trees,
        }
    }
}

/// Parser for interlocking-table cells
pub struct NotationParser<'a> {
    adjacency: &'a PlantAdjacency,
}

#[derive(Debug, Clone)]
struct Scope {
    plant: String,
    reversed: bool,
    subject_to_unlock: bool,
    total_control: bool,
}

struct Cursor<'a> {
    tokens: Vec<Token>,
    pos: usize,
    home: &'a str,
    route_lock: bool,
    adjacency: &'a PlantAdjacency,
}

impl<'a> NotationParser<'a> {
    pub fn new(adjacency: &'a PlantAdjacency) -> Self {
        Self { adjacency }
    }

    /// Parse one table cell written at `home_plant`
    ///
    /// # Returns
    /// * `Ok(None)` for an empty cell
    /// * `Ok(Some(ParsedCell::Alternatives))` for route-lock columns
    /// * `Ok(Some(ParsedCell::Clause))` for every other column
    pub fn parse(
        &self,
        cell: &str,
        home_plant: &str,
        column: LockColumn,
    ) -> Result<Option<ParsedCell>, NotationError> {
        let mut cursor = Cursor {
            tokens: tokenize(cell)?,
            pos: 0,
            home: home_plant,
            route_lock: column.is_route_lock(),
            adjacency: self.adjacency,
        };

        let root = Scope {
            plant: home_plant.to_string(),
            reversed: false,
            subject_to_unlock: false,
            total_control: false,
        };
        let items = cursor.parse_sequence(&root)?;

        if let Some(token) = cursor.peek() {
            return Err(NotationError::UnexpectedToken(token.to_string()));
        }
        if items.is_empty() {
            return Ok(None);
        }

        if cursor.route_lock {
            Ok(Some(ParsedCell::Alternatives(items)))
        } else {
            Ok(Some(ParsedCell::Clause(group_and(items)?)))
        }
    }
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), NotationError> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(NotationError::UnclosedBracket(expected.to_string())),
        }
    }

    fn parse_sequence(&mut self, scope: &Scope) -> Result<Vec<RawNode>, NotationError> {
        let mut items: Vec<RawNode> = Vec::new();

        while let Some(token) = self.peek() {
            if token.is_closing() {
                break;
            }
            let Some(token) = self.next() else { break };

            match token {
                Token::OpenGroup => {
                    let inner = self.parse_sequence(scope)?;
                    self.expect(Token::CloseGroup)?;
                    if inner.is_empty() {
                        return Err(NotationError::EmptyGroup);
                    }
                    items.extend(inner);
                }
                Token::OpenTotalControl => {
                    let inner_scope = Scope {
                        total_control: true,
                        ..scope.clone()
                    };
                    self.parse_sequence(&inner_scope)?;
                    self.expect(Token::CloseTotalControl)?;
                }
                Token::OpenNeighbor(hops) => {
                    let plant = self.adjacency.neighbor(self.home, hops).ok_or_else(|| {
                        NotationError::UnknownNeighbor {
                            plant: self.home.to_string(),
                            hops,
                        }
                    })?;
                    let inner_scope = Scope {
                        plant: plant.to_string(),
                        ..scope.clone()
                    };
                    let inner = self.parse_sequence(&inner_scope)?;
                    self.expect(Token::CloseNeighbor(hops))?;
                    items.extend(inner);
                }
                Token::OpenParen if self.route_lock => {
                    let inner = self.parse_sequence(scope)?;
                    self.expect(Token::CloseParen)?;
                    if inner.is_empty() {
                        return Err(NotationError::EmptyGroup);
                    }
                    items.push(RawNode::And(inner));
                }
                Token::OpenParen => {
                    let inner_scope = Scope {
                        reversed: true,
                        ..scope.clone()
                    };
                    let mut inner = self.parse_sequence(&inner_scope)?;
                    self.expect(Token::CloseParen)?;
                    match inner.pop() {
                        Some(item) if inner.is_empty() => items.push(item),
                        Some(_) => return Err(NotationError::InvalidReverseScope(inner.len() + 1)),
                        None => return Err(NotationError::InvalidReverseScope(0)),
                    }
                }
                Token::OpenUnlock => {
                    let inner_scope = Scope {
                        subject_to_unlock: true,
                        ..scope.clone()
                    };
                    let inner = self.parse_sequence(&inner_scope)?;
                    self.expect(Token::CloseUnlock)?;
                    items.extend(inner);
                }
                Token::Timer(seconds) => match items.last_mut() {
                    Some(RawNode::Leaf(leaf)) => leaf.timer_seconds = Some(seconds),
                    _ => return Err(NotationError::DanglingTimer(seconds)),
                },
                Token::Unless => {
                    let left = group_and(mem::take(&mut items))?;
                    let right = group_and(self.parse_sequence(scope)?)?;
                    items.push(RawNode::Or(vec![left, RawNode::Not(Box::new(right))]));
                }
                Token::Or => {
                    let left = group_and(mem::take(&mut items))?;
                    let right = group_and(self.parse_sequence(scope)?)?;
                    let mut children = vec![left];
                    match right {
                        RawNode::Or(nested) => children.extend(nested),
                        other => children.push(other),
                    }
                    items.push(RawNode::Or(children));
                }
                Token::Ident(name) => items.push(RawNode::Leaf(RawLeaf {
                    token: name,
                    plant: scope.plant.clone(),
                    reversed: scope.reversed,
                    subject_to_unlock: scope.subject_to_unlock,
                    timer_seconds: None,
                })),
                closing => return Err(NotationError::UnexpectedToken(closing.to_string())),
            }
        }

        Ok(items)
    }
}

/// Wrap several items in an AND; a single item stands alone
fn group_and(mut items: Vec<RawNode>) -> Result<RawNode, NotationError> {
    match items.len() {
        0 => Err(NotationError::EmptyGroup),
        1 => Ok(items.remove(0)),
        _ => Ok(RawNode::And(items)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(token: &str, plant: &str) -> RawLeaf {
        RawLeaf {
            token: token.to_string(),
            plant: plant.to_string(),
            reversed: false,
            subject_to_unlock: false,
            timer_seconds: None,
        }
    }

    fn node(token: &str) -> RawNode {
        RawNode::Leaf(leaf(token, "TH71"))
    }

    fn reversed(token: &str) -> RawNode {
        RawNode::Leaf(RawLeaf {
            reversed: true,
            ..leaf(token, "TH71")
        })
    }

    fn parse(cell: &str, column: LockColumn) -> Result<Option<ParsedCell>, NotationError> {
        let adjacency = PlantAdjacency::builtin();
        NotationParser::new(&adjacency).parse(cell, "TH71", column)
    }

    fn clause(cell: &str) -> RawNode {
        match parse(cell, LockColumn::DirectLock).unwrap() {
            Some(ParsedCell::Clause(tree)) => tree,
            other => panic!("expected a clause, got {:?}", other),
        }
    }

    #[test]
    fn test_reversed_item() {
        assert_eq!(clause("1R(2L)"), RawNode::And(vec![node("1R"), reversed("2L")]));
    }

    #[test]
    fn test_single_item_is_not_grouped() {
        assert_eq!(clause("3T"), node("3T"));
    }

    #[test]
    fn test_empty_cell() {
        assert_eq!(parse("   ", LockColumn::SignalControl).unwrap(), None);
    }

    #[test]
    fn test_unless() {
        assert_eq!(
            clause("1T 但 2T"),
            RawNode::Or(vec![node("1T"), RawNode::Not(Box::new(node("2T")))])
        );
        assert_eq!(
            clause("1T 2T 但 3T 4T"),
            RawNode::Or(vec![
                RawNode::And(vec![node("1T"), node("2T")]),
                RawNode::Not(Box::new(RawNode::And(vec![node("3T"), node("4T")]))),
            ])
        );
    }

    #[test]
    fn test_or_flattens_right_hand_or() {
        assert_eq!(
            clause("1R 又は 2R 又は 3R"),
            RawNode::Or(vec![node("1R"), node("2R"), node("3R")])
        );
    }

    #[test]
    fn test_group_scopes_operators() {
        assert_eq!(
            clause("5T {1R 又は 2R}"),
            RawNode::And(vec![node("5T"), RawNode::Or(vec![node("1R"), node("2R")])])
        );
    }

    #[test]
    fn test_neighbor_plants() {
        let tree = clause("[3T]");
        assert_eq!(tree, RawNode::Leaf(leaf("3T", "TH70")));

        let adjacency = PlantAdjacency::builtin();
        let parsed = NotationParser::new(&adjacency)
            .parse("[[上り12T]]", "TH75", LockColumn::ApproachLock)
            .unwrap();
        assert_eq!(
            parsed,
            Some(ParsedCell::Clause(RawNode::Leaf(leaf("上り12T", "閉そく"))))
        );
    }

    #[test]
    fn test_unknown_neighbor() {
        assert_eq!(
            parse("[[3T]]", LockColumn::DirectLock),
            Err(NotationError::UnknownNeighbor { plant: "TH71".to_string(), hops: 2 })
        );
    }

    #[test]
    fn test_mismatched_bracket_counts() {
        assert!(matches!(
            parse("[3T]]", LockColumn::DirectLock),
            Err(NotationError::UnclosedBracket(_))
        ));
        assert!(matches!(
            parse("1R (2L", LockColumn::DirectLock),
            Err(NotationError::UnclosedBracket(_))
        ));
        assert!(matches!(
            parse("1R 2L}", LockColumn::DirectLock),
            Err(NotationError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_total_control_is_discarded() {
        assert_eq!(clause("1T ((5R 6R))"), node("1T"));
        assert_eq!(parse("((5R))", LockColumn::SignalControl).unwrap(), None);
    }

    #[test]
    fn test_unlock_and_timer() {
        let tree = clause("｢(21)｣ 3T但 30秒");
        let RawNode::And(children) = tree else {
            panic!("expected AND");
        };
        let RawNode::Leaf(machine) = &children[0] else { panic!("expected leaf") };
        assert!(machine.reversed);
        assert!(machine.subject_to_unlock);
        let RawNode::Leaf(track) = &children[1] else { panic!("expected leaf") };
        assert_eq!(track.timer_seconds, Some(30));
        assert!(!track.subject_to_unlock);
    }

    #[test]
    fn test_dangling_timer() {
        assert_eq!(
            parse("但 30秒", LockColumn::ApproachLock),
            Err(NotationError::DanglingTimer(30))
        );
    }

    #[test]
    fn test_reverse_scope_holds_one_item() {
        assert_eq!(
            parse("(1R 2R)", LockColumn::DirectLock),
            Err(NotationError::InvalidReverseScope(2))
        );
    }

    #[test]
    fn test_route_lock_alternatives() {
        let parsed = parse("(1T 2T) (1T 3T) 4T", LockColumn::RouteLock).unwrap();
        assert_eq!(
            parsed,
            Some(ParsedCell::Alternatives(vec![
                RawNode::And(vec![node("1T"), node("2T")]),
                RawNode::And(vec![node("1T"), node("3T")]),
                node("4T"),
            ]))
        );
    }

    #[test]
    fn test_leaves_in_order() {
        let tree = clause("1R {2R 又は 3R} 但 4T");
        let tokens: Vec<&str> = tree.leaves().iter().map(|l| l.token.as_str()).collect();
        assert_eq!(tokens, vec!["1R", "2R", "3R", "4T"]);
    }
}
