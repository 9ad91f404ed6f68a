//! Interlocking-table notation
//!
//! Lock conditions are written in a compact bracket notation:
//!
//! | Notation | Meaning |
//! |---|---|
//! | `1R 2T` | all of the items (AND) |
//! | `(21)` | the object in reversed position (outside route-lock columns) |
//! | `(1R 2T)` | one numbered alternative (route-lock columns) |
//! | `{...}` | grouping |
//! | `[...]`, `[[...]]` | objects of the plant 1 or 2 hops away |
//! | `((...))` | total-control clause, not modelled and discarded |
//! | `｢...｣` | the contained objects are subject to unlock |
//! | `A 但 B` | `A` or not `B` |
//! | `A 又は B` | `A` or `B` |
//! | `3T 但 30秒` | `3T` with a 30 s timer |
//!
//! Parsing produces an unresolved tree whose leaves still carry table tokens; the
//! resolver turns those into object ids.

pub mod parser;
pub mod serialize;
pub mod tokenizer;

pub use parser::{NotationParser, ParsedCell, RawLeaf, RawNode};
pub use serialize::to_notation;
pub use tokenizer::{tokenize, Token};

/// Errors raised while tokenizing, parsing or rendering notation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotationError {
    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("unclosed bracket, expected '{0}'")]
    UnclosedBracket(String),

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("no plant {hops} hop(s) away from {plant}")]
    UnknownNeighbor { plant: String, hops: usize },

    #[error("plant {target} is not reachable from {home}")]
    UnreachablePlant { home: String, target: String },

    #[error("reverse scope must hold exactly one item, found {0}")]
    InvalidReverseScope(usize),

    #[error("timer of {0} s has no preceding object")]
    DanglingTimer(u32),

    #[error("empty group or operand")]
    EmptyGroup,

    #[error("tree has no notation form: {0}")]
    Unrepresentable(&'static str),
}
