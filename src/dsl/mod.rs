//! Query match-expression parsing and evaluation.

pub mod ast;
pub mod eval;
pub mod parser;

pub use self::ast::{MatchExpression, MatchOperator, Predicate, TreeOp};
pub use self::eval::{iter_path, matches};
pub use self::parser::parse_predicate_top_level;
