//! Re-exports of the most commonly used types for convenience.

pub use crate::codec::{decode_document, encode_document};
pub use crate::dsl::{matches, parse_predicate_top_level, MatchExpression, MatchOperator, Predicate, TreeOp};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::path::Path;
pub use crate::value::{compare, Array, Document, Element, Tag, Value};
pub use crate::wire::{parse_frame, Frame, OpCode, Section};
