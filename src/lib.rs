//! A document-database query-evaluation and encoding core: a BSON-like
//! value model and binary codec, a MongoDB-style match-expression parser
//! and evaluator, and an `OP_MSG` wire framer.
//!
//! See the [`prelude`] module for the common entry points.

pub mod codec;
pub mod dsl;
pub mod error;
pub mod path;
pub mod value;
pub mod wire;

pub mod prelude;
