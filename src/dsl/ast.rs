//! The match-expression tree: pure data, no behaviour beyond structural
//! equality. Evaluation dispatches on variant in `dsl::eval`, not through a
//! virtual call.

use crate::path::Path;
use crate::value::Element;

/// The three logical tree operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeOp {
    And,
    Or,
    Nor,
}

/// A leaf-level comparison/set/regex/geo operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOperator {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Regex,
    Near,
    NearSphere,
    GeoNear,
}

impl MatchOperator {
    /// The operator's `$`-prefixed spelling in the query language.
    pub fn as_str(self) -> &'static str {
        use self::MatchOperator::*;

        match self {
            Eq => "$eq",
            Lt => "$lt",
            Lte => "$lte",
            Gt => "$gt",
            Gte => "$gte",
            In => "$in",
            Nin => "$nin",
            Regex => "$regex",
            Near => "$near",
            NearSphere => "$nearSphere",
            GeoNear => "$geoNear",
        }
    }
}

/// An operator applied to an argument, with optional operator-specific
/// named arguments (unused by every operator this crate implements today;
/// this is the seam future operators like `$near`'s extra options would
/// hang off of).
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub operator: MatchOperator,
    pub argument: Element,
    pub named_arguments: Option<crate::value::Document>,
}

impl Predicate {
    pub fn new(operator: MatchOperator, argument: Element) -> Self {
        Predicate { operator, argument, named_arguments: None }
    }
}

/// The match-expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchExpression {
    /// Applies a predicate to every leaf an iterated path produces.
    PathMatch(Path, Predicate),
    /// A logical combinator over an ordered list of children.
    Tree(TreeOp, Vec<MatchExpression>),
    /// Logical negation of the inner expression.
    Not(Box<MatchExpression>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn operator_spellings_match_the_query_language() {
        assert_eq!(MatchOperator::Gte.as_str(), "$gte");
        assert_eq!(MatchOperator::GeoNear.as_str(), "$geoNear");
    }

    #[test]
    fn path_match_is_structurally_comparable() {
        let a = MatchExpression::PathMatch(
            Path::from_str("a"),
            Predicate::new(MatchOperator::Eq, Element::new("a", Value::Int32(1))),
        );
        let b = a.clone();
        assert_eq!(a, b);
    }
}
