//! Parses a query document (already decoded into our own [`Document`] shape,
//! whether it arrived as JSON or BSON) into a [`MatchExpression`] tree.
//!
//! Mirrors the dispatch structure of a MongoDB-style query planner: two
//! frozen, string-keyed registries (`PATHLESS_EXPRESSIONS` for `$and`/`$or`/
//! `$nor`, `MATCH_OPERATORS` for everything else) replace a chain of
//! `if`/`else`, so adding an operator never touches the dispatch loop itself.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::warn;

use crate::dsl::ast::{MatchExpression, MatchOperator, Predicate, TreeOp};
use crate::error::{Error, Result};
use crate::path::Path;
use crate::value::{Document, Element, Value};

type PathlessFn = fn(&Element) -> Result<MatchExpression>;
type OperatorFn = fn(&str, &Element) -> Result<MatchExpression>;

lazy_static! {
    static ref PATHLESS_EXPRESSIONS: HashMap<&'static str, PathlessFn> = {
        let mut m: HashMap<&'static str, PathlessFn> = HashMap::new();
        m.insert("$and", parse_and as PathlessFn);
        m.insert("$or", parse_or as PathlessFn);
        m.insert("$nor", parse_nor as PathlessFn);
        m
    };

    static ref MATCH_OPERATORS: HashMap<&'static str, OperatorFn> = {
        let mut m: HashMap<&'static str, OperatorFn> = HashMap::new();
        m.insert("$eq", (|f, e| parse_comparison(f, e, MatchOperator::Eq)) as OperatorFn);
        m.insert("$lt", (|f, e| parse_comparison(f, e, MatchOperator::Lt)) as OperatorFn);
        m.insert("$lte", (|f, e| parse_comparison(f, e, MatchOperator::Lte)) as OperatorFn);
        m.insert("$gt", (|f, e| parse_comparison(f, e, MatchOperator::Gt)) as OperatorFn);
        m.insert("$gte", (|f, e| parse_comparison(f, e, MatchOperator::Gte)) as OperatorFn);
        m.insert("$in", (|f, e| parse_comparison(f, e, MatchOperator::In)) as OperatorFn);
        m.insert("$nin", (|f, e| parse_comparison(f, e, MatchOperator::Nin)) as OperatorFn);
        m.insert("$regex", (|f, e| parse_comparison(f, e, MatchOperator::Regex)) as OperatorFn);
        m.insert("$near", (|_, _| Err(Error::unimplemented("geo is not yet implemented"))) as OperatorFn);
        m.insert("$nearSphere", (|_, _| Err(Error::unimplemented("geo is not yet implemented"))) as OperatorFn);
        m.insert("$geoNear", (|_, _| Err(Error::unimplemented("geo is not yet implemented"))) as OperatorFn);
        m
    };
}

/// Parses a whole query document as a top-level predicate.
///
/// Every element of `query` contributes one child: a `$`-prefixed field name
/// dispatches through `PATHLESS_EXPRESSIONS`; an operator-shaped sub-document
/// dispatches per-operator through `MATCH_OPERATORS`; a regex value is
/// rewritten to `{field: {$regex: value}}` before dispatch; anything else is
/// implicit equality. A single child collapses to itself; more than one is
/// wrapped in an implicit `$and`.
pub fn parse_predicate_top_level(query: &Document) -> Result<MatchExpression> {
    let mut children = Vec::new();

    for elem in query.iter() {
        if elem.field_name().starts_with('$') {
            children.push(parse_pathless_expression(elem)?);
        } else if is_expression_document(elem) {
            children.extend(parse_document_top_level(elem)?);
        } else if let Value::Regex { .. } = elem.value() {
            children.push(parse_regex_match(elem)?);
        } else {
            children.push(parse_implicit_eq(elem));
        }
    }

    if children.len() == 1 {
        Ok(children.into_iter().next().unwrap())
    } else {
        Ok(MatchExpression::Tree(TreeOp::And, children))
    }
}

fn is_dbref_document(doc: &Document) -> bool {
    doc.contains("$ref") && doc.contains("$id")
}

fn is_geo_expr(doc: &Document) -> bool {
    doc.contains("$near") || doc.contains("$nearSphere") || doc.contains("$geoNear")
}

/// An element is an "expression document" when its value is a non-empty
/// document whose first key is `$`-prefixed and it isn't DBRef-shaped
/// (`$ref`+`$id`), which is a literal value, never an operator document.
fn is_expression_document(elem: &Element) -> bool {
    match elem.value() {
        Value::Document(doc) => {
            match doc.elements().first() {
                Some(first) if first.field_name().starts_with('$') => !is_dbref_document(doc),
                _ => false,
            }
        }
        _ => false,
    }
}

fn parse_pathless_expression(elem: &Element) -> Result<MatchExpression> {
    match PATHLESS_EXPRESSIONS.get(elem.field_name()) {
        Some(f) => f(elem),
        None => {
            warn!("unrecognised top-level operator {}", elem.field_name());
            Err(Error::unknown(format!("unknown top level operator: {}", elem.field_name())))
        }
    }
}

fn parse_document_top_level(elem: &Element) -> Result<Vec<MatchExpression>> {
    let doc = match elem.value() {
        Value::Document(doc) => doc,
        _ => unreachable!("is_expression_document already checked this is a Document"),
    };

    if is_geo_expr(doc) {
        warn!("geo operator on field {} is not implemented", elem.field_name());
        return Err(Error::unimplemented("geo is not yet implemented"));
    }

    doc.iter().map(|field| parse_sub_field(elem.field_name(), field)).collect()
}

fn parse_sub_field(field_path: &str, expr: &Element) -> Result<MatchExpression> {
    if expr.field_name() == "$not" {
        return parse_sub_not(field_path, expr);
    }

    match MATCH_OPERATORS.get(expr.field_name()) {
        Some(f) => f(field_path, expr),
        None => Err(Error::shape(format!("Operator {} is not defined", expr.field_name()))),
    }
}

fn parse_sub_not(field_path: &str, expr: &Element) -> Result<MatchExpression> {
    match expr.value() {
        Value::Regex { .. } => {
            let rewritten = Element::new("$regex", expr.value().clone());
            let inner = parse_sub_field(field_path, &rewritten)?;
            Ok(MatchExpression::Not(Box::new(inner)))
        }
        Value::Document(doc) => {
            let children = doc.iter()
                .map(|field| parse_sub_field(field_path, field))
                .collect::<Result<Vec<_>>>()?;
            Ok(MatchExpression::Not(Box::new(MatchExpression::Tree(TreeOp::And, children))))
        }
        _ => Err(Error::shape("$not must take a regex or object")),
    }
}

fn parse_comparison(field_path: &str, expr: &Element, operator: MatchOperator) -> Result<MatchExpression> {
    if operator != MatchOperator::Eq {
        if let Value::Regex { .. } = expr.value() {
            return Err(Error::shape("Regex can only appear in equality comparison"));
        }
    }

    if operator == MatchOperator::In || operator == MatchOperator::Nin {
        return parse_in(field_path, expr, operator);
    }

    let predicate = Predicate::new(operator, expr.clone());
    Ok(MatchExpression::PathMatch(Path::from_str(field_path), predicate))
}

fn parse_in(field_path: &str, expr: &Element, operator: MatchOperator) -> Result<MatchExpression> {
    let arr = match expr.value() {
        Value::Array(arr) => arr,
        _ => return Err(Error::shape(format!("{} requires an array argument", operator.as_str()))),
    };

    for item in arr.iter() {
        if is_expression_document(item) {
            return Err(Error::shape(format!("{} cannot contain an operator document", operator.as_str())));
        }
    }

    let predicate = Predicate::new(MatchOperator::In, expr.clone());
    let path_match = MatchExpression::PathMatch(Path::from_str(field_path), predicate);

    match operator {
        MatchOperator::In => Ok(path_match),
        MatchOperator::Nin => Ok(MatchExpression::Not(Box::new(path_match))),
        _ => unreachable!(),
    }
}

/// Rewrites a bare regex value `{field: /re/}` to `{field: {$regex: /re/}}`
/// before handing it to the ordinary per-field dispatch.
fn parse_regex_match(elem: &Element) -> Result<MatchExpression> {
    let rewritten = Element::new("$regex", elem.value().clone());
    parse_sub_field(elem.field_name(), &rewritten)
}

fn parse_implicit_eq(elem: &Element) -> MatchExpression {
    let predicate = Predicate::new(MatchOperator::Eq, elem.clone());
    MatchExpression::PathMatch(Path::from_str(elem.field_name()), predicate)
}

fn parse_toplevel_logical(elem: &Element, op: TreeOp) -> Result<MatchExpression> {
    let arr = match elem.value() {
        Value::Array(arr) => arr,
        _ => return Err(Error::shape("Top Level Logical Expression Must Take An Array")),
    };

    let children = arr.iter()
        .map(|item| match item.value() {
            Value::Document(doc) => parse_predicate_top_level(doc),
            _ => Err(Error::shape("Top Level Logical Array Element Must Be Document")),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MatchExpression::Tree(op, children))
}

fn parse_and(elem: &Element) -> Result<MatchExpression> {
    parse_toplevel_logical(elem, TreeOp::And)
}

fn parse_or(elem: &Element) -> Result<MatchExpression> {
    parse_toplevel_logical(elem, TreeOp::Or)
}

fn parse_nor(elem: &Element) -> Result<MatchExpression> {
    parse_toplevel_logical(elem, TreeOp::Nor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Document;

    fn doc_from(pairs: Vec<(&str, Value)>) -> Document {
        Document::from_pairs(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)))
    }

    #[test]
    fn implicit_equality_single_field_collapses_to_one_path_match() {
        let query = doc_from(vec![("a", Value::Int32(1))]);
        let ast = parse_predicate_top_level(&query).unwrap();

        match ast {
            MatchExpression::PathMatch(path, predicate) => {
                assert_eq!(path.to_string(), "a");
                assert_eq!(predicate.operator, MatchOperator::Eq);
            }
            other => panic!("expected PathMatch, got {:?}", other),
        }
    }

    #[test]
    fn multiple_fields_become_an_implicit_and() {
        let query = doc_from(vec![("a", Value::Int32(1)), ("b", Value::Int32(2))]);
        let ast = parse_predicate_top_level(&query).unwrap();

        match ast {
            MatchExpression::Tree(TreeOp::And, children) => assert_eq!(children.len(), 2),
            other => panic!("expected Tree(And, _), got {:?}", other),
        }
    }

    #[test]
    fn operator_subdocument_parses_to_a_comparison() {
        let query = doc_from(vec![
            ("a", Value::Document(doc_from(vec![("$gt", Value::Int32(1))]))),
        ]);
        let ast = parse_predicate_top_level(&query).unwrap();

        match ast {
            MatchExpression::PathMatch(path, predicate) => {
                assert_eq!(path.to_string(), "a");
                assert_eq!(predicate.operator, MatchOperator::Gt);
            }
            other => panic!("expected PathMatch, got {:?}", other),
        }
    }

    #[test]
    fn nin_is_represented_as_not_of_in() {
        let arg = Value::Array(Document::from_values(vec![Value::Int32(1), Value::Int32(2)]));
        let query = doc_from(vec![("a", Value::Document(doc_from(vec![("$nin", arg)])))]);
        let ast = parse_predicate_top_level(&query).unwrap();

        match ast {
            MatchExpression::Not(inner) => match *inner {
                MatchExpression::PathMatch(_, predicate) => {
                    assert_eq!(predicate.operator, MatchOperator::In);
                }
                other => panic!("expected PathMatch inside Not, got {:?}", other),
            },
            other => panic!("expected Not, got {:?}", other),
        }
    }

    #[test]
    fn pathless_and_requires_an_array_of_documents() {
        let query = doc_from(vec![("$and", Value::Int32(1))]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.message(), "Top Level Logical Expression Must Take An Array");
    }

    #[test]
    fn pathless_and_parses_each_array_element_as_a_full_query() {
        let clause_a = Value::Document(doc_from(vec![("a", Value::Int32(1))]));
        let clause_b = Value::Document(doc_from(vec![("b", Value::Int32(2))]));
        let query = doc_from(vec![("$and", Value::Array(Document::from_values(vec![clause_a, clause_b])))]);

        let ast = parse_predicate_top_level(&query).unwrap();
        match ast {
            MatchExpression::Tree(TreeOp::And, children) => assert_eq!(children.len(), 2),
            other => panic!("expected Tree(And, _), got {:?}", other),
        }
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let query = doc_from(vec![
            ("a", Value::Document(doc_from(vec![("$bogus", Value::Int32(1))]))),
        ]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.message(), "Operator $bogus is not defined");
    }

    #[test]
    fn unknown_pathless_operator_is_rejected() {
        let query = doc_from(vec![("$bogus", Value::Int32(1))]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.message(), "unknown top level operator: $bogus");
    }

    #[test]
    fn not_wraps_a_regex_shorthand() {
        let regex = Value::Regex { pattern: "^a".to_owned(), options: String::new() };
        let query = doc_from(vec![("a", Value::Document(doc_from(vec![("$not", regex)])))]);

        let ast = parse_predicate_top_level(&query).unwrap();
        match ast {
            MatchExpression::Not(inner) => match *inner {
                MatchExpression::PathMatch(_, predicate) => {
                    assert_eq!(predicate.operator, MatchOperator::Regex);
                }
                other => panic!("expected PathMatch inside Not, got {:?}", other),
            },
            other => panic!("expected Not, got {:?}", other),
        }
    }

    #[test]
    fn not_rejects_scalar_argument() {
        let query = doc_from(vec![("a", Value::Document(doc_from(vec![("$not", Value::Int32(1))])))]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.message(), "$not must take a regex or object");
    }

    #[test]
    fn dbref_shaped_document_is_treated_as_a_literal_value() {
        let dbref = doc_from(vec![("$ref", Value::Str("things".to_owned())), ("$id", Value::Int32(1))]);
        let query = doc_from(vec![("a", Value::Document(dbref))]);

        let ast = parse_predicate_top_level(&query).unwrap();
        match ast {
            MatchExpression::PathMatch(_, predicate) => assert_eq!(predicate.operator, MatchOperator::Eq),
            other => panic!("expected PathMatch, got {:?}", other),
        }
    }

    #[test]
    fn regex_rejected_outside_equality() {
        let regex = Value::Regex { pattern: "^a".to_owned(), options: String::new() };
        let query = doc_from(vec![("a", Value::Document(doc_from(vec![("$gt", regex)])))]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.message(), "Regex can only appear in equality comparison");
    }

    #[test]
    fn geo_operator_is_an_explicit_unimplemented_stub() {
        let near = doc_from(vec![("$near", Value::Array(Document::from_values(vec![Value::Int32(0), Value::Int32(0)])))]);
        let query = doc_from(vec![("loc", Value::Document(near))]);
        let err = parse_predicate_top_level(&query).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unimplemented);
    }
}
