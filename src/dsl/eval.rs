//! Evaluates a [`MatchExpression`] against a document.
//!
//! The only nontrivial part is path iteration: a dotted path walks through
//! documents field by field, but the moment it meets an array it has to
//! decide whether the next segment is a numeric index (descend into that
//! one element) or an ordinary field name (implicitly fan out across every
//! document in the array and collect from each). `iter_path`/`iter_array`
//! below are a direct port of that algorithm; nothing here ever panics or
//! returns an error; an expression simply matches or it doesn't.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::dsl::ast::{MatchExpression, MatchOperator, Predicate, TreeOp};
use crate::value::{compare, Document, Element, Value};

type OperatorLogic = fn(&Element, &Element, Option<&Document>) -> bool;

lazy_static! {
    static ref OPERATOR_LOGIC: HashMap<MatchOperator, OperatorLogic> = {
        let mut m: HashMap<MatchOperator, OperatorLogic> = HashMap::new();
        m.insert(MatchOperator::Eq, op_eq as OperatorLogic);
        m.insert(MatchOperator::Lt, op_lt as OperatorLogic);
        m.insert(MatchOperator::Lte, op_lte as OperatorLogic);
        m.insert(MatchOperator::Gt, op_gt as OperatorLogic);
        m.insert(MatchOperator::Gte, op_gte as OperatorLogic);
        m.insert(MatchOperator::In, op_in as OperatorLogic);
        m.insert(MatchOperator::Nin, op_nin as OperatorLogic);
        m.insert(MatchOperator::Regex, op_stub_false as OperatorLogic);
        m.insert(MatchOperator::Near, op_stub_false as OperatorLogic);
        m.insert(MatchOperator::NearSphere, op_stub_false as OperatorLogic);
        m.insert(MatchOperator::GeoNear, op_stub_false as OperatorLogic);
        m
    };
}

fn op_eq(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    compare(elem, arg).map_or(false, |c| c == 0)
}

fn op_lt(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    compare(elem, arg).map_or(false, |c| c < 0)
}

fn op_lte(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    compare(elem, arg).map_or(false, |c| c <= 0)
}

fn op_gt(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    compare(elem, arg).map_or(false, |c| c > 0)
}

fn op_gte(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    compare(elem, arg).map_or(false, |c| c >= 0)
}

/// `$in`: array membership, with the MongoDB-specific rule that a missing
/// field (EOO) matches if `null` appears among the candidates, and a regex
/// candidate never matches a value (regex-in-`$in` is a stub, same as a
/// bare `$regex` predicate).
fn op_in(elem: &Element, arg: &Element, _named: Option<&Document>) -> bool {
    let candidates = match arg.value() {
        Value::Array(arr) => arr,
        _ => return false,
    };

    if elem.is_missing() {
        return candidates.iter().any(|c| matches!(c.value(), Value::Null));
    }

    candidates.iter().any(|c| {
        if let Value::Regex { .. } = c.value() {
            false
        } else {
            compare(elem, c).map_or(false, |cmp| cmp == 0)
        }
    })
}

fn op_nin(elem: &Element, arg: &Element, named: Option<&Document>) -> bool {
    !op_in(elem, arg, named)
}

fn op_stub_false(_elem: &Element, _arg: &Element, _named: Option<&Document>) -> bool {
    false
}

fn eval_predicate(predicate: &Predicate, elem: &Element) -> bool {
    let logic = OPERATOR_LOGIC.get(&predicate.operator)
        .expect("OPERATOR_LOGIC covers every MatchOperator variant");
    logic(elem, &predicate.argument, predicate.named_arguments.as_ref())
}

/// Evaluates `expr` against `document`.
pub fn matches(expr: &MatchExpression, document: &Document) -> bool {
    match expr {
        MatchExpression::PathMatch(path, predicate) => {
            let leaves = iter_path(path, document);
            if leaves.is_empty() {
                // iter_path never yields an EOO leaf (it reports "no leaves" instead),
                // but a missing field is still a value as far as the predicate is
                // concerned -- $in must see it to match against null.
                eval_predicate(predicate, &Element::eoo())
            } else {
                leaves.iter().any(|leaf| eval_predicate(predicate, leaf))
            }
        }
        MatchExpression::Tree(op, children) => eval_tree(*op, children, document),
        MatchExpression::Not(inner) => !matches(inner, document),
    }
}

fn eval_tree(op: TreeOp, children: &[MatchExpression], document: &Document) -> bool {
    match op {
        TreeOp::And => children.iter().all(|c| matches(c, document)),
        TreeOp::Or => children.iter().any(|c| matches(c, document)),
        TreeOp::Nor => !children.iter().any(|c| matches(c, document)),
    }
}

/// Walks `path` through `document`, returning every leaf element the path
/// reaches. An empty result means the path denotes a missing (EOO) field;
/// a non-empty result may hold more than one element when the path passes
/// through an array (implicit fan-out) or terminates on one (leaf unwind).
pub fn iter_path(path: &crate::path::Path, document: &Document) -> Vec<Element> {
    if path.is_empty() {
        return vec![Element::new(String::new(), Value::Document(document.clone()))];
    }

    let head = match path.head() {
        Some(h) => h,
        None => return vec![],
    };

    let next = match document.get(head) {
        Some(e) => e,
        None => return vec![],
    };

    iter_path_value(&path.tail(), Some(next.value()))
}

fn iter_path_value(path: &crate::path::Path, node: Option<&Value>) -> Vec<Element> {
    let value = match node {
        Some(v) => v,
        None => return vec![],
    };

    if path.is_empty() {
        return unwind_terminal(value);
    }

    match value {
        Value::Document(_) | Value::Array(_) => {}
        _ => return vec![],
    }

    let mut path = path.clone();
    let mut value = value;

    loop {
        if path.is_empty() {
            break;
        }
        match value {
            Value::Document(doc) => {
                let head = path.head().unwrap();
                match doc.get(head) {
                    None => return vec![],
                    Some(elem) => {
                        value = elem.value();
                        path = path.tail();
                    }
                }
            }
            _ => break,
        }
    }

    if path.is_empty() {
        return unwind_terminal(value);
    }

    match value {
        Value::Array(arr) => iter_array(&path, arr),
        _ => vec![],
    }
}

/// Terminal unwind: an `Array` spreads into its elements (implicit
/// leaf-array unwind), anything else is the single matched element.
fn unwind_terminal(value: &Value) -> Vec<Element> {
    match value {
        Value::Array(arr) => arr.iter().cloned().collect(),
        other => vec![Element::new(String::new(), other.clone())],
    }
}

/// Applies the remaining `path` to an array. A decimal-digit head indexes
/// into the array by position; any other head implicitly fans out across
/// every document element of the array.
fn iter_array(path: &crate::path::Path, arr: &Document) -> Vec<Element> {
    let head = path.head().expect("iter_array called with an empty path");

    if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
        let index: usize = match head.parse() {
            Ok(i) => i,
            Err(_) => return vec![],
        };
        let elem = match arr.get_index(index) {
            Some(e) => e,
            None => return vec![],
        };

        let rest = path.tail();
        if rest.is_empty() {
            return vec![elem.clone()];
        }

        match elem.value() {
            Value::Document(_) => iter_path_value(&rest, Some(elem.value())),
            Value::Array(inner) => {
                inner.iter().flat_map(|child| iter_path_value(&rest, Some(child.value()))).collect()
            }
            _ => vec![],
        }
    } else {
        arr.iter()
            .filter(|elem| matches!(elem.value(), Value::Document(_)))
            .flat_map(|elem| iter_path_value(path, Some(elem.value())))
            .collect()
    }
}
