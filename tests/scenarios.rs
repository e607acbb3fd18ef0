//! End-to-end scenarios exercising the parser, evaluator, and codec together.

use docquery::prelude::*;

fn doc(pairs: Vec<(&str, Value)>) -> Document {
    Document::from_pairs(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)))
}

fn eval(query: &Document, document: &Document) -> bool {
    matches(&parse_predicate_top_level(query).unwrap(), document)
}

#[test]
fn s1_compound_field_and_operator_query() {
    let query = doc(vec![
        ("a", Value::Int32(1)),
        ("b", Value::Document(doc(vec![("$gt", Value::Int32(1))]))),
    ]);

    assert!(!eval(&query, &doc(vec![("a", Value::Int32(1))])));
    assert!(!eval(&query, &doc(vec![("b", Value::Int32(2))])));
    assert!(eval(&query, &doc(vec![("a", Value::Int32(1)), ("b", Value::Int32(2))])));
    assert!(!eval(&query, &doc(vec![("a", Value::Int32(1)), ("c", Value::Int32(3))])));
    assert!(eval(&query, &doc(vec![
        ("a", Value::Int32(1)), ("b", Value::Int32(3)), ("c", Value::Int32(3)),
    ])));
    assert!(!eval(&query, &doc(vec![
        ("a", Value::Int32(1)), ("d", Value::Document(doc(vec![("e", Value::Int32(4))]))),
    ])));
}

#[test]
fn s2_or_across_two_fields() {
    let clause_a = Value::Document(doc(vec![("a", Value::Int32(1))]));
    let clause_b = Value::Document(doc(vec![("b", Value::Int32(2))]));
    let query = doc(vec![("$or", Value::Array(Document::from_values(vec![clause_a, clause_b])))]);

    assert!(eval(&query, &doc(vec![("a", Value::Int32(2)), ("b", Value::Int32(2))])));
    assert!(!eval(&query, &doc(vec![("a", Value::Int32(2)), ("b", Value::Int32(3))])));
}

#[test]
fn s3_path_traversal_through_arrays() {
    let query = doc(vec![("a.b", Value::Int32(1))]);

    let nested = doc(vec![("a", Value::Document(doc(vec![("b", Value::Int32(1))])))]);
    assert!(eval(&query, &nested));

    let array_of_docs_matching = doc(vec![(
        "a",
        Value::Array(Document::from_values(vec![
            Value::Document(doc(vec![("b", Value::Int32(1))])),
            Value::Document(doc(vec![("b", Value::Int32(2))])),
        ])),
    )]);
    assert!(eval(&query, &array_of_docs_matching));

    let array_of_docs_not_matching = doc(vec![(
        "a",
        Value::Array(Document::from_values(vec![Value::Document(doc(vec![("b", Value::Int32(2))]))])),
    )]);
    assert!(!eval(&query, &array_of_docs_not_matching));

    let leaf_array_unwind = doc(vec![(
        "a",
        Value::Array(Document::from_values(vec![Value::Document(doc(vec![(
            "b",
            Value::Array(Document::from_values(vec![Value::Int32(1), Value::Int32(2)])),
        )]))])),
    )]);
    assert!(eval(&query, &leaf_array_unwind));
}

#[test]
fn s4_array_offset() {
    let query = doc(vec![("a.0", Value::Int32(7))]);

    let seven_eight = doc(vec![("a", Value::Array(Document::from_values(vec![
        Value::Int32(7), Value::Int32(8),
    ])))]);
    assert!(eval(&query, &seven_eight));

    let eight_seven = doc(vec![("a", Value::Array(Document::from_values(vec![
        Value::Int32(8), Value::Int32(7),
    ])))]);
    assert!(!eval(&query, &eight_seven));
}

#[test]
fn s5_in_with_null_and_missing() {
    let candidates = Value::Array(Document::from_values(vec![
        Value::Int32(1), Value::Int32(2), Value::Null,
    ]));
    let query = doc(vec![("a", Value::Document(doc(vec![("$in", candidates)])))]);

    assert!(eval(&query, &Document::new()));
    assert!(!eval(&query, &doc(vec![("a", Value::Int32(3))])));
    assert!(eval(&query, &doc(vec![("a", Value::Int32(2))])));
}

#[test]
fn s6_binary_round_trip() {
    let bytes: &[u8] = &[
        0x0E, 0x00, 0x00, 0x00,
        0x02, b'A', 0x00,
        0x02, 0x00, 0x00, 0x00, b'A', 0x00,
        0x00,
    ];

    let (decoded, rest) = decode_document(bytes).unwrap();
    assert!(rest.is_empty());
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded.get("A").unwrap().value(), &Value::Str("A".to_owned()));
    assert_eq!(encode_document(&decoded), bytes);
}
