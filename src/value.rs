//! The typed value model: tags, values, elements, and ordered documents.
//!
//! A `Document` and an `Array` share the exact same representation (an
//! ordered list of `Element`s); only the wrapping `Value` variant and the
//! naming convention of the field names ("0", "1", ... for arrays) tell them
//! apart, matching the on-wire BSON convention.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;

use serde::ser::{ Serialize, Serializer, SerializeMap, SerializeSeq };
use serde_json::Value as Json;

/// The on-wire type tag. Numeric codes are fixed by the binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Tag {
    MinKey        = -1,
    Eoo           = 0,
    Number        = 1,
    String        = 2,
    Document      = 3,
    Array         = 4,
    Binary        = 5,
    Undefined     = 6,
    ObjectId      = 7,
    Boolean       = 8,
    DateTime      = 9,
    Null          = 10,
    Regex         = 11,
    DbRef         = 12,
    Code          = 13,
    Symbol        = 14,
    CodeWithScope = 15,
    Int32         = 16,
    Timestamp     = 17,
    Int64         = 18,
    Decimal128    = 19,
    MaxKey        = 127,
}

impl Tag {
    /// Recovers a `Tag` from its on-wire numeric code, if it names one we know.
    pub fn from_code(code: i8) -> Option<Tag> {
        use self::Tag::*;

        Some(match code {
            -1  => MinKey,
            0   => Eoo,
            1   => Number,
            2   => String,
            3   => Document,
            4   => Array,
            5   => Binary,
            6   => Undefined,
            7   => ObjectId,
            8   => Boolean,
            9   => DateTime,
            10  => Null,
            11  => Regex,
            12  => DbRef,
            13  => Code,
            14  => Symbol,
            15  => CodeWithScope,
            16  => Int32,
            17  => Timestamp,
            18  => Int64,
            19  => Decimal128,
            127 => MaxKey,
            _   => return None,
        })
    }

    /// The on-wire numeric code for this tag.
    pub fn code(self) -> i8 {
        self as i8
    }
}

/// A tagged value. `Eoo` is the "missing field" sentinel, distinct from `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    MinKey,
    /// Sentinel meaning "this field is absent", never stored on the wire as data.
    Eoo,
    Number(f64),
    Str(String),
    Document(Document),
    Array(Array),
    Binary { subtype: u8, data: Vec<u8> },
    Undefined,
    ObjectId([u8; 12]),
    Boolean(bool),
    DateTime(i64),
    Null,
    Regex { pattern: String, options: String },
    DbRef(Document),
    Code(String),
    Symbol(String),
    CodeWithScope { code: String, scope: Document },
    Int32(i32),
    Timestamp(u64),
    Int64(i64),
    Decimal128([u8; 16]),
    MaxKey,
}

impl Value {
    /// The tag that would be written for this value on the wire.
    pub fn tag(&self) -> Tag {
        use self::Value::*;

        match *self {
            MinKey => Tag::MinKey,
            Eoo => Tag::Eoo,
            Number(_) => Tag::Number,
            Str(_) => Tag::String,
            Document(_) => Tag::Document,
            Array(_) => Tag::Array,
            Binary { .. } => Tag::Binary,
            Undefined => Tag::Undefined,
            ObjectId(_) => Tag::ObjectId,
            Boolean(_) => Tag::Boolean,
            DateTime(_) => Tag::DateTime,
            Null => Tag::Null,
            Regex { .. } => Tag::Regex,
            DbRef(_) => Tag::DbRef,
            Code(_) => Tag::Code,
            Symbol(_) => Tag::Symbol,
            CodeWithScope { .. } => Tag::CodeWithScope,
            Int32(_) => Tag::Int32,
            Timestamp(_) => Tag::Timestamp,
            Int64(_) => Tag::Int64,
            Decimal128(_) => Tag::Decimal128,
            MaxKey => Tag::MaxKey,
        }
    }

    /// `true` for the missing-field sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(*self, Value::Eoo)
    }

    /// Borrows the underlying document/array, treating both tags uniformly.
    ///
    /// Mirrors the original's `BSONValue.doc()`: callers that only care about
    /// "a sequence of elements" don't need to match `Document` vs `Array`.
    pub fn as_element_list(&self) -> Option<&Document> {
        match *self {
            Value::Document(ref doc) => Some(doc),
            Value::Array(ref arr) => Some(arr),
            _ => None,
        }
    }

    /// Constructs a `Value` from a JSON-like literal: maps become documents,
    /// lists become arrays (indexed `"0".."n-1"`), whole numbers become
    /// `Int32`, fractional numbers become `Number`, and so on. An explicit
    /// `tag_hint` overrides the inferred tag, coercing the literal's payload
    /// into that shape.
    pub fn from_json(json: &Json) -> Value {
        match *json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(ref n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
                        Value::Int32(i as i32)
                    } else {
                        Value::Int64(i)
                    }
                } else if let Some(u) = n.as_u64() {
                    Value::Int64(u as i64)
                } else {
                    Value::Number(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(ref s) => Value::Str(s.clone()),
            Json::Array(ref items) => {
                Value::Array(Document::from_values(items.iter().map(Value::from_json)))
            }
            Json::Object(ref map) => {
                Value::Document(Document::from_pairs(
                    map.iter().map(|(k, v)| (k.clone(), Value::from_json(v)))
                ))
            }
        }
    }

    /// Constructs a `Value` from a JSON-like literal under an explicit tag hint.
    pub fn from_json_hinted(json: &Json, tag_hint: Tag) -> Value {
        match tag_hint {
            Tag::Number => Value::Number(json.as_f64().unwrap_or(0.0)),
            Tag::Int32 => Value::Int32(json.as_i64().unwrap_or(0) as i32),
            Tag::Int64 => Value::Int64(json.as_i64().unwrap_or(0)),
            Tag::String => Value::Str(json.as_str().unwrap_or_default().to_owned()),
            Tag::Boolean => Value::Boolean(json.as_bool().unwrap_or(false)),
            Tag::Null => Value::Null,
            _ => Value::from_json(json),
        }
    }
}

/// `Value::from(some_native_value)` convenience conversions for the common
/// scalar types, so callers building values by hand don't need to spell out
/// the variant name every time.
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int32(v) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int64(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Number(v) } }
impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::Str(v) } }
impl<'a> From<&'a str> for Value { fn from(v: &'a str) -> Self { Value::Str(v.to_owned()) } }
impl From<Document> for Value { fn from(v: Document) -> Self { Value::Document(v) } }

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use self::Value::*;

        match *self {
            MinKey => serializer.serialize_str("$minKey"),
            Eoo => serializer.serialize_none(),
            Number(n) => serializer.serialize_f64(n),
            Str(ref s) => serializer.serialize_str(s),
            Document(ref doc) => doc.serialize(serializer),
            Array(ref arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for elem in arr.iter() {
                    seq.serialize_element(elem.value())?;
                }
                seq.end()
            }
            Binary { subtype, ref data } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$binary", data)?;
                map.serialize_entry("$type", &subtype)?;
                map.end()
            }
            Undefined => serializer.serialize_none(),
            ObjectId(ref bytes) => {
                let hex = bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$oid", &hex)?;
                map.end()
            }
            Boolean(b) => serializer.serialize_bool(b),
            DateTime(millis) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$date", &millis)?;
                map.end()
            }
            Null => serializer.serialize_none(),
            Regex { ref pattern, ref options } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$regex", pattern)?;
                map.serialize_entry("$options", options)?;
                map.end()
            }
            DbRef(ref doc) => doc.serialize(serializer),
            Code(ref s) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$code", s)?;
                map.end()
            }
            Symbol(ref s) => serializer.serialize_str(s),
            CodeWithScope { ref code, ref scope } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$code", code)?;
                map.serialize_entry("$scope", scope)?;
                map.end()
            }
            Int32(n) => serializer.serialize_i32(n),
            Timestamp(t) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$timestamp", &t)?;
                map.end()
            }
            Int64(n) => serializer.serialize_i64(n),
            Decimal128(ref bytes) => {
                let hex = bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$numberDecimal", &hex)?;
                map.end()
            }
            MaxKey => serializer.serialize_str("$maxKey"),
        }
    }
}

/// A `(fieldName, Value)` pair; the unit stored inside documents and arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    field_name: String,
    value: Value,
}

impl Element {
    /// Constructs a new element.
    pub fn new<S: Into<String>>(field_name: S, value: Value) -> Self {
        Element { field_name: field_name.into(), value }
    }

    /// The missing-field sentinel element (empty name, `Value::Eoo`).
    pub fn eoo() -> Self {
        Element { field_name: String::new(), value: Value::Eoo }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_missing()
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

/// An ordered sequence of [`Element`]s. Used both for documents (field names
/// are arbitrary) and arrays (field names are decimal indices); see the
/// module docs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    elements: Vec<Element>,
}

/// Arrays share `Document`'s representation exactly: the same ordered
/// `Element` list, distinguished only by the wrapping `Value::Array` tag.
pub type Array = Document;

impl Document {
    pub fn new() -> Self {
        Document { elements: Vec::new() }
    }

    /// Builds a document from an ordered list of `(name, value)` pairs.
    pub fn from_pairs<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
        let elements = pairs.into_iter().map(|(name, value)| Element::new(name, value)).collect();
        Document { elements }
    }

    /// Builds an array-shaped document from a list of values, assigning
    /// decimal string indices `"0", "1", ...` as field names.
    pub fn from_values<I: IntoIterator<Item = Value>>(values: I) -> Self {
        let elements = values.into_iter()
            .enumerate()
            .map(|(i, value)| Element::new(i.to_string(), value))
            .collect();
        Document { elements }
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Appends a `(name, value)` pair.
    pub fn insert<S: Into<String>>(&mut self, name: S, value: Value) {
        self.push(Element::new(name, value));
    }

    /// Returns the first element with the given field name, if any.
    /// Duplicate field names are preserved on the wire; lookup always
    /// returns the first match.
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.field_name() == name)
    }

    /// Looks up an array element by its decimal index.
    pub fn get_index(&self, index: usize) -> Option<&Element> {
        self.get(&index.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Element> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for elem in self.iter() {
            map.serialize_entry(elem.field_name(), elem.value())?;
        }
        map.end()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, elem) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", elem.field_name(), elem.value())?;
        }
        write!(f, "}}")
    }
}

/// Three-valued numeric comparison: `Some(-1|0|1)` only when both values are
/// numeric (`Number`, `Int32`, or `Int64`, cross-compared by mathematical
/// value); `None` for every other pair of tags. Symmetric and transitive
/// over the numeric subset.
pub fn compare(a: &Element, b: &Element) -> Option<i32> {
    let x = numeric_value(a.value())?;
    let y = numeric_value(b.value())?;

    Some(match x.partial_cmp(&y)? {
        CmpOrdering::Less => -1,
        CmpOrdering::Equal => 0,
        CmpOrdering::Greater => 1,
    })
}

fn numeric_value(value: &Value) -> Option<f64> {
    match *value {
        Value::Number(n) => Some(n),
        Value::Int32(n) => Some(f64::from(n)),
        Value::Int64(n) => Some(n as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lookup_returns_first_duplicate() {
        let mut doc = Document::new();
        doc.insert("a", Value::Int32(1));
        doc.insert("a", Value::Int32(2));

        assert_eq!(doc.get("a").unwrap().value(), &Value::Int32(1));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn from_json_infers_int32_for_whole_numbers() {
        let json: Json = serde_json::from_str("42").unwrap();
        assert_eq!(Value::from_json(&json), Value::Int32(42));
    }

    #[test]
    fn from_json_infers_number_for_fractional() {
        let json: Json = serde_json::from_str("4.5").unwrap();
        assert_eq!(Value::from_json(&json), Value::Number(4.5));
    }

    #[test]
    fn from_json_builds_array_with_decimal_indices() {
        let json: Json = serde_json::from_str("[7,8]").unwrap();
        let value = Value::from_json(&json);

        match value {
            Value::Array(arr) => {
                assert_eq!(arr.get_index(0).unwrap().value(), &Value::Int32(7));
                assert_eq!(arr.get_index(1).unwrap().value(), &Value::Int32(8));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn compare_is_symmetric_and_transitive_over_numerics() {
        let a = Element::new("a", Value::Int32(1));
        let b = Element::new("b", Value::Number(2.0));
        let c = Element::new("c", Value::Int64(3));

        assert_eq!(compare(&a, &b), Some(-1));
        assert_eq!(compare(&b, &a), Some(1));
        assert!(compare(&a, &c).unwrap() < 0);
    }

    #[test]
    fn compare_returns_none_for_incomparable_tags() {
        let a = Element::new("a", Value::Int32(1));
        let b = Element::new("b", Value::Str("1".to_owned()));

        assert_eq!(compare(&a, &b), None);
    }

    #[test]
    fn tag_round_trips_through_code() {
        for tag in &[Tag::MinKey, Tag::Eoo, Tag::Number, Tag::Decimal128, Tag::MaxKey] {
            assert_eq!(Tag::from_code(tag.code()), Some(*tag));
        }
    }
}
