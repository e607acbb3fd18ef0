//! The binary document codec: a length-prefixed, tag-dispatched parser
//! producing the [`Value`] model, plus its inverse encoder.
//!
//! Byte order is little-endian throughout. The tag→payload-parser table is
//! built once, at first use, via `lazy_static` and never mutated afterwards.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::error::{ Error, Result };
use crate::value::{ Document, Element, Tag, Value };

/// A cursor over a byte slice, tracking how far it has advanced for error
/// messages.
pub struct Reader<'a> {
    offset: usize,
    remaining: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Reader { offset: 0, remaining: input }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining.len() < n {
            return Err(Error::insufficient_input(format!(
                "expected {} bytes at offset {}, found {}", n, self.offset, self.remaining.len()
            )));
        }

        let (head, tail) = self.remaining.split_at(n);
        self.offset += n;
        self.remaining = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(f64::from_le_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? == 0x01)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Reads a NUL-terminated `cstring`, stopping at (and consuming) the NUL.
    pub fn read_cstr(&mut self) -> Result<String> {
        let nul = self.remaining.iter().position(|&b| b == 0)
            .ok_or_else(|| Error::malformed("unterminated cstring"))?;
        let bytes = self.take(nul + 1)?;

        std::str::from_utf8(&bytes[..nul])
            .map(str::to_owned)
            .map_err(|_| Error::malformed("invalid utf-8 in cstring"))
    }

    fn read_length(&mut self) -> Result<usize> {
        let raw = self.read_i32()?;
        if raw < 0 {
            return Err(Error::malformed(format!("negative length prefix: {}", raw)));
        }
        Ok(raw as usize)
    }

    /// Reads a BSON `string`: `int32 length` (length includes the trailing
    /// NUL) then `length` bytes.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_length()?;
        if len == 0 {
            return Err(Error::malformed("string length must include a trailing NUL"));
        }

        let bytes = self.take(len)?;
        if bytes[len - 1] != 0 {
            return Err(Error::malformed("string is missing its trailing NUL"));
        }

        std::str::from_utf8(&bytes[..len - 1])
            .map(str::to_owned)
            .map_err(|_| Error::malformed("invalid utf-8 in string"))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a 4-byte little-endian `i32` without consuming it.
    pub fn peek_i32(&mut self) -> Result<i32> {
        if self.remaining.len() < 4 {
            return Err(Error::insufficient_input(format!(
                "expected 4 bytes at offset {}, found {}", self.offset, self.remaining.len()
            )));
        }
        let b = &self.remaining[..4];
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Advances past `n` already-inspected bytes (e.g. ones read via a
    /// sub-`Reader` borrowed from `remaining()`).
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

type TagParser = for<'a> fn(&mut Reader<'a>) -> Result<Value>;

lazy_static! {
    /// The tag-dispatch table: a frozen map from on-wire tag code to the
    /// function that decodes that tag's payload. Populated once, read-only
    /// thereafter.
    static ref TAG_PARSERS: HashMap<i8, TagParser> = {
        let mut m: HashMap<i8, TagParser> = HashMap::new();
        m.insert(Tag::MinKey.code(), parse_minkey);
        m.insert(Tag::Number.code(), parse_number);
        m.insert(Tag::String.code(), parse_string);
        m.insert(Tag::Document.code(), parse_document);
        m.insert(Tag::Array.code(), parse_array);
        m.insert(Tag::Binary.code(), parse_binary);
        m.insert(Tag::Undefined.code(), parse_undefined);
        m.insert(Tag::ObjectId.code(), parse_object_id);
        m.insert(Tag::Boolean.code(), parse_boolean);
        m.insert(Tag::DateTime.code(), parse_datetime);
        m.insert(Tag::Null.code(), parse_null);
        m.insert(Tag::Regex.code(), parse_regex);
        m.insert(Tag::DbRef.code(), parse_dbref);
        m.insert(Tag::Code.code(), parse_code);
        m.insert(Tag::Symbol.code(), parse_symbol);
        m.insert(Tag::CodeWithScope.code(), parse_code_with_scope);
        m.insert(Tag::Int32.code(), parse_int32);
        m.insert(Tag::Timestamp.code(), parse_timestamp);
        m.insert(Tag::Int64.code(), parse_int64);
        m.insert(Tag::Decimal128.code(), parse_decimal128);
        m.insert(Tag::MaxKey.code(), parse_maxkey);
        m
    };
}

fn parse_minkey(_r: &mut Reader) -> Result<Value> { Ok(Value::MinKey) }
fn parse_number(r: &mut Reader) -> Result<Value> { Ok(Value::Number(r.read_f64()?)) }
fn parse_string(r: &mut Reader) -> Result<Value> { Ok(Value::Str(r.read_string()?)) }

fn parse_document(r: &mut Reader) -> Result<Value> {
    Ok(Value::Document(decode_document_body(r)?))
}

fn parse_array(r: &mut Reader) -> Result<Value> {
    Ok(Value::Array(decode_document_body(r)?))
}

fn parse_binary(r: &mut Reader) -> Result<Value> {
    let len = r.read_i32()?;
    if len < 0 {
        return Err(Error::malformed(format!("negative binary length: {}", len)));
    }
    let subtype = r.read_u8()?;
    let data = r.read_bytes(len as usize)?.to_vec();
    Ok(Value::Binary { subtype, data })
}

fn parse_undefined(_r: &mut Reader) -> Result<Value> { Ok(Value::Undefined) }

fn parse_object_id(r: &mut Reader) -> Result<Value> {
    let bytes = r.read_bytes(12)?;
    let mut oid = [0u8; 12];
    oid.copy_from_slice(bytes);
    Ok(Value::ObjectId(oid))
}

fn parse_boolean(r: &mut Reader) -> Result<Value> { Ok(Value::Boolean(r.read_bool()?)) }
fn parse_datetime(r: &mut Reader) -> Result<Value> { Ok(Value::DateTime(r.read_i64()?)) }
fn parse_null(_r: &mut Reader) -> Result<Value> { Ok(Value::Null) }

fn parse_regex(r: &mut Reader) -> Result<Value> {
    let pattern = r.read_cstr()?;
    let options = r.read_cstr()?;
    Ok(Value::Regex { pattern, options })
}

/// Legacy DBPointer wire format: `string namespace` then a 12-byte ObjectId.
/// Surfaced as a `DbRef` document with `$ref`/`$id` fields, matching how the
/// match parser recognises DBRef-shaped documents.
fn parse_dbref(r: &mut Reader) -> Result<Value> {
    let namespace = r.read_string()?;
    let oid_bytes = r.read_bytes(12)?;
    let mut oid = [0u8; 12];
    oid.copy_from_slice(oid_bytes);

    let mut doc = Document::new();
    doc.insert("$ref", Value::Str(namespace));
    doc.insert("$id", Value::ObjectId(oid));
    Ok(Value::DbRef(doc))
}

fn parse_code(r: &mut Reader) -> Result<Value> { Ok(Value::Code(r.read_string()?)) }
fn parse_symbol(r: &mut Reader) -> Result<Value> { Ok(Value::Symbol(r.read_string()?)) }

fn parse_code_with_scope(r: &mut Reader) -> Result<Value> {
    let _total_size = r.read_i32()?;
    let code = r.read_string()?;
    let scope = decode_document_body(r)?;
    Ok(Value::CodeWithScope { code, scope })
}

fn parse_int32(r: &mut Reader) -> Result<Value> { Ok(Value::Int32(r.read_i32()?)) }
fn parse_timestamp(r: &mut Reader) -> Result<Value> { Ok(Value::Timestamp(r.read_u64()?)) }
fn parse_int64(r: &mut Reader) -> Result<Value> { Ok(Value::Int64(r.read_i64()?)) }

fn parse_decimal128(r: &mut Reader) -> Result<Value> {
    let bytes = r.read_bytes(16)?;
    let mut d = [0u8; 16];
    d.copy_from_slice(bytes);
    Ok(Value::Decimal128(d))
}

fn parse_maxkey(_r: &mut Reader) -> Result<Value> { Ok(Value::MaxKey) }

fn decode_element(r: &mut Reader) -> Result<Element> {
    let tag_byte = r.read_u8()? as i8;
    let tag = Tag::from_code(tag_byte)
        .ok_or_else(|| Error::unknown(format!("undefined tag: {}", tag_byte)))?;
    let field_name = r.read_cstr()?;

    let parser = TAG_PARSERS.get(&tag.code())
        .expect("tag dispatch table is missing an entry for a known Tag variant");
    let value = parser(r)?;

    Ok(Element::new(field_name, value))
}

/// Decodes a document body (everything after the already-consumed leading
/// `int32 size`) given a reader positioned at that size prefix. Shared by
/// the top-level entry point and by the `Document`/`Array`/`CodeWithScope`
/// payload parsers, since nested documents carry their own size prefix.
fn decode_document_body(r: &mut Reader) -> Result<Document> {
    let total_size = r.read_i32()?;
    if total_size < 5 {
        return Err(Error::malformed(format!(
            "declared document size {} is smaller than the 5-byte minimum", total_size
        )));
    }

    let body_len = total_size as usize - 4;
    let body_bytes = r.read_bytes(body_len)?;
    let mut body = Reader::new(body_bytes);

    let mut doc = Document::new();
    loop {
        match body.remaining().first() {
            None => return Err(Error::malformed("document is missing its trailing EOO byte")),
            Some(0) => {
                body.read_u8()?;
                break;
            }
            Some(_) => doc.push(decode_element(&mut body)?),
        }
    }

    if !body.remaining().is_empty() {
        return Err(Error::malformed("trailing bytes after a document's EOO"));
    }

    Ok(doc)
}

/// Decodes a single document from `bytes`, returning it along with whatever
/// bytes remain unconsumed -- callers can stream multiple documents back to
/// back (e.g. a `DocumentSequence` section).
pub fn decode_document(bytes: &[u8]) -> Result<(Document, &[u8])> {
    let mut r = Reader::new(bytes);
    let doc = decode_document_body(&mut r)?;
    Ok((doc, r.remaining()))
}

/// Encodes a document to its on-wire byte representation. The inverse of
/// [`decode_document`].
pub fn encode_document(doc: &Document) -> Vec<u8> {
    let mut body = Vec::new();
    for elem in doc.iter() {
        encode_element(elem, &mut body);
    }
    body.push(0x00);

    let total_len = 4 + body.len();
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&(total_len as i32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn encode_element(elem: &Element, out: &mut Vec<u8>) {
    out.push(elem.value().tag().code() as u8);
    out.extend_from_slice(elem.field_name().as_bytes());
    out.push(0x00);
    encode_value(elem.value(), out);
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&((bytes.len() + 1) as i32).to_le_bytes());
    out.extend_from_slice(bytes);
    out.push(0x00);
}

fn encode_cstr(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(s.as_bytes());
    out.push(0x00);
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match *value {
        Value::MinKey | Value::MaxKey | Value::Eoo | Value::Undefined | Value::Null => {}
        Value::Number(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::Str(ref s) => encode_string(s, out),
        Value::Document(ref doc) => out.extend_from_slice(&encode_document(doc)),
        Value::Array(ref arr) => out.extend_from_slice(&encode_document(arr)),
        Value::Binary { subtype, ref data } => {
            out.extend_from_slice(&(data.len() as i32).to_le_bytes());
            out.push(subtype);
            out.extend_from_slice(data);
        }
        Value::ObjectId(ref bytes) => out.extend_from_slice(bytes),
        Value::Boolean(b) => out.push(if b { 0x01 } else { 0x00 }),
        Value::DateTime(millis) => out.extend_from_slice(&millis.to_le_bytes()),
        Value::Regex { ref pattern, ref options } => {
            encode_cstr(pattern, out);
            encode_cstr(options, out);
        }
        Value::DbRef(ref doc) => {
            let ns = doc.get("$ref").and_then(|e| match *e.value() {
                Value::Str(ref s) => Some(s.clone()),
                _ => None,
            }).unwrap_or_default();
            let oid = doc.get("$id").and_then(|e| match *e.value() {
                Value::ObjectId(o) => Some(o),
                _ => None,
            }).unwrap_or([0u8; 12]);

            encode_string(&ns, out);
            out.extend_from_slice(&oid);
        }
        Value::Code(ref s) => encode_string(s, out),
        Value::Symbol(ref s) => encode_string(s, out),
        Value::CodeWithScope { ref code, ref scope } => {
            let mut inner = Vec::new();
            encode_string(code, &mut inner);
            inner.extend_from_slice(&encode_document(scope));

            out.extend_from_slice(&((4 + inner.len()) as i32).to_le_bytes());
            out.extend_from_slice(&inner);
        }
        Value::Int32(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::Timestamp(t) => out.extend_from_slice(&t.to_le_bytes()),
        Value::Int64(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::Decimal128(ref bytes) => out.extend_from_slice(bytes),
    }
}
