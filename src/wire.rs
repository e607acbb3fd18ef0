//! `OP_MSG` wire framing: header, flag bits, and sections.
//!
//! Built directly on top of [`codec::Reader`] -- a frame's header is just
//! four more int32 fields ahead of the same tag-dispatched document bytes
//! the codec already knows how to decode.

use bitflags::bitflags;
use log::warn;

use crate::codec::Reader;
use crate::error::{Error, Result};
use crate::value::Document;

/// The operation codes this framer recognises. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Invalid = 0,
    Insert = 2002,
    Query = 2004,
    GetMore = 2005,
    Msg = 2013,
}

impl OpCode {
    fn from_i32(code: i32) -> Result<OpCode> {
        Ok(match code {
            0 => OpCode::Invalid,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2013 => OpCode::Msg,
            other => return Err(Error::unknown(format!("Unknown op code: {}", other))),
        })
    }
}

bitflags! {
    /// `OP_MSG`'s flag bits, packed into a single conventional `u32` bitmask.
    pub struct FlagBits: u32 {
        const CHECKSUM_PRESENT = 1 << 0;
        const MORE_TO_COME     = 1 << 1;
        const EXHAUST_ALLOWED  = 1 << 16;
    }
}

/// The kind of a section within an `OP_MSG` body.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Kind 0: exactly one document, and at most one such section per message.
    Body(Document),
    /// Kind 1: a named sequence of zero or more documents.
    DocumentSequence { identifier: String, documents: Vec<Document> },
}

/// A fully decoded `OP_MSG` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: OpCode,
    pub flag_bits: FlagBits,
    pub sections: Vec<Section>,
}

/// Parses a complete `OP_MSG` frame out of `bytes`, returning the frame and
/// whatever bytes followed it.
pub fn parse_frame(bytes: &[u8]) -> Result<(Frame, &[u8])> {
    let mut r = Reader::new(bytes);

    let message_length = r.read_i32()?;
    let request_id = r.read_i32()?;
    let response_to = r.read_i32()?;
    let op_code = OpCode::from_i32(r.read_i32()?)?;

    let flag_bits = FlagBits::from_bits_truncate(r.read_u32()?);

    let total_len = message_length as usize;
    if total_len < 20 {
        return Err(Error::malformed("declared message length is smaller than the header"));
    }
    // 16 header bytes plus the 4-byte flagBits just read are already behind `r`.
    let payload_len = total_len - 20;
    let payload = r.read_bytes(payload_len)?;

    let sections = parse_sections(payload, flag_bits)?;

    let remaining = r.remaining();
    Ok((Frame { message_length, request_id, response_to, op_code, flag_bits, sections }, remaining))
}

fn parse_sections(payload: &[u8], flag_bits: FlagBits) -> Result<Vec<Section>> {
    let mut r = Reader::new(payload);
    let mut sections = Vec::new();
    let mut body_seen = false;

    let checksum_len = if flag_bits.contains(FlagBits::CHECKSUM_PRESENT) { 4 } else { 0 };

    while r.remaining().len() > checksum_len {
        let kind = r.read_u8()?;
        match kind {
            0 => {
                if body_seen {
                    warn!("rejecting OP_MSG frame with more than one body section");
                    return Err(Error::conflict("Multiple body sections in message"));
                }
                body_seen = true;
                let (doc, rest) = crate::codec::decode_document(r.remaining())?;
                let consumed = r.remaining().len() - rest.len();
                r.skip(consumed)?;
                sections.push(Section::Body(doc));
            }
            1 => {
                let section_size = r.peek_i32()?;
                let section_bytes = r.read_bytes(section_size as usize)?;
                let mut sr = Reader::new(section_bytes);
                sr.read_i32()?;
                let identifier = sr.read_cstr()?;
                let mut documents = Vec::new();
                while !sr.remaining().is_empty() {
                    let (doc, rest) = crate::codec::decode_document(sr.remaining())?;
                    let consumed = sr.remaining().len() - rest.len();
                    sr.skip(consumed)?;
                    documents.push(doc);
                }
                sections.push(Section::DocumentSequence { identifier, documents });
            }
            other => return Err(Error::unknown(format!("Unknown section kind {}", other))),
        }
    }

    if flag_bits.contains(FlagBits::CHECKSUM_PRESENT) {
        // Stub: bytes are consumed but the CRC32C is not validated.
        r.read_bytes(4)?;
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Document, Value};

    fn encode_frame(request_id: i32, response_to: i32, op_code: i32, flag_bits: u32, body: &Document) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(0u8); // kind 0: body
        payload.extend(crate::codec::encode_document(body));

        let message_length = 20 + payload.len() as i32;

        let mut out = Vec::new();
        out.extend(&message_length.to_le_bytes());
        out.extend(&request_id.to_le_bytes());
        out.extend(&response_to.to_le_bytes());
        out.extend(&op_code.to_le_bytes());
        out.extend(&flag_bits.to_le_bytes());
        out.extend(&payload);
        out
    }

    #[test]
    fn parses_a_single_body_section() {
        let mut body = Document::new();
        body.insert("ping", Value::Int32(1));
        let bytes = encode_frame(7, 0, 2013, 0, &body);

        let (frame, rest) = parse_frame(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(frame.request_id, 7);
        assert_eq!(frame.op_code, OpCode::Msg);
        assert_eq!(frame.sections, vec![Section::Body(body)]);
    }

    #[test]
    fn unknown_op_code_is_rejected() {
        let mut body = Document::new();
        body.insert("ping", Value::Int32(1));
        let bytes = encode_frame(1, 0, 9999, 0, &body);

        let err = parse_frame(&bytes).unwrap_err();
        assert_eq!(err.message(), "Unknown op code: 9999");
    }

    #[test]
    fn multiple_body_sections_are_rejected() {
        let mut body = Document::new();
        body.insert("ping", Value::Int32(1));

        let mut payload = Vec::new();
        payload.push(0u8);
        payload.extend(crate::codec::encode_document(&body));
        payload.push(0u8);
        payload.extend(crate::codec::encode_document(&body));

        let message_length = 20 + payload.len() as i32;
        let mut out = Vec::new();
        out.extend(&message_length.to_le_bytes());
        out.extend(&1i32.to_le_bytes());
        out.extend(&0i32.to_le_bytes());
        out.extend(&2013i32.to_le_bytes());
        out.extend(&0u32.to_le_bytes());
        out.extend(&payload);

        let err = parse_frame(&out).unwrap_err();
        assert_eq!(err.message(), "Multiple body sections in message");
    }
}
