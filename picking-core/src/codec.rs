//! Snapshot document codec.
//!
//! The on-disk form is a single pretty-printed JSON object, keys sorted,
//! two-space indent, UTF-8 left unescaped, one trailing newline. Equal
//! snapshots always encode to identical bytes, which is what lets the
//! repository layer detect "nothing changed" by comparing bytes.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::CodecError;
use crate::types::Snapshot;

/// Parse a snapshot document, normalising every record on the way in.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Malformed)
}

/// Serialize a snapshot deterministically.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(snapshot.len() * 96 + 2);
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut ser = Serializer::with_formatter(&mut out, formatter);
    snapshot.serialize(&mut ser).map_err(CodecError::Encode)?;
    out.push(b'\n');
    Ok(out)
}
