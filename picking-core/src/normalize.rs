//! Normalisation of raw client values into the canonical vocabulary.
//!
//! Every function here is total: malformed input degrades to
//! [`Status::Unset`] or `None`, it is never rejected.

use serde_json::Value;

use crate::types::Status;

/// Legacy spellings still sent by older clients.
const LEGACY_SYNONYMS: &[(&str, Status)] = &[
    ("出庫完了", Status::Shipped),
    ("shipment complete", Status::Shipped),
];

/// Map a raw status string onto the closed vocabulary.
///
/// Accepts canonical names, the clients' display labels and
/// [`LEGACY_SYNONYMS`], after trimming surrounding whitespace.
pub fn normalize_status(raw: Option<&str>) -> Status {
    let Some(raw) = raw else {
        return Status::Unset;
    };
    let value = raw.trim();
    if value.is_empty() {
        return Status::Unset;
    }

    if let Some((_, status)) = LEGACY_SYNONYMS.iter().find(|(alias, _)| *alias == value) {
        return *status;
    }

    Status::ALL
        .into_iter()
        .find(|status| status.as_str() == value || status.label() == value)
        .unwrap_or(Status::Unset)
}

/// Accept only the literal `YYYY-MM-DD` shape. No calendar check is made, so
/// `2024-99-99` passes.
pub fn normalize_date(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 4 && *i != 7)
        .all(|(_, b)| b.is_ascii_digit());
    digits_ok.then(|| value.to_string())
}

/// Normalise a `completedAt` / `updatedAt` value.
///
/// Timestamps are opaque: strings are trimmed and kept, numbers are
/// stringified. Only empty values become absent, so a normalised value always
/// normalises to itself.
pub fn normalize_timestamp(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let value = s.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
