//! Domain types for the picking backup snapshot.
//!
//! A [`Snapshot`] is the whole dataset: one [`Record`] per order key. Every
//! value that crosses the serde boundary is normalised on the way in, so a
//! decoded snapshot is always in canonical shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{normalize_status, normalize_timestamp};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Hex identifier of a commit in the backing repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Picking status of an order. Closed vocabulary; anything unrecognised is
/// [`Status::Unset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Unset,
    Unsubmitted,
    Printed,
    AwaitingReturn,
    PickingDone,
    Shipped,
    Received,
}

impl Status {
    /// Every recognised status, in workflow order.
    pub const ALL: [Status; 6] = [
        Status::Unsubmitted,
        Status::Printed,
        Status::AwaitingReturn,
        Status::PickingDone,
        Status::Shipped,
        Status::Received,
    ];

    /// Canonical wire name. `Unset` is the empty string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unset => "",
            Status::Unsubmitted => "unsubmitted",
            Status::Printed => "printed",
            Status::AwaitingReturn => "awaiting_return",
            Status::PickingDone => "picking_done",
            Status::Shipped => "shipped",
            Status::Received => "received",
        }
    }

    /// Display label used by the picking clients.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Unset => "",
            Status::Unsubmitted => "未提出",
            Status::Printed => "印刷済",
            Status::AwaitingReturn => "返却待ち",
            Status::PickingDone => "ピッキング完了",
            Status::Shipped => "出庫済",
            Status::Received => "入庫確認",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Status::Unset)
    }

    /// Normalise an arbitrary JSON value. Non-strings are unset.
    pub fn from_value(value: &Value) -> Self {
        normalize_status(value.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Status::from_value(&value))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One order's picking state.
///
/// `fields` is the client's own bag and is never inspected. `extra` keeps any
/// unknown top-level attributes so they survive a decode/encode cycle without
/// being folded into `fields`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    pub status: Status,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
    pub fields: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const STATUS_KEY: &str = "status";
const COMPLETED_AT_KEY: &str = "completedAt";
const UPDATED_AT_KEY: &str = "updatedAt";
const FIELDS_KEY: &str = "fields";

impl Record {
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Build a normalised record from a raw JSON object.
    ///
    /// Fails only when `fields` is present and is neither `null` nor an object.
    pub fn from_object(mut object: Map<String, Value>) -> Result<Self, String> {
        let status = object
            .remove(STATUS_KEY)
            .map(|v| Status::from_value(&v))
            .unwrap_or_default();
        let completed_at = object
            .remove(COMPLETED_AT_KEY)
            .and_then(|v| normalize_timestamp(&v));
        let updated_at = object
            .remove(UPDATED_AT_KEY)
            .and_then(|v| normalize_timestamp(&v));
        let fields = match object.remove(FIELDS_KEY) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(format!(
                    "`fields` must be an object, found {}",
                    json_kind(&other)
                ))
            }
        };
        Ok(Self {
            status,
            completed_at,
            updated_at,
            fields,
            extra: object,
        })
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(object) => Record::from_object(object).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "record must be an object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The full dataset at one point in time, keyed by order number.
///
/// Backed by a `BTreeMap` so iteration and serialisation order is stable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, Record>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> Option<Record> {
        self.0.insert(key.into(), record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Record)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Record)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
