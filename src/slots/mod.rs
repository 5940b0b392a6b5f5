//! Slot definition records as authored by the region-drawing tool.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

pub mod normalize;

pub use normalize::{MalformedSlot, ResolvedSlot, denormalize, normalize_slot};

/// Slot identifier; the authoring tool emits either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotId {
    Number(u64),
    Signed(i64),
    Text(String),
}

impl SlotId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(
                number
                    .as_u64()
                    .map(SlotId::Number)
                    .or_else(|| number.as_i64().map(SlotId::Signed))
                    .unwrap_or_else(|| SlotId::Text(number.to_string())),
            ),
            Value::String(text) => Some(SlotId::Text(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Number(value) => write!(f, "{value}"),
            SlotId::Signed(value) => write!(f, "{value}"),
            SlotId::Text(value) => f.write_str(value),
        }
    }
}

/// One stored coordinate entry, either `[x, y]` or `{"x": .., "y": ..}`.
///
/// Anything else deserializes into `Unrecognized` so a single bad entry does
/// not reject the whole slot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinate {
    Pair(Vec<f64>),
    Keyed { x: f64, y: f64 },
    Unrecognized(serde_json::Value),
}

/// Persisted slot record. Coordinates are fractions of the reference frame.
///
/// Every field is read leniently: a value of the wrong type is dropped with a
/// warning and the record is left for normalization to accept or skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    #[serde(default, alias = "slotId", deserialize_with = "lenient_slot_id")]
    pub slot_id: Option<SlotId>,
    #[serde(
        default,
        alias = "slotNumber",
        deserialize_with = "lenient_slot_number"
    )]
    pub slot_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_coordinates")]
    pub coordinates: Vec<RawCoordinate>,
    #[serde(default, alias = "imageWidth", deserialize_with = "lenient_dimension")]
    pub image_width: Option<f64>,
    #[serde(default, alias = "imageHeight", deserialize_with = "lenient_dimension")]
    pub image_height: Option<f64>,
}

fn lenient_slot_id<'de, D>(deserializer: D) -> Result<Option<SlotId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let id = SlotId::from_value(&value);
    if id.is_none() {
        warn!(value = %value, "ignoring slot_id of unsupported type");
    }
    Ok(id)
}

fn lenient_slot_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Null => return Ok(None),
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    };
    if number.is_none() {
        warn!(value = %value, "ignoring slot_number that is not a non-negative integer");
    }
    Ok(number)
}

fn lenient_coordinates<'de, D>(deserializer: D) -> Result<Vec<RawCoordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(entries) => Ok(entries.into_iter().map(RawCoordinate::from).collect()),
        other => {
            warn!(value = %other, "ignoring coordinates that are not an array");
            Ok(Vec::new())
        }
    }
}

fn lenient_dimension<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let dimension = value.as_f64();
    if dimension.is_none() {
        warn!(value = %value, "ignoring reference dimension that is not a number");
    }
    Ok(dimension)
}

impl From<Value> for RawCoordinate {
    fn from(value: Value) -> Self {
        match &value {
            Value::Array(items) => {
                let numbers: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
                match numbers {
                    Some(numbers) => RawCoordinate::Pair(numbers),
                    None => RawCoordinate::Unrecognized(value),
                }
            }
            Value::Object(fields) => match (
                fields.get("x").and_then(Value::as_f64),
                fields.get("y").and_then(Value::as_f64),
            ) {
                (Some(x), Some(y)) => RawCoordinate::Keyed { x, y },
                _ => RawCoordinate::Unrecognized(value),
            },
            _ => RawCoordinate::Unrecognized(value),
        }
    }
}

impl SlotRecord {
    /// Short label for log lines.
    pub fn label(&self) -> String {
        match (&self.slot_id, self.slot_number) {
            (Some(id), _) => id.to_string(),
            (None, Some(number)) => format!("#{number}"),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SlotFileError {
    #[error("failed to read slot file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse slot file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn load_slots_from_path(path: impl AsRef<Path>) -> Result<Vec<SlotRecord>, SlotFileError> {
    let contents = std::fs::read_to_string(path)?;
    parse_slots(&contents)
}

pub fn parse_slots(contents: &str) -> Result<Vec<SlotRecord>, SlotFileError> {
    let slots: Vec<SlotRecord> = serde_json::from_str(contents)?;
    Ok(slots)
}
