//! Composite keys
//!
//! Every ledger key is an ordered tuple of strings headed by a kind name:
//!
//! ```text
//! 0x00 kind 0x00 part_1 0x00 part_2 0x00 ... part_n 0x00
//! ```
//!
//! Because every component is terminated by `0x00`, the encoding of a
//! partial tuple is a byte prefix of the encoding of every full tuple that
//! starts with the same components, and only of those (`"A"` never matches
//! `"AB"`). Prefix scans over the ledger therefore answer "all entries whose
//! leading components equal X".

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const DELIMITER: u8 = 0x00;

/// Build a full composite key
pub fn make_composite_key(kind: &str, parts: &[&str]) -> Result<Vec<u8>> {
    validate_component(kind)?;
    if kind.is_empty() {
        return Err(Error::InvalidKey("key kind must not be empty".to_string()));
    }

    let capacity = 2 + kind.len() + parts.iter().map(|p| p.len() + 1).sum::<usize>();
    let mut key = Vec::with_capacity(capacity);
    key.push(DELIMITER);
    key.extend_from_slice(kind.as_bytes());
    key.push(DELIMITER);

    for part in parts {
        validate_component(part)?;
        key.extend_from_slice(part.as_bytes());
        key.push(DELIMITER);
    }

    Ok(key)
}

/// Build the scan prefix for all keys of `kind` whose leading parts equal `parts`
///
/// Same encoding as [`make_composite_key`]; kept separate so call sites read
/// as what they do.
pub fn partial_composite_key(kind: &str, parts: &[&str]) -> Result<Vec<u8>> {
    make_composite_key(kind, parts)
}

/// Split a composite key back into its kind and parts
pub fn split_composite_key(key: &[u8]) -> Result<(String, Vec<String>)> {
    if key.len() < 2 || key[0] != DELIMITER || key[key.len() - 1] != DELIMITER {
        return Err(Error::InvalidKey(format!(
            "not a composite key: {:?}",
            String::from_utf8_lossy(key)
        )));
    }

    let mut components = key[1..key.len() - 1]
        .split(|b| *b == DELIMITER)
        .map(|bytes| {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::InvalidKey(format!("component is not UTF-8: {}", e)))
        });

    let kind = components
        .next()
        .ok_or_else(|| Error::InvalidKey("composite key has no kind".to_string()))??;
    let parts = components.collect::<Result<Vec<_>>>()?;

    Ok((kind, parts))
}

fn validate_component(component: &str) -> Result<()> {
    if component.as_bytes().contains(&DELIMITER) {
        return Err(Error::InvalidKey(format!(
            "component {:?} contains the reserved 0x00 delimiter",
            component
        )));
    }
    Ok(())
}

/// Kind of a primary record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Rolling stock
    Vehicle,
    /// Station
    Station,
    /// Route through stations
    Line,
    /// Scheduled trip on a line with a vehicle
    Schedule,
    /// Train with remaining capacity
    Train,
    /// Customer order
    Order,
    /// Cargo manifest of a train
    Cargo,
    /// Waybill of a train
    WayBill,
}

impl EntityKind {
    /// Key namespace of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vehicle => "vehicle",
            EntityKind::Station => "station",
            EntityKind::Line => "line",
            EntityKind::Schedule => "schedule",
            EntityKind::Train => "train",
            EntityKind::Order => "order",
            EntityKind::Cargo => "cargo",
            EntityKind::WayBill => "waybill",
        }
    }

    /// Ledger key of the record with this id
    pub fn key(&self, id: &str) -> Result<Vec<u8>> {
        make_composite_key(self.as_str(), &[id])
    }

    /// Scan prefix covering every record of this kind
    pub fn prefix(&self) -> Result<Vec<u8>> {
        partial_composite_key(self.as_str(), &[])
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a relationship record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// (station, line): the station lies on the line's route
    StationLine,
    /// (line, schedule): the schedule runs on the line
    LineSchedule,
    /// (vehicle, schedule): the schedule uses the vehicle
    VehicleSchedule,
    /// (train, order): the order reserved capacity on the train
    TrainOrder,
}

impl IndexKind {
    /// Key namespace of this index
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::StationLine => "station~line",
            IndexKind::LineSchedule => "line~schedule",
            IndexKind::VehicleSchedule => "vehicle~schedule",
            IndexKind::TrainOrder => "train~order",
        }
    }

    /// Kind of the record the leading key part refers to
    pub fn parent(&self) -> EntityKind {
        match self {
            IndexKind::StationLine => EntityKind::Station,
            IndexKind::LineSchedule => EntityKind::Line,
            IndexKind::VehicleSchedule => EntityKind::Vehicle,
            IndexKind::TrainOrder => EntityKind::Train,
        }
    }

    /// Kind of the record the trailing key part refers to
    pub fn child(&self) -> EntityKind {
        match self {
            IndexKind::StationLine => EntityKind::Line,
            IndexKind::LineSchedule | IndexKind::VehicleSchedule => EntityKind::Schedule,
            IndexKind::TrainOrder => EntityKind::Order,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
