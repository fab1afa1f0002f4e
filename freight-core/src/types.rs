//! Core types for the registry
//!
//! All records are stored as JSON documents (self-describing, lossless) and
//! replaced whole on update. `Default` gives the zero value returned in
//! failed query envelopes.

use crate::{
    error::{Error, Result},
    index::IndexEntry,
    key::{EntityKind, IndexKind},
    repository::Entity,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn frozen(kind: EntityKind, id: &str, what: &str) -> Error {
    Error::InvalidRecord(format!("the {} {} may not change {}", kind, id, what))
}

/// `next` keeps every element of `current` in place
fn appended_to<T: PartialEq>(current: &[T], next: &[T]) -> bool {
    next.starts_with(current)
}

/// Rolling stock unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Vehicle number
    pub id: u32,
    /// Number of carriages
    pub carriage_count: u32,
    /// In service
    pub active: bool,
}

impl Entity for Vehicle {
    const KIND: EntityKind = EntityKind::Vehicle;
    const DEPENDENT_INDEXES: &'static [IndexKind] = &[IndexKind::VehicleSchedule];

    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// Station, identified by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Station name (primary key)
    pub name: String,
    /// Country the station is in
    pub country: String,
    /// In service
    pub active: bool,
    /// Free-form description
    pub description: String,
}

impl Entity for Station {
    const KIND: EntityKind = EntityKind::Station;
    const DEPENDENT_INDEXES: &'static [IndexKind] = &[IndexKind::StationLine];

    fn id(&self) -> String {
        self.name.clone()
    }
}

/// Role of a station on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationRole {
    /// First station of the route
    Origin,
    /// Intermediate stop
    Waypoint,
    /// Last station of the route
    Terminus,
}

/// Route through an ordered list of stations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Line number
    pub id: u32,
    /// Stations in route order
    pub stations: Vec<String>,
    /// Role of each station, positionally paired with `stations`
    pub roles: Vec<StationRole>,
    /// In service
    pub active: bool,
}

impl Entity for Line {
    const KIND: EntityKind = EntityKind::Line;
    const DEPENDENT_INDEXES: &'static [IndexKind] = &[IndexKind::LineSchedule];

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn parents(&self) -> Vec<(EntityKind, String)> {
        self.stations
            .iter()
            .map(|station| (EntityKind::Station, station.clone()))
            .collect()
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        // A route may pass a station twice; the relation is recorded once.
        let unique: BTreeSet<&String> = self.stations.iter().collect();
        unique
            .into_iter()
            .map(|station| IndexEntry::pair(IndexKind::StationLine, station.as_str(), self.id()))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.stations.len() != self.roles.len() {
            return Err(Error::InvalidRecord(format!(
                "line {} has {} stations but {} station roles",
                self.id,
                self.stations.len(),
                self.roles.len()
            )));
        }
        Ok(())
    }
}

/// Scheduled service of a vehicle on a line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Schedule number
    pub id: u32,
    /// Line the service runs on
    pub line_id: u32,
    /// Vehicle operating the service
    pub vehicle_id: u32,
    /// Price per carriage
    pub unit_price: u32,
    /// In service
    pub active: bool,
}

impl Entity for Schedule {
    const KIND: EntityKind = EntityKind::Schedule;

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn parents(&self) -> Vec<(EntityKind, String)> {
        vec![
            (EntityKind::Line, self.line_id.to_string()),
            (EntityKind::Vehicle, self.vehicle_id.to_string()),
        ]
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![
            IndexEntry::pair(IndexKind::LineSchedule, self.line_id.to_string(), self.id()),
            IndexEntry::pair(IndexKind::VehicleSchedule, self.vehicle_id.to_string(), self.id()),
        ]
    }
}

/// Train run with capacity left to sell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    /// Train number; embeds the schedule number
    pub id: String,
    /// Carriages not yet reserved by orders
    pub remaining_capacity: u32,
}

impl Entity for Train {
    const KIND: EntityKind = EntityKind::Train;
    const DEPENDENT_INDEXES: &'static [IndexKind] = &[IndexKind::TrainOrder];
    const DEPENDENT_RECORDS: &'static [EntityKind] = &[EntityKind::Cargo, EntityKind::WayBill];

    fn id(&self) -> String {
        self.id.clone()
    }

    fn check_update(&self, next: &Self) -> Result<()> {
        // Capacity is only ever reserved, never restocked
        if next.remaining_capacity > self.remaining_capacity {
            return Err(frozen(Self::KIND, &self.id, "its capacity upwards"));
        }
        Ok(())
    }
}

/// One line item of goods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoItem {
    /// Goods category
    pub cargo_type: String,
    /// Number of units
    pub quantity: u32,
    /// Goods name
    pub name: String,
}

/// Fields supplied by a customer when placing an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Order number
    pub id: u32,
    /// Customer placing the order
    pub customer_id: u32,
    /// Train to carry the goods
    pub train_id: String,
    /// Loading station
    pub origin_station: String,
    /// Unloading station
    pub destination_station: String,
    /// Carriages to reserve on the train
    pub reserved_capacity: u32,
    /// Order amount
    pub price: u32,
    /// Goods to carry
    pub items: Vec<CargoItem>,
}

/// Customer order reserving train capacity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order number
    pub id: u32,
    /// Day the order was placed (UTC)
    pub created_at: NaiveDate,
    /// Customer placing the order
    pub customer_id: u32,
    /// Train carrying the goods
    pub train_id: String,
    /// Loading station
    pub origin_station: String,
    /// Unloading station
    pub destination_station: String,
    /// Carriages reserved on the train
    pub reserved_capacity: u32,
    /// Order amount
    pub price: u32,
    /// Goods to carry
    pub items: Vec<CargoItem>,
    /// Passed inspection
    pub approved: bool,
    /// Inspector's note
    pub approval_note: String,
}

impl Order {
    /// Fresh, unapproved order placed on `created_at`
    pub fn from_request(request: OrderRequest, created_at: NaiveDate) -> Self {
        Self {
            id: request.id,
            created_at,
            customer_id: request.customer_id,
            train_id: request.train_id,
            origin_station: request.origin_station,
            destination_station: request.destination_station,
            reserved_capacity: request.reserved_capacity,
            price: request.price,
            items: request.items,
            approved: false,
            approval_note: String::new(),
        }
    }
}

impl Entity for Order {
    const KIND: EntityKind = EntityKind::Order;

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn parents(&self) -> Vec<(EntityKind, String)> {
        vec![(EntityKind::Train, self.train_id.clone())]
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        vec![IndexEntry::pair(IndexKind::TrainOrder, self.train_id.as_str(), self.id())
            .with_value(self.id().into_bytes())]
    }

    fn check_update(&self, next: &Self) -> Result<()> {
        let reviewed = Order {
            approved: next.approved,
            approval_note: next.approval_note.clone(),
            ..self.clone()
        };
        if reviewed != *next {
            return Err(frozen(Self::KIND, &self.id(), "anything but its review"));
        }
        Ok(())
    }
}

/// Cargo manifest of a train
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    /// Train the manifest belongs to (primary key)
    pub train_id: String,
    /// Number of line items aggregated from approved orders
    pub total_items: u32,
    /// Aggregated line items in index-scan order
    pub items: Vec<CargoItem>,
    /// Orders whose items were included
    pub order_ids: Vec<u32>,
    /// Station inspection outcomes, appended over the journey
    pub inspection_results: Vec<bool>,
    /// Station inspection notes, paired with `inspection_results`
    pub inspection_notes: Vec<String>,
}

impl Entity for Cargo {
    const KIND: EntityKind = EntityKind::Cargo;
    const DEPENDENT_RECORDS: &'static [EntityKind] = &[EntityKind::WayBill];

    fn id(&self) -> String {
        self.train_id.clone()
    }

    fn parents(&self) -> Vec<(EntityKind, String)> {
        vec![(EntityKind::Train, self.train_id.clone())]
    }

    fn check_update(&self, next: &Self) -> Result<()> {
        let manifest_kept = next.total_items == self.total_items
            && next.items == self.items
            && next.order_ids == self.order_ids;
        if !manifest_kept {
            return Err(frozen(Self::KIND, &self.train_id, "its aggregated manifest"));
        }
        if !appended_to(&self.inspection_results, &next.inspection_results)
            || !appended_to(&self.inspection_notes, &next.inspection_notes)
        {
            return Err(frozen(Self::KIND, &self.train_id, "past inspections"));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.inspection_results.len() != self.inspection_notes.len() {
            return Err(Error::InvalidRecord(format!(
                "cargo {} has {} inspection results but {} notes",
                self.train_id,
                self.inspection_results.len(),
                self.inspection_notes.len()
            )));
        }
        Ok(())
    }
}

/// Journey record of a train
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WayBill {
    /// Train the waybill belongs to (primary key)
    pub train_id: String,
    /// Station sequence copied from the line at creation
    pub route: Vec<String>,
    /// Recorded arrival times
    pub arrivals: Vec<String>,
    /// Recorded departure times
    pub departures: Vec<String>,
    /// Index into `route` of the train's current position
    pub position: u32,
    /// Train is standing in a station
    pub in_station: bool,
    /// Latest inspection note
    pub note: String,
}

impl Entity for WayBill {
    const KIND: EntityKind = EntityKind::WayBill;

    fn id(&self) -> String {
        self.train_id.clone()
    }

    fn parents(&self) -> Vec<(EntityKind, String)> {
        vec![(EntityKind::Train, self.train_id.clone())]
    }

    fn check_update(&self, next: &Self) -> Result<()> {
        if next.route != self.route {
            return Err(frozen(Self::KIND, &self.train_id, "its route"));
        }
        if !appended_to(&self.arrivals, &next.arrivals)
            || !appended_to(&self.departures, &next.departures)
        {
            return Err(frozen(Self::KIND, &self.train_id, "recorded times"));
        }
        Ok(())
    }
}
