//! WayBill derivation
//!
//! A train id embeds its schedule number at a fixed character window
//! (`G20210120007` → characters 8..12 → `"0007"` → schedule `7`).
//! The route of a new waybill is resolved Train → Schedule → Line and copied
//! from the line's station sequence.

use crate::{
    config::TrainIdConfig,
    error::{Error, Result},
    key::EntityKind,
    repository::Repository,
    types::{Line, Schedule, WayBill},
};

/// Read the schedule number out of a train id
pub fn schedule_id_from_train(train_id: &str, format: &TrainIdConfig) -> Result<u32> {
    let end = format.schedule_offset + format.schedule_len;
    let window = train_id
        .get(format.schedule_offset..end)
        .ok_or_else(|| Error::MalformedTrainId {
            train_id: train_id.to_string(),
            reason: format!(
                "no schedule number at characters {}..{}",
                format.schedule_offset, end
            ),
        })?;

    window.parse::<u32>().map_err(|e| Error::MalformedTrainId {
        train_id: train_id.to_string(),
        reason: format!("schedule number {:?}: {}", window, e),
    })
}

/// Resolves the route a train runs on
#[derive(Clone)]
pub struct RouteResolver {
    schedules: Repository<Schedule>,
    lines: Repository<Line>,
    format: TrainIdConfig,
}

impl RouteResolver {
    /// Create a resolver over the schedule and line repositories
    pub fn new(
        schedules: Repository<Schedule>,
        lines: Repository<Line>,
        format: TrainIdConfig,
    ) -> Self {
        Self {
            schedules,
            lines,
            format,
        }
    }

    /// Train → Schedule → Line
    pub fn resolve(&self, train_id: &str) -> Result<Line> {
        let schedule_id = schedule_id_from_train(train_id, &self.format)?.to_string();

        let schedule = self
            .schedules
            .find(&schedule_id)?
            .ok_or(Error::DependencyMissing {
                kind: EntityKind::Schedule,
                id: schedule_id,
            })?;

        let line_id = schedule.line_id.to_string();
        let line = self.lines.find(&line_id)?.ok_or(Error::DependencyMissing {
            kind: EntityKind::Line,
            id: line_id,
        })?;

        tracing::debug!(
            train_id = %train_id,
            schedule_id = schedule.id,
            line_id = line.id,
            "Route resolved"
        );

        Ok(line)
    }

    /// Fresh waybill for `train_id` following `line`
    pub fn new_waybill(train_id: &str, line: &Line) -> WayBill {
        WayBill {
            train_id: train_id.to_string(),
            route: line.stations.clone(),
            arrivals: Vec::new(),
            departures: Vec::new(),
            position: 0,
            in_station: false,
            note: String::new(),
        }
    }
}

/// One position report for a waybill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Movement {
    /// Arrival time, recorded when `departure` is empty
    pub arrival: String,
    /// Departure time, recorded when `arrival` is empty and this is not
    pub departure: String,
    /// New index into the route
    pub position: u32,
    /// Train is standing in a station
    pub in_station: bool,
    /// Inspection note
    pub note: String,
}

impl Movement {
    /// Apply the report to a waybill
    ///
    /// At most one timestamp is appended: the arrival when `departure` is
    /// empty, otherwise the departure when `arrival` is empty, otherwise
    /// none. Position, in-station flag and note are always overwritten.
    pub fn apply(self, waybill: &mut WayBill) {
        if self.departure.is_empty() {
            waybill.arrivals.push(self.arrival);
        } else if self.arrival.is_empty() {
            waybill.departures.push(self.departure);
        }
        waybill.position = self.position;
        waybill.in_station = self.in_station;
        waybill.note = self.note;
    }
}
