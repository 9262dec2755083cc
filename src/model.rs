use chrono::{DateTime, Local, NaiveDate, Utc};
use std::fmt;

/// One parsed row of the portal's consumption export.
///
/// A missing field stays `None`; it is never coerced to zero, because a zero
/// index or volume is a meaningful value for a water meter.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Calendar date of the reading (the export carries no time component)
    pub date: NaiveDate,
    /// Cumulative meter index; physically non-decreasing over time
    pub index: Option<u64>,
    /// Volume consumed on that date
    pub volume: Option<f64>,
}

/// Column positions resolved from the export's header row.
///
/// The portal reorders and renames columns without notice, so the mapping is
/// recomputed from header keywords on every fetch. The defaults match the
/// layout the portal used historically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub date: usize,
    pub index: usize,
    pub volume: usize,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            date: 0,
            index: 3,
            volume: 2,
        }
    }
}

/// The result of one successful fetch cycle.
///
/// Replaced wholesale by the orchestrator on each refresh; consumers only
/// ever observe a complete snapshot or the previous one.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the export was fetched; the authoritative "now" for gap-fill bounds
    pub fetched_at: DateTime<Local>,
    /// Column mapping in effect for this fetch
    pub mapping: ColumnMapping,
    /// Most recent reading (the last row of the export)
    pub latest: Reading,
    /// Full ordered reading history from the export window
    pub history: Vec<Reading>,
}

impl Snapshot {
    /// Builds a snapshot from an ordered history; `None` when the history is
    /// empty, since there is no latest reading to publish.
    pub fn from_history(
        fetched_at: DateTime<Local>,
        mapping: ColumnMapping,
        history: Vec<Reading>,
    ) -> Option<Self> {
        let latest = history.last().cloned()?;
        Some(Self {
            fetched_at,
            mapping,
            latest,
            history,
        })
    }
}

/// A single statistic point bound for long-term storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StatPoint {
    /// Canonical timestamp: reading date at local noon, converted to UTC
    pub start: DateTime<Utc>,
    pub value: f64,
}

/// Whether a series is a running total or an instantaneous/mean value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// Only ever increases (meter index)
    Cumulative,
    /// Mean-bearing (daily consumed volume)
    Mean,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SeriesKind::Cumulative => write!(f, "cumulative"),
            SeriesKind::Mean => write!(f, "mean"),
        }
    }
}

/// Identity and semantics of one exposed statistic series.
#[derive(Debug, Clone)]
pub struct SeriesMeta {
    /// Stable identifier, unique per meter and series
    pub statistic_id: String,
    /// Human-readable name
    pub name: String,
    pub unit: Unit,
    pub kind: SeriesKind,
}

/// Units of measurement used in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Liters (L) - for daily consumed volume
    Liter,
    /// Cubic meters (m³) - for the meter index
    CubicMeter,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unit::Liter => write!(f, "L"),
            Unit::CubicMeter => write!(f, "m³"),
        }
    }
}
