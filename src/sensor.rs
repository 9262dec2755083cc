//! The two logical series exposed from one meter snapshot.
//!
//! One sensor type covers what used to be several near-identical entity
//! variants: the cumulative meter index and the daily consumed volume differ
//! only in which reading field they select, their unit and series kind, their
//! display mode, and their reconciliation policy.

use crate::config::SensorConfig;
use crate::error::ReconcileError;
use crate::model::{Reading, SeriesKind, SeriesMeta, Snapshot, Unit};
use crate::reconcile::{FirstRunSeed, ReconcilePolicy, Reconciler};
use crate::store::StatsStore;
use std::sync::Arc;

/// How the live value is exposed while history backfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Reflect the newest fetched value as soon as it arrives
    Immediate,
    /// Hold the live value back; historical points carry the data instead
    Suppressed,
}

/// Which field of a [`Reading`] a sensor publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingField {
    Index,
    Volume,
}

impl ReadingField {
    pub fn value_of(&self, reading: &Reading) -> Option<f64> {
        match self {
            ReadingField::Index => reading.index.map(|v| v as f64),
            ReadingField::Volume => reading.volume,
        }
    }
}

/// One exposed series: a live value read from the current snapshot, plus a
/// reconciler that backfills its history into long-term statistics.
pub struct MeterSensor {
    meta: SeriesMeta,
    field: ReadingField,
    display: DisplayMode,
    reconciler: Reconciler,
}

impl MeterSensor {
    pub fn new(
        meta: SeriesMeta,
        field: ReadingField,
        display: DisplayMode,
        policy: ReconcilePolicy,
        store: Arc<dyn StatsStore>,
    ) -> Self {
        Self {
            meta,
            field,
            display,
            reconciler: Reconciler::new(store, policy),
        }
    }

    pub fn meta(&self) -> &SeriesMeta {
        &self.meta
    }

    /// The value to display right now, from the latest reading. `None` when
    /// the field is missing or the sensor's display is suppressed.
    pub fn current_value(&self, snapshot: &Snapshot) -> Option<f64> {
        match self.display {
            DisplayMode::Suppressed => None,
            DisplayMode::Immediate => self.field.value_of(&snapshot.latest),
        }
    }

    /// Reconciles the snapshot's history into the statistics store. Rows with
    /// a missing field are dropped here; the engine handles the rest.
    pub async fn handle_update(&self, snapshot: &Snapshot) -> Result<usize, ReconcileError> {
        let values: Vec<_> = snapshot
            .history
            .iter()
            .filter_map(|reading| self.field.value_of(reading).map(|v| (reading.date, v)))
            .collect();
        self.reconciler
            .run(&self.meta, values, snapshot.fetched_at)
            .await
    }
}

/// Builds the meter's two series: the cumulative index (gap-filled, seeding
/// and display per configuration) and the daily volume (mean series, full
/// history from the start, no bridging).
pub fn standard_sensors(
    email: &str,
    config: &SensorConfig,
    store: Arc<dyn StatsStore>,
) -> Vec<MeterSensor> {
    let index_seed = if config.import_full_history {
        FirstRunSeed::FullHistory
    } else {
        FirstRunSeed::LatestOnly
    };
    let index_display = if config.defer_index_display {
        DisplayMode::Suppressed
    } else {
        DisplayMode::Immediate
    };

    vec![
        MeterSensor::new(
            SeriesMeta {
                statistic_id: statistic_id("ileo_index", email),
                name: "Index Compteur".to_string(),
                unit: Unit::CubicMeter,
                kind: SeriesKind::Cumulative,
            },
            ReadingField::Index,
            index_display,
            ReconcilePolicy {
                first_run_seed: index_seed,
                gap_fill: true,
            },
            Arc::clone(&store),
        ),
        MeterSensor::new(
            SeriesMeta {
                statistic_id: statistic_id("ileo_volume", email),
                name: "Conso Jour".to_string(),
                unit: Unit::Liter,
                kind: SeriesKind::Mean,
            },
            ReadingField::Volume,
            DisplayMode::Immediate,
            ReconcilePolicy {
                first_run_seed: FirstRunSeed::FullHistory,
                gap_fill: false,
            },
            store,
        ),
    ]
}

fn statistic_id(prefix: &str, email: &str) -> String {
    let slug: String = email
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", prefix, slug)
}
