//! Reconciliation of parsed reading history against long-term statistics.
//!
//! Every refresh re-downloads a 180-day window, so most of what arrives has
//! already been recorded. The engine decides which points are genuinely new
//! relative to the persisted watermark, and bridges reporting gaps on
//! cumulative series so a meter that stops publishing for a few days reads as
//! flat instead of appearing to reset.
//!
//! The planning core is pure; [`Reconciler`] couples it to a store and
//! serializes runs so a series' watermark never sees interleaved writers.

use crate::error::ReconcileError;
use crate::model::{SeriesMeta, StatPoint};
use crate::store::StatsStore;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mid-day anchor hour for statistic timestamps. Pinning readings to local
/// noon keeps a calendar date on the same calendar day in UTC for any
/// timezone the portal serves.
const CANONICAL_HOUR: u32 = 12;

/// What to commit on the first-ever run for a series, when no watermark
/// exists yet. Always caller-specified; there is no implicit default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstRunSeed {
    /// Seed the entire normalized history
    FullHistory,
    /// Seed only the single most recent point
    LatestOnly,
}

/// Per-series reconciliation behavior.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilePolicy {
    pub first_run_seed: FirstRunSeed,
    /// Bridge reporting gaps with the last committed value; only meaningful
    /// for cumulative series
    pub gap_fill: bool,
}

/// Converts a reading date to its canonical storage timestamp.
pub fn canonical_timestamp(date: NaiveDate) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(CANONICAL_HOUR, 0, 0)?;
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Sorts ascending by date and deduplicates, keeping the last-seen value for
/// each date.
pub fn normalize(values: Vec<(NaiveDate, f64)>) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in values {
        by_date.insert(date, value);
    }
    by_date.into_iter().collect()
}

/// Computes the points to append for one series.
///
/// `now` is the fetch time of the snapshot being reconciled, not the wall
/// clock: a run that crosses midnight must not shift the gap-fill bound.
/// Gap-fill extends only a non-empty to-commit set; with nothing new there is
/// nothing to bridge, which keeps back-to-back runs idempotent.
pub fn plan_points(
    normalized: &[(NaiveDate, f64)],
    watermark: Option<DateTime<Utc>>,
    policy: ReconcilePolicy,
    now: DateTime<Local>,
) -> Vec<StatPoint> {
    let stamped: Vec<(NaiveDate, DateTime<Utc>, f64)> = normalized
        .iter()
        .filter_map(|&(date, value)| canonical_timestamp(date).map(|ts| (date, ts, value)))
        .collect();

    let to_commit: Vec<(NaiveDate, DateTime<Utc>, f64)> = match watermark {
        Some(w) => stamped.into_iter().filter(|&(_, ts, _)| ts > w).collect(),
        None => match policy.first_run_seed {
            FirstRunSeed::FullHistory => stamped,
            FirstRunSeed::LatestOnly => stamped.into_iter().last().into_iter().collect(),
        },
    };

    let mut points: Vec<StatPoint> = to_commit
        .iter()
        .map(|&(_, ts, value)| StatPoint { start: ts, value })
        .collect();

    if policy.gap_fill {
        if let Some(&(last_date, _, last_value)) = to_commit.last() {
            let today = now.date_naive();
            let mut day = last_date + Duration::days(1);
            while day < today {
                if let Some(ts) = canonical_timestamp(day) {
                    points.push(StatPoint {
                        start: ts,
                        value: last_value,
                    });
                }
                day = day + Duration::days(1);
            }
        }
    }

    points
}

/// Runs the reconciliation plan against a statistics store for one series.
pub struct Reconciler {
    store: Arc<dyn StatsStore>,
    policy: ReconcilePolicy,
    // one writer per series watermark at a time
    guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StatsStore>, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            policy,
            guard: Mutex::new(()),
        }
    }

    /// Looks up the watermark, plans, and appends the batch. Returns the
    /// number of points committed. The watermark lookup must succeed before
    /// anything is written; either store failure aborts the cycle with no
    /// partial commit.
    pub async fn run(
        &self,
        meta: &SeriesMeta,
        values: Vec<(NaiveDate, f64)>,
        now: DateTime<Local>,
    ) -> Result<usize, ReconcileError> {
        let _serialized = self.guard.lock().await;

        let watermark = self
            .store
            .get_last_committed(&meta.statistic_id)
            .await
            .map_err(|e| ReconcileError::store_lookup(meta.statistic_id.as_str(), e))?;

        let normalized = normalize(values);
        let points = plan_points(&normalized, watermark, self.policy, now);
        if points.is_empty() {
            tracing::debug!(series = %meta.statistic_id, "nothing new to commit");
            return Ok(0);
        }

        let count = points.len();
        self.store
            .append(meta, &points)
            .await
            .map_err(|e| ReconcileError::store_append(meta.statistic_id.as_str(), count, e))?;
        tracing::info!(series = %meta.statistic_id, count, "committed statistic points");
        Ok(count)
    }
}
