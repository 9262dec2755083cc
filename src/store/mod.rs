//! Long-term statistics storage.
//!
//! The store is a collaborator, not part of the acquisition core: the
//! reconciliation engine only needs the last committed timestamp per series
//! and an append operation. [`StatsStore`] is that seam; [`InfluxStore`] is
//! the InfluxDB2-backed implementation the daemon runs with.

mod influxdb;

pub use influxdb::InfluxStore;

use crate::model::{SeriesMeta, StatPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Most recent committed timestamp for the series, `None` on the
    /// first-ever run. The sole source of truth for what has already been
    /// recorded; correct even after a process restart.
    async fn get_last_committed(
        &self,
        statistic_id: &str,
    ) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Appends one batch of points strictly after the watermark. A batch is
    /// committed as a unit; callers treat any error as "nothing written".
    async fn append(&self, meta: &SeriesMeta, points: &[StatPoint]) -> anyhow::Result<()>;
}
