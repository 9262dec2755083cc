//! Mock statistics store for reconciliation and sensor tests.

use crate::model::{SeriesMeta, StatPoint};
use crate::store::StatsStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory `StatsStore` with switchable failure modes.
pub struct MemoryStore {
    series: Mutex<HashMap<String, Vec<StatPoint>>>,
    fail_lookup: bool,
    fail_append: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
            fail_lookup: false,
            fail_append: false,
        }
    }

    /// Store whose watermark lookup always errors.
    pub fn failing_lookup() -> Self {
        Self {
            fail_lookup: true,
            ..Self::new()
        }
    }

    /// Store whose append always errors.
    pub fn failing_append() -> Self {
        Self {
            fail_append: true,
            ..Self::new()
        }
    }

    /// Pre-populates a series, as if a previous process had committed it.
    pub async fn seed(&self, statistic_id: &str, points: Vec<StatPoint>) {
        self.series
            .lock()
            .await
            .insert(statistic_id.to_string(), points);
    }

    /// Everything committed to a series so far.
    pub async fn points(&self, statistic_id: &str) -> Vec<StatPoint> {
        self.series
            .lock()
            .await
            .get(statistic_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn get_last_committed(&self, statistic_id: &str) -> Result<Option<DateTime<Utc>>> {
        if self.fail_lookup {
            return Err(anyhow!("lookup failed (simulated)"));
        }
        Ok(self
            .series
            .lock()
            .await
            .get(statistic_id)
            .and_then(|points| points.iter().map(|p| p.start).max()))
    }

    async fn append(&self, meta: &SeriesMeta, points: &[StatPoint]) -> Result<()> {
        if self.fail_append {
            return Err(anyhow!("append failed (simulated)"));
        }
        self.series
            .lock()
            .await
            .entry(meta.statistic_id.clone())
            .or_default()
            .extend_from_slice(points);
        Ok(())
    }
}
