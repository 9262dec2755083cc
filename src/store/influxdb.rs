use super::StatsStore;
use crate::config::InfluxConfig;
use crate::model::{SeriesMeta, StatPoint};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::prelude::stream;
use influxdb2::models::{DataPoint, Query};
use influxdb2_structmap::value::Value;

const MEASUREMENT: &str = "water_meter";

pub struct InfluxStore {
    client: influxdb2::Client,
    bucket: String,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> Self {
        let client = influxdb2::Client::new(config.url, config.org, config.token);
        Self {
            client,
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl StatsStore for InfluxStore {
    async fn get_last_committed(&self, statistic_id: &str) -> Result<Option<DateTime<Utc>>> {
        let flux = format!(
            r#"from(bucket: "{bucket}")
  |> range(start: 0)
  |> filter(fn: (r) => r._measurement == "{measurement}" and r.series == "{series}")
  |> last()"#,
            bucket = self.bucket,
            measurement = MEASUREMENT,
            series = statistic_id,
        );
        let records = self
            .client
            .query_raw(Some(Query::new(flux)))
            .await
            .context("watermark query failed")?;

        let last = records
            .iter()
            .filter_map(|record| match record.values.get("_time") {
                Some(Value::TimeRFC(ts)) => Some(ts.with_timezone(&Utc)),
                _ => None,
            })
            .max();
        Ok(last)
    }

    async fn append(&self, meta: &SeriesMeta, points: &[StatPoint]) -> Result<()> {
        let mut batch = Vec::with_capacity(points.len());
        for point in points {
            let timestamp = point
                .start
                .timestamp_nanos_opt()
                .ok_or_else(|| anyhow!("timestamp out of range"))?;
            let data_point = DataPoint::builder(MEASUREMENT)
                .tag("series", meta.statistic_id.clone())
                .tag("kind", meta.kind.to_string())
                .tag("unit", meta.unit.to_string())
                .field("value", point.value)
                .timestamp(timestamp)
                .build()
                .map_err(|e| anyhow!("failed to build data point: {}", e))?;
            batch.push(data_point);
        }

        self.client
            .write(self.bucket.as_str(), stream::iter(batch))
            .await
            .with_context(|| format!("failed to write to series '{}'", meta.statistic_id))?;
        Ok(())
    }
}
