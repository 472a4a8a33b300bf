//! Chart data pipeline: resolve a hierarchy subtree, fetch the raw samples
//! for its devices, average per device per period, combine across devices
//! and emit a time-ordered series. Everything past the fetch is a pure
//! transformation over in-memory rows; the fetch itself is injected as a
//! [`source::SampleSource`] so the pipeline stays independent of storage.

pub mod aggregate;
pub mod combine;
pub mod hierarchy;
pub mod series;
pub mod source;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::time::{RangeTag, RangeWindow};
use aggregate::{aggregate_by_device, DeviceBucketAverage};
use combine::{combine, SubtreeBucketTotal};
use series::OrderedSeries;
use source::SampleSource;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("hierarchy node {0} not found")]
    NodeNotFound(i32),
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Single-device series: bucketing and per-device averaging only, no
/// subtree resolution or cross-device combining. An unknown device simply
/// has no samples and yields an empty series.
pub async fn device_series(
    source: &impl SampleSource,
    device_id: i32,
    tag: RangeTag,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<OrderedSeries<DeviceBucketAverage>, ChartError> {
    let window = RangeWindow::resolve(tag, now, tz);
    let samples = source
        .fetch_samples(&[device_id], window.start, window.end)
        .await?;
    Ok(series::format(aggregate_by_device(
        &samples,
        window.granularity,
        tz,
    )))
}

/// Full pipeline for a hierarchy node: every device assigned anywhere in
/// the node's subtree contributes, deduplicated by device id so a device
/// attached to several queried nodes is counted once.
pub async fn subtree_series(
    source: &impl SampleSource,
    node_id: i32,
    tag: RangeTag,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<OrderedSeries<SubtreeBucketTotal>, ChartError> {
    let window = RangeWindow::resolve(tag, now, tz);

    let edges = source.fetch_subtree_edges(node_id).await?;
    let nodes = hierarchy::resolve_subtree(node_id, &edges)?;
    let devices = source.fetch_devices_for_nodes(&nodes).await?;
    tracing::debug!(
        node_id,
        subtree_nodes = nodes.len(),
        devices = devices.len(),
        "resolved chart subtree"
    );
    if devices.is_empty() {
        return Ok(series::format(Vec::new()));
    }

    let samples = source
        .fetch_samples(&devices, window.start, window.end)
        .await?;
    let averages = aggregate_by_device(&samples, window.granularity, tz);
    Ok(series::format(combine(&averages)))
}
