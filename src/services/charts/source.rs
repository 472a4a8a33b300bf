use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ChartError;

/// One measured quantity set as stored on a raw sample. Any field may be
/// absent on a given sample; absent values are excluded from per-device
/// averaging rather than read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantityValues {
    pub gfr: Option<f64>,
    pub gor: Option<f64>,
    pub gvf: Option<f64>,
    pub ofr: Option<f64>,
    pub wfr: Option<f64>,
    pub wlr: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
}

/// A timestamped measurement reported by one device.
#[derive(Debug, Clone, Copy)]
pub struct RawSample {
    pub device_id: i32,
    pub ts: DateTime<Utc>,
    pub values: QuantityValues,
}

/// One hierarchy node with its stored parent reference.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEdge {
    pub id: i32,
    pub parent_id: Option<i32>,
}

/// Capability the chart pipeline uses to reach stored rows. The pipeline
/// itself never touches the database; handlers inject a source per request.
#[allow(async_fn_in_trait)]
pub trait SampleSource {
    /// Edge enumeration covering at least the company subtree of `root`.
    /// An unknown root yields an enumeration that does not contain it.
    async fn fetch_subtree_edges(&self, root: i32) -> Result<Vec<HierarchyEdge>, ChartError>;

    /// Distinct ids of devices assigned to any of `nodes`. Deduplicated:
    /// a device attached to several of the nodes appears once.
    async fn fetch_devices_for_nodes(&self, nodes: &[i32]) -> Result<Vec<i32>, ChartError>;

    /// All samples for `devices` with timestamps in `[start, end)`. The
    /// source filters exactly to the requested devices; the pipeline trusts
    /// that and does not re-filter.
    async fn fetch_samples(
        &self,
        devices: &[i32],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, ChartError>;
}

/// Postgres-backed sample source reading the hierarchy/device/device_data
/// tables. Quantities live in a JSONB column keyed by the meter's field
/// names (`GFR`, `OFR`, `PressureAvg`, ...).
pub struct PgSampleSource<'a> {
    db: &'a PgPool,
}

impl<'a> PgSampleSource<'a> {
    pub fn new(db: &'a PgPool) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: i32,
    parent_id: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct SampleRow {
    device_id: i32,
    created_at: DateTime<Utc>,
    gfr: Option<f64>,
    gor: Option<f64>,
    gvf: Option<f64>,
    ofr: Option<f64>,
    wfr: Option<f64>,
    wlr: Option<f64>,
    pressure: Option<f64>,
    temperature: Option<f64>,
}

impl From<SampleRow> for RawSample {
    fn from(row: SampleRow) -> Self {
        RawSample {
            device_id: row.device_id,
            ts: row.created_at,
            values: QuantityValues {
                gfr: row.gfr,
                gor: row.gor,
                gvf: row.gvf,
                ofr: row.ofr,
                wfr: row.wfr,
                wlr: row.wlr,
                pressure: row.pressure,
                temperature: row.temperature,
            },
        }
    }
}

impl SampleSource for PgSampleSource<'_> {
    async fn fetch_subtree_edges(&self, root: i32) -> Result<Vec<HierarchyEdge>, ChartError> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT h.id, h.parent_id
            FROM hierarchy h
            WHERE h.company_id = (SELECT company_id FROM hierarchy WHERE id = $1)
            "#,
        )
        .bind(root)
        .fetch_all(self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HierarchyEdge {
                id: row.id,
                parent_id: row.parent_id,
            })
            .collect())
    }

    async fn fetch_devices_for_nodes(&self, nodes: &[i32]) -> Result<Vec<i32>, ChartError> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let devices: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT hd.device_id
            FROM hierarchy_device hd
            WHERE hd.hierarchy_id = ANY($1)
            ORDER BY hd.device_id
            "#,
        )
        .bind(nodes)
        .fetch_all(self.db)
        .await?;

        Ok(devices)
    }

    async fn fetch_samples(
        &self,
        devices: &[i32],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, ChartError> {
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<SampleRow> = sqlx::query_as(
            r#"
            SELECT
                dd.device_id,
                dd.created_at,
                (dd.data->>'GFR')::double precision AS gfr,
                (dd.data->>'GOR')::double precision AS gor,
                (dd.data->>'GVF')::double precision AS gvf,
                (dd.data->>'OFR')::double precision AS ofr,
                (dd.data->>'WFR')::double precision AS wfr,
                (dd.data->>'WLR')::double precision AS wlr,
                (dd.data->>'PressureAvg')::double precision AS pressure,
                (dd.data->>'TemperatureAvg')::double precision AS temperature
            FROM device_data dd
            WHERE dd.device_id = ANY($1)
              AND dd.created_at >= $2
              AND dd.created_at < $3
            "#,
        )
        .bind(devices)
        .bind(start)
        .bind(end)
        .fetch_all(self.db)
        .await?;

        Ok(rows.into_iter().map(RawSample::from).collect())
    }
}
