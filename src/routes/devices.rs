use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::types::Json as SqlJson;

use crate::error::{map_chart_error, map_db_error};
use crate::services::charts;
use crate::services::charts::aggregate::DeviceBucketAverage;
use crate::services::charts::series::{OrderedSeries, SeriesSummary};
use crate::services::charts::source::PgSampleSource;
use crate::state::AppState;
use crate::time::RangeTag;

#[derive(sqlx::FromRow)]
pub(crate) struct DeviceRow {
    id: i32,
    company_id: i32,
    device_type_id: i32,
    serial_number: String,
    metadata: Option<SqlJson<JsonValue>>,
    created_at: chrono::DateTime<chrono::Utc>,
    device_type_name: String,
    company_name: String,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct DeviceResponse {
    pub(crate) id: i32,
    pub(crate) company_id: i32,
    pub(crate) device_type_id: i32,
    pub(crate) serial_number: String,
    pub(crate) metadata: Option<JsonValue>,
    pub(crate) created_at: String,
    pub(crate) device_type_name: String,
    pub(crate) company_name: String,
}

impl From<DeviceRow> for DeviceResponse {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            company_id: row.company_id,
            device_type_id: row.device_type_id,
            serial_number: row.serial_number,
            metadata: row.metadata.map(|value| value.0),
            created_at: row.created_at.to_rfc3339(),
            device_type_name: row.device_type_name,
            company_name: row.company_name,
        }
    }
}

const DEVICE_SELECT: &str = r#"
    SELECT
        d.id,
        d.company_id,
        d.device_type_id,
        d.serial_number,
        d.metadata,
        d.created_at,
        dt.type_name AS device_type_name,
        c.name AS company_name
    FROM device d
    JOIN device_type dt ON d.device_type_id = dt.id
    JOIN company c ON d.company_id = c.id
"#;

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct DeviceListQuery {
    company_id: i32,
}

#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "devices",
    params(("company_id" = i32, Query, description = "Company scope")),
    responses(
        (status = 200, description = "Devices for the company", body = Vec<DeviceResponse>)
    )
)]
pub(crate) async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<DeviceListQuery>,
) -> Result<Json<Vec<DeviceResponse>>, (StatusCode, String)> {
    let rows: Vec<DeviceRow> = sqlx::query_as(&format!(
        "{DEVICE_SELECT} WHERE d.company_id = $1 ORDER BY d.serial_number"
    ))
    .bind(params.company_id)
    .fetch_all(&state.db)
    .await
    .map_err(map_db_error)?;

    Ok(Json(rows.into_iter().map(DeviceResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/devices/{device_id}",
    tag = "devices",
    params(("device_id" = i32, Path, description = "Device id")),
    responses(
        (status = 200, description = "Device", body = DeviceResponse),
        (status = 404, description = "Unknown device")
    )
)]
pub(crate) async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
) -> Result<Json<DeviceResponse>, (StatusCode, String)> {
    let row: Option<DeviceRow> = sqlx::query_as(&format!("{DEVICE_SELECT} WHERE d.id = $1"))
        .bind(device_id)
        .fetch_optional(&state.db)
        .await
        .map_err(map_db_error)?;

    match row {
        Some(row) => Ok(Json(DeviceResponse::from(row))),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("device {device_id} not found"),
        )),
    }
}

#[derive(sqlx::FromRow)]
struct LatestDataRow {
    device_id: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    data: SqlJson<JsonValue>,
    serial_number: String,
    device_type: String,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct LatestDataResponse {
    pub(crate) device_id: i32,
    pub(crate) created_at: String,
    pub(crate) data: JsonValue,
    pub(crate) serial_number: String,
    pub(crate) device_type: String,
}

#[utoipa::path(
    get,
    path = "/api/devices/{device_id}/latest",
    tag = "devices",
    params(("device_id" = i32, Path, description = "Device id")),
    responses(
        (status = 200, description = "Most recent raw sample, or null when the device has none", body = Option<LatestDataResponse>)
    )
)]
pub(crate) async fn latest_device_data(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
) -> Result<Json<Option<LatestDataResponse>>, (StatusCode, String)> {
    let row: Option<LatestDataRow> = sqlx::query_as(
        r#"
        SELECT
            dd.device_id,
            dd.created_at,
            dd.data,
            d.serial_number,
            dt.type_name AS device_type
        FROM device_data dd
        JOIN device d ON dd.device_id = d.id
        JOIN device_type dt ON d.device_type_id = dt.id
        WHERE dd.device_id = $1
        ORDER BY dd.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .fetch_optional(&state.db)
    .await
    .map_err(map_db_error)?;

    Ok(Json(row.map(|row| LatestDataResponse {
        device_id: row.device_id,
        created_at: row.created_at.to_rfc3339(),
        data: row.data.0,
        serial_number: row.serial_number,
        device_type: row.device_type,
    })))
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct ChartQuery {
    /// hour | day | week | month; anything else behaves as "day".
    pub(crate) range: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct SeriesSummaryResponse {
    pub(crate) points: i64,
    pub(crate) earliest: String,
    pub(crate) latest: String,
    pub(crate) avg_device_count: f64,
}

impl From<SeriesSummary> for SeriesSummaryResponse {
    fn from(summary: SeriesSummary) -> Self {
        Self {
            points: summary.points,
            earliest: summary.earliest.to_rfc3339(),
            latest: summary.latest.to_rfc3339(),
            avg_device_count: summary.avg_device_count,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct DevicePointResponse {
    pub(crate) time_period: String,
    pub(crate) avg_gfr: Option<f64>,
    pub(crate) avg_gor: Option<f64>,
    pub(crate) avg_gvf: Option<f64>,
    pub(crate) avg_ofr: Option<f64>,
    pub(crate) avg_wfr: Option<f64>,
    pub(crate) avg_wlr: Option<f64>,
    pub(crate) avg_pressure: Option<f64>,
    pub(crate) avg_temp: Option<f64>,
    pub(crate) data_points: i64,
}

impl From<DeviceBucketAverage> for DevicePointResponse {
    fn from(point: DeviceBucketAverage) -> Self {
        Self {
            time_period: point.bucket.to_rfc3339(),
            avg_gfr: point.values.gfr,
            avg_gor: point.values.gor,
            avg_gvf: point.values.gvf,
            avg_ofr: point.values.ofr,
            avg_wfr: point.values.wfr,
            avg_wlr: point.values.wlr,
            avg_pressure: point.values.pressure,
            avg_temp: point.values.temperature,
            data_points: point.samples,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct DeviceSeriesResponse {
    pub(crate) points: Vec<DevicePointResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<SeriesSummaryResponse>,
}

impl From<OrderedSeries<DeviceBucketAverage>> for DeviceSeriesResponse {
    fn from(series: OrderedSeries<DeviceBucketAverage>) -> Self {
        Self {
            points: series
                .points
                .into_iter()
                .map(DevicePointResponse::from)
                .collect(),
            summary: series.summary.map(SeriesSummaryResponse::from),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/devices/{device_id}/chart-data",
    tag = "devices",
    params(
        ("device_id" = i32, Path, description = "Device id"),
        ("range" = Option<String>, Query, description = "hour | day | week | month (default day)")
    ),
    responses(
        (status = 200, description = "Per-period averages for one device", body = DeviceSeriesResponse)
    )
)]
pub(crate) async fn device_chart_data(
    State(state): State<AppState>,
    Path(device_id): Path<i32>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<DeviceSeriesResponse>, (StatusCode, String)> {
    let tag = RangeTag::parse(params.range.as_deref().unwrap_or("day"));
    let source = PgSampleSource::new(&state.db);
    let series = charts::device_series(
        &source,
        device_id,
        tag,
        state.config.report_timezone,
        Utc::now(),
    )
    .await
    .map_err(map_chart_error)?;

    Ok(Json(DeviceSeriesResponse::from(series)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/{device_id}", get(get_device))
        .route("/devices/{device_id}/latest", get(latest_device_data))
        .route("/devices/{device_id}/chart-data", get(device_chart_data))
}
