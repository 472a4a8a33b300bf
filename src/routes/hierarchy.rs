use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::error::{map_chart_error, map_db_error};
use crate::routes::devices::{ChartQuery, SeriesSummaryResponse};
use crate::services::charts;
use crate::services::charts::combine::SubtreeBucketTotal;
use crate::services::charts::series::OrderedSeries;
use crate::services::charts::source::PgSampleSource;
use crate::state::AppState;
use crate::time::RangeTag;

#[derive(sqlx::FromRow)]
struct HierarchyNodeRow {
    id: i32,
    name: String,
    company_id: i32,
    parent_id: Option<i32>,
    level_name: String,
    level_order: i32,
    device_count: i64,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct HierarchyNodeResponse {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) company_id: i32,
    pub(crate) parent_id: Option<i32>,
    pub(crate) level_name: String,
    pub(crate) level_order: i32,
    pub(crate) device_count: i64,
}

impl From<HierarchyNodeRow> for HierarchyNodeResponse {
    fn from(row: HierarchyNodeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            company_id: row.company_id,
            parent_id: row.parent_id,
            level_name: row.level_name,
            level_order: row.level_order,
            device_count: row.device_count,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub(crate) struct HierarchyListQuery {
    company_id: i32,
}

#[utoipa::path(
    get,
    path = "/api/hierarchy",
    tag = "hierarchy",
    params(("company_id" = i32, Query, description = "Company scope")),
    responses(
        (status = 200, description = "Hierarchy nodes with directly attached device counts", body = Vec<HierarchyNodeResponse>)
    )
)]
pub(crate) async fn list_hierarchy(
    State(state): State<AppState>,
    Query(params): Query<HierarchyListQuery>,
) -> Result<Json<Vec<HierarchyNodeResponse>>, (StatusCode, String)> {
    let rows: Vec<HierarchyNodeRow> = sqlx::query_as(
        r#"
        SELECT
            h.id,
            h.name,
            h.company_id,
            h.parent_id,
            hl.name AS level_name,
            hl.level_order,
            COUNT(DISTINCT hd.device_id) AS device_count
        FROM hierarchy h
        JOIN hierarchy_level hl ON h.level_id = hl.id
        LEFT JOIN hierarchy_device hd ON hd.hierarchy_id = h.id
        WHERE h.company_id = $1
        GROUP BY h.id, h.name, h.company_id, h.parent_id, hl.name, hl.level_order
        ORDER BY hl.level_order, h.name
        "#,
    )
    .bind(params.company_id)
    .fetch_all(&state.db)
    .await
    .map_err(map_db_error)?;

    Ok(Json(
        rows.into_iter().map(HierarchyNodeResponse::from).collect(),
    ))
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct SubtreePointResponse {
    pub(crate) time_period: String,
    pub(crate) total_gfr: f64,
    pub(crate) total_gor: f64,
    pub(crate) total_ofr: f64,
    pub(crate) total_wfr: f64,
    pub(crate) total_gvf: f64,
    pub(crate) total_wlr: f64,
    pub(crate) avg_pressure: Option<f64>,
    pub(crate) avg_temp: Option<f64>,
    pub(crate) device_count: i64,
}

impl From<SubtreeBucketTotal> for SubtreePointResponse {
    fn from(point: SubtreeBucketTotal) -> Self {
        Self {
            time_period: point.bucket.to_rfc3339(),
            total_gfr: point.total_gfr,
            total_gor: point.total_gor,
            total_ofr: point.total_ofr,
            total_wfr: point.total_wfr,
            total_gvf: point.total_gvf,
            total_wlr: point.total_wlr,
            avg_pressure: point.avg_pressure,
            avg_temp: point.avg_temp,
            device_count: point.device_count,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub(crate) struct SubtreeSeriesResponse {
    pub(crate) points: Vec<SubtreePointResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<SeriesSummaryResponse>,
}

impl From<OrderedSeries<SubtreeBucketTotal>> for SubtreeSeriesResponse {
    fn from(series: OrderedSeries<SubtreeBucketTotal>) -> Self {
        Self {
            points: series
                .points
                .into_iter()
                .map(SubtreePointResponse::from)
                .collect(),
            summary: series.summary.map(SeriesSummaryResponse::from),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/hierarchy/{node_id}/chart-data",
    tag = "hierarchy",
    params(
        ("node_id" = i32, Path, description = "Root of the subtree to report on"),
        ("range" = Option<String>, Query, description = "hour | day | week | month (default day)")
    ),
    responses(
        (status = 200, description = "Per-period production totals for every device under the node", body = SubtreeSeriesResponse),
        (status = 404, description = "Unknown hierarchy node")
    )
)]
pub(crate) async fn hierarchy_chart_data(
    State(state): State<AppState>,
    Path(node_id): Path<i32>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<SubtreeSeriesResponse>, (StatusCode, String)> {
    let tag = RangeTag::parse(params.range.as_deref().unwrap_or("day"));
    let source = PgSampleSource::new(&state.db);
    let series = charts::subtree_series(
        &source,
        node_id,
        tag,
        state.config.report_timezone,
        Utc::now(),
    )
    .await
    .map_err(map_chart_error)?;

    Ok(Json(SubtreeSeriesResponse::from(series)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hierarchy", get(list_hierarchy))
        .route("/hierarchy/{node_id}/chart-data", get(hierarchy_chart_data))
}
