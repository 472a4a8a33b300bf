use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "well-server-rs",
        description = "Oil-well telemetry reporting API"
    ),
    paths(
        routes::health::healthz_handler,
        routes::devices::list_devices,
        routes::devices::get_device,
        routes::devices::latest_device_data,
        routes::devices::device_chart_data,
        routes::hierarchy::list_hierarchy,
        routes::hierarchy::hierarchy_chart_data,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::devices::DeviceResponse,
        routes::devices::LatestDataResponse,
        routes::devices::DevicePointResponse,
        routes::devices::DeviceSeriesResponse,
        routes::devices::SeriesSummaryResponse,
        routes::hierarchy::HierarchyNodeResponse,
        routes::hierarchy::SubtreePointResponse,
        routes::hierarchy::SubtreeSeriesResponse,
    )),
    tags(
        (name = "devices", description = "Device catalog and per-device reporting"),
        (name = "hierarchy", description = "Well hierarchy and subtree reporting")
    )
)]
pub struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_default()
}

async fn serve_openapi() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}
