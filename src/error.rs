use axum::http::StatusCode;

use crate::services::charts::ChartError;

pub fn map_db_error(err: sqlx::Error) -> (StatusCode, String) {
    let status = match &err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => StatusCode::CONFLICT,    // unique_violation
            Some("23503") => StatusCode::BAD_REQUEST, // foreign_key_violation
            Some("23502") => StatusCode::BAD_REQUEST, // not_null_violation
            Some("22P02") => StatusCode::BAD_REQUEST, // invalid_text_representation
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!(error = %err, status = %status, "database error");

    let message = match status {
        StatusCode::NOT_FOUND => "Resource not found",
        StatusCode::CONFLICT => "Resource already exists",
        StatusCode::BAD_REQUEST => "Invalid request",
        _ => "Database error",
    };

    (status, message.to_string())
}

/// Boundary mapping for the chart pipeline: a missing hierarchy node is the
/// caller's problem (404); a broken hierarchy is ours (500) and is logged
/// loudly rather than truncated into a partial answer.
pub fn map_chart_error(err: ChartError) -> (StatusCode, String) {
    match err {
        ChartError::NodeNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ChartError::DataIntegrity(_) => {
            tracing::error!(error = %err, "hierarchy integrity failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        ChartError::Db(db_err) => map_db_error(db_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_not_found_maps_to_404() {
        let (status, message) = map_chart_error(ChartError::NodeNotFound(42));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(message.contains("42"));
    }

    #[test]
    fn data_integrity_maps_to_500_with_detail() {
        let (status, message) =
            map_chart_error(ChartError::DataIntegrity("cycle at node 3".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(message.contains("cycle at node 3"));
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let (status, _) = map_chart_error(ChartError::Db(sqlx::Error::RowNotFound));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
