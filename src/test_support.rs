use crate::config::AppConfig;
use crate::db;
use crate::state::AppState;

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        report_timezone: chrono_tz::UTC,
        db_max_connections: 4,
    }
}

/// State backed by a lazy pool; no connection is made until a query runs,
/// so router tests that never touch the database work without Postgres.
pub fn test_state() -> AppState {
    let config = test_config();
    let db = db::connect_lazy(&config.database_url, config.db_max_connections)
        .expect("lazy pool from a well-formed url");
    AppState { config, db }
}
