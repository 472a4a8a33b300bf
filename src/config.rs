use anyhow::{Context, Result};
use chrono_tz::Tz;

/// Runtime configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Zone in which sample timestamps are truncated into chart buckets.
    /// Fixed per process: day boundaries (and the "day" range window) move
    /// with this zone, so every request must bucket in the same one.
    pub report_timezone: Tz,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env_optional_string("WELL_DATABASE_URL")
            .or_else(|| env_optional_string("DATABASE_URL"))
            .context("WELL_DATABASE_URL (or DATABASE_URL) must be set")?;

        let report_timezone = parse_timezone(&env_string("WELL_REPORT_TIMEZONE", "UTC"))?;
        let db_max_connections = env_u32("WELL_DB_MAX_CONNECTIONS", 10);

        Ok(Self {
            database_url,
            report_timezone,
            db_max_connections,
        })
    }
}

fn parse_timezone(raw: &str) -> Result<Tz> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|err| anyhow::anyhow!("invalid WELL_REPORT_TIMEZONE {raw:?}: {err}"))
}

fn env_string(key: &str, default: &str) -> String {
    env_optional_string(key).unwrap_or_else(|| default.to_string())
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_optional_string(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iana_timezones() {
        assert_eq!(parse_timezone("UTC").unwrap(), chrono_tz::UTC);
        assert_eq!(
            parse_timezone(" Asia/Riyadh ").unwrap(),
            chrono_tz::Asia::Riyadh
        );
    }

    #[test]
    fn rejects_unknown_timezone_names() {
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(err.to_string().contains("WELL_REPORT_TIMEZONE"));
    }
}
