use anyhow::Context;

use crate::summary::Calendar;

pub const DEFAULT_UTC_OFFSET: &str = "+00:00";

/// Runtime settings read from the environment (and an optional `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub utc_offset: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            utc_offset: std::env::var("ATTENDANCE_UTC_OFFSET")
                .unwrap_or_else(|_| DEFAULT_UTC_OFFSET.to_string()),
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")
    }

    /// Calendar convention for day bucketing; `override_offset` (from the
    /// command line) wins over the environment.
    pub fn calendar(&self, override_offset: Option<&str>) -> anyhow::Result<Calendar> {
        let offset = override_offset.unwrap_or(&self.utc_offset);
        Ok(Calendar::parse_offset(offset)?)
    }
}
