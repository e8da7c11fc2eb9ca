use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::extract::SITE_BASE;

const ENV_PREFIX: &str = "ALPINE";
const DEFAULT_DB_PATH: &str = "database/alpine_routes.db";
const DEFAULT_PORT: i64 = 8000;

/// Service settings: built-in defaults, then `ALPINE_*` variables.
/// A bare `PORT` variable replaces the default port.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub site_base: String,
    pub fetch_timeout_secs: u64,
    pub fetch_concurrency: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_sources(None, std::env::var("PORT").ok())
    }

    /// `env` replaces the process environment when given.
    fn from_sources(env: Option<HashMap<String, String>>, port: Option<String>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("host", "0.0.0.0")?
            .set_default("site_base", SITE_BASE)?
            .set_default("fetch_timeout_secs", 30_i64)?
            .set_default("fetch_concurrency", 4_i64)?;
        let builder = match port {
            Some(p) => builder.set_default("port", p)?,
            None => builder.set_default("port", DEFAULT_PORT)?,
        };

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true).source(env))
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn defaults() {
        let s = Settings::from_sources(env(&[]), None).unwrap();
        assert_eq!(s.db_path, PathBuf::from("database/alpine_routes.db"));
        assert_eq!(s.bind_addr(), "0.0.0.0:8000");
        assert_eq!(s.site_base, "https://mountain.kz/");
        assert_eq!(s.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(s.fetch_concurrency, 4);
    }

    #[test]
    fn port_variable_sets_default_port() {
        let s = Settings::from_sources(env(&[]), Some("9100".into())).unwrap();
        assert_eq!(s.port, 9100);
    }

    #[test]
    fn prefixed_variables_override() {
        let s = Settings::from_sources(
            env(&[
                ("ALPINE_PORT", "7000"),
                ("ALPINE_DB_PATH", "/var/lib/routes.db"),
                ("ALPINE_FETCH_CONCURRENCY", "1"),
            ]),
            Some("9100".into()),
        )
        .unwrap();
        assert_eq!(s.port, 7000);
        assert_eq!(s.db_path, PathBuf::from("/var/lib/routes.db"));
        assert_eq!(s.fetch_concurrency, 1);
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Settings::from_sources(env(&[("ALPINE_PORT", "not-a-port")]), None).unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }
}
