//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use reqwest::Url;

use hygieia_core::{
    geo::DEFAULT_RADIUS_KM,
    service::{MissingTargetPolicy, ServiceSettings},
};

/// Runtime configuration of the HTTP service.
#[derive(Debug, Clone, Parser)]
#[command(name = "hygieia", version, about = "Find, rank, and update public toilets over HTTP")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "HYGIEIA_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// JSON file holding the facility collection.
    #[arg(long, env = "HYGIEIA_DATABASE", default_value = "database.json")]
    pub database: PathBuf,

    /// Search radius of `/nearby` and `/recommend`, in kilometers.
    #[arg(long, env = "HYGIEIA_RADIUS_KM", default_value_t = DEFAULT_RADIUS_KM)]
    pub radius_km: f64,

    /// Behaviour of updates addressed to an unknown facility id.
    #[arg(long, env = "HYGIEIA_MISSING_TARGET", value_enum, default_value_t = MissingTarget::Reject)]
    pub missing_target: MissingTarget,

    /// Inference endpoint for image analysis; the built-in placeholder is used when unset.
    #[arg(long, env = "HYGIEIA_SCORER_URL")]
    pub scorer_url: Option<Url>,

    /// Log filter, overridden by `RUST_LOG`.
    #[arg(long, env = "HYGIEIA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log line format.
    #[arg(long, env = "HYGIEIA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// CLI spelling of [`MissingTargetPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingTarget {
    /// Answer 404 with a `not_found` error.
    Reject,
    /// Answer as if the update succeeded.
    Ignore,
}

impl From<MissingTarget> for MissingTargetPolicy {
    fn from(value: MissingTarget) -> Self {
        match value {
            MissingTarget::Reject => Self::Reject,
            MissingTarget::Ignore => Self::Ignore,
        }
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single lines.
    Compact,
    /// One JSON object per line.
    Json,
}

impl Config {
    /// Facade settings derived from this configuration.
    ///
    /// # Errors
    ///
    /// Fails when the radius is not a positive, finite number.
    pub fn service_settings(&self) -> Result<ServiceSettings> {
        if !self.radius_km.is_finite() || self.radius_km <= 0.0 {
            bail!("--radius-km must be a positive number of kilometers (got {})", self.radius_km);
        }
        Ok(ServiceSettings {
            default_radius_km: self.radius_km,
            missing_target: self.missing_target.into(),
            ..ServiceSettings::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["hygieia"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8000".parse().unwrap());
        assert_eq!(config.database, PathBuf::from("database.json"));
        assert_eq!(config.missing_target, MissingTarget::Reject);
        assert!(config.scorer_url.is_none());

        let settings = config.service_settings().unwrap();
        assert!((settings.default_radius_km - 2.0).abs() < f64::EPSILON);
        assert_eq!(settings.missing_target, MissingTargetPolicy::Reject);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "hygieia",
            "--radius-km",
            "0.5",
            "--missing-target",
            "ignore",
            "--scorer-url",
            "http://127.0.0.1:9000/infer",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.scorer_url.as_ref().map(Url::path), Some("/infer"));
        let settings = config.service_settings().unwrap();
        assert_eq!(settings.missing_target, MissingTargetPolicy::Ignore);
    }

    #[test]
    fn rejects_non_positive_radius() {
        let config = Config::try_parse_from(["hygieia", "--radius-km", "0"]).unwrap();
        assert!(config.service_settings().is_err());
    }
}
