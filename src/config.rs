//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub forecast: ForecastConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser (empty means any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" for human-readable output, "gcp" for structured Cloud Logging
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Horizon used when a KPI request does not pass `days`
    pub default_days: u32,
    pub max_days: u32,
    /// Coverage of the confidence band, e.g. 0.8 for an 80% interval
    pub interval_width: f64,
    pub smoothing_level: f64,
    pub smoothing_trend: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
            forecast: ForecastConfig {
                default_days: 30,
                max_days: 365,
                interval_width: 0.8,
                smoothing_level: 0.5,
                smoothing_trend: 0.1,
            },
            ingest: IngestConfig {
                max_upload_bytes: 10 * 1024 * 1024,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Config::default();

        let builder = config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("forecast.default_days", defaults.forecast.default_days)?
            .set_default("forecast.max_days", defaults.forecast.max_days)?
            .set_default("forecast.interval_width", defaults.forecast.interval_width)?
            .set_default("forecast.smoothing_level", defaults.forecast.smoothing_level)?
            .set_default("forecast.smoothing_trend", defaults.forecast.smoothing_trend)?
            .set_default("ingest.max_upload_bytes", defaults.ingest.max_upload_bytes as u64)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("SALESBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid logging level '{}'. Must be one of: {:?}", self.logging.level, valid_levels);
        }
        if self.logging.format != "text" && self.logging.format != "gcp" {
            anyhow::bail!("Invalid logging format '{}'. Must be 'text' or 'gcp'", self.logging.format);
        }

        let forecast = &self.forecast;
        if forecast.max_days == 0 {
            anyhow::bail!("forecast.max_days must be at least 1");
        }
        if forecast.default_days == 0 || forecast.default_days > forecast.max_days {
            anyhow::bail!(
                "forecast.default_days must be between 1 and {} (got {})",
                forecast.max_days,
                forecast.default_days
            );
        }
        if !(forecast.interval_width > 0.0 && forecast.interval_width < 1.0) {
            anyhow::bail!("forecast.interval_width must be in (0, 1), got {}", forecast.interval_width);
        }
        for (name, value) in [
            ("smoothing_level", forecast.smoothing_level),
            ("smoothing_trend", forecast.smoothing_trend),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                anyhow::bail!("forecast.{} must be in (0, 1], got {}", name, value);
            }
        }

        if self.ingest.max_upload_bytes == 0 {
            anyhow::bail!("ingest.max_upload_bytes must be greater than 0");
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_default_horizon_beyond_max() {
        let mut config = Config::default();
        config.forecast.default_days = 400;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_degenerate_interval_width() {
        let mut config = Config::default();
        config.forecast.interval_width = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_smoothing() {
        let mut config = Config::default();
        config.forecast.smoothing_trend = 0.0;
        assert!(config.validate().is_err());
    }
}
