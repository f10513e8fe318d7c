//! Configuration for the load test.
//!
//! Configuration is read once at startup and merged from these sources, highest precedence
//! first:
//!
//! 1. The plain `HOST` and `HARD_MODE` environment variables
//! 2. Environment variables prefixed with `SCANLOAD__`
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! `HOST` sets the explorer API base URL and `HARD_MODE=1` switches to the high-volume address
//! pool. `HARD_MODE` is compared as text, so any value other than `1` (including `true`) keeps
//! the standard pool. Every other field uses the `SCANLOAD__` prefix with double underscores
//! (`__`) denoting nested structures:
//!
//! - `SCANLOAD__HTTP__TIMEOUT=5s` sets the request timeout
//! - `SCANLOAD__SCENARIO__ROW=25` sets the requested page size
//! - `SCANLOAD__LOGGING__LEVEL=debug` sets the log level
//!
//! # YAML Configuration File
//!
//! ```yaml
//! host: https://explorer.example.com
//! hard_mode: true
//!
//! http:
//!   timeout: 5s
//!
//! endpoints:
//!   - path: /api/scan/transfers
//!     field: transfers
//!   - path: /api/wallet/bond_list
//!     field: list
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::profile::{Stage, Thresholds, default_stages};
use crate::target::{Endpoint, HIGH_VOLUME_ADDRESSES, STANDARD_ADDRESSES, default_endpoints};

/// Environment variable prefix for all configuration options besides `HOST` and `HARD_MODE`.
const ENV_PREFIX: &str = "SCANLOAD__";

/// Unprefixed environment variables, kept for compatibility with existing run scripts.
const RAW_ENV_KEYS: &[&str] = &["host"];

/// Unprefixed flag selecting the high-volume address pool when set to exactly `1`.
const HARD_MODE_ENV: &str = "HARD_MODE";

/// Runtime configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the explorer API, without a trailing path.
    ///
    /// # Default
    ///
    /// `http://localhost:4399`
    ///
    /// # Environment Variable
    ///
    /// `HOST`
    pub host: String,

    /// Selects the high-volume address pool instead of the standard one.
    ///
    /// The plain `HARD_MODE` variable enables hard mode only when it is `1`; any other value
    /// disables it. YAML and `SCANLOAD__HARD_MODE` also accept booleans.
    ///
    /// # Environment Variable
    ///
    /// `HARD_MODE`
    #[serde(deserialize_with = "flag::deserialize")]
    pub hard_mode: bool,

    /// Request payload and pacing.
    pub scenario: Scenario,

    /// HTTP client options.
    pub http: Http,

    /// Address pools to draw from.
    pub addresses: Addresses,

    /// Endpoints to draw from. Only enabled entries are used.
    pub endpoints: Vec<Endpoint>,

    /// Ramp profile handed to the harness.
    pub stages: Vec<Stage>,

    /// Pass/fail thresholds handed to the harness.
    pub thresholds: Thresholds,

    /// Logging options.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "http://localhost:4399".to_owned(),
            hard_mode: false,
            scenario: Scenario::default(),
            http: Http::default(),
            addresses: Addresses::default(),
            endpoints: default_endpoints(),
            stages: default_stages(),
            thresholds: Thresholds::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if a value has the wrong
    /// type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(RAW_ENV_KEYS));

        // Read as text: the env provider would turn `true` into a boolean and `1.0` into a float.
        if let Some(value) = Env::var(HARD_MODE_ENV) {
            figment = figment.merge(Serialized::default("hard_mode", value == "1"));
        }

        let config = figment.extract()?;

        Ok(config)
    }
}

/// Request payload and pacing of a single iteration.
///
/// Used in: [`Config::scenario`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Scenario {
    /// Page size sent as `row`.
    pub row: u32,

    /// Page offset sent as `page`.
    pub page: u32,

    /// Pause at the end of every iteration.
    ///
    /// With the default of zero, a virtual user still yields to the runtime between
    /// iterations.
    #[serde(with = "humantime_serde")]
    pub think_time: Duration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            row: 10,
            page: 0,
            think_time: Duration::ZERO,
        }
    }
}

/// HTTP client options.
///
/// Used in: [`Config::http`]
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Http {
    /// Overall timeout of a request, including reading the body.
    ///
    /// Unset by default, which keeps the HTTP client's own behavior.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// The address pools.
///
/// Used in: [`Config::addresses`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Addresses {
    /// Addresses used in normal mode.
    pub standard: Vec<String>,

    /// Addresses used in hard mode.
    pub high_volume: Vec<String>,
}

impl Default for Addresses {
    fn default() -> Self {
        Self {
            standard: STANDARD_ADDRESSES.iter().map(|a| a.to_string()).collect(),
            high_volume: HIGH_VOLUME_ADDRESSES.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty output for terminals, simplified output otherwise.
    Auto,

    /// Colored, human readable output.
    Pretty,

    /// Plain text output without colors.
    Simplified,

    /// JSON lines.
    Json,
}

/// Logging configuration. Logs are always written to stderr.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// `RUST_LOG` overrides this when set.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Accepts booleans and the number `1` from YAML and `SCANLOAD__` variables.
mod flag {
    use std::fmt;

    use serde::de::{self, Visitor};

    struct FlagVisitor;

    impl Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or the flag value 1")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v == 1.0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            Ok(v.trim() == "1")
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(FlagVisitor)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_explorer_scenario() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();

            let config = Config::load(None).unwrap();

            assert_eq!(config.host, "http://localhost:4399");
            assert!(!config.hard_mode);
            assert_eq!(config.scenario.row, 10);
            assert_eq!(config.scenario.page, 0);
            assert_eq!(config.scenario.think_time, Duration::ZERO);
            assert_eq!(config.http.timeout, None);
            assert_eq!(config.addresses.standard.len(), 10);
            assert_eq!(config.addresses.high_volume.len(), 10);
            assert_eq!(config.endpoints, default_endpoints());
            assert_eq!(config.stages, default_stages());
            assert_eq!(config.thresholds, Thresholds::default());
            assert_eq!(config.logging.level, LevelFilter::INFO);

            Ok(())
        });
    }

    #[test]
    fn host_and_hard_mode_from_plain_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("HOST", "https://explorer.example.com");
            jail.set_env("HARD_MODE", "1");

            let config = Config::load(None).unwrap();

            assert_eq!(config.host, "https://explorer.example.com");
            assert!(config.hard_mode);

            Ok(())
        });
    }

    #[test]
    fn hard_mode_requires_exactly_one() {
        for (value, expected) in [
            ("1", true),
            (" 1 ", true),
            ("0", false),
            ("2", false),
            ("yes", false),
            ("true", false),
            ("1.0", false),
            ("0.5", false),
            ("[1]", false),
            ("{a=1}", false),
            ("", false),
        ] {
            figment::Jail::expect_with(|jail| {
                jail.clear_env();
                jail.set_env("HARD_MODE", value);

                let config = Config::load(None).unwrap();
                assert_eq!(config.hard_mode, expected, "HARD_MODE={value}");

                Ok(())
            });
        }
    }

    #[test]
    fn prefixed_hard_mode_accepts_flag_values() {
        for (value, expected) in [("true", true), ("1", true), ("1.0", true), ("0.5", false)] {
            figment::Jail::expect_with(|jail| {
                jail.clear_env();
                jail.set_env("SCANLOAD__HARD_MODE", value);

                let config = Config::load(None).unwrap();
                assert_eq!(config.hard_mode, expected, "SCANLOAD__HARD_MODE={value}");

                Ok(())
            });
        }
    }

    #[test]
    fn configurable_via_prefixed_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SCANLOAD__HTTP__TIMEOUT", "5s");
            jail.set_env("SCANLOAD__SCENARIO__ROW", "25");
            jail.set_env("SCANLOAD__SCENARIO__THINK_TIME", "250ms");
            jail.set_env("SCANLOAD__LOGGING__LEVEL", "debug");
            jail.set_env("SCANLOAD__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(config.http.timeout, Some(Duration::from_secs(5)));
            assert_eq!(config.scenario.row, 25);
            assert_eq!(config.scenario.think_time, Duration::from_millis(250));
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            host: http://localhost:8080
            hard_mode: true
            addresses:
                standard:
                    - "14priV85dNut4Vfk6h59LV3DUMcGk8VrRQCinFQXXSEAGNNk"
            endpoints:
                - path: /api/scan/transfers
                  field: transfers
                - path: /api/wallet/bond_list
                  field: list
                  enabled: false
            stages:
                - duration: 30s
                  target: 5
            thresholds:
                http_req_duration_p95: 2s
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.clear_env();

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.host, "http://localhost:8080");
            assert!(config.hard_mode);
            assert_eq!(
                config.addresses.standard,
                ["14priV85dNut4Vfk6h59LV3DUMcGk8VrRQCinFQXXSEAGNNk"]
            );
            // Unset nested fields keep their defaults.
            assert_eq!(config.addresses.high_volume.len(), 10);
            assert_eq!(config.endpoints.len(), 2);
            assert!(!config.endpoints[1].enabled);
            assert_eq!(
                config.stages,
                [Stage::new(Duration::from_secs(30), 5)]
            );
            assert_eq!(
                config.thresholds.http_req_duration_p95,
                Duration::from_secs(2)
            );
            assert_eq!(config.thresholds.exception_rate, 0.1);

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            host: http://localhost:8080
            hard_mode: true
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("HOST", "http://localhost:9001");
            jail.set_env("HARD_MODE", "0");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.host, "http://localhost:9001");
            assert!(!config.hard_mode);

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_log_format() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SCANLOAD__LOGGING__FORMAT", "xml");

            assert!(Config::load(None).is_err());

            Ok(())
        });
    }
}
