//! Configuration loading and validation for the API host.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid,
//! including unusable encryption secrets.

use anyhow::{Context, Result};
use fieldcrypt::{ExcludedPaths, IvMode, SecretMaterial};
use serde::Deserialize;

use crate::server::middleware::DEFAULT_MAX_RESPONSE_BYTES;

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Hex-encoded 256-bit encryption key. **Required.**
    pub encryption_key: String,

    /// Hex-encoded 96-bit initialisation vector. **Required.**
    pub encryption_iv: String,

    /// `fixed` (process-wide IV) or `per-value` (random IV stored in each token).
    #[serde(default)]
    pub iv_mode: IvMode,

    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Largest JSON response body, in bytes, the decryption layer buffers.
    /// Larger bodies are sent without decryption.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Comma-separated path prefixes the response decryption layer skips.
    #[serde(default = "default_excluded_path_prefixes")]
    pub excluded_path_prefixes: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}
fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}
fn default_excluded_path_prefixes() -> String {
    "/auth".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed,
    /// or if the encryption secrets are malformed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Parse the encryption secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if either secret is blank, not hex, or the wrong length.
    pub fn secret_material(&self) -> Result<SecretMaterial> {
        SecretMaterial::from_hex(&self.encryption_key, &self.encryption_iv)
            .context("invalid encryption secret material")
    }

    /// Path exclusions for the response decryption layer.
    pub fn excluded_paths(&self) -> ExcludedPaths {
        ExcludedPaths::from_prefixes(self.excluded_path_prefixes.split(','))
    }

    /// The OTLP endpoint, if one is configured and non-blank.
    pub fn otlp_endpoint(&self) -> Option<&str> {
        self.otel_exporter_otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        self.secret_material()?;
        if self.listen_port == 0 {
            anyhow::bail!("LISTEN_PORT must be > 0");
        }
        if self.max_response_bytes == 0 {
            anyhow::bail!("MAX_RESPONSE_BYTES must be > 0");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("encryption_key", &"[REDACTED]")
            .field("encryption_iv", &"[REDACTED]")
            .field("iv_mode", &self.iv_mode)
            .field("listen_port", &self.listen_port)
            .field("log_level", &self.log_level)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("excluded_path_prefixes", &self.excluded_path_prefixes)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const KEY_HEX: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    pub(crate) const IV_HEX: &str = "a0a1a2a3a4a5a6a7a8a9aaab";

    pub(crate) fn valid_config() -> Config {
        Config {
            encryption_key: KEY_HEX.into(),
            encryption_iv: IV_HEX.into(),
            iv_mode: IvMode::Fixed,
            listen_port: default_listen_port(),
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
            max_response_bytes: default_max_response_bytes(),
            excluded_path_prefixes: default_excluded_path_prefixes(),
        }
    }

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_listen_port(), 8080);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_excluded_path_prefixes(), "/auth");
        assert_eq!(IvMode::default(), IvMode::Fixed);
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_key() {
        let cfg = Config {
            encryption_key: "".into(),
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_short_iv() {
        let cfg = Config {
            encryption_iv: "a0a1a2a3".into(),
            ..valid_config()
        };
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("ENCRYPTION_IV"));
    }

    #[test]
    fn validate_rejects_non_hex_key() {
        let cfg = Config {
            encryption_key: "k".repeat(64),
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_response_limit() {
        let cfg = Config {
            max_response_bytes: 0,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_port() {
        let cfg = Config {
            listen_port: 0,
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn excluded_paths_split_on_commas() {
        let cfg = Config {
            excluded_path_prefixes: "/auth, /webhooks/".into(),
            ..valid_config()
        };
        let excluded = cfg.excluded_paths();
        assert!(excluded.is_excluded("/auth/login"));
        assert!(excluded.is_excluded("/webhooks/billing"));
        assert!(!excluded.is_excluded("/clients"));
    }

    #[test]
    fn blank_otlp_endpoint_is_disabled() {
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("  ".into()),
            ..valid_config()
        };
        assert_eq!(cfg.otlp_endpoint(), None);
        let cfg = Config {
            otel_exporter_otlp_endpoint: Some("http://collector:4317".into()),
            ..valid_config()
        };
        assert_eq!(cfg.otlp_endpoint(), Some("http://collector:4317"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let printed = format!("{:?}", valid_config());
        assert!(!printed.contains(KEY_HEX));
        assert!(!printed.contains(IV_HEX));
    }
}
