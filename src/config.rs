//! App configuration.
//!
//! Everything an [`App`](crate::app::App) needs beyond its collaborators:
//! the URL template, host/prefix for generated URLs, the token-signing
//! secret, and remote-fetch limits. Loadable from TOML; all keys optional.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! url_format = "/:job/:name"   # URL template with :placeholder segments
//! # url_host = "http://media.example.com"
//! # url_path_prefix = "/media"
//! secret = ""                  # key for the token SHA (set when verifying)
//! verify_urls = false          # append ?sha=... to generated URLs
//!
//! [fetch]
//! user_agent = "urlpipe/..."   # defaults to this crate's name/version
//! timeout_secs = 30
//! max_redirects = 10
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// App configuration. All fields have defaults; config files only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// URL template. Literal characters plus `:placeholder` segments,
    /// e.g. `/:job/:basename.:ext`.
    pub url_format: String,
    /// Scheme and host prepended to generated URLs, e.g.
    /// `http://media.example.com`. Overridable per URL with the `host` key.
    pub url_host: Option<String>,
    /// Path mounted before the template, e.g. `/media`.
    pub url_path_prefix: Option<String>,
    /// Key mixed into the token digest. Anyone holding it can mint valid
    /// SHAs, so treat it like a credential.
    pub secret: String,
    /// When set, generated URLs carry their token SHA as a `sha` query
    /// parameter so a serving layer can reject tampered tokens.
    pub verify_urls: bool,
    /// Remote fetch limits.
    pub fetch: FetchConfig,
}

fn default_url_format() -> String {
    "/:job/:name".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url_format: default_url_format(),
            url_host: None,
            url_path_prefix: None,
            secret: String::new(),
            verify_urls: false,
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.url_format.starts_with('/') {
            return Err(ConfigError::Validation(
                "url_format must start with '/'".into(),
            ));
        }
        if self.verify_urls && self.secret.is_empty() {
            return Err(ConfigError::Validation(
                "verify_urls requires a non-empty secret".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Remote fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// User-Agent header sent with remote fetches.
    pub user_agent: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Redirect-follow bound; exceeding it fails the fetch.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("urlpipe/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_redirects: 10,
        }
    }
}

/// Load config from a TOML file. A missing file yields the defaults;
/// an existing file is parsed sparsely, rejecting unknown keys, and
/// validated.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.url_format, "/:job/:name");
        assert_eq!(config.url_host, None);
        assert_eq!(config.secret, "");
        assert!(!config.verify_urls);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.max_redirects, 10);
        assert!(config.fetch.user_agent.starts_with("urlpipe/"));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
url_format = "/media/:job/:basename.:ext"
secret = "hush"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.url_format, "/media/:job/:basename.:ext");
        assert_eq!(config.secret, "hush");
        // Unspecified values stay at defaults
        assert_eq!(config.fetch.max_redirects, 10);
        assert!(!config.verify_urls);
    }

    #[test]
    fn parse_fetch_section() {
        let toml = r#"
[fetch]
user_agent = "test-agent/1"
timeout_secs = 5
max_redirects = 2
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.fetch.user_agent, "test-agent/1");
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.max_redirects, 2);
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<AppConfig, _> = toml::from_str(r#"url_fmt = "/:job""#);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let toml = r#"
[fetch]
timeout = 5
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_relative_url_format() {
        let config = AppConfig {
            url_format: ":job/:name".to_string(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("url_format"));
    }

    #[test]
    fn validate_verify_urls_needs_secret() {
        let mut config = AppConfig {
            verify_urls: true,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));

        config.secret = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_timeout_rejected() {
        let config = AppConfig {
            fetch: FetchConfig {
                timeout_secs: 0,
                ..FetchConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("urlpipe.toml")).unwrap();
        assert_eq!(config.url_format, "/:job/:name");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("urlpipe.toml");
        fs::write(&path, "secret = \"from-file\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.secret, "from-file");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("urlpipe.toml");
        fs::write(&path, "not valid toml [[[").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("urlpipe.toml");
        fs::write(&path, "verify_urls = true\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }
}
