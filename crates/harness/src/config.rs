//! Harness configuration.
//!
//! Supports command line arguments, environment variables and programmatic
//! construction.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `POSTCHECK_BASE_URL` | http://localhost:3000 | Resource server base URL |
//! | `POSTCHECK_DB_PATH` | (unset) | Store file read by the live-state oracle |
//! | `POSTCHECK_BASELINE` | (embedded) | Baseline snapshot file |
//! | `POSTCHECK_EMAIL` | test@example.com | Email of the suite principal |
//! | `POSTCHECK_PASSWORD` | password123 | Password of the suite principal |
//! | `POSTCHECK_LOG_LEVEL` | info | Log level |
//! | `POSTCHECK_REQUEST_TIMEOUT` | (unset) | Per-request timeout (seconds) |
//! | `POSTCHECK_STRICT_MISSING_UPDATE` | false | Expect 404 for PUT on a missing post |
//!
//! # Example
//!
//! ```rust
//! use postcheck_harness::HarnessConfig;
//!
//! let config = HarnessConfig {
//!     base_url: "http://127.0.0.1:4000".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use crate::baseline::Baseline;
use crate::error::BaselineError;
use crate::model::PrincipalDescriptor;

/// How a PUT to a post that does not exist is expected to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingUpdatePolicy {
    /// 200 with an empty body, as the reference server answers.
    #[default]
    Compatible,
    /// 404 with an empty body, consistent with PATCH and DELETE.
    Strict,
}

/// Configuration for a suite run.
#[derive(Debug, Clone, Args)]
pub struct HarnessConfig {
    /// Base URL of the resource server.
    #[arg(long, env = "POSTCHECK_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Store file of the resource server, read directly as a second oracle.
    #[arg(long, env = "POSTCHECK_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Baseline snapshot file. The embedded snapshot is used when unset.
    #[arg(long, env = "POSTCHECK_BASELINE")]
    pub baseline: Option<PathBuf>,

    /// Email of the principal registered for the run.
    #[arg(long, env = "POSTCHECK_EMAIL", default_value = "test@example.com")]
    pub email: String,

    /// Password of the principal registered for the run.
    #[arg(long, env = "POSTCHECK_PASSWORD", default_value = "password123", hide_env_values = true)]
    pub password: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "POSTCHECK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Per-request timeout in seconds. Unset leaves the transport default.
    #[arg(long, env = "POSTCHECK_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Expect 404 instead of an empty 200 for PUT on a missing post.
    #[arg(long, env = "POSTCHECK_STRICT_MISSING_UPDATE", default_value = "false")]
    pub strict_missing_update: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            db_path: None,
            baseline: None,
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            log_level: "info".to_string(),
            request_timeout: None,
            strict_missing_update: false,
        }
    }
}

impl HarnessConfig {
    /// Creates a configuration pointing at a test server.
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            log_level: "debug".to_string(),
            request_timeout: Some(5),
            ..Default::default()
        }
    }

    pub fn principal(&self) -> PrincipalDescriptor {
        PrincipalDescriptor::new(self.email.clone(), self.password.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }

    pub fn missing_update_policy(&self) -> MissingUpdatePolicy {
        if self.strict_missing_update {
            MissingUpdatePolicy::Strict
        } else {
            MissingUpdatePolicy::Compatible
        }
    }

    /// Loads the configured baseline, or the embedded one.
    pub fn load_baseline(&self) -> Result<Baseline, BaselineError> {
        match &self.baseline {
            Some(path) => Baseline::from_file(path),
            None => Baseline::embedded(),
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match Url::parse(&self.base_url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => {
                errors.push(format!("Base URL must use http or https: {}", self.base_url));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("Invalid base URL {}: {}", self.base_url, e)),
        }

        if self.email.trim().is_empty() {
            errors.push("Email cannot be empty".to_string());
        }

        if self.password.is_empty() {
            errors.push("Password cannot be empty".to_string());
        }

        if self.request_timeout == Some(0) {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
