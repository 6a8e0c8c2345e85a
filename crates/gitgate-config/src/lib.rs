#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Configuration for the gitgate SSH command gateway.
//!
//! A single [`Config`] is read once per process from `config.toml` in the
//! installation root, overridden by a small set of environment variables,
//! validated, and then shared read-only by every command execution.
//!
//! # Usage
//!
//! ```rust,no_run
//! use gitgate_config::Config;
//!
//! let config = Config::load_from_dir(std::path::Path::new("/opt/gitgate")).unwrap();
//! println!("control plane: {}", config.gitlab_url);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`GITLAB_URL`, `GITLAB_TRACING`,
//!    `GITLAB_SHELL_SECRET`, `GITLAB_LOG_FORMAT`)
//! 2. **File** (`{root}/config.toml`)
//! 3. **Built-in defaults** (every section implements [`Default`])
//!
//! # Design
//!
//! This crate has **no dependencies on other internal gitgate crates**.
//! Conversion into client or logging options happens at the integration
//! boundary.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load `config.toml` from an installation root directory.
    ///
    /// See [`loader::load_from_dir`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing or malformed, the
    /// secret cannot be resolved, or validation fails.
    pub fn load_from_dir(root_dir: &std::path::Path) -> ConfigResult<Self> {
        loader::load_from_dir(root_dir, |key| std::env::var(key).ok())
    }

    /// Build a configuration from defaults and environment variables only.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the result fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        loader::from_env(|key| std::env::var(key).ok())
    }
}
