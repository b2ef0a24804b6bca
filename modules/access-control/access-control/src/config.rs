//! Configuration for the access control module.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `CONSOLE__`-prefixed environment variables (`CONSOLE__PERMISSIONS__MERGE_POLICY=any_role`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "CONSOLE__";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete console configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub permissions: PermissionsConfig,
    pub navigation: NavigationConfig,
    pub logging: LoggingConfig,
}

impl ConsoleConfig {
    /// Load defaults, the optional YAML file at `path`, and environment overrides.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `path` is given but does not exist
    /// - `Invalid` if any layer fails to parse or a value has the wrong type
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.permissions.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "permissions.fetch_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.api.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "api.request_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        for (name, route) in [
            ("session.login_route", &self.session.login_route),
            ("navigation.landing_route", &self.navigation.landing_route),
        ] {
            if !route.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{name} must start with '/', got '{route}'"
                )));
            }
        }
        Ok(())
    }
}

/// Console backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_owned(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Role namespace used until a login records one.
    pub namespace: String,
    pub login_route: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: console_security::constants::DEFAULT_NAMESPACE.to_owned(),
            login_route: "/admin/login".to_owned(),
        }
    }
}

/// How grants that share a permission key are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Later grants replace earlier ones for the same key.
    #[default]
    LastWriteWins,
    /// A flag is granted if any grant for the key grants it.
    AnyRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    pub fetch_timeout_ms: u64,
    pub merge_policy: MergePolicy,
    /// Roles that hold the `superadmin` capability.
    pub superadmin_role_ids: Vec<i64>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            merge_policy: MergePolicy::default(),
            superadmin_role_ids: vec![1],
        }
    }
}

impl PermissionsConfig {
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavigationConfig {
    pub landing_route: String,
    /// Modules tried in order when the dashboard is not viewable.
    pub module_priority: Vec<String>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            landing_route: "/dashboards/Overview".to_owned(),
            module_priority: [
                "dashboard",
                "catalogue_management",
                "order_management",
                "user_management",
                "profile",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}
