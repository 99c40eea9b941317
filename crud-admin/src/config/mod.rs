//! Configuration management for crud-admin
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `CRUD_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/crud-admin/{service}/config.toml` (user config, XDG)
//! 4. `/etc/crud-admin/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `CRUD_SECTION__FIELD_NAME`, for example
//! `CRUD_ADMIN__BASE_PACKAGES=shop::model,billing`.
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [admin]
//! enabled = true
//! base_url = "/admin"
//! base_packages = "shop::model, billing"
//! ```
//!
//! # Usage
//!
//! ```rust
//! use crud_admin::config::CrudAdminConfig;
//!
//! let config = CrudAdminConfig::default();
//! assert!(!config.admin.enabled);
//! assert!(config.admin.namespaces().is_none());
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Admin add-on settings (the `[admin]` section)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// Whether the CRUD administration add-on is active
    pub enabled: bool,

    /// Base URL the admin screens are mounted under
    pub base_url: Option<String>,

    /// Comma-separated namespaces (module paths) to scan for entities
    pub base_packages: Option<String>,
}

impl AdminSettings {
    /// Namespaces listed in `base_packages`.
    ///
    /// Segments are trimmed and empty ones dropped. Returns `None` when the
    /// setting is absent or lists nothing.
    ///
    /// ```rust
    /// use crud_admin::config::AdminSettings;
    ///
    /// let settings = AdminSettings {
    ///     base_packages: Some("shop::model, ,billing".into()),
    ///     ..AdminSettings::default()
    /// };
    /// assert_eq!(
    ///     settings.namespaces(),
    ///     Some(vec!["shop::model".to_string(), "billing".to_string()])
    /// );
    /// ```
    #[must_use]
    pub fn namespaces(&self) -> Option<Vec<String>> {
        let namespaces: Vec<String> = self
            .base_packages
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(ToString::to_string)
            .collect();

        if namespaces.is_empty() {
            None
        } else {
            Some(namespaces)
        }
    }
}

/// Complete crud-admin configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrudAdminConfig {
    /// Admin add-on settings
    #[serde(default)]
    pub admin: AdminSettings,
}

impl CrudAdminConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration in XDG-compliant locations with precedence:
    /// 1. Environment variables (`CRUD_*`, use `__` for nesting)
    /// 2. `./config.toml`
    /// 3. `~/.config/crud-admin/{service_name}/config.toml`
    /// 4. `/etc/crud-admin/{service_name}/config.toml`
    /// 5. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config
        let system_config = PathBuf::from("/etc/crud-admin")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Self::env());

        let config: Self = figment.extract()?;
        tracing::debug!(
            service = service_name,
            enabled = config.admin.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file leaves the defaults in place; environment variables
    /// still override.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - The file contains invalid TOML syntax
    /// - Configuration values fail type conversion
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    ///
    /// ```rust
    /// use crud_admin::config::CrudAdminConfig;
    ///
    /// let path = CrudAdminConfig::recommended_path("my-app");
    /// assert!(path.ends_with("config.toml"));
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("crud-admin")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    fn env() -> Env {
        Env::prefixed("CRUD_").split("__").lowercase(true)
    }
}
