//! Site configuration.
//!
//! Sites live in a YAML file (default `~/.config/frappecli/config.yaml`):
//!
//! ```yaml
//! default_site: production
//! sites:
//!   production:
//!     url: https://erp.example.com
//!     api_key: ${ERP_API_KEY}
//!     api_secret: ${ERP_API_SECRET}
//! ```
//!
//! `${VAR}` placeholders are replaced from the environment when a site is
//! resolved.

use log::debug;
use regex::{Captures, Regex};
use reqwest::Url;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::runtime::Runtime;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "FRAPPE_CLI_CONFIG";

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

const REQUIRED_FIELDS: [&str; 3] = ["url", "api_key", "api_secret"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read configuration file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Invalid YAML in configuration file: {0}")]
    InvalidYaml(String),
    #[error("Configuration file must contain a dictionary")]
    NotAMapping,
    #[error("No sites configured")]
    NoSites,
    #[error("Site '{0}' not found in configuration")]
    SiteNotFound(String),
    #[error("No default site configured")]
    NoDefaultSite,
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Environment variable '{0}' is not set")]
    MissingEnvVar(String),
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// A resolved, validated site record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Loaded configuration file.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    data: Mapping,
}

/// Default config location under the user's home directory.
pub fn default_config_path<R: Runtime>(runtime: &R) -> Result<PathBuf, ConfigError> {
    let home = runtime.home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".config").join("frappecli").join("config.yaml"))
}

impl Config {
    /// Loads the config from `path`, or from `$FRAPPE_CLI_CONFIG`, or from the
    /// default location.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match runtime.env_var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => PathBuf::from(p),
                _ => default_config_path(runtime)?,
            },
        };
        debug!("Loading configuration from {:?}", path);

        if !runtime.exists(&path) {
            return Err(ConfigError::NotFound(path));
        }

        let contents = runtime
            .read_to_string(&path)
            .map_err(|e| ConfigError::Unreadable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Self::parse(path, &contents)
    }

    /// Parses YAML `contents` read from `path`.
    pub fn parse(path: PathBuf, contents: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::InvalidYaml(e.to_string()))?;

        match value {
            Value::Mapping(data) => Ok(Self { path, data }),
            _ => Err(ConfigError::NotAMapping),
        }
    }

    fn sites(&self) -> Option<&Mapping> {
        self.data.get("sites").and_then(Value::as_mapping)
    }

    /// Configured site names, sorted.
    pub fn list_sites(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sites()
            .map(|sites| sites.keys().filter_map(yaml_key).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn default_site_name(&self) -> Option<&str> {
        self.data.get("default_site").and_then(Value::as_str)
    }

    /// Resolves a named site: substitutes `${VAR}` placeholders and validates
    /// the required fields.
    pub fn site<R: Runtime>(&self, runtime: &R, name: &str) -> Result<SiteConfig, ConfigError> {
        let sites = self.sites().ok_or(ConfigError::NoSites)?;
        let raw = sites
            .get(name)
            .and_then(Value::as_mapping)
            .ok_or_else(|| ConfigError::SiteNotFound(name.to_string()))?;

        let mut fields = [String::new(), String::new(), String::new()];
        for (slot, field) in fields.iter_mut().zip(REQUIRED_FIELDS) {
            let value = raw
                .get(field)
                .and_then(scalar_to_string)
                .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
            *slot = substitute_env_vars(runtime, &value)?;
        }
        let [url, api_key, api_secret] = fields;

        validate_url(&url)?;

        Ok(SiteConfig {
            name: name.to_string(),
            url,
            api_key,
            api_secret,
        })
    }

    pub fn default_site<R: Runtime>(&self, runtime: &R) -> Result<SiteConfig, ConfigError> {
        let name = self.default_site_name().ok_or(ConfigError::NoDefaultSite)?;
        self.site(runtime, name)
    }

    /// The named site when given, else the default one.
    pub fn resolve<R: Runtime>(
        &self,
        runtime: &R,
        name: Option<&str>,
    ) -> Result<SiteConfig, ConfigError> {
        match name {
            Some(name) => self.site(runtime, name),
            None => self.default_site(runtime),
        }
    }
}

fn yaml_key(key: &Value) -> Option<String> {
    scalar_to_string(key)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replaces every `${VAR}` in `value` with the variable's value.
pub fn substitute_env_vars<R: Runtime>(runtime: &R, value: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let result = ENV_PLACEHOLDER.replace_all(value, |caps: &Captures| {
        let name = &caps[1];
        match runtime.env_var(name) {
            Ok(v) => v,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(result.into_owned()),
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidUrl(url.to_string())),
    }
}
