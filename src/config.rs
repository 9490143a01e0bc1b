//! Configuration cascade and typed per-host settings.
//!
//! A configuration document has a `defaults` block plus one block per group.
//! Every host's effective settings are `defaults`, overridden by the group's
//! keys, overridden by the host's own keys. `forks` is a scheduling parameter
//! and never appears in a host's settings.
//!
//! ```yaml
//! defaults:
//!   forks: 5
//!   device_type: cisco_ios
//!   cmds_before:
//!     - show run | include name-server
//! core:
//!   forks: 2
//!   conf_cmds:
//!     - ip name-server 9.9.9.9
//!   hosts:
//!     - sw-01
//!     - sw-02:
//!         device_type: huawei
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::credentials::Credentials;
use crate::error::{ConfigError, ConnectorError};
use crate::session::SecurityLevel;

/// Effective settings of one host, in document order.
pub type Settings = Map<String, Value>;

const DEFAULTS_KEY: &str = "defaults";
const HOSTS_KEY: &str = "hosts";
const FORKS_KEY: &str = "forks";

/// Keys that are resolved separately and excluded from host settings.
const SCHEDULING_KEYS: &[&str] = &[FORKS_KEY];

/// Keys every host must define after the cascade.
const REQUIRED_KEYS: &[&str] = &["device_type"];

/// Configuration of one host as handed to a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name, also used for the credential lookup.
    pub host: String,
    /// Effective settings after the cascade.
    pub settings: Settings,
    /// Attached credentials, or the absent sentinel.
    #[serde(default)]
    pub credentials: Credentials,
}

impl HostConfig {
    /// Creates a host without credentials.
    pub fn new(host: impl Into<String>, settings: Settings) -> Self {
        Self {
            host: host.into(),
            settings,
            credentials: Credentials::Absent,
        }
    }

    /// Builds the typed view of the settings map.
    pub fn device_settings(&self) -> Result<DeviceSettings, ConnectorError> {
        DeviceSettings::from_settings(&self.settings)
    }
}

/// One group of hosts sharing a concurrency limit.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    /// Maximum number of hosts running at the same time.
    pub forks: NonZeroUsize,
    pub hosts: Vec<HostConfig>,
}

impl GroupSpec {
    /// Splits the hosts into consecutive rounds of at most `forks` hosts.
    pub fn rounds(&self) -> std::slice::Chunks<'_, HostConfig> {
        self.hosts.chunks(self.forks.get())
    }

    /// Number of rounds needed for this group.
    pub fn round_count(&self) -> usize {
        self.hosts.len().div_ceil(self.forks.get())
    }
}

/// Typed view of the settings a worker understands.
///
/// Unknown keys in the settings map are ignored here and preserved in
/// [`HostConfig::settings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceSettings {
    /// Device family, e.g. `cisco_ios` or `huawei`.
    pub device_type: String,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: f64,

    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: f64,

    /// Command entering configuration mode, overriding the device default.
    #[serde(default)]
    pub config_mode: Option<String>,

    /// Command leaving configuration mode, overriding the device default.
    #[serde(default)]
    pub exit_config_mode: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub cmds_before: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conf_cmds: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cmds_after: Vec<String>,

    #[serde(default)]
    pub cmds_before_file: Option<PathBuf>,
    #[serde(default)]
    pub conf_cmds_file: Option<PathBuf>,
    #[serde(default)]
    pub cmds_after_file: Option<PathBuf>,

    /// File receiving all output lines of the host.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Suppresses the per-host result echo.
    #[serde(default, deserialize_with = "null_as_default")]
    pub silent: bool,

    /// SSH algorithm policy.
    #[serde(default = "default_security_level")]
    pub security_level: SecurityLevel,
}

fn default_port() -> u16 {
    22
}

fn default_connection_timeout() -> f64 {
    10.0
}

fn default_read_timeout() -> f64 {
    10.0
}

fn default_security_level() -> SecurityLevel {
    SecurityLevel::Secure
}

/// Reads an empty YAML key (`cmds_before:`) as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl DeviceSettings {
    /// Deserializes the typed view from an effective settings map.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConnectorError> {
        Ok(serde_json::from_value(Value::Object(settings.clone()))?)
    }
}

/// JSON schema of the per-host settings.
pub fn settings_schema() -> schemars::Schema {
    schemars::schema_for!(DeviceSettings)
}

/// Resolves configuration documents into group specifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigResolver;

impl ConfigResolver {
    /// Reads, resolves and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<GroupSpec>, ConfigError> {
        let path = expand_tilde(path.as_ref());

        let valid_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !valid_extension {
            return Err(ConfigError::UnsupportedExtension(path));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded configuration from {}", path.display());

        let groups = Self::from_yaml_str(&content)?;
        Self::validate(&groups)?;
        Ok(groups)
    }

    /// Parses and resolves a YAML document without validating required keys.
    pub fn from_yaml_str(content: &str) -> Result<Vec<GroupSpec>, ConfigError> {
        let document: Value = serde_yaml::from_str(content)?;
        Self::resolve(&document)
    }

    /// Applies the defaults → group → host cascade.
    pub fn resolve(document: &Value) -> Result<Vec<GroupSpec>, ConfigError> {
        let root = document.as_object().ok_or(ConfigError::MissingDefaults)?;
        let defaults = root
            .get(DEFAULTS_KEY)
            .and_then(Value::as_object)
            .ok_or(ConfigError::MissingDefaults)?;

        let mut groups = Vec::new();
        for (name, block) in root {
            if name == DEFAULTS_KEY {
                continue;
            }
            let block = block
                .as_object()
                .ok_or_else(|| ConfigError::InvalidGroup(name.clone()))?;
            groups.push(Self::resolve_group(name, defaults, block)?);
        }

        Ok(groups)
    }

    /// Checks that every host defines the keys a worker cannot run without.
    pub fn validate(groups: &[GroupSpec]) -> Result<(), ConfigError> {
        for group in groups {
            for host in &group.hosts {
                for &key in REQUIRED_KEYS {
                    if !host.settings.get(key).is_some_and(|v| !v.is_null()) {
                        return Err(ConfigError::MissingKey {
                            group: group.name.clone(),
                            host: host.host.clone(),
                            key,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_group(
        name: &str,
        defaults: &Settings,
        block: &Settings,
    ) -> Result<GroupSpec, ConfigError> {
        let mut group_settings = defaults.clone();
        for (key, value) in block {
            if key != HOSTS_KEY {
                group_settings.insert(key.clone(), value.clone());
            }
        }

        let forks = match block.get(FORKS_KEY) {
            Some(value) if !value.is_null() => parse_forks(Some(value)),
            _ => parse_forks(defaults.get(FORKS_KEY)),
        }
        .ok_or_else(|| ConfigError::InvalidForks(name.to_string()))?;

        for key in SCHEDULING_KEYS {
            group_settings.remove(*key);
        }

        let entries = match block.get(HOSTS_KEY) {
            Some(Value::Array(entries)) => entries,
            _ => return Err(ConfigError::MissingHosts(name.to_string())),
        };

        let mut hosts = Vec::with_capacity(entries.len());
        for entry in entries {
            let (host, overrides) = host_entry(name, entry)?;
            let mut settings = group_settings.clone();
            if let Some(overrides) = overrides {
                for (key, value) in overrides {
                    if !SCHEDULING_KEYS.contains(&key.as_str()) {
                        settings.insert(key.clone(), value.clone());
                    }
                }
            }
            hosts.push(HostConfig::new(host, settings));
        }

        debug!(
            "Resolved group {} with {} hosts, forks {}",
            name,
            hosts.len(),
            forks
        );

        Ok(GroupSpec {
            name: name.to_string(),
            forks,
            hosts,
        })
    }
}

/// Splits a `hosts` entry into its name and optional override map.
fn host_entry<'a>(
    group: &str,
    entry: &'a Value,
) -> Result<(String, Option<&'a Settings>), ConfigError> {
    let invalid = || ConfigError::InvalidHostEntry {
        group: group.to_string(),
        entry: entry.to_string(),
    };

    match entry {
        Value::String(host) => Ok((host.clone(), None)),
        Value::Object(map) if map.len() == 1 => {
            let (host, overrides) = map.iter().next().ok_or_else(invalid)?;
            match overrides {
                Value::Null => Ok((host.clone(), None)),
                Value::Object(overrides) => Ok((host.clone(), Some(overrides))),
                _ => Err(invalid()),
            }
        }
        _ => Err(invalid()),
    }
}

fn parse_forks(value: Option<&Value>) -> Option<NonZeroUsize> {
    value
        .and_then(Value::as_u64)
        .and_then(|forks| usize::try_from(forks).ok())
        .and_then(NonZeroUsize::new)
}

/// Replaces a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
