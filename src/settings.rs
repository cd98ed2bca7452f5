//! Host-level configuration: cache directory, default branch candidates,
//! default clone protocol. Not part of the registry's data model — purely
//! ambient process configuration.

use std::{collections::HashMap, path::PathBuf};

use anyhow::bail;
use config::{Config, ConfigError, Environment, File, FileFormat};
use log::{debug, trace};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Https,
    Ssh,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub cache_dir: PathBuf,
    pub default_branch_candidates: Vec<String>,
    pub default_protocol: Protocol,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_dir: PathBuf::from(".protoreg-cache"),
            default_branch_candidates: vec!["main".to_string(), "master".to_string()],
            default_protocol: Protocol::Https,
        }
    }
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let dir = config_dir();
        let raw = RawConfig::load(dir, None, None)?;
        let settings = Settings {
            cache_dir: match raw.cache.dir {
                Some(dir) => dir,
                None => default_cache_dir()?,
            },
            default_branch_candidates: raw
                .git
                .default_branches
                .unwrap_or_else(|| vec!["main".to_string(), "master".to_string()]),
            default_protocol: raw.git.protocol.map(Protocol::from).unwrap_or(Protocol::Https),
        };
        trace!("Loaded configuration: {:?}", settings);
        Ok(settings)
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    git: GitConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    protocol: Option<ProtocolRaw>,
    default_branches: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ProtocolRaw {
    Https,
    Ssh,
}

impl From<ProtocolRaw> for Protocol {
    fn from(value: ProtocolRaw) -> Self {
        match value {
            ProtocolRaw::Https => Protocol::Https,
            ProtocolRaw::Ssh => Protocol::Ssh,
        }
    }
}

impl RawConfig {
    fn load(
        config_dir: Option<PathBuf>,
        config_override: Option<toml::Table>,
        env_override: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(mut path) = config_dir {
            path.push("config.toml");
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }

        if let Some(config_override) = config_override {
            builder = builder.add_source(File::from_str(&config_override.to_string(), FileFormat::Toml));
        }

        builder
            .add_source(Environment::with_prefix("PROTOREG").separator("_").source(env_override))
            .build()?
            .try_deserialize()
    }
}

fn config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PROTOREG_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let mut path = PathBuf::from(path);
        path.push("protoreg");
        return Some(path);
    }
    if let Some(mut path) = home::home_dir() {
        path.push(".config");
        path.push("protoreg");
        return Some(path);
    }
    None
}

fn default_cache_dir() -> anyhow::Result<PathBuf> {
    if let Some(mut path) = home::home_dir() {
        path.push(".protoreg");
        path.push("cache");
        return Ok(path);
    }
    bail!("Could not find home dir. Please define $HOME env variable.")
}
