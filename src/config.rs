//! Resolver configuration.
//!
//! [`ResolverConfig`] carries the naming conventions used when associations
//! resolve their keys. It is an explicit, immutable value handed to a
//! [`Registry`](crate::registry::Registry) at construction; applications can
//! load it from `config/config.toml` or environment variables using
//! `ResolverConfig::load()`.

use crate::executor::JoinKind;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResolverConfig {
    /// Suffix appended to the first letter of a dataset to alias the source
    /// side of a self-referential association (`categories` -> `c_0`)
    #[serde(default = "default_self_ref_suffix")]
    pub self_ref_suffix: String,
    /// Suffix used when a foreign key name is inferred from a relation name
    #[serde(default = "default_foreign_key_suffix")]
    pub foreign_key_suffix: String,
    /// Fall back to `<singular dataset><suffix>` when no attribute is flagged
    /// as a foreign key to the related relation
    #[serde(default = "default_infer_foreign_keys")]
    pub infer_foreign_keys: bool,
    /// Join type used by `Association::call`
    #[serde(default)]
    pub default_join: JoinKind,
}

fn default_self_ref_suffix() -> String {
    "_0".to_string()
}

fn default_foreign_key_suffix() -> String {
    "_id".to_string()
}

fn default_infer_foreign_keys() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            self_ref_suffix: default_self_ref_suffix(),
            foreign_key_suffix: default_foreign_key_suffix(),
            infer_foreign_keys: default_infer_foreign_keys(),
            default_join: JoinKind::default(),
        }
    }
}

impl ResolverConfig {
    /// Load the resolver configuration from `config/config.toml`, falling back to env vars.
    ///
    /// The `[associations]` section of the file is overlaid with
    /// `LIFEGUARD__ASSOCIATIONS__*` variables. A missing section yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("LIFEGUARD").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("LIFEGUARD").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        match settings.get::<ResolverConfig>("associations") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Association configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    /// Deserialize a configuration from a TOML snippet holding an `[associations]` table
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(source, config::FileFormat::Toml))
            .build()?;
        match settings.get::<ResolverConfig>("associations") {
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }
}
