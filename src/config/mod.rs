//! Configuration management for the route notifier.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod session;
pub use session::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Prefix of environment variables that override file settings, e.g.
/// `BGPWATCH__SESSION__LOCAL_AS=65001`.
pub const ENV_PREFIX: &str = "BGPWATCH";

/// Top level configuration of a [`crate::RouteNotifier`]
///
/// Sources are merged with the following priority (later wins):
/// 1. Type defaults
/// 2. File named by `CONFIG_PATH`
/// 3. Environment variables with the `BGPWATCH__` prefix
#[derive(Serialize, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Name used to tag every log line of this notifier
    #[serde(default = "default_name")]
    pub name: String,

    /// Global settings of the routing session. `None` means the session has
    /// not been configured yet, which makes `start()` fail.
    #[serde(default)]
    pub session: Option<SessionConfig>,

    /// Statically configured neighbors, added right after the session starts
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

impl Debug for NotifierConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("name", &self.name)
            .field("session", &self.session)
            .field("peers", &self.peers.len())
            .finish()
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            session: None,
            peers: Vec::new(),
        }
    }
}

fn default_name() -> String {
    "bgp-watch".to_string()
}

impl NotifierConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be applied via
    /// [`NotifierConfig::with_override_config`]. Callers must call `validate()`
    /// once all overrides are in place.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/notifier.toml");
    /// std::env::set_var("BGPWATCH__SESSION__LOCAL_AS", "65001");
    /// let cfg = NotifierConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file, followed by the environment.
    ///
    /// Does not validate.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Injects a session configuration, replacing whatever was loaded.
    pub fn with_session(
        mut self,
        session: SessionConfig,
    ) -> Self {
        self.session = Some(session);
        self
    }

    /// Appends a statically configured peer.
    pub fn with_peer(
        mut self,
        peer: PeerConfig,
    ) -> Self {
        self.peers.push(peer);
        self
    }

    /// Validates all subsystems and returns the validated configuration.
    ///
    /// A missing session configuration is reported as an error here as well,
    /// since nothing can be started without it.
    pub fn validate(self) -> Result<Self> {
        if self.name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("name cannot be empty".into())));
        }

        self.session_config()?.validate()?;

        for (i, peer) in self.peers.iter().enumerate() {
            peer.validate()?;
            if self.peers[..i]
                .iter()
                .any(|p| p.neighbor_address == peer.neighbor_address)
            {
                return Err(Error::Config(ConfigError::Message(format!(
                    "peer {} is configured more than once",
                    peer.neighbor_address
                ))));
            }
        }

        Ok(self)
    }

    /// Returns the session configuration or a configuration error when it is absent.
    pub fn session_config(&self) -> Result<&SessionConfig> {
        self.session.as_ref().ok_or_else(|| {
            Error::Config(ConfigError::NotFound(
                "session configuration is missing".to_string(),
            ))
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
