use std::net::IpAddr;
use std::net::Ipv4Addr;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Global settings of the local BGP speaker
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local autonomous system number
    pub local_as: u32,

    /// Router identifier, an IPv4 address in dotted notation
    pub router_id: String,

    /// TCP port to listen on for incoming sessions.
    /// `None` disables listening; only outgoing connections are made.
    #[serde(default)]
    pub listen_port: Option<u16>,
}

impl SessionConfig {
    pub fn new(
        local_as: u32,
        router_id: impl Into<String>,
    ) -> Self {
        Self {
            local_as,
            router_id: router_id.into(),
            listen_port: None,
        }
    }

    pub fn with_listen_port(
        mut self,
        port: u16,
    ) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Router id parsed as an address. Only meaningful after `validate()`.
    pub fn router_id_addr(&self) -> Option<Ipv4Addr> {
        self.router_id.parse().ok()
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_as == 0 {
            return Err(Error::Config(ConfigError::Message(
                "session.local_as must be greater than 0".into(),
            )));
        }

        if self.router_id_addr().is_none() {
            return Err(Error::Config(ConfigError::Message(format!(
                "session.router_id '{}' is not an IPv4 address",
                self.router_id
            ))));
        }

        if self.listen_port == Some(0) {
            return Err(Error::Config(ConfigError::Message(
                "session.listen_port cannot be 0".into(),
            )));
        }

        Ok(())
    }
}

/// A statically configured neighbor
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Autonomous system number of the neighbor
    pub peer_as: u32,

    pub neighbor_address: IpAddr,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// Optional transport options of a neighbor
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Port of the remote speaker, the protocol default when unset
    #[serde(default)]
    pub remote_port: Option<u16>,

    /// Wait for the neighbor to connect instead of connecting actively
    #[serde(default)]
    pub passive_mode: bool,
}

impl PeerConfig {
    pub fn new(
        peer_as: u32,
        neighbor_address: IpAddr,
    ) -> Self {
        Self {
            peer_as,
            neighbor_address,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_remote_port(
        mut self,
        port: u16,
    ) -> Self {
        self.transport.remote_port = Some(port);
        self
    }

    pub fn passive(mut self) -> Self {
        self.transport.passive_mode = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.peer_as == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "peer {}: peer_as must be greater than 0",
                self.neighbor_address
            ))));
        }

        if self.transport.remote_port == Some(0) {
            return Err(Error::Config(ConfigError::Message(format!(
                "peer {}: remote_port cannot be 0",
                self.neighbor_address
            ))));
        }

        Ok(())
    }
}
