/// Gateway endpoint configuration
///
/// One configuration describes one gateway: the address of the Modbus TCP
/// endpoint, the unit identifier stamped on every frame, and the timeout
/// applied to connect attempts and to each exchange phase.

use std::net::SocketAddr;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ModbusError, ModbusResult};

fn default_port() -> u16 {
    crate::DEFAULT_TCP_PORT
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    crate::DEFAULT_TIMEOUT_MS
}

/// Configuration for a gateway connection
///
/// # Example
///
/// ```rust
/// use thermo_modbus::GatewayConfig;
/// use std::time::Duration;
///
/// let config = GatewayConfig::new("192.168.1.101")
///     .with_timeout(Duration::from_secs(2))
///     .with_unit_id(1);
/// assert_eq!(config.socket_addr(), "192.168.1.101:502");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host name or IP address
    pub host: String,
    /// TCP port (502 unless the gateway is remapped)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Modbus unit identifier stamped on every frame
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Connect and per-phase exchange timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Log every frame as hex via tracing
    #[serde(default)]
    pub packet_logging: bool,
}

impl GatewayConfig {
    /// Create a configuration for the given host with default port, unit id
    /// and timeout
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
            packet_logging: false,
        }
    }

    /// Create a configuration for an explicit host and port
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        let mut config = Self::new(host);
        config.port = port;
        config
    }

    /// Set the exchange/connect timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the Modbus unit identifier
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// Enable or disable hex packet logging
    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// The `host:port` endpoint string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse the endpoint into a [`SocketAddr`]
    ///
    /// Host names are resolved through the system resolver; the first
    /// resolved address wins.
    pub async fn resolve(&self) -> ModbusResult<SocketAddr> {
        let addr_str = self.socket_addr();

        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(&addr_str).await.map_err(|e| {
            ModbusError::configuration(format!("cannot resolve '{}': {}", addr_str, e))
        })?;

        addrs.next().ok_or_else(|| {
            ModbusError::configuration(format!("no addresses for '{}'", addr_str))
        })
    }

    /// Load a configuration from a JSON document
    pub fn from_json(json: &str) -> ModbusResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
