//! Configuration loading and typed config structures for Fleetwatch.
//!
//! Both binaries read `fleetwatch-config.yaml` from the working directory.
//! Every field has a default, so a missing file or a partial file is fine.
//! Environment variables override the connection settings:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `MQTT_HOST` | `broker.host` |
//! | `MQTT_PORT` | `broker.port` |
//! | `MQTT_TOPIC` | `broker.topic` |
//! | `RELAY_PORT` | `relay.port` |
//! | `SIMULATOR_PORT` | `simulator.port` |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::broadcast::{DEFAULT_CAPACITY, DEFAULT_CHANNEL};
use crate::seed::{self, VehicleSeed};
use crate::targeting::TargetingMode;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "fleetwatch-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but makes no sense.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration shared by the relay and the simulator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FleetwatchConfig {
    /// MQTT broker connection settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Reconnect and liveness timing.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Relay process settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Simulator process settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The tracked fleet, in display order.
    #[serde(default = "seed::default_fleet")]
    pub fleet: Vec<VehicleSeed>,
}

impl Default for FleetwatchConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            retry: RetryConfig::default(),
            relay: RelayConfig::default(),
            simulator: SimulatorConfig::default(),
            logging: LoggingConfig::default(),
            fleet: seed::default_fleet(),
        }
    }
}

impl FleetwatchConfig {
    /// Load configuration from a YAML file and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of bounds.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults (with env
    /// overrides still applied).
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file) when the file exists.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Override connection settings from environment variables when set.
    ///
    /// Unparseable port values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MQTT_HOST") {
            self.broker.host = val;
        }
        if let Some(port) = port_from_env("MQTT_PORT") {
            self.broker.port = port;
        }
        if let Ok(val) = std::env::var("MQTT_TOPIC") {
            self.broker.topic = val;
        }
        if let Some(port) = port_from_env("RELAY_PORT") {
            self.relay.port = port;
        }
        if let Some(port) = port_from_env("SIMULATOR_PORT") {
            self.simulator.port = port;
        }
    }

    /// Check values that would otherwise fail later at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.topic.is_empty() {
            return Err(invalid("broker.topic must not be empty"));
        }
        if self.retry.backoff_ms == 0 || self.retry.liveness_interval_ms == 0 {
            return Err(invalid("retry intervals must be at least 1ms"));
        }
        if self.simulator.publish_interval_ms == 0 {
            return Err(invalid("simulator.publish_interval_ms must be at least 1ms"));
        }
        let unknown_vehicle = self
            .simulator
            .vehicle_id
            .is_some_and(|id| !self.fleet.iter().any(|v| v.id == id));
        if unknown_vehicle {
            return Err(invalid("simulator.vehicle_id must name a fleet vehicle"));
        }
        self.simulator.bounds.validate()
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

fn port_from_env(name: &str) -> Option<u16> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(port) => Some(port),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "ignoring invalid port override");
            None
        }
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Broker host name.
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Topic carrying coordinate updates.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// MQTT keep-alive in seconds (minimum 1).
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Capacity of the client request queue.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

impl BrokerConfig {
    /// Keep-alive as a [`Duration`], clamped to at least one second.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            topic: default_topic(),
            keep_alive_secs: default_keep_alive_secs(),
            request_capacity: default_request_capacity(),
        }
    }
}

/// Reconnect and liveness timing for broker connections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Wait after a failed connect or subscribe before retrying.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// How often a subscribed connection is checked for liveness.
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,

    /// Upper bound on a single connect or subscribe attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound on the graceful disconnect at shutdown.
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
}

impl RetryConfig {
    /// Backoff as a [`Duration`].
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Liveness interval as a [`Duration`].
    pub const fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Disconnect timeout as a [`Duration`].
    pub const fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            liveness_interval_ms: default_liveness_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
        }
    }
}

/// Relay process settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Address the query / live-view server binds to.
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Port of the query / live-view server.
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Prefix of the per-process MQTT client id.
    #[serde(default = "default_relay_client_prefix")]
    pub client_id_prefix: String,

    /// Which vehicle a message updates.
    #[serde(default)]
    pub targeting: TargetingMode,

    /// Name of the live-view broadcast channel.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Updates buffered per live-view client before it lags.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_relay_port(),
            client_id_prefix: default_relay_client_prefix(),
            targeting: TargetingMode::default(),
            channel_name: default_channel_name(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Simulator process settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Address the control server binds to.
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Port of the control server.
    #[serde(default = "default_simulator_port")]
    pub port: u16,

    /// Prefix of the per-process MQTT client id.
    #[serde(default = "default_simulator_client_prefix")]
    pub client_id_prefix: String,

    /// Delay between two publishes of the continuous loop.
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    /// Area the simulated coordinates are drawn from.
    #[serde(default)]
    pub bounds: CoordinateBounds,

    /// Tag every payload with this fleet vehicle id, for relays running
    /// with `targeting: payload_id`. Untagged when unset.
    #[serde(default)]
    pub vehicle_id: Option<u32>,
}

impl SimulatorConfig {
    /// Publish interval as a [`Duration`].
    pub const fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_simulator_port(),
            client_id_prefix: default_simulator_client_prefix(),
            publish_interval_ms: default_publish_interval_ms(),
            bounds: CoordinateBounds::default(),
            vehicle_id: None,
        }
    }
}

/// Rectangle (in degrees) simulated coordinates are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CoordinateBounds {
    /// Lowest latitude.
    #[serde(default = "default_lat_min")]
    pub lat_min: f64,
    /// Highest latitude.
    #[serde(default = "default_lat_max")]
    pub lat_max: f64,
    /// Lowest longitude.
    #[serde(default = "default_lon_min")]
    pub lon_min: f64,
    /// Highest longitude.
    #[serde(default = "default_lon_max")]
    pub lon_max: f64,
}

impl CoordinateBounds {
    /// Check that both ranges are finite and ordered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.lat_min, self.lat_max, self.lon_min, self.lon_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(invalid("simulator.bounds must be finite"));
        }
        if self.lat_min > self.lat_max || self.lon_min > self.lon_max {
            return Err(invalid("simulator.bounds minimums must not exceed maximums"));
        }
        Ok(())
    }
}

impl Default for CoordinateBounds {
    fn default() -> Self {
        Self {
            lat_min: default_lat_min(),
            lat_max: default_lat_max(),
            lon_min: default_lon_min(),
            lon_max: default_lon_max(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_broker_host() -> String {
    String::from("localhost")
}

const fn default_broker_port() -> u16 {
    1883
}

fn default_topic() -> String {
    String::from("vehicle/coordinates")
}

const fn default_keep_alive_secs() -> u64 {
    30
}

const fn default_request_capacity() -> usize {
    10
}

const fn default_backoff_ms() -> u64 {
    5000
}

const fn default_liveness_interval_ms() -> u64 {
    5000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_disconnect_timeout_ms() -> u64 {
    2000
}

fn default_bind_host() -> String {
    String::from("0.0.0.0")
}

const fn default_relay_port() -> u16 {
    8080
}

const fn default_simulator_port() -> u16 {
    8081
}

fn default_relay_client_prefix() -> String {
    String::from("backend_subscriber")
}

fn default_simulator_client_prefix() -> String {
    String::from("vehicle_simulator")
}

fn default_channel_name() -> String {
    String::from(DEFAULT_CHANNEL)
}

const fn default_broadcast_capacity() -> usize {
    DEFAULT_CAPACITY
}

const fn default_publish_interval_ms() -> u64 {
    1000
}

const fn default_lat_min() -> f64 {
    34.0
}

const fn default_lat_max() -> f64 {
    34.1
}

const fn default_lon_min() -> f64 {
    -118.3
}

const fn default_lon_max() -> f64 {
    -118.2
}

fn default_log_level() -> String {
    String::from("info")
}
