//! Configuration for the presence client.

use std::fmt;
use std::path::Path;

use config::{Config as ConfigLoader, ConfigError, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use swicord_common::protocol::{DEFAULT_GATEWAY_URL, DEFAULT_PRESENCE_ENDPOINT};
use swicord_common::PresenceConfig;

use crate::dispatch::DEFAULT_DISPATCH_INTERVAL;
use crate::presence::DEFAULT_AUTO_UPDATE_INTERVAL;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Activities and buttons to advertise.
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
    /// HTTP presence fallback.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// Bot token. Never printed.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Token with surrounding whitespace removed.
    pub fn token(&self) -> &str {
        self.token.trim()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &if self.token().is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

/// Gateway WebSocket connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Fake connect/disconnect and suppress sends, without touching the network.
    #[serde(default)]
    pub spoof: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            spoof: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoUpdateConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_auto_update_interval")]
    pub interval_secs: u64,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_auto_update_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_presence_endpoint")]
    pub endpoint: String,
    /// Period of the background dispatch loop.
    #[serde(default = "default_dispatch_interval")]
    pub interval_secs: u64,
    /// Application identifier sent as `package_name`.
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default = "default_dispatch_state")]
    pub state: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_presence_endpoint(),
            interval_secs: default_dispatch_interval(),
            package_name: None,
            state: default_dispatch_state(),
        }
    }
}

// Default values
fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}
fn default_presence_endpoint() -> String {
    DEFAULT_PRESENCE_ENDPOINT.to_string()
}
fn default_auto_update_interval() -> u64 {
    DEFAULT_AUTO_UPDATE_INTERVAL.as_secs()
}
fn default_dispatch_interval() -> u64 {
    DEFAULT_DISPATCH_INTERVAL.as_secs()
}
fn default_dispatch_state() -> String {
    "START".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (SWICORD__SECTION__KEY format)
    /// 2. swicord.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(File::with_name("swicord").required(false))
    }

    /// Like [`load`](Self::load), reading the given TOML file instead. The
    /// file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::build(File::from(path).format(FileFormat::Toml).required(true))
    }

    fn build(file: File<FileSourceFile, FileFormat>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("gateway.url", default_gateway_url())?
            .set_default("auto_update.interval_secs", default_auto_update_interval() as i64)?
            .set_default("dispatcher.interval_secs", default_dispatch_interval() as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("SWICORD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
