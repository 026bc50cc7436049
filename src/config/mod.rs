//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`VOXLINK_*`)
//! - CLI arguments (for the `voxlink` binary)
//!
//! ```toml
//! [device]
//! device_id = "02:4f:1a:00:00:01"
//! client_id = "7b1f0a52-0c55-4a4e-9d6c-1c1f4b3a2e10"
//!
//! [provisioning]
//! url = "https://api.example.com/ota/"
//!
//! [audio]
//! format = "opus"
//! sample_rate = 16000
//! channels = 1
//! frame_duration = 60
//!
//! [reconnect]
//! max_attempts = 0
//! ```

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::protocol::{AudioParams, Features};
use crate::provision::DeviceIdentity;
use crate::server::ServerConfig;
use crate::session::ReconnectConfig;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Device identity
    #[serde(default)]
    pub device: DeviceConfig,

    /// Provisioning endpoint
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// Outbound audio format advertised in the hello
    #[serde(default)]
    pub audio: AudioParams,

    /// Optional features advertised in the hello
    #[serde(default)]
    pub features: Features,

    /// Reconnect policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Session tuning
    #[serde(default)]
    pub session: SessionConfig,

    /// Loopback server
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            LinkError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| LinkError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `VOXLINK_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(device_id) = std::env::var("VOXLINK_DEVICE_ID") {
            self.device.device_id = device_id;
        }
        if let Ok(client_id) = std::env::var("VOXLINK_CLIENT_ID") {
            self.device.client_id = client_id;
        }
        if let Ok(url) = std::env::var("VOXLINK_PROVISIONING_URL") {
            self.provisioning.url = url;
        }
        if let Ok(secs) = std::env::var("VOXLINK_PROVISIONING_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.provisioning.timeout_secs = secs;
            }
        }
        if let Ok(attempts) = std::env::var("VOXLINK_RECONNECT_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                self.reconnect.max_attempts = attempts;
            }
        }
    }

    /// Default config file location (`<config dir>/voxlink/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("voxlink").join("config.toml"))
    }

    /// Load from `path`, else the default path if it exists, else defaults;
    /// environment variables are applied last
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.or_else(|| Self::default_path().filter(|p| p.exists()));
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Identity presented to the cloud
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(
            self.device.device_id.clone(),
            self.device.client_id.clone(),
            self.device.client_version.clone(),
        )
    }
}

/// Device identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Stable device identifier (MAC address style)
    pub device_id: String,

    /// Client installation identifier
    pub client_id: String,

    /// Client software version
    pub client_version: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: random_device_id(),
            client_id: uuid::Uuid::new_v4().to_string(),
            client_version: crate::VERSION.to_string(),
        }
    }
}

/// Locally administered unicast MAC address
fn random_device_id() -> String {
    let mut octets: [u8; 6] = rand::thread_rng().gen();
    octets[0] = (octets[0] | 0x02) & 0xfe;
    octets
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Provisioning endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Provisioning URL
    pub url: String,

    /// Agent name sent in `User-Agent`
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8002/ota/".to_string(),
            user_agent: "voxlink".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Session tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Outbound queue capacity in messages
    pub outbound_queue: usize,

    /// Transport connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 64,
            connect_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provisioning.user_agent, "voxlink");
        assert_eq!(config.audio.sample_rate_hz, 16_000);
        assert!(config.features.aec);
        assert_eq!(config.session.outbound_queue, 64);
        assert_eq!(config.device.client_version, crate::VERSION);
        assert!(uuid::Uuid::parse_str(&config.device.client_id).is_ok());
    }

    #[test]
    fn test_random_device_id_shape() {
        let id = random_device_id();
        assert_eq!(id.len(), 17);
        assert_eq!(id.split(':').count(), 6);

        let first = u8::from_str_radix(&id[..2], 16).unwrap();
        assert_eq!(first & 0x03, 0x02);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [device]
            device_id = "aa:bb:cc:dd:ee:ff"
            client_id = "client-1"

            [provisioning]
            url = "https://api.example.com/ota/"

            [audio]
            sample_rate = 24000

            [features]
            aec = false

            [reconnect]
            max_attempts = 0
            jitter = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.device_id, "aa:bb:cc:dd:ee:ff");
        assert_eq!(config.device.client_version, crate::VERSION);
        assert_eq!(config.provisioning.url, "https://api.example.com/ota/");
        assert_eq!(config.provisioning.timeout_secs, 10);
        assert_eq!(config.audio.sample_rate_hz, 24_000);
        assert_eq!(config.audio.format, "opus");
        assert!(!config.features.aec);
        assert!(config.features.mcp);
        assert_eq!(config.reconnect.max_attempts, 0);
        assert!(config.reconnect.enabled);

        let identity = config.identity();
        assert_eq!(identity.client_id, "client-1");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\noutbound_queue = 8").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.session.outbound_queue, 8);
        assert_eq!(config.session.connect_timeout_secs, 10);
    }

    #[test]
    fn test_config_file_errors() {
        let missing = Config::from_file("/nonexistent/voxlink.toml").unwrap_err();
        assert!(matches!(missing, LinkError::Config(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session\n").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(LinkError::Config(_))
        ));
    }
}
