/// Server configuration
///
/// Loaded from an XML file and validated after every load. All fields have
/// defaults, so an empty `<server/>` element is a valid configuration.

use crate::error::{MudError, Result};
use crate::network::ansi::ColorMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime settings for one server process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "server", default)]
pub struct ServerConfig {
    /// Name shown in the welcome banner
    pub name: String,

    pub host: String,

    /// Listening port; 0 picks an ephemeral port
    pub port: u16,

    /// Minimum delay between two input reads on one connection
    pub input_throttle_ms: u64,

    /// Events buffered per session before new ones are dropped
    pub event_queue_capacity: usize,

    pub max_line_length: usize,

    /// Marks a line as a builder command rather than an action
    pub command_prefix: String,

    pub logout_keyword: String,

    /// Directory for entity records; `None` keeps the world in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub color_mode: ColorMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "MudCore".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8945,
            input_throttle_ms: 200,
            event_queue_capacity: 256,
            max_line_length: 1024,
            command_prefix: "/".to_string(),
            logout_keyword: "logout".to_string(),
            data_dir: None,
            color_mode: ColorMode::Dark,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    pub fn input_throttle(&self) -> Duration {
        Duration::from_millis(self.input_throttle_ms)
    }

    /// Address string suitable for `TcpListener::bind`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check every field, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, reason: &str) -> Result<()> {
            warn!("Validation failed: {} {}", field, reason);
            Err(MudError::ValidationError {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        }

        if self.name.trim().is_empty() {
            return invalid("name", "Name cannot be empty");
        }

        let host = self.host.trim();
        if host.is_empty() {
            return invalid("host", "Host cannot be empty");
        }
        if host.contains("..") || host.starts_with('.') || host.ends_with('.') {
            return invalid("host", "Host is not a valid hostname");
        }

        if self.event_queue_capacity == 0 {
            return invalid("event_queue_capacity", "Must be greater than zero");
        }
        if self.max_line_length == 0 {
            return invalid("max_line_length", "Must be greater than zero");
        }
        if self.command_prefix.trim().is_empty() {
            return invalid("command_prefix", "Command prefix cannot be empty");
        }
        if self.logout_keyword.trim().is_empty() {
            return invalid("logout_keyword", "Logout keyword cannot be empty");
        }

        debug!("Validation passed for server '{}'", self.name);
        Ok(())
    }

    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self).map_err(|e| {
            warn!("Failed to serialize config: {}", e);
            MudError::ConfigSerialize(e.to_string())
        })?;

        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n", body))
    }

    /// Parse and validate an XML configuration
    pub fn from_xml(xml: &str) -> Result<Self> {
        debug!("Parsing config from XML ({} bytes)", xml.len());

        let config: ServerConfig = quick_xml::de::from_str(xml).map_err(|e| {
            warn!("Failed to parse config XML: {}", e);
            MudError::ConfigParse(e.to_string())
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)?;
        let config = Self::from_xml(&xml)?;

        info!("Loaded config '{}' from {}", config.name, path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_xml()?)?;
        Ok(())
    }
}

/// Builder for `ServerConfig`
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn input_throttle(mut self, delay: Duration) -> Self {
        self.config.input_throttle_ms = delay.as_millis() as u64;
        self
    }

    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.event_queue_capacity = capacity;
        self
    }

    pub fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    pub fn command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.command_prefix = prefix.into();
        self
    }

    pub fn logout_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.config.logout_keyword = keyword.into();
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.config.color_mode = mode;
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.input_throttle(), Duration::from_millis(200));
        assert_eq!(config.event_queue_capacity, 256);
        assert_eq!(config.command_prefix, "/");
        assert_eq!(config.logout_keyword, "logout");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .name("Test")
            .port(0)
            .input_throttle(Duration::from_millis(50))
            .color_mode(ColorMode::None)
            .build()
            .unwrap();

        assert_eq!(config.address(), "127.0.0.1:0");
        assert_eq!(config.input_throttle_ms, 50);
        assert_eq!(config.color_mode, ColorMode::None);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let empty_host = ServerConfig::builder().host("  ").build();
        assert!(matches!(
            empty_host,
            Err(MudError::ValidationError { ref field, .. }) if field == "host"
        ));

        assert!(ServerConfig::builder().host("bad..host").build().is_err());
        assert!(ServerConfig::builder().event_queue_capacity(0).build().is_err());
        assert!(ServerConfig::builder().command_prefix("").build().is_err());
    }

    #[test]
    fn test_xml_partial_uses_defaults() {
        let xml = r#"<server><name>Midgaard</name><port>4000</port><color_mode>light</color_mode></server>"#;

        let config = ServerConfig::from_xml(xml).unwrap();

        assert_eq!(config.name, "Midgaard");
        assert_eq!(config.port, 4000);
        assert_eq!(config.color_mode, ColorMode::Light);
        assert_eq!(config.input_throttle_ms, 200);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_xml_round_trip() {
        let config = ServerConfig::builder()
            .name("Midgaard")
            .data_dir("/var/lib/mud")
            .build()
            .unwrap();

        let xml = config.to_xml().unwrap();
        assert!(xml.starts_with("<?xml"));

        assert_eq!(ServerConfig::from_xml(&xml).unwrap(), config);
    }

    #[test]
    fn test_invalid_xml_is_rejected() {
        assert!(matches!(
            ServerConfig::from_xml("<server><port>not a port</port></server>"),
            Err(MudError::ConfigParse(_))
        ));
        assert!(matches!(
            ServerConfig::from_xml("<server><max_line_length>0</max_line_length></server>"),
            Err(MudError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_load_and_save_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.xml");
        let config = ServerConfig::builder().name("Saved").build().unwrap();

        config.save(&path).unwrap();

        assert_eq!(ServerConfig::load(&path).unwrap(), config);
    }
}
