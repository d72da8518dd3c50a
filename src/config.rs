//! Configuration module for Yak.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, YakError};

/// Web server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the HTTP API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve the client bundle.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    3000
}

fn default_static_path() -> String {
    "client/dist".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            serve_static: false,
            static_path: default_static_path(),
        }
    }
}

/// Event relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Interval between heartbeat events in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Maximum number of events kept for replay (0 = unbounded).
    #[serde(default)]
    pub history_limit: usize,
    /// Per-subscriber queue size before a slow subscriber is dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    /// Character that marks a message as a command.
    #[serde(default = "default_trigger")]
    pub trigger: String,
}

fn default_heartbeat_interval() -> u64 {
    2000
}

fn default_subscriber_buffer() -> usize {
    256
}

fn default_trigger() -> String {
    "/".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            history_limit: 0,
            subscriber_buffer: default_subscriber_buffer(),
            trigger: default_trigger(),
        }
    }
}

impl RelayConfig {
    /// Get the trigger as a single character.
    ///
    /// Falls back to `/` if the configured value is not exactly one character.
    pub fn trigger_char(&self) -> char {
        let mut chars = self.trigger.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => '/',
        }
    }
}

/// Which extension catalog backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionBackend {
    /// Sandboxed Lua scripts loaded from `scripts_dir`.
    Lua,
    /// Remote executor reachable over HTTP at `remote_url`.
    Remote,
}

/// Extension command configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionsConfig {
    /// Whether external extensions are enabled at all.
    #[serde(default = "default_extensions_enabled")]
    pub enabled: bool,
    /// Extension point name queried for commands.
    #[serde(default = "default_extension_point")]
    pub extension_point: String,
    /// Catalog backend.
    #[serde(default = "default_extension_backend")]
    pub backend: ExtensionBackend,
    /// Base directory for Lua extension scripts.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,
    /// Base URL of the remote extension executor.
    #[serde(default)]
    pub remote_url: String,
    /// How long a fetched command list stays fresh, in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Maximum Lua instructions per invocation.
    #[serde(default = "default_max_instructions")]
    pub max_instructions: u64,
    /// Maximum Lua memory per invocation in megabytes.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// Wall-clock limit for a single invocation in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_extensions_enabled() -> bool {
    true
}

fn default_extension_point() -> String {
    "slash-commands".to_string()
}

fn default_extension_backend() -> ExtensionBackend {
    ExtensionBackend::Lua
}

fn default_scripts_dir() -> String {
    "scripts".to_string()
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_max_instructions() -> u64 {
    1_000_000
}

fn default_max_memory_mb() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            enabled: default_extensions_enabled(),
            extension_point: default_extension_point(),
            backend: default_extension_backend(),
            scripts_dir: default_scripts_dir(),
            remote_url: String::new(),
            refresh_interval_secs: default_refresh_interval(),
            max_instructions: default_max_instructions(),
            max_memory_mb: default_max_memory_mb(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/yak.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Web server configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Event relay configuration.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Extension command configuration.
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(YakError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| YakError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `YAK_PORT`: Override the HTTP port
    /// - `YAK_SCRIPTS_DIR`: Override the Lua scripts directory
    /// - `YAK_REMOTE_URL`: Override the remote extension executor URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("YAK_PORT") {
            match port.parse() {
                Ok(port) => self.web.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid YAK_PORT"),
            }
        }

        if let Ok(dir) = std::env::var("YAK_SCRIPTS_DIR") {
            if !dir.is_empty() {
                self.extensions.scripts_dir = dir;
            }
        }

        if let Ok(url) = std::env::var("YAK_REMOTE_URL") {
            if !url.is_empty() {
                self.extensions.remote_url = url;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The trigger is not a single non-whitespace character
    /// - The remote backend is selected without a URL
    /// - The subscriber buffer is zero
    pub fn validate(&self) -> Result<()> {
        let mut chars = self.relay.trigger.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => {}
            _ => {
                return Err(YakError::Validation(format!(
                    "relay.trigger must be a single non-whitespace character, got {:?}",
                    self.relay.trigger
                )));
            }
        }

        if self.relay.subscriber_buffer == 0 {
            return Err(YakError::Validation(
                "relay.subscriber_buffer must be greater than zero".to_string(),
            ));
        }

        if self.extensions.enabled
            && self.extensions.backend == ExtensionBackend::Remote
            && self.extensions.remote_url.is_empty()
        {
            return Err(YakError::Validation(
                "extensions.backend is \"remote\" but remote_url is not set. \
                 Set it in config.toml or via YAK_REMOTE_URL environment variable."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 3000);
        assert!(config.web.cors_origins.is_empty());
        assert!(!config.web.serve_static);
        assert_eq!(config.web.static_path, "client/dist");

        assert_eq!(config.relay.heartbeat_interval_ms, 2000);
        assert_eq!(config.relay.history_limit, 0);
        assert_eq!(config.relay.subscriber_buffer, 256);
        assert_eq!(config.relay.trigger_char(), '/');

        assert!(config.extensions.enabled);
        assert_eq!(config.extensions.extension_point, "slash-commands");
        assert_eq!(config.extensions.backend, ExtensionBackend::Lua);
        assert_eq!(config.extensions.scripts_dir, "scripts");
        assert!(config.extensions.remote_url.is_empty());
        assert_eq!(config.extensions.refresh_interval_secs, 5);
        assert_eq!(config.extensions.max_instructions, 1_000_000);
        assert_eq!(config.extensions.max_memory_mb, 10);
        assert_eq!(config.extensions.timeout_secs, 5);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/yak.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[web]
host = "127.0.0.1"
port = 8080
cors_origins = ["http://localhost:5173"]
serve_static = true
static_path = "public"

[relay]
heartbeat_interval_ms = 500
history_limit = 1000
subscriber_buffer = 64
trigger = "!"

[extensions]
enabled = true
extension_point = "bots"
backend = "remote"
scripts_dir = "ext"
remote_url = "http://127.0.0.1:9000"
refresh_interval_secs = 30
max_instructions = 5000
max_memory_mb = 2
timeout_secs = 1

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.cors_origins, vec!["http://localhost:5173"]);
        assert!(config.web.serve_static);
        assert_eq!(config.web.static_path, "public");

        assert_eq!(config.relay.heartbeat_interval_ms, 500);
        assert_eq!(config.relay.history_limit, 1000);
        assert_eq!(config.relay.subscriber_buffer, 64);
        assert_eq!(config.relay.trigger_char(), '!');

        assert_eq!(config.extensions.extension_point, "bots");
        assert_eq!(config.extensions.backend, ExtensionBackend::Remote);
        assert_eq!(config.extensions.scripts_dir, "ext");
        assert_eq!(config.extensions.remote_url, "http://127.0.0.1:9000");
        assert_eq!(config.extensions.refresh_interval_secs, 30);
        assert_eq!(config.extensions.max_instructions, 5000);
        assert_eq!(config.extensions.max_memory_mb, 2);
        assert_eq!(config.extensions.timeout_secs, 1);

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[web]
port = 4000

[relay]
history_limit = 50
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.web.port, 4000);
        assert_eq!(config.relay.history_limit, 50);

        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.relay.heartbeat_interval_ms, 2000);
        assert_eq!(config.extensions.backend, ExtensionBackend::Lua);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.web.port, 3000);
        assert_eq!(config.relay.trigger, "/");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(YakError::Validation(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_parse_unknown_backend() {
        let toml = r#"
[extensions]
backend = "wasm"
"#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");

        assert!(result.is_err());
        assert!(matches!(result, Err(YakError::Io(_))));
    }

    #[test]
    fn test_load_with_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[web]\nport = 4000\n\n[relay]\ntrigger = \"!\"\n").unwrap();

        let original = std::env::var("YAK_PORT").ok();
        std::env::set_var("YAK_PORT", "4100");
        let config = Config::load_with_env(&path);
        match original {
            Some(val) => std::env::set_var("YAK_PORT", val),
            None => std::env::remove_var("YAK_PORT"),
        }

        let config = config.unwrap();
        assert_eq!(config.web.port, 4100);
        assert_eq!(config.relay.trigger, "!");
    }

    #[test]
    fn test_apply_env_overrides_scripts_dir() {
        let original = std::env::var("YAK_SCRIPTS_DIR").ok();

        std::env::set_var("YAK_SCRIPTS_DIR", "/srv/yak/scripts");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.extensions.scripts_dir, "/srv/yak/scripts");

        if let Some(val) = original {
            std::env::set_var("YAK_SCRIPTS_DIR", val);
        } else {
            std::env::remove_var("YAK_SCRIPTS_DIR");
        }
    }

    #[test]
    fn test_apply_env_overrides_empty_remote_url() {
        let original = std::env::var("YAK_REMOTE_URL").ok();

        std::env::set_var("YAK_REMOTE_URL", "");

        let mut config = Config::default();
        config.extensions.remote_url = "http://original".to_string();
        config.apply_env_overrides();

        // Should not override with empty string
        assert_eq!(config.extensions.remote_url, "http://original");

        if let Some(val) = original {
            std::env::set_var("YAK_REMOTE_URL", val);
        } else {
            std::env::remove_var("YAK_REMOTE_URL");
        }
    }

    #[test]
    fn test_validate_multi_char_trigger() {
        let mut config = Config::default();
        config.relay.trigger = "//".to_string();

        let result = config.validate();
        assert!(result.is_err());
        if let Err(YakError::Validation(msg)) = result {
            assert!(msg.contains("relay.trigger"));
        }
        assert_eq!(config.relay.trigger_char(), '/');
    }

    #[test]
    fn test_validate_whitespace_trigger() {
        let mut config = Config::default();
        config.relay.trigger = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_subscriber_buffer() {
        let mut config = Config::default();
        config.relay.subscriber_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_remote_without_url() {
        let mut config = Config::default();
        config.extensions.backend = ExtensionBackend::Remote;

        let result = config.validate();
        assert!(result.is_err());
        if let Err(YakError::Validation(msg)) = result {
            assert!(msg.contains("remote_url"));
        }
    }

    #[test]
    fn test_validate_remote_disabled_without_url() {
        let mut config = Config::default();
        config.extensions.enabled = false;
        config.extensions.backend = ExtensionBackend::Remote;

        assert!(config.validate().is_ok());
    }
}
