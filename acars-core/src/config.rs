//! Configuration file for the ACARS server.
//!
//! Reads `acars-server.conf`, a flat properties file:
//!
//! ```text
//! server.port = 9876
//! database.url = data/acars.db
//! channels.1 = 131.525
//! channels.2 = 131.725
//! message.skip.labels = Q0,_d
//! message.once.labels = H1
//! ```
//!
//! Missing file or missing keys fall back to defaults.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::enrich::ChannelPlan;
use crate::routing::LabelPolicy;
use crate::types::{AcarsError, Result};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "acars-server.conf";

pub const DEFAULT_PORT: u16 = 9876;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// Full configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Frequency of channel N at index N-1.
    pub channels: Vec<String>,
    pub message: MessageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Receive buffer size; longer datagrams are cut by the socket.
    pub max_packet_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// SQLite path (optionally `sqlite://`-prefixed) or `postgres://` URL.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageConfig {
    pub skip_labels: Vec<String>,
    pub once_labels: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: DEFAULT_HOST.into(),
                port: DEFAULT_PORT,
                max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            },
            database: DatabaseConfig::default(),
            channels: Vec::new(),
            message: MessageConfig::default(),
        }
    }
}

impl Config {
    pub fn label_policy(&self) -> LabelPolicy {
        LabelPolicy::new(
            self.message.skip_labels.iter().cloned(),
            self.message.once_labels.iter().cloned(),
        )
    }

    pub fn channel_plan(&self) -> ChannelPlan {
        ChannelPlan::new(self.channels.clone())
    }

    /// `host:port` to bind the UDP socket on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load config from `path`.
///
/// A missing or unreadable file yields the defaults (with a warning); a file
/// that exists but holds an invalid value is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file, using defaults");
            return Ok(Config::default());
        }
    };

    parse_config(&text)
}

/// Parse properties text into a [`Config`].
pub fn parse_config(text: &str) -> Result<Config> {
    let props = parse_properties(text);
    let mut config = Config::default();

    if let Some(v) = props.get("server.host") {
        config.server.host = v.clone();
    }
    if let Some(v) = props.get("server.port") {
        config.server.port = parse_number("server.port", v)?;
    }
    if let Some(v) = props.get("server.max_packet_size") {
        config.server.max_packet_size = parse_number("server.max_packet_size", v)?;
    }

    config.database.url = props.get("database.url").filter(|v| !v.is_empty()).cloned();

    // Channels are numbered from 1 and must be contiguous
    for n in 1.. {
        match props.get(&format!("channels.{n}")) {
            Some(freq) => config.channels.push(freq.clone()),
            None => break,
        }
    }

    if let Some(v) = props.get("message.skip.labels") {
        config.message.skip_labels = split_labels(v);
    }
    if let Some(v) = props.get("message.once.labels") {
        config.message.once_labels = split_labels(v);
    }

    Ok(config)
}

/// `key=value` / `key: value` lines; `#` and `!` start comments.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with('!') {
            continue;
        }

        let split = stripped
            .find(['=', ':'])
            .map(|i| (&stripped[..i], &stripped[i + 1..]));

        if let Some((key, val)) = split {
            props.insert(key.trim().to_string(), val.trim().to_string());
        }
    }

    props
}

fn parse_number<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| AcarsError::Config(format!("{key}: invalid value {val:?}")))
}

fn split_labels(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Route;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 9876);
        assert_eq!(config.server.max_packet_size, 512);
        assert!(config.database.url.is_none());
        assert!(config.channels.is_empty());
        assert_eq!(config.bind_addr(), "0.0.0.0:9876");
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
# acars-server configuration
server.port = 5555
database.url = sqlite://data/acars.db
channels.1 = 131.525
channels.2 = 131.725
message.skip.labels = Q0, _d,SQ
message.once.labels = H1
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.server.port, 5555);
        assert_eq!(config.database.url.as_deref(), Some("sqlite://data/acars.db"));
        assert_eq!(config.channels, vec!["131.525", "131.725"]);
        assert_eq!(config.message.skip_labels, vec!["Q0", "_d", "SQ"]);
        assert_eq!(config.message.once_labels, vec!["H1"]);

        let policy = config.label_policy();
        assert_eq!(policy.route("_d"), Route::Skip);
        assert_eq!(policy.route("H1"), Route::InsertOnce);
        assert_eq!(config.channel_plan().frequency_for(2), Some("131.725"));
    }

    #[test]
    fn test_parse_colon_separator_and_comments() {
        let text = "! legacy comment\nserver.port: 7000\nserver.host=127.0.0.1\n";
        let config = parse_config(text).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.bind_addr(), "127.0.0.1:7000");
    }

    #[test]
    fn test_channels_stop_at_gap() {
        let text = "channels.1=131.525\nchannels.3=130.025\n";
        let config = parse_config(text).unwrap();
        assert_eq!(config.channels, vec!["131.525"]);
    }

    #[test]
    fn test_empty_label_lists() {
        let text = "message.skip.labels=\nmessage.once.labels= , \n";
        let config = parse_config(text).unwrap();
        assert!(config.message.skip_labels.is_empty());
        assert!(config.message.once_labels.is_empty());
    }

    #[test]
    fn test_invalid_port() {
        let err = parse_config("server.port = ninety").unwrap_err();
        assert!(matches!(err, AcarsError::Config(ref m) if m.contains("server.port")));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.conf")).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "server.port=6000\ndatabase.url=:memory:\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.database.url.as_deref(), Some(":memory:"));
    }
}
