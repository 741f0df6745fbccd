//! Service configuration: bind address, data directory, token table.
//!
//! Sessions are out of scope; the token table is how a deployment maps
//! already-issued bearer tokens to resolved actors.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thela_core::{Actor, ActorRole};

/// Errors raised while loading service configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// One bearer token and the actor it resolves to.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub actor_id: String,
    pub role: ActorRole,
}

/// Deployment configuration for the HTTP service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".thela")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            data_dir: default_data_dir(),
            tokens: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse configuration from TOML text.
    pub fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// The resolved token -> actor table.
    pub fn actor_table(&self) -> BTreeMap<String, Actor> {
        self.tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    Actor::new(entry.actor_id.clone(), entry.role),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let text = r#"
bind = "0.0.0.0:8088"
data_dir = "/var/lib/thela"

[[tokens]]
token = "tok-rider"
actor_id = "r1"
role = "rider"

[[tokens]]
token = "tok-admin"
actor_id = "admin"
role = "super_admin"
"#;
        let config = ServiceConfig::parse(text, "test.toml").expect("config should parse");
        assert_eq!(config.bind.port(), 8088);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/thela"));

        let table = config.actor_table();
        assert_eq!(
            table.get("tok-rider"),
            Some(&Actor::new("r1", ActorRole::Rider))
        );
        assert_eq!(
            table.get("tok-admin").map(|actor| actor.role),
            Some(ActorRole::SuperAdmin)
        );
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config = ServiceConfig::parse("", "empty.toml").expect("empty config should parse");
        assert_eq!(config.bind, default_bind());
        assert_eq!(config.data_dir, PathBuf::from(".thela"));
        assert!(config.tokens.is_empty());
    }

    #[test]
    fn invalid_toml_reports_the_path() {
        let err = ServiceConfig::parse("bind = ???", "bad.toml").expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "bad.toml"));
    }
}
