//! Node configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `ROOMHUB_*` environment variables. The binary applies CLI flags on top and
//! calls [`Config::check`] before anything starts.

use crate::observability::LogFormat;
use roomhub_realtime::DEFAULT_MAX_CONNECTIONS;
use roomhub_store::{MemoryStore, RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Prefix for environment overrides, e.g. `ROOMHUB_JWT_SECRET`.
pub const ENV_PREFIX: &str = "ROOMHUB";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Configuration for the roomhub node.
#[derive(Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Config {
    /// HTTP/WebSocket listen address.
    pub listen_addr: SocketAddr,
    /// HS256 secret used to verify connection tokens.
    #[validate(length(min = 1, message = "jwt_secret must be set"))]
    pub jwt_secret: String,
    /// Clock skew tolerated on token expiry, in seconds.
    #[validate(range(max = 3600))]
    pub jwt_leeway_secs: u64,
    /// Log level (trace, debug, info, warn, error).
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Origins allowed to open a WebSocket. Empty allows any.
    pub allowed_origins: Vec<String>,
    /// Cap on concurrently connected sessions.
    #[validate(range(min = 1))]
    pub max_connections: usize,
    /// Users and room memberships loaded into the in-memory store.
    #[validate(nested)]
    pub directory: Directory,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            jwt_secret: String::new(),
            jwt_leeway_secs: roomhub_auth::DEFAULT_LEEWAY_SECS,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            allowed_origins: Vec::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            directory: Directory::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("allowed_origins", &self.allowed_origins)
            .field("max_connections", &self.max_connections)
            .field("directory", &self.directory)
            .finish()
    }
}

impl Config {
    /// Loads configuration from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins"),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every field.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }
}

/// Static user directory for the in-memory store.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Directory {
    #[validate(nested)]
    pub users: Vec<DirectoryUser>,
    pub rooms: Vec<DirectoryRoom>,
}

/// A user known to the node.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DirectoryUser {
    pub id: u64,
    #[validate(length(min = 1))]
    pub username: String,
}

/// A room and the ids of its members.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryRoom {
    pub id: u64,
    #[serde(default)]
    pub members: Vec<u64>,
}

impl Directory {
    /// Builds a store holding this directory's users and memberships.
    pub fn build_store(&self) -> MemoryStore {
        let store = MemoryStore::new();
        for user in &self.users {
            store.add_user_with_id(&user.username, UserId(user.id));
        }
        for room in &self.rooms {
            for member in &room.members {
                store.add_member(RoomId(room.id), UserId(*member));
            }
        }
        store
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomhub_store::ChatStore;

    fn valid() -> Config {
        Config {
            jwt_secret: "secret".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.max_connections, 10_000);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            Config::default().check(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(valid().check().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = Config {
            max_connections: 0,
            ..valid()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_log_level_validated() {
        let config = Config {
            log_level: "loud".to_string(),
            ..valid()
        };
        assert!(config.check().is_err());

        let config = Config {
            log_level: "DEBUG".to_string(),
            ..valid()
        };
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_log_format_parsed_from_source() {
        let config: Config = config::Config::builder()
            .set_override("log_format", "JSON")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.log_format, LogFormat::Json);

        let bad = config::Config::builder()
            .set_override("log_format", "xml")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<Config>();
        assert!(bad.is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/roomhub.yaml"))).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[tokio::test]
    async fn test_directory_builds_store() {
        let directory = Directory {
            users: vec![DirectoryUser {
                id: 9,
                username: "bob".to_string(),
            }],
            rooms: vec![DirectoryRoom {
                id: 7,
                members: vec![9],
            }],
        };
        let store = directory.build_store();

        assert_eq!(store.resolve_username("bob").await.unwrap(), Some(UserId(9)));
        assert!(store.is_room_member(RoomId(7), UserId(9)).await.unwrap());
        assert!(!store.is_room_member(RoomId(7), UserId(1)).await.unwrap());
    }
}
