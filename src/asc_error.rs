// Error types shared by the game library
// Startup failures (arguments, assets, display) surface through GameError

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or looking up bundled assets
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{kind} asset not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("language bundle {code} is missing key {key:?}")]
    MissingKey { code: &'static str, key: &'static str },

    #[error("failed to read asset file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse asset file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AssetError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        AssetError::NotFound {
            kind,
            key: key.into(),
        }
    }
}

/// Failures while reading the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown key name {0:?} in key map")]
    UnknownKey(String),
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("display unavailable: {0}")]
    Display(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;
