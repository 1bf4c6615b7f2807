use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DevopsmindError {
    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile already exists: {0}")]
    ProfileExists(String),

    #[error("invalid profile name '{0}': use letters, digits, '-' or '_'")]
    InvalidProfileName(String),

    #[error("malformed metadata in {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("malformed sync record {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("relay error: {0}")]
    Relay(#[from] crate::relay::RelayError),

    #[error("home directory not found: set HOME or DEVOPSMIND_HOME")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DevopsmindError>;
