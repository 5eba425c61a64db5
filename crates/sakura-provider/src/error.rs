use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("home directory not found; set SAKURACLOUD_PROFILE_DIR")]
    HomeDirNotFound,

    #[error("loading profile {profile:?} is failed: {reason}")]
    Profile { profile: String, reason: String },

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("{}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
