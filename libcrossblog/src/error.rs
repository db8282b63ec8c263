//! Error types for Crossblog

use thiserror::Error;

use crate::oauth::OAuthError;

pub type Result<T> = std::result::Result<T, CrossblogError>;

#[derive(Error, Debug)]
pub enum CrossblogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps an error with the sync step that produced it
    #[error("{step} failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<CrossblogError>,
    },

    #[error("Failed to push to {} destination(s): {}", .0.len(), .0.join(", "))]
    PartialFailure(Vec<String>),
}

/// Coarse classification of any error, independent of where it was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Auth,
    Transport,
    Timeout,
    NotFound,
    Conversion,
    AlreadyExists,
    Unsupported,
    InvalidInput,
    Io,
    PartialFailure,
}

impl CrossblogError {
    /// Attach the name of the failed step to an error
    pub fn in_step(self, step: impl Into<String>) -> Self {
        CrossblogError::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error, looking through step wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrossblogError::Config(_) => ErrorKind::Config,
            CrossblogError::Platform(e) => e.kind(),
            CrossblogError::OAuth(e) => e.kind(),
            CrossblogError::NotFound(_) => ErrorKind::NotFound,
            CrossblogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CrossblogError::Io(_) => ErrorKind::Io,
            CrossblogError::Step { source, .. } => source.kind(),
            CrossblogError::PartialFailure(_) => ErrorKind::PartialFailure,
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidInput => 3,
            ErrorKind::Auth | ErrorKind::Timeout => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown platform type: {0}")]
    UnknownPlatform(String),

    #[error("Duplicate {role} name: {name}")]
    DuplicateName { role: &'static str, name: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Markdown conversion failed: {0}")]
    Conversion(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::Authentication(_) => ErrorKind::Auth,
            PlatformError::Network(_) => ErrorKind::Transport,
            PlatformError::NotFound(_) => ErrorKind::NotFound,
            PlatformError::Conversion(_) => ErrorKind::Conversion,
            PlatformError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            PlatformError::NotImplemented(_) => ErrorKind::Unsupported,
        }
    }
}
