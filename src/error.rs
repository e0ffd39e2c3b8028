use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    CredentialsMissing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("Connection lost: {0}")]
    StaleConnection(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Wrap a filesystem failure with the path it happened on.
    pub fn io_at(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(path.to_string())
        } else {
            AppError::Io(std::io::Error::new(err.kind(), format!("{}: {}", path, err)))
        }
    }

    /// Only transport-level failures are worth another connect attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::CredentialsMissing(_) => "CREDENTIALS_MISSING",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Io(_) => "IO_ERROR",
            AppError::Sftp(_) => "SFTP_ERROR",
            AppError::StaleConnection(_) => "STALE_CONNECTION",
            AppError::NotConnected(_) => "NOT_CONNECTED",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::Keychain(_) => "KEYCHAIN_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

/// Serializable error for the command surface
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AppError> for SerializableError {
    fn from(err: &AppError) -> Self {
        let (message, details) = match err {
            AppError::Auth(msg) => ("Authentication failed".to_string(), Some(msg.clone())),
            AppError::StaleConnection(host) => (
                format!("Connection to {} was lost. Reconnect to continue.", host),
                None,
            ),
            other => (other.to_string(), None),
        };

        SerializableError {
            code: err.code().to_string(),
            message: crate::logging::sanitize(&message),
            details: details.map(|d| crate::logging::sanitize(&d)),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        SerializableError::from(self).serialize(serializer)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::Keychain(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Unknown(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Unknown(format!("background task failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
