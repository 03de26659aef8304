use std::{fmt, io};

/// Crate-wide `Result` type using [`KnapsackError`] as the error.
pub type Result<T> = std::result::Result<T, KnapsackError>;

/// Top-level error type for knapsack operations.
#[derive(Debug)]
pub enum KnapsackError {
    /// Archive session errors.
    Session(SessionError),

    /// Cluster query errors.
    Cluster(ClusterError),

    /// Job registry errors.
    Registry(RegistryError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Archive session errors.
#[derive(Debug)]
pub enum SessionError {
    /// Target exists and overwriting is not allowed.
    AlreadyExists(String),

    /// Target could not be opened.
    OpenFailed { path: String, reason: String },

    /// A packet could not be written.
    WriteFailed(String),

    /// Session was used after close.
    Closed,
}

/// Cluster query errors.
#[derive(Debug)]
pub enum ClusterError {
    /// Transport-level failure.
    RequestFailed(String),

    /// Cluster answered with a non-success status.
    Status { status: u16, body: String },

    /// Response body did not have the expected shape.
    InvalidResponse(String),
}

/// Job registry errors.
#[derive(Debug)]
pub enum RegistryError {
    /// Registry state could not be persisted.
    Persist(io::Error),

    /// Registry lock was poisoned by a panicking holder.
    Poisoned,
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for KnapsackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnapsackError::Session(e) => write!(f, "Session error: {e}"),
            KnapsackError::Cluster(e) => write!(f, "Cluster error: {e}"),
            KnapsackError::Registry(e) => write!(f, "Registry error: {e}"),
            KnapsackError::Config(e) => write!(f, "Configuration error: {e}"),
            KnapsackError::Io(e) => write!(f, "I/O error: {e}"),
            KnapsackError::Json(e) => write!(f, "JSON error: {e}"),
            KnapsackError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyExists(path) => {
                write!(f, "{path} already exists and overwrite is not allowed")
            }
            SessionError::OpenFailed { path, reason } => {
                write!(f, "cannot open {path}: {reason}")
            }
            SessionError::WriteFailed(msg) => write!(f, "write failed: {msg}"),
            SessionError::Closed => write!(f, "session is closed"),
        }
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::RequestFailed(msg) => write!(f, "request failed: {msg}"),
            ClusterError::Status { status, body } => {
                write!(f, "cluster responded with status {status}: {body}")
            }
            ClusterError::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Persist(e) => write!(f, "failed to persist job state: {e}"),
            RegistryError::Poisoned => write!(f, "registry lock poisoned"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for KnapsackError {}
impl std::error::Error for SessionError {}
impl std::error::Error for ClusterError {}
impl std::error::Error for RegistryError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to KnapsackError ========================= */

impl From<io::Error> for KnapsackError {
    fn from(err: io::Error) -> Self {
        KnapsackError::Io(err)
    }
}

impl From<serde_json::Error> for KnapsackError {
    fn from(err: serde_json::Error) -> Self {
        KnapsackError::Json(err)
    }
}

impl From<reqwest::Error> for KnapsackError {
    fn from(err: reqwest::Error) -> Self {
        KnapsackError::Cluster(ClusterError::RequestFailed(err.to_string()))
    }
}

impl From<SessionError> for KnapsackError {
    fn from(err: SessionError) -> Self {
        KnapsackError::Session(err)
    }
}

impl From<ClusterError> for KnapsackError {
    fn from(err: ClusterError) -> Self {
        KnapsackError::Cluster(err)
    }
}

impl From<RegistryError> for KnapsackError {
    fn from(err: RegistryError) -> Self {
        KnapsackError::Registry(err)
    }
}

impl From<ConfigError> for KnapsackError {
    fn from(err: ConfigError) -> Self {
        KnapsackError::Config(err)
    }
}

impl From<String> for KnapsackError {
    fn from(msg: String) -> Self {
        KnapsackError::Generic(msg)
    }
}

impl From<&str> for KnapsackError {
    fn from(msg: &str) -> Self {
        KnapsackError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err: KnapsackError = SessionError::AlreadyExists("out.jsonl".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Session error: out.jsonl already exists and overwrite is not allowed"
        );
    }

    #[test]
    fn test_cluster_status_display() {
        let err = ClusterError::Status {
            status: 404,
            body: "index_not_found_exception".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("index_not_found_exception"));
    }

    #[test]
    fn test_io_conversion() {
        let err: KnapsackError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, KnapsackError::Io(_)));
    }
}
