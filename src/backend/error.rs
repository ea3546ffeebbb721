#[derive(Debug)]
pub enum BackendError {
    Transport {
        source: reqwest::Error,
        method: String,
    },
    Status {
        status: u16,
        method: String,
    },
    Encode {
        source: serde_json::Error,
        method: String,
    },
    Decode {
        source: serde_json::Error,
        method: String,
    },
    MissingMessage {
        method: String,
    },
    Rejected {
        method: String,
        message: String,
    },
}

impl BackendError {
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            BackendError::Transport { method, .. }
            | BackendError::Status { method, .. }
            | BackendError::Encode { method, .. }
            | BackendError::Decode { method, .. }
            | BackendError::MissingMessage { method }
            | BackendError::Rejected { method, .. } => method,
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Transport {
                source: error,
                method,
            } => write!(f, "Call to '{method}' failed: {error}"),
            BackendError::Status { status, method } => {
                write!(f, "Call to '{method}' returned HTTP {status}")
            }
            BackendError::Encode {
                source: error,
                method,
            } => write!(f, "Cannot encode request to '{method}': {error}"),
            BackendError::Decode {
                source: error,
                method,
            } => write!(f, "Malformed response from '{method}': {error}"),
            BackendError::MissingMessage { method } => {
                write!(f, "Response from '{method}' has no message")
            }
            BackendError::Rejected { method, message } => {
                write!(f, "Call to '{method}' was rejected: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Transport { source: error, .. } => Some(error),
            BackendError::Encode { source: error, .. }
            | BackendError::Decode { source: error, .. } => Some(error),
            BackendError::Status { .. }
            | BackendError::MissingMessage { .. }
            | BackendError::Rejected { .. } => None,
        }
    }
}
