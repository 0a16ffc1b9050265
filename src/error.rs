use std::path::PathBuf;
use thiserror::Error;

use crate::models::GenerationOutcome;

#[derive(Debug, Error)]
pub enum ImagenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Response did not contain image data: {body}")]
    ResponseShape { body: String },

    #[error("Could not parse API response: {0}")]
    Parse(String),

    #[error("Download failed or file is empty for {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImagenError {
    pub fn transport(message: impl Into<String>) -> Self {
        ImagenError::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ImagenError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Transient transport failures: no status at all (connect, DNS, timeout),
    /// request timeout, rate limiting, or a server-side error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImagenError::Transport { status: None, .. } => true,
            ImagenError::Transport {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }

    /// The log outcome a failed generation is reported under.
    pub fn outcome(&self) -> GenerationOutcome {
        match self {
            ImagenError::Transport { .. } => GenerationOutcome::TransportFailed,
            ImagenError::ResponseShape { .. } => GenerationOutcome::ResponseInvalid,
            ImagenError::Parse(_) | ImagenError::Serialization(_) => GenerationOutcome::ParseFailed,
            ImagenError::Persistence { .. } | ImagenError::Io(_) => {
                GenerationOutcome::PersistenceFailed
            }
            ImagenError::Config(_) => GenerationOutcome::ConfigInvalid,
        }
    }
}

impl From<reqwest::Error> for ImagenError {
    fn from(e: reqwest::Error) -> Self {
        ImagenError::Transport {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
            body: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImagenError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(code: u16) -> ImagenError {
        ImagenError::Transport {
            message: format!("HTTP {}", code),
            status: Some(code),
            body: None,
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ImagenError::transport("connection refused").is_retryable());
        assert!(with_status(500).is_retryable());
        assert!(with_status(503).is_retryable());
        assert!(with_status(429).is_retryable());
        assert!(with_status(408).is_retryable());
        assert!(!with_status(400).is_retryable());
        assert!(!with_status(401).is_retryable());
        assert!(!with_status(404).is_retryable());
    }

    #[test]
    fn test_non_transport_errors_never_retry() {
        let shape = ImagenError::ResponseShape {
            body: "{}".to_string(),
        };
        assert!(!shape.is_retryable());
        assert!(!ImagenError::Parse("bad".into()).is_retryable());
        assert_eq!(shape.outcome(), GenerationOutcome::ResponseInvalid);
    }

    #[test]
    fn test_persistence_message_names_path() {
        let err = ImagenError::Persistence {
            path: PathBuf::from("scene_1.png"),
            message: "file is empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "Download failed or file is empty for scene_1.png: file is empty"
        );
        assert_eq!(err.outcome(), GenerationOutcome::PersistenceFailed);
    }
}
