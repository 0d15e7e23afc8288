//! Errors raised when talking to the registry.

use std::fmt;

use thiserror::Error;

/// Which registry call failed, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListEntries,
    GetEntry,
    PublishEntry,
    UpdateEntry,
    DeleteEntry,
    DevToken,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::ListEntries => "fetch servers",
            Operation::GetEntry => "fetch server details",
            Operation::PublishEntry => "publish server",
            Operation::UpdateEntry => "update server",
            Operation::DeleteEntry => "delete server",
            Operation::DevToken => "get auth token",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry answered with a non-2xx status.
    #[error("Failed to {operation}: {status} {status_text}{}", body_suffix(.body))]
    RequestFailed {
        operation: Operation,
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Connection refused, DNS failure and similar transport errors.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// A 2xx response whose body was not the expected JSON.
    #[error("Invalid response from registry: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Not authenticated. Run `mcpreg auth login` first")]
    NotAuthenticated,

    #[error("Invalid namespace '{0}': must start with kp.internal., kp.public., or kp.experimental.")]
    InvalidNamespace(String),

    #[error("Invalid registry URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl RegistryError {
    /// HTTP status of a `RequestFailed`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn body_suffix(body: &Option<String>) -> String {
    match body.as_deref().map(str::trim) {
        Some(b) if !b.is_empty() => format!(" - {b}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failed_names_operation_and_body() {
        let err = RegistryError::RequestFailed {
            operation: Operation::PublishEntry,
            status: 403,
            status_text: "Forbidden".into(),
            body: Some("Ownership mismatch\n".into()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to publish server: 403 Forbidden - Ownership mismatch"
        );
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn request_failed_without_body() {
        let err = RegistryError::RequestFailed {
            operation: Operation::ListEntries,
            status: 500,
            status_text: "Internal Server Error".into(),
            body: None,
        };
        assert_eq!(err.to_string(), "Failed to fetch servers: 500 Internal Server Error");
    }
}
