//! Error taxonomy for the API client.
//!
//! Two kinds of failure are kept apart: the transport never produced an HTTP
//! response ([`ClientError::Connection`]), or the server answered with a
//! failure status ([`ClientError::Api`]).

use thiserror::Error;

/// Failure raised by a [`Transport`](super::Transport) before any HTTP
/// response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Refused connection, DNS resolution failure, unreachable network.
    #[error("{0}")]
    Connect(String),
    /// The request did not complete within the configured timeout.
    #[error("{0}")]
    Timeout(String),
    /// Any other failure while building or sending the request.
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        // Timeout is checked first: a connect timeout reports both flags.
        if error.is_timeout() {
            TransportError::Timeout(error_chain(&error))
        } else if error.is_connect() {
            TransportError::Connect(error_chain(&error))
        } else {
            TransportError::Other(error_chain(&error))
        }
    }
}

/// Flattens an error and its sources into one line; reqwest keeps the useful
/// part ("Connection refused", "dns error") in the source chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Errors returned by [`ApiClient`](super::ApiClient) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No HTTP response was produced.
    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: TransportError,
    },

    /// The server answered with a failure status after retries were exhausted.
    #[error("API request failed with status {status}: {detail}")]
    Api { status: u16, detail: String },
}

impl ClientError {
    /// Builds the connection failure for `cause`, naming the target authority
    /// or the configured timeout.
    pub(crate) fn connection(cause: TransportError, base_url: &str, timeout_secs: u64) -> Self {
        let message = match &cause {
            TransportError::Connect(text) => {
                format!("Failed to connect to {}: {}", base_url, text)
            }
            TransportError::Timeout(text) => {
                format!("Request timed out after {} seconds: {}", timeout_secs, text)
            }
            TransportError::Other(text) => format!("Request failed: {}", text),
        };
        ClientError::Connection {
            message,
            source: cause,
        }
    }

    /// HTTP status of an API failure, `None` for connection failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Connection { .. } => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection { .. })
    }
}
