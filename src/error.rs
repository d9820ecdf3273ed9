//! Error types for the 24mail client.

use thiserror::Error;

/// Error type for all client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or non-2xx status.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Request arguments could not be form-encoded.
    #[error("failed to encode arguments: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    /// Response was valid JSON but not in the expected shape.
    #[error("unexpected response shape: {0}")]
    ResponseParse(String),

    /// A single message field could not be parsed.
    #[error("invalid {field} field: {value:?}")]
    FieldParse { field: &'static str, value: String },

    /// The inbox probe issued after the `set` handshake failed.
    #[error("inbox probe for mailbox {name} failed after registration")]
    Registration {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn field(field: &'static str, value: impl Into<String>) -> Self {
        Self::FieldParse {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::ResponseParse(msg.into())
    }
}
