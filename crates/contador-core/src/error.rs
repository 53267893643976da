//! Shared error type across contador crates.

use thiserror::Error;

use crate::protocol::code::Code;

/// Stable error kinds, each tied to the CoAP response code sent to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed message or invalid input.
    BadRequest,
    /// CoAP version field other than 1.
    UnsupportedVersion,
    /// Unrecognized critical option.
    BadOption,
    /// No resource registered under the requested path.
    NotFound,
    /// Resource exists but does not accept the method.
    MethodNotAllowed,
    /// Message does not fit the configured datagram size.
    PayloadTooLarge,
    /// Internal server error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::BadOption => "BAD_OPTION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Response code reported to the peer for this kind.
    pub fn response_code(self) -> Code {
        match self {
            ErrorKind::BadRequest | ErrorKind::UnsupportedVersion => Code::BAD_REQUEST,
            ErrorKind::BadOption => Code::BAD_OPTION,
            ErrorKind::NotFound => Code::NOT_FOUND,
            ErrorKind::MethodNotAllowed => Code::METHOD_NOT_ALLOWED,
            ErrorKind::PayloadTooLarge => Code::REQUEST_ENTITY_TOO_LARGE,
            ErrorKind::Internal => Code::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CoapError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum CoapError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported coap version")]
    UnsupportedVersion,
    #[error("unrecognized critical option {0}")]
    BadOption(u16),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("internal: {0}")]
    Internal(String),
}

impl CoapError {
    /// Map the error to its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoapError::BadRequest(_) => ErrorKind::BadRequest,
            CoapError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            CoapError::BadOption(_) => ErrorKind::BadOption,
            CoapError::NotFound(_) => ErrorKind::NotFound,
            CoapError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            CoapError::PayloadTooLarge => ErrorKind::PayloadTooLarge,
            CoapError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Response code reported to the peer for this error.
    pub fn response_code(&self) -> Code {
        self.kind().response_code()
    }
}
