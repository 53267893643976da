//! Server lifecycle errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create coap context: {0}")]
    Context(String),
    #[error("failed to create coap endpoint: {0}")]
    Endpoint(#[source] std::io::Error),
    #[error("resource already registered: {0}")]
    AlreadyRegistered(String),
    #[error("server task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
