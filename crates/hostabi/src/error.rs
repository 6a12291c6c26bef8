//! Host module errors.

use thiserror::Error;

/// Errors raised while instantiating, closing, or describing host modules.
///
/// Failures inside a call are [`Trap`](hostabi_types::Trap)s, not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The instantiation context was closed.
    #[error("instantiation context is closed")]
    Closed,

    /// The call context already holds a live instance of the module type.
    #[error("{module} is already instantiated in this context")]
    AlreadyInstantiated { module: &'static str },

    /// The host module failed to create an instance.
    #[error("failed to instantiate {module}: {message}")]
    Instantiation { module: String, message: String },

    /// A module instance failed to close.
    #[error("failed to close {module}: {message}")]
    Close { module: &'static str, message: String },

    /// A manifest could not be serialized or parsed.
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type alias for host module operations.
pub type HostResult<T> = Result<T, Error>;
