//! Adapter errors.

use std::fmt;

use hostabi_types::Trap;
use thiserror::Error;

/// Errors raised while linking, loading, or calling a guest module.
#[derive(Debug, Error)]
pub enum Error {
    /// A host function could not be defined in the linker.
    #[error("failed to link {module}::{name}: {message}")]
    Link {
        module: String,
        name: String,
        message: String,
    },

    #[error("failed to compile guest module: {0}")]
    Compile(#[source] wasmi::Error),

    #[error("failed to instantiate guest module: {0}")]
    Instantiate(#[source] wasmi::Error),

    /// The guest does not export `name`, or not with the requested signature.
    #[error("guest export {name} is unavailable: {source}")]
    Export {
        name: String,
        #[source]
        source: wasmi::Error,
    },

    /// A guest call aborted. Host traps are reachable through [`Error::trap`].
    #[error("guest call failed: {0}")]
    Call(#[source] wasmi::Error),

    #[error("guest module exports no memory")]
    NoMemory,

    #[error(transparent)]
    Memory(#[from] Trap),

    #[error(transparent)]
    Host(#[from] hostabi::Error),
}

impl Error {
    /// The host trap that aborted a guest call, if any.
    pub fn trap(&self) -> Option<&Trap> {
        match self {
            Error::Call(err) => err.downcast_ref::<HostTrap>().map(|t| &t.0),
            Error::Memory(trap) => Some(trap),
            _ => None,
        }
    }
}

/// Result type alias for guest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A [`Trap`] raised by a host function, carried through the interpreter.
#[derive(Debug)]
pub struct HostTrap(pub Trap);

impl fmt::Display for HostTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl wasmi::core::HostError for HostTrap {}
