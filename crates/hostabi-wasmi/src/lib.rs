//! `wasmi` backend for hostabi host modules.
//!
//! [`define`] registers a built module with any `wasmi::Linker` whose store
//! data exposes a [`CallContext`](hostabi::CallContext). [`Runtime`] wraps
//! the common case of one engine, a set of host modules, and guests that
//! each run under their own instantiation context.
//!
//! Host traps abort the guest call and come back as [`Error::Call`], with
//! the original [`Trap`](hostabi_types::Trap) available from
//! [`Error::trap`].

pub mod error;
pub mod link;
pub mod runtime;

pub use error::{Error, HostTrap, Result};
pub use link::{define, from_word, to_word, val_type};
pub use runtime::{Guest, Runtime};
