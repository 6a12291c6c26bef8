//! Call-aborting failures.

use thiserror::Error;

/// A failure that aborts the in-flight guest call.
///
/// Traps are never observed by guest code as values: the runtime adapter
/// turns them into a trap of the guest VM. Recoverable failures travel
/// through [`Optional`](crate::Optional) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    /// A linear-memory access outside the addressable bound.
    #[error("segmentation fault: @{offset:08x}/{length}")]
    Segfault { offset: u32, length: u32 },

    /// An element index past the end of a list.
    #[error("index out of bounds: {index} >= {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A string parameter whose bytes are not valid UTF-8.
    #[error("invalid utf-8 string: @{offset:08x}/{length}")]
    InvalidUtf8 { offset: u32, length: u32 },

    /// No live instance of the receiver module in the call context.
    #[error("module {module} is not instantiated in this call context")]
    UnboundModule { module: &'static str },

    /// Abort raised by a host function.
    #[error("{0}")]
    Host(String),
}

impl Trap {
    pub fn host(message: impl Into<String>) -> Self {
        Trap::Host(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segfault_message_format() {
        let trap = Trap::Segfault {
            offset: 0x1234,
            length: 16,
        };
        assert_eq!(trap.to_string(), "segmentation fault: @00001234/16");
    }

    #[test]
    fn test_host_trap_message() {
        assert_eq!(Trap::host("exit").to_string(), "exit");
    }
}
