//! Calling bound functions without a guest VM.
//!
//! ```
//! use hostabi::testing::Call;
//! use hostabi::{f2, CallContext, Caller, Module};
//! use hostabi::types::{Bytes, FixedMemory};
//!
//! struct Text;
//! impl Module for Text {}
//!
//! let count = f2(|_: &Text, caller: &mut Caller<'_>, b: Bytes, c: u8| {
//!     b.as_slice(caller.memory()).map(|s| s.iter().filter(|&&x| x == c).count() as u32)
//! });
//!
//! let mut memory = FixedMemory::pages(1);
//! let n: u32 = Call::new(&count, &mut memory)
//!     .bytes(b"banana")
//!     .arg(b'a')
//!     .invoke(&Text, &CallContext::new())
//!     .unwrap();
//! assert_eq!(n, 3);
//! ```

use hostabi_types::{Memory, Param, Return, Trap};

use crate::context::CallContext;
use crate::function::{Caller, Function};

/// Builder of a single call to a [`Function`].
///
/// Arguments are encoded in order onto a fresh stack. Byte buffers are
/// copied into memory at a bump offset, starting at zero unless moved with
/// [`at`](Self::at). The first failure is kept and reported by
/// [`invoke`](Self::invoke).
pub struct Call<'f, 'm, M> {
    function: &'f Function<M>,
    memory: &'m mut dyn Memory,
    stack: Vec<u64>,
    heap: u32,
    trap: Option<Trap>,
}

impl<'f, 'm, M> Call<'f, 'm, M> {
    pub fn new(function: &'f Function<M>, memory: &'m mut dyn Memory) -> Self {
        Self {
            function,
            memory,
            stack: Vec::with_capacity(function.stack_size()),
            heap: 0,
            trap: None,
        }
    }

    /// Moves the offset at which the next byte buffer is written.
    pub fn at(mut self, offset: u32) -> Self {
        self.heap = offset;
        self
    }

    /// Encodes one argument.
    pub fn arg<A: Return>(mut self, value: A) -> Self {
        if self.trap.is_some() {
            return self;
        }
        let start = self.stack.len();
        self.stack.resize(start + A::stack_size(), 0);
        if let Err(trap) = value.encode(&mut *self.memory, &mut self.stack[start..]) {
            self.trap = Some(trap);
        }
        self
    }

    /// Copies `data` into memory and passes it as an offset/length pair.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        if self.trap.is_some() {
            return self;
        }
        let offset = self.heap;
        match self.memory.write(offset, data) {
            Ok(()) => {
                let length = data.len() as u32;
                self.stack.extend([u64::from(offset), u64::from(length)]);
                self.heap = offset.saturating_add(length);
            }
            Err(trap) => self.trap = Some(trap),
        }
        self
    }

    pub fn string(self, s: &str) -> Self {
        self.bytes(s.as_bytes())
    }

    /// Passes raw stack words.
    pub fn words(mut self, words: &[u64]) -> Self {
        self.stack.extend_from_slice(words);
        self
    }

    /// Runs the function against `this` and decodes its result.
    pub fn invoke<R: Param>(mut self, this: &M, context: &CallContext) -> Result<R, Trap> {
        if let Some(trap) = self.trap {
            return Err(trap);
        }
        let size = self.function.stack_size().max(R::stack_size());
        if self.stack.len() < size {
            self.stack.resize(size, 0);
        }
        let mut caller = Caller::new(context, &mut *self.memory);
        self.function.call(this, &mut caller, &mut self.stack)?;
        R::decode(caller.memory(), &self.stack[..R::stack_size()])
    }
}
