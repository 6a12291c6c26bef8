//! Value codecs for the WebAssembly host-function calling convention.
//!
//! # Calling convention
//!
//! A guest call hands the host a flat buffer of 64-bit operand-stack words.
//! Each host type occupies a fixed sequence of word kinds (its *stack
//! shape*):
//!
//! | Type                         | Stack shape           |
//! |------------------------------|-----------------------|
//! | `i8`..`i32`, `u8`..`u32`, `bool` | `i32`             |
//! | `i64`, `u64`, [`Duration`]   | `i64`                 |
//! | `f32` / `f64`                | `f32` / `f64`         |
//! | `()`                         | (empty)               |
//! | [`Bytes`], [`Array`], `String` | `i32 i32` (offset, length) |
//! | [`Pointer`]                  | `i32`                 |
//! | [`List`]                     | `i32 i32` (offset, length) |
//! | [`Optional<T>`]              | shape of `T`, then `i32` error code |
//!
//! A function's parameter layout is the concatenation of its parameters'
//! shapes; its result layout is the shape of its result.
//!
//! # Linear memory
//!
//! Types implementing [`Object`] have a fixed little-endian, unpadded byte
//! layout in linear memory, reached through [`Pointer`] and [`List`]. All
//! memory access is bounds-checked by [`Memory`]; a failed check aborts the
//! call with [`Trap::Segfault`].

pub mod buffer;
pub mod format;
pub mod memory;
pub mod optional;
pub mod pointer;
pub mod primitive;
pub mod trap;
pub mod value;

pub use buffer::{Array, Bytes};
pub use memory::{FixedMemory, Memory, MemoryView, PAGE_SIZE};
pub use optional::{
    err, errno_of, fail, opt, res, set_error_strings, BoxError, Errno, Error, Optional, OK,
};
pub use pointer::{List, Pointer};
pub use primitive::{Duration, Primitive};
pub use trap::Trap;
pub use value::{concat_value_types, IntoReturn, Object, Param, Return, Value, ValueInfo, ValueType, Word};
