//! Capability traits shared by every marshalable type.
//!
//! A guest call passes its arguments as a flat sequence of 64-bit stack
//! words. Each host type declares the *shape* it occupies in that sequence
//! ([`Value::value_types`]) and how to move between the words and a Rust
//! value ([`Param`] on the way in, [`Return`] on the way out). Types that
//! can also live inside linear memory as a contiguous byte record implement
//! [`Object`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::Memory;
use crate::trap::Trap;

// ── Word kinds ───────────────────────────────────────────────────────────────

/// Kind of a single operand-stack word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Reinterprets a raw stack word according to this kind.
    pub fn load(self, word: u64) -> Word {
        match self {
            ValueType::I32 => Word::I32(word as u32 as i32),
            ValueType::I64 => Word::I64(word as i64),
            ValueType::F32 => Word::F32(f32::from_bits(word as u32)),
            ValueType::F64 => Word::F64(f64::from_bits(word)),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

/// A single decoded stack word, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Word {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Word {
    pub fn value_type(&self) -> ValueType {
        match self {
            Word::I32(_) => ValueType::I32,
            Word::I64(_) => ValueType::I64,
            Word::F32(_) => ValueType::F32,
            Word::F64(_) => ValueType::F64,
        }
    }

    /// Raw stack representation. 32-bit kinds are zero-extended.
    pub fn bits(&self) -> u64 {
        match *self {
            Word::I32(v) => u64::from(v as u32),
            Word::I64(v) => v as u64,
            Word::F32(v) => u64::from(v.to_bits()),
            Word::F64(v) => v.to_bits(),
        }
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Word::I32(v) => write!(f, "{v}"),
            Word::I64(v) => write!(f, "{v}"),
            Word::F32(v) => write!(f, "{v}"),
            Word::F64(v) => write!(f, "{v}"),
        }
    }
}

// ── Capabilities ─────────────────────────────────────────────────────────────

/// Root capability of every type that crosses the host boundary.
pub trait Value {
    /// Stack shape of the type. Fixed per type, known without an instance.
    fn value_types() -> Vec<ValueType>;

    /// Renders the value held in `stack` for diagnostics.
    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result;

    /// Number of stack words occupied by the type.
    fn stack_size() -> usize {
        Self::value_types().len()
    }
}

/// A value that can be decoded from a window of the operand stack.
pub trait Param: Value + Sized {
    fn decode(memory: &dyn Memory, stack: &[u64]) -> Result<Self, Trap>;
}

/// A value that can be encoded into a window of the operand stack.
pub trait Return: Value + Sized {
    fn encode(self, memory: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap>;
}

/// What a host function may return: a [`Return`] value, or a `Result`
/// whose error aborts the call.
pub trait IntoReturn {
    type Output: Return;

    fn into_return(self) -> Result<Self::Output, Trap>;
}

impl<R: Return> IntoReturn for R {
    type Output = R;

    fn into_return(self) -> Result<R, Trap> {
        Ok(self)
    }
}

impl<R: Return> IntoReturn for Result<R, Trap> {
    type Output = R;

    fn into_return(self) -> Result<R, Trap> {
        self
    }
}

/// A value with a fixed, contiguous, little-endian byte layout in linear
/// memory.
///
/// The byte slices handed to `load_object` and `store_object` are exactly
/// `object_size()` bytes long; callers obtain them through the bounds-checked
/// [`Memory`] accessors.
///
/// Formatting also receives the memory the object was read from, so objects
/// that refer to other memory (buffers inside records) can render what they
/// refer to.
pub trait Object: Sized {
    fn object_size() -> usize;
    fn load_object(bytes: &[u8]) -> Self;
    fn store_object(&self, bytes: &mut [u8]);
    fn format_object(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result;
}

// ── Type-erased descriptors ──────────────────────────────────────────────────

/// Signature of a type-erased value formatter.
pub type FormatFn = fn(&mut dyn fmt::Write, &dyn Memory, &[u64]) -> fmt::Result;

/// Introspection record for one parameter or result of a bound function.
///
/// Heterogeneous lists of values (a function's parameters, say) are kept as
/// `Vec<ValueInfo>`, which is all decorators and build steps need.
#[derive(Clone)]
pub struct ValueInfo {
    type_name: &'static str,
    value_types: Vec<ValueType>,
    format: FormatFn,
}

impl ValueInfo {
    pub fn of<T: Value>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value_types: T::value_types(),
            format: T::format_value,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn value_types(&self) -> &[ValueType] {
        &self.value_types
    }

    pub fn stack_size(&self) -> usize {
        self.value_types.len()
    }

    pub fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        (self.format)(w, memory, stack)
    }
}

impl fmt::Debug for ValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueInfo")
            .field("type_name", &self.type_name)
            .field("value_types", &self.value_types)
            .finish()
    }
}

/// Concatenates the stack shapes of a list of values.
pub fn concat_value_types(values: &[ValueInfo]) -> Vec<ValueType> {
    values
        .iter()
        .flat_map(|v| v.value_types().iter().copied())
        .collect()
}

// ── Word codec helpers ───────────────────────────────────────────────────────

#[inline]
pub fn encode_i32(v: i32) -> u64 {
    u64::from(v as u32)
}

#[inline]
pub fn decode_i32(word: u64) -> i32 {
    word as u32 as i32
}

#[inline]
pub fn encode_u32(v: u32) -> u64 {
    u64::from(v)
}

#[inline]
pub fn decode_u32(word: u64) -> u32 {
    word as u32
}

#[inline]
pub fn encode_f32(v: f32) -> u64 {
    u64::from(v.to_bits())
}

#[inline]
pub fn decode_f32(word: u64) -> f32 {
    f32::from_bits(word as u32)
}

#[inline]
pub fn encode_f64(v: f64) -> u64 {
    v.to_bits()
}

#[inline]
pub fn decode_f64(word: u64) -> f64 {
    f64::from_bits(word)
}
