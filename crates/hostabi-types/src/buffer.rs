//! Buffers addressed by an `(offset, length)` pair of `i32` stack words.
//!
//! Buffers view memory the guest already owns and cannot be produced as
//! results, since that would need an allocation policy. The span is
//! bounds-checked once at decode time; the accessors check again because the
//! memory they are handed may differ from the one decoded from.
//!
//! Inside records, `Bytes` and `Array` occupy 8 bytes: the little-endian
//! offset followed by the length. Loading such a field reads only the
//! descriptor, which is how iovec-style tables are passed.

use std::fmt;
use std::marker::PhantomData;

use crate::format::{format_bytes, format_list};
use crate::memory::Memory;
use crate::primitive::Primitive;
use crate::trap::Trap;
use crate::value::{decode_u32, Object, Param, Value, ValueType};

fn span(stack: &[u64]) -> (u32, u32) {
    (decode_u32(stack[0]), decode_u32(stack[1]))
}

const DESCRIPTOR_SIZE: usize = 8;

fn load_descriptor(bytes: &[u8]) -> (u32, u32) {
    let offset = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    (offset, length)
}

fn store_descriptor(bytes: &mut [u8], offset: u32, length: u32) {
    bytes[..4].copy_from_slice(&offset.to_le_bytes());
    bytes[4..8].copy_from_slice(&length.to_le_bytes());
}

fn format_span(w: &mut dyn fmt::Write, memory: &dyn Memory, offset: u32, length: u32) -> fmt::Result {
    match memory.read(offset, length) {
        Ok(bytes) => format_bytes(w, bytes),
        Err(trap) => write!(w, "<{trap}>"),
    }
}

// ── Bytes ────────────────────────────────────────────────────────────────────

/// A view over a span of raw bytes in linear memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bytes {
    offset: u32,
    length: u32,
}

impl Bytes {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_slice<'m>(&self, memory: &'m dyn Memory) -> Result<&'m [u8], Trap> {
        memory.read(self.offset, self.length)
    }

    pub fn as_mut_slice<'m>(&self, memory: &'m mut dyn Memory) -> Result<&'m mut [u8], Trap> {
        memory.read_mut(self.offset, self.length)
    }

    pub fn to_vec(&self, memory: &dyn Memory) -> Result<Vec<u8>, Trap> {
        self.as_slice(memory).map(<[u8]>::to_vec)
    }
}

impl Value for Bytes {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32, ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        let (offset, length) = span(stack);
        format_span(w, memory, offset, length)
    }
}

impl Param for Bytes {
    fn decode(memory: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        let (offset, length) = span(stack);
        memory.read(offset, length)?;
        Ok(Self::new(offset, length))
    }
}

impl Object for Bytes {
    fn object_size() -> usize {
        DESCRIPTOR_SIZE
    }

    fn load_object(bytes: &[u8]) -> Self {
        let (offset, length) = load_descriptor(bytes);
        Self::new(offset, length)
    }

    fn store_object(&self, bytes: &mut [u8]) {
        store_descriptor(bytes, self.offset, self.length)
    }

    fn format_object(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        let (offset, length) = load_descriptor(bytes);
        format_span(w, memory, offset, length)
    }
}

// ── String ───────────────────────────────────────────────────────────────────

// Strings are copied out of memory at decode time, so the host keeps them
// past the end of the call.

impl Value for String {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32, ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        match String::decode(memory, stack) {
            Ok(s) => write!(w, "{s:?}"),
            Err(trap) => write!(w, "<{trap}>"),
        }
    }
}

impl Param for String {
    fn decode(memory: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        let (offset, length) = span(stack);
        let bytes = memory.read(offset, length)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Trap::InvalidUtf8 { offset, length })
    }
}

// ── Array ────────────────────────────────────────────────────────────────────

/// A view over `len` contiguous primitives in linear memory.
///
/// Elements are decoded one at a time from their little-endian bytes.
pub struct Array<T> {
    offset: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Array<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Array<T> {}

impl<T> Default for Array<T> {
    fn default() -> Self {
        Self {
            offset: 0,
            len: 0,
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Array<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.len == other.len
    }
}

impl<T> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl<T: Primitive> Array<T> {
    pub fn new(offset: u32, len: u32) -> Self {
        Self {
            offset,
            len,
            _marker: PhantomData,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn byte_len(offset: u32, len: u32) -> Result<u32, Trap> {
        // T::object_size() is at most 8.
        len.checked_mul(T::object_size() as u32)
            .ok_or(Trap::Segfault {
                offset,
                length: u32::MAX,
            })
    }

    /// The raw bytes backing the array.
    pub fn bytes<'m>(&self, memory: &'m dyn Memory) -> Result<&'m [u8], Trap> {
        memory.read(self.offset, Self::byte_len(self.offset, self.len)?)
    }

    pub fn get(&self, memory: &dyn Memory, index: usize) -> Result<T, Trap> {
        if index >= self.len() {
            return Err(Trap::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        let size = T::object_size();
        let bytes = self.bytes(memory)?;
        Ok(T::load_object(&bytes[index * size..(index + 1) * size]))
    }

    pub fn to_vec(&self, memory: &dyn Memory) -> Result<Vec<T>, Trap> {
        let size = T::object_size();
        if size == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .bytes(memory)?
            .chunks_exact(size)
            .map(T::load_object)
            .collect())
    }

    fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory) -> fmt::Result {
        let values = match self.to_vec(memory) {
            Ok(values) => values,
            Err(trap) => return write!(w, "<{trap}>"),
        };
        w.write_char('[')?;
        format_list(w, ", ", values, |w, v| write!(w, "{v}"))?;
        w.write_char(']')
    }

    /// Writes `values` to the start of the array.
    pub fn store(&self, memory: &mut dyn Memory, values: &[T]) -> Result<(), Trap> {
        if values.len() > self.len() {
            return Err(Trap::IndexOutOfBounds {
                index: values.len() - 1,
                len: self.len(),
            });
        }
        let size = T::object_size();
        let bytes = memory.read_mut(self.offset, Self::byte_len(self.offset, self.len)?)?;
        for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(size)) {
            value.store_object(chunk);
        }
        Ok(())
    }
}

impl<T: Primitive> Value for Array<T> {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32, ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        let (offset, len) = span(stack);
        Self::new(offset, len).format(w, memory)
    }
}

impl<T: Primitive> Param for Array<T> {
    fn decode(memory: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        let (offset, len) = span(stack);
        memory.read(offset, Self::byte_len(offset, len)?)?;
        Ok(Self::new(offset, len))
    }
}

impl<T: Primitive> Object for Array<T> {
    fn object_size() -> usize {
        DESCRIPTOR_SIZE
    }

    fn load_object(bytes: &[u8]) -> Self {
        let (offset, len) = load_descriptor(bytes);
        Self::new(offset, len)
    }

    fn store_object(&self, bytes: &mut [u8]) {
        store_descriptor(bytes, self.offset, self.len)
    }

    fn format_object(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        Self::load_object(bytes).format(w, memory)
    }
}
