//! Typed references into linear memory.

use std::fmt;
use std::marker::PhantomData;

use crate::format::format_list;
use crate::memory::Memory;
use crate::trap::Trap;
use crate::value::{decode_u32, encode_u32, Object, Param, Return, Value, ValueType};

/// A 32-bit linear-memory offset tagged with the type of object it
/// addresses.
///
/// A pointer never owns the memory it refers to. Decoding one is pure
/// arithmetic; the addressed bytes are read only on [`load`](Pointer::load),
/// and every such read is bounds-checked.
pub struct Pointer<T> {
    offset: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Pointer<T> {
    pub const fn new(offset: u32) -> Self {
        Self {
            offset,
            _marker: PhantomData,
        }
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }
}

impl<T> Clone for Pointer<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pointer<T> {}

impl<T> PartialEq for Pointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> Eq for Pointer<T> {}

/// The null pointer.
impl<T> Default for Pointer<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T> fmt::Debug for Pointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:#x})", self.offset)
    }
}

fn object_length<T: Object>(offset: u32, count: usize) -> Result<u32, Trap> {
    count
        .checked_mul(T::object_size())
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(Trap::Segfault {
            offset,
            length: u32::MAX,
        })
}

impl<T: Object> Pointer<T> {
    /// Pointer to the `i`-th object past this one.
    ///
    /// Address arithmetic wraps like guest `i32` arithmetic; a wrapped
    /// address is caught by the bounds check of the next access.
    pub fn index(&self, i: u32) -> Self {
        let size = T::object_size() as u32;
        Self::new(self.offset.wrapping_add(i.wrapping_mul(size)))
    }

    /// The bytes of the addressed object.
    pub fn object<'m>(&self, memory: &'m dyn Memory) -> Result<&'m [u8], Trap> {
        self.objects(memory, 1)
    }

    fn objects<'m>(&self, memory: &'m dyn Memory, count: usize) -> Result<&'m [u8], Trap> {
        memory.read(self.offset, object_length::<T>(self.offset, count)?)
    }

    pub fn load(&self, memory: &dyn Memory) -> Result<T, Trap> {
        self.object(memory).map(T::load_object)
    }

    pub fn store(&self, memory: &mut dyn Memory, value: &T) -> Result<(), Trap> {
        let length = object_length::<T>(self.offset, 1)?;
        value.store_object(memory.read_mut(self.offset, length)?);
        Ok(())
    }

    /// Loads `count` consecutive objects and appends them to `values`.
    pub fn append(&self, memory: &dyn Memory, values: &mut Vec<T>, count: usize) -> Result<(), Trap> {
        let size = T::object_size();
        let bytes = self.objects(memory, count)?;
        values.reserve(count);
        if size == 0 {
            values.extend((0..count).map(|_| T::load_object(&[])));
        } else {
            values.extend(bytes.chunks_exact(size).map(T::load_object));
        }
        Ok(())
    }

    /// Loads `count` consecutive objects.
    pub fn slice(&self, memory: &dyn Memory, count: usize) -> Result<Vec<T>, Trap> {
        let mut values = Vec::new();
        self.append(memory, &mut values, count)?;
        Ok(values)
    }
}

impl<T: Object> Value for Pointer<T> {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        let pointer = Self::new(decode_u32(stack[0]));
        match pointer.object(memory) {
            Ok(bytes) => {
                w.write_char('&')?;
                T::format_object(w, memory, bytes)
            }
            Err(trap) => write!(w, "&<{trap}>"),
        }
    }
}

impl<T: Object> Param for Pointer<T> {
    fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        Ok(Self::new(decode_u32(stack[0])))
    }
}

impl<T: Object> Return for Pointer<T> {
    fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
        stack[0] = encode_u32(self.offset);
        Ok(())
    }
}

/// A pointer stored inside a record is its 32-bit offset.
impl<T: Object> Object for Pointer<T> {
    fn object_size() -> usize {
        4
    }

    fn load_object(bytes: &[u8]) -> Self {
        Self::new(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn store_object(&self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&self.offset.to_le_bytes());
    }

    fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        write!(w, "{:?}", Self::load_object(bytes))
    }
}

// ── List ─────────────────────────────────────────────────────────────────────

/// A run of `len` objects starting at a [`Pointer`].
pub struct List<T> {
    pointer: Pointer<T>,
    len: u32,
}

impl<T> Clone for List<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for List<T> {}

impl<T> PartialEq for List<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pointer == other.pointer && self.len == other.len
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self {
            pointer: Pointer::default(),
            len: 0,
        }
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("pointer", &self.pointer)
            .field("len", &self.len)
            .finish()
    }
}

impl<T: Object> List<T> {
    pub fn new(pointer: Pointer<T>, len: u32) -> Self {
        Self { pointer, len }
    }

    pub fn pointer(&self) -> Pointer<T> {
        self.pointer
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to the `i`-th element.
    pub fn index(&self, i: usize) -> Result<Pointer<T>, Trap> {
        if i >= self.len() {
            return Err(Trap::IndexOutOfBounds {
                index: i,
                len: self.len(),
            });
        }
        Ok(self.pointer.index(i as u32))
    }

    pub fn load(&self, memory: &dyn Memory, i: usize) -> Result<T, Trap> {
        self.index(i)?.load(memory)
    }

    /// Iterates over the elements, loading each one lazily.
    pub fn iter<'m>(&self, memory: &'m dyn Memory) -> impl Iterator<Item = Result<T, Trap>> + 'm
    where
        T: 'm,
    {
        let pointer = self.pointer;
        (0..self.len).map(move |i| pointer.index(i).load(memory))
    }

    pub fn append(&self, memory: &dyn Memory, values: &mut Vec<T>) -> Result<(), Trap> {
        self.pointer.append(memory, values, self.len())
    }

    pub fn to_vec(&self, memory: &dyn Memory) -> Result<Vec<T>, Trap> {
        self.pointer.slice(memory, self.len())
    }
}

impl<T: Object> Value for List<T> {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32, ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, memory: &dyn Memory, stack: &[u64]) -> fmt::Result {
        let list = Self::new(Pointer::new(decode_u32(stack[0])), decode_u32(stack[1]));
        let size = T::object_size();
        let bytes = match list.pointer.objects(memory, list.len()) {
            Ok(bytes) => bytes,
            Err(trap) => return write!(w, "<{trap}>"),
        };
        w.write_char('[')?;
        format_list(w, ",", 0..list.len(), |w, i| {
            T::format_object(w, memory, &bytes[i * size..(i + 1) * size])
        })?;
        w.write_char(']')
    }
}

impl<T: Object> Param for List<T> {
    fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        Ok(Self::new(
            Pointer::new(decode_u32(stack[0])),
            decode_u32(stack[1]),
        ))
    }
}

impl<T: Object> Return for List<T> {
    fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
        stack[0] = encode_u32(self.pointer.offset());
        stack[1] = encode_u32(self.len);
        Ok(())
    }
}
