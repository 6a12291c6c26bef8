//! Scalar codecs.
//!
//! Every scalar occupies exactly one stack word. Integers narrower than 32
//! bits are promoted to an `i32` slot; conversions are plain two's-complement
//! truncation or extension, with no range checks.

use std::fmt;

use crate::format::{format_duration, format_list};
use crate::memory::Memory;
use crate::trap::Trap;
use crate::value::{Object, Param, Return, Value, ValueType};

/// Scalars that may be used as elements of an [`Array`](crate::Array).
pub trait Primitive: Object + Param + Return + Copy + fmt::Display + Send + Sync + 'static {}

fn le<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut b = [0u8; N];
    b.copy_from_slice(&bytes[..N]);
    b
}

macro_rules! scalar {
    ($($t:ty => $vt:ident, $encode:expr;)*) => {$(
        impl Value for $t {
            fn value_types() -> Vec<ValueType> {
                vec![ValueType::$vt]
            }

            fn format_value(w: &mut dyn fmt::Write, _: &dyn Memory, stack: &[u64]) -> fmt::Result {
                write!(w, "{}", stack[0] as $t)
            }
        }

        impl Param for $t {
            fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
                Ok(stack[0] as $t)
            }
        }

        impl Return for $t {
            fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
                let encode: fn($t) -> u64 = $encode;
                stack[0] = encode(self);
                Ok(())
            }
        }

        impl Object for $t {
            fn object_size() -> usize {
                std::mem::size_of::<$t>()
            }

            fn load_object(bytes: &[u8]) -> Self {
                <$t>::from_le_bytes(le(bytes))
            }

            fn store_object(&self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_le_bytes());
            }

            fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, bytes: &[u8]) -> fmt::Result {
                write!(w, "{}", <$t as Object>::load_object(bytes))
            }
        }

        impl Primitive for $t {}
    )*};
}

scalar! {
    i8 => I32, |v| u64::from(v as i32 as u32);
    i16 => I32, |v| u64::from(v as i32 as u32);
    i32 => I32, |v| u64::from(v as u32);
    u8 => I32, u64::from;
    u16 => I32, u64::from;
    u32 => I32, u64::from;
    i64 => I64, |v| v as u64;
    u64 => I64, |v| v;
}

macro_rules! float {
    ($($t:ty => $vt:ident, $bits:ty;)*) => {$(
        impl Value for $t {
            fn value_types() -> Vec<ValueType> {
                vec![ValueType::$vt]
            }

            fn format_value(w: &mut dyn fmt::Write, _: &dyn Memory, stack: &[u64]) -> fmt::Result {
                write!(w, "{}", <$t>::from_bits(stack[0] as $bits))
            }
        }

        impl Param for $t {
            fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
                Ok(<$t>::from_bits(stack[0] as $bits))
            }
        }

        impl Return for $t {
            fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
                stack[0] = u64::from(self.to_bits());
                Ok(())
            }
        }

        impl Object for $t {
            fn object_size() -> usize {
                std::mem::size_of::<$t>()
            }

            fn load_object(bytes: &[u8]) -> Self {
                <$t>::from_le_bytes(le(bytes))
            }

            fn store_object(&self, bytes: &mut [u8]) {
                bytes[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_le_bytes());
            }

            fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, bytes: &[u8]) -> fmt::Result {
                write!(w, "{}", <$t as Object>::load_object(bytes))
            }
        }

        impl Primitive for $t {}
    )*};
}

float! {
    f32 => F32, u32;
    f64 => F64, u64;
}

// ── bool ─────────────────────────────────────────────────────────────────────

impl Value for bool {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I32]
    }

    fn format_value(w: &mut dyn fmt::Write, _: &dyn Memory, stack: &[u64]) -> fmt::Result {
        write!(w, "{}", stack[0] != 0)
    }
}

impl Param for bool {
    fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        Ok(stack[0] != 0)
    }
}

impl Return for bool {
    fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
        stack[0] = u64::from(self);
        Ok(())
    }
}

impl Object for bool {
    fn object_size() -> usize {
        1
    }

    fn load_object(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn store_object(&self, bytes: &mut [u8]) {
        bytes[0] = u8::from(*self);
    }

    fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        write!(w, "{}", bytes[0] != 0)
    }
}

// ── Duration ─────────────────────────────────────────────────────────────────

/// A signed count of nanosecond ticks.
///
/// Crosses the boundary as a raw 64-bit count; no unit conversion happens
/// in the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub i64);

impl Duration {
    pub const ZERO: Self = Self(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Converts to a standard duration; negative counts have none.
    pub fn to_std(self) -> Option<std::time::Duration> {
        u64::try_from(self.0).ok().map(std::time::Duration::from_nanos)
    }
}

impl TryFrom<std::time::Duration> for Duration {
    type Error = std::num::TryFromIntError;

    fn try_from(d: std::time::Duration) -> Result<Self, Self::Error> {
        i64::try_from(d.as_nanos()).map(Self)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_duration(f, self.0)
    }
}

impl Value for Duration {
    fn value_types() -> Vec<ValueType> {
        vec![ValueType::I64]
    }

    fn format_value(w: &mut dyn fmt::Write, _: &dyn Memory, stack: &[u64]) -> fmt::Result {
        format_duration(w, stack[0] as i64)
    }
}

impl Param for Duration {
    fn decode(_: &dyn Memory, stack: &[u64]) -> Result<Self, Trap> {
        Ok(Self(stack[0] as i64))
    }
}

impl Return for Duration {
    fn encode(self, _: &mut dyn Memory, stack: &mut [u64]) -> Result<(), Trap> {
        stack[0] = self.0 as u64;
        Ok(())
    }
}

impl Object for Duration {
    fn object_size() -> usize {
        8
    }

    fn load_object(bytes: &[u8]) -> Self {
        Self(i64::from_le_bytes(le(bytes)))
    }

    fn store_object(&self, bytes: &mut [u8]) {
        bytes[..8].copy_from_slice(&self.0.to_le_bytes());
    }

    fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        format_duration(w, i64::from_le_bytes(le(bytes)))
    }
}

// ── Unit ─────────────────────────────────────────────────────────────────────

// The unit value carries no words and no bytes. It is the payload of the
// zero-result `Error` optional.

impl Value for () {
    fn value_types() -> Vec<ValueType> {
        Vec::new()
    }

    fn format_value(w: &mut dyn fmt::Write, _: &dyn Memory, _: &[u64]) -> fmt::Result {
        w.write_str("(none)")
    }
}

impl Param for () {
    fn decode(_: &dyn Memory, _: &[u64]) -> Result<Self, Trap> {
        Ok(())
    }
}

impl Return for () {
    fn encode(self, _: &mut dyn Memory, _: &mut [u64]) -> Result<(), Trap> {
        Ok(())
    }
}

impl Object for () {
    fn object_size() -> usize {
        0
    }

    fn load_object(_: &[u8]) -> Self {}

    fn store_object(&self, _: &mut [u8]) {}

    fn format_object(w: &mut dyn fmt::Write, _: &dyn Memory, _: &[u8]) -> fmt::Result {
        w.write_str("(none)")
    }
}

// ── Fixed-size arrays ────────────────────────────────────────────────────────

/// `N` contiguous elements, replaying the element codec `N` times.
impl<O: Object, const N: usize> Object for [O; N] {
    fn object_size() -> usize {
        N * O::object_size()
    }

    fn load_object(bytes: &[u8]) -> Self {
        let size = O::object_size();
        std::array::from_fn(|i| O::load_object(&bytes[i * size..(i + 1) * size]))
    }

    fn store_object(&self, bytes: &mut [u8]) {
        let size = O::object_size();
        for (i, element) in self.iter().enumerate() {
            element.store_object(&mut bytes[i * size..(i + 1) * size]);
        }
    }

    fn format_object(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        let size = O::object_size();
        w.write_char('[')?;
        format_list(w, ",", 0..N, |w, i| {
            O::format_object(w, memory, &bytes[i * size..(i + 1) * size])
        })?;
        w.write_char(']')
    }
}
