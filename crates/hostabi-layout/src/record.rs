//! Records and their object codec.

use std::fmt;
use std::ops::{Deref, DerefMut};

use hostabi_types::{Memory, Object};

use crate::layout::LayoutBuilder;
use crate::registry::LayoutRegistry;

/// A structured type stored in linear memory as a sequence of fields.
///
/// Implementations list their fields in order; the [`record!`](crate::record)
/// macro writes this for plain structs. Fields the description leaves out
/// keep their `Default` value when a record is loaded.
pub trait Record: Default + Send + Sync + 'static {
    fn describe(layout: &mut LayoutBuilder<Self>);
}

/// Byte size of a record, from the global registry.
pub fn record_size<T: Record>() -> usize {
    LayoutRegistry::global().layout::<T>().size()
}

pub fn load_record<T: Record>(bytes: &[u8]) -> T {
    LayoutRegistry::global().layout::<T>().load(bytes)
}

pub fn store_record<T: Record>(record: &T, bytes: &mut [u8]) {
    LayoutRegistry::global().layout::<T>().store(record, bytes)
}

pub fn format_record<T: Record>(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
    LayoutRegistry::global().layout::<T>().format(w, memory, bytes)
}

/// Wraps any [`Record`] to give it an object codec.
///
/// Types declared with [`record!`](crate::record) are objects on their own
/// and do not need the wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Struct<T>(pub T);

impl<T> Deref for Struct<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Struct<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Record> Object for Struct<T> {
    fn object_size() -> usize {
        record_size::<T>()
    }

    fn load_object(bytes: &[u8]) -> Self {
        Struct(load_record(bytes))
    }

    fn store_object(&self, bytes: &mut [u8]) {
        store_record(&self.0, bytes)
    }

    fn format_object(w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        format_record::<T>(w, memory, bytes)
    }
}
