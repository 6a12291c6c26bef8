//! Byte-level layouts for records stored in WebAssembly linear memory.
//!
//! A record is a struct whose fields are laid out contiguously, little-endian
//! and unpadded, in declaration order. Records describe their fields once
//! ([`Record::describe`], usually through [`record!`]); the resulting
//! [`Layout`] is derived on first use and cached per type by a
//! [`LayoutRegistry`].
//!
//! Every record declared with [`record!`] is an [`Object`](hostabi_types::Object),
//! so it can be addressed through `Pointer<T>` and `List<T>`, nested inside
//! other records, or used as an array element.

#[macro_use]
mod macros;

pub mod layout;
pub mod record;
pub mod registry;

pub use layout::{FieldLayout, Layout, LayoutBuilder};
pub use record::{format_record, load_record, record_size, store_record, Record, Struct};
pub use registry::LayoutRegistry;

#[doc(hidden)]
pub use hostabi_types as types;
