//! Byte layouts of records.
//!
//! A [`Layout`] is derived once per record type from the field list the type
//! describes through a [`LayoutBuilder`]. Fields are laid out back to back in
//! declaration order with no padding; embedded records contribute their own
//! fields in place, as if declared inline.

use std::fmt;
use std::sync::Arc;

use hostabi_types::{Memory, Object};

use crate::record::Record;

// ── Field access ─────────────────────────────────────────────────────────────

/// Moves one field between a record and its byte window.
///
/// The window handed to each method is exactly the field's layout size,
/// which may be larger than the codec's natural size when overridden.
pub(crate) trait FieldAccess<T>: Send + Sync {
    fn load(&self, record: &mut T, bytes: &[u8]);
    fn store(&self, record: &T, bytes: &mut [u8]);
    fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result;
}

struct Direct<T, O> {
    get: fn(&T) -> &O,
    get_mut: fn(&mut T) -> &mut O,
}

impl<T, O: Object> FieldAccess<T> for Direct<T, O> {
    fn load(&self, record: &mut T, bytes: &[u8]) {
        *(self.get_mut)(record) = O::load_object(&bytes[..O::object_size()]);
    }

    fn store(&self, record: &T, bytes: &mut [u8]) {
        (self.get)(record).store_object(&mut bytes[..O::object_size()]);
    }

    fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        O::format_object(w, memory, &bytes[..O::object_size()])
    }
}

/// A field of an embedded record, reached through the embedding field.
struct Embedded<T, E> {
    get: fn(&T) -> &E,
    get_mut: fn(&mut T) -> &mut E,
    inner: Arc<dyn FieldAccess<E>>,
}

impl<T, E> FieldAccess<T> for Embedded<T, E> {
    fn load(&self, record: &mut T, bytes: &[u8]) {
        self.inner.load((self.get_mut)(record), bytes);
    }

    fn store(&self, record: &T, bytes: &mut [u8]) {
        self.inner.store((self.get)(record), bytes);
    }

    fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        self.inner.format(w, memory, bytes)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

struct PendingField<T> {
    name: String,
    natural_size: usize,
    size: usize,
    access: Arc<dyn FieldAccess<T>>,
}

/// Collects the fields of a record, in declaration order.
pub struct LayoutBuilder<T> {
    fields: Vec<PendingField<T>>,
}

impl<T: 'static> LayoutBuilder<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds a field encoded with `O`'s object codec.
    ///
    /// `O` may be a primitive, a fixed-size array, a pointer, a buffer
    /// descriptor, or another record.
    pub fn field<O: Object + 'static>(
        &mut self,
        name: &str,
        get: fn(&T) -> &O,
        get_mut: fn(&mut T) -> &mut O,
    ) -> &mut Self {
        let size = O::object_size();
        self.fields.push(PendingField {
            name: name.to_owned(),
            natural_size: size,
            size,
            access: Arc::new(Direct { get, get_mut }),
        });
        self
    }

    /// Overrides the byte size of the last field added.
    ///
    /// # Panics
    ///
    /// Panics when no field was added yet, or when `size` is smaller than
    /// the field's natural size. Both are mistakes in a `describe`
    /// implementation.
    pub fn sized(&mut self, size: usize) -> &mut Self {
        let Some(field) = self.fields.last_mut() else {
            panic!("sized({size}) called before any field");
        };
        assert!(
            size >= field.natural_size,
            "field {}: size {size} is smaller than its natural size {}",
            field.name,
            field.natural_size,
        );
        field.size = size;
        self
    }

    /// Flattens the fields of an embedded record into this one.
    pub fn embed<E: Record>(&mut self, get: fn(&T) -> &E, get_mut: fn(&mut T) -> &mut E) -> &mut Self {
        let inner = Layout::<E>::derive();
        for field in inner.fields {
            self.fields.push(PendingField {
                name: field.name,
                natural_size: field.size,
                size: field.size,
                access: Arc::new(Embedded {
                    get,
                    get_mut,
                    inner: field.access,
                }),
            });
        }
        self
    }

    fn finish(self) -> Layout<T> {
        let mut offset = 0;
        let fields = self
            .fields
            .into_iter()
            .map(|f| {
                let field = FieldLayout {
                    name: f.name,
                    size: f.size,
                    offset,
                    access: f.access,
                };
                offset += f.size;
                field
            })
            .collect();
        Layout {
            fields,
            size: offset,
        }
    }
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Position and codec of one field inside a record.
pub struct FieldLayout<T> {
    name: String,
    size: usize,
    offset: usize,
    access: Arc<dyn FieldAccess<T>>,
}

impl<T> FieldLayout<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn window<'b>(&self, bytes: &'b [u8]) -> &'b [u8] {
        &bytes[self.offset..self.offset + self.size]
    }
}

impl<T> fmt::Debug for FieldLayout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldLayout")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .finish()
    }
}

/// Immutable byte layout of a record type.
pub struct Layout<T> {
    fields: Vec<FieldLayout<T>>,
    size: usize,
}

impl<T: Record> Layout<T> {
    /// Derives the layout from the record's field description.
    ///
    /// Prefer [`LayoutRegistry::layout`](crate::LayoutRegistry::layout),
    /// which derives each layout once.
    pub fn derive() -> Self {
        let mut builder = LayoutBuilder::new();
        T::describe(&mut builder);
        builder.finish()
    }

    /// Total byte size, the sum of the field sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[FieldLayout<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Decodes a record from its `size()` bytes.
    pub fn load(&self, bytes: &[u8]) -> T {
        let mut record = T::default();
        for field in &self.fields {
            field.access.load(&mut record, field.window(bytes));
        }
        record
    }

    /// Encodes a record into its `size()` bytes.
    pub fn store(&self, record: &T, bytes: &mut [u8]) {
        for field in &self.fields {
            let window = &mut bytes[field.offset..field.offset + field.size];
            field.access.store(record, window);
        }
    }

    /// Renders the record held in `bytes` as `{name:value,...}`.
    ///
    /// `memory` is where buffer fields are resolved.
    pub fn format(&self, w: &mut dyn fmt::Write, memory: &dyn Memory, bytes: &[u8]) -> fmt::Result {
        w.write_char('{')?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                w.write_char(',')?;
            }
            write!(w, "{}:", field.name)?;
            field.access.format(w, memory, field.window(bytes))?;
        }
        w.write_char('}')
    }
}

impl<T> fmt::Debug for Layout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("size", &self.size)
            .field("fields", &self.fields)
            .finish()
    }
}
