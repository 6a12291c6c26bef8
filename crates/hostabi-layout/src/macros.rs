/// Implements [`Record`](crate::Record) and the object codec for structs.
///
/// Fields are listed in layout order. Each entry is a field name, optionally
/// followed by `as "name"` to change the name shown when formatting and by
/// `size N` to reserve `N` bytes for the field. `..field` embeds another
/// record, promoting its fields into this one. Struct fields left out of the
/// list are not part of the layout.
///
/// ```
/// use hostabi_layout::record;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: f32,
///     y: f32,
/// }
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Sprite {
///     id: u32,
///     origin: Point,
///     tag: [u8; 3],
///     cache: Vec<u8>,
/// }
///
/// record! {
///     Point { x, y }
///     Sprite { id as "ID", ..origin, tag size 4 }
/// }
///
/// let layout = hostabi_layout::LayoutRegistry::global().layout::<Sprite>();
/// assert_eq!(layout.size(), 16);
/// ```
#[macro_export]
macro_rules! record {
    (@fields $layout:ident;) => {};
    (@fields $layout:ident; .. $field:ident $(, $($rest:tt)*)?) => {
        $layout.embed(|r| &r.$field, |r| &mut r.$field);
        $crate::record!(@fields $layout; $($($rest)*)?);
    };
    (@fields $layout:ident; $field:ident $(as $name:literal)? $(size $size:literal)? $(, $($rest:tt)*)?) => {
        $layout
            .field($crate::record!(@name $field $($name)?), |r| &r.$field, |r| &mut r.$field)
            $(.sized($size))?;
        $crate::record!(@fields $layout; $($($rest)*)?);
    };
    (@name $field:ident) => {
        stringify!($field)
    };
    (@name $field:ident $name:literal) => {
        $name
    };
    ($($record:ident { $($body:tt)* })*) => {$(
        impl $crate::Record for $record {
            #[allow(unused_variables)]
            fn describe(layout: &mut $crate::LayoutBuilder<Self>) {
                $crate::record!(@fields layout; $($body)*);
            }
        }

        impl $crate::types::Object for $record {
            fn object_size() -> usize {
                $crate::record_size::<Self>()
            }

            fn load_object(bytes: &[u8]) -> Self {
                $crate::load_record(bytes)
            }

            fn store_object(&self, bytes: &mut [u8]) {
                $crate::store_record(self, bytes)
            }

            fn format_object(
                w: &mut dyn ::std::fmt::Write,
                memory: &dyn $crate::types::Memory,
                bytes: &[u8],
            ) -> ::std::fmt::Result {
                $crate::format_record::<Self>(w, memory, bytes)
            }
        }
    )*};
}
