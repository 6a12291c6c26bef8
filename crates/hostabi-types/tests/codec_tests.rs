//! Integration tests for the value codecs.
//!
//! Tests validate:
//! - Stack shapes of every value family
//! - Word encoding of scalars (zero extension, float bits, bool)
//! - Bounds enforcement shared by every memory-backed decoder
//! - Diagnostic rendering through type-erased descriptors

use std::io;

use hostabi_types::{
    concat_value_types, errno_of, Array, Bytes, Duration, Errno, FixedMemory, List, Memory,
    Optional, Param, Pointer, Return, Trap, Value, ValueInfo, ValueType,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn encode<R: Return>(value: R) -> Vec<u64> {
    let mut memory = FixedMemory::pages(1);
    let mut stack = vec![0u64; R::stack_size()];
    value.encode(&mut memory, &mut stack).unwrap();
    stack
}

fn render<T: Value>(memory: &dyn Memory, stack: &[u64]) -> String {
    let mut s = String::new();
    ValueInfo::of::<T>().format(&mut s, memory, stack).unwrap();
    s
}

// ══════════════════════════════════════════════════════════════════════════════
// Stack shapes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn shapes_of_every_family() {
    use ValueType::*;
    assert_eq!(<u8 as Value>::value_types(), [I32]);
    assert_eq!(<bool as Value>::value_types(), [I32]);
    assert_eq!(<u64 as Value>::value_types(), [I64]);
    assert_eq!(<Duration as Value>::value_types(), [I64]);
    assert_eq!(<f32 as Value>::value_types(), [F32]);
    assert!(<() as Value>::value_types().is_empty());
    assert_eq!(<Bytes as Value>::value_types(), [I32, I32]);
    assert_eq!(<String as Value>::value_types(), [I32, I32]);
    assert_eq!(<Array<u16> as Value>::value_types(), [I32, I32]);
    assert_eq!(<Pointer<u64> as Value>::value_types(), [I32]);
    assert_eq!(<List<u64> as Value>::value_types(), [I32, I32]);
    assert_eq!(<Optional<f64> as Value>::value_types(), [F64, I32]);
    assert_eq!(<Optional<()> as Value>::value_types(), [I32]);
}

#[test]
fn signature_shape_is_concatenation() {
    let params = [
        ValueInfo::of::<i32>(),
        ValueInfo::of::<Bytes>(),
        ValueInfo::of::<Optional<i64>>(),
    ];
    use ValueType::*;
    assert_eq!(concat_value_types(&params), [I32, I32, I32, I64, I32]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Word encoding
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn narrow_integers_zero_extend_their_bit_pattern() {
    assert_eq!(encode(-1i8), [0xffff_ffff]);
    assert_eq!(encode(-1i16), [0xffff_ffff]);
    assert_eq!(encode(-1i32), [0xffff_ffff]);
    assert_eq!(encode(u32::MAX), [0xffff_ffff]);
    assert_eq!(encode(-1i64), [u64::MAX]);
}

#[test]
fn floats_travel_by_bits() {
    assert_eq!(encode(1.0f32), [0x3f80_0000]);
    assert_eq!(encode(-2.0f64), [(-2.0f64).to_bits()]);
}

#[test]
fn bool_decodes_any_nonzero_word_as_true() {
    let memory = FixedMemory::pages(1);
    assert!(bool::decode(&memory, &[2]).unwrap());
    assert!(!bool::decode(&memory, &[0]).unwrap());
    assert_eq!(encode(true), [1]);
}

#[test]
fn duration_is_nanosecond_ticks() {
    let d = Duration::try_from(std::time::Duration::from_millis(1500)).unwrap();
    assert_eq!(encode(d), [1_500_000_000]);
    let memory = FixedMemory::pages(1);
    assert_eq!(render::<Duration>(&memory, &[1_500_000_000]), "1.5s");
}

// ══════════════════════════════════════════════════════════════════════════════
// Bounds
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn memory_decoders_share_bounds_rule() {
    let memory = FixedMemory::new(64);
    let size = memory.size() as u64;

    // In range: last byte.
    assert!(Bytes::decode(&memory, &[size - 1, 1]).is_ok());
    assert!(Pointer::<u8>::decode(&memory, &[size - 1]).unwrap().load(&memory).is_ok());

    // Offset at the end, even for an empty span.
    let trap = Bytes::decode(&memory, &[size, 0]).unwrap_err();
    assert_eq!(
        trap,
        Trap::Segfault {
            offset: size as u32,
            length: 0
        }
    );

    // Span crossing the end.
    assert!(Bytes::decode(&memory, &[size - 2, 4]).is_err());
    assert!(Array::<u32>::decode(&memory, &[size - 4, 2]).is_err());
    assert!(List::<u32>::decode(&memory, &[size - 4, 2])
        .unwrap()
        .to_vec(&memory)
        .is_err());
    assert!(Pointer::<u64>::new(size as u32 - 4).load(&memory).is_err());
}

#[test]
fn segfault_message_format() {
    let trap = Trap::Segfault {
        offset: 0x1234,
        length: 9,
    };
    assert_eq!(trap.to_string(), "segmentation fault: @00001234/9");
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn errno_survives_io_wrapping() {
    let wrapped = io::Error::other(Errno(13));
    assert_eq!(errno_of(&wrapped), Errno(13));
    assert_eq!(errno_of(&io::Error::from_raw_os_error(2)), Errno(2));
    assert_eq!(errno_of(&io::Error::other("plain")), Errno::UNKNOWN);
}

#[test]
fn optional_error_renders_message() {
    let memory = FixedMemory::pages(1);
    let stack = encode(Optional::<u32>::err(Errno(5)));
    assert_eq!(stack, [0, 5]);
    assert_eq!(render::<Optional<u32>>(&memory, &stack), "ERROR: errno(5)");
    assert_eq!(render::<Optional<u32>>(&memory, &[7, 0]), "7");
}

// ══════════════════════════════════════════════════════════════════════════════
// Rendering
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn bytes_render_quoted_and_truncated() {
    let mut memory = FixedMemory::pages(1);
    memory.write(0, b"a\"b\n").unwrap();
    assert_eq!(render::<Bytes>(&memory, &[0, 4]), r#""a\"b\n""#);

    memory.write(100, &[b'x'; 40]).unwrap();
    assert_eq!(
        render::<Bytes>(&memory, &[100, 40]),
        format!("\"{}\"... (40 bytes)", "x".repeat(20))
    );
}

#[test]
fn pointer_and_list_render_objects() {
    let mut memory = FixedMemory::pages(1);
    let p = Pointer::<u16>::new(8);
    p.store(&mut memory, &7).unwrap();
    p.index(1).store(&mut memory, &9).unwrap();
    assert_eq!(render::<Pointer<u16>>(&memory, &[8]), "&7");
    assert_eq!(render::<List<u16>>(&memory, &[8, 2]), "[7,9]");
    assert_eq!(render::<()>(&memory, &[]), "(none)");
}
