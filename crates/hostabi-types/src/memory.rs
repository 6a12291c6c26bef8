//! Bounds-checked access to guest linear memory.
//!
//! Every decode and encode path that touches memory goes through
//! [`Memory::read`] or [`Memory::read_mut`], which are the single choke point
//! for bounds checks.

use crate::trap::Trap;

/// Size of a WebAssembly memory page.
pub const PAGE_SIZE: u32 = 65536;

/// Byte-addressable linear memory.
pub trait Memory {
    /// Current size in bytes.
    fn size(&self) -> u32;

    /// Borrows `length` bytes at `offset`.
    fn read(&self, offset: u32, length: u32) -> Result<&[u8], Trap>;

    /// Mutably borrows `length` bytes at `offset`.
    fn read_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], Trap>;

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
        let length = span_length(offset, bytes.len())?;
        self.read_mut(offset, length)?.copy_from_slice(bytes);
        Ok(())
    }

    fn read_u32(&self, offset: u32) -> Result<u32, Trap> {
        let b = self.read(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn write_u32(&mut self, offset: u32, value: u32) -> Result<(), Trap> {
        self.write(offset, &value.to_le_bytes())
    }
}

/// Reports whether `[offset, offset+length)` falls outside a memory of
/// `size` bytes. An empty span at `offset == size` is out of range.
pub fn is_out_of_range(offset: u32, length: u32, size: u32) -> bool {
    offset >= size || length > size || offset > size - length
}

fn span_length(offset: u32, length: usize) -> Result<u32, Trap> {
    u32::try_from(length).map_err(|_| Trap::Segfault {
        offset,
        length: u32::MAX,
    })
}

fn check(offset: u32, length: u32, size: u32) -> Result<std::ops::Range<usize>, Trap> {
    if is_out_of_range(offset, length, size) {
        return Err(Trap::Segfault { offset, length });
    }
    let start = offset as usize;
    Ok(start..start + length as usize)
}

fn clamp_size(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// ── Owned memory ─────────────────────────────────────────────────────────────

/// An owned, fixed-size linear memory.
///
/// The size is rounded up to a whole number of pages. Useful to exercise
/// host functions without a guest VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMemory {
    bytes: Vec<u8>,
}

impl FixedMemory {
    pub fn new(size: u32) -> Self {
        let pages = size.div_ceil(PAGE_SIZE) as usize;
        Self {
            bytes: vec![0; pages * PAGE_SIZE as usize],
        }
    }

    pub fn pages(pages: u32) -> Self {
        Self::new(pages.saturating_mul(PAGE_SIZE))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl From<Vec<u8>> for FixedMemory {
    /// Wraps the bytes as-is, without page alignment.
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl Memory for FixedMemory {
    fn size(&self) -> u32 {
        clamp_size(self.bytes.len())
    }

    fn read(&self, offset: u32, length: u32) -> Result<&[u8], Trap> {
        let range = check(offset, length, self.size())?;
        Ok(&self.bytes[range])
    }

    fn read_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], Trap> {
        let range = check(offset, length, self.size())?;
        Ok(&mut self.bytes[range])
    }
}

// ── Borrowed memory ──────────────────────────────────────────────────────────

/// A view over memory owned by the guest VM, valid for one call.
#[derive(Debug)]
pub struct MemoryView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }
}

impl Memory for MemoryView<'_> {
    fn size(&self) -> u32 {
        clamp_size(self.bytes.len())
    }

    fn read(&self, offset: u32, length: u32) -> Result<&[u8], Trap> {
        let range = check(offset, length, self.size())?;
        Ok(&self.bytes[range])
    }

    fn read_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], Trap> {
        let range = check(offset, length, self.size())?;
        Ok(&mut self.bytes[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_memory_rounds_up_to_pages() {
        assert_eq!(FixedMemory::new(1).size(), PAGE_SIZE);
        assert_eq!(FixedMemory::new(PAGE_SIZE + 1).size(), 2 * PAGE_SIZE);
        assert_eq!(FixedMemory::new(0).size(), 0);
    }

    #[test]
    fn test_out_of_range_edges() {
        assert!(!is_out_of_range(0, 10, 10));
        assert!(!is_out_of_range(9, 1, 10));
        assert!(is_out_of_range(9, 2, 10));
        assert!(is_out_of_range(10, 0, 10));
        assert!(is_out_of_range(0, 11, 10));
        assert!(is_out_of_range(u32::MAX, 2, 10));
    }

    #[test]
    fn test_read_past_end_segfaults() {
        let memory = FixedMemory::from(vec![0u8; 8]);
        assert_eq!(
            memory.read(4, 5),
            Err(Trap::Segfault {
                offset: 4,
                length: 5
            })
        );
    }

    #[test]
    fn test_write_then_read_u32() {
        let mut memory = FixedMemory::pages(1);
        memory.write_u32(100, 0xdead_beef).unwrap();
        assert_eq!(memory.read_u32(100).unwrap(), 0xdead_beef);
        assert_eq!(memory.read(100, 4).unwrap(), &[0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn test_memory_view_writes_through() {
        let mut backing = [0u8; 16];
        {
            let mut view = MemoryView::new(&mut backing);
            view.write(2, b"abc").unwrap();
            assert!(view.write(14, b"abc").is_err());
        }
        assert_eq!(&backing[2..5], b"abc");
    }
}
