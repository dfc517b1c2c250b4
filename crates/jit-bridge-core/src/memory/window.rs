//! Self-contained byte window standing in for an external address space.
//!
//! Only accesses that fall entirely inside the window touch storage. Every
//! other read returns zero and every other write is dropped, so a stray
//! access never faults.

use parking_lot::Mutex;

use crate::MemoryBackend;

/// Default first mapped address.
pub const DEFAULT_WINDOW_BASE: u64 = 0x1000;
/// Default window size in bytes (4 KiB).
pub const DEFAULT_WINDOW_SIZE: usize = 0x1000;

/// Fixed, zero-initialized, little-endian memory window.
#[derive(Debug)]
pub struct WindowedMemory {
    base: u64,
    bytes: Mutex<Box<[u8]>>,
}

impl Default for WindowedMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_BASE, DEFAULT_WINDOW_SIZE)
    }
}

impl WindowedMemory {
    /// Allocates `size` zeroed bytes mapped at `base`.
    #[must_use]
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: Mutex::new(vec![0; size].into_boxed_slice()),
        }
    }

    /// First mapped address.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Window size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Returns `true` when every byte of `[vaddr, vaddr + len)` is mapped.
    #[must_use]
    pub fn contains(&self, vaddr: u64, len: usize) -> bool {
        self.offset(vaddr, len, self.size()).is_some()
    }

    /// Copies `data` into the window starting at `vaddr`.
    ///
    /// Returns `false` and leaves the window untouched when any byte would
    /// fall outside it.
    pub fn load(&self, vaddr: u64, data: &[u8]) -> bool {
        let mut bytes = self.bytes.lock();
        let Some(start) = self.offset(vaddr, data.len(), bytes.len()) else {
            return false;
        };
        bytes[start..start + data.len()].copy_from_slice(data);
        true
    }

    /// Copies out `len` bytes starting at `vaddr`, or `None` when unmapped.
    #[must_use]
    pub fn dump(&self, vaddr: u64, len: usize) -> Option<Vec<u8>> {
        let bytes = self.bytes.lock();
        let start = self.offset(vaddr, len, bytes.len())?;
        Some(bytes[start..start + len].to_vec())
    }

    fn offset(&self, vaddr: u64, len: usize, size: usize) -> Option<usize> {
        let start = usize::try_from(vaddr.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= size).then_some(start)
    }

    fn read<const N: usize>(&self, vaddr: u64) -> [u8; N] {
        let mut out = [0; N];
        let bytes = self.bytes.lock();
        let Some(start) = self.offset(vaddr, N, bytes.len()) else {
            drop(bytes);
            log::trace!("unmapped {}-bit read at {vaddr:#x}", N * 8);
            return out;
        };
        out.copy_from_slice(&bytes[start..start + N]);
        drop(bytes);
        out
    }

    fn write<const N: usize>(&self, vaddr: u64, value: [u8; N]) {
        let mut bytes = self.bytes.lock();
        let Some(start) = self.offset(vaddr, N, bytes.len()) else {
            drop(bytes);
            log::trace!("dropping unmapped {}-bit write at {vaddr:#x}", N * 8);
            return;
        };
        bytes[start..start + N].copy_from_slice(&value);
        drop(bytes);
    }
}

impl MemoryBackend for WindowedMemory {
    fn read_u8(&self, vaddr: u64) -> u8 {
        u8::from_le_bytes(self.read(vaddr))
    }

    fn read_u16(&self, vaddr: u64) -> u16 {
        u16::from_le_bytes(self.read(vaddr))
    }

    fn read_u32(&self, vaddr: u64) -> u32 {
        u32::from_le_bytes(self.read(vaddr))
    }

    fn read_u64(&self, vaddr: u64) -> u64 {
        u64::from_le_bytes(self.read(vaddr))
    }

    fn write_u8(&self, vaddr: u64, value: u8) {
        self.write(vaddr, value.to_le_bytes());
    }

    fn write_u16(&self, vaddr: u64, value: u16) {
        self.write(vaddr, value.to_le_bytes());
    }

    fn write_u32(&self, vaddr: u64, value: u32) {
        self.write(vaddr, value.to_le_bytes());
    }

    fn write_u64(&self, vaddr: u64, value: u64) {
        self.write(vaddr, value.to_le_bytes());
    }
}
