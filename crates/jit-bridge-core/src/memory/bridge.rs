//! Forwards engine-issued memory accesses to an externally owned backend.
//!
//! The bridge performs no bounds, alignment, or translation work of its own.
//! Auxiliary capability queries are answered with fixed values and never
//! reach the backend, so timing- and exception-accurate behavior is not
//! modeled here.

use std::sync::Arc;

use crate::{EngineCallbacks, Exception, MemoryBackend, Vector};

/// Tick budget reported to the engine on every query.
pub const TICKS_REMAINING: u64 = 1;

/// Callback object binding an engine to a [`MemoryBackend`].
pub struct MemoryBridge<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for MemoryBridge<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: ?Sized> std::fmt::Debug for MemoryBridge<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBridge")
            .field("backend", &Arc::as_ptr(&self.backend).cast::<()>())
            .finish()
    }
}

impl<B: MemoryBackend + ?Sized> MemoryBridge<B> {
    /// Binds a bridge to `backend`.
    #[must_use]
    pub const fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Returns the backend this bridge forwards to.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads 128 bits as two 64-bit loads at `vaddr` and `vaddr + 8`.
    ///
    /// The two halves are independent backend calls with no atomicity
    /// relative to each other or to concurrent writers.
    #[must_use]
    pub fn read_128(&self, vaddr: u64) -> Vector {
        let lo = self.backend.read_u64(vaddr);
        let hi = self.backend.read_u64(vaddr.wrapping_add(8));
        [lo, hi]
    }

    /// Writes 128 bits as two 64-bit stores, low half first.
    pub fn write_128(&self, vaddr: u64, value: Vector) {
        let [lo, hi] = value;
        self.backend.write_u64(vaddr, lo);
        self.backend.write_u64(vaddr.wrapping_add(8), hi);
    }
}

impl<B: MemoryBackend + ?Sized + 'static> EngineCallbacks for MemoryBridge<B> {
    fn memory_read_8(&mut self, vaddr: u64) -> u8 {
        self.backend.read_u8(vaddr)
    }

    fn memory_read_16(&mut self, vaddr: u64) -> u16 {
        self.backend.read_u16(vaddr)
    }

    fn memory_read_32(&mut self, vaddr: u64) -> u32 {
        self.backend.read_u32(vaddr)
    }

    fn memory_read_64(&mut self, vaddr: u64) -> u64 {
        self.backend.read_u64(vaddr)
    }

    fn memory_read_128(&mut self, vaddr: u64) -> Vector {
        self.read_128(vaddr)
    }

    fn memory_write_8(&mut self, vaddr: u64, value: u8) {
        self.backend.write_u8(vaddr, value);
    }

    fn memory_write_16(&mut self, vaddr: u64, value: u16) {
        self.backend.write_u16(vaddr, value);
    }

    fn memory_write_32(&mut self, vaddr: u64, value: u32) {
        self.backend.write_u32(vaddr, value);
    }

    fn memory_write_64(&mut self, vaddr: u64, value: u64) {
        self.backend.write_u64(vaddr, value);
    }

    fn memory_write_128(&mut self, vaddr: u64, value: Vector) {
        self.write_128(vaddr, value);
    }

    fn ticks_remaining(&mut self) -> u64 {
        TICKS_REMAINING
    }

    fn add_ticks(&mut self, _ticks: u64) {}

    fn exception_raised(&mut self, pc: u64, exception: Exception) {
        log::debug!("dropping engine exception {exception:?} at pc={pc:#x}");
    }

    fn is_read_only_memory(&mut self, _vaddr: u64) -> bool {
        false
    }

    fn interpreter_fallback(&mut self, pc: u64, num_instructions: usize) {
        log::trace!(
            "ignoring interpreter fallback for {num_instructions} instruction(s) at pc={pc:#x}"
        );
    }

    fn call_svc(&mut self, swi: u32) {
        log::trace!("ignoring svc #{swi:#x}");
    }

    fn counter(&mut self) -> u64 {
        0
    }
}
