//! Externally owned address spaces and the bridge the engine calls into.

/// Callback object forwarding engine accesses to a backend.
pub mod bridge;
/// Self-contained fixed window backend.
pub mod window;

pub use bridge::MemoryBridge;
pub use window::{WindowedMemory, DEFAULT_WINDOW_BASE, DEFAULT_WINDOW_SIZE};

/// Address space owned outside the bridge.
///
/// Every emulated access is forwarded here with the exact virtual address the
/// engine produced. Validation, translation, and fault handling belong to the
/// implementation; it must never panic across this boundary and must be
/// callable from whichever thread currently executes the engine.
pub trait MemoryBackend: Send + Sync {
    /// Reads 8 bits at `vaddr`.
    fn read_u8(&self, vaddr: u64) -> u8;
    /// Reads 16 bits at `vaddr`.
    fn read_u16(&self, vaddr: u64) -> u16;
    /// Reads 32 bits at `vaddr`.
    fn read_u32(&self, vaddr: u64) -> u32;
    /// Reads 64 bits at `vaddr`.
    fn read_u64(&self, vaddr: u64) -> u64;

    /// Writes 8 bits at `vaddr`.
    fn write_u8(&self, vaddr: u64, value: u8);
    /// Writes 16 bits at `vaddr`.
    fn write_u16(&self, vaddr: u64, value: u16);
    /// Writes 32 bits at `vaddr`.
    fn write_u32(&self, vaddr: u64, value: u32);
    /// Writes 64 bits at `vaddr`.
    fn write_u64(&self, vaddr: u64, value: u64);
}
