//! C ABI over `jit-bridge-core`.
//!
//! Only opaque pointers and fixed-width integers cross this boundary. Every
//! entry point tolerates a NULL instance and contains panics, degrading to
//! zero or a no-op; a NULL result from [`jit_bridge_create`] is the only error
//! signal.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock};

use jit_bridge_core::{
    Cpu, Engine, EngineConfig, EngineError, EngineInit, EngineParts, MemoryBackend,
};

/// Backend 8-bit read entry point.
pub type ReadU8Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64) -> u8;
/// Backend 16-bit read entry point.
pub type ReadU16Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64) -> u16;
/// Backend 32-bit read entry point.
pub type ReadU32Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64) -> u32;
/// Backend 64-bit read entry point.
pub type ReadU64Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64) -> u64;
/// Backend 8-bit write entry point.
pub type WriteU8Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64, value: u8);
/// Backend 16-bit write entry point.
pub type WriteU16Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64, value: u16);
/// Backend 32-bit write entry point.
pub type WriteU32Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64, value: u32);
/// Backend 64-bit write entry point.
pub type WriteU64Fn = unsafe extern "C" fn(handle: *mut c_void, vaddr: u64, value: u64);

/// Entry points of the host's memory backend. All must be non-NULL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct JitMemoryOps {
    pub read_u8: Option<ReadU8Fn>,
    pub read_u16: Option<ReadU16Fn>,
    pub read_u32: Option<ReadU32Fn>,
    pub read_u64: Option<ReadU64Fn>,
    pub write_u8: Option<WriteU8Fn>,
    pub write_u16: Option<WriteU16Fn>,
    pub write_u32: Option<WriteU32Fn>,
    pub write_u64: Option<WriteU64Fn>,
}

/// Host backend reached through an opaque handle and its entry points.
///
/// The handle is passed through untouched on every call.
struct ForeignMemory {
    handle: *mut c_void,
    read_u8: ReadU8Fn,
    read_u16: ReadU16Fn,
    read_u32: ReadU32Fn,
    read_u64: ReadU64Fn,
    write_u8: WriteU8Fn,
    write_u16: WriteU16Fn,
    write_u32: WriteU32Fn,
    write_u64: WriteU64Fn,
}

// SAFETY: the backend contract requires its entry points to be callable with
// this handle from whichever thread executes the engine.
unsafe impl Send for ForeignMemory {}
// SAFETY: see above; the bridge never dereferences the handle itself.
unsafe impl Sync for ForeignMemory {}

impl ForeignMemory {
    fn new(handle: *mut c_void, ops: &JitMemoryOps) -> Option<Self> {
        Some(Self {
            handle,
            read_u8: ops.read_u8?,
            read_u16: ops.read_u16?,
            read_u32: ops.read_u32?,
            read_u64: ops.read_u64?,
            write_u8: ops.write_u8?,
            write_u16: ops.write_u16?,
            write_u32: ops.write_u32?,
            write_u64: ops.write_u64?,
        })
    }
}

impl MemoryBackend for ForeignMemory {
    fn read_u8(&self, vaddr: u64) -> u8 {
        unsafe { (self.read_u8)(self.handle, vaddr) }
    }

    fn read_u16(&self, vaddr: u64) -> u16 {
        unsafe { (self.read_u16)(self.handle, vaddr) }
    }

    fn read_u32(&self, vaddr: u64) -> u32 {
        unsafe { (self.read_u32)(self.handle, vaddr) }
    }

    fn read_u64(&self, vaddr: u64) -> u64 {
        unsafe { (self.read_u64)(self.handle, vaddr) }
    }

    fn write_u8(&self, vaddr: u64, value: u8) {
        unsafe { (self.write_u8)(self.handle, vaddr, value) }
    }

    fn write_u16(&self, vaddr: u64, value: u16) {
        unsafe { (self.write_u16)(self.handle, vaddr, value) }
    }

    fn write_u32(&self, vaddr: u64, value: u32) {
        unsafe { (self.write_u32)(self.handle, vaddr, value) }
    }

    fn write_u64(&self, vaddr: u64, value: u64) {
        unsafe { (self.write_u64)(self.handle, vaddr, value) }
    }
}

/// Opaque CPU instance handed to C callers.
pub struct JitCpu {
    cpu: Cpu<ForeignMemory>,
}

static ENGINE: OnceLock<EngineInit> = OnceLock::new();

/// Installs the process-wide engine constructor used by [`jit_bridge_create`].
///
/// Returns `false` if an engine was already installed; the first one wins.
pub fn install_engine(init: EngineInit) -> bool {
    let installed = ENGINE.set(init).is_ok();
    if !installed {
        log::warn!("engine already installed; keeping the first constructor");
    }
    installed
}

fn engine_unavailable(_parts: EngineParts) -> Result<Box<dyn Engine>, EngineError> {
    Err(EngineError::Unavailable)
}

fn contained<T>(name: &str, default: T, op: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|_| {
        log::error!("panic contained in {name}");
        default
    })
}

/// # Safety
///
/// `cpu` must be NULL or a live pointer returned by [`jit_bridge_create`].
unsafe fn with_cpu<T>(
    name: &str,
    cpu: *const JitCpu,
    default: T,
    op: impl FnOnce(&Cpu<ForeignMemory>) -> T,
) -> T {
    match cpu.as_ref() {
        Some(instance) => contained(name, default, || op(&instance.cpu)),
        None => default,
    }
}

/// Creates a CPU instance whose memory accesses go to `handle` through `ops`.
///
/// Returns NULL when `ops` is NULL or incomplete, when no engine is
/// installed, or when the engine fails to construct.
///
/// # Safety
///
/// `ops` must be NULL or point to a valid [`JitMemoryOps`]. `handle` must stay
/// valid for the entry points until the instance is destroyed.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_create(
    handle: *mut c_void,
    ops: *const JitMemoryOps,
) -> *mut JitCpu {
    let Some(ops) = ops.as_ref().copied() else {
        log::warn!("jit_bridge_create: NULL memory ops");
        return ptr::null_mut();
    };
    contained("jit_bridge_create", ptr::null_mut(), || {
        let Some(memory) = ForeignMemory::new(handle, &ops) else {
            log::warn!("jit_bridge_create: incomplete memory ops");
            return ptr::null_mut();
        };
        let init = ENGINE.get().copied().unwrap_or(engine_unavailable);
        match Cpu::new(Arc::new(memory), init, EngineConfig::default()) {
            Ok(cpu) => Box::into_raw(Box::new(JitCpu { cpu })),
            Err(err) => {
                log::warn!("jit_bridge_create: {err}");
                ptr::null_mut()
            }
        }
    })
}

/// Destroys an instance. NULL is ignored.
///
/// # Safety
///
/// `cpu` must be NULL or a pointer from [`jit_bridge_create`] that has not
/// been destroyed, and no other call on it may be in progress.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_destroy(cpu: *mut JitCpu) {
    if cpu.is_null() {
        return;
    }
    let instance = Box::from_raw(cpu);
    contained("jit_bridge_destroy", (), move || drop(instance));
}

/// Runs until the engine stops and returns the resulting PC.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_run(cpu: *mut JitCpu) -> u64 {
    with_cpu("jit_bridge_run", cpu, 0, |cpu| cpu.run().pc)
}

/// Executes one instruction and returns the resulting PC.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_step(cpu: *mut JitCpu) -> u64 {
    with_cpu("jit_bridge_step", cpu, 0, |cpu| cpu.step().pc)
}

/// Asks a running instance to stop; safe to call from another thread while
/// [`jit_bridge_run`] is executing.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_halt(cpu: *mut JitCpu) {
    with_cpu("jit_bridge_halt", cpu, (), Cpu::halt);
}

/// Reads `X{index}`; indices above 30 read as zero.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_get_x(cpu: *mut JitCpu, index: u32) -> u64 {
    with_cpu("jit_bridge_get_x", cpu, 0, |cpu| cpu.register(index))
}

/// Writes `X{index}`; indices above 30 are ignored.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_set_x(cpu: *mut JitCpu, index: u32, value: u64) {
    with_cpu("jit_bridge_set_x", cpu, (), |cpu| cpu.set_register(index, value));
}

/// Reads the stack pointer.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_get_sp(cpu: *mut JitCpu) -> u64 {
    with_cpu("jit_bridge_get_sp", cpu, 0, Cpu::sp)
}

/// Writes the stack pointer.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_set_sp(cpu: *mut JitCpu, value: u64) {
    with_cpu("jit_bridge_set_sp", cpu, (), |cpu| cpu.set_sp(value));
}

/// Reads the program counter.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_get_pc(cpu: *mut JitCpu) -> u64 {
    with_cpu("jit_bridge_get_pc", cpu, 0, Cpu::pc)
}

/// Writes the program counter.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_set_pc(cpu: *mut JitCpu, value: u64) {
    with_cpu("jit_bridge_set_pc", cpu, (), |cpu| cpu.set_pc(value));
}

/// Writes 32 bits straight to the backend without involving the engine.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_write_u32(cpu: *mut JitCpu, vaddr: u64, value: u32) {
    with_cpu("jit_bridge_write_u32", cpu, (), |cpu| cpu.write_u32(vaddr, value));
}

/// Exclusive reservation placeholder; has no effect.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_mark_exclusive(cpu: *mut JitCpu, vaddr: u64, size: u32) {
    with_cpu("jit_bridge_mark_exclusive", cpu, (), |cpu| {
        cpu.mark_exclusive(vaddr, size);
    });
}

/// Clears the engine's exclusive monitor.
///
/// # Safety
///
/// `cpu` must be NULL or a live instance.
#[no_mangle]
pub unsafe extern "C" fn jit_bridge_clear_exclusive(cpu: *mut JitCpu) {
    with_cpu("jit_bridge_clear_exclusive", cpu, (), Cpu::clear_exclusive);
}
