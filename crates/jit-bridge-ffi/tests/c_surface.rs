//! Drives the C entry points the way a foreign host would: an opaque backend
//! handle, a table of entry points, and raw instance pointers.

#![allow(clippy::pedantic, clippy::nursery)]

use std::ffi::c_void;
use std::ptr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use jit_bridge_core::{MemoryBackend, ScriptedEngine, WindowedMemory};
use jit_bridge_ffi::{
    install_engine, jit_bridge_clear_exclusive, jit_bridge_create, jit_bridge_destroy,
    jit_bridge_get_pc, jit_bridge_get_sp, jit_bridge_get_x, jit_bridge_halt,
    jit_bridge_mark_exclusive, jit_bridge_run, jit_bridge_set_pc, jit_bridge_set_sp,
    jit_bridge_set_x, jit_bridge_step, jit_bridge_write_u32, JitCpu, JitMemoryOps,
};

const ENTRY: u64 = 0x1000;

unsafe fn memory<'a>(handle: *mut c_void) -> &'a WindowedMemory {
    &*handle.cast::<WindowedMemory>()
}

unsafe extern "C" fn read_u8(handle: *mut c_void, vaddr: u64) -> u8 {
    memory(handle).read_u8(vaddr)
}

unsafe extern "C" fn read_u16(handle: *mut c_void, vaddr: u64) -> u16 {
    memory(handle).read_u16(vaddr)
}

unsafe extern "C" fn read_u32(handle: *mut c_void, vaddr: u64) -> u32 {
    memory(handle).read_u32(vaddr)
}

unsafe extern "C" fn read_u64(handle: *mut c_void, vaddr: u64) -> u64 {
    memory(handle).read_u64(vaddr)
}

unsafe extern "C" fn write_u8(handle: *mut c_void, vaddr: u64, value: u8) {
    memory(handle).write_u8(vaddr, value);
}

unsafe extern "C" fn write_u16(handle: *mut c_void, vaddr: u64, value: u16) {
    memory(handle).write_u16(vaddr, value);
}

unsafe extern "C" fn write_u32(handle: *mut c_void, vaddr: u64, value: u32) {
    memory(handle).write_u32(vaddr, value);
}

unsafe extern "C" fn write_u64(handle: *mut c_void, vaddr: u64, value: u64) {
    memory(handle).write_u64(vaddr, value);
}

const OPS: JitMemoryOps = JitMemoryOps {
    read_u8: Some(read_u8),
    read_u16: Some(read_u16),
    read_u32: Some(read_u32),
    read_u64: Some(read_u64),
    write_u8: Some(write_u8),
    write_u16: Some(write_u16),
    write_u32: Some(write_u32),
    write_u64: Some(write_u64),
};

/// Backend plus the instance bound to it; destroys the instance first.
struct Harness {
    memory: Box<WindowedMemory>,
    cpu: *mut JitCpu,
}

impl Harness {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        install_engine(ScriptedEngine::init);

        let memory = Box::new(WindowedMemory::default());
        let handle = ptr::from_ref::<WindowedMemory>(&memory).cast_mut().cast::<c_void>();
        let cpu = unsafe { jit_bridge_create(handle, &OPS) };
        assert!(!cpu.is_null(), "scripted engine constructs");
        unsafe {
            jit_bridge_set_pc(cpu, ENTRY);
            jit_bridge_set_sp(cpu, 0x1800);
        }
        Self { memory, cpu }
    }

    fn load(&self, words: &[u32]) {
        for (offset, word) in (0_u64..).step_by(4).zip(words) {
            unsafe { jit_bridge_write_u32(self.cpu, ENTRY + offset, *word) };
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        unsafe { jit_bridge_destroy(self.cpu) };
    }
}

struct SendPtr(*mut JitCpu);

// SAFETY: the instance is Sync; the pointer outlives the spawned thread.
unsafe impl Send for SendPtr {}

#[test]
fn create_rejects_missing_or_incomplete_ops() {
    install_engine(ScriptedEngine::init);
    let memory = WindowedMemory::default();
    let handle = ptr::from_ref(&memory).cast_mut().cast::<c_void>();

    let no_ops = unsafe { jit_bridge_create(handle, ptr::null()) };
    assert!(no_ops.is_null());

    let partial = JitMemoryOps {
        write_u64: None,
        ..OPS
    };
    let incomplete = unsafe { jit_bridge_create(handle, &partial) };
    assert!(incomplete.is_null());
}

#[test]
fn destroy_null_is_harmless() {
    unsafe { jit_bridge_destroy(ptr::null_mut()) };
}

#[test]
fn general_registers_round_trip_through_c_surface() {
    let harness = Harness::new();
    for index in 0..=30_u32 {
        unsafe { jit_bridge_set_x(harness.cpu, index, 0xC0DE_0000 | u64::from(index)) };
    }
    for index in 0..=30_u32 {
        assert_eq!(
            unsafe { jit_bridge_get_x(harness.cpu, index) },
            0xC0DE_0000 | u64::from(index)
        );
    }
}

#[test]
fn register_31_reads_zero_and_ignores_writes() {
    let harness = Harness::new();
    unsafe {
        jit_bridge_set_x(harness.cpu, 0, 0x11);
        jit_bridge_set_x(harness.cpu, 31, 0xFFFF);

        assert_eq!(jit_bridge_get_x(harness.cpu, 31), 0);
        assert_eq!(jit_bridge_get_x(harness.cpu, 0), 0x11);
        assert_eq!(jit_bridge_get_sp(harness.cpu), 0x1800);
    }
}

#[test]
fn write_u32_is_visible_to_backend_reads() {
    let harness = Harness::new();
    unsafe { jit_bridge_write_u32(harness.cpu, 0x1234, 0x8BAD_F00D) };

    assert_eq!(harness.memory.read_u32(0x1234), 0x8BAD_F00D);
}

#[test]
fn step_and_run_report_engine_pc() {
    let harness = Harness::new();
    // NOP ; ADD X0, X0, #1 ; BRK #0
    harness.load(&[0xD503_201F, 0x9100_0400, 0xD420_0000]);

    unsafe {
        assert_eq!(jit_bridge_step(harness.cpu), ENTRY + 4);
        assert_eq!(jit_bridge_run(harness.cpu), ENTRY + 8);
        assert_eq!(jit_bridge_get_pc(harness.cpu), ENTRY + 8);
        assert_eq!(jit_bridge_get_x(harness.cpu, 0), 1);
    }
}

#[test]
fn engine_stores_reach_foreign_backend() {
    let harness = Harness::new();
    // ADD X1, X1, #3 ; STR X1, [SP] ; BRK #0
    harness.load(&[0x9100_0C21, 0xF900_03E1, 0xD420_0000]);

    unsafe { jit_bridge_run(harness.cpu) };

    assert_eq!(harness.memory.read_u64(0x1800), 3);
}

#[test]
fn halt_from_second_thread_stops_infinite_loop() {
    let harness = Harness::new();
    // loop: ADD X0, X0, #1 ; B loop
    harness.load(&[0x9100_0400, 0x17FF_FFFF]);

    let (tx, rx) = mpsc::channel();
    let target = SendPtr(harness.cpu);
    let runner = thread::spawn(move || {
        let target = target;
        let pc = unsafe { jit_bridge_run(target.0) };
        tx.send(pc).expect("receiver outlives runner");
    });

    // Halting before the run begins is a no-op, so keep asking until the
    // runner reports back.
    let deadline = Instant::now() + Duration::from_secs(5);
    let pc = loop {
        thread::sleep(Duration::from_millis(10));
        unsafe { jit_bridge_halt(harness.cpu) };
        if let Ok(pc) = rx.try_recv() {
            break pc;
        }
        assert!(Instant::now() < deadline, "run did not return after halt");
    };
    runner.join().expect("runner thread exits cleanly");

    unsafe {
        assert_eq!(pc, jit_bridge_get_pc(harness.cpu));
        assert!(jit_bridge_get_x(harness.cpu, 0) > 0);
    }
    assert!(pc == ENTRY || pc == ENTRY + 4);
}

#[test]
fn halt_on_idle_instance_is_ignored() {
    let harness = Harness::new();
    harness.load(&[0xD420_0000]);

    unsafe {
        jit_bridge_halt(harness.cpu);
        assert_eq!(jit_bridge_run(harness.cpu), ENTRY);
    }
}

#[test]
fn exclusive_entry_points_are_safe_to_call() {
    let harness = Harness::new();
    unsafe {
        jit_bridge_mark_exclusive(harness.cpu, 0x1000, 8);
        jit_bridge_clear_exclusive(harness.cpu);
        assert_eq!(jit_bridge_get_pc(harness.cpu), ENTRY);
    }
}
