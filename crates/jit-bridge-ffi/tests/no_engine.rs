//! Behavior of the C surface when the host never installed an engine, and of
//! every entry point when handed a NULL instance.

#![allow(clippy::pedantic, clippy::nursery)]

use std::ffi::c_void;
use std::ptr;

use jit_bridge_ffi::{
    jit_bridge_clear_exclusive, jit_bridge_create, jit_bridge_destroy, jit_bridge_get_pc,
    jit_bridge_get_sp, jit_bridge_get_x, jit_bridge_halt, jit_bridge_mark_exclusive,
    jit_bridge_run, jit_bridge_set_pc, jit_bridge_set_sp, jit_bridge_set_x, jit_bridge_step,
    jit_bridge_write_u32, JitMemoryOps,
};

unsafe extern "C" fn read_u8(_: *mut c_void, _: u64) -> u8 {
    0
}

unsafe extern "C" fn read_u16(_: *mut c_void, _: u64) -> u16 {
    0
}

unsafe extern "C" fn read_u32(_: *mut c_void, _: u64) -> u32 {
    0
}

unsafe extern "C" fn read_u64(_: *mut c_void, _: u64) -> u64 {
    0
}

unsafe extern "C" fn write_u8(_: *mut c_void, _: u64, _: u8) {}

unsafe extern "C" fn write_u16(_: *mut c_void, _: u64, _: u16) {}

unsafe extern "C" fn write_u32(_: *mut c_void, _: u64, _: u32) {}

unsafe extern "C" fn write_u64(_: *mut c_void, _: u64, _: u64) {}

#[test]
fn create_without_installed_engine_returns_null() {
    let _ = env_logger::builder().is_test(true).try_init();
    let ops = JitMemoryOps {
        read_u8: Some(read_u8),
        read_u16: Some(read_u16),
        read_u32: Some(read_u32),
        read_u64: Some(read_u64),
        write_u8: Some(write_u8),
        write_u16: Some(write_u16),
        write_u32: Some(write_u32),
        write_u64: Some(write_u64),
    };

    let cpu = unsafe { jit_bridge_create(ptr::null_mut(), &ops) };
    assert!(cpu.is_null());
}

#[test]
fn null_instance_reads_zero_and_ignores_everything_else() {
    let cpu = ptr::null_mut();
    unsafe {
        assert_eq!(jit_bridge_run(cpu), 0);
        assert_eq!(jit_bridge_step(cpu), 0);
        jit_bridge_halt(cpu);

        jit_bridge_set_x(cpu, 0, 1);
        jit_bridge_set_sp(cpu, 1);
        jit_bridge_set_pc(cpu, 1);
        assert_eq!(jit_bridge_get_x(cpu, 0), 0);
        assert_eq!(jit_bridge_get_sp(cpu), 0);
        assert_eq!(jit_bridge_get_pc(cpu), 0);

        jit_bridge_write_u32(cpu, 0x1000, 1);
        jit_bridge_mark_exclusive(cpu, 0x1000, 4);
        jit_bridge_clear_exclusive(cpu);
        jit_bridge_destroy(cpu);
    }
}
