//! Runs an endless counting loop on a worker thread and stops it from the
//! main thread through a [`HaltHandle`](jit_bridge_core::HaltHandle).

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jit_bridge_core::{Cpu, EngineConfig, MemoryBackend, ScriptedEngine, WindowedMemory};
use log as _;
use parking_lot as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const ENTRY: u64 = 0x1000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let memory = Arc::new(WindowedMemory::default());
    // loop: ADD X0, X0, #1 ; B loop
    memory.write_u32(ENTRY, 0x9100_0400);
    memory.write_u32(ENTRY + 4, 0x17FF_FFFF);

    let cpu = Arc::new(Cpu::new(
        memory,
        ScriptedEngine::init,
        EngineConfig::default(),
    )?);
    cpu.set_pc(ENTRY);
    let halt = cpu.halt_handle();

    let worker = {
        let cpu = Arc::clone(&cpu);
        thread::spawn(move || cpu.run())
    };

    while !halt.is_running() {
        thread::yield_now();
    }
    let started = Instant::now();
    thread::sleep(Duration::from_millis(50));
    let requested = halt.halt();

    let outcome = worker.join().map_err(|_| "worker thread panicked")?;
    println!(
        "stopped after {:?} (requested={requested}): reason={:?} pc={:#x} x0={}",
        started.elapsed(),
        outcome.reason,
        outcome.pc,
        cpu.register(0)
    );
    Ok(())
}
