#![no_main]

use std::sync::Arc;

use jit_bridge_core::{
    Cpu, EngineConfig, MemoryBackend, ScriptedEngine, WindowedMemory, DEFAULT_WINDOW_BASE,
    DEFAULT_WINDOW_SIZE,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let memory = Arc::new(WindowedMemory::default());
    memory.load(DEFAULT_WINDOW_BASE, &data[..data.len().min(DEFAULT_WINDOW_SIZE)]);

    let Ok(cpu) = Cpu::new(
        memory,
        ScriptedEngine::init,
        EngineConfig {
            instruction_limit: Some(256),
        },
    ) else {
        return;
    };
    cpu.set_pc(DEFAULT_WINDOW_BASE);
    cpu.set_sp(DEFAULT_WINDOW_BASE + 0x800);

    let outcome = cpu.run();
    assert_eq!(outcome.pc, cpu.pc());

    let stepped = cpu.step();
    assert_eq!(stepped.pc, cpu.pc());
    assert!(!cpu.is_running());

    cpu.set_register(31, u64::MAX);
    assert_eq!(cpu.register(31), 0);
    let _ = cpu.backend().read_u64(cpu.sp());
});
