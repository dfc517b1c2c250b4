//! Execution and memory bridge between a host and an externally supplied A64 JIT engine.

/// Engine capability contract, cooperative halt signal, and construction inputs.
pub mod engine;
pub use engine::{
    Engine, EngineCallbacks, EngineConfig, EngineInit, EngineParts, Exception, HaltReason,
    HaltSignal, Vector,
};

/// Error taxonomy for engine and instance construction.
pub mod error;
pub use error::{CpuError, EngineError};

/// Backend contract, the callback bridge, and the windowed test backend.
pub mod memory;
pub use memory::{
    MemoryBackend, MemoryBridge, WindowedMemory, DEFAULT_WINDOW_BASE, DEFAULT_WINDOW_SIZE,
};

/// Architectural register identifiers.
pub mod state;
pub use state::{GeneralRegister, GENERAL_REGISTER_COUNT};

/// Execution controller and register access surface.
pub mod cpu;
pub use cpu::{Cpu, HaltHandle, RunOutcome};

/// Minimal interpreter standing in for the JIT engine in tests and tooling.
#[cfg(any(test, feature = "scripted-engine"))]
pub mod scripted;
#[cfg(any(test, feature = "scripted-engine"))]
pub use scripted::ScriptedEngine;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
