//! Execution controller and register access surface.
//!
//! A [`Cpu`] owns one engine and the [`MemoryBridge`] registered as that
//! engine's only callback object. `run` and `step` hold the engine for their
//! whole duration; `halt` only touches the running slot and the
//! [`HaltSignal`], so it can be issued from another thread while `run` is
//! blocked.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    CpuError, Engine, EngineConfig, EngineInit, EngineParts, GeneralRegister, HaltReason,
    HaltSignal, MemoryBackend, MemoryBridge,
};

/// Result of one `run` or `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Engine program counter after it stopped.
    pub pc: u64,
    /// Stop condition reported by the engine.
    pub reason: HaltReason,
}

/// Value of the running slot while no `run`/`step` is in progress.
const IDLE: u64 = 0;

/// Best-effort stop request for a running [`Cpu`], usable from any thread.
#[derive(Debug, Clone)]
pub struct HaltHandle {
    // Epoch of the in-progress run, or `IDLE`.
    running: Arc<AtomicU64>,
    signal: HaltSignal,
}

impl HaltHandle {
    /// Requests the engine to stop at its next safe point.
    ///
    /// Has no effect unless a `run` or `step` is in progress. Returns
    /// immediately; the executing thread notices the request on its own.
    /// The request is bound to the run that was in progress when it was
    /// claimed and lapses if that run ends first.
    /// Returns `true` when a request was issued.
    #[must_use]
    pub fn halt(&self) -> bool {
        let epoch = self.running.load(Ordering::Acquire);
        if epoch == IDLE {
            return false;
        }
        if self
            .running
            .compare_exchange(epoch, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.signal.raise_for(epoch);
        log::debug!("halt requested for run {epoch}");
        true
    }

    /// Returns `true` while a `run` or `step` is in progress and not halted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) != IDLE
    }
}

/// Marks a run in progress and returns the handle to idle when dropped,
/// including when the engine unwinds.
struct RunGuard<'a> {
    control: &'a HaltHandle,
}

impl<'a> RunGuard<'a> {
    fn start(control: &'a HaltHandle) -> Self {
        let epoch = control.signal.arm();
        control.running.store(epoch, Ordering::Release);
        Self { control }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.control.running.store(IDLE, Ordering::Release);
        self.control.signal.clear();
    }
}

/// One engine instance bound to one external address space.
pub struct Cpu<B: MemoryBackend + ?Sized + 'static> {
    engine: Mutex<Box<dyn Engine>>,
    bridge: MemoryBridge<B>,
    control: HaltHandle,
}

impl<B: MemoryBackend + ?Sized + 'static> std::fmt::Debug for Cpu<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("bridge", &self.bridge)
            .field("running", &self.control.is_running())
            .finish_non_exhaustive()
    }
}

impl<B: MemoryBackend + ?Sized + 'static> Cpu<B> {
    /// Builds the bridge over `backend` and an engine using it as its only
    /// callback object.
    ///
    /// # Errors
    ///
    /// Returns [`CpuError::EngineConstruction`] when `init` fails. Nothing is
    /// left allocated in that case.
    pub fn new(backend: Arc<B>, init: EngineInit, config: EngineConfig) -> Result<Self, CpuError> {
        let bridge = MemoryBridge::new(backend);
        let signal = HaltSignal::new();
        let engine = init(EngineParts {
            callbacks: Box::new(bridge.clone()),
            halt: signal.clone(),
            config,
        })?;
        log::debug!("cpu instance created ({config:?})");

        Ok(Self {
            engine: Mutex::new(engine),
            bridge,
            control: HaltHandle {
                running: Arc::new(AtomicU64::new(IDLE)),
                signal,
            },
        })
    }

    /// Runs until the engine's own stop condition is met.
    ///
    /// Blocks for as long as the engine executes; a concurrent [`Self::halt`]
    /// is the only external way to end it early.
    pub fn run(&self) -> RunOutcome {
        self.execute(|engine| engine.run())
    }

    /// Executes exactly one instruction.
    pub fn step(&self) -> RunOutcome {
        self.execute(|engine| engine.step())
    }

    fn execute(&self, op: impl FnOnce(&mut dyn Engine) -> HaltReason) -> RunOutcome {
        let mut engine = self.engine.lock();
        let guard = RunGuard::start(&self.control);
        let reason = op(engine.as_mut());
        drop(guard);
        let pc = engine.pc();
        drop(engine);

        log::trace!("engine stopped at pc={pc:#x}: {reason:?}");
        RunOutcome { pc, reason }
    }

    /// Requests a stop of an in-progress `run`/`step`; no-op otherwise.
    pub fn halt(&self) {
        let _ = self.control.halt();
    }

    /// Returns a handle that can halt this CPU without borrowing it.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.control.clone()
    }

    /// Returns `true` while a `run` or `step` is in progress and not halted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Reads `X{index}`; indices outside `0..=30` read as zero.
    #[must_use]
    pub fn register(&self, index: u32) -> u64 {
        GeneralRegister::from_index(index).map_or(0, |reg| self.gpr(reg))
    }

    /// Writes `X{index}`; indices outside `0..=30` are ignored.
    pub fn set_register(&self, index: u32, value: u64) {
        if let Some(reg) = GeneralRegister::from_index(index) {
            self.set_gpr(reg, value);
        } else {
            log::trace!("ignoring write to invalid register index {index}");
        }
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub fn gpr(&self, reg: GeneralRegister) -> u64 {
        self.engine.lock().register(reg)
    }

    /// Writes a general-purpose register.
    pub fn set_gpr(&self, reg: GeneralRegister, value: u64) {
        self.engine.lock().set_register(reg, value);
    }

    /// Reads the stack pointer.
    #[must_use]
    pub fn sp(&self) -> u64 {
        self.engine.lock().sp()
    }

    /// Writes the stack pointer.
    pub fn set_sp(&self, value: u64) {
        self.engine.lock().set_sp(value);
    }

    /// Reads the program counter.
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.engine.lock().pc()
    }

    /// Writes the program counter.
    pub fn set_pc(&self, value: u64) {
        self.engine.lock().set_pc(value);
    }

    /// Writes 32 bits straight to the backend, bypassing the engine.
    pub fn write_u32(&self, vaddr: u64, value: u32) {
        self.bridge.backend().write_u32(vaddr, value);
    }

    /// Exclusive-monitor reservation placeholder; has no effect.
    #[allow(clippy::unused_self)]
    pub fn mark_exclusive(&self, vaddr: u64, size: u32) {
        log::trace!("ignoring exclusive mark of {size} byte(s) at {vaddr:#x}");
    }

    /// Clears the engine's local exclusive monitor.
    pub fn clear_exclusive(&self) {
        self.engine.lock().clear_exclusive_state();
    }

    /// Backend shared with the engine's callback object.
    #[must_use]
    pub fn backend(&self) -> &B {
        self.bridge.backend()
    }
}

impl<B: MemoryBackend + ?Sized + 'static> Drop for Cpu<B> {
    fn drop(&mut self) {
        log::debug!("cpu instance destroyed");
    }
}
