//! Contract between the controller and the opaque JIT engine.
//!
//! The engine itself is supplied by the embedding host. This module only
//! fixes what the engine may ask of its environment ([`EngineCallbacks`]),
//! what the controller may ask of the engine ([`Engine`]), and how a running
//! engine is asked to stop ([`HaltSignal`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::{EngineError, GeneralRegister};

/// 128-bit vector value as two little-endian 64-bit lanes (`[lo, hi]`).
pub type Vector = [u64; 2];

/// Architectural exception reported by the engine through
/// [`EngineCallbacks::exception_raised`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Exception {
    /// `BRK` executed.
    Breakpoint,
    /// Encoding is not allocated in the instruction set.
    UnallocatedEncoding,
    /// Encoding has unpredictable architectural behavior.
    Unpredictable,
    /// `WFI` executed.
    WaitForInterrupt,
    /// `WFE` executed.
    WaitForEvent,
    /// `YIELD` executed.
    Yield,
    /// `SEV` executed.
    SendEvent,
}

/// Why an engine returned control from [`Engine::run`] or [`Engine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HaltReason {
    /// Exactly one instruction was executed.
    Step,
    /// The [`HaltSignal`] was observed at a safe point.
    ExternalHalt,
    /// The configured instruction limit was reached.
    InstructionLimit,
    /// No ticks remained according to the callbacks.
    TicksExhausted,
    /// A breakpoint instruction stopped execution.
    Breakpoint,
    /// An exception other than a breakpoint stopped execution.
    Exception(Exception),
}

/// Capability set an engine requires from its environment.
///
/// One method per memory width plus the auxiliary queries an A64 JIT issues
/// while executing. Implementations run inline on the thread that owns
/// [`Engine::run`] and must not call back into the owning controller.
pub trait EngineCallbacks: Send {
    /// Loads 8 bits from `vaddr`.
    fn memory_read_8(&mut self, vaddr: u64) -> u8;
    /// Loads 16 bits from `vaddr`.
    fn memory_read_16(&mut self, vaddr: u64) -> u16;
    /// Loads 32 bits from `vaddr`.
    fn memory_read_32(&mut self, vaddr: u64) -> u32;
    /// Loads 64 bits from `vaddr`.
    fn memory_read_64(&mut self, vaddr: u64) -> u64;
    /// Loads 128 bits from `vaddr`.
    fn memory_read_128(&mut self, vaddr: u64) -> Vector;

    /// Stores 8 bits to `vaddr`.
    fn memory_write_8(&mut self, vaddr: u64, value: u8);
    /// Stores 16 bits to `vaddr`.
    fn memory_write_16(&mut self, vaddr: u64, value: u16);
    /// Stores 32 bits to `vaddr`.
    fn memory_write_32(&mut self, vaddr: u64, value: u32);
    /// Stores 64 bits to `vaddr`.
    fn memory_write_64(&mut self, vaddr: u64, value: u64);
    /// Stores 128 bits to `vaddr`.
    fn memory_write_128(&mut self, vaddr: u64, value: Vector);

    /// Remaining tick budget for the current `run`.
    fn ticks_remaining(&mut self) -> u64;
    /// Reports ticks consumed by executed code.
    fn add_ticks(&mut self, ticks: u64);
    /// Reports an architectural exception at `pc`.
    fn exception_raised(&mut self, pc: u64, exception: Exception);
    /// Returns `true` when `vaddr` may be treated as immutable code/data.
    fn is_read_only_memory(&mut self, vaddr: u64) -> bool;
    /// Requests interpretation of `num_instructions` the engine cannot translate.
    fn interpreter_fallback(&mut self, pc: u64, num_instructions: usize);
    /// Supervisor call trap (`SVC #swi`).
    fn call_svc(&mut self, swi: u32);
    /// Physical counter (`CNTPCT_EL0`) read.
    fn counter(&mut self) -> u64;
}

/// Operations the controller needs from a JIT engine instance.
///
/// Register state lives only inside the engine; the controller never keeps
/// a copy.
pub trait Engine: Send {
    /// Executes until a stop condition is met.
    fn run(&mut self) -> HaltReason;
    /// Executes exactly one instruction.
    fn step(&mut self) -> HaltReason;

    /// Reads a general-purpose register.
    fn register(&self, reg: GeneralRegister) -> u64;
    /// Writes a general-purpose register.
    fn set_register(&mut self, reg: GeneralRegister, value: u64);
    /// Reads the stack pointer.
    fn sp(&self) -> u64;
    /// Writes the stack pointer.
    fn set_sp(&mut self, value: u64);
    /// Reads the program counter.
    fn pc(&self) -> u64;
    /// Writes the program counter.
    fn set_pc(&mut self, value: u64);

    /// Clears the local exclusive monitor.
    fn clear_exclusive_state(&mut self);
}

/// Engine tuning supplied at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EngineConfig {
    /// Stops `run` after this many retired instructions when set.
    pub instruction_limit: Option<u64>,
}

/// Cooperative stop request shared between a controller and its engine.
///
/// Raising the signal never preempts the engine. The engine polls it at
/// its own safe points and consumes it when it returns.
///
/// Requests are tagged with an epoch. The controller arms a fresh epoch for
/// every `run`/`step`, and a request tagged with any other epoch is never
/// observed, so a halt aimed at a finished run cannot stop the next one.
#[derive(Debug, Clone)]
pub struct HaltSignal {
    inner: Arc<Epochs>,
}

#[derive(Debug)]
struct Epochs {
    armed: AtomicU64,
    // 0 means no request; epochs start at 1.
    requested: AtomicU64,
}

impl Default for HaltSignal {
    fn default() -> Self {
        Self {
            inner: Arc::new(Epochs {
                armed: AtomicU64::new(1),
                requested: AtomicU64::new(0),
            }),
        }
    }
}

impl HaltSignal {
    /// Creates a lowered signal armed at the first epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch currently accepting stop requests.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.armed.load(Ordering::Acquire)
    }

    /// Starts a new epoch and returns it. Requests for earlier epochs lapse.
    #[must_use]
    pub fn arm(&self) -> u64 {
        self.inner.armed.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Requests a stop of the current epoch.
    pub fn raise(&self) {
        self.raise_for(self.epoch());
    }

    /// Requests a stop of `epoch`; ignored unless it is still armed when the
    /// engine polls.
    pub fn raise_for(&self, epoch: u64) {
        self.inner.requested.fetch_max(epoch, Ordering::AcqRel);
    }

    /// Returns `true` while a stop request for the current epoch is pending.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire) == self.epoch()
    }

    /// Consumes a pending stop request, returning whether one was pending.
    #[must_use]
    pub fn take(&self) -> bool {
        let epoch = self.epoch();
        self.inner
            .requested
            .compare_exchange(epoch, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drops any pending stop request.
    pub fn clear(&self) {
        self.inner.requested.store(0, Ordering::Release);
    }
}

/// Everything an engine constructor receives.
pub struct EngineParts {
    /// The engine's only memory and capability callback object.
    pub callbacks: Box<dyn EngineCallbacks>,
    /// Stop request polled by the engine.
    pub halt: HaltSignal,
    /// Construction-time tuning.
    pub config: EngineConfig,
}

impl std::fmt::Debug for EngineParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineParts")
            .field("halt", &self.halt)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Engine constructor supplied by the embedding host.
///
/// # Errors
///
/// Returns an [`EngineError`] when the engine cannot be built; no partially
/// constructed engine is observable in that case.
pub type EngineInit = fn(EngineParts) -> Result<Box<dyn Engine>, EngineError>;
