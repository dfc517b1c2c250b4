//! Tiny A64 interpreter implementing [`Engine`] for tests and tooling.
//!
//! It exists to drive the bridge and controller end to end without the real
//! JIT, so it understands just enough of the instruction set to build loops,
//! touch memory, and stop:
//!
//! | Encoding | Behavior |
//! |----------|----------|
//! | `NOP` | advance |
//! | `B label` | relative branch |
//! | `ADD Xd\|SP, Xn\|SP, #imm12{, LSL #12}` | 64-bit add |
//! | `STR Xt, [Xn\|SP, #imm]` / `LDR Xt, [Xn\|SP, #imm]` | 64-bit store/load |
//! | `LDXR Xt, [Xn\|SP]` | 64-bit load, opens an exclusive reservation |
//! | `STXR Ws, Xt, [Xn\|SP]` | 64-bit store if reserved; `Ws` = 0 on success, 1 otherwise |
//! | `SVC #imm16` | `call_svc`, advance |
//! | `CLREX` | clear exclusive monitor, advance |
//! | `BRK #imm16` | `exception_raised(Breakpoint)`, stop at the `BRK` |
//!
//! Any other word reports [`Exception::UnallocatedEncoding`] and stops.

use crate::{
    Engine, EngineCallbacks, EngineError, EngineParts, Exception, GeneralRegister, HaltReason,
    HaltSignal, GENERAL_REGISTER_COUNT,
};

const NOP: u32 = 0xD503_201F;
const CLREX_MASK: u32 = 0xFFFF_F0FF;
const CLREX: u32 = 0xD503_305F;
const B_MASK: u32 = 0xFC00_0000;
const B: u32 = 0x1400_0000;
const ADD_IMM_MASK: u32 = 0xFF80_0000;
const ADD_IMM: u32 = 0x9100_0000;
const LDST_X_MASK: u32 = 0xFFC0_0000;
const STR_X: u32 = 0xF900_0000;
const LDR_X: u32 = 0xF940_0000;
const LDXR_X_MASK: u32 = 0xFFFF_FC00;
const LDXR_X: u32 = 0xC85F_7C00;
const STXR_X_MASK: u32 = 0xFFE0_FC00;
const STXR_X: u32 = 0xC800_7C00;
const EXC_MASK: u32 = 0xFFE0_001F;
const SVC: u32 = 0xD400_0001;
const BRK: u32 = 0xD420_0000;

enum Retire {
    Next,
    Branch(u64),
    Stop(HaltReason),
}

/// Reference interpreter standing in for the opaque JIT engine.
pub struct ScriptedEngine {
    callbacks: Box<dyn EngineCallbacks>,
    halt: HaltSignal,
    instruction_limit: Option<u64>,
    x: [u64; GENERAL_REGISTER_COUNT],
    sp: u64,
    pc: u64,
    exclusive: bool,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("pc", &self.pc)
            .field("sp", &self.sp)
            .field("x", &self.x)
            .finish_non_exhaustive()
    }
}

impl ScriptedEngine {
    /// Builds an engine from controller-supplied parts.
    #[must_use]
    pub fn new(parts: EngineParts) -> Self {
        Self {
            callbacks: parts.callbacks,
            halt: parts.halt,
            instruction_limit: parts.config.instruction_limit,
            x: [0; GENERAL_REGISTER_COUNT],
            sp: 0,
            pc: 0,
            exclusive: false,
        }
    }

    /// [`crate::EngineInit`]-compatible constructor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when the instruction limit is zero.
    pub fn init(parts: EngineParts) -> Result<Box<dyn Engine>, EngineError> {
        if parts.config.instruction_limit == Some(0) {
            return Err(EngineError::Config("instruction limit must be non-zero".into()));
        }
        Ok(Box::new(Self::new(parts)))
    }

    /// Returns `true` while the local exclusive monitor holds a reservation.
    #[must_use]
    pub const fn exclusive_reserved(&self) -> bool {
        self.exclusive
    }

    const fn base(&self, rn: u32) -> u64 {
        if rn == 31 {
            self.sp
        } else {
            self.x[rn as usize]
        }
    }

    const fn set_base(&mut self, rd: u32, value: u64) {
        if rd == 31 {
            self.sp = value;
        } else {
            self.x[rd as usize] = value;
        }
    }

    const fn xt(&self, rt: u32) -> u64 {
        if rt == 31 {
            0
        } else {
            self.x[rt as usize]
        }
    }

    const fn set_xt(&mut self, rt: u32, value: u64) {
        if rt != 31 {
            self.x[rt as usize] = value;
        }
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn execute_one(&mut self) -> Retire {
        let pc = self.pc;
        let word = self.callbacks.memory_read_32(pc);
        let rd = word & 0x1F;
        let rn = (word >> 5) & 0x1F;

        if word == NOP {
            Retire::Next
        } else if word & CLREX_MASK == CLREX {
            self.exclusive = false;
            Retire::Next
        } else if word & B_MASK == B {
            let imm26 = u64::from(word & 0x03FF_FFFF);
            let offset = ((imm26 << 38) as i64 >> 36) as u64;
            Retire::Branch(pc.wrapping_add(offset))
        } else if word & ADD_IMM_MASK == ADD_IMM {
            let shift = if word & (1 << 22) == 0 { 0 } else { 12 };
            let imm = u64::from((word >> 10) & 0xFFF) << shift;
            let value = self.base(rn).wrapping_add(imm);
            self.set_base(rd, value);
            Retire::Next
        } else if word & LDST_X_MASK == STR_X || word & LDST_X_MASK == LDR_X {
            let offset = u64::from((word >> 10) & 0xFFF) << 3;
            let vaddr = self.base(rn).wrapping_add(offset);
            if word & LDST_X_MASK == STR_X {
                let value = self.xt(rd);
                self.callbacks.memory_write_64(vaddr, value);
            } else {
                let value = self.callbacks.memory_read_64(vaddr);
                self.set_xt(rd, value);
            }
            Retire::Next
        } else if word & LDXR_X_MASK == LDXR_X {
            let value = self.callbacks.memory_read_64(self.base(rn));
            self.set_xt(rd, value);
            self.exclusive = true;
            Retire::Next
        } else if word & STXR_X_MASK == STXR_X {
            let status = (word >> 16) & 0x1F;
            if self.exclusive {
                let value = self.xt(rd);
                self.callbacks.memory_write_64(self.base(rn), value);
            }
            self.set_xt(status, u64::from(!self.exclusive));
            self.exclusive = false;
            Retire::Next
        } else if word & EXC_MASK == SVC {
            self.callbacks.call_svc((word >> 5) & 0xFFFF);
            Retire::Next
        } else if word & EXC_MASK == BRK {
            self.callbacks.exception_raised(pc, Exception::Breakpoint);
            Retire::Stop(HaltReason::Breakpoint)
        } else {
            self.callbacks.exception_raised(pc, Exception::UnallocatedEncoding);
            Retire::Stop(HaltReason::Exception(Exception::UnallocatedEncoding))
        }
    }

    /// Executes one instruction and commits the PC, returning a stop reason
    /// when execution must not continue.
    fn retire_one(&mut self) -> Option<HaltReason> {
        match self.execute_one() {
            Retire::Next => self.pc = self.pc.wrapping_add(4),
            Retire::Branch(target) => self.pc = target,
            Retire::Stop(reason) => return Some(reason),
        }
        self.callbacks.add_ticks(1);
        None
    }
}

impl Engine for ScriptedEngine {
    fn run(&mut self) -> HaltReason {
        let mut retired = 0_u64;
        loop {
            if self.halt.take() {
                return HaltReason::ExternalHalt;
            }
            if self.instruction_limit.is_some_and(|limit| retired >= limit) {
                return HaltReason::InstructionLimit;
            }
            if self.callbacks.ticks_remaining() == 0 {
                return HaltReason::TicksExhausted;
            }
            if let Some(reason) = self.retire_one() {
                return reason;
            }
            retired += 1;
        }
    }

    fn step(&mut self) -> HaltReason {
        self.halt.clear();
        self.retire_one().unwrap_or(HaltReason::Step)
    }

    fn register(&self, reg: GeneralRegister) -> u64 {
        self.x[reg.index()]
    }

    fn set_register(&mut self, reg: GeneralRegister, value: u64) {
        self.x[reg.index()] = value;
    }

    fn sp(&self) -> u64 {
        self.sp
    }

    fn set_sp(&mut self, value: u64) {
        self.sp = value;
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    fn clear_exclusive_state(&mut self) {
        self.exclusive = false;
    }
}
