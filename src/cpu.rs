//! Component B: the cycle-accurate 6502 execution engine.
//!
//! Grounded on `original_source/src/sim65.c`: register layout (`sim65_reg`),
//! flag macros (`FLAG_*`/`SET*`/`GET*`), the `do_adc`/`do_sbc` BCD fix-up
//! formulas, and the fetch-decode-execute `next()` loop — reshaped from a
//! macro-heavy `switch` into addressing-mode decode (`Operand`, generalizing
//! the teacher's `MemoryHandle`) plus a match over `opcodes::Mnemonic`.

use crate::config::ErrorLevel;
use crate::error::{SimError, SimResult};
use crate::memory::{BusPtr, CallbackKind, CallbackType};
use crate::opcodes::{AddrMode, Mnemonic, OPCODES};
use crate::profiler::Profiler;
use std::cell::RefCell;
use std::rc::Rc;

pub const FLAG_N: u8 = 0x80;
pub const FLAG_V: u8 = 0x40;
pub const FLAG_U: u8 = 0x20; // unused, always read as 1
pub const FLAG_B: u8 = 0x10;
pub const FLAG_D: u8 = 0x08;
pub const FLAG_I: u8 = 0x04;
pub const FLAG_Z: u8 = 0x02;
pub const FLAG_C: u8 = 0x01;

/// The sentinel return address used by `Cpu::call` (§4.B). Nothing
/// legitimate executes at $0000 in this simulator's memory map.
pub const CALL_RET_ADDR: u16 = 0x0000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Regs {
    pub pc: u16,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub s: u8,
}

impl Regs {
    pub fn new() -> Self {
        Regs { pc: 0, a: 0, x: 0, y: 0, p: FLAG_U | FLAG_I, s: 0xFF }
    }
}

/// Unifies register/memory/immediate operand access for the current
/// instruction, mirroring the teacher's `MemoryHandle` abstraction for the
/// 68000's addressing modes.
#[derive(Debug, Clone, Copy)]
enum Operand {
    Accumulator,
    Address(u16),
    Immediate(u8),
    None,
}

pub struct Cpu {
    pub regs: Regs,
    pub bus: BusPtr,
    pub cycles: u64,
    pub error_level: ErrorLevel,
    pub cycle_limit: Option<u64>,
    pub profiler: Profiler,
    /// One-shot re-entrant call-return state: set by `call`, cleared by the
    /// exec-callback installed at `CALL_RET_ADDR`.
    call_depth: u32,
}

impl Cpu {
    pub fn new(bus: BusPtr) -> Self {
        let mut cpu = Cpu {
            regs: Regs::new(),
            bus,
            cycles: 0,
            error_level: ErrorLevel::default(),
            cycle_limit: None,
            profiler: Profiler::new(),
            call_depth: 0,
        };
        cpu.install_call_ret_trap();
        cpu
    }

    fn install_call_ret_trap(&mut self) {
        let cb: Rc<RefCell<crate::memory::CallbackFn>> =
            Rc::new(RefCell::new(|_cpu: &mut Cpu, _addr: u16, _kind: CallbackKind| Err(-1)));
        self.bus.borrow_mut().add_callback(CALL_RET_ADDR, CallbackType::Exec, cb);
    }

    // ---- memory access (§4.A access rules) -----------------------------

    pub fn read_byte(&mut self, addr: u16) -> SimResult<u8> {
        if let Some(b) = self.bus.borrow().fast_read(addr) {
            return Ok(b);
        }
        let cb = self.bus.borrow().has_callback(addr, CallbackType::Read);
        if let Some(cb) = cb {
            let result = (cb.borrow_mut())(self, addr, CallbackKind::Read);
            return result.map_err(|_| SimError::ReadUndef(addr));
        }
        let tag = self.bus.borrow().tag(addr);
        if !tag.ram && !tag.rom {
            let err = SimError::ReadUndef(addr);
            return if self.policy_allows(&err) { Err(err) } else { Ok(0) };
        }
        if tag.invalid {
            let byte = self.bus.borrow().get_byte(addr).unwrap_or(0);
            let err = SimError::ReadUninit(addr);
            return if self.policy_allows(&err) { Err(err) } else { Ok(byte) };
        }
        Ok(self.bus.borrow().get_byte(addr).unwrap_or(0))
    }

    /// Applies the §7 error-level policy: `None` silences every memory
    /// fault, `Memory` demotes only uninitialized reads to a no-op, `Full`
    /// propagates everything.
    fn policy_allows(&self, err: &SimError) -> bool {
        if !err.is_memory_fault() {
            return true;
        }
        match self.error_level {
            ErrorLevel::None => false,
            ErrorLevel::Memory => !err.is_uninit_read(),
            ErrorLevel::Full => true,
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) -> SimResult<()> {
        let tag = self.bus.borrow().tag(addr);
        if tag.invalid {
            self.bus.borrow_mut().poke(addr, val);
            return Ok(());
        }
        let cb = self.bus.borrow().has_callback(addr, CallbackType::Write);
        if let Some(cb) = cb {
            let result = (cb.borrow_mut())(self, addr, CallbackKind::Write(val));
            return result.map(|_| ()).map_err(|_| SimError::WriteUndef(addr));
        }
        if tag.rom {
            if self.policy_allows(&SimError::WriteRom(addr)) {
                return Err(SimError::WriteRom(addr));
            }
            return Ok(());
        }
        if !tag.ram {
            if self.policy_allows(&SimError::WriteUndef(addr)) {
                return Err(SimError::WriteUndef(addr));
            }
            self.bus.borrow_mut().poke(addr, val);
            return Ok(());
        }
        self.bus.borrow_mut().poke(addr, val);
        Ok(())
    }

    fn exec_fetch(&mut self, addr: u16) -> SimResult<u8> {
        let cb = self.bus.borrow().has_callback(addr, CallbackType::Exec);
        if let Some(cb) = cb {
            let outcome = (cb.borrow_mut())(self, addr, CallbackKind::Exec);
            if outcome.is_err() { return Err(SimError::CallRet) }
        }
        if let Some(b) = self.bus.borrow().fast_read(addr) {
            return Ok(b);
        }
        let tag = self.bus.borrow().tag(addr);
        if !tag.ram && !tag.rom {
            let err = SimError::ExecUndef(addr);
            return if self.policy_allows(&err) { Err(err) } else { Ok(0) };
        }
        if tag.invalid {
            let byte = self.bus.borrow().get_byte(addr).unwrap_or(0);
            let err = SimError::ExecUninit(addr);
            return if self.policy_allows(&err) { Err(err) } else { Ok(byte) };
        }
        Ok(self.bus.borrow().get_byte(addr).unwrap_or(0))
    }

    fn fetch_operand_byte(&mut self) -> SimResult<u8> {
        let b = self.read_byte(self.regs.pc)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        Ok(b)
    }

    fn fetch_operand_word(&mut self) -> SimResult<u16> {
        let lo = self.fetch_operand_byte()? as u16;
        let hi = self.fetch_operand_byte()? as u16;
        Ok(lo | (hi << 8))
    }

    // ---- stack -----------------------------------------------------------

    fn push(&mut self, val: u8) -> SimResult<()> {
        let addr = 0x0100 | self.regs.s as u16;
        self.write_byte(addr, val)?;
        self.regs.s = self.regs.s.wrapping_sub(1);
        Ok(())
    }

    fn pull(&mut self) -> SimResult<u8> {
        self.regs.s = self.regs.s.wrapping_add(1);
        let addr = 0x0100 | self.regs.s as u16;
        self.read_byte(addr)
    }

    fn push_word(&mut self, val: u16) -> SimResult<()> {
        self.push((val >> 8) as u8)?;
        self.push((val & 0xFF) as u8)
    }

    fn pull_word(&mut self) -> SimResult<u16> {
        let lo = self.pull()? as u16;
        let hi = self.pull()? as u16;
        Ok(lo | (hi << 8))
    }

    // ---- flags -------------------------------------------------------

    fn set_flag(&mut self, mask: u8, set: bool) {
        if set {
            self.regs.p |= mask;
        } else {
            self.regs.p &= !mask;
        }
    }

    fn flag(&self, mask: u8) -> bool {
        self.regs.p & mask != 0
    }

    fn set_nz(&mut self, val: u8) {
        self.set_flag(FLAG_Z, val == 0);
        self.set_flag(FLAG_N, val & 0x80 != 0);
    }

    // ---- addressing mode decode ------------------------------------------

    /// Decodes the operand for `mode`, advancing PC past any operand bytes.
    /// Returns the operand handle and whether the effective address crossed
    /// a page boundary (meaningful only for indexed/indirect-indexed modes).
    fn decode(&mut self, mode: AddrMode) -> SimResult<(Operand, bool)> {
        use AddrMode::*;
        Ok(match mode {
            Implied => (Operand::None, false),
            Accumulator => (Operand::Accumulator, false),
            Immediate => (Operand::Immediate(self.fetch_operand_byte()?), false),
            Relative => (Operand::Immediate(self.fetch_operand_byte()?), false),
            ZeroPage => {
                let a = self.fetch_operand_byte()? as u16;
                (Operand::Address(a), false)
            }
            ZeroPageX => {
                let a = self.fetch_operand_byte()?.wrapping_add(self.regs.x) as u16;
                (Operand::Address(a), false)
            }
            ZeroPageY => {
                let a = self.fetch_operand_byte()?.wrapping_add(self.regs.y) as u16;
                (Operand::Address(a), false)
            }
            Absolute => {
                let a = self.fetch_operand_word()?;
                (Operand::Address(a), false)
            }
            AbsoluteX => {
                let base = self.fetch_operand_word()?;
                let a = base.wrapping_add(self.regs.x as u16);
                (Operand::Address(a), page_crossed(base, a))
            }
            AbsoluteY => {
                let base = self.fetch_operand_word()?;
                let a = base.wrapping_add(self.regs.y as u16);
                (Operand::Address(a), page_crossed(base, a))
            }
            Indirect => {
                let ptr = self.fetch_operand_word()?;
                // Matched to source's clean behavior, not the NMOS
                // page-wrap bug (§9 Open Questions, decided in DESIGN.md).
                let lo = self.read_byte(ptr)? as u16;
                let hi = self.read_byte(ptr.wrapping_add(1))? as u16;
                (Operand::Address(lo | (hi << 8)), false)
            }
            IndirectX => {
                let zp = self.fetch_operand_byte()?.wrapping_add(self.regs.x);
                let lo = self.read_byte(zp as u16)? as u16;
                let hi = self.read_byte(zp.wrapping_add(1) as u16)? as u16;
                (Operand::Address(lo | (hi << 8)), false)
            }
            IndirectY => {
                let zp = self.fetch_operand_byte()?;
                let lo = self.read_byte(zp as u16)? as u16;
                let hi = self.read_byte(zp.wrapping_add(1) as u16)? as u16;
                let base = lo | (hi << 8);
                let a = base.wrapping_add(self.regs.y as u16);
                (Operand::Address(a), page_crossed(base, a))
            }
        })
    }

    fn load(&mut self, op: Operand) -> SimResult<u8> {
        match op {
            Operand::Accumulator => Ok(self.regs.a),
            Operand::Address(a) => self.read_byte(a),
            Operand::Immediate(v) => Ok(v),
            Operand::None => unreachable!("load on Operand::None"),
        }
    }

    fn store(&mut self, op: Operand, val: u8) -> SimResult<()> {
        match op {
            Operand::Accumulator => {
                self.regs.a = val;
                Ok(())
            }
            Operand::Address(a) => self.write_byte(a, val),
            _ => unreachable!("store on non-writable operand"),
        }
    }

    // ---- ALU (grounded on sim65.c's do_adc/do_sbc BCD fix-ups) -----------

    fn adc(&mut self, val: u8) {
        let a = self.regs.a;
        let carry_in = self.flag(FLAG_C) as u16;
        let sum = a as u16 + val as u16 + carry_in;
        self.set_flag(FLAG_Z, (sum & 0xFF) == 0);
        self.set_flag(FLAG_V, (!(a ^ val) & (a ^ sum as u8) & 0x80) != 0);
        self.set_flag(FLAG_C, sum > 0xFF);
        self.set_flag(FLAG_N, sum as u8 & 0x80 != 0);
        if self.flag(FLAG_D) {
            let mut lo = (a & 0x0F) + (val & 0x0F) + carry_in as u8;
            let mut hi = (a >> 4) + (val >> 4);
            if lo > 9 {
                lo = lo.wrapping_sub(10);
                hi += 1;
            }
            let mut carry = false;
            if hi > 9 {
                hi = hi.wrapping_sub(10);
                carry = true;
            }
            let result = (hi << 4) | (lo & 0x0F);
            self.set_flag(FLAG_N, result & 0x80 != 0);
            self.set_flag(FLAG_C, carry);
            self.regs.a = result;
        } else {
            self.regs.a = sum as u8;
        }
    }

    fn sbc(&mut self, val: u8) {
        let a = self.regs.a;
        let carry_in = self.flag(FLAG_C) as u16;
        let val_inv = !val;
        let diff = a as u16 + val_inv as u16 + carry_in;
        self.set_flag(FLAG_Z, (diff & 0xFF) == 0);
        self.set_flag(FLAG_V, ((a ^ val_inv) & (a ^ diff as u8) & 0x80) != 0);
        self.set_flag(FLAG_C, diff > 0xFF);
        self.set_flag(FLAG_N, diff as u8 & 0x80 != 0);
        if self.flag(FLAG_D) {
            let mut lo = (a & 0x0F) as i16 - (val & 0x0F) as i16 - (1 - carry_in as i16);
            let mut hi = (a >> 4) as i16 - (val >> 4) as i16;
            if lo < 0 {
                lo += 10;
                hi -= 1;
            }
            if hi < 0 {
                hi += 10;
            }
            let result = ((hi as u8) << 4) | (lo as u8 & 0x0F);
            self.regs.a = result;
        } else {
            self.regs.a = diff as u8;
        }
    }

    fn compare(&mut self, reg: u8, val: u8) {
        let result = reg.wrapping_sub(val);
        self.set_flag(FLAG_C, reg >= val);
        self.set_nz(result);
    }

    fn branch(&mut self, taken: bool, offset: u8) -> SimResult<u8> {
        if !taken {
            return Ok(0);
        }
        let base = self.regs.pc;
        let target = base.wrapping_add(offset as i8 as i16 as u16);
        self.regs.pc = target;
        Ok(if page_crossed(base, target) { 2 } else { 1 })
    }

    // ---- instruction dispatch ---------------------------------------------

    /// Executes one instruction, returning the cycles it charged (§3 cycle
    /// counter: base + page-cross + branch-taken extras).
    pub fn step(&mut self) -> SimResult<u64> {
        let pc_before = self.regs.pc;
        let opcode_byte = self.exec_fetch(pc_before)?;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        let info = OPCODES[opcode_byte as usize];

        if info.mnemonic == Mnemonic::Illegal {
            return Err(SimError::InvalidIns(opcode_byte, pc_before));
        }

        let (operand, page_crossed_flag) = self.decode(info.mode)?;
        let mut extra: u64 = 0;
        if info.page_penalty && page_crossed_flag {
            extra += 1;
        }

        use Mnemonic::*;
        match info.mnemonic {
            XNop | NOP => {}
            ADC => {
                let v = self.load(operand)?;
                self.adc(v);
            }
            SBC => {
                let v = self.load(operand)?;
                self.sbc(v);
            }
            AND => {
                let v = self.load(operand)?;
                self.regs.a &= v;
                self.set_nz(self.regs.a);
            }
            ORA => {
                let v = self.load(operand)?;
                self.regs.a |= v;
                self.set_nz(self.regs.a);
            }
            EOR => {
                let v = self.load(operand)?;
                self.regs.a ^= v;
                self.set_nz(self.regs.a);
            }
            ASL => {
                let v = self.load(operand)?;
                self.set_flag(FLAG_C, v & 0x80 != 0);
                let r = v << 1;
                self.set_nz(r);
                self.store(operand, r)?;
            }
            LSR => {
                let v = self.load(operand)?;
                self.set_flag(FLAG_C, v & 0x01 != 0);
                let r = v >> 1;
                self.set_nz(r);
                self.store(operand, r)?;
            }
            ROL => {
                let v = self.load(operand)?;
                let carry_in = self.flag(FLAG_C) as u8;
                self.set_flag(FLAG_C, v & 0x80 != 0);
                let r = (v << 1) | carry_in;
                self.set_nz(r);
                self.store(operand, r)?;
            }
            ROR => {
                let v = self.load(operand)?;
                let carry_in = (self.flag(FLAG_C) as u8) << 7;
                self.set_flag(FLAG_C, v & 0x01 != 0);
                let r = (v >> 1) | carry_in;
                self.set_nz(r);
                self.store(operand, r)?;
            }
            INC => {
                let v = self.load(operand)?.wrapping_add(1);
                self.set_nz(v);
                self.store(operand, v)?;
            }
            DEC => {
                let v = self.load(operand)?.wrapping_sub(1);
                self.set_nz(v);
                self.store(operand, v)?;
            }
            INX => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.set_nz(self.regs.x);
            }
            INY => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.set_nz(self.regs.y);
            }
            DEX => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.set_nz(self.regs.x);
            }
            DEY => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.set_nz(self.regs.y);
            }
            BIT => {
                let v = self.load(operand)?;
                self.set_flag(FLAG_Z, (v & self.regs.a) == 0);
                self.set_flag(FLAG_N, v & 0x80 != 0);
                self.set_flag(FLAG_V, v & 0x40 != 0);
            }
            CMP => {
                let v = self.load(operand)?;
                self.compare(self.regs.a, v);
            }
            CPX => {
                let v = self.load(operand)?;
                self.compare(self.regs.x, v);
            }
            CPY => {
                let v = self.load(operand)?;
                self.compare(self.regs.y, v);
            }
            LDA => {
                self.regs.a = self.load(operand)?;
                self.set_nz(self.regs.a);
            }
            LDX => {
                self.regs.x = self.load(operand)?;
                self.set_nz(self.regs.x);
            }
            LDY => {
                self.regs.y = self.load(operand)?;
                self.set_nz(self.regs.y);
            }
            STA => self.store(operand, self.regs.a)?,
            STX => self.store(operand, self.regs.x)?,
            STY => self.store(operand, self.regs.y)?,
            TAX => {
                self.regs.x = self.regs.a;
                self.set_nz(self.regs.x);
            }
            TAY => {
                self.regs.y = self.regs.a;
                self.set_nz(self.regs.y);
            }
            TXA => {
                self.regs.a = self.regs.x;
                self.set_nz(self.regs.a);
            }
            TYA => {
                self.regs.a = self.regs.y;
                self.set_nz(self.regs.a);
            }
            TSX => {
                self.regs.x = self.regs.s;
                self.set_nz(self.regs.x);
            }
            TXS => self.regs.s = self.regs.x,
            CLC => self.set_flag(FLAG_C, false),
            SEC => self.set_flag(FLAG_C, true),
            CLI => self.set_flag(FLAG_I, false),
            SEI => self.set_flag(FLAG_I, true),
            CLD => self.set_flag(FLAG_D, false),
            SED => self.set_flag(FLAG_D, true),
            CLV => self.set_flag(FLAG_V, false),
            PHA => self.push(self.regs.a)?,
            PHP => self.push(self.regs.p | FLAG_B | FLAG_U)?,
            PLA => {
                self.regs.a = self.pull()?;
                self.set_nz(self.regs.a);
            }
            PLP => {
                let p = self.pull()?;
                self.regs.p = (p & !FLAG_B) | FLAG_U;
            }
            JMP => {
                if let Operand::Address(a) = operand {
                    self.regs.pc = a;
                }
            }
            JSR => {
                if let Operand::Address(a) = operand {
                    let ret = self.regs.pc.wrapping_sub(1);
                    self.push_word(ret)?;
                    self.regs.pc = a;
                }
            }
            RTS => {
                let addr = self.pull_word()?;
                self.regs.pc = addr.wrapping_add(1);
            }
            RTI => {
                let p = self.pull()?;
                self.regs.p = (p & !FLAG_B) | FLAG_U;
                self.regs.pc = self.pull_word()?;
            }
            BRK => {
                return Err(SimError::Break(pc_before));
            }
            BPL => {
                let offset = self.load(operand)?;
                extra += self.branch(!self.flag(FLAG_N), offset)? as u64;
            }
            BMI => {
                let offset = self.load(operand)?;
                extra += self.branch(self.flag(FLAG_N), offset)? as u64;
            }
            BVC => {
                let offset = self.load(operand)?;
                extra += self.branch(!self.flag(FLAG_V), offset)? as u64;
            }
            BVS => {
                let offset = self.load(operand)?;
                extra += self.branch(self.flag(FLAG_V), offset)? as u64;
            }
            BCC => {
                let offset = self.load(operand)?;
                extra += self.branch(!self.flag(FLAG_C), offset)? as u64;
            }
            BCS => {
                let offset = self.load(operand)?;
                extra += self.branch(self.flag(FLAG_C), offset)? as u64;
            }
            BNE => {
                let offset = self.load(operand)?;
                extra += self.branch(!self.flag(FLAG_Z), offset)? as u64;
            }
            BEQ => {
                let offset = self.load(operand)?;
                extra += self.branch(self.flag(FLAG_Z), offset)? as u64;
            }
            Illegal => unreachable!("filtered above"),
        }

        let total = info.cycles as u64 + extra;
        self.cycles = self.cycles.saturating_add(total);
        self.profiler.record(pc_before, total, extra > 0);
        if let Some(limit) = self.cycle_limit {
            if self.cycles >= limit {
                return Err(SimError::CycleLimit(self.regs.pc));
            }
        }
        Ok(total)
    }

    /// Runs until a fault. `CallRet` received at depth 0 is an engine bug
    /// (nothing should `call()` without a matching depth), not a real
    /// fault, but it unwinds identically.
    pub fn run(&mut self) -> SimError {
        loop {
            match self.step() {
                Ok(_) => continue,
                Err(e) => return e,
            }
        }
    }

    /// The re-entrant host-to-guest call (§4.B): synthesizes a `JSR` to
    /// `addr` with return address `CALL_RET_ADDR`, runs until the matching
    /// `RTS`, and translates the `CallRet` sentinel into success.
    pub fn call(&mut self, addr: u16) -> SimResult<()> {
        self.call_depth += 1;
        let ret = CALL_RET_ADDR.wrapping_sub(1);
        let push_result = self.push_word(ret);
        if let Err(e) = push_result {
            self.call_depth -= 1;
            return Err(e);
        }
        self.regs.pc = addr;
        let result = loop {
            match self.step() {
                Ok(_) => continue,
                Err(SimError::CallRet) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.call_depth -= 1;
        result
    }
}

fn page_crossed(base: u16, effective: u16) -> bool {
    (base & 0xFF00) != (effective & 0xFF00)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cpu_with(program: &[u8], start: u16) -> Cpu {
        let bus = Rc::new(RefCell::new(AddressSpace::new()));
        bus.borrow_mut().add_ram(0, 0x0200);
        bus.borrow_mut().add_zeroed_ram(0x0200, 0xFE00);
        bus.borrow_mut().add_data_ram(start, program);
        let mut cpu = Cpu::new(bus);
        cpu.regs.pc = start;
        cpu.regs.s = 0xFF;
        cpu
    }

    #[test]
    fn adc_binary_overflow() {
        let mut cpu = cpu_with(&[0x69, 0x01], 0x4000); // ADC #$01
        cpu.regs.a = 0x7F;
        cpu.set_flag(FLAG_C, false);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.a, 0x80);
        assert!(cpu.flag(FLAG_N));
        assert!(cpu.flag(FLAG_V));
        assert!(!cpu.flag(FLAG_C));
        assert!(!cpu.flag(FLAG_Z));
    }

    #[test]
    fn adc_decimal_mode() {
        let mut cpu = cpu_with(&[0x69, 0x01], 0x4000); // ADC #$01
        cpu.regs.a = 0x09;
        cpu.set_flag(FLAG_C, false);
        cpu.set_flag(FLAG_D, true);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.a, 0x10);
        assert!(!cpu.flag(FLAG_C));
        assert!(!cpu.flag(FLAG_Z));
    }

    #[test]
    fn jsr_pushes_return_minus_one() {
        let mut cpu = cpu_with(&[0x20, 0x34, 0x12], 0x4000); // JSR $1234
        cpu.regs.s = 0xFF;
        cpu.step().unwrap();
        assert_eq!(cpu.regs.s, 0xFD);
        assert_eq!(cpu.regs.pc, 0x1234);
        let lo = cpu.read_byte(0x01FE).unwrap();
        let hi = cpu.read_byte(0x01FF).unwrap();
        assert_eq!(hi, 0x40);
        assert_eq!(lo, 0x02);
    }

    #[test]
    fn cycle_limit_stops_cleanly() {
        let mut cpu = cpu_with(&[0x4C, 0x00, 0x06], 0x0600); // JMP $0600
        cpu.cycle_limit = Some(100);
        let err = cpu.run();
        assert!(matches!(err, SimError::CycleLimit(0x0600)));
    }

    #[test]
    fn write_to_rom_faults() {
        let bus = Rc::new(RefCell::new(AddressSpace::new()));
        bus.borrow_mut().add_data_rom(0xE000, &[0x60]);
        let mut cpu = Cpu::new(bus);
        cpu.error_level = ErrorLevel::Full;
        let err = cpu.write_byte(0xE000, 0x42).unwrap_err();
        assert!(matches!(err, SimError::WriteRom(0xE000)));
    }

    #[test]
    fn zeroed_ram_reads_as_zero_without_fault() {
        let bus = Rc::new(RefCell::new(AddressSpace::new()));
        bus.borrow_mut().add_zeroed_ram(0x80, 4);
        let mut cpu = Cpu::new(bus);
        assert_eq!(cpu.read_byte(0x82).unwrap(), 0);
    }
}
