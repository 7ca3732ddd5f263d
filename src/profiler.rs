//! Component G: per-address execution profiling and disassembly.
//!
//! Grounded on `original_source/src/sim65.c`'s instruction counter and
//! `print_curr_ins` disassembly tables — reshaped around `opcodes.rs`'s
//! table as the single source of mnemonic/addressing-mode truth instead of
//! a second hardcoded format-string array.

use crate::memory::AddressSpace;
use crate::opcodes::{mnemonic_text, AddrMode, OPCODES};
use std::collections::HashMap;
use std::convert::TryInto;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub executions: u64,
    pub cycles: u64,
    pub extra_cycles: u64,
}

/// Per-address execution and cycle counters (§4.G), keyed sparsely since a
/// 64 KiB flat array would dwarf the rest of the simulator for programs
/// that touch a few hundred addresses.
#[derive(Default)]
pub struct Profiler {
    enabled: bool,
    counters: HashMap<u16, Counters>,
}

impl Profiler {
    pub fn new() -> Self {
        Profiler { enabled: false, counters: HashMap::new() }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn record(&mut self, pc: u16, cycles: u64, had_extra: bool) {
        if !self.enabled {
            return;
        }
        let entry = self.counters.entry(pc).or_default();
        entry.executions += 1;
        entry.cycles += cycles;
        if had_extra {
            entry.extra_cycles += 1;
        }
    }

    pub fn counters_for(&self, pc: u16) -> Counters {
        self.counters.get(&pc).copied().unwrap_or_default()
    }

    /// Text snapshot (§4.G): one line per executed address, sorted by
    /// address, `$PC  EXECUTIONS  CYCLES  EXTRA`.
    pub fn snapshot_text(&self) -> String {
        let mut addrs: Vec<&u16> = self.counters.keys().collect();
        addrs.sort();
        let mut out = String::new();
        for addr in addrs {
            let c = &self.counters[addr];
            let _ = writeln!(out, "${:04X}  {:>8}  {:>10}  {:>6}", addr, c.executions, c.cycles, c.extra_cycles);
        }
        out
    }

    /// Binary profile persistence: a flat sequence of
    /// `(addr: u16, executions: u64, cycles: u64, extra: u64)` records in
    /// address order, little-endian. Deliberately not bincode/serde-backed:
    /// this is the one format in the simulator with no wire-compatibility
    /// requirement with anything else, so a hand-rolled layout avoids
    /// pulling in a serialization crate for a single call site.
    pub fn save_binary(&self) -> Vec<u8> {
        let mut addrs: Vec<&u16> = self.counters.keys().collect();
        addrs.sort();
        let mut buf = Vec::with_capacity(addrs.len() * 18);
        for addr in addrs {
            let c = &self.counters[addr];
            buf.extend_from_slice(&addr.to_le_bytes());
            buf.extend_from_slice(&c.executions.to_le_bytes());
            buf.extend_from_slice(&c.cycles.to_le_bytes());
            buf.extend_from_slice(&c.extra_cycles.to_le_bytes());
        }
        buf
    }

    pub fn load_binary(data: &[u8]) -> Profiler {
        let mut profiler = Profiler::new();
        let mut i = 0;
        while i + 26 <= data.len() {
            let addr = u16::from_le_bytes([data[i], data[i + 1]]);
            let executions = u64::from_le_bytes(data[i + 2..i + 10].try_into().unwrap());
            let cycles = u64::from_le_bytes(data[i + 10..i + 18].try_into().unwrap());
            let extra_cycles = u64::from_le_bytes(data[i + 18..i + 26].try_into().unwrap());
            profiler.counters.insert(addr, Counters { executions, cycles, extra_cycles });
            i += 26;
        }
        profiler
    }
}

/// Disassembles one instruction at `addr`, returning the formatted line and
/// the address of the next instruction. Reads through `get_byte` (falling
/// back to 0 for unmapped/uninitialized bytes) since disassembly must never
/// fault.
pub fn disassemble_one(bus: &AddressSpace, addr: u16) -> (String, u16) {
    let opcode_byte = bus.get_byte(addr).unwrap_or(0);
    let info = OPCODES[opcode_byte as usize];
    let len = info.mode.operand_len();
    let mnemonic = mnemonic_text(&info);

    let operand_text = match info.mode {
        AddrMode::Implied => String::new(),
        AddrMode::Accumulator => "A".to_string(),
        AddrMode::Immediate => format!("#${:02X}", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::ZeroPage => format!("${:02X}", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::ZeroPageX => format!("${:02X},X", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::ZeroPageY => format!("${:02X},Y", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::Absolute => format!("${:04X}", bus.dpeek(addr.wrapping_add(1))),
        AddrMode::AbsoluteX => format!("${:04X},X", bus.dpeek(addr.wrapping_add(1))),
        AddrMode::AbsoluteY => format!("${:04X},Y", bus.dpeek(addr.wrapping_add(1))),
        AddrMode::Indirect => format!("(${:04X})", bus.dpeek(addr.wrapping_add(1))),
        AddrMode::IndirectX => format!("(${:02X},X)", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::IndirectY => format!("(${:02X}),Y", bus.get_byte(addr.wrapping_add(1)).unwrap_or(0)),
        AddrMode::Relative => {
            let offset = bus.get_byte(addr.wrapping_add(1)).unwrap_or(0) as i8;
            let target = addr.wrapping_add(2).wrapping_add(offset as i16 as u16);
            format!("${:04X}", target)
        }
    };

    let line = if operand_text.is_empty() {
        format!("${:04X}: {:02X}        {}", addr, opcode_byte, mnemonic)
    } else {
        format!("${:04X}: {:02X}        {} {}", addr, opcode_byte, mnemonic, operand_text)
    };
    (line, addr.wrapping_add(1).wrapping_add(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_when_enabled() {
        let mut p = Profiler::new();
        p.record(0x0600, 3, false);
        assert_eq!(p.counters_for(0x0600).executions, 0);
        p.enable();
        p.record(0x0600, 3, false);
        p.record(0x0600, 4, true);
        let c = p.counters_for(0x0600);
        assert_eq!(c.executions, 2);
        assert_eq!(c.cycles, 7);
        assert_eq!(c.extra_cycles, 1);
    }

    #[test]
    fn binary_round_trip() {
        let mut p = Profiler::new();
        p.enable();
        p.record(0x1000, 3, false);
        p.record(0x2000, 10, true);
        let data = p.save_binary();
        let loaded = Profiler::load_binary(&data);
        assert_eq!(loaded.counters_for(0x1000).executions, 1);
        assert_eq!(loaded.counters_for(0x2000).extra_cycles, 1);
    }

    #[test]
    fn disassembles_immediate_lda() {
        let mut bus = AddressSpace::new();
        bus.add_data_rom(0x0600, &[0xA9, 0x42]);
        let (line, next) = disassemble_one(&bus, 0x0600);
        assert!(line.contains("LDA"));
        assert!(line.contains("#$42"));
        assert_eq!(next, 0x0602);
    }
}
