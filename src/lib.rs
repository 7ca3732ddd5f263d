//! A cycle-accurate MOS 6502 simulator with a minimal Atari 8-bit OS
//! personality layered on top: tagged memory, CIO character devices, SIO
//! disk protocol, a small DOS, and XEX/ROM/disk-boot loaders.

pub mod cio;
pub mod config;
pub mod cpu;
pub mod dos;
pub mod error;
pub mod hw;
pub mod loader;
pub mod mathpack;
pub mod memory;
pub mod opcodes;
pub mod profiler;
pub mod sio;

use cio::Cio;
use config::Configuration;
use cpu::Cpu;
use error::SimError;
use memory::{AddressSpace, BusPtr};
use sio::Sio;
use std::cell::RefCell;
use std::rc::Rc;

/// Top-level engine: owns the bus, CPU, and installed personality layers.
/// Construction follows `atari.c`'s `atari_init` sequencing — hardware
/// stubs first, then BIOS zero-page, then CIO, then SIO — so later layers
/// can assume earlier ones already populated the memory map they read.
pub struct Emulator {
    pub cpu: Cpu,
    pub bus: BusPtr,
    pub cio: Rc<RefCell<Cio>>,
    pub sio: Rc<RefCell<Sio>>,
    pub dos: dos::Dos,
}

impl Emulator {
    pub fn new(config: Configuration) -> Emulator {
        let bus: BusPtr = Rc::new(RefCell::new(AddressSpace::new()));

        bus.borrow_mut().add_zeroed_ram(0x0000, 0x0600);
        bus.borrow_mut().add_zeroed_ram(0x0600, 0xD000 - 0x0600);

        hw::install(&bus);
        let dos = dos::Dos::new(config.root_path.clone());
        let cio = cio::install(&bus, &config);
        let sio = sio::install(&bus, &config);
        if config.emulate_dos {
            dos.init(&bus);
            dos::Dos::install(&bus, &sio);
        }

        let mut cpu = Cpu::new(Rc::clone(&bus));
        cpu.regs.pc = config.start_address;
        cpu.error_level = config.error_level;
        cpu.cycle_limit = config.cycle_limit;
        if config.debug {
            cpu.profiler.enable();
        }

        Emulator { cpu, bus, cio, sio, dos }
    }

    /// Loads and runs an XEX binary, returning the terminating fault (a
    /// clean `Break`/`CycleLimit` is the expected way for a guest program
    /// to signal completion; anything else is a real error). Loading
    /// itself may run INITAD segments' init routines via re-entrant
    /// `call`s, so a fault can also surface straight out of the load.
    pub fn run_xex(&mut self, data: &[u8]) -> SimError {
        match loader::load_xex(&mut self.cpu, data) {
            Ok(entry) => {
                self.cpu.regs.pc = entry;
                self.cpu.run()
            }
            Err(loader::LoadError::Exec(e)) => e,
            Err(e) => SimError::User(e.to_string()),
        }
    }

    pub fn run_rom(&mut self, data: &[u8]) -> SimError {
        match loader::load_rom(&self.bus, data) {
            Ok(entry) => {
                self.cpu.regs.pc = entry;
                self.cpu.run()
            }
            Err(e) => SimError::User(e.to_string()),
        }
    }

    /// Boots a disk image and runs the ROM handoff chain (boot sector,
    /// DOSINI, DOSVEC). The chain usually ends in a fault raised by one of
    /// those `call`s (a BRK in the booted code, or DOS's own CP exit) —
    /// that's the expected "boot completed" signal, not a loader error.
    pub fn boot_disk(&mut self, image: &sio::DiskImage) -> SimError {
        match loader::boot_disk(&mut self.cpu, image) {
            Ok(()) => SimError::Break(self.cpu.regs.pc),
            Err(loader::LoadError::Exec(e)) => e,
            Err(e) => SimError::User(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emulator_runs_a_trivial_xex_to_a_clean_break() {
        let config = Configuration::default();
        let mut emu = Emulator::new(config);
        // LDA #$01 / STA $0700 / BRK
        let mut data = Vec::new();
        data.extend_from_slice(&0x2000u16.to_le_bytes());
        data.extend_from_slice(&0x2005u16.to_le_bytes());
        data.extend_from_slice(&[0xA9, 0x01, 0x8D, 0x00, 0x07, 0x00]);
        let err = emu.run_xex(&data);
        assert!(matches!(err, SimError::Break(_)));
        assert_eq!(emu.bus.borrow().get_byte(0x0700), Some(0x01));
    }
}
