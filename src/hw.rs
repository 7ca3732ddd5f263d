//! Ambient out-of-scope hardware register stubs.
//!
//! Grounded on `original_source/src/hw.c`: GTIA/POKEY/PIA/ANTIC aren't
//! emulated (explicit Non-goal), but the BIOS and CIO/SIO layers still
//! read a handful of these registers (VCOUNT, RANDOM, PIA port state for
//! 130XE bank-switching), so they need *some* defined behavior rather than
//! faulting as undefined memory.

use crate::cpu::Cpu;
use crate::memory::{BusPtr, CallbackKind, CallbackType};
use std::cell::RefCell;
use std::rc::Rc;

const VCOUNT: u16 = 0xD40B; // ANTIC vertical line counter
const RANDOM: u16 = 0xD20A; // POKEY random number generator
const PORTB: u16 = 0xD301; // PIA port B, used for 130XE bank switching

/// LCG matching the period/bit-spread `hw.c`'s comment describes POKEY's
/// RANDOM register as needing: "looks random enough that self-modifying
/// seed loops don't degenerate", not a cryptographic requirement.
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1103515245).wrapping_add(12345);
        (self.0 >> 16) as u8
    }
}

/// Installs read-callbacks for the handful of hardware registers real BIOS
/// code touches even when full GTIA/POKEY/ANTIC timing isn't emulated.
pub fn install(bus: &BusPtr) {
    let rng = Rc::new(RefCell::new(Lcg(0x2463)));
    let vcount_cb: Rc<RefCell<crate::memory::CallbackFn>> =
        Rc::new(RefCell::new(|_cpu: &mut Cpu, _addr: u16, _kind: CallbackKind| Ok(0)));
    bus.borrow_mut().add_callback(VCOUNT, CallbackType::Read, vcount_cb);

    let random_cb: Rc<RefCell<crate::memory::CallbackFn>> = Rc::new(RefCell::new(move |_cpu: &mut Cpu, _addr: u16, kind: CallbackKind| {
        match kind {
            CallbackKind::Read => Ok(rng.borrow_mut().next()),
            _ => Ok(0),
        }
    }));
    bus.borrow_mut().add_callback(RANDOM, CallbackType::Read, random_cb);

    // 130XE bank switching (grounded on hw.c's sim_pia -> sim65_swap_bank):
    // writes to PORTB select which 16 KiB bank is mapped at $4000-$7FFF.
    // Extended banks are staged as plain RAM ahead of time by whoever sets
    // up the 130XE memory map; this callback only performs the swap.
    let portb_cb: Rc<RefCell<crate::memory::CallbackFn>> = Rc::new(RefCell::new(|cpu: &mut Cpu, _addr: u16, kind: CallbackKind| {
        if let CallbackKind::Write(val) = kind {
            let bank = ((val >> 2) & 0x0F) as usize;
            if val & 0x10 == 0 {
                let other = 0x1_0000 + bank * 0x4000;
                cpu.bus.borrow_mut().swap_bank(0x4000, other, 0x4000);
            }
        }
        Ok(0)
    }));
    bus.borrow_mut().add_callback(PORTB, CallbackType::Write, portb_cb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;

    #[test]
    fn random_register_reads_vary() {
        let bus: BusPtr = Rc::new(RefCell::new(AddressSpace::new()));
        install(&bus);
        let mut cpu = Cpu::new(Rc::clone(&bus));
        let a = cpu.read_byte(RANDOM).unwrap();
        let b = cpu.read_byte(RANDOM).unwrap();
        assert_ne!(a, b);
    }
}
