//! Component E: the minimal DOS personality.
//!
//! Grounded on `original_source/src/ataridos.c`: `sim_DOS_CRNAME` (command
//! processor run-filename extraction), `sim_DOS_COMTAB` (the COMTAB/DOSCP
//! jump-stub dispatch), `atari_dos_add_cmdline` (staging a command line for
//! AUTORUN.SYS-style boot), and `atari_dos_set_root`/`atari_dos_init`
//! (host-filesystem sandboxing under one root directory).

use crate::cpu::Cpu;
use crate::memory::{BusPtr, CallbackKind};
use crate::sio::Sio;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const DOSVEC: u16 = 0x000A;
const DOSINI: u16 = 0x000C;

/// Six 1-byte-apart exec-callback targets, each backed by an RTS so a plain
/// `JMP DOSCP_BASE+n` from COMTAB reaches it.
pub const DOSCP_BASE: u16 = 0xE540;
const DOS_CP: u16 = DOSCP_BASE;
const DOS_CRNAME: u16 = DOSCP_BASE + 1;
const DOS_DIVIO: u16 = DOSCP_BASE + 2;
const DOS_XDIVIO: u16 = DOSCP_BASE + 3;
const DOS_LSIO: u16 = DOSCP_BASE + 4;
const DOS_CONVDC: u16 = DOSCP_BASE + 5;

/// The structured command table DOSVEC points at: two JMP stubs (CP,
/// CRNAME), two raw vector words (DIVIO, XDIVIO), a buffer-offset byte, a
/// 28-byte run-filename buffer, and a 64-byte command-line buffer.
pub const COMTAB_BASE: u16 = 0xE550;
const DOS_BUFOFF: u16 = COMTAB_BASE + 10;
pub const DOS_COMFNM: u16 = COMTAB_BASE + 33;
pub const DOS_LBUF: u16 = COMTAB_BASE + 63;

const EOL: u8 = 0x9B;

pub struct Dos {
    pub root_path: PathBuf,
}

impl Dos {
    pub fn new(root_path: PathBuf) -> Self {
        Dos { root_path }
    }

    /// Stages DOSVEC/COMTAB the way `atari_dos_init` does: JMP stubs for
    /// CP/CRNAME, raw vectors for DIVIO/XDIVIO/LSIO/CONVDC, and the initial
    /// "D:" + EOL command line.
    pub fn init(&self, bus: &BusPtr) {
        let mut b = bus.borrow_mut();
        b.dpoke(DOSVEC, COMTAB_BASE);
        b.dpoke(DOSINI, 0);
        b.dpoke(COMTAB_BASE.wrapping_sub(10), DOS_LSIO);
        b.dpoke(COMTAB_BASE.wrapping_sub(6), DOS_CONVDC);
        b.poke(COMTAB_BASE, 0x4C); // JMP
        b.dpoke(COMTAB_BASE + 1, DOS_CP);
        b.poke(COMTAB_BASE + 3, 0x4C); // JMP
        b.dpoke(COMTAB_BASE + 4, DOS_CRNAME);
        b.dpoke(COMTAB_BASE + 6, DOS_DIVIO);
        b.dpoke(COMTAB_BASE + 8, DOS_XDIVIO);
        b.add_zeroed_ram(COMTAB_BASE + 32, 94);
        b.poke(DOS_BUFOFF, 2);
        b.poke(DOS_LBUF, b'D');
        b.poke(DOS_LBUF + 1, b':');
        b.poke(DOS_LBUF + 2, EOL);
    }

    /// Installs the COMTAB/DOSCP exec-callback stubs. Takes `sio` so the
    /// LSIO entry can run an SIO transaction directly: redirecting PC into
    /// SIOV's own trap the way the real ROM's `JMP SIOV` would doesn't work
    /// here, since our RTS-backed trap convention executes a literal RTS
    /// right after the callback returns, which would pop the stack instead
    /// of ever reaching SIOV's own callback. Calling `Sio::dispatch` inline
    /// and falling through to DOS_LSIO's own RTS is observably identical:
    /// the transaction runs, then control returns to whoever JSR'd in.
    pub fn install(bus: &BusPtr, sio: &Rc<RefCell<Sio>>) {
        let sio = Rc::clone(sio);
        let cb: Rc<RefCell<crate::memory::CallbackFn>> =
            Rc::new(RefCell::new(move |cpu: &mut Cpu, addr: u16, kind: CallbackKind| {
                if let CallbackKind::Exec = kind {
                    match addr.wrapping_sub(DOSCP_BASE) {
                        0 => {
                            log::debug!("DOS CP: exit");
                            return Err(-1);
                        }
                        1 => crname(&cpu.bus),
                        2 => log::debug!("DOS DIVIO"),
                        3 => log::debug!("DOS XDIVIO"),
                        4 => {
                            log::debug!("DOS LSIO");
                            sio.borrow_mut().dispatch(cpu);
                        }
                        5 => log::debug!("DOS CONVDC"),
                        _ => log::debug!("invalid DOS call at ${:04X}", addr),
                    }
                }
                Ok(0)
            }));
        bus.borrow_mut().add_rts_callback(DOSCP_BASE, 6, cb);
    }

    /// Stages a command line the way `atari_dos_add_cmdline` does: the
    /// first call synthesizes a "D:PROGRAM" run-filename from `cmd`'s path
    /// stem (the part between the last path separator and the last `.`,
    /// uppercased and filtered to `[A-Z_]`); later calls append `cmd`
    /// verbatim as a space-separated literal argument.
    pub fn add_cmdline(&self, bus: &BusPtr, cmd: &str) {
        let mut b = bus.borrow_mut();
        let mut len = 0usize;
        for i in 0..64 {
            if b.get_byte(DOS_LBUF + i as u16) == Some(EOL) {
                len = i;
                break;
            }
        }

        if len < 3 {
            let bytes = cmd.as_bytes();
            let mut p0 = 0usize;
            let mut p1 = 0usize;
            let mut i = 0usize;
            loop {
                match bytes.get(i) {
                    Some(b'/') | Some(b'\\') => p0 = i + 1,
                    Some(b'.') => p1 = i,
                    None => break,
                    _ => {}
                }
                i += 1;
            }
            if p1 <= p0 {
                p1 = i;
            }

            len = 0;
            b.poke(DOS_LBUF, b'D');
            len += 1;
            b.poke(DOS_LBUF + 1, b':');
            len += 1;
            while len < 63 && p0 != p1 {
                let c = bytes[p0];
                p0 += 1;
                if c.is_ascii_lowercase() {
                    b.poke(DOS_LBUF + len as u16, c.to_ascii_uppercase());
                    len += 1;
                } else if c.is_ascii_uppercase() || c == b'_' {
                    b.poke(DOS_LBUF + len as u16, c);
                    len += 1;
                }
            }
            b.poke(DOS_LBUF + len as u16, EOL);
            b.poke(DOS_BUFOFF, len as u8);
        } else if len < 63 {
            b.poke(DOS_LBUF + len as u16, b' ');
            len += 1;
            for &byte in cmd.as_bytes() {
                if len >= 63 {
                    break;
                }
                b.poke(DOS_LBUF + len as u16, byte);
                len += 1;
            }
            b.poke(DOS_LBUF + len as u16, EOL);
        }
    }

    /// Resolves a DOS filename (`D1:FOO.COM`) against the sandboxed root,
    /// stripping the device/unit prefix the way `dosfname.c`'s `dosfopen`
    /// does, and refusing to escape the root via `..`.
    pub fn resolve(&self, dos_name: &str) -> Option<PathBuf> {
        let stripped = dos_name.trim_start_matches(|c: char| c == 'D' || c.is_ascii_digit() || c == ':');
        let candidate = Path::new(stripped);
        if candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return None;
        }
        Some(self.root_path.join(candidate))
    }
}

/// Ports `sim_DOS_CRNAME`: reads the next whitespace-delimited token out of
/// `DOS_LBUF` starting at `DOS_BUFOFF`, prepends "D1:" unless the token
/// already names a device, and writes the 28-byte, EOL-padded result to
/// `DOS_COMFNM`.
fn crname(bus: &BusPtr) {
    let mut b = bus.borrow_mut();
    let mut buf = [0u8; 256];
    buf[0] = b'D';
    buf[1] = b'1';
    buf[2] = b':';
    let mut off = b.get_byte(DOS_BUFOFF).unwrap_or(0) as u16;
    let mut dev = false;
    let mut arg = false;
    let mut len = 3usize;

    while (off as usize) < 64 && len < 27 {
        let c = b.get_byte(DOS_LBUF + off).unwrap_or(EOL);
        off += 1;
        if c == EOL {
            break;
        }
        if c == b' ' && !arg {
            continue;
        }
        if c == b' ' || c == EOL {
            break;
        }
        arg = true;
        if c == b':' && !dev {
            dev = true;
            len -= 3;
            for i in 0..len {
                buf[i] = buf[i + 3];
            }
        }
        buf[len] = c;
        len += 1;
    }

    b.poke(DOS_BUFOFF, off as u8);
    for (i, &byte) in buf[..len].iter().enumerate() {
        b.poke(DOS_COMFNM + i as u16, byte);
    }
    while len < 28 {
        b.poke(DOS_COMFNM + len as u16, EOL);
        len += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;

    fn bus() -> BusPtr {
        Rc::new(RefCell::new(AddressSpace::new()))
    }

    #[test]
    fn resolve_strips_device_prefix() {
        let dos = Dos::new(PathBuf::from("/tmp/atari_root"));
        let path = dos.resolve("D1:HELLO.COM").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/atari_root/HELLO.COM"));
    }

    #[test]
    fn resolve_refuses_parent_escape() {
        let dos = Dos::new(PathBuf::from("/tmp/atari_root"));
        assert!(dos.resolve("D1:../../etc/passwd").is_none());
    }

    #[test]
    fn init_stages_dosvec_and_initial_cmdline() {
        let bus = bus();
        let dos = Dos::new(PathBuf::from("."));
        dos.init(&bus);
        assert_eq!(bus.borrow().dpeek(DOSVEC), COMTAB_BASE);
        assert_eq!(bus.borrow().get_byte(DOS_LBUF), Some(b'D'));
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 1), Some(b':'));
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 2), Some(EOL));
    }

    #[test]
    fn add_cmdline_first_call_synthesizes_program_name() {
        let bus = bus();
        let dos = Dos::new(PathBuf::from("."));
        dos.init(&bus);
        dos.add_cmdline(&bus, "/host/path/game_one.xex");
        let mut out = Vec::new();
        for i in 0..16u16 {
            match bus.borrow().get_byte(DOS_LBUF + i) {
                Some(b) if b != EOL => out.push(b),
                _ => break,
            }
        }
        assert_eq!(out, b"D:GAME_ONE");
    }

    #[test]
    fn add_cmdline_second_call_appends_literal_argument() {
        let bus = bus();
        let dos = Dos::new(PathBuf::from("."));
        dos.init(&bus);
        dos.add_cmdline(&bus, "/host/path/game.xex");
        dos.add_cmdline(&bus, "-v");
        // first call synthesizes "D:GAME" (6 bytes, indices 0-5)
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 6), Some(b' '));
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 7), Some(b'-'));
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 8), Some(b'v'));
        assert_eq!(bus.borrow().get_byte(DOS_LBUF + 9), Some(EOL));
    }

    #[test]
    fn crname_extracts_first_token_with_d1_prefix() {
        let bus = bus();
        let dos = Dos::new(PathBuf::from("."));
        dos.init(&bus);
        // Simulate a command line typed straight into LBUF ("D:GAME"),
        // with BUFOFF left at its init-time value (2, right after "D:") the
        // way the real DOS command processor leaves it before calling
        // CRNAME to pull out the run filename.
        bus.borrow_mut().poke(DOS_LBUF + 2, b'G');
        bus.borrow_mut().poke(DOS_LBUF + 3, b'A');
        bus.borrow_mut().poke(DOS_LBUF + 4, b'M');
        bus.borrow_mut().poke(DOS_LBUF + 5, b'E');
        bus.borrow_mut().poke(DOS_LBUF + 6, EOL);
        crname(&bus);
        let mut out = Vec::new();
        for i in 0..28u16 {
            match bus.borrow().get_byte(DOS_COMFNM + i) {
                Some(b) if b != EOL => out.push(b),
                _ => break,
            }
        }
        assert_eq!(out, b"D1:GAME");
    }
}
