//! Component D: the SIO serial/disk protocol layer.
//!
//! `original_source/src/atsio.c`'s actual body wasn't recoverable from the
//! retrieval pack, so this is built from the specification's description of
//! the DCB (Device Control Block) dispatch and the ATR disk-image format,
//! cross-checked against `ataridos.c`'s disk-sector arithmetic (128-byte
//! sectors, sector numbers starting at 1).

use crate::config::Configuration;
use crate::cpu::Cpu;
use crate::memory::{BusPtr, CallbackKind, CallbackType};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

pub const SECTOR_SIZE: usize = 128;

// DCB fields ($0300). DDEVIC/DBUFHI/DTIMLO/DBYTLO/DBYTHI/DAUX2 round out
// the real layout but aren't read by this simulator (single fixed device,
// sector-sized transfers, no timeout handling) - kept to document the
// block, not because this code touches them.
#[allow(dead_code)]
const DDEVIC: u16 = 0x0300;
const DUNIT: u16 = 0x0301;
const DCOMND: u16 = 0x0302;
const DSTATS: u16 = 0x0303;
const DBUFLO: u16 = 0x0304;
#[allow(dead_code)]
const DBUFHI: u16 = 0x0305;
#[allow(dead_code)]
const DTIMLO: u16 = 0x0306;
#[allow(dead_code)]
const DBYTLO: u16 = 0x0308;
#[allow(dead_code)]
const DBYTHI: u16 = 0x0309;
const DAUX1: u16 = 0x030A;
#[allow(dead_code)]
const DAUX2: u16 = 0x030B;

// SIO commands (§4.D).
pub const CMD_READ: u8 = 0x52; // 'R'
pub const CMD_WRITE: u8 = 0x57; // 'W'
pub const CMD_WRITE_VERIFY: u8 = 0x50; // 'P'
pub const CMD_STATUS: u8 = 0x53; // 'S'
pub const CMD_FORMAT: u8 = 0x21; // '!'

pub const STATUS_SUCCESS: u8 = 1;
pub const STATUS_TIMEOUT: u8 = 138;
pub const STATUS_DEVICE_NAK: u8 = 139;
// Part of the real status taxonomy; this simulator reports NAK for every
// sector-range fault instead of distinguishing a checksum mismatch.
#[allow(dead_code)]
pub const STATUS_CHECKSUM: u8 = 143;
pub const STATUS_FRAME_ERROR: u8 = 142;

// Disk bus device ID; any other DDEVIC value gets a timeout (§4.D).
const DEVICE_DISK: u8 = 0x31;

// Status-block byte 0 bits (§4.D's "active | double-density-flag").
const STATUS_BIT_ACTIVE: u8 = 0x10;
const STATUS_BIT_DOUBLE_DENSITY: u8 = 0x20;

pub const SIOV_ADDR: u16 = 0xE459;

/// Parsed ATR disk image: 16-byte header + sector data. §4.D's "three short
/// sectors" rule: sectors 1-3 are always 128 bytes even when the image's
/// declared sector size is 256, because DOS 2's boot sector format predates
/// double density.
pub struct DiskImage {
    sector_size: usize,
    data: Vec<u8>,
}

impl DiskImage {
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let raw = fs::read(path)?;
        if raw.len() < 16 || raw[0] != 0x96 || raw[1] != 0x02 {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad ATR signature"));
        }
        let paragraphs = u16::from_le_bytes([raw[2], raw[3]]) as usize | ((raw[6] as usize) << 17);
        let sector_size = u16::from_le_bytes([raw[4], raw[5]]) as usize;
        let total_bytes = paragraphs * 16;
        let data = raw[16..16 + total_bytes.min(raw.len() - 16)].to_vec();
        Ok(DiskImage { sector_size, data })
    }

    pub fn new_blank(sector_size: usize, num_sectors: usize) -> Self {
        DiskImage { sector_size, data: vec![0u8; sector_size * num_sectors] }
    }

    fn sector_size_for(&self, sector: u16) -> usize {
        if sector <= 3 {
            SECTOR_SIZE
        } else {
            self.sector_size
        }
    }

    fn offset_for(&self, sector: u16) -> usize {
        if sector <= 3 {
            (sector as usize - 1) * SECTOR_SIZE
        } else {
            3 * SECTOR_SIZE + (sector as usize - 4) * self.sector_size
        }
    }

    pub fn read_sector(&self, sector: u16) -> Option<&[u8]> {
        if sector == 0 {
            return None;
        }
        let off = self.offset_for(sector);
        let len = self.sector_size_for(sector);
        self.data.get(off..off + len)
    }

    pub fn write_sector(&mut self, sector: u16, buf: &[u8]) -> bool {
        if sector == 0 {
            return false;
        }
        let off = self.offset_for(sector);
        let len = self.sector_size_for(sector).min(buf.len());
        match self.data.get_mut(off..off + len) {
            Some(slice) => {
                slice.copy_from_slice(&buf[..len]);
                true
            }
            None => false,
        }
    }

    pub fn num_sectors(&self) -> usize {
        if self.data.len() <= 3 * SECTOR_SIZE {
            self.data.len() / SECTOR_SIZE
        } else {
            3 + (self.data.len() - 3 * SECTOR_SIZE) / self.sector_size
        }
    }
}

pub struct Sio {
    pub drives: [Option<DiskImage>; 8],
}

impl Sio {
    pub fn new() -> Self {
        Sio { drives: Default::default() }
    }

    pub fn mount(&mut self, drive: usize, image: DiskImage) {
        if drive < 8 {
            self.drives[drive] = Some(image);
        }
    }

    /// Runs one DCB-driven SIO transaction, honoring §4.D's device/unit
    /// fields (DDEVIC $31 is the disk bus, DUNIT 1-8 is the drive number).
    /// Only DDEVIC $31 is implemented; any other device ID times out
    /// without touching a drive, sector 0 and out-of-range sectors NAK.
    pub fn dispatch(&mut self, cpu: &mut Cpu) -> u8 {
        let device = cpu.bus.borrow().get_byte(DDEVIC).unwrap_or(DEVICE_DISK);
        let unit = cpu.bus.borrow().get_byte(DUNIT).unwrap_or(1);
        let command = cpu.bus.borrow().get_byte(DCOMND).unwrap_or(0);
        let sector = cpu.bus.borrow().dpeek(DAUX1);
        let buf_addr = cpu.bus.borrow().dpeek(DBUFLO);

        let drive_idx = unit.saturating_sub(1) as usize;
        let status = if device != DEVICE_DISK {
            STATUS_TIMEOUT
        } else {
            match command {
                CMD_STATUS => match self.drives.get(drive_idx).and_then(|d| d.as_ref()) {
                    Some(disk) => {
                        let dd_flag = if disk.sector_size > SECTOR_SIZE { STATUS_BIT_DOUBLE_DENSITY } else { 0 };
                        let block = [STATUS_BIT_ACTIVE | dd_flag, 0xFF, 0xE0, 0];
                        for (i, &b) in block.iter().enumerate() {
                            let _ = cpu.write_byte(buf_addr.wrapping_add(i as u16), b);
                        }
                        STATUS_SUCCESS
                    }
                    None => STATUS_DEVICE_NAK,
                },
                CMD_READ => {
                    if sector == 0 {
                        STATUS_DEVICE_NAK
                    } else {
                        match self.drives.get(drive_idx).and_then(|d| d.as_ref()) {
                            Some(disk) => match disk.read_sector(sector) {
                                Some(data) => {
                                    let data = data.to_vec();
                                    for (i, &b) in data.iter().enumerate() {
                                        let _ = cpu.write_byte(buf_addr.wrapping_add(i as u16), b);
                                    }
                                    STATUS_SUCCESS
                                }
                                None => STATUS_DEVICE_NAK,
                            },
                            None => STATUS_DEVICE_NAK,
                        }
                    }
                }
                CMD_WRITE | CMD_WRITE_VERIFY => {
                    if sector == 0 {
                        STATUS_DEVICE_NAK
                    } else {
                        match self.drives.get_mut(drive_idx).and_then(|d| d.as_mut()) {
                            Some(disk) => {
                                let size = disk.sector_size_for(sector);
                                let mut buf = vec![0u8; size];
                                for (i, slot) in buf.iter_mut().enumerate() {
                                    *slot = cpu.bus.borrow().get_byte(buf_addr.wrapping_add(i as u16)).unwrap_or(0);
                                }
                                if disk.write_sector(sector, &buf) {
                                    STATUS_SUCCESS
                                } else {
                                    STATUS_DEVICE_NAK
                                }
                            }
                            None => STATUS_DEVICE_NAK,
                        }
                    }
                }
                CMD_FORMAT => match self.drives.get_mut(drive_idx).and_then(|d| d.as_mut()) {
                    Some(disk) => {
                        for b in disk.data.iter_mut() {
                            *b = 0;
                        }
                        STATUS_SUCCESS
                    }
                    None => STATUS_DEVICE_NAK,
                },
                _ => STATUS_FRAME_ERROR,
            }
        };

        let _ = cpu.write_byte(DSTATS, status);
        cpu.regs.y = status;
        status
    }
}

impl Default for Sio {
    fn default() -> Self {
        Self::new()
    }
}

pub fn install(bus: &BusPtr, _config: &Configuration) -> Rc<RefCell<Sio>> {
    let sio = Rc::new(RefCell::new(Sio::new()));
    let sio_for_cb = Rc::clone(&sio);
    let cb: Rc<RefCell<crate::memory::CallbackFn>> = Rc::new(RefCell::new(move |cpu: &mut Cpu, _addr: u16, kind: CallbackKind| {
        if let CallbackKind::Exec = kind {
            sio_for_cb.borrow_mut().dispatch(cpu);
        }
        Ok(0)
    }));
    bus.borrow_mut().add_callback(SIOV_ADDR, CallbackType::Exec, cb);
    sio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_short_sectors_then_double_density() {
        let disk = DiskImage::new_blank(256, 10);
        assert_eq!(disk.sector_size_for(1), SECTOR_SIZE);
        assert_eq!(disk.sector_size_for(3), SECTOR_SIZE);
        assert_eq!(disk.sector_size_for(4), 256);
        assert_eq!(disk.offset_for(4), 3 * SECTOR_SIZE);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut disk = DiskImage::new_blank(128, 10);
        let payload = vec![0xAB; SECTOR_SIZE];
        assert!(disk.write_sector(5, &payload));
        assert_eq!(disk.read_sector(5).unwrap(), payload.as_slice());
    }
}
