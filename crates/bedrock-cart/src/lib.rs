//! Cartridge bridge: turns a ROM image plus an optional save image into an
//! owned cartridge object the emulation core can consume.
//!
//! Parsing is pure with respect to global state, and the image never aliases
//! caller memory: both the ROM and the save bytes are copied before header
//! validation, so the caller may free its buffers as soon as the call
//! returns. Malformed input yields a typed error, never a partially
//! constructed image.
#![forbid(unsafe_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CartError>;

/// Minimum ROM size: through the extended header region.
pub const HEADER_LEN: usize = 0x160;
/// The header checksum covers everything before its own field at 0x15E.
const HEADER_CRC_OFFSET: usize = 0x15E;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("rom too short for a header ({len} bytes, need {HEADER_LEN})")]
    TooShort { len: usize },

    #[error("header checksum mismatch (expected {expected:#06x}, found {found:#06x})")]
    BadChecksum { expected: u16, found: u16 },

    #[error("declared capacity shift {shift} is out of range")]
    BadCapacity { shift: u8 },
}

/// Fields parsed out of the cartridge header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: [u8; 12],
    pub game_code: [u8; 4],
    pub maker_code: [u8; 2],
    pub unit_code: u8,
    pub capacity_shift: u8,
    pub header_crc: u16,
}

impl CartridgeHeader {
    /// Chip capacity in bytes declared by the header (128 KiB << shift).
    pub fn declared_capacity(&self) -> u64 {
        (128 * 1024) << u64::from(self.capacity_shift)
    }
}

/// A parsed cartridge owning copies of its ROM and save data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeImage {
    header: CartridgeHeader,
    rom: Vec<u8>,
    save: Vec<u8>,
}

impl CartridgeImage {
    /// Validates `rom` and builds an image. `save` seeds the persistent
    /// storage; absent means the cartridge starts with empty storage.
    pub fn parse(rom: &[u8], save: Option<&[u8]>) -> Result<Self> {
        // Own the save bytes up front; later mutation of the image must
        // never touch caller memory.
        let save = save.map(<[u8]>::to_vec).unwrap_or_default();

        if rom.len() < HEADER_LEN {
            return Err(CartError::TooShort { len: rom.len() });
        }

        let expected = u16::from_le_bytes([rom[HEADER_CRC_OFFSET], rom[HEADER_CRC_OFFSET + 1]]);
        let found = crc16(&rom[..HEADER_CRC_OFFSET]);
        if found != expected {
            return Err(CartError::BadChecksum { expected, found });
        }

        let capacity_shift = rom[0x14];
        if capacity_shift > 16 {
            return Err(CartError::BadCapacity {
                shift: capacity_shift,
            });
        }

        let mut title = [0u8; 12];
        title.copy_from_slice(&rom[0x00..0x0C]);
        let mut game_code = [0u8; 4];
        game_code.copy_from_slice(&rom[0x0C..0x10]);
        let mut maker_code = [0u8; 2];
        maker_code.copy_from_slice(&rom[0x10..0x12]);

        Ok(Self {
            header: CartridgeHeader {
                title,
                game_code,
                maker_code,
                unit_code: rom[0x12],
                capacity_shift,
                header_crc: expected,
            },
            rom: rom.to_vec(),
            save,
        })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn save_data(&self) -> &[u8] {
        &self.save
    }

    /// Applies a save write-back from the core.
    ///
    /// `data` is the core's view of the whole save chip. A size change
    /// replaces the stored copy wholesale; otherwise only the written window
    /// is copied, wrapping past the end of the chip the way the EEPROM
    /// address counter does.
    pub fn write_save(&mut self, data: &[u8], write_offset: usize, write_len: usize) {
        if data.len() != self.save.len() {
            self.save = data.to_vec();
        } else if write_offset + write_len <= data.len() {
            self.save[write_offset..][..write_len]
                .copy_from_slice(&data[write_offset..][..write_len]);
        } else {
            self.save[write_offset..].copy_from_slice(&data[write_offset..]);
            let wrapped = (write_offset + write_len - data.len()).min(data.len());
            self.save[..wrapped].copy_from_slice(&data[..wrapped]);
        }
    }
}

/// CRC-16 (poly 0xA001, init 0xFFFF), the checksum the header carries.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}
