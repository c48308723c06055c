//! Savestate codec bridge.
//!
//! Serializes the full mutable state of an emulation core into one
//! self-describing byte buffer and restores it. The internal layout of the
//! state payload is owned by the core (via [`StateSource`]/[`StateTarget`]);
//! this layer adds a version-tagged envelope with a checksum and optional
//! lz4 block compression, validates the entire envelope before touching the
//! target, and guarantees a byte-exact round trip. The encoding carries no
//! raw pointers or host padding, so a buffer produced on one host restores
//! on another; the same bridge moves state between two live cores for
//! netplay hand-off.
#![forbid(unsafe_code)]

mod error;

pub use error::{Result, SavestateError};

pub const SAVESTATE_MAGIC: &[u8; 8] = b"BRKSTATE";
pub const SAVESTATE_VERSION: u16 = 1;

const FLAG_LZ4: u8 = 1 << 0;
const HEADER_LEN: usize = 8 + 2 + 1 + 1 + 4 + 8 + 8;
/// Upper bound on a decoded state payload; anything larger is treated as a
/// corrupt declared length rather than an allocation request.
const MAX_STATE_LEN: u64 = 1 << 30;

/// Exports the core's complete mutable state as one opaque payload.
pub trait StateSource {
    /// Appends the state payload to `out`. On failure nothing may have been
    /// observable side effects on the core; the bridge discards `out`.
    fn export_state(&self, out: &mut Vec<u8>) -> Result<()>;
}

/// Replaces the core's complete mutable state from one opaque payload.
pub trait StateTarget {
    /// Applies a fully validated payload. Implementations must be
    /// transactional: on failure the core keeps its prior state (the usual
    /// shape is "parse everything, then commit").
    fn import_state(&mut self, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub compress: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// Serializes `source` into a self-describing buffer.
pub fn write_savestate<S: StateSource>(source: &S, options: SaveOptions) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    source.export_state(&mut payload)?;

    let crc = crc32fast::hash(&payload);
    let raw_len = payload.len() as u64;

    let (stored, flags) = if options.compress {
        let compressed = lz4_flex::block::compress(&payload);
        if compressed.len() < payload.len() {
            (compressed, FLAG_LZ4)
        } else {
            // Incompressible payloads are stored raw; length wins over flag purity.
            (payload, 0)
        }
    } else {
        (payload, 0)
    };

    let mut out = Vec::with_capacity(HEADER_LEN + stored.len());
    out.extend_from_slice(SAVESTATE_MAGIC);
    out.extend_from_slice(&SAVESTATE_VERSION.to_le_bytes());
    out.push(flags);
    out.push(0); // reserved
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&raw_len.to_le_bytes());
    out.extend_from_slice(&(stored.len() as u64).to_le_bytes());
    out.extend_from_slice(&stored);
    Ok(out)
}

/// Boundary shim: the core-facing call returns an empty buffer on failure
/// rather than a partial one.
pub fn write_savestate_or_empty<S: StateSource>(source: &S, options: SaveOptions) -> Vec<u8> {
    match write_savestate(source, options) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%err, "savestate serialization failed");
            Vec::new()
        }
    }
}

/// Deserializes `bytes` into `target`.
///
/// The whole envelope (magic, version, lengths, decompression, checksum) is
/// validated before `target` is touched, so a corrupt or truncated buffer
/// leaves the core in its prior state.
pub fn read_savestate<T: StateTarget>(target: &mut T, bytes: &[u8]) -> Result<()> {
    let payload = decode_payload(bytes)?;
    target.import_state(&payload)
}

fn decode_payload(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.take(8)?;
    if magic != SAVESTATE_MAGIC {
        return Err(SavestateError::InvalidMagic);
    }
    let version = reader.take_u16()?;
    if version != SAVESTATE_VERSION {
        return Err(SavestateError::UnsupportedVersion(version));
    }
    let flags = reader.take_u8()?;
    if flags & !FLAG_LZ4 != 0 {
        return Err(SavestateError::UnsupportedFlags(flags));
    }
    let _reserved = reader.take_u8()?;
    let crc = reader.take_u32()?;
    let raw_len = reader.take_u64()?;
    let stored_len = reader.take_u64()?;

    if raw_len > MAX_STATE_LEN {
        return Err(SavestateError::Corrupt("declared state length too large"));
    }
    let stored_len_usize =
        usize::try_from(stored_len).map_err(|_| SavestateError::Corrupt("stored length"))?;
    let stored = reader.take(stored_len_usize)?;
    if !reader.is_empty() {
        return Err(SavestateError::Corrupt("trailing bytes after payload"));
    }

    let payload = if flags & FLAG_LZ4 != 0 {
        let expected =
            usize::try_from(raw_len).map_err(|_| SavestateError::Corrupt("raw length"))?;
        let decompressed = lz4_flex::block::decompress(stored, expected)?;
        if decompressed.len() as u64 != raw_len {
            return Err(SavestateError::LengthMismatch {
                declared: raw_len,
                found: decompressed.len() as u64,
            });
        }
        decompressed
    } else {
        if stored_len != raw_len {
            return Err(SavestateError::LengthMismatch {
                declared: raw_len,
                found: stored_len,
            });
        }
        stored.to_vec()
    };

    let found = crc32fast::hash(&payload);
    if found != crc {
        return Err(SavestateError::ChecksumMismatch {
            expected: crc,
            found,
        });
    }
    Ok(payload)
}

struct ByteReader<'a> {
    rest: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.rest.len() < len {
            return Err(SavestateError::Truncated);
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn take_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}
