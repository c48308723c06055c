use thiserror::Error;

pub type Result<T> = std::result::Result<T, SavestateError>;

#[derive(Debug, Error)]
pub enum SavestateError {
    #[error("invalid savestate magic")]
    InvalidMagic,

    #[error("unsupported savestate version {0}")]
    UnsupportedVersion(u16),

    #[error("unsupported savestate flags {0:#04x}")]
    UnsupportedFlags(u8),

    #[error("truncated savestate buffer")]
    Truncated,

    #[error("savestate checksum mismatch (expected {expected:#010x}, found {found:#010x})")]
    ChecksumMismatch { expected: u32, found: u32 },

    #[error("savestate length mismatch (declared {declared} bytes, found {found} bytes)")]
    LengthMismatch { declared: u64, found: u64 },

    #[error("corrupt savestate: {0}")]
    Corrupt(&'static str),

    #[error("lz4 decompression failed: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    /// The core was in a non-serializable transient state; nothing was
    /// written.
    #[error("state not serializable: {0}")]
    Unserializable(&'static str),
}
