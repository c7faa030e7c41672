use thiserror::Error;

/// Errors decoding or encoding RPC concatenation formats
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("hash width must be non-zero")]
    ZeroHashWidth,

    #[error("encoded hashes length {len} is not a multiple of {width}")]
    InvalidHashesLength { len: usize, width: usize },

    #[error("vote bits record at offset {offset} declares length {declared}, minimum is {min}")]
    RecordTooShort {
        offset: usize,
        declared: usize,
        min: usize,
    },

    #[error("vote bits record at offset {offset} declares length {declared}, maximum is {max}")]
    RecordTooLong {
        offset: usize,
        declared: usize,
        max: usize,
    },

    #[error("short read at offset {offset}: need {needed} bytes, have {available}")]
    ShortRead {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("extended vote bits of {len} bytes exceed maximum {max}")]
    ExtendedBitsTooLong { len: usize, max: usize },
}
