//! Concatenated vote bits records
//!
//! Each record is a one-byte length covering the rest of the record, the
//! 16-bit vote bits in little-endian order, then the extended vote bits.
//! The whole byte stream is hex encoded.

use crate::error::CodecError;
use strata_common::VoteBits;

/// Size of the fixed `bits` field.
pub const VOTE_BITS_SIZE: usize = 2;

/// Largest payload expressible as a single-byte script push.
pub const MAX_SINGLE_BYTE_PUSH_LENGTH: usize = 75;

/// Largest extended vote bits field.
pub const MAX_EXTENDED_VOTE_BITS: usize = MAX_SINGLE_BYTE_PUSH_LENGTH - VOTE_BITS_SIZE;

pub fn encode_concatenated_vote_bits(records: &[VoteBits]) -> Result<String, CodecError> {
    let mut bytes = Vec::new();
    for record in records {
        let len = record.extended_bits.len();
        if len > MAX_EXTENDED_VOTE_BITS {
            return Err(CodecError::ExtendedBitsTooLong {
                len,
                max: MAX_EXTENDED_VOTE_BITS,
            });
        }

        // Bounded by MAX_SINGLE_BYTE_PUSH_LENGTH above.
        bytes.push((VOTE_BITS_SIZE + len) as u8);
        bytes.extend_from_slice(&record.bits.to_le_bytes());
        bytes.extend_from_slice(&record.extended_bits);
    }
    Ok(hex::encode(bytes))
}

pub fn decode_concatenated_vote_bits(encoded: &str) -> Result<Vec<VoteBits>, CodecError> {
    let bytes = hex::decode(encoded)?;
    let mut records = Vec::new();
    let mut cursor = 0;

    while cursor < bytes.len() {
        let offset = cursor;
        let declared = bytes[cursor] as usize;
        cursor += 1;

        if declared < VOTE_BITS_SIZE {
            return Err(CodecError::RecordTooShort {
                offset,
                declared,
                min: VOTE_BITS_SIZE,
            });
        }
        if declared > MAX_SINGLE_BYTE_PUSH_LENGTH {
            return Err(CodecError::RecordTooLong {
                offset,
                declared,
                max: MAX_SINGLE_BYTE_PUSH_LENGTH,
            });
        }

        let available = bytes.len() - cursor;
        if declared > available {
            return Err(CodecError::ShortRead {
                offset,
                needed: declared,
                available,
            });
        }

        let record = &bytes[cursor..cursor + declared];
        records.push(VoteBits {
            bits: u16::from_le_bytes([record[0], record[1]]),
            extended_bits: record[VOTE_BITS_SIZE..].to_vec(),
        });
        cursor += declared;
    }

    Ok(records)
}
