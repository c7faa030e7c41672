//! Proof-of-work targets and chain work.

use dashu_int::UBig;
use strata_common::{BlockHash, BlockHeader, ChainParams};

use crate::rule_error::{rule_error, ChainError, ErrorKind};

/// Expand a compact target. Returns `None` when the sign bit is set on a
/// non-zero mantissa.
pub fn compact_to_big(bits: u32) -> Option<UBig> {
    let mantissa = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0;
    let exponent = (bits >> 24) as usize;

    if negative && mantissa != 0 {
        return None;
    }

    let target = if exponent <= 3 {
        UBig::from(mantissa >> (8 * (3 - exponent)))
    } else {
        UBig::from(mantissa) << (8 * (exponent - 3))
    };
    Some(target)
}

/// Interpret a block hash as a little-endian number.
pub fn hash_to_big(hash: &BlockHash) -> UBig {
    UBig::from_le_bytes(hash.as_ref())
}

/// Expected number of hashes to find a block at `bits`.
pub fn calc_work(bits: u32) -> UBig {
    match compact_to_big(bits) {
        Some(target) if target != UBig::ZERO => (UBig::ONE << 256) / (target + UBig::ONE),
        _ => UBig::ZERO,
    }
}

/// Check that the header target is in range and, unless `skip_pow`, that
/// the header hash meets it.
pub fn check_proof_of_work(
    header: &BlockHeader,
    params: &ChainParams,
    skip_pow: bool,
) -> Result<(), ChainError> {
    let target = match compact_to_big(header.bits) {
        Some(t) if t != UBig::ZERO => t,
        _ => {
            return Err(rule_error(
                ErrorKind::UnexpectedDifficulty,
                format!("block target difficulty of {:08x} is not positive", header.bits),
            ))
        }
    };

    let limit = compact_to_big(params.pow_limit_bits).unwrap_or(UBig::ZERO);
    if target > limit {
        return Err(rule_error(
            ErrorKind::UnexpectedDifficulty,
            format!(
                "block target difficulty of {target:064x} is higher than max of {limit:064x}"
            ),
        ));
    }

    if !skip_pow {
        let hash = header.hash();
        let value = hash_to_big(&hash);
        if value > target {
            return Err(rule_error(
                ErrorKind::HighHash,
                format!("block hash of {hash} is higher than expected max of {target:064x}"),
            ));
        }
    }

    Ok(())
}
