//! Concatenated hash lists
//!
//! Each hash is written as its raw bytes (not the byte-reversed display
//! form), back to back with no separators, then hex encoded.

use crate::error::CodecError;
use strata_common::Hash;

pub fn encode_concatenated_hashes<const N: usize>(hashes: &[Hash<N>]) -> String {
    let mut bytes = Vec::with_capacity(hashes.len() * N);
    for hash in hashes {
        bytes.extend_from_slice(hash.as_ref());
    }
    hex::encode(bytes)
}

pub fn decode_concatenated_hashes<const N: usize>(
    encoded: &str,
) -> Result<Vec<Hash<N>>, CodecError> {
    if N == 0 {
        return Err(CodecError::ZeroHashWidth);
    }
    let bytes = hex::decode(encoded)?;
    if bytes.len() % N != 0 {
        return Err(CodecError::InvalidHashesLength {
            len: bytes.len(),
            width: N,
        });
    }

    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            Hash::new(raw)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use strata_common::BlockHash;

    // Raw byte encodings (not display form) of the first four blocks of a
    // production chain.
    const RAW_HASHES: [&str; 4] = [
        "80d9212bf4ceb066ded2866b39d4ed89e0ab60f335c11df8e7bf85d9c35c8e29",
        "b926d1870d6f88760a8b10db0d4439e5cd74f3827fd4b6827443000000000000",
        "badcb8e5c1e895e8e8fef8d3425fa0bfe9d28fdbf72f871910c4000000000000",
        "f51cbd277f632f5996eca05d48b0a357d74d42f4a0513f3eac08010000000000",
    ];

    fn raw_hash(s: &str) -> BlockHash {
        let bytes = hex::decode(s).unwrap();
        BlockHash::try_from(bytes.as_slice()).unwrap()
    }

    #[test]
    fn encode_zero_hashes_is_empty() {
        assert_eq!(encode_concatenated_hashes::<32>(&[]), "");
    }

    #[test]
    fn encode_matches_joined_raw_hex() {
        for n in 0..=RAW_HASHES.len() {
            let subset = &RAW_HASHES[..n];
            let hashes: Vec<BlockHash> = subset.iter().map(|s| raw_hash(s)).collect();
            assert_eq!(encode_concatenated_hashes(&hashes), subset.concat());
        }
    }

    #[test]
    fn decode_display_form_hashes() {
        let expected: Vec<BlockHash> = [
            "298e5cc3d985bfe7f81dc135f360abe089edd4396b86d2de66b0cef42b21d980",
            "000000000000437482b6d47f82f374cde539440ddb108b0a76886f0d87d126b9",
            "000000000000c41019872ff7db8fd2e9bfa05f42d3f8fee8e895e8c1e5b8dcba",
        ]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

        let mut raw = Vec::new();
        for hash in &expected {
            raw.extend_from_slice(hash.as_ref());
        }

        let decoded: Vec<BlockHash> = decode_concatenated_hashes(&hex::encode(raw)).unwrap();
        assert_eq!(decoded, expected);
        assert_eq!(decoded[0], raw_hash(RAW_HASHES[0]));
    }

    #[test]
    fn decode_rejects_partial_hash() {
        let mut encoded = RAW_HASHES[..2].concat();
        encoded.truncate(encoded.len() - 2);
        assert_eq!(
            decode_concatenated_hashes::<32>(&encoded),
            Err(CodecError::InvalidHashesLength { len: 63, width: 32 })
        );

        let long = format!("{}00", RAW_HASHES[0]);
        assert!(decode_concatenated_hashes::<32>(&long).is_err());
    }

    #[test]
    fn decode_rejects_bad_hex() {
        assert!(matches!(
            decode_concatenated_hashes::<32>("zz"),
            Err(CodecError::InvalidHex(_))
        ));
    }

    #[test]
    fn decode_rejects_zero_width() {
        assert_eq!(decode_concatenated_hashes::<0>("00"), Err(CodecError::ZeroHashWidth));
        assert_eq!(decode_concatenated_hashes::<0>(""), Err(CodecError::ZeroHashWidth));
    }

    #[quickcheck]
    fn concatenated_hashes_round_trip(seeds: Vec<Vec<u8>>) -> bool {
        let hashes: Vec<BlockHash> = seeds.iter().map(|s| BlockHash::digest(s)).collect();
        decode_concatenated_hashes::<32>(&encode_concatenated_hashes(&hashes)).ok() == Some(hashes)
    }
}
