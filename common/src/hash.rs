use blake2::{digest::consts::U32, Blake2b, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::Deref, str::FromStr};

/// Fixed-width digest of `BYTES` bytes.
///
/// Hashes are stored in the byte order produced by the hash function.
/// Human-readable forms (`Display`, `FromStr`, serde) use the byte-reversed
/// hex convention of the chain explorer and RPC layer, so a block hash with
/// leading zero work bits prints with leading zeroes.
///
/// # Examples
///
/// ```ignore
/// use strata_common::BlockHash;
///
/// let hash: BlockHash =
///     "298e5cc3d985bfe7f81dc135f360abe089edd4396b86d2de66b0cef42b21d980".parse().unwrap();
/// assert_eq!(hash[0], 0x80);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const BYTES: usize>([u8; BYTES]);

impl<const BYTES: usize> Default for Hash<BYTES> {
    fn default() -> Self {
        Self::new([0u8; BYTES])
    }
}

impl<const BYTES: usize> Serialize for Hash<BYTES> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de, const BYTES: usize> Deserialize<'de> for Hash<BYTES> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<const BYTES: usize> Hash<BYTES> {
    /// Zero hash, used as the previous-block reference of genesis.
    pub const ZERO: Self = Self([0u8; BYTES]);

    #[inline]
    pub const fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    #[inline]
    pub fn into_inner(self) -> [u8; BYTES] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Hash<32> {
    /// BLAKE2b-256 digest of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// BLAKE2b-256 digest of the concatenation of two hashes, as used for
    /// interior merkle nodes.
    pub fn digest_pair(left: &Self, right: &Self) -> Self {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Self(hasher.finalize().into())
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for Hash<BYTES> {
    #[inline]
    fn from(bytes: [u8; BYTES]) -> Self {
        Self::new(bytes)
    }
}

impl<const BYTES: usize> TryFrom<&[u8]> for Hash<BYTES> {
    type Error = std::array::TryFromSliceError;

    /// Fails if the slice length is not `BYTES`.
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let hash: [u8; BYTES] = value.try_into()?;
        Ok(Self::new(hash))
    }
}

impl<const BYTES: usize> From<Hash<BYTES>> for [u8; BYTES] {
    fn from(hash: Hash<BYTES>) -> Self {
        hash.0
    }
}

impl<const BYTES: usize> AsRef<[u8]> for Hash<BYTES> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> Deref for Hash<BYTES> {
    type Target = [u8; BYTES];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const BYTES: usize> fmt::Debug for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("Hash<{BYTES}>")).field(&self.to_string()).finish()
    }
}

impl<const BYTES: usize> fmt::Display for Hash<BYTES> {
    /// Byte-reversed lowercase hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl<const BYTES: usize> FromStr for Hash<BYTES> {
    type Err = hex::FromHexError;

    /// Parses the byte-reversed hex form produced by `Display`.
    ///
    /// # Errors
    ///
    /// Fails if the string is not hex or does not decode to exactly `BYTES`
    /// bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self::new(bytes))
    }
}

/// Declares a type alias for a hash size.
#[macro_export]
macro_rules! declare_hash_type {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        pub type $name = $crate::hash::Hash<$size>;
    };
}

declare_hash_type!(
    /// Identity of a block: digest of its serialised header.
    BlockHash,
    32
);
declare_hash_type!(
    /// Identity of a transaction.
    TxHash,
    32
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_byte_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x80;
        bytes[31] = 0x29;
        let hash = BlockHash::new(bytes);
        let shown = hash.to_string();
        assert!(shown.starts_with("29"));
        assert!(shown.ends_with("80"));
        assert_eq!(shown.parse::<BlockHash>().unwrap(), hash);
    }

    #[test]
    fn from_str_wrong_length_fails() {
        assert!("0d8d00cdd465".parse::<BlockHash>().is_err());
        assert!("zz".parse::<Hash<1>>().is_err());
    }

    #[test]
    fn try_from_slice() {
        let bytes = vec![7u8; 32];
        let hash: BlockHash = bytes.as_slice().try_into().unwrap();
        assert_eq!(hash.as_ref(), bytes.as_slice());

        let short = vec![7u8; 31];
        assert!(BlockHash::try_from(short.as_slice()).is_err());
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(BlockHash::digest(b"strata"), BlockHash::digest(b"strata"));
        assert_ne!(BlockHash::digest(b"strata"), BlockHash::digest(b"strata2"));
        assert!(!BlockHash::digest(b"").is_zero());
        assert!(BlockHash::ZERO.is_zero());
    }

    #[test]
    fn serde_round_trips_through_display_form() {
        let hash = BlockHash::digest(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: BlockHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
