//! Canonical CBOR helpers and stable SHA-256 hashing used for publications and fingerprints.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use serde_cbor::value::Value as CborValue;
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix for serialized hashes (e.g. `sha256:deadbeef`).
pub const HASH_PREFIX: &str = "sha256:";

/// Serialize a value into canonical CBOR bytes using RFC 8949 deterministic rules.
///
/// Going through [`CborValue`] sorts map keys.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let canonical_value: CborValue = serde_cbor::value::to_value(value)?;
    let mut buf = Vec::with_capacity(256);
    let mut serializer = serde_cbor::ser::Serializer::new(&mut buf);
    serializer.self_describe()?;
    canonical_value.serialize(&mut serializer)?;
    Ok(buf)
}

/// Decode a value previously written with [`to_canonical_cbor`].
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_cbor::Error> {
    serde_cbor::from_slice(bytes)
}

/// Wrapper around a 32-byte SHA-256 digest.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Compute the hash of the provided byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        Hash(arr)
    }

    /// Fold another digest into this one, lane by lane with wrapping addition.
    ///
    /// The fold is commutative, so an aggregate built from many digests does not
    /// depend on the order they were folded in.
    pub fn fold(self, other: Hash) -> Hash {
        let mut out = [0u8; 32];
        for lane in 0..4 {
            let range = lane * 8..lane * 8 + 8;
            let mut a = [0u8; 8];
            let mut b = [0u8; 8];
            a.copy_from_slice(&self.0[range.clone()]);
            b.copy_from_slice(&other.0[range.clone()]);
            let sum = u64::from_le_bytes(a).wrapping_add(u64::from_le_bytes(b));
            out[range].copy_from_slice(&sum.to_le_bytes());
        }
        Hash(out)
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a `sha256:...` hex string.
    pub fn to_hex(&self) -> String {
        format!("{HASH_PREFIX}{}", hex::encode(self.0))
    }

    /// Parse a hash from its `sha256:`-prefixed hex string representation.
    pub fn from_hex_str(s: &str) -> Result<Self, HashParseError> {
        let rest = s.strip_prefix(HASH_PREFIX).ok_or(HashParseError::MissingPrefix)?;
        if rest.len() != 64 {
            return Err(HashParseError::InvalidLength(rest.len()));
        }
        let mut buf = [0u8; 32];
        hex::decode_to_slice(rest, &mut buf).map_err(HashParseError::InvalidHex)?;
        Ok(Hash(buf))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Hashes travel as their `sha256:` string so publications stay readable.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a `sha256:` string is malformed.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("hash string missing '{HASH_PREFIX}' prefix")]
    MissingPrefix,
    #[error("hash hex length must be 64, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
