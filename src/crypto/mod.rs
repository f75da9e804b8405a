//! Per-sector key derivation for spool tags.
//!
//! Key derivation: HKDF-SHA256(ikm=tag_uid, salt=master_secret, info="RFID-A\0") → 96 bytes
//! Key layout:     16 consecutive 6-byte keys, sector 0 first
//!
//! The output is bit-exact and reproducible: the same UID and master secret
//! always yield the same key list.

use std::fmt;
use std::str::FromStr;

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;

/// Number of sectors (4-block groups) on a 1K tag.
pub const SECTOR_COUNT: usize = 16;
/// Byte length of one sector key.
pub const SECTOR_KEY_LEN: usize = 6;
/// Byte length of the master secret.
pub const MASTER_SECRET_LEN: usize = 16;
/// Accepted tag identifier lengths, inclusive.
pub const MIN_IDENTIFIER_LEN: usize = 4;
pub const MAX_IDENTIFIER_LEN: usize = 10;

/// HKDF context label.
const KDF_INFO: &[u8] = b"RFID-A\0";

const DEFAULT_MASTER: [u8; MASTER_SECRET_LEN] = [
    0x9A, 0x75, 0x9C, 0xF2, 0xC4, 0xF7, 0xCA, 0xFF,
    0x22, 0x2C, 0xB9, 0x76, 0x9B, 0x41, 0xBC, 0x96,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Tag identifier must be 4-10 bytes, got {0}")]
    InvalidIdentifierLength(usize),
    #[error("Master secret must be 16 bytes of hex: {0}")]
    InvalidMasterSecret(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
}

// ── MasterSecret ─────────────────────────────────────────────────────────────

/// The 16-byte salt every sector key is derived under.
///
/// `Default` yields the compiled-in secret; any other value is only useful
/// for testing alternate derivations.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MasterSecret([u8; MASTER_SECRET_LEN]);

impl MasterSecret {
    pub const fn new(bytes: [u8; MASTER_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse 32 hex characters (whitespace ignored).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&cleaned)
            .map_err(|e| CryptoError::InvalidMasterSecret(e.to_string()))?;
        let arr: [u8; MASTER_SECRET_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidMasterSecret(format!("got {} bytes", v.len())))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.0
    }
}

impl Default for MasterSecret {
    fn default() -> Self {
        Self(DEFAULT_MASTER)
    }
}

impl FromStr for MasterSecret {
    type Err = CryptoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Keep secrets out of debug logs.
impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

// ── SectorKey ────────────────────────────────────────────────────────────────

/// A 6-byte sector authentication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SectorKey(pub [u8; SECTOR_KEY_LEN]);

impl SectorKey {
    pub fn as_bytes(&self) -> &[u8; SECTOR_KEY_LEN] {
        &self.0
    }

    /// Upper-case hex, the form key dictionaries use.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One key per sector, sector 0 first.
pub type SectorKeys = [SectorKey; SECTOR_COUNT];

// ── Derivation ───────────────────────────────────────────────────────────────

/// Derive the 16 sector keys for the tag with identifier `uid`.
///
/// Fails with [`CryptoError::InvalidIdentifierLength`] unless `uid` is 4-10
/// bytes long. No keys are produced in that case.
pub fn derive_keys(uid: &[u8], master: &MasterSecret) -> Result<SectorKeys, CryptoError> {
    if !(MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&uid.len()) {
        return Err(CryptoError::InvalidIdentifierLength(uid.len()));
    }

    let hk = Hkdf::<Sha256>::new(Some(master.as_bytes()), uid);
    let mut okm = [0u8; SECTOR_COUNT * SECTOR_KEY_LEN];
    hk.expand(KDF_INFO, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut keys = [SectorKey::default(); SECTOR_COUNT];
    for (key, chunk) in keys.iter_mut().zip(okm.chunks_exact(SECTOR_KEY_LEN)) {
        key.0.copy_from_slice(chunk);
    }
    tracing::trace!(uid = %hex::encode_upper(uid), "derived {} sector keys", SECTOR_COUNT);
    Ok(keys)
}
