//! Fixed-width big-endian binary records carried inside envelopes.
//!
//! Each record has an explicit encode/decode pair; decoding demands the exact
//! record length and the `Ed` algorithm tag.

use edsign_core::types::{
    CHECKSUM_LEN, KDFALG, KEYNUM_LEN, PKALG, PUBLIC_KEY_LEN, SALT_LEN, SECRET_KEY_LEN,
    SIGNATURE_LEN,
};
use edsign_core::{EdsignError, EdsignResult, KeyNumber};

use crate::secure::SecureBuffer;

fn check_layout(kind: &str, bytes: &[u8], expected: usize) -> EdsignResult<()> {
    if bytes.len() != expected {
        return Err(EdsignError::Format(format!(
            "invalid {kind} length: {} bytes (expected {expected})",
            bytes.len()
        )));
    }
    if bytes[..2] != PKALG {
        return Err(EdsignError::UnsupportedAlgorithm(format!(
            "signature algorithm in {kind}"
        )));
    }
    Ok(())
}

fn key_number_at(bytes: &[u8], offset: usize) -> KeyNumber {
    let mut num = [0u8; KEYNUM_LEN];
    num.copy_from_slice(&bytes[offset..offset + KEYNUM_LEN]);
    KeyNumber::from_bytes(num)
}

/// Secret key as stored on disk: the keypair bytes are XOR-masked.
#[derive(Debug)]
pub struct SecretKeyRecord {
    pub kdf_alg: [u8; 2],
    pub kdf_rounds: u32,
    pub salt: [u8; SALT_LEN],
    pub checksum: [u8; CHECKSUM_LEN],
    pub key_num: KeyNumber,
    /// Masked (or, transiently during signing, unmasked) keypair bytes
    pub seckey: SecureBuffer,
}

impl SecretKeyRecord {
    /// 2 + 2 + 4 + 16 + 8 + 8 + 64
    pub const LEN: usize = 2 + 2 + 4 + SALT_LEN + CHECKSUM_LEN + KEYNUM_LEN + SECRET_KEY_LEN;

    pub fn encode(&self) -> SecureBuffer {
        let mut out = SecureBuffer::zeroed(Self::LEN);
        out[0..2].copy_from_slice(&PKALG);
        out[2..4].copy_from_slice(&self.kdf_alg);
        out[4..8].copy_from_slice(&self.kdf_rounds.to_be_bytes());
        out[8..24].copy_from_slice(&self.salt);
        out[24..32].copy_from_slice(&self.checksum);
        out[32..40].copy_from_slice(self.key_num.as_bytes());
        out[40..].copy_from_slice(&self.seckey);
        out
    }

    pub fn decode(bytes: &[u8]) -> EdsignResult<Self> {
        check_layout("secret key", bytes, Self::LEN)?;
        let mut kdf_alg = [0u8; 2];
        kdf_alg.copy_from_slice(&bytes[2..4]);
        let mut rounds = [0u8; 4];
        rounds.copy_from_slice(&bytes[4..8]);
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[8..24]);
        let mut checksum = [0u8; CHECKSUM_LEN];
        checksum.copy_from_slice(&bytes[24..32]);

        Ok(Self {
            kdf_alg,
            kdf_rounds: u32::from_be_bytes(rounds),
            salt,
            checksum,
            key_num: key_number_at(bytes, 32),
            seckey: SecureBuffer::copy_from(&bytes[40..]),
        })
    }

    /// Reject anything but bcrypt-pbkdf.
    pub fn ensure_supported_kdf(&self) -> EdsignResult<()> {
        if self.kdf_alg != KDFALG {
            return Err(EdsignError::UnsupportedAlgorithm("KDF".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub key_num: KeyNumber,
    pub pubkey: [u8; PUBLIC_KEY_LEN],
}

impl PublicKeyRecord {
    /// 2 + 8 + 32
    pub const LEN: usize = 2 + KEYNUM_LEN + PUBLIC_KEY_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&PKALG);
        out.extend_from_slice(self.key_num.as_bytes());
        out.extend_from_slice(&self.pubkey);
        out
    }

    pub fn decode(bytes: &[u8]) -> EdsignResult<Self> {
        check_layout("public key", bytes, Self::LEN)?;
        let mut pubkey = [0u8; PUBLIC_KEY_LEN];
        pubkey.copy_from_slice(&bytes[10..]);
        Ok(Self {
            key_num: key_number_at(bytes, 2),
            pubkey,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub key_num: KeyNumber,
    pub sig: [u8; SIGNATURE_LEN],
}

impl SignatureRecord {
    /// 2 + 8 + 64
    pub const LEN: usize = 2 + KEYNUM_LEN + SIGNATURE_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.extend_from_slice(&PKALG);
        out.extend_from_slice(self.key_num.as_bytes());
        out.extend_from_slice(&self.sig);
        out
    }

    pub fn decode(bytes: &[u8]) -> EdsignResult<Self> {
        check_layout("signature", bytes, Self::LEN)?;
        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(&bytes[10..]);
        Ok(Self {
            key_num: key_number_at(bytes, 2),
            sig,
        })
    }
}
