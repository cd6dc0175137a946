//! Wire constants and small value types shared by every envelope kind.
//!
//! The layout is byte-compatible with OpenBSD signify:
//! ```text
//! secret key : "Ed" "BK" rounds(u32 BE) salt[16] checksum[8] keynum[8] seckey[64]
//! public key : "Ed" keynum[8] pubkey[32]
//! signature  : "Ed" keynum[8] sig[64]
//! ```

use rand::RngCore;

/// Signature algorithm tag (Ed25519)
pub const PKALG: [u8; 2] = *b"Ed";

/// KDF algorithm tag (bcrypt-pbkdf)
pub const KDFALG: [u8; 2] = *b"BK";

pub const KEYNUM_LEN: usize = 8;
pub const SALT_LEN: usize = 16;
pub const CHECKSUM_LEN: usize = 8;

/// Ed25519 keypair bytes: 32-byte seed followed by the 32-byte public key
pub const SECRET_KEY_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Every envelope's first line starts with this.
pub const COMMENT_HEADER: &str = "untrusted comment: ";

/// Upper bound (exclusive) on header + comment, in bytes.
pub const COMMENT_MAX_LEN: usize = 1024;

/// Signature comment prefix naming the public key to verify with.
pub const VERIFY_WITH: &str = "verify with ";

/// A public key recovered from a signature comment must live here.
pub const TRUSTED_KEY_DIR: &str = "/etc/signify/";

pub const DEFAULT_KDF_ROUNDS: u32 = 42;
pub const DEFAULT_COMMENT: &str = "signify";

pub const SECRET_KEY_SUFFIX: &str = ".sec";
pub const PUBLIC_KEY_SUFFIX: &str = ".pub";
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Path token addressing stdin (reads) or stdout (writes).
pub const STDIO_PATH: &str = "-";

/// Random identifier binding a key pair and its signatures together.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyNumber([u8; KEYNUM_LEN]);

impl KeyNumber {
    pub const LEN: usize = KEYNUM_LEN;

    pub fn from_bytes(bytes: [u8; KEYNUM_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEYNUM_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEYNUM_LEN] {
        &self.0
    }
}

impl std::fmt::Display for KeyNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
