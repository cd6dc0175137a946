//! edsign-crypto: signify-compatible signing for edsign
//!
//! Artifacts share one text envelope:
//! ```text
//! untrusted comment: <free text>\n
//! <base64 of a fixed-width big-endian record>\n
//! [<embedded message bytes>]
//! ```
//!
//! Secret key protection:
//! ```text
//! passphrase ──bcrypt-pbkdf(salt, rounds)──▶ mask[64]
//! stored seckey = ed25519 keypair[64] XOR mask
//! checksum      = SHA-512(keypair)[..8]   (detects a wrong passphrase)
//! ```
//!
//! Every buffer holding secret material is a [`SecureBuffer`] (or a
//! [`secrecy::SecretString`] pinned for its lifetime) and is wiped on drop.

pub mod checksum;
pub mod envelope;
pub mod kdf;
pub mod keygen;
pub mod passphrase;
pub mod record;
pub mod secure;
pub mod sign;
pub mod verify;

pub use checksum::{check_manifest, verify_checksums, ChecksumAlgorithm, ChecksumRecord, ManifestReport};
pub use envelope::{parse_envelope, write_envelope, CreateMode, ParsedEnvelope};
pub use kdf::{apply_mask, derive_mask};
pub use keygen::generate;
pub use passphrase::{PassphraseSource, ScriptedPassphrase, TerminalPassphrase};
pub use record::{PublicKeyRecord, SecretKeyRecord, SignatureRecord};
pub use secure::{Pinned, SecureBuffer};
pub use sign::sign;
pub use verify::{check, verify_detached, verify_embedded};
