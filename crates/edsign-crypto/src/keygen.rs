//! Key pair generation.

use std::path::Path;

use ed25519_dalek::SigningKey;
use edsign_core::types::{CHECKSUM_LEN, KDFALG, SALT_LEN, SECRET_KEY_LEN, STDIO_PATH};
use edsign_core::{EdsignResult, KeyNumber};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::envelope::{check_comment_bound, write_envelope, CreateMode};
use crate::kdf::{apply_mask, derive_mask};
use crate::passphrase::PassphraseSource;
use crate::record::{PublicKeyRecord, SecretKeyRecord};
use crate::secure::SecureBuffer;

/// First 8 bytes of SHA-512 over the unmasked keypair bytes.
pub(crate) fn key_checksum(seckey: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut raw = Sha512::digest(seckey);
    let digest = SecureBuffer::copy_from(&raw);
    raw.as_mut_slice().zeroize();
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

/// Remove a secret key file left without its public half.
///
/// Returns whether a file removal was attempted; a key sent to stdout cannot
/// be taken back.
fn discard_secret_key(seckey_path: &Path) -> bool {
    if seckey_path.as_os_str() == STDIO_PATH {
        return false;
    }
    tracing::warn!(
        path = %seckey_path.display(),
        "public key write failed, removing new secret key"
    );
    if let Err(rm) = std::fs::remove_file(seckey_path) {
        tracing::warn!(path = %seckey_path.display(), "cleanup failed: {rm}");
    }
    true
}

/// Generate a key pair and write both envelopes.
///
/// `rounds == 0` stores the secret key unprotected. Both files are created
/// exclusively; the secret key is written first with mode 0600. If the public
/// key cannot be written, the fresh secret key file is removed again.
pub fn generate(
    pubkey_path: &Path,
    seckey_path: &Path,
    rounds: u32,
    comment: &str,
    source: &mut dyn PassphraseSource,
) -> EdsignResult<KeyNumber> {
    let sec_comment = format!("{comment} secret key");
    let pub_comment = format!("{comment} public key");
    check_comment_bound(&sec_comment)?;
    check_comment_bound(&pub_comment)?;

    let signing_key = SigningKey::generate(&mut OsRng);
    let mut keypair = signing_key.to_keypair_bytes();
    let mut seckey = SecureBuffer::copy_from(&keypair);
    keypair.zeroize();
    let pubkey = signing_key.verifying_key().to_bytes();
    drop(signing_key);

    let key_num = KeyNumber::generate();
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let checksum = key_checksum(&seckey);
    let mask = derive_mask(source, &salt, rounds, true, SECRET_KEY_LEN)?;
    apply_mask(&mut seckey, &mask);
    drop(mask);

    let record = SecretKeyRecord {
        kdf_alg: KDFALG,
        kdf_rounds: rounds,
        salt,
        checksum,
        key_num,
        seckey,
    };
    write_envelope(
        seckey_path,
        &sec_comment,
        &record.encode(),
        None,
        CreateMode::Exclusive,
        0o600,
    )?;
    drop(record);

    let public = PublicKeyRecord { key_num, pubkey };
    if let Err(e) = write_envelope(
        pubkey_path,
        &pub_comment,
        &public.encode(),
        None,
        CreateMode::Exclusive,
        0o666,
    ) {
        discard_secret_key(seckey_path);
        return Err(e);
    }

    tracing::info!(
        key_num = %key_num,
        rounds,
        pubkey = %pubkey_path.display(),
        seckey = %seckey_path.display(),
        "generated key pair"
    );
    Ok(key_num)
}
