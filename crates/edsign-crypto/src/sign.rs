//! Signing with a (possibly passphrase-protected) secret key.

use std::path::Path;

use ed25519_dalek::{Signer, SigningKey};
use edsign_core::types::{PUBLIC_KEY_SUFFIX, SECRET_KEY_LEN, SECRET_KEY_SUFFIX, VERIFY_WITH};
use edsign_core::{EdsignError, EdsignResult};

use crate::envelope::{read_envelope, read_message, write_envelope, CreateMode};
use crate::kdf::{apply_mask, derive_mask};
use crate::keygen::key_checksum;
use crate::passphrase::PassphraseSource;
use crate::record::{SecretKeyRecord, SignatureRecord};

/// Comment for a new signature.
///
/// `foo.sec` produces `verify with foo.pub`; any other secret key name falls
/// back to `signature from <secret key comment>`.
fn signature_comment(seckey_path: &Path, seckey_comment: &str) -> String {
    let name = seckey_path.to_string_lossy();
    match name.strip_suffix(SECRET_KEY_SUFFIX) {
        Some(prefix) => format!("{VERIFY_WITH}{prefix}{PUBLIC_KEY_SUFFIX}"),
        None => format!("signature from {seckey_comment}"),
    }
}

/// Sign `msg_path` with the key in `seckey_path`, writing `sig_path`.
///
/// A wrong passphrase is detected through the stored checksum before the key
/// is used. With `embed`, the message is appended after the signature.
pub fn sign(
    seckey_path: &Path,
    msg_path: &Path,
    sig_path: &Path,
    embed: bool,
    source: &mut dyn PassphraseSource,
) -> EdsignResult<()> {
    let envelope = read_envelope(seckey_path)?;
    let mut record = SecretKeyRecord::decode(&envelope.blob)?;
    drop(envelope.blob);
    record.ensure_supported_kdf()?;

    let mask = derive_mask(
        source,
        &record.salt,
        record.kdf_rounds,
        false,
        SECRET_KEY_LEN,
    )?;
    apply_mask(&mut record.seckey, &mask);
    drop(mask);

    if key_checksum(&record.seckey) != record.checksum {
        return Err(EdsignError::IncorrectPassphrase);
    }

    let keypair: &[u8; SECRET_KEY_LEN] = record.seckey[..]
        .try_into()
        .map_err(|_| EdsignError::Format("invalid secret key".into()))?;
    let signing_key = SigningKey::from_keypair_bytes(keypair)
        .map_err(|_| EdsignError::Format(format!("corrupt secret key {}", seckey_path.display())))?;

    let msg = read_message(msg_path)?;
    let signature = SignatureRecord {
        key_num: record.key_num,
        sig: signing_key.sign(&msg).to_bytes(),
    };
    drop(signing_key);
    drop(record);

    let comment = signature_comment(seckey_path, &envelope.comment);
    let embedded = if embed { Some(msg.as_slice()) } else { None };
    write_envelope(
        sig_path,
        &comment,
        &signature.encode(),
        embedded,
        CreateMode::Truncate,
        0o666,
    )?;

    tracing::info!(
        key_num = %signature.key_num,
        message = %msg_path.display(),
        signature = %sig_path.display(),
        embed,
        "signed message"
    );
    Ok(())
}
