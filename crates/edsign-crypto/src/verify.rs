//! Signature verification, detached and embedded.

use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use edsign_core::types::{TRUSTED_KEY_DIR, VERIFY_WITH};
use edsign_core::{EdsignError, EdsignResult};

use crate::envelope::{parse_envelope, read_envelope, read_message};
use crate::record::{PublicKeyRecord, SignatureRecord};

/// Check `sig` over `msg` against `pubkey`.
///
/// Key numbers are compared first so that a signature from another key is
/// reported as such rather than as a bad signature.
pub fn check(pubkey: &PublicKeyRecord, msg: &[u8], sig: &SignatureRecord) -> EdsignResult<()> {
    if pubkey.key_num != sig.key_num {
        return Err(EdsignError::WrongKey);
    }
    let key =
        VerifyingKey::from_bytes(&pubkey.pubkey).map_err(|_| EdsignError::VerificationFailed)?;
    key.verify(msg, &Signature::from_bytes(&sig.sig))
        .map_err(|_| EdsignError::VerificationFailed)?;

    tracing::debug!(key_num = %sig.key_num, bytes = msg.len(), "signature verified");
    Ok(())
}

/// Pick the public key file: the explicit path if given, otherwise the one
/// named by a `verify with` signature comment.
///
/// A recovered path must sit under [`TRUSTED_KEY_DIR`] and must not contain
/// `/../`; signature comments are attacker-controlled.
pub fn resolve_public_key(explicit: Option<&Path>, sig_comment: &str) -> EdsignResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let Some((_, recovered)) = sig_comment.split_once(VERIFY_WITH) else {
        return Err(EdsignError::MissingPublicKey);
    };
    if !recovered.starts_with(TRUSTED_KEY_DIR) || recovered.contains("/../") {
        return Err(EdsignError::UntrustedPath(recovered.to_string()));
    }
    tracing::debug!(path = recovered, "using public key named in signature");
    Ok(PathBuf::from(recovered))
}

fn load_public_key(explicit: Option<&Path>, sig_comment: &str) -> EdsignResult<PublicKeyRecord> {
    let path = resolve_public_key(explicit, sig_comment)?;
    let envelope = read_envelope(&path)?;
    PublicKeyRecord::decode(&envelope.blob)
}

/// Verify a detached signature in `sig_path` over the contents of `msg_path`.
pub fn verify_detached(
    pubkey_path: Option<&Path>,
    msg_path: &Path,
    sig_path: &Path,
) -> EdsignResult<()> {
    let msg = read_message(msg_path)?;
    let envelope = read_envelope(sig_path)?;
    let sig = SignatureRecord::decode(&envelope.blob)?;
    let pubkey = load_public_key(pubkey_path, &envelope.comment)?;

    check(&pubkey, &msg, &sig)
}

/// Verify a signature carrying its message, returning the authenticated message.
pub fn verify_embedded(pubkey_path: Option<&Path>, sig_path: &Path) -> EdsignResult<Vec<u8>> {
    let raw = read_message(sig_path)?;
    let envelope = parse_envelope(&raw, &sig_path.display().to_string())?;
    let sig = SignatureRecord::decode(&envelope.blob)?;
    let pubkey = load_public_key(pubkey_path, &envelope.comment)?;

    check(&pubkey, &envelope.message, &sig)?;
    Ok(envelope.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use edsign_core::KeyNumber;
    use proptest::prelude::*;

    fn fixture(msg: &[u8]) -> (PublicKeyRecord, SignatureRecord) {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let num = KeyNumber::from_bytes([5; 8]);
        (
            PublicKeyRecord {
                key_num: num,
                pubkey: key.verifying_key().to_bytes(),
            },
            SignatureRecord {
                key_num: num,
                sig: key.sign(msg).to_bytes(),
            },
        )
    }

    #[test]
    fn test_check_accepts_valid() {
        let (pubkey, sig) = fixture(b"message");
        check(&pubkey, b"message", &sig).unwrap();
    }

    #[test]
    fn test_wrong_key_number_is_distinct() {
        let (mut pubkey, sig) = fixture(b"message");
        pubkey.key_num = KeyNumber::from_bytes([6; 8]);
        assert!(matches!(
            check(&pubkey, b"message", &sig).unwrap_err(),
            EdsignError::WrongKey
        ));

        let (pubkey, mut sig) = fixture(b"message");
        sig.key_num = KeyNumber::from_bytes([0; 8]);
        assert!(matches!(
            check(&pubkey, b"message", &sig).unwrap_err(),
            EdsignError::WrongKey
        ));
    }

    #[test]
    fn test_resolve_explicit_wins() {
        let path = resolve_public_key(Some(Path::new("/tmp/k.pub")), "verify with /etc/signify/x.pub")
            .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/k.pub"));
    }

    #[test]
    fn test_resolve_trusted_comment() {
        let path = resolve_public_key(None, "verify with /etc/signify/base.pub").unwrap();
        assert_eq!(path, PathBuf::from("/etc/signify/base.pub"));
    }

    #[test]
    fn test_resolve_rejects_untrusted_dir() {
        let err = resolve_public_key(None, "verify with /tmp/evil.pub").unwrap_err();
        assert!(matches!(err, EdsignError::UntrustedPath(p) if p == "/tmp/evil.pub"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let err = resolve_public_key(None, "verify with /etc/signify/../../home/x.pub").unwrap_err();
        assert!(matches!(err, EdsignError::UntrustedPath(_)));
    }

    #[test]
    fn test_resolve_without_hint() {
        let err = resolve_public_key(None, "signature from my secret key").unwrap_err();
        assert!(matches!(err, EdsignError::MissingPublicKey));
    }

    proptest! {
        #[test]
        fn message_bit_flip_fails(
            msg in proptest::collection::vec(any::<u8>(), 1..256),
            bit in any::<proptest::sample::Index>(),
        ) {
            let (pubkey, sig) = fixture(&msg);
            let mut tampered = msg.clone();
            let i = bit.index(tampered.len() * 8);
            tampered[i / 8] ^= 1 << (i % 8);
            let err = check(&pubkey, &tampered, &sig).unwrap_err();
            prop_assert!(matches!(err, EdsignError::VerificationFailed));
        }

        #[test]
        fn signature_bit_flip_fails(bit in 0usize..512) {
            let (pubkey, mut sig) = fixture(b"fixed message");
            sig.sig[bit / 8] ^= 1 << (bit % 8);
            let err = check(&pubkey, b"fixed message", &sig).unwrap_err();
            prop_assert!(matches!(err, EdsignError::VerificationFailed));
        }

        #[test]
        fn public_key_bit_flip_fails(bit in 0usize..256) {
            let (mut pubkey, sig) = fixture(b"fixed message");
            pubkey.pubkey[bit / 8] ^= 1 << (bit % 8);
            let err = check(&pubkey, b"fixed message", &sig).unwrap_err();
            prop_assert!(matches!(err, EdsignError::VerificationFailed));
        }
    }
}
