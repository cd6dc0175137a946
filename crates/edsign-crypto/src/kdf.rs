//! Key masking: bcrypt-pbkdf passphrase → XOR mask over the secret key

use edsign_core::types::SALT_LEN;
use edsign_core::{EdsignError, EdsignResult};
use secrecy::ExposeSecret;

use crate::passphrase::PassphraseSource;
use crate::secure::{Pinned, SecureBuffer};

/// Derive a `len`-byte mask for the secret key.
///
/// `rounds == 0` marks an unprotected key: the mask is all zero and no
/// passphrase is requested. Otherwise the passphrase is read from `source`
/// (twice when `confirm` is set) and stretched with bcrypt-pbkdf.
pub fn derive_mask(
    source: &mut dyn PassphraseSource,
    salt: &[u8; SALT_LEN],
    rounds: u32,
    confirm: bool,
    len: usize,
) -> EdsignResult<SecureBuffer> {
    let mut mask = SecureBuffer::zeroed(len);
    if rounds == 0 {
        return Ok(mask);
    }

    let pass = source.read_passphrase("passphrase: ")?;
    let pass_pin = Pinned::new(pass.expose_secret().as_bytes());
    if pass_pin.bytes().is_empty() {
        return Err(EdsignError::EmptyPassphrase);
    }

    if confirm {
        let again = source.read_passphrase("confirm passphrase: ")?;
        let again_pin = Pinned::new(again.expose_secret().as_bytes());
        if pass_pin.bytes() != again_pin.bytes() {
            return Err(EdsignError::PassphraseMismatch);
        }
    }

    tracing::debug!(rounds, "deriving key mask");
    bcrypt_pbkdf::bcrypt_pbkdf(pass_pin.bytes(), salt, rounds, mask.as_mut_slice())
        .map_err(|e| EdsignError::Kdf(e.to_string()))?;

    Ok(mask)
}

/// XOR `mask` into `key` in place. Applying the same mask twice restores `key`.
pub fn apply_mask(key: &mut [u8], mask: &[u8]) {
    debug_assert_eq!(key.len(), mask.len());
    for (k, m) in key.iter_mut().zip(mask) {
        *k ^= m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ScriptedPassphrase;
    use proptest::prelude::*;

    const SALT: [u8; SALT_LEN] = [9u8; SALT_LEN];

    #[test]
    fn test_zero_rounds_is_zero_mask_without_prompt() {
        let mut source = ScriptedPassphrase::empty();
        let mask = derive_mask(&mut source, &SALT, 0, true, 64).unwrap();

        assert!(mask.iter().all(|&b| b == 0));
        assert_eq!(source.prompts(), 0);
    }

    #[test]
    fn test_mask_deterministic() {
        let a = derive_mask(&mut ScriptedPassphrase::new(["pw"]), &SALT, 2, false, 64).unwrap();
        let b = derive_mask(&mut ScriptedPassphrase::new(["pw"]), &SALT, 2, false, 64).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
        assert!(a.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_mask_depends_on_passphrase_and_salt() {
        let a = derive_mask(&mut ScriptedPassphrase::new(["pw-a"]), &SALT, 1, false, 64).unwrap();
        let b = derive_mask(&mut ScriptedPassphrase::new(["pw-b"]), &SALT, 1, false, 64).unwrap();
        let c = derive_mask(&mut ScriptedPassphrase::new(["pw-a"]), &[1u8; SALT_LEN], 1, false, 64)
            .unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let err = derive_mask(&mut ScriptedPassphrase::new([""]), &SALT, 1, false, 64).unwrap_err();
        assert!(matches!(err, EdsignError::EmptyPassphrase));
    }

    #[test]
    fn test_confirmation_mismatch_rejected() {
        let mut source = ScriptedPassphrase::new(["one", "two"]);
        let err = derive_mask(&mut source, &SALT, 1, true, 64).unwrap_err();
        assert!(matches!(err, EdsignError::PassphraseMismatch));
        assert_eq!(source.prompts(), 2);
    }

    #[test]
    fn test_confirmation_match_accepted() {
        let mut source = ScriptedPassphrase::new(["same", "same"]);
        let confirmed = derive_mask(&mut source, &SALT, 1, true, 64).unwrap();
        let single = derive_mask(&mut ScriptedPassphrase::new(["same"]), &SALT, 1, false, 64).unwrap();
        assert_eq!(confirmed.as_slice(), single.as_slice());
    }

    #[test]
    fn test_zero_mask_is_identity() {
        let original = [0x5au8; 64];
        let mut key = original;
        apply_mask(&mut key, &[0u8; 64]);
        assert_eq!(key, original);
    }

    proptest! {
        #[test]
        fn mask_is_an_involution(
            key in proptest::collection::vec(any::<u8>(), 64),
            mask in proptest::collection::vec(any::<u8>(), 64),
        ) {
            let mut work = key.clone();
            apply_mask(&mut work, &mask);
            apply_mask(&mut work, &mask);
            prop_assert_eq!(work, key);
        }
    }
}
