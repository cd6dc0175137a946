//! Passphrase sources for key masking.

use std::collections::VecDeque;

use edsign_core::{EdsignError, EdsignResult};
use secrecy::SecretString;

/// Where passphrases come from. Implementations must not log or cache them.
pub trait PassphraseSource {
    fn read_passphrase(&mut self, prompt: &str) -> EdsignResult<SecretString>;
}

/// Prompts on the controlling terminal with echo disabled.
#[derive(Debug, Default)]
pub struct TerminalPassphrase;

impl PassphraseSource for TerminalPassphrase {
    fn read_passphrase(&mut self, prompt: &str) -> EdsignResult<SecretString> {
        let pass = rpassword::prompt_password(prompt).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                EdsignError::Io(std::io::Error::new(
                    e.kind(),
                    "unable to read passphrase",
                ))
            } else {
                EdsignError::Io(e)
            }
        })?;
        Ok(SecretString::from(pass))
    }
}

/// Replays a fixed sequence of passphrases, one per prompt.
///
/// For non-interactive callers (and tests). Running out of entries behaves
/// like EOF on the terminal.
#[derive(Default)]
pub struct ScriptedPassphrase {
    entries: VecDeque<SecretString>,
    prompts: usize,
}

impl ScriptedPassphrase {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|s| SecretString::from(s.into()))
                .collect(),
            prompts: 0,
        }
    }

    /// A source that fails on the first prompt.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of prompts issued so far.
    pub fn prompts(&self) -> usize {
        self.prompts
    }
}

impl PassphraseSource for ScriptedPassphrase {
    fn read_passphrase(&mut self, prompt: &str) -> EdsignResult<SecretString> {
        self.prompts += 1;
        tracing::trace!(prompt = prompt.trim_end(), "scripted passphrase prompt");
        self.entries.pop_front().ok_or_else(|| {
            EdsignError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unable to read passphrase",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_scripted_replays_in_order() {
        let mut source = ScriptedPassphrase::new(["first", "second"]);
        assert_eq!(source.read_passphrase("p: ").unwrap().expose_secret(), "first");
        assert_eq!(source.read_passphrase("p: ").unwrap().expose_secret(), "second");
        assert_eq!(source.prompts(), 2);
    }

    #[test]
    fn test_scripted_exhausted_is_eof() {
        let mut source = ScriptedPassphrase::empty();
        let err = source.read_passphrase("p: ").unwrap_err();
        match err {
            EdsignError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.prompts(), 1);
    }
}
