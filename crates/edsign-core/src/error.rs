use std::path::PathBuf;

use thiserror::Error;

pub type EdsignResult<T> = Result<T, EdsignError>;

#[derive(Debug, Error)]
pub enum EdsignError {
    #[error("{0}")]
    Format(String),

    #[error("comment too long")]
    CommentTooLong,

    #[error("unsupported {0}")]
    UnsupportedAlgorithm(String),

    #[error("please provide a password")]
    EmptyPassphrase,

    #[error("passwords don't match")]
    PassphraseMismatch,

    #[error("incorrect passphrase")]
    IncorrectPassphrase,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("verification failed: checked against wrong key")]
    WrongKey,

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("untrusted path {0}")]
    UntrustedPath(String),

    #[error("must specify pubkey")]
    MissingPublicKey,

    #[error("not a valid file: {0}")]
    NotAFile(String),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse checksum line {0}")]
    ChecksumParse(String),

    #[error("{} file(s) failed checksum verification", .0.len())]
    ChecksumFailed(Vec<String>),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EdsignError {
    /// Attach the offending path to an I/O error.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EdsignError::File {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_signify() {
        assert_eq!(EdsignError::CommentTooLong.to_string(), "comment too long");
        assert_eq!(
            EdsignError::WrongKey.to_string(),
            "verification failed: checked against wrong key"
        );
        assert_eq!(
            EdsignError::UntrustedPath("/tmp/x.pub".into()).to_string(),
            "untrusted path /tmp/x.pub"
        );
    }

    #[test]
    fn test_file_error_includes_path() {
        let err = EdsignError::file(
            "/nonexistent/key.sec",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().starts_with("/nonexistent/key.sec: "));
    }

    #[test]
    fn test_checksum_failed_counts_files() {
        let err = EdsignError::ChecksumFailed(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "2 file(s) failed checksum verification");
    }
}
