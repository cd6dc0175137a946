//! Flag validation: turns parsed flags into one immutable `Invocation`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use edsign_core::config::EdsignConfig;
use edsign_core::types::{SIGNATURE_SUFFIX, STDIO_PATH};

#[derive(Parser, Debug)]
#[command(
    name = "edsign",
    version,
    disable_version_flag = true,
    about = "Sign and verify files (signify-compatible)",
    override_usage = "\
edsign -C [-q] [-p pubkey] -x sigfile [file ...]
       edsign -G [-n] [-c comment] -p pubkey -s seckey
       edsign -S [-e] [-x sigfile] -s seckey -m message
       edsign -V [-eq] [-p pubkey] [-x sigfile] -m message",
    group(
        ArgGroup::new("mode")
            .required(true)
            .multiple(false)
            .args(["check", "generate", "sign", "verify"])
    )
)]
pub struct Cli {
    /// Verify a signed checksum list, then the checksum of each file.
    /// With no files listed, every entry is checked.
    #[arg(short = 'C')]
    pub check: bool,

    /// Generate a new key pair
    #[arg(short = 'G')]
    pub generate: bool,

    /// Sign the message file and create a signature
    #[arg(short = 'S')]
    pub sign: bool,

    /// Verify that a message and signature match
    #[arg(short = 'V')]
    pub verify: bool,

    /// Comment added during key generation
    #[arg(short = 'c', value_name = "comment")]
    pub comment: Option<String>,

    /// Signing: embed the message after the signature.
    /// Verifying: extract the embedded message into the message file.
    #[arg(short = 'e')]
    pub embed: bool,

    /// Message file to sign, to verify, or (with -V -e) to create
    #[arg(short = 'm', value_name = "message")]
    pub message: Option<PathBuf>,

    /// Do not protect the generated secret key with a passphrase
    #[arg(short = 'n')]
    pub no_passphrase: bool,

    /// Public key file
    #[arg(short = 'p', value_name = "pubkey")]
    pub pubkey: Option<PathBuf>,

    /// Quiet mode: suppress informational output
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Secret key file
    #[arg(short = 's', value_name = "seckey")]
    pub seckey: Option<PathBuf>,

    /// Signature file to create or verify (default: <message>.sig)
    #[arg(short = 'x', value_name = "sigfile")]
    pub sigfile: Option<PathBuf>,

    /// Files to check (-C only)
    #[arg(value_name = "file")]
    pub files: Vec<String>,

    /// Path to config.toml (default: ~/.config/edsign/config.toml)
    #[arg(long, env = "EDSIGN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EDSIGN_LOG")]
    pub log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "EDSIGN_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn from_config(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Generate {
        pubkey: PathBuf,
        seckey: PathBuf,
        rounds: u32,
        comment: String,
    },
    Sign {
        seckey: PathBuf,
        message: PathBuf,
        sigfile: PathBuf,
        embed: bool,
    },
    Verify {
        pubkey: Option<PathBuf>,
        message: PathBuf,
        sigfile: PathBuf,
        embed: bool,
    },
    Check {
        pubkey: Option<PathBuf>,
        sigfile: PathBuf,
        files: Vec<String>,
    },
}

/// Everything one run needs, fixed before any work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub operation: Operation,
    pub quiet: bool,
}

impl Invocation {
    pub fn from_cli(cli: &Cli, config: &EdsignConfig) -> Result<Self> {
        if cli.check {
            let Some(sigfile) = cli.sigfile.clone() else {
                bail!("must specify sigfile");
            };
            return Ok(Self {
                operation: Operation::Check {
                    pubkey: cli.pubkey.clone(),
                    sigfile,
                    files: cli.files.clone(),
                },
                quiet: cli.quiet,
            });
        }

        if !cli.files.is_empty() {
            bail!("file arguments are only accepted with -C");
        }

        let sigfile = match (&cli.sigfile, &cli.message) {
            (Some(sig), _) => Some(sig.clone()),
            (None, Some(msg)) if msg.as_os_str() == STDIO_PATH => {
                bail!("must specify sigfile with - message")
            }
            (None, Some(msg)) => {
                let mut name = msg.clone().into_os_string();
                name.push(SIGNATURE_SUFFIX);
                Some(PathBuf::from(name))
            }
            (None, None) => None,
        };

        let operation = if cli.generate {
            let (Some(pubkey), Some(seckey)) = (cli.pubkey.clone(), cli.seckey.clone()) else {
                bail!("must specify pubkey and seckey");
            };
            // Only -n may produce an unprotected key.
            let rounds = if cli.no_passphrase {
                0
            } else {
                config.validate()?;
                config.keygen.kdf_rounds
            };
            Operation::Generate {
                pubkey,
                seckey,
                rounds,
                comment: cli
                    .comment
                    .clone()
                    .unwrap_or_else(|| config.keygen.comment.clone()),
            }
        } else if cli.sign {
            let (Some(message), Some(seckey), Some(sigfile)) =
                (cli.message.clone(), cli.seckey.clone(), sigfile)
            else {
                bail!("must specify message and seckey");
            };
            Operation::Sign {
                seckey,
                message,
                sigfile,
                embed: cli.embed,
            }
        } else {
            let (Some(message), Some(sigfile)) = (cli.message.clone(), sigfile) else {
                bail!("must specify message");
            };
            Operation::Verify {
                pubkey: cli.pubkey.clone(),
                message,
                sigfile,
                embed: cli.embed,
            }
        };

        Ok(Self {
            operation,
            quiet: cli.quiet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        let cli = Cli::try_parse_from(std::iter::once("edsign").chain(args.iter().copied()))?;
        Invocation::from_cli(&cli, &EdsignConfig::default())
    }

    #[test]
    fn test_generate_defaults() {
        let inv = parse(&["-G", "-p", "k.pub", "-s", "k.sec"]).unwrap();
        assert_eq!(
            inv.operation,
            Operation::Generate {
                pubkey: "k.pub".into(),
                seckey: "k.sec".into(),
                rounds: 42,
                comment: "signify".into(),
            }
        );
        assert!(!inv.quiet);
    }

    #[test]
    fn test_generate_no_passphrase_and_comment() {
        let inv = parse(&["-G", "-n", "-c", "release", "-p", "k.pub", "-s", "k.sec"]).unwrap();
        match inv.operation {
            Operation::Generate { rounds, comment, .. } => {
                assert_eq!(rounds, 0);
                assert_eq!(comment, "release");
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_config_supplies_keygen_defaults() {
        let mut config = EdsignConfig::default();
        config.keygen.kdf_rounds = 100;
        config.keygen.comment = "ci".into();
        let cli = Cli::try_parse_from(["edsign", "-G", "-p", "a", "-s", "b"]).unwrap();
        let inv = Invocation::from_cli(&cli, &config).unwrap();
        assert!(matches!(
            inv.operation,
            Operation::Generate { rounds: 100, ref comment, .. } if comment == "ci"
        ));
    }

    #[test]
    fn test_zero_rounds_only_from_flag() {
        let mut config = EdsignConfig::default();
        config.keygen.kdf_rounds = 0;

        let cli = Cli::try_parse_from(["edsign", "-G", "-p", "a", "-s", "b"]).unwrap();
        let err = Invocation::from_cli(&cli, &config).unwrap_err();
        assert!(err.to_string().contains("kdf_rounds"));

        let cli = Cli::try_parse_from(["edsign", "-G", "-n", "-p", "a", "-s", "b"]).unwrap();
        let inv = Invocation::from_cli(&cli, &config).unwrap();
        assert!(matches!(inv.operation, Operation::Generate { rounds: 0, .. }));
    }

    #[test]
    fn test_sign_default_sigfile() {
        let inv = parse(&["-S", "-e", "-s", "k.sec", "-m", "release.tgz"]).unwrap();
        assert_eq!(
            inv.operation,
            Operation::Sign {
                seckey: "k.sec".into(),
                message: "release.tgz".into(),
                sigfile: "release.tgz.sig".into(),
                embed: true,
            }
        );
    }

    #[test]
    fn test_stdin_message_requires_sigfile() {
        let err = parse(&["-V", "-m", "-"]).unwrap_err();
        assert!(err.to_string().contains("must specify sigfile with - message"));

        let inv = parse(&["-V", "-q", "-m", "-", "-x", "m.sig"]).unwrap();
        assert!(inv.quiet);
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(parse(&["-S", "-V", "-m", "x"]).is_err());
        assert!(parse(&["-m", "x"]).is_err());
    }

    #[test]
    fn test_check_requires_sigfile() {
        let err = parse(&["-C", "-p", "k.pub"]).unwrap_err();
        assert!(err.to_string().contains("must specify sigfile"));

        let inv = parse(&["-C", "-x", "SHA256.sig", "a.txt", "b.txt"]).unwrap();
        assert_eq!(
            inv.operation,
            Operation::Check {
                pubkey: None,
                sigfile: "SHA256.sig".into(),
                files: vec!["a.txt".into(), "b.txt".into()],
            }
        );
    }

    #[test]
    fn test_files_only_with_check() {
        let err = parse(&["-V", "-m", "x", "extra"]).unwrap_err();
        assert!(err.to_string().contains("only accepted with -C"));
    }

    #[test]
    fn test_missing_required_paths() {
        assert!(parse(&["-G", "-p", "k.pub"]).is_err());
        assert!(parse(&["-S", "-m", "msg"]).is_err());
        assert!(parse(&["-V", "-p", "k.pub"]).is_err());
    }

    #[test]
    fn test_log_format_from_config() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("text"), LogFormat::Text);
    }
}
