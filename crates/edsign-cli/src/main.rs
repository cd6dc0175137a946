//! edsign: signify-compatible signing CLI
//!
//! Modes:
//!   -G  generate a key pair
//!   -S  sign a message
//!   -V  verify a message (or extract an embedded one with -e)
//!   -C  verify a signed checksum manifest, then the listed files

mod invocation;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use edsign_core::config::EdsignConfig;
use edsign_crypto::envelope::write_message;
use edsign_crypto::{
    check_manifest, generate, sign, verify_detached, verify_embedded, PassphraseSource,
    TerminalPassphrase,
};

use invocation::{Cli, Invocation, LogFormat, Operation};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.clone().or_else(EdsignConfig::default_path) {
        Some(path) => EdsignConfig::load(&path)
            .with_context(|| format!("loading config: {}", path.display()))?,
        None => EdsignConfig::default(),
    };

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| LogFormat::from_config(&config.log.format));
    init_logging(&level, &format);

    let invocation = Invocation::from_cli(&cli, &config)?;
    tracing::debug!(?invocation, "starting");

    run(&invocation, &mut TerminalPassphrase)
}

fn run(invocation: &Invocation, source: &mut dyn PassphraseSource) -> Result<()> {
    match &invocation.operation {
        Operation::Generate {
            pubkey,
            seckey,
            rounds,
            comment,
        } => {
            generate(pubkey, seckey, *rounds, comment, source).context("generating key pair")?;
        }
        Operation::Sign {
            seckey,
            message,
            sigfile,
            embed,
        } => {
            sign(seckey, message, sigfile, *embed, source)
                .with_context(|| format!("signing {}", message.display()))?;
        }
        Operation::Verify {
            pubkey,
            message,
            sigfile,
            embed,
        } => {
            if *embed {
                let msg = verify_embedded(pubkey.as_deref(), sigfile)?;
                confirm(invocation.quiet);
                write_message(message, &msg)
                    .with_context(|| format!("writing {}", message.display()))?;
            } else {
                verify_detached(pubkey.as_deref(), message, sigfile)?;
                confirm(invocation.quiet);
            }
        }
        Operation::Check {
            pubkey,
            sigfile,
            files,
        } => {
            let report = check_manifest(pubkey.as_deref(), sigfile, files, Path::new(""))?;
            confirm(invocation.quiet);
            if !invocation.quiet {
                for file in &report.passed {
                    println!("{file}: OK");
                }
            }
            for file in &report.failed {
                eprintln!("{file}: FAIL");
            }
            report.into_result()?;
        }
    }
    Ok(())
}

fn confirm(quiet: bool) {
    if !quiet {
        println!("Signature Verified");
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout may carry signatures or extracted messages ("-"), so logs go to stderr.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edsign_crypto::ScriptedPassphrase;

    #[test]
    fn test_run_generate_sign_verify() {
        let tmp = tempfile::tempdir().unwrap();
        let pubkey = tmp.path().join("k.pub");
        let seckey = tmp.path().join("k.sec");
        let message = tmp.path().join("msg");
        let sigfile = tmp.path().join("msg.sig");
        std::fs::write(&message, b"contents").unwrap();

        let steps = [
            Operation::Generate {
                pubkey: pubkey.clone(),
                seckey: seckey.clone(),
                rounds: 1,
                comment: "cli".into(),
            },
            Operation::Sign {
                seckey: seckey.clone(),
                message: message.clone(),
                sigfile: sigfile.clone(),
                embed: true,
            },
        ];
        let mut source = ScriptedPassphrase::new(["pw", "pw", "pw"]);
        for operation in steps {
            run(&Invocation { operation, quiet: true }, &mut source).unwrap();
        }

        let extracted = tmp.path().join("extracted");
        let verify = Invocation {
            operation: Operation::Verify {
                pubkey: Some(pubkey),
                message: extracted.clone(),
                sigfile,
                embed: true,
            },
            quiet: true,
        };
        run(&verify, &mut ScriptedPassphrase::empty()).unwrap();
        assert_eq!(std::fs::read(&extracted).unwrap(), b"contents");
    }

    #[test]
    fn test_run_check_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let pubkey = tmp.path().join("k.pub");
        let seckey = tmp.path().join("k.sec");
        generate(&pubkey, &seckey, 0, "t", &mut ScriptedPassphrase::empty()).unwrap();

        // A manifest naming a file that will not exist relative to the cwd.
        let manifest = tmp.path().join("SHA256");
        std::fs::write(
            &manifest,
            format!("SHA256 ({}) = {}\n", tmp.path().join("absent").display(), "0".repeat(64)),
        )
        .unwrap();
        let sigfile = tmp.path().join("SHA256.sig");
        sign(&seckey, &manifest, &sigfile, true, &mut ScriptedPassphrase::empty()).unwrap();

        let check = Invocation {
            operation: Operation::Check {
                pubkey: Some(pubkey),
                sigfile,
                files: vec![],
            },
            quiet: true,
        };
        let err = run(&check, &mut ScriptedPassphrase::empty()).unwrap_err();
        assert!(err.to_string().contains("failed checksum verification"));
    }
}
