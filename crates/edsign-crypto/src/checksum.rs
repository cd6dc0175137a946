//! Signed checksum manifests.
//!
//! The manifest is an embedded signature whose message lists files and
//! digests, one per line, in either of two forms:
//! ```text
//! SHA256 (path/to/file) = 5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03
//! path/to/file  <64 or 128 hex chars, or base64>
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use edsign_core::{EdsignError, EdsignResult};
use sha2::{Digest, Sha256, Sha512};

use crate::verify::verify_embedded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn from_name(name: &str) -> EdsignResult<Self> {
        match name {
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            other => Err(EdsignError::UnsupportedAlgorithm(format!(
                "checksum algorithm {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Raw digest size in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Infer the algorithm of an unlabeled digest from its text length
    /// (hex, or padded base64).
    fn from_encoded_len(len: usize) -> Option<Self> {
        match len {
            64 | 44 => Some(Self::Sha256),
            128 | 88 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Lowercase hex digest of a file's current content.
    pub fn hash_file(&self, path: &Path) -> std::io::Result<String> {
        let mut file = std::fs::File::open(path)?;
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                std::io::copy(&mut file, &mut hasher)?;
                Ok(hex::encode(hasher.finalize()))
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                std::io::copy(&mut file, &mut hasher)?;
                Ok(hex::encode(hasher.finalize()))
            }
        }
    }
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    pub file: String,
    /// Digest as written: hex or base64
    pub digest: String,
    /// Algorithm name, e.g. `SHA256`
    pub algorithm: String,
}

impl ChecksumRecord {
    /// Parse a line, trying the labeled form first and then the column form.
    pub fn parse(line: &str) -> EdsignResult<Self> {
        Self::parse_labeled(line)
            .or_else(|| Self::parse_columns(line))
            .ok_or_else(|| EdsignError::ChecksumParse(line.to_string()))
    }

    /// `ALGO (FILE) = DIGEST`
    fn parse_labeled(line: &str) -> Option<Self> {
        let (algorithm, rest) = line.split_once(" (")?;
        let (file, digest) = rest.rsplit_once(") = ")?;
        let is_token = |s: &str| !s.is_empty() && !s.contains(char::is_whitespace);
        if !is_token(algorithm) || file.is_empty() || !is_token(digest) {
            return None;
        }
        Some(Self {
            file: file.to_string(),
            digest: digest.to_string(),
            algorithm: algorithm.to_string(),
        })
    }

    /// `FILE  DIGEST`, algorithm inferred from the digest length
    fn parse_columns(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let (file, digest) = (fields.next()?, fields.next()?);
        if fields.next().is_some() {
            return None;
        }
        let algorithm = ChecksumAlgorithm::from_encoded_len(digest.len())?;
        Some(Self {
            file: file.to_string(),
            digest: digest.to_string(),
            algorithm: algorithm.name().to_string(),
        })
    }

    /// The digest as lowercase-comparable hex; base64 digests are recoded.
    fn hex_digest(&self, algorithm: ChecksumAlgorithm) -> Option<String> {
        if self.digest.len() == 2 * algorithm.digest_len() {
            return Some(self.digest.clone());
        }
        STANDARD.decode(&self.digest).ok().map(hex::encode)
    }
}

/// Outcome of a manifest check.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManifestReport {
    /// Files whose digest matched, in manifest order
    pub passed: Vec<String>,
    /// Files that failed or (with a filter) were never matched, sorted
    pub failed: Vec<String>,
}

impl ManifestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn any failure into [`EdsignError::ChecksumFailed`].
    pub fn into_result(self) -> EdsignResult<Vec<String>> {
        if self.failed.is_empty() {
            Ok(self.passed)
        } else {
            Err(EdsignError::ChecksumFailed(self.failed))
        }
    }
}

/// Check a single entry. Unknown algorithms abort the whole check; a bad
/// digest encoding or an unreadable file only fails this entry.
fn check_entry(base_dir: &Path, record: &ChecksumRecord) -> EdsignResult<bool> {
    let algorithm = ChecksumAlgorithm::from_name(&record.algorithm)?;
    let Some(expected) = record.hex_digest(algorithm) else {
        tracing::warn!(file = %record.file, "undecodable digest");
        return Ok(false);
    };
    match algorithm.hash_file(&base_dir.join(&record.file)) {
        Ok(actual) => Ok(actual == expected),
        Err(e) => {
            tracing::warn!(file = %record.file, "cannot hash file: {e}");
            Ok(false)
        }
    }
}

/// Check the files listed in an (already authenticated) manifest body.
///
/// Relative file names resolve against `base_dir`. With a non-empty `filter`
/// only those names are checked, and a filtered name that never passes is a
/// failure even if the manifest does not mention it.
pub fn verify_checksums(
    body: &[u8],
    filter: &[String],
    base_dir: &Path,
) -> EdsignResult<ManifestReport> {
    let text = std::str::from_utf8(body)
        .map_err(|_| EdsignError::ChecksumParse("manifest is not valid UTF-8".into()))?;
    let records = text
        .lines()
        .map(ChecksumRecord::parse)
        .collect::<EdsignResult<Vec<_>>>()?;

    let mut report = ManifestReport::default();
    let mut pending: BTreeSet<String>;

    if filter.is_empty() {
        pending = BTreeSet::new();
        for record in &records {
            if check_entry(base_dir, record)? {
                report.passed.push(record.file.clone());
            } else {
                pending.insert(record.file.clone());
            }
        }
    } else {
        pending = filter.iter().cloned().collect();
        for record in &records {
            if !pending.contains(&record.file) {
                continue;
            }
            if check_entry(base_dir, record)? {
                pending.remove(&record.file);
                report.passed.push(record.file.clone());
            }
        }
    }

    report.failed = pending.into_iter().collect();
    tracing::info!(
        entries = records.len(),
        passed = report.passed.len(),
        failed = report.failed.len(),
        "checked manifest"
    );
    Ok(report)
}

/// Authenticate a signed manifest and check the files it lists.
pub fn check_manifest(
    pubkey_path: Option<&Path>,
    sig_path: &Path,
    filter: &[String],
    base_dir: &Path,
) -> EdsignResult<ManifestReport> {
    let body = verify_embedded(pubkey_path, sig_path)?;
    verify_checksums(&body, filter, base_dir)
}
