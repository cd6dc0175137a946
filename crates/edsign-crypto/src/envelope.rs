//! Text envelope codec shared by secret keys, public keys, and signatures.
//!
//! ```text
//! untrusted comment: <comment>\n
//! <standard base64 of the binary record>\n
//! <optional trailing message, verbatim>
//! ```
//!
//! The path `-` reads stdin / writes stdout.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use edsign_core::types::{COMMENT_HEADER, COMMENT_MAX_LEN, PKALG, STDIO_PATH};
use edsign_core::{EdsignError, EdsignResult};
use zeroize::Zeroize;

use crate::secure::SecureBuffer;

/// How an output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail if the file already exists (key generation).
    Exclusive,
    /// Create or overwrite (signatures, extracted messages).
    Truncate,
}

/// The three parts of an envelope.
#[derive(Debug)]
pub struct ParsedEnvelope {
    /// Comment text with the `untrusted comment: ` header stripped
    pub comment: String,
    /// Decoded binary record; starts with the `Ed` tag
    pub blob: SecureBuffer,
    /// Bytes following the base64 line (empty unless embedded)
    pub message: Vec<u8>,
}

/// Header plus comment must stay strictly below [`COMMENT_MAX_LEN`].
///
/// The same rule is applied when writing and when parsing.
pub fn check_comment_bound(comment: &str) -> EdsignResult<()> {
    if COMMENT_HEADER.len() + comment.len() >= COMMENT_MAX_LEN {
        return Err(EdsignError::CommentTooLong);
    }
    Ok(())
}

/// Split an envelope into comment, decoded record, and trailing message.
///
/// `label` names the source in error messages.
pub fn parse_envelope(input: &[u8], label: &str) -> EdsignResult<ParsedEnvelope> {
    let invalid_comment = || {
        EdsignError::Format(format!(
            "invalid comment in {label}; must start with '{COMMENT_HEADER}'"
        ))
    };

    let nl = input.iter().position(|&b| b == b'\n').ok_or_else(invalid_comment)?;
    let first = &input[..nl];
    if !first.starts_with(COMMENT_HEADER.as_bytes()) {
        return Err(invalid_comment());
    }
    if first.len() >= COMMENT_MAX_LEN {
        return Err(EdsignError::CommentTooLong);
    }
    let comment = String::from_utf8_lossy(&first[COMMENT_HEADER.len()..]).into_owned();

    let rest = &input[nl + 1..];
    let nl = rest.iter().position(|&b| b == b'\n').ok_or_else(|| {
        EdsignError::Format(format!("missing new line after base64 in {label}"))
    })?;
    let blob = STANDARD
        .decode(&rest[..nl])
        .map(SecureBuffer::from_vec)
        .map_err(|_| EdsignError::Format(format!("invalid base64 encoding in {label}")))?;
    if blob.len() < 2 || blob[..2] != PKALG {
        return Err(EdsignError::Format(format!("unsupported file {label}")));
    }

    Ok(ParsedEnvelope {
        comment,
        blob,
        message: rest[nl + 1..].to_vec(),
    })
}

/// Write `record` as an envelope to `path`.
///
/// The comment bound is checked before the file is touched. `permissions`
/// applies to newly created files on Unix (subject to umask).
pub fn write_envelope(
    path: &Path,
    comment: &str,
    record: &[u8],
    message: Option<&[u8]>,
    mode: CreateMode,
    permissions: u32,
) -> EdsignResult<()> {
    check_comment_bound(comment)?;

    let encoded = SecureBuffer::from_vec(STANDARD.encode(record).into_bytes());
    let mut out = open_output(path, mode, permissions)?;
    let write = |out: &mut dyn Write| -> std::io::Result<()> {
        out.write_all(COMMENT_HEADER.as_bytes())?;
        out.write_all(comment.as_bytes())?;
        out.write_all(b"\n")?;
        out.write_all(&encoded)?;
        out.write_all(b"\n")?;
        if let Some(msg) = message {
            out.write_all(msg)?;
        }
        out.flush()
    };
    write(out.as_mut()).map_err(|e| EdsignError::file(path, e))?;

    tracing::debug!(path = %path.display(), bytes = record.len(), "wrote envelope");
    Ok(())
}

/// Read and parse an envelope file. The raw text is wiped once parsed.
pub fn read_envelope(path: &Path) -> EdsignResult<ParsedEnvelope> {
    let raw = SecureBuffer::from_vec(read_input(path)?);
    parse_envelope(&raw, &path.display().to_string())
}

/// Read a message file (or stdin) fully into memory.
pub fn read_message(path: &Path) -> EdsignResult<Vec<u8>> {
    read_input(path)
}

/// Write an extracted message, replacing any existing file.
pub fn write_message(path: &Path, msg: &[u8]) -> EdsignResult<()> {
    let mut out = open_output(path, CreateMode::Truncate, 0o666)?;
    out.write_all(msg)
        .and_then(|_| out.flush())
        .map_err(|e| EdsignError::file(path, e))
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

fn read_input(path: &Path) -> EdsignResult<Vec<u8>> {
    if is_stdio(path) {
        return read_all_wiping(&mut std::io::stdin().lock(), 0)
            .map_err(|e| EdsignError::file(path, e));
    }

    let mut file = std::fs::File::open(path).map_err(|e| EdsignError::file(path, e))?;
    let meta = file.metadata().map_err(|e| EdsignError::file(path, e))?;
    if meta.is_dir() {
        return Err(EdsignError::NotAFile(path.display().to_string()));
    }
    read_all_wiping(&mut file, meta.len() as usize).map_err(|e| EdsignError::file(path, e))
}

const READ_CHUNK: usize = 8192;

/// Read `reader` to EOF without leaving stale copies behind.
///
/// Inputs may hold secret keys, so every buffer discarded while growing (and
/// the partial result on error) is zeroed before it is freed.
fn read_all_wiping<R: Read>(reader: &mut R, size_hint: usize) -> std::io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::with_capacity(size_hint.max(READ_CHUNK));
    let mut chunk = [0u8; READ_CHUNK];
    let result = loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        };
        if buf.capacity() - buf.len() < n {
            let mut grown = Vec::with_capacity((buf.capacity() * 2).max(buf.len() + n));
            grown.extend_from_slice(&buf);
            buf.zeroize();
            buf = grown;
        }
        buf.extend_from_slice(&chunk[..n]);
    };
    chunk.zeroize();

    match result {
        Ok(()) => Ok(buf),
        Err(e) => {
            buf.zeroize();
            Err(e)
        }
    }
}

fn open_output(path: &Path, mode: CreateMode, permissions: u32) -> EdsignResult<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(std::io::stdout()));
    }
    if path.is_dir() {
        return Err(EdsignError::NotAFile(path.display().to_string()));
    }

    let mut opts = OpenOptions::new();
    opts.write(true);
    match mode {
        CreateMode::Exclusive => opts.create_new(true),
        CreateMode::Truncate => opts.create(true).truncate(true),
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(permissions);
    }
    #[cfg(not(unix))]
    let _ = permissions;

    let file = opts.open(path).map_err(|e| EdsignError::file(path, e))?;
    Ok(Box::new(file))
}
