//! CRC32 checksums embedded in file names, e.g. `episode_[A1B2C3D4].mkv`.

use log::{debug, warn};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::FileSource;

/// Width of a bracketed checksum token: two brackets and eight hex digits.
const TOKEN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedOptions {
    /// Print the checksum with lowercase hex digits.
    pub lowercase: bool,
    /// Character placed before the opening bracket.
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// Stdin or a command-line message.
    Skipped,
    /// The name already carries the right checksum.
    Unchanged,
    Renamed(PathBuf),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("can't move {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Checksum embedded in the file name of `path`.
pub fn find_embedded(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_string_lossy();
    find_embedded_in_name(&name)
}

/// Search `name` backwards for `[XXXXXXXX]` or `(XXXXXXXX)`.
///
/// The rightmost well formed token wins. A bracket pair of the right width
/// around non-hex characters is skipped as a whole.
pub fn find_embedded_in_name(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    if bytes.len() < TOKEN_LEN {
        return None;
    }
    let mut e = bytes.len() - TOKEN_LEN;
    loop {
        let open = bytes[e];
        let close = bytes[e + TOKEN_LEN - 1];
        if (open == b'[' && close == b']') || (open == b'(' && close == b')') {
            let digits = &bytes[e + 1..e + TOKEN_LEN - 1];
            if digits.iter().all(u8::is_ascii_hexdigit) {
                // all-ascii slice, so the conversion cannot fail
                let text = std::str::from_utf8(digits).ok()?;
                return u32::from_str_radix(text, 16).ok();
            }
            if e < TOKEN_LEN - 1 {
                return None;
            }
            e -= TOKEN_LEN - 1;
        }
        if e == 0 {
            return None;
        }
        e -= 1;
    }
}

/// `[A1B2C3D4]`, optionally preceded by the delimiter.
pub fn checksum_token(crc: u32, opts: &EmbedOptions) -> String {
    let mut token = String::with_capacity(TOKEN_LEN + 1);
    if let Some(d) = opts.delimiter {
        token.push(d);
    }
    if opts.lowercase {
        token.push_str(&format!("[{crc:08x}]"));
    } else {
        token.push_str(&format!("[{crc:08X}]"));
    }
    token
}

/// `dir/name.ext` becomes `dir/name<token>.ext`. `None` without an extension.
pub fn insert_before_extension(path: &Path, token: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?;
    let ext = path.extension()?;
    let mut name = OsString::from(stem);
    name.push(token);
    name.push(".");
    name.push(ext);
    Some(path.with_file_name(name))
}

/// `dir/name` becomes `dir/name<token>`.
pub fn append_suffix(path: &Path, token: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(token);
    PathBuf::from(s)
}

/// Path of `path` once `crc` is embedded in it.
pub fn embedded_path(path: &Path, crc: u32, opts: &EmbedOptions) -> PathBuf {
    let token = checksum_token(crc, opts);
    insert_before_extension(path, &token).unwrap_or_else(|| append_suffix(path, &token))
}

/// Rename the file behind `source` so that its name carries `crc`.
pub fn embed(source: &FileSource, crc: u32, opts: &EmbedOptions) -> Result<EmbedOutcome, EmbedError> {
    match source {
        FileSource::Path(path) => embed_path(path, crc, opts),
        FileSource::Stdin | FileSource::Memory(_) => Ok(EmbedOutcome::Skipped),
    }
}

pub fn embed_path(path: &Path, crc: u32, opts: &EmbedOptions) -> Result<EmbedOutcome, EmbedError> {
    if let Some(found) = find_embedded(path) {
        if found == crc {
            debug!("{} already carries its checksum", path.display());
            return Ok(EmbedOutcome::Unchanged);
        }
        let bare = EmbedOptions {
            delimiter: None,
            ..*opts
        };
        let token = checksum_token(crc, &bare);
        warn!(
            "{}: wrong embedded CRC32, should be {}",
            path.display(),
            &token[1..TOKEN_LEN - 1]
        );
    }

    let target = embedded_path(path, crc, opts);
    let rename_err = |source| EmbedError::Rename {
        from: path.to_path_buf(),
        to: target.clone(),
        source,
    };
    if target.exists() {
        return Err(rename_err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "destination exists",
        )));
    }
    fs::rename(path, &target).map_err(rename_err)?;
    Ok(EmbedOutcome::Renamed(target))
}
