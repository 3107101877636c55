//! Error message helpers for the binaries and the run driver.
use std::fmt;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub struct CliError {
    pub msg: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

const ENOSPC: i32 = 28;
const EISDIR: i32 = 21;

fn io_suggestion(err: &io::Error) -> Option<&'static str> {
    match (err.kind(), err.raw_os_error()) {
        (io::ErrorKind::NotFound, _) => Some("check that the directory exists"),
        (io::ErrorKind::PermissionDenied, _) => Some("check write permission on the directory"),
        (io::ErrorKind::WriteZero, _) | (_, Some(ENOSPC)) => Some("the disk may be full"),
        (_, Some(EISDIR)) => Some("a directory is in the way, move it aside"),
        _ => None,
    }
}

/// `can't <operation> '<path>': <error>`, plus a hint for common causes.
pub fn format_io_error(operation: &str, path: &Path, err: &io::Error) -> String {
    let msg = format!("can't {operation} '{}': {err}", path.display());
    match io_suggestion(err) {
        Some(hint) => format!("{msg} ({hint})"),
        None => msg,
    }
}

pub fn simple_cli_error(msg: &str) -> CliError {
    CliError {
        msg: msg.to_string(),
        source: None,
    }
}

/// Wrap a library error with context and a hint.
pub fn hashpass_cli_error(context: &str, err: crate::HashpassError) -> CliError {
    CliError {
        msg: format!("{}: {}", context, cli_hint(&err)),
        source: Some(Box::new(err)),
    }
}

/// Actionable hint for a library error.
pub fn cli_hint(err: &crate::HashpassError) -> String {
    use crate::HashpassError::*;
    match err {
        Algorithm(e) => format!("{e}. Run with --list-hashes to see the known names."),
        EngineInit(set) => format!("digest engine failed for [{set}]. This is a bug."),
        Torrent(e) => format!("{e}. Check the destination directory."),
        Config(msg) => format!("{msg}. Invalid configuration."),
        Io(io) => format!("{io}"),
        Internal(msg) => format!("{msg}. This is a bug."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlgorithmError;

    #[test]
    fn io_error_names_the_path() {
        let err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let msg = format_io_error("save torrent", Path::new("x.bin.torrent"), &err);
        assert_eq!(
            msg,
            "can't save torrent 'x.bin.torrent': missing (check that the directory exists)"
        );
    }

    #[test]
    fn directory_in_the_way() {
        let err = io::Error::from_raw_os_error(EISDIR);
        let msg = format_io_error("save torrent", Path::new("a.torrent"), &err);
        assert!(msg.ends_with("(a directory is in the way, move it aside)"));

        let other = io::Error::new(io::ErrorKind::Other, "odd");
        assert_eq!(
            format_io_error("save torrent", Path::new("a"), &other),
            "can't save torrent 'a': odd"
        );
    }

    #[test]
    fn hint_for_unknown_algorithm() {
        let err = crate::HashpassError::from(AlgorithmError::UnknownName("foo".into()));
        let cli = hashpass_cli_error("parsing --algo", err);
        assert!(cli.to_string().starts_with("parsing --algo: unknown algorithm 'foo'"));
        assert!(std::error::Error::source(&cli).is_some());
    }
}
