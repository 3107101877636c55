//! Drives one input through a digest session.

use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::algorithm::{AlgorithmId, AlgorithmSet};
use crate::cancel::CancelToken;
use crate::engine::{DigestContext, DigestEngine, Digests, ProgressFn, StreamStatus};
use crate::error::HashpassError;
use crate::session::{Acquired, DigestSession};
use crate::torrent::TorrentAccumulator;

/// Where the bytes of a task come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    /// Standard input. Never closed by the pipeline.
    Stdin,
    /// A message given on the command line.
    Memory(Vec<u8>),
}

impl FileSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileSource::Path(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Ok,
    Failed,
    Interrupted,
}

/// One input and what happened to it.
#[derive(Debug, Clone)]
pub struct FileTask {
    /// Path or label used in output.
    pub display: String,
    pub source: FileSource,
    /// Size known before digesting.
    pub size: u64,
    /// Bytes actually digested for this task.
    pub processed: u64,
    pub algorithms: AlgorithmSet,
    /// Context byte counter before this task's bytes were fed.
    pub msg_offset: u64,
    pub elapsed: Duration,
    pub status: TaskStatus,
    pub digests: Option<Digests>,
}

impl FileTask {
    fn new(display: String, source: FileSource, size: u64, algorithms: AlgorithmSet) -> Self {
        Self {
            display,
            source,
            size,
            processed: 0,
            algorithms,
            msg_offset: 0,
            elapsed: Duration::ZERO,
            status: TaskStatus::Pending,
            digests: None,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>, algorithms: AlgorithmSet) -> Self {
        let path = path.into();
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self::new(
            path.display().to_string(),
            FileSource::Path(path),
            size,
            algorithms,
        )
    }

    pub fn from_memory(label: &str, data: Vec<u8>, algorithms: AlgorithmSet) -> Self {
        let size = data.len() as u64;
        Self::new(label.to_string(), FileSource::Memory(data), size, algorithms)
    }

    pub fn stdin(algorithms: AlgorithmSet) -> Self {
        Self::new("(stdin)".to_string(), FileSource::Stdin, 0, algorithms)
    }

    pub fn is_dir(&self) -> bool {
        self.source.path().is_some_and(Path::is_dir)
    }

    pub fn crc32(&self) -> Option<u32> {
        self.digests.as_ref()?.crc32()
    }

    fn finish(&mut self, status: TaskStatus, start: Instant) {
        self.status = status;
        self.elapsed = start.elapsed();
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Verification run: directories are errors instead of being skipped.
    pub verify: bool,
    /// Leave the context unfinalized so more files can accumulate.
    pub defer_finalize: bool,
    /// Upper bound of bytes read from one input.
    pub max_size: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            verify: false,
            defer_finalize: false,
            max_size: u64::MAX,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("can't open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{}' is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error(transparent)]
    Fatal(#[from] HashpassError),
}

impl PipelineError {
    /// Fatal errors abort the run; the others only fail the current input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Fatal(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Interrupted,
}

/// Digest `task` with the session's context.
///
/// Unreadable inputs fail only this task. When the set includes BTIH and a
/// torrent accumulator is given, the input is registered before any byte is
/// digested. The cancellation token is honoured between read chunks; an
/// interrupted task is not finalized.
pub fn process<E: DigestEngine>(
    task: &mut FileTask,
    session: &mut DigestSession<E>,
    torrent: Option<&mut TorrentAccumulator>,
    opts: &PipelineOptions,
    cancel: &CancelToken,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<Outcome, PipelineError> {
    let start = Instant::now();

    if let FileSource::Path(path) = &task.source {
        if opts.verify && path.is_dir() {
            let err = PipelineError::IsDirectory(path.clone());
            task.finish(TaskStatus::Failed, start);
            return Err(err);
        }
    }

    if task.algorithms.is_empty() {
        task.processed = 0;
        task.finish(TaskStatus::Ok, start);
        return Ok(Outcome::Completed);
    }

    let mut file = match &task.source {
        FileSource::Path(path) => match File::open(path) {
            Ok(f) => Some(f),
            Err(source) => {
                let err = PipelineError::Open {
                    path: path.clone(),
                    source,
                };
                task.finish(TaskStatus::Failed, start);
                return Err(err);
            }
        },
        _ => None,
    };

    let (acquired, ctx) = session.acquire(task.algorithms)?;
    if task.algorithms.contains(AlgorithmId::Btih) {
        if let Some(acc) = torrent {
            acc.register(ctx, &task.display, task.size, acquired != Acquired::Continued)
                .map_err(HashpassError::from)?;
        }
    }

    let msg_offset = ctx.msg_size();
    let streamed = match (&task.source, file.as_mut()) {
        (FileSource::Memory(data), _) => {
            ctx.update(data);
            Ok(StreamStatus::Completed)
        }
        (FileSource::Stdin, _) => {
            let stdin = io::stdin();
            let mut lock = stdin.lock();
            ctx.update_from_reader(&mut lock, opts.max_size, cancel, progress)
        }
        (FileSource::Path(_), Some(f)) => ctx.update_from_reader(f, opts.max_size, cancel, progress),
        (FileSource::Path(path), None) => {
            return Err(HashpassError::Internal(format!("{} was not opened", path.display())).into())
        }
    };
    task.msg_offset = msg_offset;
    task.processed = ctx.msg_size() - msg_offset;

    match streamed {
        Err(source) => {
            let path = task
                .source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("-"));
            task.finish(TaskStatus::Failed, start);
            Err(PipelineError::Read { path, source })
        }
        Ok(StreamStatus::Interrupted) => {
            task.finish(TaskStatus::Interrupted, start);
            Ok(Outcome::Interrupted)
        }
        Ok(StreamStatus::Completed) => {
            if !opts.defer_finalize {
                task.digests = Some(ctx.finalize());
            }
            task.finish(TaskStatus::Ok, start);
            Ok(Outcome::Completed)
        }
    }
    // `file` is dropped here on every path; stdin is only ever locked.
}
