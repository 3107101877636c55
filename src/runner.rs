//! Runs a list of inputs through the pipeline and acts on each result.
//!
//! Per file: digest, optionally embed the CRC32 into the name, optionally
//! save a torrent, print the result line, optionally print speed. In batch
//! torrent mode every file feeds one torrent that is saved once after the
//! last file.

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::algorithm::AlgorithmSet;
use crate::cancel::CancelToken;
use crate::config::{Config, RunMode};
use crate::embed::{self, EmbedOutcome};
use crate::engine::{DigestContext, DigestEngine, ProgressFn};
use crate::error::HashpassError;
use crate::io_utils::format_io_error;
use crate::pipeline::{
    self, FileSource, FileTask, Outcome, PipelineError, PipelineOptions, TaskStatus,
};
use crate::report::{self, FileResult};
use crate::session::{DigestSession, SessionMode};
use crate::torrent::{torrent_path, TorrentAccumulator, TorrentError};

const BAR_STYLE: &str = "{msg} [{elapsed_precise}] {wide_bar} {percent}% ({bytes_per_sec})";

static BAR_TEMPLATE: Lazy<Option<ProgressStyle>> =
    Lazy::new(|| ProgressStyle::with_template(BAR_STYLE).ok());

fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Some(style) = BAR_TEMPLATE.as_ref() {
        bar.set_style(style.clone());
    }
    bar.set_message(label.to_string());
    bar
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Inputs digested to completion.
    pub processed: u64,
    pub ok: u64,
    /// Inputs with a recoverable error.
    pub failed: u64,
    /// Embedded checksums that did not match (check mode).
    pub mismatches: u64,
    /// Inputs without an embedded checksum (check mode).
    pub missing: u64,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn has_errors(&self) -> bool {
        self.failed > 0 || self.mismatches > 0 || self.missing > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

pub struct Runner<E: DigestEngine, W: Write> {
    config: Config,
    algorithms: AlgorithmSet,
    session: DigestSession<E>,
    torrent: Option<TorrentAccumulator>,
    cancel: CancelToken,
    out: W,
    results: Vec<FileResult>,
    stats: RunStats,
}

impl<E: DigestEngine, W: Write> Runner<E, W> {
    pub fn new(engine: E, config: Config, cancel: CancelToken, out: W) -> Self {
        let mode = if config.is_batch_torrent() {
            SessionMode::Batch
        } else {
            SessionMode::PerFile
        };
        let torrent = config.torrent.clone().map(TorrentAccumulator::new);
        Self {
            algorithms: config.effective_algorithms(),
            config,
            session: DigestSession::new(engine, mode),
            torrent,
            cancel,
            out,
            results: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn session(&self) -> &DigestSession<E> {
        &self.session
    }

    pub fn results(&self) -> &[FileResult] {
        &self.results
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Process every task. Only fatal errors are returned; per-file failures
    /// are logged and counted.
    pub fn run(&mut self, mut tasks: Vec<FileTask>) -> Result<RunStatus, HashpassError> {
        self.config.validate()?;
        let start = Instant::now();
        if let Some(acc) = self.torrent.as_mut() {
            if acc.is_batch() {
                acc.set_batch_size(tasks.iter().map(|t| t.size).sum());
            }
        }

        for task in tasks.iter_mut() {
            if self.process_one(task)? == Outcome::Interrupted {
                self.stats.elapsed = start.elapsed();
                return Ok(RunStatus::Interrupted);
            }
        }

        self.finish_batch_torrent();
        self.stats.elapsed = start.elapsed();

        if self.config.json {
            if let Err(e) = self.write_json() {
                error!("failed to write results: {e}");
                self.stats.failed += 1;
            }
        }
        if self.config.speed {
            let line = report::summary_line(
                self.stats.processed,
                self.stats.total_bytes,
                self.stats.elapsed,
            );
            if let Err(e) = writeln!(self.out, "{line}") {
                error!("failed to write results: {e}");
            }
        }
        Ok(RunStatus::Completed)
    }

    /// Digest one input and act on the result.
    pub fn process_one(&mut self, task: &mut FileTask) -> Result<Outcome, HashpassError> {
        let verify = self.config.mode == RunMode::CheckEmbedded;
        if !verify && task.is_dir() {
            debug!("skipping directory {}", task.display);
            return Ok(Outcome::Completed);
        }
        task.algorithms = self.algorithms;

        let opts = PipelineOptions {
            verify,
            defer_finalize: self.session.mode() == SessionMode::Batch,
            max_size: self.config.max_size,
        };
        let bar = self
            .config
            .percents
            .then(|| progress_bar(task.size, &task.display));
        let mut update = |done: u64| {
            if let Some(b) = &bar {
                b.set_position(done);
            }
        };
        let progress: Option<&mut ProgressFn<'_>> = if bar.is_some() {
            Some(&mut update)
        } else {
            None
        };

        let result = pipeline::process(
            task,
            &mut self.session,
            self.torrent.as_mut(),
            &opts,
            &self.cancel,
            progress,
        );
        if let Some(b) = &bar {
            b.finish_and_clear();
        }

        match result {
            Err(PipelineError::Fatal(e)) => Err(e),
            Err(e) => {
                error!("{e}");
                self.stats.failed += 1;
                self.results.push(FileResult::from_task(task).with_error(&e));
                Ok(Outcome::Completed)
            }
            Ok(Outcome::Interrupted) => Ok(Outcome::Interrupted),
            Ok(Outcome::Completed) => {
                self.stats.processed += 1;
                self.stats.total_bytes += task.processed;
                match self.config.mode {
                    RunMode::CheckEmbedded => self.check_embedded(task),
                    RunMode::Calculate => self.finish_calculated(task),
                }
                Ok(Outcome::Completed)
            }
        }
    }

    fn check_embedded(&mut self, task: &FileTask) {
        let mut result = FileResult::from_task(task);
        let embedded = match &task.source {
            FileSource::Path(p) => embed::find_embedded(p),
            _ => embed::find_embedded_in_name(&task.display),
        };
        let verdict = match (embedded, task.crc32()) {
            (None, _) => {
                warn!("{}: file name doesn't contain a CRC32", task.display);
                self.stats.missing += 1;
                result.error = Some("no embedded CRC32".into());
                "NO CRC"
            }
            (Some(want), Some(got)) if want == got => {
                self.stats.ok += 1;
                "OK"
            }
            (Some(want), got) => {
                warn!(
                    "{}: embedded CRC32 {want:08X} does not match {}",
                    task.display,
                    got.map(|c| format!("{c:08X}")).unwrap_or_default()
                );
                self.stats.mismatches += 1;
                result.error = Some("CRC32 mismatch".into());
                "ERR"
            }
        };
        if self.config.json {
            self.results.push(result);
        } else if let Err(e) = writeln!(self.out, "{}  {verdict}", task.display) {
            error!("failed to write results: {e}");
            self.stats.failed += 1;
        }
    }

    fn finish_calculated(&mut self, task: &mut FileTask) {
        let mut result = FileResult::from_task(task);
        let mut failed = false;

        if let (Some(opts), Some(crc)) = (self.config.embed, task.crc32()) {
            match embed::embed(&task.source, crc, &opts) {
                Ok(EmbedOutcome::Renamed(to)) => {
                    result.renamed_to = Some(to.display().to_string());
                    task.source = FileSource::Path(to);
                }
                Ok(_) => {}
                Err(e) => {
                    error!("{e}");
                    result.error = Some(e.to_string());
                    failed = true;
                }
            }
        }

        if !self.config.is_batch_torrent() {
            if let Some(acc) = self.torrent.as_mut() {
                match (task.source.path(), self.session.context_mut()) {
                    (Some(path), Some(ctx)) => {
                        if let Err(e) = acc.save(&torrent_path(path), ctx) {
                            log_torrent_error(&e);
                            result.error = Some(e.to_string());
                            failed = true;
                        }
                    }
                    (None, _) => warn!("no torrent written for {}", task.display),
                    (_, None) => {}
                }
            }

            if let Err(e) = self.print_result(&result) {
                error!("failed to write results: {e}");
                failed = true;
            }
        }

        if self.config.speed {
            let line = report::speed_line(&task.display, task.processed, task.elapsed);
            if let Err(e) = writeln!(self.out, "{line}") {
                error!("failed to write results: {e}");
                failed = true;
            }
        }

        if failed {
            self.stats.failed += 1;
            result.status = TaskStatus::Failed;
        } else {
            self.stats.ok += 1;
        }
        if self.config.json {
            self.results.push(result);
        }
    }

    fn print_result(&mut self, result: &FileResult) -> io::Result<()> {
        if self.config.json {
            return Ok(());
        }
        writeln!(self.out, "{}", report::text_line(result, !self.config.lowercase))
    }

    fn finish_batch_torrent(&mut self) {
        let Some(path) = self
            .config
            .torrent
            .as_ref()
            .and_then(|t| t.batch_file.clone())
        else {
            return;
        };
        let Some(acc) = self.torrent.as_mut() else {
            return;
        };
        if acc.entries().is_empty() {
            warn!("no files were added to {}", path.display());
            return;
        }
        let Some(ctx) = self.session.context_mut() else {
            return;
        };
        ctx.finalize();
        if let Err(e) = acc.save(&path, ctx) {
            log_torrent_error(&e);
            self.stats.failed += 1;
        }
    }

    fn write_json(&mut self) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, &self.results)?;
        self.out.write_all(b"\n")
    }
}

fn log_torrent_error(err: &TorrentError) {
    match err {
        TorrentError::Save { path, source } => {
            error!("{}", format_io_error("save torrent", path, source))
        }
        other => error!("{other}"),
    }
}
