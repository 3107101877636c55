//! Throughput and cycles-per-byte measurement of digest algorithms.
//!
//! Every round digests a deterministic message built by repeating a small
//! buffer, so two runs over the same engine feed identical bytes. The
//! optional cycle measurement keeps the minimum of many trials for one and
//! for two passes and reports the difference per byte, which removes both
//! scheduler noise and the fixed per-call overhead.

use log::debug;
use std::time::{Duration, Instant};

use crate::algorithm::{AlgorithmId, AlgorithmSet, MAX_ALGORITHMS};
use crate::cancel::CancelToken;
use crate::cycles::CycleSource;
use crate::engine::{DigestContext, DigestEngine, Digests};
use crate::error::HashpassError;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BenchmarkOptions {
    pub rounds: u32,
    /// Size of the repeated message buffer.
    pub buffer_size: usize,
    /// Workload per round before cost scaling.
    pub base_size: u64,
    /// Single tab separated output line.
    pub raw: bool,
    /// Measure cycles per byte when a cycle counter exists.
    pub cycles: bool,
    pub cycle_trials: u32,
    pub cycle_workload: usize,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            rounds: 4,
            buffer_size: 8 * 1024,
            base_size: 512 * MIB,
            raw: false,
            cycles: false,
            cycle_trials: 200,
            cycle_workload: 128 * 1024,
        }
    }
}

/// Workload per round for `set`: slow algorithm families digest less.
pub fn scaled_size(set: AlgorithmSet, base: u64) -> u64 {
    let sha3 = [
        AlgorithmId::Sha3_224,
        AlgorithmId::Sha3_256,
        AlgorithmId::Sha3_384,
        AlgorithmId::Sha3_512,
    ];
    if sha3.iter().any(|id| set.contains(*id)) {
        base / 8
    } else if set.contains(AlgorithmId::Sha384) || set.contains(AlgorithmId::Sha512) {
        base / 2
    } else {
        base
    }
}

/// The repeated message buffer: byte `i` is `i & 0xff`.
pub fn message_buffer(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i & 0xff) as u8).collect()
}

#[derive(Debug, Clone)]
pub struct RoundSample {
    pub bytes: u64,
    pub elapsed: Duration,
    pub digests: Digests,
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    /// Algorithm name; `None` for an unnamed raw run over several algorithms.
    pub name: Option<String>,
    pub algorithms: AlgorithmSet,
    pub rounds: Vec<RoundSample>,
    pub cycles_per_byte: Option<f64>,
}

fn mib(bytes: u64) -> u64 {
    bytes / MIB
}

fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB as f64 / secs
    } else {
        0.0
    }
}

impl BenchmarkReport {
    pub fn total_bytes(&self) -> u64 {
        self.rounds.iter().map(|r| r.bytes).sum()
    }

    pub fn total_time(&self) -> Duration {
        self.rounds.iter().map(|r| r.elapsed).sum()
    }

    /// Aggregate throughput in bytes per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.total_time().as_secs_f64();
        if secs > 0.0 {
            self.total_bytes() as f64 / secs
        } else {
            0.0
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// `name\tMiB\tseconds\tMBps[\tcpb]`
    pub fn raw_line(&self) -> String {
        let total = self.total_bytes();
        let time = self.total_time();
        let mut line = format!(
            "{}\t{}\t{:.3}\t{:.3}",
            self.label(),
            mib(total),
            time.as_secs_f64(),
            mbps(total, time)
        );
        if let Some(cpb) = self.cycles_per_byte {
            line.push_str(&format!("\t{cpb:.2}"));
        }
        line
    }

    pub fn round_line(&self, sample: &RoundSample) -> String {
        format!(
            "{} {} MiB calculated in {:.3} sec, {:.3} MBps",
            self.label(),
            mib(sample.bytes),
            sample.elapsed.as_secs_f64(),
            mbps(sample.bytes, sample.elapsed)
        )
    }

    pub fn total_line(&self) -> String {
        let total = self.total_bytes();
        let time = self.total_time();
        let mut line = format!(
            "{} {} MiB total in {:.3} sec, {:.3} MBps",
            self.label(),
            mib(total),
            time.as_secs_f64(),
            mbps(total, time)
        );
        if let Some(cpb) = self.cycles_per_byte {
            line.push_str(&format!(", CPB={cpb:.2}"));
        }
        line
    }

    /// One line per round followed by the total.
    pub fn human_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.rounds.iter().map(|r| self.round_line(r)).collect();
        lines.push(self.total_line());
        lines
    }
}

#[derive(Debug)]
pub enum BenchmarkOutcome {
    Completed(BenchmarkReport),
    Interrupted,
}

/// Runs benchmark rounds directly on an engine, without a session.
pub struct BenchmarkEngine<'a, E: DigestEngine> {
    engine: &'a E,
    opts: BenchmarkOptions,
    cancel: &'a CancelToken,
}

impl<'a, E: DigestEngine> BenchmarkEngine<'a, E> {
    pub fn new(engine: &'a E, opts: BenchmarkOptions, cancel: &'a CancelToken) -> Self {
        Self {
            engine,
            opts,
            cancel,
        }
    }

    pub fn options(&self) -> &BenchmarkOptions {
        &self.opts
    }

    /// Benchmark `set`. Cycles are measured only when requested and a
    /// counter is given.
    pub fn run(
        &self,
        set: AlgorithmSet,
        cycles: Option<&mut dyn CycleSource>,
    ) -> Result<BenchmarkOutcome, HashpassError> {
        let name = match set.single() {
            Some(id) => self.engine.name(id).map(str::to_string),
            None => None,
        };
        if name.is_none() && !self.opts.raw {
            return Err(HashpassError::Config(format!(
                "benchmark of [{set}] needs exactly one named algorithm or raw output"
            )));
        }
        let ids = set.to_identifier_list(MAX_ALGORITHMS)?;
        let buffer = message_buffer(self.opts.buffer_size.max(1));
        let size = scaled_size(set, self.opts.base_size);

        let mut rounds = Vec::with_capacity(self.opts.rounds as usize);
        for round in 0..self.opts.rounds {
            if self.cancel.is_cancelled() {
                return Ok(BenchmarkOutcome::Interrupted);
            }
            let start = Instant::now();
            let mut ctx = self.init(&ids, set)?;
            if !self.feed(&mut ctx, &buffer, size) {
                return Ok(BenchmarkOutcome::Interrupted);
            }
            let digests = ctx.finalize();
            let elapsed = start.elapsed();
            debug!("round {round}: {size} bytes in {elapsed:?}");
            rounds.push(RoundSample {
                bytes: size,
                elapsed,
                digests,
            });
        }

        let cycles_per_byte = match cycles {
            Some(counter) if self.opts.cycles => {
                match self.measure_cycles(&ids, set, &buffer, counter)? {
                    Some(cpb) => Some(cpb),
                    None => return Ok(BenchmarkOutcome::Interrupted),
                }
            }
            _ => None,
        };

        Ok(BenchmarkOutcome::Completed(BenchmarkReport {
            name,
            algorithms: set,
            rounds,
            cycles_per_byte,
        }))
    }

    fn init(&self, ids: &[AlgorithmId], set: AlgorithmSet) -> Result<E::Context, HashpassError> {
        self.engine
            .init_multi(ids)
            .ok_or_else(|| HashpassError::EngineInit(set.to_string()))
    }

    /// Feed `size` bytes of the repeated buffer. `false` when cancelled.
    fn feed(&self, ctx: &mut E::Context, buffer: &[u8], size: u64) -> bool {
        let mut left = size;
        while left > 0 {
            if self.cancel.is_cancelled() {
                return false;
            }
            let n = left.min(buffer.len() as u64) as usize;
            ctx.update(&buffer[..n]);
            left -= n as u64;
        }
        true
    }

    /// Cycles spent on `passes` back-to-back digests of the cycle workload.
    fn timed_pass(
        &self,
        ids: &[AlgorithmId],
        set: AlgorithmSet,
        buffer: &[u8],
        passes: u32,
        counter: &mut dyn CycleSource,
    ) -> Result<Option<u64>, HashpassError> {
        let workload = self.opts.cycle_workload as u64;
        let start = counter.now();
        for _ in 0..passes {
            let mut ctx = self.init(ids, set)?;
            if !self.feed(&mut ctx, buffer, workload) {
                return Ok(None);
            }
            ctx.finalize();
        }
        Ok(Some(counter.now().saturating_sub(start)))
    }

    /// `(min two-pass - min one-pass) / workload`; `None` when cancelled.
    fn measure_cycles(
        &self,
        ids: &[AlgorithmId],
        set: AlgorithmSet,
        buffer: &[u8],
        counter: &mut dyn CycleSource,
    ) -> Result<Option<f64>, HashpassError> {
        let mut one = u64::MAX;
        let mut two = u64::MAX;
        for _ in 0..self.opts.cycle_trials.max(1) {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            match self.timed_pass(ids, set, buffer, 1, counter)? {
                Some(c) => one = one.min(c),
                None => return Ok(None),
            }
            match self.timed_pass(ids, set, buffer, 2, counter)? {
                Some(c) => two = two.min(c),
                None => return Ok(None),
            }
        }
        let workload = self.opts.cycle_workload.max(1) as f64;
        Ok(Some(two.saturating_sub(one) as f64 / workload))
    }
}
