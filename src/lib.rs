//! Multi-algorithm file digesting with CRC32 filename embedding, BitTorrent
//! metadata output and a digest benchmark.
//!
//! A run owns one [`DigestSession`] that reuses a single digest context
//! across files; [`pipeline::process`] streams each input through it and the
//! [`Runner`] acts on the results.

pub mod algorithm;
pub mod benchmark;
pub mod cancel;
pub mod config;
pub mod cycles;
pub mod embed;
pub mod engine;
mod error;
pub mod io_utils;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod session;
pub mod torrent;

pub use algorithm::{AlgorithmError, AlgorithmId, AlgorithmSet, Support, MAX_ALGORITHMS};
pub use benchmark::{BenchmarkEngine, BenchmarkOptions, BenchmarkOutcome, BenchmarkReport};
pub use cancel::CancelToken;
pub use config::{Config, RunMode};
pub use embed::{find_embedded, EmbedOptions, EmbedOutcome};
pub use engine::{DigestContext, DigestEngine, Digests, MultiEngine};
pub use error::HashpassError;
pub use pipeline::{FileSource, FileTask, Outcome, PipelineError, PipelineOptions};
pub use runner::{RunStats, RunStatus, Runner};
pub use session::{Acquired, DigestSession, SessionMode};
pub use torrent::{TorrentAccumulator, TorrentSettings};
