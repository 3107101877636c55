//! Capability interface of a multi-algorithm digest engine.
//!
//! The rest of the crate talks to digests only through [`DigestEngine`] and
//! [`DigestContext`], so any implementation with the same contract can be
//! substituted (the integration tests use a deterministic, instrumented
//! stub). [`MultiEngine`] is the implementation shipped with the binaries.

mod multi;

pub use multi::{MultiContext, MultiEngine};

use serde::Serialize;
use std::io::{self, Read};

use crate::algorithm::{AlgorithmId, AlgorithmSet, Support};
use crate::cancel::CancelToken;
use crate::torrent::TorrentBuilder;

/// Bytes requested from the reader per `update` call.
pub const READ_CHUNK: usize = 64 * 1024;

/// Progress callback: receives the bytes streamed so far for the current call.
pub type ProgressFn<'a> = dyn FnMut(u64) + 'a;

/// How a streaming update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Completed,
    Interrupted,
}

/// Builds digest contexts.
pub trait DigestEngine {
    type Context: DigestContext;

    /// Create a context computing every algorithm in `ids` at once.
    /// Returns `None` when the engine cannot serve the request.
    fn init_multi(&self, ids: &[AlgorithmId]) -> Option<Self::Context>;

    /// Display name of an algorithm, if the engine knows it.
    fn name(&self, id: AlgorithmId) -> Option<&'static str> {
        Some(id.name())
    }

    /// Algorithms the engine can compute.
    fn supported(&self, source: Support) -> AlgorithmSet {
        crate::algorithm::supported_mask(source)
    }
}

/// A live multi-algorithm digest computation. Dropping it frees it.
pub trait DigestContext {
    /// The algorithms this context was built for.
    fn algorithms(&self) -> AlgorithmSet;

    /// Bytes fed since the context was created or last reset.
    fn msg_size(&self) -> u64;

    fn update(&mut self, data: &[u8]);

    /// Finish every algorithm and return the digest values.
    fn finalize(&mut self) -> Digests;

    /// Discard all message state, keeping the allocation.
    fn reset(&mut self);

    /// BitTorrent accumulation state, present when BTIH is selected.
    fn torrent(&self) -> Option<&TorrentBuilder> {
        None
    }

    fn torrent_mut(&mut self) -> Option<&mut TorrentBuilder> {
        None
    }

    /// Stream up to `max_size` bytes from `reader`.
    ///
    /// The cancellation token is polled before every chunk and the progress
    /// callback runs after every chunk. A read error is returned after the
    /// bytes read so far have been fed.
    fn update_from_reader(
        &mut self,
        reader: &mut dyn Read,
        max_size: u64,
        cancel: &CancelToken,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> io::Result<StreamStatus> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut done = 0u64;
        while done < max_size {
            if cancel.is_cancelled() {
                return Ok(StreamStatus::Interrupted);
            }
            let want = (max_size - done).min(READ_CHUNK as u64) as usize;
            let n = match reader.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.update(&buf[..n]);
            done += n as u64;
            if let Some(cb) = progress.as_deref_mut() {
                cb(done);
            }
        }
        Ok(StreamStatus::Completed)
    }
}

/// One finished digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestValue {
    pub algorithm: AlgorithmId,
    #[serde(serialize_with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

fn hex_bytes<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(bytes))
}

/// Digest values of one context, in canonical algorithm order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Digests(pub Vec<DigestValue>);

impl Digests {
    pub fn get(&self, id: AlgorithmId) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|d| d.algorithm == id)
            .map(|d| d.bytes.as_slice())
    }

    /// CRC32 as an integer, if computed.
    pub fn crc32(&self) -> Option<u32> {
        let bytes = self.get(AlgorithmId::Crc32)?;
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }

    pub fn hex(&self, id: AlgorithmId, uppercase: bool) -> Option<String> {
        self.get(id).map(|b| {
            if uppercase {
                hex::encode_upper(b)
            } else {
                hex::encode(b)
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DigestValue> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
