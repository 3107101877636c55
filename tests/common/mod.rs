#![allow(dead_code)]

use hashpass::algorithm::{AlgorithmId, AlgorithmSet};
use hashpass::cycles::CycleSource;
use hashpass::engine::{DigestContext, DigestEngine, DigestValue, Digests};
use hashpass::torrent::TorrentBuilder;
use hashpass::CancelToken;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic engine that counts context creations and digested bytes.
#[derive(Clone, Default)]
pub struct StubEngine {
    inits: Rc<Cell<u64>>,
    bytes: Rc<Cell<u64>>,
    /// Cancel the token once this many bytes were digested in total.
    trip: Option<(u64, CancelToken)>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(limit: u64, token: CancelToken) -> Self {
        Self {
            trip: Some((limit, token)),
            ..Self::default()
        }
    }

    pub fn inits(&self) -> u64 {
        self.inits.get()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.get()
    }

    /// Cycle source advancing `per_byte` cycles for every digested byte.
    pub fn clock(&self, per_byte: u64) -> ByteClock {
        ByteClock {
            bytes: Rc::clone(&self.bytes),
            per_byte,
        }
    }
}

pub struct StubContext {
    set: AlgorithmSet,
    state: u64,
    msg_size: u64,
    torrent: Option<TorrentBuilder>,
    bytes: Rc<Cell<u64>>,
    trip: Option<(u64, CancelToken)>,
}

impl DigestEngine for StubEngine {
    type Context = StubContext;

    fn init_multi(&self, ids: &[AlgorithmId]) -> Option<StubContext> {
        if ids.is_empty() {
            return None;
        }
        self.inits.set(self.inits.get() + 1);
        let set = AlgorithmSet::from_identifier_list(ids);
        Some(StubContext {
            set,
            state: FNV_OFFSET,
            msg_size: 0,
            torrent: set.contains(AlgorithmId::Btih).then(TorrentBuilder::new),
            bytes: Rc::clone(&self.bytes),
            trip: self.trip.clone(),
        })
    }
}

impl DigestContext for StubContext {
    fn algorithms(&self) -> AlgorithmSet {
        self.set
    }

    fn msg_size(&self) -> u64 {
        self.msg_size
    }

    fn update(&mut self, data: &[u8]) {
        for b in data {
            self.state = (self.state ^ *b as u64).wrapping_mul(FNV_PRIME);
        }
        if let Some(t) = self.torrent.as_mut() {
            t.update(data);
        }
        self.msg_size += data.len() as u64;
        let total = self.bytes.get() + data.len() as u64;
        self.bytes.set(total);
        if let Some((limit, token)) = &self.trip {
            if total >= *limit {
                token.cancel();
            }
        }
    }

    fn finalize(&mut self) -> Digests {
        let mut values = Vec::new();
        for id in self.set.iter() {
            let bytes = match (id, self.torrent.as_mut()) {
                (AlgorithmId::Btih, Some(t)) => t.info_hash().to_vec(),
                _ => (0..id.digest_len())
                    .map(|i| (self.state >> ((i % 8) * 8)) as u8 ^ id.bit_index() as u8)
                    .collect(),
            };
            values.push(DigestValue { algorithm: id, bytes });
        }
        Digests(values)
    }

    fn reset(&mut self) {
        self.state = FNV_OFFSET;
        self.msg_size = 0;
        if let Some(t) = self.torrent.as_mut() {
            t.clear();
        }
    }

    fn torrent(&self) -> Option<&TorrentBuilder> {
        self.torrent.as_ref()
    }

    fn torrent_mut(&mut self) -> Option<&mut TorrentBuilder> {
        self.torrent.as_mut()
    }
}

pub struct ByteClock {
    bytes: Rc<Cell<u64>>,
    per_byte: u64,
}

impl CycleSource for ByteClock {
    fn now(&mut self) -> u64 {
        self.bytes.get() * self.per_byte
    }
}

pub fn set_of(ids: &[AlgorithmId]) -> AlgorithmSet {
    AlgorithmSet::from_identifier_list(ids)
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}
