use digest::DynDigest;
use log::trace;

use super::{DigestContext, DigestEngine, DigestValue, Digests};
use crate::algorithm::{AlgorithmId, AlgorithmSet};
use crate::torrent::TorrentBuilder;

/// Digest engine backed by the RustCrypto hashes, `crc32fast` and `blake3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiEngine;

impl DigestEngine for MultiEngine {
    type Context = MultiContext;

    fn init_multi(&self, ids: &[AlgorithmId]) -> Option<MultiContext> {
        if ids.is_empty() {
            return None;
        }
        let set = AlgorithmSet::from_identifier_list(ids);
        let mut hashers = Vec::with_capacity(set.len());
        let mut torrent = None;
        for id in set.iter() {
            match id {
                AlgorithmId::Btih => torrent = Some(TorrentBuilder::new()),
                other => hashers.push((other, Hasher::new(other)?)),
            }
        }
        trace!("initialized digest context for [{set}]");
        Some(MultiContext {
            set,
            hashers,
            torrent,
            msg_size: 0,
        })
    }
}

enum Hasher {
    Crc32(crc32fast::Hasher),
    Blake3(Box<blake3::Hasher>),
    Dyn(Box<dyn DynDigest + Send>),
}

impl Hasher {
    fn new(id: AlgorithmId) -> Option<Self> {
        let h = match id {
            AlgorithmId::Crc32 => Hasher::Crc32(crc32fast::Hasher::new()),
            AlgorithmId::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            AlgorithmId::Md5 => Hasher::Dyn(Box::new(md5::Md5::default())),
            AlgorithmId::Sha1 => Hasher::Dyn(Box::new(sha1::Sha1::default())),
            AlgorithmId::Sha224 => Hasher::Dyn(Box::new(sha2::Sha224::default())),
            AlgorithmId::Sha256 => Hasher::Dyn(Box::new(sha2::Sha256::default())),
            AlgorithmId::Sha384 => Hasher::Dyn(Box::new(sha2::Sha384::default())),
            AlgorithmId::Sha512 => Hasher::Dyn(Box::new(sha2::Sha512::default())),
            AlgorithmId::Sha3_224 => Hasher::Dyn(Box::new(sha3::Sha3_224::default())),
            AlgorithmId::Sha3_256 => Hasher::Dyn(Box::new(sha3::Sha3_256::default())),
            AlgorithmId::Sha3_384 => Hasher::Dyn(Box::new(sha3::Sha3_384::default())),
            AlgorithmId::Sha3_512 => Hasher::Dyn(Box::new(sha3::Sha3_512::default())),
            AlgorithmId::Btih => return None,
        };
        Some(h)
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Crc32(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
            Hasher::Dyn(h) => h.update(data),
        }
    }

    /// Produce the digest and leave the hasher reset.
    fn finalize_reset(&mut self) -> Vec<u8> {
        match self {
            Hasher::Crc32(h) => {
                let crc = std::mem::take(h).finalize();
                crc.to_be_bytes().to_vec()
            }
            Hasher::Blake3(h) => {
                let out = h.finalize().as_bytes().to_vec();
                h.reset();
                out
            }
            Hasher::Dyn(h) => h.finalize_reset().into_vec(),
        }
    }

    fn reset(&mut self) {
        match self {
            Hasher::Crc32(h) => h.reset(),
            Hasher::Blake3(h) => {
                h.reset();
            }
            Hasher::Dyn(h) => h.reset(),
        }
    }
}

/// Context of [`MultiEngine`].
pub struct MultiContext {
    set: AlgorithmSet,
    hashers: Vec<(AlgorithmId, Hasher)>,
    torrent: Option<TorrentBuilder>,
    msg_size: u64,
}

impl DigestContext for MultiContext {
    fn algorithms(&self) -> AlgorithmSet {
        self.set
    }

    fn msg_size(&self) -> u64 {
        self.msg_size
    }

    fn update(&mut self, data: &[u8]) {
        for (_, h) in &mut self.hashers {
            h.update(data);
        }
        if let Some(t) = self.torrent.as_mut() {
            t.update(data);
        }
        self.msg_size += data.len() as u64;
    }

    fn finalize(&mut self) -> Digests {
        let mut values: Vec<DigestValue> = self
            .hashers
            .iter_mut()
            .map(|(id, h)| DigestValue {
                algorithm: *id,
                bytes: h.finalize_reset(),
            })
            .collect();
        if let Some(t) = self.torrent.as_mut() {
            values.push(DigestValue {
                algorithm: AlgorithmId::Btih,
                bytes: t.info_hash().to_vec(),
            });
        }
        values.sort_by_key(|v| v.algorithm);
        Digests(values)
    }

    fn reset(&mut self) {
        for (_, h) in &mut self.hashers {
            h.reset();
        }
        if let Some(t) = self.torrent.as_mut() {
            t.clear();
        }
        self.msg_size = 0;
    }

    fn torrent(&self) -> Option<&TorrentBuilder> {
        self.torrent.as_ref()
    }

    fn torrent_mut(&mut self) -> Option<&mut TorrentBuilder> {
        self.torrent.as_mut()
    }
}
