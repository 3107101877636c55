//! BitTorrent v1 metadata accumulated alongside the other digests.
//!
//! A [`TorrentBuilder`] lives inside a digest context when BTIH is selected.
//! File entries and distribution hints are registered before the bytes of a
//! file are streamed; piece hashes are computed over the concatenated stream
//! of every registered file.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use super::bencode::{self, Value};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Smallest piece length ever chosen by the default policy.
pub const MIN_PIECE_LENGTH: u64 = 16 * KIB;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorrentOptions {
    /// Mark the torrent private (no DHT/PEX).
    pub private: bool,
    /// Choose piece lengths the way Transmission does.
    pub transmission: bool,
}

/// Default piece length for a payload of `total` bytes.
pub fn default_piece_length(total: u64, transmission: bool) -> u64 {
    if transmission {
        return match total {
            t if t >= 2 * GIB => 2 * MIB,
            t if t >= GIB => MIB,
            t if t >= 512 * MIB => 512 * KIB,
            t if t >= 350 * MIB => 256 * KIB,
            t if t >= 150 * MIB => 128 * KIB,
            t if t >= 50 * MIB => 64 * KIB,
            _ => 32 * KIB,
        };
    }
    if total < 16 * MIB {
        return MIN_PIECE_LENGTH;
    }
    if total >= 4 * GIB {
        return 8 * MIB;
    }
    let mut hi_bit = 32 * MIB;
    while hi_bit <= total {
        hi_bit <<= 1;
    }
    hi_bit >> 10
}

struct PieceHasher {
    piece_length: u64,
    current_len: u64,
    hasher: Sha1,
    pieces: Vec<u8>,
}

impl PieceHasher {
    fn new(piece_length: u64) -> Self {
        Self {
            piece_length,
            current_len: 0,
            hasher: Sha1::new(),
            pieces: Vec::new(),
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let remaining = self.piece_length - self.current_len;
            let take = remaining.min(data.len() as u64) as usize;
            self.hasher.update(&data[..take]);
            self.current_len += take as u64;
            if self.current_len == self.piece_length {
                self.flush_piece();
            }
            data = &data[take..];
        }
    }

    fn flush_piece(&mut self) {
        let digest = std::mem::take(&mut self.hasher).finalize();
        self.pieces.extend_from_slice(&digest);
        self.current_len = 0;
    }

    /// Piece hashes including the trailing partial piece.
    fn finish(&mut self) -> &[u8] {
        if self.current_len > 0 {
            self.flush_piece();
        }
        &self.pieces
    }
}

/// Torrent accumulation state of a digest context.
#[derive(Default)]
pub struct TorrentBuilder {
    files: Vec<TorrentFile>,
    announces: Vec<String>,
    program_name: Option<String>,
    name: Option<String>,
    options: TorrentOptions,
    piece_length: Option<u64>,
    batch_size: Option<u64>,
    hasher: Option<PieceHasher>,
    info_hash: Option<[u8; 20]>,
}

impl TorrentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every entry, hint and piece hash.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add_file(&mut self, path: &str, size: u64) {
        self.files.push(TorrentFile {
            path: path.to_string(),
            size,
        });
        self.info_hash = None;
    }

    pub fn set_options(&mut self, options: TorrentOptions) {
        self.options = options;
    }

    pub fn set_program_name(&mut self, name: &str) {
        self.program_name = Some(name.to_string());
    }

    /// Name of a multi-file torrent. Single-file torrents use the file name.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn add_announce(&mut self, url: &str) {
        self.announces.push(url.to_string());
    }

    pub fn set_piece_length(&mut self, length: u64) {
        self.piece_length = Some(length);
    }

    /// Total payload size hint used to pick a default piece length.
    pub fn set_batch_size(&mut self, size: u64) {
        self.batch_size = Some(size);
    }

    pub fn files(&self) -> &[TorrentFile] {
        &self.files
    }

    pub fn options(&self) -> TorrentOptions {
        self.options
    }

    /// Piece length in effect, or the one that would be chosen now.
    pub fn piece_length(&self) -> u64 {
        if let Some(h) = &self.hasher {
            return h.piece_length;
        }
        match (self.piece_length, self.batch_size) {
            (Some(len), _) => len.max(1),
            (None, Some(batch)) => default_piece_length(batch, self.options.transmission),
            (None, None) => {
                let total = self.files.iter().map(|f| f.size).sum();
                default_piece_length(total, self.options.transmission)
            }
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        let piece_length = self.piece_length();
        self.hasher
            .get_or_insert_with(|| PieceHasher::new(piece_length))
            .update(data);
        self.info_hash = None;
    }

    fn pieces(&mut self) -> Vec<u8> {
        let piece_length = self.piece_length();
        self.hasher
            .get_or_insert_with(|| PieceHasher::new(piece_length))
            .finish()
            .to_vec()
    }

    fn info(&mut self) -> Value {
        let piece_length = self.piece_length();
        let pieces = self.pieces();
        let mut info = BTreeMap::new();
        if self.files.len() > 1 {
            let files = self
                .files
                .iter()
                .map(|f| {
                    let mut entry = BTreeMap::new();
                    entry.insert(b"length".to_vec(), Value::Integer(f.size as i64));
                    let path = vec![Value::string(&file_name(&f.path))];
                    entry.insert(b"path".to_vec(), Value::List(path));
                    Value::Dict(entry)
                })
                .collect();
            info.insert(b"files".to_vec(), Value::List(files));
            let name = self.name.clone().unwrap_or_else(|| "batch".to_string());
            info.insert(b"name".to_vec(), Value::string(&name));
        } else {
            let (name, length) = match self.files.first() {
                Some(f) => (file_name(&f.path), f.size),
                None => (self.name.clone().unwrap_or_default(), 0),
            };
            info.insert(b"length".to_vec(), Value::Integer(length as i64));
            info.insert(b"name".to_vec(), Value::string(&name));
        }
        info.insert(b"piece length".to_vec(), Value::Integer(piece_length as i64));
        info.insert(b"pieces".to_vec(), Value::Bytes(pieces));
        if self.options.private {
            info.insert(b"private".to_vec(), Value::Integer(1));
        }
        Value::Dict(info)
    }

    /// SHA-1 of the bencoded info dictionary (the BTIH digest).
    pub fn info_hash(&mut self) -> [u8; 20] {
        if let Some(hash) = self.info_hash {
            return hash;
        }
        let info = bencode::encode(&self.info());
        let hash: [u8; 20] = Sha1::digest(&info).into();
        self.info_hash = Some(hash);
        hash
    }

    /// Serialize the complete `.torrent` document.
    pub fn generate_content(&mut self) -> Vec<u8> {
        let mut root = BTreeMap::new();
        if let Some(first) = self.announces.first() {
            root.insert(b"announce".to_vec(), Value::string(first));
        }
        if self.announces.len() > 1 {
            let tiers = self
                .announces
                .iter()
                .map(|url| Value::List(vec![Value::string(url)]))
                .collect();
            root.insert(b"announce-list".to_vec(), Value::List(tiers));
        }
        if let Some(program) = &self.program_name {
            root.insert(b"created by".to_vec(), Value::string(program));
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        root.insert(b"creation date".to_vec(), Value::Integer(now));
        root.insert(b"info".to_vec(), self.info());
        bencode::encode(&Value::Dict(root))
    }
}

/// Last component of a displayed path. Entries never carry the directories
/// of the machine the torrent was made on.
fn file_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .find(|c| !c.is_empty() && *c != "." && *c != "..")
        .unwrap_or_default()
        .to_string()
}
