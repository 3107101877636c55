//! Algorithm identifiers and the 64-bit selection mask.
//!
//! Every supported algorithm owns one bit of an [`AlgorithmSet`]. The
//! canonical order of a set is ascending bit position, which is also the order
//! digests are printed in.

use once_cell::sync::OnceCell;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of identifiers a mask can expand to.
pub const MAX_ALGORITHMS: usize = 64;

/// Known digest algorithms. The discriminant is the bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AlgorithmId {
    Crc32 = 0,
    Md5 = 1,
    Sha1 = 2,
    Sha224 = 3,
    Sha256 = 4,
    Sha384 = 5,
    Sha512 = 6,
    Sha3_224 = 7,
    Sha3_256 = 8,
    Sha3_384 = 9,
    Sha3_512 = 10,
    Blake3 = 11,
    Btih = 12,
}

impl AlgorithmId {
    /// All known identifiers in canonical order.
    pub const ALL: [AlgorithmId; 13] = [
        AlgorithmId::Crc32,
        AlgorithmId::Md5,
        AlgorithmId::Sha1,
        AlgorithmId::Sha224,
        AlgorithmId::Sha256,
        AlgorithmId::Sha384,
        AlgorithmId::Sha512,
        AlgorithmId::Sha3_224,
        AlgorithmId::Sha3_256,
        AlgorithmId::Sha3_384,
        AlgorithmId::Sha3_512,
        AlgorithmId::Blake3,
        AlgorithmId::Btih,
    ];

    /// Bit position of this algorithm inside a mask.
    pub fn bit_index(self) -> u32 {
        self as u32
    }

    /// Single-bit mask for this algorithm.
    pub fn bit(self) -> u64 {
        1u64 << self.bit_index()
    }

    /// Map an isolated bit back to its identifier.
    pub fn from_bit(bit: u64) -> Option<Self> {
        if bit.count_ones() != 1 {
            return None;
        }
        Self::ALL.get(bit.trailing_zeros() as usize).copied()
    }

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::Crc32 => "crc32",
            AlgorithmId::Md5 => "md5",
            AlgorithmId::Sha1 => "sha1",
            AlgorithmId::Sha224 => "sha224",
            AlgorithmId::Sha256 => "sha256",
            AlgorithmId::Sha384 => "sha384",
            AlgorithmId::Sha512 => "sha512",
            AlgorithmId::Sha3_224 => "sha3-224",
            AlgorithmId::Sha3_256 => "sha3-256",
            AlgorithmId::Sha3_384 => "sha3-384",
            AlgorithmId::Sha3_512 => "sha3-512",
            AlgorithmId::Blake3 => "blake3",
            AlgorithmId::Btih => "btih",
        }
    }

    /// Size of the finished digest in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            AlgorithmId::Crc32 => 4,
            AlgorithmId::Md5 => 16,
            AlgorithmId::Sha1 | AlgorithmId::Btih => 20,
            AlgorithmId::Sha224 | AlgorithmId::Sha3_224 => 28,
            AlgorithmId::Sha256 | AlgorithmId::Sha3_256 | AlgorithmId::Blake3 => 32,
            AlgorithmId::Sha384 | AlgorithmId::Sha3_384 => 48,
            AlgorithmId::Sha512 | AlgorithmId::Sha3_512 => 64,
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl serde::Serialize for AlgorithmId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = AlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        AlgorithmId::ALL
            .iter()
            .copied()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| AlgorithmError::UnknownName(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("{count} algorithms selected but only {capacity} identifiers fit")]
    CapacityExceeded { count: usize, capacity: usize },
    #[error("bit {0} does not name a known algorithm")]
    UnknownBit(u32),
    #[error("unknown algorithm '{0}'")]
    UnknownName(String),
}

/// Selection of algorithms encoded as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AlgorithmSet(u64);

impl AlgorithmSet {
    pub const EMPTY: AlgorithmSet = AlgorithmSet(0);

    pub fn from_mask(mask: u64) -> Self {
        AlgorithmSet(mask)
    }

    pub fn mask(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, id: AlgorithmId) -> bool {
        self.0 & id.bit() != 0
    }

    pub fn with(self, id: AlgorithmId) -> Self {
        AlgorithmSet(self.0 | id.bit())
    }

    pub fn union(self, other: AlgorithmSet) -> Self {
        AlgorithmSet(self.0 | other.0)
    }

    /// The algorithm, when exactly one is selected.
    pub fn single(self) -> Option<AlgorithmId> {
        AlgorithmId::from_bit(self.0)
    }

    /// Expand the mask into identifiers, lowest bit first.
    ///
    /// Fails when more than `capacity` bits are set or when a bit does not
    /// belong to a known algorithm. Never truncates.
    pub fn to_identifier_list(self, capacity: usize) -> Result<Vec<AlgorithmId>, AlgorithmError> {
        let mut mask = self.0;
        let mut ids = Vec::with_capacity(self.len().min(capacity));
        while mask != 0 {
            let bit = mask & mask.wrapping_neg();
            if ids.len() == capacity {
                return Err(AlgorithmError::CapacityExceeded {
                    count: self.len(),
                    capacity,
                });
            }
            let id = AlgorithmId::from_bit(bit)
                .ok_or(AlgorithmError::UnknownBit(bit.trailing_zeros()))?;
            ids.push(id);
            mask ^= bit;
        }
        Ok(ids)
    }

    /// OR together the bits of every identifier. Duplicates collapse.
    pub fn from_identifier_list(ids: &[AlgorithmId]) -> Self {
        AlgorithmSet(ids.iter().fold(0, |mask, id| mask | id.bit()))
    }

    /// Known algorithms of this set in canonical order.
    pub fn iter(self) -> impl Iterator<Item = AlgorithmId> {
        AlgorithmId::ALL
            .into_iter()
            .filter(move |id| self.contains(*id))
    }

    /// Parse a comma separated list such as `crc32,sha256`.
    pub fn parse_list(list: &str) -> Result<Self, AlgorithmError> {
        let mut set = AlgorithmSet::EMPTY;
        for name in list.split(',').filter(|n| !n.trim().is_empty()) {
            set = set.with(name.parse()?);
        }
        Ok(set)
    }

    pub fn all() -> Self {
        AlgorithmSet::from_identifier_list(&AlgorithmId::ALL)
    }
}

impl fmt::Display for AlgorithmSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(AlgorithmId::name).collect();
        f.write_str(&names.join(","))
    }
}

/// Where a supported mask is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Algorithms with hardware acceleration on this CPU.
    Accelerated,
    /// Every algorithm the engine knows.
    All,
}

static ACCELERATED: OnceCell<AlgorithmSet> = OnceCell::new();
static ALL: OnceCell<AlgorithmSet> = OnceCell::new();

/// Supported algorithms for `source`, computed once per process.
pub fn supported_mask(source: Support) -> AlgorithmSet {
    match source {
        Support::Accelerated => *ACCELERATED.get_or_init(detect_accelerated),
        Support::All => *ALL.get_or_init(AlgorithmSet::all),
    }
}

#[allow(unused_mut)]
fn detect_accelerated() -> AlgorithmSet {
    let mut ids: Vec<AlgorithmId> = Vec::new();
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("pclmulqdq") && is_x86_feature_detected!("sse4.1") {
            ids.push(AlgorithmId::Crc32);
        }
        if is_x86_feature_detected!("sha") {
            ids.extend([AlgorithmId::Sha1, AlgorithmId::Sha224, AlgorithmId::Sha256]);
        }
        if is_x86_feature_detected!("sse2") {
            ids.push(AlgorithmId::Blake3);
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("crc") {
            ids.push(AlgorithmId::Crc32);
        }
        if std::arch::is_aarch64_feature_detected!("sha2") {
            ids.extend([AlgorithmId::Sha1, AlgorithmId::Sha224, AlgorithmId::Sha256]);
        }
        ids.push(AlgorithmId::Blake3);
    }
    AlgorithmSet::from_identifier_list(&ids)
}
