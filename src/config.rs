use crate::algorithm::{AlgorithmId, AlgorithmSet};
use crate::embed::EmbedOptions;
use crate::error::HashpassError;
use crate::torrent::TorrentSettings;

/// What a run does with each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Print the digests of every input.
    #[default]
    Calculate,
    /// Compare the CRC32 of every input with the one embedded in its name.
    CheckEmbedded,
}

/// Runtime configuration of a digest run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Algorithms computed for every input.
    pub algorithms: AlgorithmSet,
    pub mode: RunMode,
    /// Rename inputs to carry their CRC32 when set.
    pub embed: Option<EmbedOptions>,
    /// Print hex digests in lowercase.
    pub lowercase: bool,
    /// Torrent output, per file or for the whole batch.
    pub torrent: Option<TorrentSettings>,
    /// Print per-file and total speed statistics.
    pub speed: bool,
    /// Show a progress bar while digesting.
    pub percents: bool,
    /// Print results as a JSON array instead of text lines.
    pub json: bool,
    /// Maximum bytes read from a single input.
    pub max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithms: AlgorithmSet::EMPTY.with(AlgorithmId::Crc32),
            mode: RunMode::Calculate,
            embed: None,
            lowercase: false,
            torrent: None,
            speed: false,
            percents: false,
            json: false,
            max_size: u64::MAX,
        }
    }
}

impl Config {
    /// The algorithm set actually needed: embedding and checking need CRC32,
    /// torrent output needs BTIH.
    pub fn effective_algorithms(&self) -> AlgorithmSet {
        let mut required = AlgorithmSet::EMPTY;
        if self.needs_crc32() {
            required = required.with(AlgorithmId::Crc32);
        }
        if self.torrent.is_some() {
            required = required.with(AlgorithmId::Btih);
        }
        self.algorithms.union(required)
    }

    fn needs_crc32(&self) -> bool {
        self.embed.is_some() || self.mode == RunMode::CheckEmbedded
    }

    /// Reject option combinations a run cannot honor.
    ///
    /// A batch torrent keeps one context open across every input, so no
    /// per-file CRC32 exists to embed or check.
    pub fn validate(&self) -> Result<(), HashpassError> {
        if self.is_batch_torrent() && self.needs_crc32() {
            return Err(HashpassError::Config(
                "CRC32 embedding and checking can't be combined with a batch torrent".into(),
            ));
        }
        if let Some(0) = self.torrent.as_ref().and_then(|t| t.piece_length) {
            return Err(HashpassError::Config("torrent piece length must be positive".into()));
        }
        Ok(())
    }

    pub fn is_batch_torrent(&self) -> bool {
        self.torrent
            .as_ref()
            .is_some_and(|t| t.batch_file.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_and_embed_extend_the_set() {
        let cfg = Config {
            algorithms: AlgorithmSet::EMPTY.with(AlgorithmId::Sha256),
            embed: Some(EmbedOptions::default()),
            torrent: Some(TorrentSettings::default()),
            ..Config::default()
        };
        let set = cfg.effective_algorithms();
        assert!(set.contains(AlgorithmId::Crc32));
        assert!(set.contains(AlgorithmId::Btih));
        assert!(set.contains(AlgorithmId::Sha256));
        assert!(!cfg.is_batch_torrent());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn batch_torrent_excludes_per_file_crc() {
        let batch = TorrentSettings {
            batch_file: Some("all.torrent".into()),
            ..TorrentSettings::default()
        };
        let embed = Config {
            embed: Some(EmbedOptions::default()),
            torrent: Some(batch.clone()),
            ..Config::default()
        };
        assert!(matches!(embed.validate(), Err(HashpassError::Config(_))));

        let check = Config {
            mode: RunMode::CheckEmbedded,
            torrent: Some(batch.clone()),
            ..Config::default()
        };
        assert!(check.validate().is_err());

        let plain = Config {
            torrent: Some(batch),
            ..Config::default()
        };
        assert!(plain.validate().is_ok());
    }
}
