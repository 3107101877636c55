//! BitTorrent metadata: bencode encoding, the per-context builder and the
//! accumulator that feeds it and saves the result.

pub mod accumulator;
pub mod bencode;
pub mod builder;

pub use accumulator::{backup_path, torrent_path, TorrentAccumulator, TorrentSettings};
pub use builder::{default_piece_length, TorrentBuilder, TorrentFile, TorrentOptions};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorrentError {
    /// The digest context was built without BTIH.
    #[error("digest context carries no torrent data")]
    MissingState,
    #[error("failed to save torrent '{}': {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
