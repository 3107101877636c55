use log::{debug, info};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::builder::{TorrentFile, TorrentOptions};
use super::TorrentError;
use crate::engine::DigestContext;

/// Torrent options taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct TorrentSettings {
    pub announces: Vec<String>,
    pub piece_length: Option<u64>,
    pub private: bool,
    pub transmission: bool,
    pub program_name: String,
    /// Write one torrent for all inputs to this path instead of one per file.
    pub batch_file: Option<PathBuf>,
}

/// Registers inputs with the torrent state of a digest context and writes the
/// resulting `.torrent` files.
#[derive(Debug, Default)]
pub struct TorrentAccumulator {
    settings: TorrentSettings,
    batch_size: Option<u64>,
    entries: Vec<TorrentFile>,
}

impl TorrentAccumulator {
    pub fn new(settings: TorrentSettings) -> Self {
        Self {
            settings,
            batch_size: None,
            entries: Vec::new(),
        }
    }

    pub fn settings(&self) -> &TorrentSettings {
        &self.settings
    }

    pub fn is_batch(&self) -> bool {
        self.settings.batch_file.is_some()
    }

    /// Total size of the batch, used when no piece length is configured.
    pub fn set_batch_size(&mut self, size: u64) {
        self.batch_size = Some(size);
    }

    /// Entries registered since the accumulation last started.
    pub fn entries(&self) -> &[TorrentFile] {
        &self.entries
    }

    /// Register one input before its bytes are digested.
    ///
    /// `fresh` means the context was just created or reset, so the global
    /// options are applied again; otherwise the file is appended to the live
    /// batch.
    pub fn register<C: DigestContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        path: &str,
        size: u64,
        fresh: bool,
    ) -> Result<(), TorrentError> {
        let torrent = ctx.torrent_mut().ok_or(TorrentError::MissingState)?;
        if fresh {
            self.entries.clear();
            if self.settings.private || self.settings.transmission {
                torrent.set_options(TorrentOptions {
                    private: self.settings.private,
                    transmission: self.settings.transmission,
                });
            }
        }
        torrent.add_file(path, size);
        self.entries.push(TorrentFile {
            path: path.to_string(),
            size,
        });
        if !fresh {
            debug!("added {path} to the torrent batch");
            return Ok(());
        }
        torrent.set_program_name(&self.settings.program_name);
        for url in &self.settings.announces {
            torrent.add_announce(url);
        }
        if let Some(batch) = &self.settings.batch_file {
            if let Some(stem) = batch.file_stem().and_then(|s| s.to_str()) {
                torrent.set_name(stem);
            }
        }
        if let Some(len) = self.settings.piece_length {
            torrent.set_piece_length(len);
        } else if let (true, Some(size)) = (self.is_batch(), self.batch_size) {
            torrent.set_batch_size(size);
        }
        Ok(())
    }

    /// Serialize the torrent accumulated in `ctx`.
    pub fn generate_content<C: DigestContext + ?Sized>(
        &self,
        ctx: &mut C,
    ) -> Result<Vec<u8>, TorrentError> {
        let torrent = ctx.torrent_mut().ok_or(TorrentError::MissingState)?;
        Ok(torrent.generate_content())
    }

    /// Write the torrent to `path`, backing up any file already there.
    pub fn save<C: DigestContext + ?Sized>(
        &mut self,
        path: &Path,
        ctx: &mut C,
    ) -> Result<(), TorrentError> {
        let content = self.generate_content(ctx)?;
        backup_existing(path);
        let save_err = |source| TorrentError::Save {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::create(path).map_err(save_err)?;
        file.write_all(&content).map_err(save_err)?;
        file.flush().map_err(save_err)?;
        file.sync_all().map_err(save_err)?;
        self.entries.clear();
        info!("{} saved", path.display());
        Ok(())
    }
}

/// `<original>.torrent`
pub fn torrent_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".torrent");
    PathBuf::from(s)
}

/// Path the previous version of `path` is moved to before overwriting.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

fn backup_existing(path: &Path) {
    if !path.is_file() {
        return;
    }
    let bak = backup_path(path);
    let _ = fs::remove_file(&bak);
    if let Err(e) = fs::rename(path, &bak) {
        debug!("could not back up {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths() {
        assert_eq!(
            torrent_path(Path::new("dir/movie.mkv")),
            PathBuf::from("dir/movie.mkv.torrent")
        );
        assert_eq!(
            backup_path(Path::new("a.torrent")),
            PathBuf::from("a.torrent.bak")
        );
    }
}
