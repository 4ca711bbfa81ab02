//! Logo cache - write-once store of coin icons on disk.
//!
//! Entries are `<slug>.png` files in a process-wide directory. Writes go to
//! a temporary file in the same directory and are renamed into place, so a
//! reader never sees a half-written entry and concurrent writers of the
//! same coin leave one complete file behind.

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Directory where logos are stored (relative to current dir)
pub const DEFAULT_CACHE_DIR: &str = ".walletcards/logos";

const ENTRY_EXTENSION: &str = "png";

/// A cached logo as listed on disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLogo {
    /// File stem, i.e. the slug of the coin id
    pub slug: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// On-disk logo store
#[derive(Debug, Clone)]
pub struct LogoCache {
    dir: PathBuf,
}

impl LogoCache {
    /// Open the cache, creating its directory if absent.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic entry path for a coin id, `None` if the id has no
    /// usable characters.
    pub fn entry_path(&self, coin_id: &str) -> Option<PathBuf> {
        let slug = slug(coin_id);
        if slug.is_empty() {
            return None;
        }
        Some(self.dir.join(format!("{}.{}", slug, ENTRY_EXTENSION)))
    }

    /// Read an entry. Missing or unreadable entries are a miss.
    pub fn load(&self, coin_id: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(coin_id)?;
        fs::read(path).ok()
    }

    /// Atomically write an entry, replacing any previous one.
    pub fn store(&self, coin_id: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.entry_path(coin_id).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("coin id '{}' has no cacheable name", coin_id),
            )
        })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// All entries, sorted by slug.
    pub fn list(&self) -> Vec<CachedLogo> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let mut logos: Vec<CachedLogo> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !path.extension().is_some_and(|e| e == ENTRY_EXTENSION) {
                    return None;
                }
                let slug = path.file_stem()?.to_str()?.to_string();
                let size_bytes = entry.metadata().ok()?.len();
                Some(CachedLogo {
                    slug,
                    path,
                    size_bytes,
                })
            })
            .collect();

        logos.sort_by(|a, b| a.slug.cmp(&b.slug));
        logos
    }
}

/// File-name-safe slug: lowercase alphanumerics, other runs collapsed to `-`.
pub fn slug(coin_id: &str) -> String {
    coin_id
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
