//! Ephemeral image files for the document backend.
//!
//! The PDF backend reads images from disk. Each image gets a
//! [`ScratchFile`] that lives only while that one image is embedded and is
//! removed when the guard drops, whichever way the caller exits.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::api::logs::log_warning;
use crate::error::{ComposeError, ComposeResult};

/// File name prefix of every scratch image.
pub const SCRATCH_PREFIX: &str = "walletcards-";

/// Directory where scratch images are created.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    /// Use `dir`, creating it if absent.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write PNG bytes to a fresh scratch file.
    pub fn write_png(&self, png: &[u8]) -> ComposeResult<ScratchFile> {
        let io_error = |source: io::Error| ComposeError::ImageFile {
            path: self.dir.display().to_string(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".png")
            .tempfile_in(&self.dir)
            .map_err(io_error)?;
        // On failure `file` drops here and removes itself.
        file.write_all(png).map_err(io_error)?;
        file.flush().map_err(io_error)?;

        Ok(ScratchFile {
            path: Some(file.into_temp_path()),
        })
    }
}

/// Scoped ephemeral file, removed on drop.
pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }
}

impl fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchFile").field("path", &self.path()).finish()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let display = path.display().to_string();
            if let Err(e) = path.close() {
                log_warning(format!("Could not remove scratch image {}: {}", display, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn leftovers(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
            .count()
    }

    #[test]
    fn test_file_exists_while_guard_lives() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let file = scratch.write_png(b"\x89PNG").unwrap();
        assert!(file.path().exists());
        assert_eq!(fs::read(file.path()).unwrap(), b"\x89PNG");
        assert!(file.path().extension().is_some_and(|e| e == "png"));

        drop(file);
        assert_eq!(leftovers(root.path()), 0);
    }

    #[test]
    fn test_removed_on_error_path() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let result: Result<(), String> = (|| {
            let _file = scratch.write_png(b"data").map_err(|e| e.to_string())?;
            Err("embedding failed".to_string())
        })();

        assert!(result.is_err());
        assert_eq!(leftovers(root.path()), 0);
    }

    #[test]
    fn test_removed_on_panic() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let outcome = std::panic::catch_unwind(|| {
            let _file = scratch.write_png(b"data").unwrap();
            panic!("composer bug");
        });

        assert!(outcome.is_err());
        assert_eq!(leftovers(root.path()), 0);
    }

    #[test]
    fn test_already_removed_file_does_not_panic() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();

        let file = scratch.write_png(b"data").unwrap();
        fs::remove_file(file.path()).unwrap();
        drop(file);
    }

    #[test]
    fn test_missing_directory_is_compose_error() {
        let root = tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path().join("gone")).unwrap();
        fs::remove_dir(scratch.dir()).unwrap();

        let err = scratch.write_png(b"data").unwrap_err();
        assert!(matches!(err, ComposeError::ImageFile { .. }));
    }
}
