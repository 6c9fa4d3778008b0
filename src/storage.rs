//! File collaborator for the key store image.
//!
//! The image is always read and written whole. Writes go to a sibling
//! temporary file that then replaces the image, so a reader sees either the
//! old image or the new one.

use anyhow::{Context, Result};
use getrandom::fill;
use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Location of one key store image on disk.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the whole image into memory.
    pub fn load(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.path)
            .with_context(|| format!("failed to read key store {}", self.path.display()))?;
        debug!("loaded {} byte image from {}", data.len(), self.path.display());
        Ok(data)
    }

    /// Size of the image file in bytes.
    pub fn size(&self) -> Result<u64> {
        let meta = fs::metadata(&self.path)
            .with_context(|| format!("failed to stat key store {}", self.path.display()))?;
        Ok(meta.len())
    }

    /// Replaces the image with `data`.
    ///
    /// The bytes land in a fresh sibling file first; only a fully synced
    /// copy is moved over the image. Missing parent directories are created.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let staged = self.random_tmp_path()?;
        Self::write_synced(&staged, data)?;
        self.atomic_replace(&staged).inspect_err(|_| {
            let _ = fs::remove_file(&staged);
        })?;

        if let Some(dir) = parent {
            File::open(dir)?.sync_all()?;
        }

        debug!("saved {} byte image to {}", data.len(), self.path.display());
        Ok(())
    }

    /// Writes `data` to a file that must not exist yet and flushes it to disk.
    fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("failed to create staging file {}", path.display()))?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Sibling path `<name>.tmp.<16 hex digits>`.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut suffix = [0u8; 8];
        fill(&mut suffix)?;

        let name = self
            .path
            .file_name()
            .context("key store path has no file name")?;
        let mut staged = name.to_os_string();
        staged.push(".tmp.");
        for byte in suffix {
            staged.push(format!("{byte:02x}"));
        }

        Ok(self.path.with_file_name(staged))
    }

    /// Moves `tmp_path` over the image with `ReplaceFileW`, write-through.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY: both buffers are NUL-terminated UTF-16 that outlive the
        // call, and ReplaceFileW keeps no pointer after returning.
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("failed to replace {}", self.path.display()));
        }

        Ok(())
    }

    /// Moves `tmp_path` over the image; the sibling path keeps the rename on
    /// one filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}
