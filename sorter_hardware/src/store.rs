//! File-backed byte store.
//!
//! The whole image is held in memory. Byte writes only mark it dirty; `flush`
//! (or drop) rewrites the file atomically, so a multi-byte record costs one
//! rewrite and one fsync. A missing file reads as an erased device.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sorter_traits::{BoxError, ByteStore};

use crate::error::{HwError, Result};
use crate::sim::ERASED;
use crate::util::write_atomic;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: Vec<u8>,
    dirty: bool,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut image = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(HwError::Io(e)),
        };
        image.resize(size, ERASED);
        tracing::debug!(path = %path.display(), size, "byte store opened");
        Ok(Self {
            path,
            image,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl ByteStore for FileStore {
    fn read(&mut self, addr: u16) -> std::result::Result<u8, BoxError> {
        self.image
            .get(usize::from(addr))
            .copied()
            .ok_or_else(|| HwError::StoreRange(addr).into())
    }

    fn write(&mut self, addr: u16, value: u8) -> std::result::Result<(), BoxError> {
        let cell = self
            .image
            .get_mut(usize::from(addr))
            .ok_or(HwError::StoreRange(addr))?;
        if *cell == value {
            return Ok(());
        }
        *cell = value;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), BoxError> {
        if !self.dirty {
            return Ok(());
        }
        write_atomic(&self.path, &self.image).map_err(HwError::Io)?;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = ByteStore::flush(self) {
            tracing::warn!(error = %e, path = %self.path.display(), "byte store not flushed");
        }
    }
}
