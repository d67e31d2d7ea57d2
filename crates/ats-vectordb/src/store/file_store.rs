use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::BlobStore;
use crate::error::{Result, VectorDbError};

/// Directory-backed blob store with atomic writes (temp file + rename).
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VectorDbError::Persistence(format!("read {}: {e}", path.display()))),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.resolve_path(key);
        let tmp_path = path.with_extension("tmp");
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(value)?;
            f.flush()?;
            f.sync_all()?;
            fs::rename(&tmp_path, &path)?;
            Ok(())
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(VectorDbError::Persistence(format!("write {}: {e}", path.display())));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VectorDbError::Persistence(format!("delete {}: {e}", path.display()))),
        }
    }
}
