// src/fs/mock.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use super::FileSystem;

/// In-memory filesystem for tests. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    writes: Arc<Mutex<usize>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> Result<MutexGuard<'_, HashMap<PathBuf, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|_| anyhow!("mock filesystem lock poisoned"))
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files() {
            files.insert(path.as_ref().to_path_buf(), content.into());
        }
    }

    /// Number of `write` calls seen so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|n| *n).unwrap_or(0)
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.files()?;
        match files.get(path) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.files()?.insert(path.to_path_buf(), contents.to_vec());
        if let Ok(mut n) = self.writes.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }
}
