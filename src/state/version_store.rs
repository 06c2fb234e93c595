// src/state/version_store.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fs::{FileSystem, RealFileSystem};
use crate::types::VersionStorageMode;

/// Relative path (from the project root) to the versions file.
pub const VERSION_FILE_PATH: &str = ".actiongraph/versions.toml";

/// What an action's last successful run left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// Abstract storage for action version records, keyed by action ref
/// (`build.api`).
///
/// Methods take `&self`; implementations synchronize internally because
/// execute tasks for different actions run concurrently.
pub trait VersionStore: Send + Sync + std::fmt::Debug {
    fn load(&self, action: &str) -> Result<Option<VersionRecord>>;
    fn save(&self, action: &str, record: &VersionRecord) -> Result<()>;
}

/// Build the store selected in `[project].version_storage`.
pub fn store_for_mode(mode: VersionStorageMode, root: &Path) -> Arc<dyn VersionStore> {
    match mode {
        VersionStorageMode::File => Arc::new(FileVersionStore::new(root.to_path_buf())),
        VersionStorageMode::Memory => Arc::new(MemoryVersionStore::new()),
    }
}

/// Stores versions in `<root>/.actiongraph/versions.toml`.
#[derive(Debug)]
pub struct FileVersionStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileVersionStore {
    pub fn new(root: PathBuf) -> Self {
        Self::with_fs(root, Arc::new(RealFileSystem))
    }

    pub fn with_fs(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            root,
            fs,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(VERSION_FILE_PATH)
    }

    fn load_all(&self) -> Result<BTreeMap<String, VersionRecord>> {
        let path = self.path();
        if !self.fs.exists(&path) {
            return Ok(BTreeMap::new());
        }

        let contents = self.fs.read_to_string(&path)?;
        toml::from_str(&contents).with_context(|| format!("parsing version file at {:?}", path))
    }

    fn save_all(&self, map: &BTreeMap<String, VersionRecord>) -> Result<()> {
        let path = self.path();
        let contents = toml::to_string(map).context("serializing version records")?;
        self.fs.write(&path, contents.as_bytes())
    }
}

impl VersionStore for FileVersionStore {
    fn load(&self, action: &str) -> Result<Option<VersionRecord>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("version store lock poisoned"))?;
        let map = self.load_all()?;
        Ok(map.get(action).cloned())
    }

    fn save(&self, action: &str, record: &VersionRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("version store lock poisoned"))?;
        let mut map = self.load_all()?;
        map.insert(action.to_string(), record.clone());
        self.save_all(&map)?;
        info!(action = %action, version = %record.version, "stored action version (file)");
        Ok(())
    }
}

/// Stores versions in memory only.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    map: Mutex<HashMap<String, VersionRecord>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionStore for MemoryVersionStore {
    fn load(&self, action: &str) -> Result<Option<VersionRecord>> {
        let map = self
            .map
            .lock()
            .map_err(|_| anyhow!("version store lock poisoned"))?;
        Ok(map.get(action).cloned())
    }

    fn save(&self, action: &str, record: &VersionRecord) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| anyhow!("version store lock poisoned"))?;
        map.insert(action.to_string(), record.clone());
        debug!(action = %action, version = %record.version, "stored action version (memory)");
        Ok(())
    }
}
