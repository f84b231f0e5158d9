//! Key-value backends
//!
//! `JsonFileStore` keeps one `<key>.json` file per key and replaces it
//! atomically (write temp file, then rename). `MemoryStore` is in-process.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::constants::get_storage_dir;
use crate::logic::error::StorageError;
use crate::logic::host::KeyValueStore;

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `AREA_OCCUPANCY_STORAGE_DIR` or the platform data dir
    pub fn default_location() -> Self {
        Self::new(get_storage_dir())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        log::debug!("Saved {} bytes to {:?}", blob.len(), path);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    failing: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }

    pub fn insert(&self, key: &str, blob: Vec<u8>) {
        self.blobs.write().insert(key.to_string(), blob);
    }

    /// Make every operation fail with an IO error
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write() = failing;
    }

    fn check(&self) -> Result<(), StorageError> {
        if *self.failing.read() {
            return Err(std::io::Error::new(ErrorKind::Other, "memory store failing").into());
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check()?;
        Ok(self.get(key))
    }

    fn save(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        self.check()?;
        self.insert(key, blob.to_vec());
        Ok(())
    }
}
