//! Key/value storage handed explicitly to the repository, the engine and the history store.
//!
//! Keys are POSIX relpaths. [`FsStorage`] maps them under a root directory and replaces files
//! atomically; [`MemoryStorage`] keeps everything in a map.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context as _;

use crate::fs::{list_files, remove_file_if_exists, write_atomic};

pub trait Storage {
    /// `Ok(None)` when the key does not exist.
    fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()>;

    /// Returns whether something was removed.
    fn remove(&self, key: &str) -> anyhow::Result<bool>;

    /// Every key under `prefix` (empty = all), sorted.
    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Human-readable location of a key, for messages.
    fn describe(&self, key: &str) -> String {
        key.to_string()
    }
}

pub(crate) fn validate_posix_relpath(relpath: &str) -> bool {
    if relpath.is_empty() || relpath.starts_with('/') || relpath.contains('\\') {
        return false;
    }
    relpath
        .split('/')
        .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

pub(crate) fn join_posix(root: &Path, rel_posix: &str) -> PathBuf {
    let mut out = root.to_path_buf();
    for part in rel_posix.split('/') {
        out.push(part);
    }
    out
}

pub(crate) fn path_relative_posix(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn ensure_key(key: &str) -> anyhow::Result<()> {
    if !validate_posix_relpath(key) {
        anyhow::bail!("invalid storage key (expected a relative POSIX path): {key}");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        join_posix(&self.root, key)
    }
}

impl Storage for FsStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        ensure_key(key)?;
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        ensure_key(key)?;
        let path = self.path_for(key);
        write_atomic(&path, bytes).with_context(|| format!("write {}", path.display()))
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        ensure_key(key)?;
        remove_file_if_exists(&self.path_for(key))
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let files = list_files(&self.root)
            .with_context(|| format!("list {}", self.root.display()))?;
        let mut out: Vec<String> = files
            .iter()
            .map(|p| path_relative_posix(&self.root, p))
            .filter(|rel| rel.starts_with(prefix))
            .collect();
        out.sort();
        Ok(out)
    }

    fn describe(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    read_only: Mutex<BTreeSet<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let storage = Self::new();
        {
            let mut map = storage.lock_entries();
            for (key, value) in entries {
                map.insert(key.to_string(), value.as_bytes().to_vec());
            }
        }
        storage
    }

    /// Makes every later write or remove of `key` fail, the way a read-only file would.
    pub fn deny_writes(&self, key: &str) {
        self.read_only
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.lock_entries()
            .get(key)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self, key: &str) -> anyhow::Result<()> {
        let denied = self
            .read_only
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key);
        if denied {
            anyhow::bail!("permission denied: {key}");
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        ensure_key(key)?;
        Ok(self.lock_entries().get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        ensure_key(key)?;
        self.check_writable(key)?;
        self.lock_entries().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<bool> {
        ensure_key(key)?;
        self.check_writable(key)?;
        Ok(self.lock_entries().remove(key).is_some())
    }

    fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .lock_entries()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
