//! Local durable key-value storage the enrollment registry is persisted to.
//!
//! Values are opaque strings stored wholesale under a key: a read returns the
//! last complete write, there are no partial updates and no versioning.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, bail};
use dashmap::DashMap;
use tracing::debug;

pub trait Storage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove_item(&self, key: &str) -> anyhow::Result<()>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get_item(key)
    }
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).set_item(key, value)
    }
    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        (**self).remove_item(key)
    }
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            bail!("invalid storage key {key:?}");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        // write to a sibling temp file and rename, readers never see half a record
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(value.as_bytes())?;
        file.persist(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("stored {} bytes under {key}", value.len());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-process storage. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.items.remove(key);
        Ok(())
    }
}
