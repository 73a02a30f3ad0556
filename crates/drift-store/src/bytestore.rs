use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

/// Flat key-value byte storage.
///
/// Drift consumes this as a dumb get/put store; all structure (key
/// namespacing, record layout) lives in the callers. Implementations
/// must be safe to share across threads.
pub trait ByteStore: Send + Sync {
    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> io::Result<()>;

    fn contains(&self, key: &[u8]) -> io::Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory byte-store for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ByteStore for MemoryStore {
    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> io::Result<bool> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }
}

/// File-backed byte-store.
///
/// Keys are hex-encoded into file names under a two-level fan-out
/// directory layout (`ab/cd/<hex>`) to keep directories small. Writes
/// go through a uniquely-named temp file followed by an atomic rename,
/// so concurrent writers of the same key cannot observe a torn value.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &[u8]) -> PathBuf {
        let hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
        let l1 = if hex.len() >= 2 { &hex[..2] } else { "00" };
        let l2 = if hex.len() >= 4 { &hex[2..4] } else { "00" };
        self.root.join(l1).join(l2).join(&hex)
    }

    /// Count entries and total bytes stored.
    pub fn stats(&self) -> io::Result<StoreStats> {
        let mut stats = StoreStats::default();
        for l1 in fs::read_dir(&self.root)? {
            let l1 = l1?;
            if !l1.file_type()?.is_dir() {
                continue;
            }
            for l2 in fs::read_dir(l1.path())? {
                let l2 = l2?;
                if !l2.file_type()?.is_dir() {
                    continue;
                }
                for entry in fs::read_dir(l2.path())? {
                    let entry = entry?;
                    if !entry.file_type()?.is_file() {
                        continue;
                    }
                    if entry.path().extension().is_some_and(|ext| ext == "tmp") {
                        continue;
                    }
                    stats.entry_count += 1;
                    stats.total_bytes += entry.metadata()?.len();
                }
            }
        }
        Ok(stats)
    }
}

impl ByteStore for FsByteStore {
    fn get(&self, key: &[u8]) -> io::Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut value = Vec::new();
        file.read_to_end(&mut value)?;
        Ok(Some(value))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> io::Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            // Values for a key never change once written.
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique temp name so parallel writers of the same key don't
        // clobber each other's partial writes.
        let temp_name = format!(
            "{}.{}.{:?}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            std::thread::current().id()
        );
        let temp_path = path.with_file_name(&temp_name);
        let mut file = File::create(&temp_path)?;
        file.write_all(value)?;
        file.sync_all()?;

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            // Lost the rename race to an identical value; that's fine.
            if path.exists() {
                return Ok(());
            }
            return Err(e);
        }
        debug!(key_len = key.len(), value_len = value.len(), "stored record");
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> io::Result<bool> {
        Ok(self.key_path(key).exists())
    }
}

/// Statistics about an [`FsByteStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub entry_count: u64,
    pub total_bytes: u64,
}
