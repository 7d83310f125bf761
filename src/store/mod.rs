use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::Snapshot;
use crate::error::{Result, SyncError};

/// Durable home of a catalog snapshot.
pub trait SnapshotStore {
    /// Human-readable location, for logs and reports
    fn location(&self) -> String;

    fn exists(&self) -> bool;

    fn load(&self) -> Result<Snapshot>;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// A snapshot kept as a single JSON file shaped like an API response page.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        JsonFileStore {
            path: path.into(),
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<Snapshot> {
        let content = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(self.path.clone()))
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let snapshot: Snapshot = serde_json::from_slice(&content)
            .map_err(|e| SyncError::format(self.location(), e.to_string()))?;
        snapshot
            .validate()
            .map_err(|msg| SyncError::format(self.location(), msg))?;

        debug!("Read {} entries from {}", snapshot.len(), self.path.display());
        Ok(snapshot)
    }

    /// Writes a sibling `.tmp` file and renames it over the target, so an
    /// interrupted save leaves the previous snapshot intact.
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(snapshot)
        } else {
            serde_json::to_vec(snapshot)
        }
        .map_err(|e| self.io_error(e.into()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&encoded)?;
            file.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = std::fs::remove_file(&tmp);
            return Err(self.io_error(e));
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!("Wrote {} entries to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}

/// In-process store. Starts empty (load fails with `NotFound`) unless seeded.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RefCell<Option<Snapshot>>,
    saves: RefCell<usize>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        MemoryStore {
            snapshot: RefCell::new(Some(snapshot)),
            saves: RefCell::new(0),
        }
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot.borrow().clone()
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl SnapshotStore for MemoryStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn exists(&self) -> bool {
        self.snapshot.borrow().is_some()
    }

    fn load(&self) -> Result<Snapshot> {
        let snapshot = self
            .snapshot
            .borrow()
            .clone()
            .ok_or_else(|| SyncError::NotFound(PathBuf::from(self.location())))?;
        snapshot
            .validate()
            .map_err(|msg| SyncError::format(self.location(), msg))?;
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.borrow_mut() = Some(snapshot.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
