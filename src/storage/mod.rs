//! JSON snapshot persistence for the ledger.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::services::LedgerSnapshot;

/// Reads and writes a ledger snapshot file.
///
/// Writes go to `<path>.tmp` first and are renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact. Clones share one
/// write lock, so saves through any of them never interleave.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Returns `None` when no snapshot has been written yet
    pub async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No ledger snapshot at {}, starting fresh", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))?;
        info!("Loaded ledger snapshot from {}", self.path.display());
        Ok(Some(snapshot))
    }

    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot).context("serializing ledger snapshot")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let _guard = self.write_lock.lock().await;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .with_context(|| format!("writing {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("renaming {} into place", temp.display()))?;

        info!(
            "Saved ledger snapshot to {} ({} bytes)",
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }
}
