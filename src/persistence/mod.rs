/// Durable storage for entity records
///
/// Entities hand a `Record` to a `Persister` after every effective change.
/// Saving never fails from the caller's point of view: implementations
/// queue, write in the background and log their own failures.
///
/// On disk, `JsonStore` keeps one pretty-printed JSON file per entity at
/// `<dir>/<kind>/<id>.json`.

use crate::core::{EntityKind, Id, Record};
use crate::error::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Sink for entity records
pub trait Persister: Send + Sync {
    fn save(&self, record: Record);
}

/// Discards every record, for purely in-memory worlds
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersister;

impl Persister for NullPersister {
    fn save(&self, _record: Record) {}
}

/// Keeps every saved record in memory, in order
#[derive(Debug, Default)]
pub struct MemoryPersister {
    records: Mutex<Vec<Record>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    /// Most recent record saved for `id`
    pub fn latest(&self, id: Id) -> Option<Record> {
        self.records.lock().iter().rev().find(|r| r.id == id).cloned()
    }
}

impl Persister for MemoryPersister {
    fn save(&self, record: Record) {
        self.records.lock().push(record);
    }
}

/// Directory of JSON entity records
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a record directory
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for kind in EntityKind::ALL {
            fs::create_dir_all(root.join(kind.as_str())).await?;
        }
        info!("Opened record store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, kind: EntityKind, id: Id) -> PathBuf {
        self.root.join(kind.as_str()).join(format!("{}.json", id))
    }

    /// Read every stored record
    ///
    /// Files that do not parse are skipped with a warning; I/O errors on the
    /// directories themselves are returned.
    pub async fn load_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        for kind in EntityKind::ALL {
            let mut entries = fs::read_dir(self.root.join(kind.as_str())).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let text = fs::read_to_string(&path).await?;
                match serde_json::from_str::<Record>(&text) {
                    Ok(record) if record.kind == kind => records.push(record),
                    Ok(record) => warn!(
                        "Skipping {}: kind {} stored under {}",
                        path.display(),
                        record.kind,
                        kind
                    ),
                    Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
                }
            }
        }

        info!("Loaded {} records from {}", records.len(), self.root.display());
        Ok(records)
    }

    /// Write one record, replacing any previous version atomically
    pub async fn write(&self, record: &Record) -> Result<()> {
        let path = self.path_for(record.kind, record.id);
        let temp = path.with_extension("json.tmp");

        fs::write(&temp, serde_json::to_vec_pretty(record)?).await?;
        fs::rename(&temp, &path).await?;

        debug!("Wrote {} {}", record.kind, record.id);
        Ok(())
    }

    /// Start a background writer; the returned persister only queues
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_writer(self) -> WriteBehind {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriteOp>();

        tokio::spawn(async move {
            while let Some(op) = receiver.recv().await {
                match op {
                    WriteOp::Save(record) => {
                        if let Err(e) = self.write(&record).await {
                            error!("Failed to persist {} {}: {}", record.kind, record.id, e);
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Record writer stopped");
        });

        WriteBehind { sender }
    }
}

enum WriteOp {
    Save(Record),
    Flush(oneshot::Sender<()>),
}

/// Persister that hands records to a `JsonStore` writer task
#[derive(Debug, Clone)]
pub struct WriteBehind {
    sender: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehind {
    /// Wait until every record queued so far has been written
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(WriteOp::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Persister for WriteBehind {
    fn save(&self, record: Record) {
        if self.sender.send(WriteOp::Save(record)).is_err() {
            error!("Record writer is gone, dropping record");
        }
    }
}

impl std::fmt::Debug for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::Save(record) => write!(f, "Save({} {})", record.kind, record.id),
            WriteOp::Flush(_) => f.write_str("Flush"),
        }
    }
}
