//! A loaded tracker bound to on-disk storage for the lifetime of one command.

use anyhow::{Context, Result};
use fusion_tracker_core::{
    PersistenceHandle, PlaythroughRepository, PlaythroughStore, SharedClock, TrackerConfig,
    spawn_persistence, system_clock,
};
use std::path::Path;
use tokio::task::JoinHandle;

use crate::storage::{FilePointer, JsonDirStore};

const RECORDS_DIR: &str = "records";
const POINTER_FILE: &str = "pointer.json";

type FileRepository = PlaythroughRepository<JsonDirStore, FilePointer>;

pub struct Session {
    pub store: PlaythroughStore,
    pub clock: SharedClock,
    pub config: TrackerConfig,
    handle: PersistenceHandle,
    worker: JoinHandle<FileRepository>,
}

impl Session {
    pub async fn open(data_dir: &Path, config: TrackerConfig) -> Result<Self> {
        let records = JsonDirStore::open(data_dir.join(RECORDS_DIR))
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
        let pointer = FilePointer::new(data_dir.join(POINTER_FILE));
        let repository = PlaythroughRepository::new(records, pointer, config.clone());
        let clock = system_clock();

        let hydrated = repository.load_or_create(clock.as_ref()).await;
        log::debug!(
            "loaded {} playthrough(s); active {}",
            hydrated.playthroughs.len(),
            hydrated.active_id
        );
        let mut store = hydrated.into_store(clock.clone(), &config.default_playthrough_name);
        let (handle, worker) = spawn_persistence(repository, clock.clone());
        store.subscribe(Box::new(handle.clone()));

        Ok(Self {
            store,
            clock,
            config,
            handle,
            worker,
        })
    }

    /// Write everything pending and stop the worker.
    pub async fn close(self) -> Result<()> {
        self.handle
            .flush()
            .await
            .context("Failed to flush pending saves")?;
        let Self {
            store,
            handle,
            worker,
            ..
        } = self;
        drop(store);
        drop(handle);
        worker.await.context("Persistence worker panicked")?;
        Ok(())
    }
}
