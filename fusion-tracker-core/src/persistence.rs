//! Loading, saving and the debounced write path.
//!
//! Records live in an async key-value store under `TrackerConfig::namespace`; the
//! active id lives in a separate synchronous pointer store. Every record read goes
//! through the migration pipeline and schema validation; a record that still fails is
//! skipped with a warning rather than failing the whole load.
//!
//! Writes are driven by [`PersistenceWorker`], which receives snapshots from the
//! [`PersistenceHandle`] observer. The first save of a burst is written at once;
//! later saves inside the quiet window replace the pending snapshot and restart the
//! timer, and whatever is pending is written when the window closes.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::clock::{Clock, SharedClock};
use crate::config::TrackerConfig;
use crate::ids;
use crate::migrations::migrate_playthrough;
use crate::schema::{GameMode, Playthrough};
use crate::store::{PlaythroughStore, StoreEvent, StoreObserver};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("key-value store failed: {0}")]
    Store(#[source] BoxError),
    #[error("pointer store failed: {0}")]
    Pointer(#[source] BoxError),
    #[error("failed to serialize playthrough {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("persistence worker has stopped")]
    WorkerGone,
}

fn store_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> PersistenceError {
    PersistenceError::Store(Box::new(err))
}

fn pointer_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> PersistenceError {
    PersistenceError::Pointer(Box::new(err))
}

/// Async bulk storage for playthrough records.
/// Hosts provide the concrete back-end.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the back-end cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    async fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the key cannot be removed.
    async fn del(&self, key: &str) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the back-end cannot be listed.
    async fn keys(&self) -> Result<Vec<String>, Self::Error>;
}

/// Fast synchronous storage for the active-playthrough pointer.
pub trait PointerStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the pointer cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the pointer cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the pointer cannot be removed.
    fn clear(&self, key: &str) -> Result<(), Self::Error>;
}

fn decode_record(key: &str, raw: Value) -> Option<Playthrough> {
    match Playthrough::from_value(migrate_playthrough(raw)) {
        Ok(playthrough) => Some(playthrough),
        Err(err) => {
            log::warn!("skipping stored record {key}: {err}");
            None
        }
    }
}

/// Records and active pointer produced by a session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hydrated {
    pub playthroughs: Vec<Playthrough>,
    pub active_id: String,
}

impl Hydrated {
    #[must_use]
    pub fn into_store(self, clock: SharedClock, default_name: &str) -> PlaythroughStore {
        PlaythroughStore::from_loaded(
            self.playthroughs,
            Some(&self.active_id),
            clock,
            default_name,
        )
    }
}

/// Typed access to playthrough records over the two storage seams.
#[derive(Debug)]
pub struct PlaythroughRepository<S, P> {
    store: S,
    pointer: P,
    config: TrackerConfig,
}

impl<S, P> PlaythroughRepository<S, P>
where
    S: KeyValueStore,
    P: PointerStore,
{
    pub const fn new(store: S, pointer: P, config: TrackerConfig) -> Self {
        Self {
            store,
            pointer,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn pointer(&self) -> &P {
        &self.pointer
    }

    /// Load, migrate and validate one record. Invalid records read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load(&self, id: &str) -> Result<Option<Playthrough>, PersistenceError> {
        let key = self.config.record_key(id);
        let raw = self.store.get(&key).await.map_err(store_error)?;
        Ok(raw.and_then(|raw| decode_record(&key, raw)))
    }

    /// Load every record in the namespace, skipping ones that cannot be read or validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn load_all(&self) -> Result<Vec<Playthrough>, PersistenceError> {
        let mut keys: Vec<String> = self
            .store
            .keys()
            .await
            .map_err(store_error)?
            .into_iter()
            .filter(|key| self.config.id_from_key(key).is_some())
            .collect();
        keys.sort();

        let mut loaded = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(raw)) => loaded.extend(decode_record(&key, raw)),
                Ok(None) => {}
                Err(err) => log::warn!("skipping stored record {key}: {err}"),
            }
        }
        Ok(loaded)
    }

    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, playthrough: &Playthrough) -> Result<(), PersistenceError> {
        let value =
            serde_json::to_value(playthrough).map_err(|source| PersistenceError::Serialize {
                id: playthrough.id.clone(),
                source,
            })?;
        self.store
            .set(&self.config.record_key(&playthrough.id), &value)
            .await
            .map_err(store_error)
    }

    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.store
            .del(&self.config.record_key(id))
            .await
            .map_err(store_error)
    }

    /// # Errors
    ///
    /// Returns an error if the pointer store cannot be read.
    pub fn active_id(&self) -> Result<Option<String>, PersistenceError> {
        let id = self
            .pointer
            .read(&self.config.active_pointer_key)
            .map_err(pointer_error)?;
        Ok(id.filter(|id| !id.trim().is_empty()))
    }

    /// # Errors
    ///
    /// Returns an error if the pointer store cannot be written.
    pub fn set_active_id(&self, id: Option<&str>) -> Result<(), PersistenceError> {
        let key = &self.config.active_pointer_key;
        match id {
            Some(id) => self.pointer.write(key, id),
            None => self.pointer.clear(key),
        }
        .map_err(pointer_error)
    }

    /// Resolve the active id, moving it out of the bulk store the first time it is
    /// found there.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails.
    pub async fn migrate_pointer(&self) -> Result<Option<String>, PersistenceError> {
        if let Some(id) = self.active_id()? {
            return Ok(Some(id));
        }
        let legacy_key = &self.config.legacy_pointer_key;
        let Some(legacy) = self.store.get(legacy_key).await.map_err(store_error)? else {
            return Ok(None);
        };
        let id = legacy
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if let Some(id) = &id {
            self.set_active_id(Some(id))?;
            log::debug!("moved active pointer {id} out of the bulk store");
        }
        self.store.del(legacy_key).await.map_err(store_error)?;
        Ok(id)
    }

    /// Start a session. Never fails: when no active record resolves, a default
    /// playthrough is created and persisted straight away.
    pub async fn load_or_create(&self, clock: &dyn Clock) -> Hydrated {
        let active_id = self.migrate_pointer().await.unwrap_or_else(|err| {
            log::error!("could not read active pointer: {err}");
            None
        });
        let mut playthroughs = self.load_all().await.unwrap_or_else(|err| {
            log::error!("could not load playthroughs: {err}");
            Vec::new()
        });

        if let Some(active_id) =
            active_id.filter(|id| playthroughs.iter().any(|p| &p.id == id))
        {
            return Hydrated {
                playthroughs,
                active_id,
            };
        }

        let now = clock.now_millis();
        let fresh = Playthrough::new(
            ids::new_playthrough_id(now),
            self.config.default_playthrough_name.as_str(),
            GameMode::default(),
            now,
        );
        log::warn!("no active playthrough resolved; created {}", fresh.id);
        if let Err(err) = self.save(&fresh).await {
            log::error!("failed to persist default playthrough: {err}");
        }
        if let Err(err) = self.set_active_id(Some(&fresh.id)) {
            log::error!("failed to record active playthrough: {err}");
        }
        let active_id = fresh.id.clone();
        playthroughs.push(fresh);
        Hydrated {
            playthroughs,
            active_id,
        }
    }
}

/// Work item for the persistence worker.
#[derive(Debug)]
pub enum PersistCommand {
    /// Deep-cloned snapshot; later mutation of the store cannot reach it.
    Save(Box<Playthrough>),
    Delete(String),
    Activate(String),
    /// Write everything pending, then acknowledge.
    Flush(oneshot::Sender<()>),
}

/// Store observer that forwards changes to the worker.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    commands: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistenceHandle {
    /// Wait until every change sent so far has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has stopped.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(PersistCommand::Flush(ack))
            .map_err(|_| PersistenceError::WorkerGone)?;
        done.await.map_err(|_| PersistenceError::WorkerGone)
    }
}

impl StoreObserver for PersistenceHandle {
    fn on_event(&mut self, event: &StoreEvent, playthrough: Option<&Playthrough>) {
        let command = match event {
            StoreEvent::Changed { .. } => {
                playthrough.map(|p| PersistCommand::Save(Box::new(p.clone())))
            }
            StoreEvent::Deleted { playthrough_id } => {
                Some(PersistCommand::Delete(playthrough_id.clone()))
            }
            StoreEvent::ActiveChanged { playthrough_id } => {
                Some(PersistCommand::Activate(playthrough_id.clone()))
            }
            StoreEvent::FusionVisual { .. } => None,
        };
        if let Some(command) = command
            && self.commands.send(command).is_err()
        {
            log::error!("persistence worker stopped; change not saved");
        }
    }
}

/// Background writer owning the repository.
pub struct PersistenceWorker<S, P> {
    repository: PlaythroughRepository<S, P>,
    commands: mpsc::UnboundedReceiver<PersistCommand>,
    clock: SharedClock,
    debounce: Duration,
}

/// Spawn the worker on the current tokio runtime. The join handle yields the
/// repository back once every handle has been dropped and pending writes are done.
pub fn spawn_persistence<S, P>(
    repository: PlaythroughRepository<S, P>,
    clock: SharedClock,
) -> (PersistenceHandle, JoinHandle<PlaythroughRepository<S, P>>)
where
    S: KeyValueStore + 'static,
    P: PointerStore + 'static,
{
    let (sender, commands) = mpsc::unbounded_channel();
    let debounce = repository.config().debounce();
    let worker = PersistenceWorker {
        repository,
        commands,
        clock,
        debounce,
    };
    (
        PersistenceHandle { commands: sender },
        tokio::spawn(worker.run()),
    )
}

impl<S, P> PersistenceWorker<S, P>
where
    S: KeyValueStore,
    P: PointerStore,
{
    pub async fn run(mut self) -> PlaythroughRepository<S, P> {
        let mut pending: BTreeMap<String, Playthrough> = BTreeMap::new();
        let mut window_open = false;
        loop {
            let command = if window_open {
                match tokio::time::timeout(self.debounce, self.commands.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        self.write_pending(&mut pending).await;
                        window_open = false;
                        continue;
                    }
                }
            } else {
                self.commands.recv().await
            };

            let Some(command) = command else {
                self.write_pending(&mut pending).await;
                break;
            };
            match command {
                PersistCommand::Save(playthrough) => {
                    if window_open {
                        pending.insert(playthrough.id.clone(), *playthrough);
                    } else {
                        self.write(*playthrough).await;
                        window_open = true;
                    }
                }
                PersistCommand::Delete(id) => {
                    pending.remove(&id);
                    match self.repository.delete(&id).await {
                        Ok(()) => log::debug!("deleted playthrough {id}"),
                        Err(err) => log::error!("failed to delete playthrough {id}: {err}"),
                    }
                }
                PersistCommand::Activate(id) => {
                    if let Err(err) = self.repository.set_active_id(Some(&id)) {
                        log::error!("failed to record active playthrough {id}: {err}");
                    }
                }
                PersistCommand::Flush(ack) => {
                    self.write_pending(&mut pending).await;
                    window_open = false;
                    let _ = ack.send(());
                }
            }
        }
        self.repository
    }

    async fn write(&self, mut playthrough: Playthrough) {
        playthrough.updated_at = self.clock.now_millis();
        match self.repository.save(&playthrough).await {
            Ok(()) => log::debug!("saved playthrough {}", playthrough.id),
            Err(err) => log::error!("failed to save playthrough {}: {err}", playthrough.id),
        }
    }

    async fn write_pending(&self, pending: &mut BTreeMap<String, Playthrough>) {
        for playthrough in std::mem::take(pending).into_values() {
            self.write(playthrough).await;
        }
    }
}

#[derive(Debug, Error)]
#[error("memory store unavailable")]
pub struct MemoryStoreError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process key-value store that counts writes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
    writes: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        lock(&self.entries).insert(key.into(), value);
    }

    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        lock(&self.entries).get(key).cloned()
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), MemoryStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(MemoryStoreError)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    type Error = MemoryStoreError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        self.check()?;
        Ok(self.snapshot(key))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), Self::Error> {
        self.check()?;
        lock(&self.entries).insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        self.check()?;
        lock(&self.entries).remove(key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Self::Error> {
        self.check()?;
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

/// In-process pointer store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPointer {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryPointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PointerStore for MemoryPointer {
    type Error = std::convert::Infallible;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), Self::Error> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}
