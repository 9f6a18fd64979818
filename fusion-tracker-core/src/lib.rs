//! Fusion Tracker Core
//!
//! Platform-agnostic playthrough state and persistence engine for a fusion run tracker.
//! Storage back-ends are supplied by the host through [`KeyValueStore`] and
//! [`PointerStore`]; reference data through [`ReferenceCatalog`].

pub mod catalog;
pub mod clock;
pub mod config;
pub mod custom_locations;
pub mod encounters;
pub mod export;
pub mod ids;
pub mod migrations;
pub mod persistence;
pub mod schema;
pub mod store;
pub mod team;

// Re-export commonly used types
pub use catalog::{Location, ReferenceCatalog, Species, StaticCatalog};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock, system_clock};
pub use config::TrackerConfig;
pub use custom_locations::{
    CustomLocationGraph, ExcludedLocation, MergeOutcome, MergedLocation, merge_locations,
};
pub use encounters::EncounterChange;
pub use export::{ExportEnvelope, ImportError, export_playthrough, import_playthrough};
pub use migrations::migrate_playthrough;
pub use persistence::{
    Hydrated, KeyValueStore, MemoryPointer, MemoryStore, PersistCommand, PersistenceError,
    PersistenceHandle, PersistenceWorker, PlaythroughRepository, PointerStore, spawn_persistence,
};
pub use schema::{
    CustomLocation, EncounterData, EncounterField, GameMode, Playthrough, PokemonRef,
    PokemonStatus, SchemaError, TEAM_SIZE, Team, TeamMember,
};
pub use store::{PlaythroughStore, StoreEvent, StoreObserver};
pub use team::TeamEntry;
