use std::sync::Arc;
use std::time::Duration;

use fusion_tracker_core::{
    EncounterField, FixedClock, GameMode, MemoryPointer, MemoryStore, PlaythroughRepository,
    PokemonRef, PokemonStatus, SharedClock, StaticCatalog, TrackerConfig, export_playthrough,
    import_playthrough, spawn_persistence,
};
use serde_json::json;

fn repository(
    store: &MemoryStore,
    pointer: &MemoryPointer,
) -> PlaythroughRepository<MemoryStore, MemoryPointer> {
    PlaythroughRepository::new(store.clone(), pointer.clone(), TrackerConfig::default())
}

fn captured(id: u32) -> PokemonRef {
    PokemonRef::new(id, format!("species-{id}"), id).with_status(PokemonStatus::Captured)
}

#[tokio::test(start_paused = true)]
async fn edits_survive_a_restart() {
    let store = MemoryStore::new();
    let pointer = MemoryPointer::new();
    let clock = FixedClock::new(10_000);
    let shared: SharedClock = Arc::new(clock.clone());

    let repo = repository(&store, &pointer);
    let hydrated = repo.load_or_create(&clock).await;
    let mut tracker = hydrated.into_store(shared.clone(), "Nuzlocke Run");
    let (handle, worker) = spawn_persistence(repo, shared.clone());
    tracker.subscribe(Box::new(handle.clone()));
    let writes_before = store.writes();

    tracker.update_encounter("route-1", Some(captured(1)), EncounterField::Head, true);
    tracker.update_encounter("route-1", Some(captured(4)), EncounterField::Body, true);
    tracker.update_encounter("route-2", Some(captured(7)), EncounterField::Head, false);
    tracker.set_nickname("route-2", EncounterField::Head, Some("Shelly"));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.writes() - writes_before, 2, "leading plus trailing write");

    drop(tracker);
    drop(handle);
    worker.await.unwrap();

    let reloaded = repository(&store, &pointer).load_or_create(&clock).await;
    assert_eq!(reloaded.playthroughs.len(), 1);
    let playthrough = &reloaded.playthroughs[0];
    assert_eq!(playthrough.team.occupied(), 2);
    assert!(playthrough.team.members[0].as_ref().unwrap().is_fusion());
    assert_eq!(
        playthrough.encounters["route-2"].head.as_ref().unwrap().display_name(),
        "Shelly"
    );
}

#[tokio::test]
async fn switching_and_deleting_update_pointer_and_records() {
    let store = MemoryStore::new();
    let pointer = MemoryPointer::new();
    let clock = FixedClock::new(1);
    let shared: SharedClock = Arc::new(clock.clone());

    let repo = repository(&store, &pointer);
    let mut tracker = repo
        .load_or_create(&clock)
        .await
        .into_store(shared.clone(), "Nuzlocke Run");
    let first = tracker.active_id().to_string();
    let (handle, worker) = spawn_persistence(repo, shared);
    tracker.subscribe(Box::new(handle.clone()));

    clock.advance(5);
    let second = tracker.create_playthrough("Remix Run", GameMode::Remix);
    handle.flush().await.unwrap();
    assert!(store.snapshot(&format!("playthrough:{second}")).is_some());

    assert!(tracker.delete_playthrough(&second));
    handle.flush().await.unwrap();
    assert!(store.snapshot(&format!("playthrough:{second}")).is_none());

    drop(tracker);
    drop(handle);
    let repo = worker.await.unwrap();
    assert_eq!(repo.active_id().unwrap(), Some(first));
}

#[test]
fn import_into_running_store_avoids_collisions() {
    let clock = FixedClock::new(50);
    let shared: SharedClock = Arc::new(clock.clone());
    let mut tracker = fusion_tracker_core::PlaythroughStore::new(shared, "Nuzlocke Run");
    let original = tracker.active().clone();

    let exported = export_playthrough(&original, &clock).unwrap();
    clock.advance(100);
    let ids: Vec<String> = tracker.playthroughs().iter().map(|p| p.id.clone()).collect();
    let imported = import_playthrough(&exported, ids.iter().map(String::as_str), &clock).unwrap();
    assert_ne!(imported.id, original.id);
    assert_eq!(imported.updated_at, 150);

    tracker.insert_playthrough(imported.clone());
    assert_eq!(tracker.len(), 2);
    assert_eq!(tracker.playthroughs()[0].id, imported.id);
}

#[tokio::test]
async fn corrupt_records_do_not_block_other_loads() {
    let store = MemoryStore::new();
    store.insert("playthrough:good", json!({ "id": "good", "name": "Good", "updatedAt": 5 }));
    store.insert("playthrough:bad", json!({ "id": "bad", "createdAt": "yesterday" }));
    store.insert("unrelated", json!(true));
    let pointer = MemoryPointer::new();

    let loaded = repository(&store, &pointer).load_all().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "good");
}

#[test]
fn merged_locations_follow_bundled_catalog() {
    let catalog = StaticCatalog::bundled();
    let clock: SharedClock = Arc::new(FixedClock::new(0));
    let mut tracker = fusion_tracker_core::PlaythroughStore::new(clock, "Run");
    let canonical = catalog.locations.clone();
    let anchor = canonical[1].id.clone();
    let lake = tracker
        .add_custom_location("Secret Lake", &anchor, &canonical)
        .unwrap();

    let merged = tracker.merged_locations(&catalog);
    let ids = merged.ids();
    let anchor_at = ids.iter().position(|id| *id == anchor).unwrap();
    assert_eq!(ids[anchor_at + 1], lake);
    assert_eq!(ids.len(), canonical.len() + 1);
}
