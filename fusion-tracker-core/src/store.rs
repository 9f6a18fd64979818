//! Owned, single-writer playthrough state with change notification.
//!
//! Mutations are synchronous and visible immediately. Every mutation that changes a
//! playthrough stamps `updated_at` and notifies observers; persistence subscribes as
//! one of those observers.

use crate::catalog::{Location, ReferenceCatalog};
use crate::clock::SharedClock;
use crate::custom_locations::MergeOutcome;
use crate::encounters::EncounterChange;
use crate::ids;
use crate::schema::{EncounterField, GameMode, Playthrough, PokemonRef, PokemonStatus};

/// Change notifications fanned out to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed { playthrough_id: String },
    ActiveChanged { playthrough_id: String },
    Deleted { playthrough_id: String },
    /// The fused sprite at a location changed identity.
    FusionVisual { location_id: String },
}

impl StoreEvent {
    #[must_use]
    pub fn playthrough_id(&self) -> Option<&str> {
        match self {
            Self::Changed { playthrough_id }
            | Self::ActiveChanged { playthrough_id }
            | Self::Deleted { playthrough_id } => Some(playthrough_id),
            Self::FusionVisual { .. } => None,
        }
    }
}

/// Subscriber to store events. `playthrough` is the record named by the event, when it
/// still exists.
pub trait StoreObserver: Send {
    fn on_event(&mut self, event: &StoreEvent, playthrough: Option<&Playthrough>);
}

pub struct PlaythroughStore {
    playthroughs: Vec<Playthrough>,
    active: usize,
    clock: SharedClock,
    default_name: String,
    observers: Vec<Box<dyn StoreObserver>>,
}

impl std::fmt::Debug for PlaythroughStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaythroughStore")
            .field("playthroughs", &self.playthroughs.len())
            .field("active", &self.active_id())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl PlaythroughStore {
    /// A store holding one freshly synthesised playthrough.
    #[must_use]
    pub fn new(clock: SharedClock, default_name: impl Into<String>) -> Self {
        Self::from_loaded(Vec::new(), None, clock, default_name)
    }

    /// Build a store from loaded records. The active id falls back to the most recently
    /// updated record; an empty list gets a default playthrough.
    #[must_use]
    pub fn from_loaded(
        mut playthroughs: Vec<Playthrough>,
        active_id: Option<&str>,
        clock: SharedClock,
        default_name: impl Into<String>,
    ) -> Self {
        let default_name = default_name.into();
        if playthroughs.is_empty() {
            playthroughs.push(synthesize(&clock, &default_name, GameMode::default()));
        }
        let active = active_id
            .and_then(|id| playthroughs.iter().position(|p| p.id == id))
            .unwrap_or_else(|| newest_index(&playthroughs));
        Self {
            playthroughs,
            active,
            clock,
            default_name,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn StoreObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn active(&self) -> &Playthrough {
        &self.playthroughs[self.active]
    }

    #[must_use]
    pub fn active_id(&self) -> &str {
        &self.active().id
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Playthrough> {
        self.playthroughs.iter().find(|p| p.id == id)
    }

    /// All playthroughs, most recently updated first.
    #[must_use]
    pub fn playthroughs(&self) -> Vec<&Playthrough> {
        let mut sorted: Vec<&Playthrough> = self.playthroughs.iter().collect();
        sorted.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        sorted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.playthroughs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.playthroughs.is_empty()
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    fn emit(&mut self, event: StoreEvent) {
        let playthrough = event
            .playthrough_id()
            .and_then(|id| self.playthroughs.iter().find(|p| p.id == id));
        for observer in &mut self.observers {
            observer.on_event(&event, playthrough);
        }
    }

    fn touch(&mut self, index: usize) {
        let now = self.now();
        let playthrough = &mut self.playthroughs[index];
        playthrough.updated_at = now;
        let playthrough_id = playthrough.id.clone();
        self.emit(StoreEvent::Changed { playthrough_id });
    }

    fn touch_active(&mut self, changed: bool) -> bool {
        if changed {
            self.touch(self.active);
        }
        changed
    }

    fn commit_encounter(&mut self, change: EncounterChange, locations: &[&str]) -> EncounterChange {
        if !change.changed {
            return change;
        }
        self.touch(self.active);
        if change.visual_change {
            let fused: Vec<String> = locations
                .iter()
                .filter(|location| {
                    self.active()
                        .encounters
                        .get(**location)
                        .is_some_and(|e| e.is_fusion && e.head.is_some() && e.body.is_some())
                })
                .map(|location| (*location).to_string())
                .collect();
            for location_id in fused {
                self.emit(StoreEvent::FusionVisual { location_id });
            }
        }
        change
    }

    /// Create and activate a new playthrough. A blank name uses the configured default.
    pub fn create_playthrough(&mut self, name: &str, mode: GameMode) -> String {
        let name = match name.trim() {
            "" => self.default_name.clone(),
            trimmed => trimmed.to_string(),
        };
        let playthrough = synthesize(&self.clock, &name, mode);
        let id = playthrough.id.clone();
        self.playthroughs.push(playthrough);
        self.active = self.playthroughs.len() - 1;
        log::debug!("created playthrough {id}");
        self.emit(StoreEvent::Changed {
            playthrough_id: id.clone(),
        });
        self.emit(StoreEvent::ActiveChanged {
            playthrough_id: id.clone(),
        });
        id
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        let Some(index) = self.playthroughs.iter().position(|p| p.id == id) else {
            return false;
        };
        if index == self.active {
            return false;
        }
        self.active = index;
        self.emit(StoreEvent::ActiveChanged {
            playthrough_id: id.to_string(),
        });
        true
    }

    pub fn rename_playthrough(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        let Some(index) = self.playthroughs.iter().position(|p| p.id == id) else {
            return false;
        };
        if name.is_empty() || self.playthroughs[index].name == name {
            return false;
        }
        self.playthroughs[index].name = name.to_string();
        self.touch(index);
        true
    }

    pub fn set_game_mode(&mut self, id: &str, mode: GameMode) -> bool {
        let Some(index) = self.playthroughs.iter().position(|p| p.id == id) else {
            return false;
        };
        if self.playthroughs[index].game_mode == mode {
            return false;
        }
        self.playthroughs[index].game_mode = mode;
        self.touch(index);
        true
    }

    /// Remove a playthrough. Deleting the active one activates the most recently
    /// updated survivor, or a new default when none is left.
    pub fn delete_playthrough(&mut self, id: &str) -> bool {
        let Some(index) = self.playthroughs.iter().position(|p| p.id == id) else {
            return false;
        };
        let was_active = index == self.active;
        self.playthroughs.remove(index);
        self.emit(StoreEvent::Deleted {
            playthrough_id: id.to_string(),
        });

        if self.playthroughs.is_empty() {
            let replacement = synthesize(&self.clock, &self.default_name, GameMode::default());
            let replacement_id = replacement.id.clone();
            self.playthroughs.push(replacement);
            self.emit(StoreEvent::Changed {
                playthrough_id: replacement_id,
            });
        }
        if was_active {
            self.active = newest_index(&self.playthroughs);
            let playthrough_id = self.active_id().to_string();
            self.emit(StoreEvent::ActiveChanged { playthrough_id });
        } else if index < self.active {
            self.active -= 1;
        }
        true
    }

    /// Replace or add a whole record, e.g. after an import.
    pub fn insert_playthrough(&mut self, playthrough: Playthrough) {
        let id = playthrough.id.clone();
        match self.playthroughs.iter().position(|p| p.id == id) {
            Some(index) => self.playthroughs[index] = playthrough,
            None => self.playthroughs.push(playthrough),
        }
        self.emit(StoreEvent::Changed { playthrough_id: id });
    }

    /// Announce every record as changed without touching it, so observers rewrite
    /// them in the current format.
    pub fn republish(&mut self) -> usize {
        let ids: Vec<String> = self.playthroughs.iter().map(|p| p.id.clone()).collect();
        let count = ids.len();
        for playthrough_id in ids {
            self.emit(StoreEvent::Changed { playthrough_id });
        }
        count
    }

    #[must_use]
    pub fn merged_locations(&self, catalog: &dyn ReferenceCatalog) -> MergeOutcome {
        self.active().merged_locations(catalog.locations_sorted())
    }

    pub fn update_encounter(
        &mut self,
        location_id: &str,
        pokemon: Option<PokemonRef>,
        field: EncounterField,
        want_fusion: bool,
    ) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].update_encounter(
            location_id,
            pokemon,
            field,
            want_fusion,
            now,
        );
        self.commit_encounter(change, &[location_id])
    }

    pub fn toggle_encounter_fusion(&mut self, location_id: &str) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].toggle_encounter_fusion(location_id, now);
        self.commit_encounter(change, &[location_id])
    }

    pub fn flip_encounter_fusion(&mut self, location_id: &str) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].flip_encounter_fusion(location_id, now);
        self.commit_encounter(change, &[location_id])
    }

    pub fn move_encounter_atomic(
        &mut self,
        from: &str,
        from_field: EncounterField,
        to: &str,
        to_field: EncounterField,
    ) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].move_encounter_atomic(
            from,
            from_field,
            to,
            to_field,
            now,
        );
        self.commit_encounter(change, &[from, to])
    }

    pub fn swap_encounters(
        &mut self,
        first: &str,
        first_field: EncounterField,
        second: &str,
        second_field: EncounterField,
    ) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].swap_encounters(
            first,
            first_field,
            second,
            second_field,
            now,
        );
        self.commit_encounter(change, &[first, second])
    }

    pub fn move_to_original_location(
        &mut self,
        location_id: &str,
        field: EncounterField,
    ) -> EncounterChange {
        let home = self
            .active()
            .encounters
            .get(location_id)
            .and_then(|encounter| encounter.slot(field))
            .and_then(|pokemon| pokemon.original_location.clone())
            .unwrap_or_default();
        let now = self.now();
        let change =
            self.playthroughs[self.active].move_to_original_location(location_id, field, now);
        self.commit_encounter(change, &[location_id, home.as_str()])
    }

    pub fn reset_encounter(&mut self, location_id: &str) -> EncounterChange {
        let change = self.playthroughs[self.active].reset_encounter(location_id);
        self.commit_encounter(change, &[])
    }

    pub fn set_pokemon_status(
        &mut self,
        location_id: &str,
        field: EncounterField,
        status: PokemonStatus,
    ) -> EncounterChange {
        let now = self.now();
        let change =
            self.playthroughs[self.active].set_pokemon_status(location_id, field, status, now);
        self.commit_encounter(change, &[])
    }

    pub fn set_nickname(
        &mut self,
        location_id: &str,
        field: EncounterField,
        nickname: Option<&str>,
    ) -> EncounterChange {
        let now = self.now();
        let change = self.playthroughs[self.active].set_nickname(location_id, field, nickname, now);
        self.commit_encounter(change, &[])
    }

    pub fn move_team_member_to_box(&mut self, position: usize) -> bool {
        let changed = self.playthroughs[self.active].move_team_member_to_box(position);
        self.touch_active(changed)
    }

    pub fn restore_pokemon_to_team(&mut self, uid: &str) -> bool {
        let changed = self.playthroughs[self.active].restore_pokemon_to_team(uid);
        self.touch_active(changed)
    }

    pub fn place_on_team(&mut self, position: usize, location_id: &str) -> bool {
        let changed = self.playthroughs[self.active].place_on_team(position, location_id);
        self.touch_active(changed)
    }

    pub fn clear_team_slot(&mut self, position: usize) -> bool {
        let changed = self.playthroughs[self.active].clear_team_slot(position);
        self.touch_active(changed)
    }

    pub fn swap_team_slots(&mut self, first: usize, second: usize) -> bool {
        let changed = self.playthroughs[self.active].swap_team_slots(first, second);
        self.touch_active(changed)
    }

    pub fn add_custom_location(
        &mut self,
        name: &str,
        anchor: &str,
        canonical: &[Location],
    ) -> Option<String> {
        let now = self.now();
        let id = self.playthroughs[self.active].add_custom_location(name, anchor, canonical, now)?;
        self.touch(self.active);
        Some(id)
    }

    pub fn rename_custom_location(&mut self, id: &str, name: &str) -> bool {
        let changed = self.playthroughs[self.active].rename_custom_location(id, name);
        self.touch_active(changed)
    }

    pub fn reanchor_custom_location(
        &mut self,
        id: &str,
        anchor: &str,
        canonical: &[Location],
    ) -> bool {
        let changed =
            self.playthroughs[self.active].reanchor_custom_location(id, anchor, canonical);
        self.touch_active(changed)
    }

    pub fn remove_custom_location(&mut self, id: &str) -> bool {
        let changed = self.playthroughs[self.active].remove_custom_location(id);
        self.touch_active(changed)
    }
}

fn synthesize(clock: &SharedClock, name: &str, mode: GameMode) -> Playthrough {
    let now = clock.now_millis();
    Playthrough::new(ids::new_playthrough_id(now), name, mode, now)
}

fn newest_index(playthroughs: &[Playthrough]) -> usize {
    playthroughs
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| (p.updated_at, p.created_at))
        .map_or(0, |(index, _)| index)
}
