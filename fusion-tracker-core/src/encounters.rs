//! Encounter mutations.
//!
//! Per location: `empty -> single(head) <-> fusion(head, body) -> empty`. Every
//! operation is a no-op on unknown locations or empty slots and keeps the team's
//! UID references consistent with the encounter set.

use crate::ids;
use crate::schema::{EncounterData, EncounterField, Playthrough, PokemonRef, PokemonStatus};

/// Result of an encounter mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncounterChange {
    pub changed: bool,
    /// The fused sprite identity at an affected location changed.
    pub visual_change: bool,
    /// Slot the encounter was auto-assigned to, if any.
    pub team_slot: Option<usize>,
}

impl EncounterChange {
    const fn changed() -> Self {
        Self {
            changed: true,
            visual_change: false,
            team_slot: None,
        }
    }
}

fn fused_identity(encounter: Option<&EncounterData>) -> Option<(u32, u32)> {
    let encounter = encounter.filter(|encounter| encounter.is_fusion)?;
    Some((encounter.head.as_ref()?.id, encounter.body.as_ref()?.id))
}

fn identity_changed(before: Option<(u32, u32)>, after: Option<(u32, u32)>) -> bool {
    after.is_some() && before != after
}

impl Playthrough {
    fn identity_at(&self, location_id: &str) -> Option<(u32, u32)> {
        fused_identity(self.encounters.get(location_id))
    }

    fn drop_if_empty(&mut self, location_id: &str) {
        if self
            .encounters
            .get(location_id)
            .is_some_and(EncounterData::is_empty)
        {
            self.encounters.remove(location_id);
        }
    }

    fn take_slot(
        &mut self,
        location_id: &str,
        field: EncounterField,
        now: i64,
    ) -> Option<PokemonRef> {
        let encounter = self.encounters.get_mut(location_id)?;
        let taken = encounter.slot_mut(field).take()?;
        encounter.updated_at = now;
        Some(taken)
    }

    fn put_slot(
        &mut self,
        location_id: &str,
        field: EncounterField,
        pokemon: PokemonRef,
        now: i64,
    ) -> Option<PokemonRef> {
        let encounter = self.encounters.entry(location_id.to_string()).or_default();
        if field == EncounterField::Body {
            encounter.is_fusion = true;
        }
        encounter.updated_at = now;
        encounter.slot_mut(field).replace(pokemon)
    }

    /// Remove `uid` from wherever it sits unless that is the target slot.
    /// Returns the location it was taken from.
    fn detach_elsewhere(
        &mut self,
        uid: &str,
        target: (&str, EncounterField),
        now: i64,
    ) -> Option<String> {
        let (location, field) = self.locate(uid)?;
        if (location.as_str(), field) == target {
            return None;
        }
        self.take_slot(&location, field, now);
        self.drop_if_empty(&location);
        Some(location)
    }

    /// Assign or clear one half of the encounter at `location_id`.
    ///
    /// Assigning `body` turns the encounter into a fusion. Assigning `head` with
    /// `want_fusion == false` replaces the whole encounter. A missing UID is minted
    /// and `original_location` is filled once. Clearing drops team references to the
    /// removed Pokémon.
    pub fn update_encounter(
        &mut self,
        location_id: &str,
        pokemon: Option<PokemonRef>,
        field: EncounterField,
        want_fusion: bool,
        now: i64,
    ) -> EncounterChange {
        match pokemon {
            Some(pokemon) => self.assign_pokemon(location_id, pokemon, field, want_fusion, now),
            None => self.clear_encounter_field(location_id, field, now),
        }
    }

    fn assign_pokemon(
        &mut self,
        location_id: &str,
        mut pokemon: PokemonRef,
        field: EncounterField,
        want_fusion: bool,
        now: i64,
    ) -> EncounterChange {
        if pokemon.uid().is_none() {
            pokemon.uid = Some(ids::new_uid(now));
        }
        if pokemon.original_location.is_none() {
            pokemon.original_location = Some(location_id.to_string());
        }
        let uid = pokemon.uid().unwrap_or_default().to_string();
        let previous_home = self.detach_elsewhere(&uid, (location_id, field), now);
        let before = self.identity_at(location_id);

        let encounter = self.encounters.entry(location_id.to_string()).or_default();
        let mut displaced: Vec<PokemonRef> = Vec::new();
        match (field, want_fusion) {
            (EncounterField::Head, false) => {
                displaced.extend(encounter.head.take());
                displaced.extend(encounter.body.take());
                encounter.head = Some(pokemon);
                encounter.is_fusion = false;
            }
            (EncounterField::Head, true) => {
                displaced.extend(encounter.head.replace(pokemon));
                encounter.is_fusion = true;
            }
            (EncounterField::Body, _) => {
                displaced.extend(encounter.body.replace(pokemon));
                encounter.is_fusion = true;
            }
        }
        encounter.updated_at = now;

        let status = encounter.slot(field).and_then(|placed| placed.status);
        if let Some(status) = status
            && let Some(partner) = encounter.slot_mut(field.other()).as_mut()
            && partner.status.is_none()
        {
            partner.status = Some(status);
        }

        let mut touched = vec![location_id];
        if let Some(home) = previous_home.as_deref() {
            touched.push(home);
        }
        self.reconcile_team(&touched);

        // Slots still naming a displaced Pokémon had no surviving partner to move to.
        let gone: Vec<String> = displaced
            .iter()
            .filter_map(PokemonRef::uid)
            .filter(|displaced_uid| {
                *displaced_uid != uid && self.locate(displaced_uid).is_none()
            })
            .map(str::to_string)
            .collect();
        if !gone.is_empty() {
            self.evict_from_team(&gone);
        }

        let team_slot = if status.is_some_and(PokemonStatus::is_active) {
            self.auto_assign(location_id)
        } else {
            None
        };
        EncounterChange {
            changed: true,
            visual_change: identity_changed(before, self.identity_at(location_id)),
            team_slot,
        }
    }

    fn clear_encounter_field(
        &mut self,
        location_id: &str,
        field: EncounterField,
        now: i64,
    ) -> EncounterChange {
        let Some(removed) = self.take_slot(location_id, field, now) else {
            return EncounterChange::default();
        };
        self.drop_if_empty(location_id);
        if let Some(uid) = removed.uid() {
            self.evict_from_team(&[uid.to_string()]);
        }
        EncounterChange::changed()
    }

    /// Remove the whole encounter and every team reference into it.
    pub fn reset_encounter(&mut self, location_id: &str) -> EncounterChange {
        let Some(encounter) = self.encounters.remove(location_id) else {
            return EncounterChange::default();
        };
        let uids: Vec<String> = encounter.uids().into_iter().map(str::to_string).collect();
        self.evict_from_team(&uids);
        EncounterChange::changed()
    }

    /// Flip the fusion flag. Un-fusing a body-only encounter promotes the body into
    /// the head; a populated body is retained for later re-fusion. Locations without
    /// an encounter are left alone.
    pub fn toggle_encounter_fusion(&mut self, location_id: &str, now: i64) -> EncounterChange {
        let before = self.identity_at(location_id);
        let Some(encounter) = self.encounters.get_mut(location_id) else {
            return EncounterChange::default();
        };
        encounter.is_fusion = !encounter.is_fusion;
        if !encounter.is_fusion && encounter.head.is_none() {
            encounter.head = encounter.body.take();
        }
        encounter.updated_at = now;
        self.reconcile_team(&[location_id]);
        EncounterChange {
            changed: true,
            visual_change: identity_changed(before, self.identity_at(location_id)),
            team_slot: None,
        }
    }

    /// Swap head and body of a complete fusion.
    pub fn flip_encounter_fusion(&mut self, location_id: &str, now: i64) -> EncounterChange {
        let before = self.identity_at(location_id);
        let Some(encounter) = self.encounters.get_mut(location_id) else {
            return EncounterChange::default();
        };
        if !encounter.is_fusion || encounter.head.is_none() || encounter.body.is_none() {
            return EncounterChange::default();
        }
        std::mem::swap(&mut encounter.head, &mut encounter.body);
        encounter.updated_at = now;
        self.reconcile_team(&[location_id]);
        EncounterChange {
            changed: true,
            visual_change: identity_changed(before, self.identity_at(location_id)),
            team_slot: None,
        }
    }

    /// Relocate one Pokémon in a single step. An occupied destination is swapped
    /// with the source rather than overwritten.
    pub fn move_encounter_atomic(
        &mut self,
        from: &str,
        from_field: EncounterField,
        to: &str,
        to_field: EncounterField,
        now: i64,
    ) -> EncounterChange {
        if (from, from_field) == (to, to_field) {
            return EncounterChange::default();
        }
        let occupied = self
            .encounters
            .get(to)
            .and_then(|encounter| encounter.slot(to_field))
            .is_some();
        if occupied {
            return self.swap_encounters(from, from_field, to, to_field, now);
        }
        let before = self.identity_at(to);
        let Some(pokemon) = self.take_slot(from, from_field, now) else {
            return EncounterChange::default();
        };
        self.drop_if_empty(from);
        self.put_slot(to, to_field, pokemon, now);
        self.reconcile_team(&[from, to]);
        EncounterChange {
            changed: true,
            visual_change: identity_changed(before, self.identity_at(to)),
            team_slot: None,
        }
    }

    /// Exchange the Pokémon in two slots. Either slot may be empty, not both.
    pub fn swap_encounters(
        &mut self,
        first: &str,
        first_field: EncounterField,
        second: &str,
        second_field: EncounterField,
        now: i64,
    ) -> EncounterChange {
        if (first, first_field) == (second, second_field) {
            return EncounterChange::default();
        }
        let before = (self.identity_at(first), self.identity_at(second));
        let first_pokemon = self.take_slot(first, first_field, now);
        let second_pokemon = self.take_slot(second, second_field, now);
        if first_pokemon.is_none() && second_pokemon.is_none() {
            return EncounterChange::default();
        }
        if let Some(pokemon) = second_pokemon {
            self.put_slot(first, first_field, pokemon, now);
        }
        if let Some(pokemon) = first_pokemon {
            self.put_slot(second, second_field, pokemon, now);
        }
        self.drop_if_empty(first);
        self.drop_if_empty(second);
        self.reconcile_team(&[first, second]);
        EncounterChange {
            changed: true,
            visual_change: identity_changed(before.0, self.identity_at(first))
                || identity_changed(before.1, self.identity_at(second)),
            team_slot: None,
        }
    }

    /// Send a Pokémon back to the location it was first placed at: an empty head
    /// there first, then an empty body, otherwise swap with the head occupant.
    pub fn move_to_original_location(
        &mut self,
        location_id: &str,
        field: EncounterField,
        now: i64,
    ) -> EncounterChange {
        let Some(home) = self
            .encounters
            .get(location_id)
            .and_then(|encounter| encounter.slot(field))
            .and_then(|pokemon| pokemon.original_location.clone())
        else {
            return EncounterChange::default();
        };
        if home == location_id {
            return EncounterChange::default();
        }
        let target = match self.encounters.get(&home) {
            None => EncounterField::Head,
            Some(encounter) if encounter.head.is_none() => EncounterField::Head,
            Some(encounter) if encounter.body.is_none() => EncounterField::Body,
            Some(_) => {
                return self.swap_encounters(location_id, field, &home, EncounterField::Head, now);
            }
        };
        self.move_encounter_atomic(location_id, field, &home, target, now)
    }

    /// Set the status of one Pokémon. Entering an active status auto-assigns.
    pub fn set_pokemon_status(
        &mut self,
        location_id: &str,
        field: EncounterField,
        status: PokemonStatus,
        now: i64,
    ) -> EncounterChange {
        let Some(encounter) = self.encounters.get_mut(location_id) else {
            return EncounterChange::default();
        };
        let Some(pokemon) = encounter.slot_mut(field).as_mut() else {
            return EncounterChange::default();
        };
        if pokemon.status == Some(status) {
            return EncounterChange::default();
        }
        pokemon.status = Some(status);
        encounter.updated_at = now;
        let team_slot = if status.is_active() {
            self.auto_assign(location_id)
        } else {
            None
        };
        EncounterChange {
            team_slot,
            ..EncounterChange::changed()
        }
    }

    /// Set or clear (blank input) a nickname.
    pub fn set_nickname(
        &mut self,
        location_id: &str,
        field: EncounterField,
        nickname: Option<&str>,
        now: i64,
    ) -> EncounterChange {
        let nickname = nickname
            .map(str::trim)
            .filter(|nick| !nick.is_empty())
            .map(str::to_string);
        let Some(encounter) = self.encounters.get_mut(location_id) else {
            return EncounterChange::default();
        };
        let Some(pokemon) = encounter.slot_mut(field).as_mut() else {
            return EncounterChange::default();
        };
        if pokemon.nickname == nickname {
            return EncounterChange::default();
        }
        pokemon.nickname = nickname;
        encounter.updated_at = now;
        EncounterChange::changed()
    }
}
