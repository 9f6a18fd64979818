//! Team placement rules: auto-assignment, eviction, boxing and restoration.
//!
//! Team slots only ever hold UIDs. After any encounter mutation the affected
//! locations are reconciled so each logical member (single Pokémon or fused pair)
//! occupies at most one slot.

use std::collections::HashSet;

use crate::schema::{PokemonRef, PokemonStatus, Playthrough, TEAM_SIZE, TeamMember};

/// A team slot resolved against the encounter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamEntry<'a> {
    pub position: usize,
    pub head: Option<&'a PokemonRef>,
    pub body: Option<&'a PokemonRef>,
}

fn box_pokemon(pokemon: &mut PokemonRef) {
    if pokemon.status == Some(PokemonStatus::Stored) {
        return;
    }
    if pokemon.original_receival_status.is_none()
        && let Some(status) = pokemon.status.filter(|status| status.is_active())
    {
        pokemon.original_receival_status = Some(status);
    }
    pokemon.status = Some(PokemonStatus::Stored);
}

impl Playthrough {
    #[must_use]
    pub fn is_on_team(&self, uid: &str) -> bool {
        self.team.position_of(uid).is_some()
    }

    /// Free every slot that references one of `uids`. Returns the number of freed slots.
    pub(crate) fn evict_from_team(&mut self, uids: &[String]) -> usize {
        let mut freed = 0;
        for slot in &mut self.team.members {
            if slot
                .as_ref()
                .is_some_and(|member| uids.iter().any(|uid| member.references(uid)))
            {
                *slot = None;
                freed += 1;
            }
        }
        freed
    }

    /// Place the encounter at `location_id` into the lowest empty slot when its visible
    /// Pokémon has an active status and no slot references it yet. A full team is left
    /// unchanged.
    pub fn auto_assign(&mut self, location_id: &str) -> Option<usize> {
        let encounter = self.encounters.get(location_id)?;
        if !encounter
            .primary_status()
            .is_some_and(PokemonStatus::is_active)
        {
            return None;
        }
        let pair = encounter.team_pair()?;
        if pair.uids().any(|uid| self.team.position_of(uid).is_some()) {
            return None;
        }
        let Some(slot) = self.team.first_empty() else {
            log::debug!("team full; {location_id} not auto-assigned");
            return None;
        };
        self.team.members[slot] = Some(pair);
        Some(slot)
    }

    /// Rewrite team slots touching the given locations so they match each location's
    /// current logical member. The member still holding a slot's head keeps that slot
    /// (the body's holder does when the head is gone). A member split off from a slot
    /// only gets a free slot when its visible Pokémon is active. Members that were not
    /// on the team are not added.
    pub(crate) fn reconcile_team(&mut self, locations: &[&str]) {
        let mut seen = HashSet::new();
        let locations: Vec<&str> = locations
            .iter()
            .copied()
            .filter(|location| seen.insert(*location))
            .collect();

        let uids: HashSet<String> = locations
            .iter()
            .filter_map(|location| self.encounters.get(*location))
            .flat_map(|encounter| encounter.uids().into_iter().map(str::to_string))
            .collect();
        if uids.is_empty() {
            return;
        }

        let touched: Vec<(usize, TeamMember)> = self
            .team
            .members
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| {
                slot.as_ref()
                    .filter(|member| member.uids().any(|uid| uids.contains(uid)))
                    .map(|member| (position, member.clone()))
            })
            .collect();
        if touched.is_empty() {
            return;
        }
        for (position, _) in &touched {
            self.team.members[*position] = None;
        }

        let mut pairs: Vec<Option<(TeamMember, bool)>> = locations
            .iter()
            .filter_map(|location| self.encounters.get(*location))
            .filter_map(|encounter| {
                let active = encounter
                    .primary_status()
                    .is_some_and(PokemonStatus::is_active);
                encounter.team_pair().map(|pair| (pair, active))
            })
            .map(Some)
            .collect();
        let freed: Vec<usize> = touched.iter().map(|(position, _)| *position).collect();

        for (prior, member) in &touched {
            let holder = |uid: &str| {
                pairs
                    .iter()
                    .position(|pair| pair.as_ref().is_some_and(|(pair, _)| pair.references(uid)))
            };
            let Some(index) = holder(member.head_pokemon_uid.as_str())
                .or_else(|| holder(member.body_pokemon_uid.as_str()))
            else {
                continue;
            };
            if let Some((pair, _)) = pairs[index].take() {
                self.seat_reconciled(pair, Some(*prior), &freed);
            }
        }

        for (pair, active) in pairs.into_iter().flatten() {
            let was_on_team = pair
                .uids()
                .any(|uid| touched.iter().any(|(_, member)| member.references(uid)));
            if was_on_team && active {
                self.seat_reconciled(pair, None, &freed);
            }
        }
    }

    fn seat_reconciled(&mut self, pair: TeamMember, prior: Option<usize>, freed: &[usize]) {
        let target = prior
            .filter(|position| self.team.members[*position].is_none())
            .or_else(|| {
                freed
                    .iter()
                    .copied()
                    .find(|position| self.team.members[*position].is_none())
            })
            .or_else(|| self.team.first_empty());
        match target {
            Some(position) => self.team.members[position] = Some(pair),
            None => log::debug!(
                "team full; {} dropped during reconcile",
                pair.head_pokemon_uid
            ),
        }
    }

    /// Free slots that are empty placeholders or reference a UID no encounter holds.
    pub(crate) fn prune_team(&mut self) -> usize {
        let dangling: Vec<usize> = self
            .team
            .members
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| {
                let member = slot.as_ref()?;
                let broken = member.is_placeholder()
                    || member.uids().any(|uid| self.find_pokemon(uid).is_none());
                broken.then_some(position)
            })
            .collect();
        for position in &dangling {
            self.team.members[*position] = None;
        }
        dangling.len()
    }

    /// Box every Pokémon in `position` and free the slot.
    pub fn move_team_member_to_box(&mut self, position: usize) -> bool {
        if position >= TEAM_SIZE {
            return false;
        }
        let Some(member) = self.team.members[position].take() else {
            return false;
        };
        let uids: Vec<String> = member.uids().map(str::to_string).collect();
        for uid in &uids {
            if let Some(pokemon) = self.find_pokemon_mut(uid) {
                box_pokemon(pokemon);
            }
        }
        true
    }

    /// Undo boxing for one Pokémon: restore its pre-box status (captured when none was
    /// recorded) and give its encounter a free team slot if one exists.
    pub fn restore_pokemon_to_team(&mut self, uid: &str) -> bool {
        let Some(pokemon) = self.find_pokemon_mut(uid) else {
            return false;
        };
        if pokemon.status != Some(PokemonStatus::Stored) {
            return false;
        }
        pokemon.status = Some(
            pokemon
                .original_receival_status
                .unwrap_or(PokemonStatus::Captured),
        );
        if let Some((location, _)) = self.locate(uid) {
            self.auto_assign(&location);
        }
        true
    }

    /// Put the encounter at `location_id` into `position`, replacing the occupant.
    pub fn place_on_team(&mut self, position: usize, location_id: &str) -> bool {
        if position >= TEAM_SIZE {
            return false;
        }
        let Some(pair) = self
            .encounters
            .get(location_id)
            .and_then(|encounter| encounter.team_pair())
        else {
            return false;
        };
        if self.team.members[position].as_ref() == Some(&pair) {
            return false;
        }
        let uids: Vec<String> = pair.uids().map(str::to_string).collect();
        self.evict_from_team(&uids);
        self.team.members[position] = Some(pair);
        true
    }

    pub fn clear_team_slot(&mut self, position: usize) -> bool {
        position < TEAM_SIZE && self.team.members[position].take().is_some()
    }

    pub fn swap_team_slots(&mut self, first: usize, second: usize) -> bool {
        if first >= TEAM_SIZE || second >= TEAM_SIZE || first == second {
            return false;
        }
        if self.team.members[first].is_none() && self.team.members[second].is_none() {
            return false;
        }
        self.team.members.swap(first, second);
        true
    }

    /// Occupied slots resolved to their encounter Pokémon.
    #[must_use]
    pub fn team_pokemon(&self) -> Vec<TeamEntry<'_>> {
        self.team
            .members
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| {
                let member = slot.as_ref()?;
                let head = self
                    .find_pokemon(&member.head_pokemon_uid)
                    .map(|(_, _, pokemon)| pokemon);
                let body = if member.is_fusion() {
                    self.find_pokemon(&member.body_pokemon_uid)
                        .map(|(_, _, pokemon)| pokemon)
                } else {
                    None
                };
                Some(TeamEntry {
                    position,
                    head,
                    body,
                })
            })
            .collect()
    }
}
