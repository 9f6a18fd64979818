use std::collections::HashSet;

use fusion_tracker_core::custom_locations::remove_custom_location;
use fusion_tracker_core::{
    CustomLocation, EncounterField, GameMode, Location, Playthrough, PokemonRef, PokemonStatus,
    TEAM_SIZE, TeamMember, merge_locations, migrate_playthrough,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const NOW: i64 = 1_700_000_000_000;

fn run() -> Playthrough {
    Playthrough::new("p", "Run", GameMode::Classic, NOW)
}

fn pokemon(id: u32, status: Option<PokemonStatus>) -> PokemonRef {
    let mut pokemon = PokemonRef::new(id, format!("species-{id}"), id);
    pokemon.status = status;
    pokemon
}

fn captured(id: u32) -> PokemonRef {
    pokemon(id, Some(PokemonStatus::Captured))
}

fn uid(run: &Playthrough, location: &str, field: EncounterField) -> String {
    run.encounters[location]
        .slot(field)
        .and_then(PokemonRef::uid)
        .expect("slot has a uid")
        .to_string()
}

fn assert_consistent(run: &Playthrough) {
    assert_eq!(run.team.members.len(), TEAM_SIZE);
    let mut team_uids = HashSet::new();
    for member in run.team.members.iter().flatten() {
        assert!(!member.head_pokemon_uid.is_empty(), "slot without head: {member:?}");
        for uid in member.uids() {
            assert!(team_uids.insert(uid.to_string()), "uid {uid} on two slots");
            assert!(run.find_pokemon(uid).is_some(), "team references missing {uid}");
        }
    }
    let mut encounter_uids = HashSet::new();
    for encounter in run.encounters.values() {
        for uid in encounter.uids() {
            assert!(encounter_uids.insert(uid.to_string()), "uid {uid} in two slots");
        }
    }
}

#[test]
fn auto_assignment_fills_slots_in_creation_order() {
    let mut run = run();
    for (index, location) in ["route-1", "route-2", "route-3"].iter().enumerate() {
        let change = run.update_encounter(
            location,
            Some(captured(index as u32 + 1)),
            EncounterField::Head,
            false,
            NOW,
        );
        assert_eq!(change.team_slot, Some(index));
    }
    for (index, location) in ["route-1", "route-2", "route-3"].iter().enumerate() {
        assert_eq!(
            run.team.members[index],
            Some(TeamMember::single(&uid(&run, location, EncounterField::Head)))
        );
    }
}

#[test]
fn full_team_ignores_seventh_active_encounter() {
    let mut run = run();
    for index in 0..TEAM_SIZE {
        run.update_encounter(
            &format!("route-{index}"),
            Some(captured(index as u32 + 1)),
            EncounterField::Head,
            false,
            NOW,
        );
    }
    let before = run.team.clone();
    let change = run.update_encounter(
        "route-99",
        Some(captured(99)),
        EncounterField::Head,
        false,
        NOW,
    );
    assert!(change.changed);
    assert_eq!(change.team_slot, None);
    assert_eq!(run.team, before);
    assert_consistent(&run);
}

#[test]
fn fusion_occupies_one_slot() {
    let mut run = run();
    run.update_encounter("route-1", Some(captured(1)), EncounterField::Head, true, NOW);
    run.update_encounter("route-1", Some(captured(4)), EncounterField::Body, true, NOW);
    let head = uid(&run, "route-1", EncounterField::Head);
    let body = uid(&run, "route-1", EncounterField::Body);
    assert_eq!(run.team.members[0], Some(TeamMember::fused(&head, &body)));
    assert!(run.team.members[1].is_none());
    assert_eq!(run.team.occupied(), 1);
}

#[test]
fn box_and_restore_returns_captured() {
    let mut run = run();
    run.update_encounter("route-1", Some(captured(1)), EncounterField::Head, false, NOW);
    let head = uid(&run, "route-1", EncounterField::Head);
    assert!(run.move_team_member_to_box(0));
    assert_eq!(run.find_pokemon(&head).unwrap().2.status, Some(PokemonStatus::Stored));
    assert!(run.restore_pokemon_to_team(&head));
    assert_eq!(run.find_pokemon(&head).unwrap().2.status, Some(PokemonStatus::Captured));

    // No snapshot recorded: the default is captured as well.
    run.update_encounter(
        "route-2",
        Some(pokemon(2, Some(PokemonStatus::Stored))),
        EncounterField::Head,
        false,
        NOW,
    );
    let stored = uid(&run, "route-2", EncounterField::Head);
    assert!(run.restore_pokemon_to_team(&stored));
    assert_eq!(run.find_pokemon(&stored).unwrap().2.status, Some(PokemonStatus::Captured));
}

#[test]
fn clearing_fusion_head_drops_its_slot_only() {
    let mut run = run();
    run.update_encounter("route-1", Some(captured(1)), EncounterField::Head, true, NOW);
    run.update_encounter("route-1", Some(captured(4)), EncounterField::Body, true, NOW);
    run.update_encounter("route-2", Some(captured(7)), EncounterField::Head, false, NOW);
    let other = run.team.members[1].clone();
    assert!(other.is_some());

    run.update_encounter("route-1", None, EncounterField::Head, true, NOW);
    assert!(run.team.members[0].is_none());
    assert_eq!(run.team.members[1], other);
    assert_consistent(&run);
}

#[test]
fn custom_location_chain_and_cycle() {
    let canonical: Vec<Location> = ["pallet-town", "route-1", "viridian-city"]
        .iter()
        .enumerate()
        .map(|(order, id)| Location::new(*id, *id, order as u32))
        .collect();
    let node = |id: &str, anchor: &str| CustomLocation {
        id: id.to_string(),
        name: id.to_string(),
        insert_after_location_id: anchor.to_string(),
    };

    let chained = merge_locations(&canonical, &[node("A", "route-1"), node("B", "A")]);
    assert_eq!(chained.ids(), ["pallet-town", "route-1", "A", "B", "viridian-city"]);

    let cyclic = merge_locations(&canonical, &[node("A", "B"), node("B", "A")]);
    assert_eq!(cyclic.ids(), ["pallet-town", "route-1", "viridian-city"]);
    let diagnostic = cyclic.diagnostic().unwrap();
    assert!(diagnostic.contains('A') && diagnostic.contains('B'));

    let mut nodes = vec![node("A", "route-1"), node("B", "A"), node("C", "B")];
    remove_custom_location(&mut nodes, "A");
    assert_eq!(nodes[0].insert_after_location_id, "route-1");
    assert_eq!(nodes[1].insert_after_location_id, "B");
}

#[test]
fn migration_is_idempotent_over_legacy_shapes() {
    let samples = [
        json!({ "id": "a", "remixMode": true }),
        json!({ "id": "b", "remixMode": false, "gameMode": "classic", "team": { "members": [] } }),
        json!({ "id": "c", "team": { "members": { "1": { "headEncounterId": "route-1" } } } }),
        json!({ "id": "d", "version": "", "team": null }),
        json!({ "id": "e", "team": { "members": [{ "headPokemonUid": "x" }, 5, "y"] } }),
    ];
    for sample in samples {
        let once = migrate_playthrough(sample);
        assert_eq!(migrate_playthrough(once.clone()), once);
        Playthrough::from_value(once).expect("migrated record validates");
    }
}

#[test]
fn random_operation_sequences_keep_team_consistent() {
    const LOCATIONS: [&str; 5] = ["route-1", "route-2", "route-3", "route-4", "route-5"];
    const FIELDS: [EncounterField; 2] = [EncounterField::Head, EncounterField::Body];
    const STATUSES: [PokemonStatus; 6] = [
        PokemonStatus::Captured,
        PokemonStatus::Received,
        PokemonStatus::Traded,
        PokemonStatus::Missed,
        PokemonStatus::Stored,
        PokemonStatus::Deceased,
    ];

    for seed in 0..40_u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut run = run();
        for step in 0..200 {
            let location = LOCATIONS[rng.gen_range(0..LOCATIONS.len())];
            let other = LOCATIONS[rng.gen_range(0..LOCATIONS.len())];
            let field = FIELDS[rng.gen_range(0..2)];
            let other_field = FIELDS[rng.gen_range(0..2)];
            match rng.gen_range(0..12) {
                0..=2 => {
                    let status = STATUSES[rng.gen_range(0..STATUSES.len())];
                    let species = pokemon(rng.gen_range(1..30), Some(status));
                    run.update_encounter(
                        location,
                        Some(species),
                        field,
                        rng.gen_bool(0.5),
                        NOW + step,
                    );
                }
                3 => {
                    run.update_encounter(location, None, field, false, NOW + step);
                }
                4 => {
                    run.toggle_encounter_fusion(location, NOW + step);
                }
                5 => {
                    run.flip_encounter_fusion(location, NOW + step);
                }
                6 => {
                    run.move_encounter_atomic(location, field, other, other_field, NOW + step);
                }
                7 => {
                    run.swap_encounters(location, field, other, other_field, NOW + step);
                }
                8 => {
                    run.move_to_original_location(location, field, NOW + step);
                }
                9 => {
                    run.move_team_member_to_box(rng.gen_range(0..TEAM_SIZE + 1));
                }
                10 => {
                    let uids: Vec<String> = run
                        .encounters
                        .values()
                        .flat_map(|e| e.uids().into_iter().map(str::to_string))
                        .collect();
                    if !uids.is_empty() {
                        let pick = uids[rng.gen_range(0..uids.len())].clone();
                        run.restore_pokemon_to_team(&pick);
                    }
                }
                _ => {
                    let status = STATUSES[rng.gen_range(0..STATUSES.len())];
                    run.set_pokemon_status(location, field, status, NOW + step);
                }
            }
            assert_consistent(&run);
        }
        // Round-trips through the load boundary unchanged.
        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(Playthrough::from_value(migrate_playthrough(value)).unwrap(), run);
    }
}
