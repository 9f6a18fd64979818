use anyhow::{Context, Result, bail};
use colored::Colorize;
use fusion_tracker_core::{
    CustomLocationGraph, EncounterData, EncounterField, Playthrough, PokemonRef, ReferenceCatalog,
    StaticCatalog, TEAM_SIZE, export_playthrough, ids::is_custom_location_id, import_playthrough,
};
use std::collections::HashSet;

use crate::session::Session;
use crate::{Command, CustomCommand, EncounterCommand, TeamCommand};

pub fn run(command: Command, session: &mut Session, catalog: &StaticCatalog) -> Result<()> {
    match command {
        Command::List => list(session),
        Command::Show => show(session, catalog),
        Command::New { name, mode } => {
            let id = session.store.create_playthrough(&name, mode.into());
            println!("{} created {}", "✔".green(), id.bold());
        }
        Command::Switch { id } => {
            if session.store.get(&id).is_none() {
                bail!("No playthrough with id {id}");
            }
            report(session.store.set_active(&id), &format!("switched to {id}"));
        }
        Command::Rename { name } => {
            let id = session.store.active_id().to_string();
            report(session.store.rename_playthrough(&id, &name), "renamed");
        }
        Command::SetMode { mode } => {
            let id = session.store.active_id().to_string();
            report(session.store.set_game_mode(&id, mode.into()), "game mode updated");
        }
        Command::Delete { id } => {
            if !session.store.delete_playthrough(&id) {
                bail!("No playthrough with id {id}");
            }
            log::debug!("removed record {}", session.config.record_key(&id));
            println!(
                "{} deleted {id}; active is now {}",
                "✔".green(),
                session.store.active_id().bold()
            );
        }
        Command::Export { output } => {
            let json = export_playthrough(session.store.active(), session.clock.as_ref())
                .context("Failed to serialize playthrough")?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{} exported to {}", "✔".green(), path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let existing: Vec<String> = session
                .store
                .playthroughs()
                .iter()
                .map(|p| p.id.clone())
                .collect();
            let playthrough = import_playthrough(
                &json,
                existing.iter().map(String::as_str),
                session.clock.as_ref(),
            )
            .with_context(|| format!("Failed to import {}", file.display()))?;
            let id = playthrough.id.clone();
            session.store.insert_playthrough(playthrough);
            session.store.set_active(&id);
            println!("{} imported as {}", "✔".green(), id.bold());
        }
        Command::Migrate => {
            let count = session.store.republish();
            println!("{} rewrote {count} playthrough(s)", "✔".green());
        }
        Command::Locations => locations(session, catalog),
        Command::Encounter(command) => encounter(command, session, catalog)?,
        Command::Team(command) => team(command, session, catalog)?,
        Command::Custom(command) => custom(command, session, catalog),
    }
    Ok(())
}

fn report(changed: bool, message: &str) {
    if changed {
        println!("{} {message}", "✔".green());
    } else {
        println!("{} nothing changed", "•".yellow());
    }
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn describe_pokemon(pokemon: &PokemonRef) -> String {
    let status = pokemon
        .status
        .map_or_else(String::new, |status| format!(" [{status}]"));
    format!("{}{status}", pokemon.display_name())
}

fn describe_encounter(encounter: &EncounterData) -> String {
    let head = encounter.head.as_ref().map(describe_pokemon);
    let body = encounter.body.as_ref().map(describe_pokemon);
    match (head, body, encounter.is_fusion) {
        (Some(head), Some(body), true) => format!("{head} + {body} {}", "(fusion)".magenta()),
        (Some(head), _, _) => head,
        (None, Some(body), _) => format!("{} + {body}", "?".dimmed()),
        (None, None, true) => "(empty fusion)".dimmed().to_string(),
        (None, None, false) => "(empty)".dimmed().to_string(),
    }
}

fn list(session: &Session) {
    for playthrough in session.store.playthroughs() {
        let marker = if playthrough.id == session.store.active_id() {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(
            "{marker} {} {} {} updated {} ({} encounters, {}/{TEAM_SIZE} team)",
            playthrough.name.bold(),
            playthrough.id.dimmed(),
            playthrough.game_mode,
            format_millis(playthrough.updated_at),
            playthrough.encounters.len(),
            playthrough.team.occupied(),
        );
    }
}

fn print_team(playthrough: &Playthrough) {
    println!("{}", "Team".bold());
    let entries = playthrough.team_pokemon();
    for position in 0..TEAM_SIZE {
        let line = entries
            .iter()
            .find(|entry| entry.position == position)
            .map_or_else(
                || "-".dimmed().to_string(),
                |entry| {
                    let names: Vec<String> = [entry.head, entry.body]
                        .into_iter()
                        .flatten()
                        .map(describe_pokemon)
                        .collect();
                    names.join(" + ")
                },
            );
        println!("  {}. {line}", position + 1);
    }
}

fn show(session: &Session, catalog: &StaticCatalog) {
    let playthrough = session.store.active();
    println!("{} {}", playthrough.name.bold(), playthrough.id.dimmed());
    println!(
        "  mode {}  version {}  created {}  updated {}",
        playthrough.game_mode,
        playthrough.version,
        format_millis(playthrough.created_at),
        format_millis(playthrough.updated_at)
    );
    print_team(playthrough);

    println!("{}", "Encounters".bold());
    let merged = session.store.merged_locations(catalog);
    let mut shown = HashSet::new();
    for location in &merged.locations {
        if let Some(encounter) = playthrough.encounters.get(&location.id) {
            shown.insert(location.id.as_str());
            println!("  {:24} {}", location.name, describe_encounter(encounter));
        }
    }
    for (location_id, encounter) in &playthrough.encounters {
        if shown.contains(location_id.as_str()) {
            continue;
        }
        let label = if is_custom_location_id(location_id) {
            format!("{location_id} (unplaced)")
        } else {
            location_id.clone()
        };
        println!("  {:24} {}", label.dimmed(), describe_encounter(encounter));
    }
}

fn locations(session: &Session, catalog: &StaticCatalog) {
    let merged = session.store.merged_locations(catalog);
    let playthrough = session.store.active();
    for (index, location) in merged.locations.iter().enumerate() {
        let name = if location.custom {
            format!("{} {}", location.name, "(custom)".cyan())
        } else {
            location.name.clone()
        };
        let summary = playthrough
            .encounters
            .get(&location.id)
            .map(describe_encounter)
            .unwrap_or_default();
        println!(
            "{:>3}. {name:32} {} {summary}",
            index + 1,
            location.id.dimmed()
        );
    }
    if let Some(diagnostic) = merged.diagnostic() {
        eprintln!("{} {diagnostic}", "warning:".yellow().bold());
    }
}

fn ensure_location(session: &Session, catalog: &StaticCatalog, location: &str) -> Result<()> {
    let known = catalog.location_ids().contains(&location)
        || session
            .store
            .active()
            .custom_locations
            .iter()
            .any(|loc| loc.id == location);
    if !known {
        bail!("Unknown location {location}");
    }
    Ok(())
}

fn slot_index(position: usize) -> Result<usize> {
    match position.checked_sub(1) {
        Some(index) if index < TEAM_SIZE => Ok(index),
        _ => bail!("Team positions run from 1 to {TEAM_SIZE}"),
    }
}

fn encounter(
    command: EncounterCommand,
    session: &mut Session,
    catalog: &StaticCatalog,
) -> Result<()> {
    match command {
        EncounterCommand::Set {
            location,
            species,
            field,
            fusion,
            status,
            nickname,
        } => {
            ensure_location(session, catalog, &location)?;
            let species = catalog
                .pokemon_by_id(species)
                .with_context(|| format!("Unknown species id {species}"))?;
            let field = EncounterField::from(field.field);
            let pokemon = PokemonRef::from_species(species, status.map(Into::into));
            let want_fusion = fusion || field == EncounterField::Body;
            let change = session.store.update_encounter(
                &location,
                Some(pokemon),
                field,
                want_fusion,
            );
            if let Some(nickname) = nickname.as_deref() {
                session.store.set_nickname(&location, field, Some(nickname));
            }
            report(change.changed, &format!("{} placed at {location}", species.name));
            if let Some(slot) = change.team_slot {
                println!("  joined the team in slot {}", slot + 1);
            }
        }
        EncounterCommand::Clear { location, field } => {
            let change = session.store.update_encounter(&location, None, field.field.into(), false);
            report(change.changed, "cleared");
        }
        EncounterCommand::Reset { location } => {
            report(session.store.reset_encounter(&location).changed, "reset");
        }
        EncounterCommand::Toggle { location } => {
            ensure_location(session, catalog, &location)?;
            let change = session.store.toggle_encounter_fusion(&location);
            let fused = session
                .store
                .active()
                .encounters
                .get(&location)
                .is_some_and(|encounter| encounter.is_fusion);
            report(
                change.changed,
                if fused { "fusion on" } else { "fusion off" },
            );
        }
        EncounterCommand::Flip { location } => {
            report(session.store.flip_encounter_fusion(&location).changed, "flipped");
        }
        EncounterCommand::Move {
            from,
            to,
            from_field,
            to_field,
        } => {
            ensure_location(session, catalog, &to)?;
            let change = session.store.move_encounter_atomic(
                &from,
                from_field.into(),
                &to,
                to_field.into(),
            );
            report(change.changed, &format!("moved {from} -> {to}"));
        }
        EncounterCommand::Swap {
            first,
            second,
            first_field,
            second_field,
        } => {
            ensure_location(session, catalog, &second)?;
            let change = session.store.swap_encounters(
                &first,
                first_field.into(),
                &second,
                second_field.into(),
            );
            report(change.changed, &format!("swapped {first} <-> {second}"));
        }
        EncounterCommand::Home { location, field } => {
            let change = session.store.move_to_original_location(&location, field.field.into());
            report(change.changed, "returned to original location");
        }
        EncounterCommand::Status {
            location,
            status,
            field,
        } => {
            let change = session.store.set_pokemon_status(
                &location,
                field.field.into(),
                status.into(),
            );
            report(change.changed, "status updated");
            if let Some(slot) = change.team_slot {
                println!("  joined the team in slot {}", slot + 1);
            }
        }
        EncounterCommand::Nickname {
            location,
            name,
            field,
        } => {
            let change = session.store.set_nickname(&location, field.field.into(), name.as_deref());
            report(change.changed, "nickname updated");
        }
    }
    Ok(())
}

fn team(command: TeamCommand, session: &mut Session, catalog: &StaticCatalog) -> Result<()> {
    match command {
        TeamCommand::Box { position } => {
            let changed = session.store.move_team_member_to_box(slot_index(position)?);
            report(changed, "boxed");
        }
        TeamCommand::Restore { uid } => {
            report(session.store.restore_pokemon_to_team(&uid), "restored");
        }
        TeamCommand::Place { position, location } => {
            ensure_location(session, catalog, &location)?;
            let changed = session.store.place_on_team(slot_index(position)?, &location);
            report(changed, "placed");
        }
        TeamCommand::Clear { position } => {
            report(session.store.clear_team_slot(slot_index(position)?), "cleared");
        }
        TeamCommand::Swap { first, second } => {
            let changed = session
                .store
                .swap_team_slots(slot_index(first)?, slot_index(second)?);
            report(changed, "swapped");
        }
    }
    print_team(session.store.active());
    Ok(())
}

fn custom(command: CustomCommand, session: &mut Session, catalog: &StaticCatalog) {
    let canonical = catalog.locations_sorted();
    match command {
        CustomCommand::Add { name, after } => {
            match session.store.add_custom_location(&name, &after, canonical) {
                Some(id) => println!("{} added {}", "✔".green(), id.bold()),
                None => println!(
                    "{} name must not be blank and {after} must be a known location",
                    "•".yellow()
                ),
            }
        }
        CustomCommand::Rename { id, name } => {
            report(session.store.rename_custom_location(&id, &name), "renamed");
        }
        CustomCommand::Move { id, after } => {
            let changed = session.store.reanchor_custom_location(&id, &after, canonical);
            report(changed, &format!("{id} now follows {after}"));
        }
        CustomCommand::Remove { id } => {
            let graph = CustomLocationGraph::new(&session.store.active().custom_locations);
            let Some(name) = graph.get(&id).map(|node| node.name.clone()) else {
                println!("{} no custom location {id}", "•".yellow());
                return;
            };
            let orphans = graph.would_orphan(&id);
            let changed = session.store.remove_custom_location(&id);
            report(changed, &format!("removed {name}"));
            if changed && orphans {
                println!("  dependent locations now follow its anchor");
            }
        }
    }
}
