//! Ordered, idempotent transforms that bring a stored record of any prior
//! version into the current shape.
//!
//! Every step takes and returns a loosely typed bag (`serde_json::Value`) and never
//! fails: shapes it does not recognise fall back to defaults and are left for
//! [`crate::schema::Playthrough::from_value`] to accept or reject.

use serde_json::{Map, Value};

use crate::schema::{BASELINE_VERSION, GameMode, TEAM_SIZE};

/// A stored record before validation.
pub type MigrationBag = Value;

type Migration = fn(MigrationBag) -> MigrationBag;

/// Pipeline order matters: the remix flag is read before it is stripped.
const PIPELINE: [(&str, Migration); 5] = [
    ("remix-mode", migrate_remix_mode),
    ("version", migrate_version),
    ("team-field", migrate_team_field),
    ("team-member-schema", migrate_team_member_schema),
    ("cleanup-remix-mode", cleanup_remix_mode),
];

const LEGACY_REMIX_FIELD: &str = "remixMode";
const LEGACY_HEAD_ENCOUNTER: &str = "headEncounterId";
const LEGACY_BODY_ENCOUNTER: &str = "bodyEncounterId";
const HEAD_UID: &str = "headPokemonUid";
const BODY_UID: &str = "bodyPokemonUid";

/// Run every migration in order.
#[must_use]
pub fn migrate_playthrough(bag: MigrationBag) -> MigrationBag {
    PIPELINE.iter().fold(bag, |bag, (name, step)| {
        let before = log::log_enabled!(log::Level::Trace).then(|| bag.clone());
        let after = step(bag);
        if let Some(before) = before
            && before != after
        {
            log::trace!("migration {name} rewrote record");
        }
        after
    })
}

/// Legacy boolean `remixMode` becomes `gameMode: "remix"` while the mode is still default.
#[must_use]
pub fn migrate_remix_mode(mut bag: MigrationBag) -> MigrationBag {
    let Some(record) = bag.as_object_mut() else {
        return bag;
    };
    let remix = record
        .get(LEGACY_REMIX_FIELD)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let mode_is_default = match record.get("gameMode") {
        None | Some(Value::Null) => true,
        Some(Value::String(mode)) => mode == GameMode::default().as_str(),
        Some(_) => false,
    };
    if remix && mode_is_default {
        record.insert(
            "gameMode".to_string(),
            Value::String(GameMode::Remix.as_str().to_string()),
        );
    }
    bag
}

/// Stamp the baseline version on records that never had one.
#[must_use]
pub fn migrate_version(mut bag: MigrationBag) -> MigrationBag {
    let Some(record) = bag.as_object_mut() else {
        return bag;
    };
    let has_version = record
        .get("version")
        .and_then(Value::as_str)
        .is_some_and(|version| !version.trim().is_empty());
    if !has_version {
        record.insert(
            "version".to_string(),
            Value::String(BASELINE_VERSION.to_string()),
        );
    }
    bag
}

fn empty_members() -> Vec<Value> {
    vec![Value::Null; TEAM_SIZE]
}

fn densify_members(members: Option<&Value>) -> Vec<Value> {
    let mut dense = empty_members();
    match members {
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().take(TEAM_SIZE).enumerate() {
                dense[index] = entry.clone();
            }
        }
        Some(Value::Object(keyed)) => {
            for (key, entry) in keyed {
                if let Ok(index) = key.trim().parse::<usize>()
                    && index < TEAM_SIZE
                {
                    dense[index] = entry.clone();
                }
            }
        }
        _ => {}
    }
    for slot in &mut dense {
        if !slot.is_object() {
            *slot = Value::Null;
        }
    }
    dense
}

/// Normalise `team.members` into a dense six-element array from a sparse array,
/// an index-keyed map, or nothing at all.
#[must_use]
pub fn migrate_team_field(mut bag: MigrationBag) -> MigrationBag {
    let Some(record) = bag.as_object_mut() else {
        return bag;
    };
    let members = record
        .get("team")
        .and_then(Value::as_object)
        .and_then(|team| team.get("members"));
    let dense = densify_members(members);

    let team = record
        .entry("team")
        .or_insert_with(|| Value::Object(Map::new()));
    if !team.is_object() {
        *team = Value::Object(Map::new());
    }
    if let Some(team) = team.as_object_mut() {
        team.insert("members".to_string(), Value::Array(dense));
    }
    bag
}

fn member_placeholder() -> Value {
    let mut member = Map::new();
    member.insert(HEAD_UID.to_string(), Value::String(String::new()));
    member.insert(BODY_UID.to_string(), Value::String(String::new()));
    Value::Object(member)
}

fn migrate_member(member: &Value) -> Value {
    let Some(fields) = member.as_object() else {
        return Value::Null;
    };
    if let Some(head) = fields.get(HEAD_UID).and_then(Value::as_str) {
        let body = fields.get(BODY_UID).and_then(Value::as_str).unwrap_or("");
        let mut current = Map::new();
        current.insert(HEAD_UID.to_string(), Value::String(head.to_string()));
        current.insert(BODY_UID.to_string(), Value::String(body.to_string()));
        return Value::Object(current);
    }
    if fields.contains_key(LEGACY_HEAD_ENCOUNTER) || fields.contains_key(LEGACY_BODY_ENCOUNTER) {
        // Location references cannot be mapped back to a specific Pokémon UID.
        return member_placeholder();
    }
    Value::Null
}

/// Convert members still expressed as `{headEncounterId, bodyEncounterId}` into the
/// UID-based shape. Legacy references become empty placeholders.
#[must_use]
pub fn migrate_team_member_schema(mut bag: MigrationBag) -> MigrationBag {
    let Some(members) = bag
        .get_mut("team")
        .and_then(|team| team.get_mut("members"))
        .and_then(Value::as_array_mut)
    else {
        return bag;
    };
    for member in members.iter_mut() {
        if !member.is_null() {
            *member = migrate_member(member);
        }
    }
    bag
}

/// Drop the legacy `remixMode` flag once `gameMode` carries it.
#[must_use]
pub fn cleanup_remix_mode(mut bag: MigrationBag) -> MigrationBag {
    if let Some(record) = bag.as_object_mut() {
        record.remove(LEGACY_REMIX_FIELD);
    }
    bag
}
