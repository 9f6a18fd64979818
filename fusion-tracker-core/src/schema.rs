//! Playthrough data model and load-boundary validation.
//!
//! Every record read from storage passes through [`crate::migrations`] first and then
//! [`Playthrough::from_value`]. Missing fields receive typed defaults; records that still
//! do not fit the current shape are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fixed team positions.
pub const TEAM_SIZE: usize = 6;
/// Version stamped on records that predate versioning.
pub const BASELINE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Classic,
    Remix,
    Randomized,
}

impl GameMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Remix => "remix",
            Self::Randomized => "randomized",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "remix" => Ok(Self::Remix),
            "randomized" => Ok(Self::Randomized),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PokemonStatus {
    Captured,
    Received,
    Traded,
    Missed,
    Stored,
    Deceased,
}

impl PokemonStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Captured => "captured",
            Self::Received => "received",
            Self::Traded => "traded",
            Self::Missed => "missed",
            Self::Stored => "stored",
            Self::Deceased => "deceased",
        }
    }

    /// Statuses eligible for automatic team placement.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Captured | Self::Received | Self::Traded)
    }
}

impl fmt::Display for PokemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PokemonStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "captured" => Ok(Self::Captured),
            "received" => Ok(Self::Received),
            "traded" => Ok(Self::Traded),
            "missed" => Ok(Self::Missed),
            "stored" => Ok(Self::Stored),
            "deceased" => Ok(Self::Deceased),
            _ => Err(()),
        }
    }
}

/// A Pokémon placed in one encounter slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonRef {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub national_dex_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PokemonStatus>,
    /// Location the Pokémon was first placed at. Written once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Status held before the Pokémon was first boxed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_receival_status: Option<PokemonStatus>,
}

impl PokemonRef {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, national_dex_id: u32) -> Self {
        Self {
            id,
            name: name.into(),
            national_dex_id,
            uid: None,
            status: None,
            original_location: None,
            nickname: None,
            original_receival_status: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: PokemonStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// The minted UID, ignoring empty strings left behind by older clients.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref().filter(|uid| !uid.is_empty())
    }

    #[must_use]
    pub fn has_uid(&self, uid: &str) -> bool {
        self.uid() == Some(uid)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|nick| !nick.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Which half of an encounter a Pokémon occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterField {
    Head,
    Body,
}

impl EncounterField {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Head => Self::Body,
            Self::Body => Self::Head,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for EncounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncounterField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(Self::Head),
            "body" => Ok(Self::Body),
            _ => Err(()),
        }
    }
}

/// Capture record for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncounterData {
    #[serde(default)]
    pub head: Option<PokemonRef>,
    #[serde(default)]
    pub body: Option<PokemonRef>,
    #[serde(default)]
    pub is_fusion: bool,
    #[serde(default)]
    pub updated_at: i64,
}

impl EncounterData {
    #[must_use]
    pub const fn slot(&self, field: EncounterField) -> Option<&PokemonRef> {
        match field {
            EncounterField::Head => self.head.as_ref(),
            EncounterField::Body => self.body.as_ref(),
        }
    }

    pub const fn slot_mut(&mut self, field: EncounterField) -> &mut Option<PokemonRef> {
        match field {
            EncounterField::Head => &mut self.head,
            EncounterField::Body => &mut self.body,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none() && self.body.is_none()
    }

    /// UIDs held in either slot, including a body retained after un-fusing.
    #[must_use]
    pub fn uids(&self) -> Vec<&str> {
        [self.head.as_ref(), self.body.as_ref()]
            .into_iter()
            .flatten()
            .filter_map(PokemonRef::uid)
            .collect()
    }

    #[must_use]
    pub fn contains_uid(&self, uid: &str) -> bool {
        self.uids().contains(&uid)
    }

    #[must_use]
    pub fn field_of(&self, uid: &str) -> Option<EncounterField> {
        if self.head.as_ref().is_some_and(|p| p.has_uid(uid)) {
            Some(EncounterField::Head)
        } else if self.body.as_ref().is_some_and(|p| p.has_uid(uid)) {
            Some(EncounterField::Body)
        } else {
            None
        }
    }

    /// The team member this encounter represents: both halves while fused,
    /// otherwise whichever Pokémon is visible.
    #[must_use]
    pub fn team_pair(&self) -> Option<TeamMember> {
        let head = self.head.as_ref().and_then(PokemonRef::uid);
        let body = self.body.as_ref().and_then(PokemonRef::uid);
        match (head, body) {
            (Some(head), Some(body)) if self.is_fusion => Some(TeamMember::fused(head, body)),
            (Some(head), _) => Some(TeamMember::single(head)),
            (None, Some(body)) => Some(TeamMember::single(body)),
            (None, None) => None,
        }
    }

    /// Status of the visible Pokémon, used to decide team eligibility.
    #[must_use]
    pub fn primary_status(&self) -> Option<PokemonStatus> {
        self.head
            .as_ref()
            .or(self.body.as_ref())
            .and_then(|pokemon| pokemon.status)
    }
}

/// One occupied team slot, referencing encounter Pokémon by UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    #[serde(default)]
    pub head_pokemon_uid: String,
    /// Empty for non-fusion members.
    #[serde(default)]
    pub body_pokemon_uid: String,
}

impl TeamMember {
    #[must_use]
    pub fn single(head: &str) -> Self {
        Self {
            head_pokemon_uid: head.to_string(),
            body_pokemon_uid: String::new(),
        }
    }

    #[must_use]
    pub fn fused(head: &str, body: &str) -> Self {
        Self {
            head_pokemon_uid: head.to_string(),
            body_pokemon_uid: body.to_string(),
        }
    }

    #[must_use]
    pub fn is_fusion(&self) -> bool {
        !self.body_pokemon_uid.is_empty()
    }

    /// Left behind when legacy location-based members could not be resolved.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.head_pokemon_uid.is_empty() && self.body_pokemon_uid.is_empty()
    }

    #[must_use]
    pub fn references(&self, uid: &str) -> bool {
        !uid.is_empty() && (self.head_pokemon_uid == uid || self.body_pokemon_uid == uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        [self.head_pokemon_uid.as_str(), self.body_pokemon_uid.as_str()]
            .into_iter()
            .filter(|uid| !uid.is_empty())
    }
}

/// Six fixed positions; the array type keeps the slot count invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Team {
    #[serde(default)]
    pub members: [Option<TeamMember>; TEAM_SIZE],
}

impl Team {
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TeamMember> {
        self.members.get(position).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn first_empty(&self) -> Option<usize> {
        self.members.iter().position(Option::is_none)
    }

    #[must_use]
    pub fn position_of(&self, uid: &str) -> Option<usize> {
        self.members
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|member| member.references(uid)))
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.first_empty().is_none()
    }

    #[must_use]
    pub fn occupied(&self) -> usize {
        self.members.iter().filter(|slot| slot.is_some()).count()
    }

}

/// A user-added location spliced after `insert_after_location_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomLocation {
    pub id: String,
    pub name: String,
    pub insert_after_location_id: String,
}

fn default_version() -> String {
    BASELINE_VERSION.to_string()
}

/// One save slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playthrough {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub encounters: BTreeMap<String, EncounterData>,
    #[serde(default)]
    pub team: Team,
    #[serde(default)]
    pub custom_locations: Vec<CustomLocation>,
}

/// Reasons a record is rejected at the load boundary.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed playthrough: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("playthrough id is empty")]
    MissingId,
    #[error("{field} must not be negative (got {value})")]
    NegativeTimestamp { field: &'static str, value: i64 },
    #[error("team slot {position} is invalid: {reason}")]
    TeamMember {
        position: usize,
        reason: &'static str,
    },
    #[error("custom location {id:?} is invalid: {reason}")]
    CustomLocation { id: String, reason: &'static str },
    #[error("custom location id {0:?} appears more than once")]
    DuplicateCustomLocation(String),
}

impl Playthrough {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, mode: GameMode, now: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            game_mode: mode,
            version: default_version(),
            created_at: now,
            updated_at: now,
            encounters: BTreeMap::new(),
            team: Team::default(),
            custom_locations: Vec::new(),
        }
    }

    /// Deserialize an already-migrated record and validate it. Team slots that do not
    /// resolve to an encounter are freed.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not match the current shape or breaks an invariant.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let mut playthrough: Self = serde_json::from_value(value)?;
        playthrough.validate()?;
        let cleared = playthrough.prune_team();
        if cleared > 0 {
            log::debug!(
                "cleared {cleared} unresolved team slot(s) in playthrough {}",
                playthrough.id
            );
        }
        Ok(playthrough)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id.trim().is_empty() {
            return Err(SchemaError::MissingId);
        }
        for (field, value) in [("createdAt", self.created_at), ("updatedAt", self.updated_at)] {
            if value < 0 {
                return Err(SchemaError::NegativeTimestamp { field, value });
            }
        }
        for (position, member) in self.team.members.iter().enumerate() {
            if let Some(member) = member
                && member.head_pokemon_uid.is_empty()
                && !member.body_pokemon_uid.is_empty()
            {
                return Err(SchemaError::TeamMember {
                    position,
                    reason: "body set without head",
                });
            }
        }
        let mut seen = HashSet::new();
        for location in &self.custom_locations {
            if location.id.trim().is_empty() {
                return Err(SchemaError::CustomLocation {
                    id: location.id.clone(),
                    reason: "empty id",
                });
            }
            if location.insert_after_location_id.trim().is_empty() {
                return Err(SchemaError::CustomLocation {
                    id: location.id.clone(),
                    reason: "empty anchor",
                });
            }
            if !seen.insert(location.id.as_str()) {
                return Err(SchemaError::DuplicateCustomLocation(location.id.clone()));
            }
        }
        Ok(())
    }

    /// Locate a Pokémon by UID across every encounter.
    #[must_use]
    pub fn find_pokemon(&self, uid: &str) -> Option<(&str, EncounterField, &PokemonRef)> {
        self.encounters.iter().find_map(|(location, encounter)| {
            let field = encounter.field_of(uid)?;
            encounter
                .slot(field)
                .map(|pokemon| (location.as_str(), field, pokemon))
        })
    }

    pub fn find_pokemon_mut(&mut self, uid: &str) -> Option<&mut PokemonRef> {
        self.encounters.values_mut().find_map(|encounter| {
            let field = encounter.field_of(uid)?;
            encounter.slot_mut(field).as_mut()
        })
    }

    /// Location id and field currently holding `uid`.
    #[must_use]
    pub fn locate(&self, uid: &str) -> Option<(String, EncounterField)> {
        self.find_pokemon(uid)
            .map(|(location, field, _)| (location.to_string(), field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_receive_defaults() {
        let playthrough = Playthrough::from_value(json!({ "id": "p1", "name": "Run" })).unwrap();
        assert_eq!(playthrough.version, BASELINE_VERSION);
        assert_eq!(playthrough.game_mode, GameMode::Classic);
        assert_eq!(playthrough.team.members.len(), TEAM_SIZE);
        assert!(playthrough.team.members.iter().all(Option::is_none));
        assert!(playthrough.custom_locations.is_empty());
    }

    #[test]
    fn short_team_array_is_rejected() {
        let err = Playthrough::from_value(json!({
            "id": "p1",
            "team": { "members": [null, null] }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));
    }

    #[test]
    fn blank_id_and_negative_timestamps_fail_closed() {
        assert!(matches!(
            Playthrough::from_value(json!({ "id": "  " })),
            Err(SchemaError::MissingId)
        ));
        assert!(matches!(
            Playthrough::from_value(json!({ "id": "p", "updatedAt": -4 })),
            Err(SchemaError::NegativeTimestamp { field: "updatedAt", .. })
        ));
    }

    #[test]
    fn unresolved_team_slots_are_cleared_after_validation() {
        let playthrough = Playthrough::from_value(json!({
            "id": "p1",
            "encounters": {
                "route-1": { "head": { "id": 1, "name": "Bulbasaur", "uid": "pk_a" } },
                "route-2": { "head": { "id": 4, "name": "Charmander", "uid": "pk_b" } }
            },
            "team": { "members": [
                { "headPokemonUid": "", "bodyPokemonUid": "" },
                { "headPokemonUid": "pk_a", "bodyPokemonUid": "" },
                { "headPokemonUid": "pk_ghost" },
                { "headPokemonUid": "pk_b", "bodyPokemonUid": "pk_gone" },
                null, null
            ]}
        }))
        .unwrap();
        assert!(playthrough.team.members[0].is_none());
        assert_eq!(playthrough.team.get(1), Some(&TeamMember::single("pk_a")));
        assert!(playthrough.team.members[2].is_none());
        assert!(playthrough.team.members[3].is_none());
        assert_eq!(playthrough.team.occupied(), 1);
    }

    #[test]
    fn duplicate_custom_location_ids_are_rejected() {
        let err = Playthrough::from_value(json!({
            "id": "p1",
            "customLocations": [
                { "id": "custom_a", "name": "A", "insertAfterLocationId": "route-1" },
                { "id": "custom_a", "name": "B", "insertAfterLocationId": "route-2" }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateCustomLocation(id) if id == "custom_a"));
    }

    #[test]
    fn team_pair_follows_fusion_flag() {
        let mut encounter = EncounterData {
            head: Some(PokemonRef::new(1, "Bulbasaur", 1).with_uid("h")),
            body: Some(PokemonRef::new(4, "Charmander", 4).with_uid("b")),
            is_fusion: true,
            updated_at: 0,
        };
        assert_eq!(encounter.team_pair(), Some(TeamMember::fused("h", "b")));
        encounter.is_fusion = false;
        assert_eq!(encounter.team_pair(), Some(TeamMember::single("h")));
        encounter.head = None;
        assert_eq!(encounter.team_pair(), Some(TeamMember::single("b")));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PokemonStatus::Captured,
            PokemonStatus::Received,
            PokemonStatus::Traded,
            PokemonStatus::Missed,
            PokemonStatus::Stored,
            PokemonStatus::Deceased,
        ] {
            assert_eq!(status.as_str().parse::<PokemonStatus>(), Ok(status));
        }
        assert!(PokemonStatus::Traded.is_active());
        assert!(!PokemonStatus::Stored.is_active());
    }

    #[test]
    fn empty_uid_is_not_a_uid() {
        let pokemon = PokemonRef::new(25, "Pikachu", 25).with_uid("");
        assert_eq!(pokemon.uid(), None);
        assert!(!TeamMember::single("x").references(""));
    }
}
