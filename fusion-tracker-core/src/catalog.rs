//! Read-only reference data: species, canonical locations and starter sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{GameMode, PokemonRef, PokemonStatus};

/// A canonical map location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Location {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            region: None,
        }
    }
}

/// A species entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub national_dex_id: u32,
}

impl PokemonRef {
    /// Fresh encounter reference for a catalog species. The UID is minted on placement.
    #[must_use]
    pub fn from_species(species: &Species, status: Option<PokemonStatus>) -> Self {
        let mut pokemon = Self::new(species.id, species.name.clone(), species.national_dex_id);
        pokemon.status = status;
        pokemon
    }
}

/// Lookups the engine needs from the static data provider.
pub trait ReferenceCatalog {
    fn pokemon_by_id(&self, id: u32) -> Option<&Species>;

    /// Canonical locations in display order.
    fn locations_sorted(&self) -> &[Location];

    fn starters_for(&self, mode: GameMode) -> Vec<&Species>;

    fn location_ids(&self) -> Vec<&str> {
        self.locations_sorted()
            .iter()
            .map(|loc| loc.id.as_str())
            .collect()
    }
}

/// In-memory catalog deserialised from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub pokemon: Vec<Species>,
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Starter species ids keyed by game mode name.
    #[serde(default)]
    pub starters: BTreeMap<String, Vec<u32>>,
}

impl StaticCatalog {
    /// Load catalog data from a JSON string, sorting locations by `order`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into catalog data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut catalog: Self = serde_json::from_str(json)?;
        catalog.locations.sort_by_key(|loc| loc.order);
        Ok(catalog)
    }

    /// The catalog shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded JSON is malformed, which the test suite guards against.
    #[must_use]
    pub fn bundled() -> Self {
        Self::from_json(include_str!("../data/catalog.json"))
            .expect("embedded catalog must parse")
    }
}

impl ReferenceCatalog for StaticCatalog {
    fn pokemon_by_id(&self, id: u32) -> Option<&Species> {
        self.pokemon.iter().find(|species| species.id == id)
    }

    fn locations_sorted(&self) -> &[Location] {
        &self.locations
    }

    fn starters_for(&self, mode: GameMode) -> Vec<&Species> {
        let ids = self
            .starters
            .get(mode.as_str())
            .or_else(|| self.starters.get(GameMode::Classic.as_str()));
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.pokemon_by_id(*id))
                .collect()
        })
        .unwrap_or_default()
    }
}
