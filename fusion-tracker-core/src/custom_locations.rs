//! User-added locations spliced into the canonical route order.
//!
//! Each custom location names an anchor (a canonical location or another custom
//! location) and is displayed immediately after it. Anchors form singly linked chains;
//! nodes whose chain never reaches a canonical location are excluded from the merged
//! order rather than failing the merge.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::catalog::Location;
use crate::ids;
use crate::schema::{CustomLocation, Playthrough};

/// One entry of the merged, displayable location sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLocation {
    pub id: String,
    pub name: String,
    pub custom: bool,
}

/// A custom location left out of the merged order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedLocation {
    pub id: String,
    pub name: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub locations: Vec<MergedLocation>,
    pub excluded: Vec<ExcludedLocation>,
}

impl MergeOutcome {
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.locations.iter().map(|loc| loc.id.as_str()).collect()
    }

    /// Human-readable summary of excluded nodes, `None` when everything resolved.
    #[must_use]
    pub fn diagnostic(&self) -> Option<String> {
        if self.excluded.is_empty() {
            return None;
        }
        let entries: Vec<String> = self
            .excluded
            .iter()
            .map(|loc| format!("{} -> {}", loc.name, loc.anchor))
            .collect();
        Some(format!(
            "unresolved custom locations (cycle or missing anchor): {}",
            entries.join(", ")
        ))
    }
}

/// Splice custom locations into the canonical order.
///
/// Runs repeated passes; a node is placed once its anchor is already in the output.
/// The pass count is bounded by the number of custom nodes, so cyclic or dangling
/// anchors simply stay unplaced.
#[must_use]
pub fn merge_locations(canonical: &[Location], custom: &[CustomLocation]) -> MergeOutcome {
    let mut output: Vec<MergedLocation> = canonical
        .iter()
        .map(|loc| MergedLocation {
            id: loc.id.clone(),
            name: loc.name.clone(),
            custom: false,
        })
        .collect();
    let mut placed: HashSet<&str> = canonical.iter().map(|loc| loc.id.as_str()).collect();
    let mut pending: Vec<&CustomLocation> = custom.iter().collect();

    for _ in 0..=custom.len() {
        if pending.is_empty() {
            break;
        }
        let before = pending.len();
        pending.retain(|node| {
            let node: &CustomLocation = *node;
            let anchor = node.insert_after_location_id.as_str();
            if placed.contains(node.id.as_str()) || !placed.contains(anchor) {
                return true;
            }
            let Some(anchor_index) = output.iter().position(|loc| loc.id == anchor) else {
                return true;
            };
            output.insert(
                anchor_index + 1,
                MergedLocation {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    custom: true,
                },
            );
            placed.insert(node.id.as_str());
            false
        });
        if pending.len() == before {
            break;
        }
    }

    let excluded: Vec<ExcludedLocation> = pending
        .into_iter()
        .map(|node| ExcludedLocation {
            id: node.id.clone(),
            name: node.name.clone(),
            anchor: node.insert_after_location_id.clone(),
        })
        .collect();
    let outcome = MergeOutcome {
        locations: output,
        excluded,
    };
    if let Some(message) = outcome.diagnostic() {
        log::warn!("{message}");
    }
    outcome
}

/// Index over a raw custom-location list for dependency queries.
#[derive(Debug)]
pub struct CustomLocationGraph<'a> {
    nodes: &'a [CustomLocation],
    index: HashMap<&'a str, usize>,
    children: HashMap<&'a str, Vec<usize>>,
}

impl<'a> CustomLocationGraph<'a> {
    #[must_use]
    pub fn new(nodes: &'a [CustomLocation]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert(position);
            children
                .entry(node.insert_after_location_id.as_str())
                .or_default()
                .push(position);
        }
        Self {
            nodes,
            index,
            children,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a CustomLocation> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes anchored directly to `id`, in list order.
    #[must_use]
    pub fn direct_dependents(&self, id: &str) -> Vec<&'a CustomLocation> {
        self.children
            .get(id)
            .map(|positions| positions.iter().map(|&p| &self.nodes[p]).collect())
            .unwrap_or_default()
    }

    /// Every node whose anchor chain passes through `id`, breadth first.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Vec<&'a CustomLocation> {
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for node in self.direct_dependents(current) {
                if visited.insert(node.id.as_str()) {
                    found.push(node);
                    queue.push_back(node.id.as_str());
                }
            }
        }
        found
    }

    /// Whether deleting `id` affects any other custom location.
    #[must_use]
    pub fn would_orphan(&self, id: &str) -> bool {
        self.children.get(id).is_some_and(|kids| !kids.is_empty())
    }

    /// Whether anchoring `id` after `anchor` would close a loop.
    #[must_use]
    pub fn would_create_cycle(&self, id: &str, anchor: &str) -> bool {
        id == anchor || self.dependents(id).iter().any(|node| node.id == anchor)
    }
}

/// Delete `id`, promoting its direct dependents onto its own anchor.
pub fn remove_custom_location(
    nodes: &mut Vec<CustomLocation>,
    id: &str,
) -> Option<CustomLocation> {
    let position = nodes.iter().position(|node| node.id == id)?;
    let removed = nodes.remove(position);
    let promoted_anchor = if removed.insert_after_location_id == removed.id {
        None
    } else {
        Some(removed.insert_after_location_id.clone())
    };
    if let Some(anchor) = promoted_anchor {
        for node in nodes.iter_mut() {
            if node.insert_after_location_id == removed.id {
                node.insert_after_location_id.clone_from(&anchor);
            }
        }
    }
    Some(removed)
}

/// Whether `anchor` names a canonical location or an existing custom location.
#[must_use]
pub fn anchor_resolves(anchor: &str, canonical: &[Location], custom: &[CustomLocation]) -> bool {
    canonical.iter().any(|loc| loc.id == anchor) || custom.iter().any(|node| node.id == anchor)
}

impl Playthrough {
    /// Insert a custom location after `anchor`. Blank names and anchors that resolve
    /// to nothing are refused.
    pub fn add_custom_location(
        &mut self,
        name: &str,
        anchor: &str,
        canonical: &[Location],
        now: i64,
    ) -> Option<String> {
        let name = name.trim();
        if name.is_empty() || !anchor_resolves(anchor, canonical, &self.custom_locations) {
            return None;
        }
        let id = ids::new_custom_location_id(now);
        self.custom_locations.push(CustomLocation {
            id: id.clone(),
            name: name.to_string(),
            insert_after_location_id: anchor.to_string(),
        });
        Some(id)
    }

    pub fn rename_custom_location(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match self.custom_locations.iter_mut().find(|node| node.id == id) {
            Some(node) if node.name != name => {
                node.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Move a custom location behind a different anchor unless that closes a loop.
    pub fn reanchor_custom_location(
        &mut self,
        id: &str,
        anchor: &str,
        canonical: &[Location],
    ) -> bool {
        if !anchor_resolves(anchor, canonical, &self.custom_locations) {
            return false;
        }
        let graph = CustomLocationGraph::new(&self.custom_locations);
        if !graph.contains(id) {
            return false;
        }
        if graph.would_create_cycle(id, anchor) {
            log::debug!("refusing to anchor {id} after {anchor}: would create a cycle");
            return false;
        }
        match self.custom_locations.iter_mut().find(|node| node.id == id) {
            Some(node) if node.insert_after_location_id != anchor => {
                node.insert_after_location_id = anchor.to_string();
                true
            }
            _ => false,
        }
    }

    /// Delete a custom location, reattach its dependents and drop its encounter.
    pub fn remove_custom_location(&mut self, id: &str) -> bool {
        if remove_custom_location(&mut self.custom_locations, id).is_none() {
            return false;
        }
        self.reset_encounter(id);
        true
    }

    #[must_use]
    pub fn merged_locations(&self, canonical: &[Location]) -> MergeOutcome {
        merge_locations(canonical, &self.custom_locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> Vec<Location> {
        ["pallet-town", "route-1", "viridian-city"]
            .iter()
            .enumerate()
            .map(|(order, id)| Location::new(*id, id.replace('-', " "), order as u32))
            .collect()
    }

    fn node(id: &str, anchor: &str) -> CustomLocation {
        CustomLocation {
            id: id.to_string(),
            name: id.to_uppercase(),
            insert_after_location_id: anchor.to_string(),
        }
    }

    #[test]
    fn chained_custom_locations_follow_their_anchor() {
        // B is listed first so it only resolves on the second pass.
        let custom = vec![node("b", "a"), node("a", "route-1")];
        let outcome = merge_locations(&canonical(), &custom);
        assert_eq!(
            outcome.ids(),
            vec!["pallet-town", "route-1", "a", "b", "viridian-city"]
        );
        assert!(outcome.excluded.is_empty());
        assert!(outcome.diagnostic().is_none());
    }

    #[test]
    fn cycles_are_excluded_with_diagnostic() {
        let custom = vec![node("a", "b"), node("b", "a")];
        let outcome = merge_locations(&canonical(), &custom);
        assert_eq!(outcome.ids(), vec!["pallet-town", "route-1", "viridian-city"]);
        let message = outcome.diagnostic().unwrap();
        assert!(message.contains("A -> b"));
        assert!(message.contains("B -> a"));
    }

    #[test]
    fn dangling_and_self_anchors_are_excluded() {
        let custom = vec![
            node("lost", "nowhere"),
            node("selfish", "selfish"),
            node("ok", "pallet-town"),
        ];
        let outcome = merge_locations(&canonical(), &custom);
        assert_eq!(
            outcome.ids(),
            vec!["pallet-town", "ok", "route-1", "viridian-city"]
        );
        let excluded: Vec<&str> = outcome.excluded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(excluded, vec!["lost", "selfish"]);
    }

    #[test]
    fn dependents_are_transitive_and_cycle_safe() {
        let custom = vec![
            node("a", "route-1"),
            node("b", "a"),
            node("c", "b"),
            node("x", "y"),
            node("y", "x"),
        ];
        let graph = CustomLocationGraph::new(&custom);
        let ids: Vec<&str> = graph.dependents("a").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        let cyclic: Vec<&str> = graph.dependents("x").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(cyclic, vec!["y"]);
        assert!(graph.would_orphan("a"));
        assert!(!graph.would_orphan("c"));
        assert!(graph.would_create_cycle("a", "c"));
        assert!(!graph.would_create_cycle("c", "a"));
    }

    #[test]
    fn removal_promotes_direct_dependents_only() {
        let mut custom = vec![node("a", "route-1"), node("b", "a"), node("c", "b")];
        let removed = remove_custom_location(&mut custom, "a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(custom[0].insert_after_location_id, "route-1");
        assert_eq!(custom[1].insert_after_location_id, "b");
        assert!(remove_custom_location(&mut custom, "missing").is_none());
    }

    #[test]
    fn playthrough_edits_refuse_cycles_and_blank_names() {
        let mut run = Playthrough::new("p", "Run", crate::schema::GameMode::Classic, 0);
        assert!(run.add_custom_location("  ", "route-1", &canonical(), 5).is_none());
        assert!(run.add_custom_location("Lake", "nowhere", &canonical(), 5).is_none());
        let lake = run.add_custom_location("Lake", "route-1", &canonical(), 5).unwrap();
        let cave = run.add_custom_location("Cave", &lake, &canonical(), 6).unwrap();
        assert!(lake.starts_with("custom_"));

        assert!(!run.reanchor_custom_location(&lake, &cave, &canonical()));
        assert!(!run.reanchor_custom_location(&lake, &lake, &canonical()));
        assert!(run.reanchor_custom_location(&cave, "pallet-town", &canonical()));
        assert!(run.rename_custom_location(&cave, "Deep Cave"));
        assert!(!run.rename_custom_location(&cave, " "));

        let ids = run.merged_locations(&canonical());
        assert_eq!(
            ids.ids(),
            vec!["pallet-town", cave.as_str(), "route-1", lake.as_str(), "viridian-city"]
        );
    }

    #[test]
    fn removing_from_playthrough_drops_encounter_and_team_slot() {
        use crate::schema::{EncounterData, PokemonRef, PokemonStatus};

        let mut run = Playthrough::new("p", "Run", crate::schema::GameMode::Classic, 0);
        let lake = run.add_custom_location("Lake", "route-1", &canonical(), 1).unwrap();
        let pond = run.add_custom_location("Pond", &lake, &canonical(), 2).unwrap();
        run.encounters.insert(
            lake.clone(),
            EncounterData {
                head: Some(
                    PokemonRef::new(7, "Squirtle", 7)
                        .with_uid("pk_lake")
                        .with_status(PokemonStatus::Captured),
                ),
                ..EncounterData::default()
            },
        );
        assert_eq!(run.auto_assign(&lake), Some(0));

        assert!(run.remove_custom_location(&lake));
        assert!(!run.encounters.contains_key(&lake));
        assert!(run.team.members[0].is_none());
        assert_eq!(run.custom_locations[0].id, pond);
        assert_eq!(run.custom_locations[0].insert_after_location_id, "route-1");
        assert!(!run.remove_custom_location(&lake));
    }

    #[test]
    fn anchors_resolve_against_both_lists() {
        let custom = vec![node("a", "route-1")];
        assert!(anchor_resolves("route-1", &canonical(), &custom));
        assert!(anchor_resolves("a", &canonical(), &custom));
        assert!(!anchor_resolves("cerulean", &canonical(), &custom));
    }
}
