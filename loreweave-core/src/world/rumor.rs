//! Rumors: information that spreads outward from where something happened.
//!
//! A rumor starts at its origin with radius 0. Each world tick widens the
//! radius by one hop until it reaches its cap, at which point the rumor stops
//! spreading. It stays perceivable at its final radius.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::graph::LocationGraph;
use crate::types::{LocationId, NpcId, PlayerId, RumorId};

/// What a rumor is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RumorKind {
    /// Someone was killed.
    Death,
    /// A crime was witnessed.
    Crime,
    /// Anything else.
    General,
}

/// A spreading piece of world news.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rumor {
    /// Rumor id.
    pub id: RumorId,
    /// What people say.
    pub content: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: RumorKind,
    /// Where it started.
    pub origin_location_id: LocationId,
    /// Current spread in hops; only ever increases.
    pub spread_radius: u32,
    /// Spread cap.
    pub max_spread_radius: u32,
    /// When it started.
    pub timestamp: DateTime<Utc>,
    /// NPC the rumor is about.
    #[serde(default)]
    pub related_npc_id: Option<NpcId>,
    /// Player the rumor is about.
    #[serde(default)]
    pub related_player_id: Option<PlayerId>,
    /// Whether the rumor is still spreading.
    pub active: bool,
}

impl Rumor {
    /// A rumor at its origin.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        kind: RumorKind,
        origin: LocationId,
        max_spread_radius: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RumorId::new(),
            content: content.into(),
            kind,
            origin_location_id: origin,
            spread_radius: 0,
            max_spread_radius,
            timestamp: now,
            related_npc_id: None,
            related_player_id: None,
            active: true,
        }
    }

    /// "{name} the {role} was killed by {killer}." A killer of `player` reads
    /// as "an adventurer".
    #[must_use]
    pub fn death(
        npc_id: NpcId,
        npc_name: &str,
        npc_role: &str,
        killed_by: &str,
        origin: LocationId,
        max_spread_radius: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let killer = if killed_by == "player" { "an adventurer" } else { killed_by };
        let mut rumor = Self::new(
            format!("{npc_name} the {npc_role} was killed by {killer}."),
            RumorKind::Death,
            origin,
            max_spread_radius,
            now,
        );
        rumor.related_npc_id = Some(npc_id);
        rumor
    }

    /// "A criminal was spotted {description} near the area."
    #[must_use]
    pub fn crime(
        player_id: PlayerId,
        description: &str,
        origin: LocationId,
        max_spread_radius: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rumor = Self::new(
            format!("A criminal was spotted {} near the area.", description.to_lowercase()),
            RumorKind::Crime,
            origin,
            max_spread_radius,
            now,
        );
        rumor.related_player_id = Some(player_id);
        rumor
    }

    /// Whether the rumor has reached `location`.
    #[must_use]
    pub fn is_perceivable_at(&self, graph: &LocationGraph, location: &LocationId) -> bool {
        graph
            .reachable_within(&self.origin_location_id, self.spread_radius)
            .contains(location)
    }

    /// Spread one hop. Returns whether the radius grew.
    pub fn tick(&mut self) -> bool {
        if !self.active {
            return false;
        }
        let grew = self.spread_radius < self.max_spread_radius;
        if grew {
            self.spread_radius += 1;
        }
        self.active = self.spread_radius < self.max_spread_radius;
        grew
    }
}

/// Advance every active rumor by one hop. Returns how many grew.
pub fn tick_rumors(rumors: &mut [Rumor]) -> usize {
    rumors.iter_mut().map(Rumor::tick).filter(|changed| *changed).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::graph::LocationNode;

    fn chain() -> LocationGraph {
        let node = |id: &str, next: &[&str]| LocationNode {
            id: id.into(),
            name: id.into(),
            neighbors: next.iter().map(|n| LocationId::from(*n)).collect(),
        };
        LocationGraph::new(
            vec![node("a", &["b"]), node("b", &["c"]), node("c", &["d"]), node("d", &[])],
            16,
        )
    }

    #[test]
    fn rumor_spreads_along_chain() {
        let graph = chain();
        let mut rumor = Rumor::new("dragon", RumorKind::General, "a".into(), 3, Utc::now());
        assert!(rumor.is_perceivable_at(&graph, &"a".into()));
        assert!(!rumor.is_perceivable_at(&graph, &"b".into()));

        rumor.tick();
        rumor.tick();
        assert_eq!(rumor.spread_radius, 2);
        assert!(rumor.is_perceivable_at(&graph, &"c".into()));
        assert!(!rumor.is_perceivable_at(&graph, &"d".into()));
    }

    #[test]
    fn radius_is_capped_and_rumor_deactivates() {
        let mut rumor = Rumor::new("x", RumorKind::General, "a".into(), 2, Utc::now());
        assert!(rumor.tick());
        assert!(rumor.active);
        assert!(rumor.tick());
        assert!(!rumor.active);
        assert!(!rumor.tick());
        assert_eq!(rumor.spread_radius, 2);
    }

    #[test]
    fn inactive_rumor_stays_perceivable_at_final_radius() {
        let graph = chain();
        let mut rumor = Rumor::new("x", RumorKind::General, "a".into(), 1, Utc::now());
        rumor.tick();
        assert!(!rumor.active);
        assert!(rumor.is_perceivable_at(&graph, &"b".into()));
    }

    #[test]
    fn tick_rumors_counts_changes() {
        let now = Utc::now();
        let mut rumors = vec![
            Rumor::new("one", RumorKind::General, "a".into(), 3, now),
            Rumor::new("two", RumorKind::General, "a".into(), 0, now),
        ];
        rumors[1].active = false;
        assert_eq!(tick_rumors(&mut rumors), 1);
        assert_eq!(rumors[0].spread_radius, 1);
    }

    #[test]
    fn zero_radius_rumor_never_counts_as_grown() {
        let mut rumors = vec![Rumor::new("still", RumorKind::General, "a".into(), 0, Utc::now())];
        rumors[0].active = true;
        assert_eq!(tick_rumors(&mut rumors), 0);
        assert_eq!(rumors[0].spread_radius, 0);
        assert!(!rumors[0].active);
    }

    #[test]
    fn death_and_crime_wording() {
        let now = Utc::now();
        let death = Rumor::death("npc1".into(), "Bram", "blacksmith", "player", "a".into(), 4, now);
        assert_eq!(death.content, "Bram the blacksmith was killed by an adventurer.");
        assert_eq!(death.related_npc_id, Some(NpcId::from("npc1")));

        let crime = Rumor::crime("p1".into(), "Stealing Bread", "a".into(), 2, now);
        assert_eq!(crime.content, "A criminal was spotted stealing bread near the area.");
        assert_eq!(crime.kind, RumorKind::Crime);
    }
}
