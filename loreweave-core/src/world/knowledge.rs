//! What NPCs know about each other and about their surroundings.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::graph::LocationGraph;
use super::rumor::{Rumor, RumorKind};
use crate::types::{FactionId, LocationId, NpcId};

/// An NPC as read from the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcRecord {
    /// NPC id.
    pub id: NpcId,
    /// Display name.
    pub name: String,
    /// Role, e.g. "blacksmith".
    #[serde(default)]
    pub role: String,
    /// Where the NPC is.
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Faction membership.
    #[serde(default)]
    pub faction_id: Option<FactionId>,
    /// Essential NPCs cannot die.
    #[serde(default)]
    pub essential: bool,
    /// Whether the NPC is dead.
    #[serde(default)]
    pub dead: bool,
    /// Current health.
    #[serde(default = "default_npc_health")]
    pub health: i32,
}

fn default_npc_health() -> i32 {
    100
}

/// Why an NPC knows (or does not know) another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeReason {
    /// They are at the same location.
    SameLocation,
    /// They belong to the same faction.
    SameFaction,
    /// A death rumor about the subject has reached the asker.
    Rumor,
    /// The subject is at a neighboring location.
    AdjacentLocation,
    /// No connection.
    Unknown,
}

/// Answer to "does `asker` know `subject`?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knowledge {
    /// Whether the asker knows anything.
    pub knows: bool,
    /// The first rule that matched.
    pub reason: KnowledgeReason,
    /// Sentence suitable for a narration prompt.
    pub detail: String,
    /// Whether the asker knows the subject is dead.
    pub subject_dead: bool,
    /// Only hearsay, no details.
    pub vague: bool,
    /// The rumor cited, for [`KnowledgeReason::Rumor`].
    pub rumor_content: Option<String>,
}

/// Resolve what `asker` knows about `subject`. First matching rule wins:
/// same location, same faction, perceivable death rumor, adjacent location.
#[must_use]
pub fn npc_knowledge(
    graph: &LocationGraph,
    asker: &NpcRecord,
    subject: &NpcRecord,
    rumors: &[Rumor],
) -> Knowledge {
    let known = |reason, detail: String| Knowledge {
        knows: true,
        reason,
        detail,
        subject_dead: subject.dead,
        vague: false,
        rumor_content: None,
    };

    if let (Some(a), Some(b)) = (&asker.location_id, &subject.location_id) {
        if a == b {
            return known(
                KnowledgeReason::SameLocation,
                format!("{} knows {} - they are in the same location.", asker.name, subject.name),
            );
        }
    }

    if let (Some(a), Some(b)) = (&asker.faction_id, &subject.faction_id) {
        if a == b {
            return known(
                KnowledgeReason::SameFaction,
                format!("{} knows of {} through their shared faction.", asker.name, subject.name),
            );
        }
    }

    if subject.dead {
        if let Some(location) = &asker.location_id {
            let heard = rumors.iter().find(|r| {
                r.kind == RumorKind::Death
                    && r.related_npc_id.as_ref() == Some(&subject.id)
                    && r.is_perceivable_at(graph, location)
            });
            if let Some(rumor) = heard {
                return Knowledge {
                    knows: true,
                    reason: KnowledgeReason::Rumor,
                    detail: format!(
                        "{} has heard rumors about {}'s death.",
                        asker.name, subject.name
                    ),
                    subject_dead: true,
                    vague: false,
                    rumor_content: Some(rumor.content.clone()),
                };
            }
        }
    }

    if let (Some(a), Some(b)) = (&asker.location_id, &subject.location_id) {
        if graph.are_adjacent(a, b) {
            let mut knowledge = known(
                KnowledgeReason::AdjacentLocation,
                format!("{} has heard of {} from nearby travelers.", asker.name, subject.name),
            );
            knowledge.vague = true;
            return knowledge;
        }
    }

    Knowledge {
        knows: false,
        reason: KnowledgeReason::Unknown,
        detail: format!("{} has never heard of {}.", asker.name, subject.name),
        subject_dead: false,
        vague: false,
        rumor_content: None,
    }
}

/// A rumor as heard at a particular location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeardRumor {
    /// What people say.
    pub content: String,
    /// Category.
    pub kind: RumorKind,
    /// Younger than the configured recent window.
    pub recent: bool,
}

/// Everything an NPC at a location could plausibly talk about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationContext {
    /// Living NPCs at the location.
    pub npcs_here: Vec<String>,
    /// Living NPCs at neighboring locations.
    pub npcs_nearby: Vec<String>,
    /// Rumors that have reached the location.
    pub rumors: Vec<HeardRumor>,
    /// Dead NPCs whose bodies lie here.
    pub dead_here: Vec<String>,
}

/// Build the knowledge context for `location`.
#[must_use]
pub fn location_context(
    graph: &LocationGraph,
    location: &LocationId,
    npcs: &[NpcRecord],
    rumors: &[Rumor],
    now: DateTime<Utc>,
    recent_window: Duration,
) -> LocationContext {
    let mut context = LocationContext::default();
    for npc in npcs {
        let Some(at) = &npc.location_id else {
            continue;
        };
        if at == location {
            if npc.dead {
                context.dead_here.push(npc.name.clone());
            } else {
                context.npcs_here.push(npc.name.clone());
            }
        } else if !npc.dead && graph.are_adjacent(location, at) {
            context.npcs_nearby.push(npc.name.clone());
        }
    }
    context.rumors = rumors
        .iter()
        .filter(|r| r.is_perceivable_at(graph, location))
        .map(|r| HeardRumor {
            content: r.content.clone(),
            kind: r.kind,
            recent: now - r.timestamp < recent_window,
        })
        .collect();
    context
}
