//! Narration requests: what the processor asks the narration service for.
//!
//! The request body is camelCase JSON, as the service expects.

use serde::{Deserialize, Serialize};

use crate::types::{Attributes, CampaignId, ChatMessage, ChatRole, LocationId, NpcId, PlayerId};

/// One history entry sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `user` or `narrator`.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

/// Snapshot of the player sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Character name.
    pub name: String,
    /// Character class.
    pub class: String,
    /// Level.
    pub level: u32,
    /// Current HP.
    pub hp: i32,
    /// Max HP.
    pub max_hp: i32,
    /// Carried item names.
    pub inventory: Vec<String>,
    /// Known ability names.
    pub abilities: Vec<String>,
    /// Outstanding bounty.
    pub bounty: i32,
    /// Whether the player is jailed.
    pub is_jailed: bool,
    /// Ability scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Attributes>,
}

/// A one-shot narration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationRequest {
    /// What the player did, or a scripted prompt.
    pub prompt: String,
    /// Condensed transcript.
    pub history: Vec<HistoryEntry>,
    /// Campaign.
    pub campaign_id: CampaignId,
    /// Player's location.
    pub current_location_id: Option<LocationId>,
    /// Player.
    pub player_id: PlayerId,
    /// Player snapshot.
    pub player_state: PlayerSnapshot,
    /// Talking to a specific NPC.
    #[serde(rename = "isNPCDialogue", skip_serializing_if = "Option::is_none")]
    pub is_npc_dialogue: Option<bool>,
    /// The NPC being talked to.
    #[serde(rename = "targetNPCId", skip_serializing_if = "Option::is_none")]
    pub target_npc_id: Option<NpcId>,
}

/// Pick the messages sent as history: the `recent_count` newest, every older
/// anchor, then the newest remaining older messages up to `max_total`.
/// Chronological order is preserved.
#[must_use]
pub fn condense_history(
    messages: &[ChatMessage],
    recent_count: usize,
    max_total: usize,
) -> Vec<HistoryEntry> {
    let to_entry = |m: &ChatMessage| HistoryEntry {
        role: m.role,
        content: m.content.clone(),
    };
    if messages.len() <= max_total {
        return messages.iter().map(to_entry).collect();
    }

    let recent_count = recent_count.min(max_total);
    let split = messages.len() - recent_count;
    let (older, recent) = messages.split_at(split);

    let mut keep = vec![false; older.len()];
    let mut budget = max_total - recent_count;
    for (i, m) in older.iter().enumerate().rev() {
        if budget == 0 {
            break;
        }
        if m.anchor {
            keep[i] = true;
            budget -= 1;
        }
    }
    for (i, _) in older.iter().enumerate().rev() {
        if budget == 0 {
            break;
        }
        if !keep[i] {
            keep[i] = true;
            budget -= 1;
        }
    }

    older
        .iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then(|| to_entry(m)))
        .chain(recent.iter().map(to_entry))
        .collect()
}

/// Fill the arrival template for `location`.
#[must_use]
pub fn arrival_prompt(template: &str, location: &str) -> String {
    template.replace("{location}", location)
}
