//! Structured game events embedded in the narration stream.
//!
//! The narration service is a language model, so payloads are parsed
//! leniently: every top-level field is optional, wrong types are ignored, and
//! unknown keys are kept in [`GameData::raw`] without affecting the reducer.
//! Numbers inside a game event get the same treatment as top-level ones: a
//! float is truncated and a non-number counts as absent.
//!
//! `gameEvent` is tagged by its `type` field. The variant payload may either
//! be nested under a key named after the type (`{"type":"reward","reward":{..}}`)
//! or sit directly on the event object (`{"type":"reward","name":..}`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::types::{GameContext, NpcId};

/// One parsed data segment.
#[derive(Debug, Clone, PartialEq)]
pub struct GameData {
    /// HP overwrite.
    pub hp: Option<i64>,
    /// Gold overwrite.
    pub gold: Option<i64>,
    /// Energy overwrite.
    pub energy: Option<i64>,
    /// Context switch, if the value was recognized.
    pub context: Option<GameContext>,
    /// Normalized choice list; `Some(vec![])` clears the pending choices.
    pub choices: Option<Vec<String>>,
    /// Typed game event.
    pub game_event: Option<GameEvent>,
    /// Direct xp grant.
    pub xp_gained: Option<u32>,
    /// Location name to sync to.
    pub current_location: Option<String>,
    /// The payload as received.
    pub raw: Value,
}

impl GameData {
    /// Interpret a JSON payload. Never fails: non-object payloads produce an
    /// event with every field empty.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let hp = raw.get("hp").and_then(number);
        let gold = raw.get("gold").and_then(number);
        let energy = raw.get("energy").and_then(number);
        let context = raw
            .get("context")
            .and_then(Value::as_str)
            .and_then(GameContext::parse);
        let choices = raw.get("choices").and_then(normalize_choices);
        let game_event = raw.get("gameEvent").and_then(GameEvent::from_value);
        let xp_gained = raw
            .get("xpGained")
            .and_then(number)
            .filter(|xp| *xp > 0)
            .map(|xp| u32::try_from(xp).unwrap_or(u32::MAX));
        let current_location = raw
            .get("currentLocation")
            .or_else(|| raw.get("current_location"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            hp,
            gold,
            energy,
            context,
            choices,
            game_event,
            xp_gained,
            current_location,
            raw,
        }
    }
}

fn number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value)
        .map(|n| n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)))
        .and_then(|n| i32::try_from(n).ok()))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value)
        .filter(|n| *n >= 0)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX)))
}

fn lenient_i32_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    Ok(lenient_i32(deserializer)?.unwrap_or(0))
}

/// Coerce a choice list to strings. Entries may be strings or objects with a
/// `text`, `action` or `label` field; blanks are dropped. Non-arrays yield
/// `None`.
#[must_use]
pub fn normalize_choices(value: &Value) -> Option<Vec<String>> {
    let entries = value.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => ["text", "action", "label"]
                    .iter()
                    .filter_map(|key| map.get(*key).and_then(Value::as_str))
                    .find(|s| !s.trim().is_empty()),
                _ => None,
            })
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Game event variants
// ---------------------------------------------------------------------------

/// The `gameEvent` sum type. Exactly one case per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Combat starts or updates.
    Combat(CombatEvent),
    /// A skill check was rolled.
    SkillCheck(SkillCheckEvent),
    /// Loot or xp was awarded.
    Reward(RewardEvent),
    /// An NPC died.
    NpcDeath(NpcDeathEvent),
    /// The player committed a crime.
    Crime(CrimeEvent),
    /// An NPC offered to join the party.
    Recruitment(RecruitmentEvent),
    /// A quest advanced.
    QuestProgress(QuestProgressEvent),
    /// A quest was finished.
    QuestComplete(QuestCompleteEvent),
    /// Combat ended.
    CombatEnded(CombatEndedEvent),
    /// A type the reducer does not know.
    Unknown(String),
}

impl GameEvent {
    /// Parse a `gameEvent` object. Returns `None` when there is no `type` or
    /// the payload does not fit the variant.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.get("type").and_then(Value::as_str)?;
        let payload = match value.get(kind) {
            Some(nested @ Value::Object(_)) => nested,
            _ => value,
        };
        let event = match kind {
            "combat" => Self::Combat(payload_as(kind, payload)?),
            "skillCheck" => Self::SkillCheck(payload_as(kind, payload)?),
            "reward" => Self::Reward(payload_as(kind, payload)?),
            "npcDeath" => Self::NpcDeath(payload_as(kind, payload)?),
            "crime" => Self::Crime(payload_as(kind, payload)?),
            "recruitment" => Self::Recruitment(payload_as(kind, payload)?),
            "questProgress" => Self::QuestProgress(payload_as(kind, payload)?),
            "questComplete" => Self::QuestComplete(payload_as(kind, payload)?),
            "combatEnded" => Self::CombatEnded(payload_as(kind, payload)?),
            other => Self::Unknown(other.to_string()),
        };
        Some(event)
    }
}

fn payload_as<T: DeserializeOwned>(kind: &str, payload: &Value) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(kind, error = %e, "Ignoring malformed game event payload");
            None
        }
    }
}

/// Combat start or update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEvent {
    /// Enemy name.
    #[serde(default, alias = "name", alias = "enemy")]
    pub enemy_name: Option<String>,
    /// Current enemy HP.
    #[serde(default, rename = "enemyHP", alias = "enemyHp", alias = "hp", deserialize_with = "lenient_i32")]
    pub enemy_hp: Option<i32>,
    /// Enemy max HP.
    #[serde(
        default,
        rename = "enemyMaxHP",
        alias = "enemyMaxHp",
        alias = "maxHp",
        deserialize_with = "lenient_i32"
    )]
    pub enemy_max_hp: Option<i32>,
    /// Whose turn it is.
    #[serde(default)]
    pub is_player_turn: Option<bool>,
    /// Enemy armor class.
    #[serde(
        default,
        rename = "enemyAC",
        alias = "enemyAc",
        alias = "ac",
        alias = "armorClass",
        deserialize_with = "lenient_i32"
    )]
    pub armor_class: Option<i32>,
}

/// A skill check rolled by the narrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCheckEvent {
    /// Skill name.
    #[serde(default)]
    pub skill: String,
    /// Natural d20.
    #[serde(default, deserialize_with = "lenient_i32_or_zero")]
    pub roll: i32,
    /// Modifier applied.
    #[serde(default, deserialize_with = "lenient_i32")]
    pub modifier: Option<i32>,
    /// Total.
    #[serde(default, deserialize_with = "lenient_i32")]
    pub total: Option<i32>,
    /// Difficulty class.
    #[serde(default, alias = "difficulty", alias = "target", deserialize_with = "lenient_i32")]
    pub dc: Option<i32>,
    /// Outcome as narrated.
    #[serde(default)]
    pub success: Option<bool>,
}

impl SkillCheckEvent {
    /// Natural 20.
    #[must_use]
    pub fn is_natural_max(&self) -> bool {
        self.roll == 20
    }
}

/// Loot or xp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEvent {
    /// Item name.
    #[serde(default, alias = "item", alias = "itemName", alias = "title")]
    pub name: String,
    /// Rarity name, parsed leniently.
    #[serde(default)]
    pub rarity: Option<String>,
    /// Experience granted.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub xp: Option<u32>,
}

/// An NPC died.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcDeathEvent {
    /// Name as narrated.
    #[serde(default, alias = "name", alias = "npc")]
    pub npc_name: String,
    /// Id, when the narrator knows it.
    #[serde(default)]
    pub npc_id: Option<NpcId>,
    /// Who killed the NPC; defaults to the player.
    #[serde(default)]
    pub killed_by: Option<String>,
}

/// A crime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeEvent {
    /// Crime type, e.g. "theft".
    #[serde(default, alias = "crime")]
    pub crime_type: String,
    /// What witnesses saw.
    #[serde(default)]
    pub description: Option<String>,
}

/// An NPC offers to join.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitmentEvent {
    /// Who.
    #[serde(default, alias = "name", alias = "npc")]
    pub npc_name: String,
    /// Role they would fill.
    #[serde(default)]
    pub role: Option<String>,
}

/// A quest advanced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgressEvent {
    /// Quest title as narrated.
    #[serde(default, alias = "quest", alias = "title", alias = "questName")]
    pub quest_title: String,
    /// Objective steps completed.
    #[serde(default, alias = "progress", deserialize_with = "lenient_u32")]
    pub increment: Option<u32>,
    /// Set when the narrator reports the objective done.
    #[serde(default)]
    pub completed: bool,
}

/// A quest was finished.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestCompleteEvent {
    /// Quest title as narrated.
    #[serde(default, alias = "quest", alias = "title", alias = "questName")]
    pub quest_title: String,
    /// Xp reward.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub xp: Option<u32>,
    /// Gold reward.
    #[serde(default, deserialize_with = "lenient_i32")]
    pub gold: Option<i32>,
    /// Item rewards.
    #[serde(default, alias = "rewards")]
    pub items: Vec<String>,
}

/// Combat ended.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatEndedEvent {
    /// Enemy HP at the end.
    #[serde(default, rename = "enemyHP", alias = "enemyHp", deserialize_with = "lenient_i32")]
    pub enemy_hp: Option<i32>,
    /// The player fled successfully.
    #[serde(default, alias = "flee")]
    pub fled: bool,
    /// The player won; the enemy counts as defeated.
    #[serde(default)]
    pub victory: Option<bool>,
}
