//! Core type definitions for loreweave.
//!
//! All types are serializable; identifiers coming from the external store are
//! opaque strings, identifiers minted by the engine are UUIDs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a store identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a campaign.
    CampaignId
);
string_id!(
    /// Identifier of a player within a campaign.
    PlayerId
);
string_id!(
    /// Identifier of a location node in the world graph.
    LocationId
);
string_id!(
    /// Identifier of a non-player character.
    NpcId
);
string_id!(
    /// Identifier of a quest.
    QuestId
);
string_id!(
    /// Identifier of a bounty region.
    RegionId
);
string_id!(
    /// Identifier of an ability (spell, technique).
    AbilityId
);
string_id!(
    /// Identifier of a faction.
    FactionId
);

/// Unique identifier for a queued reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewardId(pub Uuid);

impl RewardId {
    /// Create a new random reward ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RewardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a rumor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RumorId(pub Uuid);

impl RumorId {
    /// Create a new random rumor ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RumorId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Context & Rewards
// ---------------------------------------------------------------------------

/// What the player is currently doing; drives which UI the presentation shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameContext {
    /// Free exploration.
    #[default]
    Explore,
    /// Turn-based combat.
    Combat,
    /// Conversation with NPCs.
    Social,
    /// Resting.
    Rest,
}

impl GameContext {
    /// Parse a context name; unrecognized values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "explore" => Some(Self::Explore),
            "combat" => Some(Self::Combat),
            "social" => Some(Self::Social),
            "rest" => Some(Self::Rest),
            _ => None,
        }
    }
}

/// Item rarity, ordered from least to most rare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    /// Everyday loot.
    #[default]
    Common,
    /// Slightly better than common.
    Uncommon,
    /// Rare.
    Rare,
    /// Epic.
    Epic,
    /// Legendary.
    Legendary,
    /// Beyond legendary.
    Mythic,
}

impl Rarity {
    /// Parse a rarity name case-insensitively; unknown names are common.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "uncommon" => Self::Uncommon,
            "rare" => Self::Rare,
            "epic" => Self::Epic,
            "legendary" => Self::Legendary,
            "mythic" => Self::Mythic,
            _ => Self::Common,
        }
    }
}

/// A reward waiting to be shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Unique id; the presentation acknowledges by id.
    pub id: RewardId,
    /// Item or banner text.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Experience attached to the reward (informational).
    pub xp: u32,
}

impl Reward {
    /// Create a reward with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, rarity: Rarity, xp: u32) -> Self {
        Self {
            id: RewardId::new(),
            name: name.into(),
            rarity,
            xp,
        }
    }
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// The enemy the player is currently fighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatState {
    /// Display name of the enemy.
    pub enemy_name: String,
    /// Current enemy HP; combat is over once this reaches zero.
    pub enemy_hp: i32,
    /// Enemy HP at the start of combat.
    pub enemy_max_hp: i32,
    /// Whose turn it is.
    pub is_player_turn: bool,
    /// Armor class player attacks are rolled against.
    pub enemy_armor_class: i32,
}

impl CombatState {
    /// Whether the enemy has been defeated.
    #[must_use]
    pub fn is_enemy_defeated(&self) -> bool {
        self.enemy_hp <= 0
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// One of the six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    /// STR.
    Strength,
    /// DEX.
    Dexterity,
    /// CON.
    Constitution,
    /// INT.
    Intelligence,
    /// WIS.
    Wisdom,
    /// CHA.
    Charisma,
}

impl Attribute {
    /// Parse a full or three-letter attribute name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strength" | "str" => Some(Self::Strength),
            "dexterity" | "dex" => Some(Self::Dexterity),
            "constitution" | "con" => Some(Self::Constitution),
            "intelligence" | "int" => Some(Self::Intelligence),
            "wisdom" | "wis" => Some(Self::Wisdom),
            "charisma" | "cha" => Some(Self::Charisma),
            _ => None,
        }
    }
}

/// The six ability scores of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Strength.
    pub strength: i32,
    /// Dexterity.
    pub dexterity: i32,
    /// Constitution.
    pub constitution: i32,
    /// Intelligence.
    pub intelligence: i32,
    /// Wisdom.
    pub wisdom: i32,
    /// Charisma.
    pub charisma: i32,
}

impl Attributes {
    /// All six scores set to the same value.
    #[must_use]
    pub fn uniform(score: i32) -> Self {
        Self {
            strength: score,
            dexterity: score,
            constitution: score,
            intelligence: score,
            wisdom: score,
            charisma: score,
        }
    }

    /// Look up one score.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Constitution => self.constitution,
            Attribute::Intelligence => self.intelligence,
            Attribute::Wisdom => self.wisdom,
            Attribute::Charisma => self.charisma,
        }
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::uniform(10)
    }
}

/// Static description of the player character, read once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Character name.
    pub name: String,
    /// Character class.
    pub class: String,
    /// Names of carried items.
    #[serde(default)]
    pub inventory: Vec<String>,
    /// Ability scores.
    #[serde(default)]
    pub attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Session State
// ---------------------------------------------------------------------------

/// Mutable per-player state owned by exactly one processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSessionState {
    /// Current HP, always within `0..=max_hp`.
    pub hp: i32,
    /// Maximum HP.
    pub max_hp: i32,
    /// Current energy, always within `0..=max_energy`.
    pub energy: i32,
    /// Maximum energy.
    pub max_energy: i32,
    /// Experience towards the next level.
    pub xp: u32,
    /// Experience needed for the next level.
    pub xp_to_level: u32,
    /// Character level, starting at 1.
    pub level: u32,
    /// Gold carried.
    pub gold: i32,
    /// Where the player currently is.
    pub current_location_id: Option<LocationId>,
    /// Total outstanding bounty.
    pub bounty: i32,
    /// Whether the player is in jail.
    pub is_jailed: bool,
    /// Active combat, if any.
    pub combat: Option<CombatState>,
    /// Remaining cooldown turns per ability; zero entries are removed.
    #[serde(default)]
    pub cooldowns: BTreeMap<AbilityId, u32>,
    /// Current game context.
    #[serde(default)]
    pub context: GameContext,
}

impl PlayerSessionState {
    /// A fresh level-1 character.
    #[must_use]
    pub fn new(defaults: &crate::config::PlayerDefaults, xp_to_level: u32) -> Self {
        Self {
            hp: defaults.max_hp,
            max_hp: defaults.max_hp,
            energy: defaults.max_energy,
            max_energy: defaults.max_energy,
            xp: 0,
            xp_to_level,
            level: 1,
            gold: defaults.gold,
            current_location_id: None,
            bounty: 0,
            is_jailed: false,
            combat: None,
            cooldowns: BTreeMap::new(),
            context: GameContext::Explore,
        }
    }

    /// Overwrite HP, clamped to `0..=max_hp`.
    pub fn set_hp(&mut self, hp: i64) {
        self.hp = clamp_i64(hp, 0, self.max_hp);
    }

    /// Overwrite energy, clamped to `0..=max_energy`.
    pub fn set_energy(&mut self, energy: i64) {
        self.energy = clamp_i64(energy, 0, self.max_energy);
    }

    /// Overwrite gold, floored at zero.
    pub fn set_gold(&mut self, gold: i64) {
        self.gold = clamp_i64(gold, 0, i32::MAX);
    }
}

fn clamp_i64(value: i64, min: i32, max: i32) -> i32 {
    // Bounds come from i32, so the clamped value always fits.
    i32::try_from(value.clamp(i64::from(min), i64::from(max.max(min)))).unwrap_or(min)
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The player.
    User,
    /// The narration service.
    Narrator,
}

/// One entry of the session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
    /// Choices offered alongside a narrator message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Anchor messages survive history condensation.
    #[serde(default)]
    pub anchor: bool,
}

impl ChatMessage {
    /// A player message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            choices: Vec::new(),
            anchor: false,
        }
    }

    /// A narrator message.
    #[must_use]
    pub fn narrator(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Narrator,
            content: content.into(),
            choices: Vec::new(),
            anchor: false,
        }
    }

    /// Mark this message as an anchor.
    #[must_use]
    pub fn anchored(mut self) -> Self {
        self.anchor = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerDefaults;

    #[test]
    fn rarity_is_ordered() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Epic < Rarity::Legendary);
        assert!(Rarity::Legendary < Rarity::Mythic);
        assert_eq!(Rarity::parse_lenient("LEGENDARY"), Rarity::Legendary);
        assert_eq!(Rarity::parse_lenient("shiny"), Rarity::Common);
    }

    #[test]
    fn hp_overwrite_is_clamped() {
        let mut state = PlayerSessionState::new(&PlayerDefaults::default(), 100);
        state.set_hp(250);
        assert_eq!(state.hp, 100);
        state.set_hp(-4);
        assert_eq!(state.hp, 0);
        state.set_energy(i64::MAX);
        assert_eq!(state.energy, state.max_energy);
        state.set_gold(-10);
        assert_eq!(state.gold, 0);
    }

    #[test]
    fn attribute_short_names_parse() {
        assert_eq!(Attribute::parse("DEX"), Some(Attribute::Dexterity));
        assert_eq!(Attribute::parse("wisdom"), Some(Attribute::Wisdom));
        assert_eq!(Attribute::parse("luck"), None);
    }

    #[test]
    fn context_parse_rejects_unknown() {
        assert_eq!(GameContext::parse("combat"), Some(GameContext::Combat));
        assert_eq!(GameContext::parse("dancing"), None);
    }
}
