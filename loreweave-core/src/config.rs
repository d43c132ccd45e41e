//! Configuration for the loreweave engine.
//!
//! Maps directly to the `[engine]` table of `loreweave.toml`. Every field has
//! a default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Experience and leveling curve.
    #[serde(default)]
    pub progression: ProgressionConfig,
    /// Quest reward tuning.
    #[serde(default)]
    pub quests: QuestConfig,
    /// Combat defaults and timing.
    #[serde(default)]
    pub combat: CombatConfig,
    /// Rumor propagation settings.
    #[serde(default)]
    pub rumors: RumorConfig,
    /// Bounty region fallback.
    #[serde(default)]
    pub bounty: BountyConfig,
    /// Starting values for a fresh player session.
    #[serde(default)]
    pub player: PlayerDefaults,
    /// Narration history and scripted lines.
    #[serde(default)]
    pub narration: NarrationConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::CoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Leveling curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Experience needed to go from level 1 to level 2.
    #[serde(default = "default_base_xp_to_level")]
    pub base_xp_to_level: u32,
    /// Multiplier applied to the threshold on every level-up (floored).
    #[serde(default = "default_level_growth")]
    pub level_growth: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_xp_to_level: default_base_xp_to_level(),
            level_growth: default_level_growth(),
        }
    }
}

/// Quest reward tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    /// Experience granted for every quest progress event.
    #[serde(default = "default_progress_xp")]
    pub progress_xp: u32,
    /// Experience granted on completion when the event names none.
    #[serde(default = "default_completion_xp")]
    pub completion_xp: u32,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            progress_xp: default_progress_xp(),
            completion_xp: default_completion_xp(),
        }
    }
}

/// Combat defaults and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Delay between an enemy reaching zero HP and combat being cleared.
    #[serde(default = "default_clear_delay_ms")]
    pub clear_delay_ms: u64,
    /// Armor class used when a combat event names none.
    #[serde(default = "default_enemy_armor_class")]
    pub default_enemy_armor_class: i32,
    /// Enemy HP used when a combat event names none.
    #[serde(default = "default_enemy_hp")]
    pub default_enemy_hp: i32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            clear_delay_ms: default_clear_delay_ms(),
            default_enemy_armor_class: default_enemy_armor_class(),
            default_enemy_hp: default_enemy_hp(),
        }
    }
}

/// Rumor propagation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RumorConfig {
    /// Maximum spread radius for generic rumors (hops).
    #[serde(default = "default_rumor_spread")]
    pub default_max_spread: u32,
    /// Maximum spread radius for death rumors.
    #[serde(default = "default_death_spread")]
    pub death_max_spread: u32,
    /// Maximum spread radius for crime rumors.
    #[serde(default = "default_crime_spread")]
    pub crime_max_spread: u32,
    /// Rumors younger than this are flagged as recent in location context.
    #[serde(default = "default_recent_hours")]
    pub recent_window_hours: i64,
    /// Number of (origin, radius) reachable sets kept in the LRU cache.
    #[serde(default = "default_reachability_cache")]
    pub reachability_cache_size: usize,
}

impl Default for RumorConfig {
    fn default() -> Self {
        Self {
            default_max_spread: default_rumor_spread(),
            death_max_spread: default_death_spread(),
            crime_max_spread: default_crime_spread(),
            recent_window_hours: default_recent_hours(),
            reachability_cache_size: default_reachability_cache(),
        }
    }
}

/// Bounty region fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BountyConfig {
    /// Region charged when the current location belongs to no region.
    /// Falls back to the first region of the campaign when unset.
    #[serde(default)]
    pub default_region: Option<String>,
}

/// Starting values for a fresh player session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDefaults {
    /// Starting and maximum HP.
    #[serde(default = "default_max_hp")]
    pub max_hp: i32,
    /// Starting and maximum energy.
    #[serde(default = "default_max_energy")]
    pub max_energy: i32,
    /// Starting gold.
    #[serde(default)]
    pub gold: i32,
}

impl Default for PlayerDefaults {
    fn default() -> Self {
        Self {
            max_hp: default_max_hp(),
            max_energy: default_max_energy(),
            gold: 0,
        }
    }
}

/// Narration history and scripted lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    /// Most recent messages always sent with a request.
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,
    /// Upper bound on messages sent with a request.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Prompt sent after a successful travel; `{location}` is substituted.
    #[serde(default = "default_arrival_prompt")]
    pub arrival_prompt: String,
    /// Narrator line appended when the narration transport fails.
    #[serde(default = "default_fallback_line")]
    pub fallback_line: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            recent_count: default_recent_count(),
            max_history: default_max_history(),
            arrival_prompt: default_arrival_prompt(),
            fallback_line: default_fallback_line(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_base_xp_to_level() -> u32 {
    100
}
fn default_level_growth() -> f64 {
    1.5
}
fn default_progress_xp() -> u32 {
    10
}
fn default_completion_xp() -> u32 {
    50
}
fn default_clear_delay_ms() -> u64 {
    2000
}
fn default_enemy_armor_class() -> i32 {
    12
}
fn default_enemy_hp() -> i32 {
    30
}
fn default_rumor_spread() -> u32 {
    3
}
fn default_death_spread() -> u32 {
    4
}
fn default_crime_spread() -> u32 {
    2
}
fn default_recent_hours() -> i64 {
    24
}
fn default_reachability_cache() -> usize {
    256
}
fn default_max_hp() -> i32 {
    100
}
fn default_max_energy() -> i32 {
    100
}
fn default_recent_count() -> usize {
    20
}
fn default_max_history() -> usize {
    50
}
fn default_arrival_prompt() -> String {
    "I arrive at {location}. Describe what I find.".to_string()
}
fn default_fallback_line() -> String {
    "The magic fizzles... Something went wrong connecting to the realm.".to_string()
}
