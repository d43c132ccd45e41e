//! Bounty pricing.
//!
//! Crimes are priced per region; the store keeps the running total and the
//! processor mirrors the total it reports back.

use serde::{Deserialize, Serialize};

/// Bounty added for a crime. Unknown crimes cost the same as theft.
#[must_use]
pub fn crime_bounty(crime_type: &str) -> i32 {
    match crime_type.trim().to_ascii_lowercase().as_str() {
        "trespassing" => 25,
        "assault" => 100,
        "murder" => 500,
        "regicide" => 2000,
        "treason" => 1500,
        _ => 50,
    }
}

/// In-game hours of jail for a bounty total.
#[must_use]
pub fn jail_hours(bounty: i32) -> u32 {
    match bounty {
        b if b < 50 => 1,
        b if b < 200 => 4,
        b if b < 500 => 12,
        b if b < 1000 => 24,
        _ => 48,
    }
}

/// How aggressively guards pursue the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    /// Not wanted.
    None,
    /// Petty crimes.
    Low,
    /// Serious crimes.
    Medium,
    /// Kill on sight.
    High,
}

/// Danger level for a bounty total.
#[must_use]
pub fn danger_level(total: i32) -> DangerLevel {
    if total >= 1000 {
        DangerLevel::High
    } else if total >= 500 {
        DangerLevel::Medium
    } else if total > 0 {
        DangerLevel::Low
    } else {
        DangerLevel::None
    }
}
