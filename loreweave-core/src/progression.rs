//! Experience and leveling.
//!
//! A single xp grant may carry the player over several thresholds; the
//! level-up loop runs until the remaining xp is below the current threshold.

use serde::{Deserialize, Serialize};

use crate::config::ProgressionConfig;

/// Where the player stands after an xp grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Level after the grant.
    pub level: u32,
    /// Xp carried towards the next level.
    pub xp: u32,
    /// Threshold for the next level.
    pub xp_to_level: u32,
    /// Each level reached during this grant, in order.
    pub levels_gained: Vec<u32>,
}

/// Next threshold: `floor(threshold * growth)`, never below 1.
#[must_use]
pub fn next_threshold(threshold: u32, growth: f64) -> u32 {
    let next = (f64::from(threshold) * growth).floor();
    if next < 1.0 {
        1
    } else if next >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        next as u32
    }
}

/// Apply `amount` xp.
#[must_use]
pub fn grant_xp(
    level: u32,
    xp: u32,
    xp_to_level: u32,
    amount: u32,
    config: &ProgressionConfig,
) -> LevelProgress {
    let mut level = level;
    let mut xp = xp.saturating_add(amount);
    let mut threshold = xp_to_level.max(1);
    let mut levels_gained = Vec::new();

    while xp >= threshold {
        xp -= threshold;
        level += 1;
        threshold = next_threshold(threshold, config.level_growth);
        levels_gained.push(level);
    }

    LevelProgress {
        level,
        xp,
        xp_to_level: threshold,
        levels_gained,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_hundred_fifty_xp_from_level_one() {
        let progress = grant_xp(1, 0, 100, 250, &ProgressionConfig::default());
        assert_eq!(progress.level, 3);
        assert_eq!(progress.xp, 0);
        assert_eq!(progress.xp_to_level, 225);
        assert_eq!(progress.levels_gained, vec![2, 3]);
    }

    #[test]
    fn below_threshold_only_accumulates() {
        let progress = grant_xp(1, 40, 100, 59, &ProgressionConfig::default());
        assert_eq!(progress.level, 1);
        assert_eq!(progress.xp, 99);
        assert!(progress.levels_gained.is_empty());
    }

    #[test]
    fn threshold_growth_floors() {
        assert_eq!(next_threshold(100, 1.5), 150);
        assert_eq!(next_threshold(150, 1.5), 225);
        assert_eq!(next_threshold(225, 1.5), 337);
        assert_eq!(next_threshold(1, 0.1), 1);
    }
}
