//! Resolution Engine: pure dice math.
//!
//! Nothing in this module holds state. Randomness is always supplied by the
//! caller as a [`rand::Rng`], so tests and replays can pass a seeded generator.
//!
//! Dice notation is `{count}d{sides}[+|-mod]`, e.g. `3d6+2`. Notation that does
//! not match yields a zero total with no rolls rather than an error.

pub mod chargen;
pub mod checks;
pub mod seeded;

use std::sync::LazyLock;

use rand::Rng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

pub use checks::{
    AttackRoll, Degree, RollOptions, SavingThrow, SkillCheck, attack_roll, saving_throw,
    skill_attribute, skill_check,
};
pub use seeded::Mulberry32;

/// Upper bound on dice in one expression; larger counts are treated as invalid.
pub const MAX_DICE: u32 = 1000;

static DICE_NOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)d(\d+)([+-]\d+)?$").expect("dice notation regex is valid")
});

/// A parsed dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceNotation {
    /// Number of dice.
    pub count: u32,
    /// Faces per die.
    pub sides: u32,
    /// Flat modifier added once.
    pub modifier: i32,
}

impl DiceNotation {
    /// Parse `{count}d{sides}[+|-mod]`, surrounding whitespace ignored.
    #[must_use]
    pub fn parse(notation: &str) -> Option<Self> {
        let caps = DICE_NOTATION.captures(notation.trim())?;
        let count: u32 = caps.get(1)?.as_str().parse().ok()?;
        let sides: u32 = caps.get(2)?.as_str().parse().ok()?;
        let modifier: i32 = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if count > MAX_DICE {
            return None;
        }
        Some(Self {
            count,
            sides,
            modifier,
        })
    }
}

/// Outcome of rolling a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Sum of all dice plus the modifier.
    pub total: i32,
    /// Individual die results in roll order.
    pub rolls: Vec<i32>,
    /// Flat modifier.
    pub modifier: i32,
    /// The notation as given.
    pub formula: String,
}

impl DiceRoll {
    fn invalid(formula: &str) -> Self {
        Self {
            total: 0,
            rolls: Vec::new(),
            modifier: 0,
            formula: formula.to_string(),
        }
    }
}

/// Roll one die, uniform in `1..=sides`. A zero-sided die rolls 0.
pub fn roll_die<R: Rng + ?Sized>(rng: &mut R, sides: u32) -> i32 {
    if sides == 0 {
        return 0;
    }
    i32::try_from(rng.gen_range(1..=sides)).unwrap_or(i32::MAX)
}

/// Roll a dice expression. Invalid notation yields a zero total and no rolls.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R, notation: &str) -> DiceRoll {
    let Some(parsed) = DiceNotation::parse(notation) else {
        return DiceRoll::invalid(notation);
    };
    let rolls: Vec<i32> = (0..parsed.count).map(|_| roll_die(rng, parsed.sides)).collect();
    let total = rolls
        .iter()
        .fold(0i32, |acc, r| acc.saturating_add(*r))
        .saturating_add(parsed.modifier);
    DiceRoll {
        total,
        rolls,
        modifier: parsed.modifier,
        formula: notation.to_string(),
    }
}

/// D&D ability modifier: `floor((score - 10) / 2)`.
#[must_use]
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Proficiency bonus: `ceil(level / 4) + 1`; +2 at level 1, +3 at level 5.
#[must_use]
pub fn proficiency_bonus(level: u32) -> i32 {
    i32::try_from(level.div_ceil(4)).unwrap_or(i32::MAX - 1) + 1
}

/// A damage roll, possibly critical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    /// The dice that were rolled, crit dice appended.
    pub roll: DiceRoll,
    /// Whether the dice portion was rolled twice.
    pub critical: bool,
}

/// Roll damage. A critical hit rolls the dice portion a second time and adds
/// it; the flat modifier is applied once.
pub fn damage_roll<R: Rng + ?Sized>(rng: &mut R, notation: &str, critical: bool) -> DamageRoll {
    let mut roll = roll_dice(rng, notation);
    if critical {
        if let Some(parsed) = DiceNotation::parse(notation) {
            for _ in 0..parsed.count {
                let extra = roll_die(rng, parsed.sides);
                roll.rolls.push(extra);
                roll.total = roll.total.saturating_add(extra);
            }
        }
    }
    DamageRoll { roll, critical }
}

/// Difficulty class thresholds.
pub mod dc {
    /// Trivial task.
    pub const TRIVIAL: i32 = 5;
    /// Easy task.
    pub const EASY: i32 = 10;
    /// Medium task; the default when none is given.
    pub const MEDIUM: i32 = 15;
    /// Hard task.
    pub const HARD: i32 = 20;
    /// Very hard task.
    pub const VERY_HARD: i32 = 25;
    /// Nearly impossible task.
    pub const NEARLY_IMPOSSIBLE: i32 = 30;
}
