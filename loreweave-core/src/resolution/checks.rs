//! d20 checks: skill checks, attack rolls and saving throws.
//!
//! All three share the same core: two d20 are always rolled, advantage takes
//! the higher, disadvantage the lower, and having both (or neither) takes the
//! first. A natural 20 always succeeds and a natural 1 always fails.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ability_modifier, dc, proficiency_bonus, roll_die};
use crate::types::Attribute;

/// Situational modifiers for a d20 roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOptions {
    /// Roll twice, keep the higher.
    pub advantage: bool,
    /// Roll twice, keep the lower.
    pub disadvantage: bool,
    /// Extra flat bonus (items, spells, weapon enchantment).
    pub bonus: i32,
}

impl RollOptions {
    fn has_advantage(self) -> bool {
        self.advantage && !self.disadvantage
    }

    fn has_disadvantage(self) -> bool {
        self.disadvantage && !self.advantage
    }
}

/// How well a check went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    /// Natural 20 or beat the DC by 10 or more.
    CriticalSuccess,
    /// Met the DC.
    Success,
    /// Missed the DC.
    Failure,
    /// Natural 1 or missed the DC by 10 or more.
    CriticalFailure,
}

struct D20 {
    natural: i32,
    rolls: Vec<i32>,
}

fn roll_d20<R: Rng + ?Sized>(rng: &mut R, options: RollOptions) -> D20 {
    let first = roll_die(rng, 20);
    let second = roll_die(rng, 20);
    let natural = if options.has_advantage() {
        first.max(second)
    } else if options.has_disadvantage() {
        first.min(second)
    } else {
        first
    };
    let rolls = if options.advantage || options.disadvantage {
        vec![first, second]
    } else {
        vec![natural]
    };
    D20 { natural, rolls }
}

/// Result of a skill check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCheck {
    /// Whether the check passed.
    pub success: bool,
    /// The natural d20 that counted.
    pub roll: i32,
    /// `roll + modifier`.
    pub total: i32,
    /// Sum of ability modifier, proficiency bonus and extra bonus.
    pub modifier: i32,
    /// Difficulty class.
    pub dc: i32,
    /// Ability modifier component.
    pub ability_modifier: i32,
    /// Proficiency bonus component.
    pub proficiency_bonus: i32,
    /// `total - dc`.
    pub margin: i32,
    /// Degree of success.
    pub degree: Degree,
    /// Dice shown to the player (both when advantage or disadvantage applied).
    pub rolls: Vec<i32>,
    /// Whether advantage applied.
    pub had_advantage: bool,
    /// Whether disadvantage applied.
    pub had_disadvantage: bool,
}

impl SkillCheck {
    /// Natural 20.
    #[must_use]
    pub fn is_critical_success(&self) -> bool {
        self.roll == 20
    }

    /// Natural 1.
    #[must_use]
    pub fn is_critical_failure(&self) -> bool {
        self.roll == 1
    }
}

/// Perform a skill check against `dc`.
pub fn skill_check<R: Rng + ?Sized>(
    rng: &mut R,
    score: i32,
    level: u32,
    dc: i32,
    options: RollOptions,
) -> SkillCheck {
    let d20 = roll_d20(rng, options);
    let ability_mod = ability_modifier(score);
    let proficiency = proficiency_bonus(level);
    let modifier = ability_mod + proficiency + options.bonus;
    let total = d20.natural + modifier;

    let nat20 = d20.natural == 20;
    let nat1 = d20.natural == 1;
    let success = nat20 || (!nat1 && total >= dc);
    let margin = total - dc;
    let degree = if nat20 || (success && margin >= 10) {
        Degree::CriticalSuccess
    } else if success {
        Degree::Success
    } else if nat1 || margin <= -10 {
        Degree::CriticalFailure
    } else {
        Degree::Failure
    };

    SkillCheck {
        success,
        roll: d20.natural,
        total,
        modifier,
        dc,
        ability_modifier: ability_mod,
        proficiency_bonus: proficiency,
        margin,
        degree,
        rolls: d20.rolls,
        had_advantage: options.has_advantage(),
        had_disadvantage: options.has_disadvantage(),
    }
}

/// Result of an attack roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    /// Whether the attack connects.
    pub hits: bool,
    /// The natural d20 that counted.
    pub roll: i32,
    /// `roll + modifier`.
    pub total: i32,
    /// Ability modifier + proficiency + weapon bonus.
    pub modifier: i32,
    /// Target armor class.
    pub target_ac: i32,
    /// Natural 20.
    pub is_critical_hit: bool,
    /// Natural 1.
    pub is_critical_miss: bool,
    /// Dice shown to the player.
    pub rolls: Vec<i32>,
}

/// Roll to hit a target with armor class `armor_class`.
/// `options.bonus` carries the weapon bonus.
pub fn attack_roll<R: Rng + ?Sized>(
    rng: &mut R,
    score: i32,
    level: u32,
    armor_class: i32,
    options: RollOptions,
) -> AttackRoll {
    let d20 = roll_d20(rng, options);
    let modifier = ability_modifier(score) + proficiency_bonus(level) + options.bonus;
    let total = d20.natural + modifier;
    let is_critical_hit = d20.natural == 20;
    let is_critical_miss = d20.natural == 1;
    AttackRoll {
        hits: is_critical_hit || (!is_critical_miss && total >= armor_class),
        roll: d20.natural,
        total,
        modifier,
        target_ac: armor_class,
        is_critical_hit,
        is_critical_miss,
        rolls: d20.rolls,
    }
}

/// Result of a saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrow {
    /// Whether the save passed.
    pub success: bool,
    /// The natural d20 that counted.
    pub roll: i32,
    /// `roll + modifier`.
    pub total: i32,
    /// Ability modifier plus proficiency (level 5+) plus bonus.
    pub modifier: i32,
    /// Difficulty class.
    pub dc: i32,
}

/// Saving throw. Characters only add proficiency from level 5 on.
pub fn saving_throw<R: Rng + ?Sized>(
    rng: &mut R,
    score: i32,
    level: u32,
    dc: i32,
    options: RollOptions,
) -> SavingThrow {
    let d20 = roll_d20(rng, options);
    let proficiency = if level >= 5 { proficiency_bonus(level) } else { 0 };
    let modifier = ability_modifier(score) + proficiency + options.bonus;
    let total = d20.natural + modifier;
    SavingThrow {
        success: d20.natural == 20 || (d20.natural != 1 && total >= dc),
        roll: d20.natural,
        total,
        modifier,
        dc,
    }
}

/// Ability score a skill is rolled with. Unknown skills use dexterity.
#[must_use]
pub fn skill_attribute(skill: &str) -> Attribute {
    match skill.trim().to_ascii_lowercase().as_str() {
        "athletics" => Attribute::Strength,
        "arcana" | "history" | "investigation" | "nature" | "religion" => Attribute::Intelligence,
        "animal handling" | "insight" | "medicine" | "perception" | "survival" => Attribute::Wisdom,
        "deception" | "intimidation" | "performance" | "persuasion" => Attribute::Charisma,
        _ => Attribute::Dexterity,
    }
}

/// Difficulty used when a check names none.
#[must_use]
pub fn default_dc() -> i32 {
    dc::MEDIUM
}
