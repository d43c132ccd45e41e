//! Abilities: energy cost, cooldowns, damage and healing.
//!
//! Refusals are returned as [`AbilityFailure`] values so the presentation can
//! tell the player exactly what is missing.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::resolution::{DiceRoll, Mulberry32, roll_dice};
use crate::types::{AbilityId, NpcId, PlayerSessionState};
use crate::world::NpcRecord;

/// An ability as defined by the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityRecord {
    /// Ability id.
    pub id: AbilityId,
    /// Display name.
    pub name: String,
    /// Energy spent per use.
    #[serde(default)]
    pub energy_cost: i32,
    /// Turns before the ability can be used again.
    #[serde(default)]
    pub cooldown: u32,
    /// Flat damage.
    #[serde(default)]
    pub damage: Option<i32>,
    /// Damage dice, added to the flat damage.
    #[serde(default)]
    pub damage_dice: Option<String>,
    /// HP restored to the caster.
    #[serde(default)]
    pub healing: Option<i32>,
}

/// Why an ability could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbilityFailure {
    /// The id does not name a known ability.
    Unknown {
        /// Requested id.
        ability_id: AbilityId,
    },
    /// Not enough energy.
    InsufficientEnergy {
        /// Energy the ability costs.
        required: i32,
        /// Energy the player has.
        available: i32,
        /// `required - available`.
        shortfall: i32,
    },
    /// Still cooling down.
    OnCooldown {
        /// Turns left.
        turns_remaining: u32,
    },
}

impl std::fmt::Display for AbilityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown { ability_id } => write!(f, "Unknown ability {ability_id}"),
            Self::InsufficientEnergy { required, available, .. } => {
                write!(f, "Not enough energy ({available}/{required})")
            }
            Self::OnCooldown { turns_remaining } => {
                write!(f, "Ability on cooldown ({turns_remaining} turns)")
            }
        }
    }
}

/// What a successful use did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityEffect {
    /// Ability used.
    pub ability_id: AbilityId,
    /// Display name.
    pub name: String,
    /// Energy spent.
    pub energy_cost: i32,
    /// Total damage dealt (flat + dice).
    pub damage: i32,
    /// HP actually restored after clamping.
    pub healing: i32,
    /// The dice rolled for damage, if any.
    pub damage_roll: Option<DiceRoll>,
}

/// Use `ability`, spending energy and starting its cooldown.
///
/// Dice damage against an NPC is rolled with [`Mulberry32`] seeded by `seed`;
/// otherwise `rng` is used.
///
/// # Errors
/// Returns an [`AbilityFailure`] when energy is short or the ability is on
/// cooldown; the state is left untouched in that case.
pub fn use_ability<R: Rng + ?Sized>(
    state: &mut PlayerSessionState,
    ability: &AbilityRecord,
    against_npc: bool,
    seed: u32,
    rng: &mut R,
) -> Result<AbilityEffect, AbilityFailure> {
    if state.energy < ability.energy_cost {
        return Err(AbilityFailure::InsufficientEnergy {
            required: ability.energy_cost,
            available: state.energy,
            shortfall: ability.energy_cost - state.energy,
        });
    }
    if let Some(&turns) = state.cooldowns.get(&ability.id) {
        if turns > 0 {
            return Err(AbilityFailure::OnCooldown { turns_remaining: turns });
        }
    }

    let mut damage = ability.damage.unwrap_or(0);
    let damage_roll = ability.damage_dice.as_deref().map(|dice| {
        if against_npc {
            Mulberry32::new(seed).roll_dice(dice)
        } else {
            roll_dice(rng, dice)
        }
    });
    if let Some(roll) = &damage_roll {
        damage = damage.saturating_add(roll.total);
    }

    let before = state.hp;
    if let Some(heal) = ability.healing.filter(|h| *h > 0) {
        state.set_hp(i64::from(state.hp) + i64::from(heal));
    }
    state.set_energy(i64::from(state.energy) - i64::from(ability.energy_cost));
    if ability.cooldown > 0 {
        state.cooldowns.insert(ability.id.clone(), ability.cooldown);
    }

    Ok(AbilityEffect {
        ability_id: ability.id.clone(),
        name: ability.name.clone(),
        energy_cost: ability.energy_cost,
        damage,
        healing: state.hp - before,
        damage_roll,
    })
}

/// Result of damaging an NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcDamage {
    /// Target.
    pub npc_id: NpcId,
    /// Damage applied.
    pub damage: i32,
    /// Health afterwards, floored at zero.
    pub new_health: i32,
    /// Whether the NPC died.
    pub killed: bool,
}

/// Apply `damage` to `npc`'s health without mutating the record.
#[must_use]
pub fn npc_damage(npc: &NpcRecord, damage: i32) -> NpcDamage {
    let new_health = npc.health.saturating_sub(damage).max(0);
    NpcDamage {
        npc_id: npc.id.clone(),
        damage,
        new_health,
        killed: new_health <= 0,
    }
}

/// Decrement every cooldown by one turn, dropping those that reach zero.
pub fn tick_cooldowns(state: &mut PlayerSessionState) {
    state.cooldowns.retain(|_, turns| {
        *turns = turns.saturating_sub(1);
        *turns > 0
    });
}

/// Restore energy; a full refill when `amount` is `None`.
pub fn regenerate_energy(state: &mut PlayerSessionState, amount: Option<i32>) {
    let amount = amount.unwrap_or(state.max_energy);
    state.set_energy(i64::from(state.energy) + i64::from(amount));
}
