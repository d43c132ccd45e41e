//! Side-effect commands emitted by the processor, and the outcomes fed back.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityEffect, NpcDamage};
use crate::bounty::DangerLevel;
use crate::event::SkillCheckEvent;
use crate::narration::NarrationRequest;
use crate::resolution::{AttackRoll, DamageRoll};
use crate::types::{
    AbilityId, ChatMessage, CombatState, GameContext, LocationId, NpcId, PlayerSessionState,
    QuestId, RegionId, Reward,
};
use crate::world::Rumor;

/// Full-screen visual effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenEffect {
    /// Natural 20.
    Critical,
    /// Something died or got hurt.
    Damage,
    /// Level up.
    LevelUp,
    /// Quest complete.
    Celebration,
}

/// Updates for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A complete message was added to the transcript.
    MessageAppended(ChatMessage),
    /// The pending choice list changed.
    ChoicesChanged(Vec<String>),
    /// The game context changed.
    ContextChanged(GameContext),
    /// Combat started, updated or ended.
    CombatChanged(Option<CombatState>),
    /// A narrated skill check to display.
    SkillCheck(SkillCheckEvent),
    /// A reward was queued.
    RewardQueued(Reward),
    /// The player reached `level`.
    LevelUp {
        /// New level.
        level: u32,
    },
    /// Play a screen effect.
    Effect(ScreenEffect),
    /// The bounty total changed.
    BountyChanged {
        /// New total.
        total: i32,
        /// Guard response at this total.
        danger: DangerLevel,
        /// Jail sentence in game hours if caught now.
        jail_hours: u32,
    },
    /// The player moved.
    LocationChanged(LocationId),
    /// An ability was used.
    AbilityUsed(AbilityEffect),
    /// A player attack was resolved.
    AttackResolved {
        /// To-hit roll.
        attack: AttackRoll,
        /// Damage, when the attack hit.
        damage: Option<DamageRoll>,
    },
}

/// How a quest advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestUpdate {
    /// Add steps to the objective counter.
    Increment(u32),
    /// Mark the current objective complete.
    MarkComplete,
}

/// Changed fields of the session state, written back as one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    /// HP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    /// Energy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<i32>,
    /// Gold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold: Option<i32>,
    /// Xp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    /// Xp threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_to_level: Option<u32>,
    /// Level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location_id: Option<LocationId>,
    /// Bounty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounty: Option<i32>,
    /// Jailed flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_jailed: Option<bool>,
    /// Combat; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combat: Option<Option<CombatState>>,
    /// Cooldown map, replaced wholesale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldowns: Option<BTreeMap<AbilityId, u32>>,
    /// Context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<GameContext>,
}

impl StatePatch {
    /// Fields that differ between `before` and `after`; `None` if nothing did.
    #[must_use]
    pub fn diff(before: &PlayerSessionState, after: &PlayerSessionState) -> Option<Self> {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }
        let patch = Self {
            hp: changed(&before.hp, &after.hp),
            energy: changed(&before.energy, &after.energy),
            gold: changed(&before.gold, &after.gold),
            xp: changed(&before.xp, &after.xp),
            xp_to_level: changed(&before.xp_to_level, &after.xp_to_level),
            level: changed(&before.level, &after.level),
            current_location_id: (before.current_location_id != after.current_location_id)
                .then(|| after.current_location_id.clone())
                .flatten(),
            bounty: changed(&before.bounty, &after.bounty),
            is_jailed: changed(&before.is_jailed, &after.is_jailed),
            combat: changed(&before.combat, &after.combat),
            cooldowns: changed(&before.cooldowns, &after.cooldowns),
            context: changed(&before.context, &after.context),
        };
        (patch != Self::default()).then_some(patch)
    }

    /// Write the patch onto a stored state.
    pub fn apply_to(&self, state: &mut PlayerSessionState) {
        if let Some(hp) = self.hp {
            state.hp = hp;
        }
        if let Some(energy) = self.energy {
            state.energy = energy;
        }
        if let Some(gold) = self.gold {
            state.gold = gold;
        }
        if let Some(xp) = self.xp {
            state.xp = xp;
        }
        if let Some(t) = self.xp_to_level {
            state.xp_to_level = t;
        }
        if let Some(level) = self.level {
            state.level = level;
        }
        if let Some(location) = &self.current_location_id {
            state.current_location_id = Some(location.clone());
        }
        if let Some(bounty) = self.bounty {
            state.bounty = bounty;
        }
        if let Some(jailed) = self.is_jailed {
            state.is_jailed = jailed;
        }
        if let Some(combat) = &self.combat {
            state.combat.clone_from(combat);
        }
        if let Some(cooldowns) = &self.cooldowns {
            state.cooldowns.clone_from(cooldowns);
        }
        if let Some(context) = self.context {
            state.context = context;
        }
    }
}

/// A side effect for the session driver to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write changed state fields to the store.
    Persist(StatePatch),
    /// Mark an NPC dead in the store.
    MarkNpcDead {
        /// NPC.
        npc_id: NpcId,
        /// Cause of death.
        cause: String,
        /// Killer.
        killed_by: String,
    },
    /// Apply ability damage to an NPC in the store.
    ApplyNpcDamage(NpcDamage),
    /// Store a new rumor.
    CreateRumor(Rumor),
    /// Add a bounty; answered with [`CommandOutcome::BountyAdded`].
    AddBounty {
        /// Region charged.
        region_id: RegionId,
        /// Crime type; priced by the store.
        crime_type: String,
        /// Narrated description.
        description: Option<String>,
    },
    /// Advance a quest.
    UpdateQuestProgress {
        /// Quest.
        quest_id: QuestId,
        /// How.
        update: QuestUpdate,
    },
    /// Complete a quest; answered with a quest outcome.
    CompleteQuest {
        /// Quest.
        quest_id: QuestId,
        /// Quest title, for the reward banner.
        title: String,
        /// Xp to grant on success.
        xp: u32,
        /// Gold to grant on success.
        gold: i32,
        /// Items to grant on success.
        items: Vec<String>,
    },
    /// Move the player; answered with a travel outcome.
    Travel {
        /// Current location.
        from: Option<LocationId>,
        /// Destination.
        to: LocationId,
    },
    /// Open a narration request.
    Narrate(Box<NarrationRequest>),
    /// Call [`super::NarrativeProcessor::clear_combat`] after `delay`.
    ScheduleCombatClear {
        /// Wait before clearing.
        delay: Duration,
    },
    /// Presentation update.
    Ui(UiEvent),
}

/// Store answers to commands that branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Bounty recorded; `total` is the new regional total.
    BountyAdded {
        /// New total.
        total: i32,
    },
    /// The store accepted the quest completion.
    QuestCompleted {
        /// Quest.
        quest_id: QuestId,
        /// Quest title.
        title: String,
        /// Xp granted.
        xp: u32,
        /// Gold granted.
        gold: i32,
        /// Items granted.
        items: Vec<String>,
    },
    /// The store refused the quest completion.
    QuestRejected {
        /// Quest.
        quest_id: QuestId,
    },
    /// Travel succeeded.
    Travelled {
        /// Destination.
        to: LocationId,
    },
    /// Travel was refused.
    TravelRejected {
        /// Destination.
        to: LocationId,
        /// Why.
        reason: String,
    },
}
