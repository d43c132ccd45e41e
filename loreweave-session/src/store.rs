//! State store port and an in-memory implementation.
//!
//! The session reads the store once at start and writes back one batch per
//! processed event. Transactional operations answer with a verdict the
//! processor branches on.

use std::collections::HashMap;

use async_trait::async_trait;
use loreweave_core::abilities::NpcDamage;
use loreweave_core::bounty;
use loreweave_core::processor::{QuestStatus, QuestUpdate, StatePatch};
use loreweave_core::types::{
    CampaignId, LocationId, NpcId, PlayerId, PlayerSessionState, QuestId, RegionId,
};
use loreweave_core::world::{NpcRecord, Rumor};
use loreweave_core::SessionContext;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;

/// Store answer to a travel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TravelVerdict {
    /// The player moved.
    Allowed,
    /// The move was refused.
    Refused(String),
}

/// Crime as recorded alongside a bounty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrimeReport {
    /// Region charged.
    pub region_id: RegionId,
    /// Crime type.
    pub crime_type: String,
    /// Narrated description.
    pub description: Option<String>,
}

/// Progress recorded against one quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuestProgress {
    /// Objective steps counted so far.
    pub steps: u32,
    /// The narrator reported every objective done. The quest itself stays
    /// active until it is completed.
    pub objectives_met: bool,
}

/// Persistent data the session reads and writes.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// World data for a session.
    async fn load_context(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
    ) -> Result<SessionContext, StoreError>;

    /// Stored session state, if the player has played before.
    async fn load_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
    ) -> Result<Option<PlayerSessionState>, StoreError>;

    /// Replace the stored session state.
    async fn put_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        state: &PlayerSessionState,
    ) -> Result<(), StoreError>;

    /// Write changed fields.
    async fn patch_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        patch: &StatePatch,
    ) -> Result<(), StoreError>;

    /// Rumors of a campaign.
    async fn load_rumors(&self, campaign: &CampaignId) -> Result<Vec<Rumor>, StoreError>;

    /// Replace the rumors of a campaign.
    async fn put_rumors(&self, campaign: &CampaignId, rumors: &[Rumor]) -> Result<(), StoreError>;

    /// Add one rumor.
    async fn create_rumor(&self, campaign: &CampaignId, rumor: &Rumor) -> Result<(), StoreError>;

    /// Mark an NPC dead. `false` when the NPC is essential, already dead or
    /// unknown.
    async fn mark_npc_dead(
        &self,
        campaign: &CampaignId,
        npc: &NpcId,
        cause: &str,
        killed_by: &str,
    ) -> Result<bool, StoreError>;

    /// Apply ability damage to an NPC.
    async fn apply_npc_damage(
        &self,
        campaign: &CampaignId,
        damage: &NpcDamage,
    ) -> Result<(), StoreError>;

    /// Record a crime and return the player's new bounty total.
    async fn add_bounty(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        crime: &CrimeReport,
    ) -> Result<i32, StoreError>;

    /// Advance a quest. `false` when the quest is unknown or not active.
    async fn update_quest_progress(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
        update: QuestUpdate,
    ) -> Result<bool, StoreError>;

    /// Complete a quest. `false` when it is unknown or not active.
    async fn complete_quest(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
    ) -> Result<bool, StoreError>;

    /// Move the player.
    async fn travel(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        from: Option<&LocationId>,
        to: &LocationId,
    ) -> Result<TravelVerdict, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

type SessionKey = (CampaignId, PlayerId);

#[derive(Debug, Default)]
struct Inner {
    contexts: HashMap<SessionKey, SessionContext>,
    states: HashMap<SessionKey, PlayerSessionState>,
    rumors: HashMap<CampaignId, Vec<Rumor>>,
    bounties: HashMap<(CampaignId, PlayerId, RegionId), i32>,
    crimes: Vec<(SessionKey, CrimeReport)>,
    quest_progress: HashMap<(SessionKey, QuestId), QuestProgress>,
}

impl Inner {
    /// NPC records of a campaign, one per player context.
    fn npcs_mut<'a>(
        &'a mut self,
        campaign: &'a CampaignId,
        npc: &'a NpcId,
    ) -> impl Iterator<Item = &'a mut NpcRecord> + 'a {
        self.contexts
            .iter_mut()
            .filter(move |((c, _), _)| c == campaign)
            .flat_map(move |(_, ctx)| ctx.npcs.iter_mut().filter(move |n| &n.id == npc))
    }
}

/// Thread-safe in-memory [`StateStore`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the world data for the context's (campaign, player).
    pub fn insert_context(&self, context: SessionContext) {
        let key = (context.campaign_id.clone(), context.player_id.clone());
        self.inner.lock().contexts.insert(key, context);
    }

    /// Builder form of [`Self::insert_context`].
    #[must_use]
    pub fn with_context(self, context: SessionContext) -> Self {
        self.insert_context(context);
        self
    }

    /// Stored state of a player.
    #[must_use]
    pub fn state(&self, campaign: &CampaignId, player: &PlayerId) -> Option<PlayerSessionState> {
        self.inner
            .lock()
            .states
            .get(&(campaign.clone(), player.clone()))
            .cloned()
    }

    /// Stored rumors of a campaign.
    #[must_use]
    pub fn rumors(&self, campaign: &CampaignId) -> Vec<Rumor> {
        self.inner.lock().rumors.get(campaign).cloned().unwrap_or_default()
    }

    /// Stored NPC record as seen by a player's context.
    #[must_use]
    pub fn npc(&self, campaign: &CampaignId, player: &PlayerId, npc: &NpcId) -> Option<NpcRecord> {
        let inner = self.inner.lock();
        inner
            .contexts
            .get(&(campaign.clone(), player.clone()))?
            .npcs
            .iter()
            .find(|n| &n.id == npc)
            .cloned()
    }

    /// Quest status as seen by a player's context.
    #[must_use]
    pub fn quest_status(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
    ) -> Option<QuestStatus> {
        let inner = self.inner.lock();
        inner
            .contexts
            .get(&(campaign.clone(), player.clone()))?
            .quests
            .iter()
            .find(|q| &q.id == quest)
            .map(|q| q.status)
    }

    /// Progress recorded for a quest.
    #[must_use]
    pub fn quest_progress(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
    ) -> QuestProgress {
        let key = ((campaign.clone(), player.clone()), quest.clone());
        self.inner.lock().quest_progress.get(&key).copied().unwrap_or_default()
    }

    /// Crimes recorded for a player.
    #[must_use]
    pub fn crimes(&self, campaign: &CampaignId, player: &PlayerId) -> Vec<CrimeReport> {
        self.inner
            .lock()
            .crimes
            .iter()
            .filter(|((c, p), _)| c == campaign && p == player)
            .map(|(_, report)| report.clone())
            .collect()
    }
}

fn not_found(campaign: &CampaignId, player: &PlayerId) -> StoreError {
    StoreError::NotFound(format!("session {campaign}/{player}"))
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn load_context(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
    ) -> Result<SessionContext, StoreError> {
        self.inner
            .lock()
            .contexts
            .get(&(campaign.clone(), player.clone()))
            .cloned()
            .ok_or_else(|| not_found(campaign, player))
    }

    async fn load_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
    ) -> Result<Option<PlayerSessionState>, StoreError> {
        Ok(self.state(campaign, player))
    }

    async fn put_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        state: &PlayerSessionState,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .states
            .insert((campaign.clone(), player.clone()), state.clone());
        Ok(())
    }

    async fn patch_state(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        patch: &StatePatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let state = inner
            .states
            .get_mut(&(campaign.clone(), player.clone()))
            .ok_or_else(|| not_found(campaign, player))?;
        patch.apply_to(state);
        Ok(())
    }

    async fn load_rumors(&self, campaign: &CampaignId) -> Result<Vec<Rumor>, StoreError> {
        Ok(self.rumors(campaign))
    }

    async fn put_rumors(&self, campaign: &CampaignId, rumors: &[Rumor]) -> Result<(), StoreError> {
        self.inner.lock().rumors.insert(campaign.clone(), rumors.to_vec());
        Ok(())
    }

    async fn create_rumor(&self, campaign: &CampaignId, rumor: &Rumor) -> Result<(), StoreError> {
        self.inner
            .lock()
            .rumors
            .entry(campaign.clone())
            .or_default()
            .push(rumor.clone());
        Ok(())
    }

    async fn mark_npc_dead(
        &self,
        campaign: &CampaignId,
        npc: &NpcId,
        cause: &str,
        killed_by: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let mut marked = false;
        for record in inner.npcs_mut(campaign, npc) {
            if record.essential || record.dead {
                continue;
            }
            record.dead = true;
            record.health = 0;
            marked = true;
        }
        debug!(npc = %npc, cause, killed_by, marked, "Mark NPC dead");
        Ok(marked)
    }

    async fn apply_npc_damage(
        &self,
        campaign: &CampaignId,
        damage: &NpcDamage,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        for record in inner.npcs_mut(campaign, &damage.npc_id) {
            record.health = damage.new_health;
            if damage.killed && !record.essential {
                record.dead = true;
            }
        }
        Ok(())
    }

    async fn add_bounty(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        crime: &CrimeReport,
    ) -> Result<i32, StoreError> {
        let mut inner = self.inner.lock();
        let amount = bounty::crime_bounty(&crime.crime_type);
        *inner
            .bounties
            .entry((campaign.clone(), player.clone(), crime.region_id.clone()))
            .or_default() += amount;
        inner
            .crimes
            .push(((campaign.clone(), player.clone()), crime.clone()));
        let total: i32 = inner
            .bounties
            .iter()
            .filter(|((c, p, _), _)| c == campaign && p == player)
            .map(|(_, amount)| *amount)
            .sum();
        Ok(total)
    }

    async fn update_quest_progress(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
        update: QuestUpdate,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let key = (campaign.clone(), player.clone());
        let active = inner
            .contexts
            .get(&key)
            .and_then(|ctx| ctx.quests.iter().find(|q| &q.id == quest))
            .is_some_and(|q| q.status == QuestStatus::Active);
        if !active {
            return Ok(false);
        }
        let progress = inner.quest_progress.entry((key, quest.clone())).or_default();
        match update {
            QuestUpdate::Increment(n) => progress.steps = progress.steps.saturating_add(n),
            QuestUpdate::MarkComplete => progress.objectives_met = true,
        }
        Ok(true)
    }

    async fn complete_quest(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        quest: &QuestId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(record) = inner
            .contexts
            .get_mut(&(campaign.clone(), player.clone()))
            .and_then(|ctx| ctx.quests.iter_mut().find(|q| &q.id == quest))
        else {
            return Ok(false);
        };
        if record.status != QuestStatus::Active {
            return Ok(false);
        }
        record.status = QuestStatus::Completed;
        Ok(true)
    }

    async fn travel(
        &self,
        campaign: &CampaignId,
        player: &PlayerId,
        from: Option<&LocationId>,
        to: &LocationId,
    ) -> Result<TravelVerdict, StoreError> {
        let mut inner = self.inner.lock();
        let key = (campaign.clone(), player.clone());
        if inner.states.get(&key).is_some_and(|s| s.is_jailed) {
            return Ok(TravelVerdict::Refused("You cannot travel while jailed".into()));
        }
        let ctx = inner.contexts.get(&key).ok_or_else(|| not_found(campaign, player))?;
        let Some(destination) = ctx.locations.iter().find(|l| &l.id == to) else {
            return Ok(TravelVerdict::Refused(format!("Unknown destination {to}")));
        };
        if let Some(from) = from {
            let adjacent = destination.neighbors.contains(from)
                || ctx
                    .locations
                    .iter()
                    .any(|l| &l.id == from && l.neighbors.contains(to));
            if !adjacent {
                return Ok(TravelVerdict::Refused(format!(
                    "{} is not reachable from here",
                    destination.name
                )));
            }
        }
        if let Some(state) = inner.states.get_mut(&key) {
            state.current_location_id = Some(to.clone());
        }
        Ok(TravelVerdict::Allowed)
    }
}
