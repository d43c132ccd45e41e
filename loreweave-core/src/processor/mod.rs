//! Narrative Event Processor: the authoritative reducer for one player.
//!
//! The processor owns the [`PlayerSessionState`] of a single (campaign, player)
//! pair. It consumes structured game events and user actions, mutates the
//! state, and returns [`Command`]s describing everything that must happen
//! outside: persistence, store mutations, narration requests, UI updates.
//!
//! Store-dependent branches are modelled as round trips: a command such as
//! [`Command::AddBounty`] is executed by the driver, and its result comes back
//! through [`NarrativeProcessor::apply_outcome`].
//!
//! Scalar changes are batched. The state as last persisted is snapshotted when
//! the first change of a batch happens, and the changed fields go out as one
//! [`StatePatch`]. A structured event and the outcomes of its round trips share
//! one batch, closed by [`NarrativeProcessor::finish_event`] once the driver
//! has drained them. Every other operation closes its own batch and returns
//! the patch as a [`Command::Persist`].

pub mod command;

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use command::{Command, CommandOutcome, QuestUpdate, ScreenEffect, StatePatch, UiEvent};

use crate::abilities::{self, AbilityFailure, AbilityRecord};
use crate::bounty;
use crate::config::EngineConfig;
use crate::event::{
    CombatEndedEvent, CombatEvent, CrimeEvent, GameData, GameEvent, NpcDeathEvent,
    QuestCompleteEvent, QuestProgressEvent, RecruitmentEvent, RewardEvent,
};
use crate::narration::{self, NarrationRequest, PlayerSnapshot};
use crate::progression;
use crate::resolution::{self, RollOptions};
use crate::types::{
    CampaignId, ChatMessage, ChatRole, CombatState, GameContext, LocationId, NpcId,
    PlayerId, PlayerProfile, PlayerSessionState, QuestId, Rarity, RegionId, Reward, RewardId,
};
use crate::world::{Knowledge, LocationContext, LocationGraph, LocationNode, NpcRecord, Rumor};

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Lifecycle of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    /// In progress.
    #[default]
    Active,
    /// Done.
    Completed,
    /// Failed or abandoned.
    Failed,
}

/// A quest as read from the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRecord {
    /// Quest id.
    pub id: QuestId,
    /// Title, matched case-insensitively.
    pub title: String,
    /// Status.
    #[serde(default)]
    pub status: QuestStatus,
}

/// A bounty region: a named set of locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRecord {
    /// Region id.
    pub id: RegionId,
    /// Display name.
    pub name: String,
    /// Member locations.
    #[serde(default)]
    pub location_ids: Vec<LocationId>,
}

/// World data read once when a session starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Campaign.
    pub campaign_id: CampaignId,
    /// Player.
    pub player_id: PlayerId,
    /// Player character.
    #[serde(default)]
    pub profile: PlayerProfile,
    /// Location graph nodes.
    #[serde(default)]
    pub locations: Vec<LocationNode>,
    /// NPCs.
    #[serde(default)]
    pub npcs: Vec<NpcRecord>,
    /// Quests.
    #[serde(default)]
    pub quests: Vec<QuestRecord>,
    /// Bounty regions.
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
    /// Abilities the player knows.
    #[serde(default)]
    pub abilities: Vec<AbilityRecord>,
    /// Whether crimes accrue bounty in this campaign.
    #[serde(default)]
    pub bounty_enabled: bool,
}

impl SessionContext {
    /// Parse a campaign snapshot exported as JSON.
    ///
    /// # Errors
    /// Returns `CoreError::Serialization` if the JSON does not fit.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// The reducer for one (campaign, player) session.
#[derive(Debug)]
pub struct NarrativeProcessor {
    config: EngineConfig,
    campaign_id: CampaignId,
    player_id: PlayerId,
    profile: PlayerProfile,
    graph: LocationGraph,
    npcs: Vec<NpcRecord>,
    quests: Vec<QuestRecord>,
    regions: Vec<RegionRecord>,
    abilities: Vec<AbilityRecord>,
    bounty_enabled: bool,

    state: PlayerSessionState,
    messages: Vec<ChatMessage>,
    pending_choices: Vec<String>,
    rewards: VecDeque<Reward>,
    kills: Vec<String>,
    narration_open: bool,
    clear_scheduled: bool,
    /// State as last persisted, while a batch is open.
    persisted: Option<PlayerSessionState>,
}

impl NarrativeProcessor {
    /// Start a session. `state` is the stored session state, or `None` for a
    /// fresh character.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        context: SessionContext,
        state: Option<PlayerSessionState>,
    ) -> Self {
        let state = state.unwrap_or_else(|| {
            PlayerSessionState::new(&config.player, config.progression.base_xp_to_level)
        });
        let graph = LocationGraph::new(context.locations, config.rumors.reachability_cache_size);
        Self {
            campaign_id: context.campaign_id,
            player_id: context.player_id,
            profile: context.profile,
            graph,
            npcs: context.npcs,
            quests: context.quests,
            regions: context.regions,
            abilities: context.abilities,
            bounty_enabled: context.bounty_enabled,
            config,
            state,
            messages: Vec::new(),
            pending_choices: Vec::new(),
            rewards: VecDeque::new(),
            kills: Vec::new(),
            narration_open: false,
            clear_scheduled: false,
            persisted: None,
        }
    }

    /// Restore a transcript loaded from the store.
    pub fn restore_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.narration_open = false;
    }

    // -- Accessors ----------------------------------------------------------

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> &PlayerSessionState {
        &self.state
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Campaign this session belongs to.
    #[must_use]
    pub fn campaign_id(&self) -> &CampaignId {
        &self.campaign_id
    }

    /// Player this session belongs to.
    #[must_use]
    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// Transcript.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Choices currently offered.
    #[must_use]
    pub fn pending_choices(&self) -> &[String] {
        &self.pending_choices
    }

    /// Reward at the front of the queue, shown until acknowledged.
    #[must_use]
    pub fn next_reward(&self) -> Option<&Reward> {
        self.rewards.front()
    }

    /// Number of queued rewards.
    #[must_use]
    pub fn queued_rewards(&self) -> usize {
        self.rewards.len()
    }

    /// Names of NPCs killed this session.
    #[must_use]
    pub fn kills(&self) -> &[String] {
        &self.kills
    }

    /// Location graph.
    #[must_use]
    pub fn graph(&self) -> &LocationGraph {
        &self.graph
    }

    /// NPCs as currently known to the session.
    #[must_use]
    pub fn npcs(&self) -> &[NpcRecord] {
        &self.npcs
    }

    /// Quests as currently known to the session.
    #[must_use]
    pub fn quests(&self) -> &[QuestRecord] {
        &self.quests
    }

    /// Remove a displayed reward. Unknown ids are ignored.
    pub fn acknowledge_reward(&mut self, id: RewardId) -> Option<Reward> {
        let index = self.rewards.iter().position(|r| r.id == id)?;
        self.rewards.remove(index)
    }

    // -- World knowledge ----------------------------------------------------

    /// What `asker` knows about `subject`, given the campaign's rumors.
    #[must_use]
    pub fn knowledge_about(&self, asker: &NpcId, subject: &NpcId, rumors: &[Rumor]) -> Option<Knowledge> {
        let asker = self.npcs.iter().find(|n| &n.id == asker)?;
        let subject = self.npcs.iter().find(|n| &n.id == subject)?;
        Some(crate::world::npc_knowledge(&self.graph, asker, subject, rumors))
    }

    /// Knowledge context for a location.
    #[must_use]
    pub fn location_context(&self, location: &LocationId, rumors: &[Rumor]) -> LocationContext {
        crate::world::location_context(
            &self.graph,
            location,
            &self.npcs,
            rumors,
            Utc::now(),
            chrono::Duration::hours(self.config.rumors.recent_window_hours),
        )
    }

    // -- User actions -------------------------------------------------------

    /// Free-text or quick action from the player.
    pub fn submit_action(&mut self, text: &str) -> Vec<Command> {
        self.open_request(text, None)
    }

    /// Speak to a specific NPC.
    pub fn talk_to(&mut self, npc_id: &NpcId, text: &str) -> Vec<Command> {
        self.open_request(text, Some(npc_id.clone()))
    }

    fn open_request(&mut self, text: &str, target: Option<NpcId>) -> Vec<Command> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let mut commands = Vec::new();
        let mut request = self.build_request(text);
        if let Some(npc) = target {
            request.is_npc_dialogue = Some(true);
            request.target_npc_id = Some(npc);
        }

        let message = ChatMessage::user(text);
        self.messages.push(message.clone());
        commands.push(Command::Ui(UiEvent::MessageAppended(message)));
        if !self.pending_choices.is_empty() {
            self.pending_choices.clear();
            commands.push(Command::Ui(UiEvent::ChoicesChanged(Vec::new())));
        }
        self.narration_open = false;
        commands.push(Command::Narrate(Box::new(request)));
        commands
    }

    /// Ask the store to move the player. The location only changes once the
    /// store answers with [`CommandOutcome::Travelled`].
    pub fn request_travel(&mut self, to: &LocationId) -> Vec<Command> {
        if self.state.current_location_id.as_ref() == Some(to) {
            debug!(location = %to, "Travel to current location ignored");
            return Vec::new();
        }
        vec![Command::Travel {
            from: self.state.current_location_id.clone(),
            to: to.clone(),
        }]
    }

    fn build_request(&self, prompt: &str) -> NarrationRequest {
        let history = narration::condense_history(
            &self.messages,
            self.config.narration.recent_count,
            self.config.narration.max_history,
        );
        NarrationRequest {
            prompt: prompt.to_string(),
            history,
            campaign_id: self.campaign_id.clone(),
            current_location_id: self.state.current_location_id.clone(),
            player_id: self.player_id.clone(),
            player_state: self.snapshot(),
            is_npc_dialogue: None,
            target_npc_id: None,
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.profile.name.clone(),
            class: self.profile.class.clone(),
            level: self.state.level,
            hp: self.state.hp,
            max_hp: self.state.max_hp,
            inventory: self.profile.inventory.clone(),
            abilities: self.abilities.iter().map(|a| a.name.clone()).collect(),
            bounty: self.state.bounty,
            is_jailed: self.state.is_jailed,
            stats: Some(self.profile.attributes),
        }
    }

    // -- Narrative text -----------------------------------------------------

    /// Append streamed narrative text to the narrator message of the current
    /// request, opening one if needed.
    pub fn append_narrative(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        match self.messages.last_mut() {
            Some(last) if self.narration_open && last.role == ChatRole::Narrator => {
                last.content.push_str(delta);
            }
            _ => {
                self.messages.push(ChatMessage::narrator(delta));
                self.narration_open = true;
            }
        }
    }

    /// The narration transport failed: append the scripted fallback line.
    pub fn transport_failed(&mut self) -> Vec<Command> {
        let message = ChatMessage::narrator(self.config.narration.fallback_line.clone());
        self.messages.push(message.clone());
        self.narration_open = false;
        vec![Command::Ui(UiEvent::MessageAppended(message))]
    }

    // -- Structured events --------------------------------------------------

    /// Apply one structured game event. Its state changes stay in the open
    /// batch until [`Self::finish_event`].
    pub fn apply_event(&mut self, data: &GameData) -> Vec<Command> {
        self.track();
        let mut commands = Vec::new();

        if let Some(hp) = data.hp {
            self.state.set_hp(hp);
        }
        if let Some(gold) = data.gold {
            self.state.set_gold(gold);
        }
        if let Some(energy) = data.energy {
            self.state.set_energy(energy);
        }

        if let Some(context) = data.context {
            self.switch_context(context, &mut commands);
        }

        if let Some(choices) = &data.choices {
            self.set_choices(choices.clone(), &mut commands);
        }

        if let Some(event) = &data.game_event {
            self.dispatch(event, &mut commands);
        }

        if let Some(xp) = data.xp_gained {
            self.award_xp(xp, &mut commands);
        }

        if let Some(name) = &data.current_location {
            self.sync_location(name, &mut commands);
        }

        commands
    }

    fn dispatch(&mut self, event: &GameEvent, commands: &mut Vec<Command>) {
        match event {
            GameEvent::Combat(combat) => self.on_combat(combat, commands),
            GameEvent::SkillCheck(check) => {
                commands.push(Command::Ui(UiEvent::SkillCheck(check.clone())));
                if check.is_natural_max() {
                    commands.push(Command::Ui(UiEvent::Effect(ScreenEffect::Critical)));
                }
            }
            GameEvent::Reward(reward) => self.on_reward(reward, commands),
            GameEvent::NpcDeath(death) => self.on_npc_death(death, commands),
            GameEvent::Crime(crime) => self.on_crime(crime, commands),
            GameEvent::Recruitment(recruit) => self.on_recruitment(recruit, commands),
            GameEvent::QuestProgress(progress) => self.on_quest_progress(progress, commands),
            GameEvent::QuestComplete(complete) => self.on_quest_complete(complete, commands),
            GameEvent::CombatEnded(ended) => self.on_combat_ended(ended, commands),
            GameEvent::Unknown(kind) => debug!(kind, "Ignoring unknown game event type"),
        }
    }

    fn on_combat(&mut self, event: &CombatEvent, commands: &mut Vec<Command>) {
        let defaults = &self.config.combat;
        let base = self
            .state
            .combat
            .clone()
            .filter(|c| event.enemy_name.as_ref().is_none_or(|n| *n == c.enemy_name));
        let enemy_hp = event
            .enemy_hp
            .or(base.as_ref().map(|c| c.enemy_hp))
            .unwrap_or(defaults.default_enemy_hp);
        let combat = CombatState {
            enemy_name: event
                .enemy_name
                .clone()
                .or(base.as_ref().map(|c| c.enemy_name.clone()))
                .unwrap_or_else(|| "Enemy".to_string()),
            enemy_hp: enemy_hp.max(0),
            enemy_max_hp: event
                .enemy_max_hp
                .or(base.as_ref().map(|c| c.enemy_max_hp))
                .unwrap_or(enemy_hp)
                .max(enemy_hp),
            is_player_turn: event
                .is_player_turn
                .or(base.as_ref().map(|c| c.is_player_turn))
                .unwrap_or(true),
            enemy_armor_class: event
                .armor_class
                .or(base.as_ref().map(|c| c.enemy_armor_class))
                .unwrap_or(defaults.default_enemy_armor_class),
        };
        let defeated = combat.is_enemy_defeated();
        self.state.combat = Some(combat.clone());
        commands.push(Command::Ui(UiEvent::CombatChanged(Some(combat))));
        self.switch_context(GameContext::Combat, commands);
        if defeated {
            self.schedule_combat_clear(commands);
        }
    }

    fn on_reward(&mut self, event: &RewardEvent, commands: &mut Vec<Command>) {
        let name = if event.name.trim().is_empty() {
            "Mysterious Reward".to_string()
        } else {
            event.name.clone()
        };
        let rarity = event
            .rarity
            .as_deref()
            .map_or(Rarity::Common, Rarity::parse_lenient);
        let xp = event.xp.unwrap_or(0);
        self.enqueue_reward(Reward::new(name, rarity, xp), commands);
        if xp > 0 {
            self.award_xp(xp, commands);
        }
    }

    fn on_npc_death(&mut self, event: &NpcDeathEvent, commands: &mut Vec<Command>) {
        let name = if event.npc_name.is_empty() {
            event.npc_id.as_ref().map(ToString::to_string).unwrap_or_default()
        } else {
            event.npc_name.clone()
        };
        self.kills.push(name.clone());
        let killed_by = event.killed_by.clone().unwrap_or_else(|| "player".to_string());

        let wanted = name.to_lowercase();
        let found = self.npcs.iter_mut().find(|n| {
            event.npc_id.as_ref() == Some(&n.id) || n.name.to_lowercase() == wanted
        });
        match found {
            Some(npc) if !npc.essential && !npc.dead => {
                npc.dead = true;
                npc.health = 0;
                let npc = npc.clone();
                commands.push(Command::MarkNpcDead {
                    npc_id: npc.id.clone(),
                    cause: format!("Killed by {killed_by}"),
                    killed_by: killed_by.clone(),
                });
                let origin = self
                    .state
                    .current_location_id
                    .clone()
                    .or_else(|| npc.location_id.clone());
                if let Some(origin) = origin {
                    commands.push(Command::CreateRumor(Rumor::death(
                        npc.id.clone(),
                        &npc.name,
                        &npc.role,
                        &killed_by,
                        origin,
                        self.config.rumors.death_max_spread,
                        Utc::now(),
                    )));
                }
            }
            Some(npc) => debug!(npc = %npc.name, essential = npc.essential, "NPC death not recorded"),
            None => debug!(npc = %name, "NPC death for unknown NPC"),
        }
        commands.push(Command::Ui(UiEvent::Effect(ScreenEffect::Damage)));
    }

    fn on_crime(&mut self, event: &CrimeEvent, commands: &mut Vec<Command>) {
        if !self.bounty_enabled {
            debug!(crime = %event.crime_type, "Bounty system disabled; crime ignored");
            return;
        }
        let Some(region_id) = self.resolve_region() else {
            debug!(crime = %event.crime_type, "No bounty region for current location");
            return;
        };
        commands.push(Command::AddBounty {
            region_id,
            crime_type: event.crime_type.clone(),
            description: event.description.clone(),
        });
        if let Some(origin) = self.state.current_location_id.clone() {
            let description = event
                .description
                .clone()
                .unwrap_or_else(|| event.crime_type.clone());
            commands.push(Command::CreateRumor(Rumor::crime(
                self.player_id.clone(),
                &description,
                origin,
                self.config.rumors.crime_max_spread,
                Utc::now(),
            )));
        }
    }

    /// First region containing the current location, else the configured
    /// default, else the campaign's first region.
    fn resolve_region(&self) -> Option<RegionId> {
        if let Some(location) = &self.state.current_location_id {
            if let Some(region) = self.regions.iter().find(|r| r.location_ids.contains(location)) {
                return Some(region.id.clone());
            }
        }
        if let Some(default) = &self.config.bounty.default_region {
            return Some(RegionId::new(default.clone()));
        }
        self.regions.first().map(|r| r.id.clone())
    }

    fn on_recruitment(&mut self, event: &RecruitmentEvent, commands: &mut Vec<Command>) {
        let text = match &event.role {
            Some(role) => format!("{} offers to join you as {role}", event.npc_name),
            None => format!("{} offers to join you", event.npc_name),
        };
        self.enqueue_reward(Reward::new(text, Rarity::Common, 0), commands);
    }

    fn on_quest_progress(&mut self, event: &QuestProgressEvent, commands: &mut Vec<Command>) {
        match self.find_quest(&event.quest_title, true) {
            Some(quest) => {
                let update = match (event.increment, event.completed) {
                    (Some(n), _) => QuestUpdate::Increment(n),
                    (None, true) => QuestUpdate::MarkComplete,
                    (None, false) => QuestUpdate::Increment(1),
                };
                commands.push(Command::UpdateQuestProgress {
                    quest_id: quest.id.clone(),
                    update,
                });
            }
            None => debug!(quest = %event.quest_title, "Quest progress for unknown quest"),
        }
        let xp = self.config.quests.progress_xp;
        let title = if event.quest_title.is_empty() { "Quest" } else { &event.quest_title };
        let reward = Reward::new(format!("Quest progress: {title}"), Rarity::Common, xp);
        self.enqueue_reward(reward, commands);
        self.award_xp(xp, commands);
    }

    fn on_quest_complete(&mut self, event: &QuestCompleteEvent, commands: &mut Vec<Command>) {
        let Some(quest) = self.find_quest(&event.quest_title, true) else {
            debug!(quest = %event.quest_title, "Quest completion for unknown quest");
            return;
        };
        commands.push(Command::CompleteQuest {
            quest_id: quest.id.clone(),
            title: quest.title.clone(),
            xp: event.xp.unwrap_or(self.config.quests.completion_xp),
            gold: event.gold.unwrap_or(0),
            items: event.items.clone(),
        });
    }

    fn find_quest(&self, title: &str, active_only: bool) -> Option<&QuestRecord> {
        let wanted = title.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.quests.iter().find(|q| {
            (!active_only || q.status == QuestStatus::Active) && q.title.to_lowercase() == wanted
        })
    }

    fn on_combat_ended(&mut self, event: &CombatEndedEvent, commands: &mut Vec<Command>) {
        if event.fled {
            self.clear_combat_now(commands);
            return;
        }
        if let Some(combat) = self.state.combat.as_mut() {
            if event.victory == Some(true) {
                combat.enemy_hp = 0;
            } else if let Some(hp) = event.enemy_hp {
                combat.enemy_hp = hp.max(0);
            }
        }
        if let Some(combat) = self.state.combat.as_ref().filter(|c| !c.is_enemy_defeated()) {
            debug!(enemy = %combat.enemy_name, hp = combat.enemy_hp, "Combat end with enemy standing");
            return;
        }
        self.schedule_combat_clear(commands);
    }

    // -- Helpers ------------------------------------------------------------

    fn switch_context(&mut self, context: GameContext, commands: &mut Vec<Command>) {
        if self.state.context != context {
            self.state.context = context;
            commands.push(Command::Ui(UiEvent::ContextChanged(context)));
        }
    }

    fn set_choices(&mut self, choices: Vec<String>, commands: &mut Vec<Command>) {
        if let Some(message) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == ChatRole::Narrator)
        {
            message.choices.clone_from(&choices);
        }
        self.pending_choices.clone_from(&choices);
        commands.push(Command::Ui(UiEvent::ChoicesChanged(choices)));
    }

    fn sync_location(&mut self, name: &str, commands: &mut Vec<Command>) {
        let Some(node) = self.graph.find_by_name(name) else {
            debug!(location = name, "Location sync for unknown location");
            return;
        };
        if self.state.current_location_id.as_ref() != Some(&node.id) {
            let id = node.id.clone();
            self.state.current_location_id = Some(id.clone());
            commands.push(Command::Ui(UiEvent::LocationChanged(id)));
        }
    }

    fn enqueue_reward(&mut self, reward: Reward, commands: &mut Vec<Command>) {
        self.rewards.push_back(reward.clone());
        commands.push(Command::Ui(UiEvent::RewardQueued(reward)));
    }

    fn award_xp(&mut self, amount: u32, commands: &mut Vec<Command>) {
        let progress = progression::grant_xp(
            self.state.level,
            self.state.xp,
            self.state.xp_to_level,
            amount,
            &self.config.progression,
        );
        self.state.level = progress.level;
        self.state.xp = progress.xp;
        self.state.xp_to_level = progress.xp_to_level;
        for level in progress.levels_gained {
            info!(level, player = %self.player_id, "Level up");
            commands.push(Command::Ui(UiEvent::LevelUp { level }));
            commands.push(Command::Ui(UiEvent::Effect(ScreenEffect::LevelUp)));
        }
    }

    fn schedule_combat_clear(&mut self, commands: &mut Vec<Command>) {
        if self.clear_scheduled {
            return;
        }
        self.clear_scheduled = true;
        commands.push(Command::ScheduleCombatClear {
            delay: Duration::from_millis(self.config.combat.clear_delay_ms),
        });
    }

    fn clear_combat_now(&mut self, commands: &mut Vec<Command>) {
        self.clear_scheduled = false;
        if self.state.combat.take().is_some() {
            commands.push(Command::Ui(UiEvent::CombatChanged(None)));
        }
        self.switch_context(GameContext::Explore, commands);
    }

    fn track(&mut self) {
        if self.persisted.is_none() {
            self.persisted = Some(self.state.clone());
        }
    }

    fn finish(&mut self, mut commands: Vec<Command>) -> Vec<Command> {
        if let Some(patch) = self.finish_event() {
            commands.push(Command::Persist(patch));
        }
        commands
    }

    /// Close the open batch: every scalar changed since the last persist, as
    /// one patch. `None` when nothing changed.
    pub fn finish_event(&mut self) -> Option<StatePatch> {
        let before = self.persisted.take()?;
        StatePatch::diff(&before, &self.state)
    }

    // -- Outcomes & scheduled work -------------------------------------------

    /// Clear combat and return to exploration. Called by the driver once a
    /// scheduled clear comes due.
    pub fn clear_combat(&mut self) -> Vec<Command> {
        self.track();
        let mut commands = Vec::new();
        self.clear_combat_now(&mut commands);
        self.finish(commands)
    }

    /// Feed back the store's answer to a branching command. State changes join
    /// the open batch of the event that issued the command.
    pub fn apply_outcome(&mut self, outcome: CommandOutcome) -> Vec<Command> {
        self.track();
        let mut commands = Vec::new();
        match outcome {
            CommandOutcome::BountyAdded { total } => {
                self.state.bounty = total;
                commands.push(Command::Ui(UiEvent::BountyChanged {
                    total,
                    danger: bounty::danger_level(total),
                    jail_hours: bounty::jail_hours(total),
                }));
            }
            CommandOutcome::QuestCompleted { quest_id, title, xp, gold, items } => {
                if let Some(quest) = self.quests.iter_mut().find(|q| q.id == quest_id) {
                    quest.status = QuestStatus::Completed;
                }
                self.state.set_gold(i64::from(self.state.gold) + i64::from(gold));
                self.enqueue_reward(
                    Reward::new(format!("Quest Complete: {title}"), Rarity::Legendary, xp),
                    &mut commands,
                );
                for item in items {
                    self.enqueue_reward(Reward::new(item, Rarity::Rare, 0), &mut commands);
                }
                self.award_xp(xp, &mut commands);
                commands.push(Command::Ui(UiEvent::Effect(ScreenEffect::Celebration)));
            }
            CommandOutcome::QuestRejected { quest_id } => {
                debug!(quest = %quest_id, "Store rejected quest completion");
            }
            CommandOutcome::Travelled { to } => {
                self.state.current_location_id = Some(to.clone());
                commands.push(Command::Ui(UiEvent::LocationChanged(to.clone())));
                let name = self
                    .graph
                    .node(&to)
                    .map_or_else(|| to.to_string(), |n| n.name.clone());
                let prompt = narration::arrival_prompt(&self.config.narration.arrival_prompt, &name);
                self.narration_open = false;
                commands.push(Command::Narrate(Box::new(self.build_request(&prompt))));
            }
            CommandOutcome::TravelRejected { to, reason } => {
                debug!(destination = %to, reason, "Travel rejected");
            }
        }
        commands
    }

    // -- Combat & abilities --------------------------------------------------

    /// Attack the current enemy. Does nothing outside combat.
    pub fn attack<R: Rng + ?Sized>(
        &mut self,
        weapon_dice: &str,
        melee: bool,
        options: RollOptions,
        rng: &mut R,
    ) -> Vec<Command> {
        let Some(combat) = self.state.combat.clone() else {
            debug!("Attack outside combat ignored");
            return Vec::new();
        };
        self.track();
        let mut commands = Vec::new();

        let attrs = self.profile.attributes;
        let score = if melee { attrs.strength } else { attrs.dexterity };
        let attack =
            resolution::attack_roll(rng, score, self.state.level, combat.enemy_armor_class, options);
        let damage = attack
            .hits
            .then(|| resolution::damage_roll(rng, weapon_dice, attack.is_critical_hit));

        let mut combat = combat;
        if let Some(dmg) = &damage {
            combat.enemy_hp = combat.enemy_hp.saturating_sub(dmg.roll.total.max(0)).max(0);
        }
        combat.is_player_turn = false;
        let defeated = combat.is_enemy_defeated();
        self.state.combat = Some(combat.clone());

        commands.push(Command::Ui(UiEvent::AttackResolved { attack, damage }));
        commands.push(Command::Ui(UiEvent::CombatChanged(Some(combat))));
        if defeated {
            self.schedule_combat_clear(&mut commands);
        }
        self.finish(commands)
    }

    /// Use an ability, optionally against an NPC.
    ///
    /// # Errors
    /// Returns an [`AbilityFailure`] when the ability is unknown, energy is
    /// short, or it is cooling down. State is unchanged in that case.
    pub fn use_ability<R: Rng + ?Sized>(
        &mut self,
        ability_id: &crate::types::AbilityId,
        target: Option<&NpcId>,
        seed: u32,
        rng: &mut R,
    ) -> Result<Vec<Command>, AbilityFailure> {
        let Some(ability) = self.abilities.iter().find(|a| &a.id == ability_id).cloned() else {
            return Err(AbilityFailure::Unknown { ability_id: ability_id.clone() });
        };
        let target_index = target.and_then(|id| self.npcs.iter().position(|n| &n.id == id && !n.dead));

        self.track();
        let effect =
            abilities::use_ability(&mut self.state, &ability, target_index.is_some(), seed, rng)?;
        let mut commands = Vec::new();

        if let Some(index) = target_index.filter(|_| effect.damage > 0) {
            let hit = abilities::npc_damage(&self.npcs[index], effect.damage);
            let npc = &mut self.npcs[index];
            npc.health = hit.new_health;
            if hit.killed {
                npc.dead = true;
                self.kills.push(npc.name.clone());
                let npc = npc.clone();
                if let Some(origin) = self
                    .state
                    .current_location_id
                    .clone()
                    .or_else(|| npc.location_id.clone())
                {
                    commands.push(Command::CreateRumor(Rumor::death(
                        npc.id.clone(),
                        &npc.name,
                        &npc.role,
                        "player",
                        origin,
                        self.config.rumors.death_max_spread,
                        Utc::now(),
                    )));
                }
            }
            commands.insert(0, Command::ApplyNpcDamage(hit));
        }
        commands.push(Command::Ui(UiEvent::AbilityUsed(effect)));
        Ok(self.finish(commands))
    }

    /// End of a player turn: tick every cooldown down by one.
    pub fn tick_cooldowns(&mut self) -> Vec<Command> {
        self.track();
        abilities::tick_cooldowns(&mut self.state);
        self.finish(Vec::new())
    }

    /// Restore energy; a full refill when `amount` is `None`.
    pub fn regenerate_energy(&mut self, amount: Option<i32>) -> Vec<Command> {
        self.track();
        abilities::regenerate_energy(&mut self.state, amount);
        self.finish(Vec::new())
    }

    /// Grant xp outside of any event (e.g. scripted rewards).
    pub fn grant_xp(&mut self, amount: u32) -> Vec<Command> {
        self.track();
        let mut commands = Vec::new();
        self.award_xp(amount, &mut commands);
        self.finish(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbilityId, Attributes};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn context() -> SessionContext {
        let loc = |id: &str, name: &str, next: &[&str]| LocationNode {
            id: id.into(),
            name: name.into(),
            neighbors: next.iter().map(|n| LocationId::from(*n)).collect(),
        };
        SessionContext {
            campaign_id: "camp".into(),
            player_id: "hero".into(),
            profile: PlayerProfile {
                name: "Ayla".into(),
                class: "Ranger".into(),
                inventory: vec!["Bow".into()],
                attributes: Attributes { strength: 14, ..Attributes::default() },
            },
            locations: vec![
                loc("mill", "Old Mill", &["square"]),
                loc("square", "Town Square", &["keep"]),
                loc("keep", "Keep", &[]),
            ],
            npcs: vec![
                NpcRecord {
                    id: "bram".into(),
                    name: "Bram".into(),
                    role: "blacksmith".into(),
                    location_id: Some("square".into()),
                    faction_id: None,
                    essential: false,
                    dead: false,
                    health: 20,
                },
                NpcRecord {
                    id: "queen".into(),
                    name: "Queen Mira".into(),
                    role: "ruler".into(),
                    location_id: Some("keep".into()),
                    faction_id: None,
                    essential: true,
                    dead: false,
                    health: 100,
                },
            ],
            quests: vec![QuestRecord {
                id: "q1".into(),
                title: "The Lost Hammer".into(),
                status: QuestStatus::Active,
            }],
            regions: vec![RegionRecord {
                id: "north".into(),
                name: "Northreach".into(),
                location_ids: vec!["square".into()],
            }],
            abilities: vec![AbilityRecord {
                id: "bolt".into(),
                name: "Firebolt".into(),
                energy_cost: 10,
                cooldown: 1,
                damage: Some(25),
                damage_dice: None,
                healing: None,
            }],
            bounty_enabled: true,
        }
    }

    fn processor() -> NarrativeProcessor {
        let mut p = NarrativeProcessor::new(EngineConfig::default(), context(), None);
        p.state.current_location_id = Some("square".into());
        p
    }

    fn event(value: serde_json::Value) -> GameData {
        GameData::from_value(value)
    }

    fn persists(commands: &[Command]) -> Vec<&StatePatch> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Persist(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn context_from_json() {
        let ctx = SessionContext::from_json(
            r#"{"campaignId":"c","playerId":"p","locations":[{"id":"a","name":"A","neighbors":["b"]}],"bountyEnabled":true}"#,
        )
        .expect("valid context");
        assert_eq!(ctx.locations.len(), 1);
        assert!(ctx.bounty_enabled);
        assert!(SessionContext::from_json("{").is_err());
    }

    #[test]
    fn scalar_overwrite_is_batched_into_one_persist() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({"hp": 15, "gold": 30, "energy": 40})));
        assert!(persists(&commands).is_empty());
        let patch = p.finish_event().expect("patch");
        assert_eq!(patch.hp, Some(15));
        assert_eq!(patch.gold, Some(30));
        assert_eq!(patch.energy, Some(40));
        assert!(p.finish_event().is_none());
    }

    #[test]
    fn hp_overwrite_is_idempotent() {
        let mut p = processor();
        p.apply_event(&event(json!({"hp": 5})));
        assert!(p.finish_event().is_some());
        let first = p.state().clone();
        p.apply_event(&event(json!({"hp": 5})));
        assert_eq!(p.state(), &first);
        assert!(p.finish_event().is_none());
    }

    #[test]
    fn choices_attach_to_latest_narrator_message() {
        let mut p = processor();
        p.submit_action("look around");
        p.append_narrative("You see a road.");
        p.apply_event(&event(json!({"choices": ["North", {"text": "South"}]})));
        assert_eq!(p.pending_choices(), ["North", "South"]);
        assert_eq!(p.messages().last().map(|m| m.choices.len()), Some(2));

        p.submit_action("North");
        assert!(p.pending_choices().is_empty());
    }

    #[test]
    fn combat_event_forces_combat_context() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({
            "gameEvent": {"type": "combat", "combat": {"enemyName": "Wolf", "enemyHP": 12, "enemyMaxHP": 12}}
        })));
        assert_eq!(p.state().context, GameContext::Combat);
        let combat = p.state().combat.clone().expect("combat");
        assert_eq!(combat.enemy_name, "Wolf");
        assert_eq!(combat.enemy_armor_class, 12);
        assert!(commands.contains(&Command::Ui(UiEvent::ContextChanged(GameContext::Combat))));

        p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyHP": 4}})));
        let combat = p.state().combat.clone().expect("combat");
        assert_eq!(combat.enemy_name, "Wolf");
        assert_eq!(combat.enemy_hp, 4);
    }

    #[test]
    fn zero_hp_enemy_schedules_one_clear() {
        let mut p = processor();
        p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyName": "Rat", "enemyHP": 3}})));
        let commands = p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyHP": 0}})));
        assert!(commands.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));
        let again = p.apply_event(&event(json!({"gameEvent": {"type": "combatEnded", "enemyHP": 0}})));
        assert!(!again.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));

        let cleared = p.clear_combat();
        assert!(p.state().combat.is_none());
        assert_eq!(p.state().context, GameContext::Explore);
        assert_eq!(persists(&cleared).len(), 1);
    }

    #[test]
    fn combat_end_clears_only_a_defeated_enemy() {
        let mut p = processor();
        p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyName": "Troll", "enemyHP": 30}})));
        let standing = p.apply_event(&event(json!({"gameEvent": {"type": "combatEnded", "enemyHP": 12}})));
        assert!(!standing.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));
        assert_eq!(p.state().combat.as_ref().map(|c| c.enemy_hp), Some(12));

        let won = p.apply_event(&event(json!({"gameEvent": {"type": "combatEnded", "victory": true}})));
        assert!(won.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));
        assert_eq!(p.state().combat.as_ref().map(|c| c.enemy_hp), Some(0));
    }

    #[test]
    fn flee_clears_immediately() {
        let mut p = processor();
        p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyName": "Ogre", "enemyHP": 50}})));
        let commands = p.apply_event(&event(json!({"gameEvent": {"type": "combatEnded", "fled": true}})));
        assert!(p.state().combat.is_none());
        assert_eq!(p.state().context, GameContext::Explore);
        assert!(!commands.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));
    }

    #[test]
    fn natural_twenty_skill_check_triggers_critical_effect() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({
            "gameEvent": {"type": "skillCheck", "skillCheck": {"skill": "stealth", "roll": 20}}
        })));
        assert!(commands.contains(&Command::Ui(UiEvent::Effect(ScreenEffect::Critical))));
    }

    #[test]
    fn reward_xp_levels_up_through_the_loop() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({
            "gameEvent": {"type": "reward", "reward": {"name": "Crown", "rarity": "epic", "xp": 250}}
        })));
        assert_eq!(p.state().level, 3);
        assert_eq!(p.state().xp, 0);
        assert_eq!(p.state().xp_to_level, 225);
        let level_ups = commands
            .iter()
            .filter(|c| matches!(c, Command::Ui(UiEvent::LevelUp { .. })))
            .count();
        assert_eq!(level_ups, 2);
        assert_eq!(p.next_reward().map(|r| r.rarity), Some(Rarity::Epic));
    }

    #[test]
    fn float_reward_xp_is_not_lost() {
        let mut p = processor();
        p.apply_event(&event(json!({
            "gold": 7.0,
            "gameEvent": {"type": "reward", "reward": {"name": "Gem", "xp": 25.0}}
        })));
        assert_eq!(p.state().gold, 7);
        assert_eq!(p.queued_rewards(), 1);
        assert_eq!(p.state().xp, 25);
    }

    #[test]
    fn npc_death_marks_dead_and_spreads_rumor() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({"gameEvent": {"type": "npcDeath", "npcName": "bram"}})));
        assert!(commands.iter().any(|c| matches!(c, Command::MarkNpcDead { .. })));
        let rumor = commands.iter().find_map(|c| match c {
            Command::CreateRumor(r) => Some(r),
            _ => None,
        });
        let rumor = rumor.expect("death rumor");
        assert_eq!(rumor.origin_location_id, LocationId::from("square"));
        assert_eq!(rumor.max_spread_radius, 4);
        assert!(commands.contains(&Command::Ui(UiEvent::Effect(ScreenEffect::Damage))));
        assert_eq!(p.kills(), ["bram"]);
    }

    #[test]
    fn essential_npc_death_only_plays_effect() {
        let mut p = processor();
        let commands =
            p.apply_event(&event(json!({"gameEvent": {"type": "npcDeath", "npcName": "Queen Mira"}})));
        assert!(!commands.iter().any(|c| matches!(c, Command::MarkNpcDead { .. })));
        assert!(commands.contains(&Command::Ui(UiEvent::Effect(ScreenEffect::Damage))));
    }

    #[test]
    fn crime_adds_bounty_in_region_and_mirrors_total() {
        let mut p = processor();
        let commands =
            p.apply_event(&event(json!({"gameEvent": {"type": "crime", "crimeType": "theft"}})));
        let region = commands.iter().find_map(|c| match c {
            Command::AddBounty { region_id, .. } => Some(region_id.clone()),
            _ => None,
        });
        assert_eq!(region, Some(RegionId::from("north")));
        p.apply_outcome(CommandOutcome::BountyAdded { total: 50 });
        assert_eq!(p.state().bounty, 50);
        assert_eq!(p.finish_event().and_then(|patch| patch.bounty), Some(50));
    }

    #[test]
    fn event_and_its_outcome_persist_together() {
        let mut p = processor();
        let mut commands =
            p.apply_event(&event(json!({"hp": 50, "gameEvent": {"type": "crime", "crimeType": "theft"}})));
        commands.extend(p.apply_outcome(CommandOutcome::BountyAdded { total: 50 }));
        assert!(persists(&commands).is_empty());

        let patch = p.finish_event().expect("one patch for the event");
        assert_eq!(patch.hp, Some(50));
        assert_eq!(patch.bounty, Some(50));
        assert!(p.finish_event().is_none());
    }

    #[test]
    fn crime_ignored_when_bounties_disabled() {
        let mut ctx = context();
        ctx.bounty_enabled = false;
        let mut p = NarrativeProcessor::new(EngineConfig::default(), ctx, None);
        let commands =
            p.apply_event(&event(json!({"gameEvent": {"type": "crime", "crimeType": "murder"}})));
        assert!(commands.is_empty());
    }

    #[test]
    fn quest_progress_always_grants_xp() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({
            "gameEvent": {"type": "questProgress", "questTitle": "the lost hammer"}
        })));
        assert!(commands.contains(&Command::UpdateQuestProgress {
            quest_id: "q1".into(),
            update: QuestUpdate::Increment(1),
        }));
        assert_eq!(p.state().xp, 10);

        p.apply_event(&event(json!({"gameEvent": {"type": "questProgress", "questTitle": "Unknown"}})));
        assert_eq!(p.state().xp, 20);
    }

    #[test]
    fn quest_completion_round_trip() {
        let mut p = processor();
        let commands = p.apply_event(&event(json!({
            "gameEvent": {"type": "questComplete", "questComplete": {"questTitle": "The Lost Hammer", "gold": 25, "items": ["Hammer"]}}
        })));
        let Some(Command::CompleteQuest { quest_id, title, xp, gold, items }) = commands
            .iter()
            .find(|c| matches!(c, Command::CompleteQuest { .. }))
            .cloned()
        else {
            panic!("expected complete-quest command");
        };
        assert_eq!(xp, 50);
        let commands = p.apply_outcome(CommandOutcome::QuestCompleted { quest_id, title, xp, gold, items });
        assert_eq!(p.state().gold, 25);
        assert_eq!(p.state().xp, 50);
        assert_eq!(p.queued_rewards(), 2);
        assert_eq!(p.next_reward().map(|r| r.rarity), Some(Rarity::Legendary));
        assert!(commands.contains(&Command::Ui(UiEvent::Effect(ScreenEffect::Celebration))));
        assert_eq!(p.quests()[0].status, QuestStatus::Completed);
    }

    #[test]
    fn rewards_stay_queued_until_acknowledged() {
        let mut p = processor();
        p.apply_event(&event(json!({"gameEvent": {"type": "recruitment", "npcName": "Kael"}})));
        let id = p.next_reward().map(|r| r.id).expect("reward");
        assert_eq!(p.next_reward().map(|r| r.xp), Some(0));
        assert!(p.acknowledge_reward(id).is_some());
        assert!(p.next_reward().is_none());
        assert!(p.acknowledge_reward(id).is_none());
    }

    #[test]
    fn location_sync_by_name() {
        let mut p = processor();
        p.apply_event(&event(json!({"currentLocation": "old mill"})));
        assert_eq!(p.state().current_location_id, Some("mill".into()));
        let patch = p.finish_event().expect("patch");
        assert_eq!(patch.current_location_id, Some("mill".into()));
    }

    #[test]
    fn travel_only_moves_on_success() {
        let mut p = processor();
        let commands = p.request_travel(&"keep".into());
        assert!(matches!(commands.as_slice(), [Command::Travel { .. }]));
        assert_eq!(p.state().current_location_id, Some("square".into()));

        let rejected = p.apply_outcome(CommandOutcome::TravelRejected {
            to: "keep".into(),
            reason: "blocked".into(),
        });
        assert!(rejected.is_empty());

        let moved = p.apply_outcome(CommandOutcome::Travelled { to: "keep".into() });
        assert_eq!(p.state().current_location_id, Some("keep".into()));
        let arrival = moved.iter().find_map(|c| match c {
            Command::Narrate(r) => Some(r.prompt.clone()),
            _ => None,
        });
        assert_eq!(arrival.as_deref(), Some("I arrive at Keep. Describe what I find."));
    }

    #[test]
    fn submit_action_builds_request_with_snapshot() {
        let mut p = processor();
        p.append_narrative("Welcome.");
        let commands = p.submit_action("  open the door ");
        let request = commands.iter().find_map(|c| match c {
            Command::Narrate(r) => Some(r),
            _ => None,
        });
        let request = request.expect("narration request");
        assert_eq!(request.prompt, "open the door");
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.player_state.name, "Ayla");
        assert_eq!(request.player_state.abilities, vec!["Firebolt".to_string()]);
        assert!(p.submit_action("   ").is_empty());
    }

    #[test]
    fn narrative_deltas_accumulate_per_request() {
        let mut p = processor();
        p.submit_action("hello");
        p.append_narrative("Hello");
        p.append_narrative(" world");
        assert_eq!(p.messages().last().map(|m| m.content.as_str()), Some("Hello world"));
        p.submit_action("again");
        p.append_narrative("Second");
        assert_eq!(p.messages().len(), 4);
    }

    #[test]
    fn transport_failure_appends_fallback_line() {
        let mut p = processor();
        p.submit_action("hello");
        p.transport_failed();
        let last = p.messages().last().expect("message");
        assert_eq!(last.role, ChatRole::Narrator);
        assert_eq!(last.content, p.config().narration.fallback_line);
    }

    #[test]
    fn attack_reduces_enemy_hp_or_misses() {
        let mut p = processor();
        p.apply_event(&event(json!({"gameEvent": {"type": "combat", "enemyName": "Rat", "enemyHP": 100, "enemyAC": 1}})));
        let mut rng = StdRng::seed_from_u64(4);
        let commands = p.attack("1d8+2", true, RollOptions::default(), &mut rng);
        let hit = commands.iter().find_map(|c| match c {
            Command::Ui(UiEvent::AttackResolved { attack, damage }) => Some((attack.hits, damage.clone())),
            _ => None,
        });
        let (hits, damage) = hit.expect("attack resolved");
        let combat = p.state().combat.clone().expect("combat");
        if hits {
            assert_eq!(combat.enemy_hp, 100 - damage.expect("damage").roll.total);
        } else {
            assert_eq!(combat.enemy_hp, 100);
        }
        assert!(!combat.is_player_turn);
    }

    #[test]
    fn attack_outside_combat_does_nothing() {
        let mut p = processor();
        let mut rng = StdRng::seed_from_u64(4);
        assert!(p.attack("1d8", true, RollOptions::default(), &mut rng).is_empty());
    }

    #[test]
    fn ability_kills_npc_and_reports_structured_failures() {
        let mut p = processor();
        let mut rng = StdRng::seed_from_u64(1);
        let bolt = AbilityId::from("bolt");
        let commands = p
            .use_ability(&bolt, Some(&"bram".into()), 7, &mut rng)
            .expect("ability used");
        let Some(Command::ApplyNpcDamage(hit)) = commands.first() else {
            panic!("expected npc damage first");
        };
        assert!(hit.killed);
        assert!(p.npcs()[0].dead);
        assert_eq!(p.state().energy, 90);

        let err = p.use_ability(&bolt, None, 7, &mut rng).unwrap_err();
        assert_eq!(err, AbilityFailure::OnCooldown { turns_remaining: 1 });
        p.tick_cooldowns();
        assert!(p.use_ability(&bolt, None, 7, &mut rng).is_ok());

        let err = p.use_ability(&"nope".into(), None, 7, &mut rng).unwrap_err();
        assert!(matches!(err, AbilityFailure::Unknown { .. }));
    }

    #[test]
    fn energy_regeneration_persists() {
        let mut p = processor();
        p.apply_event(&event(json!({"energy": 10})));
        let commands = p.regenerate_energy(Some(15));
        assert_eq!(p.state().energy, 25);
        assert_eq!(persists(&commands)[0].energy, Some(25));
    }
}
