//! The session driver.
//!
//! [`GameSession`] wires a [`NarrativeProcessor`] to its three ports: it opens
//! narration requests on the transport, folds the demultiplexed stream into
//! the processor, carries out the returned commands against the store, and
//! forwards presentation updates to the sink.
//!
//! Every public operation runs to completion before returning, including a
//! delayed combat clear the operation scheduled.

use std::collections::VecDeque;
use std::pin::pin;
use std::time::Duration;

use futures_util::StreamExt;
use loreweave_core::abilities::AbilityFailure;
use loreweave_core::narration::NarrationRequest;
use loreweave_core::resolution::RollOptions;
use loreweave_core::types::{AbilityId, LocationId, NpcId, Reward, RewardId};
use loreweave_core::world::{Knowledge, LocationContext, Rumor, tick_rumors};
use loreweave_core::{Command, CommandOutcome, EngineConfig, NarrativeProcessor};
use loreweave_stream::{NarrationTransport, StreamItem, TransportError, demultiplex};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::presentation::PresentationSink;
use crate::store::{CrimeReport, StateStore, TravelVerdict};

/// Result of [`GameSession::use_ability`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilityOutcome {
    /// The ability was used; its effect went to the sink.
    Used,
    /// The ability could not be used. Nothing changed.
    Refused(AbilityFailure),
}

/// Work deferred until the current command batch is done.
#[derive(Debug, Default)]
struct Pending {
    narration: VecDeque<NarrationRequest>,
    clear_after: Option<Duration>,
    travel: Option<TravelVerdict>,
}

/// One running (campaign, player) session.
pub struct GameSession<T, S, P> {
    processor: NarrativeProcessor,
    transport: T,
    store: S,
    sink: P,
    rumors: Vec<Rumor>,
    rng: StdRng,
}

impl<T, S, P> GameSession<T, S, P>
where
    T: NarrationTransport,
    S: StateStore,
    P: PresentationSink,
{
    /// Load a session from the store, creating the stored state for a fresh
    /// character.
    ///
    /// # Errors
    /// Returns a store error if the session's world data cannot be loaded.
    pub async fn start(
        config: EngineConfig,
        campaign: &loreweave_core::CampaignId,
        player: &loreweave_core::PlayerId,
        transport: T,
        store: S,
        sink: P,
    ) -> Result<Self> {
        Self::start_with_rng(config, campaign, player, transport, store, sink, StdRng::from_entropy())
            .await
    }

    /// [`Self::start`] with a caller-supplied generator, for replayable runs.
    ///
    /// # Errors
    /// Returns a store error if the session's world data cannot be loaded.
    pub async fn start_with_rng(
        config: EngineConfig,
        campaign: &loreweave_core::CampaignId,
        player: &loreweave_core::PlayerId,
        transport: T,
        store: S,
        sink: P,
        rng: StdRng,
    ) -> Result<Self> {
        let context = store.load_context(campaign, player).await?;
        let stored = store.load_state(campaign, player).await?;
        let fresh = stored.is_none();
        let processor = NarrativeProcessor::new(config, context, stored);
        if fresh {
            store.put_state(campaign, player, processor.state()).await?;
        }
        let rumors = store.load_rumors(campaign).await?;
        info!(
            campaign = %campaign,
            player = %player,
            fresh,
            rumors = rumors.len(),
            "Session started"
        );
        Ok(Self {
            processor,
            transport,
            store,
            sink,
            rumors,
            rng,
        })
    }

    // -- Accessors ----------------------------------------------------------

    /// The reducer.
    #[must_use]
    pub fn processor(&self) -> &NarrativeProcessor {
        &self.processor
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The presentation sink.
    #[must_use]
    pub fn sink(&self) -> &P {
        &self.sink
    }

    /// Mutable access to the presentation sink.
    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    /// Rumors known to this session.
    #[must_use]
    pub fn rumors(&self) -> &[Rumor] {
        &self.rumors
    }

    /// What `asker` knows about `subject`.
    #[must_use]
    pub fn knowledge_about(&self, asker: &NpcId, subject: &NpcId) -> Option<Knowledge> {
        self.processor.knowledge_about(asker, subject, &self.rumors)
    }

    /// Who and what is around `location`.
    #[must_use]
    pub fn location_context(&self, location: &LocationId) -> LocationContext {
        self.processor.location_context(location, &self.rumors)
    }

    // -- Player operations --------------------------------------------------

    /// Submit a free-text action and narrate the result.
    ///
    /// # Errors
    /// Returns the transport error after appending the fallback line, or a
    /// store error.
    pub async fn submit_action(&mut self, text: &str) -> Result<()> {
        let commands = self.processor.submit_action(text);
        self.drive(commands, &mut Pending::default()).await
    }

    /// Speak to an NPC and narrate the reply.
    ///
    /// # Errors
    /// As [`Self::submit_action`].
    pub async fn talk_to(&mut self, npc: &NpcId, text: &str) -> Result<()> {
        let commands = self.processor.talk_to(npc, text);
        self.drive(commands, &mut Pending::default()).await
    }

    /// Travel to `to`. On success the arrival is narrated.
    ///
    /// # Errors
    /// As [`Self::submit_action`].
    pub async fn travel(&mut self, to: &LocationId) -> Result<TravelVerdict> {
        let commands = self.processor.request_travel(to);
        let mut pending = Pending::default();
        self.drive(commands, &mut pending).await?;
        Ok(pending.travel.unwrap_or(TravelVerdict::Allowed))
    }

    /// Attack the current enemy.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn attack(&mut self, weapon_dice: &str, melee: bool, options: RollOptions) -> Result<()> {
        let commands = self.processor.attack(weapon_dice, melee, options, &mut self.rng);
        self.drive(commands, &mut Pending::default()).await
    }

    /// Use an ability, optionally against an NPC.
    ///
    /// # Errors
    /// Returns a store error. A refused ability is not an error.
    pub async fn use_ability(
        &mut self,
        ability: &AbilityId,
        target: Option<&NpcId>,
    ) -> Result<AbilityOutcome> {
        let seed = self.rng.next_u32();
        match self.processor.use_ability(ability, target, seed, &mut self.rng) {
            Ok(commands) => {
                self.drive(commands, &mut Pending::default()).await?;
                Ok(AbilityOutcome::Used)
            }
            Err(failure) => {
                debug!(ability = %ability, reason = %failure, "Ability refused");
                Ok(AbilityOutcome::Refused(failure))
            }
        }
    }

    /// End the player's turn: cooldowns tick down.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn end_turn(&mut self) -> Result<()> {
        let commands = self.processor.tick_cooldowns();
        self.drive(commands, &mut Pending::default()).await
    }

    /// Rest: energy refills.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn rest(&mut self) -> Result<()> {
        let commands = self.processor.regenerate_energy(None);
        self.drive(commands, &mut Pending::default()).await
    }

    /// Grant xp outside of any narrated event.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn grant_xp(&mut self, amount: u32) -> Result<()> {
        let commands = self.processor.grant_xp(amount);
        self.drive(commands, &mut Pending::default()).await
    }

    /// Advance world time: every active rumor spreads one step. Returns how
    /// many rumors grew.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn world_tick(&mut self) -> Result<usize> {
        let grown = tick_rumors(&mut self.rumors);
        self.store
            .put_rumors(self.processor.campaign_id(), &self.rumors)
            .await?;
        debug!(grown, total = self.rumors.len(), "World tick");
        Ok(grown)
    }

    /// Dismiss a queued reward.
    pub fn acknowledge_reward(&mut self, id: RewardId) -> Option<Reward> {
        self.processor.acknowledge_reward(id)
    }

    // -- Command execution --------------------------------------------------

    /// Execute `commands`, run any narration they opened, then any combat
    /// clear they scheduled. The clear runs even if narration failed.
    async fn drive(&mut self, commands: Vec<Command>, pending: &mut Pending) -> Result<()> {
        self.execute(commands, pending).await?;

        let mut outcome = Ok(());
        while let Some(request) = pending.narration.pop_front() {
            if let Err(e) = self.narrate(&request, pending).await {
                outcome = Err(e);
                break;
            }
        }

        if let Some(delay) = pending.clear_after.take() {
            tokio::time::sleep(delay).await;
            debug!(?delay, "Clearing combat");
            let commands = self.processor.clear_combat();
            let cleared = self.execute(commands, pending).await;
            outcome = outcome.and(cleared);
        }
        outcome
    }

    /// Carry out commands in order. Outcome follow-ups run before the rest
    /// of the batch. The processor's open change batch is written back once
    /// everything has drained.
    async fn execute(&mut self, commands: Vec<Command>, pending: &mut Pending) -> Result<()> {
        let campaign = self.processor.campaign_id().clone();
        let player = self.processor.player_id().clone();
        let mut queue: VecDeque<Command> = commands.into();

        while let Some(command) = queue.pop_front() {
            let outcome = match command {
                Command::Persist(patch) => {
                    self.store.patch_state(&campaign, &player, &patch).await?;
                    None
                }
                Command::MarkNpcDead { npc_id, cause, killed_by } => {
                    let marked = self
                        .store
                        .mark_npc_dead(&campaign, &npc_id, &cause, &killed_by)
                        .await?;
                    if !marked {
                        debug!(npc = %npc_id, "Store did not mark NPC dead");
                    }
                    None
                }
                Command::ApplyNpcDamage(hit) => {
                    self.store.apply_npc_damage(&campaign, &hit).await?;
                    None
                }
                Command::CreateRumor(rumor) => {
                    self.store.create_rumor(&campaign, &rumor).await?;
                    self.rumors.push(rumor);
                    None
                }
                Command::AddBounty { region_id, crime_type, description } => {
                    let crime = CrimeReport { region_id, crime_type, description };
                    let total = self.store.add_bounty(&campaign, &player, &crime).await?;
                    Some(CommandOutcome::BountyAdded { total })
                }
                Command::UpdateQuestProgress { quest_id, update } => {
                    let advanced = self
                        .store
                        .update_quest_progress(&campaign, &player, &quest_id, update)
                        .await?;
                    if !advanced {
                        debug!(quest = %quest_id, "Quest progress ignored by store");
                    }
                    None
                }
                Command::CompleteQuest { quest_id, title, xp, gold, items } => {
                    if self.store.complete_quest(&campaign, &player, &quest_id).await? {
                        Some(CommandOutcome::QuestCompleted { quest_id, title, xp, gold, items })
                    } else {
                        Some(CommandOutcome::QuestRejected { quest_id })
                    }
                }
                Command::Travel { from, to } => {
                    let verdict = self.store.travel(&campaign, &player, from.as_ref(), &to).await?;
                    pending.travel = Some(verdict.clone());
                    Some(match verdict {
                        TravelVerdict::Allowed => CommandOutcome::Travelled { to },
                        TravelVerdict::Refused(reason) => CommandOutcome::TravelRejected { to, reason },
                    })
                }
                Command::Narrate(request) => {
                    pending.narration.push_back(*request);
                    None
                }
                Command::ScheduleCombatClear { delay } => {
                    pending.clear_after = Some(delay);
                    None
                }
                Command::Ui(event) => {
                    self.sink.ui(&event);
                    None
                }
            };

            if let Some(outcome) = outcome {
                let follow_ups = self.processor.apply_outcome(outcome);
                for command in follow_ups.into_iter().rev() {
                    queue.push_front(command);
                }
            }
        }

        if let Some(patch) = self.processor.finish_event() {
            self.store.patch_state(&campaign, &player, &patch).await?;
        }
        Ok(())
    }

    /// Run one narration request to the end of its stream.
    async fn narrate(&mut self, request: &NarrationRequest, pending: &mut Pending) -> Result<()> {
        let chunks = match self.transport.open(request).await {
            Ok(chunks) => chunks,
            Err(e) => return self.fail(e, pending).await,
        };
        let mut items = pin!(demultiplex(chunks, self.transport.input_mode()));

        while let Some(item) = items.next().await {
            match item {
                Ok(StreamItem::Narrative(delta)) => {
                    self.processor.append_narrative(&delta);
                    self.sink.narrative(&delta);
                }
                Ok(StreamItem::Event(data)) => {
                    let commands = self.processor.apply_event(&data);
                    self.execute(commands, pending).await?;
                }
                Ok(StreamItem::Malformed { payload, error }) => {
                    warn!(error = %error, "Malformed data segment");
                    self.sink.malformed(&payload, &error);
                }
                Err(e) => return self.fail(e, pending).await,
            }
        }
        Ok(())
    }

    async fn fail(&mut self, error: TransportError, pending: &mut Pending) -> Result<()> {
        warn!(error = %error, "Narration failed, using fallback line");
        let commands = self.processor.transport_failed();
        self.execute(commands, pending).await?;
        Err(error.into())
    }
}
