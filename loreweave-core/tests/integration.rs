//! Integration Tests: end-to-end reducer flows.
//!
//! These drive a [`NarrativeProcessor`] the way a session does: user actions,
//! streamed narrative, structured events, and store outcomes fed back in.

use loreweave_core::config::EngineConfig;
use loreweave_core::processor::{QuestRecord, QuestStatus, RegionRecord, StatePatch, UiEvent};
use loreweave_core::types::{
    ChatRole, GameContext, LocationId, NpcId, PlayerProfile, PlayerSessionState,
};
use loreweave_core::world::{KnowledgeReason, LocationNode, NpcRecord, Rumor, tick_rumors};
use loreweave_core::{Command, CommandOutcome, GameData, NarrativeProcessor, SessionContext};
use serde_json::json;

fn node(id: &str, name: &str, next: &[&str]) -> LocationNode {
    LocationNode {
        id: id.into(),
        name: name.into(),
        neighbors: next.iter().map(|n| LocationId::from(*n)).collect(),
    }
}

fn npc(id: &str, name: &str, location: &str) -> NpcRecord {
    NpcRecord {
        id: id.into(),
        name: name.into(),
        role: "villager".into(),
        location_id: Some(location.into()),
        faction_id: None,
        essential: false,
        dead: false,
        health: 100,
    }
}

/// Harbor - Market - Temple - Crypt, a simple chain.
fn campaign() -> SessionContext {
    SessionContext {
        campaign_id: "c1".into(),
        player_id: "p1".into(),
        profile: PlayerProfile {
            name: "Tamsin".into(),
            class: "Rogue".into(),
            ..PlayerProfile::default()
        },
        locations: vec![
            node("harbor", "Harbor", &["market"]),
            node("market", "Market", &["temple"]),
            node("temple", "Temple", &["crypt"]),
            node("crypt", "Crypt", &[]),
        ],
        npcs: vec![
            npc("fisher", "Old Fisher", "harbor"),
            npc("merchant", "Merchant Lio", "market"),
            npc("priest", "Priest Anselm", "temple"),
            npc("keeper", "Crypt Keeper", "crypt"),
        ],
        quests: vec![QuestRecord {
            id: "q-bell".into(),
            title: "Ring the Bell".into(),
            status: QuestStatus::Active,
        }],
        regions: vec![RegionRecord {
            id: "coast".into(),
            name: "Coast".into(),
            location_ids: vec!["harbor".into(), "market".into()],
        }],
        abilities: Vec::new(),
        bounty_enabled: true,
    }
}

fn start() -> NarrativeProcessor {
    let mut state = PlayerSessionState::new(&EngineConfig::default().player, 100);
    state.current_location_id = Some("harbor".into());
    NarrativeProcessor::new(EngineConfig::default(), campaign(), Some(state))
}

/// Apply an event and close its batch, the way the driver does once the
/// event's commands are drained.
fn apply(p: &mut NarrativeProcessor, value: serde_json::Value) -> Vec<Command> {
    let mut commands = p.apply_event(&GameData::from_value(value));
    commands.extend(p.finish_event().map(Command::Persist));
    commands
}

fn patches(commands: &[Command]) -> Vec<StatePatch> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Persist(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scalar overwrites
// ---------------------------------------------------------------------------

#[test]
fn repeated_hp_overwrite_persists_once() {
    let mut p = start();
    let first = apply(&mut p, json!({"hp": 5}));
    let second = apply(&mut p, json!({"hp": 5}));
    assert_eq!(patches(&first).len(), 1);
    assert!(patches(&second).is_empty());
    assert_eq!(p.state().hp, 5);
}

#[test]
fn persisted_patches_replay_onto_stored_state() {
    let mut p = start();
    let mut stored = p.state().clone();
    let mut commands = apply(&mut p, json!({"hp": 40, "gold": 12, "xpGained": 130}));
    commands.extend(apply(&mut p, json!({"currentLocation": "Market", "context": "social"})));
    for patch in patches(&commands) {
        patch.apply_to(&mut stored);
    }
    assert_eq!(&stored, p.state());
    assert_eq!(stored.level, 2);
    assert_eq!(stored.context, GameContext::Social);
}

// ---------------------------------------------------------------------------
// Xp and leveling
// ---------------------------------------------------------------------------

#[test]
fn large_xp_grant_crosses_two_levels() {
    let mut p = start();
    let commands = apply(&mut p, json!({"xpGained": 250}));
    assert_eq!(p.state().level, 3);
    assert_eq!(p.state().xp, 0);
    assert_eq!(p.state().xp_to_level, 225);
    let levels: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Ui(UiEvent::LevelUp { level }) => Some(*level),
            _ => None,
        })
        .collect();
    assert_eq!(levels, vec![2, 3]);
}

// ---------------------------------------------------------------------------
// A full turn: action, streamed narrative, data segment
// ---------------------------------------------------------------------------

#[test]
fn action_then_narrative_then_choices() {
    let mut p = start();
    let commands = p.submit_action("I look for the ferryman");
    assert!(commands.iter().any(|c| matches!(c, Command::Narrate(_))));

    p.append_narrative("The docks are ");
    p.append_narrative("quiet tonight.");
    apply(&mut p, json!({"choices": ["Wait", "Leave"], "context": "explore"}));

    let messages = p.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatRole::User);
    assert_eq!(messages[1].content, "The docks are quiet tonight.");
    assert_eq!(messages[1].choices, vec!["Wait".to_string(), "Leave".to_string()]);
}

#[test]
fn combat_to_victory_returns_to_exploration() {
    let mut p = start();
    apply(&mut p, json!({"gameEvent": {"type": "combat", "combat": {"enemyName": "Smuggler", "enemyHP": 8}}}));
    assert_eq!(p.state().context, GameContext::Combat);

    let ended = apply(&mut p, json!({"gameEvent": {"type": "combatEnded", "combatEnded": {"enemyHP": 0, "victory": true}}}));
    assert!(ended.iter().any(|c| matches!(c, Command::ScheduleCombatClear { .. })));
    assert_eq!(p.state().combat.as_ref().map(|c| c.enemy_hp), Some(0));

    p.clear_combat();
    assert!(p.state().combat.is_none());
    assert_eq!(p.state().context, GameContext::Explore);
}

// ---------------------------------------------------------------------------
// Crime and bounty
// ---------------------------------------------------------------------------

#[test]
fn crime_charges_region_of_current_location_and_starts_rumor() {
    let mut p = start();
    let commands = apply(&mut p, json!({"gameEvent": {"type": "crime", "crimeType": "theft", "description": "Stealing Fish"}}));
    let mut saw_bounty = false;
    let mut rumor = None;
    for command in &commands {
        match command {
            Command::AddBounty { region_id, crime_type, .. } => {
                saw_bounty = true;
                assert_eq!(region_id.as_str(), "coast");
                assert_eq!(crime_type, "theft");
            }
            Command::CreateRumor(r) => rumor = Some(r.clone()),
            _ => {}
        }
    }
    assert!(saw_bounty);
    let rumor = rumor.expect("crime rumor");
    assert_eq!(rumor.content, "A criminal was spotted stealing fish near the area.");
    assert_eq!(rumor.max_spread_radius, 2);

    p.apply_outcome(CommandOutcome::BountyAdded { total: 25 });
    assert_eq!(p.state().bounty, 25);
}

// ---------------------------------------------------------------------------
// Death, rumors and knowledge
// ---------------------------------------------------------------------------

#[test]
fn death_rumor_spreads_one_hop_per_tick() {
    let mut p = start();
    let commands = apply(&mut p, json!({"gameEvent": {"type": "npcDeath", "npcDeath": {"npcName": "Old Fisher"}}}));
    let mut rumors: Vec<Rumor> = commands
        .iter()
        .filter_map(|c| match c {
            Command::CreateRumor(r) => Some(r.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(rumors.len(), 1);
    assert_eq!(rumors[0].content, "Old Fisher the villager was killed by an adventurer.");

    let merchant = NpcId::from("merchant");
    let priest = NpcId::from("priest");
    let fisher = NpcId::from("fisher");

    // Merchant is adjacent, so knows vaguely before the rumor arrives.
    let knowledge = p.knowledge_about(&merchant, &fisher, &rumors).expect("known npcs");
    assert_eq!(knowledge.reason, KnowledgeReason::AdjacentLocation);

    let priest_before = p.knowledge_about(&priest, &fisher, &rumors).expect("known npcs");
    assert_eq!(priest_before.reason, KnowledgeReason::Unknown);

    assert_eq!(tick_rumors(&mut rumors), 1);
    let merchant_after = p.knowledge_about(&merchant, &fisher, &rumors).expect("known npcs");
    assert_eq!(merchant_after.reason, KnowledgeReason::Rumor);
    assert!(merchant_after.subject_dead);

    tick_rumors(&mut rumors);
    let priest_after = p.knowledge_about(&priest, &fisher, &rumors).expect("known npcs");
    assert_eq!(priest_after.reason, KnowledgeReason::Rumor);
    assert!(priest_after.rumor_content.is_some());

    let context = p.location_context(&"temple".into(), &rumors);
    assert_eq!(context.rumors.len(), 1);
    assert!(context.rumors[0].recent);
    assert_eq!(context.npcs_here, vec!["Priest Anselm".to_string()]);
}

#[test]
fn rumor_stops_at_max_radius() {
    let mut p = start();
    let commands = apply(&mut p, json!({"gameEvent": {"type": "npcDeath", "npcName": "Old Fisher"}}));
    let mut rumors: Vec<Rumor> = commands
        .into_iter()
        .filter_map(|c| match c {
            Command::CreateRumor(r) => Some(r),
            _ => None,
        })
        .collect();
    for _ in 0..10 {
        tick_rumors(&mut rumors);
    }
    assert_eq!(rumors[0].spread_radius, 4);
    assert!(!rumors[0].active);
    assert_eq!(tick_rumors(&mut rumors), 0);
}

// ---------------------------------------------------------------------------
// Quests and travel
// ---------------------------------------------------------------------------

#[test]
fn quest_complete_rejected_by_store_grants_nothing() {
    let mut p = start();
    let commands = apply(&mut p, json!({"gameEvent": {"type": "questComplete", "questTitle": "ring the bell"}}));
    let quest_id = commands
        .iter()
        .find_map(|c| match c {
            Command::CompleteQuest { quest_id, .. } => Some(quest_id.clone()),
            _ => None,
        })
        .expect("complete command");
    let outcome = p.apply_outcome(CommandOutcome::QuestRejected { quest_id });
    assert!(outcome.is_empty());
    assert_eq!(p.state().xp, 0);
    assert!(p.next_reward().is_none());
}

#[test]
fn travel_then_arrival_narration() {
    let mut p = start();
    let travel = p.request_travel(&"market".into());
    assert_eq!(
        travel,
        vec![Command::Travel { from: Some("harbor".into()), to: "market".into() }]
    );
    let commands = p.apply_outcome(CommandOutcome::Travelled { to: "market".into() });
    let request = commands
        .iter()
        .find_map(|c| match c {
            Command::Narrate(r) => Some(r.clone()),
            _ => None,
        })
        .expect("arrival narration");
    assert_eq!(request.current_location_id, Some("market".into()));
    assert!(request.prompt.contains("Market"));
    assert!(p.messages().is_empty());
    assert!(patches(&commands).is_empty());
    let patch = p.finish_event().expect("location patch");
    assert_eq!(patch.current_location_id, Some("market".into()));
}
