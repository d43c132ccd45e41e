//! # loreweave Core Library
//!
//! Game-state engine for campaigns narrated by a generative text service.
//!
//! The crate is pure: it performs no I/O. A session owns one
//! [`NarrativeProcessor`], feeds it user actions and structured game events,
//! and executes the [`Command`]s it returns against an external store.
//!
//! - **Resolution**: dice, skill checks, attacks, saving throws, chargen
//! - **World**: location graph reachability, rumors, NPC knowledge
//! - **Progression**: the xp / level-up loop
//! - **Abilities**: energy and cooldown bookkeeping
//! - **Bounty**: crime pricing and jail time
//! - **Processor**: the authoritative reducer over session state
//!
//! ## Determinism
//!
//! Every randomized operation takes a caller-supplied [`rand::Rng`], so a
//! session driven with a seeded generator replays identically.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod abilities;
pub mod bounty;
pub mod config;
pub mod error;
pub mod event;
pub mod narration;
pub mod processor;
pub mod progression;
pub mod resolution;
pub mod types;
pub mod world;

pub use config::EngineConfig;
pub use error::CoreError;
pub use event::{GameData, GameEvent};
pub use processor::{Command, CommandOutcome, NarrativeProcessor, SessionContext};
pub use types::*;
