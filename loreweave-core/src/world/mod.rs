//! World Knowledge Propagator.
//!
//! Locations form an undirected graph. Rumors spread outward from their
//! origin one hop per world tick; NPC knowledge about other NPCs is derived
//! from shared location, shared faction, perceivable death rumors and
//! adjacency, in that order.

pub mod graph;
pub mod knowledge;
pub mod rumor;

pub use graph::{LocationGraph, LocationNode, ReachableSet};
pub use knowledge::{
    HeardRumor, Knowledge, KnowledgeReason, LocationContext, NpcRecord, location_context,
    npc_knowledge,
};
pub use rumor::{Rumor, RumorKind, tick_rumors};
