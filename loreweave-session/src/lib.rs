//! # loreweave-session: Session Driver
//!
//! Runs a [`loreweave_core::NarrativeProcessor`] against real ports:
//!   - **store**: persistent state and the transactional world operations
//!   - **presentation**: where narrative and UI updates go
//!   - **driver**: [`GameSession`], the loop tying both to a narration transport
//!   - **config** / **telemetry**: TOML settings and tracing setup
//!
//! ```no_run
//! # async fn run() -> loreweave_session::Result<()> {
//! use loreweave_session::{GameSession, InMemoryStore, RecordingSink, SessionConfig};
//!
//! let config = SessionConfig::from_toml("")?;
//! loreweave_session::telemetry::init(&config.logging)?;
//! let transport = config.narration.transport();
//! let mut session = GameSession::start(
//!     config.engine,
//!     &"campaign".into(),
//!     &"player".into(),
//!     transport,
//!     InMemoryStore::new(),
//!     RecordingSink::new(),
//! )
//! .await?;
//! session.submit_action("Look around").await?;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod driver;
pub mod error;
pub mod presentation;
pub mod store;
pub mod telemetry;

pub use config::SessionConfig;
pub use driver::{AbilityOutcome, GameSession};
pub use error::{Result, SessionError, StoreError};
pub use presentation::{PresentationSink, Presented, RecordingSink};
pub use store::{CrimeReport, InMemoryStore, QuestProgress, StateStore, TravelVerdict};
