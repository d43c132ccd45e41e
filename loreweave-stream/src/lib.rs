//! # loreweave-stream: Narration Stream Layer
//!
//! Turns the narration service's chunked response into narrative text deltas
//! and structured game events:
//!   - **envelope**: resumable extraction of `"text"` token values
//!   - **demux**: segment classification over the extracted content
//!   - **transport**: the narration port and the lazy item pipeline
//!   - **client**: the HTTP transport
//!
//! Malformed data segments never fail the stream; only a transport error
//! ends it early.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod demux;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::HttpNarrationTransport;
pub use demux::{Demultiplexer, ParserState, StreamItem};
pub use error::TransportError;
pub use transport::{ChunkStream, InputMode, NarrationTransport, demultiplex};
