//! Stream Demultiplexer.
//!
//! Splits the narration channel into narrative text deltas and structured
//! game events. Work happens in two phases:
//!
//! 1. **Token extraction**: [`EnvelopeScanner`] pulls `"text"` values out of
//!    the raw channel into the content buffer.
//! 2. **Segment extraction**: the front of the content buffer is classified
//!    as plain text, a narrative segment or a data segment.
//!
//! Both marker syntaxes, `<narrative>…</narrative>` / `<data>…</data>` and the
//! fenced ```` ```narrative ```` / ```` ```data ```` blocks, are accepted and
//! may be mixed within one stream.
//!
//! The parser is an explicit value driven chunk by chunk; nothing here blocks
//! or allocates per character beyond the content buffer.

use loreweave_core::GameData;
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::EnvelopeScanner;

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Which marker syntax opened the current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerSyntax {
    /// `<narrative>` / `<data>`.
    Angle,
    /// ```` ```narrative ```` / ```` ```data ````.
    Fenced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Narrative,
    Data,
}

#[derive(Clone, Copy)]
struct Opener {
    marker: &'static str,
    kind: SegmentKind,
    syntax: MarkerSyntax,
}

static OPENERS: [Opener; 4] = [
    Opener { marker: "<narrative>", kind: SegmentKind::Narrative, syntax: MarkerSyntax::Angle },
    Opener { marker: "<data>", kind: SegmentKind::Data, syntax: MarkerSyntax::Angle },
    Opener { marker: "```narrative", kind: SegmentKind::Narrative, syntax: MarkerSyntax::Fenced },
    Opener { marker: "```data", kind: SegmentKind::Data, syntax: MarkerSyntax::Fenced },
];

const FENCE: &str = "```";

fn close_marker(kind: SegmentKind, syntax: MarkerSyntax) -> &'static str {
    match (kind, syntax) {
        (SegmentKind::Narrative, MarkerSyntax::Angle) => "</narrative>",
        (SegmentKind::Data, MarkerSyntax::Angle) => "</data>",
        (_, MarkerSyntax::Fenced) => FENCE,
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of one of
/// `patterns`.
fn partial_suffix(text: &str, patterns: &[&str]) -> usize {
    let bytes = text.as_bytes();
    patterns
        .iter()
        .flat_map(|p| (1..p.len().min(bytes.len() + 1)).map(move |n| (p, n)))
        .filter(|(p, n)| bytes.ends_with(&p.as_bytes()[..*n]))
        .map(|(_, n)| n)
        .max()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One item produced by the demultiplexer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Narrative text to append to the current narrator message.
    Narrative(String),
    /// A parsed data segment.
    Event(GameData),
    /// A data segment that was not valid JSON. Informational only.
    Malformed {
        /// Payload after fence stripping.
        payload: String,
        /// Parser message.
        error: String,
    },
}

/// Parser position, exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Outside any segment.
    Seeking,
    /// Inside a narrative segment.
    InNarrative(MarkerSyntax),
    /// Inside a data segment.
    InData(MarkerSyntax),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Seeking,
    /// `emitted` bytes of the buffer were already sent as deltas.
    /// `lead_checked` is set once the newline after a fence was handled.
    InNarrative { syntax: MarkerSyntax, emitted: usize, lead_checked: bool },
    /// The close marker does not start before `searched`.
    InData { syntax: MarkerSyntax, searched: usize },
}

// ---------------------------------------------------------------------------
// Demultiplexer
// ---------------------------------------------------------------------------

/// Chunk-driven parser for one narration stream.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    envelope: EnvelopeScanner,
    buffer: String,
    state: State,
    events: usize,
}

impl Default for Demultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Demultiplexer {
    /// A parser at the start of a stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            envelope: EnvelopeScanner::new(),
            buffer: String::new(),
            state: State::Seeking,
            events: 0,
        }
    }

    /// Current parser position.
    #[must_use]
    pub fn state(&self) -> ParserState {
        match self.state {
            State::Seeking => ParserState::Seeking,
            State::InNarrative { syntax, .. } => ParserState::InNarrative(syntax),
            State::InData { syntax, .. } => ParserState::InData(syntax),
        }
    }

    /// Data segments emitted so far, valid or not.
    #[must_use]
    pub fn segments_emitted(&self) -> usize {
        self.events
    }

    /// Feed raw enveloped transport input.
    pub fn push_raw(&mut self, chunk: &str) -> Vec<StreamItem> {
        let mut content = String::new();
        self.envelope.push(chunk, &mut content);
        self.push_content(&content)
    }

    /// Feed already-extracted content.
    pub fn push_content(&mut self, content: &str) -> Vec<StreamItem> {
        let mut items = Vec::new();
        if content.is_empty() {
            return items;
        }
        self.buffer.push_str(content);
        while self.advance(&mut items) {}
        items
    }

    /// The stream ended. An unterminated data segment is reported as
    /// malformed; held-back narrative text is a partial close marker and is
    /// dropped.
    pub fn finish(&mut self) -> Vec<StreamItem> {
        let mut items = Vec::new();
        match self.state {
            State::InData { .. } => {
                let payload = strip_fences(&self.buffer).to_string();
                warn!(payload_len = payload.len(), "Stream ended inside a data segment");
                self.events += 1;
                items.push(StreamItem::Malformed {
                    payload,
                    error: "unterminated data segment".to_string(),
                });
            }
            State::InNarrative { emitted, .. } if emitted < self.buffer.len() => {
                debug!(held = &self.buffer[emitted..], "Stream ended inside a narrative segment");
            }
            _ => {}
        }
        self.buffer.clear();
        self.state = State::Seeking;
        items
    }

    /// Make one step of progress. Returns whether another step may succeed.
    fn advance(&mut self, items: &mut Vec<StreamItem>) -> bool {
        match self.state {
            State::Seeking => self.seek(),
            State::InNarrative { syntax, emitted, lead_checked } => {
                self.narrative(syntax, emitted, lead_checked, items)
            }
            State::InData { syntax, searched } => self.data(syntax, searched, items),
        }
    }

    fn seek(&mut self) -> bool {
        let earliest = OPENERS
            .iter()
            .filter_map(|o| self.buffer.find(o.marker).map(|at| (at, o)))
            .min_by_key(|(at, _)| *at);
        let Some((at, opener)) = earliest else {
            let keep = partial_suffix(&self.buffer, &OPENERS.map(|o| o.marker));
            let discard = self.buffer.len() - keep;
            self.buffer.drain(..discard);
            return false;
        };
        self.buffer.drain(..at + opener.marker.len());
        self.state = match opener.kind {
            SegmentKind::Narrative => State::InNarrative {
                syntax: opener.syntax,
                emitted: 0,
                lead_checked: opener.syntax == MarkerSyntax::Angle,
            },
            SegmentKind::Data => State::InData { syntax: opener.syntax, searched: 0 },
        };
        true
    }

    fn narrative(
        &mut self,
        syntax: MarkerSyntax,
        mut emitted: usize,
        lead_checked: bool,
        items: &mut Vec<StreamItem>,
    ) -> bool {
        if !lead_checked {
            let fence_newline = match self.buffer.as_bytes() {
                [] | [b'\r'] => None,
                [b'\n', ..] => Some(1),
                [b'\r', b'\n', ..] => Some(2),
                _ => Some(0),
            };
            let Some(strip) = fence_newline else {
                return false;
            };
            self.buffer.drain(..strip);
            self.state = State::InNarrative { syntax, emitted, lead_checked: true };
        }

        let close = close_marker(SegmentKind::Narrative, syntax);
        if let Some(offset) = self.buffer[emitted..].find(close) {
            let at = emitted + offset;
            let mut end = at;
            if syntax == MarkerSyntax::Fenced {
                end = trim_one_newline(&self.buffer[..at]).len().max(emitted);
            }
            if end > emitted {
                items.push(StreamItem::Narrative(self.buffer[emitted..end].to_string()));
            }
            self.buffer.drain(..at + close.len());
            self.state = State::Seeking;
            return true;
        }

        let held = match syntax {
            MarkerSyntax::Angle => partial_suffix(&self.buffer[emitted..], &[close]),
            MarkerSyntax::Fenced => {
                partial_suffix(&self.buffer[emitted..], &[FENCE, "\n```", "\r\n```"])
            }
        };
        let safe = self.buffer.len() - held;
        if safe > emitted {
            items.push(StreamItem::Narrative(self.buffer[emitted..safe].to_string()));
            emitted = safe;
        }
        self.state = State::InNarrative { syntax, emitted, lead_checked: true };
        false
    }

    fn data(&mut self, syntax: MarkerSyntax, searched: usize, items: &mut Vec<StreamItem>) -> bool {
        let close = close_marker(SegmentKind::Data, syntax);
        let Some(offset) = self.buffer[searched..].find(close) else {
            let mut next = self.buffer.len().saturating_sub(close.len() - 1);
            while !self.buffer.is_char_boundary(next) {
                next -= 1;
            }
            self.state = State::InData { syntax, searched: next.max(searched) };
            return false;
        };
        let at = searched + offset;
        let payload = strip_fences(&self.buffer[..at]).to_string();
        self.buffer.drain(..at + close.len());
        self.state = State::Seeking;
        self.events += 1;
        items.push(parse_payload(payload));
        true
    }
}

fn trim_one_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

/// Remove residual code fences (```` ```json ````, ```` ``` ````) around a
/// data payload.
#[must_use]
pub fn strip_fences(payload: &str) -> &str {
    let mut text = payload.trim();
    if let Some(rest) = text.strip_prefix(FENCE) {
        text = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

fn parse_payload(payload: String) -> StreamItem {
    match serde_json::from_str::<Value>(&payload) {
        Ok(value) => StreamItem::Event(GameData::from_value(value)),
        Err(e) => {
            warn!(error = %e, payload_len = payload.len(), "Skipping malformed data segment");
            StreamItem::Malformed { payload, error: e.to_string() }
        }
    }
}

/// Concatenated narrative text of `items`.
#[must_use]
pub fn narrative_text(items: &[StreamItem]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            StreamItem::Narrative(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
