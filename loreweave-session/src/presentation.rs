//! Presentation port.
//!
//! The driver forwards narrative deltas as they arrive and every
//! [`UiEvent`] the processor emits. Rendering is entirely up to the sink.

use loreweave_core::processor::UiEvent;

/// Receives what the player should see.
pub trait PresentationSink: Send {
    /// A narrative text delta, in stream order.
    fn narrative(&mut self, delta: &str);

    /// A state-driven presentation update.
    fn ui(&mut self, event: &UiEvent);

    /// A data segment that failed to parse. Ignored by default.
    fn malformed(&mut self, payload: &str, error: &str) {
        let _ = (payload, error);
    }
}

/// Something a [`RecordingSink`] received.
#[derive(Debug, Clone, PartialEq)]
pub enum Presented {
    /// Narrative delta.
    Narrative(String),
    /// UI event.
    Ui(UiEvent),
    /// Malformed data segment.
    Malformed {
        /// Raw segment body.
        payload: String,
        /// Parse error.
        error: String,
    },
}

/// Sink that keeps everything it is given, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Received items.
    pub items: Vec<Presented>,
}

impl RecordingSink {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated narrative deltas.
    #[must_use]
    pub fn narrative_text(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                Presented::Narrative(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// UI events only.
    pub fn ui_events(&self) -> impl Iterator<Item = &UiEvent> {
        self.items.iter().filter_map(|item| match item {
            Presented::Ui(event) => Some(event),
            _ => None,
        })
    }
}

impl PresentationSink for RecordingSink {
    fn narrative(&mut self, delta: &str) {
        self.items.push(Presented::Narrative(delta.to_string()));
    }

    fn ui(&mut self, event: &UiEvent) {
        self.items.push(Presented::Ui(event.clone()));
    }

    fn malformed(&mut self, payload: &str, error: &str) {
        self.items.push(Presented::Malformed {
            payload: payload.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweave_core::types::GameContext;

    #[test]
    fn recorder_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.narrative("The door ");
        sink.ui(&UiEvent::ContextChanged(GameContext::Combat));
        sink.narrative("opens.");
        assert_eq!(sink.narrative_text(), "The door opens.");
        assert_eq!(sink.ui_events().count(), 1);
        assert!(matches!(sink.items[1], Presented::Ui(UiEvent::ContextChanged(GameContext::Combat))));
    }
}
