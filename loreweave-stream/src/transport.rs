//! Narration transport port and the stream pipeline on top of it.
//!
//! A transport turns one [`NarrationRequest`] into a chunked text channel.
//! [`demultiplex`] drives a [`Demultiplexer`] over that channel and yields
//! narrative deltas and game events lazily, in stream order. A channel error
//! is yielded once and ends the stream.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use loreweave_core::narration::NarrationRequest;

use crate::demux::{Demultiplexer, StreamItem};
use crate::error::{Result, TransportError};

/// A chunked response channel.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What a transport's chunks contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Raw channel with `"text"` token envelopes.
    #[default]
    Enveloped,
    /// Content already extracted from the envelope.
    Content,
}

/// One-shot narration request producing a chunked channel.
#[async_trait]
pub trait NarrationTransport: Send + Sync {
    /// Send `request` and return the response channel.
    async fn open(&self, request: &NarrationRequest) -> Result<ChunkStream>;

    /// Format of the chunks [`Self::open`] yields.
    fn input_mode(&self) -> InputMode {
        InputMode::Enveloped
    }
}

struct Pipeline<S> {
    chunks: S,
    demux: Demultiplexer,
    mode: InputMode,
    pending: VecDeque<StreamItem>,
    done: bool,
}

/// Demultiplex a chunk channel into stream items.
pub fn demultiplex<S>(chunks: S, mode: InputMode) -> impl Stream<Item = Result<StreamItem>>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let pipeline = Pipeline {
        chunks,
        demux: Demultiplexer::new(),
        mode,
        pending: VecDeque::new(),
        done: false,
    };
    stream::unfold(pipeline, |mut p| async move {
        loop {
            if let Some(item) = p.pending.pop_front() {
                return Some((Ok(item), p));
            }
            if p.done {
                return None;
            }
            match p.chunks.next().await {
                Some(Ok(chunk)) => {
                    let items = match p.mode {
                        InputMode::Enveloped => p.demux.push_raw(&chunk),
                        InputMode::Content => p.demux.push_content(&chunk),
                    };
                    p.pending.extend(items);
                }
                Some(Err(e)) => {
                    p.done = true;
                    return Some((Err::<StreamItem, TransportError>(e), p));
                }
                None => {
                    p.done = true;
                    let items = p.demux.finish();
                    p.pending.extend(items);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(chunks: Vec<Result<String>>) -> ChunkStream {
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn yields_items_in_order() {
        let chunks = channel(vec![
            Ok("<narrative>Hi".into()),
            Ok(" there</narrative><data>{\"hp\":3}</data>".into()),
        ]);
        let items: Vec<_> = demultiplex(chunks, InputMode::Content).collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], Ok(StreamItem::Narrative(t)) if t == "Hi"));
        assert!(matches!(&items[2], Ok(StreamItem::Event(_))));
    }

    #[tokio::test]
    async fn error_is_terminal_and_reported_once() {
        let chunks = channel(vec![
            Ok("<narrative>Hi".into()),
            Err(TransportError::StreamAborted("reset".into())),
            Ok("never read</narrative>".into()),
        ]);
        let items: Vec<_> = demultiplex(chunks, InputMode::Content).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(TransportError::StreamAborted(_))));
    }
}
