//! Reduction of a fragment stream to the final answer text.
//!
//! Two states: draining reasoning (initial) and answering. Reasoning
//! fragments are dropped in either state; non-empty answer fragments move to
//! answering and are appended in arrival order.

use crate::models::{Result, StreamFragment};
use futures::{Stream, StreamExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccumulatorState {
    #[default]
    DrainingReasoning,
    Answering,
}

/// Left-to-right fold over the fragments of one completion call.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    state: AccumulatorState,
    buffer: String,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn push(&mut self, fragment: StreamFragment) {
        match fragment {
            StreamFragment::Reasoning(_) => {}
            StreamFragment::Answer(text) if text.is_empty() => {}
            StreamFragment::Answer(text) => {
                self.state = AccumulatorState::Answering;
                self.buffer.push_str(&text);
            }
        }
    }

    /// Final answer; empty when no answer fragment arrived.
    pub fn finish(self) -> String {
        self.buffer
    }

    /// Drain a stream to completion. The first stream error is returned and
    /// the partial answer discarded.
    pub async fn drain<S>(mut stream: S) -> Result<String>
    where
        S: Stream<Item = Result<StreamFragment>> + Unpin,
    {
        let mut accumulator = Self::new();
        while let Some(fragment) = stream.next().await {
            accumulator.push(fragment?);
        }
        Ok(accumulator.finish())
    }
}

impl FromIterator<StreamFragment> for ResponseAccumulator {
    fn from_iter<I: IntoIterator<Item = StreamFragment>>(iter: I) -> Self {
        let mut accumulator = Self::new();
        for fragment in iter {
            accumulator.push(fragment);
        }
        accumulator
    }
}
