use advisor_host::{ConversationMessage, DeltaStream, SourceError, StreamDelta, TokenSource};
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the model "says" on one turn.
pub enum ScriptedTurn {
    /// Deltas in order; the last one carries the final marker.
    Chunks(Vec<String>),
    /// Deltas followed by a stream that ends without a final marker.
    Unterminated(Vec<String>),
    /// Deltas followed by a stream that never yields again.
    Hang(Vec<String>),
    /// Deltas followed by a mid-stream failure.
    FailAfter(Vec<String>, SourceError),
    /// The request itself fails.
    OpenError(SourceError),
}

impl ScriptedTurn {
    pub fn chunks(parts: &[&str]) -> Self {
        ScriptedTurn::Chunks(parts.iter().map(|p| p.to_string()).collect())
    }

    pub fn whole(text: &str) -> Self {
        ScriptedTurn::Chunks(vec![text.to_string()])
    }
}

/// Plays back scripted turns and records the history it was shown each time.
pub struct ScriptedTokenSource {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    seen: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedTokenSource {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// History snapshots, one per opened turn.
    pub fn seen(&self) -> Vec<Vec<ConversationMessage>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

fn deltas(parts: Vec<String>, final_marker: bool) -> Vec<Result<StreamDelta, SourceError>> {
    let count = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            Ok(StreamDelta {
                text,
                is_final: final_marker && i + 1 == count,
            })
        })
        .collect()
}

#[async_trait]
impl TokenSource for ScriptedTokenSource {
    async fn open(
        &self,
        _system_prompt: &str,
        history: &[ConversationMessage],
    ) -> Result<DeltaStream, SourceError> {
        self.seen.lock().unwrap().push(history.to_vec());
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SourceError::Unreachable("script exhausted".to_string()))?;

        let stream: DeltaStream = match turn {
            ScriptedTurn::Chunks(parts) => Box::pin(stream::iter(deltas(parts, true))),
            ScriptedTurn::Unterminated(parts) => Box::pin(stream::iter(deltas(parts, false))),
            ScriptedTurn::Hang(parts) => {
                Box::pin(stream::iter(deltas(parts, false)).chain(stream::pending()))
            }
            ScriptedTurn::FailAfter(parts, error) => Box::pin(
                stream::iter(deltas(parts, false)).chain(stream::iter(vec![Err(error)])),
            ),
            ScriptedTurn::OpenError(error) => return Err(error),
        };
        Ok(stream)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
