//! Scripted chat model for tests.

use super::{ChatModel, ChatRequest, DeltaStream, ModelDelta};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned replies in order and records every request it sees.
pub(crate) struct ScriptedModel {
    turns: Mutex<VecDeque<Vec<ModelDelta>>>,
    requests: Mutex<Vec<ChatRequest>>,
    fallback: Option<String>,
}

impl ScriptedModel {
    pub(crate) fn new(turns: Vec<Vec<ModelDelta>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// A model that answers every request with the same text.
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            fallback: Some(answer.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: ChatRequest) -> Result<Vec<ModelDelta>> {
        self.requests.lock().unwrap().push(request);
        match self.turns.lock().unwrap().pop_front() {
            Some(turn) => Ok(turn),
            None => self
                .fallback
                .as_deref()
                .map(text)
                .ok_or_else(|| DocentError::Model("script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        Ok(self
            .next_turn(request)?
            .into_iter()
            .filter_map(|delta| match delta {
                ModelDelta::Content(text) => Some(text),
                ModelDelta::ToolCall { .. } => None,
            })
            .collect())
    }

    async fn stream(&self, request: ChatRequest) -> Result<DeltaStream> {
        let turn = self.next_turn(request)?;
        Ok(futures::stream::iter(turn.into_iter().map(Ok)).boxed())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// A text reply streamed in word-sized pieces.
pub(crate) fn text(answer: &str) -> Vec<ModelDelta> {
    answer
        .split_inclusive(' ')
        .map(|piece| ModelDelta::Content(piece.to_string()))
        .collect()
}

/// A single tool call whose arguments arrive in two fragments.
pub(crate) fn tool_call(id: &str, name: &str, arguments: &str) -> Vec<ModelDelta> {
    let mid = arguments
        .char_indices()
        .map(|(i, _)| i)
        .nth(arguments.chars().count() / 2)
        .unwrap_or(0);
    vec![
        ModelDelta::ToolCall {
            index: 0,
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            arguments: Some(arguments[..mid].to_string()),
        },
        ModelDelta::ToolCall {
            index: 0,
            id: None,
            name: None,
            arguments: Some(arguments[mid..].to_string()),
        },
    ]
}
