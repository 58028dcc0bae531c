//! RAG response generation.

use super::{context::format_context_for_prompt, ContextBuilder, ContextChunk};
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::vector_store::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// RAG engine for question answering.
pub struct RagEngine {
    model: Arc<dyn ChatModel>,
    context_builder: ContextBuilder,
    prompts: Prompts,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        similarity_top_k: usize,
    ) -> Self {
        let context_builder =
            ContextBuilder::new(vector_store, embedder).with_max_chunks(similarity_top_k);

        Self {
            model,
            context_builder,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Drop retrieved chunks scoring below this threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.context_builder = self.context_builder.with_min_score(min_score);
        self
    }

    /// Ask a single question and get a response.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, question: &str) -> Result<RagResponse> {
        info!("Processing question: {}", question);

        let context_chunks = self.context_builder.build(question).await?;

        if context_chunks.is_empty() {
            return Ok(RagResponse {
                answer: self.prompts.rag.no_context.clone(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert(
            "context".to_string(),
            format_context_for_prompt(&context_chunks),
        );

        let user_prompt = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);
        let system_prompt = self
            .prompts
            .render_with_custom(&self.prompts.rag.system, &HashMap::new());

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ]);

        let answer = self.model.complete(request).await?;

        debug!("Generated response with {} sources", context_chunks.len());

        Ok(RagResponse {
            answer,
            sources: context_chunks,
        })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Source chunks used for the answer.
    pub sources: Vec<ContextChunk>,
}
