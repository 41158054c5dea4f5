//! services/api/src/adapters/lesson_llm.rs
//!
//! This module contains the adapter for the lesson-planning LLM.
//! It implements the `LessonPlanService` port from the core crate.

use crate::adapters::openai_errors::port_error;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use enablement_core::ports::{LessonPlanService, PortError, PortResult};
use enablement_core::GenerationOptions;

const DEFAULT_MAX_LESSONS: usize = 5;

const SYSTEM_PROMPT: &str = "You are an instructional designer for sales enablement teams. \
Turn the provided domain knowledge into a training module. Respond with a single JSON object \
and nothing else, using this shape: {\"title\": string, \"description\": string, \
\"difficulty\": \"beginner\" | \"intermediate\" | \"advanced\", \"objectives\": [string], \
\"keyTakeaways\": [string], \"lessons\": [{\"title\": string, \"content\": string, \
\"type\": \"theory\" | \"practical\" | \"assessment\", \"durationHint\": string}]}. \
Lesson content is narrated aloud, so write it as plain spoken prose.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LessonPlanService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiLessonPlanAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLessonPlanAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn user_prompt(domain_text: &str, options: &GenerationOptions) -> String {
    let max_lessons = options.max_lessons.unwrap_or(DEFAULT_MAX_LESSONS).max(1);
    format!(
        "Create at most {} lessons from the following domain knowledge.\n\nDOMAIN KNOWLEDGE:\n{}",
        max_lessons, domain_text
    )
}

//=========================================================================================
// `LessonPlanService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LessonPlanService for OpenAiLessonPlanAdapter {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate_lesson_plan(
        &self,
        domain_text: &str,
        options: &GenerationOptions,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt(domain_text, options))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(port_error)?;

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Lesson planning LLM returned no text content.".to_string())
            })
    }
}
