// Fluent LLM request builder with automatic retry on parse failures
//
// Usage:
// ```rust
// let topics: Vec<SuggestedTopic> = LlmRequest::new(ai)
//     .system("You plan editorial calendars")
//     .user(&prompt)
//     .output()
//     .await?;
// ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fmt::Write;

use super::providers::BaseAi;

/// Builder for LLM requests with automatic JSON parsing and retry
pub struct LlmRequest<'a> {
    ai: &'a dyn BaseAi,
    system_prompt: Option<String>,
    user_message: Option<String>,
    max_retries: u32,
    /// Optional schema hint to include in retry prompts
    schema_hint: Option<String>,
}

impl<'a> LlmRequest<'a> {
    pub fn new(ai: &'a dyn BaseAi) -> Self {
        Self {
            ai,
            system_prompt: None,
            user_message: None,
            max_retries: 3,
            schema_hint: None,
        }
    }

    /// Set the system prompt (instructions for the AI)
    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the user message (the actual content/question)
    pub fn user(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    /// Set maximum retry attempts (default: 3)
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Provide a schema hint for retry error messages
    /// This helps the AI understand the expected structure
    pub fn schema_hint(mut self, hint: impl Into<String>) -> Self {
        self.schema_hint = Some(hint.into());
        self
    }

    /// Execute the request and parse the response as JSON
    ///
    /// Automatically retries on parse failures, including the error message
    /// in subsequent attempts to help the AI fix its output.
    pub async fn output<T: DeserializeOwned>(self) -> Result<T> {
        let system = self.system_prompt.clone().unwrap_or_default();
        let user = self
            .user_message
            .clone()
            .ok_or_else(|| anyhow::anyhow!("User message is required"))?;

        let mut last_response = String::new();
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            let message = if attempt == 1 {
                self.build_initial_message(&user)
            } else {
                self.build_retry_message(&last_response, &last_error)
            };

            tracing::debug!(attempt, message_length = message.len(), "LLM request attempt");

            let response = self
                .ai
                .complete(&system, &message)
                .await
                .context("LLM API call failed")?;

            // Models routinely fence their JSON despite instructions
            let stripped = strip_code_fences(&response).to_string();
            last_response = response;

            match serde_json::from_str::<T>(stripped.trim()) {
                Ok(parsed) => {
                    tracing::debug!(attempt, "Parsed LLM response");
                    return Ok(parsed);
                }
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        attempt,
                        error = %e,
                        response_preview = %last_response.chars().take(200).collect::<String>(),
                        "Failed to parse LLM response as JSON"
                    );

                    if attempt == self.max_retries {
                        return Err(anyhow::anyhow!(
                            "Failed to get valid JSON after {} attempts. Last error: {}",
                            self.max_retries,
                            e
                        ));
                    }
                }
            }
        }

        unreachable!()
    }

    fn build_initial_message(&self, user: &str) -> String {
        let mut message = String::new();
        let _ = writeln!(message, "{}", user);
        let _ = writeln!(
            message,
            r#"

CRITICAL: Your response will be parsed directly by a JSON parser.

DO NOT include:
- Markdown code fences (```)
- The word "json" before the data
- Any text before the opening [ or {{
- Any text after the closing ] or }}
- Explanations or commentary

DO:
- Start your response with [ or {{ immediately
- End your response with ] or }} immediately
- Return syntactically valid JSON only"#
        );
        message
    }

    fn build_retry_message(&self, last_response: &str, error: &str) -> String {
        let response_preview: String = last_response.chars().take(500).collect();

        let mut message = format!(
            r#"JSON PARSE FAILED. Your previous response could not be parsed.

ERROR: {error}

Your response was:
{response_preview}

This failed because your response is not valid JSON.
"#
        );

        if let Some(hint) = &self.schema_hint {
            let _ = writeln!(message, "\nEXPECTED FORMAT:\n{}", hint);
        }

        let _ = writeln!(
            message,
            r#"
RESPOND WITH RAW JSON ONLY:
- First character must be [ or {{
- Last character must be ] or }}
- No ``` markdown fences
- No "json" prefix
- No explanation text
- Properly escape special characters in strings
- Use null for missing values, not undefined"#
        );

        message
    }
}

/// Strip a single surrounding markdown fence (```json ... ```), if present.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}
