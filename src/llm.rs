//! OpenAI-compatible chat completion client.
//!
//! Process nodes issue one completion per execution. The client speaks
//! the `{model, messages, temperature}` wire shape, so it works with
//! OpenAI and compatible providers behind a configurable base URL.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{NodeflowError, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// A single completion: the assistant text plus the raw response body.
pub struct Completion {
    pub content: String,
    pub raw: Value,
}

pub struct LlmClient {
    http: Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Issues one chat completion and returns the first choice.
    pub async fn complete(
        &self,
        api_key: &str,
        model: &str,
        system_prompt: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
        };

        let response = self.http.post(&url).bearer_auth(api_key).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeflowError::Llm(format!("LLM request failed ({}): {}", status, body)));
        }

        let raw: Value = response.json().await?;
        let content = raw["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| NodeflowError::Llm("LLM response contains no completion text".to_string()))?
            .to_string();

        Ok(Completion {
            content,
            raw,
        })
    }
}
