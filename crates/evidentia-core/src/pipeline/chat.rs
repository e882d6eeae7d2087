//! OpenAI-compatible chat completion narratives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::narrator::{NarrativeProvider, NarrativeRequest};
use crate::error::NarrativeError;

const SYSTEM_PROMPT: &str = "You write accreditation compliance narratives. \
Use only the evidence items provided. Refer to evidence exclusively with its \
bracketed marker, for example [1]; never write document titles, dates or page \
numbers yourself. Cite every item marked STRONG. Do not mention any standard \
other than the one you are writing about. If the evidence does not support a \
claim, do not make it.";

#[derive(Debug, Clone)]
pub struct ChatCompletionNarrator {
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    http_client: reqwest::Client,
}

impl ChatCompletionNarrator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.2,
            max_tokens: 1200,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn user_prompt(request: &NarrativeRequest) -> String {
        let standard = &request.standard;
        let mut prompt = format!("Standard {}\n", standard.label());
        if !standard.description.is_empty() {
            prompt.push_str(&format!("Requirement: {}\n", standard.description));
        }
        prompt.push_str("\nEvidence:\n");
        for item in &request.evidence {
            prompt.push_str(&format!(
                "{} {}{} ({})\n{}\n\n",
                item.citation.marker_label(),
                item.title,
                if item.strong { " STRONG" } else { "" },
                item.evidence_type,
                item.excerpt
            ));
        }
        prompt.push_str("Write the compliance narrative for this standard.");
        prompt
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl NarrativeProvider for ChatCompletionNarrator {
    fn name(&self) -> &str {
        "chat-completion"
    }

    async fn draft(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::user_prompt(request),
                },
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let mut builder = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrativeError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Backend(format!(
                "chat completion API error ({}): {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::Backend(format!("invalid response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(NarrativeError::EmptyDraft)
    }
}
