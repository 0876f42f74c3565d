//! Hosted LLM abstraction
//!
//! Provides a unified interface for reply generation:
//! - OpenAI-compatible chat completions over HTTP
//! - A deterministic template responder used when no API key is configured

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Header preceding the paper listing in chat prompts
const PAPERS_HEADER: &str = "Papers:";

/// Header preceding the content excerpt in summary prompts
const EXCERPT_HEADER: &str = "Excerpt:";

const CHAT_SYSTEM_PROMPT: &str = "You are a research assistant for a paper marketplace. \
Answer using only the papers listed by the user. Mention titles and access fees when useful. \
If no papers are listed, say so and suggest different keywords.";

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize research papers. \
Write a short plain-language summary of the excerpt provided, in at most five sentences.";

/// A system/user prompt pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Paper fields shown to the model
#[derive(Debug, Clone)]
pub struct PromptPaper<'a> {
    pub title: &'a str,
    pub authors: &'a [String],
    pub fee: f64,
}

/// Trait for reply generation
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply for a system/user prompt pair
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the prompt answering a chat message with matched papers as context
pub fn chat_prompt(message: &str, papers: &[PromptPaper<'_>]) -> Prompt {
    let mut user = format!("Question: {}\n\n{}\n", message.trim(), PAPERS_HEADER);
    for paper in papers {
        user.push_str(&format!(
            "- {} by {} (fee {})\n",
            paper.title,
            paper.authors.join(", "),
            paper.fee
        ));
    }

    Prompt {
        system: CHAT_SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Build the prompt summarizing a content excerpt
pub fn summary_prompt(title: &str, excerpt: &str) -> Prompt {
    Prompt {
        system: SUMMARY_SYSTEM_PROMPT.to_string(),
        user: format!("Title: {}\n\n{}\n{}", title, EXCERPT_HEADER, excerpt),
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionContent,
}

#[derive(Deserialize)]
struct CompletionContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    /// Create a new chat client
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn make_request(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: system,
                },
                CompletionMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: CompletionResponse = response.json().await.map_err(|e| AppError::Llm {
            message: format!("Failed to parse response: {}", e),
        })?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Llm {
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.make_request(system, user).await;
        metrics::record_llm(start.elapsed().as_secs_f64(), &self.model, result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(model = %self.model, error = %e, "LLM completion failed");
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic responder built from the prompt itself
#[derive(Debug, Clone, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn new() -> Self {
        Self
    }

    fn section<'a>(user: &'a str, header: &str) -> Option<&'a str> {
        user.find(header).map(|at| user[at + header.len()..].trim())
    }
}

#[async_trait]
impl ChatModel for TemplateResponder {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if system == SUMMARY_SYSTEM_PROMPT {
            let excerpt = Self::section(user, EXCERPT_HEADER).unwrap_or_default();
            let title = user
                .lines()
                .next()
                .and_then(|l| l.strip_prefix("Title: "))
                .unwrap_or("this paper");
            let preview: String = excerpt.chars().take(300).collect();
            let reply = if preview.is_empty() {
                format!("No readable text was found in {}.", title)
            } else {
                format!("Summary of {}: {}", title, preview)
            };
            return Ok(reply);
        }

        let listing: Vec<&str> = Self::section(user, PAPERS_HEADER)
            .unwrap_or_default()
            .lines()
            .filter(|l| l.starts_with("- "))
            .collect();

        if listing.is_empty() {
            return Ok("I could not find any papers matching your request. \
Try different keywords."
                .to_string());
        }

        Ok(format!(
            "I found {} paper(s) related to your request:\n{}\nAsk for a quote to get access.",
            listing.len(),
            listing.join("\n")
        ))
    }

    fn model_name(&self) -> &str {
        "template"
    }
}

/// Create a chat model based on configuration
///
/// Falls back to the template responder when no API key is configured.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match (config.provider.as_str(), config.api_key.as_deref()) {
        ("openai", Some(key)) if !key.trim().is_empty() => {
            Ok(Arc::new(OpenAiChat::new(key.trim().to_string(), config)?))
        }
        ("openai", _) => {
            tracing::warn!("No LLM API key configured, using template replies");
            Ok(Arc::new(TemplateResponder::new()))
        }
        ("template", _) => Ok(Arc::new(TemplateResponder::new())),
        (other, _) => Err(AppError::Configuration {
            message: format!("Unknown LLM provider: {}", other),
        }),
    }
}
