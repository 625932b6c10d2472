//! Transcript summarization backends.
//!
//! The chat backend uses a map-reduce strategy for long transcripts:
//! 1. If text fits in one chunk: summarize directly
//! 2. Otherwise: split, summarize each chunk, then summarize the summaries

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scribe_core::{defaults, Error, Result, SummaryStyle};

/// Options controlling one summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub style: SummaryStyle,
    pub max_key_points: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            style: SummaryStyle::Brief,
            max_key_points: defaults::SUMMARY_MAX_KEY_POINTS as usize,
        }
    }
}

/// A generated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub key_points: Vec<String>,
    pub model: String,
}

/// Capability to summarize text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<SummaryResult>;

    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct StructuredSummary {
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
}

/// Summarizer backed by an OpenAI-compatible chat completions API.
pub struct ChatSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    chunk_chars: usize,
    timeout: Duration,
}

impl ChatSummarizer {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            chunk_chars: defaults::SUMMARY_CHUNK_CHARS,
            timeout: Duration::from_secs(defaults::SUMMARY_TIMEOUT_SECS),
        }
    }

    /// Create from environment variables.
    ///
    /// Returns None when neither OPENAI_API_KEY nor OPENAI_BASE_URL is set,
    /// since there is nothing to talk to.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let base_url = std::env::var("OPENAI_BASE_URL").ok().filter(|u| !u.is_empty());
        if api_key.is_none() && base_url.is_none() {
            return None;
        }

        let model =
            std::env::var("SUMMARY_MODEL").unwrap_or_else(|_| defaults::SUMMARY_MODEL.to_string());
        let mut summarizer = Self::new(
            base_url.unwrap_or_else(|| defaults::OPENAI_BASE_URL.to_string()),
            model,
        );
        summarizer.api_key = api_key;

        if let Some(secs) = std::env::var("SUMMARY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            summarizer.timeout = Duration::from_secs(secs);
        }
        if let Some(chars) = std::env::var("SUMMARY_CHUNK_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            summarizer.chunk_chars = chars;
        }
        Some(summarizer)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the chunk size for map-reduce splitting.
    pub fn with_chunk_chars(mut self, chars: usize) -> Self {
        self.chunk_chars = chars.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Split text into chunks of at most `chunk_chars`, breaking on whitespace.
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > self.chunk_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    async fn complete(&self, system: &str, prompt: String) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: 0.2,
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Summarization request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Chat API returned {}: {}",
                status, body
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| Error::Inference("Chat API returned no choices".to_string()))
    }
}

fn style_instruction(style: SummaryStyle) -> &'static str {
    match style {
        SummaryStyle::Brief => "Write a concise summary of two or three sentences.",
        SummaryStyle::Detailed => {
            "Write a detailed summary of several paragraphs covering every major topic."
        }
        SummaryStyle::Bullets => "Write the summary as a short list of bullet points.",
    }
}

/// Parse the model's reply. Replies that are not the requested JSON object
/// become a plain summary with no key points.
fn parse_structured_reply(reply: &str, max_key_points: usize) -> (String, Vec<String>) {
    let trimmed = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    match serde_json::from_str::<StructuredSummary>(candidate) {
        Ok(mut parsed) => {
            parsed.key_points.retain(|p| !p.trim().is_empty());
            parsed.key_points.truncate(max_key_points);
            (parsed.summary.trim().to_string(), parsed.key_points)
        }
        Err(_) => (reply.trim().to_string(), Vec::new()),
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<SummaryResult> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("nothing to summarize".to_string()));
        }

        let chunks = self.split_into_chunks(text);
        let source = if chunks.len() > 1 {
            debug!(
                subsystem = "inference",
                component = "summarizer",
                op = "map",
                chunk_count = chunks.len(),
                model = %self.model,
                "Summarizing long transcript in chunks"
            );
            let mut partials = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let partial = self
                    .complete(
                        "You summarize parts of video transcripts.",
                        format!(
                            "Summarize this part of a transcript, keeping every key point:\n\n{}",
                            chunk
                        ),
                    )
                    .await?;
                partials.push(partial);
            }
            partials.join("\n\n")
        } else {
            text.to_string()
        };

        let prompt = format!(
            "{}\nAlso extract at most {} key points.\n\
             Respond with only a JSON object of the form \
             {{\"summary\": \"...\", \"key_points\": [\"...\"]}}.\n\nTranscript:\n{}",
            style_instruction(options.style),
            options.max_key_points,
            source
        );
        let reply = self
            .complete("You summarize video and audio transcripts.", prompt)
            .await?;

        let (summary, key_points) = parse_structured_reply(&reply, options.max_key_points);
        if summary.is_empty() {
            return Err(Error::Inference("Model returned an empty summary".to_string()));
        }

        Ok(SummaryResult {
            summary,
            key_points,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_defaults() {
        let s = ChatSummarizer::new("http://localhost:8080/v1/", "test-model");
        assert_eq!(s.base_url, "http://localhost:8080/v1");
        assert_eq!(s.model, "test-model");
        assert_eq!(s.chunk_chars, defaults::SUMMARY_CHUNK_CHARS);
        assert!(s.api_key.is_none());
    }

    #[test]
    fn test_split_into_chunks_respects_limit() {
        let s = ChatSummarizer::new("http://x", "m").with_chunk_chars(11);
        let chunks = s.split_into_chunks("alpha beta gamma delta epsilon");
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(chunks.iter().all(|c| c.len() <= 11));
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let s = ChatSummarizer::new("http://x", "m");
        assert_eq!(s.split_into_chunks("hello   world").len(), 1);
    }

    #[test]
    fn test_parse_structured_reply_json() {
        let (summary, points) =
            parse_structured_reply(r#"{"summary": "S", "key_points": ["a", "b", "c"]}"#, 2);
        assert_eq!(summary, "S");
        assert_eq!(points, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_structured_reply_fenced() {
        let reply = "```json\n{\"summary\": \"Fenced\", \"key_points\": []}\n```";
        let (summary, points) = parse_structured_reply(reply, 5);
        assert_eq!(summary, "Fenced");
        assert!(points.is_empty());
    }

    #[test]
    fn test_parse_structured_reply_plain_text_fallback() {
        let (summary, points) = parse_structured_reply("  Just prose.  ", 5);
        assert_eq!(summary, "Just prose.");
        assert!(points.is_empty());
    }
}
