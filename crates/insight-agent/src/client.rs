use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use standup_core::config::SummarizerConfig;
use standup_core::ports::{ResponseRecord, SummarizerFailure, SummarizerPort, SummaryDraft};

use crate::error::InsightAgentError;
use crate::prompt::{build_content_prompt, build_prompt, parse_content, parse_draft};
use crate::types::{GenerateContentRequest, GenerateContentResponse};
use crate::Result;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ─── GeminiSummarizer ─────────────────────────────────────────────────────

/// [`SummarizerPort`] backed by the Gemini `generateContent` endpoint.
///
/// The HTTP client is built on first use so that constructing a summarizer
/// inside an async context is safe; only [`GeminiSummarizer::generate`]
/// must run on a blocking thread.
#[derive(Debug)]
pub struct GeminiSummarizer {
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    client: OnceLock<Client>,
}

impl GeminiSummarizer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Build from configuration, reading the API key from the environment
    /// variable it names.
    pub fn from_config(config: &SummarizerConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| InsightAgentError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = Client::builder().timeout(self.timeout).build()?;
        Ok(self.client.get_or_init(move || built))
    }

    /// Send `prompt` and return the model's reply text.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::json_prompt(prompt);
        let response = self
            .client()?
            .post(self.url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InsightAgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json()?;
        if let Some(reason) = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            tracing::debug!(model = %self.model, finish_reason = reason, "generation finished");
        }
        parsed.first_text().ok_or(InsightAgentError::EmptyResponse)
    }

    /// Prompt, call and parse in one step.
    pub fn draft(
        &self,
        responses: &[ResponseRecord],
        project_description: &str,
    ) -> Result<SummaryDraft> {
        let prompt = build_prompt(responses, project_description)?;
        let text = self.generate(&prompt)?;
        parse_draft(&text)
    }

    /// Prompt, call and parse a multi-day content piece.
    pub fn content(&self, summaries: &[String], project_description: &str) -> Result<String> {
        let prompt = build_content_prompt(summaries, project_description)?;
        let text = self.generate(&prompt)?;
        parse_content(&text)
    }
}

impl SummarizerPort for GeminiSummarizer {
    fn summarize(
        &self,
        responses: &[ResponseRecord],
        project_description: &str,
    ) -> std::result::Result<SummaryDraft, SummarizerFailure> {
        tracing::info!(
            model = %self.model,
            responses = responses.len(),
            "calling summarizer"
        );
        self.draft(responses, project_description).map_err(|e| {
            tracing::warn!(model = %self.model, error = %e, "summarizer call failed");
            SummarizerFailure(e.to_string())
        })
    }

    fn write_content(
        &self,
        summaries: &[String],
        project_description: &str,
    ) -> std::result::Result<String, SummarizerFailure> {
        tracing::info!(model = %self.model, days = summaries.len(), "calling content writer");
        self.content(summaries, project_description).map_err(|e| {
            tracing::warn!(model = %self.model, error = %e, "content call failed");
            SummarizerFailure(e.to_string())
        })
    }
}
