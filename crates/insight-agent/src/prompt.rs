//! Prompt construction and strict parsing of the model's reply.

use serde::Deserialize;
use standup_core::ports::{ResponseRecord, SummaryDraft};
use standup_core::types::DiversionRange;

use crate::error::InsightAgentError;
use crate::Result;

/// Build the instruction block for one day's responses.
///
/// The responses are embedded as a JSON array so that free text typed by
/// members cannot be mistaken for instructions.
pub fn build_prompt(responses: &[ResponseRecord], project_description: &str) -> Result<String> {
    let responses_json =
        serde_json::to_string_pretty(responses).map_err(|source| InsightAgentError::Parse {
            text: String::new(),
            source,
        })?;
    Ok(format!(
        "You are reviewing a software team's daily check-in.\n\
         \n\
         Product description:\n\
         {project_description}\n\
         \n\
         Team responses (JSON array; each entry has email, did_yesterday, doing_today, blockers):\n\
         {responses_json}\n\
         \n\
         Reply with a single JSON object and nothing else, with exactly these keys:\n\
         - \"summary\": what the team did and plans to do, attributing each point to the member's email.\n\
         - \"blockers\": every blocker raised, attributed by email; \"None\" if nobody is blocked.\n\
         - \"diversion_range\": one of \"on track\", \"slightly off\", \"significantly off\", judging how well today's work aligns with the product description.\n\
         - \"diversion_context\": one or two sentences explaining the diversion_range.\n"
    ))
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    summary: String,
    blockers: String,
    diversion_range: String,
    diversion_context: String,
}

/// Remove a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````)
/// if the model added one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the model's reply into a [`SummaryDraft`]. Every field must be
/// present; `summary` and `diversion_range` must not be blank.
pub fn parse_draft(text: &str) -> Result<SummaryDraft> {
    let body = strip_code_fence(text);
    let raw: RawDraft = serde_json::from_str(body).map_err(|source| InsightAgentError::Parse {
        text: body.to_string(),
        source,
    })?;

    if raw.summary.trim().is_empty() {
        return Err(InsightAgentError::InvalidField {
            field: "summary",
            reason: "empty".into(),
        });
    }
    let diversion_range: DiversionRange =
        raw.diversion_range
            .parse()
            .map_err(|reason| InsightAgentError::InvalidField {
                field: "diversion_range",
                reason,
            })?;

    Ok(SummaryDraft {
        summary: raw.summary.trim().to_string(),
        blockers: raw.blockers.trim().to_string(),
        diversion_range,
        diversion_context: raw.diversion_context.trim().to_string(),
    })
}

/// Build the instruction block for a behind-the-scenes piece drawn from
/// several days of summaries, oldest first.
pub fn build_content_prompt(summaries: &[String], project_description: &str) -> Result<String> {
    let summaries_json =
        serde_json::to_string_pretty(summaries).map_err(|source| InsightAgentError::Parse {
            text: String::new(),
            source,
        })?;
    Ok(format!(
        "You are helping a product team turn their daily check-ins into behind-the-scenes content.\n\
         \n\
         Product description:\n\
         {project_description}\n\
         \n\
         Daily summaries (JSON array, oldest first):\n\
         {summaries_json}\n\
         \n\
         Write a story-driven blog post about the team's journey: the process, the struggles, \
         how problems were solved and the milestones reached.\n\
         Reply with a single JSON object and nothing else, with exactly one key:\n\
         - \"content\": the blog post as plain text.\n"
    ))
}

#[derive(Debug, Deserialize)]
struct RawContent {
    content: String,
}

/// Parse the model's content reply; `content` must not be blank.
pub fn parse_content(text: &str) -> Result<String> {
    let body = strip_code_fence(text);
    let raw: RawContent = serde_json::from_str(body).map_err(|source| InsightAgentError::Parse {
        text: body.to_string(),
        source,
    })?;
    let content = raw.content.trim();
    if content.is_empty() {
        return Err(InsightAgentError::InvalidField {
            field: "content",
            reason: "empty".into(),
        });
    }
    Ok(content.to_string())
}
