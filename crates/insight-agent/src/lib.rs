//! `insight-agent`: generative-model summarizer for daily check-ins.
//!
//! Implements [`standup_core::ports::SummarizerPort`] against the Gemini
//! `generateContent` REST endpoint so the engine can turn a day's responses
//! into an insight without knowing anything about the model.
//!
//! # Architecture
//!
//! ```text
//! [ResponseRecord] + project description
//!     │
//!     ▼
//! prompt::build_prompt    ← one plain-text instruction block
//!     │
//!     ▼
//! GeminiSummarizer        ← blocking POST to {endpoint}/models/{model}:generateContent
//!     │
//!     ▼
//! prompt::parse_draft     ← strips code fences, strict JSON → SummaryDraft
//! ```
//!
//! Calls are blocking. Async callers run them on a blocking thread.

pub mod client;
pub mod error;
pub mod prompt;
pub mod types;


pub use client::GeminiSummarizer;
pub use error::InsightAgentError;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, InsightAgentError>;
