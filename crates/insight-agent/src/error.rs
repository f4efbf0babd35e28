use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsightAgentError {
    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("failed to parse model output: {source}\n  text: {text}")]
    Parse {
        text: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model output field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
