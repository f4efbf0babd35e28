use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use standup_core::error::{
    ContentError, ReminderError, ScheduleError, SignerError, StandupError, StoreError,
    SubmissionError, SummarizationError,
};

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 400 through
/// the `anyhow::Error` chain for request validation done in handlers.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }

    pub fn join(err: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {err}"))
    }

    pub fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<BadRequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(e) = self.0.downcast_ref::<StandupError>() {
            return standup_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<SubmissionError>() {
            return submission_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<SummarizationError>() {
            return summarization_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<ReminderError>() {
            return reminder_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<ContentError>() {
            return content_status(e);
        }
        if self.0.downcast_ref::<ScheduleError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(e) = self.0.downcast_ref::<StoreError>() {
            return store_status(e);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn standup_status(e: &StandupError) -> StatusCode {
    match e {
        StandupError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        StandupError::NotInitialized(_)
        | StandupError::InvalidInput(_)
        | StandupError::Schedule(_) => StatusCode::BAD_REQUEST,
        StandupError::Signer(e) => signer_status(e),
        StandupError::Store(e) => store_status(e),
        StandupError::Submission(e) => submission_status(e),
        StandupError::Summarization(e) => summarization_status(e),
        StandupError::Reminder(e) => reminder_status(e),
        StandupError::Content(e) => content_status(e),
        StandupError::InvalidConfig(_)
        | StandupError::Io(_)
        | StandupError::Yaml(_)
        | StandupError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn signer_status(e: &SignerError) -> StatusCode {
    match e {
        SignerError::Expired => StatusCode::GONE,
        SignerError::Malformed(_)
        | SignerError::BadSignature
        | SignerError::WrongKind { .. }
        | SignerError::UnsupportedVersion(_) => StatusCode::BAD_REQUEST,
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Corrupt(_) | StoreError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn submission_status(e: &SubmissionError) -> StatusCode {
    match e {
        SubmissionError::InvalidPayload(e) => signer_status(e),
        SubmissionError::NotATeamMember => StatusCode::FORBIDDEN,
        SubmissionError::NoSuchCheckIn => StatusCode::NOT_FOUND,
        SubmissionError::AlreadyComplete(_) | SubmissionError::DuplicateSubmission(_) => {
            StatusCode::CONFLICT
        }
        SubmissionError::Summarization(e) => summarization_status(e),
        SubmissionError::Store(e) => store_status(e),
    }
}

fn summarization_status(e: &SummarizationError) -> StatusCode {
    match e {
        SummarizationError::FutureDate(_) => StatusCode::BAD_REQUEST,
        SummarizationError::NoSchedule | SummarizationError::NoCheckInSent => {
            StatusCode::NOT_FOUND
        }
        SummarizationError::NoResponses
        | SummarizationError::NoResponsesYet
        | SummarizationError::IncompleteExpectation { .. }
        | SummarizationError::AlreadySummarized => StatusCode::CONFLICT,
        SummarizationError::SummarizationFailed(_) => StatusCode::BAD_GATEWAY,
        SummarizationError::Store(e) => store_status(e),
    }
}

fn reminder_status(e: &ReminderError) -> StatusCode {
    match e {
        ReminderError::ProjectNotFound(_) | ReminderError::NoCheckInSent => StatusCode::NOT_FOUND,
        ReminderError::OutOfRange(_) | ReminderError::NotACheckInDay(_) => StatusCode::BAD_REQUEST,
        ReminderError::AlreadyProcessed => StatusCode::CONFLICT,
        ReminderError::NotATeamMember => StatusCode::FORBIDDEN,
        ReminderError::Delivery(_) => StatusCode::BAD_GATEWAY,
        ReminderError::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ReminderError::Store(e) => store_status(e),
    }
}

fn content_status(e: &ContentError) -> StatusCode {
    match e {
        ContentError::NotProjectOwner(_) => StatusCode::FORBIDDEN,
        ContentError::NoDates => StatusCode::BAD_REQUEST,
        ContentError::NoInsights => StatusCode::NOT_FOUND,
        ContentError::NotEnoughSummaries { .. } => StatusCode::CONFLICT,
        ContentError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
        ContentError::Store(e) => store_status(e),
    }
}

/// The summarization error inside `err`, wherever the engine wrapped it.
fn summarization_cause(err: &anyhow::Error) -> Option<&SummarizationError> {
    if let Some(e) = err.downcast_ref::<SummarizationError>() {
        return Some(e);
    }
    match err.downcast_ref::<StandupError>() {
        Some(StandupError::Summarization(e)) => return Some(e),
        Some(StandupError::Submission(SubmissionError::Summarization(e))) => return Some(e),
        _ => {}
    }
    match err.downcast_ref::<SubmissionError>() {
        Some(SubmissionError::Summarization(e)) => Some(e),
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let mut body = serde_json::json!({ "error": self.0.to_string() });
        if let Some(SummarizationError::IncompleteExpectation { expected, received }) =
            summarization_cause(&self.0)
        {
            body["expected"] = (*expected).into();
            body["received"] = (*received).into();
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use standup_core::error::DeliveryError;

    fn status_of(err: impl Into<anyhow::Error>) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn submission_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(SubmissionError::NotATeamMember),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(SubmissionError::NoSuchCheckIn),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SubmissionError::DuplicateSubmission("Monday".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SubmissionError::InvalidPayload(SignerError::BadSignature)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SubmissionError::InvalidPayload(SignerError::Expired)),
            StatusCode::GONE
        );
    }

    #[test]
    fn summarizer_failure_inside_submission_maps_to_502() {
        let err = SubmissionError::Summarization(SummarizationError::SummarizationFailed(
            "quota".into(),
        ));
        assert_eq!(status_of(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn manual_trigger_errors() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert_eq!(
            status_of(SummarizationError::FutureDate(date)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SummarizationError::IncompleteExpectation {
                expected: 3,
                received: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(SummarizationError::NoCheckInSent),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn reminder_errors() {
        assert_eq!(
            status_of(ReminderError::ProjectNotFound(4)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ReminderError::AlreadyProcessed),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReminderError::Delivery(DeliveryError::new(
                "ada@example.com",
                "smtp down"
            ))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn content_errors() {
        assert_eq!(
            status_of(ContentError::NotProjectOwner(4)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ContentError::NotEnoughSummaries {
                found: 1,
                required: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StandupError::Content(ContentError::GenerationFailed(
                "quota".into()
            ))),
            StatusCode::BAD_GATEWAY
        );
    }

    async fn body_of(err: impl Into<anyhow::Error>) -> serde_json::Value {
        let response = AppError(err.into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn incomplete_expectation_reports_counts() {
        let body = body_of(SummarizationError::IncompleteExpectation {
            expected: 3,
            received: 2,
        })
        .await;
        assert_eq!(body["expected"], 3);
        assert_eq!(body["received"], 2);
        assert!(body["error"].as_str().unwrap().contains("expecting 3"));

        let wrapped = body_of(StandupError::Summarization(
            SummarizationError::IncompleteExpectation {
                expected: 5,
                received: 1,
            },
        ))
        .await;
        assert_eq!(wrapped["expected"], 5);
        assert_eq!(wrapped["received"], 1);
    }

    #[tokio::test]
    async fn other_errors_carry_only_the_message() {
        let body = body_of(SummarizationError::NoCheckInSent).await;
        assert!(body.get("expected").is_none());
        assert!(body["error"].is_string());
    }

    #[test]
    fn umbrella_error_is_unwrapped() {
        assert_eq!(
            status_of(StandupError::ProjectNotFound(9)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StandupError::Reminder(ReminderError::NotATeamMember)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(StandupError::Schedule(ScheduleError::InvalidSchedule(
                "bad".into()
            ))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let response = AppError::bad_request("days must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_error_maps_to_500() {
        assert_eq!(
            status_of(anyhow::anyhow!("something unexpected")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_body_contains_error_field() {
        let response = AppError(StandupError::ProjectNotFound(3).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
