//! Accepting one member's check-in from a signed link.

use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::error::SubmissionError;
use crate::model::{Insight, NewResponse, Response, ResponseFields};
use crate::payload::{PayloadSigner, ReminderPayload};
use crate::store::{CheckinStore, RecordOutcome};
use crate::summarize::SummarizationCoordinator;
use crate::types::ProjectId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submitted {
    pub response: Response,
    /// Present when this response completed the check-in and the summary
    /// was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight: Option<Insight>,
}

pub struct SubmissionEngine {
    db: Arc<dyn CheckinStore>,
    signer: PayloadSigner,
    coordinator: Arc<SummarizationCoordinator>,
    clock: Arc<dyn Clock>,
    link_ttl: chrono::Duration,
}

impl SubmissionEngine {
    pub fn new(
        db: Arc<dyn CheckinStore>,
        signer: PayloadSigner,
        coordinator: Arc<SummarizationCoordinator>,
        clock: Arc<dyn Clock>,
        link_ttl: chrono::Duration,
    ) -> Self {
        Self {
            db,
            signer,
            coordinator,
            clock,
            link_ttl,
        }
    }

    /// Record a check-in submitted through `token` for `project_id`.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// the link, the member, the check-in, then the tracker's counters. If
    /// this response is the last one expected, the summary is generated
    /// before returning; a summarizer failure is reported but the response
    /// stays recorded.
    pub fn submit(
        &self,
        token: &str,
        project_id: ProjectId,
        fields: ResponseFields,
    ) -> Result<Submitted, SubmissionError> {
        let now = self.clock.now();
        let payload: ReminderPayload = self.signer.verify(token, now, self.link_ttl)?;
        let local_date = payload.local_date();

        let member = self
            .db
            .find_active_member(project_id, &payload.member_email)?
            .ok_or(SubmissionError::NotATeamMember)?;

        let schedule = self
            .db
            .get_schedule(payload.schedule_id)?
            .filter(|s| s.project_id == project_id)
            .ok_or(SubmissionError::NoSuchCheckIn)?;

        let new = NewResponse {
            project_id,
            member_id: member.id,
            schedule_id: schedule.id,
            local_date,
            local_weekday: payload.local_weekday.clone(),
            fields,
            created_at: now,
        };
        let (response, tracker, is_last) = match self.db.record_response(&new)? {
            RecordOutcome::Recorded {
                response,
                tracker,
                is_last,
            } => (response, tracker, is_last),
            RecordOutcome::NoTracker => return Err(SubmissionError::NoSuchCheckIn),
            RecordOutcome::AlreadyComplete => {
                return Err(SubmissionError::AlreadyComplete(payload.local_weekday))
            }
            RecordOutcome::Duplicate => {
                return Err(SubmissionError::DuplicateSubmission(payload.local_weekday))
            }
        };
        tracing::info!(
            project_id,
            tracker_id = tracker.id,
            member_id = member.id,
            received = tracker.received,
            expected = tracker.expected,
            "check-in recorded"
        );

        if !is_last {
            return Ok(Submitted {
                response,
                insight: None,
            });
        }

        let insight = self.coordinator.summarize_tracker(tracker.id, project_id)?;
        Ok(Submitted {
            response,
            insight: Some(insight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SignerError, SummarizationError};
    use crate::model::NewMember;
    use crate::testing::{fields, Harness, ScriptedSummarizer};
    use crate::types::TrackerStatus;
    use chrono::Duration;

    fn engine(h: &Harness) -> SubmissionEngine {
        SubmissionEngine::new(
            h.db.clone(),
            h.signer.clone(),
            Arc::new(h.coordinator()),
            h.clock.clone(),
            Duration::days(7),
        )
    }

    #[test]
    fn last_response_triggers_summary() {
        let h = Harness::new(2);
        let tracker = h.dispatch_today();
        let engine = engine(&h);

        let first = engine
            .submit(&h.token_for(0), h.project.id, fields("none"))
            .unwrap();
        assert!(first.insight.is_none());
        assert!(h.summarizer.calls().is_empty());

        let second = engine
            .submit(&h.token_for(1), h.project.id, fields("Waiting on QA"))
            .unwrap();
        let insight = second.insight.unwrap();
        assert_eq!(
            insight.response_ids,
            vec![first.response.id, second.response.id]
        );

        let tracker = h.db.get_tracker(tracker.id).unwrap().unwrap();
        assert_eq!((tracker.received, tracker.expected), (2, 2));
        assert_eq!(tracker.status, TrackerStatus::Completed);
        assert!(tracker.processed);
    }

    #[test]
    fn tampered_link_is_invalid() {
        let h = Harness::new(1);
        h.dispatch_today();
        let mut token = h.token_for(0);
        token.push('x');
        let err = engine(&h)
            .submit(&token, h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidPayload(_)));
    }

    #[test]
    fn expired_link_is_invalid() {
        let h = Harness::new(1);
        h.dispatch_today();
        let token = h.token_for(0);
        h.clock.advance(Duration::days(8));
        let err = engine(&h)
            .submit(&token, h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidPayload(SignerError::Expired)
        ));
    }

    #[test]
    fn stranger_and_disabled_member_are_rejected() {
        let h = Harness::new(2);
        h.dispatch_today();
        let engine = engine(&h);

        let err = engine
            .submit(
                &h.token_for_email("eve@example.com"),
                h.project.id,
                fields(""),
            )
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NotATeamMember));

        h.db.set_member_active(h.members[1].id, false).unwrap();
        let err = engine
            .submit(&h.token_for(1), h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NotATeamMember));
    }

    #[test]
    fn member_of_another_project_is_not_a_team_member() {
        let h = Harness::new(1);
        h.dispatch_today();
        let other = h
            .db
            .create_project(&crate::model::NewProject {
                title: "Gemini".into(),
                description: "".into(),
                owner_id: 42,
                start_date: h.date(),
                end_date: h.date(),
            })
            .unwrap();
        h.db.add_member(other.id, &NewMember::active("m0@example.com"))
            .unwrap();
        // Right member, wrong project: the schedule in the link is not theirs.
        let err = engine(&h)
            .submit(&h.token_for(0), other.id, fields(""))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NoSuchCheckIn));
    }

    #[test]
    fn no_tracker_means_no_such_checkin() {
        let h = Harness::new(1);
        let err = engine(&h)
            .submit(&h.token_for(0), h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::NoSuchCheckIn));
    }

    #[test]
    fn duplicate_submission_is_rejected_without_counting() {
        let h = Harness::new(3);
        let tracker = h.dispatch_today();
        let engine = engine(&h);
        engine
            .submit(&h.token_for(0), h.project.id, fields(""))
            .unwrap();

        let err = engine
            .submit(&h.token_for(0), h.project.id, fields("changed my mind"))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::DuplicateSubmission(ref day) if day == "Monday"));
        assert_eq!(h.db.get_tracker(tracker.id).unwrap().unwrap().received, 1);
    }

    #[test]
    fn complete_cycle_rejects_even_unanswered_members() {
        let h = Harness::new(2);
        h.db.create_tracker(h.schedule.id, h.date(), 1, "test-host", h.now())
            .unwrap();
        let engine = engine(&h);
        engine
            .submit(&h.token_for(0), h.project.id, fields(""))
            .unwrap();

        for i in [0, 1] {
            let err = engine
                .submit(&h.token_for(i), h.project.id, fields(""))
                .unwrap_err();
            assert!(matches!(err, SubmissionError::AlreadyComplete(_)));
        }
    }

    #[test]
    fn summarizer_failure_keeps_response() {
        let h = Harness::with_summarizer(1, ScriptedSummarizer::failing("quota exceeded"));
        let tracker = h.dispatch_today();
        let err = engine(&h)
            .submit(&h.token_for(0), h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Summarization(SummarizationError::SummarizationFailed(_))
        ));

        let tracker = h.db.get_tracker(tracker.id).unwrap().unwrap();
        assert_eq!(tracker.received, 1);
        assert!(!tracker.processed);
        assert_eq!(
            h.db.responses_for(h.schedule.id, h.project.id, h.date())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn last_submission_after_manual_summary_sees_already_summarized() {
        let h = Harness::new(2);
        let tracker = h.dispatch_today();
        h.respond(0, "");
        h.coordinator()
            .summarize_tracker(tracker.id, h.project.id)
            .unwrap();

        let err = engine(&h)
            .submit(&h.token_for(1), h.project.id, fields(""))
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Summarization(SummarizationError::AlreadySummarized)
        ));
        assert_eq!(h.summarizer.calls().len(), 1);
    }
}
