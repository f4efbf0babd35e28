//! User-requested summary generation for a given day.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::error::SummarizationError;
use crate::model::{Insight, Schedule};
use crate::schedule::local_datetime;
use crate::store::CheckinStore;
use crate::summarize::SummarizationCoordinator;
use crate::types::ProjectId;

pub struct ManualSummaryTrigger {
    db: Arc<dyn CheckinStore>,
    coordinator: Arc<SummarizationCoordinator>,
    clock: Arc<dyn Clock>,
}

impl ManualSummaryTrigger {
    pub fn new(
        db: Arc<dyn CheckinStore>,
        coordinator: Arc<SummarizationCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            coordinator,
            clock,
        }
    }

    /// Generate the summary for `local_date` on request.
    ///
    /// Without `force`, every expected member must have answered; with it,
    /// whatever has been received so far is summarized. Either way the
    /// tracker is claimed first, so this races safely with the last
    /// submission.
    pub fn force_or_request(
        &self,
        project_id: ProjectId,
        local_date: NaiveDate,
        force: bool,
    ) -> Result<Insight, SummarizationError> {
        let schedule = self.db.schedule_for_project(project_id)?;

        let today = project_today(schedule.as_ref(), self.clock.as_ref());
        if local_date > today {
            return Err(SummarizationError::FutureDate(local_date));
        }
        if self.db.insight_for(project_id, local_date)?.is_some() {
            return Err(SummarizationError::AlreadySummarized);
        }

        let schedule = schedule.ok_or(SummarizationError::NoSchedule)?;
        let tracker = self
            .db
            .find_tracker(schedule.id, local_date)?
            .ok_or(SummarizationError::NoCheckInSent)?;
        if tracker.processed {
            return Err(SummarizationError::AlreadySummarized);
        }
        if tracker.received == 0 {
            return Err(SummarizationError::NoResponsesYet);
        }
        if !tracker.is_complete() && !force {
            return Err(SummarizationError::IncompleteExpectation {
                expected: tracker.expected,
                received: tracker.received,
            });
        }

        tracing::info!(
            project_id,
            tracker_id = tracker.id,
            %local_date,
            force,
            received = tracker.received,
            expected = tracker.expected,
            "manual summary requested"
        );
        self.coordinator.summarize_tracker(tracker.id, project_id)
    }
}

/// The current calendar date at the project's schedule offset, or in UTC
/// when the project has no schedule.
pub(crate) fn project_today(schedule: Option<&Schedule>, clock: &dyn Clock) -> NaiveDate {
    let offset = schedule.map_or(0, |s| s.times.offset_hours());
    local_datetime(clock.now(), offset).date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use chrono::Duration;

    fn trigger(h: &Harness) -> ManualSummaryTrigger {
        ManualSummaryTrigger::new(h.db.clone(), Arc::new(h.coordinator()), h.clock.clone())
    }

    #[test]
    fn incomplete_requires_force() {
        let h = Harness::new(3);
        let tracker = h.dispatch_today();
        let a = h.respond(0, "");
        let b = h.respond(1, "Blocked on review");
        let trigger = trigger(&h);

        let err = trigger
            .force_or_request(h.project.id, h.date(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            SummarizationError::IncompleteExpectation {
                expected: 3,
                received: 2
            }
        ));
        assert!(h.summarizer.calls().is_empty());

        let insight = trigger
            .force_or_request(h.project.id, h.date(), true)
            .unwrap();
        assert_eq!(insight.response_ids, vec![a.id, b.id]);
        assert!(h.db.get_tracker(tracker.id).unwrap().unwrap().processed);

        let err = trigger
            .force_or_request(h.project.id, h.date(), true)
            .unwrap_err();
        assert!(matches!(err, SummarizationError::AlreadySummarized));
        assert_eq!(h.summarizer.calls().len(), 1);
    }

    #[test]
    fn complete_tracker_needs_no_force() {
        let h = Harness::new(1);
        h.dispatch_today();
        h.respond(0, "");
        assert!(trigger(&h)
            .force_or_request(h.project.id, h.date(), false)
            .is_ok());
    }

    #[test]
    fn future_date_is_judged_at_schedule_offset() {
        let h = Harness::new(1);
        // 23:30 UTC Monday is already Tuesday at UTC+1.
        h.clock.advance(Duration::minutes(15 * 60 + 30));
        let tuesday = h.date() + Duration::days(1);
        let wednesday = h.date() + Duration::days(2);

        let err = trigger(&h)
            .force_or_request(h.project.id, wednesday, true)
            .unwrap_err();
        assert!(matches!(err, SummarizationError::FutureDate(d) if d == wednesday));

        let err = trigger(&h)
            .force_or_request(h.project.id, tuesday, true)
            .unwrap_err();
        assert!(matches!(err, SummarizationError::NoCheckInSent));
    }

    #[test]
    fn missing_pieces_are_reported_in_order() {
        let h = Harness::new(1);
        let trigger = trigger(&h);
        assert!(matches!(
            trigger.force_or_request(h.project.id, h.date(), true),
            Err(SummarizationError::NoCheckInSent)
        ));

        h.dispatch_today();
        assert!(matches!(
            trigger.force_or_request(h.project.id, h.date(), true),
            Err(SummarizationError::NoResponsesYet)
        ));

        assert!(matches!(
            trigger.force_or_request(h.project.id + 100, h.date(), true),
            Err(SummarizationError::NoSchedule)
        ));
    }

    #[test]
    fn manual_and_last_submission_race_has_one_winner() {
        let h = Harness::new(2);
        let tracker = h.dispatch_today();
        h.respond(0, "");
        h.respond(1, "");
        let coordinator = Arc::new(h.coordinator());
        let trigger =
            ManualSummaryTrigger::new(h.db.clone(), coordinator.clone(), h.clock.clone());

        let project_id = h.project.id;
        let date = h.date();
        let tracker_id = tracker.id;
        let results = std::thread::scope(|s| {
            let manual = s.spawn(|| trigger.force_or_request(project_id, date, false));
            let automatic = s.spawn(|| coordinator.summarize_tracker(tracker_id, project_id));
            [manual.join().unwrap(), automatic.join().unwrap()]
        });

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SummarizationError::AlreadySummarized))));
        assert_eq!(h.summarizer.calls().len(), 1);
    }
}
