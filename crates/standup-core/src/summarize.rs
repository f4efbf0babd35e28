//! Turns a day's responses into a single [`Insight`].

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::error::{StoreError, SummarizationError};
use crate::model::{Insight, NewInsight};
use crate::ports::{ResponseRecord, SummarizerPort};
use crate::store::{CheckinStore, ClaimOutcome};
use crate::types::{ProjectId, ScheduleId, TrackerId};

pub struct SummarizationCoordinator {
    db: Arc<dyn CheckinStore>,
    summarizer: Arc<dyn SummarizerPort>,
    clock: Arc<dyn Clock>,
}

impl SummarizationCoordinator {
    pub fn new(
        db: Arc<dyn CheckinStore>,
        summarizer: Arc<dyn SummarizerPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            summarizer,
            clock,
        }
    }

    /// Summarize every response recorded for `(schedule_id, project_id,
    /// local_date)` and persist the result against `tracker_id`.
    ///
    /// Does not touch the tracker's status; see
    /// [`SummarizationCoordinator::summarize_tracker`] for the claimed path.
    pub fn summarize(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
        project_id: ProjectId,
        tracker_id: TrackerId,
    ) -> Result<Insight, SummarizationError> {
        if self.db.insight_for(project_id, local_date)?.is_some() {
            return Err(SummarizationError::AlreadySummarized);
        }

        let responses = self.db.responses_for(schedule_id, project_id, local_date)?;
        if responses.is_empty() {
            return Err(SummarizationError::NoResponses);
        }

        let project = self
            .db
            .get_project(project_id)?
            .ok_or_else(|| StoreError::NotFound(format!("project {project_id}")))?;

        let mut records = Vec::with_capacity(responses.len());
        for response in &responses {
            let member = self
                .db
                .member(response.member_id)?
                .ok_or_else(|| StoreError::NotFound(format!("member {}", response.member_id)))?;
            records.push(ResponseRecord {
                email: member.email,
                did_yesterday: response.did_yesterday.clone(),
                doing_today: response.doing_today.clone(),
                blockers: response.blockers.clone(),
            });
        }

        tracing::info!(
            project_id,
            tracker_id,
            %local_date,
            responses = records.len(),
            "requesting summary"
        );
        let draft = self
            .summarizer
            .summarize(&records, &project.description)
            .map_err(|e| {
                tracing::warn!(project_id, tracker_id, error = %e, "summarizer failed");
                SummarizationError::SummarizationFailed(e.to_string())
            })?;
        if draft.summary.trim().is_empty() {
            return Err(SummarizationError::SummarizationFailed(
                "summarizer returned an empty summary".into(),
            ));
        }

        let new = NewInsight {
            tracker_id,
            project_id,
            schedule_id,
            local_date,
            response_ids: responses.iter().map(|r| r.id).collect(),
            summary: draft.summary,
            blockers: draft.blockers,
            diversion_range: draft.diversion_range,
            diversion_context: draft.diversion_context,
            created_at: self.clock.now(),
        };
        let insight = self
            .db
            .insert_insight(&new)?
            .ok_or(SummarizationError::AlreadySummarized)?;
        tracing::info!(
            project_id,
            tracker_id,
            insight_id = insight.id,
            diversion = %insight.diversion_range,
            "insight stored"
        );
        Ok(insight)
    }

    /// Claim the tracker, summarize it and mark it completed.
    ///
    /// Only the caller that wins the claim reaches the summarizer; everyone
    /// else gets [`SummarizationError::AlreadySummarized`]. A failed run gives
    /// the claim back so the manual trigger can retry.
    pub fn summarize_tracker(
        &self,
        tracker_id: TrackerId,
        project_id: ProjectId,
    ) -> Result<Insight, SummarizationError> {
        let tracker = match self.db.claim_tracker(tracker_id, self.clock.now())? {
            ClaimOutcome::Claimed(tracker) => tracker,
            ClaimOutcome::AlreadyProcessed | ClaimOutcome::InProgress => {
                tracing::debug!(tracker_id, "tracker claimed elsewhere");
                return Err(SummarizationError::AlreadySummarized);
            }
        };

        match self.summarize(tracker.schedule_id, tracker.local_date, project_id, tracker.id) {
            Ok(insight) => {
                self.db.complete_tracker(tracker.id)?;
                Ok(insight)
            }
            Err(SummarizationError::AlreadySummarized) => {
                self.db.complete_tracker(tracker.id)?;
                Err(SummarizationError::AlreadySummarized)
            }
            Err(e) => {
                self.db.release_claim(tracker.id)?;
                Err(e)
            }
        }
    }
}
