//! Narrative content written from several days of insights.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::ContentError;
use crate::model::{GeneratedContent, NewContent};
use crate::ports::SummarizerPort;
use crate::store::CheckinStore;
use crate::types::ProjectId;

/// Content type recorded on every piece this service writes.
pub const BEHIND_THE_SCENES: &str = "behind-the-scenes";

/// Fewest non-empty summaries a piece of content is written from.
pub const MIN_SUMMARIES: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ContentOutcome {
    pub content: GeneratedContent,
    /// False when an earlier piece already covered the same insights.
    pub created: bool,
}

pub struct ContentService {
    db: Arc<dyn CheckinStore>,
    summarizer: Arc<dyn SummarizerPort>,
    clock: Arc<dyn Clock>,
}

impl ContentService {
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

    /// Write one piece of content from the insights on `dates`.
    ///
    /// Asking again for dates whose insights were all consumed by an earlier
    /// piece returns that piece without calling the summarizer.
    pub fn generate(
        &self,
        project_id: ProjectId,
        owner_id: i64,
        dates: &[NaiveDate],
    ) -> Result<ContentOutcome, ContentError> {
        let project = self
            .db
            .get_project(project_id)?
            .filter(|p| p.owner_id == owner_id)
            .ok_or(ContentError::NotProjectOwner(project_id))?;
        if dates.is_empty() {
            return Err(ContentError::NoDates);
        }

        let mut dates = dates.to_vec();
        dates.sort_unstable();
        dates.dedup();

        let mut insights = Vec::new();
        for date in &dates {
            if let Some(insight) = self.db.insight_for(project_id, *date)? {
                insights.push(insight);
            }
        }
        if insights.is_empty() {
            return Err(ContentError::NoInsights);
        }

        let summaries: Vec<String> = insights
            .iter()
            .map(|i| i.summary.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if summaries.len() < MIN_SUMMARIES {
            return Err(ContentError::NotEnoughSummaries {
                found: summaries.len(),
                required: MIN_SUMMARIES,
            });
        }

        let mut insight_ids: Vec<_> = insights.iter().map(|i| i.id).collect();
        insight_ids.sort_unstable();
        if let Some(existing) = self
            .db
            .contents_for_project(project_id)?
            .into_iter()
            .find(|c| c.covers(&insight_ids))
        {
            tracing::debug!(project_id, content_id = existing.id, "content already written");
            return Ok(ContentOutcome {
                content: existing,
                created: false,
            });
        }

        tracing::info!(project_id, days = summaries.len(), "writing content");
        let text = self
            .summarizer
            .write_content(&summaries, &project.description)
            .map_err(|e| {
                tracing::warn!(project_id, error = %e, "content generation failed");
                ContentError::GenerationFailed(e.to_string())
            })?;
        if text.trim().is_empty() {
            return Err(ContentError::GenerationFailed(
                "summarizer returned empty content".into(),
            ));
        }

        let content = self.db.insert_content(&NewContent {
            project_id,
            owner_id,
            local_dates: insights.iter().map(|i| i.local_date).collect(),
            insight_ids,
            content: text,
            content_type: BEHIND_THE_SCENES.to_string(),
            created_at: self.clock.now(),
        })?;
        tracing::info!(project_id, content_id = content.id, "content stored");
        Ok(ContentOutcome {
            content,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ScriptedSummarizer};
    use chrono::Duration;

    /// Summarize today and the Monday after, leaving the clock where it was.
    fn two_summarized_mondays(h: &Harness) -> Vec<NaiveDate> {
        let tracker = h.dispatch_today();
        h.respond(0, "");
        h.coordinator()
            .summarize_tracker(tracker.id, h.project.id)
            .unwrap();

        let next = h.date() + Duration::days(7);
        let later = h
            .db
            .create_tracker(h.schedule.id, next, 1, "test-host", h.now())
            .unwrap()
            .unwrap();
        h.db.record_response(&crate::model::NewResponse {
            project_id: h.project.id,
            member_id: h.members[0].id,
            schedule_id: h.schedule.id,
            local_date: next,
            local_weekday: "Monday".into(),
            fields: crate::testing::fields(""),
            created_at: h.now(),
        })
        .unwrap();
        h.coordinator()
            .summarize_tracker(later.id, h.project.id)
            .unwrap();
        vec![h.date(), next]
    }

    fn service(h: &Harness) -> ContentService {
        ContentService::new(h.db.clone(), h.summarizer.clone(), h.clock.clone())
    }

    #[test]
    fn writes_content_from_every_summarized_day() {
        let h = Harness::new(1);
        let dates = two_summarized_mondays(&h);

        let outcome = service(&h).generate(h.project.id, 42, &dates).unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.content.local_dates, dates);
        assert_eq!(outcome.content.insight_ids.len(), 2);
        assert_eq!(outcome.content.content_type, BEHIND_THE_SCENES);
        assert!(outcome.content.content.starts_with("A week on the lander"));
        assert_eq!(h.summarizer.content_calls()[0].len(), 2);
    }

    #[test]
    fn same_insights_return_the_earlier_content() {
        let h = Harness::new(1);
        let dates = two_summarized_mondays(&h);
        let service = service(&h);

        let first = service.generate(h.project.id, 42, &dates).unwrap();
        let mut reversed = dates.clone();
        reversed.reverse();
        let again = service.generate(h.project.id, 42, &reversed).unwrap();
        assert!(!again.created);
        assert_eq!(again.content.id, first.content.id);
        assert_eq!(h.summarizer.content_calls().len(), 1);
        assert_eq!(h.db.contents_for_project(h.project.id).unwrap().len(), 1);
    }

    #[test]
    fn one_summary_is_not_enough() {
        let h = Harness::new(1);
        let tracker = h.dispatch_today();
        h.respond(0, "");
        h.coordinator()
            .summarize_tracker(tracker.id, h.project.id)
            .unwrap();

        let err = service(&h)
            .generate(h.project.id, 42, &[h.date(), h.date() + Duration::days(7)])
            .unwrap_err();
        assert!(matches!(
            err,
            ContentError::NotEnoughSummaries {
                found: 1,
                required: 2
            }
        ));
        assert!(h.summarizer.content_calls().is_empty());
    }

    #[test]
    fn refuses_other_owners_empty_dates_and_bare_days() {
        let h = Harness::new(1);
        let service = service(&h);
        assert!(matches!(
            service.generate(h.project.id, 7, &[h.date()]),
            Err(ContentError::NotProjectOwner(_))
        ));
        assert!(matches!(
            service.generate(h.project.id, 42, &[]),
            Err(ContentError::NoDates)
        ));
        assert!(matches!(
            service.generate(h.project.id, 42, &[h.date()]),
            Err(ContentError::NoInsights)
        ));
    }

    #[test]
    fn summarizer_failure_stores_nothing() {
        let h = Harness::with_summarizer(1, ScriptedSummarizer::failing("quota"));
        // The daily summaries themselves fail with this summarizer, so seed
        // two insights straight through the store.
        for offset in [0, 7] {
            let date = h.date() + Duration::days(offset);
            let tracker = h
                .db
                .create_tracker(h.schedule.id, date, 1, "test-host", h.now())
                .unwrap()
                .unwrap();
            h.db.insert_insight(&crate::model::NewInsight {
                tracker_id: tracker.id,
                project_id: h.project.id,
                schedule_id: h.schedule.id,
                local_date: date,
                response_ids: Vec::new(),
                summary: format!("day {offset}"),
                blockers: String::new(),
                diversion_range: crate::types::DiversionRange::OnTrack,
                diversion_context: String::new(),
                created_at: h.now(),
            })
            .unwrap()
            .unwrap();
        }

        let err = service(&h)
            .generate(h.project.id, 42, &[h.date(), h.date() + Duration::days(7)])
            .unwrap_err();
        assert!(matches!(err, ContentError::GenerationFailed(_)));
        assert!(h.db.contents_for_project(h.project.id).unwrap().is_empty());
    }
}
