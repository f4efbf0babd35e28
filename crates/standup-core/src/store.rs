//! SQLite persistence for projects, schedules, trackers, responses and insights.
//!
//! Every state transition that other components race on is a single
//! conditional `UPDATE` (or a uniqueness-guarded `INSERT`) whose affected-row
//! count decides the winner:
//!
//! | operation                 | guard                                          |
//! |---------------------------|------------------------------------------------|
//! | [`CheckinDb::create_tracker`]  | `UNIQUE (schedule_id, local_date)`         |
//! | [`CheckinDb::record_response`] | `received < expected` + `UNIQUE` response |
//! | [`CheckinDb::claim_tracker`]   | `processed = 0 AND status IN (…)`          |
//! | [`CheckinDb::insert_insight`]  | `UNIQUE (project_id, local_date)`          |
//!
//! The connection sits behind a mutex and write paths use immediate
//! transactions, so two handles on the same file serialize as well.
//!
//! The engines see the store through [`CheckinStore`]; [`CheckinDb`] is the
//! SQLite implementation and also carries the management and reporting
//! queries used by the CLI and the HTTP read paths.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use crate::error::StoreError;
use crate::migrations;
use crate::model::{
    is_blocker_present, GeneratedContent, Insight, NewContent, NewInsight, NewMember, NewProject,
    NewResponse, Project, ProjectMember, Response, Schedule, Tracker,
};
use crate::schedule::{parse_days, ScheduleTimes};
use crate::types::{
    weekday_name, MemberId, ProjectId, ResponseId, ScheduleId, TrackerId, TrackerStatus,
};

// ---------------------------------------------------------------------------
// Outcomes of guarded writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded {
        response: Response,
        tracker: Tracker,
        /// This response brought `received` up to `expected`.
        is_last: bool,
    },
    NoTracker,
    AlreadyComplete,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Tracker),
    AlreadyProcessed,
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub updates: u32,
    pub blockers: u32,
}

// ---------------------------------------------------------------------------
// CheckinStore
// ---------------------------------------------------------------------------

/// Persistence used by the dispatcher, the submission engine, the
/// summarization coordinator, the manual trigger, reminders and content.
///
/// Implementations must make [`CheckinStore::create_tracker`],
/// [`CheckinStore::record_response`], [`CheckinStore::claim_tracker`] and
/// [`CheckinStore::insert_insight`] atomic: each decides a race between
/// callers on its own, with no lock held by the caller.
pub trait CheckinStore: Send + Sync {
    fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;
    fn member(&self, id: MemberId) -> Result<Option<ProjectMember>, StoreError>;
    fn active_members(&self, project_id: ProjectId) -> Result<Vec<ProjectMember>, StoreError>;
    fn find_active_member(
        &self,
        project_id: ProjectId,
        email: &str,
    ) -> Result<Option<ProjectMember>, StoreError>;

    fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError>;
    fn schedule_for_project(&self, project_id: ProjectId)
        -> Result<Option<Schedule>, StoreError>;
    /// Active, not ended schedules whose UTC firing hour and weekday match `now`.
    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError>;

    /// Insert a tracker in `created`. `None` when one already exists for the
    /// schedule and date.
    fn create_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
        expected: u32,
        origin_host: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Tracker>, StoreError>;
    fn mark_emails_sent(&self, id: TrackerId) -> Result<(), StoreError>;
    fn find_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
    ) -> Result<Option<Tracker>, StoreError>;
    fn record_response(&self, new: &NewResponse) -> Result<RecordOutcome, StoreError>;
    fn claim_tracker(&self, id: TrackerId, now: DateTime<Utc>)
        -> Result<ClaimOutcome, StoreError>;
    fn complete_tracker(&self, id: TrackerId) -> Result<bool, StoreError>;
    fn release_claim(&self, id: TrackerId) -> Result<(), StoreError>;
    fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<u32, StoreError>;

    fn responses_for(
        &self,
        schedule_id: ScheduleId,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Vec<Response>, StoreError>;
    /// `None` when the tracker or the project/date already has an insight.
    fn insert_insight(&self, new: &NewInsight) -> Result<Option<Insight>, StoreError>;
    fn insight_for(
        &self,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Option<Insight>, StoreError>;

    fn insert_content(&self, new: &NewContent) -> Result<GeneratedContent, StoreError>;
    fn contents_for_project(&self, project_id: ProjectId)
        -> Result<Vec<GeneratedContent>, StoreError>;
}

// ---------------------------------------------------------------------------
// CheckinDb
// ---------------------------------------------------------------------------

pub struct CheckinDb {
    conn: Mutex<Connection>,
}

impl CheckinDb {
    /// Open or create the database at `path` and apply pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(StdDuration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".into()))
    }

    // -----------------------------------------------------------------------
    // Projects and members
    // -----------------------------------------------------------------------

    pub fn create_project(&self, project: &NewProject) -> Result<Project, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO projects (title, description, owner_id, start_date, end_date, active)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                project.title,
                project.description,
                project.owner_id,
                date_to_sql(project.start_date),
                date_to_sql(project.end_date),
            ],
        )?;
        let id = conn.last_insert_rowid();
        query_project(&conn, id)?.ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        query_project(&*self.conn()?, id)
    }

    pub fn projects_for_owner(&self, owner_id: i64) -> Result<Vec<Project>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, owner_id, start_date, end_date, active
             FROM projects WHERE owner_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![owner_id], map_project)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_project_active(&self, id: ProjectId, active: bool) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE projects SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        expect_one(changed, || format!("project {id}"))
    }

    pub fn add_member(
        &self,
        project_id: ProjectId,
        member: &NewMember,
    ) -> Result<ProjectMember, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO project_members (project_id, email, active, accepted, guest, creator)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project_id,
                member.email.trim(),
                member.active,
                member.accepted,
                member.guest,
                member.creator,
            ],
        )?;
        let id = conn.last_insert_rowid();
        query_member(&conn, id)?.ok_or_else(|| StoreError::NotFound(format!("member {id}")))
    }

    pub fn set_member_active(&self, id: MemberId, active: bool) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE project_members SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        expect_one(changed, || format!("member {id}"))
    }

    pub fn member(&self, id: MemberId) -> Result<Option<ProjectMember>, StoreError> {
        query_member(&*self.conn()?, id)
    }

    pub fn active_members(&self, project_id: ProjectId) -> Result<Vec<ProjectMember>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{MEMBER_COLUMNS} WHERE project_id = ?1 AND active = 1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![project_id], map_member)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Active member of `project_id` whose email matches, ignoring case and
    /// surrounding whitespace.
    pub fn find_active_member(
        &self,
        project_id: ProjectId,
        email: &str,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let conn = self.conn()?;
        let member = conn
            .query_row(
                &format!(
                    "{MEMBER_COLUMNS} WHERE project_id = ?1 AND active = 1
                     AND lower(trim(email)) = lower(trim(?2))"
                ),
                params![project_id, email],
                map_member,
            )
            .optional()?;
        Ok(member)
    }

    /// Member of `project_id` with this email, active or not.
    pub fn find_member(
        &self,
        project_id: ProjectId,
        email: &str,
    ) -> Result<Option<ProjectMember>, StoreError> {
        let conn = self.conn()?;
        let member = conn
            .query_row(
                &format!(
                    "{MEMBER_COLUMNS} WHERE project_id = ?1 AND lower(trim(email)) = lower(trim(?2))"
                ),
                params![project_id, email],
                map_member,
            )
            .optional()?;
        Ok(member)
    }

    // -----------------------------------------------------------------------
    // Schedules
    // -----------------------------------------------------------------------

    pub fn create_schedule(
        &self,
        project_id: ProjectId,
        times: &ScheduleTimes,
    ) -> Result<Schedule, StoreError> {
        let conn = self.conn()?;
        let row = ScheduleRow::from(times);
        conn.execute(
            "INSERT INTO schedules
                 (project_id, local_days, local_time, offset_hours, utc_days, utc_time, utc_hour)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project_id,
                row.local_days,
                row.local_time,
                row.offset_hours,
                row.utc_days,
                row.utc_time,
                row.utc_hour,
            ],
        )?;
        let id = conn.last_insert_rowid();
        query_schedule(&conn, "id", id)?.ok_or_else(|| StoreError::NotFound(format!("schedule {id}")))
    }

    /// Persist an edited schedule. Local and UTC columns are written together
    /// from the same [`ScheduleTimes`].
    pub fn update_schedule_times(
        &self,
        id: ScheduleId,
        times: &ScheduleTimes,
    ) -> Result<Schedule, StoreError> {
        let conn = self.conn()?;
        let row = ScheduleRow::from(times);
        let changed = conn.execute(
            "UPDATE schedules SET local_days = ?2, local_time = ?3, offset_hours = ?4,
                 utc_days = ?5, utc_time = ?6, utc_hour = ?7
             WHERE id = ?1",
            params![
                id,
                row.local_days,
                row.local_time,
                row.offset_hours,
                row.utc_days,
                row.utc_time,
                row.utc_hour,
            ],
        )?;
        expect_one(changed, || format!("schedule {id}"))?;
        query_schedule(&conn, "id", id)?.ok_or_else(|| StoreError::NotFound(format!("schedule {id}")))
    }

    pub fn set_schedule_active(&self, id: ScheduleId, active: bool) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE schedules SET active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        expect_one(changed, || format!("schedule {id}"))
    }

    pub fn set_schedule_ended(&self, id: ScheduleId, ended: bool) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE schedules SET ended = ?2 WHERE id = ?1",
            params![id, ended],
        )?;
        expect_one(changed, || format!("schedule {id}"))
    }

    pub fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        query_schedule(&*self.conn()?, "id", id)
    }

    pub fn schedule_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Schedule>, StoreError> {
        query_schedule(&*self.conn()?, "project_id", project_id)
    }

    /// Active, non-ended schedules that fire in the UTC hour containing `now`.
    pub fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        use chrono::Timelike;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SCHEDULE_COLUMNS} WHERE utc_hour = ?1 AND active = 1 AND ended = 0 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![now.hour()], map_schedule)?;
        let schedules = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(schedules.into_iter().filter(|s| s.times.is_due(now)).collect())
    }

    // -----------------------------------------------------------------------
    // Trackers
    // -----------------------------------------------------------------------

    /// Insert the tracker for `(schedule_id, local_date)` unless one exists.
    ///
    /// Returns `None` when another sweep already created it.
    pub fn create_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
        expected: u32,
        origin_host: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Tracker>, StoreError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO trackers (schedule_id, local_date, status, expected, created_at, origin_host)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (schedule_id, local_date) DO NOTHING",
            params![
                schedule_id,
                date_to_sql(local_date),
                TrackerStatus::Created.as_str(),
                expected,
                ts_to_sql(now),
                origin_host,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        query_tracker(&conn, conn.last_insert_rowid())
    }

    /// `created → emails_sent`. Later states are left alone.
    pub fn mark_emails_sent(&self, id: TrackerId) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE trackers SET status = ?2 WHERE id = ?1 AND status = ?3",
            params![
                id,
                TrackerStatus::EmailsSent.as_str(),
                TrackerStatus::Created.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn get_tracker(&self, id: TrackerId) -> Result<Option<Tracker>, StoreError> {
        query_tracker(&*self.conn()?, id)
    }

    pub fn find_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
    ) -> Result<Option<Tracker>, StoreError> {
        let conn = self.conn()?;
        let tracker = conn
            .query_row(
                &format!("{TRACKER_COLUMNS} WHERE schedule_id = ?1 AND local_date = ?2"),
                params![schedule_id, date_to_sql(local_date)],
                map_tracker,
            )
            .optional()?;
        Ok(tracker)
    }

    /// Append a response and count it against its tracker in one transaction.
    ///
    /// The completeness check, the duplicate check, the insert and the
    /// conditional increment all run under the same write lock, so two
    /// concurrent submissions can never both see themselves as last.
    pub fn record_response(&self, new: &NewResponse) -> Result<RecordOutcome, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let date = date_to_sql(new.local_date);

        let tracker = tx
            .query_row(
                &format!("{TRACKER_COLUMNS} WHERE schedule_id = ?1 AND local_date = ?2"),
                params![new.schedule_id, date],
                map_tracker,
            )
            .optional()?;
        let Some(tracker) = tracker else {
            return Ok(RecordOutcome::NoTracker);
        };
        if tracker.is_complete() {
            return Ok(RecordOutcome::AlreadyComplete);
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM responses
                 WHERE schedule_id = ?1 AND local_date = ?2 AND member_id = ?3",
                params![new.schedule_id, date, new.member_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(RecordOutcome::Duplicate);
        }

        let inserted = tx.execute(
            "INSERT INTO responses
                 (project_id, member_id, schedule_id, local_date, local_weekday,
                  did_yesterday, doing_today, blockers, has_blocker, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.project_id,
                new.member_id,
                new.schedule_id,
                date,
                new.local_weekday,
                new.fields.did_yesterday,
                new.fields.doing_today,
                new.fields.blockers,
                is_blocker_present(&new.fields.blockers),
                ts_to_sql(new.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Ok(RecordOutcome::Duplicate),
            Err(e) => return Err(e.into()),
        }
        let response_id = tx.last_insert_rowid();

        let bumped = tx.execute(
            "UPDATE trackers SET received = received + 1 WHERE id = ?1 AND received < expected",
            params![tracker.id],
        )?;
        if bumped == 0 {
            // Dropping `tx` rolls the insert back.
            return Ok(RecordOutcome::AlreadyComplete);
        }

        let response = tx.query_row(
            &format!("{RESPONSE_COLUMNS} WHERE id = ?1"),
            params![response_id],
            map_response,
        )?;
        let tracker = tx.query_row(
            &format!("{TRACKER_COLUMNS} WHERE id = ?1"),
            params![tracker.id],
            map_tracker,
        )?;
        tx.commit()?;

        let is_last = tracker.received == tracker.expected;
        Ok(RecordOutcome::Recorded {
            response,
            tracker,
            is_last,
        })
    }

    /// Compare-and-swap the tracker into `about_to_process`.
    ///
    /// Exactly one caller gets [`ClaimOutcome::Claimed`] per tracker until the
    /// claim is released or completed.
    pub fn claim_tracker(
        &self,
        id: TrackerId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE trackers SET status = ?2, claimed_at = ?3
             WHERE id = ?1 AND processed = 0 AND status IN (?4, ?5)",
            params![
                id,
                TrackerStatus::AboutToProcess.as_str(),
                ts_to_sql(now),
                TrackerStatus::Created.as_str(),
                TrackerStatus::EmailsSent.as_str(),
            ],
        )?;
        let tracker =
            query_tracker(&conn, id)?.ok_or_else(|| StoreError::NotFound(format!("tracker {id}")))?;
        if changed == 1 {
            return Ok(ClaimOutcome::Claimed(tracker));
        }
        if tracker.processed || tracker.status == TrackerStatus::Completed {
            Ok(ClaimOutcome::AlreadyProcessed)
        } else {
            Ok(ClaimOutcome::InProgress)
        }
    }

    /// `about_to_process → completed`, setting `processed`. Returns false if
    /// the tracker was not claimed.
    pub fn complete_tracker(&self, id: TrackerId) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE trackers SET status = ?2, processed = 1, claimed_at = NULL
             WHERE id = ?1 AND processed = 0 AND status = ?3",
            params![
                id,
                TrackerStatus::Completed.as_str(),
                TrackerStatus::AboutToProcess.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    /// Give a claim back after a failed summarization.
    pub fn release_claim(&self, id: TrackerId) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE trackers SET status = ?2, claimed_at = NULL
             WHERE id = ?1 AND processed = 0 AND status = ?3",
            params![
                id,
                TrackerStatus::EmailsSent.as_str(),
                TrackerStatus::AboutToProcess.as_str()
            ],
        )?;
        Ok(())
    }

    /// Release claims taken before `cutoff`; their holder is gone.
    ///
    /// Returns the number of trackers released.
    pub fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<u32, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE trackers SET status = ?1, claimed_at = NULL
             WHERE processed = 0 AND status = ?2 AND claimed_at < ?3",
            params![
                TrackerStatus::EmailsSent.as_str(),
                TrackerStatus::AboutToProcess.as_str(),
                ts_to_sql(cutoff)
            ],
        )?;
        Ok(u32::try_from(changed).unwrap_or(u32::MAX))
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    pub fn responses_for(
        &self,
        schedule_id: ScheduleId,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Vec<Response>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{RESPONSE_COLUMNS} WHERE schedule_id = ?1 AND project_id = ?2 AND local_date = ?3
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(
            params![schedule_id, project_id, date_to_sql(local_date)],
            map_response,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Responses with the given ids, in the order of `ids`.
    pub fn responses_by_ids(&self, ids: &[ResponseId]) -> Result<Vec<Response>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{RESPONSE_COLUMNS} WHERE id = ?1"))?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(response) = stmt.query_row(params![id], map_response).optional()? {
                out.push(response);
            }
        }
        Ok(out)
    }

    /// Updates and blocker counts per local date, for projects owned by
    /// `owner_id`, from `since` onwards.
    pub fn daily_activity(
        &self,
        owner_id: i64,
        since: NaiveDate,
    ) -> Result<Vec<DailyActivity>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.local_date, COUNT(*), COALESCE(SUM(r.has_blocker), 0)
             FROM responses r JOIN projects p ON r.project_id = p.id
             WHERE p.owner_id = ?1 AND r.local_date >= ?2
             GROUP BY r.local_date
             ORDER BY r.local_date",
        )?;
        let rows = stmt.query_map(params![owner_id, date_to_sql(since)], |row| {
            Ok(DailyActivity {
                date: date_from_sql(row, 0)?,
                updates: row.get(1)?,
                blockers: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // -----------------------------------------------------------------------
    // Insights
    // -----------------------------------------------------------------------

    /// Insert an insight. Returns `None` if the project already has one for
    /// that date (or the tracker already has one).
    pub fn insert_insight(&self, new: &NewInsight) -> Result<Option<Insight>, StoreError> {
        let conn = self.conn()?;
        let response_ids = serde_json::to_string(&new.response_ids)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let inserted = conn.execute(
            "INSERT INTO insights
                 (tracker_id, project_id, schedule_id, local_date, response_ids, summary,
                  blockers, diversion_range, diversion_context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.tracker_id,
                new.project_id,
                new.schedule_id,
                date_to_sql(new.local_date),
                response_ids,
                new.summary,
                new.blockers,
                new.diversion_range.as_str(),
                new.diversion_context,
                ts_to_sql(new.created_at),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        let insight = conn.query_row(
            &format!("{INSIGHT_COLUMNS} WHERE id = ?1"),
            params![id],
            map_insight,
        )?;
        Ok(Some(insight))
    }

    pub fn insight_for(
        &self,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Option<Insight>, StoreError> {
        let conn = self.conn()?;
        let insight = conn
            .query_row(
                &format!("{INSIGHT_COLUMNS} WHERE project_id = ?1 AND local_date = ?2"),
                params![project_id, date_to_sql(local_date)],
                map_insight,
            )
            .optional()?;
        Ok(insight)
    }

    // -----------------------------------------------------------------------
    // Generated content
    // -----------------------------------------------------------------------

    pub fn insert_content(&self, new: &NewContent) -> Result<GeneratedContent, StoreError> {
        let conn = self.conn()?;
        let mut insight_ids = new.insight_ids.clone();
        insight_ids.sort_unstable();
        insight_ids.dedup();
        let dates: Vec<String> = new.local_dates.iter().map(|d| date_to_sql(*d)).collect();
        let encode = |e: serde_json::Error| StoreError::Corrupt(e.to_string());
        conn.execute(
            "INSERT INTO generated_content
                 (project_id, owner_id, local_dates, insight_ids, content, content_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.project_id,
                new.owner_id,
                serde_json::to_string(&dates).map_err(encode)?,
                serde_json::to_string(&insight_ids).map_err(encode)?,
                new.content,
                new.content_type,
                ts_to_sql(new.created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        let content = conn.query_row(
            &format!("{CONTENT_COLUMNS} WHERE id = ?1"),
            params![id],
            map_content,
        )?;
        Ok(content)
    }

    pub fn contents_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<GeneratedContent>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{CONTENT_COLUMNS} WHERE project_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![project_id], map_content)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Distinct active member emails across every project `owner_id` owns.
    pub fn active_member_count_for_owner(&self, owner_id: i64) -> Result<u32, StoreError> {
        let count = self.conn()?.query_row(
            "SELECT COUNT(DISTINCT lower(m.email))
             FROM project_members m JOIN projects p ON m.project_id = p.id
             WHERE p.owner_id = ?1 AND m.active = 1",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl CheckinStore for CheckinDb {
    fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        CheckinDb::get_project(self, id)
    }

    fn member(&self, id: MemberId) -> Result<Option<ProjectMember>, StoreError> {
        CheckinDb::member(self, id)
    }

    fn active_members(&self, project_id: ProjectId) -> Result<Vec<ProjectMember>, StoreError> {
        CheckinDb::active_members(self, project_id)
    }

    fn find_active_member(
        &self,
        project_id: ProjectId,
        email: &str,
    ) -> Result<Option<ProjectMember>, StoreError> {
        CheckinDb::find_active_member(self, project_id, email)
    }

    fn get_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        CheckinDb::get_schedule(self, id)
    }

    fn schedule_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Schedule>, StoreError> {
        CheckinDb::schedule_for_project(self, project_id)
    }

    fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        CheckinDb::due_schedules(self, now)
    }

    fn create_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
        expected: u32,
        origin_host: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Tracker>, StoreError> {
        CheckinDb::create_tracker(self, schedule_id, local_date, expected, origin_host, now)
    }

    fn mark_emails_sent(&self, id: TrackerId) -> Result<(), StoreError> {
        CheckinDb::mark_emails_sent(self, id)
    }

    fn find_tracker(
        &self,
        schedule_id: ScheduleId,
        local_date: NaiveDate,
    ) -> Result<Option<Tracker>, StoreError> {
        CheckinDb::find_tracker(self, schedule_id, local_date)
    }

    fn record_response(&self, new: &NewResponse) -> Result<RecordOutcome, StoreError> {
        CheckinDb::record_response(self, new)
    }

    fn claim_tracker(
        &self,
        id: TrackerId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        CheckinDb::claim_tracker(self, id, now)
    }

    fn complete_tracker(&self, id: TrackerId) -> Result<bool, StoreError> {
        CheckinDb::complete_tracker(self, id)
    }

    fn release_claim(&self, id: TrackerId) -> Result<(), StoreError> {
        CheckinDb::release_claim(self, id)
    }

    fn release_stale_claims(&self, cutoff: DateTime<Utc>) -> Result<u32, StoreError> {
        CheckinDb::release_stale_claims(self, cutoff)
    }

    fn responses_for(
        &self,
        schedule_id: ScheduleId,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Vec<Response>, StoreError> {
        CheckinDb::responses_for(self, schedule_id, project_id, local_date)
    }

    fn insert_insight(&self, new: &NewInsight) -> Result<Option<Insight>, StoreError> {
        CheckinDb::insert_insight(self, new)
    }

    fn insight_for(
        &self,
        project_id: ProjectId,
        local_date: NaiveDate,
    ) -> Result<Option<Insight>, StoreError> {
        CheckinDb::insight_for(self, project_id, local_date)
    }

    fn insert_content(&self, new: &NewContent) -> Result<GeneratedContent, StoreError> {
        CheckinDb::insert_content(self, new)
    }

    fn contents_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<GeneratedContent>, StoreError> {
        CheckinDb::contents_for_project(self, project_id)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const MEMBER_COLUMNS: &str = "SELECT id, project_id, email, active, accepted, rejected, guest, creator
     FROM project_members";

const SCHEDULE_COLUMNS: &str =
    "SELECT id, project_id, local_days, local_time, offset_hours, utc_days, utc_time, active, ended
     FROM schedules";

const TRACKER_COLUMNS: &str = "SELECT id, schedule_id, local_date, status, expected, received,
         processed, created_at, origin_host, claimed_at
     FROM trackers";

const RESPONSE_COLUMNS: &str = "SELECT id, project_id, member_id, schedule_id, local_date,
         local_weekday, did_yesterday, doing_today, blockers, has_blocker, created_at
     FROM responses";

const INSIGHT_COLUMNS: &str = "SELECT id, tracker_id, project_id, schedule_id, local_date,
         response_ids, summary, blockers, diversion_range, diversion_context, created_at
     FROM insights";

const CONTENT_COLUMNS: &str = "SELECT id, project_id, owner_id, local_dates, insight_ids, content,
         content_type, created_at
     FROM generated_content";

fn query_project(conn: &Connection, id: ProjectId) -> Result<Option<Project>, StoreError> {
    let project = conn
        .query_row(
            "SELECT id, title, description, owner_id, start_date, end_date, active
             FROM projects WHERE id = ?1",
            params![id],
            map_project,
        )
        .optional()?;
    Ok(project)
}

fn query_member(conn: &Connection, id: MemberId) -> Result<Option<ProjectMember>, StoreError> {
    let member = conn
        .query_row(
            &format!("{MEMBER_COLUMNS} WHERE id = ?1"),
            params![id],
            map_member,
        )
        .optional()?;
    Ok(member)
}

fn query_schedule(
    conn: &Connection,
    column: &str,
    value: i64,
) -> Result<Option<Schedule>, StoreError> {
    let schedule = conn
        .query_row(
            &format!("{SCHEDULE_COLUMNS} WHERE {column} = ?1"),
            params![value],
            map_schedule,
        )
        .optional()?;
    Ok(schedule)
}

fn query_tracker(conn: &Connection, id: TrackerId) -> Result<Option<Tracker>, StoreError> {
    let tracker = conn
        .query_row(
            &format!("{TRACKER_COLUMNS} WHERE id = ?1"),
            params![id],
            map_tracker,
        )
        .optional()?;
    Ok(tracker)
}

fn map_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
        start_date: date_from_sql(row, 4)?,
        end_date: date_from_sql(row, 5)?,
        active: row.get(6)?,
    })
}

fn map_member(row: &Row<'_>) -> rusqlite::Result<ProjectMember> {
    Ok(ProjectMember {
        id: row.get(0)?,
        project_id: row.get(1)?,
        email: row.get(2)?,
        active: row.get(3)?,
        accepted: row.get(4)?,
        rejected: row.get(5)?,
        guest: row.get(6)?,
        creator: row.get(7)?,
    })
}

/// Rebuilds the UTC half from the stored local triple rather than trusting
/// the UTC columns; a mismatch is logged.
fn map_schedule(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    let id: ScheduleId = row.get(0)?;
    let local_days: String = row.get(2)?;
    let local_time: String = row.get(3)?;
    let offset_hours: i32 = row.get(4)?;
    let stored_utc_days: String = row.get(5)?;
    let stored_utc_time: String = row.get(6)?;

    let days: Vec<&str> = local_days.split(',').filter(|d| !d.is_empty()).collect();
    let days = parse_days(&days).map_err(|e| conversion_error(2, e))?;
    let time = NaiveTime::parse_from_str(&local_time, TIME_FORMAT)
        .map_err(|e| conversion_error(3, e))?;
    let times = ScheduleTimes::new(days, time, offset_hours).map_err(|e| conversion_error(4, e))?;

    let derived = ScheduleRow::from(&times);
    if derived.utc_days != stored_utc_days || derived.utc_time != stored_utc_time {
        tracing::warn!(
            schedule_id = id,
            stored_days = %stored_utc_days,
            stored_time = %stored_utc_time,
            "stored UTC schedule disagrees with local schedule; using recomputed values"
        );
    }

    Ok(Schedule {
        id,
        project_id: row.get(1)?,
        times,
        active: row.get(7)?,
        ended: row.get(8)?,
    })
}

fn map_tracker(row: &Row<'_>) -> rusqlite::Result<Tracker> {
    let status: String = row.get(3)?;
    let claimed_at: Option<String> = row.get(9)?;
    Ok(Tracker {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        local_date: date_from_sql(row, 2)?,
        status: status.parse().map_err(|e: String| conversion_error(3, e))?,
        expected: row.get(4)?,
        received: row.get(5)?,
        processed: row.get(6)?,
        created_at: ts_from_sql(row, 7)?,
        origin_host: row.get(8)?,
        claimed_at: claimed_at
            .map(|raw| parse_ts(&raw).map_err(|e| conversion_error(9, e)))
            .transpose()?,
    })
}

fn map_response(row: &Row<'_>) -> rusqlite::Result<Response> {
    Ok(Response {
        id: row.get(0)?,
        project_id: row.get(1)?,
        member_id: row.get(2)?,
        schedule_id: row.get(3)?,
        local_date: date_from_sql(row, 4)?,
        local_weekday: row.get(5)?,
        did_yesterday: row.get(6)?,
        doing_today: row.get(7)?,
        blockers: row.get(8)?,
        has_blocker: row.get(9)?,
        created_at: ts_from_sql(row, 10)?,
    })
}

fn map_insight(row: &Row<'_>) -> rusqlite::Result<Insight> {
    let response_ids: String = row.get(5)?;
    let diversion_range: String = row.get(8)?;
    Ok(Insight {
        id: row.get(0)?,
        tracker_id: row.get(1)?,
        project_id: row.get(2)?,
        schedule_id: row.get(3)?,
        local_date: date_from_sql(row, 4)?,
        response_ids: serde_json::from_str(&response_ids).map_err(|e| conversion_error(5, e))?,
        summary: row.get(6)?,
        blockers: row.get(7)?,
        diversion_range: diversion_range
            .parse()
            .map_err(|e: String| conversion_error(8, e))?,
        diversion_context: row.get(9)?,
        created_at: ts_from_sql(row, 10)?,
    })
}

fn map_content(row: &Row<'_>) -> rusqlite::Result<GeneratedContent> {
    let local_dates: String = row.get(3)?;
    let local_dates: Vec<String> =
        serde_json::from_str(&local_dates).map_err(|e| conversion_error(3, e))?;
    let local_dates = local_dates
        .iter()
        .map(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| conversion_error(3, e))?;
    let insight_ids: String = row.get(4)?;
    Ok(GeneratedContent {
        id: row.get(0)?,
        project_id: row.get(1)?,
        owner_id: row.get(2)?,
        local_dates,
        insight_ids: serde_json::from_str(&insight_ids).map_err(|e| conversion_error(4, e))?,
        content: row.get(5)?,
        content_type: row.get(6)?,
        created_at: ts_from_sql(row, 7)?,
    })
}

// ---------------------------------------------------------------------------
// Column encodings
// ---------------------------------------------------------------------------

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

struct ScheduleRow {
    local_days: String,
    local_time: String,
    offset_hours: i32,
    utc_days: String,
    utc_time: String,
    utc_hour: u32,
}

impl From<&ScheduleTimes> for ScheduleRow {
    fn from(times: &ScheduleTimes) -> Self {
        use chrono::Timelike;
        let join = |days: &[chrono::Weekday]| {
            days.iter()
                .map(|d| weekday_name(*d))
                .collect::<Vec<_>>()
                .join(",")
        };
        Self {
            local_days: join(times.local_days()),
            local_time: times.local_time().format(TIME_FORMAT).to_string(),
            offset_hours: times.offset_hours(),
            utc_days: join(times.utc_days()),
            utc_time: times.utc_time().format(TIME_FORMAT).to_string(),
            utc_hour: times.utc_time().hour(),
        }
    }
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

/// RFC 3339 with fixed microsecond precision, so text order is time order.
fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

fn ts_from_sql(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn expect_one(changed: usize, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if changed == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
