use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    models::{
        record::{format_time, hours_between},
        Activity, NewRecord,
    },
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Open,
    /// Record accepted by the store; the tracker drops back to `Idle` right after.
    Closed,
}

/// Append-only log of the activities registered during one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityLog {
    entries: Vec<Activity>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, activity: Activity) {
        self.entries.push(activity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.entries.iter()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Folds the log into the record for a session running from `entry` to
    /// `exit` on `date`. The log itself is left untouched so a failed
    /// submission can be retried; call [`reset`](Self::reset) once the store
    /// has accepted the record.
    pub fn flush(
        &self,
        date: NaiveDate,
        entry: NaiveTime,
        exit: NaiveTime,
    ) -> Result<NewRecord, ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::NoActivities);
        }
        for (position, activity) in self.entries.iter().enumerate() {
            activity.validate(position + 1)?;
        }

        let entry = truncate_to_minute(entry);
        let exit = truncate_to_minute(exit);

        Ok(NewRecord {
            date,
            entry_time: format_time(entry),
            exit_time: format_time(exit),
            hours_worked: hours_between(entry, exit),
            title: join_non_empty(self.entries.iter().map(|a| a.title.as_str()), ", "),
            description: join_non_empty(
                self.entries.iter().map(|a| a.description.as_str()),
                "\n\n",
            ),
            observations: join_non_empty(
                self.entries
                    .iter()
                    .filter_map(|a| a.observations.as_deref()),
                "\n\n",
            ),
            evidence: self
                .entries
                .iter()
                .flat_map(|a| a.evidence.iter().cloned())
                .collect(),
        })
    }
}

fn join_non_empty<'a>(parts: impl Iterator<Item = &'a str>, separator: &str) -> String {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    /// User id signed in when the session was opened.
    pub owner: Option<String>,
    pub date: Option<NaiveDate>,
    pub entry_time: Option<NaiveTime>,
    pub activities: ActivityLog,
    /// Set while a close is waiting on the store.
    pub submitting: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        owner: Option<String>,
        started_at: NaiveDateTime,
    ) {
        *self = Self {
            status: SessionStatus::Open,
            session_id: Some(session_id),
            owner,
            date: Some(started_at.date()),
            entry_time: Some(truncate_to_minute(started_at.time())),
            activities: ActivityLog::new(),
            submitting: false,
        };
    }

    /// Composes the record this session would produce if closed at `exit`.
    pub fn compose_record(&self, exit: NaiveDateTime) -> Result<NewRecord, ValidationError> {
        let date = self.date.unwrap_or_else(|| exit.date());
        let entry = self.entry_time.unwrap_or_else(|| exit.time());
        self.activities.flush(date, entry, exit.time())
    }

    /// A session opened while signed out may be closed by whoever signs in.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.as_deref().map_or(true, |owner| owner == user_id)
    }

    pub fn mark_closed(&mut self) {
        self.status = SessionStatus::Closed;
        self.submitting = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            date: self.date,
            entry_time: self.entry_time.map(format_time),
            activity_titles: self.activities.iter().map(|a| a.title.clone()).collect(),
            evidence_count: self.activities.iter().map(|a| a.evidence.len()).sum(),
            submitting: self.submitting,
        }
    }
}

/// Read-only view handed to observers and the console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub entry_time: Option<String>,
    pub activity_titles: Vec<String>,
    pub evidence_count: usize,
    pub submitting: bool,
}
