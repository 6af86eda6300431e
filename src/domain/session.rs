use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Rescheduled => "rescheduled",
        }
    }

    /// Pending and confirmed sessions hold their tutor's time slot.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed)
    }

    /// Transitions reachable through a plain update. Cancelling and
    /// rescheduling have their own operations.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Confirmed)
                | (SessionStatus::Rescheduled, SessionStatus::Confirmed)
                | (SessionStatus::Confirmed, SessionStatus::Completed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "rescheduled" => Ok(SessionStatus::Rescheduled),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl TimeRange {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    pub fn end(&self) -> OffsetDateTime {
        self.end
    }

    /// Adjacent ranges (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).whole_minutes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub tutor_id: String,
    pub student_ids: Vec<String>,
    pub subject: String,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub duration: i64,
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub class_id: Option<String>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub rescheduled_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.tutor_id == user_id || self.student_ids.iter().any(|id| id == user_id)
    }

    /// Everyone attached to the session: the tutor first, then students.
    pub fn participants(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.student_ids.len() + 1);
        ids.push(self.tutor_id.clone());
        ids.extend(self.student_ids.iter().cloned());
        ids
    }
}

/// A proposed placement on a tutor's calendar.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleCandidate<'a> {
    pub tutor_id: &'a str,
    pub range: TimeRange,
    pub class_id: Option<&'a str>,
    /// The session being moved, which never conflicts with itself.
    pub exclude_session_id: Option<&'a str>,
}

impl ScheduleCandidate<'_> {
    pub fn conflicts_with(&self, existing: &Session) -> bool {
        if existing.tutor_id != self.tutor_id || !existing.status.is_active() {
            return false;
        }
        if self.exclude_session_id == Some(existing.id.as_str()) {
            return false;
        }
        if let (Some(class_id), Some(existing_class)) = (self.class_id, existing.class_id.as_deref()) {
            if class_id == existing_class {
                return false;
            }
        }
        self.range.overlaps(&existing.range())
    }
}

pub fn find_conflict<'s>(
    candidate: &ScheduleCandidate<'_>,
    existing: &'s [Session],
) -> Option<&'s Session> {
    existing.iter().find(|session| candidate.conflicts_with(session))
}
