use anyhow::anyhow;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::app::classes::fetch_class;
use crate::app::notifications::NotificationQueue;
use crate::app::users::UserService;
use crate::app::{PageRequest, Paginated, ServiceError, ServiceResult};
use crate::domain::new_id;
use crate::domain::notification::NotificationPayload;
use crate::domain::session::{find_conflict, ScheduleCandidate, Session, SessionStatus, TimeRange};
use crate::domain::user::{Actor, Role};
use crate::infra::db::{from_millis, from_millis_opt, to_millis, Db};
use crate::infra::locks::ScheduleLocks;

pub const ONLY_STUDENTS_CAN_BOOK: &str = "Chỉ sinh viên mới có thể đặt buổi học";
pub const TUTOR_NOT_FOUND: &str = "Không tìm thấy gia sư";
pub const SESSION_NOT_FOUND: &str = "Không tìm thấy buổi học";
pub const STUDENT_NOT_FOUND: &str = "Không tìm thấy sinh viên";
pub const CLASS_NOT_FOUND: &str = "Không tìm thấy lớp học";
pub const TIME_CONFLICT: &str = "Gia sư đã có buổi học khác trong khung giờ này";
pub const SUBJECT_REQUIRED: &str = "Vui lòng nhập môn học";
pub const INVALID_TIME_RANGE: &str = "Thời gian kết thúc phải sau thời gian bắt đầu";
pub const START_IN_PAST: &str = "Không thể đặt buổi học trong quá khứ";
pub const MEETING_LINK_REQUIRED: &str = "Buổi học trực tuyến cần có link phòng học";
pub const LOCATION_REQUIRED: &str = "Buổi học trực tiếp cần có địa điểm";
pub const CLASS_TUTOR_MISMATCH: &str = "Lớp học không thuộc gia sư này";
pub const CLASS_SLOT_MISMATCH: &str = "Thời gian buổi học không khớp với lịch của lớp";
pub const NO_ACCESS: &str = "Bạn không có quyền truy cập buổi học này";
pub const NOT_ACTIVE: &str = "Chỉ có thể thay đổi buổi học đang chờ hoặc đã xác nhận";
pub const TUTOR_ONLY_STATUS: &str = "Chỉ gia sư của buổi học mới có thể cập nhật trạng thái";

const SESSION_COLUMNS: &str = "s.id, s.tutor_id, s.subject, s.topic, s.description, s.notes, \
     s.status, s.start_time, s.end_time, s.duration, s.is_online, s.meeting_link, s.location, \
     s.class_id, s.cancelled_by, s.cancel_reason, s.rescheduled_from, s.created_at, s.updated_at, \
     (SELECT group_concat(ss.student_id, ',') FROM session_students ss WHERE ss.session_id = s.id) \
     AS student_ids";

#[derive(Debug, Clone)]
pub struct NewSession {
    pub tutor_id: String,
    pub student_ids: Vec<String>,
    pub subject: String,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<SessionStatus>,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub is_online: Option<bool>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub tutor_id: Option<String>,
    pub student_id: Option<String>,
    pub class_id: Option<String>,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct SessionService {
    db: Db,
    queue: NotificationQueue,
    locks: ScheduleLocks,
}

impl SessionService {
    pub fn new(db: Db, queue: NotificationQueue, locks: ScheduleLocks) -> Self {
        Self { db, queue, locks }
    }

    pub async fn create_session(&self, actor: &Actor, input: NewSession) -> ServiceResult<Session> {
        if actor.role != Role::Student {
            return Err(ServiceError::forbidden(ONLY_STUDENTS_CAN_BOOK));
        }

        let users = UserService::new(self.db.clone());
        if users.find_with_role(&input.tutor_id, Role::Tutor).await?.is_none() {
            return Err(ServiceError::not_found(TUTOR_NOT_FOUND));
        }

        let subject = input.subject.trim().to_string();
        if subject.is_empty() {
            return Err(ServiceError::validation(SUBJECT_REQUIRED));
        }
        let range = validate_range(input.start_time, input.end_time)?;
        let (meeting_link, location) =
            validate_venue(input.is_online, input.meeting_link, input.location)?;

        let mut student_ids = vec![actor.user_id.clone()];
        for student_id in input.student_ids {
            if student_ids.contains(&student_id) {
                continue;
            }
            if users.find_with_role(&student_id, Role::Student).await?.is_none() {
                return Err(ServiceError::not_found(STUDENT_NOT_FOUND));
            }
            student_ids.push(student_id);
        }
        student_ids.sort();

        let _guard = self.locks.lock(&input.tutor_id).await;
        let mut tx = self.db.begin_write().await?;

        if let Some(class_id) = input.class_id.as_deref() {
            check_class_slot(&mut *tx, class_id, &input.tutor_id, &range).await?;
        }

        let candidate = ScheduleCandidate {
            tutor_id: &input.tutor_id,
            range,
            class_id: input.class_id.as_deref(),
            exclude_session_id: None,
        };
        ensure_no_conflict(&mut *tx, &candidate).await?;

        let now = OffsetDateTime::now_utc();
        let session = Session {
            id: new_id("ses"),
            tutor_id: input.tutor_id,
            student_ids,
            subject,
            topic: non_empty(input.topic),
            description: non_empty(input.description),
            notes: non_empty(input.notes),
            status: SessionStatus::Pending,
            start_time: range.start().to_offset(UtcOffset::UTC),
            end_time: range.end().to_offset(UtcOffset::UTC),
            duration: range.duration_minutes(),
            is_online: input.is_online,
            meeting_link,
            location,
            class_id: input.class_id,
            cancelled_by: None,
            cancel_reason: None,
            rescheduled_from: None,
            created_at: now,
            updated_at: now,
        };
        insert_session(&mut *tx, &session).await?;
        tx.commit().await?;
        drop(_guard);

        tracing::info!(
            session_id = %session.id,
            tutor_id = %session.tutor_id,
            student_id = %actor.user_id,
            "session booked"
        );

        let payload = NotificationPayload::new(
            "session_booked",
            "Buổi học mới",
            format!(
                "Buổi học {} lúc {} đã được đặt",
                session.subject,
                display_time(session.start_time)
            ),
        )
        .with_link(session_link(&session.id));
        self.queue
            .queue_notification(session.participants(), &payload, None)
            .await;

        Ok(session)
    }

    pub async fn get_session(&self, actor: &Actor, session_id: &str) -> ServiceResult<Session> {
        let mut conn = self.db.pool().acquire().await?;
        let session = fetch_session(&mut *conn, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(SESSION_NOT_FOUND))?;
        ensure_can_access(actor, &session)?;
        Ok(session)
    }

    pub async fn list_sessions(
        &self,
        actor: &Actor,
        filter: SessionFilter,
        page: PageRequest,
    ) -> ServiceResult<Paginated<Session>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sessions s WHERE 1 = 1");
        push_session_filters(&mut count, actor, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM sessions s WHERE 1 = 1",
            SESSION_COLUMNS
        ));
        push_session_filters(&mut select, actor, &filter);
        select
            .push(" ORDER BY s.start_time, s.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build().fetch_all(self.db.pool()).await?;

        let items = rows
            .iter()
            .map(session_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn update_session(
        &self,
        actor: &Actor,
        session_id: &str,
        patch: SessionPatch,
    ) -> ServiceResult<Session> {
        let tutor_id = self.get_session(actor, session_id).await?.tutor_id;

        let _guard = self.locks.lock(&tutor_id).await;
        let mut tx = self.db.begin_write().await?;
        let mut session = fetch_session(&mut *tx, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(SESSION_NOT_FOUND))?;

        if let Some(next) = patch.status {
            if next != session.status {
                if !(actor.is_management() || actor.user_id == session.tutor_id) {
                    return Err(ServiceError::forbidden(TUTOR_ONLY_STATUS));
                }
                if !session.status.can_transition_to(next) {
                    return Err(ServiceError::validation(format!(
                        "Không thể chuyển trạng thái từ {} sang {}",
                        session.status, next
                    )));
                }
                session.status = next;
            }
        }

        if let Some(subject) = patch.subject {
            let subject = subject.trim().to_string();
            if subject.is_empty() {
                return Err(ServiceError::validation(SUBJECT_REQUIRED));
            }
            session.subject = subject;
        }
        if patch.topic.is_some() {
            session.topic = non_empty(patch.topic);
        }
        if patch.description.is_some() {
            session.description = non_empty(patch.description);
        }
        if patch.notes.is_some() {
            session.notes = non_empty(patch.notes);
        }

        if patch.is_online.is_some() || patch.meeting_link.is_some() || patch.location.is_some() {
            let is_online = patch.is_online.unwrap_or(session.is_online);
            let (meeting_link, location) = validate_venue(
                is_online,
                patch.meeting_link.or(session.meeting_link.take()),
                patch.location.or(session.location.take()),
            )?;
            session.is_online = is_online;
            session.meeting_link = meeting_link;
            session.location = location;
        }

        if patch.start_time.is_some() || patch.end_time.is_some() {
            if !session.status.is_active() {
                return Err(ServiceError::validation(NOT_ACTIVE));
            }
            // The unchanged bound is read in the offset of the one that moved.
            let start = patch.start_time.unwrap_or_else(|| {
                let offset = patch
                    .end_time
                    .map_or(session.start_time.offset(), |end| end.offset());
                session.start_time.to_offset(offset)
            });
            let end = patch
                .end_time
                .unwrap_or_else(|| session.end_time.to_offset(start.offset()));
            let range = validate_range(start, end)?;
            self.check_new_slot(&mut *tx, &session, &range).await?;
            session.start_time = range.start().to_offset(UtcOffset::UTC);
            session.end_time = range.end().to_offset(UtcOffset::UTC);
            session.duration = range.duration_minutes();
        }

        session.updated_at = OffsetDateTime::now_utc();
        update_session_row(&mut *tx, &session).await?;
        tx.commit().await?;
        drop(_guard);

        tracing::info!(session_id = %session.id, status = %session.status, "session updated");

        let payload = NotificationPayload::new(
            "session_updated",
            "Buổi học được cập nhật",
            format!("Buổi học {} đã được cập nhật", session.subject),
        )
        .with_link(session_link(&session.id));
        self.queue
            .queue_notification(others(&session, actor), &payload, None)
            .await;

        Ok(session)
    }

    pub async fn cancel_session(
        &self,
        actor: &Actor,
        session_id: &str,
        reason: Option<String>,
    ) -> ServiceResult<Session> {
        let tutor_id = self.get_session(actor, session_id).await?.tutor_id;

        let _guard = self.locks.lock(&tutor_id).await;
        let mut tx = self.db.begin_write().await?;
        let mut session = fetch_session(&mut *tx, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(SESSION_NOT_FOUND))?;
        if !session.status.is_active() {
            return Err(ServiceError::validation(NOT_ACTIVE));
        }

        session.status = SessionStatus::Cancelled;
        session.cancelled_by = Some(actor.user_id.clone());
        session.cancel_reason = non_empty(reason);
        session.updated_at = OffsetDateTime::now_utc();
        update_session_row(&mut *tx, &session).await?;
        tx.commit().await?;
        drop(_guard);

        tracing::info!(session_id = %session.id, cancelled_by = %actor.user_id, "session cancelled");

        let message = match session.cancel_reason.as_deref() {
            Some(reason) => format!("Buổi học {} đã bị hủy: {}", session.subject, reason),
            None => format!("Buổi học {} đã bị hủy", session.subject),
        };
        let payload = NotificationPayload::new("session_cancelled", "Buổi học bị hủy", message)
            .with_link(session_link(&session.id));
        self.queue
            .queue_notification(others(&session, actor), &payload, None)
            .await;

        Ok(session)
    }

    pub async fn reschedule_session(
        &self,
        actor: &Actor,
        session_id: &str,
        start_time: OffsetDateTime,
        end_time: OffsetDateTime,
        reason: Option<String>,
    ) -> ServiceResult<Session> {
        let tutor_id = self.get_session(actor, session_id).await?.tutor_id;
        let range = validate_range(start_time, end_time)?;

        let _guard = self.locks.lock(&tutor_id).await;
        let mut tx = self.db.begin_write().await?;
        let mut session = fetch_session(&mut *tx, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(SESSION_NOT_FOUND))?;
        if !session.status.is_active() {
            return Err(ServiceError::validation(NOT_ACTIVE));
        }

        self.check_new_slot(&mut *tx, &session, &range).await?;

        session.rescheduled_from = Some(session.start_time);
        session.start_time = range.start().to_offset(UtcOffset::UTC);
        session.end_time = range.end().to_offset(UtcOffset::UTC);
        session.duration = range.duration_minutes();
        session.status = SessionStatus::Pending;
        session.updated_at = OffsetDateTime::now_utc();
        update_session_row(&mut *tx, &session).await?;
        tx.commit().await?;
        drop(_guard);

        tracing::info!(session_id = %session.id, rescheduled_by = %actor.user_id, "session rescheduled");

        let mut message = format!(
            "Buổi học {} được dời sang {}",
            session.subject,
            display_time(session.start_time)
        );
        if let Some(reason) = non_empty(reason) {
            message.push_str(&format!(" ({})", reason));
        }
        let payload = NotificationPayload::new("session_rescheduled", "Buổi học được dời lịch", message)
            .with_link(session_link(&session.id));
        self.queue
            .queue_notification(others(&session, actor), &payload, None)
            .await;

        Ok(session)
    }

    /// Runs the class-slot and tutor-conflict checks for moving `session` to
    /// `range`. Must be called under the tutor's schedule lock.
    async fn check_new_slot(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        range: &TimeRange,
    ) -> ServiceResult<()> {
        if let Some(class_id) = session.class_id.as_deref() {
            check_class_slot(conn, class_id, &session.tutor_id, range).await?;
        }
        let candidate = ScheduleCandidate {
            tutor_id: &session.tutor_id,
            range: *range,
            class_id: session.class_id.as_deref(),
            exclude_session_id: Some(&session.id),
        };
        ensure_no_conflict(conn, &candidate).await
    }
}

pub(crate) fn validate_range(start: OffsetDateTime, end: OffsetDateTime) -> ServiceResult<TimeRange> {
    let range = TimeRange::new(start, end)
        .ok_or_else(|| ServiceError::validation(INVALID_TIME_RANGE))?;
    if range.start() <= OffsetDateTime::now_utc() {
        return Err(ServiceError::validation(START_IN_PAST));
    }
    Ok(range)
}

/// Returns the `(meeting_link, location)` pair to store: online sessions keep
/// only the link, in-person sessions only the location.
pub(crate) fn validate_venue(
    is_online: bool,
    meeting_link: Option<String>,
    location: Option<String>,
) -> ServiceResult<(Option<String>, Option<String>)> {
    if is_online {
        let link = non_empty(meeting_link).ok_or_else(|| ServiceError::validation(MEETING_LINK_REQUIRED))?;
        Ok((Some(link), None))
    } else {
        let location = non_empty(location).ok_or_else(|| ServiceError::validation(LOCATION_REQUIRED))?;
        Ok((None, Some(location)))
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn check_class_slot(
    conn: &mut SqliteConnection,
    class_id: &str,
    tutor_id: &str,
    range: &TimeRange,
) -> ServiceResult<()> {
    let class = fetch_class(conn, class_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(CLASS_NOT_FOUND))?;
    if class.tutor_id != tutor_id {
        return Err(ServiceError::validation(CLASS_TUTOR_MISMATCH));
    }
    let slot = class.slot().map_err(|err| anyhow!("class {} has a bad slot: {}", class.id, err))?;
    if !slot.contains(range) {
        return Err(ServiceError::validation(CLASS_SLOT_MISMATCH));
    }
    Ok(())
}

pub(crate) async fn ensure_no_conflict(
    conn: &mut SqliteConnection,
    candidate: &ScheduleCandidate<'_>,
) -> ServiceResult<()> {
    let existing = active_sessions_for_tutor(conn, candidate.tutor_id).await?;
    if let Some(conflict) = find_conflict(candidate, &existing) {
        tracing::info!(
            tutor_id = %candidate.tutor_id,
            conflicting_session = %conflict.id,
            "schedule conflict"
        );
        return Err(ServiceError::conflict(TIME_CONFLICT));
    }
    Ok(())
}

fn ensure_can_access(actor: &Actor, session: &Session) -> ServiceResult<()> {
    if actor.is_management() || session.is_participant(&actor.user_id) {
        Ok(())
    } else {
        Err(ServiceError::forbidden(NO_ACCESS))
    }
}

fn others(session: &Session, actor: &Actor) -> Vec<String> {
    session
        .participants()
        .into_iter()
        .filter(|id| id != &actor.user_id)
        .collect()
}

fn session_link(session_id: &str) -> String {
    format!("/sessions/{}", session_id)
}

fn display_time(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[hour]:[minute] [day]/[month]/[year] UTC[offset_hour sign:mandatory]"))
        .unwrap_or_else(|_| value.to_string())
}

fn push_session_filters(builder: &mut QueryBuilder<'_, Sqlite>, actor: &Actor, filter: &SessionFilter) {
    match actor.role {
        Role::Student => {
            builder
                .push(" AND EXISTS (SELECT 1 FROM session_students v WHERE v.session_id = s.id AND v.student_id = ")
                .push_bind(actor.user_id.clone())
                .push(")");
        }
        Role::Tutor => {
            builder.push(" AND s.tutor_id = ").push_bind(actor.user_id.clone());
        }
        Role::Management => {}
    }

    if let Some(status) = filter.status {
        builder.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(tutor_id) = &filter.tutor_id {
        builder.push(" AND s.tutor_id = ").push_bind(tutor_id.clone());
    }
    if let Some(student_id) = &filter.student_id {
        builder
            .push(" AND EXISTS (SELECT 1 FROM session_students f WHERE f.session_id = s.id AND f.student_id = ")
            .push_bind(student_id.clone())
            .push(")");
    }
    if let Some(class_id) = &filter.class_id {
        builder.push(" AND s.class_id = ").push_bind(class_id.clone());
    }
    if let Some(from) = filter.from {
        builder.push(" AND s.end_time > ").push_bind(to_millis(from));
    }
    if let Some(to) = filter.to {
        builder.push(" AND s.start_time < ").push_bind(to_millis(to));
    }
}

pub(crate) async fn fetch_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> anyhow::Result<Option<Session>> {
    let row = sqlx::query(&format!("SELECT {} FROM sessions s WHERE s.id = ?", SESSION_COLUMNS))
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(session_from_row).transpose()
}

pub(crate) async fn active_sessions_for_tutor(
    conn: &mut SqliteConnection,
    tutor_id: &str,
) -> anyhow::Result<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions s \
         WHERE s.tutor_id = ? AND s.status IN ('pending', 'confirmed') \
         ORDER BY s.start_time",
        SESSION_COLUMNS
    ))
    .bind(tutor_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(session_from_row).collect()
}

pub(crate) async fn insert_session(conn: &mut SqliteConnection, session: &Session) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO sessions \
         (id, tutor_id, subject, topic, description, notes, status, start_time, end_time, duration, \
          is_online, meeting_link, location, class_id, cancelled_by, cancel_reason, rescheduled_from, \
          created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&session.id)
    .bind(&session.tutor_id)
    .bind(&session.subject)
    .bind(&session.topic)
    .bind(&session.description)
    .bind(&session.notes)
    .bind(session.status.as_str())
    .bind(to_millis(session.start_time))
    .bind(to_millis(session.end_time))
    .bind(session.duration)
    .bind(session.is_online)
    .bind(&session.meeting_link)
    .bind(&session.location)
    .bind(&session.class_id)
    .bind(&session.cancelled_by)
    .bind(&session.cancel_reason)
    .bind(session.rescheduled_from.map(to_millis))
    .bind(to_millis(session.created_at))
    .bind(to_millis(session.updated_at))
    .execute(&mut *conn)
    .await?;

    for student_id in &session.student_ids {
        sqlx::query("INSERT INTO session_students (session_id, student_id) VALUES (?, ?)")
            .bind(&session.id)
            .bind(student_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn update_session_row(conn: &mut SqliteConnection, session: &Session) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE sessions SET \
         subject = ?, topic = ?, description = ?, notes = ?, status = ?, start_time = ?, \
         end_time = ?, duration = ?, is_online = ?, meeting_link = ?, location = ?, \
         cancelled_by = ?, cancel_reason = ?, rescheduled_from = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&session.subject)
    .bind(&session.topic)
    .bind(&session.description)
    .bind(&session.notes)
    .bind(session.status.as_str())
    .bind(to_millis(session.start_time))
    .bind(to_millis(session.end_time))
    .bind(session.duration)
    .bind(session.is_online)
    .bind(&session.meeting_link)
    .bind(&session.location)
    .bind(&session.cancelled_by)
    .bind(&session.cancel_reason)
    .bind(session.rescheduled_from.map(to_millis))
    .bind(to_millis(session.updated_at))
    .bind(&session.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn session_from_row(row: &SqliteRow) -> anyhow::Result<Session> {
    let status: String = row.get("status");
    let student_ids: Option<String> = row.get("student_ids");
    let mut student_ids: Vec<String> = student_ids
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    student_ids.sort();

    Ok(Session {
        id: row.get("id"),
        tutor_id: row.get("tutor_id"),
        student_ids,
        subject: row.get("subject"),
        topic: row.get("topic"),
        description: row.get("description"),
        notes: row.get("notes"),
        status: status.parse().map_err(|err: String| anyhow!(err))?,
        start_time: from_millis(row.get("start_time"))?,
        end_time: from_millis(row.get("end_time"))?,
        duration: row.get("duration"),
        is_online: row.get("is_online"),
        meeting_link: row.get("meeting_link"),
        location: row.get("location"),
        class_id: row.get("class_id"),
        cancelled_by: row.get("cancelled_by"),
        cancel_reason: row.get("cancel_reason"),
        rescheduled_from: from_millis_opt(row.get("rescheduled_from"))?,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
