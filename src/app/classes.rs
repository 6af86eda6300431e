use anyhow::anyhow;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::app::notifications::NotificationQueue;
use crate::app::sessions::{
    active_sessions_for_tutor, insert_session, non_empty, validate_venue, CLASS_NOT_FOUND,
    TIME_CONFLICT, TUTOR_NOT_FOUND,
};
use crate::app::users::UserService;
use crate::app::{PageRequest, Paginated, ServiceError, ServiceResult};
use crate::domain::class::{Class, DayOfWeek, WeeklySlot};
use crate::domain::new_id;
use crate::domain::notification::NotificationPayload;
use crate::domain::session::{find_conflict, ScheduleCandidate, Session, SessionStatus};
use crate::domain::user::{Actor, Role};
use crate::infra::db::{from_millis, to_millis, Db};
use crate::infra::locks::ScheduleLocks;

pub const CLASS_CREATE_FORBIDDEN: &str = "Chỉ gia sư hoặc quản lý mới có thể tạo lớp học";
pub const CLASS_MANAGE_FORBIDDEN: &str = "Bạn không có quyền quản lý lớp học này";
pub const ONLY_STUDENTS_CAN_ENROLL: &str = "Chỉ sinh viên mới có thể đăng ký lớp học";
pub const CLASS_SLOT_TAKEN: &str = "Gia sư đã có lớp học khác trong khung giờ này";
pub const CLASS_FULL: &str = "Lớp học đã đủ sĩ số";
pub const ALREADY_ENROLLED: &str = "Bạn đã đăng ký lớp học này";
pub const NO_STUDENTS: &str = "Lớp học chưa có sinh viên đăng ký";
pub const SESSIONS_ALREADY_GENERATED: &str = "Các buổi học trong khoảng này đã được tạo";

const MAX_GENERATED_WEEKS: u32 = 20;

const CLASS_COLUMNS: &str = "id, tutor_id, code, subject, day, start_time, end_time, max_students, \
     current_enrollment, is_online, meeting_link, location, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewClass {
    pub tutor_id: Option<String>,
    pub code: String,
    pub subject: String,
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub max_students: i64,
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub tutor_id: Option<String>,
    pub subject: Option<String>,
}

#[derive(Clone)]
pub struct ClassService {
    db: Db,
    queue: NotificationQueue,
    locks: ScheduleLocks,
}

impl ClassService {
    pub fn new(db: Db, queue: NotificationQueue, locks: ScheduleLocks) -> Self {
        Self { db, queue, locks }
    }

    pub async fn create_class(&self, actor: &Actor, input: NewClass) -> ServiceResult<Class> {
        let tutor_id = match actor.role {
            Role::Tutor => match input.tutor_id {
                Some(tutor_id) if tutor_id != actor.user_id => {
                    return Err(ServiceError::forbidden(CLASS_MANAGE_FORBIDDEN));
                }
                _ => actor.user_id.clone(),
            },
            Role::Management => input
                .tutor_id
                .ok_or_else(|| ServiceError::validation("Vui lòng chọn gia sư cho lớp học"))?,
            Role::Student => return Err(ServiceError::forbidden(CLASS_CREATE_FORBIDDEN)),
        };

        let users = UserService::new(self.db.clone());
        if users.find_with_role(&tutor_id, Role::Tutor).await?.is_none() {
            return Err(ServiceError::not_found(TUTOR_NOT_FOUND));
        }

        let code = input.code.trim().to_string();
        let subject = input.subject.trim().to_string();
        if code.is_empty() || subject.is_empty() {
            return Err(ServiceError::validation("Vui lòng nhập mã lớp và môn học"));
        }
        if input.max_students < 1 {
            return Err(ServiceError::validation("Sĩ số tối đa phải lớn hơn 0"));
        }
        let slot = WeeklySlot::parse(input.day, &input.start_time, &input.end_time)
            .map_err(ServiceError::validation)?;
        let (meeting_link, location) =
            validate_venue(input.is_online, input.meeting_link, input.location)?;

        let _guard = self.locks.lock(&tutor_id).await;
        let mut tx = self.db.begin_write().await?;

        for existing in classes_for_tutor(&mut *tx, &tutor_id).await? {
            let existing_slot = existing
                .slot()
                .map_err(|err| anyhow!("class {} has a bad slot: {}", existing.id, err))?;
            if existing_slot.overlaps(&slot) {
                tracing::info!(tutor_id = %tutor_id, class_id = %existing.id, "class slot conflict");
                return Err(ServiceError::conflict(CLASS_SLOT_TAKEN));
            }
        }

        let now = OffsetDateTime::now_utc();
        let class = Class {
            id: new_id("cls"),
            tutor_id,
            code,
            subject,
            day: input.day,
            start_time: input.start_time,
            end_time: input.end_time,
            max_students: input.max_students,
            current_enrollment: 0,
            is_online: input.is_online,
            meeting_link,
            location,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO classes \
             (id, tutor_id, code, subject, day, start_time, end_time, max_students, \
              current_enrollment, is_online, meeting_link, location, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&class.id)
        .bind(&class.tutor_id)
        .bind(&class.code)
        .bind(&class.subject)
        .bind(class.day.as_str())
        .bind(&class.start_time)
        .bind(&class.end_time)
        .bind(class.max_students)
        .bind(class.current_enrollment)
        .bind(class.is_online)
        .bind(&class.meeting_link)
        .bind(&class.location)
        .bind(to_millis(class.created_at))
        .bind(to_millis(class.updated_at))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(class_id = %class.id, tutor_id = %class.tutor_id, "class created");
        Ok(class)
    }

    pub async fn get_class(&self, class_id: &str) -> ServiceResult<Class> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_class(&mut *conn, class_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(CLASS_NOT_FOUND))
    }

    pub async fn list_classes(
        &self,
        filter: ClassFilter,
        page: PageRequest,
    ) -> ServiceResult<Paginated<Class>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM classes WHERE 1 = 1");
        push_class_filters(&mut count, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM classes WHERE 1 = 1",
            CLASS_COLUMNS
        ));
        push_class_filters(&mut select, &filter);
        select
            .push(" ORDER BY code, id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build().fetch_all(self.db.pool()).await?;

        let items = rows
            .iter()
            .map(class_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn enroll(&self, actor: &Actor, class_id: &str) -> ServiceResult<Class> {
        if actor.role != Role::Student {
            return Err(ServiceError::forbidden(ONLY_STUDENTS_CAN_ENROLL));
        }

        let mut tx = self.db.begin_write().await?;
        let class = fetch_class(&mut *tx, class_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(CLASS_NOT_FOUND))?;

        let enrolled: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM class_enrollments WHERE class_id = ? AND student_id = ?",
        )
        .bind(&class.id)
        .bind(&actor.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if enrolled.is_some() {
            return Err(ServiceError::validation(ALREADY_ENROLLED));
        }

        let now = OffsetDateTime::now_utc();
        let updated = sqlx::query(
            "UPDATE classes \
             SET current_enrollment = current_enrollment + 1, updated_at = ? \
             WHERE id = ? AND current_enrollment < max_students",
        )
        .bind(to_millis(now))
        .bind(&class.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ServiceError::validation(CLASS_FULL));
        }

        sqlx::query(
            "INSERT INTO class_enrollments (class_id, student_id, enrolled_at) VALUES (?, ?, ?)",
        )
        .bind(&class.id)
        .bind(&actor.user_id)
        .bind(to_millis(now))
        .execute(&mut *tx)
        .await?;

        let class = fetch_class(&mut *tx, class_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(CLASS_NOT_FOUND))?;
        tx.commit().await?;

        tracing::info!(class_id = %class.id, student_id = %actor.user_id, "student enrolled");

        let payload = NotificationPayload::new(
            "class_enrollment",
            "Sinh viên mới đăng ký",
            format!("Lớp {} có sinh viên mới đăng ký", class.code),
        )
        .with_link(format!("/classes/{}", class.id));
        self.queue
            .queue_notification(class.tutor_id.clone(), &payload, None)
            .await;

        Ok(class)
    }

    /// Creates one confirmed session per weekly occurrence of the class for
    /// its enrolled students. The batch is all-or-nothing.
    pub async fn generate_sessions(
        &self,
        actor: &Actor,
        class_id: &str,
        from: Date,
        weeks: u32,
        offset: UtcOffset,
    ) -> ServiceResult<Vec<Session>> {
        if weeks == 0 || weeks > MAX_GENERATED_WEEKS {
            return Err(ServiceError::validation(format!(
                "Số tuần phải từ 1 đến {}",
                MAX_GENERATED_WEEKS
            )));
        }

        let class = self.get_class(class_id).await?;
        if !(actor.is_management() || actor.user_id == class.tutor_id) {
            return Err(ServiceError::forbidden(CLASS_MANAGE_FORBIDDEN));
        }
        let slot = class
            .slot()
            .map_err(|err| anyhow!("class {} has a bad slot: {}", class.id, err))?;

        let now = OffsetDateTime::now_utc();
        let ranges: Vec<_> = slot
            .occurrences(from, weeks, offset)
            .into_iter()
            .filter(|range| range.start() > now)
            .collect();
        if ranges.is_empty() {
            return Err(ServiceError::validation("Không có buổi học nào trong tương lai để tạo"));
        }

        let _guard = self.locks.lock(&class.tutor_id).await;
        let mut tx = self.db.begin_write().await?;

        let student_ids: Vec<String> = sqlx::query_scalar(
            "SELECT student_id FROM class_enrollments WHERE class_id = ? ORDER BY student_id",
        )
        .bind(&class.id)
        .fetch_all(&mut *tx)
        .await?;
        if student_ids.is_empty() {
            return Err(ServiceError::validation(NO_STUDENTS));
        }

        // A week whose start already holds a session of this class, in any
        // status, was generated before.
        let generated: Vec<i64> =
            sqlx::query_scalar("SELECT start_time FROM sessions WHERE class_id = ?")
                .bind(&class.id)
                .fetch_all(&mut *tx)
                .await?;
        let ranges: Vec<_> = ranges
            .into_iter()
            .filter(|range| !generated.contains(&to_millis(range.start())))
            .collect();
        if ranges.is_empty() {
            return Err(ServiceError::validation(SESSIONS_ALREADY_GENERATED));
        }

        let existing = active_sessions_for_tutor(&mut *tx, &class.tutor_id).await?;
        let mut sessions = Vec::with_capacity(ranges.len());
        for range in ranges {
            let candidate = ScheduleCandidate {
                tutor_id: &class.tutor_id,
                range,
                class_id: Some(&class.id),
                exclude_session_id: None,
            };
            if let Some(conflict) = find_conflict(&candidate, &existing) {
                tracing::info!(
                    class_id = %class.id,
                    conflicting_session = %conflict.id,
                    "generated session conflicts"
                );
                return Err(ServiceError::conflict(TIME_CONFLICT));
            }

            let session = Session {
                id: new_id("ses"),
                tutor_id: class.tutor_id.clone(),
                student_ids: student_ids.clone(),
                subject: class.subject.clone(),
                topic: None,
                description: None,
                notes: None,
                status: SessionStatus::Confirmed,
                start_time: range.start().to_offset(UtcOffset::UTC),
                end_time: range.end().to_offset(UtcOffset::UTC),
                duration: range.duration_minutes(),
                is_online: class.is_online,
                meeting_link: non_empty(class.meeting_link.clone()),
                location: non_empty(class.location.clone()),
                class_id: Some(class.id.clone()),
                cancelled_by: None,
                cancel_reason: None,
                rescheduled_from: None,
                created_at: now,
                updated_at: now,
            };
            insert_session(&mut *tx, &session).await?;
            sessions.push(session);
        }
        tx.commit().await?;
        drop(_guard);

        tracing::info!(class_id = %class.id, count = sessions.len(), "class sessions generated");

        let mut recipients = vec![class.tutor_id.clone()];
        recipients.extend(student_ids);
        let payload = NotificationPayload::new(
            "class_sessions_generated",
            "Lịch học mới",
            format!("Lớp {} đã có {} buổi học mới", class.code, sessions.len()),
        )
        .with_link(format!("/classes/{}", class.id));
        self.queue.queue_notification(recipients, &payload, None).await;

        Ok(sessions)
    }
}

fn push_class_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ClassFilter) {
    if let Some(tutor_id) = &filter.tutor_id {
        builder.push(" AND tutor_id = ").push_bind(tutor_id.clone());
    }
    if let Some(subject) = &filter.subject {
        builder.push(" AND subject = ").push_bind(subject.clone());
    }
}

pub(crate) async fn fetch_class(
    conn: &mut SqliteConnection,
    class_id: &str,
) -> anyhow::Result<Option<Class>> {
    let row = sqlx::query(&format!("SELECT {} FROM classes WHERE id = ?", CLASS_COLUMNS))
        .bind(class_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(class_from_row).transpose()
}

async fn classes_for_tutor(conn: &mut SqliteConnection, tutor_id: &str) -> anyhow::Result<Vec<Class>> {
    let rows = sqlx::query(&format!("SELECT {} FROM classes WHERE tutor_id = ?", CLASS_COLUMNS))
        .bind(tutor_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(class_from_row).collect()
}

pub(crate) fn class_from_row(row: &SqliteRow) -> anyhow::Result<Class> {
    let day: String = row.get("day");
    Ok(Class {
        id: row.get("id"),
        tutor_id: row.get("tutor_id"),
        code: row.get("code"),
        subject: row.get("subject"),
        day: day.parse().map_err(|err: String| anyhow!(err))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        max_students: row.get("max_students"),
        current_enrollment: row.get("current_enrollment"),
        is_online: row.get("is_online"),
        meeting_link: row.get("meeting_link"),
        location: row.get("location"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
