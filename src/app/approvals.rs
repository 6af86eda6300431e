use anyhow::anyhow;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use time::OffsetDateTime;

use crate::app::classes::fetch_class;
use crate::app::notifications::NotificationQueue;
use crate::app::sessions::{non_empty, validate_venue, CLASS_NOT_FOUND};
use crate::app::{PageRequest, Paginated, ServiceError, ServiceResult};
use crate::domain::approval::{
    ApprovalChange, ApprovalRequest, ApprovalStatus, ContentModerationData, ResourceAllocationData,
};
use crate::domain::moderation::ModerationAction;
use crate::domain::new_id;
use crate::domain::notification::NotificationPayload;
use crate::domain::user::{Actor, Role};
use crate::infra::db::{from_millis, from_millis_opt, to_millis, Db};

pub const APPROVAL_NOT_FOUND: &str = "Không tìm thấy yêu cầu phê duyệt";
pub const APPROVAL_ALREADY_REVIEWED: &str = "Yêu cầu này đã được xử lý";
pub const MANAGEMENT_ONLY: &str = "Chỉ quản lý mới có thể xử lý yêu cầu phê duyệt";
pub const STUDENTS_CANNOT_REQUEST: &str = "Sinh viên không thể tạo yêu cầu phê duyệt";
pub const CAPACITY_BELOW_ENROLLMENT: &str = "Sĩ số tối đa không thể nhỏ hơn số sinh viên đã đăng ký";

const APPROVAL_COLUMNS: &str = "id, requester_id, kind, title, description, payload, status, \
     reviewer_id, review_note, created_at, reviewed_at";

#[derive(Debug, Clone)]
pub struct NewApproval {
    pub title: String,
    pub description: Option<String>,
    pub change: ApprovalChange,
}

#[derive(Clone)]
pub struct ApprovalService {
    db: Db,
    queue: NotificationQueue,
}

impl ApprovalService {
    pub fn new(db: Db, queue: NotificationQueue) -> Self {
        Self { db, queue }
    }

    pub async fn create_approval(
        &self,
        actor: &Actor,
        input: NewApproval,
    ) -> ServiceResult<ApprovalRequest> {
        if actor.role == Role::Student {
            return Err(ServiceError::forbidden(STUDENTS_CANNOT_REQUEST));
        }
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::validation("Vui lòng nhập tiêu đề yêu cầu"));
        }

        match &input.change {
            ApprovalChange::ResourceAllocation(data) => {
                if data.is_empty() {
                    return Err(ServiceError::validation("Yêu cầu phân bổ không có thay đổi nào"));
                }
                let mut conn = self.db.pool().acquire().await?;
                if fetch_class(&mut *conn, &data.class_id).await?.is_none() {
                    return Err(ServiceError::not_found(CLASS_NOT_FOUND));
                }
            }
            ApprovalChange::ContentModeration(data) => {
                if data.content_id.trim().is_empty() {
                    return Err(ServiceError::validation("Vui lòng chọn nội dung cần kiểm duyệt"));
                }
            }
        }

        let request = ApprovalRequest {
            id: new_id("apr"),
            requester_id: actor.user_id.clone(),
            title,
            description: non_empty(input.description),
            status: ApprovalStatus::Pending,
            change: input.change,
            reviewer_id: None,
            review_note: None,
            created_at: OffsetDateTime::now_utc(),
            reviewed_at: None,
        };
        let payload = serde_json::to_string(&request.change).map_err(anyhow::Error::from)?;

        sqlx::query(
            "INSERT INTO approval_requests \
             (id, requester_id, kind, title, description, payload, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.requester_id)
        .bind(request.change.kind())
        .bind(&request.title)
        .bind(&request.description)
        .bind(payload)
        .bind(request.status.as_str())
        .bind(to_millis(request.created_at))
        .execute(self.db.pool())
        .await?;

        tracing::info!(approval_id = %request.id, kind = request.change.kind(), "approval requested");

        let managers: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE role = 'management'")
            .fetch_all(self.db.pool())
            .await?;
        let notice = NotificationPayload::new(
            "approval_requested",
            "Yêu cầu phê duyệt mới",
            request.title.clone(),
        )
        .with_link(approval_link(&request.id));
        self.queue.queue_notification(managers, &notice, None).await;

        Ok(request)
    }

    pub async fn list_approvals(
        &self,
        actor: &Actor,
        status: Option<ApprovalStatus>,
        page: PageRequest,
    ) -> ServiceResult<Paginated<ApprovalRequest>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM approval_requests WHERE 1 = 1");
        push_approval_filters(&mut count, actor, status);
        let total: i64 = count.build_query_scalar().fetch_one(self.db.pool()).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM approval_requests WHERE 1 = 1",
            APPROVAL_COLUMNS
        ));
        push_approval_filters(&mut select, actor, status);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build().fetch_all(self.db.pool()).await?;

        let items = rows
            .iter()
            .map(approval_from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get_approval(&self, actor: &Actor, approval_id: &str) -> ServiceResult<ApprovalRequest> {
        let mut conn = self.db.pool().acquire().await?;
        let request = fetch_approval(&mut *conn, approval_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(APPROVAL_NOT_FOUND))?;
        if !(actor.is_management() || actor.user_id == request.requester_id) {
            return Err(ServiceError::forbidden("Bạn không có quyền xem yêu cầu này"));
        }
        Ok(request)
    }

    /// Applies the request's change and marks it approved in one transaction.
    pub async fn approve(
        &self,
        reviewer: &Actor,
        approval_id: &str,
        note: Option<String>,
    ) -> ServiceResult<ApprovalRequest> {
        self.review(reviewer, approval_id, ApprovalStatus::Approved, note)
            .await
    }

    pub async fn reject(
        &self,
        reviewer: &Actor,
        approval_id: &str,
        note: Option<String>,
    ) -> ServiceResult<ApprovalRequest> {
        self.review(reviewer, approval_id, ApprovalStatus::Rejected, note)
            .await
    }

    async fn review(
        &self,
        reviewer: &Actor,
        approval_id: &str,
        decision: ApprovalStatus,
        note: Option<String>,
    ) -> ServiceResult<ApprovalRequest> {
        if !reviewer.is_management() {
            return Err(ServiceError::forbidden(MANAGEMENT_ONLY));
        }

        let mut tx = self.db.begin_write().await?;
        let mut request = fetch_approval(&mut *tx, approval_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(APPROVAL_NOT_FOUND))?;
        if request.status != ApprovalStatus::Pending {
            return Err(ServiceError::validation(APPROVAL_ALREADY_REVIEWED));
        }

        let now = OffsetDateTime::now_utc();
        if decision == ApprovalStatus::Approved {
            match &request.change {
                ApprovalChange::ResourceAllocation(data) => {
                    apply_resource_allocation(&mut *tx, data, now).await?;
                }
                ApprovalChange::ContentModeration(data) => {
                    apply_content_moderation(&mut *tx, &request.id, &reviewer.user_id, data, now)
                        .await?;
                }
            }
        }

        request.status = decision;
        request.reviewer_id = Some(reviewer.user_id.clone());
        request.review_note = non_empty(note);
        request.reviewed_at = Some(now);

        let updated = sqlx::query(
            "UPDATE approval_requests \
             SET status = ?, reviewer_id = ?, review_note = ?, reviewed_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(request.status.as_str())
        .bind(&request.reviewer_id)
        .bind(&request.review_note)
        .bind(to_millis(now))
        .bind(&request.id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ServiceError::validation(APPROVAL_ALREADY_REVIEWED));
        }
        tx.commit().await?;

        tracing::info!(
            approval_id = %request.id,
            reviewer_id = %reviewer.user_id,
            status = %request.status,
            "approval reviewed"
        );

        let (title, verdict) = match decision {
            ApprovalStatus::Approved => ("Yêu cầu được phê duyệt", "đã được phê duyệt"),
            _ => ("Yêu cầu bị từ chối", "đã bị từ chối"),
        };
        let notice = NotificationPayload::new(
            "approval_reviewed",
            title,
            format!("Yêu cầu \"{}\" {}", request.title, verdict),
        )
        .with_link(approval_link(&request.id));
        self.queue
            .queue_notification(request.requester_id.clone(), &notice, None)
            .await;

        Ok(request)
    }

    pub async fn list_audit(
        &self,
        cursor: Option<(OffsetDateTime, String)>,
        limit: i64,
    ) -> ServiceResult<Vec<ModerationAction>> {
        let rows = match cursor {
            Some((created_at, action_id)) => {
                sqlx::query(
                    "SELECT id, actor_id, approval_id, content_type, content_id, action, reason, created_at \
                     FROM moderation_actions \
                     WHERE (created_at < ?1 OR (created_at = ?1 AND id < ?2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT ?3",
                )
                .bind(to_millis(created_at))
                .bind(action_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, actor_id, approval_id, content_type, content_id, action, reason, created_at \
                     FROM moderation_actions \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT ?",
                )
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut actions = Vec::with_capacity(rows.len());
        for row in rows {
            let content_type: String = row.get("content_type");
            let action: String = row.get("action");
            actions.push(ModerationAction {
                id: row.get("id"),
                actor_id: row.get("actor_id"),
                approval_id: row.get("approval_id"),
                content_type: parse_enum(&content_type)?,
                content_id: row.get("content_id"),
                action: parse_enum(&action)?,
                reason: row.get("reason"),
                created_at: from_millis(row.get("created_at"))?,
            });
        }
        Ok(actions)
    }
}

async fn apply_resource_allocation(
    conn: &mut SqliteConnection,
    data: &ResourceAllocationData,
    now: OffsetDateTime,
) -> ServiceResult<()> {
    let class = fetch_class(conn, &data.class_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(CLASS_NOT_FOUND))?;
    if let Some(max_students) = data.max_students {
        if max_students < 1 || max_students < class.current_enrollment {
            return Err(ServiceError::validation(CAPACITY_BELOW_ENROLLMENT));
        }
    }

    // The class keeps only the venue field that matches its mode.
    let (meeting_link, location) = validate_venue(
        class.is_online,
        non_empty(data.meeting_link.clone()).or(class.meeting_link.clone()),
        non_empty(data.location.clone()).or(class.location.clone()),
    )?;

    sqlx::query(
        "UPDATE classes SET \
         location = ?, \
         meeting_link = ?, \
         max_students = COALESCE(?, max_students), \
         updated_at = ? \
         WHERE id = ?",
    )
    .bind(location)
    .bind(meeting_link)
    .bind(data.max_students)
    .bind(to_millis(now))
    .bind(&class.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(class_id = %class.id, "resource allocation applied");
    Ok(())
}

async fn apply_content_moderation(
    conn: &mut SqliteConnection,
    approval_id: &str,
    actor_id: &str,
    data: &ContentModerationData,
    now: OffsetDateTime,
) -> ServiceResult<()> {
    let action_id = new_id("mod");
    sqlx::query(
        "INSERT INTO moderation_actions \
         (id, actor_id, approval_id, content_type, content_id, action, reason, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&action_id)
    .bind(actor_id)
    .bind(approval_id)
    .bind(data.content_type.as_str())
    .bind(&data.content_id)
    .bind(data.action.as_str())
    .bind(&data.reason)
    .bind(to_millis(now))
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        action_id = %action_id,
        content_id = %data.content_id,
        action = data.action.as_str(),
        "content moderation applied"
    );
    Ok(())
}

fn push_approval_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    actor: &Actor,
    status: Option<ApprovalStatus>,
) {
    if !actor.is_management() {
        builder.push(" AND requester_id = ").push_bind(actor.user_id.clone());
    }
    if let Some(status) = status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn approval_link(approval_id: &str) -> String {
    format!("/approvals/{}", approval_id)
}

async fn fetch_approval(
    conn: &mut SqliteConnection,
    approval_id: &str,
) -> anyhow::Result<Option<ApprovalRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM approval_requests WHERE id = ?",
        APPROVAL_COLUMNS
    ))
    .bind(approval_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(approval_from_row).transpose()
}

fn approval_from_row(row: &SqliteRow) -> anyhow::Result<ApprovalRequest> {
    let status: String = row.get("status");
    let payload: String = row.get("payload");
    Ok(ApprovalRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: status.parse().map_err(|err: String| anyhow!(err))?,
        change: serde_json::from_str(&payload)?,
        reviewer_id: row.get("reviewer_id"),
        review_note: row.get("review_note"),
        created_at: from_millis(row.get("created_at"))?,
        reviewed_at: from_millis_opt(row.get("reviewed_at"))?,
    })
}

/// Reads a snake_case enum stored as plain text.
fn parse_enum<T: DeserializeOwned>(value: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|err| anyhow!("unexpected stored value {}: {}", value, err))
}
