use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::app::approvals::NewApproval;
use crate::app::classes::{ClassFilter, NewClass};
use crate::app::sessions::{NewSession, SessionFilter, SessionPatch};
use crate::app::PageRequest;
use crate::app::Paginated;
use crate::domain::approval::{ApprovalChange, ApprovalRequest, ApprovalStatus};
use crate::domain::class::{Class, DayOfWeek};
use crate::domain::moderation::ModerationAction;
use crate::domain::notification::{Notification, NotificationJob};
use crate::domain::session::{Session, SessionStatus};
use crate::domain::user::{PublicUser, Role, User};
use crate::http::error::{ApiResult, CreatedResult};
use crate::http::{AdminToken, ApiResponse, AppError, AuthUser};
use crate::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 20;
const MAX_PAGE_LIMIT: i64 = 100;
const MANAGEMENT_REQUIRED: &str = "Chỉ quản lý mới có quyền truy cập";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct CursorQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn page_request(page: Option<i64>, limit: Option<i64>) -> Result<PageRequest, AppError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::bad_request("page must be at least 1"));
    }
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 100"));
    }
    if (page - 1).checked_mul(limit).is_none() {
        return Err(AppError::bad_request("page is too large"));
    }
    Ok(PageRequest { page, limit })
}

fn cursor_limit(limit: Option<i64>) -> Result<i64, AppError> {
    let limit = limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    Ok(limit)
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, String)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id.to_string())))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, String)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

/// Splits off the lookahead row fetched past `limit` and turns it into a cursor.
fn paginate_by_cursor<T>(
    mut items: Vec<T>,
    limit: i64,
    key: impl Fn(&T) -> (OffsetDateTime, String),
) -> ListResponse<T> {
    let next_cursor = if items.len() > limit as usize {
        items.truncate(limit as usize);
        items.last().map(&key)
    } else {
        None
    };
    ListResponse {
        items,
        next_cursor: encode_cursor(next_cursor),
    }
}

fn require_management(auth: &AuthUser) -> Result<(), AppError> {
    if auth.role == Role::Management {
        Ok(())
    } else {
        Err(AppError::forbidden(MANAGEMENT_REQUIRED))
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<crate::app::auth::TokenPair> for AuthTokenResponse {
    fn from(tokens: crate::app::auth::TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<AuthTokenResponse> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = state
        .auth_service()
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(ApiResponse::ok(tokens.into())),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<AuthTokenResponse> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refreshToken is required"));
    }

    let tokens = state
        .auth_service()
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(ApiResponse::ok(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<RevokeResponse> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refreshToken is required"));
    }

    let revoked = state
        .auth_service()
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(ApiResponse::ok(RevokeResponse { revoked }))
}

pub async fn get_current_user(auth: AuthUser, State(state): State<AppState>) -> ApiResult<User> {
    let user = state
        .auth_service()
        .get_current_user(&auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(ApiResponse::ok(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password: String,
}

pub async fn create_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> CreatedResult<User> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.full_name.trim().is_empty() {
        return Err(AppError::bad_request("fullName cannot be empty"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let user = state
        .user_service()
        .create_user(
            &payload.email,
            &payload.full_name,
            payload.role,
            &payload.password,
        )
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.is_unique_violation() {
                        return AppError::conflict("Email already taken");
                    }
                }
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    Ok(ApiResponse::created(user, "Tạo người dùng thành công"))
}

pub async fn get_user(Path(id): Path<String>, State(state): State<AppState>) -> ApiResult<PublicUser> {
    let user = state.user_service().get_user(&id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match user {
        Some(user) => Ok(ApiResponse::ok(user.into())),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn list_tutors(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<PublicUser>> {
    let page = page_request(query.page, query.limit)?;
    let tutors = state
        .user_service()
        .list_by_role(Role::Tutor, page.limit, page.offset())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list tutors");
            AppError::internal("failed to list tutors")
        })?;

    Ok(ApiResponse::ok(tutors.into_iter().map(PublicUser::from).collect()))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub tutor_id: String,
    #[serde(default)]
    pub student_ids: Vec<String>,
    pub subject: String,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    #[serde(default)]
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub class_id: Option<String>,
}

pub async fn create_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> CreatedResult<Session> {
    let input = NewSession {
        tutor_id: payload.tutor_id,
        student_ids: payload.student_ids,
        subject: payload.subject,
        topic: payload.topic,
        description: payload.description,
        notes: payload.notes,
        start_time: payload.start_time,
        end_time: payload.end_time,
        is_online: payload.is_online,
        meeting_link: payload.meeting_link,
        location: payload.location,
        class_id: payload.class_id,
    };

    let session = state
        .session_service()
        .create_session(&auth.actor(), input)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create session"))?;

    Ok(ApiResponse::created(session, "Đặt buổi học thành công"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
    pub tutor_id: Option<String>,
    pub student_id: Option<String>,
    pub class_id: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Paginated<Session>> {
    let page = page_request(query.page, query.limit)?;
    let filter = SessionFilter {
        status: query.status,
        tutor_id: query.tutor_id,
        student_id: query.student_id,
        class_id: query.class_id,
        from: query.from,
        to: query.to,
    };

    let sessions = state
        .session_service()
        .list_sessions(&auth.actor(), filter, page)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list sessions"))?;

    Ok(ApiResponse::ok(sessions))
}

pub async fn get_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Session> {
    let session = state
        .session_service()
        .get_session(&auth.actor(), &id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch session"))?;

    Ok(ApiResponse::ok(session))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub status: Option<SessionStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub is_online: Option<bool>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
}

pub async fn update_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSessionRequest>,
) -> ApiResult<Session> {
    let patch = SessionPatch {
        subject: payload.subject,
        topic: payload.topic,
        description: payload.description,
        notes: payload.notes,
        status: payload.status,
        start_time: payload.start_time,
        end_time: payload.end_time,
        is_online: payload.is_online,
        meeting_link: payload.meeting_link,
        location: payload.location,
    };

    let session = state
        .session_service()
        .update_session(&auth.actor(), &id, patch)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update session"))?;

    Ok(ApiResponse::with_message(session, "Cập nhật buổi học thành công"))
}

#[derive(Deserialize, Default)]
pub struct CancelSessionRequest {
    pub reason: Option<String>,
}

pub async fn cancel_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<CancelSessionRequest>>,
) -> ApiResult<Session> {
    let Json(payload) = payload.unwrap_or_default();
    let session = state
        .session_service()
        .cancel_session(&auth.actor(), &id, payload.reason)
        .await
        .map_err(|err| AppError::from_service(err, "failed to cancel session"))?;

    Ok(ApiResponse::with_message(session, "Hủy buổi học thành công"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleSessionRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub reason: Option<String>,
}

pub async fn reschedule_session(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<RescheduleSessionRequest>,
) -> ApiResult<Session> {
    let session = state
        .session_service()
        .reschedule_session(
            &auth.actor(),
            &id,
            payload.start_time,
            payload.end_time,
            payload.reason,
        )
        .await
        .map_err(|err| AppError::from_service(err, "failed to reschedule session"))?;

    Ok(ApiResponse::with_message(session, "Đổi lịch buổi học thành công"))
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub tutor_id: Option<String>,
    pub code: String,
    pub subject: String,
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub max_students: i64,
    #[serde(default)]
    pub is_online: bool,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
}

pub async fn create_class(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateClassRequest>,
) -> CreatedResult<Class> {
    let input = NewClass {
        tutor_id: payload.tutor_id,
        code: payload.code,
        subject: payload.subject,
        day: payload.day,
        start_time: payload.start_time,
        end_time: payload.end_time,
        max_students: payload.max_students,
        is_online: payload.is_online,
        meeting_link: payload.meeting_link,
        location: payload.location,
    };

    let class = state
        .class_service()
        .create_class(&auth.actor(), input)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create class"))?;

    Ok(ApiResponse::created(class, "Tạo lớp học thành công"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClassesQuery {
    pub tutor_id: Option<String>,
    pub subject: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_classes(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListClassesQuery>,
) -> ApiResult<Paginated<Class>> {
    let page = page_request(query.page, query.limit)?;
    let filter = ClassFilter {
        tutor_id: query.tutor_id,
        subject: query.subject,
    };

    let classes = state
        .class_service()
        .list_classes(filter, page)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list classes"))?;

    Ok(ApiResponse::ok(classes))
}

pub async fn get_class(
    _auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Class> {
    let class = state
        .class_service()
        .get_class(&id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch class"))?;

    Ok(ApiResponse::ok(class))
}

pub async fn enroll_class(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Class> {
    let class = state
        .class_service()
        .enroll(&auth.actor(), &id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to enroll in class"))?;

    Ok(ApiResponse::with_message(class, "Đăng ký lớp học thành công"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSessionsRequest {
    pub start_date: String,
    pub weeks: u32,
    pub utc_offset: Option<String>,
}

fn parse_date(value: &str) -> Result<Date, AppError> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::bad_request("startDate must be formatted as YYYY-MM-DD"))
}

fn parse_offset(value: Option<&str>) -> Result<UtcOffset, AppError> {
    let Some(value) = value else {
        return Ok(UtcOffset::UTC);
    };
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| AppError::bad_request("utcOffset must be formatted as +HH:MM"))
}

pub async fn generate_class_sessions(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<GenerateSessionsRequest>,
) -> CreatedResult<Vec<Session>> {
    let from = parse_date(&payload.start_date)?;
    let offset = parse_offset(payload.utc_offset.as_deref())?;

    let sessions = state
        .class_service()
        .generate_sessions(&auth.actor(), &id, from, payload.weeks, offset)
        .await
        .map_err(|err| AppError::from_service(err, "failed to generate class sessions"))?;

    let message = format!("Đã tạo {} buổi học", sessions.len());
    Ok(ApiResponse::created(sessions, message))
}

// ---------------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApprovalRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub change: ApprovalChange,
}

pub async fn create_approval(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateApprovalRequest>,
) -> CreatedResult<ApprovalRequest> {
    let input = NewApproval {
        title: payload.title,
        description: payload.description,
        change: payload.change,
    };

    let request = state
        .approval_service()
        .create_approval(&auth.actor(), input)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create approval request"))?;

    Ok(ApiResponse::created(request, "Đã gửi yêu cầu phê duyệt"))
}

#[derive(Deserialize)]
pub struct ListApprovalsQuery {
    pub status: Option<ApprovalStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_approvals(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListApprovalsQuery>,
) -> ApiResult<Paginated<ApprovalRequest>> {
    let page = page_request(query.page, query.limit)?;
    let requests = state
        .approval_service()
        .list_approvals(&auth.actor(), query.status, page)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list approval requests"))?;

    Ok(ApiResponse::ok(requests))
}

pub async fn get_approval(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<ApprovalRequest> {
    let request = state
        .approval_service()
        .get_approval(&auth.actor(), &id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch approval request"))?;

    Ok(ApiResponse::ok(request))
}

#[derive(Deserialize, Default)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

pub async fn approve_request(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<ApprovalRequest> {
    let Json(payload) = payload.unwrap_or_default();
    let request = state
        .approval_service()
        .approve(&auth.actor(), &id, payload.note)
        .await
        .map_err(|err| AppError::from_service(err, "failed to approve request"))?;

    Ok(ApiResponse::with_message(request, "Đã phê duyệt yêu cầu"))
}

pub async fn reject_request(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Option<Json<ReviewRequest>>,
) -> ApiResult<ApprovalRequest> {
    let Json(payload) = payload.unwrap_or_default();
    let request = state
        .approval_service()
        .reject(&auth.actor(), &id, payload.note)
        .await
        .map_err(|err| AppError::from_service(err, "failed to reject request"))?;

    Ok(ApiResponse::with_message(request, "Đã từ chối yêu cầu"))
}

pub async fn list_moderation_audit(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> ApiResult<ListResponse<ModerationAction>> {
    require_management(&auth)?;
    let limit = cursor_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let actions = state
        .approval_service()
        .list_audit(cursor, limit + 1)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list moderation audit"))?;

    Ok(ApiResponse::ok(paginate_by_cursor(actions, limit, |action| {
        (action.created_at, action.id.clone())
    })))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> ApiResult<ListResponse<Notification>> {
    let limit = cursor_limit(query.limit)?;
    let cursor = parse_cursor(query.cursor)?;

    let notifications = state
        .notification_service()
        .list(&auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    Ok(ApiResponse::ok(paginate_by_cursor(notifications, limit, |n| {
        (n.created_at, n.id.clone())
    })))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub id: String,
    pub read: bool,
}

pub async fn mark_notification_read(
    auth: AuthUser,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<MarkReadResponse> {
    let updated = state
        .notification_service()
        .mark_read(&id, &auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, notification_id = %id, user_id = %auth.user_id, "failed to mark notification read");
            AppError::internal("failed to mark notification read")
        })?;

    if updated {
        Ok(ApiResponse::ok(MarkReadResponse { id, read: true }))
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

pub async fn list_notification_queue(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> ApiResult<Vec<NotificationJob>> {
    require_management(&auth)?;
    let limit = cursor_limit(query.limit)?;

    let jobs = state.queue.list_pending(limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list notification queue");
        AppError::internal("failed to list notification queue")
    })?;

    Ok(ApiResponse::ok(jobs))
}
