#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tower::ServiceExt;

use tutorly::app::users::UserService;
use tutorly::config::AppConfig;
use tutorly::domain::user::Role;
use tutorly::infra::db::Db;
use tutorly::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp: one fresh SQLite file per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn data(&self) -> Value {
        self.json()["data"].clone()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn token(&self) -> Option<&str> {
        Some(self.access_token.as_str())
    }
}

pub async fn app() -> TestApp {
    TestApp::setup().await
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        http_addr: "127.0.0.1:0".to_string(),
        app_mode: "api".to_string(),
        database_url,
        db_max_connections: 5,
        db_connect_timeout_seconds: 5,
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        paseto_access_key: *b"0123456789abcdef0123456789abcdef",
        paseto_refresh_key: *b"fedcba9876543210fedcba9876543210",
        access_ttl_minutes: 15,
        refresh_ttl_days: 30,
        notification_delay_minutes: 5,
        dispatch_poll_seconds: 1,
        dispatch_batch_size: 100,
    }
}

impl TestApp {
    async fn setup() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("tutorly-test.db");
        let config = test_config(format!("sqlite://{}", path.display()));

        let db = Db::connect(&config).await.expect("Db::connect failed");
        db.migrate().await.expect("migrate failed");

        let state = AppState::new(db, &config);
        let router = tutorly::http::router(state.clone());

        TestApp {
            router,
            state,
            _dir: dir,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Inserts a user without a password and issues tokens directly, which
    /// keeps Argon2 out of tests that do not exercise login.
    pub async fn create_user(&self, suffix: &str, role: Role) -> TestUser {
        let id = format!("usr_{}", suffix);
        let email = format!("{}@example.edu.vn", suffix);

        sqlx::query(
            "INSERT INTO users (id, email, full_name, role, password_hash, created_at) \
             VALUES (?, ?, ?, ?, '', ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(format!("Test {}", suffix))
        .bind(role.as_str())
        .bind(OffsetDateTime::now_utc().unix_timestamp() * 1000)
        .execute(self.state.db.pool())
        .await
        .expect("insert test user failed");

        let tokens = self
            .state
            .auth_service()
            .issue_token_pair(&id, role)
            .await
            .expect("issue_token_pair failed");

        TestUser {
            id,
            email,
            role,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    pub async fn student(&self, suffix: &str) -> TestUser {
        self.create_user(suffix, Role::Student).await
    }

    pub async fn tutor(&self, suffix: &str) -> TestUser {
        self.create_user(suffix, Role::Tutor).await
    }

    pub async fn manager(&self, suffix: &str) -> TestUser {
        self.create_user(suffix, Role::Management).await
    }

    /// Creates a user with a real password hash through the service layer.
    pub async fn create_user_with_password(&self, email: &str, role: Role) -> String {
        UserService::new(self.state.db.clone())
            .create_user(email, "Password User", role, DEFAULT_PASSWORD)
            .await
            .expect("create_user failed")
            .id
    }

    /// Books an offline session as `student` and returns the response.
    pub async fn book(
        &self,
        student: &TestUser,
        tutor_id: &str,
        start: &str,
        end: &str,
    ) -> TestResponse {
        self.post_json(
            "/v1/sessions",
            serde_json::json!({
                "tutorId": tutor_id,
                "subject": "Giải tích 1",
                "startTime": start,
                "endTime": end,
                "isOnline": false,
                "location": "H6-101",
            }),
            student.token(),
        )
        .await
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.state.db.pool())
            .await
            .expect("count failed")
    }
}

pub fn parse_time(value: &Value) -> OffsetDateTime {
    OffsetDateTime::parse(value.as_str().expect("expected a timestamp string"), &Rfc3339)
        .expect("invalid RFC 3339 timestamp")
}
