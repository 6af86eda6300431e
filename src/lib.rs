pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::approvals::ApprovalService;
use crate::app::auth::AuthService;
use crate::app::classes::ClassService;
use crate::app::notifications::{NotificationQueue, NotificationService};
use crate::app::sessions::SessionService;
use crate::app::users::UserService;
use crate::config::AppConfig;
use crate::infra::{db::Db, locks::ScheduleLocks};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub locks: ScheduleLocks,
    pub queue: NotificationQueue,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
}

impl AppState {
    pub fn new(db: Db, config: &AppConfig) -> Self {
        Self {
            queue: NotificationQueue::new(db.clone(), config.notification_delay_minutes),
            locks: ScheduleLocks::new(),
            db,
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            paseto_refresh_key: config.paseto_refresh_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.paseto_access_key,
            self.paseto_refresh_key,
            self.access_ttl_minutes,
            self.refresh_ttl_days,
        )
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.db.clone())
    }

    pub fn session_service(&self) -> SessionService {
        SessionService::new(self.db.clone(), self.queue.clone(), self.locks.clone())
    }

    pub fn class_service(&self) -> ClassService {
        ClassService::new(self.db.clone(), self.queue.clone(), self.locks.clone())
    }

    pub fn approval_service(&self) -> ApprovalService {
        ApprovalService::new(self.db.clone(), self.queue.clone())
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(self.db.clone())
    }
}
