use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Message content before it is addressed to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationPayload {
    pub fn new(
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            title: title.into(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn for_user(&self, user_id: impl Into<String>) -> NotificationData {
        NotificationData {
            user_id: user_id.into(),
            notification_type: self.notification_type.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            link: self.link.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub process_at: OffsetDateTime,
    pub data: NotificationData,
    /// Failed delivery attempts so far.
    pub attempts: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One user or a group of users to notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// Recipient ids with duplicates removed, first occurrence kept.
    pub fn into_ids(self) -> Vec<String> {
        match self {
            Recipients::One(id) => vec![id],
            Recipients::Many(ids) => {
                let mut unique: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(&id) {
                        unique.push(id);
                    }
                }
                unique
            }
        }
    }
}

impl From<String> for Recipients {
    fn from(id: String) -> Self {
        Recipients::One(id)
    }
}

impl From<&str> for Recipients {
    fn from(id: &str) -> Self {
        Recipients::One(id.to_string())
    }
}

impl From<Vec<String>> for Recipients {
    fn from(ids: Vec<String>) -> Self {
        Recipients::Many(ids)
    }
}
