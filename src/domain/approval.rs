use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status: {}", other)),
        }
    }
}

/// The change an approval applies, keyed on the wire by its `*Data` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalChange {
    #[serde(rename = "resourceAllocationData")]
    ResourceAllocation(ResourceAllocationData),
    #[serde(rename = "contentModerationData")]
    ContentModeration(ContentModerationData),
}

impl ApprovalChange {
    pub fn kind(&self) -> &'static str {
        match self {
            ApprovalChange::ResourceAllocation(_) => "resource_allocation",
            ApprovalChange::ContentModeration(_) => "content_moderation",
        }
    }
}

/// Reassigns where and how large a class runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocationData {
    pub class_id: String,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub max_students: Option<i64>,
}

impl ResourceAllocationData {
    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.meeting_link.is_none() && self.max_students.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    ForumPost,
    ForumComment,
    LibraryResource,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::ForumPost => "forum_post",
            ContentType::ForumComment => "forum_comment",
            ContentType::LibraryResource => "library_resource",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Hide,
    Remove,
    Restore,
}

impl ModerationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationDecision::Hide => "hide",
            ModerationDecision::Remove => "remove",
            ModerationDecision::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModerationData {
    pub content_type: ContentType,
    pub content_id: String,
    pub action: ModerationDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: String,
    pub requester_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ApprovalStatus,
    #[serde(flatten)]
    pub change: ApprovalChange,
    pub reviewer_id: Option<String>,
    pub review_note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}
