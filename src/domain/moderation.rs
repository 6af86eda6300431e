use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::approval::{ContentType, ModerationDecision};

/// Audit record written when a content-moderation approval is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationAction {
    pub id: String,
    pub actor_id: String,
    pub approval_id: String,
    pub content_type: ContentType,
    pub content_id: String,
    pub action: ModerationDecision,
    pub reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
