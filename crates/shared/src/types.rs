//! Domain records shared by the API server and the persistence layer

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Profiles and Scopes
// =============================================================================

/// Capability string granted to a staff token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:write")]
    UsersWrite,
    #[serde(rename = "consumers:read")]
    ConsumersRead,
    #[serde(rename = "consumers:write")]
    ConsumersWrite,
    #[serde(rename = "conversations:read")]
    ConversationsRead,
    #[serde(rename = "conversations:write")]
    ConversationsWrite,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsersRead => "users:read",
            Self::UsersWrite => "users:write",
            Self::ConsumersRead => "consumers:read",
            Self::ConsumersWrite => "consumers:write",
            Self::ConversationsRead => "conversations:read",
            Self::ConversationsWrite => "conversations:write",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users:read" => Ok(Self::UsersRead),
            "users:write" => Ok(Self::UsersWrite),
            "consumers:read" => Ok(Self::ConsumersRead),
            "consumers:write" => Ok(Self::ConsumersWrite),
            "conversations:read" => Ok(Self::ConversationsRead),
            "conversations:write" => Ok(Self::ConversationsWrite),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Staff profile. Each profile carries a fixed scope set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Sudo,
    Standard,
}

impl Default for Profile {
    fn default() -> Self {
        Self::Standard
    }
}

impl Profile {
    /// Scopes granted to tokens issued for this profile
    pub fn scopes(&self) -> &'static [Scope] {
        match self {
            Self::Sudo => &[
                Scope::UsersRead,
                Scope::UsersWrite,
                Scope::ConsumersRead,
                Scope::ConsumersWrite,
                Scope::ConversationsRead,
                Scope::ConversationsWrite,
            ],
            Self::Standard => &[
                Scope::ConsumersRead,
                Scope::ConversationsRead,
                Scope::ConversationsWrite,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sudo => "sudo",
            Self::Standard => "standard",
        }
    }
}

impl FromStr for Profile {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sudo" => Ok(Self::Sudo),
            "standard" => Ok(Self::Standard),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a string does not name a known enum variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);

// =============================================================================
// Principals' records
// =============================================================================

/// Staff member (attendant)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub profile: Profile,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<OffsetDateTime>,
}

impl User {
    pub fn new(username: &str, email: &str, profile: Profile, password_hash: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            profile,
            password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Anonymous visitor identified by a document number
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consumer {
    pub id: Uuid,
    pub document: String,
    pub name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Consumer {
    pub fn new(document: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            document: document.to_string(),
            name: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Conversations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A support conversation between one consumer and the attendant it was routed to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub attendant_id: Uuid,
    pub subject: String,
    pub status: ConversationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
}

impl Conversation {
    pub fn open(consumer_id: Uuid, attendant_id: Uuid, subject: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            consumer_id,
            attendant_id,
            subject: subject.to_string(),
            status: ConversationStatus::Open,
            created_at: OffsetDateTime::now_utc(),
            closed_at: None,
        }
    }
}

/// Who authored a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    System,
    Consumer,
    Attendant,
}

impl MessageSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Consumer => "consumer",
            Self::Attendant => "attendant",
        }
    }
}

impl FromStr for MessageSender {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "consumer" => Ok(Self::Consumer),
            "attendant" => Ok(Self::Attendant),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Message within a conversation. Messages are totally ordered by `(created_at, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender: MessageSender,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ConversationMessage {
    pub fn new(
        conversation_id: Uuid,
        content: &str,
        sender: MessageSender,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            content: content.to_string(),
            sender,
            created_at,
        }
    }

    /// Sort key for the total message order
    pub fn order_key(&self) -> (OffsetDateTime, Uuid) {
        (self.created_at, self.id)
    }
}

// =============================================================================
// Query helpers
// =============================================================================

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub take: i64,
}

impl Page {
    pub const DEFAULT_TAKE: i64 = 25;
    pub const MAX_TAKE: i64 = 100;

    /// Build a window from raw `skip`/`take` values, clamping both into range
    pub fn new(skip: Option<i64>, take: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            take: take
                .unwrap_or(Self::DEFAULT_TAKE)
                .clamp(1, Self::MAX_TAKE),
        }
    }

    /// Build a window from a 1-based page number and page size
    pub fn numbered(page: Option<i64>, limit: Option<i64>) -> Self {
        let take = limit
            .filter(|l| *l > 0)
            .unwrap_or(Self::DEFAULT_TAKE)
            .min(Self::MAX_TAKE);
        // Cap the page so `skip` cannot overflow
        let page = page
            .filter(|p| *p > 0)
            .unwrap_or(1)
            .min(i64::MAX / Self::MAX_TAKE);
        Self {
            skip: (page - 1) * take,
            take,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Conversation filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    pub consumer_id: Option<Uuid>,
    pub attendant_id: Option<Uuid>,
    pub status: Option<ConversationStatus>,
}

impl ConversationFilter {
    /// Open conversations owned by one attendant (its load)
    pub fn open_for_attendant(attendant_id: Uuid) -> Self {
        Self {
            attendant_id: Some(attendant_id),
            status: Some(ConversationStatus::Open),
            ..Default::default()
        }
    }

    pub fn for_consumer(consumer_id: Uuid) -> Self {
        Self {
            consumer_id: Some(consumer_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        self.consumer_id.map_or(true, |id| conversation.consumer_id == id)
            && self.attendant_id.map_or(true, |id| conversation.attendant_id == id)
            && self.status.map_or(true, |s| conversation.status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_scopes() {
        assert!(Profile::Sudo.scopes().contains(&Scope::UsersWrite));
        assert!(!Profile::Standard.scopes().contains(&Scope::UsersRead));
        assert!(Profile::Standard.scopes().contains(&Scope::ConversationsWrite));
    }

    #[test]
    fn test_scope_string_forms_agree() {
        for scope in Profile::Sudo.scopes() {
            let json = serde_json::to_string(scope).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", scope.as_str()));
            assert_eq!(scope.as_str().parse::<Scope>(), Ok(*scope));
        }
    }

    #[test]
    fn test_message_sender_parsing() {
        assert_eq!("consumer".parse::<MessageSender>(), Ok(MessageSender::Consumer));
        assert!("bot".parse::<MessageSender>().is_err());
    }

    #[test]
    fn test_page_clamping() {
        let page = Page::new(Some(-4), Some(1_000));
        assert_eq!(page, Page { skip: 0, take: 100 });

        let page = Page::numbered(Some(3), Some(10));
        assert_eq!(page, Page { skip: 20, take: 10 });

        let page = Page::numbered(Some(0), None);
        assert_eq!(page, Page { skip: 0, take: 25 });

        let page = Page::numbered(Some(i64::MAX), Some(10));
        assert_eq!(page.take, 10);
        assert!(page.skip > 0);
        assert_eq!(page.skip % 10, 0);
    }

    #[test]
    fn test_filter_matches() {
        let attendant = Uuid::new_v4();
        let mut conversation = Conversation::open(Uuid::new_v4(), attendant, "billing");
        let filter = ConversationFilter::open_for_attendant(attendant);
        assert!(filter.matches(&conversation));

        conversation.status = ConversationStatus::Closed;
        assert!(!filter.matches(&conversation));
        assert!(ConversationFilter::default().matches(&conversation));
    }
}
