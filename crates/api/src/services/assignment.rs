//! Least-loaded attendant assignment
//!
//! Load is the number of open conversations an attendant owns, counted on
//! demand with one query per attendant. Ties go to the attendant enumerated
//! first.
//!
//! The read and the later conversation write are not synchronised: two
//! concurrent creations can both see the same minimum and pick the same
//! attendant. Balance is therefore eventual, not strict.

use std::sync::Arc;

use chatdesk_shared::{ConversationFilter, Store, StoreError, User};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("No attendants available")]
    NoAttendantsAvailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Open-conversation count for one attendant
#[derive(Debug, Clone, Serialize)]
pub struct AttendantLoad {
    pub attendant_id: Uuid,
    pub username: String,
    pub open_conversations: i64,
}

#[derive(Clone)]
pub struct AttendantAssigner {
    store: Arc<dyn Store>,
}

impl AttendantAssigner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Pick the attendant with the fewest open conversations
    pub async fn assign(&self) -> Result<User, AssignmentError> {
        let attendants = self.store.list_attendants().await?;

        let mut best: Option<(User, i64)> = None;
        for attendant in attendants {
            let load = self.open_count(attendant.id).await?;
            // Strict less-than keeps the first attendant on ties
            if best.as_ref().map_or(true, |(_, min)| load < *min) {
                let idle = load == 0;
                best = Some((attendant, load));
                if idle {
                    break;
                }
            }
        }

        let (attendant, load) = best.ok_or(AssignmentError::NoAttendantsAvailable)?;
        tracing::debug!(
            attendant_id = %attendant.id,
            open_conversations = load,
            "Attendant selected"
        );
        Ok(attendant)
    }

    /// Current load of every attendant, in enumeration order
    pub async fn loads(&self) -> Result<Vec<AttendantLoad>, AssignmentError> {
        let attendants = self.store.list_attendants().await?;
        let mut loads = Vec::with_capacity(attendants.len());
        for attendant in attendants {
            loads.push(AttendantLoad {
                open_conversations: self.open_count(attendant.id).await?,
                attendant_id: attendant.id,
                username: attendant.username,
            });
        }
        Ok(loads)
    }

    async fn open_count(&self, attendant_id: Uuid) -> Result<i64, StoreError> {
        self.store
            .count_conversations(&ConversationFilter::open_for_attendant(attendant_id))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chatdesk_shared::{Consumer, Conversation, MemoryStore, Profile};

    async fn attendant(store: &MemoryStore, name: &str) -> User {
        let user = User::new(name, &format!("{name}@example.com"), Profile::Standard, "hash".into());
        store.save_user(&user).await.unwrap();
        user
    }

    async fn open_conversations(store: &MemoryStore, consumer: &Consumer, user: &User, n: usize) {
        for _ in 0..n {
            let conversation = Conversation::open(consumer.id, user.id, "help");
            store.create_conversation(&conversation, &[]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_picks_minimum_load() {
        let store = MemoryStore::new();
        let consumer = store.find_or_create_consumer("1").await.unwrap();
        let a = attendant(&store, "a").await;
        let b = attendant(&store, "b").await;
        let c = attendant(&store, "c").await;
        open_conversations(&store, &consumer, &a, 2).await;
        open_conversations(&store, &consumer, &c, 1).await;

        let store: Arc<dyn Store> = Arc::new(store);
        let chosen = AttendantAssigner::new(store).assign().await.unwrap();
        assert_eq!(chosen.id, b.id);
    }

    #[tokio::test]
    async fn test_tie_goes_to_first_enumerated() {
        let store = MemoryStore::new();
        let consumer = store.find_or_create_consumer("1").await.unwrap();
        let a = attendant(&store, "a").await;
        let b = attendant(&store, "b").await;
        let c = attendant(&store, "c").await;
        open_conversations(&store, &consumer, &a, 3).await;
        open_conversations(&store, &consumer, &b, 1).await;
        open_conversations(&store, &consumer, &c, 1).await;

        let store: Arc<dyn Store> = Arc::new(store);
        let chosen = AttendantAssigner::new(store).assign().await.unwrap();
        assert_eq!(chosen.id, b.id);
    }

    #[tokio::test]
    async fn test_closed_conversations_do_not_count() {
        let store = MemoryStore::new();
        let consumer = store.find_or_create_consumer("1").await.unwrap();
        let a = attendant(&store, "a").await;
        let b = attendant(&store, "b").await;
        open_conversations(&store, &consumer, &b, 1).await;
        for _ in 0..3 {
            let conversation = Conversation::open(consumer.id, a.id, "old");
            store.create_conversation(&conversation, &[]).await.unwrap();
            store.close_conversation(conversation.id).await.unwrap();
        }

        let store: Arc<dyn Store> = Arc::new(store);
        let assigner = AttendantAssigner::new(store);
        assert_eq!(assigner.assign().await.unwrap().id, a.id);

        let loads = assigner.loads().await.unwrap();
        let counts: Vec<i64> = loads.iter().map(|l| l.open_conversations).collect();
        assert_eq!(counts, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_no_attendants() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        assert!(matches!(
            AttendantAssigner::new(store).assign().await,
            Err(AssignmentError::NoAttendantsAvailable)
        ));
    }
}
