//! In-process store backed by `DashMap`
//!
//! Secondary indexes (email → user id, refresh credential → session id) are
//! claimed through the entry API, so a duplicate insert loses atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;
use uuid::Uuid;

use super::{SessionStore, UserDirectory};
use crate::error::{StoreError, StoreResult};
use crate::types::{Session, User};

/// Users and sessions held in memory
///
/// Implements both [`UserDirectory`] and [`SessionStore`]. Data is lost on
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<Uuid, User>,
    users_by_email: DashMap<String, Uuid>,
    sessions: DashMap<Uuid, Session>,
    sessions_by_token: DashMap<String, Uuid>,
}

impl InMemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of sessions across all users
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn remove_sessions_where(&self, predicate: impl Fn(&Session) -> bool) -> u64 {
        let doomed: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for id in doomed {
            if self.remove_session(id) {
                removed += 1;
            }
        }
        removed
    }

    fn remove_session(&self, id: Uuid) -> bool {
        match self.sessions.remove(&id) {
            Some((_, session)) => {
                self.sessions_by_token
                    .remove_if(&session.refresh_token, |_, owner| *owner == id);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let Some(id) = self.users_by_email.get(email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, user: User) -> StoreResult<User> {
        match self.users_by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::conflict("users_email_key")),
            Entry::Vacant(slot) => {
                if self.users.contains_key(&user.id) {
                    return Err(StoreError::conflict("users_pkey"));
                }
                // Record first, index second: readers go through the index
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                debug!(user_id = %user.id, "User record created");
                Ok(user)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        if let Some((_, user)) = self.users.remove(&id) {
            self.users_by_email.remove_if(&user.email, |_, owner| *owner == id);
            debug!(user_id = %id, "User record deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, session: Session) -> StoreResult<()> {
        match self.sessions_by_token.entry(session.refresh_token.clone()) {
            Entry::Occupied(_) => Err(StoreError::conflict("sessions_refresh_token_key")),
            Entry::Vacant(slot) => {
                if self.sessions.contains_key(&session.id) {
                    return Err(StoreError::conflict("sessions_pkey"));
                }
                let id = session.id;
                self.sessions.insert(id, session);
                slot.insert(id);
                Ok(())
            }
        }
    }

    async fn get_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Session> {
        let id = self
            .sessions_by_token
            .get(refresh_token)
            .map(|entry| *entry.value())
            .ok_or(StoreError::NotFound)?;
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.remove_session(id))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self.remove_sessions_where(|s| s.user_id == user_id))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.remove_sessions_where(|s| s.is_expired(now)))
    }

    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .count() as u64)
    }
}
