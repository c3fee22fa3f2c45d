//! Session store and user directory contracts
//!
//! Both stores must enforce their uniqueness constraints atomically: email
//! for users, refresh credential for sessions. The orchestrator holds no locks
//! across its multi-step protocols and relies on the store rejecting the
//! second writer with [`StoreError::Conflict`](crate::error::StoreError::Conflict).
//!
//! Lookups never filter by expiry. The orchestrator decides what "expired"
//! means so that "found but expired" stays distinguishable from "unknown".

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::types::{Session, User};

/// Users keyed by id, unique by email
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Exact, case-sensitive email lookup
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Lookup by id
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Insert a user
    ///
    /// Fails with `Conflict` if the email (or id) is already taken.
    async fn create(&self, user: User) -> StoreResult<User>;

    /// Remove a user; removing an unknown id is not an error
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Sessions keyed by id, unique by refresh credential
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Insert a session
    ///
    /// Fails with `Conflict` if the refresh credential already exists.
    async fn create_session(&self, session: Session) -> StoreResult<()>;

    /// Exact match on the refresh credential; `NotFound` if absent
    async fn get_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Session>;

    /// Delete one session (idempotent)
    ///
    /// Returns `true` only for the caller whose delete removed the session,
    /// so concurrent deleters of the same id see exactly one winner.
    async fn delete_session(&self, id: Uuid) -> StoreResult<bool>;

    /// Delete every session of a user (idempotent), returning how many went
    async fn delete_all_for_user(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Delete sessions with `expires_at <= now`, returning how many went
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Number of sessions currently held for a user
    async fn count_for_user(&self, user_id: Uuid) -> StoreResult<u64>;
}
