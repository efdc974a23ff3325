//! The hosted backend the app delegates to: auth service plus the
//! `profiles`, `posts`, `replies`, `likes` and `user_selections` tables.
//!
//! [`Backend`] is the client SDK seam. [`RestBackend`] speaks HTTP to a hosted
//! project; [`MemoryBackend`] keeps an equivalent project inside the process.
//! Each client instance holds at most one session, like a browser tab's SDK.

pub mod error;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use eon_types::events::AuthEvent;
use eon_types::models::{Account, ItemRef, SelectionSet, Session};

pub use error::BackendError;
pub use memory::{MemoryBackend, MemoryClient};
pub use rest::{RestBackend, RestConnector};

/// A post as returned by the joined board query.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    /// `None` when the author's profile row is missing.
    pub author_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Accounts that liked the post.
    pub liked_by: Vec<Uuid>,
    /// Oldest first.
    pub replies: Vec<ReplyRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub liked_by: Vec<Uuid>,
}

/// Outcome of a successful sign-up. Projects that require email
/// confirmation create the account without opening a session.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub account: Account,
    pub session: Option<Session>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    // -- Auth --

    /// The session this client currently holds, if it is still usable.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// Creates an account with `nickname` stored as account metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<SignUp, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Session changes of this client. Dropping the receiver unsubscribes.
    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent>;

    // -- user_selections --

    async fn fetch_selections(&self, account_id: Uuid)
    -> Result<Option<SelectionSet>, BackendError>;

    async fn insert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError>;

    /// Writes the whole set, replacing the account's row if there is one.
    async fn upsert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError>;

    // -- posts / replies --

    /// Every post, newest first, with author, likes and replies embedded.
    async fn fetch_posts(&self) -> Result<Vec<PostRecord>, BackendError>;

    async fn insert_post(&self, author_id: Uuid, content: &str) -> Result<Uuid, BackendError>;

    async fn insert_reply(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Uuid, BackendError>;

    /// Sets the content of rows matching (id, author). Returns rows affected.
    async fn update_content(
        &self,
        item: ItemRef,
        author_id: Uuid,
        content: &str,
    ) -> Result<u64, BackendError>;

    /// Deletes rows matching (id, author). Returns rows affected.
    async fn delete_item(&self, item: ItemRef, author_id: Uuid) -> Result<u64, BackendError>;

    // -- likes --

    async fn insert_like(&self, account_id: Uuid, target: ItemRef) -> Result<(), BackendError>;

    /// Returns rows affected.
    async fn delete_like(&self, account_id: Uuid, target: ItemRef) -> Result<u64, BackendError>;
}

/// Produces one backend client per device.
pub trait Connector: Send + Sync {
    fn connect(&self) -> std::sync::Arc<dyn Backend>;
}
