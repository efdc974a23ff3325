use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use eon_types::events::AuthEvent;
use eon_types::models::{Account, ItemRef, SelectionSet, Session};

use crate::{Backend, BackendError, Connector, PostRecord, ReplyRecord, SignUp};

const SESSION_TTL_HOURS: i64 = 1;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    email: String,
    nickname: String,
    exp: usize,
}

struct AccountRow {
    account: Account,
    password_hash: String,
}

struct PostRow {
    id: Uuid,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

struct ReplyRow {
    id: Uuid,
    post_id: Uuid,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

struct LikeRow {
    user_id: Uuid,
    target: ItemRef,
}

/// Rows are kept in insertion order, which doubles as creation order.
#[derive(Default)]
struct Tables {
    accounts: Vec<AccountRow>,
    posts: Vec<PostRow>,
    replies: Vec<ReplyRow>,
    likes: Vec<LikeRow>,
    selections: HashMap<Uuid, SelectionSet>,
    /// Outstanding refresh tokens; each is good for one exchange.
    refresh_tokens: HashMap<String, Uuid>,
}

impl Tables {
    fn nickname(&self, account_id: Uuid) -> Option<String> {
        self.account(account_id).map(|a| a.nickname.clone())
    }

    fn liked_by(&self, target: ItemRef) -> Vec<Uuid> {
        self.likes
            .iter()
            .filter(|l| l.target == target)
            .map(|l| l.user_id)
            .collect()
    }

    fn account(&self, account_id: Uuid) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.account.id == account_id)
            .map(|a| &a.account)
    }

    fn exists(&self, item: ItemRef) -> bool {
        match item {
            ItemRef::Post(id) => self.posts.iter().any(|p| p.id == id),
            ItemRef::Reply(id) => self.replies.iter().any(|r| r.id == id),
        }
    }
}

struct Project {
    jwt_secret: String,
    hashing: Params,
    tables: RwLock<Tables>,
}

/// A hosted project kept in process memory: accounts, tables and token
/// signing. Hand each device its own [`MemoryClient`] via [`MemoryBackend::client`].
#[derive(Clone)]
pub struct MemoryBackend {
    project: Arc<Project>,
    session_ttl: chrono::Duration,
}

impl MemoryBackend {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self::with_params(jwt_secret, Params::default())
    }

    /// Minimum-cost password hashing, for tests and local demos.
    pub fn with_light_hashing(jwt_secret: impl Into<String>) -> Self {
        let params = Params::new(
            Params::MIN_M_COST,
            Params::MIN_T_COST,
            Params::MIN_P_COST,
            None,
        )
        .unwrap_or_default();
        Self::with_params(jwt_secret, params)
    }

    fn with_params(jwt_secret: impl Into<String>, hashing: Params) -> Self {
        Self {
            project: Arc::new(Project {
                jwt_secret: jwt_secret.into(),
                hashing,
                tables: RwLock::new(Tables::default()),
            }),
            session_ttl: chrono::Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Lifetime of issued access tokens for clients created after this call.
    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn client(&self) -> MemoryClient {
        let (events, _) = broadcast::channel(16);
        MemoryClient {
            backend: self.clone(),
            session: RwLock::new(None),
            events,
        }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.project.hashing.clone())
    }

    async fn issue_session(&self, account: &Account) -> Result<Session, BackendError> {
        let expires_at = Utc::now() + self.session_ttl;
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            nickname: account.nickname.clone(),
            exp: expires_at.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.project.jwt_secret.as_bytes()),
        )?;

        let refresh_token = Uuid::new_v4().simple().to_string();
        self.project
            .tables
            .write()
            .await
            .refresh_tokens
            .insert(refresh_token.clone(), account.id);

        Ok(Session {
            access_token: token,
            refresh_token: Some(refresh_token),
            expires_at: Some(expires_at),
            account: account.clone(),
        })
    }

    /// Trades a refresh token for a new session. The old token is spent.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let account = {
            let mut tables = self.project.tables.write().await;
            let account_id = tables
                .refresh_tokens
                .remove(refresh_token)
                .ok_or(BackendError::NotAuthenticated)?;
            tables
                .account(account_id)
                .cloned()
                .ok_or(BackendError::NotAuthenticated)?
        };
        self.issue_session(&account).await
    }

    fn verify(&self, token: &str) -> Result<Claims, BackendError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.project.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

impl Connector for MemoryBackend {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.client())
    }
}

/// One device's SDK instance against a [`MemoryBackend`].
pub struct MemoryClient {
    backend: MemoryBackend,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryClient {
    /// The held session, refreshed when its access token no longer
    /// verifies. A session that cannot be refreshed is dropped and
    /// `SignedOut` is published.
    async fn live_session(&self) -> Option<Session> {
        let session = self.session.read().await.clone()?;
        if self.backend.verify(&session.access_token).is_ok() {
            return Some(session);
        }

        let refreshed = match session.refresh_token.as_deref() {
            Some(refresh_token) => self.backend.refresh_session(refresh_token).await,
            None => Err(BackendError::NotAuthenticated),
        };
        match refreshed {
            Ok(fresh) => {
                debug!("Refreshed session for {}", fresh.account.email);
                *self.session.write().await = Some(fresh.clone());
                let _ = self.events.send(AuthEvent::TokenRefreshed {
                    session: fresh.clone(),
                });
                Some(fresh)
            }
            Err(e) => {
                debug!("Discarding expired session: {}", e);
                *self.session.write().await = None;
                let _ = self.events.send(AuthEvent::SignedOut);
                None
            }
        }
    }

    /// The account behind the live session.
    async fn uid(&self) -> Result<Uuid, BackendError> {
        self.live_session()
            .await
            .map(|s| s.account.id)
            .ok_or(BackendError::NotAuthenticated)
    }

    /// Row-level security for inserts: rows may only be written as oneself.
    async fn require_self(&self, account_id: Uuid, table: &str) -> Result<(), BackendError> {
        if self.uid().await? != account_id {
            return Err(BackendError::PermissionDenied(format!(
                "new row violates row-level security policy for table \"{}\"",
                table
            )));
        }
        Ok(())
    }

    async fn open_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn { session });
    }
}

#[async_trait]
impl Backend for MemoryClient {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.live_session().await)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let email = email.trim().to_lowercase();
        let account = {
            let tables = self.backend.project.tables.read().await;
            let row = tables
                .accounts
                .iter()
                .find(|a| a.account.email == email)
                .ok_or(BackendError::InvalidCredentials)?;

            let parsed_hash = PasswordHash::new(&row.password_hash)
                .map_err(|e| BackendError::Internal(e.to_string()))?;
            self.backend
                .hasher()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| BackendError::InvalidCredentials)?;

            row.account.clone()
        };

        let session = self.backend.issue_session(&account).await?;
        self.open_session(session.clone()).await;
        info!("{} signed in", account.email);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<SignUp, BackendError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(BackendError::Api {
                status: 400,
                message: "Unable to validate email address: invalid format".into(),
            });
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(BackendError::Api {
                status: 422,
                message: format!("Password should be at least {} characters.", MIN_PASSWORD_LEN),
            });
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .backend
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| BackendError::Internal(e.to_string()))?
            .to_string();

        let account = {
            let mut tables = self.backend.project.tables.write().await;
            if tables.accounts.iter().any(|a| a.account.email == email) {
                return Err(BackendError::AlreadyRegistered);
            }
            let account = Account {
                id: Uuid::new_v4(),
                email,
                nickname: nickname.to_string(),
                created_at: Utc::now(),
            };
            tables.accounts.push(AccountRow {
                account: account.clone(),
                password_hash,
            });
            account
        };

        let session = self.backend.issue_session(&account).await?;
        self.open_session(session.clone()).await;
        info!("{} signed up as {}", account.email, account.nickname);

        Ok(SignUp {
            account,
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let previous = self.session.write().await.take();
        if let Some(refresh_token) = previous.as_ref().and_then(|s| s.refresh_token.as_ref()) {
            self.backend
                .project
                .tables
                .write()
                .await
                .refresh_tokens
                .remove(refresh_token);
        }
        if previous.is_some() {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn fetch_selections(
        &self,
        account_id: Uuid,
    ) -> Result<Option<SelectionSet>, BackendError> {
        // Rows of other accounts are invisible, not forbidden.
        match self.uid().await {
            Ok(uid) if uid == account_id => {}
            _ => return Ok(None),
        }
        let tables = self.backend.project.tables.read().await;
        Ok(tables.selections.get(&account_id).cloned())
    }

    async fn insert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError> {
        self.require_self(account_id, "user_selections").await?;
        let mut tables = self.backend.project.tables.write().await;
        if tables.selections.contains_key(&account_id) {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint \"user_selections_user_id_key\""
                    .into(),
            ));
        }
        tables.selections.insert(account_id, selections.clone());
        Ok(())
    }

    async fn upsert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError> {
        self.require_self(account_id, "user_selections").await?;
        let mut tables = self.backend.project.tables.write().await;
        tables.selections.insert(account_id, selections.clone());
        Ok(())
    }

    async fn fetch_posts(&self) -> Result<Vec<PostRecord>, BackendError> {
        let tables = self.backend.project.tables.read().await;

        let posts = tables
            .posts
            .iter()
            .rev()
            .map(|post| PostRecord {
                id: post.id,
                content: post.content.clone(),
                author_id: post.author_id,
                author_nickname: tables.nickname(post.author_id),
                created_at: post.created_at,
                liked_by: tables.liked_by(ItemRef::Post(post.id)),
                replies: tables
                    .replies
                    .iter()
                    .filter(|r| r.post_id == post.id)
                    .map(|reply| ReplyRecord {
                        id: reply.id,
                        post_id: reply.post_id,
                        content: reply.content.clone(),
                        author_id: reply.author_id,
                        author_nickname: tables.nickname(reply.author_id),
                        created_at: reply.created_at,
                        liked_by: tables.liked_by(ItemRef::Reply(reply.id)),
                    })
                    .collect(),
            })
            .collect();

        Ok(posts)
    }

    async fn insert_post(&self, author_id: Uuid, content: &str) -> Result<Uuid, BackendError> {
        self.require_self(author_id, "posts").await?;
        let id = Uuid::new_v4();
        let mut tables = self.backend.project.tables.write().await;
        tables.posts.push(PostRow {
            id,
            content: content.to_string(),
            author_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn insert_reply(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Uuid, BackendError> {
        self.require_self(author_id, "replies").await?;
        let id = Uuid::new_v4();
        let mut tables = self.backend.project.tables.write().await;
        if !tables.exists(ItemRef::Post(post_id)) {
            return Err(BackendError::NotFound(format!("posts.id = {}", post_id)));
        }
        tables.replies.push(ReplyRow {
            id,
            post_id,
            content: content.to_string(),
            author_id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_content(
        &self,
        item: ItemRef,
        author_id: Uuid,
        content: &str,
    ) -> Result<u64, BackendError> {
        let uid = self.uid().await?;
        let mut tables = self.backend.project.tables.write().await;

        let mut affected = 0;
        match item {
            ItemRef::Post(id) => {
                for post in tables
                    .posts
                    .iter_mut()
                    .filter(|p| p.id == id && p.author_id == author_id && p.author_id == uid)
                {
                    post.content = content.to_string();
                    affected += 1;
                }
            }
            ItemRef::Reply(id) => {
                for reply in tables
                    .replies
                    .iter_mut()
                    .filter(|r| r.id == id && r.author_id == author_id && r.author_id == uid)
                {
                    reply.content = content.to_string();
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete_item(&self, item: ItemRef, author_id: Uuid) -> Result<u64, BackendError> {
        let uid = self.uid().await?;
        let mut tables = self.backend.project.tables.write().await;
        let owned = |row_id: Uuid, row_author: Uuid| {
            row_id == item.id() && row_author == author_id && row_author == uid
        };

        match item {
            ItemRef::Post(id) => {
                let before = tables.posts.len();
                tables.posts.retain(|p| !owned(p.id, p.author_id));
                let affected = (before - tables.posts.len()) as u64;
                if affected > 0 {
                    // ON DELETE CASCADE for replies and every like beneath the post.
                    let orphaned: Vec<Uuid> = tables
                        .replies
                        .iter()
                        .filter(|r| r.post_id == id)
                        .map(|r| r.id)
                        .collect();
                    tables.replies.retain(|r| r.post_id != id);
                    tables.likes.retain(|l| match l.target {
                        ItemRef::Post(p) => p != id,
                        ItemRef::Reply(r) => !orphaned.contains(&r),
                    });
                }
                Ok(affected)
            }
            ItemRef::Reply(id) => {
                let before = tables.replies.len();
                tables.replies.retain(|r| !owned(r.id, r.author_id));
                let affected = (before - tables.replies.len()) as u64;
                if affected > 0 {
                    tables.likes.retain(|l| l.target != ItemRef::Reply(id));
                }
                Ok(affected)
            }
        }
    }

    async fn insert_like(&self, account_id: Uuid, target: ItemRef) -> Result<(), BackendError> {
        self.require_self(account_id, "likes").await?;
        let mut tables = self.backend.project.tables.write().await;
        if !tables.exists(target) {
            return Err(BackendError::NotFound(format!("{}s.id = {}", target.noun(), target.id())));
        }
        if tables
            .likes
            .iter()
            .any(|l| l.user_id == account_id && l.target == target)
        {
            return Err(BackendError::Conflict(
                "duplicate key value violates unique constraint on likes".into(),
            ));
        }
        tables.likes.push(LikeRow {
            user_id: account_id,
            target,
        });
        Ok(())
    }

    async fn delete_like(&self, account_id: Uuid, target: ItemRef) -> Result<u64, BackendError> {
        let uid = self.uid().await?;
        let mut tables = self.backend.project.tables.write().await;
        let before = tables.likes.len();
        tables
            .likes
            .retain(|l| !(l.user_id == account_id && l.user_id == uid && l.target == target));
        Ok((before - tables.likes.len()) as u64)
    }
}
