use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use eon_types::events::AuthEvent;
use eon_types::models::{Account, ItemRef, SelectionSet, Session};

use crate::{Backend, BackendError, Connector, PostRecord, ReplyRecord, SignUp};

/// Embedded select for the board: author nickname, likes, and replies with
/// their own author and likes.
const POSTS_SELECT: &str = "id,content,author_id,created_at,\
profiles:author_id(nickname),\
likes!likes_post_id_fkey(user_id),\
replies(id,post_id,content,author_id,created_at,profiles:author_id(nickname),likes!likes_reply_id_fkey(user_id))";

// -- Wire types --

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    nickname: Option<String>,
}

impl From<UserBody> for Account {
    fn from(user: UserBody) -> Self {
        Account {
            id: user.id,
            email: user.email.unwrap_or_default(),
            nickname: user.user_metadata.nickname.unwrap_or_default(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: UserBody,
}

impl From<TokenBody> for Session {
    fn from(token: TokenBody) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                token
                    .expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            account: token.user.into(),
        }
    }
}

/// Auth service errors come in two generations of shape; accept both.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl AuthErrorBody {
    fn text(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown auth error".into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct TableErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfileRef {
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LikeRef {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct ReplyWire {
    id: Uuid,
    post_id: Uuid,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    profiles: Option<ProfileRef>,
    #[serde(default)]
    likes: Vec<LikeRef>,
}

#[derive(Debug, Deserialize)]
struct PostWire {
    id: Uuid,
    content: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    profiles: Option<ProfileRef>,
    #[serde(default)]
    likes: Vec<LikeRef>,
    #[serde(default)]
    replies: Vec<ReplyWire>,
}

impl From<ReplyWire> for ReplyRecord {
    fn from(reply: ReplyWire) -> Self {
        ReplyRecord {
            id: reply.id,
            post_id: reply.post_id,
            content: reply.content,
            author_id: reply.author_id,
            author_nickname: reply.profiles.and_then(|p| p.nickname),
            created_at: reply.created_at,
            liked_by: reply.likes.into_iter().map(|l| l.user_id).collect(),
        }
    }
}

impl From<PostWire> for PostRecord {
    fn from(post: PostWire) -> Self {
        let mut replies: Vec<ReplyRecord> = post.replies.into_iter().map(Into::into).collect();
        replies.sort_by_key(|r| r.created_at);
        PostRecord {
            id: post.id,
            content: post.content,
            author_id: post.author_id,
            author_nickname: post.profiles.and_then(|p| p.nickname),
            created_at: post.created_at,
            liked_by: post.likes.into_iter().map(|l| l.user_id).collect(),
            replies,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SelectionsRow {
    selections: SelectionSet,
}

#[derive(Debug, Serialize)]
struct SelectionsInsert<'a> {
    user_id: Uuid,
    selections: &'a SelectionSet,
}

// -- Client --

/// Client for a hosted project: auth under `/auth/v1`, tables under `/rest/v1`.
pub struct RestBackend {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestBackend {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        Ok(Self::with_base(http, project_base(base_url)?, anon_key))
    }

    fn with_base(http: reqwest::Client, base: Url, anon_key: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            http,
            base,
            anon_key: anon_key.to_string(),
            session: RwLock::new(None),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base.join(path)?)
    }

    /// Bearer token for table requests: the live session token, else the
    /// anon key.
    async fn bearer(&self) -> Result<String, BackendError> {
        Ok(self
            .live_session()
            .await?
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone()))
    }

    /// The held session, refreshed first when its access token has expired.
    /// A session that cannot be refreshed is dropped and `SignedOut` is
    /// published.
    async fn live_session(&self) -> Result<Option<Session>, BackendError> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        let expired = session.expires_at.is_some_and(|at| at <= Utc::now());
        if !expired {
            return Ok(Some(session));
        }

        let refreshed = match session.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => Err(BackendError::NotAuthenticated),
        };
        match refreshed {
            Ok(fresh) => {
                debug!("Refreshed session for {}", fresh.account.email);
                *self.session.write().await = Some(fresh.clone());
                let _ = self.events.send(AuthEvent::TokenRefreshed {
                    session: fresh.clone(),
                });
                Ok(Some(fresh))
            }
            // Offline: keep the session and let the request fail on its own.
            Err(e @ BackendError::Network(_)) => Err(e),
            Err(e) => {
                warn!("Session for {} expired: {}", session.account.email, e);
                *self.session.write().await = None;
                let _ = self.events.send(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        Ok(req
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await?))
    }

    async fn table(&self, method: reqwest::Method, table: &str) -> Result<RequestBuilder, BackendError> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        self.authed(self.http.request(method, url)).await
    }

    async fn open_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn { session });
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let url = self.endpoint("auth/v1/token?grant_type=refresh_token")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenBody = auth_json(resp).await?;
        Ok(token.into())
    }

    /// Sends a mutation with `Prefer: return=representation` and counts the
    /// rows that came back.
    async fn count_rows(&self, req: RequestBuilder) -> Result<u64, BackendError> {
        let resp = req
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = table_json(resp).await?;
        Ok(rows.len() as u64)
    }
}

/// Builds one [`RestBackend`] per device over a shared connection pool.
#[derive(Clone)]
pub struct RestConnector {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl RestConnector {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: project_base(base_url)?,
            anon_key: anon_key.to_string(),
        })
    }
}

impl Connector for RestConnector {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(RestBackend::with_base(
            self.http.clone(),
            self.base.clone(),
            &self.anon_key,
        ))
    }
}

/// Parses the project URL so relative joins land under its path.
fn project_base(base_url: &str) -> Result<Url, BackendError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn auth_json<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, BackendError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    let err: AuthErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = err.text();
    let code = err.error_code.as_deref().unwrap_or_default();
    if code == "invalid_credentials" || message == "Invalid login credentials" {
        return Err(BackendError::InvalidCredentials);
    }
    if code == "user_already_exists" || message.contains("User already registered") {
        return Err(BackendError::AlreadyRegistered);
    }
    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn table_json<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, BackendError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }
    Err(table_error(status, &body))
}

async fn table_ok(resp: Response) -> Result<(), BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await?;
    Err(table_error(status, &body))
}

fn table_error(status: StatusCode, body: &str) -> BackendError {
    let err: TableErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = err.message.unwrap_or_else(|| body.to_string());
    match (status, err.code.as_deref()) {
        (_, Some("23505")) => BackendError::Conflict(message),
        (_, Some("23503")) => BackendError::NotFound(message),
        (_, Some("42501")) => BackendError::PermissionDenied(message),
        (StatusCode::UNAUTHORIZED, _) => BackendError::NotAuthenticated,
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn like_filters(account_id: Uuid, target: ItemRef) -> [(&'static str, String); 2] {
    let column = match target {
        ItemRef::Post(_) => "post_id",
        ItemRef::Reply(_) => "reply_id",
    };
    [
        ("user_id", format!("eq.{}", account_id)),
        (column, format!("eq.{}", target.id())),
    ]
}

fn item_table(item: ItemRef) -> &'static str {
    match item {
        ItemRef::Post(_) => "posts",
        ItemRef::Reply(_) => "replies",
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.live_session().await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = self.endpoint("auth/v1/token?grant_type=password")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let token: TokenBody = auth_json(resp).await?;
        let session: Session = token.into();
        self.open_session(session.clone()).await;
        info!("{} signed in", session.account.email);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<SignUp, BackendError> {
        let url = self.endpoint("auth/v1/signup")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "nickname": nickname },
            }))
            .send()
            .await?;

        // With email confirmation on, the body is the bare user; otherwise
        // it is a full token response.
        let body: serde_json::Value = auth_json(resp).await?;
        if body.get("access_token").is_some() {
            let token: TokenBody = serde_json::from_value(body)?;
            let session: Session = token.into();
            self.open_session(session.clone()).await;
            Ok(SignUp {
                account: session.account.clone(),
                session: Some(session),
            })
        } else {
            let user: UserBody = serde_json::from_value(body)?;
            Ok(SignUp {
                account: user.into(),
                session: None,
            })
        }
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Ok(()),
        };

        let url = self.endpoint("auth/v1/logout")?;
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        // An already-invalid token still ends the local session.
        if !resp.status().is_success() && resp.status() != StatusCode::UNAUTHORIZED {
            let status = resp.status();
            let err: AuthErrorBody = resp.json().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: err.text(),
            });
        }

        *self.session.write().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn fetch_selections(
        &self,
        account_id: Uuid,
    ) -> Result<Option<SelectionSet>, BackendError> {
        let resp = self
            .table(reqwest::Method::GET, "user_selections")
            .await?
            .query(&[
                ("select", "selections".to_string()),
                ("user_id", format!("eq.{}", account_id)),
            ])
            .send()
            .await?;
        let rows: Vec<SelectionsRow> = table_json(resp).await?;
        Ok(rows.into_iter().next().map(|r| r.selections))
    }

    async fn insert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError> {
        let resp = self
            .table(reqwest::Method::POST, "user_selections")
            .await?
            .header("Prefer", "return=minimal")
            .json(&SelectionsInsert {
                user_id: account_id,
                selections,
            })
            .send()
            .await?;
        table_ok(resp).await
    }

    async fn upsert_selections(
        &self,
        account_id: Uuid,
        selections: &SelectionSet,
    ) -> Result<(), BackendError> {
        let resp = self
            .table(reqwest::Method::POST, "user_selections")
            .await?
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&SelectionsInsert {
                user_id: account_id,
                selections,
            })
            .send()
            .await?;
        table_ok(resp).await
    }

    async fn fetch_posts(&self) -> Result<Vec<PostRecord>, BackendError> {
        let resp = self
            .table(reqwest::Method::GET, "posts")
            .await?
            .query(&[
                ("select", POSTS_SELECT),
                ("order", "created_at.desc"),
                ("replies.order", "created_at.asc"),
            ])
            .send()
            .await?;
        let posts: Vec<PostWire> = table_json(resp).await?;
        Ok(posts.into_iter().map(Into::into).collect())
    }

    async fn insert_post(&self, author_id: Uuid, content: &str) -> Result<Uuid, BackendError> {
        let resp = self
            .table(reqwest::Method::POST, "posts")
            .await?
            .header("Prefer", "return=representation")
            .json(&json!({ "content": content, "author_id": author_id }))
            .send()
            .await?;
        let rows: Vec<IdRow> = table_json(resp).await?;
        rows.into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| BackendError::Internal("insert returned no row".into()))
    }

    async fn insert_reply(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Uuid, BackendError> {
        let resp = self
            .table(reqwest::Method::POST, "replies")
            .await?
            .header("Prefer", "return=representation")
            .json(&json!({ "content": content, "post_id": post_id, "author_id": author_id }))
            .send()
            .await?;
        let rows: Vec<IdRow> = table_json(resp).await?;
        rows.into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| BackendError::Internal("insert returned no row".into()))
    }

    async fn update_content(
        &self,
        item: ItemRef,
        author_id: Uuid,
        content: &str,
    ) -> Result<u64, BackendError> {
        let req = self
            .table(reqwest::Method::PATCH, item_table(item))
            .await?
            .query(&[
                ("id", format!("eq.{}", item.id())),
                ("author_id", format!("eq.{}", author_id)),
            ])
            .json(&json!({ "content": content }));
        self.count_rows(req).await
    }

    async fn delete_item(&self, item: ItemRef, author_id: Uuid) -> Result<u64, BackendError> {
        let req = self
            .table(reqwest::Method::DELETE, item_table(item))
            .await?
            .query(&[
                ("id", format!("eq.{}", item.id())),
                ("author_id", format!("eq.{}", author_id)),
            ]);
        self.count_rows(req).await
    }

    async fn insert_like(&self, account_id: Uuid, target: ItemRef) -> Result<(), BackendError> {
        let body = match target {
            ItemRef::Post(id) => json!({ "user_id": account_id, "post_id": id }),
            ItemRef::Reply(id) => json!({ "user_id": account_id, "reply_id": id }),
        };
        let resp = self
            .table(reqwest::Method::POST, "likes")
            .await?
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;
        table_ok(resp).await
    }

    async fn delete_like(&self, account_id: Uuid, target: ItemRef) -> Result<u64, BackendError> {
        let req = self
            .table(reqwest::Method::DELETE, "likes")
            .await?
            .query(&like_filters(account_id, target));
        self.count_rows(req).await
    }
}
