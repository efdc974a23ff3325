use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use eon_backend::{Backend, BackendError, PostRecord, ReplyRecord};
use eon_types::MAX_CONTENT_CHARS;
use eon_types::api::BoardSnapshot;
use eon_types::models::{Account, ItemRef};
use eon_types::views::{Authored, EditingView, PostView, ReplyView, display_date};

use crate::auth::AuthHandle;
use crate::error::{BoardError, ContentError};
use crate::notice::NoticeSlot;

/// Shown when an author's profile row is missing.
const UNKNOWN_AUTHOR: &str = "Anonymous";

/// Rejects blank bodies and bodies over [`MAX_CONTENT_CHARS`] characters.
pub fn validate_content(body: &str) -> Result<(), ContentError> {
    if body.trim().is_empty() {
        return Err(ContentError::Empty);
    }
    if body.chars().count() > MAX_CONTENT_CHARS {
        return Err(ContentError::TooLong {
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}

fn reply_view(record: ReplyRecord, viewer: Option<Uuid>) -> ReplyView {
    ReplyView {
        id: record.id,
        post_id: record.post_id,
        content: record.content,
        author_id: record.author_id,
        author: record
            .author_nickname
            .unwrap_or_else(|| UNKNOWN_AUTHOR.into()),
        date: display_date(record.created_at),
        created_at: record.created_at,
        likes: record.liked_by.len(),
        is_liked: viewer.is_some_and(|v| record.liked_by.contains(&v)),
    }
}

fn post_view(record: PostRecord, viewer: Option<Uuid>, expanded: &HashSet<Uuid>) -> PostView {
    PostView {
        id: record.id,
        content: record.content,
        author_id: record.author_id,
        author: record
            .author_nickname
            .unwrap_or_else(|| UNKNOWN_AUTHOR.into()),
        date: display_date(record.created_at),
        created_at: record.created_at,
        likes: record.liked_by.len(),
        is_liked: viewer.is_some_and(|v| record.liked_by.contains(&v)),
        show_replies: expanded.contains(&record.id),
        replies: record
            .replies
            .into_iter()
            .map(|r| reply_view(r, viewer))
            .collect(),
    }
}

/// Author, content and like state of one item in the current view.
struct ItemFacts {
    author_id: Uuid,
    content: String,
    is_liked: bool,
}

/// Posts with their replies and likes, rebuilt from the backend after every
/// change.
pub struct CommunityBoard {
    backend: Arc<dyn Backend>,
    auth: AuthHandle,
    posts: Vec<PostView>,
    /// Viewer the current posts were projected for.
    viewer: Option<Uuid>,
    expanded: HashSet<Uuid>,
    editing: Option<EditingView>,
    loading: bool,
    notice: NoticeSlot,
}

impl CommunityBoard {
    pub fn new(backend: Arc<dyn Backend>, auth: AuthHandle) -> Self {
        Self {
            backend,
            auth,
            posts: Vec::new(),
            viewer: None,
            expanded: HashSet::new(),
            editing: None,
            loading: true,
            notice: NoticeSlot::new(),
        }
    }

    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn editing(&self) -> Option<&EditingView> {
        self.editing.as_ref()
    }

    /// Reloads every post with replies and likes.
    pub async fn fetch_all(&mut self) -> Result<(), BoardError> {
        let viewer = self.auth.account().map(|a| a.id);
        let result = self.backend.fetch_posts().await;
        self.loading = false;

        let records = match result {
            Ok(records) => records,
            Err(e) => return Err(self.fail("Failed to load posts", e)),
        };

        let expanded = &self.expanded;
        self.posts = records
            .into_iter()
            .map(|r| post_view(r, viewer, expanded))
            .collect();
        self.viewer = viewer;

        let live: HashSet<Uuid> = self.posts.iter().map(|p| p.id).collect();
        self.expanded.retain(|id| live.contains(id));
        if self
            .editing
            .as_ref()
            .is_some_and(|e| self.facts(e.item).is_none())
        {
            debug!("Dropping edit of an item that no longer exists");
            self.editing = None;
        }

        debug!("Loaded {} posts", self.posts.len());
        Ok(())
    }

    /// Fetches on first use and whenever the signed-in account changed since
    /// the last fetch. Failures are left on the notice.
    pub async fn ensure_fresh(&mut self) {
        let viewer = self.auth.account().map(|a| a.id);
        if self.loading || viewer != self.viewer {
            let _ = self.fetch_all().await;
        }
    }

    pub async fn create_post(&mut self, body: &str) -> Result<(), BoardError> {
        let account = self.require_account()?;
        self.validate(body)?;

        let result = self.backend.insert_post(account.id, body).await;

        match result {
            Ok(id) => {
                info!("{} created post {}", account.nickname, id);
                self.fetch_all().await
            }
            Err(e) => Err(self.fail("Failed to create post", e)),
        }
    }

    pub async fn create_reply(&mut self, post_id: Uuid, body: &str) -> Result<(), BoardError> {
        let account = self.require_account()?;
        self.validate(body)?;

        let result = self.backend.insert_reply(post_id, account.id, body).await;

        match result {
            Ok(id) => {
                info!("{} replied to {} with {}", account.nickname, post_id, id);
                self.expanded.insert(post_id);
                self.fetch_all().await
            }
            Err(e) => Err(self.fail("Failed to create reply", e)),
        }
    }

    /// Flips whether a post's replies are shown. Returns the new state.
    pub fn toggle_replies(&mut self, post_id: Uuid) -> Result<bool, BoardError> {
        let post = self
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(BoardError::UnknownItem(ItemRef::Post(post_id)))?;

        post.show_replies = !post.show_replies;
        if post.show_replies {
            self.expanded.insert(post_id);
        } else {
            self.expanded.remove(&post_id);
        }
        Ok(post.show_replies)
    }

    /// Puts `item` into editing with its current content as the draft.
    /// Any other item being edited is abandoned.
    pub fn begin_edit(&mut self, item: ItemRef) -> Result<(), BoardError> {
        let account = self.require_account()?;
        let facts = self.owned_facts(item, &account)?;
        self.editing = Some(EditingView {
            item,
            draft: facts.content,
        });
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Saves new content for `item`, entering editing first if needed.
    pub async fn save_edit(&mut self, item: ItemRef, body: &str) -> Result<(), BoardError> {
        if self.editing.as_ref().map(|e| e.item) != Some(item) {
            self.begin_edit(item)?;
        }
        if let Some(editing) = &mut self.editing {
            editing.draft = body.to_string();
        }
        self.validate(body)?;
        let account = self.require_account()?;

        let result = self.backend.update_content(item, account.id, body).await;

        match result {
            Ok(rows) => {
                if rows == 0 {
                    warn!("Update of {} {} matched no rows", item.noun(), item.id());
                } else {
                    info!("{} edited {} {}", account.nickname, item.noun(), item.id());
                }
                self.editing = None;
                self.fetch_all().await
            }
            Err(e) => Err(self.fail(format!("Failed to update {}", item.noun()), e)),
        }
    }

    pub async fn delete(&mut self, item: ItemRef) -> Result<(), BoardError> {
        let account = self.require_account()?;
        self.owned_facts(item, &account)?;

        match self.backend.delete_item(item, account.id).await {
            Ok(rows) => {
                if rows == 0 {
                    warn!("Delete of {} {} matched no rows", item.noun(), item.id());
                } else {
                    info!("{} deleted {} {}", account.nickname, item.noun(), item.id());
                }
                if self.editing.as_ref().is_some_and(|e| e.item == item) {
                    self.editing = None;
                }
                self.fetch_all().await
            }
            Err(e) => Err(self.fail(format!("Failed to delete {}", item.noun()), e)),
        }
    }

    /// Likes or unlikes `item` for the signed-in account. Own items are
    /// skipped without contacting the backend.
    pub async fn toggle_like(&mut self, item: ItemRef) -> Result<(), BoardError> {
        let account = self.require_account()?;
        let facts = self.facts(item).ok_or(BoardError::UnknownItem(item))?;
        if facts.author_id == account.id {
            debug!("Ignoring like of own {}", item.noun());
            return Ok(());
        }

        let result = if facts.is_liked {
            self.backend
                .delete_like(account.id, item)
                .await
                .map(|rows| debug!("Removed {} like rows", rows))
        } else {
            self.backend.insert_like(account.id, item).await
        };

        match result {
            Ok(()) => self.fetch_all().await,
            Err(e) => Err(self.fail("Failed to update like", e)),
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            posts: self.posts.clone(),
            loading: self.loading,
            editing: self.editing.clone(),
            notice: self.notice.current(),
        }
    }

    fn validate(&mut self, body: &str) -> Result<(), BoardError> {
        validate_content(body).map_err(|e| {
            self.notice.error(e.to_string());
            BoardError::Validation(e)
        })
    }

    fn require_account(&self) -> Result<Account, BoardError> {
        self.auth.account().ok_or(BoardError::SignInRequired)
    }

    fn facts(&self, item: ItemRef) -> Option<ItemFacts> {
        match item {
            ItemRef::Post(id) => self.posts.iter().find(|p| p.id == id).map(|p| ItemFacts {
                author_id: p.author_id(),
                content: p.content.clone(),
                is_liked: p.is_liked,
            }),
            ItemRef::Reply(id) => self
                .posts
                .iter()
                .find_map(|p| p.reply(id))
                .map(|r| ItemFacts {
                    author_id: r.author_id(),
                    content: r.content.clone(),
                    is_liked: r.is_liked,
                }),
        }
    }

    /// Facts of an item the account is allowed to edit or delete.
    fn owned_facts(&self, item: ItemRef, account: &Account) -> Result<ItemFacts, BoardError> {
        let facts = self.facts(item).ok_or(BoardError::UnknownItem(item))?;
        if facts.author_id != account.id {
            return Err(BoardError::NotAuthor(item));
        }
        Ok(facts)
    }

    fn fail(&mut self, message: impl Into<String>, source: BackendError) -> BoardError {
        let message = message.into();
        error!("{}: {}", message, source);
        self.notice.error(message.clone());
        BoardError::Backend { message, source }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn content_limits_count_characters() {
        assert_eq!(validate_content(""), Err(ContentError::Empty));
        assert_eq!(validate_content("  \n\t"), Err(ContentError::Empty));
        assert!(validate_content(&"é".repeat(MAX_CONTENT_CHARS)).is_ok());
        assert_eq!(
            validate_content(&"a".repeat(MAX_CONTENT_CHARS + 1)),
            Err(ContentError::TooLong {
                max: MAX_CONTENT_CHARS
            })
        );
    }

    #[test]
    fn projection_marks_viewer_likes_and_falls_back_on_author() {
        let viewer = Uuid::new_v4();
        let post_id = Uuid::new_v4();
        let created_at = Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap();
        let record = PostRecord {
            id: post_id,
            content: "hello".into(),
            author_id: Uuid::new_v4(),
            author_nickname: None,
            created_at,
            liked_by: vec![viewer, Uuid::new_v4()],
            replies: vec![ReplyRecord {
                id: Uuid::new_v4(),
                post_id,
                content: "hi".into(),
                author_id: viewer,
                author_nickname: Some("me".into()),
                created_at,
                liked_by: vec![],
            }],
        };

        let expanded = HashSet::from([post_id]);
        let view = post_view(record, Some(viewer), &expanded);
        assert_eq!(view.author, UNKNOWN_AUTHOR);
        assert_eq!(view.likes, 2);
        assert!(view.is_liked);
        assert!(view.show_replies);
        assert_eq!(view.date, "March 4, 2025");
        assert_eq!(view.replies[0].author, "me");
        assert!(!view.replies[0].is_liked);
    }
}
