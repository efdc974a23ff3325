use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Account, ItemRef};

/// Long en-US date, e.g. "March 4, 2025".
pub fn display_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

/// Ownership checks shared by posts and replies. These only drive which
/// controls are offered; the backend constrains writes on its own.
pub trait Authored {
    fn author_id(&self) -> Uuid;

    fn is_author(&self, viewer: Option<&Account>) -> bool {
        viewer.is_some_and(|a| a.id == self.author_id())
    }

    /// Edit and delete controls.
    fn can_modify(&self, viewer: Option<&Account>) -> bool {
        self.is_author(viewer)
    }

    /// Anonymous viewers see an enabled like button (it leads to sign-in);
    /// authors see it disabled.
    fn can_like(&self, viewer: Option<&Account>) -> bool {
        !self.is_author(viewer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub date: String,
    pub likes: usize,
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub date: String,
    pub likes: usize,
    pub is_liked: bool,
    pub replies: Vec<ReplyView>,
    pub show_replies: bool,
}

impl Authored for PostView {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for ReplyView {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl PostView {
    /// Signed-in viewers get a reply box on everyone's posts but their own.
    pub fn can_reply(&self, viewer: Option<&Account>) -> bool {
        viewer.is_some() && !self.is_author(viewer)
    }

    pub fn reply(&self, id: Uuid) -> Option<&ReplyView> {
        self.replies.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeView {
    pub kind: NoticeKind,
    pub message: String,
}

/// The item currently being edited and its draft body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditingView {
    pub item: ItemRef,
    pub draft: String,
}
