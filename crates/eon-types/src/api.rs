use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, SelectionSet, SparkId, Stat};
use crate::views::{EditingView, NoticeView, PostView};

// -- Page queries --

/// Query string shared by the sign-in and sign-up pages. Carries a flash
/// message and a pre-filled email across the redirect loop between them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub message: Option<String>,
    pub email: Option<String>,
}

// -- Forms --

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRequest {
    pub content: String,
}

// -- Snapshots --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionScope {
    Visitor,
    Account,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionSnapshot {
    pub scope: SelectionScope,
    pub selected: SelectionSet,
    pub committed: SelectionSet,
    pub max: usize,
    pub dirty: bool,
    pub notice: Option<NoticeView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub posts: Vec<PostView>,
    pub loading: bool,
    pub editing: Option<EditingView>,
    pub notice: Option<NoticeView>,
}

// -- Pages --

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            nickname: account.nickname.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavLink {
    pub name: &'static str,
    pub href: &'static str,
    pub section: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SparkCard {
    pub id: SparkId,
    pub name: &'static str,
    pub description: &'static str,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandingPage {
    pub nav: Vec<NavLink>,
    pub stats: &'static [Stat],
    pub sparks: Vec<SparkCard>,
    pub account: Option<AccountSummary>,
    pub selections: SelectionSnapshot,
    pub community: BoardSnapshot,
    /// Section the page should scroll to on load, if any.
    pub focus: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SparksPage {
    pub sparks: Vec<SparkCard>,
    pub selections: SelectionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInPage {
    pub email: String,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpPage {
    pub email: String,
    pub message: Option<String>,
    pub error: Option<String>,
    /// Visitor picks that will be attached to the new account.
    pub pending_selections: SelectionSet,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
