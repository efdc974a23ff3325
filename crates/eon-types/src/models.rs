use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Accounts --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Chosen at sign-up and stored as account metadata.
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

/// An authenticated session as handed out by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub account: Account,
}

// -- Sparks --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparkId(pub u32);

impl fmt::Display for SparkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Spark {
    pub id: SparkId,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stat {
    pub id: u32,
    pub name: &'static str,
    pub value: &'static str,
    pub icon: &'static str,
}

/// Result of toggling one spark in a [`SelectionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// Ordered, duplicate-free list of picked sparks.
///
/// Serialized as a bare JSON array of integers, which is both the device
/// storage format and the `selections` column of the remote row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet(Vec<SparkId>);

impl SelectionSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_ids(ids: impl IntoIterator<Item = SparkId>) -> Self {
        let mut set = Self::new();
        for id in ids {
            if !set.contains(id) {
                set.0.push(id);
            }
        }
        set
    }

    pub fn contains(&self, id: SparkId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> &[SparkId] {
        &self.0
    }

    /// Removes `id` if present, otherwise appends it. Returns `None` and
    /// leaves the set untouched when adding would exceed `max`.
    pub fn toggle(&mut self, id: SparkId, max: usize) -> Option<Toggle> {
        if let Some(pos) = self.0.iter().position(|s| *s == id) {
            self.0.remove(pos);
            return Some(Toggle::Removed);
        }
        if self.0.len() >= max {
            return None;
        }
        self.0.push(id);
        Some(Toggle::Added)
    }

    /// Drops picks beyond `max`, keeping the oldest ones.
    pub fn truncate(&mut self, max: usize) {
        self.0.truncate(max);
    }
}

// -- Likes --

/// What a like points at: a post or a reply, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ItemRef {
    Post(Uuid),
    Reply(Uuid),
}

impl ItemRef {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Post(id) | Self::Reply(id) => *id,
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::Reply(_) => "reply",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut set = SelectionSet::new();
        assert_eq!(set.toggle(SparkId(3), 2), Some(Toggle::Added));
        assert!(set.contains(SparkId(3)));
        assert_eq!(set.toggle(SparkId(3), 2), Some(Toggle::Removed));
        assert!(set.is_empty());
    }

    #[test]
    fn toggle_refuses_past_max() {
        let mut set = SelectionSet::from_ids([SparkId(1), SparkId(2)]);
        assert_eq!(set.toggle(SparkId(4), 2), None);
        assert_eq!(set.ids(), &[SparkId(1), SparkId(2)]);

        // Removing is still allowed at the limit.
        assert_eq!(set.toggle(SparkId(1), 2), Some(Toggle::Removed));
        assert_eq!(set.ids(), &[SparkId(2)]);
    }

    #[test]
    fn from_ids_drops_duplicates_in_order() {
        let set = SelectionSet::from_ids([SparkId(2), SparkId(1), SparkId(2)]);
        assert_eq!(set.ids(), &[SparkId(2), SparkId(1)]);
    }

    #[test]
    fn selection_set_is_a_plain_json_list() {
        let set = SelectionSet::from_ids([SparkId(1), SparkId(4)]);
        assert_eq!(serde_json::to_string(&set).unwrap(), "[1,4]");
        let parsed: SelectionSet = serde_json::from_str("[4,1]").unwrap();
        assert_eq!(parsed.ids(), &[SparkId(4), SparkId(1)]);
    }

    #[test]
    fn item_ref_serializes_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ItemRef::Reply(id)).unwrap();
        assert_eq!(json["kind"], "reply");
        assert_eq!(json["id"], id.to_string());
    }
}
