use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use eon_backend::Backend;
use eon_db::{DeviceEvents, DeviceStorage};
use eon_types::VISITOR_SELECTIONS_KEY;
use eon_types::api::{SelectionScope, SelectionSnapshot};
use eon_types::catalog;
use eon_types::models::{SelectionSet, SparkId, Toggle};

use crate::auth::AuthHandle;
use crate::error::SelectionError;
use crate::notice::NoticeSlot;

/// Where the working set is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Unloaded,
    Visitor,
    Account(Uuid),
}

/// Decodes the visitor set kept in device storage. Anything unreadable
/// counts as no selections.
pub(crate) fn decode_visitor_set(raw: &str) -> SelectionSet {
    serde_json::from_str::<Vec<SparkId>>(raw)
        .map(SelectionSet::from_ids)
        .unwrap_or_else(|e| {
            warn!("Ignoring corrupt visitor selections {:?}: {}", raw, e);
            SelectionSet::new()
        })
}

/// The sparks a visitor or account has picked, bounded by `max`.
///
/// Visitors keep their set in device storage and every toggle is written
/// through. Signed-in accounts work on a copy of their remote row and push
/// it back with [`SelectionStore::commit`].
pub struct SelectionStore {
    backend: Arc<dyn Backend>,
    storage: DeviceStorage,
    events: DeviceEvents,
    auth: AuthHandle,
    max: usize,
    scope: Scope,
    selected: SelectionSet,
    committed: SelectionSet,
    notice: NoticeSlot,
}

impl SelectionStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: DeviceStorage,
        auth: AuthHandle,
        max: usize,
    ) -> Self {
        let events = storage.subscribe();
        Self {
            backend,
            storage,
            events,
            auth,
            max,
            scope: Scope::Unloaded,
            selected: SelectionSet::new(),
            committed: SelectionSet::new(),
            notice: NoticeSlot::new(),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Brings the working set in line with the current account and with
    /// writes other stores made to this device.
    pub async fn refresh(&mut self) {
        let wanted = match self.auth.account() {
            Some(account) => Scope::Account(account.id),
            None => Scope::Visitor,
        };
        let changes = self.events.drain();

        if wanted != self.scope {
            self.load(wanted).await;
        } else if wanted == Scope::Visitor && changes.touched(VISITOR_SELECTIONS_KEY) {
            debug!(device = %self.storage.device_id(), "Visitor selections changed on device");
            self.load(Scope::Visitor).await;
        }
    }

    async fn load(&mut self, scope: Scope) {
        let mut set = match scope {
            Scope::Unloaded => SelectionSet::new(),
            Scope::Visitor => match self.storage.get_item(VISITOR_SELECTIONS_KEY).await {
                Ok(Some(raw)) => decode_visitor_set(&raw),
                Ok(None) => SelectionSet::new(),
                Err(e) => {
                    error!("Failed to read visitor selections: {}", e);
                    SelectionSet::new()
                }
            },
            Scope::Account(account_id) => match self.backend.fetch_selections(account_id).await {
                Ok(row) => row.unwrap_or_default(),
                Err(e) => {
                    error!("Failed to fetch selections for {}: {}", account_id, e);
                    SelectionSet::new()
                }
            },
        };
        set.truncate(self.max);

        self.scope = scope;
        self.committed = set.clone();
        self.selected = set;
    }

    /// Toggles `id` in the working set.
    pub async fn select(&mut self, id: SparkId) -> Result<Toggle, SelectionError> {
        if catalog::spark(id).is_none() {
            let err = SelectionError::UnknownSpark(id);
            self.notice.error(err.to_string());
            return Err(err);
        }
        self.refresh().await;

        let before = self.selected.clone();
        let Some(toggle) = self.selected.toggle(id, self.max) else {
            let err = SelectionError::LimitReached { max: self.max };
            debug!("Selection of spark {} rejected at limit {}", id, self.max);
            self.notice.error(err.to_string());
            return Err(err);
        };

        if self.scope == Scope::Visitor {
            if let Err(e) = self.write_visitor_set().await {
                error!("Failed to store visitor selections: {}", e);
                self.selected = before;
                return Err(SelectionError::Storage(e));
            }
        }

        debug!("Spark {} {:?}", id, toggle);
        Ok(toggle)
    }

    async fn write_visitor_set(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&self.selected)?;
        self.storage.set_item(VISITOR_SELECTIONS_KEY, &raw).await
    }

    /// Writes the whole working set to the account's row. Visitors have
    /// nothing to commit.
    pub async fn commit(&mut self) -> Result<(), SelectionError> {
        self.refresh().await;
        let Scope::Account(account_id) = self.scope else {
            debug!("Commit skipped for visitor");
            return Ok(());
        };

        match self
            .backend
            .upsert_selections(account_id, &self.selected)
            .await
        {
            Ok(()) => {
                info!("Selections saved for {}", account_id);
                self.committed = self.selected.clone();
                self.notice.success("Spark selections updated successfully!");
                Ok(())
            }
            Err(e) => {
                error!("Failed to update selections for {}: {}", account_id, e);
                self.notice.error("Failed to update selections");
                Err(SelectionError::Backend(e))
            }
        }
    }

    pub fn selected(&self) -> &SelectionSet {
        &self.selected
    }

    /// True when an account has picks that are not in its remote row yet.
    pub fn is_dirty(&self) -> bool {
        matches!(self.scope, Scope::Account(_)) && self.selected != self.committed
    }

    pub async fn snapshot(&mut self) -> SelectionSnapshot {
        self.refresh().await;
        SelectionSnapshot {
            scope: match self.scope {
                Scope::Account(_) => SelectionScope::Account,
                Scope::Visitor | Scope::Unloaded => SelectionScope::Visitor,
            },
            selected: self.selected.clone(),
            committed: self.committed.clone(),
            max: self.max,
            dirty: self.is_dirty(),
            notice: self.notice.current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_storage_reads_as_empty() {
        assert!(decode_visitor_set("not json").is_empty());
        assert!(decode_visitor_set("{\"a\":1}").is_empty());
        assert_eq!(
            decode_visitor_set("[4,1,4]").ids(),
            &[SparkId(4), SparkId(1)]
        );
    }
}
