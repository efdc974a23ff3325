use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use eon_types::events::StorageEvent;

use crate::Database;

/// Fans storage writes out to every listener in the process.
#[derive(Clone)]
pub struct StorageHub {
    tx: broadcast::Sender<StorageEvent>,
}

impl StorageHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    fn publish(&self, event: StorageEvent) {
        // No listeners is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for StorageHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One device's view of the key-value store: the `localStorage` of a
/// browser profile.
#[derive(Clone)]
pub struct DeviceStorage {
    db: Arc<Database>,
    hub: StorageHub,
    device_id: Uuid,
}

impl DeviceStorage {
    pub fn new(db: Arc<Database>, hub: StorageHub, device_id: Uuid) -> Self {
        Self { db, hub, device_id }
    }

    pub fn device_id(&self) -> Uuid {
        self.device_id
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.clone();
        let device = self.device_id.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || db.get_item(&device, &key)).await?
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.clone();
        let device = self.device_id.to_string();
        let k = key.to_string();
        let v = value.to_string();
        tokio::task::spawn_blocking(move || db.set_item(&device, &k, &v)).await??;

        debug!(device = %self.device_id, key, "storage item set");
        self.hub.publish(StorageEvent {
            device_id: self.device_id,
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let db = self.db.clone();
        let device = self.device_id.to_string();
        let k = key.to_string();
        let removed = tokio::task::spawn_blocking(move || db.remove_item(&device, &k)).await??;

        if removed {
            debug!(device = %self.device_id, key, "storage item removed");
            self.hub.publish(StorageEvent {
                device_id: self.device_id,
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    /// Listen for writes made to this device's storage from anywhere in the
    /// process, including through this handle.
    pub fn subscribe(&self) -> DeviceEvents {
        DeviceEvents {
            device_id: self.device_id,
            rx: self.hub.tx.subscribe(),
        }
    }
}

/// Keys written since the last drain.
#[derive(Debug, Default)]
pub struct Changes {
    keys: HashSet<String>,
    lagged: bool,
}

impl Changes {
    /// True if `key` changed, or if events were dropped and it might have.
    pub fn touched(&self, key: &str) -> bool {
        self.lagged || self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        !self.lagged && self.keys.is_empty()
    }
}

pub struct DeviceEvents {
    device_id: Uuid,
    rx: broadcast::Receiver<StorageEvent>,
}

impl DeviceEvents {
    /// Collects pending notifications for this device without waiting.
    pub fn drain(&mut self) -> Changes {
        let mut changes = Changes::default();
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.device_id == self.device_id => {
                    changes.keys.insert(event.key);
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(device = %self.device_id, "storage listener lagged by {} events", n);
                    changes.lagged = true;
                }
                Err(_) => break,
            }
        }
        changes
    }

    /// Waits for the next notification for this device.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.device_id == self.device_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(device = %self.device_id, "storage listener lagged by {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
