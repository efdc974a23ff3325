use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use eon_backend::Connector;
use eon_client::DeviceSession;
use eon_db::{Database, DeviceStorage, StorageHub};

pub type AppState = Arc<AppStateInner>;

/// A device's client state. Actions on one device run one at a time.
pub type Device = Arc<Mutex<DeviceSession>>;

struct DeviceSlot {
    session: Device,
    last_used: Instant,
}

pub struct AppStateInner {
    pub connector: Arc<dyn Connector>,
    pub db: Arc<Database>,
    pub hub: StorageHub,
    pub max_selections: usize,
    devices: Mutex<HashMap<Uuid, DeviceSlot>>,
}

impl AppStateInner {
    pub fn new(connector: Arc<dyn Connector>, db: Arc<Database>, max_selections: usize) -> AppState {
        Arc::new(Self {
            connector,
            db,
            hub: StorageHub::new(),
            max_selections,
            devices: Mutex::new(HashMap::new()),
        })
    }

    /// The session for `device_id`, opened on first use.
    pub async fn device(&self, device_id: Uuid) -> Device {
        if let Some(slot) = self.devices.lock().await.get_mut(&device_id) {
            slot.last_used = Instant::now();
            return slot.session.clone();
        }

        // Record the device off the async runtime; a failure here only costs
        // the bookkeeping row.
        let db = self.db.clone();
        let id = device_id.to_string();
        let recorded = tokio::task::spawn_blocking(move || {
            let known = db.get_device(&id)?;
            db.touch_device(&id)?;
            let stored = db.list_items(&id)?.len();
            Ok::<_, anyhow::Error>((known, stored))
        })
        .await;
        match recorded {
            Ok(Ok((Some(known), stored))) => debug!(
                "Device {} first seen {}, {} stored keys",
                device_id, known.created_at, stored
            ),
            Ok(Ok((None, _))) => debug!("First visit from device {}", device_id),
            Ok(Err(e)) => error!("Failed to record device {}: {}", device_id, e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }

        let storage = DeviceStorage::new(self.db.clone(), self.hub.clone(), device_id);
        let session =
            DeviceSession::open(self.connector.connect(), storage, self.max_selections).await;

        self.devices
            .lock()
            .await
            .entry(device_id)
            .or_insert_with(|| {
                info!("New device session {}", device_id);
                DeviceSlot {
                    session: Arc::new(Mutex::new(session)),
                    last_used: Instant::now(),
                }
            })
            .session
            .clone()
    }

    /// Drops sessions untouched for `idle`. Sessions a request still holds
    /// are kept. Visitor selections live in device storage and survive;
    /// a signed-in device has to sign in again.
    pub async fn sweep_idle(&self, idle: Duration) -> usize {
        let mut devices = self.devices.lock().await;
        let before = devices.len();
        devices.retain(|id, slot| {
            let keep = slot.last_used.elapsed() < idle || Arc::strong_count(&slot.session) > 1;
            if !keep {
                debug!("Closing idle device session {}", id);
            }
            keep
        });
        before - devices.len()
    }

    pub async fn open_devices(&self) -> usize {
        self.devices.lock().await.len()
    }
}
