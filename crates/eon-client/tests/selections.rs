use std::sync::Arc;

use uuid::Uuid;

use eon_backend::{Backend, MemoryBackend};
use eon_client::{AuthGateway, SelectionError, SelectionHandoff, SelectionStore};
use eon_db::{Database, DeviceStorage, StorageHub};
use eon_types::VISITOR_SELECTIONS_KEY;
use eon_types::api::SelectionScope;
use eon_types::models::{SelectionSet, SparkId, Toggle};
use eon_types::views::NoticeKind;

struct Device {
    storage: DeviceStorage,
    gateway: AuthGateway,
}

impl Device {
    async fn open(project: &MemoryBackend, db: &Arc<Database>, hub: &StorageHub, id: Uuid) -> Self {
        let backend: Arc<dyn Backend> = Arc::new(project.client());
        Self {
            storage: DeviceStorage::new(db.clone(), hub.clone(), id),
            gateway: AuthGateway::start(backend).await,
        }
    }

    fn store(&self) -> SelectionStore {
        SelectionStore::new(
            self.gateway.backend().clone(),
            self.storage.clone(),
            self.gateway.handle(),
            2,
        )
    }
}

async fn visitor() -> Device {
    let project = MemoryBackend::with_light_hashing("test-secret");
    let db = Arc::new(Database::open_in_memory().unwrap());
    Device::open(&project, &db, &StorageHub::new(), Uuid::new_v4()).await
}

#[tokio::test]
async fn limit_holds_and_warns_once_per_attempt() {
    let device = visitor().await;
    let mut store = device.store();

    assert_eq!(store.select(SparkId(1)).await.unwrap(), Toggle::Added);
    assert_eq!(store.select(SparkId(2)).await.unwrap(), Toggle::Added);

    let err = store.select(SparkId(3)).await.unwrap_err();
    assert!(matches!(err, SelectionError::LimitReached { max: 2 }));

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.selected.ids(), &[SparkId(1), SparkId(2)]);
    let notice = snapshot.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "You can only select up to 2 sparks");

    // Deselecting frees a slot.
    assert_eq!(store.select(SparkId(1)).await.unwrap(), Toggle::Removed);
    assert_eq!(store.select(SparkId(3)).await.unwrap(), Toggle::Added);
    assert_eq!(store.selected().ids(), &[SparkId(2), SparkId(3)]);
}

#[tokio::test]
async fn unknown_sparks_are_rejected() {
    let device = visitor().await;
    let mut store = device.store();
    let err = store.select(SparkId(99)).await.unwrap_err();
    assert!(matches!(err, SelectionError::UnknownSpark(SparkId(99))));
    assert!(store.selected().is_empty());

    let notice = store.snapshot().await.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, err.to_string());
}

#[tokio::test]
async fn visitor_toggles_write_through_to_device() {
    let device = visitor().await;
    let mut store = device.store();
    store.select(SparkId(4)).await.unwrap();

    assert_eq!(
        device
            .storage
            .get_item(VISITOR_SELECTIONS_KEY)
            .await
            .unwrap()
            .as_deref(),
        Some("[4]")
    );

    // Commit has nothing to do for a visitor.
    store.commit().await.unwrap();
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.scope, SelectionScope::Visitor);
    assert!(!snapshot.dirty);
    assert!(snapshot.notice.is_none());
}

#[tokio::test]
async fn stores_on_one_device_follow_each_other() {
    let project = MemoryBackend::with_light_hashing("test-secret");
    let db = Arc::new(Database::open_in_memory().unwrap());
    let hub = StorageHub::new();
    let device_id = Uuid::new_v4();

    let tab_a = Device::open(&project, &db, &hub, device_id).await;
    let tab_b = Device::open(&project, &db, &hub, device_id).await;
    let other = Device::open(&project, &db, &hub, Uuid::new_v4()).await;

    let mut store_a = tab_a.store();
    let mut store_b = tab_b.store();
    let mut store_other = other.store();
    assert!(store_b.snapshot().await.selected.is_empty());

    store_a.select(SparkId(2)).await.unwrap();

    assert_eq!(store_b.snapshot().await.selected.ids(), &[SparkId(2)]);
    assert!(store_other.snapshot().await.selected.is_empty());
}

#[tokio::test]
async fn corrupt_device_value_reads_as_empty() {
    let device = visitor().await;
    device
        .storage
        .set_item(VISITOR_SELECTIONS_KEY, "{oops")
        .await
        .unwrap();

    let mut store = device.store();
    assert!(store.snapshot().await.selected.is_empty());
    assert_eq!(store.select(SparkId(1)).await.unwrap(), Toggle::Added);
}

#[tokio::test]
async fn account_edits_stay_local_until_commit() {
    let device = visitor().await;
    let account = device
        .gateway
        .sign_up(
            "ana@example.com",
            "hunter22",
            "ana",
            &SelectionSet::from_ids([SparkId(1)]),
        )
        .await
        .unwrap();

    let mut store = device.store();
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.scope, SelectionScope::Account);
    assert_eq!(snapshot.selected.ids(), &[SparkId(1)]);

    store.select(SparkId(3)).await.unwrap();
    assert!(store.is_dirty());
    let remote = device
        .gateway
        .backend()
        .fetch_selections(account.id)
        .await
        .unwrap();
    assert_eq!(remote, Some(SelectionSet::from_ids([SparkId(1)])));

    store.commit().await.unwrap();
    assert!(!store.is_dirty());
    let remote = device
        .gateway
        .backend()
        .fetch_selections(account.id)
        .await
        .unwrap();
    assert_eq!(remote, Some(SelectionSet::from_ids([SparkId(1), SparkId(3)])));

    let notice = store.snapshot().await.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Success);
    assert_eq!(notice.message, "Spark selections updated successfully!");

    // Account picks never touch the device key.
    assert_eq!(
        device.storage.get_item(VISITOR_SELECTIONS_KEY).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn store_switches_scope_with_the_account() {
    let device = visitor().await;
    let mut store = device.store();
    store.select(SparkId(2)).await.unwrap();

    let handoff = SelectionHandoff::new(device.storage.clone());
    handoff
        .sign_up(&device.gateway, "ben@example.com", "hunter22", "ben")
        .await
        .unwrap();

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.scope, SelectionScope::Account);
    assert_eq!(snapshot.selected.ids(), &[SparkId(2)]);

    device.gateway.sign_out().await.unwrap();
    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.scope, SelectionScope::Visitor);
    assert!(snapshot.selected.is_empty());
}
