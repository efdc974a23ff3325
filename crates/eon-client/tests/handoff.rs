use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use eon_backend::{Backend, BackendError, MemoryBackend, PostRecord, SignUp};
use eon_client::{AuthGateway, HandoffError, SelectionHandoff, SelectionStore, SignUpError};
use eon_db::{Database, DeviceStorage, StorageHub};
use eon_types::VISITOR_SELECTIONS_KEY;
use eon_types::events::AuthEvent;
use eon_types::models::{ItemRef, SelectionSet, Session, SparkId};

fn storage() -> DeviceStorage {
    let db = Arc::new(Database::open_in_memory().unwrap());
    DeviceStorage::new(db, StorageHub::new(), Uuid::new_v4())
}

#[tokio::test]
async fn handoff_moves_visitor_picks_into_the_account() {
    let project = MemoryBackend::with_light_hashing("test-secret");
    let storage = storage();
    let gateway = AuthGateway::start(Arc::new(project.client())).await;

    let mut store = SelectionStore::new(
        gateway.backend().clone(),
        storage.clone(),
        gateway.handle(),
        2,
    );
    store.select(SparkId(3)).await.unwrap();
    store.select(SparkId(1)).await.unwrap();

    let handoff = SelectionHandoff::new(storage.clone());
    assert_eq!(
        handoff.pending().await.unwrap(),
        SelectionSet::from_ids([SparkId(3), SparkId(1)])
    );

    let account = handoff
        .sign_up(&gateway, "ana@example.com", "hunter22", "ana")
        .await
        .unwrap();

    assert_eq!(storage.get_item(VISITOR_SELECTIONS_KEY).await.unwrap(), None);
    let remote = gateway
        .backend()
        .fetch_selections(account.id)
        .await
        .unwrap();
    assert_eq!(remote, Some(SelectionSet::from_ids([SparkId(3), SparkId(1)])));
}

#[tokio::test]
async fn existing_account_keeps_the_visitor_copy() {
    let project = MemoryBackend::with_light_hashing("test-secret");
    let first = AuthGateway::start(Arc::new(project.client())).await;
    first
        .sign_up("ana@example.com", "hunter22", "ana", &SelectionSet::new())
        .await
        .unwrap();

    let storage = storage();
    storage.set_item(VISITOR_SELECTIONS_KEY, "[2]").await.unwrap();
    let gateway = AuthGateway::start(Arc::new(project.client())).await;

    let err = SelectionHandoff::new(storage.clone())
        .sign_up(&gateway, "ana@example.com", "hunter22", "ana")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HandoffError::SignUp(SignUpError::AlreadyRegistered)
    ));
    assert_eq!(
        storage
            .get_item(VISITOR_SELECTIONS_KEY)
            .await
            .unwrap()
            .as_deref(),
        Some("[2]")
    );
}

/// Creates accounts but refuses every selections write.
struct NoSelections {
    inner: Arc<dyn Backend>,
}

#[async_trait]
impl Backend for NoSelections {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.inner.get_session().await
    }
    async fn sign_in_with_password(&self, e: &str, p: &str) -> Result<Session, BackendError> {
        self.inner.sign_in_with_password(e, p).await
    }
    async fn sign_up(&self, e: &str, p: &str, n: &str) -> Result<SignUp, BackendError> {
        self.inner.sign_up(e, p, n).await
    }
    async fn sign_out(&self) -> Result<(), BackendError> {
        self.inner.sign_out().await
    }
    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.subscribe_auth()
    }
    async fn fetch_selections(&self, id: Uuid) -> Result<Option<SelectionSet>, BackendError> {
        self.inner.fetch_selections(id).await
    }
    async fn insert_selections(&self, _: Uuid, _: &SelectionSet) -> Result<(), BackendError> {
        Err(BackendError::Api {
            status: 503,
            message: "unavailable".into(),
        })
    }
    async fn upsert_selections(&self, _: Uuid, _: &SelectionSet) -> Result<(), BackendError> {
        Err(BackendError::Api {
            status: 503,
            message: "unavailable".into(),
        })
    }
    async fn fetch_posts(&self) -> Result<Vec<PostRecord>, BackendError> {
        self.inner.fetch_posts().await
    }
    async fn insert_post(&self, a: Uuid, c: &str) -> Result<Uuid, BackendError> {
        self.inner.insert_post(a, c).await
    }
    async fn insert_reply(&self, p: Uuid, a: Uuid, c: &str) -> Result<Uuid, BackendError> {
        self.inner.insert_reply(p, a, c).await
    }
    async fn update_content(&self, i: ItemRef, a: Uuid, c: &str) -> Result<u64, BackendError> {
        self.inner.update_content(i, a, c).await
    }
    async fn delete_item(&self, i: ItemRef, a: Uuid) -> Result<u64, BackendError> {
        self.inner.delete_item(i, a).await
    }
    async fn insert_like(&self, a: Uuid, t: ItemRef) -> Result<(), BackendError> {
        self.inner.insert_like(a, t).await
    }
    async fn delete_like(&self, a: Uuid, t: ItemRef) -> Result<u64, BackendError> {
        self.inner.delete_like(a, t).await
    }
}

#[tokio::test]
async fn partial_sign_up_returns_the_account_and_keeps_picks() {
    let project = MemoryBackend::with_light_hashing("test-secret");
    let backend = Arc::new(NoSelections {
        inner: Arc::new(project.client()),
    });
    let gateway = AuthGateway::start(backend).await;
    let storage = storage();
    storage.set_item(VISITOR_SELECTIONS_KEY, "[4]").await.unwrap();

    let err = SelectionHandoff::new(storage.clone())
        .sign_up(&gateway, "ben@example.com", "hunter22", "ben")
        .await
        .unwrap_err();

    match err {
        HandoffError::SignUp(SignUpError::SelectionsNotSaved { account, .. }) => {
            assert_eq!(account.nickname, "ben");
            assert_eq!(gateway.account().map(|a| a.id), Some(account.id));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(storage.get_item(VISITOR_SELECTIONS_KEY).await.unwrap().is_some());
}
