use std::sync::Arc;

use tracing::debug;

use eon_backend::Backend;
use eon_db::DeviceStorage;

use crate::auth::AuthGateway;
use crate::board::CommunityBoard;
use crate::handoff::SelectionHandoff;
use crate::selection::SelectionStore;

/// Everything one device holds, wired to a single backend client.
pub struct DeviceSession {
    pub gateway: AuthGateway,
    pub selections: SelectionStore,
    pub board: CommunityBoard,
    pub handoff: SelectionHandoff,
}

impl DeviceSession {
    pub async fn open(backend: Arc<dyn Backend>, storage: DeviceStorage, max_selections: usize) -> Self {
        debug!(device = %storage.device_id(), "Opening device session");
        let gateway = AuthGateway::start(backend.clone()).await;
        let selections = SelectionStore::new(
            backend.clone(),
            storage.clone(),
            gateway.handle(),
            max_selections,
        );
        let board = CommunityBoard::new(backend, gateway.handle());
        let handoff = SelectionHandoff::new(storage);

        Self {
            gateway,
            selections,
            board,
            handoff,
        }
    }
}
