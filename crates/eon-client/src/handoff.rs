use tracing::{info, warn};

use eon_db::DeviceStorage;
use eon_types::VISITOR_SELECTIONS_KEY;
use eon_types::models::{Account, SelectionSet};

use crate::auth::AuthGateway;
use crate::error::{HandoffError, SignUpError};
use crate::selection::decode_visitor_set;

/// Carries a visitor's device-held picks into a new account.
pub struct SelectionHandoff {
    storage: DeviceStorage,
}

impl SelectionHandoff {
    pub fn new(storage: DeviceStorage) -> Self {
        Self { storage }
    }

    /// The picks that sign-up would attach.
    pub async fn pending(&self) -> Result<SelectionSet, HandoffError> {
        let raw = self
            .storage
            .get_item(VISITOR_SELECTIONS_KEY)
            .await
            .map_err(HandoffError::Storage)?;
        Ok(raw.map(|r| decode_visitor_set(&r)).unwrap_or_default())
    }

    /// Signs up with the pending picks as the account's first selections row.
    /// The device copy is cleared only when both writes went through.
    pub async fn sign_up(
        &self,
        gateway: &AuthGateway,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<Account, HandoffError> {
        let selections = self.pending().await?;
        let account = match gateway.sign_up(email, password, nickname, &selections).await {
            Ok(account) => account,
            Err(e @ SignUpError::SelectionsNotSaved { .. }) => {
                warn!("Keeping visitor selections on device after partial sign-up");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.storage.remove_item(VISITOR_SELECTIONS_KEY).await {
            warn!("Failed to clear visitor selections: {}", e);
        }
        info!(
            "Handed {} visitor selections to {}",
            selections.len(),
            account.id
        );
        Ok(account)
    }
}
