use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use eon_backend::{Backend, BackendError};
use eon_types::models::{Account, SelectionSet};

use crate::error::{SignInError, SignUpError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub account: Option<Account>,
    /// True until the stored session has been restored.
    pub loading: bool,
}

/// Read side of the gateway, handed to whatever needs to know who is
/// signed in.
#[derive(Clone)]
pub struct AuthHandle {
    rx: watch::Receiver<AuthState>,
}

impl AuthHandle {
    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.rx.borrow().account.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().loading
    }

    /// Waits for the next published state. Returns false once the gateway
    /// is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Wraps the backend's auth service and publishes the current account.
pub struct AuthGateway {
    backend: Arc<dyn Backend>,
    tx: Arc<watch::Sender<AuthState>>,
    listener: JoinHandle<()>,
}

impl AuthGateway {
    /// Restores any existing session and starts following the backend's
    /// session changes until the gateway is dropped.
    pub async fn start(backend: Arc<dyn Backend>) -> Self {
        let (tx, _) = watch::channel(AuthState {
            account: None,
            loading: true,
        });
        let tx = Arc::new(tx);

        // Subscribe before restoring so no change slips between the two.
        let mut events = backend.subscribe_auth();
        let listener_tx = tx.clone();
        let listener = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let account = event.session().map(|s| s.account.clone());
                        debug!(
                            "Session change: {}",
                            account.as_ref().map_or("signed out", |a| a.email.as_str())
                        );
                        publish(&listener_tx, account);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Auth listener lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let restored = match backend.get_session().await {
            Ok(session) => session.map(|s| s.account),
            Err(e) => {
                error!("Failed to restore session: {}", e);
                None
            }
        };
        tx.send_modify(|state| {
            state.account = restored;
            state.loading = false;
        });

        Self {
            backend,
            tx,
            listener,
        }
    }

    pub fn handle(&self) -> AuthHandle {
        AuthHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn account(&self) -> Option<Account> {
        self.tx.borrow().account.clone()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Account, SignInError> {
        match self.backend.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!("{} signed in", session.account.email);
                publish(&self.tx, Some(session.account.clone()));
                Ok(session.account)
            }
            Err(BackendError::InvalidCredentials) => {
                debug!("Sign-in rejected for {}", email);
                Err(SignInError::AccountNotFound)
            }
            Err(e) => {
                warn!("Sign-in failed for {}: {}", email, e);
                Err(SignInError::Rejected(e.to_string()))
            }
        }
    }

    /// Creates the account, then writes `initial` as its selections row.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
        initial: &SelectionSet,
    ) -> Result<Account, SignUpError> {
        let created = match self.backend.sign_up(email, password, nickname).await {
            Ok(created) => created,
            Err(BackendError::AlreadyRegistered) => return Err(SignUpError::AlreadyRegistered),
            Err(e) => {
                warn!("Sign-up failed for {}: {}", email, e);
                return Err(SignUpError::Rejected(e.to_string()));
            }
        };

        info!("Account {} created for {}", created.account.id, created.account.email);
        if let Some(session) = &created.session {
            publish(&self.tx, Some(session.account.clone()));
        }

        if let Err(source) = self
            .backend
            .insert_selections(created.account.id, initial)
            .await
        {
            error!(
                "Failed to save initial selections for {}: {}",
                created.account.id, source
            );
            return Err(SignUpError::SelectionsNotSaved {
                account: created.account,
                source,
            });
        }

        Ok(created.account)
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.backend.sign_out().await?;
        info!("Signed out");
        publish(&self.tx, None);
        Ok(())
    }
}

impl Drop for AuthGateway {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Sets the account and clears `loading`, notifying only on a real change.
fn publish(tx: &watch::Sender<AuthState>, account: Option<Account>) {
    tx.send_if_modified(|state| {
        let changed = state.account != account || state.loading;
        state.account = account;
        state.loading = false;
        changed
    });
}
