//! Session context and identity
//!
//! Authentication itself is delegated to an identity provider; this module
//! only carries who is signed in. The provider publishes changes on a
//! `tokio::sync::watch` channel where `None` means signed out.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::shared::config::AppConfig;
use crate::shared::error::{SyncError, SyncResult};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: String,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
        }
    }
}

/// Source of identity changes
pub trait IdentityProvider: Send + Sync {
    /// Receiver that always holds the current identity
    fn watch(&self) -> watch::Receiver<Option<UserIdentity>>;
}

/// Identity provider driven by the application itself
#[derive(Debug)]
pub struct LocalIdentity {
    tx: watch::Sender<Option<UserIdentity>>,
}

impl LocalIdentity {
    /// Provider with nobody signed in
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Provider with `user` already signed in
    pub fn signed_in(user: UserIdentity) -> Self {
        let (tx, _) = watch::channel(Some(user));
        Self { tx }
    }

    pub fn sign_in(&self, user: UserIdentity) {
        tracing::info!("[SESSION] Signed in as {}", user.uid);
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        tracing::info!("[SESSION] Signed out");
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<UserIdentity> {
        self.tx.borrow().clone()
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LocalIdentity {
    fn watch(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.tx.subscribe()
    }
}

/// Explicit per-session context handed to the controller
#[derive(Debug, Clone)]
pub struct SessionContext {
    user: Option<UserIdentity>,
    config: AppConfig,
}

impl SessionContext {
    pub fn new(user: Option<UserIdentity>, config: AppConfig) -> Self {
        Self { user, config }
    }

    /// Context holding the provider's current identity
    pub fn from_provider(provider: &dyn IdentityProvider, config: AppConfig) -> Self {
        let user = provider.watch().borrow().clone();
        Self::new(user, config)
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    /// The signed-in user or `Unauthenticated`
    pub fn require_user(&self) -> SyncResult<&UserIdentity> {
        self.user.as_ref().ok_or(SyncError::Unauthenticated)
    }

    pub fn set_user(&mut self, user: Option<UserIdentity>) {
        self.user = user;
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
