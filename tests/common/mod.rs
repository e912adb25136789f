//! Common test utilities and helpers
//!
//! - Scripted store fake
//! - Session and controller fixtures
//! - Custom assertion macros

pub mod assertions;

use std::sync::Arc;
use std::time::Duration;

use schoolchat::client::{NoopRenderer, SessionContext, SyncController, UserIdentity};
use schoolchat::shared::AppConfig;
use schoolchat::store::DocumentStore;

pub use fakes::*;

pub fn student() -> UserIdentity {
    UserIdentity::new("student1", "Sara")
}

pub fn session_with(config: AppConfig) -> SessionContext {
    SessionContext::new(Some(student()), config)
}

pub fn controller_over(store: Arc<dyn DocumentStore>) -> SyncController {
    SyncController::new(store, session_with(AppConfig::default()), Box::new(NoopRenderer))
}

/// Apply deliveries until nothing arrives for a short while
pub async fn settle(controller: &mut SyncController) {
    while let Ok(true) = tokio::time::timeout(Duration::from_millis(150), controller.process_next()).await {}
}

/// Apply deliveries until `done` holds. Panics after five seconds.
pub async fn wait_until<F>(controller: &mut SyncController, mut done: F)
where
    F: FnMut(&SyncController) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done(controller) {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within 5s");
        }
        let _ = tokio::time::timeout(Duration::from_millis(100), controller.process_next()).await;
    }
}
