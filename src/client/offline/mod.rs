//! # Offline Support
//!
//! What keeps the UI usable without a round trip to the store:
//!
//! - `optimistic.rs`: ledger of sends appended before the store confirmed them
//! - `fallback.rs`: the fallback file read when the remote store is unreachable

pub mod fallback;
pub mod optimistic;

pub use fallback::{default_fallback_path, FallbackEntry, FallbackSnapshot};
pub use optimistic::{OptimisticLedger, PendingSend, PendingState};
