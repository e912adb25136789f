//! Synchronization controller and its rendering seam

pub mod controller;
pub mod render;

pub use controller::{SyncController, SyncPhase};
pub use render::{ChannelRenderer, NoopRenderer, RenderSink, RenderUpdate};
