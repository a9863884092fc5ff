//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `DiscoveryPhase`: where a category's URL discovery currently is
//! - `BatchStatus`: lifecycle of an extraction batch (pending, running, done)

mod batch_status;
mod discovery_phase;

// Re-export main types
pub use batch_status::BatchStatus;
pub use discovery_phase::DiscoveryPhase;
