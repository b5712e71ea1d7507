//! Lead-to-deal pipeline for a real-estate marketplace.
//!
//! Buyers register interest in approved listings (leads), schedule property visits, and agents
//! convert qualifying leads into deals that negotiate through to a close. The crate exposes the
//! workflow services, the storage seams they depend on, and an axum router over them.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
