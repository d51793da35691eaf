//! Shared types, adapter traits, and core utilities for banhammer.
//!
//! This crate contains the foundational types that are shared between the
//! core crate, the job runners and all storage adapter implementations.
//! Keeping them separate lets adapter crates compile without pulling in the
//! aggregation logic.

pub mod ban_adapter;
pub mod bucket;
pub mod error;
pub mod event_log_adapter;
pub mod job_lock_adapter;
pub mod prelude;
pub mod types;

// vim: ts=4
