//! Core of the banhammer rate limiter.
//!
//! The request-serving process records every dispatched request through the
//! [`ingest::RequestLogger`] and asks [`lookup::BanLookup`] before handling a
//! new one. Two batch jobs run on their own schedule: the ban aggregator
//! ([`aggregator::run_cycle`]) recomputes the ban table from recent traffic,
//! and the pruner ([`pruner::prune_logs`]) bounds the size of the request log.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod ingest;
pub mod job;
pub mod lookup;
pub mod memory_adapter;
pub mod prelude;
pub mod pruner;

pub use aggregator::{CycleReport, run_cycle};
pub use config::{BanHammerConfig, PruneConfig};
pub use ingest::{RequestInfo, RequestLogger};
pub use lookup::{BanLookup, FailPolicy, RateLimitStatus};
pub use memory_adapter::MemoryAdapter;
pub use pruner::{PruneReport, prune_logs};

// vim: ts=4
