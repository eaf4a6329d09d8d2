//! Core functionality for safely removing duplicate images.
//!
//! This library provides:
//! - Staged, reversible deletion with an operation ledger
//! - Protected folder policy
//! - Exact duplicate grouping and review decisions
//! - Cross-platform reconciliation of local and cloud drive files

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

pub use cross_platform::{CrossPlatformReconciler, ReconcileStatistics};
pub use deduplication::{CandidateMap, ReviewDecision};
pub use safety::ProtectionPolicy;
pub use staging::{SafeDeleter, StagingLedger};

// -- Public Modules --
pub mod checksum;
pub mod config;
pub mod cross_platform;
pub mod deduplication;
pub mod discovery;
pub mod logging;
pub mod safety;
pub mod staging;
pub mod types;
pub mod utils;
