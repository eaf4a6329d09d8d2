//! Staged, reversible deletion.
//!
//! Files selected for deletion are first moved into a per-operation directory
//! under the staging root. From there an operation is either undone (files go
//! back where they came from) or confirmed (files go to the trash or are
//! unlinked). The ledger keeps a descriptor per operation and an append-only
//! log of every transition.

mod deleter;
mod ledger;
mod models;
mod report;
mod trash;

#[cfg(test)]
mod tests;

pub use deleter::SafeDeleter;
pub use ledger::{OperationSlot, StagingLedger, DESCRIPTOR_FILE};
pub use models::{
    DeletionOperation, LedgerEvent, OperationLogEntry, OperationMetadata, OperationStatus,
    StagedFileEntry, StatusTransition,
};
pub use report::{
    FileFailure, Refusal, SkipReason, SkippedFile, StagePreview, StageReport, TransitionReport,
};
pub use trash::{trash_from_config, DirectoryTrash, RecoverableTrash, SystemTrash};
