//! Reconciliation core: diffing, recording, and the per-pass sync driver.

pub mod diff;
pub mod error;
pub mod recorder;
pub mod sync_service;

pub use error::SyncError;
pub use recorder::ActivityRecorder;
pub use sync_service::PassSummary;
pub use sync_service::ReconcileOutcome;
pub use sync_service::SyncService;
