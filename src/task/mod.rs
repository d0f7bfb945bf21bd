//! Background tasks.

pub mod sync_scheduler;

pub use sync_scheduler::SyncScheduler;
