use crate::remote::RemoteError;
use crate::repository::StoreError;

/// Faults surfaced by a reconciliation pass.
///
/// `UserResolution` aborts the whole pass: a referenced user that cannot be
/// resolved signals a data-integrity problem, not a transient hiccup. The
/// other variants abort only the affected subscription, which is retried on
/// the next pass since its watermark was left unchanged.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Failed to resolve user `{user_id}`: {reason}")]
    UserResolution { user_id: String, reason: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
