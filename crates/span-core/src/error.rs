//! Core error types

use span_client::ClientError;
use span_types::OfferKey;
use thiserror::Error;

/// Errors surfaced by the core runtime to its callers
#[derive(Debug, Error)]
pub enum CoreError {
    /// The runtime stopped before the operation completed
    #[error("runtime stopped")]
    Stopped,

    /// A withdrawal for this offer is already in progress
    #[error("withdrawal already pending for offer {0}")]
    WithdrawalPending(OfferKey),

    /// The beneficiary rejected the withdrawal with a non-availability error
    #[error("withdrawal of offer {key} rejected: {source}")]
    WithdrawalFailed {
        /// Offer the withdrawal was for
        key: OfferKey,
        /// The permanent RPC failure
        source: ClientError,
    },
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
