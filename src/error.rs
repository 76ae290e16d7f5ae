use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::schema::BatchId;

// ------------------------------------------------------------
// Collection errors
// ------------------------------------------------------------
//
// Every variant is fatal for the collection in progress.
// Payloads gathered before the failure are discarded by the
// caller; nothing here is retried.
//
#[derive(Debug, Error)]
pub enum CollectError {
    /// The loopback socket could not be opened.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The single-request HTTP server stopped before handing over a payload.
    #[error("listener failed: {0}")]
    Serve(String),

    /// Request body was not a JSON document.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Batch-bound collection received a payload without `batch`.
    #[error("payload carries no batch metadata")]
    MissingBatch,

    /// `batch` is present but its `id` or `size` is unusable.
    #[error("invalid batch metadata: {0}")]
    InvalidBatch(String),

    /// More payloads arrived for a batch than it declared.
    #[error("batch {id} received more than its declared {size} payloads")]
    BatchOverflow { id: BatchId, size: u64 },

    /// An otherwise unbounded wait hit the configured ceiling.
    #[error("no payload arrived within {0:?}")]
    WaitLimitExceeded(Duration),

    /// The payload source ended while a payload was still required.
    #[error("payload source closed before collection finished")]
    SourceClosed,
}

/// Returned by the naming heuristics when no rule matched.
///
/// The caller decides whether to prompt, default or abort.
#[derive(Debug, Error)]
#[error("could not derive a name for problem {title:?}")]
pub struct NameResolutionFailed {
    pub title: String,
}
