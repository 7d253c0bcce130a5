//! Stage deadlines.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// A stage lost its race against the deadline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StageTimeout {
    pub message: String,
    pub deadline: Duration,
}

/// Race `operation` against `deadline`.
///
/// Whichever settles first wins. If the deadline fires first the operation
/// future is dropped, which is the only cancellation it gets: work it has
/// handed to another task or thread keeps running until it finishes on its
/// own.
pub async fn race<F>(
    operation: F,
    deadline: Duration,
    message: impl Into<String>,
) -> Result<F::Output, StageTimeout>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| StageTimeout {
            message: message.into(),
            deadline,
        })
}
