use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::SinkResult;
use crate::event::LogEvent;

/// Receiver of pre-batched log events.
///
/// The host decides when a batch is due and calls [`BatchedLogSink::emit_batch`] with the
/// pending events, or [`BatchedLogSink::on_empty_batch`] when a flush finds nothing
/// pending. Calls are serialised by the host; implementations do not expect overlapping
/// batches.
///
/// A failed batch is returned to the host, which owns redelivery. Implementations do not
/// retry.
pub trait BatchedLogSink: Send + Sync {
    /// Writes `events` as one batch, in order.
    fn emit_batch(
        &self,
        events: Vec<LogEvent>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Called on a flush with nothing pending. The default implementation is a no-op.
    fn on_empty_batch(&self) -> impl Future<Output = SinkResult<()>> + Send {
        async { Ok(()) }
    }

    /// Releases the sink's resources. Later batches are ignored.
    ///
    /// Must be idempotent. The default implementation is a no-op.
    fn dispose(&self) -> impl Future<Output = SinkResult<()>> + Send {
        async { Ok(()) }
    }
}
