use std::sync::Arc;
use std::time::Duration;

use logship_config::shared::BatchConfig;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clickhouse::metrics::{LOGSHIP_EVENTS_DROPPED_TOTAL, register_metrics};
use crate::error::{ErrorKind, SinkResult};
use crate::event::{LogEvent, LogLevel};
use crate::sink::BatchedLogSink;
use crate::sink_error;

/// Minimal host for a [`BatchedLogSink`].
///
/// Events are queued on a bounded channel and handed to the sink by a background task,
/// either when `max_size` events are pending or when the flush interval elapses. A failed
/// batch is logged and dropped.
#[derive(Debug)]
pub struct BatchingSink {
    sender: mpsc::Sender<LogEvent>,
    minimum_level: LogLevel,
    shutdown: CancellationToken,
    handle: JoinHandle<SinkResult<()>>,
}

impl BatchingSink {
    /// Spawns the batching task on the current tokio runtime.
    pub fn spawn<S>(sink: Arc<S>, config: BatchConfig, minimum_level: LogLevel) -> SinkResult<Self>
    where
        S: BatchedLogSink + 'static,
    {
        config.validate()?;
        register_metrics();

        let (sender, receiver) = mpsc::channel(config.queue_limit);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_batching(sink, receiver, config, shutdown.clone()));

        Ok(Self {
            sender,
            minimum_level,
            shutdown,
            handle,
        })
    }

    /// Queues `event` for the next batch.
    ///
    /// Returns `false` when the event was dropped: below the minimum level, queue full,
    /// or the task already stopped.
    pub fn log(&self, event: LogEvent) -> bool {
        if event.level < self.minimum_level {
            return false;
        }

        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                metrics::counter!(LOGSHIP_EVENTS_DROPPED_TOTAL, "reason" => "queue_full")
                    .increment(1);
                warn!(level = %event.level, "batching queue is full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                metrics::counter!(LOGSHIP_EVENTS_DROPPED_TOTAL, "reason" => "closed").increment(1);
                warn!("batching task has stopped, dropping event");
                false
            }
        }
    }

    /// Flushes the pending events, disposes the sink and waits for the task to finish.
    pub async fn shutdown(self) -> SinkResult<()> {
        self.shutdown.cancel();
        drop(self.sender);

        self.handle
            .await
            .map_err(|e| sink_error!(ErrorKind::Unknown, "Failed to join batching task", e))?
    }
}

async fn run_batching<S>(
    sink: Arc<S>,
    mut receiver: mpsc::Receiver<LogEvent>,
    config: BatchConfig,
    shutdown: CancellationToken,
) -> SinkResult<()>
where
    S: BatchedLogSink,
{
    // Batches in flight are not cancelled by shutdown; they are allowed to complete.
    let cancel = CancellationToken::new();
    let mut interval = tokio::time::interval(Duration::from_millis(config.flush_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let mut batch = Vec::with_capacity(config.max_size);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,
            event = receiver.recv() => {
                let Some(event) = event else {
                    break;
                };

                batch.push(event);
                if batch.len() >= config.max_size {
                    flush(sink.as_ref(), &mut batch, &cancel).await;
                    interval.reset();
                }
            }
            _ = interval.tick() => flush(sink.as_ref(), &mut batch, &cancel).await,
        }
    }

    receiver.close();
    while let Ok(event) = receiver.try_recv() {
        batch.push(event);
        if batch.len() >= config.max_size {
            flush(sink.as_ref(), &mut batch, &cancel).await;
        }
    }
    if !batch.is_empty() {
        flush(sink.as_ref(), &mut batch, &cancel).await;
    }

    info!("batching task stopped, disposing sink");

    sink.dispose().await
}

async fn flush<S>(sink: &S, batch: &mut Vec<LogEvent>, cancel: &CancellationToken)
where
    S: BatchedLogSink,
{
    if batch.is_empty() {
        if let Err(err) = sink.on_empty_batch().await {
            error!(error = %err, "empty batch handler failed");
        }
        return;
    }

    let events = std::mem::take(batch);
    let count = events.len();
    debug!(events = count, "flushing batch");

    if let Err(err) = sink.emit_batch(events, cancel).await {
        error!(events = count, error = %err, "batch failed, dropping events");
    }
}
