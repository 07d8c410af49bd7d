//! Batching processor engine.
//!
//! Producers call [`BatchProcessor::enqueue`] from any thread; it never blocks
//! on I/O. A background task exports batches when the scheduled delay elapses
//! or when the queue reaches `max_export_batch_size`. Every export goes through
//! one async mutex that also owns the exporter, so at most one export is in
//! flight per processor, whether it was started by the timer, a force-flush or
//! shutdown.

use crate::core::{
    BatchConfig, ExportOutcome, InstanceRegistry, ProcessorInstance, ProcessorState, Result,
    SelfObsError, Signal,
};
use crate::export::Exporter;
use crate::metrics::{ProcessorMetrics, SelfMetricsBinding, SizeReader};
use crate::processor::queue::{Admission, BoundedQueue};
use crate::processor::ProcessorContext;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Point-in-time counters for one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Registry-issued instance name
    pub name: String,
    /// Lifecycle state
    pub state: ProcessorState,
    /// Records currently queued
    pub queue_size: usize,
    /// Configured queue capacity
    pub queue_capacity: usize,
    /// Records accepted into the queue
    pub enqueued: u64,
    /// Records dropped because the queue was full
    pub dropped_queue_full: u64,
    /// Records dropped because the processor was shutting down or shut down
    pub dropped_on_shutdown: u64,
    /// Records in batches that exported successfully
    pub exported: u64,
    /// Records in batches the exporter failed
    pub failed: u64,
    /// Records in batches that timed out
    pub timed_out: u64,
    /// Export calls issued
    pub export_calls: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dropped_on_shutdown: AtomicU64,
    exported: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    export_calls: AtomicU64,
}

enum Step {
    Exported { count: usize, outcome: ExportOutcome },
    Empty,
    Released,
    Busy,
}

struct Shared<R: Send + 'static> {
    instance: ProcessorInstance,
    signal: Signal,
    config: BatchConfig,
    queue: Arc<BoundedQueue<R>>,
    exporter: AsyncMutex<Option<Box<dyn Exporter<R>>>>,
    state: AtomicU8,
    wake: Notify,
    stop: watch::Sender<bool>,
    /// `None` until the shutdown task finishes, then its result
    shutdown_result: watch::Sender<Option<bool>>,
    metrics: Arc<dyn ProcessorMetrics>,
    registry: Arc<InstanceRegistry>,
    counters: Counters,
    warned_full: AtomicBool,
}

/// Builder for [`BatchProcessor`].
pub struct BatchProcessorBuilder<R: Send + 'static> {
    signal: Signal,
    exporter: Box<dyn Exporter<R>>,
    config: Option<BatchConfig>,
    context: Option<ProcessorContext>,
}

impl<R: Send + 'static> BatchProcessorBuilder<R> {
    /// Use explicit batch settings instead of signal defaults plus environment.
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an explicit registry and metrics backend instead of the global ones.
    pub fn with_context(mut self, context: ProcessorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Validate settings, register the instance, bind metrics and start the worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<BatchProcessor<R>> {
        let config = self
            .config
            .unwrap_or_else(|| BatchConfig::from_env(self.signal));
        config.validate()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SelfObsError::runtime(format!("batching processor needs a tokio runtime: {e}"))
        })?;

        let context = self.context.unwrap_or_else(ProcessorContext::discover);
        let registry = Arc::clone(context.registry());
        let instance = registry.register_instance(self.signal.processor_component_type());
        let backend = context.metrics().map(Arc::clone);
        let metrics = SelfMetricsBinding::for_processor(backend, self.signal);

        let queue = Arc::new(BoundedQueue::new(config.max_queue_size));
        let weak_queue = Arc::downgrade(&queue);
        let size_reader: SizeReader =
            Arc::new(move || weak_queue.upgrade().map(|queue| queue.len()));
        metrics.bind_queue_observables(size_reader, config.max_queue_size, instance.name());

        let (stop, stop_rx) = watch::channel(false);

        tracing::debug!(
            component = %instance,
            max_queue_size = config.max_queue_size,
            max_export_batch_size = config.max_export_batch_size,
            scheduled_delay_ms = config.scheduled_delay.as_millis() as u64,
            export_timeout_ms = config.export_timeout.as_millis() as u64,
            metrics = metrics.is_active(),
            "Starting batching processor"
        );

        let shared = Arc::new(Shared {
            instance,
            signal: self.signal,
            config,
            queue,
            exporter: AsyncMutex::new(Some(self.exporter)),
            state: AtomicU8::new(ProcessorState::Running as u8),
            wake: Notify::new(),
            stop,
            shutdown_result: watch::Sender::new(None),
            metrics,
            registry,
            counters: Counters::default(),
            warned_full: AtomicBool::new(false),
        });

        let worker = runtime.spawn(run_worker(Arc::clone(&shared), stop_rx));

        Ok(BatchProcessor {
            shared,
            worker: parking_lot::Mutex::new(Some(worker)),
        })
    }
}

/// Buffers records and exports them in batches from a background task.
pub struct BatchProcessor<R: Send + 'static> {
    shared: Arc<Shared<R>>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<R: Send + 'static> std::fmt::Debug for BatchProcessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("name", &self.shared.instance.name())
            .field("state", &self.state())
            .field("queue", &self.shared.queue)
            .finish()
    }
}

impl<R: Send + 'static> BatchProcessor<R> {
    /// Start building a processor for `signal` that exports through `exporter`.
    pub fn builder<E>(signal: Signal, exporter: E) -> BatchProcessorBuilder<R>
    where
        E: Exporter<R> + 'static,
    {
        BatchProcessorBuilder {
            signal,
            exporter: Box::new(exporter),
            config: None,
            context: None,
        }
    }

    /// Offer a record for export.
    ///
    /// Drops the record if the queue is full or the processor is no longer
    /// running. Wakes the worker once a full batch is available.
    pub fn enqueue(&self, record: R) {
        let shared = &self.shared;
        if shared.state() != ProcessorState::Running {
            shared.counters.dropped_on_shutdown.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match shared.queue.push(record) {
            Admission::Accepted { len } => {
                if len >= shared.config.max_export_batch_size {
                    shared.wake.notify_one();
                }
            },
            Admission::Full => {
                if !shared.warned_full.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        component = %shared.instance,
                        capacity = shared.config.max_queue_size,
                        "Queue is full, dropping records"
                    );
                }
            },
        }
    }

    /// Export every record queued at call time, then flush the exporter.
    ///
    /// Returns true if all of them were exported successfully before the
    /// deadline. Returns false once the processor has shut down.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        let shared = &self.shared;
        if shared.state() == ProcessorState::Shutdown {
            tracing::debug!(component = %shared.instance, "Force flush after shutdown ignored");
            return false;
        }

        let deadline = Instant::now() + timeout;
        let pending = shared.queue.len();
        let drained = shared.drain(deadline, Some(pending)).await;
        let flushed = shared.flush_exporter(deadline).await;

        if !drained {
            tracing::warn!(
                component = %shared.instance,
                remaining = shared.queue.len(),
                "Force flush did not complete before the deadline"
            );
        }
        drained && flushed
    }

    /// Stop accepting records, export what is queued and release the exporter.
    ///
    /// Records still queued at the deadline are discarded. The work runs on
    /// its own task, so dropping this future does not stop it. Every call,
    /// including repeated or concurrent ones, waits for that task and returns
    /// its result: whether everything was exported and the exporter shut
    /// down cleanly before the first call's deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let shared = &self.shared;
        let mut result = shared.shutdown_result.subscribe();

        let running = ProcessorState::Running as u8;
        let draining = ProcessorState::Draining as u8;
        if shared
            .state
            .compare_exchange(running, draining, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let deadline = Instant::now() + timeout;
            shared.stop.send_replace(true);
            let worker = self.worker.lock().take();
            let task_shared = Arc::clone(shared);
            tokio::spawn(async move {
                let completed = task_shared.finish_shutdown(worker, deadline).await;
                task_shared.shutdown_result.send_replace(Some(completed));
            });
        } else {
            tracing::debug!(component = %shared.instance, "Shutdown already requested");
        }

        let completed = match result.wait_for(Option::is_some).await {
            Ok(completed) => (*completed).unwrap_or(false),
            Err(_) => false,
        };
        completed
    }

    /// Registry-issued name, e.g. `batching_span_processor/0`
    pub fn name(&self) -> &str {
        self.shared.instance.name()
    }

    /// Identity of this processor
    pub fn instance(&self) -> &ProcessorInstance {
        &self.shared.instance
    }

    /// Signal this processor batches
    pub fn signal(&self) -> Signal {
        self.shared.signal
    }

    /// Effective batch settings
    pub fn config(&self) -> &BatchConfig {
        &self.shared.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    /// Records currently queued
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Snapshot of the processor's counters
    pub fn stats(&self) -> ProcessorStats {
        let shared = &self.shared;
        let counters = &shared.counters;
        ProcessorStats {
            name: shared.instance.name().to_string(),
            state: shared.state(),
            queue_size: shared.queue.len(),
            queue_capacity: shared.queue.capacity(),
            enqueued: shared.queue.enqueued(),
            dropped_queue_full: shared.queue.dropped(),
            dropped_on_shutdown: counters.dropped_on_shutdown.load(Ordering::Relaxed),
            exported: counters.exported.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            timed_out: counters.timed_out.load(Ordering::Relaxed),
            export_calls: counters.export_calls.load(Ordering::Relaxed),
        }
    }
}

impl<R: Send + 'static> Drop for BatchProcessor<R> {
    fn drop(&mut self) {
        // Dropping without shutdown discards queued records. A shutdown
        // already in progress finishes on its own task.
        self.shared.stop.send_replace(true);
        if self.shared.state() == ProcessorState::Running {
            self.shared.metrics.unbind();
            self.shared.registry.unregister(self.shared.instance.name());
        }
    }
}

async fn run_worker<R: Send + 'static>(shared: Arc<Shared<R>>, mut stop: watch::Receiver<bool>) {
    let delay = shared.config.scheduled_delay;
    let mut ticker = tokio::time::interval_at(Instant::now() + delay, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = shared.wake.notified() => {},
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            },
        }

        if *stop.borrow() {
            break;
        }
        shared.export_ready().await;
    }

    tracing::debug!(component = %shared.instance, "Export worker stopped");
}

impl<R: Send + 'static> Shared<R> {
    fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Shutdown body, run on a dedicated task once the state is `Draining`.
    async fn finish_shutdown(
        self: &Arc<Self>,
        worker: Option<JoinHandle<()>>,
        deadline: Instant,
    ) -> bool {
        // The worker finishes its current export, if any, then exits.
        if let Some(mut handle) = worker {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                tracing::debug!(component = %self.instance, "Export worker busy at shutdown");
            }
        }

        let drained = self.drain(deadline, None).await;
        let released = self.release_exporter(deadline).await;

        let discarded = self.queue.clear();
        if discarded > 0 {
            self.counters
                .dropped_on_shutdown
                .fetch_add(discarded as u64, Ordering::Relaxed);
            tracing::warn!(
                component = %self.instance,
                discarded,
                "Discarding records left in the queue at shutdown"
            );
        }

        self.state
            .store(ProcessorState::Shutdown as u8, Ordering::Release);
        self.metrics.unbind();
        self.registry.unregister(self.instance.name());

        tracing::debug!(
            component = %self.instance,
            drained,
            released,
            "Batching processor shut down"
        );
        drained && released
    }

    /// Worker path: export one batch, keep going while full batches remain.
    async fn export_ready(&self) {
        while self.state() == ProcessorState::Running {
            match self.export_next(None, self.config.export_timeout).await {
                Step::Exported { .. } if self.queue.len() >= self.config.max_export_batch_size => {
                },
                _ => break,
            }
        }
    }

    /// Export batches until the queue is empty, `limit` records went out or
    /// the deadline passes. Returns true if every exported batch succeeded
    /// and nothing in scope was left behind.
    async fn drain(&self, deadline: Instant, limit: Option<usize>) -> bool {
        let mut remaining = limit;
        let mut all_succeeded = true;

        loop {
            if remaining == Some(0) {
                return all_succeeded;
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }

            let export_timeout = self.config.export_timeout.min(left);
            match self.export_next(Some(deadline), export_timeout).await {
                Step::Exported { count, outcome } => {
                    all_succeeded &= outcome.is_success();
                    if let Some(remaining) = remaining.as_mut() {
                        *remaining = remaining.saturating_sub(count);
                    }
                },
                Step::Empty => return all_succeeded,
                Step::Released | Step::Busy => return false,
            }
        }
    }

    /// Take the export guard, drain one batch and export it.
    ///
    /// With `lock_deadline` set, gives up waiting for the guard at that instant.
    async fn export_next(&self, lock_deadline: Option<Instant>, timeout: Duration) -> Step {
        let mut guard = match lock_deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.exporter.lock()).await {
                Ok(guard) => guard,
                Err(_) => return Step::Busy,
            },
            None => self.exporter.lock().await,
        };

        let Some(exporter) = guard.as_mut() else {
            return Step::Released;
        };

        let batch = self.queue.drain_batch(self.config.max_export_batch_size);
        if batch.is_empty() {
            return Step::Empty;
        }

        let count = batch.len();
        self.counters.export_calls.fetch_add(1, Ordering::Relaxed);

        let call = AssertUnwindSafe(exporter.export(batch, timeout)).catch_unwind();
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                tracing::error!(
                    component = %self.instance,
                    count,
                    "Exporter panicked during export"
                );
                ExportOutcome::Failure
            },
            Err(_) => ExportOutcome::Timeout,
        };
        drop(guard);

        self.record_outcome(count, outcome, timeout);
        Step::Exported { count, outcome }
    }

    fn record_outcome(&self, count: usize, outcome: ExportOutcome, timeout: Duration) {
        let records = count as u64;
        match outcome {
            ExportOutcome::Success => {
                self.counters.exported.fetch_add(records, Ordering::Relaxed);
                tracing::debug!(component = %self.instance, count, "Exported batch");
            },
            ExportOutcome::Failure => {
                self.counters.failed.fetch_add(records, Ordering::Relaxed);
                tracing::warn!(component = %self.instance, count, "Export failed");
            },
            ExportOutcome::Timeout => {
                self.counters.timed_out.fetch_add(records, Ordering::Relaxed);
                tracing::warn!(
                    component = %self.instance,
                    count,
                    timeout_ms = timeout.as_millis() as u64,
                    "Export timed out"
                );
            },
        }

        self.metrics
            .record_processed(count, self.instance.name(), outcome.error_type());
    }

    async fn flush_exporter(&self, deadline: Instant) -> bool {
        let mut guard = match tokio::time::timeout_at(deadline, self.exporter.lock()).await {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let Some(exporter) = guard.as_mut() else {
            return false;
        };

        let left = deadline.saturating_duration_since(Instant::now());
        let call = AssertUnwindSafe(exporter.force_flush(left)).catch_unwind();
        matches!(
            tokio::time::timeout(left, call).await,
            Ok(Ok(ExportOutcome::Success))
        )
    }

    /// Take the exporter out of the guard and shut it down.
    ///
    /// If an export still holds the guard at the deadline, the exporter is
    /// shut down by a detached task once that export returns.
    async fn release_exporter(self: &Arc<Self>, deadline: Instant) -> bool {
        let taken = match tokio::time::timeout_at(deadline, self.exporter.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let taken = shared.exporter.lock().await.take();
                    if let Some(mut exporter) = taken {
                        let timeout = shared.config.export_timeout;
                        let _ = AssertUnwindSafe(exporter.shutdown(timeout)).catch_unwind().await;
                    }
                });
                return false;
            },
        };

        let Some(mut exporter) = taken else {
            return true;
        };

        let left = deadline.saturating_duration_since(Instant::now());
        let call = AssertUnwindSafe(exporter.shutdown(left)).catch_unwind();
        match tokio::time::timeout(left, call).await {
            Ok(Ok(outcome)) => outcome.is_success(),
            Ok(Err(_)) => {
                tracing::error!(component = %self.instance, "Exporter panicked during shutdown");
                false
            },
            Err(_) => {
                tracing::warn!(component = %self.instance, "Exporter shutdown timed out");
                false
            },
        }
    }
}
