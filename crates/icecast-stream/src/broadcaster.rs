use crate::config::StreamConfig;
use crate::registry::{ListenerId, ListenerRegistry};
use crate::shutdown::ShutdownSignal;
use bytes::Bytes;
use icecast_ring::{ExportedCounters, RingBuffer};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Owns the sole reader role on the ring and fans each chunk out to every
/// registered listener.
///
/// There is exactly one `Broadcaster` task per mount; it is the only
/// component that calls [`RingBuffer::try_read`].
pub struct Broadcaster {
    ring: Arc<RingBuffer>,
    registry: Arc<ListenerRegistry>,
    config: StreamConfig,
    counters: Arc<ExportedCounters>,
    shutdown: ShutdownSignal,
}

impl Broadcaster {
    /// Creates a broadcaster over `ring`, validating `config` first.
    ///
    /// # Errors
    ///
    /// Returns the validation error from [`StreamConfig::validate`].
    pub fn new(
        ring: Arc<RingBuffer>,
        max_listeners: usize,
        config: StreamConfig,
        counters: Arc<ExportedCounters>,
    ) -> Result<Self, crate::StreamError> {
        config.validate()?;
        Ok(Self {
            ring,
            registry: Arc::new(ListenerRegistry::new(max_listeners, Arc::clone(&counters))),
            config,
            counters,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Returns a handle for registering/unregistering listeners, to be
    /// shared with the HTTP layer.
    #[must_use]
    pub fn registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns a cloneable signal that stops the broadcast loop.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Spawns the broadcast loop as its own task.
    ///
    /// The loop reads a chunk from the ring whenever `chunk_size` bytes are
    /// available, otherwise sleeps for an adaptive interval tiered by ring
    /// fill (see [`StreamConfig::sleep_for`]) so an idle ring never busy
    /// spins. It runs until `shutdown_signal()` is triggered.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        let mut consecutive_empty: u32 = 0;

        loop {
            if self.shutdown.is_shutdown() {
                debug!("broadcaster shutting down");
                return;
            }

            if self.ring.available() >= self.config.chunk_size {
                let Some(chunk) = self.ring.try_read(self.config.chunk_size) else {
                    // Lost the race with a concurrent clear(); treat as empty.
                    consecutive_empty += 1;
                    self.sleep_or_shutdown(consecutive_empty).await;
                    continue;
                };
                consecutive_empty = 0;

                let chunk = Bytes::from(chunk);
                let delivered = self.registry.deliver(chunk.clone()) as u64;
                self.counters
                    .add_bytes_out(delivered * chunk.len() as u64);
            } else {
                consecutive_empty = consecutive_empty.saturating_add(1);
                self.sleep_or_shutdown(consecutive_empty).await;
            }
        }
    }

    async fn sleep_or_shutdown(&self, consecutive_empty: u32) {
        let sleep = self
            .config
            .sleep_for(self.ring.fill_percent(), consecutive_empty);
        tokio::select! {
            () = tokio::time::sleep(sleep) => {}
            () = self.shutdown.notified() => {}
        }
    }

    /// Registers a new listener sink and returns its id and an active flag
    /// the HTTP handler can poll to detect eviction.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cap (`max_listeners`) is already
    /// reached.
    pub fn register(
        &self,
        sink: mpsc::Sender<Bytes>,
    ) -> Result<(ListenerId, Arc<AtomicBool>), crate::StreamError> {
        let result = self.registry.register(sink);
        if result.is_ok() {
            info!(listeners = self.registry.len(), "listener registered");
        }
        result
    }

    /// Unregisters a listener. Idempotent.
    pub fn unregister(&self, id: ListenerId) {
        self.registry.unregister(id);
    }

    /// Returns `true` if `id` is still registered and active.
    #[must_use]
    pub fn is_active(&self, id: ListenerId) -> bool {
        self.registry.is_active(id)
    }

    /// Registers a new listener and returns a drop-guard plus the
    /// `tokio_stream::wrappers::ReceiverStream` the HTTP handler feeds
    /// directly into the response body.
    ///
    /// The queue is sized by `StreamConfig::queue_capacity` chunks, per
    /// §4.6's backpressure contract.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cap is already reached.
    pub fn register_stream(
        self: &Arc<Self>,
        chunk_stream_buffer: Option<usize>,
    ) -> Result<(crate::ListenerGuard, tokio_stream::wrappers::ReceiverStream<bytes::Bytes>), crate::StreamError>
    {
        let capacity = chunk_stream_buffer.unwrap_or(self.config.queue_capacity);
        let (tx, rx) = mpsc::channel(capacity);
        let (id, active) = self.register(tx)?;
        let guard = crate::ListenerGuard::new(id, Arc::clone(self), active);
        Ok((guard, tokio_stream::wrappers::ReceiverStream::new(rx)))
    }
}
