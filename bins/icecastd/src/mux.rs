use crate::error::SourceError;
use icecast_ring::{ExportedCounters, RingBuffer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Arbitrates which of the playlist producer or a live source owns the
/// ring's write capability, per §4.4.
///
/// The ring has no notion of "who is allowed to write" itself — it is
/// simply a byte buffer. `ProducerMux` is the single source of truth for
/// that question; both producer loops consult
/// [`ProducerMux::source_is_live`] before every write attempt.
pub struct ProducerMux {
    ring: Arc<RingBuffer>,
    counters: Arc<ExportedCounters>,
    source_is_live: AtomicBool,
    title: Mutex<String>,
}

impl ProducerMux {
    /// Creates a mux starting in `Playlist` mode (§4.4's initial state:
    /// `Source` is only ever entered on an authenticated source arrival).
    #[must_use]
    pub fn new(ring: Arc<RingBuffer>, counters: Arc<ExportedCounters>) -> Arc<Self> {
        Arc::new(Self {
            ring,
            counters,
            source_is_live: AtomicBool::new(false),
            title: Mutex::new(String::new()),
        })
    }

    /// `true` while the playlist producer should pause and let the source
    /// own the ring.
    #[must_use]
    pub fn source_is_live(&self) -> bool {
        self.source_is_live.load(Ordering::Acquire)
    }

    /// The current producer's announced title, or an empty string if none
    /// — the ICY metadata passthrough content required by §4.6.
    #[must_use]
    pub fn title(&self) -> String {
        self.title.lock().clone()
    }

    /// Sets the current producer's announced title. [`PlaylistProducer`]
    /// calls this on every track change; a live source has no title source
    /// in this implementation and leaves it empty.
    ///
    /// [`PlaylistProducer`]: crate::playlist::PlaylistProducer
    pub fn set_title(&self, title: impl Into<String>) {
        *self.title.lock() = title.into();
    }

    /// Attempts the `Playlist -> Source` transition.
    ///
    /// Clears the ring so listeners never splice the playlist's last bytes
    /// onto the source's first bytes, then grants write capability to the
    /// caller via the returned [`SourceSlot`] guard. Dropping the slot (on
    /// clean close, I/O error, or timeout — they are all the same
    /// transition) performs `Source -> Playlist` automatically.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::AlreadyLive`] if a source is already
    /// connected — the single-source rule in §4.3.
    pub fn acquire_source(self: &Arc<Self>) -> Result<SourceSlot, SourceError> {
        if self
            .source_is_live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SourceError::AlreadyLive);
        }

        self.ring.clear();
        self.counters.set_source_connected(true);
        *self.title.lock() = String::new();
        info!("source acquired the ring; playlist paused");

        Ok(SourceSlot {
            mux: Arc::clone(self),
        })
    }

    fn release_source(&self) {
        self.ring.clear();
        self.source_is_live.store(false, Ordering::Release);
        self.counters.set_source_connected(false);
        *self.title.lock() = String::new();
        info!("source released the ring; playlist resumed");
    }
}

/// RAII handle for the `Source` mode's write capability.
///
/// Held for the lifetime of one authenticated source session; its `Drop`
/// performs the `Source -> Playlist` transition regardless of why the
/// session ended.
pub struct SourceSlot {
    mux: Arc<ProducerMux>,
}

impl Drop for SourceSlot {
    fn drop(&mut self) {
        self.mux.release_source();
    }
}
