//! Fixed-capacity byte ring buffer for the audio distribution engine.
//!
//! A single producer (the live source or the playlist fallback, arbitrated
//! upstream by a producer-switching state machine) writes audio bytes into
//! this ring; a single consumer (the broadcaster fan-out) reads fixed-size
//! chunks back out. Unlike a high-throughput lock-free MPSC ring, this one
//! is guarded by a single mutex: the producer/consumer pair here is one
//! real-time byte stream, and a rejected write (rather than a silent
//! overwrite) is what keeps a slow consumer from ever seeing a spliced
//! frame.

mod config;
mod counters;
mod error;
mod ring;

pub use config::RingConfig;
pub use counters::{CountersSnapshot, ExportedCounters};
pub use error::RingError;
pub use ring::RingBuffer;
