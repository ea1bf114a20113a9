//! Broadcaster fan-out over [`icecast_ring::RingBuffer`].
//!
//! One `Broadcaster` task owns the sole reader role on the ring and fans
//! each chunk out to an arbitrary number of registered listeners, each with
//! its own bounded outbound queue. A listener whose queue is ever found
//! full is evicted immediately rather than allowed to block delivery to
//! everyone else.
//!
//! This is the async analogue of this workspace's ring-channel split: where
//! that crate dedicates one lock-free SPSC ring per producer, this one
//! dedicates one bounded `tokio::sync::mpsc` channel per listener, fed from
//! a single shared `RingBuffer` reader.

mod broadcaster;
mod config;
mod error;
mod listener;
mod registry;
mod shutdown;

pub use broadcaster::Broadcaster;
pub use config::StreamConfig;
pub use error::StreamError;
pub use listener::ListenerGuard;
pub use registry::{ListenerId, ListenerRegistry};
pub use shutdown::ShutdownSignal;

pub use tokio_stream::wrappers::ReceiverStream;
