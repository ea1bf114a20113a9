use crate::error::StreamError;
use std::time::Duration;

const MIN_CHUNK_SIZE: usize = 1024;
const MAX_CHUNK_SIZE: usize = 65536;

/// Configuration for the [`crate::Broadcaster`] main loop and per-listener
/// queues.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Bytes read from the ring per broadcast cycle. Larger chunks reduce
    /// per-listener overhead; smaller chunks reduce latency.
    pub chunk_size: usize,
    /// Capacity of each listener's outbound queue, measured in chunks.
    pub queue_capacity: usize,
    /// Sleep between ring-read attempts when the ring is more than 80%
    /// full.
    pub sleep_high: Duration,
    /// Sleep between ring-read attempts when the ring is 50-80% full.
    pub sleep_medium: Duration,
    /// Sleep between ring-read attempts when the ring is under 50% full.
    pub sleep_low: Duration,
    /// Sleep applied after 10 or more consecutive empty reads, to avoid a
    /// busy loop when the ring is starved.
    pub sleep_empty: Duration,
}

impl StreamConfig {
    /// Validates the chunk size range and the tiered-sleep ordering
    /// invariant (`sleep_high <= sleep_medium <= sleep_low <= sleep_empty`).
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] if either constraint is
    /// violated.
    pub fn validate(&self) -> Result<(), StreamError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(StreamError::InvalidConfig(format!(
                "chunk_size {} out of range ({MIN_CHUNK_SIZE}..={MAX_CHUNK_SIZE})",
                self.chunk_size
            )));
        }
        if self.queue_capacity == 0 {
            return Err(StreamError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if !(self.sleep_high <= self.sleep_medium
            && self.sleep_medium <= self.sleep_low
            && self.sleep_low <= self.sleep_empty)
        {
            return Err(StreamError::InvalidConfig(
                "sleep tiers must satisfy sleep_high <= sleep_medium <= sleep_low <= sleep_empty"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Picks the adaptive sleep duration for a given ring fill fraction and
    /// the current run of consecutive empty reads.
    #[must_use]
    pub fn sleep_for(&self, fill_percent: f64, consecutive_empty_reads: u32) -> Duration {
        if consecutive_empty_reads >= 10 {
            self.sleep_empty
        } else if fill_percent > 0.8 {
            self.sleep_high
        } else if fill_percent >= 0.5 {
            self.sleep_medium
        } else {
            self.sleep_low
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            queue_capacity: 32,
            sleep_high: Duration::from_micros(500),
            sleep_medium: Duration::from_millis(1),
            sleep_low: Duration::from_millis(2),
            sleep_empty: Duration::from_millis(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(StreamConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_monotonic_sleep_tiers() {
        let mut cfg = StreamConfig::default();
        cfg.sleep_high = Duration::from_millis(100);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_chunk_size_out_of_range() {
        let mut cfg = StreamConfig::default();
        cfg.chunk_size = 16;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sleep_tier_selection_matches_fill_ordering() {
        let cfg = StreamConfig::default();
        assert_eq!(cfg.sleep_for(0.9, 0), cfg.sleep_high);
        assert_eq!(cfg.sleep_for(0.6, 0), cfg.sleep_medium);
        assert_eq!(cfg.sleep_for(0.1, 0), cfg.sleep_low);
        assert_eq!(cfg.sleep_for(0.9, 10), cfg.sleep_empty);
    }
}
