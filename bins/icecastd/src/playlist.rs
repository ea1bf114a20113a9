use crate::mux::ProducerMux;
use icecast_ring::RingBuffer;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One playable file discovered under the configured playlist directory.
#[derive(Debug, Clone)]
pub struct Track {
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
}

/// Reads a local-file playlist into the ring whenever no source is live.
///
/// §4.2: enumerates the configured directory once at startup, optionally
/// shuffles, then iterates the list cyclically forever. It never decides
/// for itself whether it may write — that is [`ProducerMux`]'s job; this
/// producer just checks before every chunk.
pub struct PlaylistProducer {
    tracks: Vec<Track>,
    chunk_size: usize,
    ring: Arc<RingBuffer>,
    mux: Arc<ProducerMux>,
    shutdown: Arc<AtomicBool>,
}

/// Sleep applied after a rejected ring write, tiered by how full the ring
/// currently is. Matches §4.2's "5-20ms proportional to fill" guidance;
/// deliberately a separate, coarser scale from the broadcaster's tiers
/// since this is a producer-side retry backoff, not a read-pacing loop.
fn retry_sleep(fill_percent: f64) -> Duration {
    if fill_percent > 0.9 {
        Duration::from_millis(20)
    } else if fill_percent > 0.7 {
        Duration::from_millis(10)
    } else {
        Duration::from_millis(5)
    }
}

/// Sleep applied between idle-loop checks when there is nothing to play
/// (empty playlist, or paused because a source is live).
const IDLE_SLEEP: Duration = Duration::from_millis(50);

impl PlaylistProducer {
    /// Scans `directory` for files whose extension (case-insensitively,
    /// with or without the leading dot in `extensions`) is allow-listed,
    /// optionally shuffles the result, and builds a producer over it.
    ///
    /// A missing directory or one with no matching files yields an empty
    /// track list rather than an error — per §4.2, the producer then sits
    /// idle, which is not a startup failure.
    pub async fn scan(
        directory: impl AsRef<Path>,
        extensions: &[String],
        shuffle: bool,
        chunk_size: usize,
        ring: Arc<RingBuffer>,
        mux: Arc<ProducerMux>,
    ) -> Self {
        let mut tracks = Self::scan_directory(directory.as_ref(), extensions).await;
        if shuffle {
            tracks.shuffle(&mut thread_rng());
        }
        info!(count = tracks.len(), "playlist scanned");

        Self {
            tracks,
            chunk_size,
            ring,
            mux,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn scan_directory(directory: &Path, extensions: &[String]) -> Vec<Track> {
        let allow: Vec<String> = extensions
            .iter()
            .map(|e| {
                let e = e.to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();

        let mut entries = match fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, directory = %directory.display(), "playlist directory unreadable at startup, starting idle");
                return Vec::new();
            }
        };

        let mut tracks = Vec::new();
        loop {
            let next = match entries.next_entry().await {
                Ok(next) => next,
                Err(err) => {
                    warn!(%err, "error while scanning playlist directory");
                    break;
                }
            };
            let Some(entry) = next else { break };
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let dotted = format!(".{}", ext.to_lowercase());
            if !allow.iter().any(|a| a == &dotted) {
                continue;
            }
            match entry.metadata().await {
                Ok(meta) => tracks.push(Track {
                    path,
                    size: meta.len(),
                    extension: dotted,
                }),
                Err(err) => warn!(%err, path = %path.display(), "could not stat playlist entry, skipping"),
            }
        }
        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        tracks
    }

    /// A cloneable flag that, once set, stops the producer loop promptly.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Spawns the cyclic playback loop as its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        if self.tracks.is_empty() {
            debug!("playlist empty, producer idle");
            while !self.shutdown.load(Ordering::Relaxed) {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
            return;
        }

        let mut index = 0usize;
        while !self.shutdown.load(Ordering::Relaxed) {
            let track = &self.tracks[index % self.tracks.len()];
            if let Err(err) = self.play_track(track).await {
                warn!(%err, path = %track.path.display(), "error reading playlist track, skipping");
            }
            index = index.wrapping_add(1);
        }
    }

    async fn play_track(&self, track: &Track) -> std::io::Result<()> {
        if !self.mux.source_is_live() {
            let title = track
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            self.mux.set_title(title);
        }

        let mut file = fs::File::open(&track.path).await?;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            self.wait_for_write_turn().await;

            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.write_with_retry(&buf[..n]).await;
        }
    }

    /// Blocks (yielding, never busy-spinning) while a source owns the ring.
    async fn wait_for_write_turn(&self) {
        while self.mux.source_is_live() && !self.shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(IDLE_SLEEP).await;
        }
    }

    async fn write_with_retry(&self, chunk: &[u8]) {
        loop {
            if self.shutdown.load(Ordering::Relaxed) || self.mux.source_is_live() {
                return;
            }
            if self.ring.write(chunk) {
                return;
            }
            tokio::time::sleep(retry_sleep(self.ring.fill_percent())).await;
        }
    }
}
