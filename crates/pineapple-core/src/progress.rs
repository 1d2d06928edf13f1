//! Progress channel — bounded, latest-value-biased conduit between the
//! download task and whoever renders progress.
//!
//! Backed by a `broadcast` channel of capacity 2: when the consumer falls
//! behind, the oldest buffered samples are overwritten and the receiver
//! resumes from the newest ones. The producer closes the channel as soon as
//! it sends a completed sample.

use tokio::sync::broadcast::{self, error::RecvError};

/// Buffered samples before the oldest is dropped.
pub const PROGRESS_CAPACITY: usize = 2;

/// Largest `f32` below 1.0. Partial transfers never report more.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// One progress reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub fraction: f32,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl ProgressSample {
    /// Build a sample from byte counts. Unknown or zero totals report 0.
    ///
    /// Only `bytes_done >= bytes_total` yields 1.0; on large files the
    /// rounded ratio would otherwise hit 1.0 a chunk early.
    pub fn new(bytes_done: u64, bytes_total: Option<u64>) -> Self {
        let (fraction, total) = match bytes_total {
            Some(total) if bytes_done >= total && total > 0 => (1.0, total),
            Some(total) if total > 0 => {
                let ratio = (bytes_done as f64 / total as f64) as f32;
                (ratio.min(BELOW_ONE), total)
            }
            Some(total) => (0.0, total),
            None => (0.0, 0),
        };
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            bytes_done,
            bytes_total: total,
        }
    }

    /// The terminal sample for a transfer of `len` bytes.
    pub fn complete(len: u64) -> Self {
        Self {
            fraction: 1.0,
            bytes_done: len,
            bytes_total: len,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }

    /// Percentage with two decimals, e.g. `"42.17%"`.
    pub fn percent_label(&self) -> String {
        format!("{:.2}%", self.fraction * 100.0)
    }
}

/// Create a connected progress sender/receiver pair.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = broadcast::channel(PROGRESS_CAPACITY);
    (ProgressSender { tx: Some(tx) }, ProgressReceiver { rx })
}

/// Producer half. Sending a complete sample closes the channel.
#[derive(Debug)]
pub struct ProgressSender {
    tx: Option<broadcast::Sender<ProgressSample>>,
}

impl ProgressSender {
    /// Publish a sample. Never blocks; ignored once the channel is closed.
    pub fn send(&mut self, sample: ProgressSample) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        // No receiver left is fine: nobody is watching.
        let _ = tx.send(sample);
        if sample.is_complete() {
            self.close();
        }
    }

    pub fn close(&mut self) {
        self.tx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: broadcast::Receiver<ProgressSample>,
}

impl ProgressReceiver {
    /// Next retained sample, or `None` once the producer closed and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<ProgressSample> {
        loop {
            match self.rx.recv().await {
                Ok(sample) => return Some(sample),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::trace!("progress consumer lagged, dropped {} samples", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
