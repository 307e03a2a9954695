//! Periodic background callback.
//!
//! The callback runs on a dedicated named thread. Stopping is signalled over
//! an `mpsc` channel, so a sleeping repeater wakes immediately instead of
//! finishing its period.

use crate::data::FinanceError;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Refresh period used by `moment watch`.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(15);

pub struct Repeater {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Repeater {
    /// Call `on_repeat` every `period`; with `instant`, also once right away.
    pub fn start<F>(period: Duration, instant: bool, mut on_repeat: F) -> Result<Self, FinanceError>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("moment-repeater".into())
            .spawn(move || {
                if instant {
                    on_repeat();
                }
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => on_repeat(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| FinanceError::Io(format!("failed to spawn repeater thread: {e}")))?;

        tracing::debug!(?period, instant, "repeater started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the schedule and wait for an in-flight callback to return.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("repeater callback panicked");
            }
            tracing::debug!("repeater stopped");
        }
    }
}

impl Drop for Repeater {
    fn drop(&mut self) {
        self.stop();
    }
}
