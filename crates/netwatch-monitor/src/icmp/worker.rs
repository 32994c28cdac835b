//! Per-host probing worker

use super::controller::Controller;
use super::probe::{ProbeReport, Timings, WorkerId};
use netwatch_common::{Error, Result};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

static NEXT_WORKER: AtomicU64 = AtomicU64::new(1);

/// Drives ICMP probing of a single host through the shared controller.
///
/// At most one probe may be outstanding per worker: [`Worker::start`]
/// fails with [`Error::ProbeBusy`] until the previous cycle resolved or
/// was stopped.
pub struct Worker {
    controller: Controller,
    id: WorkerId,
    timeout: Duration,
    interval: Duration,
    pending: Option<oneshot::Receiver<ProbeReport>>,
}

impl Worker {
    /// Worker with the default 5 s timeout / 1 s retransmission interval
    pub fn new(controller: &Controller) -> Self {
        let timings = Timings::default();
        Self::with_timings(controller, timings.timeout, timings.interval)
    }

    pub fn with_timings(controller: &Controller, timeout: Duration, interval: Duration) -> Self {
        Self {
            controller: controller.clone(),
            id: WorkerId(NEXT_WORKER.fetch_add(1, Ordering::Relaxed)),
            timeout,
            interval,
            pending: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True while a probe is outstanding
    pub fn running(&self) -> bool {
        self.pending.is_some()
    }

    /// Begin probing `target`; the outcome arrives through [`Worker::wait`]
    pub fn start(&mut self, target: IpAddr) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::ProbeBusy);
        }

        let (tx, rx) = oneshot::channel();
        self.controller.insert(
            self.id,
            target,
            Timings {
                timeout: self.timeout,
                interval: self.interval,
            },
            tx,
        )?;
        self.pending = Some(rx);
        Ok(())
    }

    /// Cancel the outstanding probe, if any
    pub fn stop(&mut self) {
        self.controller.remove(self.id);
        self.pending = None;
    }

    /// Wait for the outcome of the probe started by [`Worker::start`].
    ///
    /// `None` when no probe is outstanding or it was cancelled before
    /// resolving.
    pub async fn wait(&mut self) -> Option<ProbeReport> {
        let pending = self.pending.take()?;
        pending.await.ok()
    }

    /// One full probe cycle: start and wait for the outcome
    pub async fn probe(&mut self, target: IpAddr) -> Result<ProbeReport> {
        self.start(target)?;
        self.wait().await.ok_or(Error::Cancelled)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.pending.is_some() {
            self.controller.remove(self.id);
        }
    }
}
