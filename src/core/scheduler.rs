//! Tick schedulers for the playback clock.
//!
//! A scheduler owns the periodic timer; the clock owns the scheduler. Every
//! start is tagged with an epoch, and the clock ignores ticks from older
//! epochs, so a tick already in flight when playback pauses can never
//! advance the frame.
//!
//! - `IntervalScheduler` - background thread, real wall-clock ticks
//! - `ManualScheduler` - no timer; the host feeds ticks itself (tests, headless)

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use log::{trace, warn};

/// One timer firing, tagged with the epoch of the start that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    pub epoch: u64,
}

/// Periodic timer with explicit start/cancel.
pub trait Scheduler {
    /// Begin firing every `interval`. Any previous timer is cancelled first.
    fn start(&mut self, interval: Duration, epoch: u64);
    /// Stop firing. Idempotent.
    fn cancel(&mut self);
    fn is_running(&self) -> bool;
}

/// Running timer thread plus the handle used to stop it.
struct TimerThread {
    /// Dropping this disconnects the control channel, which ends the loop
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Wall-clock scheduler backed by `crossbeam_channel::tick`.
///
/// Ticks are delivered on a bounded(1) channel with `try_send`: if the host
/// has not consumed the previous tick, the new one is dropped. Ticks never
/// queue up or overlap; a throttled host skips wall-clock frames but still
/// advances exactly one frame per tick it processes.
pub struct IntervalScheduler {
    tick_tx: Sender<Tick>,
    tick_rx: Receiver<Tick>,
    timer: Option<TimerThread>,
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalScheduler {
    pub fn new() -> Self {
        let (tick_tx, tick_rx) = bounded(1);
        Self {
            tick_tx,
            tick_rx,
            timer: None,
        }
    }

    /// Receiver the host polls (or blocks on) for ticks.
    pub fn ticks(&self) -> Receiver<Tick> {
        self.tick_rx.clone()
    }
}

impl Scheduler for IntervalScheduler {
    fn start(&mut self, interval: Duration, epoch: u64) {
        self.cancel();

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let tick_tx = self.tick_tx.clone();
        let interval = interval.max(Duration::from_millis(1));

        let spawned = thread::Builder::new()
            .name(format!("loom-clock-{}", epoch))
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            // Full slot = previous tick still pending; skip this one
                            if tick_tx.try_send(Tick { epoch }).is_err() {
                                trace!("Tick {} dropped (host busy)", epoch);
                            }
                        }
                    }
                }
                trace!("Clock thread for epoch {} stopped", epoch);
            });

        match spawned {
            Ok(handle) => self.timer = Some(TimerThread { stop_tx, handle }),
            Err(e) => warn!("Failed to spawn clock thread: {}", e),
        }
    }

    fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            drop(timer.stop_tx);
            let _ = timer.handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.timer.is_some()
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler without a timer: records state, the host calls `on_tick`.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    interval: Option<Duration>,
    epoch: u64,
    starts: usize,
    cancels: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick as the running timer would produce it, or `None` if stopped.
    pub fn fire(&self) -> Option<Tick> {
        self.interval.map(|_| Tick { epoch: self.epoch })
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn cancels(&self) -> usize {
        self.cancels
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, interval: Duration, epoch: u64) {
        self.interval = Some(interval);
        self.epoch = epoch;
        self.starts += 1;
    }

    fn cancel(&mut self) {
        if self.interval.take().is_some() {
            self.cancels += 1;
        }
    }

    fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}
