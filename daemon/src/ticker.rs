use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::coordinator::{lock, SharedCoordinator};
use crate::display::DisplaySink;

/// A running polling loop.
pub struct TickerHandle {
    /// Setting this to `true` stops the loop.
    stop_tx: watch::Sender<bool>,
    refresh_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl TickerHandle {
    /// Asks the loop to render the current state without waiting for a change.
    /// Used after `record_event`, which consumes the change notifications
    /// the next tick would otherwise have seen.
    pub fn refresh(&self) {
        // A pending refresh already covers this one.
        let _ = self.refresh_tx.try_send(());
    }

    /// Signals the loop to stop and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Spawns the polling loop. Every `period` it runs one coordinator cycle
/// under the lock and, if any tracker changed, renders a snapshot to `sinks`.
pub fn start(
    coordinator: SharedCoordinator,
    sinks: Vec<Box<dyn DisplaySink>>,
    period: Duration,
) -> TickerHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let handle = tokio::spawn(run(coordinator, sinks, period, stop_rx, refresh_rx));
    TickerHandle { stop_tx, refresh_tx, handle }
}

async fn run(
    coordinator: SharedCoordinator,
    mut sinks: Vec<Box<dyn DisplaySink>>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    let mut ticker = interval(period);
    // After a stall, catch up with one tick rather than a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::debug!("[ticker] Started ({} ms)", period.as_millis());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = {
                    let mut guard = lock(&coordinator);
                    let report = guard.tick();
                    report.has_changes().then(|| guard.snapshot())
                };
                if let Some(snapshot) = snapshot {
                    for sink in sinks.iter_mut() {
                        sink.render(&snapshot);
                    }
                }
            }
            Some(()) = refresh_rx.recv() => {
                let snapshot = lock(&coordinator).snapshot();
                for sink in sinks.iter_mut() {
                    sink.render(&snapshot);
                }
            }
            _ = stop_rx.changed() => break,
        }
    }

    log::debug!("[ticker] Stopped");
}
