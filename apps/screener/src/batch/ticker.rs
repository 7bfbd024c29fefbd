use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const TICK: Duration = Duration::from_secs(1);

/// One-second elapsed-time counter for a running submission.
///
/// The counting task lives exactly as long as this value: dropping the ticker
/// aborts it, so every exit path of a submission stops the timer.
#[derive(Debug)]
pub struct ElapsedTicker {
    elapsed: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl ElapsedTicker {
    /// Must be called from within a tokio runtime.
    pub fn start() -> Self {
        let (tx, rx) = watch::channel(0_u64);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // first tick completes immediately

            let mut seconds = 0_u64;
            loop {
                interval.tick().await;
                seconds += 1;
                if tx.send(seconds).is_err() {
                    break;
                }
            }
        });
        Self { elapsed: rx, task }
    }

    pub fn elapsed_secs(&self) -> u64 {
        *self.elapsed.borrow()
    }

    /// A receiver that observes each tick, for progress displays.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the ticker and returns the final reading.
    pub fn stop(self) -> u64 {
        self.elapsed_secs()
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
