use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

const TICK: Duration = Duration::from_secs(1);

/// Cancellable countdown with one tick per second
///
/// `on_tick` receives the seconds still left after each elapsed second, so a
/// 10 second countdown ticks 9, 8, ..., 0 and then fires `on_expire` once.
/// Cancelling stops both callbacks; cancelling twice, or after expiry, does
/// nothing.
pub struct CountdownClock {
    task: Option<JoinHandle<()>>,
}

impl CountdownClock {
    pub fn start<T, E>(duration_secs: u32, mut on_tick: T, on_expire: E) -> Self
    where
        T: FnMut(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            let mut remaining = duration_secs;

            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                on_tick(remaining);
            }

            on_expire();
        });

        Self { task: Some(task) }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!("Countdown cancelled");
        }
    }
}

impl Drop for CountdownClock {
    fn drop(&mut self) {
        self.cancel();
    }
}
