//! Background pressure sampling.
//!
//! Spawns a thread that owns the `PressureSensor`, pushes latest raw
//! readings via a bounded channel, and tracks the last-ok timestamp for
//! watchdog logic.
//!
//! Safety: each `Sampler` spawns exactly one thread that is shut down
//! when the `Sampler` is dropped, preventing thread leaks.
use crossbeam_channel as xch;
use perfuser_traits::PressureSensor;
use perfuser_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct Sampler {
    rx: xch::Receiver<i16>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    /// Paced sampler: one read per period at the given rate.
    pub fn spawn<S: PressureSensor + Send + 'static, C: Clock + Send + Sync + 'static>(
        mut sensor: S,
        hz: u32,
        timeout: Duration,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_micros(crate::util::period_us(hz));
        let epoch = clock.now();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match sensor.read(timeout) {
                    Ok(v) => {
                        // The sensor answered; the watchdog clock resets
                        // whether or not the consumer keeps up.
                        let now = clock.ms_since(epoch);
                        last_ok_clone.store(now, Ordering::Relaxed);
                        match tx.try_send(v) {
                            Ok(()) => {}
                            Err(xch::TrySendError::Full(_)) => {
                                // Consumer is behind; never block here or
                                // the shutdown join could hang.
                            }
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!(
                                    "sampler consumer disconnected, exiting thread"
                                );
                                break;
                            }
                        }
                    }
                    Err(_) => {
                        // Timeout or transient error; the supervisor
                        // watchdogs via stalled_for_now.
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Latest raw reading, if any arrived since the last call.
    pub fn latest(&self) -> Option<i16> {
        self.rx.try_iter().last()
    }

    /// Stall duration against this sampler's epoch and the real clock.
    pub fn stalled_for_now(&self) -> u64 {
        let now_ms = {
            let dur = Instant::now().saturating_duration_since(self.epoch);
            let ms = dur.as_millis();
            (ms.min(u128::from(u64::MAX))) as u64
        };
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits immediately between reads, or after the
        // in-flight sensor read completes (bounded by its timeout).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("sampler thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "sampler thread panicked during shutdown");
                }
            }
        }
    }
}
