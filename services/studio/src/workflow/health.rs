//! services/studio/src/workflow/health.rs
//!
//! A periodic liveness probe of the lesson service, owned through an explicit
//! start/stop handle.
//!
//! Checks are fired on every tick without waiting for the previous one, so a
//! slow response can arrive after a newer one. Each check carries a sequence
//! number and only a reading newer than the one already held is kept.

use chrono::{DateTime, Utc};
use lesson_pipeline_core::domain::HealthStatus;
use lesson_pipeline_core::ports::{LessonApi, PortError, PortResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest check period accepted. `tokio::time::interval` panics on zero.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// The result of one health check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReading {
    pub sequence: u64,
    pub checked_at: DateTime<Utc>,
    pub outcome: PortResult<HealthStatus>,
}

impl HealthReading {
    pub fn is_healthy(&self) -> bool {
        matches!(&self.outcome, Ok(status) if status.is_healthy())
    }
}

#[derive(Default)]
struct Readings {
    issued: u64,
    latest: Option<HealthReading>,
}

impl Readings {
    fn next_sequence(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Keeps `reading` only if it is newer than the one already held.
    fn record(&mut self, reading: HealthReading) -> bool {
        let newer = self
            .latest
            .as_ref()
            .map_or(true, |current| reading.sequence > current.sequence);
        if newer {
            self.latest = Some(reading);
        } else {
            debug!(sequence = reading.sequence, "Discarding out-of-date health reading");
        }
        newer
    }
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    api: Arc<dyn LessonApi>,
    interval: Duration,
    readings: Arc<Mutex<Readings>>,
    running: Option<Running>,
}

impl HealthMonitor {
    /// Intervals shorter than [`MIN_CHECK_INTERVAL`] are raised to it.
    pub fn new(api: Arc<dyn LessonApi>, interval: Duration) -> Self {
        if interval < MIN_CHECK_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Health check interval too short; using the minimum"
            );
        }
        Self {
            api,
            interval: interval.max(MIN_CHECK_INTERVAL),
            readings: Arc::new(Mutex::new(Readings::default())),
            running: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts probing every `interval`, beginning immediately.
    /// Returns `false` if the monitor was already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(probe_loop(
            self.api.clone(),
            self.readings.clone(),
            self.interval,
            token.clone(),
        ));
        info!(interval_ms = self.interval.as_millis() as u64, "Health monitor started");
        self.running = Some(Running { token, handle });
        true
    }

    /// Stops the probe loop and abandons any check still in flight.
    /// Returns `false` if the monitor was not running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.token.cancel();
                info!("Health monitor stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// The most recent reading, if any check has completed.
    pub async fn latest(&self) -> Option<HealthReading> {
        self.readings.lock().await.latest.clone()
    }

    /// Runs one check right away and records it like a scheduled one.
    pub async fn check_now(&self) -> HealthReading {
        let sequence = self.readings.lock().await.next_sequence();
        let reading = HealthReading {
            sequence,
            checked_at: Utc::now(),
            outcome: self.api.health_check().await,
        };
        self.readings.lock().await.record(reading.clone());
        reading
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.token.cancel();
        }
    }
}

async fn probe_loop(
    api: Arc<dyn LessonApi>,
    readings: Arc<Mutex<Readings>>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let sequence = readings.lock().await.next_sequence();
                tokio::spawn(run_check(
                    api.clone(),
                    readings.clone(),
                    sequence,
                    token.child_token(),
                ));
            }
        }
    }
}

async fn run_check(
    api: Arc<dyn LessonApi>,
    readings: Arc<Mutex<Readings>>,
    sequence: u64,
    token: CancellationToken,
) {
    let outcome: Result<HealthStatus, PortError> = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        outcome = api.health_check() => outcome,
    };

    if let Err(e) = &outcome {
        warn!(sequence, error = %e, "Lesson service health check failed");
    }

    readings.lock().await.record(HealthReading {
        sequence,
        checked_at: Utc::now(),
        outcome,
    });
}
