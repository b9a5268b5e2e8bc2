//! Long-running trigger loop: the short timer on a fixed interval and the daily job at
//! local midnight. Every run is its own spawned unit of work over the same warm runtime.

use chrono::{DateTime, Local, TimeZone};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use modrouter_bootstrap::SchedulerConfig;

use crate::jobs;
use crate::runtime::WorkerRuntime;

/// The first midnight strictly after `now`, in `now`'s own timezone.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        // No midnight that day (DST gap): fall back to a plain day.
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}

fn until_next_local_midnight() -> Duration {
    let now = Local::now();
    (next_midnight(&now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

pub struct Scheduler {
    runtime: Arc<WorkerRuntime>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(runtime: Arc<WorkerRuntime>, config: SchedulerConfig) -> Self {
        Self { runtime, config }
    }

    /// Trigger jobs until `shutdown` resolves, then wait for runs still in flight.
    pub async fn run<S>(self, shutdown: S) -> anyhow::Result<()>
    where
        S: Future,
    {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runs: JoinSet<anyhow::Result<()>> = JoinSet::new();
        tokio::pin!(shutdown);

        tracing::info!(
            interval = %humantime_serde::re::humantime::format_duration(period),
            midnight = self.config.midnight,
            "Scheduler started"
        );

        loop {
            let midnight = tokio::time::sleep(until_next_local_midnight());

            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let rt = Arc::clone(&self.runtime);
                    runs.spawn(jobs::run_job("timer-15min", uuid::Uuid::new_v4(), async move {
                        jobs::timer_15min(&rt).await.map(|_| ())
                    }));
                }
                _ = midnight, if self.config.midnight => {
                    let rt = Arc::clone(&self.runtime);
                    runs.spawn(jobs::run_job("timer-midnight", uuid::Uuid::new_v4(), async move {
                        jobs::timer_midnight(&rt).await.map(|_| ())
                    }));
                }
                Some(done) = runs.join_next(), if !runs.is_empty() => log_finished(done),
            }
        }

        tracing::info!(in_flight = runs.len(), "Scheduler stopping");
        while let Some(done) = runs.join_next().await {
            log_finished(done);
        }
        Ok(())
    }
}

fn log_finished(done: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    // Job failures are already logged by run_job; only a panicked run needs reporting.
    if let Err(e) = done {
        tracing::error!(error = %e, "Scheduled run aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_support::{full_source, runtime_with};
    use chrono::{FixedOffset, Timelike, Utc};
    use modrouter::testing::CountingFactory;
    use modrouter::ModuleKey;

    #[test]
    fn test_next_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 30).unwrap();
        let next = next_midnight(&now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_midnight_at_midnight_is_a_day_later() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(
            next_midnight(&now),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_midnight_respects_offset() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 1, 21, 15, 0).unwrap();
        let next = next_midnight(&now);
        assert_eq!(next.hour(), 0);
        assert_eq!((next - now).num_minutes(), 165);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interval_runs_until_shutdown() {
        let factory = Arc::new(CountingFactory::new());
        let rt = runtime_with(full_source(), factory.clone());
        let scheduler = Scheduler::new(
            Arc::clone(&rt),
            SchedulerConfig {
                interval: Duration::from_millis(40),
                midnight: false,
            },
        );

        scheduler
            .run(tokio::time::sleep(Duration::from_millis(250)))
            .await
            .unwrap();

        let executor = factory.executor_for(ModuleKey::Messaging).unwrap();
        // Three counts per run; several runs fit in the window.
        assert!(executor.statements().len() >= 6);
        assert_eq!(factory.builds(), 1);
        assert_eq!(rt.bootstrap().load_count(), 1);
    }
}
