//! Timer jobs. Each one bootstraps (a no-op on warm starts) and then does its reading
//! inside the scope of the module that owns the data.

use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tracing::Instrument;

use modrouter::repos::{ContentRepos, DoingRepos, MessagingRepos};
use modrouter::ModuleKey;

use crate::runtime::WorkerRuntime;

/// Work waiting in the messaging notification queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationQueue {
    pub notifications: i64,
    pub preferences: i64,
    pub devices: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FifteenMinuteReport {
    pub queue: NotificationQueue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRequestSnapshot {
    pub automations: i64,
    pub actions: i64,
    pub assignments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MidnightReport {
    pub service_requests: ServiceRequestSnapshot,
    pub streaming_services: i64,
    pub digest: NotificationQueue,
}

/// Log start, elapsed time and failure around one job run.
pub async fn run_job<F, T>(name: &'static str, invocation: uuid::Uuid, job: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let span = tracing::info_span!("job", job = name, invocation = %invocation);
    async move {
        let started = Instant::now();
        tracing::info!("Job started");
        let result = job.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(elapsed_ms, "Job completed"),
            Err(e) => tracing::error!(elapsed_ms, error = %format!("{e:#}"), "Job failed"),
        }
        result
    }
    .instrument(span)
    .await
}

async fn notification_queue(rt: &WorkerRuntime) -> anyhow::Result<NotificationQueue> {
    let bundle = rt.repos().await?;
    let repos = bundle.repos::<MessagingRepos>()?;
    Ok(NotificationQueue {
        notifications: repos.notifications.count().await?,
        preferences: repos.notification_preferences.count().await?,
        devices: repos.devices.count().await?,
    })
}

/// Snapshot of the notification escalation queue.
pub async fn timer_15min(rt: &WorkerRuntime) -> anyhow::Result<FifteenMinuteReport> {
    rt.init_env()?;

    let queue = rt
        .within(ModuleKey::Messaging, notification_queue(rt))
        .await?;
    tracing::info!(
        notifications = queue.notifications,
        preferences = queue.preferences,
        "Notification queue"
    );
    Ok(FifteenMinuteReport { queue })
}

/// Service-request reminders, recurring streaming services and the daily digest.
pub async fn timer_midnight(rt: &WorkerRuntime) -> anyhow::Result<MidnightReport> {
    rt.init_env()?;

    let service_requests = rt
        .within(ModuleKey::Doing, async {
            let bundle = rt.repos().await?;
            let repos = bundle.repos::<DoingRepos>()?;
            anyhow::Ok(ServiceRequestSnapshot {
                automations: repos.automations.count().await?,
                actions: repos.actions.count().await?,
                assignments: repos.assignments.count().await?,
            })
        })
        .await?;
    tracing::info!(automations = service_requests.automations, "Service requests checked");

    let streaming_services = rt
        .within(ModuleKey::Content, async {
            let bundle = rt.repos().await?;
            let count = bundle.repos::<ContentRepos>()?.streaming_services.count().await?;
            anyhow::Ok(count)
        })
        .await?;
    tracing::info!(streaming_services, "Recurring streaming services checked");

    let digest = rt
        .within(ModuleKey::Messaging, notification_queue(rt))
        .await?;
    tracing::info!(notifications = digest.notifications, "Daily digest queue");

    Ok(MidnightReport {
        service_requests,
        streaming_services,
        digest,
    })
}

/// Periodic housekeeping hook; bootstraps and reports in.
pub async fn scheduled_tasks(rt: &WorkerRuntime) -> anyhow::Result<()> {
    rt.init_env()?;
    tracing::info!("Scheduled tasks triggered");
    tracing::info!("Scheduled tasks completed");
    Ok(())
}
