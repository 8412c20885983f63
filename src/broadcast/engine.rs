use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use futures::StreamExt;
use tokio::time::{Instant, sleep, sleep_until};

use crate::broadcast::backup::write_backup;
use crate::broadcast::delivery_log::DeliveryLog;
use crate::broadcast::gateway::{Draft, Gateway, SendError};
use crate::broadcast::summary::{DeliveryStatus, Summary};
use crate::broadcast::suppression::{SuppressReason, SuppressionRecord, SuppressionStore};

/// Tunables for one run. Defaults keep aggregate throughput at ~20 sends
/// per second, under the Bot API's ~30/sec ceiling.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub send_interval: Duration,
    pub retry_fallback: Duration,
    pub progress_every: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            concurrency: 20,
            send_interval: Duration::from_millis(50),
            retry_fallback: Duration::from_secs(5),
            progress_every: 200,
        }
    }
}

/// Where a run writes its artifacts.
#[derive(Clone, Debug)]
pub struct RunPaths {
    pub logs_dir: PathBuf,
    pub backups_dir: PathBuf,
}

/// Receives batched progress updates. Implementations swallow their own
/// failures; a lost progress edit must never abort the run.
pub trait ProgressSink {
    async fn publish(&self, dispatched: usize, total: usize);
}

pub struct RunReport {
    pub summary: Summary,
    pub log_path: PathBuf,
}

/// Serializes dispatch starts so aggregate throughput never exceeds one
/// send per `interval`, regardless of how many senders are in flight.
struct Pacer {
    interval: Duration,
    next: tokio::sync::Mutex<Instant>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Pacer {
            interval,
            next: tokio::sync::Mutex::new(Instant::now()),
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut next = self.next.lock().await;
        let now = Instant::now();
        if *next > now {
            sleep_until(*next).await;
        }
        *next = (*next).max(now) + self.interval;
    }
}

/// Shared run bookkeeping. All three fields are mutated only under one
/// lock; gateway calls happen outside it.
struct RunState {
    log: DeliveryLog,
    summary: Summary,
    to_suppress: Vec<SuppressionRecord>,
    dispatched: usize,
}

/// Fans `draft` out to the whole audience: snapshots the audience, skips
/// suppressed recipients, sends the rest concurrently under the rate
/// ceiling, retries rate-limited sends once, logs one row per recipient and
/// flushes newly discovered permanent failures into the suppression store
/// before returning.
pub async fn run_broadcast<G: Gateway, P: ProgressSink>(
    gateway: &G,
    draft: &Draft,
    audience: &HashSet<i64>,
    store: &SuppressionStore,
    paths: &RunPaths,
    progress: &P,
    settings: &EngineSettings,
) -> Result<RunReport> {
    let started_at = Local::now();
    let mut targets: Vec<i64> = audience.iter().copied().collect();
    targets.sort_unstable();

    write_backup(&paths.backups_dir, &targets, started_at)?;
    let suppressed = store.load();
    let log = DeliveryLog::create(&paths.logs_dir, started_at)?;
    log::info!(
        "broadcast run started: {} recipients, {} suppressed, log {}",
        targets.len(),
        suppressed.len(),
        log.file_name()
    );

    let total = targets.len();
    let state = Mutex::new(RunState {
        log,
        summary: Summary::new(),
        to_suppress: Vec::new(),
        dispatched: 0,
    });
    let pacer = Pacer::new(settings.send_interval);

    futures::stream::iter(targets.iter().copied())
        .for_each_concurrent(settings.concurrency.max(1), |user_id| {
            let state = &state;
            let pacer = &pacer;
            let suppressed = &suppressed;
            async move {
                let (status, detail) = if suppressed.contains(&user_id) {
                    (DeliveryStatus::SkippedSuppressed, String::new())
                } else {
                    deliver(gateway, draft, user_id, settings, pacer).await
                };
                let timestamp = Local::now();

                let dispatched = {
                    let mut st = state.lock().expect("broadcast bookkeeping lock poisoned");
                    if let Err(e) = st.log.append(user_id, status, &detail, timestamp) {
                        log::warn!("failed to log outcome for {}: {}", user_id, e);
                    }
                    st.summary.record(status);
                    match status {
                        DeliveryStatus::Blocked => st.to_suppress.push(SuppressionRecord {
                            user_id,
                            reason: SuppressReason::Blocked,
                            date_added: timestamp.date_naive(),
                        }),
                        DeliveryStatus::DeletedOrInvalid => {
                            st.to_suppress.push(SuppressionRecord {
                                user_id,
                                reason: SuppressReason::DeletedOrInvalid,
                                date_added: timestamp.date_naive(),
                            })
                        }
                        _ => {}
                    }
                    st.dispatched += 1;
                    st.dispatched
                };

                if settings.progress_every > 0
                    && dispatched % settings.progress_every == 0
                    && dispatched < total
                {
                    progress.publish(dispatched, total).await;
                }
            }
        })
        .await;

    let RunState {
        log,
        summary,
        to_suppress,
        dispatched,
    } = state
        .into_inner()
        .expect("broadcast bookkeeping lock poisoned");
    debug_assert_eq!(dispatched, total);

    let log_path = log.finish()?;

    if let Err(e) = store.append(&to_suppress) {
        log::warn!(
            "failed to append {} suppression rows: {}",
            to_suppress.len(),
            e
        );
    }

    progress.publish(total, total).await;
    log::info!("broadcast run finished: {} dispatched", dispatched);

    Ok(RunReport { summary, log_path })
}

/// One recipient: initial send plus at most one retry on rate-limit. Both
/// attempts take a pacer slot, so a retry never bursts past the ceiling.
async fn deliver<G: Gateway>(
    gateway: &G,
    draft: &Draft,
    user_id: i64,
    settings: &EngineSettings,
    pacer: &Pacer,
) -> (DeliveryStatus, String) {
    pacer.wait().await;
    match gateway.send(user_id, draft).await {
        Ok(()) => (DeliveryStatus::Delivered, String::new()),
        Err(SendError::RateLimited { retry_after }) => {
            let wait = retry_after.unwrap_or(settings.retry_fallback);
            log::info!("rate limited on {}, retrying in {:?}", user_id, wait);
            sleep(wait).await;
            pacer.wait().await;
            match gateway.send(user_id, draft).await {
                Ok(()) => (DeliveryStatus::DeliveredAfterRetry, String::new()),
                Err(e) => (
                    DeliveryStatus::Error,
                    format!("after rate-limit retry: {}", e),
                ),
            }
        }
        Err(SendError::Forbidden { message }) => {
            // Best-effort provider heuristic: deactivated accounts are gone
            // for good, everything else forbidden means we were blocked.
            if message.to_lowercase().contains("deactivat") {
                (DeliveryStatus::DeletedOrInvalid, message)
            } else {
                (DeliveryStatus::Blocked, message)
            }
        }
        Err(SendError::Network(detail)) => (DeliveryStatus::NetworkError, detail),
        Err(SendError::Other(detail)) => (DeliveryStatus::Error, detail),
    }
}
