//! Dispatch worker.
//!
//! Campaign dispatches are queued to a single worker over an mpsc channel.
//! The worker spawns one task per campaign; that task is the only writer of
//! the campaign document until it completes, and it applies send results
//! one at a time even when sends overlap.

use std::sync::Arc;

use chrono::Utc;
use futures::{stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{AudienceMember, Campaign, CommunicationLog, DeliveryStatus};
use crate::store::Store;

use super::channel::DeliveryChannel;
use super::render_message;

/// A campaign ready to be sent.
#[derive(Debug)]
pub struct DispatchJob {
    pub campaign_id: Uuid,
    pub message_template: String,
    pub audience: Vec<AudienceMember>,
    /// Receives the final campaign, or the error that aborted it
    pub completion: Option<oneshot::Sender<AppResult<Campaign>>>,
}

/// Cloneable handle for queueing dispatch jobs.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchJob>,
}

impl DispatchHandle {
    /// Queue `job`, waiting for capacity if the queue is full.
    pub async fn submit(&self, job: DispatchJob) -> AppResult<()> {
        let campaign_id = job.campaign_id;
        self.tx.send(job).await.map_err(|_| {
            error!(campaign_id = %campaign_id, "dispatch_queue_closed");
            AppError::Internal(anyhow::anyhow!("dispatch worker is not running"))
        })?;
        debug!(campaign_id = %campaign_id, "dispatch_job_queued");
        Ok(())
    }

    /// Queue `job` and wait for it to finish.
    pub async fn run(&self, mut job: DispatchJob) -> AppResult<Campaign> {
        let (tx, rx) = oneshot::channel();
        job.completion = Some(tx);
        self.submit(job).await?;
        rx.await.map_err(|_| {
            AppError::Internal(anyhow::anyhow!("dispatch worker dropped the job"))
        })?
    }
}

pub struct DispatchWorker;

impl DispatchWorker {
    /// Start the worker. It stops once every handle has been dropped.
    pub fn spawn(
        store: Store,
        channel: Arc<dyn DeliveryChannel>,
        concurrency: usize,
        queue_capacity: usize,
    ) -> (DispatchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let task = tokio::spawn(run_worker(rx, store, channel, concurrency.max(1)));
        (DispatchHandle { tx }, task)
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<DispatchJob>,
    store: Store,
    channel: Arc<dyn DeliveryChannel>,
    concurrency: usize,
) {
    info!(concurrency = concurrency, "dispatch_worker_started");

    let mut running = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let store = store.clone();
        let channel = Arc::clone(&channel);

        // Reap finished campaigns so the set stays small
        while running.try_join_next().is_some() {}

        running.spawn(async move {
            let DispatchJob {
                campaign_id,
                message_template,
                audience,
                completion,
            } = job;

            let result = dispatch_campaign(
                &store,
                channel,
                concurrency,
                campaign_id,
                &message_template,
                &audience,
            )
            .await;

            match &result {
                Ok(campaign) => info!(
                    campaign_id = %campaign.id,
                    audience_size = campaign.delivery_stats.audience_size,
                    sent = campaign.delivery_stats.sent,
                    failed = campaign.delivery_stats.failed,
                    "dispatch_completed"
                ),
                Err(e) => error!(
                    campaign_id = %campaign_id,
                    error = %e,
                    "dispatch_aborted"
                ),
            }

            if let Some(tx) = completion {
                // Caller may have stopped waiting
                let _ = tx.send(result);
            }
        });
    }

    // Queue closed; in-flight campaigns still run to completion
    while running.join_next().await.is_some() {}

    info!("dispatch_worker_stopped");
}

/// Send one message per audience member and record each outcome.
///
/// Any storage error aborts the remaining audience; the campaign keeps the
/// counters persisted so far and stays `InProgress`.
pub async fn dispatch_campaign(
    store: &Store,
    channel: Arc<dyn DeliveryChannel>,
    concurrency: usize,
    campaign_id: Uuid,
    message_template: &str,
    audience: &[AudienceMember],
) -> AppResult<Campaign> {
    let mut campaign = store
        .campaigns
        .get(campaign_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign_id)))?;

    info!(
        campaign_id = %campaign_id,
        audience_size = audience.len(),
        concurrency = concurrency,
        "dispatch_started"
    );

    let rendered: Vec<(Uuid, String)> = audience
        .iter()
        .map(|member| (member.id, render_message(message_template, &member.name)))
        .collect();

    let sends = rendered.into_iter().map(move |(customer_id, message)| {
        let channel = Arc::clone(&channel);
        async move {
            let outcome = channel.send(customer_id, &message).await;
            (customer_id, message, outcome)
        }
    });

    // buffered keeps results in audience order
    let mut results = stream::iter(sends).buffered(concurrency.max(1));

    while let Some((customer_id, message, outcome)) = results.next().await {
        let status = if outcome.success {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        };

        store
            .communication_logs
            .insert(CommunicationLog::new(
                campaign.id,
                customer_id,
                message,
                status,
                outcome.vendor_message_id.clone(),
            ))
            .await?;

        if !outcome.success {
            warn!(
                campaign_id = %campaign.id,
                customer_id = %customer_id,
                detail = %outcome.detail,
                "dispatch_member_failed"
            );
        }

        campaign.delivery_stats.record(outcome.success);
        campaign = store.campaigns.replace(campaign).await?;

        debug!(
            campaign_id = %campaign.id,
            customer_id = %customer_id,
            delivery_status = %status,
            vendor_message_id = ?outcome.vendor_message_id,
            "dispatch_member_recorded"
        );
    }

    campaign.complete(Utc::now());
    store.campaigns.replace(campaign).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::channel::DeliveryOutcome;
    use crate::model::{CampaignStatus, Customer};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Rejects every customer listed in `reject`, accepts the rest.
    struct ScriptedVendor {
        reject: HashSet<Uuid>,
        calls: AtomicUsize,
    }

    impl ScriptedVendor {
        fn new(reject: impl IntoIterator<Item = Uuid>) -> Arc<Self> {
            Arc::new(Self {
                reject: reject.into_iter().collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DeliveryChannel for ScriptedVendor {
        async fn send(&self, customer_id: Uuid, _message: &str) -> DeliveryOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject.contains(&customer_id) {
                DeliveryOutcome::failed("rejected")
            } else {
                DeliveryOutcome::sent(format!("test_{}_{}", n, customer_id))
            }
        }
    }

    fn members(names: &[&str]) -> Vec<AudienceMember> {
        names
            .iter()
            .map(|n| Customer::new(*n, format!("{}@example.com", n.to_lowercase())).as_member())
            .collect()
    }

    async fn started_campaign(store: &Store, audience_size: usize) -> Campaign {
        let mut campaign = Campaign::new("Launch", Uuid::new_v4(), "Hi {customerName}!", "system");
        campaign.start(audience_size as u64);
        store.campaigns.insert(campaign).await.unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_records_every_member() {
        let store = Store::new();
        let audience = members(&["Ada", "Grace", "Linus"]);
        let campaign = started_campaign(&store, audience.len()).await;
        let vendor = ScriptedVendor::new([audience[1].id]);

        let done = dispatch_campaign(
            &store,
            vendor.clone(),
            1,
            campaign.id,
            &campaign.message_template,
            &audience,
        )
        .await
        .unwrap();

        assert_eq!(done.status, CampaignStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.delivery_stats.sent, 2);
        assert_eq!(done.delivery_stats.failed, 1);

        let logs = store
            .communication_logs
            .find(|l| l.campaign_id == campaign.id)
            .await
            .unwrap();
        assert_eq!(logs.len() as u64, done.delivery_stats.audience_size);
        assert_eq!(
            logs.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(),
            vec!["Hi Ada!", "Hi Grace!", "Hi Linus!"]
        );
        assert_eq!(logs[1].delivery_status, DeliveryStatus::Failed);
        assert_eq!(logs[1].vendor_message_id, None);
        assert!(logs[0].vendor_message_id.is_some());
        assert_eq!(vendor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_invariants() {
        let store = Store::new();
        let names: Vec<String> = (0..25).map(|i| format!("C{}", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let audience = members(&name_refs);
        let campaign = started_campaign(&store, audience.len()).await;
        let rejected: Vec<Uuid> = audience.iter().step_by(5).map(|m| m.id).collect();
        let vendor = ScriptedVendor::new(rejected.clone());

        let done = dispatch_campaign(
            &store,
            vendor,
            8,
            campaign.id,
            &campaign.message_template,
            &audience,
        )
        .await
        .unwrap();

        let logs = store
            .communication_logs
            .find(|l| l.campaign_id == campaign.id)
            .await
            .unwrap();
        let distinct: HashSet<Uuid> = logs.iter().map(|l| l.customer_id).collect();

        assert_eq!(distinct.len(), audience.len());
        assert_eq!(logs.len(), audience.len());
        assert_eq!(done.delivery_stats.failed, rejected.len() as u64);
        assert_eq!(
            done.delivery_stats.sent + done.delivery_stats.failed,
            done.delivery_stats.audience_size
        );
    }

    #[tokio::test]
    async fn test_empty_audience_completes() {
        let store = Store::new();
        let campaign = started_campaign(&store, 0).await;

        let done = dispatch_campaign(
            &store,
            ScriptedVendor::new([]),
            1,
            campaign.id,
            &campaign.message_template,
            &[],
        )
        .await
        .unwrap();

        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.delivery_stats.processed(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_dispatch() {
        let store = Store::new();
        let audience = members(&["Ada", "Grace"]);
        let campaign = started_campaign(&store, audience.len()).await;
        store.communication_logs.close();

        let err = dispatch_campaign(
            &store,
            ScriptedVendor::new([]),
            1,
            campaign.id,
            &campaign.message_template,
            &audience,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let stored = store.campaigns.get(campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::InProgress);
        assert_eq!(stored.delivery_stats.processed(), 0);
    }

    #[tokio::test]
    async fn test_worker_reports_completion() {
        let store = Store::new();
        let audience = members(&["Ada"]);
        let campaign = started_campaign(&store, 1).await;
        let (handle, _task) = DispatchWorker::spawn(store.clone(), ScriptedVendor::new([]), 1, 4);

        let done = handle
            .run(DispatchJob {
                campaign_id: campaign.id,
                message_template: campaign.message_template.clone(),
                audience,
                completion: None,
            })
            .await
            .unwrap();

        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.delivery_stats.sent, 1);
    }

    #[tokio::test]
    async fn test_worker_reports_unknown_campaign() {
        let (handle, _task) =
            DispatchWorker::spawn(Store::new(), ScriptedVendor::new([]), 1, 4);

        let err = handle
            .run(DispatchJob {
                campaign_id: Uuid::new_v4(),
                message_template: "Hi".into(),
                audience: vec![],
                completion: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
