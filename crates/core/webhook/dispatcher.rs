//! Asynchronous webhook delivery.
//!
//! [`WebhookDispatcher::trigger`] renders a payload, records a pending
//! delivery per subscriber and hands the jobs to a bounded queue. A worker
//! task drains the queue and spawns each delivery on its own, so a slow
//! endpoint never holds up the others. Each delivery retries with
//! exponential backoff and its record is updated after every attempt.

use super::registry::WebhookRegistry;
use super::signature::{SIGNATURE_HEADER, signature_header};
use super::transport::{WebhookRequest, WebhookTransport};
use super::types::{
    AttemptLog, DeliveryRecord, DeliveryStatus, Webhook, WebhookEvent, WebhookPayload,
    WebhookStats,
};
use crate::config::WebhookConfig;
use crate::error::{GeopinError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

struct DeliveryJob {
    delivery_id: Uuid,
    webhook: Webhook,
    payload: WebhookPayload,
}

#[derive(Default)]
struct DeliveryCounters {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
}

/// State shared between the handle, the worker and in-flight deliveries.
struct Shared {
    registry: WebhookRegistry,
    transport: Arc<dyn WebhookTransport>,
    config: WebhookConfig,
    history: Mutex<FxHashMap<Uuid, VecDeque<DeliveryRecord>>>,
    counters: DeliveryCounters,
}

impl Shared {
    fn push_record(&self, record: DeliveryRecord) {
        let mut history = self.history.lock();
        let records = history.entry(record.webhook_id).or_default();
        records.push_back(record);
        while records.len() > self.config.max_history {
            records.pop_front();
        }
    }

    fn update_record(&self, webhook_id: &Uuid, delivery_id: &Uuid, f: impl FnOnce(&mut DeliveryRecord)) {
        let mut history = self.history.lock();
        if let Some(record) = history
            .get_mut(webhook_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == *delivery_id))
        {
            f(record);
        }
    }

    fn render(&self, job: &DeliveryJob) -> Result<WebhookRequest> {
        let body = serde_json::to_vec(&job.payload)?;

        let mut headers = vec![
            ("Content-Type", "application/json".to_string()),
            ("User-Agent", self.config.user_agent.clone()),
            ("X-Webhook-Event", job.payload.event.as_str().to_string()),
            ("X-Webhook-Delivery-Id", job.delivery_id.to_string()),
        ];
        if let Some(secret) = &job.webhook.secret {
            headers.push((SIGNATURE_HEADER, signature_header(&body, secret)?));
        }

        Ok(WebhookRequest {
            url: job.webhook.url.clone(),
            headers,
            body,
        })
    }

    async fn deliver(&self, job: DeliveryJob) {
        let webhook_id = job.webhook.id;
        let delivery_id = job.delivery_id;

        let request = match self.render(&job) {
            Ok(request) => request,
            Err(e) => {
                log::error!("Failed to render delivery {} for webhook {}: {}", delivery_id, webhook_id, e);
                self.update_record(&webhook_id, &delivery_id, |record| {
                    record.status = DeliveryStatus::Failed;
                    record.last_error = Some(e.to_string());
                });
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let result = self.transport.send(&request).await;
            let now = Utc::now();

            match result {
                Ok(()) => {
                    self.update_record(&webhook_id, &delivery_id, |record| {
                        record.status = DeliveryStatus::Success;
                        record.attempts = attempt;
                        record.last_attempt_at = Some(now);
                        record.attempt_log.push(AttemptLog { attempt, at: now, error: None });
                    });
                    self.registry.mark_triggered(&webhook_id, now);
                    self.counters.successful.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "Delivered {} to webhook {} on attempt {}",
                        job.payload.event,
                        webhook_id,
                        attempt
                    );
                    return;
                }
                Err(e) => {
                    log::warn!(
                        "Delivery {} to webhook {} failed (attempt {}/{}): {}",
                        delivery_id,
                        webhook_id,
                        attempt,
                        max_attempts,
                        e
                    );
                    let error = e.to_string();
                    self.update_record(&webhook_id, &delivery_id, |record| {
                        record.attempts = attempt;
                        record.last_attempt_at = Some(now);
                        record.last_error = Some(error.clone());
                        record.attempt_log.push(AttemptLog { attempt, at: now, error: Some(error) });
                    });
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        self.update_record(&webhook_id, &delivery_id, |record| {
            record.status = DeliveryStatus::Failed;
        });
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        log::error!(
            "Delivery {} to webhook {} failed after {} attempts",
            delivery_id,
            webhook_id,
            max_attempts
        );
    }
}

/// Handle to the webhook registry and delivery queue.
pub struct WebhookDispatcher {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::Sender<DeliveryJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WebhookDispatcher {
    /// Create the dispatcher and start its worker on the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when called outside a tokio runtime.
    pub fn start(config: WebhookConfig, transport: Arc<dyn WebhookTransport>) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            GeopinError::InvalidConfig("Webhook dispatcher needs a tokio runtime".to_string())
        })?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shared = Arc::new(Shared {
            registry: WebhookRegistry::new(),
            transport,
            config,
            history: Mutex::new(FxHashMap::default()),
            counters: DeliveryCounters::default(),
        });

        let worker = runtime.spawn(run_worker(shared.clone(), receiver));

        Ok(Self {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn registry(&self) -> &WebhookRegistry {
        &self.shared.registry
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.shared.config
    }

    /// Queue `event` for every active subscriber and return the delivery
    /// ids. Never waits for delivery; delivery failures only show up in the
    /// records.
    ///
    /// A full queue fails the affected deliveries immediately.
    ///
    /// # Errors
    ///
    /// `Closed` after [`shutdown`](Self::shutdown).
    pub fn trigger(
        &self,
        event: WebhookEvent,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Result<Vec<Uuid>> {
        let sender = self.sender.lock().clone().ok_or(GeopinError::Closed)?;

        let payload = WebhookPayload {
            event,
            timestamp: Utc::now(),
            data,
            correlation_id,
        };

        let mut queued = Vec::new();
        for webhook in self.shared.registry.subscribers(event) {
            let record = DeliveryRecord::pending(webhook.id, payload.clone());
            let job = DeliveryJob {
                delivery_id: record.id,
                webhook,
                payload: payload.clone(),
            };
            let webhook_id = record.webhook_id;
            let delivery_id = record.id;

            self.shared.push_record(record);
            self.shared.counters.total.fetch_add(1, Ordering::Relaxed);

            match sender.try_send(job) {
                Ok(()) => queued.push(delivery_id),
                Err(e) => {
                    let reason = match e {
                        mpsc::error::TrySendError::Full(_) => "delivery queue full",
                        mpsc::error::TrySendError::Closed(_) => "delivery queue closed",
                    };
                    log::warn!("Dropping {} for webhook {}: {}", event, webhook_id, reason);
                    self.shared.update_record(&webhook_id, &delivery_id, |record| {
                        record.status = DeliveryStatus::Failed;
                        record.last_error = Some(reason.to_string());
                    });
                    self.shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if queued.is_empty() {
            log::debug!("No subscribers for {}", event);
        }
        Ok(queued)
    }

    /// Remove a webhook along with its delivery history. Deliveries already
    /// in flight finish but are no longer recorded.
    pub fn unregister(&self, webhook_id: &Uuid) -> bool {
        let removed = self.shared.registry.unregister(webhook_id);
        self.shared.history.lock().remove(webhook_id);
        removed
    }

    /// Delivery records for a webhook, most recent attempt first. Records
    /// not yet attempted sort by their event time.
    pub fn deliveries(&self, webhook_id: &Uuid, limit: usize) -> Vec<DeliveryRecord> {
        let mut records: Vec<_> = match self.shared.history.lock().get(webhook_id) {
            Some(records) => records.iter().rev().cloned().collect(),
            None => return Vec::new(),
        };
        // Stable, so ties keep newest-created first.
        records.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        records.truncate(limit);
        records
    }

    pub fn delivery(&self, webhook_id: &Uuid, delivery_id: &Uuid) -> Option<DeliveryRecord> {
        self.shared
            .history
            .lock()
            .get(webhook_id)
            .and_then(|records| records.iter().find(|r| r.id == *delivery_id).cloned())
    }

    pub fn stats(&self) -> WebhookStats {
        WebhookStats {
            total_webhooks: self.shared.registry.len(),
            active_webhooks: self.shared.registry.active_count(),
            total_deliveries: self.shared.counters.total.load(Ordering::Relaxed),
            successful_deliveries: self.shared.counters.successful.load(Ordering::Relaxed),
            failed_deliveries: self.shared.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Close the queue and wait for queued and in-flight deliveries to
    /// finish. Later triggers fail with `Closed`.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            log::error!("Webhook worker ended abnormally: {}", e);
        }
    }
}

impl Drop for WebhookDispatcher {
    fn drop(&mut self) {
        // Dropping the sender lets the worker finish what is queued and exit.
        self.sender.get_mut().take();
    }
}

async fn run_worker(shared: Arc<Shared>, mut receiver: mpsc::Receiver<DeliveryJob>) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    let shared = shared.clone();
                    in_flight.spawn(async move { shared.deliver(job).await });
                }
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    log::error!("Webhook delivery task failed: {}", e);
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            log::error!("Webhook delivery task failed: {}", e);
        }
    }
    log::debug!("Webhook worker stopped");
}
