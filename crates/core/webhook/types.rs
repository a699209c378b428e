use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Job lifecycle events a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "route.started")]
    RouteStarted,
    #[serde(rename = "route.completed")]
    RouteCompleted,
    #[serde(rename = "route.failed")]
    RouteFailed,
    #[serde(rename = "enrichment.started")]
    EnrichmentStarted,
    #[serde(rename = "enrichment.completed")]
    EnrichmentCompleted,
    #[serde(rename = "enrichment.failed")]
    EnrichmentFailed,
    #[serde(rename = "batch.started")]
    BatchStarted,
    #[serde(rename = "batch.completed")]
    BatchCompleted,
    #[serde(rename = "batch.failed")]
    BatchFailed,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 9] = [
        WebhookEvent::RouteStarted,
        WebhookEvent::RouteCompleted,
        WebhookEvent::RouteFailed,
        WebhookEvent::EnrichmentStarted,
        WebhookEvent::EnrichmentCompleted,
        WebhookEvent::EnrichmentFailed,
        WebhookEvent::BatchStarted,
        WebhookEvent::BatchCompleted,
        WebhookEvent::BatchFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::RouteStarted => "route.started",
            WebhookEvent::RouteCompleted => "route.completed",
            WebhookEvent::RouteFailed => "route.failed",
            WebhookEvent::EnrichmentStarted => "enrichment.started",
            WebhookEvent::EnrichmentCompleted => "enrichment.completed",
            WebhookEvent::EnrichmentFailed => "enrichment.failed",
            WebhookEvent::BatchStarted => "batch.started",
            WebhookEvent::BatchCompleted => "batch.completed",
            WebhookEvent::BatchFailed => "batch.failed",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Unknown webhook event: {}", s))
    }
}

/// A registered webhook subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub url: String,
    pub events: BTreeSet<WebhookEvent>,
    /// HMAC key for payload signatures (never serialized)
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Time of the last successful delivery
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: WebhookEvent) -> bool {
        self.active && self.events.contains(&event)
    }
}

/// Body POSTed to webhook endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    /// RFC 3339
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

/// One HTTP attempt within a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptLog {
    /// 1-based
    pub attempt: u32,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delivery of one payload to one webhook, across all of its attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub payload: WebhookPayload,
    pub status: DeliveryStatus,
    pub attempts: u32,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub attempt_log: Vec<AttemptLog>,
}

impl DeliveryRecord {
    /// Time of the latest attempt, or of the event for records not yet tried.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_attempt_at.unwrap_or(self.payload.timestamp)
    }

    pub fn pending(webhook_id: Uuid, payload: WebhookPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            webhook_id,
            payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
            attempt_log: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookStats {
    pub total_webhooks: usize,
    pub active_webhooks: usize,
    pub total_deliveries: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_names() {
        let json = serde_json::to_string(&WebhookEvent::EnrichmentCompleted).unwrap();
        assert_eq!(json, "\"enrichment.completed\"");

        let parsed: WebhookEvent = serde_json::from_str("\"batch.failed\"").unwrap();
        assert_eq!(parsed, WebhookEvent::BatchFailed);

        for event in WebhookEvent::ALL {
            assert_eq!(event.as_str().parse::<WebhookEvent>().unwrap(), event);
        }
        assert!("route.exploded".parse::<WebhookEvent>().is_err());
    }

    #[test]
    fn test_secret_not_serialized() {
        let webhook = Webhook {
            id: Uuid::new_v4(),
            url: "https://example.com/hook".to_string(),
            events: BTreeSet::from([WebhookEvent::RouteCompleted]),
            secret: Some("supersecretkey123".to_string()),
            active: true,
            created_at: Utc::now(),
            last_triggered: None,
        };

        let json = serde_json::to_string(&webhook).unwrap();
        assert!(!json.contains("supersecret"));
        assert!(json.contains("route.completed"));

        let back: Webhook = serde_json::from_str(&json).unwrap();
        assert_eq!(back.secret, None);
    }

    #[test]
    fn test_payload_timestamp_is_rfc3339() {
        let payload = WebhookPayload {
            event: WebhookEvent::BatchStarted,
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
            data: serde_json::json!({"total": 3}),
            correlation_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["timestamp"], "2024-05-01T12:00:00Z");
        assert_eq!(value["event"], "batch.started");
        assert!(value.get("correlation_id").is_none());
    }
}
