use super::types::{Webhook, WebhookEvent};
use crate::error::{GeopinError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Url;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Concurrent store of webhook subscriptions.
#[derive(Debug, Default)]
pub struct WebhookRegistry {
    webhooks: DashMap<Uuid, Webhook>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a webhook. The URL must be absolute http(s) and at least one
    /// event is required; an empty secret counts as no secret.
    pub fn register(
        &self,
        url: &str,
        events: impl IntoIterator<Item = WebhookEvent>,
        secret: Option<String>,
    ) -> Result<Webhook> {
        validate_url(url)?;

        let events: BTreeSet<_> = events.into_iter().collect();
        if events.is_empty() {
            return Err(GeopinError::InvalidInput(
                "Webhook must subscribe to at least one event".to_string(),
            ));
        }

        let webhook = Webhook {
            id: Uuid::new_v4(),
            url: url.to_string(),
            events,
            secret: secret.filter(|s| !s.is_empty()),
            active: true,
            created_at: Utc::now(),
            last_triggered: None,
        };

        log::debug!("Registered webhook {} -> {}", webhook.id, webhook.url);
        self.webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook)
    }

    pub fn unregister(&self, id: &Uuid) -> bool {
        self.webhooks.remove(id).is_some()
    }

    pub fn set_active(&self, id: &Uuid, active: bool) -> bool {
        match self.webhooks.get_mut(id) {
            Some(mut webhook) => {
                webhook.active = active;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Webhook> {
        self.webhooks.get(id).map(|w| w.clone())
    }

    /// All webhooks, oldest first.
    pub fn list(&self) -> Vec<Webhook> {
        let mut webhooks: Vec<_> = self.webhooks.iter().map(|w| w.clone()).collect();
        webhooks.sort_by_key(|w| w.created_at);
        webhooks
    }

    /// Active webhooks subscribed to `event`.
    pub fn subscribers(&self, event: WebhookEvent) -> Vec<Webhook> {
        self.webhooks
            .iter()
            .filter(|w| w.subscribes_to(event))
            .map(|w| w.clone())
            .collect()
    }

    pub(crate) fn mark_triggered(&self, id: &Uuid, at: DateTime<Utc>) {
        if let Some(mut webhook) = self.webhooks.get_mut(id) {
            webhook.last_triggered = Some(at);
        }
    }

    pub fn len(&self) -> usize {
        self.webhooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.webhooks.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.webhooks.iter().filter(|w| w.active).count()
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| GeopinError::InvalidInput(format!("Invalid webhook URL '{}': {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GeopinError::InvalidInput(format!(
            "Webhook URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(GeopinError::InvalidInput(format!(
            "Webhook URL has no host: {}",
            url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = WebhookRegistry::new();
        let hook = registry
            .register(
                "https://example.com/hook",
                [WebhookEvent::RouteCompleted, WebhookEvent::RouteFailed],
                Some("secret".to_string()),
            )
            .unwrap();

        assert!(hook.active);
        assert_eq!(registry.get(&hook.id).unwrap().url, "https://example.com/hook");
        assert_eq!(registry.subscribers(WebhookEvent::RouteFailed).len(), 1);
        assert!(registry.subscribers(WebhookEvent::BatchStarted).is_empty());
    }

    #[test]
    fn test_register_validation() {
        let registry = WebhookRegistry::new();
        let events = [WebhookEvent::BatchCompleted];

        assert!(registry.register("ftp://example.com", events, None).is_err());
        assert!(registry.register("not a url", events, None).is_err());
        assert!(registry.register("https://example.com", Vec::<WebhookEvent>::new(), None).is_err());
        assert!(registry.is_empty());

        let hook = registry.register("http://localhost:9000/h", events, Some(String::new())).unwrap();
        assert_eq!(hook.secret, None);
    }

    #[test]
    fn test_inactive_webhooks_are_not_subscribers() {
        let registry = WebhookRegistry::new();
        let hook = registry
            .register("https://example.com", [WebhookEvent::BatchStarted], None)
            .unwrap();

        assert!(registry.set_active(&hook.id, false));
        assert!(registry.subscribers(WebhookEvent::BatchStarted).is_empty());
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(&hook.id));
        assert!(!registry.unregister(&hook.id));
        assert!(!registry.set_active(&hook.id, true));
    }
}
