use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Outbound notification hook. Delivery (mail, push) lives behind implementations.
pub trait NotificationPublisher: Send + Sync + 'static {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub recipient: UserId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Collects notifications in memory. Used by the service binary and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotificationOutbox {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationOutbox {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl NotificationPublisher for InMemoryNotificationOutbox {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
