use serde::Serialize;
use tokio::sync::broadcast;

use logdash_shared::{FightId, QueryKey, ReportCode};

/// Capacity of the notification channel; slow subscribers lose the oldest.
pub const NOTIFICATION_CAPACITY: usize = 64;

/// User-visible outcomes of background fetches.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Notification {
    MetadataFetchFailed {
        report: ReportCode,
        message: String,
    },
    QueryFetchFailed {
        report: ReportCode,
        query_key: QueryKey,
        filter: String,
        fights: Vec<FightId>,
        message: String,
    },
    /// A fetch cycle finished and its results were published.
    QueriesMerged {
        report: ReportCode,
        fragments: usize,
        revision: u64,
    },
}

impl Notification {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notification::QueriesMerged { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, notification: Notification) {
        if notification.is_error() {
            tracing::warn!(notification = ?notification, "notifying user");
        }
        // no subscribers is fine, nobody is looking
        if self.tx.send(notification).is_err() {
            tracing::trace!("no notification subscribers");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
