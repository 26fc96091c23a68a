use chrono::{Local, NaiveDate};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{Channel, DeliveryStatus, NotificationRecord, NotificationStats};
use crate::store::{KeyValueStore, HISTORY_KEY};

/// Append-only log of dispatch attempts, persisted as one JSON array under
/// [`HISTORY_KEY`].
///
/// Appends are serialized through an async mutex and written to the store
/// before they become visible, so concurrent batches never observe a
/// half-written history.
pub struct HistoryLedger<S> {
    store: S,
    entries: Mutex<Vec<NotificationRecord>>,
}

impl<S: KeyValueStore> HistoryLedger<S> {
    pub async fn open(store: S) -> Result<Self, StoreError> {
        let entries = match store.get(HISTORY_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };

        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    /// Records an attempt and returns it as stored. The id is bumped past
    /// the newest entry when needed so ids stay strictly increasing.
    pub async fn append(&self, mut record: NotificationRecord) -> Result<NotificationRecord, StoreError> {
        let mut entries = self.entries.lock().await;
        if let Some(last_id) = entries.iter().map(|entry| entry.id).max() {
            record.id = record.id.max(last_id + 1);
        }

        entries.push(record.clone());
        let persisted = match serde_json::to_value(&*entries) {
            Ok(value) => self.store.set(HISTORY_KEY, value).await,
            Err(err) => Err(err.into()),
        };

        if let Err(err) = persisted {
            entries.pop();
            return Err(err);
        }
        Ok(record)
    }

    pub async fn all(&self) -> Vec<NotificationRecord> {
        self.entries.lock().await.clone()
    }

    /// Newest entries first.
    pub async fn recent(&self, limit: usize) -> Vec<NotificationRecord> {
        self.entries
            .lock()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> NotificationStats {
        self.stats_on(Local::now().date_naive()).await
    }

    /// Statistics with `today` measured against the given local date.
    pub async fn stats_on(&self, today: NaiveDate) -> NotificationStats {
        let entries = self.entries.lock().await;
        let mut stats = NotificationStats {
            total: entries.len(),
            ..NotificationStats::default()
        };

        for entry in entries.iter() {
            if entry.timestamp.with_timezone(&Local).date_naive() == today {
                stats.today += 1;
            }
            match entry.status {
                DeliveryStatus::Sent => stats.successful += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
            match entry.channel {
                Channel::Email => stats.emails += 1,
                Channel::Sms => stats.sms += 1,
            }
        }

        stats
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        self.store.remove(HISTORY_KEY).await?;
        entries.clear();
        tracing::info!("notification history cleared");
        Ok(())
    }
}
