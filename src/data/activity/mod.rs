use chrono::{DateTime, Utc};
use mongodb::Database;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod db;

pub static ACTIVITY_COLLECTION_NAME: &str = "activity_logs";

const LOG_QUEUE_CAPACITY: usize = 256;

/// Append-only audit record. Never updated or deleted by this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    pub user: Uuid,
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(
        default = "Utc::now",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(actor: Uuid, action: String, details: Option<String>) -> ActivityLog {
        ActivityLog {
            id: Uuid::new_v4(),
            user: actor,
            action,
            details,
            created_at: crate::data::now_millis(),
        }
    }
}

/// Best-effort audit sink. Entries go through a bounded queue drained by a
/// background task; a full queue or a failed insert drops the entry with a
/// local warning. Callers never observe audit failures.
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    tx: mpsc::Sender<ActivityLog>,
}

impl ActivityLogger {
    pub fn spawn(db: Database) -> ActivityLogger {
        let (tx, mut rx) = mpsc::channel::<ActivityLog>(LOG_QUEUE_CAPACITY);

        tokio::spawn(async move {
            let logs = db.collection::<ActivityLog>(ACTIVITY_COLLECTION_NAME);
            while let Some(entry) = rx.recv().await {
                if let Err(e) = logs.insert_one(&entry, None).await {
                    tracing::warn!("failed to store activity log entry: {}", e);
                }
            }
        });

        ActivityLogger { tx }
    }

    pub fn record(&self, actor: Uuid, action: impl ToString, details: Option<String>) {
        let entry = ActivityLog::new(actor, action.to_string(), details);
        tracing::debug!("audit: {} by {}", entry.action, entry.user);

        if self.tx.try_send(entry).is_err() {
            tracing::warn!("activity log queue full or closed; dropping entry");
        }
    }

    #[cfg(test)]
    pub fn disconnected() -> ActivityLogger {
        let (tx, _) = mpsc::channel(1);
        ActivityLogger { tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_sort_key_is_a_native_datetime() {
        let entry = ActivityLog::new(Uuid::new_v4(), "Created new class: 10A".into(), None);
        let stored = bson::to_document(&entry).expect("log entry must serialize");

        assert!(matches!(
            stored.get("created_at"),
            Some(bson::Bson::DateTime(_))
        ));
    }

    #[test]
    fn record_never_fails_the_caller() {
        // Receiver is gone; the send fails internally and is swallowed.
        let logger = ActivityLogger::disconnected();
        logger.record(Uuid::new_v4(), "Created academic year 2024/2025", None);
        logger.record(Uuid::new_v4(), "Deleted class: 10A", Some("details".into()));
    }
}
