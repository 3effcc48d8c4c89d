// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event publisher — durable, topic-routed lifecycle notifications.
//
// Events land in an append-only SQLite journal under a single durable topic
// with hierarchical routing keys, and are simultaneously fanned out to any
// in-process subscriber. The journal connection is owned here and opened
// lazily; a failed write drops it so the next publish re-opens, which means
// the first caller after a failure pays the reconnection cost.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::LifecycleEvent;

/// The single durable topic all lifecycle events are published to.
pub const EVENT_TOPIC: &str = "pdf_processing";

/// Capacity of the in-process fan-out channel.
const FANOUT_CAPACITY: usize = 256;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS events (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        topic        TEXT    NOT NULL,
        routing_key  TEXT    NOT NULL,
        payload      TEXT    NOT NULL,
        published_at TEXT    NOT NULL
    );
"#;

/// A journal row, used for queries.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub topic: String,
    pub routing_key: String,
    pub payload: String,
    pub published_at: String,
}

/// Notification contract consumed by the pipeline.
///
/// Delivery is at-least-once from the consumer's point of view; the pipeline
/// treats publish failures as non-fatal to the operation itself, so an
/// operation may complete with no corresponding event delivered.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Durable journal publisher with in-process fan-out.
pub struct JournalPublisher {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    fanout: broadcast::Sender<LifecycleEvent>,
}

impl JournalPublisher {
    /// Create a publisher journalling to `path`. No I/O happens until the
    /// first publish.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            path: path.into(),
            conn: Mutex::new(None),
            fanout,
        }
    }

    /// Subscribe to lifecycle events published by this process.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.fanout.subscribe()
    }

    /// The most recent `limit` journal entries, newest first.
    pub fn recent_events(&self, limit: u32) -> Result<Vec<StoredEvent>> {
        let mut guard = self.conn.lock().expect("journal lock poisoned");
        let conn = acquire(&mut guard, &self.path)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, topic, routing_key, payload, published_at
                 FROM events ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| FalzwerkError::Publish(format!("prepare recent_events: {e}")))?;

        let events = stmt
            .query_map(params![limit], |row| {
                Ok(StoredEvent {
                    id: row.get(0)?,
                    topic: row.get(1)?,
                    routing_key: row.get(2)?,
                    payload: row.get(3)?,
                    published_at: row.get(4)?,
                })
            })
            .map_err(|e| FalzwerkError::Publish(format!("query recent_events: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FalzwerkError::Publish(format!("collect rows: {e}")))?;

        Ok(events)
    }
}

/// Get the open connection, opening it if this is the first use (or the
/// previous one was dropped after a failure).
fn acquire<'a>(
    slot: &'a mut Option<Connection>,
    path: &std::path::Path,
) -> Result<&'a Connection> {
    if slot.is_none() {
        let conn = Connection::open(path)
            .map_err(|e| FalzwerkError::Publish(format!("open journal: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FalzwerkError::Publish(format!("WAL pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| FalzwerkError::Publish(format!("create table: {e}")))?;
        info!(path = %path.display(), "event journal opened");
        *slot = Some(conn);
    }
    Ok(slot.as_ref().expect("connection just installed"))
}

#[async_trait]
impl EventPublisher for JournalPublisher {
    #[instrument(skip(self, event), fields(routing_key = event.routing_key()))]
    async fn publish(&self, event: &LifecycleEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let routing_key = event.routing_key();
        let published_at = Utc::now().to_rfc3339();

        {
            let mut guard = self.conn.lock().expect("journal lock poisoned");
            let outcome = acquire(&mut guard, &self.path).and_then(|conn| {
                conn.execute(
                    "INSERT INTO events (topic, routing_key, payload, published_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![EVENT_TOPIC, routing_key, payload, published_at],
                )
                .map_err(|e| FalzwerkError::Publish(format!("append event: {e}")))
            });

            if let Err(err) = outcome {
                // Drop the connection; the next publish re-opens it.
                *guard = None;
                return Err(err);
            }
        }

        // In-process fan-out; no subscribers is not an error.
        let _ = self.fanout.send(event.clone());

        debug!("event journalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falzwerk_core::types::{ArtifactId, OperationId, OperationKind};

    fn uploaded_event() -> LifecycleEvent {
        LifecycleEvent::FileUploaded {
            artifact_id: ArtifactId::new(),
            mime_type: "application/pdf".into(),
            original_filename: "scan.pdf".into(),
            owner_id: Some("alice".into()),
        }
    }

    #[tokio::test]
    async fn publish_appends_to_the_journal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let publisher = JournalPublisher::new(dir.path().join("events.db"));

        publisher.publish(&uploaded_event()).await.expect("publish");
        publisher
            .publish(&LifecycleEvent::OperationFailed {
                operation_id: OperationId::new(),
                kind: OperationKind::Decrypt,
                error: "wrong password".into(),
            })
            .await
            .expect("publish");

        let events = publisher.recent_events(10).expect("recent");
        assert_eq!(events.len(), 2);
        // Newest first.
        assert_eq!(events[0].routing_key, "file.operation.failed");
        assert_eq!(events[1].routing_key, "file.uploaded");
        assert!(events.iter().all(|e| e.topic == EVENT_TOPIC));
    }

    #[tokio::test]
    async fn journal_survives_publisher_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.db");

        {
            let publisher = JournalPublisher::new(&path);
            publisher.publish(&uploaded_event()).await.expect("publish");
        }

        let reopened = JournalPublisher::new(&path);
        let events = reopened.recent_events(10).expect("recent");
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn payload_round_trips_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let publisher = JournalPublisher::new(dir.path().join("events.db"));
        let event = uploaded_event();

        publisher.publish(&event).await.expect("publish");

        let stored = publisher.recent_events(1).expect("recent");
        let decoded: LifecycleEvent =
            serde_json::from_str(&stored[0].payload).expect("decode payload");
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn subscribers_receive_the_fanout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let publisher = JournalPublisher::new(dir.path().join("events.db"));

        let mut receiver = publisher.subscribe();
        let event = uploaded_event();
        publisher.publish(&event).await.expect("publish");

        let received = receiver.recv().await.expect("receive");
        assert_eq!(received, event);
        assert_eq!(received.routing_key(), "file.uploaded");
    }
}
