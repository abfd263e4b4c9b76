//! Durable pub-sub broker backed by SQLite.
//!
//! Messages are rows; the engine polls for due rows, claims them, and
//! dispatches each to its topic's consumer on a spawned task. Delivery is
//! at-least-once: a row is deleted only after the consumer returns Ok, and
//! a claim that outlives its visibility window is handed out again.
//! Transient consumer errors reschedule the row with backoff; permanent
//! ones (validation, business rejection) ack and drop.

mod db;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use lattice_core::config::BrokerConfig;
use lattice_core::LatticeError;

/// A claim older than this is considered abandoned and is redelivered.
const CLAIM_TIMEOUT_MS: i64 = 300_000;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MqError> for LatticeError {
    fn from(e: MqError) -> Self {
        LatticeError::Queue(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MqError>;

type Handler = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = lattice_core::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Cheap publishing handle, shared with producers.
#[derive(Clone)]
pub struct BrokerHandle {
    conn: Arc<Mutex<Connection>>,
    notify: Arc<Notify>,
}

impl BrokerHandle {
    pub fn publish<B: Serialize>(&self, topic: &str, body: &B) -> Result<()> {
        let body = serde_json::to_string(body)?;
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO mq_messages (topic, body, attempts, available_at, created_at)
                 VALUES (?1, ?2, 0, ?3, ?3)",
                params![topic, body, now_ms()],
            )?;
        }
        debug!(topic, "published");
        self.notify.notify_one();
        Ok(())
    }
}

/// The dispatch engine. Owns the consumer registry; `run` drives delivery
/// until shutdown.
pub struct Broker {
    conn: Arc<Mutex<Connection>>,
    notify: Arc<Notify>,
    config: BrokerConfig,
    consumers: HashMap<String, Handler>,
}

impl Broker {
    /// Open the queue table on `path` (shared with the main database file
    /// or its own; both work; the broker always uses its own connection).
    pub fn open(path: impl AsRef<std::path::Path>, config: BrokerConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 30000;")?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            notify: Arc::new(Notify::new()),
            config,
            consumers: HashMap::new(),
        })
    }

    pub fn handle(&self) -> BrokerHandle {
        BrokerHandle {
            conn: Arc::clone(&self.conn),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Register the consumer for a topic. One consumer per topic; a second
    /// registration replaces the first.
    pub fn subscribe<F, Fut>(&mut self, topic: &str, handler: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = lattice_core::Result<()>> + Send + 'static,
    {
        self.consumers
            .insert(topic.to_string(), Arc::new(move |v| Box::pin(handler(v))));
    }

    /// Main delivery loop. Wakes on publish, on the poll interval, and on
    /// shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("broker started");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(self.config.poll_interval_ms));
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.notify.notified() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("broker shutting down");
                        break;
                    }
                    continue;
                }
            }
            if let Err(e) = self.dispatch_due() {
                error!("broker dispatch error: {e}");
            }
        }
    }

    /// Claim every due message and spawn its delivery.
    fn dispatch_due(&self) -> Result<()> {
        let now = now_ms();
        let due: Vec<(i64, String, String, u32)> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn.prepare_cached(
                "SELECT id, topic, body, attempts FROM mq_messages
                 WHERE available_at <= ?1
                   AND (claimed_at IS NULL OR claimed_at <= ?2)
                 ORDER BY id",
            )?;
            let rows: Vec<_> = stmt
                .query_map(params![now, now - CLAIM_TIMEOUT_MS], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .filter_map(|r| r.ok())
                .collect();
            for (id, _, _, _) in &rows {
                conn.execute(
                    "UPDATE mq_messages SET claimed_at = ?1 WHERE id = ?2",
                    params![now, id],
                )?;
            }
            rows
        };

        for (id, topic, body, attempts) in due {
            let Some(handler) = self.consumers.get(&topic) else {
                warn!(topic = %topic, "no consumer registered, dropping message");
                self.finish(id)?;
                continue;
            };
            let body: serde_json::Value = match serde_json::from_str(&body) {
                Ok(v) => v,
                Err(e) => {
                    error!(topic = %topic, "undecodable message body dropped: {e}");
                    self.finish(id)?;
                    continue;
                }
            };

            let handler = Arc::clone(handler);
            let conn = Arc::clone(&self.conn);
            let max_attempts = self.config.max_attempts;
            let backoff_ms = self.config.redelivery_backoff_ms as i64;
            tokio::spawn(async move {
                let outcome = handler(body).await;
                let conn = conn.lock().unwrap();
                match outcome {
                    Ok(()) => {
                        let _ = conn.execute("DELETE FROM mq_messages WHERE id = ?1", params![id]);
                    }
                    Err(e) if e.is_transient() && attempts + 1 < max_attempts => {
                        warn!(topic = %topic, attempt = attempts + 1, "redelivering after error: {e}");
                        let _ = conn.execute(
                            "UPDATE mq_messages
                             SET attempts = attempts + 1, claimed_at = NULL, available_at = ?1
                             WHERE id = ?2",
                            params![now_ms() + backoff_ms, id],
                        );
                    }
                    Err(e) => {
                        error!(topic = %topic, attempts, "message dropped: {e}");
                        let _ = conn.execute("DELETE FROM mq_messages WHERE id = ?1", params![id]);
                    }
                }
            });
        }
        Ok(())
    }

    fn finish(&self, id: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute("DELETE FROM mq_messages WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Undelivered message count, for tests and health reporting.
    pub fn depth(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row("SELECT COUNT(*) FROM mq_messages", [], |r| r.get(0))?;
        Ok(n)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> BrokerConfig {
        BrokerConfig {
            poll_interval_ms: 20,
            max_attempts: 3,
            redelivery_backoff_ms: 20,
        }
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn publish_then_consume() {
        let dir = tempfile::tempdir().unwrap();
        let mut broker = Broker::open(dir.path().join("mq.db"), test_config()).unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let seen = hits.clone();
        broker.subscribe("t", move |body: serde_json::Value| {
            let seen = seen.clone();
            async move {
                assert_eq!(body["x"], 1);
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handle = broker.handle();
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(broker.run(rx));

        handle.publish("t", &serde_json::json!({"x": 1})).unwrap();
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn transient_error_redelivers_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut broker = Broker::open(dir.path().join("mq.db"), test_config()).unwrap();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        broker.subscribe("t", move |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(LatticeError::Database("connection reset".to_string()))
                } else {
                    Ok(())
                }
            }
        });

        let handle = broker.handle();
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(broker.run(rx));

        handle.publish("t", &serde_json::json!({})).unwrap();
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_is_dropped_not_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        let mut broker = Broker::open(dir.path().join("mq.db"), test_config()).unwrap();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        broker.subscribe("t", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LatticeError::Rejected("tool handler said no".to_string()))
            }
        });

        let handle = broker.handle();
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(broker.run(rx));

        handle.publish("t", &serde_json::json!({})).unwrap();
        settle().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tx.send(true).unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut broker = Broker::open(dir.path().join("mq.db"), test_config()).unwrap();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        broker.subscribe("t", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LatticeError::Database("always down".to_string()))
            }
        });

        let handle = broker.handle();
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(broker.run(rx));

        handle.publish("t", &serde_json::json!({})).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        tx.send(true).unwrap();
        join.await.unwrap();
    }
}
