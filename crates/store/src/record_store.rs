//! Durable record store interface — the backing-store dependency of the
//! Working Store (C2), Long-Term Store (C3), Event Bus (C4), and
//! Dead-Letter Queue (C5): row CRUD, filtered/ordered range queries, and a
//! `notify`/`listen` pub/sub primitive (spec.md §6).
//!
//! The in-process implementation substitutes a `tokio::sync::broadcast`
//! channel for the durable store's own notification channel, grounded on
//! `gateway/src/runtime/deliveries.rs`'s `broadcast::Sender<T>` fan-out
//! over an in-memory, RwLock-guarded collection.

use async_trait::async_trait;
use archon_domain::error::Result;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    Ascending,
    Descending,
}

/// A simple equality/range filter evaluated against a row's top-level
/// fields. Good enough for the substrate's query shapes (by user, by
/// session, by type, above/below a score) without pulling in a query
/// planner.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub equals: Vec<(String, Value)>,
    pub gte: Vec<(String, f64)>,
    pub order_by: Option<String>,
    pub order: RecordOrder,
    pub tie_break_by: Option<String>,
    pub limit: Option<usize>,
}

impl Default for RecordOrder {
    fn default() -> Self {
        RecordOrder::Descending
    }
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.equals.push((field.into(), value));
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: f64) -> Self {
        self.gte.push((field.into(), value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: RecordOrder) -> Self {
        self.order_by = Some(field.into());
        self.order = order;
        self
    }

    pub fn tie_break_by(mut self, field: impl Into<String>) -> Self {
        self.tie_break_by = Some(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, row: &Value) -> bool {
        for (field, expected) in &self.equals {
            if row.get(field) != Some(expected) {
                return false;
            }
        }
        for (field, min) in &self.gte {
            let actual = row.get(field).and_then(|v| v.as_f64());
            match actual {
                Some(actual) if actual >= *min => {}
                _ => return false,
            }
        }
        true
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, table: &str, id: &str, row: Value) -> Result<()>;
    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>>;
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
    async fn query(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>>;
    async fn notify(&self, channel: &str, payload: Value) -> Result<()>;
    fn listen(&self, channel: &str) -> broadcast::Receiver<Value>;
}

struct TableData {
    rows: HashMap<String, Value>,
}

pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, TableData>>,
    channels: RwLock<HashMap<String, broadcast::Sender<Value>>>,
    channel_capacity: usize,
    unreachable: std::sync::atomic::AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            channel_capacity,
            unreachable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable
            .store(unreachable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(archon_domain::error::Error::Transient(
                "record store unreachable".into(),
            ));
        }
        Ok(())
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<Value> {
        let mut channels = self.channels.write();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .clone()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn sort_key(row: &Value, field: &str) -> Option<f64> {
    row.get(field).and_then(|v| {
        v.as_f64().or_else(|| {
            v.as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.timestamp_millis() as f64)
        })
    })
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put(&self, table: &str, id: &str, row: Value) -> Result<()> {
        self.check_reachable()?;
        let mut tables = self.tables.write();
        let data = tables
            .entry(table.to_string())
            .or_insert_with(|| TableData { rows: HashMap::new() });
        data.rows.insert(id.to_string(), row);
        Ok(())
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>> {
        self.check_reachable()?;
        let tables = self.tables.read();
        Ok(tables.get(table).and_then(|d| d.rows.get(id)).cloned())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.check_reachable()?;
        let mut tables = self.tables.write();
        if let Some(data) = tables.get_mut(table) {
            data.rows.remove(id);
        }
        Ok(())
    }

    async fn query(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>> {
        self.check_reachable()?;
        let tables = self.tables.read();
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|d| d.rows.values().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(field) = &filter.order_by {
            rows.sort_by(|a, b| {
                let av = sort_key(a, field).unwrap_or(f64::MIN);
                let bv = sort_key(b, field).unwrap_or(f64::MIN);
                let primary = av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal);
                let primary = match filter.order {
                    RecordOrder::Ascending => primary,
                    RecordOrder::Descending => primary.reverse(),
                };
                if primary != std::cmp::Ordering::Equal {
                    return primary;
                }
                if let Some(tb) = &filter.tie_break_by {
                    let av = sort_key(a, tb).unwrap_or(f64::MIN);
                    let bv = sort_key(b, tb).unwrap_or(f64::MIN);
                    // Tie-break is always createdAt-desc per spec.md §4.2.
                    return bv.partial_cmp(&av).unwrap_or(std::cmp::Ordering::Equal);
                }
                std::cmp::Ordering::Equal
            });
        }

        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn notify(&self, channel: &str, payload: Value) -> Result<()> {
        self.check_reachable()?;
        // A send with no active receivers is not an error: at-least-once
        // delivery only binds subscribers registered at dispatch time.
        let _ = self.sender_for(channel).send(payload);
        Ok(())
    }

    fn listen(&self, channel: &str) -> broadcast::Receiver<Value> {
        self.sender_for(channel).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemoryRecordStore::default();
        store.put("t", "1", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("t", "1").await.unwrap(), Some(json!({"a": 1})));
        store.delete("t", "1").await.unwrap();
        assert_eq!(store.get("t", "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = InMemoryRecordStore::default();
        store.put("t", "1", json!({"user": "u1", "score": 0.9})).await.unwrap();
        store.put("t", "2", json!({"user": "u1", "score": 0.5})).await.unwrap();
        store.put("t", "3", json!({"user": "u2", "score": 0.95})).await.unwrap();

        let filter = RecordFilter::new()
            .eq("user", json!("u1"))
            .order_by("score", RecordOrder::Descending);
        let rows = store.query("t", &filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["score"], json!(0.9));
    }

    #[tokio::test]
    async fn notify_listen_fans_out() {
        let store = InMemoryRecordStore::default();
        let mut rx1 = store.listen("ch");
        let mut rx2 = store.listen("ch");
        store.notify("ch", json!({"x": 1})).await.unwrap();
        assert_eq!(rx1.recv().await.unwrap(), json!({"x": 1}));
        assert_eq!(rx2.recv().await.unwrap(), json!({"x": 1}));
    }
}
