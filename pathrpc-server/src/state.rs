//! Per-connection state bag

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mutable key/value bag shared by calls made on one connection
///
/// Plain HTTP requests each get a fresh bag. A channel session hands the
/// same bag to every call it issues, so handlers can keep session data
/// (counters, authenticated user, ...) across calls on that channel.
/// Cloning shares the bag.
#[derive(Debug, Clone, Default)]
pub struct State {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl State {
    /// Empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.get(key).cloned()
    }

    /// Store a value, returning the previous one
    pub async fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.lock().await.insert(key.into(), value)
    }

    /// Remove a value
    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().await.remove(key)
    }

    /// Read-modify-write under one lock
    ///
    /// ```rust
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// use pathrpc_server::State;
    /// use serde_json::json;
    ///
    /// let state = State::new();
    /// let n = state.update(|bag| {
    ///     let next = bag.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
    ///     bag.insert("count".into(), json!(next));
    ///     next
    /// }).await;
    /// assert_eq!(n, 1);
    /// # });
    /// ```
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Map<String, Value>) -> R,
    {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    /// Copy of the whole bag
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.inner.lock().await.clone()
    }

    /// Whether two handles point at the same bag
    pub fn same_bag(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
