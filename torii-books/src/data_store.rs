use std::collections::VecDeque;

use serde_json::Value;
use tokio::sync::Mutex;

/// Bounded rolling window of raw market-data snapshots.
///
/// The window is never cleared after a decision: once it reaches capacity,
/// every append evicts the oldest snapshot and the window stays full, so the
/// agent is consulted on every subsequent event.
pub struct DataStore {
    max_size: usize,
    buffer: Mutex<VecDeque<Value>>,
}

impl DataStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            buffer: Mutex::new(VecDeque::with_capacity(max_size)),
        }
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Append a snapshot, evicting from the front once at capacity.
    pub async fn append(&self, snapshot: Value) {
        let mut buffer = self.buffer.lock().await;
        if buffer.len() >= self.max_size {
            buffer.pop_front();
        }
        buffer.push_back(snapshot);
    }

    /// True once the window holds `max_size` snapshots.
    pub async fn is_full(&self) -> bool {
        self.buffer.lock().await.len() == self.max_size
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.lock().await.is_empty()
    }

    /// Owned copy of the current window, oldest first.
    pub async fn snapshot(&self) -> Vec<Value> {
        self.buffer.lock().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fills_then_rolls() {
        let store = DataStore::new(3);
        for i in 0..3 {
            assert!(!store.is_full().await);
            store.append(json!({ "seq": i })).await;
        }
        assert!(store.is_full().await);

        store.append(json!({ "seq": 3 })).await;
        assert!(store.is_full().await);
        assert_eq!(store.len().await, 3);

        let window = store.snapshot().await;
        assert_eq!(window.first().unwrap()["seq"], 1);
        assert_eq!(window.last().unwrap()["seq"], 3);
    }
}
