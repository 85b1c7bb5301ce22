//! Per-subscription critical sections.
//!
//! Every write path for a subscription id runs while holding that id's
//! lock, so concurrent webhook deliveries and API calls for the same
//! subscription apply one after another. Different subscriptions never
//! contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct SubscriptionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubscriptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `subscription_id`.
    ///
    /// The guard releases the lock when dropped. Locks are not re-entrant.
    pub async fn lock(&self, subscription_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map have no holder or waiter.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(subscription_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of ids with a live entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_is_serialized() {
        let locks = Arc::new(SubscriptionLocks::new());
        let inside = Arc::new(AtomicU32::new(0));
        let max_inside = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("sub_1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_ids_do_not_block_each_other() {
        let locks = SubscriptionLocks::new();
        let _first = locks.lock("sub_1").await;

        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock("sub_2")).await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = SubscriptionLocks::new();
        drop(locks.lock("sub_1").await);
        drop(locks.lock("sub_2").await);

        let _guard = locks.lock("sub_3").await;

        assert_eq!(locks.tracked().await, 1);
    }
}
