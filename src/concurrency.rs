use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Serializes mutating operations per `(realm, user_id)` (spec §5), keyed the
/// same way the teacher's `RateLimiter` keys its bucket map
/// (`Arc<Mutex<HashMap<String, _>>>`) rather than reaching for `dashmap`,
/// which appears nowhere in the retrieval pack.
#[derive(Default)]
pub struct UserLockRegistry {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, realm: &str, user_id: &str) -> OwnedMutexGuard<()> {
        let key = format!("{realm}:{user_id}");
        let entry = {
            let mut locks = self.locks.lock().expect("user lock registry poisoned");
            locks.entry(key).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }

    /// Returns `None` immediately if another mutation is already in flight
    /// for this user, rather than waiting (spec §4.2 step 1: "if an
    /// in-flight enrollment exists for this user, refuse with `Conflict`").
    pub fn try_lock(&self, realm: &str, user_id: &str) -> Option<OwnedMutexGuard<()>> {
        let key = format!("{realm}:{user_id}");
        let entry = {
            let mut locks = self.locks.lock().expect("user lock registry poisoned");
            locks.entry(key).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
        };
        entry.try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_user_key_serializes() {
        let registry = Arc::new(UserLockRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = vec![];

        for _ in 0..5 {
            let registry = registry.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock("realm-1", "user-1").await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn try_lock_refuses_while_another_mutation_is_in_flight() {
        let registry = UserLockRegistry::new();
        let _held = registry.lock("realm-1", "user-1").await;
        assert!(registry.try_lock("realm-1", "user-1").is_none());
        assert!(registry.try_lock("realm-1", "user-2").is_some());
    }

    #[tokio::test]
    async fn different_user_keys_do_not_block_each_other() {
        let registry = UserLockRegistry::new();
        let _a = registry.lock("realm-1", "user-a").await;
        let b = tokio::time::timeout(Duration::from_millis(50), registry.lock("realm-1", "user-b")).await;
        assert!(b.is_ok());
    }
}
