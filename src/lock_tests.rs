// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `lock.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::memory::MemoryRepository;
    use std::sync::Arc;

    fn lock() -> DistributedLock {
        DistributedLock::new(Arc::new(MemoryRepository::new()))
    }

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let lock = lock();
        assert!(!lock.check("sg-a-Z1-api-A").await.unwrap());

        assert!(lock.acquire("sg-a-Z1-api-A").await.unwrap());
        assert!(lock.check("sg-a-Z1-api-A").await.unwrap());

        lock.release("sg-a-Z1-api-A").await.unwrap();
        assert!(!lock.check("sg-a-Z1-api-A").await.unwrap());
        assert!(
            lock.acquire("sg-a-Z1-api-A").await.unwrap(),
            "Released lock is acquirable again"
        );
    }

    #[tokio::test]
    async fn test_second_acquire_fails_without_error() {
        let lock = lock();
        assert!(lock.acquire("resource").await.unwrap());
        assert!(
            !lock.acquire("resource").await.unwrap(),
            "Collision returns false, not an error"
        );
    }

    #[tokio::test]
    async fn test_locks_are_per_resource() {
        let lock = lock();
        assert!(lock.acquire("resource-a").await.unwrap());
        assert!(lock.acquire("resource-b").await.unwrap());
    }

    /// At most one of any number of concurrent acquirers wins.
    #[tokio::test]
    async fn test_concurrent_acquire_exclusivity() {
        let lock = Arc::new(lock());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let lock = lock.clone();
            handles.push(tokio::spawn(
                async move { lock.acquire("contended").await.unwrap() },
            ));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "Exactly one concurrent acquirer may win");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_acquire_succeeds_when_released() {
        let lock = Arc::new(lock());
        assert!(lock.acquire("resource").await.unwrap());

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire_with_backoff("resource").await.unwrap() })
        };
        // Give the waiter a couple of failed attempts before releasing
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        lock.release("resource").await.unwrap();

        assert!(waiter.await.unwrap(), "Waiter wins once the holder releases");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_acquire_exhausts_attempts() {
        let lock = lock();
        assert!(lock.acquire("resource").await.unwrap());
        assert!(
            !lock.acquire_with_backoff("resource").await.unwrap(),
            "Held lock exhausts the bounded attempts"
        );
    }

    #[tokio::test]
    async fn test_lock_row_shape() {
        let repository = Arc::new(MemoryRepository::new());
        let lock = DistributedLock::new(repository.clone());
        lock.acquire("resource").await.unwrap();

        let row = crate::repository::Repository::get(repository.as_ref(), "resource")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["resource_id"], "resource");
        assert!(row["timestamp"].is_i64(), "Row carries a unix timestamp");
    }
}
