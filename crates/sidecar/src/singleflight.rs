//! In-flight call deduplication.
//!
//! Concurrent callers for the same key are folded into a single execution
//! whose result is broadcast to every waiter, so N identical requests produce
//! one upstream call and N identical answers.

use std::collections::{hash_map::Entry, HashMap};
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;

#[derive(Debug)]
pub struct SingleFlight<T> {
    inflight: Mutex<HashMap<u64, broadcast::Sender<T>>>,
}

impl<T: Clone + Send> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` for `key`, or wait for the in-flight leader's result.
    ///
    /// The leader removes the key before broadcasting, so followers either
    /// subscribe before the broadcast (the map lock orders the two) or start
    /// a fresh flight. A leader that is dropped mid-flight closes the channel
    /// and waiters fall back to executing `f` themselves.
    pub async fn run<F, Fut>(&self, key: u64, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiter = {
            let mut inflight = self.inflight.lock().expect("singleflight lock poisoned");
            match inflight.entry(key) {
                Entry::Occupied(entry) => Some(entry.get().subscribe()),
                Entry::Vacant(entry) => {
                    let (tx, _) = broadcast::channel(1);
                    entry.insert(tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            match rx.recv().await {
                Ok(value) => return value,
                // leader vanished; run the call ourselves
                Err(_) => return f().await,
            }
        }

        let value = f().await;

        let tx = self
            .inflight
            .lock()
            .expect("singleflight lock poisoned")
            .remove(&key);
        if let Some(tx) = tx {
            // no waiters is fine
            let _ = tx.send(value.clone());
        }

        value
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<u64>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            let release = release.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run(7, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        42u64
                    })
                    .await
            }));
        }

        // let all callers pile up on the same flight, then release the leader
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        release.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flight = SingleFlight::<u64>::new();
        let a = flight.run(1, || async { 1u64 }).await;
        let b = flight.run(2, || async { 2u64 }).await;
        assert_eq!((a, b), (1, 2));
    }

    #[tokio::test]
    async fn sequential_calls_rerun() {
        let flight = SingleFlight::<u64>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            flight
                .run(9, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    0u64
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
