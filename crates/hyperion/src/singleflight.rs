//! Request coalescing: one in-flight call per key
//!
//! The first caller for a key becomes the leader: its call runs on a spawned
//! task and the outcome is shared with everyone who joins while it runs.
//! Dropping any caller, the leader included, never cancels the call.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// The in-flight call ended without producing an outcome (it panicked or its
/// runtime shut down)
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("in-flight call was abandoned")]
pub struct FlightAbandoned;

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct InFlight<V, E> {
    generation: u64,
    flight: Flight<V, E>,
}

/// Coalesces concurrent calls that share a key
///
/// Cloning creates a new handle to the SAME in-flight map.
pub struct SingleFlight<K, V, E> {
    calls: Arc<DashMap<K, InFlight<V, E>>>,
    generation: Arc<AtomicU64>,
}

impl<K, V, E> Clone for SingleFlight<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            calls: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + From<FlightAbandoned> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` for `key`, or wait for the call already running for it
    ///
    /// `f` is only invoked by the caller that creates the flight.
    pub async fn call<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (flight, leader) = match self.calls.entry(key.clone()) {
            Entry::Occupied(o) => (o.get().flight.clone(), None),
            Entry::Vacant(v) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel::<Result<V, E>>();
                let flight = async move {
                    rx.await
                        .unwrap_or_else(|_| Err(E::from(FlightAbandoned)))
                }
                .boxed()
                .shared();

                v.insert(InFlight {
                    generation,
                    flight: flight.clone(),
                });
                (flight, Some((generation, tx)))
            }
        };

        // the map shard lock is released before any caller code runs
        if let Some((generation, tx)) = leader {
            let guard = FlightGuard {
                calls: Arc::clone(&self.calls),
                key,
                generation,
            };
            let fut = f();

            tokio::spawn(async move {
                let outcome = fut.await;
                // later callers start a fresh flight from here on
                drop(guard);
                let _ = tx.send(outcome);
            });
        }

        flight.await
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.calls.contains_key(key)
    }
}

/// Removes the map entry when the flight ends, however it ends
///
/// The generation check keeps a late guard from removing a newer flight.
struct FlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    calls: Arc<DashMap<K, InFlight<V, E>>>,
    key: K,
    generation: u64,
}

impl<K, V, E> Drop for FlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.calls
            .remove_if(&self.key, |_, call| call.generation == self.generation);
    }
}
