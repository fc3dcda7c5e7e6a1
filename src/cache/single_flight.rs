//! Single-flight registry for shared fetches
//!
//! ## How it works
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► in_flight[key] ──► one spawned fetch ──► broadcast result
//! caller C ──┘        (waiters: 3)
//! ```
//!
//! The first caller for a key spawns the fetch; later callers attach to its
//! broadcast channel. The entry is removed before the result is sent, so a
//! caller arriving afterwards starts a new fetch instead of waiting on a
//! finished one. When every attached waiter has dropped, the fetch is aborted.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::gateway::ClientError;

/// The shared fetch ended without producing a result
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("shared fetch was cancelled before completing")]
pub struct FlightAborted;

impl From<FlightAborted> for ClientError {
    fn from(err: FlightAborted) -> Self {
        ClientError::generic(err.to_string())
    }
}

struct InFlight<V, E> {
    sender: broadcast::Sender<Result<V, E>>,
    waiters: usize,
    abort: AbortHandle,
    id: u64,
    started_at: Instant,
}

type Registry<V, E> = Arc<DashMap<String, InFlight<V, E>>>;

/// Registry of in-flight fetches keyed by entity
pub struct SingleFlight<V, E> {
    in_flight: Registry<V, E>,
    next_id: AtomicU64,
}

impl<V, E> SingleFlight<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + From<FlightAborted> + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run `fetch` for `key`, or wait on the fetch already running for it
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.join(key, fetch).wait().await
    }

    /// Register interest in `key`, spawning `fetch` if nothing is in flight.
    ///
    /// `fetch` is only called when this caller starts the flight.
    pub fn join<F, Fut>(&self, key: &str, fetch: F) -> Waiter<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let flight = occupied.get_mut();
                flight.waiters += 1;
                debug!(key = %key, waiters = flight.waiters, "Coalesced onto in-flight fetch");
                let receiver = flight.sender.subscribe();
                let id = flight.id;
                self.waiter(key, id, receiver)
            }
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = broadcast::channel(1);

                let completion = Completion {
                    registry: self.in_flight.clone(),
                    key: key.to_string(),
                    id,
                };
                let result_sender = sender.clone();
                let future = fetch();
                let handle = tokio::spawn(async move {
                    let result = future.await;
                    drop(completion);
                    let _ = result_sender.send(result);
                });

                vacant.insert(InFlight {
                    sender,
                    waiters: 1,
                    abort: handle.abort_handle(),
                    id,
                    started_at: Instant::now(),
                });
                debug!(key = %key, "Started shared fetch");
                self.waiter(key, id, receiver)
            }
        }
    }

    /// Attach to the fetch running for `key`, if any
    pub fn attach(&self, key: &str) -> Option<Waiter<V, E>> {
        let mut flight = self.in_flight.get_mut(key)?;
        flight.waiters += 1;
        let receiver = flight.sender.subscribe();
        let id = flight.id;
        drop(flight);
        Some(self.waiter(key, id, receiver))
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Age of the fetch running for `key`
    pub fn elapsed(&self, key: &str) -> Option<Duration> {
        self.in_flight.get(key).map(|f| f.started_at.elapsed())
    }

    fn waiter(&self, key: &str, id: u64, receiver: broadcast::Receiver<Result<V, E>>) -> Waiter<V, E> {
        Waiter {
            receiver,
            guard: WaiterGuard {
                registry: self.in_flight.clone(),
                key: key.to_string(),
                id,
                finished: false,
            },
        }
    }
}

impl<V, E> Default for SingleFlight<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + From<FlightAborted> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Waiters
// ============================================================================

/// Handle on a shared fetch; dropping it withdraws interest
pub struct Waiter<V, E> {
    receiver: broadcast::Receiver<Result<V, E>>,
    guard: WaiterGuard<V, E>,
}

impl<V: Clone, E: Clone + From<FlightAborted>> Waiter<V, E> {
    pub async fn wait(mut self) -> Result<V, E> {
        let result = match self.receiver.recv().await {
            Ok(result) => result,
            Err(_) => Err(E::from(FlightAborted)),
        };
        self.guard.finished = true;
        result
    }
}

struct WaiterGuard<V, E> {
    registry: Registry<V, E>,
    key: String,
    id: u64,
    finished: bool,
}

impl<V, E> Drop for WaiterGuard<V, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let abandoned = match self.registry.get_mut(&self.key) {
            Some(mut flight) if flight.id == self.id => {
                flight.waiters = flight.waiters.saturating_sub(1);
                flight.waiters == 0
            }
            _ => false,
        };

        if abandoned {
            let id = self.id;
            if let Some((_, flight)) = self
                .registry
                .remove_if(&self.key, |_, f| f.id == id && f.waiters == 0)
            {
                flight.abort.abort();
                debug!(key = %self.key, "Aborted shared fetch with no remaining waiters");
            }
        }
    }
}

/// Removes the registry entry when the fetch task finishes or unwinds
struct Completion<V, E> {
    registry: Registry<V, E>,
    key: String,
    id: u64,
}

impl<V, E> Drop for Completion<V, E> {
    fn drop(&mut self) {
        let id = self.id;
        self.registry.remove_if(&self.key, |_, f| f.id == id);
    }
}
