//! Coordination for commands that suspend until a key receives data.
//!
//! One [`WaiterRegistry`] exists per blocking family (lists, streams). A blocking call
//! creates a single [`Resolver`] and registers one [`Waiter`] per watched key, all
//! sharing it. Whoever claims the resolver first, a producer or the call itself,
//! is the only one allowed to deliver.
//!
//! Registration and delivery both happen while the watched key's record lock in the
//! store is held, so a write landing between a caller's emptiness check and its
//! registration is never missed. Lock order is always store entry, then registry.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::key_value_store::{
    list::{self, List, ListEnd},
    StreamEntry, StreamEntryId, StreamRecord,
};

pub type WaiterId = u64;

/// A list waiter receives `(key, element)`.
pub type ListDelivery = (String, String);

/// A stream waiter receives the key and every entry after its watermark.
pub type StreamDelivery = (String, Vec<StreamEntry>);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockingTimeout {
    Forever,
    After(Duration),
}

impl BlockingTimeout {
    /// BLPOP style timeout. Zero blocks forever; negative values are rejected.
    pub fn from_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }

        if seconds == 0.0 {
            return Some(BlockingTimeout::Forever);
        }

        Some(BlockingTimeout::After(Duration::from_secs_f64(seconds)))
    }

    /// XREAD BLOCK style timeout.
    pub fn from_millis(milliseconds: u64) -> Self {
        match milliseconds {
            0 => BlockingTimeout::Forever,
            milliseconds => BlockingTimeout::After(Duration::from_millis(milliseconds)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitCondition {
    /// Satisfied by any element; takes it from this end.
    Pop(ListEnd),
    /// Satisfied by any entry with a greater ID.
    EntriesAfter(StreamEntryId),
}

/// Single-assignment slot shared by all waiters of one blocking call.
pub struct Resolver<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Resolver<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();

        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            receiver,
        )
    }

    /// Takes the right to deliver. Returns `None` once someone else has it.
    pub fn claim(&self) -> Option<oneshot::Sender<T>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

pub struct Waiter<T> {
    id: WaiterId,
    condition: WaitCondition,
    resolver: Resolver<T>,
}

pub struct WaiterRegistry<T> {
    queues: DashMap<String, VecDeque<Waiter<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for WaiterRegistry<T> {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> WaiterRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> WaiterId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Appends a waiter to the back of `key`'s queue.
    pub fn register(
        &self,
        key: &str,
        id: WaiterId,
        condition: WaitCondition,
        resolver: &Resolver<T>,
    ) {
        self.queues
            .entry(key.to_string())
            .or_default()
            .push_back(Waiter {
                id,
                condition,
                resolver: resolver.clone(),
            });
    }

    pub fn deregister(&self, key: &str, id: WaiterId) {
        let drained = match self.queues.get_mut(key) {
            Some(mut queue) => {
                queue.retain(|waiter| waiter.id != id);
                queue.is_empty()
            }
            None => false,
        };

        if drained {
            self.queues.remove_if(key, |_, queue| queue.is_empty());
        }
    }

    /// Number of waiters queued on `key`.
    pub fn waiting(&self, key: &str) -> usize {
        self.queues.get(key).map_or(0, |queue| queue.len())
    }
}

impl WaiterRegistry<ListDelivery> {
    /// Hands elements of `list` to queued waiters in arrival order, one element per
    /// waiter. Must run under `key`'s record lock. Returns the end each delivered
    /// element was taken from.
    pub fn serve_list(&self, key: &str, list: &mut List) -> Vec<ListEnd> {
        let mut served = Vec::new();

        let Some(mut queue) = self.queues.get_mut(key) else {
            return served;
        };

        while !list.is_empty() {
            let Some(waiter) = queue.pop_front() else {
                break;
            };

            let WaitCondition::Pop(end) = waiter.condition else {
                continue;
            };

            // Already resolved through another key, or timed out.
            let Some(sender) = waiter.resolver.claim() else {
                continue;
            };

            let Some(value) = list::pop_one(list, end) else {
                break;
            };

            match sender.send((key.to_string(), value)) {
                Ok(()) => served.push(end),
                Err((_, value)) => list::restore(list, end, value),
            }
        }

        let drained = queue.is_empty();
        drop(queue);

        if drained {
            self.queues.remove_if(key, |_, queue| queue.is_empty());
        }

        served
    }
}

impl WaiterRegistry<StreamDelivery> {
    /// Resolves every waiter whose watermark is below the stream's last ID with all
    /// entries after that watermark. Must run under `key`'s record lock.
    pub fn serve_stream(&self, key: &str, stream: &StreamRecord) {
        let drained = match self.queues.get_mut(key) {
            Some(mut queue) => {
                queue.retain(|waiter| {
                    let WaitCondition::EntriesAfter(watermark) = waiter.condition else {
                        return true;
                    };

                    let entries = stream.entries_after(watermark);

                    if entries.is_empty() {
                        return true;
                    }

                    if let Some(sender) = waiter.resolver.claim() {
                        let _ = sender.send((key.to_string(), entries));
                    }

                    false
                });

                queue.is_empty()
            }
            None => false,
        };

        if drained {
            self.queues.remove_if(key, |_, queue| queue.is_empty());
        }
    }
}

/// Every key one blocking call is registered on. Dropping it deregisters them all,
/// which covers timeouts, errors and the caller's future being cancelled.
pub struct Registration<'a, T> {
    registry: &'a WaiterRegistry<T>,
    id: WaiterId,
    keys: Vec<String>,
}

impl<'a, T> Registration<'a, T> {
    pub fn new(registry: &'a WaiterRegistry<T>) -> Self {
        Self {
            registry,
            id: registry.next_id(),
            keys: Vec::new(),
        }
    }

    pub fn register(&mut self, key: &str, condition: WaitCondition, resolver: &Resolver<T>) {
        self.registry.register(key, self.id, condition, resolver);
        self.keys.push(key.to_string());
    }
}

impl<T> Drop for Registration<'_, T> {
    fn drop(&mut self) {
        for key in &self.keys {
            self.registry.deregister(key, self.id);
        }
    }
}
