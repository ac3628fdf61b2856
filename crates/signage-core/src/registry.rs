//! Broadcast registry: the table of open push channels.
//!
//! One registry is constructed at startup and handed to the stream endpoint
//! (which registers channels) and to whatever needs to notify subscribers
//! (which fans frames out). Nothing is persisted; clients re-register after
//! a restart.
//!
//! # Delivery
//!
//! Delivery is best-effort and at-most-once. A failed write is the signal
//! that a channel is gone: the failure is logged, the channel is pruned and
//! the fan-out continues with the remaining channels. Callers never see a
//! per-channel error, only a [`Delivery`] summary they are free to ignore.
//!
//! # Locking
//!
//! The map sits behind a `std::sync::Mutex`. Matching sinks are cloned out
//! under the lock and written after it is released.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::events::StreamEvent;
use crate::frame::Frame;
use crate::ports::FrameSink;

/// Opaque registry key of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Outcome of one send or fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Channels that accepted the frame.
    pub delivered: usize,
    /// Channels whose write failed and were removed.
    pub pruned: usize,
}

/// Which channels a frame goes to.
#[derive(Debug, Clone, Copy)]
enum Selector<'a> {
    One(&'a ChannelId),
    Target(&'a str),
    All,
    AnyTarget,
}

impl Selector<'_> {
    fn matches(&self, id: &ChannelId, channel: &Channel) -> bool {
        match self {
            Self::One(wanted) => *wanted == id,
            Self::Target(wanted) => channel.target.as_deref() == Some(*wanted),
            Self::All => true,
            Self::AnyTarget => channel.target.is_some(),
        }
    }
}

#[derive(Debug)]
struct Channel {
    sink: Arc<dyn FrameSink>,
    /// Set once at registration, never changed.
    target: Option<String>,
    /// Distinguishes a re-registration under the same id from the entry a
    /// failed write was made against.
    generation: u64,
}

/// Process-wide table of open channels and the fan-out over it.
#[derive(Debug, Default)]
pub struct BroadcastRegistry {
    channels: Mutex<HashMap<ChannelId, Channel>>,
    next_generation: AtomicU64,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, Channel>> {
        // Entries are replaced atomically, so a poisoned map is still consistent
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a channel. Re-registering an id replaces the previous entry.
    ///
    /// An empty target is treated as no target (a controller channel).
    /// Returns the generation of the new entry for [`Self::unregister_if`].
    pub fn register(
        &self,
        id: ChannelId,
        sink: Arc<dyn FrameSink>,
        target: Option<String>,
    ) -> u64 {
        let target = target.filter(|t| !t.is_empty());
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        info!(
            channel_id = %id,
            target = target.as_deref().unwrap_or("-"),
            "Stream channel registered"
        );

        self.lock().insert(
            id,
            Channel {
                sink,
                target,
                generation,
            },
        );
        generation
    }

    /// Remove a channel. Returns whether an entry was present.
    pub fn unregister(&self, id: &ChannelId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            info!(channel_id = %id, "Stream channel unregistered");
        }
        removed
    }

    /// Remove a channel only if it is still the registration `generation`
    /// refers to. A newer entry under the same id is left alone.
    pub fn unregister_if(&self, id: &ChannelId, generation: u64) -> bool {
        let mut channels = self.lock();
        let current = channels.get(id).is_some_and(|c| c.generation == generation);
        if current {
            channels.remove(id);
            drop(channels);
            info!(channel_id = %id, "Stream channel unregistered");
        }
        current
    }

    /// Remove every channel.
    pub fn clear(&self) {
        let mut channels = self.lock();
        let dropped = channels.len();
        channels.clear();
        debug!(dropped, "Stream registry cleared");
    }

    // ========== Untyped sends ==========

    /// Write an event to exactly one channel, if it still exists.
    pub fn send_to_one<T: Serialize + ?Sized>(
        &self,
        id: &ChannelId,
        event: &str,
        payload: &T,
    ) -> Delivery {
        self.encode_and_deliver(Selector::One(id), event, payload)
    }

    /// Write an event to every channel registered for `target`.
    pub fn send_to_target<T: Serialize + ?Sized>(
        &self,
        target: &str,
        event: &str,
        payload: &T,
    ) -> Delivery {
        self.encode_and_deliver(Selector::Target(target), event, payload)
    }

    /// Write an event to every channel, controllers included.
    pub fn broadcast_all<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> Delivery {
        self.encode_and_deliver(Selector::All, event, payload)
    }

    /// Write an event to every channel that has a target.
    pub fn broadcast_to_targets<T: Serialize + ?Sized>(
        &self,
        event: &str,
        payload: &T,
    ) -> Delivery {
        self.encode_and_deliver(Selector::AnyTarget, event, payload)
    }

    // ========== Typed sends ==========

    pub fn emit_to_one(&self, id: &ChannelId, event: &StreamEvent) -> Delivery {
        self.emit(Selector::One(id), event)
    }

    pub fn emit_to_target(&self, target: &str, event: &StreamEvent) -> Delivery {
        self.emit(Selector::Target(target), event)
    }

    pub fn emit_all(&self, event: &StreamEvent) -> Delivery {
        self.emit(Selector::All, event)
    }

    // ========== Introspection ==========

    /// Number of open channels.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Number of channels with a target. A display with two open tabs
    /// counts twice; see [`Self::distinct_target_count`].
    pub fn target_count(&self) -> usize {
        self.lock().values().filter(|c| c.target.is_some()).count()
    }

    /// One entry per targeted channel, duplicates included.
    pub fn list_targets(&self) -> Vec<String> {
        self.lock()
            .values()
            .filter_map(|c| c.target.clone())
            .collect()
    }

    /// Number of different targets with at least one open channel.
    pub fn distinct_target_count(&self) -> usize {
        self.distinct_targets().len()
    }

    /// Sorted, deduplicated targets with at least one open channel.
    pub fn distinct_targets(&self) -> Vec<String> {
        self.lock()
            .values()
            .filter_map(|c| c.target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.lock().contains_key(id)
    }

    /// Target the channel was registered with, if it exists and has one.
    pub fn target_of(&self, id: &ChannelId) -> Option<String> {
        self.lock().get(id).and_then(|c| c.target.clone())
    }

    // ========== Fan-out ==========

    fn emit(&self, selector: Selector<'_>, event: &StreamEvent) -> Delivery {
        match event.to_frame() {
            Ok(frame) => self.deliver(selector, &frame),
            Err(e) => {
                warn!(event = event.event_name(), error = %e, "Failed to encode stream event");
                Delivery::default()
            }
        }
    }

    fn encode_and_deliver<T: Serialize + ?Sized>(
        &self,
        selector: Selector<'_>,
        event: &str,
        payload: &T,
    ) -> Delivery {
        match Frame::event(event, payload) {
            Ok(frame) => self.deliver(selector, &frame),
            Err(e) => {
                warn!(event, error = %e, "Failed to encode stream event");
                Delivery::default()
            }
        }
    }

    fn deliver(&self, selector: Selector<'_>, frame: &Frame) -> Delivery {
        let recipients: Vec<(ChannelId, u64, Arc<dyn FrameSink>)> = self
            .lock()
            .iter()
            .filter(|(id, channel)| selector.matches(id, channel))
            .map(|(id, channel)| (id.clone(), channel.generation, Arc::clone(&channel.sink)))
            .collect();

        let mut delivery = Delivery::default();
        let mut failed = Vec::new();

        for (id, generation, sink) in recipients {
            match sink.send_frame(frame.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(channel_id = %id, error = %e, "Stream write failed, pruning channel");
                    failed.push((id, generation));
                }
            }
        }

        if !failed.is_empty() {
            let mut channels = self.lock();
            for (id, generation) in failed {
                // Leave a newer registration under the same id alone
                if channels.get(&id).is_some_and(|c| c.generation == generation) {
                    channels.remove(&id);
                    delivery.pruned += 1;
                }
            }
        }

        debug!(
            ?selector,
            delivered = delivery.delivered,
            pruned = delivery.pruned,
            "Stream frame delivered"
        );
        delivery
    }
}
