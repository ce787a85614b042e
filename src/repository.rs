//! Cache facade: the only component callers talk to.
//!
//! A [`Repository`] combines a memory cache, a table of pending requests, a
//! [`Generator`] and a [`PersistentStore`]. [`Repository::get`] answers
//! synchronously from memory or hands out the profile placeholder, and
//! arranges for the caller's consumer to be called once the real rendition
//! exists.
//!
//! # Key lifecycle
//!
//! ```text
//! NotRequested ──get──► Pending(subscribers) ──job done──► Completed
//!                            ▲                               │
//!                            └──────── get(force) ───────────┘
//! ```
//!
//! - **Completed** keys are served from memory without scheduling anything.
//! - **Pending** keys collect subscribers; only the request that created the
//!   pending entry schedules a job, so concurrent requests coalesce.
//! - A forced refresh of a completed key starts a new job; until it lands,
//!   non-forced requests keep getting the stale cached value.
//!
//! # Locking
//!
//! The memory cache, the pending table and the statistics live behind a
//! single mutex. Lookup, subscriber registration and the decision to schedule
//! a job happen in one critical section. The lock is never held across I/O,
//! decoding, or consumer callbacks.
//!
//! # Persistent read-through
//!
//! `get` never touches the store; it must not block. Instead, a job's first
//! step on the worker is to look in the store, and a hit completes the
//! pending request exactly like a generated result would. A forced refresh
//! marks the pending request *fresh*, which rules out completing it from the
//! store: forced requests that coalesce into an in-flight job still receive
//! a freshly decoded rendition.
//!
//! # Delivery
//!
//! Completion writes through to the store, then publishes to memory and
//! detaches the subscribers atomically, then calls each subscriber once on
//! the worker thread. A panicking consumer is logged and does not stop
//! delivery to the others.

use crate::generator::{CompletionSink, Generator, GeneratorError, Job, panic_message};
use crate::imaging::ImageBackend;
use crate::key::{Key, KeyError};
use crate::profile::{DerivativeKind, Profile};
use crate::rendition::{Origin, Rendition};
use crate::store::{PersistentStore, StoreError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Callback invoked once with the finished rendition, on a worker thread.
pub type Consumer = Box<dyn FnOnce(&Key, &Rendition) + Send + 'static>;

/// A finished rendition, as sent by [`channel_consumer`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub key: Key,
    pub rendition: Rendition,
}

/// Consumer that forwards the delivery over a channel, for callers that
/// want to pick results up on their own thread.
pub fn channel_consumer(tx: Sender<Delivery>) -> impl FnOnce(&Key, &Rendition) + Send + 'static {
    move |key, rendition| {
        let delivery = Delivery {
            key: key.clone(),
            rendition: rendition.clone(),
        };
        if tx.send(delivery).is_err() {
            debug!(key = %key, "delivery receiver dropped");
        }
    }
}

/// Summary of repository activity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from memory.
    pub hits: u64,
    /// Requests that scheduled a job.
    pub misses: u64,
    /// Requests that joined an already pending job.
    pub coalesced: u64,
    /// Jobs completed from the persistent store.
    pub restored: u64,
    /// Jobs completed by rendering.
    pub generated: u64,
    /// Jobs that fell back to the placeholder.
    pub failed: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.coalesced
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached, {} restored, {} generated",
            self.hits, self.restored, self.generated
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.coalesced > 0 {
            write!(f, ", {} coalesced", self.coalesced)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

/// In-flight generation for one key.
struct PendingRequest {
    subscribers: Vec<Consumer>,
    /// Set by forced refreshes; forbids completion from the store.
    fresh: bool,
}

#[derive(Default)]
struct State {
    memory: HashMap<Key, Rendition>,
    pending: HashMap<Key, PendingRequest>,
    stats: CacheStats,
}

struct Shared {
    kind: DerivativeKind,
    placeholder: Rendition,
    apply_orientation: bool,
    state: Mutex<State>,
    store: Arc<dyn PersistentStore>,
    generator: Generator,
}

/// Derivative-image cache for one profile. Cheap to clone; clones share
/// the same caches and worker pool.
#[derive(Clone)]
pub struct Repository {
    shared: Arc<Shared>,
}

impl Repository {
    /// Build a repository with its store injected and its worker pool started.
    pub fn new(
        profile: Profile,
        store: Arc<dyn PersistentStore>,
        backend: Arc<dyn ImageBackend>,
    ) -> Result<Self, RepositoryError> {
        let generator = Generator::new(
            profile.kind.as_str(),
            profile.workers,
            backend,
            profile.filter,
            profile.placeholder.clone(),
        )?;
        debug!(kind = %profile.kind, workers = generator.workers(), "repository ready");
        Ok(Self {
            shared: Arc::new(Shared {
                kind: profile.kind,
                placeholder: profile.placeholder,
                apply_orientation: profile.apply_orientation,
                state: Mutex::new(State::default()),
                store,
                generator,
            }),
        })
    }

    pub fn kind(&self) -> DerivativeKind {
        self.shared.kind
    }

    pub fn placeholder(&self) -> &Rendition {
        &self.shared.placeholder
    }

    /// Return the cached rendition for `key`, or the placeholder while one is
    /// generated in the background.
    ///
    /// - Memory hit and `force_refresh == false`: the cached rendition is
    ///   returned and `consumer` is dropped without being called.
    /// - Otherwise `consumer` is subscribed to the key's pending request and
    ///   will be called exactly once; a job is scheduled only if no request
    ///   for the key is already pending.
    ///
    /// Never blocks on I/O or decoding.
    pub fn get<C>(
        &self,
        key: &Key,
        force_refresh: bool,
        consumer: C,
    ) -> Result<Rendition, RequestError>
    where
        C: FnOnce(&Key, &Rendition) + Send + 'static,
    {
        key.validate()?;
        let shared = &self.shared;

        let schedule = {
            let mut state = shared.lock();
            if !force_refresh && let Some(hit) = state.memory.get(key) {
                let hit = hit.clone();
                state.stats.hits += 1;
                return Ok(hit);
            }

            let State { pending, stats, .. } = &mut *state;
            match pending.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    let request = entry.get_mut();
                    request.subscribers.push(Box::new(consumer));
                    request.fresh |= force_refresh;
                    stats.coalesced += 1;
                    debug!(
                        kind = %shared.kind,
                        key = %key,
                        subscribers = request.subscribers.len(),
                        "coalesced into pending request"
                    );
                    false
                }
                Entry::Vacant(entry) => {
                    entry.insert(PendingRequest {
                        subscribers: vec![Box::new(consumer) as Consumer],
                        fresh: force_refresh,
                    });
                    stats.misses += 1;
                    true
                }
            }
        };

        if schedule {
            debug!(kind = %shared.kind, key = %key, force_refresh, "scheduling job");
            let job = Job {
                key: key.clone(),
                apply_orientation: shared.apply_orientation,
            };
            shared.generator.submit(job, Arc::clone(shared) as Arc<dyn CompletionSink>);
        }

        Ok(shared.placeholder.clone())
    }

    /// The memory-cached rendition for `key`, if any. Never schedules work.
    pub fn peek(&self, key: &Key) -> Option<Rendition> {
        self.shared.lock().memory.get(key).cloned()
    }

    /// Whether a job for `key` is in flight.
    pub fn is_pending(&self, key: &Key) -> bool {
        self.shared.lock().pending.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats.clone()
    }

    /// Trim the persistent store to at most `max_entries`, oldest first.
    pub fn trim(&self, max_entries: usize) -> Result<usize, StoreError> {
        let evicted = self.shared.store.trim(max_entries)?;
        info!(kind = %self.shared.kind, evicted, max_entries, "persistent store trimmed");
        Ok(evicted)
    }

    /// Close the persistent store. In-flight jobs still complete and notify
    /// their subscribers; their write-through fails and is logged.
    pub fn close(&self) -> Result<(), StoreError> {
        self.shared.store.close()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Consumers run outside the lock, so poisoning can only come from a
        // bug in this module; the maps are still structurally sound.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `rendition` for `key` and detach its subscribers.
    fn publish(&self, key: &Key, rendition: &Rendition) -> Vec<Consumer> {
        let mut state = self.lock();
        match rendition.origin() {
            Origin::Generated => state.stats.generated += 1,
            Origin::Restored => state.stats.restored += 1,
            Origin::Placeholder => state.stats.failed += 1,
        }
        // Failures are not cached so a later request retries
        if !rendition.is_placeholder() {
            state.memory.insert(key.clone(), rendition.clone());
        }
        state
            .pending
            .remove(key)
            .map(|request| request.subscribers)
            .unwrap_or_default()
    }

    fn notify(&self, key: &Key, rendition: &Rendition, subscribers: Vec<Consumer>) {
        for consumer in subscribers {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| consumer(key, rendition)));
            if let Err(payload) = delivered {
                error!(
                    kind = %self.kind,
                    key = %key,
                    panic = panic_message(payload.as_ref()),
                    "consumer panicked"
                );
            }
        }
    }

    fn is_fresh(&self, key: &Key) -> bool {
        self.lock().pending.get(key).is_some_and(|p| p.fresh)
    }
}

impl CompletionSink for Shared {
    fn complete_from_store(&self, job: &Job) -> bool {
        if self.is_fresh(&job.key) {
            return false;
        }

        let image = match self.store.load(&job.key) {
            Ok(Some(image)) => image,
            Ok(None) => return false,
            Err(e) => {
                warn!(kind = %self.kind, key = %job.key, error = %e, "store load failed");
                return false;
            }
        };
        let rendition = Rendition::restored(image);

        let subscribers = {
            let mut state = self.lock();
            // A forced refresh may have joined while we were reading
            if state.pending.get(&job.key).is_some_and(|p| p.fresh) {
                return false;
            }
            state.stats.restored += 1;
            state.memory.insert(job.key.clone(), rendition.clone());
            state
                .pending
                .remove(&job.key)
                .map(|request| request.subscribers)
                .unwrap_or_default()
        };
        debug!(kind = %self.kind, key = %job.key, "restored from store");
        self.notify(&job.key, &rendition, subscribers);
        true
    }

    fn on_generated(&self, key: Key, rendition: Rendition) {
        if rendition.origin() == Origin::Generated
            && let Err(e) = self.store.save(&key, rendition.image())
        {
            warn!(kind = %self.kind, key = %key, error = %e, "store save failed, keeping in memory only");
        }
        let subscribers = self.publish(&key, &rendition);
        self.notify(&key, &rendition, subscribers);
    }
}
