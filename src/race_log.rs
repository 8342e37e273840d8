/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The append-only, revocable race log.
//!
//! A [`RaceLog`] owns the ordered sequence of [`LogEvent`]s recorded for one race during one
//! officiating session. The log is only ever appended to, never truncated; decisions are undone
//! by appending [revoke events](crate::types::event::EventDetails::Revoke), which overlay the
//! history rather than rewriting it. This keeps reconstruction of race state deterministic: the
//! same event stream always produces the same set of
//! [unrevoked events](RaceLogReadGuard::unrevoked_events), with no external state consulted.
//!
//! ## Read locking
//!
//! Multiple committee-action threads and the replication worker mutate and read one log
//! concurrently, so the log keeps a readers-writer lock. Reads go through
//! [`RaceLog::lock_for_read`], which returns a guard carrying the whole query surface. The guard
//! releases the lock when dropped, on every exit path; because the queries exist only on the
//! guard, reading without the lock is a compile error rather than a runtime assertion.
//!
//! [`RaceLog::add`] takes the write lock, so a writer blocks until all read guards are dropped
//! and appends never interleave: the final log order is a well-defined total order.
//!
//! ## Revocation rule
//!
//! An event `E` is *revoked* iff some revoke `R` in the log targets `E.id`, `R`'s author is
//! [senior enough](crate::types::author::Author::can_revoke) for `E`'s author, and `R` is not
//! itself revoked by the same rule. A revoke by an insufficiently senior author is recorded but
//! has no effect on the unrevoked view: a policy no-op, not an error.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use crate::types::basic::{EventId, PassId, RaceId, TimePoint};
use crate::types::author::Author;
use crate::types::event::{EventDetails, LogEvent};

/// A callback invoked synchronously, on the appending thread, after an event was appended and the
/// write lock released. Callbacks must not append to the same log re-entrantly and must not block
/// indefinitely; long work belongs on another execution context.
pub type LogListenerPtr = Box<dyn Fn(&LogEvent) + Send>;

/// Returned by [`RaceLog::revoke_event`] when a revoke cannot be issued.
#[derive(Debug)]
pub enum NotRevokableError {
    /// The revoking author's priority is insufficient for the target event's author.
    InsufficientPriority {
        revoker: Author,
        target_author: Author,
    },
}

impl Display for NotRevokableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NotRevokableError::InsufficientPriority {
                revoker,
                target_author,
            } => write!(
                f,
                "revoke by {} does not have sufficient priority for event authored by {}",
                revoker, target_author
            ),
        }
    }
}

impl Error for NotRevokableError {}

struct RaceLogInner {
    events: Vec<LogEvent>,
    event_index_by_id: HashMap<EventId, usize>,
    current_pass: PassId,
}

impl RaceLogInner {
    /// Whether the event with the given index is revoked under the revocation rule. `path` holds
    /// the ids on the current revoke chain so that a (malformed) cyclic chain terminates.
    fn is_effectively_revoked(&self, target: &LogEvent, path: &mut HashSet<EventId>) -> bool {
        if !path.insert(target.id()) {
            return false;
        }
        let revoked = self.events.iter().any(|candidate| {
            candidate.revoked_event_id() == Some(target.id())
                && candidate.author().can_revoke(target.author())
                && !self.is_effectively_revoked(candidate, path)
        });
        path.remove(&target.id());
        revoked
    }

    fn is_revoked(&self, id: EventId) -> bool {
        match self.event_index_by_id.get(&id) {
            Some(index) => self.is_effectively_revoked(&self.events[*index], &mut HashSet::new()),
            None => false,
        }
    }
}

/// The append-only event log of one race. See the [module docs](self) for semantics.
pub struct RaceLog {
    race_id: RaceId,
    inner: RwLock<RaceLogInner>,
    listeners: Mutex<Vec<LogListenerPtr>>,
}

impl RaceLog {
    pub fn new(race_id: RaceId) -> RaceLog {
        RaceLog {
            race_id,
            inner: RwLock::new(RaceLogInner {
                events: Vec::new(),
                event_index_by_id: HashMap::new(),
                current_pass: PassId::FIRST,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn race_id(&self) -> RaceId {
        self.race_id
    }

    /// Appends an event to the end of the log. Returns `false`, leaving the log untouched, if an
    /// event with the same id is already present; this is what makes replicated appends safe
    /// under at-least-once delivery.
    ///
    /// An append is all-or-nothing: when this returns, the event is either fully in the log or
    /// not in it at all. Registered listeners are notified after the write lock is released,
    /// synchronously on the calling thread.
    pub fn add(&self, event: LogEvent) -> bool {
        if !self.append(&event) {
            return false;
        }
        let listeners = self
            .listeners
            .lock()
            .expect("race log listener list is poisoned");
        for listener in listeners.iter() {
            listener(&event);
        }
        true
    }

    /// Appends an event without notifying listeners. This is the restore path: events loaded
    /// from persistence or a replication snapshot do not re-trigger the state machinery that
    /// produced them.
    pub fn load(&self, event: LogEvent) -> bool {
        self.append(&event)
    }

    fn append(&self, event: &LogEvent) -> bool {
        {
            let mut inner = self
                .inner
                .write()
                .expect("race log is poisoned; a writer panicked while appending");
            if inner.event_index_by_id.contains_key(&event.id()) {
                log::debug!(
                    "{} was not added to race log {} because it already existed there",
                    event,
                    self.race_id
                );
                return false;
            }
            if let Some(revoked_id) = event.revoked_event_id() {
                // The target may legitimately be absent: with out-of-order delivery the revoke
                // can arrive before the event it revokes, and events are never removed, so the
                // target can still show up later.
                if let Some(target_index) = inner.event_index_by_id.get(&revoked_id) {
                    let target = &inner.events[*target_index];
                    if !event.author().can_revoke(target.author()) {
                        log::warn!(
                            "revoke {} by {} has insufficient priority for {}; recording it with no effect",
                            event.id(),
                            event.author(),
                            target
                        );
                    }
                } else {
                    log::warn!(
                        "revoke {} refers to event {} which is not (yet) in race log {}",
                        event.id(),
                        revoked_id,
                        self.race_id
                    );
                }
            }
            if let Some(pass_id) = event.pass_id() {
                if pass_id > inner.current_pass {
                    log::debug!("race log {} advancing to pass {}", self.race_id, pass_id);
                    inner.current_pass = pass_id;
                }
            }
            let index = inner.events.len();
            inner.events.push(event.clone());
            inner.event_index_by_id.insert(event.id(), index);
        }
        log::debug!("{} was added to race log {}", event, self.race_id);
        true
    }

    /// Issues a revoke of the event with id `target_id` on behalf of `author`, appending the
    /// revoke to the log.
    ///
    /// Fails if the target is present and `author` is not senior enough for its author. A target
    /// that is not (yet) present is tolerated: the revoke is recorded and takes effect if the
    /// target arrives later.
    pub fn revoke_event(
        &self,
        author: &Author,
        target_id: EventId,
        reason: String,
    ) -> Result<EventId, NotRevokableError> {
        let short_info = {
            let guard = self.lock_for_read();
            match guard.event_by_id(target_id) {
                Some(target) => {
                    if !author.can_revoke(target.author()) {
                        return Err(NotRevokableError::InsufficientPriority {
                            revoker: author.clone(),
                            target_author: target.author().clone(),
                        });
                    }
                    target.short_info()
                }
                None => String::from("(event not yet delivered)"),
            }
        };
        // Revoke events are independent of passes and logical times.
        let revoke = LogEvent::new(
            TimePoint::now(),
            author.clone(),
            None,
            EventDetails::Revoke {
                revoked_event_id: target_id,
                revoked_short_info: short_info,
                reason,
            },
        );
        let revoke_id = revoke.id();
        self.add(revoke);
        Ok(revoke_id)
    }

    /// Acquires the shared read lock and returns the guard carrying the query surface. Any
    /// number of readers may hold guards concurrently; [`add`](Self::add) blocks until all of
    /// them are dropped. May block while a writer holds the lock.
    pub fn lock_for_read(&self) -> RaceLogReadGuard {
        RaceLogReadGuard {
            inner: self
                .inner
                .read()
                .expect("race log is poisoned; a writer panicked while appending"),
        }
    }

    /// The currently active pass, i.e. the highest pass id any event in the log carries.
    pub fn current_pass(&self) -> PassId {
        self.lock_for_read().current_pass()
    }

    /// Raises the current pass to `pass` if it is higher. Pass ids only ever grow, so applying
    /// the same bump twice, or applying a stale bump, is a no-op.
    pub fn advance_pass_to(&self, pass: PassId) {
        let mut inner = self
            .inner
            .write()
            .expect("race log is poisoned; a writer panicked while appending");
        if pass > inner.current_pass {
            log::debug!("race log {} advancing to pass {}", self.race_id, pass);
            inner.current_pass = pass;
        }
    }

    /// Registers a listener notified about every appended event. See [`LogListenerPtr`] for the
    /// contract callbacks must honor.
    pub fn add_listener(&self, listener: LogListenerPtr) {
        self.listeners
            .lock()
            .expect("race log listener list is poisoned")
            .push(listener);
    }

    /// Clones the full event history, in append order. Used to build replication snapshots.
    pub fn events_snapshot(&self) -> Vec<LogEvent> {
        self.lock_for_read().events().cloned().collect()
    }
}

/// Scoped read access to a [`RaceLog`]. The view is stable for the lifetime of the guard, even
/// under concurrent [`RaceLog::add`] calls: a reader never observes a partially-appended event,
/// and appends made while any guard is held are deferred until all guards are dropped.
pub struct RaceLogReadGuard<'a> {
    inner: RwLockReadGuard<'a, RaceLogInner>,
}

impl<'a> RaceLogReadGuard<'a> {
    /// All events, in append order, including revoked events and revokes. Append order is log
    /// order; it is not logical-time order.
    pub fn events(&self) -> impl Iterator<Item = &LogEvent> {
        self.inner.events.iter()
    }

    /// All events in reverse append order.
    pub fn events_descending(&self) -> impl Iterator<Item = &LogEvent> {
        self.inner.events.iter().rev()
    }

    /// The events that are currently in effect: in append order, excluding revoke events
    /// themselves and every event revoked under the revocation rule.
    pub fn unrevoked_events(&self) -> Vec<&LogEvent> {
        self.inner
            .events
            .iter()
            .filter(|event| {
                !event.is_revoke()
                    && !self
                        .inner
                        .is_effectively_revoked(event, &mut HashSet::new())
            })
            .collect()
    }

    /// The unrevoked events relevant to the current pass: those tagged with the current pass id
    /// plus the pass-agnostic ones. Events of earlier passes stay in the full history but are
    /// excluded here.
    ///
    /// Unlike [`events`](Self::events), the result is ordered by logical time point, with ties
    /// broken by creation time and then by id. Append order differs between replicas for
    /// concurrently-recorded events, while this ordering is the same everywhere, so state folded
    /// over these events converges across replicas.
    pub fn current_pass_events(&self) -> Vec<&LogEvent> {
        let current_pass = self.inner.current_pass;
        let mut events: Vec<&LogEvent> = self
            .unrevoked_events()
            .into_iter()
            .filter(|event| match event.pass_id() {
                Some(pass_id) => pass_id == current_pass,
                None => true,
            })
            .collect();
        events.sort_by_key(|event| (event.logical_time_point(), event.created_at(), event.id()));
        events
    }

    pub fn event_by_id(&self, id: EventId) -> Option<&LogEvent> {
        self.inner
            .event_index_by_id
            .get(&id)
            .map(|index| &self.inner.events[*index])
    }

    /// Whether the event with the given id is revoked. Unknown ids are not revoked.
    pub fn is_revoked(&self, id: EventId) -> bool {
        self.inner.is_revoked(id)
    }

    pub fn current_pass(&self) -> PassId {
        self.inner.current_pass
    }

    pub fn len(&self) -> usize {
        self.inner.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.events.is_empty()
    }
}
