/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The replicated race store: the state both masters and followers keep, and the single place
//! where [operations](super::operation) are applied to it.
//!
//! Applying an operation locally and applying the same operation received from a peer go through
//! different log paths on purpose: local mutations use [`RaceLog::add`], which notifies the
//! listeners that capture operations for replication, while replicated applies use
//! [`RaceLog::load`], which does not, so an operation never echoes back onto the wire from the
//! replica that merely applied it.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use crate::event_handlers::EventHandlers;
use crate::messages::{RaceSnapshot, Snapshot};
use crate::procedure::{procedure_for, ProcedureKind, RaceStateMachine};
use crate::race_log::RaceLog;
use crate::replication::operation::Operation;
use crate::types::author::Author;
use crate::types::basic::RaceId;

/// A handle on one race of the store: its log and its state machine. Cloning clones the handle,
/// not the race.
#[derive(Clone)]
pub struct RaceEntry {
    pub(crate) kind: ProcedureKind,
    pub(crate) log: Arc<RaceLog>,
    pub(crate) machine: Arc<Mutex<RaceStateMachine>>,
}

impl RaceEntry {
    pub fn procedure_kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn log(&self) -> Arc<RaceLog> {
        self.log.clone()
    }

    /// Locks this race's state machine for inspection or committee actions. Hold the guard only
    /// for the duration of the call; replication applies block on it.
    pub fn lock_machine(&self) -> MutexGuard<'_, RaceStateMachine> {
        self.machine
            .lock()
            .expect("race state machine is poisoned; a committee action panicked")
    }
}

/// Returned by [`RaceStore::apply`] when an operation refers to state the store does not have.
/// Followers react by requesting a full resync.
#[derive(Debug)]
pub(crate) enum ApplyError {
    UnknownRace { race_id: RaceId },
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::UnknownRace { race_id } => {
                write!(f, "operation refers to unknown race {}", race_id)
            }
        }
    }
}

impl Error for ApplyError {}

/// All races of one server, keyed by race id.
pub(crate) struct RaceStore {
    races: RwLock<HashMap<RaceId, RaceEntry>>,
    author: Author,
    prerequisite_deadline: Duration,
    handlers: Arc<EventHandlers>,
    /// Local mutations are captured as operations and queued here for the replication worker.
    operation_sender: Sender<Operation>,
}

impl RaceStore {
    pub(crate) fn new(
        author: Author,
        prerequisite_deadline: Duration,
        handlers: Arc<EventHandlers>,
        operation_sender: Sender<Operation>,
    ) -> RaceStore {
        RaceStore {
            races: RwLock::new(HashMap::new()),
            author,
            prerequisite_deadline,
            handlers,
            operation_sender,
        }
    }

    /// Creates a race, or returns the existing entry if the id is already known. Idempotence
    /// here is what makes a replicated `CreateRace` safe under duplicated delivery.
    pub(crate) fn create_race(&self, race_id: RaceId, kind: ProcedureKind) -> RaceEntry {
        let mut races = self
            .races
            .write()
            .expect("race store is poisoned; a writer panicked");
        if let Some(entry) = races.get(&race_id) {
            return entry.clone();
        }
        let entry = self.make_entry(race_id, kind);
        races.insert(race_id, entry.clone());
        entry
    }

    pub(crate) fn race(&self, race_id: RaceId) -> Option<RaceEntry> {
        self.races
            .read()
            .expect("race store is poisoned; a writer panicked")
            .get(&race_id)
            .cloned()
    }

    pub(crate) fn races(&self) -> Vec<RaceEntry> {
        self.races
            .read()
            .expect("race store is poisoned; a writer panicked")
            .values()
            .cloned()
            .collect()
    }

    /// Applies a replicated operation. See the [module docs](self) for why this never notifies
    /// log listeners.
    pub(crate) fn apply(&self, operation: &Operation) -> Result<(), ApplyError> {
        match operation {
            Operation::CreateRace { race_id, procedure } => {
                self.create_race(*race_id, *procedure);
                Ok(())
            }
            Operation::AppendEvents { race_id, events } => {
                let entry = self.race(*race_id).ok_or(ApplyError::UnknownRace {
                    race_id: *race_id,
                })?;
                for event in events {
                    entry.log.load(event.clone());
                }
                entry.lock_machine().reevaluate();
                Ok(())
            }
            Operation::AdvancePass { race_id, new_pass } => {
                let entry = self.race(*race_id).ok_or(ApplyError::UnknownRace {
                    race_id: *race_id,
                })?;
                entry.log.advance_pass_to(*new_pass);
                entry.lock_machine().reevaluate();
                Ok(())
            }
        }
    }

    /// The full replicable state, for answering resyncs.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let races = self
            .races
            .read()
            .expect("race store is poisoned; a writer panicked");
        Snapshot {
            races: races
                .values()
                .map(|entry| RaceSnapshot {
                    race_id: entry.log.race_id(),
                    procedure: entry.kind,
                    events: entry.log.events_snapshot(),
                })
                .collect(),
        }
    }

    /// Replaces the store's state wholesale with a snapshot received from the master.
    pub(crate) fn install_snapshot(&self, snapshot: Snapshot) {
        let mut races = self
            .races
            .write()
            .expect("race store is poisoned; a writer panicked");
        races.clear();
        for race in snapshot.races {
            let entry = self.make_entry(race.race_id, race.procedure);
            for event in race.events {
                entry.log.load(event);
            }
            entry.lock_machine().reevaluate();
            races.insert(race.race_id, entry);
        }
    }

    fn make_entry(&self, race_id: RaceId, kind: ProcedureKind) -> RaceEntry {
        let log = Arc::new(RaceLog::new(race_id));
        let sender = self.operation_sender.clone();
        log.add_listener(Box::new(move |event| {
            let _ = sender.send(Operation::AppendEvents {
                race_id,
                events: vec![event.clone()],
            });
        }));
        let machine = RaceStateMachine::with_handlers(
            log.clone(),
            procedure_for(kind),
            self.author.clone(),
            self.prerequisite_deadline,
            self.handlers.clone(),
        );
        RaceEntry {
            kind,
            log,
            machine: Arc::new(Mutex::new(machine)),
        }
    }
}
