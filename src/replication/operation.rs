/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Operations: the unit of replication.
//!
//! Every local mutation of replicated state is captured as an [`Operation`] and shipped to the
//! other replicas, which apply it to their own state. Operations are designed so that replicas
//! converge despite concurrent mutation and at-least-once delivery:
//!
//! - Applying an operation is **idempotent**. Appending an event whose id is already in the log
//!   is rejected, and raising the pass counter is a monotonic maximum, so duplicated delivery
//!   changes nothing.
//! - Where idempotence alone is not enough, a concurrent pair is reconciled by
//!   [`Operation::transform`], in the manner of operational transformation: the incoming
//!   operation is rewritten against the one that was already applied such that both replicas end
//!   up in the same state regardless of application order.
//!
//! Operations an applier received from elsewhere are normally not replicated onward by that
//! applier, because every replica that needs them receives them from the origin's master
//! directly. The exception is governed by
//! [`requires_explicit_transitive_replication`](Operation::requires_explicit_transitive_replication):
//! in a star topology the master must forward such operations from one follower to the others.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::procedure::ProcedureKind;
use crate::types::basic::{PassId, RaceId};
use crate::types::event::LogEvent;

/// One replicable mutation of a server's race state.
#[derive(Clone, Debug, BorshDeserialize, BorshSerialize)]
pub enum Operation {
    /// A race was created. Applying this for an already-known race id is a no-op.
    CreateRace {
        race_id: RaceId,
        procedure: ProcedureKind,
    },
    /// Events were appended to a race's log. Carries full events; the receiver appends them
    /// through the log's duplicate-id rejection.
    AppendEvents {
        race_id: RaceId,
        events: Vec<LogEvent>,
    },
    /// The race advanced to a new start attempt. Applying raises the receiver's pass counter to
    /// `new_pass` if it is higher.
    AdvancePass { race_id: RaceId, new_pass: PassId },
}

impl Operation {
    pub fn race_id(&self) -> RaceId {
        match self {
            Operation::CreateRace { race_id, .. } => *race_id,
            Operation::AppendEvents { race_id, .. } => *race_id,
            Operation::AdvancePass { race_id, .. } => *race_id,
        }
    }

    /// Whether a master that applied this operation from one follower must forward it to the
    /// other followers.
    ///
    /// `AdvancePass` does not need forwarding: the pass increment is also carried by the
    /// `AppendEvents` of the status-change event that began the new pass, which does get
    /// forwarded, and the pass counter is a monotonic maximum over both sources.
    pub fn requires_explicit_transitive_replication(&self) -> bool {
        match self {
            Operation::CreateRace { .. } => true,
            Operation::AppendEvents { .. } => true,
            Operation::AdvancePass { .. } => false,
        }
    }

    /// Rewrites `self`, an incoming operation performed concurrently with `applied`, against
    /// `applied` so that applying the result after `applied` converges with the opposite order.
    ///
    /// Only concurrent `AdvancePass` pairs on the same race need rewriting: both sides must
    /// settle on the higher pass. Every other pair commutes already because application is
    /// idempotent and appends are keyed by event id.
    pub fn transform(self, applied: &Operation) -> Operation {
        match (&self, applied) {
            (
                Operation::AdvancePass { race_id, new_pass },
                Operation::AdvancePass {
                    race_id: applied_race_id,
                    new_pass: applied_pass,
                },
            ) if race_id == applied_race_id => Operation::AdvancePass {
                race_id: *race_id,
                new_pass: PassId::new(new_pass.int().max(applied_pass.int())),
            },
            _ => self,
        }
    }
}
