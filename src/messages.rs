/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the messages exchanged between replicas.
//!
//! Everything here serializes with borsh, the library's wire format. The outermost type is
//! [`ReplicationMessage`]; [`Network`](crate::networking::Network) implementations move these
//! between peers without interpreting them. Inside, [`RegistryMessage`]s manage the star topology
//! (who replicates with whom, and full-state resync), while [`OperationMessage`]s carry the
//! [operations](crate::replication::operation::Operation) that keep the replicas' race logs
//! converging.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::procedure::ProcedureKind;
use crate::replication::operation::Operation;
use crate::types::basic::{NetworkAddress, RaceId, ReplicaId};
use crate::types::event::LogEvent;

/// The outermost message type sent between replicas.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub enum ReplicationMessage {
    RegistryMessage(RegistryMessage),
    OperationMessage(OperationMessage),
}

impl ReplicationMessage {
    pub fn operation(origin: ReplicaId, operation: Operation) -> ReplicationMessage {
        ReplicationMessage::OperationMessage(OperationMessage { origin, operation })
    }
}

/// Messages managing replica membership and full-state synchronization.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub enum RegistryMessage {
    /// A follower announces itself to the master. The master answers with a [`Resync`](Self::Resync)
    /// carrying the full current state.
    Register { replica: ReplicaInfo },
    /// A follower leaves the replication set. Best effort; the master also drops followers whose
    /// sends fail permanently.
    Deregister { replica_id: ReplicaId },
    /// A follower detected that incremental replication cannot proceed (e.g. an operation for a
    /// race it does not know) and asks for the full state.
    ResyncRequest { replica_id: ReplicaId },
    /// Full state transfer from the master. The receiver replaces its state wholesale.
    Resync { snapshot: Snapshot },
}

/// An operation forwarded between replicas. `origin` is the replica on which the operation was
/// originally performed; the master uses it to avoid echoing an operation back to its origin.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct OperationMessage {
    pub origin: ReplicaId,
    pub operation: Operation,
}

/// Identity and reachability of one replica.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct ReplicaInfo {
    pub id: ReplicaId,
    pub address: NetworkAddress,
}

/// The full replicable state of a server: every race with its complete event history. Revoked
/// events are included; revocation is part of the history, not a deletion from it.
#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct Snapshot {
    pub races: Vec<RaceSnapshot>,
}

#[derive(Clone, BorshDeserialize, BorshSerialize)]
pub struct RaceSnapshot {
    pub race_id: RaceId,
    pub procedure: ProcedureKind,
    pub events: Vec<LogEvent>,
}
