/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The master side of the star-topology replication protocol.
//!
//! The master is the hub: followers register with it, receive a full-state
//! [snapshot](crate::messages::Snapshot) on registration or on request, and from then on
//! exchange [operations](super::operation) with it. The master applies operations it receives,
//! forwards the ones that [require transitive
//! replication](super::operation::Operation::requires_explicit_transitive_replication) to the
//! other followers, and broadcasts the operations its own local mutations produce.
//!
//! Before applying an operation from a follower, the master transforms it against the pass
//! counter it has already reached for that race, so that two start attempts begun concurrently
//! on different replicas settle on the same pass everywhere.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::messages::{OperationMessage, RegistryMessage, ReplicaInfo, ReplicationMessage};
use crate::networking::Network;
use crate::replication::operation::Operation;
use crate::replication::replica::RaceStore;
use crate::types::basic::{ReplicaId, TimePoint};

pub(crate) struct Master<N: Network> {
    store: Arc<RaceStore>,
    network: N,
    me: ReplicaInfo,
    followers: HashMap<ReplicaId, (ReplicaInfo, TimePoint)>,
    registry_receiver: Receiver<(ReplicaId, RegistryMessage)>,
    operation_receiver: Receiver<(ReplicaId, OperationMessage)>,
    local_operations: Receiver<Operation>,
    shutdown_signal: Receiver<()>,
}

impl<N: Network + 'static> Master<N> {
    pub(crate) fn new(
        store: Arc<RaceStore>,
        network: N,
        me: ReplicaInfo,
        registry_receiver: Receiver<(ReplicaId, RegistryMessage)>,
        operation_receiver: Receiver<(ReplicaId, OperationMessage)>,
        local_operations: Receiver<Operation>,
        shutdown_signal: Receiver<()>,
    ) -> Master<N> {
        Master {
            store,
            network,
            me,
            followers: HashMap::new(),
            registry_receiver,
            operation_receiver,
            local_operations,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("Master thread disconnected from main thread")
                }
            }

            let mut progressed = false;

            while let Ok((origin, msg)) = self.registry_receiver.try_recv() {
                self.on_registry_message(origin, msg);
                progressed = true;
            }

            while let Ok((_, msg)) = self.operation_receiver.try_recv() {
                self.on_operation_message(msg);
                progressed = true;
            }

            while let Ok(operation) = self.local_operations.try_recv() {
                self.network.broadcast(ReplicationMessage::operation(
                    self.me.id,
                    operation,
                ));
                progressed = true;
            }

            if !progressed {
                thread::yield_now()
            }
        })
    }

    fn on_registry_message(&mut self, origin: ReplicaId, msg: RegistryMessage) {
        match msg {
            RegistryMessage::Register { replica } => {
                log::info!("follower {} registered with master {}", replica.id, self.me.id);
                self.network.update_peer(replica.clone(), true);
                self.followers
                    .insert(replica.id, (replica.clone(), TimePoint::now()));
                self.send_resync(replica.id);
            }
            RegistryMessage::Deregister { replica_id } => {
                if let Some((replica, registered_at)) = self.followers.remove(&replica_id) {
                    log::info!(
                        "follower {} deregistered after {}s",
                        replica_id,
                        (TimePoint::now().millis() - registered_at.millis()) / 1000
                    );
                    self.network.update_peer(replica, false);
                }
            }
            RegistryMessage::ResyncRequest { replica_id } => {
                self.send_resync(replica_id);
            }
            RegistryMessage::Resync { .. } => {
                log::warn!("master received a resync snapshot from {}; ignoring", origin);
            }
        }
    }

    fn on_operation_message(&mut self, msg: OperationMessage) {
        let OperationMessage { origin, operation } = msg;

        let operation = match self.store.race(operation.race_id()) {
            Some(entry) => {
                let concurrent = Operation::AdvancePass {
                    race_id: entry.log().race_id(),
                    new_pass: entry.log().current_pass(),
                };
                operation.transform(&concurrent)
            }
            None => operation,
        };

        if let Err(error) = self.store.apply(&operation) {
            log::warn!("master could not apply operation from {}: {}", origin, error);
            return;
        }

        if operation.requires_explicit_transitive_replication() {
            for follower_id in self.followers.keys() {
                if *follower_id != origin {
                    self.network.send(
                        *follower_id,
                        ReplicationMessage::operation(origin, operation.clone()),
                    );
                }
            }
        }
    }

    fn send_resync(&mut self, replica_id: ReplicaId) {
        log::info!("sending resync snapshot to {}", replica_id);
        self.network.send(
            replica_id,
            ReplicationMessage::RegistryMessage(RegistryMessage::Resync {
                snapshot: self.store.snapshot(),
            }),
        );
    }
}
