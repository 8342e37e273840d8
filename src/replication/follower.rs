/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The follower side of the star-topology replication protocol.
//!
//! A follower registers with its master on startup, installs the snapshot the master answers
//! with, and from then on applies the operation stream the master sends while shipping its own
//! local mutations to the master. When the stream cannot be applied (an operation for a race the
//! follower does not know), the follower falls back to requesting a fresh snapshot rather than
//! trying to repair incrementally.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::messages::{OperationMessage, RegistryMessage, ReplicaInfo, ReplicationMessage};
use crate::networking::Network;
use crate::replication::operation::Operation;
use crate::replication::replica::RaceStore;
use crate::types::basic::ReplicaId;

pub(crate) struct Follower<N: Network> {
    store: Arc<RaceStore>,
    network: N,
    me: ReplicaInfo,
    master: ReplicaId,
    registry_receiver: Receiver<(ReplicaId, RegistryMessage)>,
    operation_receiver: Receiver<(ReplicaId, OperationMessage)>,
    local_operations: Receiver<Operation>,
    shutdown_signal: Receiver<()>,
}

impl<N: Network + 'static> Follower<N> {
    pub(crate) fn new(
        store: Arc<RaceStore>,
        network: N,
        me: ReplicaInfo,
        master: ReplicaId,
        registry_receiver: Receiver<(ReplicaId, RegistryMessage)>,
        operation_receiver: Receiver<(ReplicaId, OperationMessage)>,
        local_operations: Receiver<Operation>,
        shutdown_signal: Receiver<()>,
    ) -> Follower<N> {
        Follower {
            store,
            network,
            me,
            master,
            registry_receiver,
            operation_receiver,
            local_operations,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || {
            self.network.send(
                self.master,
                ReplicationMessage::RegistryMessage(RegistryMessage::Register {
                    replica: self.me.clone(),
                }),
            );

            loop {
                match self.shutdown_signal.try_recv() {
                    Ok(()) => {
                        self.network.send(
                            self.master,
                            ReplicationMessage::RegistryMessage(RegistryMessage::Deregister {
                                replica_id: self.me.id,
                            }),
                        );
                        return;
                    }
                    Err(TryRecvError::Empty) => (),
                    Err(TryRecvError::Disconnected) => {
                        panic!("Follower thread disconnected from main thread")
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
                    self.network.send(
                        self.master,
                        ReplicationMessage::operation(self.me.id, operation),
                    );
                    progressed = true;
                }

                if !progressed {
                    thread::yield_now()
                }
            }
        })
    }

    fn on_registry_message(&mut self, origin: ReplicaId, msg: RegistryMessage) {
        match msg {
            RegistryMessage::Resync { snapshot } => {
                log::info!(
                    "follower {} installing resync snapshot with {} races",
                    self.me.id,
                    snapshot.races.len()
                );
                self.store.install_snapshot(snapshot);
            }
            RegistryMessage::Register { .. }
            | RegistryMessage::Deregister { .. }
            | RegistryMessage::ResyncRequest { .. } => {
                log::warn!(
                    "follower {} received a registry message meant for a master from {}; ignoring",
                    self.me.id,
                    origin
                );
            }
        }
    }

    fn on_operation_message(&mut self, msg: OperationMessage) {
        if let Err(error) = self.store.apply(&msg.operation) {
            log::warn!(
                "follower {} could not apply operation: {}; requesting resync",
                self.me.id,
                error
            );
            self.network.send(
                self.master,
                ReplicationMessage::RegistryMessage(RegistryMessage::ResyncRequest {
                    replica_id: self.me.id,
                }),
            );
        }
    }
}
