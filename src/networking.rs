/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](Network) for pluggable peer-to-peer networking, as well as the internal
//! types and functions that replicas use to interact with the network.
//!
//! Transport is not this library's business: users bring their own by implementing [`Network`],
//! whose five methods collectively let replicas exchange registry and operation messages. The
//! library addresses peers by [`ReplicaId`]; mapping ids to sockets, queues or anything else is
//! the implementation's concern.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::messages::*;
use crate::types::basic::ReplicaId;

pub trait Network: Clone + Send {
    /// Informs the network provider of the known peers on wake-up.
    fn init_peers(&mut self, peers: Vec<ReplicaInfo>);

    /// Informs the network provider that a peer joined or left.
    fn update_peer(&mut self, peer: ReplicaInfo, joined: bool);

    /// Send a message to all known peers without blocking.
    fn broadcast(&mut self, message: ReplicationMessage);

    /// Send a message to the specified peer without blocking. Sends to unknown or unreachable
    /// peers are dropped silently; replication tolerates loss via resync.
    fn send(&mut self, peer: ReplicaId, message: ReplicationMessage);

    /// Receive a message from any peer. Returns immediately with a None if no message is
    /// available now.
    fn recv(&mut self) -> Option<(ReplicaId, ReplicationMessage)>;
}

/// Spawn the poller thread, which polls the Network for messages and distributes them into
/// receivers for registry messages and operation messages.
pub(crate) fn start_polling<N: Network + 'static>(
    mut network: N,
    shutdown_signal: Receiver<()>,
) -> (
    JoinHandle<()>,
    Receiver<(ReplicaId, RegistryMessage)>,
    Receiver<(ReplicaId, OperationMessage)>,
) {
    let (to_registry_msg_receiver, registry_msg_receiver) = mpsc::channel();
    let (to_operation_msg_receiver, operation_msg_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            match msg {
                ReplicationMessage::RegistryMessage(r_msg) => {
                    let _ = to_registry_msg_receiver.send((origin, r_msg));
                }
                ReplicationMessage::OperationMessage(o_msg) => {
                    let _ = to_operation_msg_receiver.send((origin, o_msg));
                }
            }
        } else {
            thread::yield_now()
        }
    });
    (
        poller_thread,
        registry_msg_receiver,
        operation_msg_receiver,
    )
}
