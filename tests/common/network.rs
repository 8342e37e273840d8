use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use racelog_rs::{
    messages::{ReplicaInfo, ReplicationMessage},
    networking::Network,
    types::basic::ReplicaId,
};

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_id: ReplicaId,
    all_peers: HashMap<ReplicaId, Sender<(ReplicaId, ReplicationMessage)>>,
    inbox: Arc<Mutex<Receiver<(ReplicaId, ReplicationMessage)>>>,
}

impl Network for NetworkStub {
    fn init_peers(&mut self, _: Vec<ReplicaInfo>) {}

    fn update_peer(&mut self, _: ReplicaInfo, _: bool) {}

    fn send(&mut self, peer: ReplicaId, message: ReplicationMessage) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.my_id, message));
        }
    }

    fn broadcast(&mut self, message: ReplicationMessage) {
        for (peer, sender) in &self.all_peers {
            if *peer != self.my_id {
                let _ = sender.send((self.my_id, message.clone()));
            }
        }
    }

    fn recv(&mut self) -> Option<(ReplicaId, ReplicationMessage)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = ReplicaId>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(ReplicaId, Receiver<(ReplicaId, ReplicationMessage)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_id, inbox)| NetworkStub {
            my_id,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
