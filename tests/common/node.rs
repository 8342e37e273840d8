use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use racelog_rs::{
    config::Configuration,
    messages::ReplicaInfo,
    procedure::ProcedureKind,
    replication::replica::RaceEntry,
    server::{Role, Server, ServerSpec},
    types::{
        author::Author,
        basic::{AuthorPriority, NetworkAddress, PassId, RaceId, ReplicaId},
        event::RaceStatus,
    },
};

use crate::common::network::NetworkStub;

/// One server under test, with handlers that record the status changes and pass advances it
/// observed. The built-in timer is disabled so that tests control time explicitly.
pub(crate) struct Node {
    id: ReplicaId,
    server: Server,
    status_changes: Arc<Mutex<Vec<(RaceStatus, RaceStatus)>>>,
    pass_advances: Arc<Mutex<Vec<PassId>>>,
}

impl Node {
    pub(crate) fn new(id: ReplicaId, network: NetworkStub, role: Role) -> Node {
        let configuration = Configuration::builder()
            .me(ReplicaInfo {
                id,
                address: NetworkAddress::new(format!("node-{}", id)),
            })
            .author(Author::new(
                format!("committee-{}", id),
                AuthorPriority::new(2),
            ))
            .prerequisite_deadline(Duration::from_secs(60))
            .tick_interval(None)
            .log_events(true)
            .build();

        let status_changes: Arc<Mutex<Vec<(RaceStatus, RaceStatus)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let pass_advances: Arc<Mutex<Vec<PassId>>> = Arc::new(Mutex::new(Vec::new()));

        let recorded_status_changes = status_changes.clone();
        let recorded_pass_advances = pass_advances.clone();
        let server = ServerSpec::builder()
            .configuration(configuration)
            .network(network)
            .role(role)
            .on_status_changed(move |event| {
                recorded_status_changes
                    .lock()
                    .unwrap()
                    .push((event.old_status, event.new_status))
            })
            .on_advance_pass(move |event| {
                recorded_pass_advances.lock().unwrap().push(event.new_pass)
            })
            .build()
            .start();

        Node {
            id,
            server,
            status_changes,
            pass_advances,
        }
    }

    pub(crate) fn info(&self) -> ReplicaInfo {
        ReplicaInfo {
            id: self.id,
            address: NetworkAddress::new(format!("node-{}", self.id)),
        }
    }

    pub(crate) fn create_race(&self, race_id: RaceId, procedure: ProcedureKind) -> RaceEntry {
        self.server.create_race(race_id, procedure)
    }

    pub(crate) fn race(&self, race_id: RaceId) -> Option<RaceEntry> {
        self.server.race(race_id)
    }

    pub(crate) fn status_changes(&self) -> Vec<(RaceStatus, RaceStatus)> {
        self.status_changes.lock().unwrap().clone()
    }

    pub(crate) fn pass_advances(&self) -> Vec<PassId> {
        self.pass_advances.lock().unwrap().clone()
    }
}
