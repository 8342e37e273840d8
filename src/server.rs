/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods for building and running a race-officiating server, whether as a replication master
//! or as a follower.
//!
//! A server owns the [replicated race store](crate::replication::replica) and the threads around
//! it:
//! - the **poller**, which drains the user-provided [network](crate::networking::Network) and
//!   sorts inbound messages by kind,
//! - the **replication worker**, a [master](crate::replication::master) or a
//!   [follower](crate::replication::follower) depending on the server's [`Role`],
//! - optionally the **timer**, which periodically [ticks](crate::procedure::RaceStateMachine::tick)
//!   every race's state machine with the wall clock.
//!
//! Dropping the [`Server`] shuts the threads down and joins them.
//!
//! Build a server with [`ServerSpec::builder`]: supply a [configuration](crate::config), a
//! network, a role, and optionally handler closures for [race events](crate::events), then call
//! [`start`](ServerSpec::start).

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::config::Configuration;
use crate::event_handlers::{EventHandlers, HandlerPtr};
use crate::events::*;
use crate::messages::ReplicaInfo;
use crate::networking::{start_polling, Network};
use crate::procedure::ProcedureKind;
use crate::replication::follower::Follower;
use crate::replication::master::Master;
use crate::replication::operation::Operation;
use crate::replication::replica::{RaceEntry, RaceStore};
use crate::types::basic::{RaceId, TimePoint};

/// Which side of the replication protocol this server plays.
#[derive(Clone)]
pub enum Role {
    Master,
    /// Replicate from the given master. The follower registers with it on startup.
    Follower { master: ReplicaInfo },
}

/// Parameters of a server plus the handlers registered on it. Build with
/// [`ServerSpec::builder`], then call [`start`](Self::start).
#[derive(TypedBuilder)]
pub struct ServerSpec<N: Network + 'static> {
    configuration: Configuration,
    network: N,
    role: Role,

    #[builder(default, setter(transform = |handler: impl Fn(&StatusChangedEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<StatusChangedEvent>),
    doc = "Register a handler closure to be invoked after a race's status changed. Optional."))]
    on_status_changed: Option<HandlerPtr<StatusChangedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartTimeChangedEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<StartTimeChangedEvent>),
    doc = "Register a handler closure to be invoked after a race's start time was set or changed. Optional."))]
    on_start_time_changed: Option<HandlerPtr<StartTimeChangedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AdvancePassEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<AdvancePassEvent>),
    doc = "Register a handler closure to be invoked after a race advanced to a new start attempt. Optional."))]
    on_advance_pass: Option<HandlerPtr<AdvancePassEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FinishingPositioningsChangedEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<FinishingPositioningsChangedEvent>),
    doc = "Register a handler closure to be invoked after a race's finishing positions were recorded. Optional."))]
    on_finishing_positionings_changed: Option<HandlerPtr<FinishingPositioningsChangedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CourseDesignChangedEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<CourseDesignChangedEvent>),
    doc = "Register a handler closure to be invoked after a race's course design changed. Optional."))]
    on_course_design_changed: Option<HandlerPtr<CourseDesignChangedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&WindFixChangedEvent) + Send + Sync + 'static| Some(Box::new(handler) as HandlerPtr<WindFixChangedEvent>),
    doc = "Register a handler closure to be invoked after a wind fix was recorded for a race. Optional."))]
    on_wind_fix_changed: Option<HandlerPtr<WindFixChangedEvent>>,
}

impl<N: Network + 'static> ServerSpec<N> {
    /// Starts all threads and channels associated with running a server, and returns the handles
    /// to them in a [Server] struct.
    pub fn start(self) -> Server {
        let mut network = self.network;
        let configuration = self.configuration;

        let (operation_sender, local_operations) = mpsc::channel();

        let mut event_handlers = EventHandlers::new(
            configuration.log_events,
            self.on_status_changed,
            self.on_start_time_changed,
            self.on_advance_pass,
            self.on_finishing_positionings_changed,
            self.on_course_design_changed,
            self.on_wind_fix_changed,
        );
        // Pass advancement is replicated explicitly, alongside the events that carry it, so that
        // concurrent start attempts settle on the same pass via operational transformation.
        let advance_pass_capture = operation_sender.clone();
        event_handlers
            .advance_pass_handlers
            .push(Box::new(move |event: &AdvancePassEvent| {
                let _ = advance_pass_capture.send(Operation::AdvancePass {
                    race_id: event.state.race_id,
                    new_pass: event.new_pass,
                });
            }));
        let event_handlers = Arc::new(event_handlers);

        let store = Arc::new(RaceStore::new(
            configuration.author.clone(),
            configuration.prerequisite_deadline,
            event_handlers,
            operation_sender.clone(),
        ));

        network.init_peers(match &self.role {
            Role::Master => Vec::new(),
            Role::Follower { master } => vec![master.clone()],
        });

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, registry_msgs, operation_msgs) =
            start_polling(network.clone(), poller_shutdown_receiver);

        let (worker_shutdown, worker_shutdown_receiver) = mpsc::channel();
        let worker = match self.role {
            Role::Master => Master::new(
                store.clone(),
                network,
                configuration.me.clone(),
                registry_msgs,
                operation_msgs,
                local_operations,
                worker_shutdown_receiver,
            )
            .start(),
            Role::Follower { master } => Follower::new(
                store.clone(),
                network,
                configuration.me.clone(),
                master.id,
                registry_msgs,
                operation_msgs,
                local_operations,
                worker_shutdown_receiver,
            )
            .start(),
        };

        let (timer, timer_shutdown) = match configuration.tick_interval {
            Some(interval) => {
                let (timer_shutdown, timer_shutdown_receiver) = mpsc::channel();
                let timer = start_timer(store.clone(), interval, timer_shutdown_receiver);
                (Some(timer), Some(timer_shutdown))
            }
            None => (None, None),
        };

        Server {
            store,
            operation_sender,
            timer,
            timer_shutdown,
            worker: Some(worker),
            worker_shutdown,
            poller: Some(poller),
            poller_shutdown,
        }
    }
}

/// A handle to a running server's threads and state. Obtained via [`ServerSpec::start`].
pub struct Server {
    store: Arc<RaceStore>,
    operation_sender: Sender<Operation>,
    timer: Option<JoinHandle<()>>,
    timer_shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    worker_shutdown: Sender<()>,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
}

impl Server {
    /// Creates a race officiated under the given procedure and replicates the creation. If the
    /// race id already exists, the existing race is returned.
    pub fn create_race(&self, race_id: RaceId, procedure: ProcedureKind) -> RaceEntry {
        let entry = self.store.create_race(race_id, procedure);
        let _ = self.operation_sender.send(Operation::CreateRace {
            race_id,
            procedure,
        });
        entry
    }

    pub fn race(&self, race_id: RaceId) -> Option<RaceEntry> {
        self.store.race(race_id)
    }

    pub fn races(&self) -> Vec<RaceEntry> {
        self.store.races()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Safety: the order of thread shutdown in this function is important, as the threads make
        // assumptions about the validity of their channels based on this. The replication worker
        // receives messages from the poller, and assumes that the poller will live longer than it.

        self.timer_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if self.timer.is_some() {
            self.timer.take().unwrap().join().unwrap();
        }

        self.worker_shutdown.send(()).unwrap();
        self.worker.take().unwrap().join().unwrap();

        self.poller_shutdown.send(()).unwrap();
        self.poller.take().unwrap().join().unwrap();
    }
}

fn start_timer(
    store: Arc<RaceStore>,
    interval: Duration,
    shutdown_signal: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.recv_timeout(interval) {
            Ok(()) => return,
            Err(RecvTimeoutError::Timeout) => {
                let now = TimePoint::now();
                for entry in store.races() {
                    entry.lock_machine().tick(now);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                panic!("Timer thread disconnected from main thread")
            }
        }
    })
}
