/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust library for officiating sailing races: an append-only, revocable event log per race, a
//! state machine for standard racing procedures, and master-follower replication that keeps every
//! device on the water converging on the same view of the race.
//!
//! ## The race log
//!
//! Every committee decision is an immutable [event](types::event) appended to the race's
//! [log](race_log). Nothing is ever deleted: a decision is undone by appending a *revoke* event,
//! subject to an author-seniority rule, so the full history stays auditable and every replica
//! that receives the same events reconstructs the same state.
//!
//! ## Racing procedures
//!
//! The [procedure] module derives live race state from the log and drives the timed start
//! sequences of [RRS 26](procedure::rrs26), [gate starts](procedure::gate_start) and the
//! [Extreme Sailing Series](procedure::ess): automatic flag signals, phase transitions, recalls,
//! and start attempts ("passes") that restart the sequence without losing history.
//!
//! ## Replication
//!
//! Committee boats, jury devices and shore servers each run a [server] wrapping the same state.
//! One server is the [master](server::Role::Master); the others follow it, exchanging
//! [operations](replication::operation) over a user-provided [network](networking::Network) and
//! recovering via full-state [snapshots](messages::Snapshot) when incremental replication cannot
//! proceed. Operations are idempotent and, where needed, reconciled by operational
//! transformation, so replicas converge under concurrent mutation and at-least-once delivery.
//!
//! ## Getting started
//!
//! 1. Implement [`Network`](networking::Network) for your transport.
//! 2. Build a [`Configuration`](config::Configuration) and a [`ServerSpec`](server::ServerSpec),
//!    registering any [event handlers](events) you need, and call
//!    [`start`](server::ServerSpec::start).
//! 3. Create races with [`Server::create_race`](server::Server::create_race) and act on them
//!    through [`RaceEntry`](replication::replica::RaceEntry): committee actions go through the
//!    [state machine](procedure::RaceStateMachine), reads and revokes through the
//!    [log](race_log::RaceLog).

pub mod config;

mod event_handlers;

pub mod events;

pub mod logging;

pub mod messages;

pub mod networking;

pub mod procedure;

pub mod race_log;

pub mod replication;

pub mod server;

pub mod types;
