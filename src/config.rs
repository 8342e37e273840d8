/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Defines the [Configuration] struct, the parameters of a [server](crate::server::Server).

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::messages::ReplicaInfo;
use crate::types::author::Author;

/// Parameters of one server. Build with [`Configuration::builder`]; fields without defaults are
/// required.
#[derive(Clone, TypedBuilder)]
pub struct Configuration {
    /// Identity and reachability of this server, announced to peers during registration.
    pub me: ReplicaInfo,

    /// The author under which this server's committee actions and automatic procedure signals
    /// are recorded in race logs.
    pub author: Author,

    /// How long a start phase waits for a committee decision on a prerequisite before applying
    /// the procedure default.
    #[builder(default = Duration::from_secs(30))]
    pub prerequisite_deadline: Duration,

    /// The period of the built-in timer that drives time-based procedure behavior (phase
    /// transitions, flag schedules, automatic finishes). `None` disables the timer; the embedder
    /// then calls [`RaceStateMachine::tick`](crate::procedure::RaceStateMachine::tick) with a
    /// clock of its own choosing.
    #[builder(default = Some(Duration::from_secs(1)))]
    pub tick_interval: Option<Duration>,

    /// Whether to print out the default [logging handlers](crate::logging) for race events.
    #[builder(default = true)]
    pub log_events: bool,
}
