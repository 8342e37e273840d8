/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types shared between the race log, the racing-procedure state machines, and the replication
//! layer.
//!
//! The types defined in [`crate::types::basic`] are "inert" newtypes: they are sent around and
//! inspected, but have no active behavior. [`crate::types::author`] defines event authorship and
//! the seniority rule that gates revocation. [`crate::types::flag`] is the closed set of signal
//! flags a race committee can display. [`crate::types::event`] defines the event model itself.

pub mod author;

pub mod basic;

pub mod event;

pub mod flag;
