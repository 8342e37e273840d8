/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Keeping multiple servers' race state converging.
//!
//! Replication is organized as a star: one [master](master) and any number of
//! [followers](follower), each wrapping the same [replicated race store](replica). Local
//! mutations are captured as [operations](operation) and shipped through the
//! [network](crate::networking); full-state recovery uses
//! [snapshots](crate::messages::Snapshot).

pub(crate) mod follower;

pub(crate) mod master;

pub mod operation;

pub mod replica;
