/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of race-state change events for event handling and logging.
//!
//! An event of a given kind indicates that the corresponding change has been completed. Every
//! event carries a [`RaceStateSnapshot`], the read-only view of the race state after the change;
//! handlers receive the snapshot as their sole argument and cannot mutate the state through it.

use std::time::SystemTime;

use crate::procedure::RaceStateSnapshot;
use crate::types::basic::{PassId, TimePoint};
use crate::types::event::RaceStatus;

pub enum RaceEvent {
    StatusChanged(StatusChangedEvent),
    StartTimeChanged(StartTimeChangedEvent),
    AdvancePass(AdvancePassEvent),
    FinishingPositioningsChanged(FinishingPositioningsChangedEvent),
    CourseDesignChanged(CourseDesignChangedEvent),
    WindFixChanged(WindFixChangedEvent),
}

pub struct StatusChangedEvent {
    pub timestamp: SystemTime,
    pub old_status: RaceStatus,
    pub new_status: RaceStatus,
    pub state: RaceStateSnapshot,
}

pub struct StartTimeChangedEvent {
    pub timestamp: SystemTime,
    pub start_time: TimePoint,
    pub state: RaceStateSnapshot,
}

pub struct AdvancePassEvent {
    pub timestamp: SystemTime,
    pub new_pass: PassId,
    pub state: RaceStateSnapshot,
}

pub struct FinishingPositioningsChangedEvent {
    pub timestamp: SystemTime,
    pub positions: Vec<String>,
    pub state: RaceStateSnapshot,
}

pub struct CourseDesignChangedEvent {
    pub timestamp: SystemTime,
    pub course_design: String,
    pub state: RaceStateSnapshot,
}

pub struct WindFixChangedEvent {
    pub timestamp: SystemTime,
    pub direction_deg: u16,
    pub speed_kts: u16,
    pub state: RaceStateSnapshot,
}
