/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event model of the race log.
//!
//! A [`LogEvent`] is an immutable record of one race committee decision: a flag raised or
//! lowered, a start time set, a competitor mapped to a tracking device, a revoke of an earlier
//! decision, and so on. The variants live in the closed [`EventDetails`] enum; consumers match on
//! it exhaustively, so a new handler can be added as a free function over the enum without
//! touching the event type itself.
//!
//! Events are created once and never mutated. They are removed from consideration only via
//! revocation, which is an overlay over the log, never a deletion.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::author::Author;
use crate::types::basic::{EventId, PassId, TimePoint};
use crate::types::flag::Flag;

/// Status of a race, as recorded in the log and derived by the racing-procedure state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub enum RaceStatus {
    Unscheduled,
    Scheduled,
    StartPhase,
    Running,
    Finishing,
    Finished,
    /// Unrecoverable inconsistency. Only ever surfaced at the consumer boundary.
    Error,
}

impl Display for RaceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RaceStatus::Unscheduled => "Unscheduled",
            RaceStatus::Scheduled => "Scheduled",
            RaceStatus::StartPhase => "StartPhase",
            RaceStatus::Running => "Running",
            RaceStatus::Finishing => "Finishing",
            RaceStatus::Finished => "Finished",
            RaceStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// The payload of a [`LogEvent`].
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum EventDetails {
    /// A signal flag was raised (`displayed == true`) or lowered. `lower_flag` is the flag
    /// displayed below the main one in compound signals ("AP over Hotel"), `Flag::NoFlag` if
    /// none.
    FlagChange {
        flag: Flag,
        lower_flag: Flag,
        displayed: bool,
    },
    /// The start time of the race was set or changed.
    StartTimeChange { start_time: TimePoint },
    /// The race status changed. Written by the state machine at every transition so that
    /// replicas reconstruct the same status walk without consulting their own clocks.
    StatusChange { status: RaceStatus },
    /// A competitor was mapped to a tracking device.
    DeviceMapping {
        competitor: String,
        device_id: String,
    },
    /// The course design in use changed.
    CourseDesignChange { course_design: String },
    /// A wind measurement was recorded for the race area.
    WindFix {
        direction_deg: u16,
        speed_kts: u16,
    },
    /// Finishing positions were (re-)recorded, in finishing order.
    FinishPositioning { positions: Vec<String> },
    /// A pathfinder was designated for a gate start. An empty competitor name means the gate
    /// opens unled.
    PathfinderChange { competitor: String },
    /// Revokes the event with id `revoked_event_id`, subject to the author-seniority rule
    /// evaluated by the log. `revoked_short_info` is carried for audit display only.
    Revoke {
        revoked_event_id: EventId,
        revoked_short_info: String,
        reason: String,
    },
}

impl EventDetails {
    /// A terse human-readable summary, used in revoke audit info and log messages.
    pub fn short_info(&self) -> String {
        match self {
            EventDetails::FlagChange {
                flag, displayed, ..
            } => {
                if *displayed {
                    format!("flag {} up", flag)
                } else {
                    format!("flag {} down", flag)
                }
            }
            EventDetails::StartTimeChange { start_time } => {
                format!("start time {}", start_time)
            }
            EventDetails::StatusChange { status } => format!("status {}", status),
            EventDetails::DeviceMapping {
                competitor,
                device_id,
            } => format!("competitor {} on device {}", competitor, device_id),
            EventDetails::CourseDesignChange { course_design } => {
                format!("course design {}", course_design)
            }
            EventDetails::WindFix {
                direction_deg,
                speed_kts,
            } => format!("wind {}deg {}kts", direction_deg, speed_kts),
            EventDetails::FinishPositioning { positions } => {
                format!("{} finish positions", positions.len())
            }
            EventDetails::PathfinderChange { competitor } => {
                if competitor.is_empty() {
                    String::from("no pathfinder")
                } else {
                    format!("pathfinder {}", competitor)
                }
            }
            EventDetails::Revoke {
                revoked_event_id, ..
            } => format!("revoke of {}", revoked_event_id),
        }
    }
}

/// One immutable entry of the race log.
///
/// `created_at` is the wall clock at construction and is used for audit and for ordering among
/// concurrently-submitted events; it is monotonic per log only in the absence of clock skew, so
/// nothing may rely on it being strictly ordered. `logical_time_point` is the time the event
/// claims to take effect at.
///
/// `pass_id` is `None` for events that are valid across passes (revokes, device mappings, wind
/// fixes), and `Some` for events tied to one start attempt.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct LogEvent {
    id: EventId,
    created_at: TimePoint,
    logical_time_point: TimePoint,
    author: Author,
    pass_id: Option<PassId>,
    details: EventDetails,
}

impl LogEvent {
    /// Creates a new event, stamping `created_at` with the current wall clock and generating a
    /// fresh random id.
    pub fn new(
        logical_time_point: TimePoint,
        author: Author,
        pass_id: Option<PassId>,
        details: EventDetails,
    ) -> LogEvent {
        LogEvent {
            id: EventId::random(),
            created_at: TimePoint::now(),
            logical_time_point,
            author,
            pass_id,
            details,
        }
    }

    /// Reconstructs an event from persisted or replicated fields. The id must be the one the
    /// event was originally created with: event identity round-trips exactly.
    pub fn restore(
        id: EventId,
        created_at: TimePoint,
        logical_time_point: TimePoint,
        author: Author,
        pass_id: Option<PassId>,
        details: EventDetails,
    ) -> LogEvent {
        LogEvent {
            id,
            created_at,
            logical_time_point,
            author,
            pass_id,
            details,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn created_at(&self) -> TimePoint {
        self.created_at
    }

    pub fn logical_time_point(&self) -> TimePoint {
        self.logical_time_point
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn pass_id(&self) -> Option<PassId> {
        self.pass_id
    }

    pub fn details(&self) -> &EventDetails {
        &self.details
    }

    pub fn is_revoke(&self) -> bool {
        matches!(self.details, EventDetails::Revoke { .. })
    }

    /// The id of the event this event revokes, if this is a revoke.
    pub fn revoked_event_id(&self) -> Option<EventId> {
        match &self.details {
            EventDetails::Revoke {
                revoked_event_id, ..
            } => Some(*revoked_event_id),
            _ => None,
        }
    }

    pub fn short_info(&self) -> String {
        self.details.short_info()
    }
}

impl Display for LogEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}: {}", self.id, self.author, self.short_info())
    }
}
