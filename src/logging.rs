/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out race events.
//!
//! The logs defined in this module are printed if the user enabled them via the server's
//! [config](crate::config::Configuration).
//!
//! This library logs using the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or to a file, set up a [logging
//! implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least three values. The first three
//! values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//! 3. The first seven characters of the base64 encoding of the race id.
//!
//! The rest of the values differ depending on the kind of event. For example, the following
//! snippet is how a [StatusChanged](crate::events::StatusChangedEvent) is printed:
//!
//! ```text
//! StatusChanged, 1701329264, Id5u7f6, Scheduled, StartPhase
//! ```

use std::time::SystemTime;

use crate::events::*;
use crate::types::basic::first_seven_base64_chars;

// Names of each event in PascalCase for printing:
pub const STATUS_CHANGED: &str = "StatusChanged";
pub const START_TIME_CHANGED: &str = "StartTimeChanged";
pub const ADVANCE_PASS: &str = "AdvancePass";
pub const FINISHING_POSITIONINGS_CHANGED: &str = "FinishingPositioningsChanged";
pub const COURSE_DESIGN_CHANGED: &str = "CourseDesignChanged";
pub const WIND_FIX_CHANGED: &str = "WindFixChanged";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync>;
}

impl Logger for StatusChangedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |status_changed_event: &StatusChangedEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                STATUS_CHANGED,
                secs_since_unix_epoch(status_changed_event.timestamp),
                first_seven_base64_chars(&status_changed_event.state.race_id.bytes()),
                status_changed_event.old_status,
                status_changed_event.new_status
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartTimeChangedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |start_time_changed_event: &StartTimeChangedEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_TIME_CHANGED,
                secs_since_unix_epoch(start_time_changed_event.timestamp),
                first_seven_base64_chars(&start_time_changed_event.state.race_id.bytes()),
                start_time_changed_event.start_time
            )
        };
        Box::new(logger)
    }
}

impl Logger for AdvancePassEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |advance_pass_event: &AdvancePassEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ADVANCE_PASS,
                secs_since_unix_epoch(advance_pass_event.timestamp),
                first_seven_base64_chars(&advance_pass_event.state.race_id.bytes()),
                advance_pass_event.new_pass
            )
        };
        Box::new(logger)
    }
}

impl Logger for FinishingPositioningsChangedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger =
            |finishing_positionings_changed_event: &FinishingPositioningsChangedEvent| {
                log::info!(
                    "{}, {}, {}, {}",
                    FINISHING_POSITIONINGS_CHANGED,
                    secs_since_unix_epoch(finishing_positionings_changed_event.timestamp),
                    first_seven_base64_chars(
                        &finishing_positionings_changed_event.state.race_id.bytes()
                    ),
                    finishing_positionings_changed_event.positions.len()
                )
            };
        Box::new(logger)
    }
}

impl Logger for CourseDesignChangedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |course_design_changed_event: &CourseDesignChangedEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COURSE_DESIGN_CHANGED,
                secs_since_unix_epoch(course_design_changed_event.timestamp),
                first_seven_base64_chars(&course_design_changed_event.state.race_id.bytes()),
                course_design_changed_event.course_design
            )
        };
        Box::new(logger)
    }
}

impl Logger for WindFixChangedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |wind_fix_changed_event: &WindFixChangedEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                WIND_FIX_CHANGED,
                secs_since_unix_epoch(wind_fix_changed_event.timestamp),
                first_seven_base64_chars(&wind_fix_changed_event.state.race_id.bytes()),
                wind_fix_changed_event.direction_deg,
                wind_fix_changed_event.speed_kts
            )
        };
        Box::new(logger)
    }
}

pub(crate) fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("event occurred before the Unix Epoch")
        .as_secs()
}
