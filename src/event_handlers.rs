/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The container for registered race-event handlers.
//!
//! Handlers are fired *synchronously on the thread performing the mutation* that produced the
//! event; there is no bus thread in between. Handlers therefore must not block indefinitely and
//! must not mutate the same race state re-entrantly; work beyond quick inspection belongs on an
//! execution context the handler owns.

use crate::events::*;
use crate::logging::Logger;

// Handlers are shared by every race's state machine and fired from whichever thread mutates,
// hence the Sync bound.
pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send + Sync>;

pub(crate) struct EventHandlers {
    pub(crate) status_changed_handlers: Vec<HandlerPtr<StatusChangedEvent>>,
    pub(crate) start_time_changed_handlers: Vec<HandlerPtr<StartTimeChangedEvent>>,
    pub(crate) advance_pass_handlers: Vec<HandlerPtr<AdvancePassEvent>>,
    pub(crate) finishing_positionings_changed_handlers:
        Vec<HandlerPtr<FinishingPositioningsChangedEvent>>,
    pub(crate) course_design_changed_handlers: Vec<HandlerPtr<CourseDesignChangedEvent>>,
    pub(crate) wind_fix_changed_handlers: Vec<HandlerPtr<WindFixChangedEvent>>,
}

impl EventHandlers {
    pub(crate) fn new(
        log_events: bool,
        on_status_changed: Option<HandlerPtr<StatusChangedEvent>>,
        on_start_time_changed: Option<HandlerPtr<StartTimeChangedEvent>>,
        on_advance_pass: Option<HandlerPtr<AdvancePassEvent>>,
        on_finishing_positionings_changed: Option<HandlerPtr<FinishingPositioningsChangedEvent>>,
        on_course_design_changed: Option<HandlerPtr<CourseDesignChangedEvent>>,
        on_wind_fix_changed: Option<HandlerPtr<WindFixChangedEvent>>,
    ) -> EventHandlers {
        let mut event_handlers = EventHandlers {
            status_changed_handlers: Vec::new(),
            start_time_changed_handlers: Vec::new(),
            advance_pass_handlers: Vec::new(),
            finishing_positionings_changed_handlers: Vec::new(),
            course_design_changed_handlers: Vec::new(),
            wind_fix_changed_handlers: Vec::new(),
        };

        if log_events {
            event_handlers
                .status_changed_handlers
                .push(StatusChangedEvent::get_logger());
            event_handlers
                .start_time_changed_handlers
                .push(StartTimeChangedEvent::get_logger());
            event_handlers
                .advance_pass_handlers
                .push(AdvancePassEvent::get_logger());
            event_handlers
                .finishing_positionings_changed_handlers
                .push(FinishingPositioningsChangedEvent::get_logger());
            event_handlers
                .course_design_changed_handlers
                .push(CourseDesignChangedEvent::get_logger());
            event_handlers
                .wind_fix_changed_handlers
                .push(WindFixChangedEvent::get_logger());
        }

        if let Some(handler) = on_status_changed {
            event_handlers.status_changed_handlers.push(handler);
        }
        if let Some(handler) = on_start_time_changed {
            event_handlers.start_time_changed_handlers.push(handler);
        }
        if let Some(handler) = on_advance_pass {
            event_handlers.advance_pass_handlers.push(handler);
        }
        if let Some(handler) = on_finishing_positionings_changed {
            event_handlers
                .finishing_positionings_changed_handlers
                .push(handler);
        }
        if let Some(handler) = on_course_design_changed {
            event_handlers.course_design_changed_handlers.push(handler);
        }
        if let Some(handler) = on_wind_fix_changed {
            event_handlers.wind_fix_changed_handlers.push(handler);
        }

        event_handlers
    }

    pub(crate) fn fire_handlers(&self, event: RaceEvent) {
        match event {
            RaceEvent::StatusChanged(status_changed_event) => self
                .status_changed_handlers
                .iter()
                .for_each(|handler| handler(&status_changed_event)),

            RaceEvent::StartTimeChanged(start_time_changed_event) => self
                .start_time_changed_handlers
                .iter()
                .for_each(|handler| handler(&start_time_changed_event)),

            RaceEvent::AdvancePass(advance_pass_event) => self
                .advance_pass_handlers
                .iter()
                .for_each(|handler| handler(&advance_pass_event)),

            RaceEvent::FinishingPositioningsChanged(finishing_positionings_changed_event) => self
                .finishing_positionings_changed_handlers
                .iter()
                .for_each(|handler| handler(&finishing_positionings_changed_event)),

            RaceEvent::CourseDesignChanged(course_design_changed_event) => self
                .course_design_changed_handlers
                .iter()
                .for_each(|handler| handler(&course_design_changed_event)),

            RaceEvent::WindFixChanged(wind_fix_changed_event) => self
                .wind_fix_changed_handlers
                .iter()
                .for_each(|handler| handler(&wind_fix_changed_event)),
        }
    }
}
