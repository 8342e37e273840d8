/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The start sequence of Racing Rules of Sailing rule 26.
//!
//! The sequence runs over a five-minute start phase: class flag up at five minutes, the
//! committee-chosen start-mode (preparatory) flag up at four minutes and down at one minute,
//! class flag down at the start. The choice of start mode is the one prerequisite of this
//! procedure; if the committee does not choose, Papa is used.

use std::time::Duration;

use crate::procedure::prerequisite::{Prerequisite, StartModePrerequisite};
use crate::procedure::{FlagScheduleStep, ProcedureKind, RacingProcedure, ScheduledSignal};
use crate::types::basic::TimePoint;
use crate::types::flag::Flag;

const START_PHASE_LEAD_TIME: Duration = Duration::from_secs(5 * 60);

pub struct Rrs26;

impl RacingProcedure for Rrs26 {
    fn kind(&self) -> ProcedureKind {
        ProcedureKind::Rrs26
    }

    fn start_phase_lead_time(&self) -> Duration {
        START_PHASE_LEAD_TIME
    }

    fn default_start_mode(&self) -> Flag {
        Flag::Papa
    }

    fn has_individual_recall_by_default(&self) -> bool {
        true
    }

    fn start_phase_prerequisites(&self, deadline: TimePoint) -> Vec<Prerequisite> {
        vec![Prerequisite::StartMode(StartModePrerequisite { deadline })]
    }

    fn flag_schedule(&self) -> Vec<FlagScheduleStep> {
        vec![
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(5 * 60),
                signal: ScheduledSignal::Raise(Flag::Class),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(4 * 60),
                signal: ScheduledSignal::RaiseStartMode,
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(60),
                signal: ScheduledSignal::LowerStartMode,
            },
            FlagScheduleStep {
                offset_before_start: Duration::ZERO,
                signal: ScheduledSignal::Lower(Flag::Class),
            },
        ]
    }

    fn automatic_finish_factor(&self) -> Option<f64> {
        None
    }
}
