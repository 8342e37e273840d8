/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The gate-start sequence.
//!
//! A gate start runs a longer, six-minute start phase and adds a second prerequisite: besides the
//! start-mode flag, the committee designates a pathfinder, the boat that sails the gate open on
//! port tack. An empty pathfinder designation is a valid outcome and means an unled gate.
//! Individual recalls make no sense here: a boat cannot be over early relative to a gate that is
//! still opening.

use std::time::Duration;

use crate::procedure::prerequisite::{
    PathfinderPrerequisite, Prerequisite, StartModePrerequisite,
};
use crate::procedure::{FlagScheduleStep, ProcedureKind, RacingProcedure, ScheduledSignal};
use crate::types::basic::TimePoint;
use crate::types::flag::Flag;

const START_PHASE_LEAD_TIME: Duration = Duration::from_secs(6 * 60);

pub struct GateStart;

impl RacingProcedure for GateStart {
    fn kind(&self) -> ProcedureKind {
        ProcedureKind::GateStart
    }

    fn start_phase_lead_time(&self) -> Duration {
        START_PHASE_LEAD_TIME
    }

    fn default_start_mode(&self) -> Flag {
        Flag::Papa
    }

    fn has_individual_recall_by_default(&self) -> bool {
        false
    }

    fn start_phase_prerequisites(&self, deadline: TimePoint) -> Vec<Prerequisite> {
        vec![
            Prerequisite::StartMode(StartModePrerequisite { deadline }),
            Prerequisite::Pathfinder(PathfinderPrerequisite { deadline }),
        ]
    }

    fn flag_schedule(&self) -> Vec<FlagScheduleStep> {
        vec![
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(6 * 60),
                signal: ScheduledSignal::Raise(Flag::Class),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(5 * 60),
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
