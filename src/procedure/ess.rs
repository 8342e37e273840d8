/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Extreme Sailing Series stadium-racing sequence.
//!
//! Short format: a four-minute start phase counted down with the numeral flags 3, 2, 1, each
//! replacing the previous at one-minute intervals. Taking AP down at four minutes opens the
//! sequence when a postponement was in effect. There are no prerequisites; the sequence needs no
//! committee decision once the start time stands.
//!
//! Stadium races also end automatically: once the first boat finishes and the race enters
//! `Finishing`, the remaining fleet gets a window of 0.75 times the elapsed race duration, after
//! which the race is finished without further committee action.

use std::time::Duration;

use crate::procedure::prerequisite::Prerequisite;
use crate::procedure::{FlagScheduleStep, ProcedureKind, RacingProcedure, ScheduledSignal};
use crate::types::basic::TimePoint;
use crate::types::flag::Flag;

const START_PHASE_LEAD_TIME: Duration = Duration::from_secs(4 * 60);

const AUTOMATIC_FINISH_FACTOR: f64 = 0.75;

pub struct Ess;

impl RacingProcedure for Ess {
    fn kind(&self) -> ProcedureKind {
        ProcedureKind::Ess
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

    fn start_phase_prerequisites(&self, _deadline: TimePoint) -> Vec<Prerequisite> {
        Vec::new()
    }

    fn flag_schedule(&self) -> Vec<FlagScheduleStep> {
        vec![
            // Harmless when AP is not displayed; the derivation ignores lowering an absent flag.
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(4 * 60),
                signal: ScheduledSignal::Lower(Flag::Ap),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(3 * 60),
                signal: ScheduledSignal::Raise(Flag::EssThree),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(2 * 60),
                signal: ScheduledSignal::Lower(Flag::EssThree),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(2 * 60),
                signal: ScheduledSignal::Raise(Flag::EssTwo),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(60),
                signal: ScheduledSignal::Lower(Flag::EssTwo),
            },
            FlagScheduleStep {
                offset_before_start: Duration::from_secs(60),
                signal: ScheduledSignal::Raise(Flag::EssOne),
            },
            FlagScheduleStep {
                offset_before_start: Duration::ZERO,
                signal: ScheduledSignal::Lower(Flag::EssOne),
            },
        ]
    }

    fn automatic_finish_factor(&self) -> Option<f64> {
        Some(AUTOMATIC_FINISH_FACTOR)
    }
}
