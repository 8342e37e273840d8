/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Prerequisites: committee decisions a start sequence is waiting for.
//!
//! A prerequisite is created when a start sequence enters its start phase and needs committee
//! input, e.g. the choice of a start-mode flag under RRS 26, or the pathfinder designation for a
//! gate start. It is destroyed when fulfilled, or superseded when a new pass begins.
//!
//! Fulfillment happens one of two ways:
//! - explicitly, by the committee: the caller walks the pending prerequisites with a
//!   [`PrerequisiteResolver`] via [`Prerequisite::resolve_on`]. The double dispatch keeps the
//!   concrete fulfillment logic beside the prerequisite type instead of in a big switch at every
//!   call site.
//! - by deadline: [`Prerequisite::fulfill_with_default`] applies the procedure-defined default.
//!   This is a policy decision, not an error.

use std::fmt::{self, Display, Formatter};

use crate::procedure::RacingProcedure;
use crate::types::basic::TimePoint;
use crate::types::flag::Flag;

/// Discriminates prerequisite variants without carrying their payload. Part of the read-only
/// state snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrerequisiteKind {
    StartMode,
    Pathfinder,
}

impl Display for PrerequisiteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PrerequisiteKind::StartMode => f.write_str("StartMode"),
            PrerequisiteKind::Pathfinder => f.write_str("Pathfinder"),
        }
    }
}

/// The committee must choose the start-mode flag for the preparatory signal.
#[derive(Clone, Debug)]
pub struct StartModePrerequisite {
    pub deadline: TimePoint,
}

/// The committee must designate the pathfinder boat for a gate start.
#[derive(Clone, Debug)]
pub struct PathfinderPrerequisite {
    pub deadline: TimePoint,
}

/// An unfulfilled committee decision, with the deadline after which the procedure default
/// applies. Closed variant set; add a resolver method when adding a variant.
#[derive(Clone, Debug)]
pub enum Prerequisite {
    StartMode(StartModePrerequisite),
    Pathfinder(PathfinderPrerequisite),
}

/// The visitor side of prerequisite resolution.
pub trait PrerequisiteResolver {
    fn resolve_start_mode(&mut self, prerequisite: &StartModePrerequisite);
    fn resolve_pathfinder(&mut self, prerequisite: &PathfinderPrerequisite);
}

/// The value a prerequisite was fulfilled with, explicit or defaulted. The state machine turns
/// this into the corresponding log event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrerequisiteDecision {
    StartMode(Flag),
    Pathfinder(String),
}

impl Prerequisite {
    pub fn kind(&self) -> PrerequisiteKind {
        match self {
            Prerequisite::StartMode(_) => PrerequisiteKind::StartMode,
            Prerequisite::Pathfinder(_) => PrerequisiteKind::Pathfinder,
        }
    }

    pub fn deadline(&self) -> TimePoint {
        match self {
            Prerequisite::StartMode(prerequisite) => prerequisite.deadline,
            Prerequisite::Pathfinder(prerequisite) => prerequisite.deadline,
        }
    }

    /// Double dispatch into the resolver, so the fulfillment logic for each variant lives with
    /// that variant's handler.
    pub fn resolve_on(&self, resolver: &mut dyn PrerequisiteResolver) {
        match self {
            Prerequisite::StartMode(prerequisite) => resolver.resolve_start_mode(prerequisite),
            Prerequisite::Pathfinder(prerequisite) => resolver.resolve_pathfinder(prerequisite),
        }
    }

    /// The procedure-defined default for this prerequisite. Applied when no explicit committee
    /// decision arrived before [`deadline`](Self::deadline).
    pub fn fulfill_with_default(&self, procedure: &dyn RacingProcedure) -> PrerequisiteDecision {
        match self {
            Prerequisite::StartMode(_) => {
                PrerequisiteDecision::StartMode(procedure.default_start_mode())
            }
            // No boat can be invented for the committee: the documented default is an unled
            // gate.
            Prerequisite::Pathfinder(_) => PrerequisiteDecision::Pathfinder(String::new()),
        }
    }
}
