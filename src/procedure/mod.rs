/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The racing-procedure state machine.
//!
//! A race moves through `Unscheduled → Scheduled → StartPhase → Running → Finishing → Finished`,
//! with a side transition into `StartPhase` of the next pass whenever a start attempt is
//! postponed, abandoned or recalled. Which flags accompany each phase, how long before the start
//! the start phase begins, and which [prerequisites](prerequisite) the committee must decide, all
//! depend on the [`RacingProcedure`] in use: [RRS 26](rrs26), [gate start](gate_start) or the
//! [Extreme Sailing Series sequence](ess).
//!
//! The state machine never stores race state of its own authority: everything is derived from the
//! unrevoked, current-pass events of the race's [log](crate::race_log::RaceLog), so that every
//! replica that receives the same events reconstructs the same state. The machine caches the last
//! derivation only to detect changes and fire the corresponding
//! [typed notification events](crate::events), synchronously on the mutating thread.
//!
//! The read-only/mutable split of the original design maps to two types here:
//! [`RaceStateSnapshot`] is the read-only capability handed to event handlers, and
//! [`RaceStateMachine`] is the mutation-capable handle held by the server.

pub mod ess;

pub mod gate_start;

pub mod prerequisite;

pub mod rrs26;

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::event_handlers::EventHandlers;
use crate::events::*;
use crate::race_log::RaceLog;
use crate::types::author::Author;
use crate::types::basic::{PassId, RaceId, TimePoint};
use crate::types::event::{EventDetails, LogEvent, RaceStatus};
use crate::types::flag::Flag;

use prerequisite::{
    PathfinderPrerequisite, Prerequisite, PrerequisiteDecision, PrerequisiteKind,
    PrerequisiteResolver, StartModePrerequisite,
};

/// How long an individual recall stays displayed before it is taken down automatically.
const INDIVIDUAL_RECALL_REMOVAL_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Device identifier types a tracking mapping may use, in `type:value` form.
const KNOWN_DEVICE_IDENTIFIER_TYPES: [&str; 3] = ["uuid", "imei", "serial"];

/// The closed set of racing procedures this library implements. Serializes with borsh because it
/// is part of race snapshots sent over the replication wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum ProcedureKind {
    Rrs26,
    GateStart,
    Ess,
}

impl Display for ProcedureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Rrs26 => f.write_str("RRS26"),
            ProcedureKind::GateStart => f.write_str("GateStart"),
            ProcedureKind::Ess => f.write_str("ESS"),
        }
    }
}

/// Constructs the procedure implementation for a kind.
pub fn procedure_for(kind: ProcedureKind) -> Box<dyn RacingProcedure + Send> {
    match kind {
        ProcedureKind::Rrs26 => Box::new(rrs26::Rrs26),
        ProcedureKind::GateStart => Box::new(gate_start::GateStart),
        ProcedureKind::Ess => Box::new(ess::Ess),
    }
}

/// A flag signal the procedure makes automatically at a fixed offset before the start.
#[derive(Clone, Debug)]
pub enum ScheduledSignal {
    Raise(Flag),
    Lower(Flag),
    /// Raise whichever start-mode flag the committee chose (or the procedure default).
    RaiseStartMode,
    LowerStartMode,
}

/// One step of a procedure's automatic flag schedule.
#[derive(Clone, Debug)]
pub struct FlagScheduleStep {
    pub offset_before_start: Duration,
    pub signal: ScheduledSignal,
}

/// The seam between the generic state machine and one concrete start sequence. Implementations
/// are stateless; all per-race state lives in the log.
pub trait RacingProcedure: Send {
    fn kind(&self) -> ProcedureKind;

    /// How long before the start time the start phase begins.
    fn start_phase_lead_time(&self) -> Duration;

    /// The start-mode flag used when the committee does not decide in time.
    fn default_start_mode(&self) -> Flag;

    fn has_individual_recall_by_default(&self) -> bool;

    /// The prerequisites created when a start phase begins, all sharing `deadline`.
    fn start_phase_prerequisites(&self, deadline: TimePoint) -> Vec<Prerequisite>;

    /// The automatic flag signals of the start sequence, ordered by decreasing offset.
    fn flag_schedule(&self) -> Vec<FlagScheduleStep>;

    /// For procedures that end the race automatically: the finishing window is this factor times
    /// the elapsed race duration.
    fn automatic_finish_factor(&self) -> Option<f64>;
}

/// Returned by committee actions that received malformed input. These are surfaced to the caller
/// and never silently swallowed; the log is not touched when one is returned.
#[derive(Debug)]
pub enum ProcedureError {
    /// The flag is not one of the start-mode flags.
    InvalidStartMode { flag: Flag },
    /// The flag may not be displayed below this signal.
    InvalidLowerFlag { flag: Flag },
    /// No pending prerequisite matches the decision.
    NoSuchPrerequisite { kind: PrerequisiteKind },
    /// The procedure has no individual recall.
    IndividualRecallUnsupported { procedure: ProcedureKind },
    /// A device mapping used an identifier outside the known `type:value` forms.
    UnknownDeviceIdentifierType { device_id: String },
}

impl Display for ProcedureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureError::InvalidStartMode { flag } => {
                write!(f, "{} is not a start-mode flag", flag)
            }
            ProcedureError::InvalidLowerFlag { flag } => {
                write!(f, "{} may not be displayed as a lower flag here", flag)
            }
            ProcedureError::NoSuchPrerequisite { kind } => {
                write!(f, "no pending {} prerequisite", kind)
            }
            ProcedureError::IndividualRecallUnsupported { procedure } => {
                write!(f, "the {} procedure has no individual recall", procedure)
            }
            ProcedureError::UnknownDeviceIdentifierType { device_id } => {
                write!(f, "unknown device identifier type in {:?}", device_id)
            }
        }
    }
}

impl Error for ProcedureError {}

/// A read-only snapshot of the derived race state. This is the sole argument event handlers
/// receive; it cannot be used to mutate anything.
#[derive(Clone, Debug)]
pub struct RaceStateSnapshot {
    pub race_id: RaceId,
    pub status: RaceStatus,
    pub start_time: Option<TimePoint>,
    pub current_pass: PassId,
    /// Currently displayed signals as `(flag, lower_flag)` pairs, in display order.
    pub active_flags: Vec<(Flag, Flag)>,
    /// The chosen start mode, or the procedure default while no choice was made.
    pub start_mode: Flag,
    pub pathfinder: Option<String>,
    pub individual_recall_displayed: bool,
    pub pending_prerequisites: Vec<PrerequisiteKind>,
}

/// What the machine re-derives from the log on every change.
#[derive(Clone, Debug, PartialEq)]
struct DerivedState {
    status: RaceStatus,
    start_time: Option<TimePoint>,
    active_flags: Vec<(Flag, Flag)>,
    start_mode: Option<Flag>,
    pathfinder: Option<String>,
    positions: Option<Vec<String>>,
    course_design: Option<String>,
    wind_fix: Option<(u16, u16)>,
    individual_recall_displayed: bool,
}

impl DerivedState {
    fn initial() -> DerivedState {
        DerivedState {
            status: RaceStatus::Unscheduled,
            start_time: None,
            active_flags: Vec::new(),
            start_mode: None,
            pathfinder: None,
            positions: None,
            course_design: None,
            wind_fix: None,
            individual_recall_displayed: false,
        }
    }
}

/// The mutation-capable handle on one race's officiating state. See the [module docs](self).
pub struct RaceStateMachine {
    log: Arc<RaceLog>,
    procedure: Box<dyn RacingProcedure + Send>,
    author: Author,
    handlers: Arc<EventHandlers>,
    prerequisite_deadline: Duration,

    derived: DerivedState,
    pass: PassId,
    prerequisites: Vec<Prerequisite>,
    /// Schedule steps already executed, keyed by (pass, step index).
    fired_steps: HashSet<(PassId, usize)>,
    /// The most recent time point any action or tick observed; prerequisite deadlines are
    /// measured from here so that callers driving time explicitly get consistent deadlines.
    last_seen_now: TimePoint,
}

impl RaceStateMachine {
    /// Creates a standalone state machine for a race, for embedding without a
    /// [server](crate::server::Server). With `log_events`, state changes are printed via the
    /// default [logging handlers](crate::logging).
    pub fn new(
        log: Arc<RaceLog>,
        kind: ProcedureKind,
        author: Author,
        prerequisite_deadline: Duration,
        log_events: bool,
    ) -> RaceStateMachine {
        let handlers = Arc::new(EventHandlers::new(
            log_events,
            None,
            None,
            None,
            None,
            None,
            None,
        ));
        Self::with_handlers(
            log,
            procedure_for(kind),
            author,
            prerequisite_deadline,
            handlers,
        )
    }

    pub(crate) fn with_handlers(
        log: Arc<RaceLog>,
        procedure: Box<dyn RacingProcedure + Send>,
        author: Author,
        prerequisite_deadline: Duration,
        handlers: Arc<EventHandlers>,
    ) -> RaceStateMachine {
        let pass = log.current_pass();
        let mut machine = RaceStateMachine {
            log,
            procedure,
            author,
            handlers,
            prerequisite_deadline,
            derived: DerivedState::initial(),
            pass,
            prerequisites: Vec::new(),
            fired_steps: HashSet::new(),
            last_seen_now: TimePoint::now(),
        };
        // A machine attached to a non-empty (restored) log starts from the derived state without
        // firing change notifications for history.
        machine.derived = machine.derive();
        machine
    }

    pub fn race_id(&self) -> RaceId {
        self.log.race_id()
    }

    pub fn status(&self) -> RaceStatus {
        self.derived.status
    }

    pub fn start_time(&self) -> Option<TimePoint> {
        self.derived.start_time
    }

    pub fn current_pass(&self) -> PassId {
        self.pass
    }

    pub fn procedure_kind(&self) -> ProcedureKind {
        self.procedure.kind()
    }

    pub fn snapshot(&self) -> RaceStateSnapshot {
        RaceStateSnapshot {
            race_id: self.log.race_id(),
            status: self.derived.status,
            start_time: self.derived.start_time,
            current_pass: self.pass,
            active_flags: self.derived.active_flags.clone(),
            start_mode: self
                .derived
                .start_mode
                .unwrap_or_else(|| self.procedure.default_start_mode()),
            pathfinder: self.derived.pathfinder.clone(),
            individual_recall_displayed: self.derived.individual_recall_displayed,
            pending_prerequisites: self.prerequisites.iter().map(|p| p.kind()).collect(),
        }
    }

    /// The prerequisites currently waiting for committee input.
    pub fn pending_prerequisites(&self) -> Vec<Prerequisite> {
        self.prerequisites.clone()
    }

    /// Walks the pending prerequisites with a resolver, double-dispatching on each variant.
    pub fn resolve_pending_on(&self, resolver: &mut dyn PrerequisiteResolver) {
        for prerequisite in &self.prerequisites {
            prerequisite.resolve_on(resolver);
        }
    }

    /// Sets the start time. The event's logical time point is `now`, unless the start phase has
    /// already logically begun, in which case the event is backdated to just before the start
    /// phase so that `Scheduled` still orders before `StartPhase`.
    pub fn set_start_time(&mut self, now: TimePoint, start_time: TimePoint) {
        self.last_seen_now = now;
        let start_phase_begin = start_time.minus(self.procedure.start_phase_lead_time());
        let logical = if now > start_phase_begin {
            start_phase_begin.just_before()
        } else {
            now
        };
        self.append(
            logical,
            Some(self.pass),
            EventDetails::StartTimeChange { start_time },
        );
        self.update();
    }

    /// Postpones the start: AP up, optionally over `lower_flag`, and a new pass begins. The
    /// signal is recorded in the new pass so it stays displayed while the sequence restarts.
    pub fn postpone(&mut self, now: TimePoint, lower_flag: Flag) -> Result<(), ProcedureError> {
        Self::check_lower_flag(lower_flag)?;
        self.abort_pass(now, Flag::Ap, lower_flag);
        Ok(())
    }

    /// Abandons the race: November up, optionally over `lower_flag`, and a new pass begins.
    pub fn abandon(&mut self, now: TimePoint, lower_flag: Flag) -> Result<(), ProcedureError> {
        Self::check_lower_flag(lower_flag)?;
        self.abort_pass(now, Flag::November, lower_flag);
        Ok(())
    }

    /// Signals a general recall: First Substitute up, and a new pass begins.
    pub fn general_recall(&mut self, now: TimePoint) {
        self.abort_pass(now, Flag::FirstSubstitute, Flag::NoFlag);
    }

    fn abort_pass(&mut self, now: TimePoint, flag: Flag, lower_flag: Flag) {
        self.last_seen_now = now;
        let new_pass = self.log.current_pass().next();
        self.append(
            now,
            Some(new_pass),
            EventDetails::FlagChange {
                flag,
                lower_flag,
                displayed: true,
            },
        );
        self.append(
            now,
            Some(new_pass),
            EventDetails::StatusChange {
                status: RaceStatus::StartPhase,
            },
        );
        self.update();
    }

    /// Displays X-Ray. The flag is taken down automatically four minutes later if the committee
    /// has not removed it by then. Only procedures with an individual recall accept this.
    pub fn display_individual_recall(&mut self, now: TimePoint) -> Result<(), ProcedureError> {
        self.check_individual_recall()?;
        self.last_seen_now = now;
        self.append(
            now,
            Some(self.pass),
            EventDetails::FlagChange {
                flag: Flag::Xray,
                lower_flag: Flag::NoFlag,
                displayed: true,
            },
        );
        self.update();
        Ok(())
    }

    /// Signals an individual recall that restarts the whole start attempt: X-Ray up, and a new
    /// pass begins as with a general recall. Only procedures with an individual recall accept
    /// this.
    pub fn individual_recall_with_restart(
        &mut self,
        now: TimePoint,
    ) -> Result<(), ProcedureError> {
        self.check_individual_recall()?;
        self.abort_pass(now, Flag::Xray, Flag::NoFlag);
        Ok(())
    }

    pub fn remove_individual_recall(&mut self, now: TimePoint) {
        self.last_seen_now = now;
        self.append(
            now,
            Some(self.pass),
            EventDetails::FlagChange {
                flag: Flag::Xray,
                lower_flag: Flag::NoFlag,
                displayed: false,
            },
        );
        self.update();
    }

    /// The finishing vessel is on station: Blue up, status becomes `Finishing`.
    pub fn set_finishing(&mut self, now: TimePoint) {
        self.last_seen_now = now;
        self.append(
            now,
            Some(self.pass),
            EventDetails::FlagChange {
                flag: Flag::Blue,
                lower_flag: Flag::NoFlag,
                displayed: true,
            },
        );
        self.append(
            now,
            Some(self.pass),
            EventDetails::StatusChange {
                status: RaceStatus::Finishing,
            },
        );
        self.update();
    }

    /// Finishing is complete: Blue down, status becomes `Finished`.
    pub fn set_finished(&mut self, now: TimePoint) {
        self.last_seen_now = now;
        self.append(
            now,
            Some(self.pass),
            EventDetails::FlagChange {
                flag: Flag::Blue,
                lower_flag: Flag::NoFlag,
                displayed: false,
            },
        );
        self.append(
            now,
            Some(self.pass),
            EventDetails::StatusChange {
                status: RaceStatus::Finished,
            },
        );
        self.update();
    }

    pub fn set_course_design(&mut self, now: TimePoint, course_design: String) {
        self.last_seen_now = now;
        self.append(
            now,
            None,
            EventDetails::CourseDesignChange { course_design },
        );
        self.update();
    }

    pub fn add_wind_fix(&mut self, now: TimePoint, direction_deg: u16, speed_kts: u16) {
        self.last_seen_now = now;
        self.append(
            now,
            None,
            EventDetails::WindFix {
                direction_deg,
                speed_kts,
            },
        );
        self.update();
    }

    pub fn set_finish_positioning(&mut self, now: TimePoint, positions: Vec<String>) {
        self.last_seen_now = now;
        self.append(
            now,
            Some(self.pass),
            EventDetails::FinishPositioning { positions },
        );
        self.update();
    }

    /// Maps a competitor to a tracking device. The device identifier must be one of the known
    /// `type:value` forms; anything else is malformed input.
    pub fn map_device(
        &mut self,
        now: TimePoint,
        competitor: String,
        device_id: String,
    ) -> Result<(), ProcedureError> {
        let known = device_id
            .split_once(':')
            .map(|(device_type, _)| KNOWN_DEVICE_IDENTIFIER_TYPES.contains(&device_type))
            .unwrap_or(false);
        if !known {
            return Err(ProcedureError::UnknownDeviceIdentifierType { device_id });
        }
        self.last_seen_now = now;
        self.append(
            now,
            None,
            EventDetails::DeviceMapping {
                competitor,
                device_id,
            },
        );
        self.update();
        Ok(())
    }

    /// Fulfills a pending prerequisite with an explicit committee decision.
    pub fn fulfill_prerequisite(
        &mut self,
        now: TimePoint,
        decision: PrerequisiteDecision,
    ) -> Result<(), ProcedureError> {
        let kind = match &decision {
            PrerequisiteDecision::StartMode(flag) => {
                if !flag.is_start_mode() {
                    return Err(ProcedureError::InvalidStartMode { flag: *flag });
                }
                PrerequisiteKind::StartMode
            }
            PrerequisiteDecision::Pathfinder(_) => PrerequisiteKind::Pathfinder,
        };
        if !self.prerequisites.iter().any(|p| p.kind() == kind) {
            return Err(ProcedureError::NoSuchPrerequisite { kind });
        }
        self.last_seen_now = now;
        self.apply_prerequisite_decision(now, &decision);
        self.prerequisites.retain(|p| p.kind() != kind);
        self.update();
        Ok(())
    }

    /// Begins the next pass: the pass counter is incremented and the start sequence restarts in
    /// its start phase. Events of the previous pass stay in the history but no longer contribute
    /// to the current state.
    pub fn advance_pass(&mut self, now: TimePoint) {
        self.last_seen_now = now;
        let new_pass = self.log.current_pass().next();
        self.append(
            now,
            Some(new_pass),
            EventDetails::StatusChange {
                status: RaceStatus::StartPhase,
            },
        );
        self.update();
    }

    /// Drives the time-based behavior of the procedure: phase transitions at the lead-time and
    /// start-time boundaries, the automatic flag schedule, prerequisite deadline expiry,
    /// automatic individual-recall removal, and the automatic finish of procedures that have
    /// one. Call with the logical "now"; typically from a periodic timer.
    pub fn tick(&mut self, now: TimePoint) {
        self.last_seen_now = now;

        if let Some(start_time) = self.derived.start_time {
            let start_phase_begin = start_time.minus(self.procedure.start_phase_lead_time());
            if self.derived.status == RaceStatus::Scheduled && now >= start_phase_begin {
                self.append(
                    start_phase_begin,
                    Some(self.pass),
                    EventDetails::StatusChange {
                        status: RaceStatus::StartPhase,
                    },
                );
            } else if self.derived.status == RaceStatus::StartPhase && now >= start_time {
                self.append(
                    start_time,
                    Some(self.pass),
                    EventDetails::StatusChange {
                        status: RaceStatus::Running,
                    },
                );
            }

            self.fire_due_schedule_steps(now, start_time);
        }

        self.expire_prerequisites(now);
        self.auto_remove_individual_recall(now);
        self.auto_finish(now);

        self.update();
    }

    /// Re-derives state from the log and fires change notifications. Called by the server after
    /// replicated events were applied to the log.
    pub(crate) fn reevaluate(&mut self) {
        self.update();
    }

    fn check_individual_recall(&self) -> Result<(), ProcedureError> {
        if self.procedure.has_individual_recall_by_default() {
            Ok(())
        } else {
            Err(ProcedureError::IndividualRecallUnsupported {
                procedure: self.procedure.kind(),
            })
        }
    }

    fn check_lower_flag(lower_flag: Flag) -> Result<(), ProcedureError> {
        match lower_flag {
            Flag::NoFlag | Flag::Alpha | Flag::Hotel => Ok(()),
            flag => Err(ProcedureError::InvalidLowerFlag { flag }),
        }
    }

    fn append(&self, logical_time_point: TimePoint, pass_id: Option<PassId>, details: EventDetails) {
        let event = LogEvent::new(logical_time_point, self.author.clone(), pass_id, details);
        self.log.add(event);
    }

    fn apply_prerequisite_decision(&self, now: TimePoint, decision: &PrerequisiteDecision) {
        match decision {
            PrerequisiteDecision::StartMode(flag) => self.append(
                now,
                Some(self.pass),
                EventDetails::FlagChange {
                    flag: *flag,
                    lower_flag: Flag::NoFlag,
                    displayed: true,
                },
            ),
            PrerequisiteDecision::Pathfinder(competitor) => self.append(
                now,
                Some(self.pass),
                EventDetails::PathfinderChange {
                    competitor: competitor.clone(),
                },
            ),
        }
    }

    fn fire_due_schedule_steps(&mut self, now: TimePoint, start_time: TimePoint) {
        let start_mode = self
            .derived
            .start_mode
            .unwrap_or_else(|| self.procedure.default_start_mode());
        let schedule = self.procedure.flag_schedule();
        for (index, step) in schedule.iter().enumerate() {
            let at = start_time.minus(step.offset_before_start);
            if now < at || !self.fired_steps.insert((self.pass, index)) {
                continue;
            }
            let (flag, displayed) = match &step.signal {
                ScheduledSignal::Raise(flag) => (*flag, true),
                ScheduledSignal::Lower(flag) => (*flag, false),
                ScheduledSignal::RaiseStartMode => (start_mode, true),
                ScheduledSignal::LowerStartMode => (start_mode, false),
            };
            self.append(
                at,
                Some(self.pass),
                EventDetails::FlagChange {
                    flag,
                    lower_flag: Flag::NoFlag,
                    displayed,
                },
            );
        }
    }

    fn expire_prerequisites(&mut self, now: TimePoint) {
        let due: Vec<Prerequisite> = self
            .prerequisites
            .iter()
            .filter(|p| p.deadline() <= now)
            .cloned()
            .collect();
        for prerequisite in due {
            let decision = prerequisite.fulfill_with_default(self.procedure.as_ref());
            log::info!(
                "prerequisite {} for race {} passed its deadline; fulfilling with default {:?}",
                prerequisite.kind(),
                self.log.race_id(),
                decision
            );
            self.apply_prerequisite_decision(now, &decision);
            let kind = prerequisite.kind();
            self.prerequisites.retain(|p| p.kind() != kind);
        }
    }

    fn auto_remove_individual_recall(&mut self, now: TimePoint) {
        if !self.derived.individual_recall_displayed {
            return;
        }
        let displayed_at = {
            let guard = self.log.lock_for_read();
            guard
                .current_pass_events()
                .iter()
                .rev()
                .find(|event| {
                    matches!(
                        event.details(),
                        EventDetails::FlagChange {
                            flag: Flag::Xray,
                            displayed: true,
                            ..
                        }
                    )
                })
                .map(|event| event.logical_time_point())
        };
        if let Some(displayed_at) = displayed_at {
            if now >= displayed_at.plus(INDIVIDUAL_RECALL_REMOVAL_TIMEOUT) {
                self.remove_individual_recall(now);
            }
        }
    }

    fn auto_finish(&mut self, now: TimePoint) {
        let factor = match self.procedure.automatic_finish_factor() {
            Some(factor) => factor,
            None => return,
        };
        if self.derived.status != RaceStatus::Finishing {
            return;
        }
        let (start_time, finishing_since) = {
            let guard = self.log.lock_for_read();
            let finishing_since = guard
                .current_pass_events()
                .iter()
                .rev()
                .find(|event| {
                    matches!(
                        event.details(),
                        EventDetails::StatusChange {
                            status: RaceStatus::Finishing
                        }
                    )
                })
                .map(|event| event.logical_time_point());
            (self.derived.start_time, finishing_since)
        };
        if let (Some(start_time), Some(finishing_since)) = (start_time, finishing_since) {
            let race_duration_millis = finishing_since.millis() - start_time.millis();
            let window_millis = (race_duration_millis as f64 * factor) as i64;
            let automatic_end =
                TimePoint::new(finishing_since.millis() + window_millis);
            if now >= automatic_end {
                self.set_finished(now);
            }
        }
    }

    /// Folds the unrevoked, current-pass events into a fresh [`DerivedState`].
    fn derive(&self) -> DerivedState {
        let guard = self.log.lock_for_read();
        let mut state = DerivedState::initial();
        for event in guard.current_pass_events() {
            match event.details() {
                EventDetails::StartTimeChange { start_time } => {
                    state.start_time = Some(*start_time);
                    if state.status == RaceStatus::Unscheduled {
                        state.status = RaceStatus::Scheduled;
                    }
                }
                EventDetails::StatusChange { status } => {
                    state.status = *status;
                }
                EventDetails::FlagChange {
                    flag,
                    lower_flag,
                    displayed,
                } => {
                    if *displayed {
                        if !state.active_flags.iter().any(|(f, _)| f == flag) {
                            state.active_flags.push((*flag, *lower_flag));
                        }
                        if flag.is_start_mode() {
                            state.start_mode = Some(*flag);
                        }
                    } else {
                        state.active_flags.retain(|(f, _)| f != flag);
                    }
                }
                EventDetails::PathfinderChange { competitor } => {
                    state.pathfinder = if competitor.is_empty() {
                        None
                    } else {
                        Some(competitor.clone())
                    };
                }
                EventDetails::FinishPositioning { positions } => {
                    state.positions = Some(positions.clone());
                }
                EventDetails::CourseDesignChange { course_design } => {
                    state.course_design = Some(course_design.clone());
                }
                EventDetails::WindFix {
                    direction_deg,
                    speed_kts,
                } => {
                    state.wind_fix = Some((*direction_deg, *speed_kts));
                }
                EventDetails::DeviceMapping { .. } => (),
                // Excluded by the unrevoked view already.
                EventDetails::Revoke { .. } => (),
            }
        }
        state.individual_recall_displayed = state
            .active_flags
            .iter()
            .any(|(flag, _)| *flag == Flag::Xray);
        state
    }

    /// Re-derives state, compares against the previous derivation, fires one typed notification
    /// per observed change, and installs the new derivation. `AdvancePass` fires exactly once
    /// per pass increment.
    fn update(&mut self) {
        let old = self.derived.clone();
        let old_pass = self.pass;
        let new_pass = self.log.current_pass();
        let new = self.derive();

        let entered_start_phase = new.status == RaceStatus::StartPhase
            && (old.status != RaceStatus::StartPhase || new_pass != old_pass);
        if entered_start_phase {
            let deadline = self.last_seen_now.plus(self.prerequisite_deadline);
            self.prerequisites = self
                .procedure
                .start_phase_prerequisites(deadline)
                .into_iter()
                .filter(|p| match p {
                    Prerequisite::StartMode(StartModePrerequisite { .. }) => {
                        new.start_mode.is_none()
                    }
                    Prerequisite::Pathfinder(PathfinderPrerequisite { .. }) => {
                        new.pathfinder.is_none()
                    }
                })
                .collect();
        }

        self.derived = new.clone();
        self.pass = new_pass;

        let timestamp = SystemTime::now();
        if new_pass != old_pass {
            self.handlers
                .fire_handlers(RaceEvent::AdvancePass(AdvancePassEvent {
                    timestamp,
                    new_pass,
                    state: self.snapshot(),
                }));
        }
        if new.status != old.status {
            self.handlers
                .fire_handlers(RaceEvent::StatusChanged(StatusChangedEvent {
                    timestamp,
                    old_status: old.status,
                    new_status: new.status,
                    state: self.snapshot(),
                }));
        }
        if new.start_time != old.start_time {
            if let Some(start_time) = new.start_time {
                self.handlers
                    .fire_handlers(RaceEvent::StartTimeChanged(StartTimeChangedEvent {
                        timestamp,
                        start_time,
                        state: self.snapshot(),
                    }));
            }
        }
        if new.positions != old.positions {
            if let Some(positions) = &new.positions {
                self.handlers.fire_handlers(RaceEvent::FinishingPositioningsChanged(
                    FinishingPositioningsChangedEvent {
                        timestamp,
                        positions: positions.clone(),
                        state: self.snapshot(),
                    },
                ));
            }
        }
        if new.course_design != old.course_design {
            if let Some(course_design) = &new.course_design {
                self.handlers
                    .fire_handlers(RaceEvent::CourseDesignChanged(CourseDesignChangedEvent {
                        timestamp,
                        course_design: course_design.clone(),
                        state: self.snapshot(),
                    }));
            }
        }
        if new.wind_fix != old.wind_fix {
            if let Some((direction_deg, speed_kts)) = new.wind_fix {
                self.handlers
                    .fire_handlers(RaceEvent::WindFixChanged(WindFixChangedEvent {
                        timestamp,
                        direction_deg,
                        speed_kts,
                        state: self.snapshot(),
                    }));
            }
        }
    }
}
