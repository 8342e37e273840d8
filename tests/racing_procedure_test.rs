//! Tests the racing-procedure state machines against explicitly driven clocks: the RRS 26 and
//! ESS flag schedules, prerequisites and their deadline defaults, recalls, pass advancement, and
//! the ESS automatic finish.

use std::{sync::Arc, time::Duration};

use racelog_rs::{
    procedure::{
        prerequisite::{
            PathfinderPrerequisite, PrerequisiteDecision, PrerequisiteKind,
            PrerequisiteResolver, StartModePrerequisite,
        },
        procedure_for, ProcedureError, ProcedureKind, RaceStateMachine,
    },
    race_log::RaceLog,
    types::{
        author::Author,
        basic::{AuthorPriority, PassId, RaceId, TimePoint},
        event::{EventDetails, RaceStatus},
        flag::Flag,
    },
};

/// A synthetic time point, minutes after an arbitrary epoch.
fn min(minutes: i64) -> TimePoint {
    TimePoint::new(minutes * 60_000)
}

fn machine(kind: ProcedureKind) -> (Arc<RaceLog>, RaceStateMachine) {
    let log = Arc::new(RaceLog::new(RaceId::random()));
    let machine = RaceStateMachine::new(
        log.clone(),
        kind,
        Author::new(String::from("committee"), AuthorPriority::new(2)),
        Duration::from_secs(60),
        false,
    );
    (log, machine)
}

fn displays(machine: &RaceStateMachine, flag: Flag) -> bool {
    machine
        .snapshot()
        .active_flags
        .iter()
        .any(|(displayed, _)| *displayed == flag)
}

#[test]
fn rrs26_runs_the_full_start_sequence() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);

    machine.set_start_time(min(0), min(10));
    assert_eq!(machine.status(), RaceStatus::Scheduled);

    // Five minutes before the start: start phase begins, class flag goes up, and the committee
    // is asked for the start mode.
    machine.tick(min(5));
    assert_eq!(machine.status(), RaceStatus::StartPhase);
    assert!(displays(&machine, Flag::Class));
    assert_eq!(
        machine.snapshot().pending_prerequisites,
        vec![PrerequisiteKind::StartMode]
    );

    machine
        .fulfill_prerequisite(min(5), PrerequisiteDecision::StartMode(Flag::India))
        .unwrap();
    assert!(machine.snapshot().pending_prerequisites.is_empty());
    assert_eq!(machine.snapshot().start_mode, Flag::India);

    machine.tick(min(6));
    assert!(displays(&machine, Flag::India));

    machine.tick(min(9));
    assert!(!displays(&machine, Flag::India));
    assert!(displays(&machine, Flag::Class));

    machine.tick(min(10));
    assert_eq!(machine.status(), RaceStatus::Running);
    assert!(!displays(&machine, Flag::Class));
}

#[test]
fn unanswered_start_mode_prerequisite_defaults_to_papa() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);

    machine.set_start_time(min(0), min(10));
    machine.tick(min(5));
    assert_eq!(
        machine.snapshot().pending_prerequisites,
        vec![PrerequisiteKind::StartMode]
    );

    // The prerequisite deadline (one minute) passes without a committee decision.
    machine.tick(min(6));
    assert!(machine.snapshot().pending_prerequisites.is_empty());
    assert_eq!(machine.snapshot().start_mode, Flag::Papa);
    assert!(displays(&machine, Flag::Papa));
}

#[test]
fn start_mode_must_be_a_start_mode_flag() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);
    machine.set_start_time(min(0), min(10));
    machine.tick(min(5));

    let result =
        machine.fulfill_prerequisite(min(5), PrerequisiteDecision::StartMode(Flag::Ap));
    assert!(matches!(
        result,
        Err(ProcedureError::InvalidStartMode { flag: Flag::Ap })
    ));
}

#[test]
fn general_recall_begins_a_new_pass() {
    let (log, mut machine) = machine(ProcedureKind::Rrs26);

    machine.set_start_time(min(0), min(10));
    machine.tick(min(5));
    machine.tick(min(10));
    assert_eq!(machine.status(), RaceStatus::Running);

    machine.general_recall(min(10));

    assert_eq!(machine.current_pass(), PassId::new(1));
    assert_eq!(machine.status(), RaceStatus::StartPhase);
    assert!(displays(&machine, Flag::FirstSubstitute));
    // The recalled attempt needs a fresh start time.
    assert_eq!(machine.snapshot().start_time, None);
    // Nothing was deleted: the first attempt's events are still in the history.
    assert!(log
        .lock_for_read()
        .events()
        .any(|event| event.pass_id() == Some(PassId::FIRST)));
}

#[test]
fn postpone_rejects_arbitrary_lower_flags() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);
    machine.set_start_time(min(0), min(10));

    let result = machine.postpone(min(2), Flag::Class);
    assert!(matches!(
        result,
        Err(ProcedureError::InvalidLowerFlag { flag: Flag::Class })
    ));
    assert_eq!(machine.current_pass(), PassId::FIRST);

    machine.postpone(min(2), Flag::Hotel).unwrap();
    assert_eq!(machine.current_pass(), PassId::new(1));
    assert!(displays(&machine, Flag::Ap));
}

#[test]
fn individual_recall_is_removed_automatically_after_four_minutes() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);
    machine.set_start_time(min(0), min(10));
    machine.tick(min(5));
    machine.tick(min(10));

    machine.display_individual_recall(min(10)).unwrap();
    assert!(machine.snapshot().individual_recall_displayed);

    machine.tick(min(13));
    assert!(machine.snapshot().individual_recall_displayed);

    machine.tick(min(14));
    assert!(!machine.snapshot().individual_recall_displayed);
}

#[test]
fn individual_recall_with_restart_begins_a_new_pass() {
    let (_, mut machine) = machine(ProcedureKind::Rrs26);

    machine.set_start_time(min(0), min(10));
    machine.tick(min(5));
    machine.tick(min(10));
    assert_eq!(machine.status(), RaceStatus::Running);

    machine.individual_recall_with_restart(min(10)).unwrap();

    assert_eq!(machine.current_pass(), PassId::new(1));
    assert_eq!(machine.status(), RaceStatus::StartPhase);
    assert!(displays(&machine, Flag::Xray));
    // Like a general recall, the restarted attempt needs a fresh start time.
    assert_eq!(machine.snapshot().start_time, None);
}

#[test]
fn procedures_without_individual_recall_reject_it() {
    let (_, mut machine) = machine(ProcedureKind::Ess);

    machine.set_start_time(min(0), min(10));
    machine.tick(min(6));

    let result = machine.display_individual_recall(min(7));
    assert!(matches!(
        result,
        Err(ProcedureError::IndividualRecallUnsupported {
            procedure: ProcedureKind::Ess
        })
    ));
    assert!(!displays(&machine, Flag::Xray));

    let result = machine.individual_recall_with_restart(min(7));
    assert!(matches!(
        result,
        Err(ProcedureError::IndividualRecallUnsupported {
            procedure: ProcedureKind::Ess
        })
    ));
    assert_eq!(machine.current_pass(), PassId::FIRST);
}

#[test]
fn late_start_time_is_backdated_to_before_the_start_phase() {
    let (log, mut machine) = machine(ProcedureKind::Rrs26);

    // Announced eight minutes in, for a start at ten minutes: logically the race was scheduled
    // before its start phase began at five minutes.
    machine.set_start_time(min(8), min(10));

    let guard = log.lock_for_read();
    let start_time_change = guard
        .events()
        .find(|event| matches!(event.details(), EventDetails::StartTimeChange { .. }))
        .unwrap();
    assert_eq!(
        start_time_change.logical_time_point(),
        TimePoint::new(5 * 60_000 - 1)
    );
}

#[test]
fn gate_start_asks_for_start_mode_and_pathfinder() {
    let (_, mut machine) = machine(ProcedureKind::GateStart);

    machine.set_start_time(min(0), min(10));
    // Gate starts run a six-minute phase.
    machine.tick(min(4));
    assert_eq!(machine.status(), RaceStatus::StartPhase);

    let pending = machine.snapshot().pending_prerequisites;
    assert!(pending.contains(&PrerequisiteKind::StartMode));
    assert!(pending.contains(&PrerequisiteKind::Pathfinder));

    machine
        .fulfill_prerequisite(
            min(4),
            PrerequisiteDecision::Pathfinder(String::from("GER 71")),
        )
        .unwrap();
    assert_eq!(machine.snapshot().pathfinder, Some(String::from("GER 71")));

    // The pathfinder prerequisite is gone; deciding it again is an error.
    let result = machine.fulfill_prerequisite(
        min(4),
        PrerequisiteDecision::Pathfinder(String::from("FRA 9")),
    );
    assert!(matches!(
        result,
        Err(ProcedureError::NoSuchPrerequisite {
            kind: PrerequisiteKind::Pathfinder
        })
    ));
}

#[test]
fn pending_prerequisites_are_walked_through_the_resolver() {
    struct Recorder {
        start_mode_deadline: Option<TimePoint>,
        pathfinder_deadline: Option<TimePoint>,
    }

    impl PrerequisiteResolver for Recorder {
        fn resolve_start_mode(&mut self, prerequisite: &StartModePrerequisite) {
            self.start_mode_deadline = Some(prerequisite.deadline);
        }

        fn resolve_pathfinder(&mut self, prerequisite: &PathfinderPrerequisite) {
            self.pathfinder_deadline = Some(prerequisite.deadline);
        }
    }

    let (_, mut machine) = machine(ProcedureKind::GateStart);
    machine.set_start_time(min(0), min(10));
    machine.tick(min(4));

    let mut recorder = Recorder {
        start_mode_deadline: None,
        pathfinder_deadline: None,
    };
    machine.resolve_pending_on(&mut recorder);
    // Both prerequisites share the deadline computed when the start phase began.
    assert_eq!(recorder.start_mode_deadline, Some(min(5)));
    assert_eq!(recorder.pathfinder_deadline, Some(min(5)));
}

#[test]
fn individual_recall_availability_follows_the_procedure() {
    assert!(procedure_for(ProcedureKind::Rrs26).has_individual_recall_by_default());
    assert!(!procedure_for(ProcedureKind::GateStart).has_individual_recall_by_default());
    assert!(!procedure_for(ProcedureKind::Ess).has_individual_recall_by_default());
}

#[test]
fn ess_counts_down_with_numeral_flags_and_finishes_automatically() {
    let (_, mut machine) = machine(ProcedureKind::Ess);

    machine.set_start_time(min(0), min(10));
    machine.tick(min(6));
    assert_eq!(machine.status(), RaceStatus::StartPhase);
    assert!(machine.snapshot().pending_prerequisites.is_empty());

    machine.tick(min(7));
    assert!(displays(&machine, Flag::EssThree));

    machine.tick(min(8));
    assert!(!displays(&machine, Flag::EssThree));
    assert!(displays(&machine, Flag::EssTwo));

    machine.tick(min(9));
    assert!(!displays(&machine, Flag::EssTwo));
    assert!(displays(&machine, Flag::EssOne));

    machine.tick(min(10));
    assert_eq!(machine.status(), RaceStatus::Running);
    assert!(!displays(&machine, Flag::EssOne));

    // First boat finishes after twenty minutes of racing; the rest of the fleet gets 0.75 times
    // that, i.e. until forty-five minutes.
    machine.set_finishing(min(30));
    assert_eq!(machine.status(), RaceStatus::Finishing);
    assert!(displays(&machine, Flag::Blue));

    machine.tick(min(44));
    assert_eq!(machine.status(), RaceStatus::Finishing);

    machine.tick(min(45));
    assert_eq!(machine.status(), RaceStatus::Finished);
    assert!(!displays(&machine, Flag::Blue));
}

#[test]
fn device_mappings_validate_the_identifier_type() {
    let (log, mut machine) = machine(ProcedureKind::Rrs26);

    let result = machine.map_device(min(0), String::from("GER 71"), String::from("bogus-id"));
    assert!(matches!(
        result,
        Err(ProcedureError::UnknownDeviceIdentifierType { .. })
    ));
    assert!(log.lock_for_read().is_empty());

    machine
        .map_device(min(0), String::from("GER 71"), String::from("imei:49015420323751"))
        .unwrap();
    assert_eq!(log.lock_for_read().len(), 1);
}
