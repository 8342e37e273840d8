//! Tests the revocation rule of the race log: seniority checks, revokes of revokes, revokes that
//! arrive before their target, and the exclusion of revoked events from the effective view.

use racelog_rs::{
    race_log::{NotRevokableError, RaceLog},
    types::{
        author::Author,
        basic::{AuthorPriority, RaceId, TimePoint},
        event::{EventDetails, LogEvent},
    },
};

fn principal_race_officer() -> Author {
    Author::new(String::from("PRO"), AuthorPriority::new(0))
}

fn committee_member() -> Author {
    Author::new(String::from("committee"), AuthorPriority::new(2))
}

fn trainee() -> Author {
    Author::new(String::from("trainee"), AuthorPriority::new(5))
}

fn course_change(author: Author, design: &str) -> LogEvent {
    LogEvent::new(
        TimePoint::now(),
        author,
        None,
        EventDetails::CourseDesignChange {
            course_design: String::from(design),
        },
    )
}

#[test]
fn senior_author_revokes_junior_event() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "triangle");
    let event_id = event.id();
    assert!(log.add(event));

    log.revoke_event(
        &principal_race_officer(),
        event_id,
        String::from("wrong course"),
    )
    .unwrap();

    let guard = log.lock_for_read();
    assert!(guard.is_revoked(event_id));
    assert!(guard
        .unrevoked_events()
        .iter()
        .all(|event| event.id() != event_id));
}

#[test]
fn equal_priority_suffices_to_revoke() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "windward-leeward");
    let event_id = event.id();
    log.add(event);

    log.revoke_event(&committee_member(), event_id, String::from("typo"))
        .unwrap();

    assert!(log.lock_for_read().is_revoked(event_id));
}

#[test]
fn junior_author_cannot_revoke() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "trapezoid");
    let event_id = event.id();
    log.add(event);

    let result = log.revoke_event(&trainee(), event_id, String::from("disagree"));
    assert!(matches!(
        result,
        Err(NotRevokableError::InsufficientPriority { .. })
    ));
    assert!(!log.lock_for_read().is_revoked(event_id));
}

#[test]
fn junior_revoke_delivered_over_replication_has_no_effect() {
    // A revoke that skipped the local seniority check (e.g. delivered from another replica) is
    // recorded in the history but does not revoke its target.
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "triangle");
    let event_id = event.id();
    log.add(event);

    let ineffective_revoke = LogEvent::new(
        TimePoint::now(),
        trainee(),
        None,
        EventDetails::Revoke {
            revoked_event_id: event_id,
            revoked_short_info: String::new(),
            reason: String::from("disagree"),
        },
    );
    assert!(log.load(ineffective_revoke));

    let guard = log.lock_for_read();
    assert_eq!(guard.len(), 2);
    assert!(!guard.is_revoked(event_id));
    assert!(guard
        .unrevoked_events()
        .iter()
        .any(|event| event.id() == event_id));
}

#[test]
fn revoking_a_revoke_restores_the_original_event() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(trainee(), "triangle");
    let event_id = event.id();
    log.add(event);

    let revoke_id = log
        .revoke_event(&committee_member(), event_id, String::from("premature"))
        .unwrap();
    assert!(log.lock_for_read().is_revoked(event_id));

    log.revoke_event(
        &principal_race_officer(),
        revoke_id,
        String::from("the course change stands"),
    )
    .unwrap();

    let guard = log.lock_for_read();
    assert!(guard.is_revoked(revoke_id));
    assert!(!guard.is_revoked(event_id));
    assert!(guard
        .unrevoked_events()
        .iter()
        .any(|event| event.id() == event_id));
}

#[test]
fn revoke_arriving_before_its_target_takes_effect_on_arrival() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "triangle");
    let event_id = event.id();

    let early_revoke = LogEvent::new(
        TimePoint::now(),
        principal_race_officer(),
        None,
        EventDetails::Revoke {
            revoked_event_id: event_id,
            revoked_short_info: String::new(),
            reason: String::from("out of order delivery"),
        },
    );
    assert!(log.load(early_revoke));
    // Unknown targets are not revoked.
    assert!(!log.lock_for_read().is_revoked(event_id));

    assert!(log.load(event));
    assert!(log.lock_for_read().is_revoked(event_id));
}

#[test]
fn revoke_events_are_not_part_of_the_unrevoked_view() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "triangle");
    let event_id = event.id();
    log.add(event);
    log.revoke_event(&principal_race_officer(), event_id, String::from("redone"))
        .unwrap();

    let guard = log.lock_for_read();
    assert_eq!(guard.len(), 2);
    assert!(guard.unrevoked_events().is_empty());
}

#[test]
fn duplicate_event_ids_are_rejected() {
    let log = RaceLog::new(RaceId::random());
    let event = course_change(committee_member(), "triangle");

    assert!(log.add(event.clone()));
    assert!(!log.add(event.clone()));
    assert!(!log.load(event));
    assert_eq!(log.lock_for_read().len(), 1);
}
