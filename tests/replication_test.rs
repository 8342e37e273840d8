//! Tests replication across a small star of servers over a mock channel network: master
//! mutations reaching followers, follower mutations reaching the master and the other followers
//! transitively, revocation travelling as ordinary events, and a late follower recovering the
//! full state via a resync snapshot.

mod common;

use std::{
    thread,
    time::{Duration, Instant},
};

use log::LevelFilter;
use racelog_rs::{
    procedure::ProcedureKind,
    server::Role,
    types::{
        author::Author,
        basic::{AuthorPriority, PassId, RaceId, ReplicaId, TimePoint},
        event::{EventDetails, RaceStatus},
    },
};

use common::{logging::setup_logger, network::mock_network, node::Node};

/// Polls `condition` until it holds, panicking after a generous timeout.
fn poll_until(description: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(15));
    }
    panic!("timed out waiting until {}", description);
}

fn star(follower_count: u128) -> (Node, Vec<Node>) {
    let ids: Vec<ReplicaId> = (0..=follower_count).map(ReplicaId::new).collect();
    let mut networks = mock_network(ids.iter().copied()).into_iter();

    let master = Node::new(ids[0], networks.next().unwrap(), Role::Master);
    let followers = ids[1..]
        .iter()
        .zip(networks)
        .map(|(id, network)| {
            Node::new(
                *id,
                network,
                Role::Follower {
                    master: master.info(),
                },
            )
        })
        .collect();
    (master, followers)
}

fn log_len(node: &Node, race_id: RaceId) -> usize {
    node.race(race_id)
        .map(|entry| entry.log().lock_for_read().len())
        .unwrap_or(0)
}

#[test]
fn master_mutations_replicate_to_followers() {
    setup_logger(LevelFilter::Trace);

    let (master, followers) = star(2);
    let race_id = RaceId::new(42);
    let entry = master.create_race(race_id, ProcedureKind::Rrs26);

    entry
        .lock_machine()
        .set_course_design(TimePoint::now(), String::from("triangle"));
    entry.lock_machine().general_recall(TimePoint::now());

    let master_len = log_len(&master, race_id);
    for follower in &followers {
        poll_until("the follower caught up with the master's log", || {
            log_len(follower, race_id) == master_len
        });

        let replica_entry = follower.race(race_id).unwrap();
        assert_eq!(replica_entry.procedure_kind(), ProcedureKind::Rrs26);
        let machine = replica_entry.lock_machine();
        assert_eq!(machine.current_pass(), PassId::new(1));
        assert_eq!(machine.status(), RaceStatus::StartPhase);
        drop(machine);

        // The follower's own handlers saw the replicated changes. The recall must surface as
        // exactly one pass advance even though both the appended events and the transformed
        // pass-advance operation arrive.
        assert_eq!(follower.pass_advances(), vec![PassId::new(1)]);
        assert!(follower
            .status_changes()
            .iter()
            .any(|(_, new_status)| *new_status == RaceStatus::StartPhase));
    }

    assert_eq!(master.pass_advances(), vec![PassId::new(1)]);
}

#[test]
fn revocation_replicates_as_an_ordinary_event() {
    setup_logger(LevelFilter::Trace);

    let (master, followers) = star(1);
    let race_id = RaceId::new(7);
    let entry = master.create_race(race_id, ProcedureKind::Rrs26);

    entry
        .lock_machine()
        .set_course_design(TimePoint::now(), String::from("trapezoid"));
    let course_event_id = entry
        .log()
        .lock_for_read()
        .events()
        .find(|event| matches!(event.details(), EventDetails::CourseDesignChange { .. }))
        .map(|event| event.id())
        .unwrap();

    let race_officer = Author::new(String::from("PRO"), AuthorPriority::new(0));
    entry
        .log()
        .revoke_event(&race_officer, course_event_id, String::from("wind shifted"))
        .unwrap();

    let follower = &followers[0];
    poll_until("the revoke took effect on the follower", || {
        follower
            .race(race_id)
            .map(|entry| entry.log().lock_for_read().is_revoked(course_event_id))
            .unwrap_or(false)
    });
}

#[test]
fn follower_mutations_reach_the_master_and_other_followers() {
    setup_logger(LevelFilter::Trace);

    let (master, followers) = star(2);
    let race_id = RaceId::new(11);
    master.create_race(race_id, ProcedureKind::Ess);

    poll_until("every follower knows the race", || {
        followers.iter().all(|follower| follower.race(race_id).is_some())
    });

    let acting_follower = &followers[0];
    acting_follower
        .race(race_id)
        .unwrap()
        .lock_machine()
        .add_wind_fix(TimePoint::now(), 225, 18);

    let has_wind_fix = |node: &Node| {
        node.race(race_id)
            .map(|entry| {
                entry
                    .log()
                    .lock_for_read()
                    .events()
                    .any(|event| matches!(event.details(), EventDetails::WindFix { .. }))
            })
            .unwrap_or(false)
    };
    poll_until("the wind fix reached the master", || has_wind_fix(&master));
    poll_until("the wind fix reached the other follower", || {
        has_wind_fix(&followers[1])
    });
}

#[test]
fn race_created_on_a_follower_reaches_everyone() {
    setup_logger(LevelFilter::Trace);

    let (master, followers) = star(2);
    let race_id = RaceId::new(23);
    followers[0].create_race(race_id, ProcedureKind::GateStart);

    poll_until("the race reached the master", || {
        master.race(race_id).is_some()
    });
    poll_until("the race reached the other follower", || {
        followers[1].race(race_id).is_some()
    });
    assert_eq!(
        master.race(race_id).unwrap().procedure_kind(),
        ProcedureKind::GateStart
    );
}

#[test]
fn late_follower_recovers_full_state_via_resync() {
    setup_logger(LevelFilter::Trace);

    let ids: Vec<ReplicaId> = (0..2).map(ReplicaId::new).collect();
    let mut networks = mock_network(ids.iter().copied()).into_iter();
    let master_network = networks.next().unwrap();
    let late_network = networks.next().unwrap();

    let master = Node::new(ids[0], master_network, Role::Master);
    let race_id = RaceId::new(99);
    let entry = master.create_race(race_id, ProcedureKind::Rrs26);
    entry
        .lock_machine()
        .set_course_design(TimePoint::now(), String::from("windward-leeward"));
    entry.lock_machine().general_recall(TimePoint::now());
    let master_len = log_len(&master, race_id);

    // The follower joins only now; it must receive the whole history in a snapshot.
    let late_follower = Node::new(
        ids[1],
        late_network,
        Role::Follower {
            master: master.info(),
        },
    );
    poll_until("the late follower installed the snapshot", || {
        log_len(&late_follower, race_id) == master_len
    });
    assert_eq!(
        late_follower
            .race(race_id)
            .unwrap()
            .lock_machine()
            .current_pass(),
        PassId::new(1)
    );
}
