//! Property-based tests for the session coordinator.
//!
//! Invariants that must hold for all membership histories: the count
//! equals matched arrivals minus departures and is never negative, ids
//! are the lowest free ones and distinct among live sessions, and every
//! session observes exactly the global broadcast sequence for its
//! membership window, in order.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use roster_server::{
    Coordinator, CoordinatorConfig, LifecycleEvent, Notification, SessionId, SessionMailbox,
};
use tokio::sync::mpsc;

/// One step of a generated membership history.
#[derive(Debug, Clone, Copy)]
enum Step {
    Arrive,
    Depart(SessionId),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => Just(Step::Arrive),
        // Small id range so departures hit live ids, freed ids, and
        // never-assigned ids with useful frequency.
        1 => (0u32..8).prop_map(Step::Depart),
    ]
}

/// Mailbox roomy enough that no generated history can overflow it; the
/// overflow policy is exercised by unit tests, not here.
const TEST_MAILBOX_CAPACITY: usize = 256;

fn assigned_id(rx: &mut mpsc::Receiver<Notification>) -> Result<SessionId, TestCaseError> {
    match rx.try_recv() {
        Ok(Notification::IdAssigned { session_id }) => Ok(session_id),
        other => Err(TestCaseError::fail(format!("expected id assignment, got {other:?}"))),
    }
}

fn drain_counts(rx: &mut mpsc::Receiver<Notification>) -> Result<Vec<usize>, TestCaseError> {
    let mut observed = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        match notification {
            Notification::CountChanged { count } => observed.push(count),
            Notification::IdAssigned { session_id } => {
                return Err(TestCaseError::fail(format!("late id assignment: {session_id}")));
            },
        }
    }
    Ok(observed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Count equals matched arrivals minus departures after every step,
    /// and each arrival is assigned the lowest id not currently live.
    #[test]
    fn count_tracks_membership_and_ids_are_lowest_free(
        steps in prop::collection::vec(step_strategy(), 0..64)
    ) {
        let mut coordinator = Coordinator::new(CoordinatorConfig::default());
        let mut live: HashSet<SessionId> = HashSet::new();
        // Receivers kept alive so no mailbox reads as closed mid-run.
        let mut receivers: Vec<mpsc::Receiver<Notification>> = Vec::new();

        for step in steps {
            match step {
                Step::Arrive => {
                    let (tx, mut rx) = mpsc::channel(TEST_MAILBOX_CAPACITY);
                    coordinator.process_event(LifecycleEvent::Arrival { mailbox: tx })?;

                    let id = assigned_id(&mut rx)?;
                    let expected = (0..).find(|i| !live.contains(i));
                    prop_assert_eq!(Some(id), expected, "not the lowest free id");
                    prop_assert!(live.insert(id), "id already held by a live session");
                    receivers.push(rx);
                },
                Step::Depart(id) => {
                    coordinator.process_event(LifecycleEvent::Departure { session_id: id })?;
                    live.remove(&id);
                },
            }

            prop_assert_eq!(coordinator.session_count(), live.len());
        }
    }

    /// Every session observes exactly the slice of the global broadcast
    /// sequence from its admission to its departure — no reordering, no
    /// skips, no duplicates.
    #[test]
    fn observed_counts_are_a_window_of_the_global_sequence(
        steps in prop::collection::vec(step_strategy(), 0..64)
    ) {
        struct SessionRec {
            rx: mpsc::Receiver<Notification>,
            joined_at: usize,
            left_at: Option<usize>,
        }

        let mut coordinator: Coordinator<SessionMailbox> =
            Coordinator::new(CoordinatorConfig::default());
        let mut broadcasts: Vec<usize> = Vec::new();
        let mut live: HashSet<SessionId> = HashSet::new();
        let mut records: HashMap<SessionId, Vec<SessionRec>> = HashMap::new();

        for step in steps {
            match step {
                Step::Arrive => {
                    let (tx, mut rx) = mpsc::channel(TEST_MAILBOX_CAPACITY);
                    coordinator.process_event(LifecycleEvent::Arrival { mailbox: tx })?;

                    let id = assigned_id(&mut rx)?;
                    live.insert(id);
                    // The admission broadcast is the first one this
                    // session sees.
                    let joined_at = broadcasts.len();
                    broadcasts.push(live.len());
                    records.entry(id).or_default().push(SessionRec {
                        rx,
                        joined_at,
                        left_at: None,
                    });
                },
                Step::Depart(id) => {
                    coordinator.process_event(LifecycleEvent::Departure { session_id: id })?;

                    if live.remove(&id) {
                        // The departure broadcast happens after removal,
                        // so the departing session does not see it.
                        let left_at = broadcasts.len();
                        broadcasts.push(live.len());
                        if let Some(rec) =
                            records.get_mut(&id).and_then(|incarnations| incarnations.last_mut())
                        {
                            rec.left_at = Some(left_at);
                        }
                    }
                },
            }
        }

        for (id, incarnations) in &mut records {
            for rec in incarnations {
                let end = rec.left_at.unwrap_or(broadcasts.len());
                let expected = &broadcasts[rec.joined_at..end];
                let observed = drain_counts(&mut rec.rx)?;
                prop_assert_eq!(
                    observed.as_slice(),
                    expected,
                    "session {} observed a different window",
                    id
                );
            }
        }
    }
}
