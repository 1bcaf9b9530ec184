//! Alert state machine lifecycle properties.

use chrono::{DateTime, Duration, Utc};
use firesentry::alert::{
    AlertPolicy, AlertState, AlertStateMachine, DeliveryOutcome, Severity,
};
use firesentry::detect::{SignalEvent, SignalKind};

fn event(id: &str, kind: SignalKind) -> SignalEvent {
    SignalEvent {
        source_id: id.to_string(),
        kind,
        reading: None,
    }
}

fn policy() -> AlertPolicy {
    AlertPolicy {
        confirm_count: 2,
        clear_count: 2,
        cooldown: Duration::seconds(300),
        escalation_delay: Duration::seconds(600),
    }
}

fn t0() -> DateTime<Utc> {
    Utc::now()
}

#[test]
fn two_consecutive_confirming_reach_confirmed() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    let task = machine.apply(&event("cam1", SignalKind::Confirming), now);
    assert!(task.is_none());
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Suspected);

    let task = machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(5));
    let task = task.expect("entering confirmed must notify");
    assert_eq!(task.severity, Severity::Critical);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);
}

#[test]
fn confirming_then_clearing_returns_to_normal() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    machine.apply(&event("cam1", SignalKind::Confirming), now);
    let task = machine.apply(&event("cam1", SignalKind::Clearing), now + Duration::seconds(5));
    assert!(task.is_none());
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Normal);
}

#[test]
fn single_confirming_never_confirms() {
    let mut machine = AlertStateMachine::new(policy());
    let task = machine.apply(&event("cam1", SignalKind::Confirming), t0());
    assert!(task.is_none());
    assert_ne!(machine.record("cam1").unwrap().state, AlertState::Confirmed);
}

#[test]
fn one_record_per_source_after_any_sequence() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();
    let kinds = [
        SignalKind::Confirming,
        SignalKind::Clearing,
        SignalKind::Neutral,
        SignalKind::SourceFault,
        SignalKind::Confirming,
        SignalKind::Confirming,
        SignalKind::Clearing,
    ];
    for (i, kind) in kinds.iter().enumerate() {
        for source in ["cam1", "ir1", "smk1"] {
            machine.apply(&event(source, *kind), now + Duration::seconds(i as i64));
        }
    }
    assert_eq!(machine.len(), 3);
}

#[test]
fn repeated_confirming_within_cooldown_notifies_once() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();
    let mut tasks = 0;

    // Drive to confirmed.
    for i in 0..2 {
        if machine
            .apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(i))
            .is_some()
        {
            tasks += 1;
        }
    }
    // Keep confirming inside the cooldown window.
    for i in 2..10 {
        if machine
            .apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(i))
            .is_some()
        {
            tasks += 1;
        }
    }
    assert_eq!(tasks, 1);
    // The confirming count is still kept for audit.
    assert_eq!(machine.record("cam1").unwrap().consecutive_confirming, 10);
}

#[test]
fn reconfirmation_within_cooldown_after_resolution_is_deduplicated() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();
    let mut tasks = 0;
    let mut clock = now;
    let mut step = |machine: &mut AlertStateMachine, kind, tasks: &mut u32| {
        clock = clock + Duration::seconds(1);
        if machine.apply(&event("cam1", kind), clock).is_some() {
            *tasks += 1;
        }
    };

    step(&mut machine, SignalKind::Confirming, &mut tasks);
    step(&mut machine, SignalKind::Confirming, &mut tasks); // confirmed, notified
    step(&mut machine, SignalKind::Clearing, &mut tasks);
    step(&mut machine, SignalKind::Clearing, &mut tasks); // resolved
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Normal);

    // Flap back to confirmed well inside the 300s cooldown.
    step(&mut machine, SignalKind::Confirming, &mut tasks);
    step(&mut machine, SignalKind::Confirming, &mut tasks);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);
    assert_eq!(tasks, 1);
}

#[test]
fn escalation_requires_confirmed_and_delay() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    machine.apply(&event("cam1", SignalKind::Confirming), now);
    machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(1));
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);

    // Confirming before the escalation delay: still confirmed.
    machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(300));
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);

    // After the delay: escalated, with an upgraded notification since
    // the cooldown has lapsed.
    let task = machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(700));
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Escalated);
    assert_eq!(task.expect("escalation notifies").severity, Severity::Emergency);
}

#[test]
fn escalation_unreachable_from_normal_or_suspected() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    // A long-idle normal source fed a confirming signal far in the
    // future must pass through suspected, never jump to escalated.
    let far = now + Duration::seconds(100_000);
    machine.apply(&event("cam1", SignalKind::Confirming), far);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Suspected);

    machine.apply(&event("cam1", SignalKind::Confirming), far + Duration::seconds(100_000));
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);
}

#[test]
fn fault_breaks_confirming_run_without_clearing() {
    let mut machine = AlertStateMachine::new(policy());
    let mut clock = t0();
    let mut apply = |machine: &mut AlertStateMachine, kind| {
        clock = clock + Duration::seconds(1);
        machine.apply(&event("cam1", kind), clock)
    };

    apply(&mut machine, SignalKind::Confirming);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Suspected);

    // Fault holds the state and resets the run.
    apply(&mut machine, SignalKind::SourceFault);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Suspected);
    assert_eq!(machine.record("cam1").unwrap().consecutive_confirming, 0);

    // One more confirming is not enough to confirm now.
    apply(&mut machine, SignalKind::Confirming);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Suspected);

    apply(&mut machine, SignalKind::Confirming);
    assert_eq!(machine.record("cam1").unwrap().state, AlertState::Confirmed);
}

#[test]
fn resolution_resets_state_but_keeps_record() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    machine.apply(&event("cam1", SignalKind::Confirming), now);
    machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(1));
    machine.record_delivery(
        "cam1",
        DeliveryOutcome::Delivered {
            channel: "console".into(),
            attempts: 1,
        },
    );

    machine.apply(&event("cam1", SignalKind::Clearing), now + Duration::seconds(2));
    machine.apply(&event("cam1", SignalKind::Clearing), now + Duration::seconds(3));

    let record = machine.record("cam1").expect("record persists after resolution");
    assert_eq!(record.state, AlertState::Normal);
    assert_eq!(record.consecutive_confirming, 0);
    assert!(record.last_delivery.is_some());
    assert_eq!(machine.len(), 1);
}

#[test]
fn exhausted_delivery_preserves_alert_state() {
    let mut machine = AlertStateMachine::new(policy());
    let now = t0();

    machine.apply(&event("cam1", SignalKind::Confirming), now);
    machine.apply(&event("cam1", SignalKind::Confirming), now + Duration::seconds(1));
    machine.record_delivery("cam1", DeliveryOutcome::Exhausted { attempts: 3 });

    let record = machine.record("cam1").unwrap();
    assert_eq!(record.state, AlertState::Confirmed);
    assert_eq!(
        record.last_delivery,
        Some(DeliveryOutcome::Exhausted { attempts: 3 })
    );
}
