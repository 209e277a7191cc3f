//! End-to-end escalation scenarios driven at the 500 ms reference cadence.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use proptest::prelude::*;
use vital_alarms::engine::{BLOOD_PRESSURE, HEART_RATE, RHYTHM, SPO2};
use vital_alarms::{
    AlarmEngine, BloodPressure, CardiacRhythm, EscalationPhase, EscalationPolicy, FireEvent,
    Reading, Readings, RecordingSink, Rhythm, Severity, Transition,
};

const TICK_MS: i64 = 500;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn at_ms(ms: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::milliseconds(ms)
}

fn baseline() -> Readings {
    Readings::new()
        .with(HEART_RATE, 75.0)
        .with(SPO2, 98.0)
        .with(BLOOD_PRESSURE, Reading::pressure(120.0, 80.0))
        .with("rr", 16.0)
        .with("etco2", 38.0)
}

fn recorded_engine() -> (AlarmEngine, RecordingSink) {
    let mut engine = AlarmEngine::standard();
    let sink = RecordingSink::new();
    engine.set_sink(Box::new(sink.clone()));
    (engine, sink)
}

/// Offset of each event from `entered`, in milliseconds.
fn offsets(events: &[FireEvent], entered: DateTime<Utc>) -> Vec<i64> {
    events
        .iter()
        .map(|e| (e.fired_at - entered).num_milliseconds())
        .collect()
}

#[test]
fn heart_rate_escalates_through_all_phases() {
    let (mut engine, sink) = recorded_engine();
    let mut hr_values = vec![75.0, 75.0];
    hr_values.extend(std::iter::repeat_n(30.0, 60));

    let mut phases = Vec::new();
    for (tick, hr) in hr_values.into_iter().enumerate() {
        let now = at_ms(tick as i64 * TICK_MS);
        engine.tick_at(&baseline().with(HEART_RATE, hr), now);
        phases.push(engine.query_states()[HEART_RATE].escalation_phase);
    }

    // Critical from the third tick, at t = 1000 ms.
    assert_eq!(phases[1], EscalationPhase::None);
    assert_eq!(phases[2], EscalationPhase::Awareness);
    let entered = at_ms(1_000);
    assert_eq!(
        engine.channel_state(HEART_RATE).unwrap().critical_entered_at,
        Some(entered)
    );

    // Index = 2 + elapsed / 500.
    assert_eq!(phases[2 + 14], EscalationPhase::Awareness); // 7.0 s
    assert_eq!(phases[2 + 15], EscalationPhase::Persistence); // 7.5 s
    assert_eq!(phases[2 + 40], EscalationPhase::Persistence); // 20.0 s
    assert_eq!(phases[2 + 41], EscalationPhase::Neglect); // 20.5 s
    assert_eq!(phases[61], EscalationPhase::Neglect);

    let hr_events: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| e.channel == HEART_RATE)
        .collect();
    assert_eq!(
        offsets(&hr_events, entered),
        vec![0, 7_500, 11_500, 15_500, 19_500, 21_500, 23_500, 25_500, 27_500, 29_500]
    );
    assert_eq!(hr_events[0].phase, EscalationPhase::Awareness);
    assert_eq!(hr_events[1].phase, EscalationPhase::Persistence);
    assert_eq!(hr_events[5].phase, EscalationPhase::Neglect);
    assert!(hr_events.iter().all(|e| e.severity == Severity::Critical));
}

#[test]
fn warning_escalates_on_its_own_timeline() {
    let (mut engine, sink) = recorded_engine();
    let readings = baseline().with(SPO2, 90.0);

    for tick in 0..=80 {
        engine.tick_at(&readings, at_ms(tick * TICK_MS));
    }

    assert_eq!(
        offsets(&sink.events(), t0()),
        vec![0, 10_500, 16_500, 22_500, 28_500, 31_500, 34_500, 37_500]
    );
    assert_eq!(
        engine.query_states()[SPO2].escalation_phase,
        EscalationPhase::Neglect
    );
}

#[test]
fn acknowledged_desaturation_stays_silent() {
    let (mut engine, sink) = recorded_engine();
    let readings = baseline().with(SPO2, 80.0);

    engine.tick_at(&readings, t0());
    assert_eq!(sink.drain().len(), 1);
    assert!(engine.acknowledge(SPO2));

    for tick in 1..=60 {
        let report = engine.tick_at(&readings, at_ms(tick * TICK_MS));
        assert!(report.fired.is_empty(), "fired at tick {tick}");
    }
    assert!(sink.is_empty());

    let snap = engine.query_states()[SPO2];
    assert_eq!(snap.severity, Severity::Critical);
    assert!(snap.acknowledged);
    assert_eq!(snap.escalation_phase, EscalationPhase::Awareness);
}

#[test]
fn severity_change_revokes_acknowledgment() {
    let (mut engine, sink) = recorded_engine();

    engine.tick_at(&baseline().with(SPO2, 90.0), t0());
    engine.acknowledge(SPO2);
    engine.tick_at(&baseline().with(SPO2, 90.0), at_ms(500));
    assert_eq!(sink.len(), 1);

    let report = engine.tick_at(&baseline().with(SPO2, 80.0), at_ms(1_000));

    assert_eq!(
        report.transitions,
        vec![(SPO2.to_string(), Transition::Entered(Severity::Critical))]
    );
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].severity, Severity::Critical);
    assert_eq!(events[1].phase, EscalationPhase::Awareness);
    assert!(!engine.query_states()[SPO2].acknowledged);
}

#[test]
fn return_to_normal_starts_a_fresh_episode() {
    let (mut engine, sink) = recorded_engine();

    engine.tick_at(&baseline().with(HEART_RATE, 30.0), t0());
    engine.acknowledge(HEART_RATE);
    engine.tick_at(&baseline(), at_ms(500));

    let snap = engine.query_states()[HEART_RATE];
    assert_eq!(snap.severity, Severity::Normal);
    assert!(!snap.acknowledged);
    assert_eq!(snap.escalation_phase, EscalationPhase::None);

    engine.tick_at(&baseline().with(HEART_RATE, 30.0), at_ms(1_000));
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].fired_at, at_ms(1_000));
    assert_eq!(
        engine.channel_state(HEART_RATE).unwrap().critical_entered_at,
        Some(at_ms(1_000))
    );
}

#[test]
fn low_mean_arterial_pressure_is_critical() {
    let (mut engine, sink) = recorded_engine();
    let map = BloodPressure::mean_arterial(65.0, 40.0);
    assert!((map - 48.333).abs() < 0.001);

    engine.tick_at(
        &baseline().with(BLOOD_PRESSURE, Reading::pressure(65.0, 40.0)),
        t0(),
    );

    let snap = engine.query_states()[BLOOD_PRESSURE];
    assert_eq!(snap.severity, Severity::Critical);
    assert_eq!(snap.current_value, Some(Reading::pressure(65.0, 40.0)));
    assert_eq!(sink.events()[0].channel, BLOOD_PRESSURE);
}

#[test]
fn sustained_severity_does_not_starve_escalation() {
    let (mut engine, sink) = recorded_engine();
    let readings = baseline().with(HEART_RATE, 0.0);

    for tick in 0..=60 {
        let report = engine.tick_at(&readings, at_ms(tick * TICK_MS));
        if tick > 0 {
            assert!(report.transitions.is_empty(), "re-entered at tick {tick}");
        }
    }

    assert_eq!(
        engine.channel_state(HEART_RATE).unwrap().critical_entered_at,
        Some(t0())
    );
    assert!(sink.len() > 1);
    assert_eq!(
        engine.query_states()[HEART_RATE].escalation_phase,
        EscalationPhase::Neglect
    );
}

#[test]
fn query_states_is_a_pure_read() {
    let (mut engine, _sink) = recorded_engine();
    engine.tick_at(&baseline().with(HEART_RATE, 150.0), t0());
    engine.tick_at(&baseline().with(HEART_RATE, 150.0), at_ms(12_000));

    let first = engine.query_states();
    let second = engine.query_states();
    assert_eq!(first, second);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["hr"]["severity"], "warning");
    assert_eq!(json["hr"]["escalation_phase"], "persistence");
    assert_eq!(json["bp"]["current_value"]["sys"], 120.0);
}

#[test]
fn monitor_feed_drives_master_indicator() {
    let (mut engine, sink) = recorded_engine();
    engine.register_channel(RHYTHM, Box::new(CardiacRhythm)).unwrap();

    let arrest = Readings::from_json(
        r#"{"vs_hr": 0, "vs_spo2": 97, "rhythm": "VFib", "bp": {"sys": 120, "dia": 80}}"#,
    )
    .unwrap();
    let report = engine.tick_at(&arrest, t0());

    assert_eq!(engine.highest_severity(), Severity::Critical);
    let fired: Vec<_> = report.fired.iter().map(|e| e.channel.as_str()).collect();
    assert_eq!(fired, vec![HEART_RATE, RHYTHM]);
    assert_eq!(
        engine.query_states()[RHYTHM].current_value,
        Some(Reading::Rhythm(Rhythm::Vfib))
    );

    let rosc = Readings::from_json(r#"{"vs_hr": 88, "vs_spo2": 97, "rhythm": "sinus"}"#).unwrap();
    let report = engine.tick_at(&rosc, at_ms(500));

    assert_eq!(report.cleared, vec![HEART_RATE.to_string(), RHYTHM.to_string()]);
    assert_eq!(sink.cleared_channels(), report.cleared);
    assert_eq!(engine.highest_severity(), Severity::Normal);
}

fn hr_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(75.0),
        Just(45.0),
        Just(130.0),
        Just(30.0),
        Just(0.0),
        Just(170.0),
    ]
}

proptest! {
    #[test]
    fn prop_engine_invariants_hold(
        steps in proptest::collection::vec((hr_value(), any::<bool>()), 1..120),
    ) {
        let (mut engine, _sink) = recorded_engine();
        let policy = EscalationPolicy::default();
        let mut last_fire: Option<DateTime<Utc>> = None;

        for (tick, (hr, ack)) in steps.into_iter().enumerate() {
            let now = at_ms(tick as i64 * TICK_MS);
            let report = engine.tick_at(&baseline().with(HEART_RATE, hr), now);

            if report.transitions.iter().any(|(name, _)| name == HEART_RATE) {
                last_fire = None;
            }

            for event in report.fired.iter().filter(|e| e.channel == HEART_RATE) {
                prop_assert!(event.severity.is_abnormal());
                prop_assert_ne!(event.phase, EscalationPhase::None);

                let interval = policy
                    .timings(event.severity)
                    .and_then(|t| t.interval(event.phase));
                match (last_fire, interval) {
                    (Some(prev), Some(interval)) => {
                        let gap = (now - prev).to_std().unwrap();
                        prop_assert!(gap >= interval);
                    }
                    (Some(_), None) => prop_assert!(false, "awareness fired twice"),
                    (None, _) => {}
                }
                last_fire = Some(now);
            }

            let snap = engine.query_states()[HEART_RATE];
            if snap.severity == Severity::Normal {
                prop_assert_eq!(snap.escalation_phase, EscalationPhase::None);
                prop_assert!(!snap.acknowledged);
            }
            if snap.acknowledged {
                prop_assert_eq!(snap.escalation_phase, EscalationPhase::Awareness);
            }

            if ack {
                engine.acknowledge(HEART_RATE);
            }
        }
    }
}
