use vesta::*;

const HOUSE: &str = r#"
controller:
  designation: "house"
  zones:
    - zone: "upstairs"
      designation: "Upstairs"
      individual_mode: hull-protection
    - zone: "downstairs"
      designation: "Downstairs"
      individual_mode: no-function
  notification:
    disarmed:
      enabled: true
      text: "System disarmed"
    full_protection:
      enabled: true
      text: "Full protection active"
  status_indicator:
    use_disarmed: true
    use_armed: true
  acknowledgement_tone:
    use_armed: true
zones:
  - name: "upstairs"
    designation: "Upstairs"
    sensors:
      - signal: "upstairs.front_door"
        designation: "Front door"
        category: door-window
        hull_protection: true
      - signal: "upstairs.hall_motion"
        designation: "Hall motion"
        category: motion
  - name: "downstairs"
    designation: "Downstairs"
    sensors:
      - signal: "downstairs.terrace_door"
        designation: "Terrace door"
        category: door-window
        hull_protection: true
"#;

fn build(yaml: &str) -> (
    Controller,
    SignalBus,
    tokio::sync::mpsc::UnboundedReceiver<EffectEvent>,
) {
    let bus = SignalBus::new();
    let (effects, events) = EffectSender::channel();
    let config = Config::from_yaml(yaml).unwrap();
    let controller = Controller::new(config, bus.clone(), effects).unwrap();
    (controller, bus, events)
}

/// Deliver every queued bus change to the controller, like the run loop
/// would, until the queue is dry.
fn settle(controller: &mut Controller, rx: &mut tokio::sync::mpsc::UnboundedReceiver<(String, Value)>) {
    while let Ok((signal, _)) = rx.try_recv() {
        controller.handle_member_change(&signal).unwrap();
    }
}

#[test]
fn test_arm_trip_disarm_cycle() {
    let (mut controller, bus, _events) = build(HOUSE);
    let mut changes = bus.subscribe_changes();

    // Arm the whole system
    assert!(controller.select_protection_mode(ProtectionMode::FullProtection, "test"));
    settle(&mut controller, &mut changes);

    assert_eq!(bus.get_int("house.mode").unwrap(), 1);
    assert_eq!(bus.get_bool("house.full_protection_control").unwrap(), true);
    assert_eq!(bus.get_int("house.system_state").unwrap(), 1);

    // Trip a sensor
    bus.set("upstairs.front_door", Value::Bool(true)).unwrap();
    settle(&mut controller, &mut changes);

    assert_eq!(bus.get_bool("house.alarm").unwrap(), true);
    assert_eq!(bus.get_bool("house.alarm_switch").unwrap(), true);
    assert_eq!(bus.get_bool("house.siren").unwrap(), true);
    assert_eq!(bus.get_bool("house.door_window").unwrap(), true);
    assert_eq!(bus.get_string("house.alerting_sensor").unwrap(), "Front door");

    // Disarm clears the alarm everywhere
    assert!(controller.select_protection_mode(ProtectionMode::Disarmed, "test"));
    settle(&mut controller, &mut changes);

    assert_eq!(bus.get_int("house.mode").unwrap(), 0);
    assert_eq!(bus.get_bool("house.alarm").unwrap(), false);
    assert_eq!(bus.get_bool("house.alarm_switch").unwrap(), false);
    assert_eq!(bus.get_bool("house.siren").unwrap(), false);
    assert_eq!(bus.get_int("house.system_state").unwrap(), 0);
}

#[test]
fn test_individual_protection_end_to_end() {
    let (mut controller, bus, _events) = build(HOUSE);
    let mut changes = bus.subscribe_changes();

    assert!(controller.select_protection_mode(ProtectionMode::IndividualProtection, "test"));
    settle(&mut controller, &mut changes);

    // upstairs follows its hull override, downstairs is skipped
    assert_eq!(bus.get_int("upstairs.mode").unwrap(), 2);
    assert_eq!(bus.get_int("downstairs.mode").unwrap(), 0);
    assert_eq!(
        bus.get_int("house.mode").unwrap(),
        ProtectionMode::IndividualProtection.code()
    );

    // A hull sensor trips, a motion sensor does not
    bus.set("upstairs.hall_motion", Value::Bool(true)).unwrap();
    settle(&mut controller, &mut changes);
    assert_eq!(bus.get_bool("house.alarm").unwrap(), false);
    assert_eq!(bus.get_bool("house.motion").unwrap(), true);

    bus.set("upstairs.front_door", Value::Bool(true)).unwrap();
    settle(&mut controller, &mut changes);
    assert_eq!(bus.get_bool("house.alarm").unwrap(), true);
}

#[test]
fn test_disabled_mode_changes_nothing() {
    let (mut controller, bus, _events) = build(
        r#"
controller:
  designation: "house"
  modes:
    hull_protection:
      enabled: false
  zones:
    - zone: "upstairs"
zones:
  - name: "upstairs"
"#,
    );

    let before = bus.snapshot();
    assert!(!controller.select_protection_mode(ProtectionMode::HullProtection, "test"));
    assert_eq!(bus.snapshot(), before);
}

#[test]
fn test_side_effect_ownership() {
    let (mut controller, _bus, mut events) = build(HOUSE);

    controller.select_protection_mode(ProtectionMode::FullProtection, "test");

    let mut notifications = 0;
    let mut indicators = 0;
    let mut tones = 0;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.owner(), "house");
        match event {
            EffectEvent::Notification { .. } => notifications += 1,
            EffectEvent::StatusIndicator { .. } => indicators += 1,
            EffectEvent::AcknowledgementTone { .. } => tones += 1,
            EffectEvent::Action { .. } => {}
        }
    }
    // Exactly one of each enabled category, all controller-owned
    assert_eq!(notifications, 1);
    assert_eq!(indicators, 1);
    assert_eq!(tones, 1);
}

#[test]
fn test_stale_aggregate_with_disabled_members() {
    let (mut controller, bus, _events) = build(
        r#"
controller:
  designation: "house"
  zones:
    - zone: "upstairs"
  members:
    door_window:
      - signal: "upstairs.door_window"
        enabled: false
zones:
  - name: "upstairs"
    sensors:
      - signal: "upstairs.front_door"
        category: door-window
"#,
    );
    let mut changes = bus.subscribe_changes();

    // Seed a published value, then trip the sensor; the disabled member
    // list must leave the aggregate untouched
    bus.set("house.door_window", Value::Bool(false)).unwrap();
    bus.set("upstairs.front_door", Value::Bool(true)).unwrap();
    settle(&mut controller, &mut changes);

    assert_eq!(bus.get_bool("house.door_window").unwrap(), false);
    // The zone itself still tracked the sensor
    assert_eq!(bus.get_bool("upstairs.door_window").unwrap(), true);
}

#[tokio::test]
async fn test_discovery_proposes_zone_refs() {
    let (_controller, bus, _events) = build(HOUSE);

    let refs = discovery::discover_zones(&bus, std::time::Duration::ZERO).await;
    let zones: Vec<_> = refs.iter().map(|r| r.zone.as_str()).collect();
    assert!(zones.contains(&"upstairs"));
    assert!(zones.contains(&"downstairs"));
}
