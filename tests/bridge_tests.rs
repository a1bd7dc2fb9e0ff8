use chrono::NaiveDateTime;

use smartpark::bridge::{BridgeError, BridgeState, BridgeTopics, CarParkBridge, Flow};
use smartpark::codec::{self, BusEvent};
use smartpark::error::ParkError;
use smartpark::records::RecordLog;
use smartpark::{ManagementCenter, SelectionPolicy};

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn topics() -> BridgeTopics {
    BridgeTopics::new(
        vec!["lot/L306/gate/na".to_string()],
        "lot/L306/bays/na".to_string(),
        "lot/L306/CarPark/display".to_string(),
        "lot".to_string(),
        "L306".to_string(),
    )
}

fn bridge_with_bays(num_bays: usize) -> CarParkBridge {
    let center = ManagementCenter::new(num_bays, SelectionPolicy::FirstAvailable).unwrap();
    CarParkBridge::new(center, topics())
}

#[test]
fn test_bridge_starts_stopped() {
    let bridge = bridge_with_bays(2);
    assert_eq!(bridge.state(), BridgeState::Stopped);
}

#[test]
fn test_enter_event_publishes_a_display_update() {
    let mut bridge = bridge_with_bays(2);
    let (flow, outbound) = bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].topic, "lot/L306/CarPark/display");

    let update = codec::decode_display(&outbound[0].payload).unwrap();
    assert_eq!(update.available_bays, 2);
    assert_eq!(update.temperature, Some(21.5));
    assert_eq!(update.timestamp, Some(ts("2026-08-05 10:00:00")));

    assert_eq!(bridge.center().num_cars_in_park(), 1);
}

#[test]
fn test_exit_with_no_eligible_car_is_silently_absorbed() {
    let mut bridge = bridge_with_bays(2);
    let (flow, outbound) = bridge
        .handle_payload("Exit,19.00,2026-08-05 11:00:00")
        .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert!(outbound.is_empty());
}

#[test]
fn test_exit_event_publishes_a_display_update() {
    let mut bridge = bridge_with_bays(2);
    bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();
    let (_, outbound) = bridge
        .handle_payload("Exit,19.00,2026-08-05 11:00:00")
        .unwrap();

    assert_eq!(outbound.len(), 1);
    let update = codec::decode_display(&outbound[0].payload).unwrap();
    assert_eq!(update.available_bays, 2);
    assert_eq!(update.temperature, Some(19.0));
    assert_eq!(update.timestamp, Some(ts("2026-08-05 11:00:00")));
    assert_eq!(bridge.center().num_cars_in_park(), 0);
}

#[test]
fn test_park_request_publishes_assignment_and_display() {
    let mut bridge = bridge_with_bays(2);
    bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();

    let (flow, outbound) = bridge
        .handle_payload("Parked,null,22.00,2026-08-05 10:15:00;null")
        .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(outbound.len(), 2);

    assert_eq!(outbound[0].topic, "lot/L306/bay_1/parked");
    match codec::decode_event(&outbound[0].payload).unwrap() {
        BusEvent::Parked(event) => {
            assert_eq!(event.bay.unwrap().as_str(), "bay_1");
            assert_eq!(event.temperature, Some(22.0));
            assert_eq!(event.timestamp, Some(ts("2026-08-05 10:15:00")));
            let car = event.car.unwrap();
            assert!(car.is_parked());
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert_eq!(outbound[1].topic, "lot/L306/CarPark/display");
    let update = codec::decode_display(&outbound[1].payload).unwrap();
    assert_eq!(update.available_bays, 1);
}

#[test]
fn test_park_request_with_no_waiting_car_is_silently_absorbed() {
    let mut bridge = bridge_with_bays(2);
    let (flow, outbound) = bridge
        .handle_payload("Parked,null,22.00,2026-08-05 10:15:00;null")
        .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert!(outbound.is_empty());
}

#[test]
fn test_unpark_round_trip_through_the_wire() {
    let mut bridge = bridge_with_bays(2);
    bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();
    let (_, outbound) = bridge
        .handle_payload("Parked,null,22.00,2026-08-05 10:15:00;null")
        .unwrap();

    // a bay sensor echoes the assignment payload back as a release
    let assignment = &outbound[0].payload;
    let release = assignment.replacen("Parked", "Unparked", 1);
    let (flow, outbound) = bridge.handle_payload(&release).unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(outbound.len(), 2);
    assert_eq!(outbound[0].topic, "lot/L306/bay_1/unparked");
    match codec::decode_event(&outbound[0].payload).unwrap() {
        BusEvent::Unparked(event) => {
            let car = event.car.unwrap();
            assert!(!car.is_parked());
        }
        other => panic!("unexpected event {other:?}"),
    }

    let update = codec::decode_display(&outbound[1].payload).unwrap();
    assert_eq!(update.available_bays, 2);
    assert_eq!(bridge.center().parked_cars().len(), 0);
}

#[test]
fn test_unpark_without_bay_or_car_is_incomplete() {
    let mut bridge = bridge_with_bays(2);
    let err = bridge
        .handle_payload("Unparked,null,22.00,2026-08-05 10:15:00;null")
        .unwrap_err();
    assert!(matches!(err, BridgeError::IncompleteBayEvent("bay")));
}

#[test]
fn test_unpark_on_unknown_bay_is_a_typed_failure() {
    let mut bridge = bridge_with_bays(2);
    bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();
    let (_, outbound) = bridge
        .handle_payload("Parked,null,22.00,2026-08-05 10:15:00;null")
        .unwrap();

    let release = outbound[0]
        .payload
        .replacen("Parked,bay_1", "Unparked,bay_9", 1);
    let err = bridge.handle_payload(&release).unwrap_err();
    assert!(matches!(err, BridgeError::Park(ParkError::NotFound(_))));
    // the failed release left the bay occupied
    assert_eq!(bridge.center().num_available_bays(), 1);
}

#[test]
fn test_unknown_token_is_a_codec_error() {
    let mut bridge = bridge_with_bays(2);
    let err = bridge.handle_payload("Teleport,21.00,now").unwrap_err();
    assert!(matches!(err, BridgeError::Codec(_)));
    assert_eq!(bridge.center().num_cars_in_park(), 0);
}

#[test]
fn test_quit_stops_the_flow() {
    let mut bridge = bridge_with_bays(2);
    let (flow, outbound) = bridge.handle_payload("Quit").unwrap();
    assert_eq!(flow, Flow::Stop);
    assert!(outbound.is_empty());
}

#[test]
fn test_exited_cars_are_appended_to_the_record_log() {
    let path = std::env::temp_dir().join(format!(
        "smartpark-records-{}-{:?}.txt",
        std::process::id(),
        std::thread::current().id()
    ));
    let _ = std::fs::remove_file(&path);

    let mut bridge = bridge_with_bays(2).with_record_log(RecordLog::new(&path));
    bridge
        .handle_payload("Enter,21.50,2026-08-05 10:00:00")
        .unwrap();
    bridge
        .handle_payload("Exit,19.00,2026-08-05 11:00:00")
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);
    let car = codec::decode_car_json(lines[0]).unwrap();
    assert_eq!(car.exit_time(), Some(ts("2026-08-05 11:00:00")));
    assert_eq!(car.exit_temperature(), Some(19.0));

    let _ = std::fs::remove_file(&path);
}
