use chrono::NaiveDateTime;

use smartpark::bays::BayId;
use smartpark::codec::{
    self, BusEvent, CodecError, DisplayUpdate, EventKind, MAX_PAYLOAD_LEN,
};
use smartpark::Car;

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn entered_car() -> Car {
    let mut car = Car::new("QLD-042", "ModelB");
    car.enter(21.5, ts("2026-08-05 10:00:00")).unwrap();
    car
}

#[test]
fn test_sensor_event_encoding_is_exact() {
    let payload =
        codec::encode_sensor_event(EventKind::Enter, 21.5, ts("2026-08-05 10:00:00")).unwrap();
    assert_eq!(payload.as_str(), "Enter,21.50,2026-08-05 10:00:00");

    let payload =
        codec::encode_sensor_event(EventKind::Exit, 19.0, ts("2026-08-05 11:00:00")).unwrap();
    assert_eq!(payload.as_str(), "Exit,19.00,2026-08-05 11:00:00");
}

#[test]
fn test_sensor_event_round_trip() {
    let payload =
        codec::encode_sensor_event(EventKind::Enter, 23.25, ts("2026-08-05 10:00:00")).unwrap();
    match codec::decode_event(&payload).unwrap() {
        BusEvent::Enter(reading) => {
            assert_eq!(reading.temperature, 23.25);
            assert_eq!(reading.timestamp, ts("2026-08-05 10:00:00"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_decode_rounds_temperatures() {
    match codec::decode_event("Enter,21.456,2026-08-05 10:00:00").unwrap() {
        BusEvent::Enter(reading) => assert_eq!(reading.temperature, 21.46),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_unknown_event_token_is_rejected() {
    let err = codec::decode_event("Hover,21.00,2026-08-05 10:00:00").unwrap_err();
    assert_eq!(err, CodecError::UnknownEvent("Hover".to_string()));
}

#[test]
fn test_empty_payload_is_rejected() {
    assert_eq!(codec::decode_event("  "), Err(CodecError::EmptyPayload));
}

#[test]
fn test_oversized_payload_is_rejected() {
    let payload = "Enter,".to_string() + &"9".repeat(MAX_PAYLOAD_LEN);
    assert_eq!(
        codec::decode_event(&payload),
        Err(CodecError::PayloadTooLarge)
    );
}

#[test]
fn test_malformed_sensor_fields_are_rejected() {
    assert!(matches!(
        codec::decode_event("Enter"),
        Err(CodecError::MissingField("temperature"))
    ));
    assert!(matches!(
        codec::decode_event("Enter,21.5"),
        Err(CodecError::MissingField("timestamp"))
    ));
    assert!(matches!(
        codec::decode_event("Enter,warm,2026-08-05 10:00:00"),
        Err(CodecError::InvalidTemperature(_))
    ));
    assert!(matches!(
        codec::decode_event("Enter,21.5,yesterday"),
        Err(CodecError::InvalidTimestamp(_))
    ));
}

#[test]
fn test_quit_event_decodes() {
    assert_eq!(codec::decode_event("Quit").unwrap(), BusEvent::Quit);
}

#[test]
fn test_bay_event_round_trip_with_car() {
    let car = entered_car();
    let bay = BayId::new("bay_3");
    let payload = codec::encode_bay_event(
        EventKind::Parked,
        &bay,
        Some(22.0),
        Some(ts("2026-08-05 10:30:00")),
        Some(&car),
    )
    .unwrap();

    match codec::decode_event(&payload).unwrap() {
        BusEvent::Parked(event) => {
            assert_eq!(event.bay, Some(bay));
            assert_eq!(event.temperature, Some(22.0));
            assert_eq!(event.timestamp, Some(ts("2026-08-05 10:30:00")));
            assert_eq!(event.car, Some(car));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_bay_request_leaves_selection_to_the_coordinator() {
    let payload =
        codec::encode_bay_request(EventKind::Parked, 22.0, ts("2026-08-05 10:30:00")).unwrap();
    assert_eq!(payload.as_str(), "Parked,null,22.00,2026-08-05 10:30:00;null");

    match codec::decode_event(&payload).unwrap() {
        BusEvent::Parked(event) => {
            assert!(event.bay.is_none());
            assert!(event.car.is_none());
            assert_eq!(event.temperature, Some(22.0));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_display_round_trip() {
    let update = DisplayUpdate {
        available_bays: 3,
        temperature: Some(21.5),
        timestamp: Some(ts("2026-08-05 10:00:00")),
    };
    let payload = codec::encode_display(&update).unwrap();
    assert_eq!(payload.as_str(), "3;21.50;2026-08-05 10:00:00");
    assert_eq!(codec::decode_display(&payload).unwrap(), update);
}

#[test]
fn test_display_serializes_missing_optionals_as_null() {
    let update = DisplayUpdate {
        available_bays: 0,
        temperature: None,
        timestamp: None,
    };
    let payload = codec::encode_display(&update).unwrap();
    assert_eq!(payload.as_str(), "0;null;null");
    assert_eq!(codec::decode_display(&payload).unwrap(), update);
}

#[test]
fn test_display_rejects_bad_counts() {
    assert!(matches!(
        codec::decode_display("many;21.00;2026-08-05 10:00:00"),
        Err(CodecError::InvalidBayCount(_))
    ));
}

#[test]
fn test_car_json_round_trip() {
    let mut car = entered_car();
    car.park().unwrap();
    let json = codec::encode_car_json(&car).unwrap();
    assert_eq!(codec::decode_car_json(&json).unwrap(), car);
}

#[test]
fn test_car_json_round_trip_with_all_optionals_null() {
    let car = Car::new("QLD-042", "ModelB");
    let json = codec::encode_car_json(&car).unwrap();
    assert!(json.contains("\"entry_time\":null"));
    assert_eq!(codec::decode_car_json(&json).unwrap(), car);
}

#[test]
fn test_car_json_uses_the_wall_clock_format() {
    let car = entered_car();
    let json = codec::encode_car_json(&car).unwrap();
    assert!(json.contains("\"entry_time\":\"2026-08-05 10:00:00\""));
}

#[test]
fn test_car_csv_encoding_is_exact() {
    let mut car = entered_car();
    car.park().unwrap();
    assert_eq!(
        codec::encode_car_csv(&car),
        "QLD-042,ModelB,2026-08-05 10:00:00,null,21.50,null,True"
    );

    let blank = Car::new("QLD-042", "ModelB");
    assert_eq!(
        codec::encode_car_csv(&blank),
        "QLD-042,ModelB,null,null,null,null,False"
    );
}

#[test]
fn test_car_csv_round_trip() {
    let mut car = entered_car();
    car.exit(19.75, ts("2026-08-05 12:00:00")).unwrap();
    let csv = codec::encode_car_csv(&car);
    assert_eq!(codec::decode_car_csv(&csv).unwrap(), car);

    let blank = Car::new("QLD-042", "ModelB");
    let csv = codec::encode_car_csv(&blank);
    assert_eq!(codec::decode_car_csv(&csv).unwrap(), blank);
}

#[test]
fn test_car_json_and_csv_forms_agree() {
    let mut car = entered_car();
    car.park().unwrap();
    let via_json = codec::decode_car_json(&codec::encode_car_json(&car).unwrap()).unwrap();
    let via_csv = codec::decode_car_csv(&codec::encode_car_csv(&car)).unwrap();
    assert_eq!(via_json, via_csv);
}

#[test]
fn test_car_csv_rejects_malformed_records() {
    assert!(matches!(
        codec::decode_car_csv("QLD-042,ModelB,null,null"),
        Err(CodecError::InvalidCar(_))
    ));
    assert!(matches!(
        codec::decode_car_csv("QLD-042,ModelB,null,null,null,null,maybe"),
        Err(CodecError::InvalidBool(_))
    ));
}
