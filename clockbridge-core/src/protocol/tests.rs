#[cfg(test)]
mod tests {
    use crate::command::CommandId;
    use crate::protocol::*;
    use crate::types::{ClockTime, ErrorCode};

    fn id(text: &str) -> CommandId {
        let mut out = CommandId::new();
        out.push_str(text).unwrap();
        out
    }

    #[test]
    fn test_success_response_shape() {
        let response = CommandResponse {
            id: id("c1"),
            timestamp: 42,
            result: Ok(CommandResult::Message {
                status: "Time set successfully",
            }),
        };
        assert_eq!(
            response.to_json().unwrap().as_str(),
            r#"{"type":"command_response","id":"c1","status":"success","result":{"status":"Time set successfully"}}"#
        );
    }

    #[test]
    fn test_error_response_shape() {
        let response = CommandResponse {
            id: id("x"),
            timestamp: 42,
            result: Err(CommandFailure {
                code: ErrorCode::JsonInvalidCommand,
                message: error_message("Unknown command"),
            }),
        };
        assert_eq!(
            response.to_json().unwrap().as_str(),
            r#"{"type":"command_response","id":"x","status":"error","data":{"errorCode":6,"errorMessage":"Unknown command"}}"#
        );
    }

    #[test]
    fn test_time_result_shape() {
        let time = ClockTime {
            left_hours: 1,
            left_minutes: 30,
            left_seconds: 0,
            right_hours: 0,
            right_minutes: 45,
            right_seconds: 9,
        };
        let response = CommandResponse {
            id: id("t"),
            timestamp: 0,
            result: Ok(CommandResult::Time(time.into())),
        };
        assert_eq!(
            response.to_json().unwrap().as_str(),
            r#"{"type":"command_response","id":"t","status":"success","result":{"leftHours":1,"leftMinutes":30,"leftSeconds":0,"rightHours":0,"rightMinutes":45,"rightSeconds":9}}"#
        );
    }

    #[test]
    fn test_time_event_shape() {
        let event = ClockEvent {
            kind: EventKind::TimeUpdate,
            timestamp: 1234,
            priority: PRIORITY_NORMAL,
            seq: 7,
            data: EventData::Time(ClockTime::zero().into()),
        };
        assert_eq!(
            event.to_json().unwrap().as_str(),
            r#"{"type":"timeUpdate","timestamp":1234,"data":{"leftHours":0,"leftMinutes":0,"leftSeconds":0,"rightHours":0,"rightMinutes":0,"rightSeconds":0}}"#
        );
    }

    #[test]
    fn test_button_event_shapes() {
        let event = ClockEvent {
            kind: EventKind::ButtonEvent,
            timestamp: 5,
            priority: PRIORITY_HIGH,
            seq: 1,
            data: EventData::Button(ButtonFields {
                button: "play_pause",
                button_code: 4,
                is_repeat: false,
                repeat_count: None,
            }),
        };
        assert_eq!(
            event.to_json().unwrap().as_str(),
            r#"{"type":"buttonEvent","timestamp":5,"data":{"button":"play_pause","buttonCode":4,"isRepeat":false}}"#
        );

        let repeat = ClockEvent {
            kind: EventKind::ButtonEvent,
            timestamp: 900,
            priority: PRIORITY_HIGH,
            seq: 2,
            data: EventData::Button(ButtonFields {
                button: "play_pause",
                button_code: 4,
                is_repeat: true,
                repeat_count: Some(1),
            }),
        };
        assert_eq!(
            repeat.to_json().unwrap().as_str(),
            r#"{"type":"buttonEvent","timestamp":900,"data":{"button":"play_pause","buttonCode":4,"isRepeat":true,"repeatCount":1}}"#
        );
    }

    #[test]
    fn test_connection_event_shape() {
        let event = ClockEvent {
            kind: EventKind::ConnectionStatus,
            timestamp: 1,
            priority: PRIORITY_NORMAL,
            seq: 0,
            data: EventData::Connection {
                connected: true,
                configured: true,
            },
        };
        assert_eq!(
            event.to_json().unwrap().as_str(),
            r#"{"type":"connectionStatus","timestamp":1,"data":{"connected":true,"configured":true}}"#
        );
    }

    #[test]
    fn test_event_ordering_key() {
        let make = |priority, seq| ClockEvent {
            kind: EventKind::ConnectionStatus,
            timestamp: 0,
            priority,
            seq,
            data: EventData::Connection {
                connected: false,
                configured: false,
            },
        };
        // High priority sorts ahead of normal regardless of arrival order.
        assert!(make(PRIORITY_HIGH, 9) < make(PRIORITY_NORMAL, 1));
        // Within a class, earlier sequence numbers drain first.
        assert!(make(PRIORITY_HIGH, 1) < make(PRIORITY_HIGH, 2));
        assert!(make(PRIORITY_NORMAL, 3) < make(PRIORITY_NORMAL, 4));
    }

    #[test]
    fn test_status_snapshot_round_trips_keys() {
        let snapshot = StatusSnapshot {
            system_state: "Active",
            ble_connected: true,
            dgt_connected: true,
            dgt_configured: false,
            uptime: 100,
            temperature: 23,
            commands_processed: 3,
            events_generated: 9,
            notifications_sent: 8,
            notifications_failed: 1,
            raw_cmd_queue_depth: 0,
            evt_queue_depth: 2,
            resp_queue_depth: 0,
            queues_healthy: true,
        };
        let json = snapshot.to_json().unwrap();
        assert!(json.as_str().starts_with(r#"{"systemState":"Active""#));
        assert!(json.as_str().contains(r#""dgtConfigured":false"#));
        assert!(json.as_str().contains(r#""temperature":23"#));
        assert!(json.as_str().contains(r#""queuesHealthy":true"#));
    }

    #[test]
    fn test_error_message_truncates() {
        let raw = [b'x'; 200];
        let message = error_message(core::str::from_utf8(&raw).unwrap());
        assert_eq!(message.len(), 128);
    }
}
