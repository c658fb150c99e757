#[cfg(test)]
mod tests {
    use crate::command::*;
    use crate::frame::{DOT_COLON, DOT_EXTRA};
    use crate::types::{ClockTime, ErrorCode, RunMode};

    fn respond(payload: &[u8]) -> (CommandId, Result<Command<'_>, (ErrorCode, &'static str)>) {
        match parse_command(payload) {
            ParseOutcome::Respond { id, parsed } => (id, parsed),
            ParseOutcome::Discard => panic!("payload was discarded"),
        }
    }

    #[test]
    fn test_set_time() {
        let payload = br#"{"id":"c1","command":"setTime","params":{"leftMode":1,"leftHours":0,"leftMinutes":5,"leftSeconds":0,"rightMode":1,"rightHours":0,"rightMinutes":5,"rightSeconds":0}}"#;
        let (id, parsed) = respond(payload);
        assert_eq!(id.as_str(), "c1");
        assert_eq!(
            parsed,
            Ok(Command::SetTime {
                time: ClockTime {
                    left_hours: 0,
                    left_minutes: 5,
                    left_seconds: 0,
                    right_hours: 0,
                    right_minutes: 5,
                    right_seconds: 0,
                },
                left_mode: RunMode::CountDown,
                right_mode: RunMode::CountDown,
            })
        );
    }

    #[test]
    fn test_set_time_rejects_bad_ranges() {
        let payload = br#"{"id":"c2","command":"setTime","params":{"leftMode":1,"leftHours":10,"rightMode":1}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Err((ErrorCode::JsonInvalidParameters, "Invalid time parameters"))
        );

        let payload = br#"{"id":"c3","command":"setTime","params":{"leftMode":3}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Err((ErrorCode::JsonInvalidParameters, "Invalid time parameters"))
        );
    }

    #[test]
    fn test_set_time_defaults_missing_fields_to_zero() {
        let payload = br#"{"id":"c4","command":"setTime","params":{"leftMinutes":5}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Ok(Command::SetTime {
                time: ClockTime {
                    left_minutes: 5,
                    ..ClockTime::zero()
                },
                left_mode: RunMode::Stop,
                right_mode: RunMode::Stop,
            })
        );
    }

    #[test]
    fn test_unknown_command() {
        let (id, parsed) = respond(br#"{"id":"x","command":"foo"}"#);
        assert_eq!(id.as_str(), "x");
        assert_eq!(
            parsed,
            Err((ErrorCode::JsonInvalidCommand, "Unknown command"))
        );
    }

    #[test]
    fn test_missing_id_discarded() {
        assert_eq!(
            parse_command(br#"{"command":"getTime"}"#),
            ParseOutcome::Discard
        );
    }

    #[test]
    fn test_missing_command_field() {
        let (_, parsed) = respond(br#"{"id":"y"}"#);
        assert_eq!(
            parsed,
            Err((
                ErrorCode::JsonInvalidCommand,
                "Missing 'id' or 'command' field"
            ))
        );
    }

    #[test]
    fn test_broken_json_with_recoverable_id() {
        let (id, parsed) = respond(br#"{"id":"z","command":"#);
        assert_eq!(id.as_str(), "z");
        assert_eq!(parsed, Err((ErrorCode::JsonParseError, "JSON parse error")));
    }

    #[test]
    fn test_broken_json_without_id_discarded() {
        assert_eq!(parse_command(br#"{"comm"#), ParseOutcome::Discard);
        assert_eq!(parse_command(b"not json at all"), ParseOutcome::Discard);
    }

    #[test]
    fn test_display_text() {
        let payload = br#"{"id":"d1","command":"displayText","params":{"text":"HELLO","beep":10,"leftDots":8}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Ok(Command::DisplayText {
                text: "HELLO",
                beep: 10,
                left_dots: DOT_COLON,
                right_dots: 0,
            })
        );
    }

    #[test]
    fn test_display_text_validation() {
        // Twelve characters is one too many.
        let payload =
            br#"{"id":"d2","command":"displayText","params":{"text":"TWELVE CHARS"}}"#;
        let (_, parsed) = respond(payload);
        assert!(parsed.is_err());

        // Beep tops out at 48.
        let payload = br#"{"id":"d3","command":"displayText","params":{"text":"OK","beep":49}}"#;
        let (_, parsed) = respond(payload);
        assert!(parsed.is_err());

        // Text is mandatory.
        let payload = br#"{"id":"d4","command":"displayText","params":{"beep":1}}"#;
        let (_, parsed) = respond(payload);
        assert!(parsed.is_err());

        // The extra icon only exists on the left display.
        let payload = br#"{"id":"d5","command":"displayText","params":{"text":"OK","rightDots":32}}"#;
        let (_, parsed) = respond(payload);
        assert!(parsed.is_err());
        let payload = br#"{"id":"d6","command":"displayText","params":{"text":"OK","leftDots":32}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Ok(Command::DisplayText {
                text: "OK",
                beep: 0,
                left_dots: DOT_EXTRA,
                right_dots: 0,
            })
        );
    }

    #[test]
    fn test_parameterless_commands() {
        for (name, expected) in [
            ("endDisplay", Command::EndDisplay),
            ("stop", Command::Stop),
            ("getTime", Command::GetTime),
            ("getStatus", Command::GetStatus),
        ] {
            let mut payload = heapless::String::<96>::new();
            payload.push_str("{\"id\":\"p\",\"command\":\"").unwrap();
            payload.push_str(name).unwrap();
            payload.push_str("\"}").unwrap();
            let (_, parsed) = respond(payload.as_bytes());
            assert_eq!(parsed, Ok(expected));
        }
    }

    #[test]
    fn test_run_modes() {
        let payload = br#"{"id":"r1","command":"run","params":{"leftMode":2,"rightMode":1}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Ok(Command::Run {
                left_mode: RunMode::CountUp,
                right_mode: RunMode::CountDown,
            })
        );

        let payload = br#"{"id":"r2","command":"run","params":{"leftMode":5}}"#;
        let (_, parsed) = respond(payload);
        assert_eq!(
            parsed,
            Err((ErrorCode::JsonInvalidParameters, "Invalid run parameters"))
        );
    }

    #[test]
    fn test_only_get_status_skips_the_clock() {
        let (_, parsed) = respond(br#"{"id":"s","command":"getStatus"}"#);
        assert!(!parsed.unwrap().requires_clock());
        let (_, parsed) = respond(br#"{"id":"t","command":"getTime"}"#);
        assert!(parsed.unwrap().requires_clock());
    }

    #[test]
    fn test_long_id_truncated() {
        let payload = br#"{"id":"abcdefghijklmnopqrstuvwxyz0123456789","command":"stop"}"#;
        let (id, _) = respond(payload);
        assert_eq!(id.len(), 32);
        assert_eq!(id.as_str(), "abcdefghijklmnopqrstuvwxyz012345");
    }
}
