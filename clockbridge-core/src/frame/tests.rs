#[cfg(test)]
mod tests {
    use crate::frame::*;
    use crate::types::{ClockTime, RunMode};

    // The original firmware shipped these frames as literals; they pin the
    // builders and the checksum in one go.
    #[test]
    fn test_golden_frames() {
        assert_eq!(change_state(), [0x20, 0x06, 0x0b, 0x39, 0xb9]);
        assert_eq!(ping(), [0x20, 0x05, 0x0d, 0x46]);
        assert_eq!(set_central_control(), [0x20, 0x05, 0x0f, 0x48]);
        assert_eq!(end_display(), [0x20, 0x05, 0x07, 0x70]);
    }

    #[test]
    fn test_display_empty_frame() {
        let expected = [
            0x20, 0x15, 0x06, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
            0xff, 0x00, 0x03, 0x01, 0x01, 0xfc,
        ];
        assert_eq!(display_empty(), expected);
    }

    #[test]
    fn test_display_pads_and_copies_text() {
        let frame = display("HELLO", 8, DOT_COLON, DOT_FLAG);
        assert_eq!(&frame[3..8], b"HELLO");
        assert_eq!(&frame[8..14], b"      ");
        assert_eq!(frame[15], 8);
        assert_eq!(frame[17], DOT_COLON);
        assert_eq!(frame[18], DOT_FLAG);
        assert!(crate::crc::verify(&frame));
    }

    #[test]
    fn test_set_and_run_five_minutes() {
        let time = ClockTime {
            left_hours: 0,
            left_minutes: 5,
            left_seconds: 0,
            right_hours: 0,
            right_minutes: 5,
            right_seconds: 0,
        };
        let frame = set_and_run(&time, RunMode::CountDown, RunMode::CountDown);
        assert_eq!(frame[4], 0x05);
        assert_eq!(frame[7], 0x05);
        assert_eq!(frame[9], 0x05);
        assert!(crate::crc::verify(&frame));
    }

    #[test]
    fn test_set_and_run_bcd_fields() {
        let time = ClockTime {
            left_hours: 1,
            left_minutes: 30,
            left_seconds: 45,
            right_hours: 2,
            right_minutes: 59,
            right_seconds: 1,
        };
        let frame = set_and_run(&time, RunMode::CountUp, RunMode::Stop);
        assert_eq!(frame[3], 0x01);
        assert_eq!(frame[4], 0x30);
        assert_eq!(frame[5], 0x45);
        assert_eq!(frame[6], 0x02);
        assert_eq!(frame[7], 0x59);
        assert_eq!(frame[8], 0x01);
        assert_eq!(frame[9], 0x02);
    }

    #[test]
    fn test_bcd_round_trip() {
        for value in 0..=59 {
            assert_eq!(bcd_decode(bcd_encode(value)), value);
        }
    }

    #[test]
    fn test_classify_ack() {
        let frame = [0x10, 0x08, 0x01, CMD_SET_CENTRAL_CONTROL, 0x00];
        assert_eq!(classify(&frame), Ok(Inbound::Ack(0x0f)));

        // Four bytes is one short of an ACK.
        assert_eq!(
            classify(&[0x10, 0x08, 0x01, 0x0f]),
            Err(InboundError::AckTooShort)
        );
    }

    #[test]
    fn test_classify_ping_response() {
        assert_eq!(classify(&PING_RESPONSE), Ok(Inbound::PingResponse));
        let mut bad = PING_RESPONSE;
        bad[3] = 0x23;
        assert_eq!(classify(&bad), Err(InboundError::BadPingResponse));
    }

    fn time_frame(lh: u8, lm: u8, ls: u8, rh: u8, rm: u8, rs: u8) -> [u8; 14] {
        [
            0x10,
            0x18,
            MSG_TIME,
            0x00,
            lh,
            bcd_encode(lm),
            bcd_encode(ls),
            0x00,
            0x00,
            0x00,
            rh,
            bcd_encode(rm),
            bcd_encode(rs),
            0x00,
        ]
    }

    #[test]
    fn test_classify_time() {
        let frame = time_frame(1, 23, 45, 0, 5, 0);
        let expected = ClockTime {
            left_hours: 1,
            left_minutes: 23,
            left_seconds: 45,
            right_hours: 0,
            right_minutes: 5,
            right_seconds: 0,
        };
        assert_eq!(classify(&frame), Ok(Inbound::Time(expected)));
    }

    #[test]
    fn test_time_out_of_range_dropped() {
        // 0x77 decodes to 77 minutes, outside the valid range.
        let mut frame = time_frame(0, 0, 0, 0, 0, 0);
        frame[5] = 0x77;
        assert_eq!(classify(&frame), Err(InboundError::TimeOutOfRange));

        // Hour nibbles above nine are equally invalid.
        let mut frame = time_frame(0, 0, 0, 0, 0, 0);
        frame[10] = 0x0a;
        assert_eq!(classify(&frame), Err(InboundError::TimeOutOfRange));
    }

    #[test]
    fn test_time_echo_dropped() {
        let mut frame = [0u8; 20];
        frame[..14].copy_from_slice(&time_frame(0, 1, 0, 0, 1, 0));
        frame[1] = 0x18;
        frame[19] = 1;
        assert_eq!(classify(&frame), Err(InboundError::TimeEcho));
    }

    #[test]
    fn test_classify_button() {
        let frame = [0x10, 0x06, MSG_BUTTON, 0x04, 0x00];
        assert_eq!(
            classify(&frame),
            Ok(Inbound::Button {
                current: 0x04,
                previous: 0x00
            })
        );
    }

    #[test]
    fn test_foreign_and_unknown_frames() {
        assert_eq!(classify(&[0x10, 0x02]), Err(InboundError::TooShort));
        assert_eq!(
            classify(&[0x42, 0x08, 0x01, 0x0f, 0x00]),
            Err(InboundError::NotForUs)
        );
        assert_eq!(
            classify(&[0x10, 0x05, 0x09, 0x00, 0x00]),
            Err(InboundError::UnknownType(0x09))
        );
    }
}
