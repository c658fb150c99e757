// frame.rs
//
// Construction and classification of DGT3000 I2C frames. Outbound frames
// open with the gateway's source address 0x20 and a length byte, and close
// with a CRC-8-ATM checksum (see crc.rs). Inbound frames open with our
// listen address 0x10 and carry a message type in the third byte.

use crate::crc;
use crate::types::{ClockTime, RunMode};

// I2C addressing.
pub const CLOCK_ADDR: u8 = 0x08;
pub const WAKEUP_ADDR: u8 = 0x28;
pub const LISTEN_DATA: u8 = 0x00;
pub const LISTEN_ACK: u8 = 0x10;
pub const I2C_FREQUENCY: u32 = 100_000;

/// First byte of every outbound frame.
pub const SOURCE_ADDR: u8 = 0x20;

// Command codes.
pub const CMD_CHANGE_STATE: u8 = 0x0b;
pub const CMD_SET_CENTRAL_CONTROL: u8 = 0x0f;
pub const CMD_SET_AND_RUN: u8 = 0x0a;
pub const CMD_END_DISPLAY: u8 = 0x07;
pub const CMD_DISPLAY: u8 = 0x06;
pub const CMD_PING: u8 = 0x0d;

// Inbound message types (buf[2]).
pub const MSG_ACK: u8 = 0x01;
pub const MSG_WAKEUP_RESPONSE: u8 = 0x02;
pub const MSG_TIME: u8 = 0x04;
pub const MSG_BUTTON: u8 = 0x05;

/// The fixed response a sleeping clock sends after a wake-up ping.
pub const PING_RESPONSE: [u8; 6] = [0x10, 0x07, 0x02, 0x22, 0x01, 0x05];

// Display limits and icon bitmasks.
pub const DISPLAY_TEXT_MAX: usize = 11;
/// Beep duration is in 62.5 ms units, three seconds tops.
pub const BEEP_MAX: u8 = 48;
pub const DOT_FLAG: u8 = 0x01;
pub const DOT_WHITE_KING: u8 = 0x02;
pub const DOT_BLACK_KING: u8 = 0x04;
pub const DOT_COLON: u8 = 0x08;
pub const DOT_DOT: u8 = 0x10;
/// Extra icon exists on the left display only.
pub const DOT_EXTRA: u8 = 0x20;
pub const LEFT_DOTS_MASK: u8 =
    DOT_FLAG | DOT_WHITE_KING | DOT_BLACK_KING | DOT_COLON | DOT_DOT | DOT_EXTRA;
pub const RIGHT_DOTS_MASK: u8 = DOT_FLAG | DOT_WHITE_KING | DOT_BLACK_KING | DOT_COLON | DOT_DOT;

/// Packs 0..=99 into binary-coded decimal.
pub fn bcd_encode(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub fn bcd_decode(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0f)
}

/// Change State doubles as the wake-up nudge during configuration.
pub fn change_state() -> [u8; 5] {
    let mut frame = [SOURCE_ADDR, 0x06, CMD_CHANGE_STATE, 0x39, 0x00];
    crc::seal(&mut frame);
    frame
}

/// Change State with a zero data byte powers the clock off.
pub fn power_off() -> [u8; 5] {
    let mut frame = [SOURCE_ADDR, 0x06, CMD_CHANGE_STATE, 0x00, 0x00];
    crc::seal(&mut frame);
    frame
}

pub fn set_central_control() -> [u8; 4] {
    let mut frame = [SOURCE_ADDR, 0x05, CMD_SET_CENTRAL_CONTROL, 0x00];
    crc::seal(&mut frame);
    frame
}

pub fn ping() -> [u8; 4] {
    let mut frame = [SOURCE_ADDR, 0x05, CMD_PING, 0x00];
    crc::seal(&mut frame);
    frame
}

pub fn end_display() -> [u8; 4] {
    let mut frame = [SOURCE_ADDR, 0x05, CMD_END_DISPLAY, 0x00];
    crc::seal(&mut frame);
    frame
}

/// Display text on the clock. `text` is truncated to eleven bytes and padded
/// with spaces; parameter validation happens above this layer.
pub fn display(text: &str, beep: u8, left_dots: u8, right_dots: u8) -> [u8; 20] {
    let mut frame = [0u8; 20];
    frame[0] = SOURCE_ADDR;
    frame[1] = 0x15;
    frame[2] = CMD_DISPLAY;

    let bytes = text.as_bytes();
    for i in 0..DISPLAY_TEXT_MAX {
        frame[3 + i] = if i < bytes.len() { bytes[i] } else { b' ' };
    }

    frame[14] = 0xff;
    frame[15] = beep;
    frame[16] = 0x03;
    frame[17] = left_dots;
    frame[18] = right_dots;

    crc::seal(&mut frame);
    frame
}

/// The blank-display variant used to hand the display back to the clock.
pub fn display_empty() -> [u8; 20] {
    display("", 0, DOT_FLAG, DOT_FLAG)
}

/// Set both timers and their run modes. Minutes and seconds travel as BCD;
/// hours are a bare nibble.
pub fn set_and_run(time: &ClockTime, left_mode: RunMode, right_mode: RunMode) -> [u8; 11] {
    let mut frame = [0u8; 11];
    frame[0] = SOURCE_ADDR;
    frame[1] = 0x0c;
    frame[2] = CMD_SET_AND_RUN;

    frame[3] = time.left_hours;
    frame[4] = bcd_encode(time.left_minutes);
    frame[5] = bcd_encode(time.left_seconds);

    frame[6] = time.right_hours;
    frame[7] = bcd_encode(time.right_minutes);
    frame[8] = bcd_encode(time.right_seconds);

    frame[9] = RunMode::pack(left_mode, right_mode);

    crc::seal(&mut frame);
    frame
}

/// A successfully classified inbound frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    /// Acknowledgement of the given command code.
    Ack(u8),
    /// The fixed wake-up response.
    PingResponse,
    /// A validated time update.
    Time(ClockTime),
    /// Raw button state pair: (current, previous).
    Button { current: u8, previous: u8 },
}

/// Why an inbound frame was not surfaced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundError {
    TooShort,
    /// First byte is not our listen address 0x10.
    NotForUs,
    AckTooShort,
    BadPingResponse,
    /// The clock echoes time frames flagged as carrying no update.
    TimeEcho,
    TimeMalformed,
    /// Parsed fields violate the hour/minute/second ranges.
    TimeOutOfRange,
    ButtonTooShort,
    UnknownType(u8),
}

/// Classifies a raw inbound frame per the clock's message-type byte.
pub fn classify(buf: &[u8]) -> Result<Inbound, InboundError> {
    if buf.len() < 3 {
        return Err(InboundError::TooShort);
    }
    if buf[0] != LISTEN_ACK {
        return Err(InboundError::NotForUs);
    }

    match buf[2] {
        MSG_ACK => {
            // ACK format: 10 08 01 [CMD] [STATUS] ...
            if buf.len() < 5 {
                return Err(InboundError::AckTooShort);
            }
            Ok(Inbound::Ack(buf[3]))
        }
        MSG_WAKEUP_RESPONSE => {
            if buf.len() >= PING_RESPONSE.len() && buf[..PING_RESPONSE.len()] == PING_RESPONSE {
                Ok(Inbound::PingResponse)
            } else {
                Err(InboundError::BadPingResponse)
            }
        }
        MSG_TIME => parse_time(buf),
        MSG_BUTTON => {
            if buf.len() < 5 {
                return Err(InboundError::ButtonTooShort);
            }
            Ok(Inbound::Button {
                current: buf[3],
                previous: buf[4],
            })
        }
        other => Err(InboundError::UnknownType(other)),
    }
}

fn parse_time(buf: &[u8]) -> Result<Inbound, InboundError> {
    if buf.len() > 19 && buf[19] == 1 {
        return Err(InboundError::TimeEcho);
    }
    if buf.len() < 14 || buf[1] != 0x18 {
        return Err(InboundError::TimeMalformed);
    }

    let time = ClockTime {
        left_hours: buf[4] & 0x0f,
        left_minutes: bcd_decode(buf[5]),
        left_seconds: bcd_decode(buf[6]),
        right_hours: buf[10] & 0x0f,
        right_minutes: bcd_decode(buf[11]),
        right_seconds: bcd_decode(buf[12]),
    };

    if !time.is_valid() {
        return Err(InboundError::TimeOutOfRange);
    }
    Ok(Inbound::Time(time))
}

#[cfg(test)]
mod tests;
