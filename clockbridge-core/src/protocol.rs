// protocol.rs
//
// Everything that crosses the BLE boundary: queued item types and their JSON
// wire shapes. Serialization stays allocation-free; documents land in
// heapless strings with fixed capacities.

use heapless::{String, Vec};
use serde::Serialize;

use crate::command::CommandId;
use crate::types::{
    ClockTime, ErrorCode, MAX_COMMAND_BYTES, MAX_ERROR_MESSAGE_LEN, Millis,
};

/// Capacity for serialized events.
pub const EVENT_JSON_MAX: usize = 256;
/// Capacity for serialized command responses.
pub const RESPONSE_JSON_MAX: usize = 512;
/// Capacity for the status characteristic snapshot.
pub const STATUS_JSON_MAX: usize = 512;

/// High-priority events jump the event queue.
pub const PRIORITY_HIGH: u8 = 0;
pub const PRIORITY_NORMAL: u8 = 1;

pub type ErrorMessage = String<MAX_ERROR_MESSAGE_LEN>;

/// An opaque command payload as written to the command characteristic.
/// Consumed exactly once by the clock task.
#[derive(Debug)]
pub struct RawCommand {
    pub timestamp: Millis,
    pub length: usize,
    pub payload: Vec<u8, MAX_COMMAND_BYTES>,
}

/// Event kinds, spelled the way the wire spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    TimeUpdate,
    ButtonEvent,
    ConnectionStatus,
    Error,
    SystemStatus,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TimeUpdate => "timeUpdate",
            EventKind::ButtonEvent => "buttonEvent",
            EventKind::ConnectionStatus => "connectionStatus",
            EventKind::Error => "error",
            EventKind::SystemStatus => "systemStatus",
        }
    }
}

/// Both timers in wire spelling, shared by time events and getTime results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeFields {
    pub left_hours: u8,
    pub left_minutes: u8,
    pub left_seconds: u8,
    pub right_hours: u8,
    pub right_minutes: u8,
    pub right_seconds: u8,
}

impl From<ClockTime> for TimeFields {
    fn from(time: ClockTime) -> Self {
        Self {
            left_hours: time.left_hours,
            left_minutes: time.left_minutes,
            left_seconds: time.left_seconds,
            right_hours: time.right_hours,
            right_minutes: time.right_minutes,
            right_seconds: time.right_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonFields {
    pub button: &'static str,
    pub button_code: u8,
    pub is_repeat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
}

/// Kind-specific event payload. Untagged: the kind travels in the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Time(TimeFields),
    Button(ButtonFields),
    Connection {
        connected: bool,
        configured: bool,
    },
    Error {
        #[serde(rename = "errorCode")]
        error_code: u16,
        #[serde(rename = "errorMessage")]
        error_message: ErrorMessage,
    },
}

/// An asynchronous notification on its way to the client. The (priority,
/// seq) pair is the total order the event queue drains in.
#[derive(Debug, Clone)]
pub struct ClockEvent {
    pub kind: EventKind,
    pub timestamp: Millis,
    pub priority: u8,
    pub seq: u32,
    pub data: EventData,
}

impl ClockEvent {
    pub fn to_json(&self) -> Result<String<EVENT_JSON_MAX>, serde_json_core::ser::Error> {
        #[derive(Serialize)]
        struct EventWire<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            timestamp: Millis,
            data: &'a EventData,
        }
        serde_json_core::to_string(&EventWire {
            kind: self.kind.as_str(),
            timestamp: self.timestamp,
            data: &self.data,
        })
    }
}

impl PartialEq for ClockEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for ClockEvent {}

impl PartialOrd for ClockEvent {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClockEvent {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

/// The failure half of a command response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    pub code: ErrorCode,
    pub message: ErrorMessage,
}

/// Success payloads, one shape per command family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Message { status: &'static str },
    Time(TimeFields),
    GatewayStatus(GatewayStatusResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatusResult {
    pub dgt_connected: bool,
    pub dgt_configured: bool,
    pub ble_connected: bool,
    pub last_update_time: Millis,
    pub recovery_attempts: u32,
    pub last_dgt_error: u16,
    pub last_dgt_error_string: &'static str,
}

/// A correlated reply to one command.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub id: CommandId,
    pub timestamp: Millis,
    pub result: Result<CommandResult, CommandFailure>,
}

impl CommandResponse {
    pub fn to_json(&self) -> Result<String<RESPONSE_JSON_MAX>, serde_json_core::ser::Error> {
        #[derive(Serialize)]
        struct ErrorWire<'a> {
            #[serde(rename = "errorCode")]
            error_code: u16,
            #[serde(rename = "errorMessage")]
            error_message: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseWire<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            id: &'a str,
            status: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            result: Option<&'a CommandResult>,
            #[serde(skip_serializing_if = "Option::is_none")]
            data: Option<ErrorWire<'a>>,
        }

        let wire = match &self.result {
            Ok(result) => ResponseWire {
                kind: "command_response",
                id: self.id.as_str(),
                status: "success",
                result: Some(result),
                data: None,
            },
            Err(failure) => ResponseWire {
                kind: "command_response",
                id: self.id.as_str(),
                status: "error",
                result: None,
                data: Some(ErrorWire {
                    error_code: failure.code.code(),
                    error_message: failure.message.as_str(),
                }),
            },
        };
        serde_json_core::to_string(&wire)
    }
}

/// The status characteristic document.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub system_state: &'static str,
    pub ble_connected: bool,
    pub dgt_connected: bool,
    pub dgt_configured: bool,
    pub uptime: Millis,
    pub temperature: i16,
    pub commands_processed: u32,
    pub events_generated: u32,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
    pub raw_cmd_queue_depth: u16,
    pub evt_queue_depth: u16,
    pub resp_queue_depth: u16,
    pub queues_healthy: bool,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> Result<String<STATUS_JSON_MAX>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}

/// Builds an error message from a static description, truncating if a
/// formatted message ever outgrows the capacity.
pub fn error_message(text: &str) -> ErrorMessage {
    let mut out = ErrorMessage::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests;
