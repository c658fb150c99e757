// types.rs
use serde::{Deserialize, Serialize};

/// Milliseconds on the monotonic boot clock. Wraps after roughly 584 million
/// years, which outlasts any chess game on record.
pub type Millis = u64;

/// Maximum length of a client-supplied command correlation id.
pub const MAX_COMMAND_ID_LEN: usize = 32;
/// Maximum length of an error message carried in a response or event.
pub const MAX_ERROR_MESSAGE_LEN: usize = 128;
/// Upper bound for an incoming command payload (exclusive).
pub const MAX_COMMAND_BYTES: usize = 512;

/// Run mode of one clock timer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    #[default]
    Stop = 0,
    CountDown = 1,
    CountUp = 2,
}

impl RunMode {
    /// Packed wire encoding pairs two modes in one byte: left | (right << 2).
    pub fn pack(left: RunMode, right: RunMode) -> u8 {
        (left as u8) | ((right as u8) << 2)
    }

    pub fn from_u8(value: u8) -> Option<RunMode> {
        match value {
            0 => Some(RunMode::Stop),
            1 => Some(RunMode::CountDown),
            2 => Some(RunMode::CountUp),
            _ => None,
        }
    }
}

/// Snapshot of both clock timers. Hours are a single digit on the DGT3000
/// display; minutes and seconds are regular sexagesimal fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTime {
    pub left_hours: u8,
    pub left_minutes: u8,
    pub left_seconds: u8,
    pub right_hours: u8,
    pub right_minutes: u8,
    pub right_seconds: u8,
}

impl ClockTime {
    pub const fn zero() -> Self {
        Self {
            left_hours: 0,
            left_minutes: 0,
            left_seconds: 0,
            right_hours: 0,
            right_minutes: 0,
            right_seconds: 0,
        }
    }

    /// Range check shared by the time-frame parser and the command plane.
    pub fn is_valid(&self) -> bool {
        self.left_hours <= 9
            && self.right_hours <= 9
            && self.left_minutes <= 59
            && self.right_minutes <= 59
            && self.left_seconds <= 59
            && self.right_seconds <= 59
    }
}

/// Lifecycle of the DGT3000 link layer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Uninitialized = 0,
    Initialized = 1,
    Connected = 2,
    Configured = 3,
}

/// Lifecycle of the clock task itself.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    #[default]
    Idle = 0,
    Initialized = 1,
    Running = 2,
    Stopping = 3,
    Error = 4,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Idle => "Idle",
            TaskState::Initialized => "Initialized",
            TaskState::Running => "Running",
            TaskState::Stopping => "Stopping",
            TaskState::Error => "Error",
        }
    }
}

/// Connection state, tracked independently for the BLE and clock sides.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connected = 1,
    Configured = 2,
    Error = 3,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connected => "Connected",
            ConnectionState::Configured => "Configured",
            ConnectionState::Error => "Error",
        }
    }
}

/// Coarse state of the whole gateway, surfaced on the status characteristic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemState {
    #[default]
    Uninitialized = 0,
    Initializing = 1,
    Idle = 2,
    Active = 3,
    ErrorRecovery = 4,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Uninitialized => "Uninitialized",
            SystemState::Initializing => "Initializing",
            SystemState::Idle => "Idle",
            SystemState::Active => "Active",
            SystemState::ErrorRecovery => "Error Recovery",
        }
    }
}

/// Transport-level failures of the DGT3000 link.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DgtError {
    I2cInit,
    I2cComm,
    Timeout,
    NoAck,
    BufferOverrun,
    Crc,
    ClockOff,
    NotConfigured,
}

impl DgtError {
    pub fn as_str(&self) -> &'static str {
        match self {
            DgtError::I2cInit => "I2C initialization failed",
            DgtError::I2cComm => "I2C communication error",
            DgtError::Timeout => "Timeout",
            DgtError::NoAck => "No acknowledgment",
            DgtError::BufferOverrun => "Buffer overrun",
            DgtError::Crc => "CRC error",
            DgtError::ClockOff => "Clock is off",
            DgtError::NotConfigured => "Not configured",
        }
    }
}

/// Wire-visible error codes carried in command responses and error events.
/// The numeric assignment is stable; clients match on it.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    #[default]
    Success = 0,
    I2cCommunicationError = 1,
    DgtNotConfigured = 2,
    I2cCrcError = 3,
    DgtNotConnected = 4,
    JsonParseError = 5,
    JsonInvalidCommand = 6,
    JsonInvalidParameters = 7,
    CommandTimeout = 8,
    UnknownError = 9,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::I2cCommunicationError => "I2C Communication Error",
            ErrorCode::DgtNotConfigured => "DGT3000 Not Configured",
            ErrorCode::I2cCrcError => "I2C CRC Error",
            ErrorCode::DgtNotConnected => "DGT Not Connected",
            ErrorCode::JsonParseError => "JSON Parse Error",
            ErrorCode::JsonInvalidCommand => "Invalid JSON Command",
            ErrorCode::JsonInvalidParameters => "Invalid JSON Parameters",
            ErrorCode::CommandTimeout => "Command Timeout",
            ErrorCode::UnknownError => "Unknown Error",
        }
    }
}

impl From<DgtError> for ErrorCode {
    fn from(error: DgtError) -> Self {
        match error {
            DgtError::I2cComm | DgtError::I2cInit => ErrorCode::I2cCommunicationError,
            DgtError::Timeout | DgtError::NoAck => ErrorCode::CommandTimeout,
            DgtError::NotConfigured => ErrorCode::DgtNotConfigured,
            DgtError::Crc => ErrorCode::I2cCrcError,
            DgtError::ClockOff => ErrorCode::DgtNotConnected,
            DgtError::BufferOverrun => ErrorCode::UnknownError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_packing() {
        assert_eq!(RunMode::pack(RunMode::Stop, RunMode::Stop), 0x00);
        assert_eq!(RunMode::pack(RunMode::CountDown, RunMode::CountDown), 0x05);
        assert_eq!(RunMode::pack(RunMode::CountUp, RunMode::Stop), 0x02);
        assert_eq!(RunMode::pack(RunMode::Stop, RunMode::CountUp), 0x08);
    }

    #[test]
    fn test_time_validation() {
        let mut time = ClockTime::zero();
        assert!(time.is_valid());
        time.left_hours = 9;
        time.right_seconds = 59;
        assert!(time.is_valid());
        time.left_hours = 10;
        assert!(!time.is_valid());
        time.left_hours = 0;
        time.right_minutes = 60;
        assert!(!time.is_valid());
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ErrorCode::from(DgtError::I2cComm),
            ErrorCode::I2cCommunicationError
        );
        assert_eq!(ErrorCode::from(DgtError::Timeout), ErrorCode::CommandTimeout);
        assert_eq!(ErrorCode::from(DgtError::NoAck), ErrorCode::CommandTimeout);
        assert_eq!(ErrorCode::from(DgtError::Crc), ErrorCode::I2cCrcError);
        assert_eq!(
            ErrorCode::from(DgtError::ClockOff),
            ErrorCode::DgtNotConnected
        );
        assert_eq!(
            ErrorCode::from(DgtError::NotConfigured),
            ErrorCode::DgtNotConfigured
        );
    }
}
