// status.rs
//
// The health blackboard shared between the two cores. The clock task and
// the BLE loop each own one slot and replace it wholesale under a short
// blocking lock; readers always get a coherent copy, never a torn one.

use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::types::{ConnectionState, Millis, TaskState};

/// Health published by the clock task. Nobody else writes this slot.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockHealth {
    pub task_state: TaskState,
    pub dgt_state: ConnectionState,
    pub dgt_configured: bool,
    pub commands_received: u32,
    pub commands_executed: u32,
    pub commands_failed: u32,
    pub events_generated: u32,
    pub recovery_attempts: u32,
    pub last_error: u16,
    pub last_update_ms: Millis,
}

impl ClockHealth {
    pub const fn new() -> Self {
        Self {
            task_state: TaskState::Idle,
            dgt_state: ConnectionState::Disconnected,
            dgt_configured: false,
            commands_received: 0,
            commands_executed: 0,
            commands_failed: 0,
            events_generated: 0,
            recovery_attempts: 0,
            last_error: 0,
            last_update_ms: 0,
        }
    }
}

/// Health published by the BLE loop. Nobody else writes this slot.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BleHealth {
    pub connected: bool,
    pub subscribed: bool,
    pub notifications_sent: u32,
    pub notifications_failed: u32,
    pub uptime_ms: Millis,
    pub temperature_c: i16,
}

impl BleHealth {
    pub const fn new() -> Self {
        Self {
            connected: false,
            subscribed: false,
            notifications_sent: 0,
            notifications_failed: 0,
            uptime_ms: 0,
            temperature_c: 0,
        }
    }
}

/// Two single-writer slots. The status characteristic and getStatus read
/// both to assemble one picture of the gateway.
pub struct GatewayHealth {
    clock: Mutex<CriticalSectionRawMutex, Cell<ClockHealth>>,
    ble: Mutex<CriticalSectionRawMutex, Cell<BleHealth>>,
}

pub static GATEWAY_HEALTH: GatewayHealth = GatewayHealth::new();

impl GatewayHealth {
    pub const fn new() -> Self {
        Self {
            clock: Mutex::new(Cell::new(ClockHealth::new())),
            ble: Mutex::new(Cell::new(BleHealth::new())),
        }
    }

    /// Clock task side: replace the clock slot.
    pub fn publish_clock(&self, health: ClockHealth) {
        self.clock.lock(|slot| slot.set(health));
    }

    /// BLE side: replace the BLE slot.
    pub fn publish_ble(&self, health: BleHealth) {
        self.ble.lock(|slot| slot.set(health));
    }

    pub fn clock(&self) -> ClockHealth {
        self.clock.lock(|slot| slot.get())
    }

    pub fn ble(&self) -> BleHealth {
        self.ble.lock(|slot| slot.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_start_empty() {
        let health = GatewayHealth::new();
        assert_eq!(health.clock().commands_received, 0);
        assert!(!health.ble().connected);
    }

    #[test]
    fn test_publish_replaces_whole_slot() {
        let health = GatewayHealth::new();
        let mut clock = ClockHealth::new();
        clock.commands_received = 5;
        clock.dgt_configured = true;
        health.publish_clock(clock);
        assert_eq!(health.clock().commands_received, 5);
        assert!(health.clock().dgt_configured);

        health.publish_clock(ClockHealth::new());
        assert_eq!(health.clock().commands_received, 0);
    }

    #[test]
    fn test_slots_are_independent() {
        let health = GatewayHealth::new();
        let mut ble = BleHealth::new();
        ble.connected = true;
        ble.notifications_sent = 3;
        health.publish_ble(ble);
        assert!(health.ble().connected);
        assert_eq!(health.ble().notifications_sent, 3);
        assert_eq!(health.clock().commands_received, 0);
    }
}
