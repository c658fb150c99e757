// clock.rs
//
// The clock task: sole owner of the DGT3000 link, pinned to core 1. It
// drains one command per loop iteration, turns inbound clock traffic into
// events, and re-runs the configuration sequence when the link drops while
// a BLE client is still attached.

use clockbridge_core::button::button_name;
use clockbridge_core::protocol::{
    ButtonFields, CommandFailure, CommandResponse, CommandResult, EventData, EventKind,
    GatewayStatusResult, PRIORITY_HIGH, PRIORITY_NORMAL, error_message,
};
use clockbridge_core::status::{ClockHealth, GATEWAY_HEALTH};
use clockbridge_core::types::{ConnectionState, ErrorCode, DgtError, Millis, TaskState};
use clockbridge_core::{Command, CommandId, ParseOutcome, parse_command};
use clockbridge_core::{error, info, warn};
use clockbridge_drivers::channels::{self, BleSessionEvent};
use clockbridge_drivers::dgt3000::Dgt3000Link;
use clockbridge_drivers::LINK_RX;
use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_rp::watchdog::Watchdog;
use embassy_time::{Duration, Instant, Ticker, Timer};

use crate::hardware::{ClockResources, Irqs};

/// Pacing between recovery attempts.
pub const RECOVERY_DELAY_MS: u64 = 1000;
/// Maximum recovery attempts before giving up. Zero means never give up.
pub const MAX_RECOVERY_ATTEMPTS: u32 = 0;
/// Settle time between bus bring-up and the configuration handshake.
const CONFIGURE_SETTLE_MS: u64 = 100;
/// Queue deadline for command responses.
const RESPONSE_TIMEOUT_MS: u64 = 100;
/// Queue deadline for time and button events; these are frequent and
/// best-effort, so they wait barely at all.
const EVENT_TIMEOUT_MS: u64 = 2;
/// Queue deadline for connection and error events.
const STATUS_EVENT_TIMEOUT_MS: u64 = 100;
/// The hardware watchdog bites if the loop stalls this long.
const WATCHDOG_TIMEOUT_MS: u64 = 5000;
/// Loop iterations between status log lines (30 s at 100 Hz).
const STATUS_LOG_TICKS: u32 = 3000;

type ClockI2c = I2c<'static, I2C0, Async>;

fn now_ms() -> Millis {
    Instant::now().as_millis()
}

struct ClockTask {
    link: Dgt3000Link<ClockI2c>,
    repeat: clockbridge_core::RepeatMonitor,
    task_state: TaskState,
    ble_connected: bool,
    initializing: bool,
    recovery_attempts: u32,
    last_recovery_ms: Millis,
    commands_received: u32,
    commands_executed: u32,
    commands_failed: u32,
    events_generated: u32,
    last_error: u16,
}

#[embassy_executor::task]
pub async fn clock_task(r: ClockResources, irqs: Irqs) -> ! {
    let mut config = embassy_rp::i2c::Config::default();
    config.frequency = clockbridge_core::frame::I2C_FREQUENCY;
    let i2c = I2c::new_async(r.i2c, r.scl, r.sda, irqs, config);

    let mut watchdog = Watchdog::new(r.watchdog);
    watchdog.start(Duration::from_millis(WATCHDOG_TIMEOUT_MS));

    let mut task = ClockTask {
        link: Dgt3000Link::new(i2c),
        repeat: clockbridge_core::RepeatMonitor::new(),
        task_state: TaskState::Running,
        ble_connected: false,
        initializing: false,
        recovery_attempts: 0,
        last_recovery_ms: 0,
        commands_received: 0,
        commands_executed: 0,
        commands_failed: 0,
        events_generated: 0,
        last_error: 0,
    };

    info!("clock task running on core 1");
    let mut ticker = Ticker::every(Duration::from_hz(100));
    let mut tick: u32 = 0;

    loop {
        watchdog.feed();

        task.handle_session_events().await;
        task.process_command().await;
        if task.link.is_configured() {
            task.handle_events().await;
        }
        task.monitor_connection().await;
        task.publish_health();

        tick = tick.wrapping_add(1);
        if tick % STATUS_LOG_TICKS == 0 {
            task.log_status();
        }

        ticker.next().await;
    }
}

impl ClockTask {
    async fn handle_session_events(&mut self) {
        while let Ok(event) = channels::BLE_SESSION.try_receive() {
            match event {
                BleSessionEvent::Connected => self.on_ble_connected().await,
                BleSessionEvent::Disconnected => self.on_ble_disconnected().await,
                BleSessionEvent::Subscribed => {
                    // A fresh subscriber gets the connection picture without
                    // waiting for a transition.
                    info!("client subscribed, queueing initial connection status");
                    let event = channels::new_event(
                        EventKind::ConnectionStatus,
                        PRIORITY_HIGH,
                        EventData::Connection {
                            connected: self.link.is_connected(),
                            configured: self.link.is_configured(),
                        },
                    );
                    channels::send_event(event, STATUS_EVENT_TIMEOUT_MS).await;
                }
                BleSessionEvent::Unsubscribed => {
                    info!("client unsubscribed from events");
                }
            }
        }
    }

    async fn on_ble_connected(&mut self) {
        info!("BLE connected, initializing DGT3000");
        self.ble_connected = true;
        self.initializing = true;

        self.link.begin().await;
        Timer::after_millis(CONFIGURE_SETTLE_MS).await;

        match self.link.configure().await {
            Ok(()) => {
                self.connection_event(true, true).await;
                info!("DGT3000 initialized");
            }
            Err(e) => {
                // Keep the task alive; recovery retries the handshake.
                error!("DGT3000 initialization failed: {}", e.as_str());
                self.last_error = ErrorCode::from(e).code();
                self.error_event(
                    ErrorCode::I2cCommunicationError,
                    "Failed to initialize DGT3000",
                )
                .await;
            }
        }
        self.initializing = false;
    }

    async fn on_ble_disconnected(&mut self) -> ! {
        info!("BLE disconnected, shutting down clock link");
        self.ble_connected = false;
        if self.link.is_connected() {
            let _ = self.link.power_off().await;
            self.connection_event(false, false).await;
        }

        // Every piece of connection-bound state has to be rebuilt before
        // the next client; a clean system reset guarantees that.
        channels::flush_all();
        info!("restarting gateway");
        cortex_m::peripheral::SCB::sys_reset();
    }

    async fn process_command(&mut self) {
        let Some(raw) = channels::try_recv_raw_command() else {
            return;
        };
        self.commands_received += 1;

        match parse_command(&raw.payload) {
            ParseOutcome::Discard => {
                warn!("command payload without usable id dropped");
            }
            ParseOutcome::Respond { id, parsed } => match parsed {
                Err((code, message)) => {
                    self.commands_failed += 1;
                    self.send_error(&id, code, message).await;
                }
                Ok(command) => {
                    if command.requires_clock() && !self.link.is_configured() {
                        self.commands_failed += 1;
                        self.send_error(&id, ErrorCode::DgtNotConfigured, "DGT3000 not connected")
                            .await;
                        return;
                    }
                    info!("processing command (id: {})", id.as_str());
                    if self.execute(&id, command).await {
                        self.commands_executed += 1;
                    } else {
                        self.commands_failed += 1;
                    }
                }
            },
        }
    }

    async fn execute(&mut self, id: &CommandId, command: Command<'_>) -> bool {
        match command {
            Command::SetTime {
                time,
                left_mode,
                right_mode,
            } => match self.link.set_and_run(&time, left_mode, right_mode).await {
                Ok(()) => {
                    self.respond_ok(id, CommandResult::Message {
                        status: "Time set successfully",
                    })
                    .await;
                    true
                }
                Err(e) => {
                    self.command_failure(id, e, "Failed to set time on DGT3000")
                        .await;
                    false
                }
            },
            Command::DisplayText {
                text,
                beep,
                left_dots,
                right_dots,
            } => match self.link.display_text(text, beep, left_dots, right_dots).await {
                Ok(()) => {
                    self.respond_ok(id, CommandResult::Message {
                        status: "Text displayed successfully",
                    })
                    .await;
                    true
                }
                Err(e) => {
                    self.command_failure(id, e, "Failed to display text on DGT3000")
                        .await;
                    false
                }
            },
            Command::EndDisplay => match self.link.end_display().await {
                Ok(()) => {
                    self.respond_ok(id, CommandResult::Message {
                        status: "Display ended successfully",
                    })
                    .await;
                    true
                }
                Err(e) => {
                    self.command_failure(id, e, "Failed to end display").await;
                    false
                }
            },
            Command::Stop => match self.link.stop().await {
                Ok(()) => {
                    self.respond_ok(id, CommandResult::Message {
                        status: "Timers stopped successfully",
                    })
                    .await;
                    true
                }
                Err(e) => {
                    self.command_failure(id, e, "Failed to stop timers").await;
                    false
                }
            },
            Command::Run {
                left_mode,
                right_mode,
            } => match self.link.run(left_mode, right_mode).await {
                Ok(()) => {
                    self.respond_ok(id, CommandResult::Message {
                        status: "Timers started successfully",
                    })
                    .await;
                    true
                }
                Err(e) => {
                    self.command_failure(id, e, "Failed to start timers").await;
                    false
                }
            },
            Command::GetTime => {
                let time = self.link.time();
                self.respond_ok(id, CommandResult::Time(time.into())).await;
                true
            }
            Command::GetStatus => {
                let result = GatewayStatusResult {
                    dgt_connected: self.link.is_connected(),
                    dgt_configured: self.link.is_configured(),
                    ble_connected: self.ble_connected,
                    last_update_time: now_ms(),
                    recovery_attempts: self.recovery_attempts,
                    last_dgt_error: self.link.last_error_code(),
                    last_dgt_error_string: self.link.last_error_str(),
                };
                self.respond_ok(id, CommandResult::GatewayStatus(result)).await;
                true
            }
        }
    }

    /// A failed clock operation produces both the correlated error response
    /// and, via the error handler, a spontaneous error event.
    async fn command_failure(&mut self, id: &CommandId, e: DgtError, message: &'static str) {
        self.handle_link_error(e).await;
        self.send_error(id, ErrorCode::I2cCommunicationError, message)
            .await;
    }

    async fn handle_link_error(&mut self, e: DgtError) {
        error!("DGT3000 error: {}", e.as_str());
        let code = ErrorCode::from(e);
        self.last_error = code.code();
        self.error_event(code, e.as_str()).await;

        let transport_fault = matches!(
            e,
            DgtError::I2cComm
                | DgtError::Timeout
                | DgtError::NoAck
                | DgtError::ClockOff
                | DgtError::Crc
                | DgtError::NotConfigured
        );
        if transport_fault && self.link.is_connected() {
            warn!("DGT3000 disconnected due to error");
            LINK_RX.set_connected(false);
            LINK_RX.set_configured(false);
            self.connection_event(false, false).await;
        }
    }

    async fn respond_ok(&mut self, id: &CommandId, result: CommandResult) {
        let response = CommandResponse {
            id: id.clone(),
            timestamp: now_ms(),
            result: Ok(result),
        };
        if !channels::send_response(response, RESPONSE_TIMEOUT_MS).await {
            warn!("response queue full, response dropped");
        }
    }

    async fn send_error(&mut self, id: &CommandId, code: ErrorCode, message: &str) {
        let response = CommandResponse {
            id: id.clone(),
            timestamp: now_ms(),
            result: Err(CommandFailure {
                code,
                message: error_message(message),
            }),
        };
        if !channels::send_response(response, RESPONSE_TIMEOUT_MS).await {
            warn!("response queue full, error response dropped");
        }
    }

    async fn handle_events(&mut self) {
        // Discrete button events drain the link's ring first; each one also
        // restarts hold detection.
        while let Some(code) = self.link.button_event() {
            self.repeat.reset();
            let name = button_name(code);
            info!("button event: {} ({:02x})", name, code);
            let event = channels::new_event(
                EventKind::ButtonEvent,
                PRIORITY_HIGH,
                EventData::Button(ButtonFields {
                    button: name,
                    button_code: code,
                    is_repeat: false,
                    repeat_count: None,
                }),
            );
            if channels::send_event(event, EVENT_TIMEOUT_MS).await {
                self.events_generated += 1;
            }
        }

        // A held main button repeats: once after 800 ms, then every 400 ms.
        if let Some(repeat) = self.repeat.poll(self.link.button_state(), now_ms()) {
            let name = button_name(repeat.mask);
            info!("button repeat: {} (count {})", name, repeat.count);
            let event = channels::new_event(
                EventKind::ButtonEvent,
                PRIORITY_HIGH,
                EventData::Button(ButtonFields {
                    button: name,
                    button_code: repeat.mask,
                    is_repeat: true,
                    repeat_count: Some(repeat.count),
                }),
            );
            if channels::send_event(event, EVENT_TIMEOUT_MS).await {
                self.events_generated += 1;
            }
        }

        if self.link.new_time_available() {
            let time = self.link.time();
            let event = channels::new_event(
                EventKind::TimeUpdate,
                PRIORITY_NORMAL,
                EventData::Time(time.into()),
            );
            if channels::send_event(event, EVENT_TIMEOUT_MS).await {
                self.events_generated += 1;
            }
        }
    }

    async fn monitor_connection(&mut self) {
        if !self.should_attempt_recovery() {
            return;
        }
        let now = now_ms();
        if now - self.last_recovery_ms < RECOVERY_DELAY_MS {
            return;
        }
        self.recovery_attempts += 1;
        self.last_recovery_ms = now;

        info!("DGT3000 recovery attempt {}", self.recovery_attempts);
        match self.link.configure().await {
            Ok(()) => {
                info!("DGT3000 recovery successful");
                self.recovery_attempts = 0;
                self.connection_event(true, true).await;
            }
            Err(e) => {
                warn!("DGT3000 recovery failed: {}", e.as_str());
            }
        }
    }

    fn should_attempt_recovery(&self) -> bool {
        !self.link.is_connected()
            && self.ble_connected
            && !self.initializing
            && (MAX_RECOVERY_ATTEMPTS == 0 || self.recovery_attempts < MAX_RECOVERY_ATTEMPTS)
    }

    async fn connection_event(&mut self, connected: bool, configured: bool) {
        let event = channels::new_event(
            EventKind::ConnectionStatus,
            PRIORITY_NORMAL,
            EventData::Connection {
                connected,
                configured,
            },
        );
        if channels::send_event(event, STATUS_EVENT_TIMEOUT_MS).await {
            self.events_generated += 1;
        }
    }

    async fn error_event(&mut self, code: ErrorCode, message: &str) {
        let event = channels::new_event(
            EventKind::Error,
            PRIORITY_HIGH,
            EventData::Error {
                error_code: code.code(),
                error_message: error_message(message),
            },
        );
        if channels::send_event(event, STATUS_EVENT_TIMEOUT_MS).await {
            self.events_generated += 1;
        } else {
            warn!("error event dropped: {}", message);
        }
    }

    fn publish_health(&self) {
        let dgt_state = if self.link.is_configured() {
            ConnectionState::Configured
        } else if self.link.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        GATEWAY_HEALTH.publish_clock(ClockHealth {
            task_state: self.task_state,
            dgt_state,
            dgt_configured: self.link.is_configured(),
            commands_received: self.commands_received,
            commands_executed: self.commands_executed,
            commands_failed: self.commands_failed,
            events_generated: self.events_generated,
            recovery_attempts: self.recovery_attempts,
            last_error: self.last_error,
            last_update_ms: now_ms(),
        });
    }

    fn log_status(&self) {
        info!(
            "clock task: dgt connected {} configured {} | commands {}/{}/{} | events {} | recoveries {}",
            self.link.is_connected(),
            self.link.is_configured(),
            self.commands_received,
            self.commands_executed,
            self.commands_failed,
            self.events_generated,
            self.recovery_attempts,
        );
    }
}
