// link.rs
//
// The DGT3000 send path. The clock listens for commands at 0x08 (or 0x28
// when asleep) and answers on our slave leg, either at 0x10 (ACKs, ping
// responses) or 0x00 (time and button frames). Only one listen address can
// be active, and re-binding the slave costs a ~10 ms settle, so the send
// discipline below decides per command whether an ACK is worth the switch.

use clockbridge_core::frame::{
    self, BEEP_MAX, CLOCK_ADDR, CMD_CHANGE_STATE, CMD_DISPLAY, CMD_END_DISPLAY,
    CMD_SET_AND_RUN, CMD_SET_CENTRAL_CONTROL, DISPLAY_TEXT_MAX, LEFT_DOTS_MASK, LISTEN_ACK,
    LISTEN_DATA, RIGHT_DOTS_MASK, WAKEUP_ADDR,
};
use clockbridge_core::types::{ClockTime, DgtError, LinkState, RunMode};
use clockbridge_core::{debug, info, warn};
use embassy_time::{Duration, Instant, Timer};
use embedded_hal_async::i2c::I2c as AsyncI2c;

use super::rx::{LINK_RX, LISTEN_ADDRESS, LinkRx};

/// How long to wait for an ACK before a retry.
pub const ACK_TIMEOUT_MS: u64 = 50;
/// Sleep between ACK flag polls.
pub const ACK_POLL_INTERVAL_MS: u64 = 5;
/// Pause between send attempts after a master-bus failure.
pub const RETRY_DELAY_MS: u64 = 100;
/// Settle time after re-binding the slave listen address.
pub const ADDRESS_SWITCH_DELAY_MS: u64 = 10;
/// Breather between the configuration sequence's commands.
pub const COMMAND_DELAY_MS: u64 = 5;
/// Attempts per command when retrying is allowed.
pub const SEND_ATTEMPTS: u32 = 3;
/// A sleeping clock takes longer to answer a ping than an ACK.
pub const PING_TIMEOUT_MS: u64 = 2 * ACK_TIMEOUT_MS;

/// Driver for one DGT3000 clock over the dual-I2C link.
pub struct Dgt3000Link<I2C> {
    i2c: I2C,
    rx: &'static LinkRx,
    initialized: bool,
    current_listen: u8,
    last_error: Option<DgtError>,
    configuring: bool,
}

impl<I2C: AsyncI2c> Dgt3000Link<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            rx: &LINK_RX,
            initialized: false,
            current_listen: LISTEN_DATA,
            last_error: None,
            configuring: false,
        }
    }

    /// Brings the link up: clears all receive state and parks the slave on
    /// the data address so time and button frames are not missed.
    pub async fn begin(&mut self) {
        self.rx.reset();
        LISTEN_ADDRESS.signal(LISTEN_DATA);
        self.current_listen = LISTEN_DATA;
        Timer::after_millis(ADDRESS_SWITCH_DELAY_MS).await;
        self.initialized = true;
        self.last_error = None;
        info!("DGT3000: link initialized");
    }

    pub fn state(&self) -> LinkState {
        if !self.initialized {
            LinkState::Uninitialized
        } else if self.rx.is_configured() {
            LinkState::Configured
        } else if self.rx.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Initialized
        }
    }

    pub fn is_connected(&self) -> bool {
        self.rx.is_connected()
    }

    pub fn is_configured(&self) -> bool {
        self.rx.is_configured()
    }

    pub fn last_error(&self) -> Option<DgtError> {
        self.last_error
    }

    pub fn last_error_code(&self) -> u16 {
        self.last_error
            .map(|e| clockbridge_core::types::ErrorCode::from(e).code())
            .unwrap_or(0)
    }

    pub fn last_error_str(&self) -> &'static str {
        self.last_error.as_ref().map(DgtError::as_str).unwrap_or("Success")
    }

    /// The configuration handshake: wake the clock if needed, take central
    /// control, and park both timers at zero. Runs on BLE connect and on
    /// every recovery attempt.
    pub async fn configure(&mut self) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        if self.configuring {
            // A configure is already running; never recurse into a second.
            return Err(DgtError::NotConfigured);
        }
        self.configuring = true;
        let result = self.configure_sequence().await;
        self.configuring = false;
        result
    }

    async fn configure_sequence(&mut self) -> Result<(), DgtError> {
        self.rx.set_configured(false);
        self.rx.set_connected(false);

        // Step 1: a Change State without ACK doubles as a wake-up nudge.
        // If the master write fails the clock is probably off, so ping the
        // wake-up address and try once more.
        if self.change_state_no_ack().await.is_err() {
            Timer::after_millis(100).await;
            if self.send_ping().await.is_err() || self.change_state_no_ack().await.is_err() {
                return self.fail(DgtError::ClockOff);
            }
        }
        Timer::after_millis(COMMAND_DELAY_MS).await;

        // Step 2: take central control of the clock.
        if self.set_central_control().await.is_err() {
            return self.fail(DgtError::I2cComm);
        }
        Timer::after_millis(COMMAND_DELAY_MS).await;

        // Step 3: Change State again, this time demanding the ACK.
        if self.change_state().await.is_err() {
            return self.fail(DgtError::I2cComm);
        }
        Timer::after_millis(COMMAND_DELAY_MS).await;

        // Step 4: initialize both timers to 0:00:00, stopped.
        if self
            .set_and_run(&ClockTime::zero(), RunMode::Stop, RunMode::Stop)
            .await
            .is_err()
        {
            return self.fail(DgtError::I2cComm);
        }

        self.rx.set_configured(true);
        self.rx.set_connected(true);
        self.last_error = None;
        info!("DGT3000: configuration successful");
        Ok(())
    }

    pub async fn change_state(&mut self) -> Result<(), DgtError> {
        let cmd = frame::change_state();
        self.send_command(
            "Change State",
            &cmd,
            LISTEN_ACK,
            CMD_CHANGE_STATE,
            1,
            CLOCK_ADDR,
            true,
        )
        .await
    }

    pub async fn change_state_no_ack(&mut self) -> Result<(), DgtError> {
        let cmd = frame::change_state();
        self.send_command("Change State (no ACK)", &cmd, LISTEN_DATA, 0, 0, CLOCK_ADDR, true)
            .await
    }

    pub async fn set_central_control(&mut self) -> Result<(), DgtError> {
        let cmd = frame::set_central_control();
        self.send_command(
            "Set Central Control",
            &cmd,
            LISTEN_ACK,
            CMD_SET_CENTRAL_CONTROL,
            1,
            CLOCK_ADDR,
            true,
        )
        .await
    }

    /// Fires a ping at the wake-up alias and waits for the fixed response a
    /// sleeping clock sends while booting. A timeout only means the clock
    /// was not asleep; the caller decides what that implies.
    pub async fn send_ping(&mut self) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        let cmd = frame::ping();
        // Fire and forget: a powered-down clock NAKs the write itself.
        self.send_command("Ping (wake-up)", &cmd, LISTEN_DATA, 0, 0, WAKEUP_ADDR, false)
            .await?;

        self.rx.clear_ping_response();
        let deadline = Instant::now() + Duration::from_millis(PING_TIMEOUT_MS);
        while Instant::now() < deadline {
            if self.rx.take_ping_response() {
                info!("DGT3000: ping response received");
                return Ok(());
            }
            Timer::after_millis(ACK_POLL_INTERVAL_MS).await;
        }
        debug!("DGT3000: no ping response");
        self.fail(DgtError::Timeout)
    }

    /// End Display and Set And Run skip the ACK on purpose: the listen
    /// retune to 0x10 and back takes long enough to lose button frames.
    pub async fn end_display(&mut self) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        let cmd = frame::end_display();
        self.send_command("End Display", &cmd, LISTEN_DATA, CMD_END_DISPLAY, 0, CLOCK_ADDR, true)
            .await
    }

    pub async fn send_display_empty(&mut self) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        let cmd = frame::display_empty();
        self.send_command("Display Empty", &cmd, LISTEN_DATA, CMD_DISPLAY, 1, CLOCK_ADDR, true)
            .await
    }

    pub async fn display_text(
        &mut self,
        text: &str,
        beep: u8,
        left_dots: u8,
        right_dots: u8,
    ) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        let valid = text.len() <= DISPLAY_TEXT_MAX
            && beep <= BEEP_MAX
            && left_dots & !LEFT_DOTS_MASK == 0
            && right_dots & !RIGHT_DOTS_MASK == 0;
        if !valid {
            return self.fail(DgtError::I2cComm);
        }

        // Clear whatever is on the display first.
        self.end_display().await?;

        let cmd = frame::display(text, beep, left_dots, right_dots);
        self.send_command("Display", &cmd, LISTEN_DATA, CMD_DISPLAY, 1, CLOCK_ADDR, true)
            .await
    }

    pub async fn set_and_run(
        &mut self,
        time: &ClockTime,
        left_mode: RunMode,
        right_mode: RunMode,
    ) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        if !time.is_valid() {
            return self.fail(DgtError::I2cComm);
        }
        let cmd = frame::set_and_run(time, left_mode, right_mode);
        self.send_command("Set And Run", &cmd, LISTEN_DATA, CMD_SET_AND_RUN, 0, CLOCK_ADDR, true)
            .await
    }

    /// Stops both timers, preserving the current snapshot.
    pub async fn stop(&mut self) -> Result<(), DgtError> {
        info!("DGT3000: stopping timers");
        let time = self.rx.time();
        self.set_and_run(&time, RunMode::Stop, RunMode::Stop).await
    }

    /// Starts both timers from the current snapshot.
    pub async fn run(&mut self, left_mode: RunMode, right_mode: RunMode) -> Result<(), DgtError> {
        info!("DGT3000: running timers");
        let time = self.rx.time();
        self.set_and_run(&time, left_mode, right_mode).await
    }

    /// Sends the power-off variant of Change State. No ACK: the clock goes
    /// dark instead of answering.
    pub async fn power_off(&mut self) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }
        let cmd = frame::power_off();
        self.send_command("Power Off", &cmd, LISTEN_DATA, 0, 0, CLOCK_ADDR, false)
            .await?;
        info!("DGT3000: power off sent");
        self.rx.set_connected(false);
        self.rx.set_configured(false);
        Ok(())
    }

    /// Current time snapshot, as last reported by the clock.
    pub fn time(&self) -> ClockTime {
        self.rx.time()
    }

    /// Consumes the new-time flag.
    pub fn new_time_available(&self) -> bool {
        self.rx.take_new_time()
    }

    /// Pops the oldest pending button event code.
    pub fn button_event(&self) -> Option<u8> {
        self.rx.pop_button_event()
    }

    /// Last raw button state (main buttons, on/off, lever position).
    pub fn button_state(&self) -> u8 {
        self.rx.button_state()
    }

    async fn send_command(
        &mut self,
        name: &str,
        cmd: &[u8],
        ack_listen: u8,
        expected_ack: u8,
        acks_required: u8,
        target: u8,
        with_retry: bool,
    ) -> Result<(), DgtError> {
        if !self.initialized {
            return self.fail(DgtError::NotConfigured);
        }

        let attempts = if with_retry { SEND_ATTEMPTS } else { 1 };
        for attempt in 1..=attempts {
            debug!("DGT3000: -> {} (attempt {})", name, attempt);

            self.set_listen(ack_listen).await;
            self.rx.clear_ack();

            if self.i2c.write(target, cmd).await.is_err() {
                self.last_error = Some(DgtError::I2cComm);
                if with_retry {
                    Timer::after_millis(RETRY_DELAY_MS).await;
                    continue;
                }
                // Fire-and-forget sends (the wake-up ping, power-off) are
                // expected to NAK when the clock is off.
                return Ok(());
            }

            if acks_required == 0 {
                self.last_error = None;
                return Ok(());
            }

            if self.wait_for_ack(expected_ack).await.is_ok() {
                self.set_listen(LISTEN_DATA).await;
                self.last_error = None;
                return Ok(());
            }
            if attempt < attempts {
                debug!("DGT3000: {} not acknowledged, retrying", name);
                self.last_error = Some(DgtError::NoAck);
            }
        }

        warn!("DGT3000: sending {} failed after all attempts", name);
        self.set_listen(LISTEN_DATA).await;
        self.rx.set_connected(false);
        self.rx.set_configured(false);
        Err(self.last_error.unwrap_or(DgtError::NoAck))
    }

    async fn wait_for_ack(&mut self, expected: u8) -> Result<(), DgtError> {
        let deadline = Instant::now() + Duration::from_millis(ACK_TIMEOUT_MS);
        while Instant::now() < deadline {
            if self.rx.match_ack(expected) {
                return Ok(());
            }
            Timer::after_millis(ACK_POLL_INTERVAL_MS).await;
        }
        debug!("DGT3000: ACK timeout for command {:02x}", expected);
        self.last_error = Some(DgtError::Timeout);
        Err(DgtError::Timeout)
    }

    /// Re-binds the slave leg. Skipped when the address already matches;
    /// otherwise the listener tears the peripheral down and needs the
    /// settle delay before frames flow again.
    async fn set_listen(&mut self, address: u8) {
        if self.current_listen == address {
            return;
        }
        LISTEN_ADDRESS.signal(address);
        self.current_listen = address;
        Timer::after_millis(ADDRESS_SWITCH_DELAY_MS).await;
        debug!("DGT3000: listening on {:02x}", address);
    }

    fn fail(&mut self, error: DgtError) -> Result<(), DgtError> {
        self.last_error = Some(error);
        Err(error)
    }
}
