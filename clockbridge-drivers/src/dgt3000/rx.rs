// rx.rs
//
// Receive-side state of the DGT3000 link. The slave listener context calls
// `on_frame` for every inbound I2C write; everything in here is lock-free or
// behind a short blocking mutex, and nothing ever awaits. Flags are
// consume-on-read from the clock task's side.

use clockbridge_core::button::{ButtonRing, classify_transition};
use clockbridge_core::frame::{self, Inbound};
use clockbridge_core::types::ClockTime;
use core::cell::{Cell, RefCell};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

/// Largest inbound frame the listener will accept in one transfer.
pub const RECEIVE_BUFFER_LEN: usize = 256;

/// Requested slave listen address. The task owning the slave peripheral
/// waits on this and re-binds when the link switches between ACK and data
/// reception.
pub static LISTEN_ADDRESS: Signal<CriticalSectionRawMutex, u8> = Signal::new();

pub struct LinkRx {
    new_ack: AtomicBool,
    ack_code: AtomicU8,
    new_ping_response: AtomicBool,
    new_time: AtomicBool,
    time: Mutex<CriticalSectionRawMutex, Cell<ClockTime>>,
    button_state: AtomicU8,
    buttons: Mutex<CriticalSectionRawMutex, RefCell<ButtonRing>>,
    connected: AtomicBool,
    configured: AtomicBool,
    dropped_frames: AtomicU32,
}

pub static LINK_RX: LinkRx = LinkRx::new();

impl LinkRx {
    pub const fn new() -> Self {
        Self {
            new_ack: AtomicBool::new(false),
            ack_code: AtomicU8::new(0),
            new_ping_response: AtomicBool::new(false),
            new_time: AtomicBool::new(false),
            time: Mutex::new(Cell::new(ClockTime::zero())),
            button_state: AtomicU8::new(0),
            buttons: Mutex::new(RefCell::new(ButtonRing::new())),
            connected: AtomicBool::new(false),
            configured: AtomicBool::new(false),
            dropped_frames: AtomicU32::new(0),
        }
    }

    /// Dispatches one inbound frame. Runs in the listener context: quick,
    /// non-blocking, no logging.
    pub fn on_frame(&self, buf: &[u8]) {
        match frame::classify(buf) {
            Ok(Inbound::Ack(code)) => {
                self.ack_code.store(code, Ordering::Relaxed);
                self.new_ack.store(true, Ordering::Release);
            }
            Ok(Inbound::PingResponse) => {
                self.new_ping_response.store(true, Ordering::Release);
            }
            Ok(Inbound::Time(time)) => {
                self.time.lock(|cell| cell.set(time));
                self.new_time.store(true, Ordering::Release);
                // Time frames prove the clock is alive. If we thought it
                // was gone it may have been power-cycled, so central
                // control has to be negotiated again.
                if !self.connected.load(Ordering::Relaxed) {
                    self.connected.store(true, Ordering::Relaxed);
                    self.configured.store(false, Ordering::Relaxed);
                }
            }
            Ok(Inbound::Button { current, previous }) => {
                self.button_state.store(current, Ordering::Relaxed);
                if let Some(event) = classify_transition(current, previous) {
                    self.buttons.lock(|ring| ring.borrow_mut().push(event));
                }
            }
            Err(_) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// True once, when the expected ACK code has arrived.
    pub fn match_ack(&self, expected: u8) -> bool {
        if self.new_ack.load(Ordering::Acquire) && self.ack_code.load(Ordering::Relaxed) == expected
        {
            self.new_ack.store(false, Ordering::Relaxed);
            return true;
        }
        false
    }

    pub fn clear_ack(&self) {
        self.new_ack.store(false, Ordering::Relaxed);
        self.ack_code.store(0, Ordering::Relaxed);
    }

    /// Consumes the ping-response flag.
    pub fn take_ping_response(&self) -> bool {
        self.new_ping_response.swap(false, Ordering::Acquire)
    }

    pub fn clear_ping_response(&self) {
        self.new_ping_response.store(false, Ordering::Relaxed);
    }

    /// Consumes the new-time flag.
    pub fn take_new_time(&self) -> bool {
        self.new_time.swap(false, Ordering::Acquire)
    }

    pub fn time(&self) -> ClockTime {
        self.time.lock(|cell| cell.get())
    }

    /// Last raw button state reported by the clock.
    pub fn button_state(&self) -> u8 {
        self.button_state.load(Ordering::Relaxed)
    }

    /// Pops the oldest undelivered button event.
    pub fn pop_button_event(&self) -> Option<u8> {
        self.buttons.lock(|ring| ring.borrow_mut().pop())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::Relaxed);
    }

    pub fn dropped_frames(&self) -> u32 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Wipes every flag and buffer, as part of (re)initializing the link.
    pub fn reset(&self) {
        self.clear_ack();
        self.clear_ping_response();
        self.new_time.store(false, Ordering::Relaxed);
        self.time.lock(|cell| cell.set(ClockTime::zero()));
        self.button_state.store(0, Ordering::Relaxed);
        self.buttons.lock(|ring| ring.borrow_mut().clear());
        self.connected.store(false, Ordering::Relaxed);
        self.configured.store(false, Ordering::Relaxed);
    }
}
