// channels.rs
//
// The inter-core transport: three bounded queues between the BLE loop on
// core 0 and the clock task on core 1, plus the session-event channel that
// carries connect/disconnect notifications. Each queued value is owned by
// the queue; a send that cannot complete drops the value on the floor and
// bumps a counter instead of blocking the producer.

use clockbridge_core::protocol::{ClockEvent, CommandResponse, EventData, EventKind, RawCommand};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::priority_channel::{Min, PriorityChannel};
use embassy_time::{Duration, Instant, with_timeout};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Commands from a BLE client, waiting for the clock task.
pub const RAW_COMMAND_QUEUE_DEPTH: usize = 10;
/// Events from the clock task, waiting to be notified out.
pub const EVENT_QUEUE_DEPTH: usize = 20;
/// Command responses from the clock task.
pub const RESPONSE_QUEUE_DEPTH: usize = 10;

/// How often the utilization check actually recomputes.
pub const HEALTH_CHECK_INTERVAL_MS: u32 = 5000;
/// A queue sitting above 80% of its capacity counts as unhealthy.
pub const UTILIZATION_THRESHOLD_PERCENT: usize = 80;

pub static RAW_COMMANDS: Channel<CriticalSectionRawMutex, RawCommand, RAW_COMMAND_QUEUE_DEPTH> =
    Channel::new();

/// The event queue drains in (priority, seq) order, which makes a
/// high-priority send behave like the head-insert the protocol asks for
/// while keeping insertion order within each priority class.
pub static EVENTS: PriorityChannel<CriticalSectionRawMutex, ClockEvent, Min, EVENT_QUEUE_DEPTH> =
    PriorityChannel::new();

pub static RESPONSES: Channel<CriticalSectionRawMutex, CommandResponse, RESPONSE_QUEUE_DEPTH> =
    Channel::new();

/// BLE session transitions observed by the GATT server and consumed by the
/// clock task's lifecycle handling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleSessionEvent {
    Connected,
    Disconnected,
    Subscribed,
    Unsubscribed,
}

pub static BLE_SESSION: Channel<CriticalSectionRawMutex, BleSessionEvent, 4> = Channel::new();

pub struct QueueStats {
    pub events_queued: AtomicU32,
    pub events_processed: AtomicU32,
    pub queue_overflows: AtomicU32,
    pub queue_timeouts: AtomicU32,
    pub max_event_queue_depth: AtomicU32,
}

pub static QUEUE_STATS: QueueStats = QueueStats {
    events_queued: AtomicU32::new(0),
    events_processed: AtomicU32::new(0),
    queue_overflows: AtomicU32::new(0),
    queue_timeouts: AtomicU32::new(0),
    max_event_queue_depth: AtomicU32::new(0),
};

static EVENT_SEQ: AtomicU32 = AtomicU32::new(0);

/// Stamps a fresh event with the monotonic clock and the next sequence
/// number, which fixes its drain position relative to its priority class.
pub fn new_event(kind: EventKind, priority: u8, data: EventData) -> ClockEvent {
    ClockEvent {
        kind,
        timestamp: Instant::now().as_millis(),
        priority,
        seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
        data,
    }
}

/// Queues an event, waiting up to `timeout_ms` for space. The event is gone
/// either way: delivered to the queue or dropped here.
pub async fn send_event(event: ClockEvent, timeout_ms: u64) -> bool {
    let sent = if timeout_ms == 0 {
        EVENTS.try_send(event).is_ok()
    } else {
        with_timeout(Duration::from_millis(timeout_ms), EVENTS.send(event))
            .await
            .is_ok()
    };
    if sent {
        QUEUE_STATS.events_queued.fetch_add(1, Ordering::Relaxed);
        QUEUE_STATS
            .max_event_queue_depth
            .fetch_max(EVENTS.len() as u32, Ordering::Relaxed);
    } else if timeout_ms == 0 {
        QUEUE_STATS.queue_overflows.fetch_add(1, Ordering::Relaxed);
    } else {
        QUEUE_STATS.queue_timeouts.fetch_add(1, Ordering::Relaxed);
    }
    sent
}

/// Receives the next event in drain order, counting it as processed.
pub async fn recv_event() -> ClockEvent {
    let event = EVENTS.receive().await;
    QUEUE_STATS.events_processed.fetch_add(1, Ordering::Relaxed);
    event
}

pub fn try_recv_event() -> Option<ClockEvent> {
    let event = EVENTS.try_receive().ok()?;
    QUEUE_STATS.events_processed.fetch_add(1, Ordering::Relaxed);
    Some(event)
}

/// Raw commands are deliberately not counted here; the clock task keeps its
/// own command statistics.
pub async fn send_raw_command(command: RawCommand, timeout_ms: u64) -> bool {
    if timeout_ms == 0 {
        RAW_COMMANDS.try_send(command).is_ok()
    } else {
        with_timeout(
            Duration::from_millis(timeout_ms),
            RAW_COMMANDS.send(command),
        )
        .await
        .is_ok()
    }
}

pub fn try_recv_raw_command() -> Option<RawCommand> {
    RAW_COMMANDS.try_receive().ok()
}

pub async fn send_response(response: CommandResponse, timeout_ms: u64) -> bool {
    if timeout_ms == 0 {
        RESPONSES.try_send(response).is_ok()
    } else {
        with_timeout(Duration::from_millis(timeout_ms), RESPONSES.send(response))
            .await
            .is_ok()
    }
}

pub async fn recv_response() -> CommandResponse {
    RESPONSES.receive().await
}

pub fn try_recv_response() -> Option<CommandResponse> {
    RESPONSES.try_receive().ok()
}

/// Current depth of each queue: (raw commands, events, responses).
pub fn queue_depths() -> (usize, usize, usize) {
    (RAW_COMMANDS.len(), EVENTS.len(), RESPONSES.len())
}

/// Drains and destroys everything still queued. Used when a connection ends
/// and all connection-bound state must go.
pub fn flush_all() {
    while RAW_COMMANDS.try_receive().is_ok() {}
    while EVENTS.try_receive().is_ok() {}
    while RESPONSES.try_receive().is_ok() {}
    while BLE_SESSION.try_receive().is_ok() {}
}

static HEALTH_LAST_CHECK_MS: AtomicU32 = AtomicU32::new(0);
static HEALTHY: AtomicBool = AtomicBool::new(true);

fn below_threshold(depth: usize, capacity: usize) -> bool {
    depth * 100 < capacity * UTILIZATION_THRESHOLD_PERCENT
}

/// Recomputes queue health at most once per interval; in between, returns
/// the cached verdict.
pub fn queue_health_check(now_ms: u64) -> bool {
    let now = now_ms as u32;
    let last = HEALTH_LAST_CHECK_MS.load(Ordering::Relaxed);
    if last != 0 && now.wrapping_sub(last) < HEALTH_CHECK_INTERVAL_MS {
        return HEALTHY.load(Ordering::Relaxed);
    }
    HEALTH_LAST_CHECK_MS.store(now, Ordering::Relaxed);

    let (raw, events, responses) = queue_depths();
    let healthy = below_threshold(raw, RAW_COMMAND_QUEUE_DEPTH)
        && below_threshold(events, EVENT_QUEUE_DEPTH)
        && below_threshold(responses, RESPONSE_QUEUE_DEPTH);
    HEALTHY.store(healthy, Ordering::Relaxed);
    healthy
}

/// The cached verdict, for status snapshots.
pub fn queues_healthy() -> bool {
    HEALTHY.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests;
