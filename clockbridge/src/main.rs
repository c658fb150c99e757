#![no_std]
#![no_main]

// DGT3000 BLE gateway for the Raspberry Pi Pico W.
//
// Core 0 runs the BLE stack and the system monitor; core 1 belongs to the
// clock: the 100 Hz task loop plus the I2C slave listener. The two sides
// meet only at the queues in clockbridge-drivers and the health blackboard
// in clockbridge-core.

use clockbridge_core::{info, warn};
use clockbridge_drivers::channels;
use defmt::unwrap;
use embassy_executor::Executor;
use embassy_rp::multicore::{Stack, spawn_core1};
use embassy_time::{Duration, Instant, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use cortex_m_rt::entry;

mod ble;
mod clock;
mod hardware;
mod slave;

use hardware::{GatewayResources, Irqs};

// Program metadata for `picotool info`.
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"DGT3000 BLE Gateway"),
    embassy_rp::binary_info::rp_program_description!(
        c"Bridges a BLE client to a DGT3000 chess clock over dual I2C."
    ),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

/// Cadence of the queue health check.
const HEALTH_CHECK_INTERVAL_S: u64 = 5;
/// Full status summary every sixth health check (30 s).
const STATUS_LOG_EVERY: u32 = 6;

// Watches queue utilization and periodically logs the system picture.
#[embassy_executor::task]
async fn system_monitor_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_secs(HEALTH_CHECK_INTERVAL_S));
    let mut checks: u32 = 0;
    loop {
        ticker.next().await;

        if !channels::queue_health_check(Instant::now().as_millis()) {
            warn!("queue system unhealthy (high utilization)");
        }

        checks = checks.wrapping_add(1);
        if checks % STATUS_LOG_EVERY == 0 {
            let clock = clockbridge_core::GATEWAY_HEALTH.clock();
            let ble = clockbridge_core::GATEWAY_HEALTH.ble();
            let (raw, events, responses) = channels::queue_depths();
            info!(
                "status: ble {} | dgt {} | commands {} | events {} | queues {}/{}/{}",
                ble.connected,
                clock.dgt_configured,
                clock.commands_received,
                clock.events_generated,
                raw,
                events,
                responses,
            );
        }
    }
}

static EXECUTOR0: StaticCell<Executor> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();

const CORE1_STACK_SIZE: usize = 8192;
static mut CORE1_STACK: Stack<CORE1_STACK_SIZE> = Stack::new();

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    let r = GatewayResources::split(p);

    info!("DGT3000 BLE Gateway starting");

    // The clock side gets core 1 to itself so BLE traffic can never stall
    // the 100 Hz loop or the slave listener.
    spawn_core1(
        r.core.core1,
        unsafe { &mut *core::ptr::addr_of_mut!(CORE1_STACK) },
        move || {
            let executor1 = EXECUTOR1.init(Executor::new());
            executor1.run(|spawner| {
                unwrap!(spawner.spawn(clock::clock_task(r.clock, Irqs)));
                unwrap!(spawner.spawn(slave::slave_task(r.slave, Irqs)));
            });
        },
    );

    let executor0 = EXECUTOR0.init(Executor::new());
    executor0.run(|spawner| {
        unwrap!(spawner.spawn(ble::ble_gateway_task(spawner, r.ble)));
        unwrap!(spawner.spawn(system_monitor_task()));
    });
}
