// slave.rs
//
// The slave leg of the dual-I2C link. The DGT3000 pushes time/button frames
// to I2C address 0x00 and ACK/ping frames to 0x10; only one can be bound at
// a time. Re-binding means tearing the peripheral down and re-creating it
// with the new address, which is exactly how the loop below is shaped: the
// link layer signals the requested address, we drop the device and build a
// fresh one.

use clockbridge_core::frame::{LISTEN_ACK, LISTEN_DATA};
use clockbridge_core::{debug, warn};
use clockbridge_drivers::dgt3000::{LINK_RX, LISTEN_ADDRESS, RECEIVE_BUFFER_LEN};
use embassy_futures::select::{Either, select};
use embassy_rp::i2c_slave::{self, Command, I2cSlave};
use embassy_time::Timer;

use crate::hardware::{Irqs, SlaveResources};

/// Address 0x00 is the I2C general-call address, so "listening on 0x00"
/// means enabling general-call reception. The unicast address is parked on
/// a reserved value the clock never targets.
const PARKED_ADDR: u8 = 0x7f;

fn config_for(address: u8) -> i2c_slave::Config {
    let mut config = i2c_slave::Config::default();
    if address == LISTEN_DATA {
        config.addr = PARKED_ADDR as u16;
        config.general_call = true;
    } else {
        config.addr = address as u16;
        config.general_call = false;
    }
    config
}

#[embassy_executor::task]
pub async fn slave_task(mut r: SlaveResources, irqs: Irqs) -> ! {
    let mut address = LISTEN_DATA;
    loop {
        let mut device = I2cSlave::new(
            r.i2c.reborrow(),
            r.scl.reborrow(),
            r.sda.reborrow(),
            irqs,
            config_for(address),
        );
        debug!("slave: listening on {:02x}", address);

        let mut buf = [0u8; RECEIVE_BUFFER_LEN];
        loop {
            match select(LISTEN_ADDRESS.wait(), device.listen(&mut buf)).await {
                Either::First(next) => {
                    if next != address {
                        address = next;
                        break;
                    }
                }
                Either::Second(Ok(Command::GeneralCall(len))) if address == LISTEN_DATA => {
                    LINK_RX.on_frame(&buf[..len]);
                }
                Either::Second(Ok(Command::Write(len))) if address == LISTEN_ACK => {
                    LINK_RX.on_frame(&buf[..len]);
                }
                Either::Second(Ok(_)) => {
                    // The clock never reads from us.
                }
                Either::Second(Err(e)) => {
                    warn!("slave: receive error {:?}", e);
                }
            }
        }

        // The old binding is dropped here; give the bus a moment before the
        // peripheral comes back under the new address.
        Timer::after_millis(1).await;
    }
}
