// DGT3000 dual-I2C link layer.
//
// The master leg sends command frames to the clock; the slave leg receives
// time, button, ACK and ping-response frames on one of two listen addresses.
// `Dgt3000Link` owns the send discipline, `LinkRx` holds the receive-side
// state the slave listener fills in, and `LISTEN_ADDRESS` carries rebind
// requests to whoever owns the slave peripheral.

mod link;
mod rx;

pub use link::{
    ACK_POLL_INTERVAL_MS, ACK_TIMEOUT_MS, ADDRESS_SWITCH_DELAY_MS, COMMAND_DELAY_MS, Dgt3000Link,
    PING_TIMEOUT_MS, RETRY_DELAY_MS, SEND_ATTEMPTS,
};
pub use rx::{LINK_RX, LISTEN_ADDRESS, LinkRx, RECEIVE_BUFFER_LEN};
