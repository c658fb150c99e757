// ble.rs
//
// The GATT side of the gateway, on core 0. One service, four
// characteristics: protocol version (read), command (write), event
// (notify + CCCD), status (read). Writes become RawCommands on the command
// queue; events and responses from the clock task drain into notifications;
// the status characteristic serves a JSON snapshot cached for two seconds.
//
// The BLE controller is the Bluetooth leg of the CYW43439 combo chip,
// driven over PIO-SPI and wrapped in a trouble-host stack.

use bt_hci::controller::ExternalController;
use clockbridge_core::protocol::{ClockEvent, CommandResponse, RawCommand, StatusSnapshot};
use clockbridge_core::status::{BleHealth, GATEWAY_HEALTH};
use clockbridge_core::types::{ConnectionState, MAX_COMMAND_BYTES, SystemState};
use clockbridge_core::{debug, error, info, warn};
use clockbridge_drivers::channels::{self, BleSessionEvent};
use cyw43_pio::{PioSpi, RM2_CLOCK_DIVIDER};
use defmt::unwrap;
use embassy_executor::Spawner;
use embassy_futures::select::{Either, Either3, select, select3};
use embassy_rp::adc::{self, Adc};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Instant, Ticker, Timer};
use static_cell::StaticCell;
use trouble_host::prelude::*;

use crate::hardware::{BleResources, Irqs};

/// Name the gateway advertises under.
pub const DEVICE_NAME: &str = "DGT3000-Gateway";
/// Value of the protocol-version characteristic.
pub const PROTOCOL_VERSION: &[u8] = b"1.0";

const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 3;
/// The status JSON cache is rebuilt at most this often, or on read.
const STATUS_REFRESH_MS: u64 = 2000;
/// Queue deadline when forwarding a command write.
const COMMAND_ENQUEUE_TIMEOUT_MS: u64 = 10;

#[gatt_server]
struct Server {
    gateway: GatewayService,
}

#[gatt_service(uuid = "73822f6e-edcd-44bb-974b-93ee97cb0000")]
struct GatewayService {
    /// Protocol version, fixed at "1.0" for this wire format.
    #[characteristic(uuid = "73822f6e-edcd-44bb-974b-93ee97cb0001", read)]
    protocol_version: heapless::Vec<u8, 8>,

    /// Clients write JSON command documents here.
    #[characteristic(uuid = "73822f6e-edcd-44bb-974b-93ee97cb0002", write)]
    command: heapless::Vec<u8, 512>,

    /// Events and command responses notify through here.
    #[characteristic(uuid = "73822f6e-edcd-44bb-974b-93ee97cb0003", notify)]
    event: heapless::Vec<u8, 512>,

    /// Serialized SystemStatus snapshot.
    #[characteristic(uuid = "73822f6e-edcd-44bb-974b-93ee97cb0004", read)]
    status: heapless::Vec<u8, 512>,
}

// Keeping the runner in its own task isolates the rest of the gateway from
// failures in the chip driver.
#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<
        'static,
        cyw43::SpiBus<Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
    >,
) -> ! {
    runner.run().await
}

/// Per-connection notification bookkeeping.
struct Session {
    subscribed: bool,
    notifications_sent: u32,
    notifications_failed: u32,
}

/// Something on its way out of the event characteristic.
enum Outbound {
    Event(ClockEvent),
    Response(CommandResponse),
}

async fn next_outbound() -> Outbound {
    match select(channels::recv_event(), channels::recv_response()).await {
        Either::First(event) => Outbound::Event(event),
        Either::Second(response) => Outbound::Response(response),
    }
}

#[embassy_executor::task]
pub async fn ble_gateway_task(spawner: Spawner, r: BleResources) -> ! {
    // CYW43 firmware: Wi-Fi core, CLM blob, and the Bluetooth core.
    let fw = include_bytes!("../firmware/cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../firmware/cyw43-firmware/43439A0_clm.bin");
    let btfw = include_bytes!("../firmware/cyw43-firmware/43439A0_btfw.bin");

    let pwr = Output::new(r.pwr, Level::Low);
    let cs = Output::new(r.cs, Level::High);
    let mut pio = Pio::new(r.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        RM2_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio,
        r.clk,
        r.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (_net_device, bt_device, mut control, runner) =
        cyw43::new_with_bluetooth(state, pwr, spi, fw, btfw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));
    control.init(clm).await;

    // On-chip temperature sensor feeds the status document.
    let mut adc = Adc::new(r.adc, Irqs, adc::Config::default());
    let mut temp_sensor = adc::Channel::new_temp_sensor(r.temp_sensor);

    let controller: ExternalController<_, 10> = ExternalController::new(bt_device);
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random([0x7e, 0x83, 0x07, 0x3b, 0x9f, 0xc6]));
    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let server: Server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    })) {
        Ok(server) => server,
        Err(_) => {
            error!("failed to build GATT server");
            loop {
                Timer::after_secs(60).await;
            }
        }
    };

    let mut version: heapless::Vec<u8, 8> = heapless::Vec::new();
    let _ = version.extend_from_slice(PROTOCOL_VERSION);
    let _ = server.set(&server.gateway.protocol_version, &version);

    info!("BLE service up, advertising as '{}'", DEVICE_NAME);

    let peripheral_loop = async {
        let mut adv_data = [0u8; 31];
        let len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
            ],
            &mut adv_data,
        ) {
            Ok(len) => len,
            Err(_) => {
                error!("advertising payload does not fit");
                return;
            }
        };

        loop {
            debug!("advertising...");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..len],
                        scan_data: &[],
                    },
                )
                .await
            {
                Ok(advertiser) => advertiser,
                Err(_) => continue,
            };

            let acceptor = match advertiser.accept().await {
                Ok(acceptor) => acceptor,
                Err(_) => continue,
            };
            info!("BLE client connected");

            let conn = match acceptor.with_attribute_server(&server) {
                Ok(conn) => conn,
                Err(_) => continue,
            };

            channels::BLE_SESSION.send(BleSessionEvent::Connected).await;
            let mut session = Session {
                subscribed: false,
                notifications_sent: 0,
                notifications_failed: 0,
            };

            run_connection(&server, &conn, &mut session, &mut adc, &mut temp_sensor).await;

            info!("BLE client disconnected");
            publish_ble_health(&session, false, read_temperature(&mut adc, &mut temp_sensor).await);
            channels::BLE_SESSION
                .send(BleSessionEvent::Disconnected)
                .await;
            // The clock task resets the system; keep advertising until the
            // reset lands so a quick reconnect is never left hanging.
        }
    };

    select(runner_task(runner), peripheral_loop).await;
    error!("BLE stack stopped");
    loop {
        Timer::after_secs(60).await;
    }
}

async fn runner_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if let Err(e) = runner.run().await {
            error!("BLE runner error: {:?}", e);
        }
    }
}

async fn run_connection(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    session: &mut Session,
    adc: &mut Adc<'static, adc::Async>,
    temp_sensor: &mut adc::Channel<'static>,
) {
    let mut status_ticker = Ticker::every(Duration::from_millis(STATUS_REFRESH_MS));
    refresh_status(server, session, adc, temp_sensor).await;

    loop {
        match select3(conn.next(), next_outbound(), status_ticker.next()).await {
            Either3::First(event) => match event {
                GattConnectionEvent::Disconnected { reason } => {
                    debug!("gatt disconnect: {:?}", reason);
                    break;
                }
                GattConnectionEvent::Gatt { event } => {
                    handle_gatt_event(server, session, event, adc, temp_sensor).await;
                }
                _ => {}
            },
            Either3::Second(outbound) => {
                notify_client(server, conn, session, outbound).await;
            }
            Either3::Third(_) => {
                refresh_status(server, session, adc, temp_sensor).await;
            }
        }
    }
}

async fn handle_gatt_event(
    server: &Server<'_>,
    session: &mut Session,
    event: GattEvent<'_, '_, DefaultPacketPool>,
    adc: &mut Adc<'static, adc::Async>,
    temp_sensor: &mut adc::Channel<'static>,
) {
    match event {
        GattEvent::Write(write_event) => {
            let handle = write_event.handle();
            if handle == server.gateway.command.handle {
                forward_command(write_event.data()).await;
            } else if Some(handle) == server.gateway.event.cccd_handle {
                // CCCD bit 0 is the notification subscription.
                let data = write_event.data();
                let subscribed = data.len() >= 2 && data[0] & 0x01 != 0;
                if subscribed != session.subscribed {
                    session.subscribed = subscribed;
                    if subscribed {
                        info!("client subscribed to event notifications");
                        channels::BLE_SESSION.send(BleSessionEvent::Subscribed).await;
                    } else {
                        info!("client unsubscribed from event notifications");
                        channels::BLE_SESSION
                            .send(BleSessionEvent::Unsubscribed)
                            .await;
                    }
                }
            }
            match write_event.accept() {
                Ok(reply) => reply.send().await,
                Err(e) => warn!("gatt write reply error: {:?}", e),
            }
        }
        GattEvent::Read(read_event) => {
            if read_event.handle() == server.gateway.status.handle {
                // Serve a fresh snapshot on explicit reads.
                refresh_status(server, session, adc, temp_sensor).await;
            }
            match read_event.accept() {
                Ok(reply) => reply.send().await,
                Err(e) => warn!("gatt read reply error: {:?}", e),
            }
        }
        GattEvent::Other(other_event) => {
            let _ = other_event.accept();
        }
    }
}

/// Validates a command write and hands it to the clock task. The payload
/// must at least look like a JSON object; real parsing happens on core 1.
async fn forward_command(data: &[u8]) {
    if data.is_empty() || data.len() >= MAX_COMMAND_BYTES {
        warn!("command write with invalid length {}", data.len());
        return;
    }
    if data[0] != b'{' || data[data.len() - 1] != b'}' {
        warn!("command write is not a JSON object, dropped");
        return;
    }

    let mut payload: heapless::Vec<u8, MAX_COMMAND_BYTES> = heapless::Vec::new();
    let _ = payload.extend_from_slice(data);
    let command = RawCommand {
        timestamp: Instant::now().as_millis(),
        length: payload.len(),
        payload,
    };
    if !channels::send_raw_command(command, COMMAND_ENQUEUE_TIMEOUT_MS).await {
        error!("raw command queue full, command dropped");
    }
}

async fn notify_client(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    session: &mut Session,
    outbound: Outbound,
) {
    let mut payload: heapless::Vec<u8, 512> = heapless::Vec::new();
    let serialized = match &outbound {
        Outbound::Event(event) => event
            .to_json()
            .map(|json| payload.extend_from_slice(json.as_bytes()))
            .is_ok(),
        Outbound::Response(response) => response
            .to_json()
            .map(|json| payload.extend_from_slice(json.as_bytes()))
            .is_ok(),
    };
    if !serialized {
        warn!("notification payload did not serialize");
        session.notifications_failed += 1;
        return;
    }

    match server.gateway.event.notify(conn, &payload).await {
        Ok(()) => session.notifications_sent += 1,
        Err(_) => {
            session.notifications_failed += 1;
            warn!("notification failed");
        }
    }
}

/// RP2040 temperature sensor: 27 °C at 0.706 V, −1.721 mV/°C.
async fn read_temperature(
    adc: &mut Adc<'static, adc::Async>,
    temp_sensor: &mut adc::Channel<'static>,
) -> i16 {
    match adc.read(temp_sensor).await {
        Ok(raw) => {
            let millivolts = (raw as i32 * 3300) / 4096;
            (27 - (millivolts - 706) * 1000 / 1721) as i16
        }
        Err(_) => -999,
    }
}

async fn refresh_status(
    server: &Server<'_>,
    session: &Session,
    adc: &mut Adc<'static, adc::Async>,
    temp_sensor: &mut adc::Channel<'static>,
) {
    let temperature = read_temperature(adc, temp_sensor).await;
    let clock = GATEWAY_HEALTH.clock();
    let (raw_depth, event_depth, response_depth) = channels::queue_depths();

    let snapshot = StatusSnapshot {
        system_state: SystemState::Active.as_str(),
        ble_connected: true,
        dgt_connected: matches!(
            clock.dgt_state,
            ConnectionState::Connected | ConnectionState::Configured
        ),
        dgt_configured: clock.dgt_configured,
        uptime: Instant::now().as_millis(),
        temperature,
        commands_processed: clock.commands_received,
        events_generated: clock.events_generated,
        notifications_sent: session.notifications_sent,
        notifications_failed: session.notifications_failed,
        raw_cmd_queue_depth: raw_depth as u16,
        evt_queue_depth: event_depth as u16,
        resp_queue_depth: response_depth as u16,
        queues_healthy: channels::queues_healthy(),
    };

    match snapshot.to_json() {
        Ok(json) => {
            let mut value: heapless::Vec<u8, 512> = heapless::Vec::new();
            let _ = value.extend_from_slice(json.as_bytes());
            if server.set(&server.gateway.status, &value).is_err() {
                warn!("failed to store status snapshot");
            }
        }
        Err(_) => warn!("status snapshot did not serialize"),
    }

    publish_ble_health(session, true, temperature);
}

fn publish_ble_health(session: &Session, connected: bool, temperature_c: i16) {
    GATEWAY_HEALTH.publish_ble(BleHealth {
        connected,
        subscribed: session.subscribed,
        notifications_sent: session.notifications_sent,
        notifications_failed: session.notifications_failed,
        uptime_ms: Instant::now().as_millis(),
        temperature_c,
    });
}
