//! blelink firmware for the nRF52840 + S140 SoftDevice.
//!
//! Exposes a Nordic-UART-style service to up to `MAX_CONNECTIONS`
//! centrals at once. Task layout:
//!
//! - `softdevice_task` runs the SoftDevice event loop.
//! - `advertising_task` / `connection_task` (in [`softdevice`]) turn
//!   SoftDevice futures into `GapEvent`s.
//! - `worker_task` owns the dispatcher and processes events serially.
//! - `callbacks_task` runs application hooks off the event path.
//! - `telemetry_task` notifies subscribers periodically.
//! - `rx_task` consumes writes to the RX characteristic.

#![no_std]
#![no_main]

mod softdevice;

use core::fmt::Write;
use core::mem;

use blelink::ble::callbacks::{pump, CallbackMessage, CallbackQueue};
use blelink::ble::rx;
use blelink::ble::security::SecurityConfig;
use blelink::ble::ConnectionRecord;
use blelink::config::{AdvertisingConfig, MAX_CONNECTIONS, MAX_SUBSCRIPTIONS_PER_CONN};
use blelink::{
    Error, EventDispatcher, GapEvent, NotificationSender, Peripheral, PeripheralCallbacks,
    PeripheralConfig,
};
use defmt::{debug, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use heapless::String;
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use softdevice::{
    advertising_task, bonder, build_server, softdevice_task, Server, SoftdeviceGap,
    SoftdeviceRadio, GAP_EVENTS, RX_PAYLOAD_LEN, RX_WRITES,
};
use {defmt_rtt as _, panic_probe as _};

const DEVICE_NAME: &str = "blelink";

/// Seconds between telemetry notifications.
const TELEMETRY_PERIOD_SECS: u64 = 5;

/// Pending application hooks.
const CALLBACK_QUEUE_LEN: usize = 8;

type Hooks = CallbackMessage<MAX_SUBSCRIPTIONS_PER_CONN>;

static PERIPHERAL: Peripheral<
    CriticalSectionRawMutex,
    MAX_CONNECTIONS,
    MAX_SUBSCRIPTIONS_PER_CONN,
> = Peripheral::new();

static CALLBACKS: Channel<CriticalSectionRawMutex, Hooks, CALLBACK_QUEUE_LEN> = Channel::new();

static CONFIG: StaticCell<PeripheralConfig<'static, Server>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("blelink starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(config);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CONNECTIONS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 247 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CONNECTIONS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: blelink::config::MAX_DEVICE_NAME_LEN as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    let server = build_server(sd);
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let bonder = bonder();
    let mut gap = SoftdeviceGap::new(sd, bonder);

    // Keep advertising while connected so every slot can be filled.
    let config = PeripheralConfig::new(DEVICE_NAME, server)
        .with_advertising(AdvertisingConfig {
            readvertise_while_connected: true,
            ..Default::default()
        })
        .with_security(SecurityConfig {
            bonding: true,
            random_address: true,
            ..Default::default()
        });
    let config: &'static PeripheralConfig<'static, Server> = CONFIG.init(config);

    // Bring-up failures leave nothing to run.
    unwrap!(PERIPHERAL.initialize(config, &mut gap));

    unwrap!(spawner.spawn(advertising_task(spawner, sd, server, bonder)));
    unwrap!(spawner.spawn(callbacks_task()));
    unwrap!(spawner.spawn(worker_task(config, gap)));
    unwrap!(spawner.spawn(telemetry_task(server)));
    unwrap!(spawner.spawn(rx_task()));
}

#[embassy_executor::task]
async fn worker_task(
    config: &'static PeripheralConfig<'static, Server>,
    gap: SoftdeviceGap,
) -> ! {
    let hooks = CallbackQueue::new(&CALLBACKS);
    let mut dispatcher = EventDispatcher::new(&PERIPHERAL, config, gap, hooks);

    if let Err(e) = dispatcher.on_host_sync() {
        if e.is_fatal_at_bringup() {
            defmt::panic!("BLE identity setup failed: {}", e);
        }
        warn!("Initial advertising failed: {}", e);
    }

    loop {
        let event = GAP_EVENTS.receive().await;
        if let Err(e) = dispatcher.dispatch(&event) {
            debug!("{} not applied: {}", event, e);
        }
    }
}

/// Application hooks. Run on `callbacks_task`, never on the event path.
struct AppHooks;

impl PeripheralCallbacks<MAX_SUBSCRIPTIONS_PER_CONN> for AppHooks {
    fn on_connect(&mut self, event: &GapEvent, index: usize) {
        // The slot may have been reused by the time this runs.
        let Some(handle) = event.conn_handle() else {
            return;
        };
        match PERIPHERAL.connection_by_handle(handle) {
            Some(record) => info!(
                "peer {} connected (conn {}, slot {})",
                record.peer_str.as_str(),
                handle,
                index
            ),
            None => info!("conn {} connected and already gone (slot {})", handle, index),
        }
    }

    fn on_disconnect(
        &mut self,
        _event: &GapEvent,
        record: ConnectionRecord<MAX_SUBSCRIPTIONS_PER_CONN>,
    ) {
        info!(
            "peer {} gone, had {} notify subscriptions",
            record.peer_str.as_str(),
            record.subscriptions.notify.len()
        );
    }

    fn on_subscribe_notify(&mut self, _event: &GapEvent, index: usize) {
        info!("slot {} enabled notifications", index);
    }

    fn on_unsubscribe_notify(&mut self, _event: &GapEvent, index: usize) {
        info!("slot {} disabled notifications", index);
    }
}

#[embassy_executor::task]
async fn callbacks_task() -> ! {
    pump(&CALLBACKS, &mut AppHooks).await
}

#[embassy_executor::task]
async fn telemetry_task(server: &'static Server) -> ! {
    let sender = NotificationSender::new(&PERIPHERAL, SoftdeviceRadio);
    let mut buffer = [0u8; RX_PAYLOAD_LEN];
    let mut ticker = Ticker::every(Duration::from_secs(TELEMETRY_PERIOD_SECS));

    loop {
        ticker.next().await;

        let mut msg: String<32> = String::new();
        let _ = write!(&mut msg, "uptime {}s", Instant::now().as_secs());

        match sender.notify(server.tx_handle(), &mut buffer, msg.as_bytes()) {
            Ok(sent) => debug!("telemetry sent to {} peers", sent),
            Err(Error::NoConnections) => {}
            Err(e) => warn!("telemetry failed: {}", e),
        }
    }
}

#[embassy_executor::task]
async fn rx_task() -> ! {
    let mut buffer = [0u8; RX_PAYLOAD_LEN + 1];
    loop {
        let data = RX_WRITES.receive().await;
        match rx::ingest_str(&data, &mut buffer) {
            Ok(text) => info!("RX: {}", text),
            Err(e) => warn!("RX write rejected: {}", e),
        }
    }
}
