//! Transport adapter over the Nordic SoftDevice S140.
//!
//! The SoftDevice API is future-based: advertising resolves into a
//! `Connection`, and a GATT server future runs per connection until the
//! link drops. This module turns that into the flat [`GapEvent`] stream the
//! dispatcher expects:
//!
//! - [`SoftdeviceGap`] implements [`GapTransport`]. `start_advertising`
//!   only hands the payloads to [`advertising_task`].
//! - [`advertising_task`] runs the advertising future and reports
//!   `Connect` / `AdvertiseComplete`, spawning one [`connection_task`] per
//!   admitted link.
//! - [`connection_task`] runs the GATT server and reports `Subscribe` and
//!   `Disconnect`.
//! - [`SoftdeviceRadio`] implements [`NotifyTransport`].

use core::cell::{Cell, RefCell};

use blelink::ble::address::{AddrKind, Address};
use blelink::ble::adv_builder::AdvData;
use blelink::ble::event::{AttrHandle, ConnHandle, GapEvent, SubscribeReason};
use blelink::ble::security::{BondTable, IoCapabilities, SecurityParams};
use blelink::ble::transport::{GapTransport, NotifyTransport};
use blelink::config::MAX_CONNECTIONS;
use blelink::PlatformError;
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::security::{self as sd_security, SecurityHandler};
use nrf_softdevice::ble::{
    get_address, gatt_server, peripheral, set_address, AddressType, Connection, EncryptionInfo,
    IdentityKey, MasterId, SecurityMode,
};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

/// Largest characteristic write we accept from a peer.
pub const RX_PAYLOAD_LEN: usize = 64;

/// Bonds kept in RAM.
const MAX_BONDS: usize = 4;

/// Disconnect reason posted when a link ends. `gatt_server::run` returns
/// once the link is gone but does not say why.
const DISCONNECT_REASON_UNKNOWN: i32 = -1;

pub type RxPayload = Vec<u8, RX_PAYLOAD_LEN>;

/// Every GAP/GATT event, in order, for the worker task.
pub static GAP_EVENTS: Channel<CriticalSectionRawMutex, GapEvent, 16> = Channel::new();

/// Peer writes to the UART RX characteristic.
pub static RX_WRITES: Channel<CriticalSectionRawMutex, RxPayload, 4> = Channel::new();

enum AdvCommand {
    Start { adv_data: AdvData, scan_data: AdvData },
    Stop,
}

static ADV_COMMANDS: Signal<CriticalSectionRawMutex, AdvCommand> = Signal::new();

// ═══════════════════════════════════════════════════════════════════════════
// GATT schema
// ═══════════════════════════════════════════════════════════════════════════

#[nrf_softdevice::gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct UartService {
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    pub rx: Vec<u8, RX_PAYLOAD_LEN>,
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", notify, indicate)]
    pub tx: Vec<u8, RX_PAYLOAD_LEN>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub uart: UartService,
}

impl Server {
    /// Handle of the TX characteristic value, the one peers subscribe to.
    pub fn tx_handle(&self) -> AttrHandle {
        self.uart.tx_value_handle
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Security
// ═══════════════════════════════════════════════════════════════════════════

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
}

/// Pairing posture plus an in-RAM bond table.
pub struct Bonder {
    params: Cell<SecurityParams>,
    peers: RefCell<BondTable<PeerBond, MAX_BONDS>>,
}

impl Bonder {
    fn new() -> Self {
        Self {
            params: Cell::new(SecurityParams::default()),
            peers: RefCell::new(BondTable::new()),
        }
    }

    fn bonding(&self) -> bool {
        self.params.get().bonding
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> sd_security::IoCapabilities {
        match self.params.get().io_capabilities {
            IoCapabilities::DisplayOnly => sd_security::IoCapabilities::DisplayOnly,
            IoCapabilities::DisplayYesNo => sd_security::IoCapabilities::DisplayYesNo,
            IoCapabilities::KeyboardOnly => sd_security::IoCapabilities::KeyboardOnly,
            IoCapabilities::NoInputNoOutput => sd_security::IoCapabilities::None,
            IoCapabilities::KeyboardDisplay => sd_security::IoCapabilities::KeyboardDisplay,
        }
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        self.bonding()
    }

    fn on_bonded(
        &self,
        conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        if !self.bonding() {
            warn!("Bond offered while bonding is off; conn_handle={}", conn.handle());
            return;
        }

        let peer = conn.peer_address();
        let bond = PeerBond {
            master_id,
            key,
            peer_id,
        };
        let mut peers = self.peers.borrow_mut();
        let evicted = peers.store(bond, |p| p.master_id == master_id || p.peer_id.is_match(peer));
        if evicted.is_some() {
            warn!("Bond table full; forgot the oldest bond");
        }
        info!("Bond stored; conn_handle={} bonds={}", conn.handle(), peers.len());
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        if !self.bonding() {
            return None;
        }
        self.peers.borrow().find(|p| p.master_id == master_id).map(|p| p.key)
    }

    fn on_security_update(&self, conn: &Connection, mode: SecurityMode) {
        info!("Security updated; conn_handle={} mode={}", conn.handle(), mode);
    }
}

pub fn bonder() -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder::new())
}

// ═══════════════════════════════════════════════════════════════════════════
// GAP transport
// ═══════════════════════════════════════════════════════════════════════════

pub struct SoftdeviceGap {
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    adv_data: AdvData,
    scan_data: AdvData,
}

impl SoftdeviceGap {
    pub fn new(sd: &'static Softdevice, bonder: &'static Bonder) -> Self {
        Self {
            sd,
            bonder,
            adv_data: AdvData::new(),
            scan_data: AdvData::new(),
        }
    }
}

fn check(ret: u32) -> Result<(), PlatformError> {
    match ret {
        raw::NRF_SUCCESS => Ok(()),
        raw::NRF_ERROR_INVALID_STATE => Err(PlatformError::Busy),
        raw::NRF_ERROR_INVALID_LENGTH | raw::NRF_ERROR_DATA_SIZE => {
            Err(PlatformError::PayloadTooLarge)
        }
        raw::BLE_ERROR_GAP_INVALID_BLE_ADDR => Err(PlatformError::InvalidAddress),
        other => Err(PlatformError::Rejected(other as i32)),
    }
}

fn addr_kind(ty: AddressType) -> AddrKind {
    match ty {
        AddressType::Public => AddrKind::Public,
        AddressType::RandomStatic => AddrKind::Random,
        _ => AddrKind::RpaRandom,
    }
}

impl GapTransport for SoftdeviceGap {
    /// The schema is compiled in by `#[gatt_server]` and registered when the
    /// server is built; the core only checks that it landed.
    type Services = Server;

    fn configure_security(&mut self, params: &SecurityParams) {
        self.bonder.params.set(*params);
    }

    fn set_device_name(&mut self, name: &str) -> Result<(), PlatformError> {
        // Open link: security mode 1, level 1.
        let sec_mode = raw::ble_gap_conn_sec_mode_t {
            _bitfield_1: raw::ble_gap_conn_sec_mode_t::new_bitfield_1(1, 1),
        };
        let len = name.len() as u16;
        check(unsafe { raw::sd_ble_gap_device_name_set(&sec_mode, name.as_ptr(), len) })
    }

    fn set_appearance(&mut self, appearance: u16) -> Result<(), PlatformError> {
        check(unsafe { raw::sd_ble_gap_appearance_set(appearance) })
    }

    fn register_services(&mut self, services: &Server) -> Result<(), PlatformError> {
        if services.tx_handle() == 0 {
            return Err(PlatformError::Rejected(raw::NRF_ERROR_NOT_FOUND as i32));
        }
        Ok(())
    }

    fn set_random_identity(&mut self) -> Result<(), PlatformError> {
        let mut bytes = [0u8; 6];
        nrf_softdevice::random_bytes(self.sd, &mut bytes)
            .map_err(|_| PlatformError::Rejected(raw::NRF_ERROR_INTERNAL as i32))?;
        // Static random: two most significant bits set.
        bytes[5] |= 0xc0;
        let addr = nrf_softdevice::ble::Address::new(AddressType::RandomStatic, bytes);
        set_address(self.sd, &addr);
        Ok(())
    }

    fn ensure_address(&mut self, prefer_random: bool) -> Result<(), PlatformError> {
        let addr = get_address(self.sd);
        if addr.bytes() == [0; 6] {
            return Err(PlatformError::NoAddress);
        }
        if prefer_random && addr.address_type() == AddressType::Public {
            return Err(PlatformError::NoAddress);
        }
        Ok(())
    }

    fn infer_own_address_kind(&mut self) -> Result<AddrKind, PlatformError> {
        Ok(addr_kind(get_address(self.sd).address_type()))
    }

    fn own_address(&mut self, _kind: AddrKind) -> Result<[u8; 6], PlatformError> {
        Ok(get_address(self.sd).bytes())
    }

    fn peer_address(&mut self, handle: ConnHandle) -> Result<Address, PlatformError> {
        let conn = Connection::from_handle(handle)
            .ok_or(PlatformError::Rejected(raw::BLE_ERROR_INVALID_CONN_HANDLE as i32))?;
        let peer = conn.peer_address();
        Ok(Address::new(addr_kind(peer.address_type()), peer.bytes()))
    }

    fn tx_power_level(&self) -> i8 {
        0
    }

    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        self.adv_data = Vec::from_slice(data).map_err(|_| PlatformError::PayloadTooLarge)?;
        Ok(())
    }

    fn set_scan_response_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        self.scan_data = Vec::from_slice(data).map_err(|_| PlatformError::PayloadTooLarge)?;
        Ok(())
    }

    fn start_advertising(&mut self, _own_kind: AddrKind) -> Result<(), PlatformError> {
        ADV_COMMANDS.signal(AdvCommand::Start {
            adv_data: self.adv_data.clone(),
            scan_data: self.scan_data.clone(),
        });
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), PlatformError> {
        ADV_COMMANDS.signal(AdvCommand::Stop);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Notify transport
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy)]
pub struct SoftdeviceRadio;

impl NotifyTransport for SoftdeviceRadio {
    fn notify(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        let conn = Connection::from_handle(handle)
            .ok_or(PlatformError::Rejected(raw::BLE_ERROR_INVALID_CONN_HANDLE as i32))?;
        gatt_server::notify_value(&conn, attr, payload).map_err(|_| PlatformError::Rejected(-1))
    }

    fn indicate(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        let conn = Connection::from_handle(handle)
            .ok_or(PlatformError::Rejected(raw::BLE_ERROR_INVALID_CONN_HANDLE as i32))?;
        gatt_server::indicate_value(&conn, attr, payload).map_err(|_| PlatformError::Rejected(-1))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Event tasks
// ═══════════════════════════════════════════════════════════════════════════

fn post(event: GapEvent) {
    if GAP_EVENTS.try_send(event).is_err() {
        warn!("GAP event queue full - dropping {}", event);
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
pub async fn advertising_task(
    spawner: Spawner,
    sd: &'static Softdevice,
    server: &'static Server,
    bonder: &'static Bonder,
) -> ! {
    let config = peripheral::Config::default();
    loop {
        let AdvCommand::Start { adv_data, scan_data } = ADV_COMMANDS.wait().await else {
            continue;
        };

        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };

        match select(
            peripheral::advertise_pairable(sd, adv, &config, bonder),
            ADV_COMMANDS.wait(),
        )
        .await
        {
            Either::First(Ok(conn)) => {
                let Some(handle) = conn.handle() else {
                    post(GapEvent::Connect {
                        handle: 0,
                        status: -1,
                    });
                    continue;
                };
                post(GapEvent::Connect { handle, status: 0 });
                if spawner.spawn(connection_task(server, conn)).is_err() {
                    warn!("no connection task free for handle {}", handle);
                    post(GapEvent::Disconnect {
                        handle,
                        reason: DISCONNECT_REASON_UNKNOWN,
                    });
                }
            }
            Either::First(Err(peripheral::AdvertiseError::Timeout)) => {
                post(GapEvent::AdvertiseComplete { reason: 0 });
            }
            Either::First(Err(_)) => {
                post(GapEvent::AdvertiseComplete { reason: -1 });
            }
            Either::Second(AdvCommand::Start { adv_data, scan_data }) => {
                // Restart with fresh payloads on the next iteration.
                ADV_COMMANDS.signal(AdvCommand::Start {
                    adv_data,
                    scan_data,
                });
            }
            Either::Second(AdvCommand::Stop) => {}
        }
    }
}

#[embassy_executor::task(pool_size = MAX_CONNECTIONS)]
pub async fn connection_task(server: &'static Server, conn: Connection) {
    let Some(handle) = conn.handle() else { return };
    let tx = server.tx_handle();
    let mut notifying = false;
    let mut indicating = false;

    gatt_server::run(&conn, server, |e| match e {
        ServerEvent::Uart(UartServiceEvent::RxWrite(data)) => {
            if RX_WRITES.try_send(data).is_err() {
                warn!("RX queue full - dropping write");
            }
        }
        ServerEvent::Uart(UartServiceEvent::TxCccdWrite {
            notifications,
            indications,
        }) => {
            post(GapEvent::Subscribe {
                handle,
                attr: tx,
                reason: SubscribeReason::Write,
                prev_notify: notifying,
                cur_notify: notifications,
                prev_indicate: indicating,
                cur_indicate: indications,
            });
            notifying = notifications;
            indicating = indications;
        }
    })
    .await;

    if notifying || indicating {
        post(GapEvent::Subscribe {
            handle,
            attr: tx,
            reason: SubscribeReason::Termination,
            prev_notify: notifying,
            cur_notify: false,
            prev_indicate: indicating,
            cur_indicate: false,
        });
    }
    post(GapEvent::Disconnect {
        handle,
        reason: DISCONNECT_REASON_UNKNOWN,
    });
}

/// Build the GATT server. Must run before the SoftDevice is shared.
pub fn build_server(sd: &mut Softdevice) -> &'static Server {
    static SERVER: StaticCell<Server> = StaticCell::new();
    SERVER.init(unwrap!(Server::new(sd)))
}
