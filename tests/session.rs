//! End-to-end scenarios driving the full control layer through a
//! scripted in-process HAL.
//!
//! The fake HAL delivers most events synchronously from within the
//! request call, which exercises the buffered-wakeup path (the
//! completion fires before the caller suspends). Connection opens and
//! write acknowledgements are delivered from a separate thread to
//! exercise real suspension.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use btctl::{
    AdapterState, AuthRequirement, BdAddr, BtController, CharacteristicIdentity,
    CharacteristicProperties, ClientIf, ClientObserver, ConnectionId, DeviceProperties,
    DeviceProperty, DeviceType, DiscoveryState, Error, GattStatus, HalCallbacks, HalStatus,
    HardwareInterface, NullObserver, ServiceIdentity, SessionSettings, SspVariant, Uuid,
    WriteDetails, WriteType,
};

const CLIENT_IF: ClientIf = 7;

fn svc(uuid16: u16) -> ServiceIdentity {
    ServiceIdentity {
        uuid: Uuid::from_u16(uuid16),
        instance_id: 0,
        primary: true,
    }
}

fn chr(uuid16: u16) -> CharacteristicIdentity {
    CharacteristicIdentity {
        uuid: Uuid::from_u16(uuid16),
        instance_id: 0,
    }
}

fn peer() -> BdAddr {
    BdAddr::parse_str("AA:BB:CC:DD:EE:FF").unwrap()
}

#[derive(Default)]
struct FakeHal {
    callbacks: Mutex<Option<Arc<dyn HalCallbacks>>>,
    services: Mutex<Vec<ServiceIdentity>>,
    characteristics: Mutex<Vec<CharacteristicIdentity>>,
    descriptors: Mutex<Vec<Uuid>>,
    char_requests: AtomicUsize,
    next_conn_id: AtomicI32,
    /// Accept the connect request but never deliver the open event.
    silent_connect: AtomicBool,
    fail_unregister: AtomicBool,
    fail_disable: AtomicBool,
}

impl FakeHal {
    fn cb(&self) -> Arc<dyn HalCallbacks> {
        self.callbacks
            .lock()
            .unwrap()
            .clone()
            .expect("callbacks not registered")
    }

    fn set_services(&self, services: Vec<ServiceIdentity>) {
        *self.services.lock().unwrap() = services;
    }

    fn set_characteristics(&self, characteristics: Vec<CharacteristicIdentity>) {
        *self.characteristics.lock().unwrap() = characteristics;
    }

    fn set_descriptors(&self, descriptors: Vec<Uuid>) {
        *self.descriptors.lock().unwrap() = descriptors;
    }

    fn char_requests(&self) -> usize {
        self.char_requests.load(Ordering::SeqCst)
    }
}

impl HardwareInterface for FakeHal {
    fn set_callbacks(&self, callbacks: Arc<dyn HalCallbacks>) {
        *self.callbacks.lock().unwrap() = Some(callbacks);
    }

    fn enable(&self) -> HalStatus {
        // synchronous delivery: the state change lands before the caller
        // even starts waiting
        self.cb().adapter_state_changed(AdapterState::On);
        HalStatus::Success
    }

    fn disable(&self) -> HalStatus {
        if self.fail_disable.load(Ordering::SeqCst) {
            return HalStatus::Fail;
        }
        self.cb().adapter_state_changed(AdapterState::Off);
        HalStatus::Success
    }

    fn start_discovery(&self) -> HalStatus {
        let cb = self.cb();
        cb.discovery_state_changed(DiscoveryState::Started);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            cb.device_found(&[
                DeviceProperty::Name("Thermometer".to_string()),
                DeviceProperty::Address(BdAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66])),
                DeviceProperty::TypeOfDevice(DeviceType::Le),
                DeviceProperty::Rssi(-60),
            ]);
            cb.device_found(&[
                DeviceProperty::Name("Keyboard".to_string()),
                DeviceProperty::Address(BdAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x77])),
                DeviceProperty::TypeOfDevice(DeviceType::Dual),
                DeviceProperty::Alias("desk keyboard".to_string()),
                DeviceProperty::Rssi(-48),
            ]);
            cb.discovery_state_changed(DiscoveryState::Stopped);
        });
        HalStatus::Success
    }

    fn cancel_discovery(&self) -> HalStatus {
        self.cb().discovery_state_changed(DiscoveryState::Stopped);
        HalStatus::Success
    }

    fn ssp_reply(
        &self,
        _address: &BdAddr,
        _variant: SspVariant,
        _accept: bool,
        _passkey: u32,
    ) -> HalStatus {
        HalStatus::Success
    }

    fn register_client(&self, app_uuid: &Uuid) -> HalStatus {
        self.cb()
            .client_registered(GattStatus::SUCCESS, CLIENT_IF, app_uuid);
        HalStatus::Success
    }

    fn unregister_client(&self, _client_if: ClientIf) -> HalStatus {
        if self.fail_unregister.load(Ordering::SeqCst) {
            HalStatus::Fail
        } else {
            HalStatus::Success
        }
    }

    fn connect(&self, client_if: ClientIf, address: &BdAddr, _is_direct: bool) -> HalStatus {
        if self.silent_connect.load(Ordering::SeqCst) {
            return HalStatus::Success;
        }

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::SeqCst) + 1;
        let address = *address;
        let cb = self.cb();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            cb.connection_opened(conn_id, GattStatus::SUCCESS, client_if, &address);
        });
        HalStatus::Success
    }

    fn disconnect(
        &self,
        client_if: ClientIf,
        address: &BdAddr,
        conn_id: ConnectionId,
    ) -> HalStatus {
        self.cb()
            .connection_closed(conn_id, GattStatus::SUCCESS, client_if, address);
        HalStatus::Success
    }

    fn search_service(&self, conn_id: ConnectionId, _filter: Option<&Uuid>) -> HalStatus {
        let cb = self.cb();
        for service in self.services.lock().unwrap().iter() {
            cb.search_result(conn_id, service);
        }
        cb.search_complete(conn_id, GattStatus::SUCCESS);
        HalStatus::Success
    }

    fn get_characteristic(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        start_after: Option<&CharacteristicIdentity>,
    ) -> HalStatus {
        self.char_requests.fetch_add(1, Ordering::SeqCst);

        let list = self.characteristics.lock().unwrap().clone();
        let index = match start_after {
            None => 0,
            Some(previous) => list
                .iter()
                .position(|c| c == previous)
                .map_or(list.len(), |i| i + 1),
        };

        let cb = self.cb();
        if let Some(characteristic) = list.get(index) {
            cb.characteristic_result(
                conn_id,
                GattStatus::SUCCESS,
                service,
                characteristic,
                CharacteristicProperties(
                    CharacteristicProperties::READ | CharacteristicProperties::NOTIFY,
                ),
            );
        } else {
            let echo = start_after.copied().unwrap_or(chr(0));
            cb.characteristic_result(
                conn_id,
                GattStatus::END_OF_RECORDS,
                service,
                &echo,
                CharacteristicProperties(0),
            );
        }
        HalStatus::Success
    }

    fn get_descriptor(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        start_after: Option<&Uuid>,
    ) -> HalStatus {
        let list = self.descriptors.lock().unwrap().clone();
        let index = match start_after {
            None => 0,
            Some(previous) => list
                .iter()
                .position(|d| d == previous)
                .map_or(list.len(), |i| i + 1),
        };

        let cb = self.cb();
        if let Some(descriptor) = list.get(index) {
            cb.descriptor_result(conn_id, GattStatus::SUCCESS, service, characteristic, descriptor);
        } else {
            let echo = start_after.copied().unwrap_or(Uuid::from_u16(0));
            cb.descriptor_result(
                conn_id,
                GattStatus::END_OF_RECORDS,
                service,
                characteristic,
                &echo,
            );
        }
        HalStatus::Success
    }

    fn get_included_service(
        &self,
        _conn_id: ConnectionId,
        _service: &ServiceIdentity,
        _start_after: Option<&ServiceIdentity>,
    ) -> HalStatus {
        HalStatus::Success
    }

    fn register_for_notification(
        &self,
        _client_if: ClientIf,
        _address: &BdAddr,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
    ) -> HalStatus {
        let conn_id = self.next_conn_id.load(Ordering::SeqCst);
        self.cb()
            .notification_registered(conn_id, true, GattStatus::SUCCESS, service, characteristic);
        HalStatus::Success
    }

    fn unregister_for_notification(
        &self,
        _client_if: ClientIf,
        _address: &BdAddr,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
    ) -> HalStatus {
        let conn_id = self.next_conn_id.load(Ordering::SeqCst);
        self.cb()
            .notification_registered(conn_id, false, GattStatus::SUCCESS, service, characteristic);
        HalStatus::Success
    }

    fn write_characteristic(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        write_type: WriteType,
        _auth: AuthRequirement,
        _value: &[u8],
    ) -> HalStatus {
        if write_type == WriteType::Request {
            let details = WriteDetails {
                service: *service,
                characteristic: *characteristic,
                descriptor: None,
            };
            let cb = self.cb();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                cb.characteristic_written(conn_id, GattStatus::SUCCESS, &details);
            });
        }
        HalStatus::Success
    }

    fn write_descriptor(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        descriptor: &Uuid,
        write_type: WriteType,
        _auth: AuthRequirement,
        _value: &[u8],
    ) -> HalStatus {
        if write_type == WriteType::Request {
            let details = WriteDetails {
                service: *service,
                characteristic: *characteristic,
                descriptor: Some(*descriptor),
            };
            let cb = self.cb();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                cb.descriptor_written(conn_id, GattStatus::SUCCESS, &details);
            });
        }
        HalStatus::Success
    }

    fn read_remote_rssi(&self, client_if: ClientIf, address: &BdAddr) -> HalStatus {
        self.cb().remote_rssi(client_if, address, -55, GattStatus::SUCCESS);
        HalStatus::Success
    }
}

fn fast_settings() -> SessionSettings {
    SessionSettings {
        wait_timeout_ms: 2_000,
        command_settle_ms: 0,
        connect_settle_ms: 0,
        search_settle_ms: 0,
    }
}

fn controller(hal: &Arc<FakeHal>) -> BtController {
    BtController::initialize(
        Arc::clone(hal) as Arc<dyn HardwareInterface>,
        Arc::new(NullObserver),
        fast_settings(),
    )
}

fn enabled_controller(hal: &Arc<FakeHal>) -> BtController {
    let session = controller(hal);
    assert_eq!(session.enable().unwrap(), AdapterState::On);
    session
}

#[test]
fn enable_blocks_for_state_and_registers_client() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);

    // a second enable is a state error
    assert_eq!(
        session.enable(),
        Err(Error::NotReady("adapter is already enabled"))
    );

    // the GATT client registration done during enable makes connect possible
    let conn_id = session.connect(&peer()).unwrap();
    assert!(conn_id > 0);
}

#[test]
fn connect_inserts_registry_entry() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);

    let conn_id = session.connect(&peer()).unwrap();
    assert_eq!(session.connection_count(), 1);

    let info = session.find_connection(conn_id).unwrap();
    assert_eq!(info.address, peer());
    assert_eq!(session.head_connection().unwrap().conn_id, conn_id);
    assert_eq!(session.tail_connection().unwrap().conn_id, conn_id);
    assert!(session.next_connection(conn_id).is_none());
    assert_eq!(
        session.find_connection_by_address(&peer()).unwrap().conn_id,
        conn_id
    );
}

#[test]
fn connections_iterate_in_connect_order() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);

    let first = session.connect(&peer()).unwrap();
    let second = session
        .connect(&BdAddr([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]))
        .unwrap();

    assert_eq!(session.connection_count(), 2);
    assert_eq!(session.head_connection().unwrap().conn_id, first);
    assert_eq!(session.tail_connection().unwrap().conn_id, second);
    assert_eq!(session.next_connection(first).unwrap().conn_id, second);
}

#[test]
fn disconnect_removes_connection() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);

    let conn_id = session.connect(&peer()).unwrap();
    session.disconnect(conn_id).unwrap();

    assert_eq!(session.connection_count(), 0);
    assert!(session.find_connection(conn_id).is_none());
    assert_eq!(
        session.disconnect(conn_id),
        Err(Error::ConnectionNotFound(conn_id))
    );

    // reconnect and tear down through the address flavor
    session.connect(&peer()).unwrap();
    session.disconnect_by_address(&peer()).unwrap();
    assert_eq!(session.connection_count(), 0);
    assert_eq!(
        session.disconnect_by_address(&peer()),
        Err(Error::NotReady("device is not connected"))
    );
}

#[test]
fn connect_without_enable_is_refused() {
    let hal = Arc::new(FakeHal::default());
    let session = controller(&hal);
    assert_eq!(session.connect(&peer()), Err(Error::NotReady("adapter is down")));
}

#[test]
fn connect_timeout_when_open_event_never_arrives() {
    let hal = Arc::new(FakeHal::default());
    hal.silent_connect.store(true, Ordering::SeqCst);

    let session = BtController::initialize(
        Arc::clone(&hal) as Arc<dyn HardwareInterface>,
        Arc::new(NullObserver),
        SessionSettings {
            wait_timeout_ms: 50,
            command_settle_ms: 0,
            connect_settle_ms: 0,
            search_settle_ms: 0,
        },
    );
    session.enable().unwrap();

    assert_eq!(
        session.connect(&peer()),
        Err(Error::Timeout("connection open"))
    );
    // the timed-out wait slot is released, later calls still work
    hal.silent_connect.store(false, Ordering::SeqCst);
    assert!(session.connect(&peer()).is_ok());
}

#[test]
fn blocking_discovery_collects_devices() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);

    assert_eq!(session.start_discovery().unwrap(), 2);
    assert_eq!(session.device_count(), 2);

    let first = session.device(0).unwrap();
    assert_eq!(first.name, "Thermometer");
    assert_eq!(first.device_type, DeviceType::Le);
    assert_eq!(first.rssi, -60);

    let second = session.device(1).unwrap();
    assert_eq!(second.alias.as_deref(), Some("desk keyboard"));

    // a new round clears the previous results instead of appending
    assert_eq!(session.start_discovery().unwrap(), 2);
    assert_eq!(session.device_count(), 2);
}

#[test]
fn discovery_requires_adapter_on() {
    let hal = Arc::new(FakeHal::default());
    let session = controller(&hal);
    assert_eq!(
        session.start_discovery(),
        Err(Error::NotReady("adapter is down"))
    );
    assert_eq!(
        session.start_discovery_background(),
        Err(Error::NotReady("adapter is down"))
    );
}

#[test]
fn discover_services_fills_cache() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800), svc(0x1801), svc(0x180f)]);
    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();

    assert_eq!(session.discover_services(conn_id, None).unwrap(), 3);

    let services = session.services(conn_id).unwrap();
    assert_eq!(services.len(), 3);
    assert_eq!(services[2], svc(0x180f));

    // a second round starts from a clean slate
    assert_eq!(session.discover_services(conn_id, None).unwrap(), 3);
    assert_eq!(session.services(conn_id).unwrap().len(), 3);
}

#[test]
fn discover_characteristics_is_self_driving() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800), svc(0x180f)]);
    hal.set_characteristics((0..10).map(|n| chr(0x2a00 + n)).collect());

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();

    assert_eq!(session.discover_characteristics(conn_id, 1).unwrap(), 10);

    let characteristics = session.characteristics(conn_id, 1).unwrap();
    assert_eq!(characteristics.len(), 10);
    assert_eq!(characteristics[0].0, chr(0x2a00));
    assert_eq!(characteristics[9].0, chr(0x2a09));
    assert!(characteristics[0].1.contains(CharacteristicProperties::NOTIFY));

    // ten records plus the end-of-records probe
    assert_eq!(hal.char_requests(), 11);
}

#[test]
fn empty_characteristic_listing_completes_cleanly() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800)]);
    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();

    // the only event carries the non-zero end-of-records status
    assert_eq!(session.discover_characteristics(conn_id, 0).unwrap(), 0);
}

#[test]
fn characteristic_discovery_validates_index() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800)]);
    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();

    assert_eq!(
        session.discover_characteristics(conn_id, 5),
        Err(Error::InvalidIndex {
            kind: "service",
            index: 5,
            count: 1,
        })
    );
    assert_eq!(
        session.discover_characteristics(99, 0),
        Err(Error::ConnectionNotFound(99))
    );
}

#[test]
fn discover_descriptors_fills_cache() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x180f)]);
    hal.set_characteristics(vec![chr(0x2a19)]);
    hal.set_descriptors(vec![Uuid::from_u16(0x2902), Uuid::from_u16(0x2901)]);

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();
    session.discover_characteristics(conn_id, 0).unwrap();

    assert_eq!(session.discover_descriptors(conn_id, 0, 0).unwrap(), 2);
    assert_eq!(
        session.descriptors(conn_id, 0, 0).unwrap(),
        vec![Uuid::from_u16(0x2902), Uuid::from_u16(0x2901)]
    );
}

#[test]
fn compound_lookup_resolves_both_indices() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800), svc(0x180f)]);
    hal.set_characteristics(vec![chr(0x2a00), chr(0x2a19)]);

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();

    let found = session
        .find_service_and_characteristic(conn_id, &Uuid::from_u16(0x180f), &Uuid::from_u16(0x2a19))
        .unwrap();
    assert_eq!(found, Some((1, 1)));
    assert!(hal.char_requests() > 0);
}

#[test]
fn compound_lookup_miss_skips_characteristic_discovery() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800)]);
    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();

    let found = session
        .find_service_and_characteristic(conn_id, &Uuid::from_u16(0x1234), &Uuid::from_u16(0x2a19))
        .unwrap();
    assert_eq!(found, None);
    assert_eq!(hal.char_requests(), 0);
}

#[test]
fn write_request_blocks_until_acknowledged() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x180f)]);
    hal.set_characteristics(vec![chr(0x2a19)]);
    hal.set_descriptors(vec![Uuid::from_u16(0x2902)]);

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();
    session.discover_characteristics(conn_id, 0).unwrap();
    session.discover_descriptors(conn_id, 0, 0).unwrap();

    session
        .write_characteristic_request(conn_id, 0, 0, AuthRequirement::None, &[0x01, 0x02])
        .unwrap();
    session
        .write_characteristic_command(conn_id, 0, 0, AuthRequirement::None, &[0x03])
        .unwrap();
    session
        .write_descriptor_request(conn_id, 0, 0, 0, AuthRequirement::NoMitm, &[0x01, 0x00])
        .unwrap();
    session
        .write_descriptor_command(conn_id, 0, 0, 0, AuthRequirement::None, &[0x00, 0x00])
        .unwrap();
}

#[test]
fn write_validates_descriptor_index() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x180f)]);
    hal.set_characteristics(vec![chr(0x2a19)]);

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();
    session.discover_characteristics(conn_id, 0).unwrap();

    assert_eq!(
        session.write_descriptor_request(conn_id, 0, 0, 3, AuthRequirement::None, &[]),
        Err(Error::InvalidIndex {
            kind: "descriptor",
            index: 3,
            count: 0,
        })
    );
}

#[test]
fn notification_registration_roundtrip() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x180f)]);
    hal.set_characteristics(vec![chr(0x2a19)]);

    let session = enabled_controller(&hal);
    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();
    session.discover_characteristics(conn_id, 0).unwrap();

    session.register_notification(conn_id, 0, 0).unwrap();
    session.unregister_notification(conn_id, 0, 0).unwrap();
}

#[test]
fn disable_aggregates_step_failures() {
    let hal = Arc::new(FakeHal::default());
    let session = enabled_controller(&hal);
    hal.fail_unregister.store(true, Ordering::SeqCst);

    // the adapter teardown still runs and succeeds
    let outcome = session.disable().unwrap();
    assert_eq!(outcome.unregister_client, Some(HalStatus::Fail));
    assert_eq!(outcome.adapter_disable, None);
    assert!(!outcome.is_clean());

    assert_eq!(
        session.disable(),
        Err(Error::NotReady("adapter is already disabled"))
    );
}

#[derive(Default)]
struct CountingObserver {
    devices: AtomicUsize,
    services: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl ClientObserver for CountingObserver {
    fn on_device_found(&self, _device: &DeviceProperties) {
        self.devices.fetch_add(1, Ordering::SeqCst);
    }

    fn on_service_found(&self, _conn_id: ConnectionId, _service: &ServiceIdentity) {
        self.services.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connection_opened(&self, _conn_id: ConnectionId, _status: GattStatus, _address: &BdAddr) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connection_closed(&self, _conn_id: ConnectionId, _status: GattStatus, _address: &BdAddr) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn observer_sees_forwarded_events() {
    let hal = Arc::new(FakeHal::default());
    hal.set_services(vec![svc(0x1800), svc(0x180f)]);
    let observer = Arc::new(CountingObserver::default());

    let session = BtController::initialize(
        Arc::clone(&hal) as Arc<dyn HardwareInterface>,
        Arc::clone(&observer) as Arc<dyn ClientObserver>,
        fast_settings(),
    );
    session.enable().unwrap();
    session.start_discovery().unwrap();

    let conn_id = session.connect(&peer()).unwrap();
    session.discover_services(conn_id, None).unwrap();
    session.disconnect(conn_id).unwrap();

    assert_eq!(observer.devices.load(Ordering::SeqCst), 2);
    assert_eq!(observer.services.load(Ordering::SeqCst), 2);
    assert_eq!(observer.opened.load(Ordering::SeqCst), 1);
    assert_eq!(observer.closed.load(Ordering::SeqCst), 1);
}
