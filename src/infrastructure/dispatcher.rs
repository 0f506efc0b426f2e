//! HAL event dispatch
//!
//! The [`EventDispatcher`] is the callback table registered with the
//! hardware stack. It runs on the stack's execution context: each handler
//! copies what it needs out of the borrowed payload, updates the shared
//! state under its lock, and only then forwards the event to the
//! observer, re-issues follow-up requests and wakes the blocked caller.
//! Releasing the lock before signaling is what lets the woken caller read
//! a fully published result.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::domain::models::{
    AdapterState, BdAddr, BondState, CharacteristicIdentity, CharacteristicProperties, ClientIf,
    ConnectionId, DeviceProperties, DiscoveryState, NotificationData, ReadDetails, ServiceIdentity,
    SspVariant, Uuid, WriteDetails,
};
use crate::domain::registry::Connection;
use crate::infrastructure::hal::{
    DeviceProperty, GattStatus, HalCallbacks, HalStatus, HardwareInterface,
};
use crate::infrastructure::wake::WakeEvent;
use crate::observer::ClientObserver;
use crate::session::{Shared, CLIENT_APP_UUID};

pub(crate) struct EventDispatcher {
    shared: Arc<Shared>,
    hal: Arc<dyn HardwareInterface>,
    observer: Arc<dyn ClientObserver>,
}

impl EventDispatcher {
    pub(crate) fn new(
        shared: Arc<Shared>,
        hal: Arc<dyn HardwareInterface>,
        observer: Arc<dyn ClientObserver>,
    ) -> Self {
        Self {
            shared,
            hal,
            observer,
        }
    }

    /// Merge a device property list into one snapshot.
    fn fold_device_properties(properties: &[DeviceProperty]) -> DeviceProperties {
        let mut snapshot = DeviceProperties::default();
        for property in properties {
            match property {
                DeviceProperty::Name(name) => snapshot.name = name.clone(),
                DeviceProperty::Address(address) => snapshot.address = *address,
                DeviceProperty::ClassOfDevice(class) => snapshot.class_of_device = *class,
                DeviceProperty::TypeOfDevice(device_type) => snapshot.device_type = *device_type,
                DeviceProperty::Alias(alias) => snapshot.alias = Some(alias.clone()),
                DeviceProperty::Rssi(rssi) => snapshot.rssi = *rssi,
                DeviceProperty::BondedDevices(_) => {}
            }
        }
        snapshot
    }
}

impl HalCallbacks for EventDispatcher {
    fn adapter_state_changed(&self, state: AdapterState) {
        info!(%state, "adapter state changed");
        self.shared.state().adapter_state = state;

        if state == AdapterState::On {
            // First point where the GATT side of the stack is guaranteed
            // ready to take requests.
            let status = self.hal.register_client(&CLIENT_APP_UUID);
            if !status.is_success() {
                warn!(%status, "failed to register as a GATT client");
            }
        }

        self.observer.on_adapter_state_changed(state);
        self.shared.gate.signal(WakeEvent::AdapterState(state));
    }

    fn adapter_properties(&self, status: HalStatus, properties: &[DeviceProperty]) {
        if !status.is_success() {
            debug!(%status, "failed to get adapter properties");
            return;
        }
        for property in properties {
            debug!(?property, "adapter property");
        }
    }

    fn remote_device_properties(
        &self,
        status: HalStatus,
        address: &BdAddr,
        _properties: &[DeviceProperty],
    ) {
        debug!(%status, %address, "remote device properties");
    }

    fn device_found(&self, properties: &[DeviceProperty]) {
        let snapshot = Self::fold_device_properties(properties);
        debug!(name = %snapshot.name, address = %snapshot.address, rssi = snapshot.rssi, "device found");

        self.shared.state().devices.push(snapshot.clone());
        self.observer.on_device_found(&snapshot);
    }

    fn discovery_state_changed(&self, state: DiscoveryState) {
        info!(?state, "discovery state changed");
        self.shared.state().discovery_state = state;
        self.observer.on_discovery_state_changed(state);

        if state == DiscoveryState::Stopped {
            self.shared.gate.signal(WakeEvent::DiscoveryStopped);
        }
    }

    fn pin_request(&self, address: &BdAddr, name: &str, class_of_device: u32) {
        // the reply needs user input; remember who asked
        info!(%address, name, class_of_device, "PIN requested by remote device");
        self.shared.state().pairing_peer = Some(*address);
    }

    fn ssp_request(
        &self,
        address: &BdAddr,
        name: &str,
        _class_of_device: u32,
        variant: SspVariant,
        passkey: u32,
    ) {
        match variant {
            SspVariant::Consent => {
                // bonding consent needs user input; remember who asked
                info!(%address, name, "bond consent requested");
                self.shared.state().pairing_peer = Some(*address);
            }
            SspVariant::PasskeyConfirmation => {
                info!(%address, passkey, "confirming passkey");
                let status = self.hal.ssp_reply(address, variant, true, passkey);
                if !status.is_success() {
                    warn!(%status, "SSP reply failed");
                }
            }
            SspVariant::PasskeyEntry | SspVariant::PasskeyNotification => {
                info!(%address, passkey, ?variant, "passkey interaction on peer device");
            }
        }
    }

    fn bond_state_changed(&self, status: HalStatus, address: &BdAddr, state: BondState) {
        if !status.is_success() {
            warn!(%status, %address, "failed to change bond state");
            return;
        }
        info!(%address, ?state, "bond state changed");
        self.observer.on_bond_state_changed(status, address, state);
    }

    fn acl_state_changed(&self, status: HalStatus, address: &BdAddr, connected: bool) {
        debug!(%status, %address, connected, "ACL state changed");
    }

    fn client_registered(&self, status: GattStatus, client_if: ClientIf, _app_uuid: &Uuid) {
        if status.is_success() {
            info!(client_if, "registered as a GATT client");
            self.shared.state().client_if = Some(client_if);
        } else {
            warn!(%status, "GATT client registration rejected");
        }
        self.observer.on_client_registered(status, client_if);
    }

    fn scan_result(&self, address: &BdAddr, rssi: i32, adv_data: &[u8]) {
        trace!(%address, rssi, len = adv_data.len(), "advertising report");
        self.observer.on_scan_result(address, rssi, adv_data);
    }

    fn connection_opened(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        client_if: ClientIf,
        address: &BdAddr,
    ) {
        let address = *address;
        if status.is_success() {
            info!(conn_id, client_if, %address, "connected");
            self.shared
                .state()
                .registry
                .add(Connection::new(conn_id, address));
        } else {
            warn!(conn_id, %address, %status, "connection attempt failed");
        }

        self.observer.on_connection_opened(conn_id, status, &address);
        self.shared
            .gate
            .signal(WakeEvent::ConnectionOpened { conn_id, status });
    }

    fn connection_closed(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        client_if: ClientIf,
        address: &BdAddr,
    ) {
        info!(conn_id, client_if, %address, %status, "disconnected");
        self.shared.state().registry.remove(conn_id);
        self.observer.on_connection_closed(conn_id, status, address);
    }

    fn search_complete(&self, conn_id: ConnectionId, status: GattStatus) {
        info!(conn_id, %status, "service search complete");
        self.observer.on_search_complete(conn_id, status);
        self.shared.gate.signal(WakeEvent::SearchComplete { status });
    }

    fn search_result(&self, conn_id: ConnectionId, service: &ServiceIdentity) {
        // the identity is only borrowed for this call
        let service = *service;

        let index = {
            let mut state = self.shared.state();
            match state.registry.find_mut(conn_id) {
                Some(connection) => connection.cache_mut().add_service(&service),
                None => {
                    warn!(conn_id, "search result for unknown connection");
                    return;
                }
            }
        };

        if let Some(index) = index {
            debug!(
                conn_id,
                index,
                uuid = %service.uuid,
                instance = service.instance_id,
                primary = service.primary,
                "service found"
            );
        }
        self.observer.on_service_found(conn_id, &service);
    }

    fn characteristic_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        properties: CharacteristicProperties,
    ) {
        if !status.is_success() {
            if status.is_end_of_records() {
                debug!(conn_id, "characteristic listing finished");
            } else {
                debug!(conn_id, %status, "characteristic listing stopped");
            }
            self.shared.gate.signal(WakeEvent::CharacteristicsComplete {
                status,
                request_failed: None,
            });
            return;
        }

        let service = *service;
        let characteristic = *characteristic;

        let stored = {
            let mut state = self.shared.state();
            state.registry.find_mut(conn_id).and_then(|connection| {
                let cache = connection.cache_mut();
                let service_index = cache.find_service_index(&service)?;
                cache.add_characteristic(service_index, characteristic, properties)
            })
        };

        if stored.is_none() {
            warn!(conn_id, "characteristic for a connection or service that is not cached");
            self.shared.gate.signal(WakeEvent::CharacteristicsComplete {
                status,
                request_failed: None,
            });
            return;
        }

        debug!(
            conn_id,
            uuid = %characteristic.uuid,
            instance = characteristic.instance_id,
            %properties,
            "characteristic found"
        );
        self.observer
            .on_characteristic_found(conn_id, &service, &characteristic, properties);

        // Self-driving enumeration: this event completes the previous
        // request, so exactly one request is in flight at a time.
        let ret = self
            .hal
            .get_characteristic(conn_id, &service, Some(&characteristic));
        if !ret.is_success() {
            warn!(conn_id, %ret, "failed to request the next characteristic");
            self.shared.gate.signal(WakeEvent::CharacteristicsComplete {
                status: GattStatus::SUCCESS,
                request_failed: Some(ret),
            });
        }
    }

    fn descriptor_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        descriptor: &Uuid,
    ) {
        if !status.is_success() {
            if status.is_end_of_records() {
                debug!(conn_id, "descriptor listing finished");
            } else {
                debug!(conn_id, %status, "descriptor listing stopped");
            }
            self.shared.gate.signal(WakeEvent::DescriptorsComplete {
                status,
                request_failed: None,
            });
            return;
        }

        let service = *service;
        let characteristic = *characteristic;
        let descriptor = *descriptor;

        let stored = {
            let mut state = self.shared.state();
            state.registry.find_mut(conn_id).and_then(|connection| {
                let cache = connection.cache_mut();
                let service_index = cache.find_service_index(&service)?;
                let char_index = cache.find_characteristic_index(service_index, &characteristic)?;
                // full descriptor tables are dropped inside the cache
                cache.add_descriptor(service_index, char_index, descriptor);
                Some(())
            })
        };

        if stored.is_none() {
            warn!(conn_id, "descriptor for a connection, service or characteristic that is not cached");
            self.shared.gate.signal(WakeEvent::DescriptorsComplete {
                status,
                request_failed: None,
            });
            return;
        }

        debug!(conn_id, uuid = %descriptor, "descriptor found");
        self.observer
            .on_descriptor_found(conn_id, &service, &characteristic, &descriptor);

        let ret = self
            .hal
            .get_descriptor(conn_id, &service, &characteristic, Some(&descriptor));
        if !ret.is_success() {
            warn!(conn_id, %ret, "failed to request the next descriptor");
            self.shared.gate.signal(WakeEvent::DescriptorsComplete {
                status: GattStatus::SUCCESS,
                request_failed: Some(ret),
            });
        }
    }

    fn included_service_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        included: &ServiceIdentity,
    ) {
        if status.is_success() {
            debug!(conn_id, uuid = %included.uuid, "included service found");
            let ret = self.hal.get_included_service(conn_id, service, Some(included));
            if !ret.is_success() {
                warn!(conn_id, %ret, "failed to request the next included service");
            }
        } else {
            debug!(conn_id, %status, "included service listing finished");
        }
        self.observer.on_included_service(conn_id, service, included);
    }

    fn notification_registered(
        &self,
        conn_id: ConnectionId,
        registered: bool,
        status: GattStatus,
        _service: &ServiceIdentity,
        _characteristic: &CharacteristicIdentity,
    ) {
        debug!(conn_id, registered, %status, "notification registration changed");
        self.observer.on_notification_state(conn_id, registered, status);
        self.shared
            .gate
            .signal(WakeEvent::NotificationState { registered, status });
    }

    fn notify(&self, conn_id: ConnectionId, data: &NotificationData) {
        trace!(conn_id, len = data.value.len(), "notification");
        self.observer.on_notification(conn_id, data);
    }

    fn characteristic_read(&self, conn_id: ConnectionId, status: GattStatus, details: &ReadDetails) {
        self.observer.on_characteristic_read(conn_id, status, details);
    }

    fn characteristic_written(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        details: &WriteDetails,
    ) {
        self.observer.on_characteristic_written(conn_id, status, details);
        self.shared
            .gate
            .signal(WakeEvent::CharacteristicWritten { status });
    }

    fn descriptor_read(&self, conn_id: ConnectionId, status: GattStatus, details: &ReadDetails) {
        self.observer.on_descriptor_read(conn_id, status, details);
    }

    fn descriptor_written(&self, conn_id: ConnectionId, status: GattStatus, details: &WriteDetails) {
        self.observer.on_descriptor_written(conn_id, status, details);
        self.shared
            .gate
            .signal(WakeEvent::DescriptorWritten { status });
    }

    fn remote_rssi(&self, _client_if: ClientIf, address: &BdAddr, rssi: i32, status: GattStatus) {
        info!(%address, rssi, %status, "remote RSSI");
        self.observer.on_remote_rssi(address, rssi, status);
    }
}
