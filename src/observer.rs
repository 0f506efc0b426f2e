//! Caller-facing event observer
//!
//! Every event the dispatcher handles is forwarded here after internal
//! state has been updated, so an application can mirror scans,
//! notifications and connection changes without polling. All methods
//! default to no-ops; implement the ones you care about.
//!
//! Reference arguments are only valid for the duration of the call.

use crate::domain::models::{
    AdapterState, BdAddr, BondState, CharacteristicIdentity, CharacteristicProperties, ClientIf,
    ConnectionId, DeviceProperties, DiscoveryState, NotificationData, ReadDetails, ServiceIdentity,
    Uuid, WriteDetails,
};
use crate::infrastructure::hal::{GattStatus, HalStatus};

pub trait ClientObserver: Send + Sync {
    fn on_adapter_state_changed(&self, _state: AdapterState) {}
    fn on_discovery_state_changed(&self, _state: DiscoveryState) {}
    fn on_device_found(&self, _device: &DeviceProperties) {}
    fn on_bond_state_changed(&self, _status: HalStatus, _address: &BdAddr, _state: BondState) {}

    fn on_client_registered(&self, _status: GattStatus, _client_if: ClientIf) {}
    fn on_scan_result(&self, _address: &BdAddr, _rssi: i32, _adv_data: &[u8]) {}
    fn on_connection_opened(&self, _conn_id: ConnectionId, _status: GattStatus, _address: &BdAddr) {
    }
    fn on_connection_closed(&self, _conn_id: ConnectionId, _status: GattStatus, _address: &BdAddr) {
    }

    fn on_service_found(&self, _conn_id: ConnectionId, _service: &ServiceIdentity) {}
    fn on_search_complete(&self, _conn_id: ConnectionId, _status: GattStatus) {}
    fn on_characteristic_found(
        &self,
        _conn_id: ConnectionId,
        _service: &ServiceIdentity,
        _characteristic: &CharacteristicIdentity,
        _properties: CharacteristicProperties,
    ) {
    }
    fn on_descriptor_found(
        &self,
        _conn_id: ConnectionId,
        _service: &ServiceIdentity,
        _characteristic: &CharacteristicIdentity,
        _descriptor: &Uuid,
    ) {
    }
    fn on_included_service(
        &self,
        _conn_id: ConnectionId,
        _service: &ServiceIdentity,
        _included: &ServiceIdentity,
    ) {
    }

    fn on_notification_state(&self, _conn_id: ConnectionId, _registered: bool, _status: GattStatus) {
    }
    fn on_notification(&self, _conn_id: ConnectionId, _data: &NotificationData) {}
    fn on_characteristic_read(
        &self,
        _conn_id: ConnectionId,
        _status: GattStatus,
        _details: &ReadDetails,
    ) {
    }
    fn on_characteristic_written(
        &self,
        _conn_id: ConnectionId,
        _status: GattStatus,
        _details: &WriteDetails,
    ) {
    }
    fn on_descriptor_read(
        &self,
        _conn_id: ConnectionId,
        _status: GattStatus,
        _details: &ReadDetails,
    ) {
    }
    fn on_descriptor_written(
        &self,
        _conn_id: ConnectionId,
        _status: GattStatus,
        _details: &WriteDetails,
    ) {
    }
    fn on_remote_rssi(&self, _address: &BdAddr, _rssi: i32, _status: GattStatus) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ClientObserver for NullObserver {}
