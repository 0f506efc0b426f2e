//! Hardware abstraction layer contract
//!
//! The Bluetooth stack underneath this crate is asynchronous and
//! callback-only: every request returns a status immediately and the
//! actual result arrives later through the callback table, on an
//! execution context owned by the stack. This module defines both sides
//! of that contract; the crate consumes it, platform backends implement
//! it.

use std::fmt;
use std::sync::Arc;

use crate::domain::models::{
    AdapterState, AuthRequirement, BdAddr, BondState, CharacteristicIdentity,
    CharacteristicProperties, ClientIf, ConnectionId, DeviceType, DiscoveryState, NotificationData,
    ReadDetails, ServiceIdentity, SspVariant, Uuid, WriteDetails, WriteType,
};

/// Status returned synchronously by every HAL request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalStatus {
    Success,
    Fail,
    NotReady,
    NoMem,
    Busy,
    Done,
    Unsupported,
    ParamInvalid,
    Unhandled,
    AuthFailure,
    RemoteDeviceDown,
}

impl HalStatus {
    pub fn is_success(self) -> bool {
        matches!(self, HalStatus::Success)
    }
}

impl fmt::Display for HalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HalStatus::Success => "success",
            HalStatus::Fail => "fail",
            HalStatus::NotReady => "not ready",
            HalStatus::NoMem => "out of memory",
            HalStatus::Busy => "busy",
            HalStatus::Done => "done",
            HalStatus::Unsupported => "unsupported",
            HalStatus::ParamInvalid => "invalid parameter",
            HalStatus::Unhandled => "unhandled",
            HalStatus::AuthFailure => "authentication failure",
            HalStatus::RemoteDeviceDown => "remote device down",
        };
        write!(f, "{text}")
    }
}

/// Raw GATT status attached to client events, surfaced to callers
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattStatus(pub i32);

impl GattStatus {
    pub const SUCCESS: GattStatus = GattStatus(0);

    /// Reported when an enumeration has no further records. Non-zero, but
    /// not a failure.
    pub const END_OF_RECORDS: GattStatus = GattStatus(0x85);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn is_end_of_records(self) -> bool {
        self == Self::END_OF_RECORDS
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

/// One entry of the property list delivered with device-found and
/// property callbacks.
#[derive(Debug, Clone)]
pub enum DeviceProperty {
    Name(String),
    Address(BdAddr),
    ClassOfDevice(u32),
    TypeOfDevice(DeviceType),
    Alias(String),
    Rssi(i8),
    BondedDevices(Vec<BdAddr>),
}

/// Adapter control and GATT client requests.
///
/// Every request is asynchronous: the returned [`HalStatus`] only reports
/// whether the stack accepted it. Results arrive through [`HalCallbacks`].
pub trait HardwareInterface: Send + Sync {
    /// Install the callback table. Must be called once, before any
    /// request is issued.
    fn set_callbacks(&self, callbacks: Arc<dyn HalCallbacks>);

    fn enable(&self) -> HalStatus;
    fn disable(&self) -> HalStatus;
    fn start_discovery(&self) -> HalStatus;
    fn cancel_discovery(&self) -> HalStatus;
    fn ssp_reply(
        &self,
        address: &BdAddr,
        variant: SspVariant,
        accept: bool,
        passkey: u32,
    ) -> HalStatus;

    fn register_client(&self, app_uuid: &Uuid) -> HalStatus;
    fn unregister_client(&self, client_if: ClientIf) -> HalStatus;
    fn connect(&self, client_if: ClientIf, address: &BdAddr, is_direct: bool) -> HalStatus;
    fn disconnect(&self, client_if: ClientIf, address: &BdAddr, conn_id: ConnectionId)
        -> HalStatus;
    /// Search the remote device's services, optionally filtered to one
    /// UUID. Results arrive as search-result events.
    fn search_service(&self, conn_id: ConnectionId, filter: Option<&Uuid>) -> HalStatus;
    /// Fetch one characteristic of a service. `start_after` of `None`
    /// fetches the first record, otherwise the record following the given
    /// one.
    fn get_characteristic(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        start_after: Option<&CharacteristicIdentity>,
    ) -> HalStatus;
    fn get_descriptor(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        start_after: Option<&Uuid>,
    ) -> HalStatus;
    fn get_included_service(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        start_after: Option<&ServiceIdentity>,
    ) -> HalStatus;
    fn register_for_notification(
        &self,
        client_if: ClientIf,
        address: &BdAddr,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
    ) -> HalStatus;
    fn unregister_for_notification(
        &self,
        client_if: ClientIf,
        address: &BdAddr,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
    ) -> HalStatus;
    fn write_characteristic(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        write_type: WriteType,
        auth: AuthRequirement,
        value: &[u8],
    ) -> HalStatus;
    fn write_descriptor(
        &self,
        conn_id: ConnectionId,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        descriptor: &Uuid,
        write_type: WriteType,
        auth: AuthRequirement,
        value: &[u8],
    ) -> HalStatus;
    fn read_remote_rssi(&self, client_if: ClientIf, address: &BdAddr) -> HalStatus;
}

/// The callback table a HAL implementation invokes from its own execution
/// context.
///
/// Reference arguments are owned by the stack and valid only for the
/// duration of the call; implementations must copy whatever they keep.
pub trait HalCallbacks: Send + Sync {
    fn adapter_state_changed(&self, state: AdapterState);
    fn adapter_properties(&self, status: HalStatus, properties: &[DeviceProperty]);
    fn remote_device_properties(
        &self,
        status: HalStatus,
        address: &BdAddr,
        properties: &[DeviceProperty],
    );
    fn device_found(&self, properties: &[DeviceProperty]);
    fn discovery_state_changed(&self, state: DiscoveryState);
    fn pin_request(&self, address: &BdAddr, name: &str, class_of_device: u32);
    fn ssp_request(
        &self,
        address: &BdAddr,
        name: &str,
        class_of_device: u32,
        variant: SspVariant,
        passkey: u32,
    );
    fn bond_state_changed(&self, status: HalStatus, address: &BdAddr, state: BondState);
    fn acl_state_changed(&self, status: HalStatus, address: &BdAddr, connected: bool);

    fn client_registered(&self, status: GattStatus, client_if: ClientIf, app_uuid: &Uuid);
    fn scan_result(&self, address: &BdAddr, rssi: i32, adv_data: &[u8]);
    fn connection_opened(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        client_if: ClientIf,
        address: &BdAddr,
    );
    fn connection_closed(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        client_if: ClientIf,
        address: &BdAddr,
    );
    fn search_complete(&self, conn_id: ConnectionId, status: GattStatus);
    fn search_result(&self, conn_id: ConnectionId, service: &ServiceIdentity);
    /// One characteristic record, or the end of the enumeration when the
    /// status is non-success (identities are then echoes of the request).
    fn characteristic_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        properties: CharacteristicProperties,
    );
    fn descriptor_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
        descriptor: &Uuid,
    );
    fn included_service_result(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        service: &ServiceIdentity,
        included: &ServiceIdentity,
    );
    fn notification_registered(
        &self,
        conn_id: ConnectionId,
        registered: bool,
        status: GattStatus,
        service: &ServiceIdentity,
        characteristic: &CharacteristicIdentity,
    );
    fn notify(&self, conn_id: ConnectionId, data: &NotificationData);
    fn characteristic_read(&self, conn_id: ConnectionId, status: GattStatus, details: &ReadDetails);
    fn characteristic_written(
        &self,
        conn_id: ConnectionId,
        status: GattStatus,
        details: &WriteDetails,
    );
    fn descriptor_read(&self, conn_id: ConnectionId, status: GattStatus, details: &ReadDetails);
    fn descriptor_written(&self, conn_id: ConnectionId, status: GattStatus, details: &WriteDetails);
    fn remote_rssi(&self, client_if: ClientIf, address: &BdAddr, rssi: i32, status: GattStatus);
}
