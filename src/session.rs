//! Blocking session API
//!
//! [`BtController`] turns the callback-only HAL into sequential calls:
//! each operation issues its asynchronous request, suspends on the wake
//! gate until the dispatcher signals the matching completion, then reads
//! the accumulated result. One logical caller thread is supported; a
//! blocking call made while another is suspended is refused as busy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::models::{
    AdapterState, AuthRequirement, BdAddr, CharacteristicIdentity, CharacteristicProperties,
    ClientIf, ConnectionId, DeviceProperties, DiscoveryState, ServiceIdentity, Uuid, WriteType,
};
use crate::domain::registry::{Connection, ConnectionInfo, ConnectionRegistry};
use crate::domain::settings::SessionSettings;
use crate::error::{Error, Result};
use crate::infrastructure::dispatcher::EventDispatcher;
use crate::infrastructure::hal::{HalCallbacks, HalStatus, HardwareInterface};
use crate::infrastructure::wake::{WaitClass, WakeEvent, WakeGate};
use crate::observer::ClientObserver;

/// Fixed UUID identifying this application to the GATT stack.
pub(crate) const CLIENT_APP_UUID: Uuid = Uuid::from_bytes([
    0x1b, 0x1c, 0xb9, 0x2e, 0x0d, 0x2e, 0x4c, 0x45, 0xbb, 0xb9, 0xf4, 0x1b, 0x46, 0x39, 0x23, 0x36,
]);

/// Everything the dispatcher mutates on the callback context and the
/// session reads after being woken.
pub(crate) struct ControllerState {
    pub adapter_state: AdapterState,
    pub discovery_state: DiscoveryState,
    pub client_if: Option<ClientIf>,
    /// Remote address of a pairing interaction awaiting user input.
    pub pairing_peer: Option<BdAddr>,
    pub devices: Vec<DeviceProperties>,
    pub registry: ConnectionRegistry,
}

pub(crate) struct Shared {
    state: Mutex<ControllerState>,
    pub gate: WakeGate,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ControllerState {
                // the adapter is always off in the beginning
                adapter_state: AdapterState::Off,
                discovery_state: DiscoveryState::Stopped,
                client_if: None,
                pairing_peer: None,
                devices: Vec::new(),
                registry: ConnectionRegistry::new(),
            }),
            gate: WakeGate::new(),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of [`BtController::disable`]. Both teardown steps always run;
/// each field records the failure of its step, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisableOutcome {
    pub unregister_client: Option<HalStatus>,
    pub adapter_disable: Option<HalStatus>,
}

impl DisableOutcome {
    pub fn is_clean(&self) -> bool {
        self.unregister_client.is_none() && self.adapter_disable.is_none()
    }
}

/// Blocking control layer over an asynchronous BLE GATT client HAL.
pub struct BtController {
    hal: Arc<dyn HardwareInterface>,
    shared: Arc<Shared>,
    settings: SessionSettings,
}

impl BtController {
    /// Wire the dispatcher into the HAL callback table and hand back the
    /// session context.
    pub fn initialize(
        hal: Arc<dyn HardwareInterface>,
        observer: Arc<dyn ClientObserver>,
        settings: SessionSettings,
    ) -> Self {
        let shared = Arc::new(Shared::new());
        let dispatcher: Arc<dyn HalCallbacks> = Arc::new(EventDispatcher::new(
            Arc::clone(&shared),
            Arc::clone(&hal),
            observer,
        ));
        hal.set_callbacks(dispatcher);
        info!("control layer initialized");

        Self {
            hal,
            shared,
            settings,
        }
    }

    /// Tear the session down. Disables the adapter if it is still up and
    /// drops all cached state.
    pub fn shutdown(self) {
        let adapter_on = self.shared.state().adapter_state == AdapterState::On;
        if adapter_on {
            if let Err(e) = self.disable() {
                debug!(error = %e, "disable during shutdown failed");
            }
        }

        let mut state = self.shared.state();
        state.registry.clear();
        state.devices.clear();
        info!("control layer shut down");
    }

    fn deadline(&self) -> Option<Duration> {
        self.settings.wait_deadline()
    }

    fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn client_if(&self) -> Result<ClientIf> {
        self.shared
            .state()
            .client_if
            .ok_or(Error::NotReady("not registered as a GATT client"))
    }

    // --- Adapter control -------------------------------------------------

    /// Power the adapter on.
    ///
    /// Blocks until the adapter reports its new state. On success the
    /// dispatcher registers this application as a GATT client; the settle
    /// delay afterwards gives the stack room to finish that before the
    /// first request.
    pub fn enable(&self) -> Result<AdapterState> {
        if self.shared.state().adapter_state == AdapterState::On {
            return Err(Error::NotReady("adapter is already enabled"));
        }

        let wait = self.shared.gate.begin(WaitClass::AdapterState)?;
        let status = self.hal.enable();
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        let event = wait.wait(self.deadline())?;
        self.settle(self.settings.command_settle());

        match event {
            WakeEvent::AdapterState(state) => Ok(state),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Unregister the GATT client, then power the adapter off.
    ///
    /// Both steps run regardless of each other's outcome; the returned
    /// [`DisableOutcome`] aggregates their failures.
    pub fn disable(&self) -> Result<DisableOutcome> {
        let (adapter_state, client_if) = {
            let state = self.shared.state();
            (state.adapter_state, state.client_if)
        };
        if adapter_state == AdapterState::Off {
            return Err(Error::NotReady("adapter is already disabled"));
        }

        let mut outcome = DisableOutcome::default();

        if let Some(client_if) = client_if {
            let status = self.hal.unregister_client(client_if);
            self.settle(self.settings.command_settle());
            if status.is_success() {
                self.shared.state().client_if = None;
            } else {
                warn!(%status, "failed to unregister GATT client");
                outcome.unregister_client = Some(status);
            }
        }

        let status = self.hal.disable();
        if !status.is_success() {
            warn!(%status, "failed to disable the adapter");
            outcome.adapter_disable = Some(status);
        }

        Ok(outcome)
    }

    /// Remote address of the most recent pairing interaction that needs
    /// user input (PIN entry or bond consent), if any.
    pub fn pending_pairing_peer(&self) -> Option<BdAddr> {
        self.shared.state().pairing_peer
    }

    // --- Device discovery ------------------------------------------------

    fn prepare_discovery(&self) -> Result<()> {
        let mut state = self.shared.state();
        if state.adapter_state != AdapterState::On {
            return Err(Error::NotReady("adapter is down"));
        }
        if state.discovery_state == DiscoveryState::Started {
            return Err(Error::Busy("discovery is already running"));
        }
        if !state.devices.is_empty() {
            state.devices.clear();
        }
        Ok(())
    }

    /// Scan for devices, blocking until the stack stops the discovery on
    /// its own. Returns the number of devices found.
    pub fn start_discovery(&self) -> Result<usize> {
        self.prepare_discovery()?;

        let wait = self.shared.gate.begin(WaitClass::DiscoveryStopped)?;
        let status = self.hal.start_discovery();
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        wait.wait(self.deadline())?;
        Ok(self.shared.state().devices.len())
    }

    /// Start a scan and return immediately. Results accumulate in the
    /// discovered-device list until the discovery stops.
    pub fn start_discovery_background(&self) -> Result<()> {
        self.prepare_discovery()?;

        let status = self.hal.start_discovery();
        if !status.is_success() {
            return Err(Error::Hal(status));
        }
        Ok(())
    }

    /// Cancel a running scan. A no-op when none is running.
    pub fn stop_discovery(&self) -> Result<()> {
        if self.shared.state().discovery_state == DiscoveryState::Stopped {
            return Ok(());
        }

        let status = self.hal.cancel_discovery();
        if !status.is_success() {
            return Err(Error::Hal(status));
        }
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.shared.state().devices.len()
    }

    pub fn device(&self, index: usize) -> Option<DeviceProperties> {
        self.shared.state().devices.get(index).cloned()
    }

    pub fn discovered_devices(&self) -> Vec<DeviceProperties> {
        self.shared.state().devices.clone()
    }

    pub fn log_discovered_devices(&self) {
        let devices = self.discovered_devices();
        info!("{} discovered device(s)", devices.len());
        for device in &devices {
            info!(
                name = %device.name,
                address = %device.address,
                class = device.class_of_device,
                device_type = %device.device_type,
                alias = device.alias.as_deref().unwrap_or(""),
                rssi = device.rssi,
            );
        }
    }

    // --- Connections -----------------------------------------------------

    /// Open a GATT connection, blocking until the link is up. Returns the
    /// connection id the HAL assigned.
    pub fn connect(&self, address: &BdAddr) -> Result<ConnectionId> {
        let client_if = {
            let state = self.shared.state();
            if state.adapter_state != AdapterState::On {
                return Err(Error::NotReady("adapter is down"));
            }
            state
                .client_if
                .ok_or(Error::NotReady("not registered as a GATT client"))?
        };

        let wait = self.shared.gate.begin(WaitClass::ConnectionOpened)?;
        let status = self.hal.connect(client_if, address, true);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        let event = wait.wait(self.deadline())?;
        // GATT traffic issued right after the open event races the link
        // setup without this pause.
        self.settle(self.settings.connect_settle());

        match event {
            WakeEvent::ConnectionOpened { conn_id, status } if status.is_success() => Ok(conn_id),
            WakeEvent::ConnectionOpened { status, .. } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Ask the stack to tear a connection down. The registry entry is
    /// removed when the close event arrives.
    pub fn disconnect(&self, conn_id: ConnectionId) -> Result<()> {
        let (client_if, address) = {
            let state = self.shared.state();
            let client_if = state
                .client_if
                .ok_or(Error::NotReady("not registered as a GATT client"))?;
            let connection = state
                .registry
                .find(conn_id)
                .ok_or(Error::ConnectionNotFound(conn_id))?;
            (client_if, *connection.address())
        };

        let status = self.hal.disconnect(client_if, &address, conn_id);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }
        Ok(())
    }

    /// [`disconnect`](Self::disconnect) for callers that only hold the
    /// remote address.
    pub fn disconnect_by_address(&self, address: &BdAddr) -> Result<()> {
        let conn_id = {
            let state = self.shared.state();
            state
                .registry
                .find_by_address(address)
                .map(Connection::conn_id)
                .ok_or(Error::NotReady("device is not connected"))?
        };
        self.disconnect(conn_id)
    }

    pub fn connection_count(&self) -> usize {
        self.shared.state().registry.count()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.shared
            .state()
            .registry
            .iter()
            .map(Connection::info)
            .collect()
    }

    pub fn head_connection(&self) -> Option<ConnectionInfo> {
        self.shared.state().registry.head().map(Connection::info)
    }

    pub fn tail_connection(&self) -> Option<ConnectionInfo> {
        self.shared.state().registry.tail().map(Connection::info)
    }

    pub fn next_connection(&self, conn_id: ConnectionId) -> Option<ConnectionInfo> {
        self.shared
            .state()
            .registry
            .next_after(conn_id)
            .map(Connection::info)
    }

    pub fn find_connection(&self, conn_id: ConnectionId) -> Option<ConnectionInfo> {
        self.shared.state().registry.find(conn_id).map(Connection::info)
    }

    pub fn find_connection_by_address(&self, address: &BdAddr) -> Option<ConnectionInfo> {
        self.shared
            .state()
            .registry
            .find_by_address(address)
            .map(Connection::info)
    }

    pub fn log_connections(&self) {
        self.shared.state().registry.log_all();
    }

    // --- GATT discovery --------------------------------------------------

    /// Discover the remote device's services, blocking until the search
    /// completes. Wipes all previously cached services, characteristics
    /// and descriptors of this connection first, so indices from earlier
    /// rounds are invalid afterwards. Returns the number of cached
    /// services.
    pub fn discover_services(&self, conn_id: ConnectionId, filter: Option<&Uuid>) -> Result<usize> {
        {
            let mut state = self.shared.state();
            let connection = state
                .registry
                .find_mut(conn_id)
                .ok_or(Error::ConnectionNotFound(conn_id))?;
            connection.cache_mut().clear_all();
        }

        let wait = self.shared.gate.begin(WaitClass::SearchComplete)?;
        let status = self.hal.search_service(conn_id, filter);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        let event = wait.wait(self.deadline())?;
        self.settle(self.settings.search_settle());

        match event {
            WakeEvent::SearchComplete { status } if status.is_success() => Ok(self
                .shared
                .state()
                .registry
                .find(conn_id)
                .map_or(0, |connection| connection.cache().service_count())),
            WakeEvent::SearchComplete { status } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Enumerate the characteristics of one cached service, blocking
    /// until the listing ends. Returns the number of characteristics
    /// cached for the service.
    pub fn discover_characteristics(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
    ) -> Result<usize> {
        let service = {
            let mut state = self.shared.state();
            let connection = state
                .registry
                .find_mut(conn_id)
                .ok_or(Error::ConnectionNotFound(conn_id))?;
            let cache = connection.cache_mut();
            let count = cache.service_count();
            let service = cache
                .service(service_index)
                .map(|record| *record.id())
                .ok_or(Error::InvalidIndex {
                    kind: "service",
                    index: service_index,
                    count,
                })?;
            cache.begin_characteristics(service_index);
            service
        };

        let wait = self.shared.gate.begin(WaitClass::CharacteristicsComplete)?;
        let status = self.hal.get_characteristic(conn_id, &service, None);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::CharacteristicsComplete {
                request_failed: Some(status),
                ..
            } => Err(Error::Hal(status)),
            WakeEvent::CharacteristicsComplete { status, .. }
                if status.is_success() || status.is_end_of_records() =>
            {
                Ok(self.characteristic_count(conn_id, service_index))
            }
            WakeEvent::CharacteristicsComplete { status, .. } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Enumerate the descriptors of one cached characteristic, blocking
    /// until the listing ends. Returns the number of descriptors cached.
    pub fn discover_descriptors(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> Result<usize> {
        let (service, characteristic) =
            self.characteristic_target(conn_id, service_index, char_index)?;
        if let Some(connection) = self.shared.state().registry.find_mut(conn_id) {
            connection
                .cache_mut()
                .begin_descriptors(service_index, char_index);
        }

        let wait = self.shared.gate.begin(WaitClass::DescriptorsComplete)?;
        let status = self
            .hal
            .get_descriptor(conn_id, &service, &characteristic, None);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::DescriptorsComplete {
                request_failed: Some(status),
                ..
            } => Err(Error::Hal(status)),
            WakeEvent::DescriptorsComplete { status, .. }
                if status.is_success() || status.is_end_of_records() =>
            {
                Ok(self.descriptor_count(conn_id, service_index, char_index))
            }
            WakeEvent::DescriptorsComplete { status, .. } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    fn characteristic_count(&self, conn_id: ConnectionId, service_index: usize) -> usize {
        self.shared
            .state()
            .registry
            .find(conn_id)
            .and_then(|connection| connection.cache().service(service_index))
            .map_or(0, |service| service.characteristic_count())
    }

    fn descriptor_count(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> usize {
        self.shared
            .state()
            .registry
            .find(conn_id)
            .and_then(|connection| connection.cache().service(service_index))
            .and_then(|service| service.characteristic(char_index))
            .map_or(0, |characteristic| characteristic.descriptor_count())
    }

    // --- Cache lookups and snapshots -------------------------------------

    pub fn services(&self, conn_id: ConnectionId) -> Result<Vec<ServiceIdentity>> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        Ok(connection
            .cache()
            .services()
            .iter()
            .map(|service| *service.id())
            .collect())
    }

    pub fn characteristics(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
    ) -> Result<Vec<(CharacteristicIdentity, CharacteristicProperties)>> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        let cache = connection.cache();
        let service = cache.service(service_index).ok_or(Error::InvalidIndex {
            kind: "service",
            index: service_index,
            count: cache.service_count(),
        })?;
        Ok(service
            .characteristics()
            .iter()
            .map(|characteristic| (*characteristic.id(), characteristic.properties()))
            .collect())
    }

    pub fn descriptors(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> Result<Vec<Uuid>> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        let cache = connection.cache();
        let service = cache.service(service_index).ok_or(Error::InvalidIndex {
            kind: "service",
            index: service_index,
            count: cache.service_count(),
        })?;
        let characteristic = service.characteristic(char_index).ok_or(Error::InvalidIndex {
            kind: "characteristic",
            index: char_index,
            count: service.characteristic_count(),
        })?;
        Ok(characteristic.descriptors().to_vec())
    }

    /// Resolve a cached service by UUID. `None` when no cached service
    /// carries it.
    pub fn find_service_index(&self, conn_id: ConnectionId, uuid: &Uuid) -> Result<Option<usize>> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        Ok(connection.cache().find_service_by_uuid(uuid))
    }

    /// Resolve a cached characteristic by UUID within one service.
    pub fn find_characteristic_index(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        uuid: &Uuid,
    ) -> Result<Option<usize>> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        let cache = connection.cache();
        if cache.service(service_index).is_none() {
            return Err(Error::InvalidIndex {
                kind: "service",
                index: service_index,
                count: cache.service_count(),
            });
        }
        Ok(cache.find_characteristic_by_uuid(service_index, uuid))
    }

    /// Resolve a service and one of its characteristics by UUID in a
    /// single call.
    ///
    /// Not a pure lookup: when the service resolves, a blocking
    /// characteristic-discovery round runs for it (mutating the cache)
    /// before the characteristic is searched. When the service is not
    /// cached, no discovery is attempted.
    pub fn find_service_and_characteristic(
        &self,
        conn_id: ConnectionId,
        service_uuid: &Uuid,
        characteristic_uuid: &Uuid,
    ) -> Result<Option<(usize, usize)>> {
        let Some(service_index) = self.find_service_index(conn_id, service_uuid)? else {
            debug!(conn_id, uuid = %service_uuid, "service not cached");
            return Ok(None);
        };

        self.discover_characteristics(conn_id, service_index)?;

        Ok(self
            .find_characteristic_index(conn_id, service_index, characteristic_uuid)?
            .map(|char_index| (service_index, char_index)))
    }

    // --- Notifications ---------------------------------------------------

    /// Subscribe to notifications of a cached characteristic, blocking
    /// until the stack confirms the registration.
    pub fn register_notification(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> Result<()> {
        let client_if = self.client_if()?;
        let address = self.connection_address(conn_id)?;
        let (service, characteristic) =
            self.characteristic_target(conn_id, service_index, char_index)?;

        let wait = self.shared.gate.begin(WaitClass::NotificationState)?;
        let status =
            self.hal
                .register_for_notification(client_if, &address, &service, &characteristic);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::NotificationState { status, .. } if status.is_success() => Ok(()),
            WakeEvent::NotificationState { status, .. } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Drop the notification subscription of a cached characteristic,
    /// blocking until the stack confirms it.
    pub fn unregister_notification(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> Result<()> {
        let client_if = self.client_if()?;
        let address = self.connection_address(conn_id)?;
        let (service, characteristic) =
            self.characteristic_target(conn_id, service_index, char_index)?;

        let wait = self.shared.gate.begin(WaitClass::NotificationState)?;
        let status =
            self.hal
                .unregister_for_notification(client_if, &address, &service, &characteristic);
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::NotificationState { status, .. } if status.is_success() => Ok(()),
            WakeEvent::NotificationState { status, .. } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    // --- Writes ----------------------------------------------------------

    /// Write a characteristic without response and return after the
    /// command settle delay. No completion event follows.
    pub fn write_characteristic_command(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
        auth: AuthRequirement,
        value: &[u8],
    ) -> Result<()> {
        let (service, characteristic) =
            self.characteristic_target(conn_id, service_index, char_index)?;

        let status = self.hal.write_characteristic(
            conn_id,
            &service,
            &characteristic,
            WriteType::Command,
            auth,
            value,
        );
        if !status.is_success() {
            return Err(Error::Hal(status));
        }
        // pace the stack's command queue
        self.settle(self.settings.command_settle());
        Ok(())
    }

    /// Write a characteristic with a write request, blocking until the
    /// remote device acknowledges it.
    pub fn write_characteristic_request(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
        auth: AuthRequirement,
        value: &[u8],
    ) -> Result<()> {
        let (service, characteristic) =
            self.characteristic_target(conn_id, service_index, char_index)?;

        let wait = self.shared.gate.begin(WaitClass::CharacteristicWritten)?;
        let status = self.hal.write_characteristic(
            conn_id,
            &service,
            &characteristic,
            WriteType::Request,
            auth,
            value,
        );
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::CharacteristicWritten { status } if status.is_success() => Ok(()),
            WakeEvent::CharacteristicWritten { status } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    /// Write a descriptor without response and return after the command
    /// settle delay.
    pub fn write_descriptor_command(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
        descriptor_index: usize,
        auth: AuthRequirement,
        value: &[u8],
    ) -> Result<()> {
        let (service, characteristic, descriptor) =
            self.descriptor_target(conn_id, service_index, char_index, descriptor_index)?;

        let status = self.hal.write_descriptor(
            conn_id,
            &service,
            &characteristic,
            &descriptor,
            WriteType::Command,
            auth,
            value,
        );
        if !status.is_success() {
            return Err(Error::Hal(status));
        }
        self.settle(self.settings.command_settle());
        Ok(())
    }

    /// Write a descriptor with a write request, blocking until the remote
    /// device acknowledges it.
    pub fn write_descriptor_request(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
        descriptor_index: usize,
        auth: AuthRequirement,
        value: &[u8],
    ) -> Result<()> {
        let (service, characteristic, descriptor) =
            self.descriptor_target(conn_id, service_index, char_index, descriptor_index)?;

        let wait = self.shared.gate.begin(WaitClass::DescriptorWritten)?;
        let status = self.hal.write_descriptor(
            conn_id,
            &service,
            &characteristic,
            &descriptor,
            WriteType::Request,
            auth,
            value,
        );
        if !status.is_success() {
            return Err(Error::Hal(status));
        }

        match wait.wait(self.deadline())? {
            WakeEvent::DescriptorWritten { status } if status.is_success() => Ok(()),
            WakeEvent::DescriptorWritten { status } => Err(Error::Gatt(status)),
            _ => Err(Error::Internal("unexpected completion event")),
        }
    }

    // --- Target resolution -----------------------------------------------

    fn connection_address(&self, conn_id: ConnectionId) -> Result<BdAddr> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        Ok(*connection.address())
    }

    /// Copy the identities a (service, characteristic) index pair points
    /// at, validating both indices.
    fn characteristic_target(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
    ) -> Result<(ServiceIdentity, CharacteristicIdentity)> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        let cache = connection.cache();
        let service = cache.service(service_index).ok_or(Error::InvalidIndex {
            kind: "service",
            index: service_index,
            count: cache.service_count(),
        })?;
        let characteristic = service.characteristic(char_index).ok_or(Error::InvalidIndex {
            kind: "characteristic",
            index: char_index,
            count: service.characteristic_count(),
        })?;
        Ok((*service.id(), *characteristic.id()))
    }

    fn descriptor_target(
        &self,
        conn_id: ConnectionId,
        service_index: usize,
        char_index: usize,
        descriptor_index: usize,
    ) -> Result<(ServiceIdentity, CharacteristicIdentity, Uuid)> {
        let state = self.shared.state();
        let connection = state
            .registry
            .find(conn_id)
            .ok_or(Error::ConnectionNotFound(conn_id))?;
        let cache = connection.cache();
        let service = cache.service(service_index).ok_or(Error::InvalidIndex {
            kind: "service",
            index: service_index,
            count: cache.service_count(),
        })?;
        let characteristic = service.characteristic(char_index).ok_or(Error::InvalidIndex {
            kind: "characteristic",
            index: char_index,
            count: service.characteristic_count(),
        })?;
        let descriptor = characteristic
            .descriptor(descriptor_index)
            .ok_or(Error::InvalidIndex {
                kind: "descriptor",
                index: descriptor_index,
                count: characteristic.descriptor_count(),
            })?;
        Ok((*service.id(), *characteristic.id(), *descriptor))
    }
}
