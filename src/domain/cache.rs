//! Per-connection GATT discovery cache
//!
//! Services, characteristics and descriptors reported by the remote device
//! are copied here as discovery events arrive and addressed afterwards by
//! small indices in insertion order. Indices are scoped to one discovery
//! round: a new service discovery wipes the whole hierarchy, so callers
//! must not hold indices across it.

use tracing::{debug, warn};

use crate::domain::models::{
    CharacteristicIdentity, CharacteristicProperties, ServiceIdentity, Uuid,
};

/// Most services kept per connection. Extra results are dropped; this is a
/// memory cap, not a protocol limit.
pub const MAX_SERVICES: usize = 128;

/// Characteristic storage grows in steps of this many slots.
pub const CHAR_CHUNK: usize = 8;

/// Hard cap on descriptors per characteristic, the width of a descriptor
/// index.
pub const MAX_DESCRIPTORS: usize = 255;

/// One characteristic and the descriptors enumerated under it.
#[derive(Debug, Clone)]
pub struct CharacteristicRecord {
    id: CharacteristicIdentity,
    properties: CharacteristicProperties,
    descriptors: Vec<Uuid>,
    live_descriptors: usize,
}

impl CharacteristicRecord {
    fn new(id: CharacteristicIdentity, properties: CharacteristicProperties) -> Self {
        Self {
            id,
            properties,
            descriptors: Vec::new(),
            live_descriptors: 0,
        }
    }

    pub fn id(&self) -> &CharacteristicIdentity {
        &self.id
    }

    pub fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    pub fn descriptor_count(&self) -> usize {
        self.live_descriptors
    }

    pub fn descriptors(&self) -> &[Uuid] {
        &self.descriptors[..self.live_descriptors]
    }

    pub fn descriptor(&self, index: usize) -> Option<&Uuid> {
        self.descriptors().get(index)
    }

    /// Restart descriptor enumeration. Stale entries are overwritten by the
    /// next wave of results rather than freed.
    fn begin_descriptors(&mut self) {
        self.live_descriptors = 0;
    }

    fn push_descriptor(&mut self, uuid: Uuid) -> Option<usize> {
        if self.live_descriptors == MAX_DESCRIPTORS {
            warn!(characteristic = %self.id.uuid, "descriptor table full, dropping entry");
            return None;
        }

        let index = self.live_descriptors;
        if index < self.descriptors.len() {
            self.descriptors[index] = uuid;
        } else {
            self.descriptors.push(uuid);
        }
        self.live_descriptors += 1;
        Some(index)
    }
}

/// One service and the characteristics enumerated under it.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    id: ServiceIdentity,
    characteristics: Vec<CharacteristicRecord>,
    live_characteristics: usize,
}

impl ServiceRecord {
    fn new(id: ServiceIdentity) -> Self {
        Self {
            id,
            characteristics: Vec::new(),
            live_characteristics: 0,
        }
    }

    pub fn id(&self) -> &ServiceIdentity {
        &self.id
    }

    pub fn characteristic_count(&self) -> usize {
        self.live_characteristics
    }

    pub fn characteristics(&self) -> &[CharacteristicRecord] {
        &self.characteristics[..self.live_characteristics]
    }

    pub fn characteristic(&self, index: usize) -> Option<&CharacteristicRecord> {
        self.characteristics().get(index)
    }

    fn characteristic_mut(&mut self, index: usize) -> Option<&mut CharacteristicRecord> {
        if index < self.live_characteristics {
            self.characteristics.get_mut(index)
        } else {
            None
        }
    }

    /// Allocated characteristic slots, grown in [`CHAR_CHUNK`] steps.
    pub fn characteristic_capacity(&self) -> usize {
        self.characteristics.capacity()
    }

    /// Restart characteristic enumeration. The first call reserves one
    /// chunk of slots; later calls reset the live count and let the next
    /// wave of results overwrite the stale entries in place.
    fn begin_characteristics(&mut self) {
        if self.characteristics.capacity() == 0 {
            self.characteristics.reserve_exact(CHAR_CHUNK);
        }
        self.live_characteristics = 0;
    }

    fn push_characteristic(
        &mut self,
        id: CharacteristicIdentity,
        properties: CharacteristicProperties,
    ) -> usize {
        let index = self.live_characteristics;
        if index < self.characteristics.len() {
            self.characteristics[index] = CharacteristicRecord::new(id, properties);
        } else {
            if self.characteristics.len() == self.characteristics.capacity() {
                self.characteristics.reserve_exact(CHAR_CHUNK);
            }
            self.characteristics.push(CharacteristicRecord::new(id, properties));
        }
        self.live_characteristics += 1;
        index
    }

    fn find_characteristic(&self, id: &CharacteristicIdentity) -> Option<usize> {
        self.characteristics().iter().position(|c| c.id == *id)
    }

    fn find_characteristic_by_uuid(&self, uuid: &Uuid) -> Option<usize> {
        self.characteristics().iter().position(|c| c.id.uuid == *uuid)
    }
}

/// The three-level service/characteristic/descriptor table built for one
/// connection.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache {
    services: Vec<ServiceRecord>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything; all previously handed-out indices become invalid.
    pub fn clear_all(&mut self) {
        self.services.clear();
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn service(&self, index: usize) -> Option<&ServiceRecord> {
        self.services.get(index)
    }

    /// Append a service, or silently drop it once [`MAX_SERVICES`] is
    /// reached. Returns the index assigned to the stored record.
    pub fn add_service(&mut self, id: &ServiceIdentity) -> Option<usize> {
        if self.services.len() == MAX_SERVICES {
            debug!(service = %id.uuid, "service table full, dropping entry");
            return None;
        }
        self.services.push(ServiceRecord::new(*id));
        Some(self.services.len() - 1)
    }

    /// Look a service up by its full identity.
    pub fn find_service_index(&self, id: &ServiceIdentity) -> Option<usize> {
        self.services.iter().position(|s| s.id == *id)
    }

    /// Look a service up by UUID alone, first match wins.
    pub fn find_service_by_uuid(&self, uuid: &Uuid) -> Option<usize> {
        self.services.iter().position(|s| s.id.uuid == *uuid)
    }

    /// Prepare the characteristic table of a service for a fresh
    /// enumeration round.
    pub fn begin_characteristics(&mut self, service_index: usize) -> bool {
        match self.services.get_mut(service_index) {
            Some(service) => {
                service.begin_characteristics();
                true
            }
            None => false,
        }
    }

    pub fn add_characteristic(
        &mut self,
        service_index: usize,
        id: CharacteristicIdentity,
        properties: CharacteristicProperties,
    ) -> Option<usize> {
        self.services
            .get_mut(service_index)
            .map(|service| service.push_characteristic(id, properties))
    }

    pub fn find_characteristic_index(
        &self,
        service_index: usize,
        id: &CharacteristicIdentity,
    ) -> Option<usize> {
        self.service(service_index)?.find_characteristic(id)
    }

    pub fn find_characteristic_by_uuid(&self, service_index: usize, uuid: &Uuid) -> Option<usize> {
        self.service(service_index)?.find_characteristic_by_uuid(uuid)
    }

    /// Prepare a characteristic's descriptor list for a fresh enumeration
    /// round.
    pub fn begin_descriptors(&mut self, service_index: usize, char_index: usize) -> bool {
        match self
            .services
            .get_mut(service_index)
            .and_then(|service| service.characteristic_mut(char_index))
        {
            Some(characteristic) => {
                characteristic.begin_descriptors();
                true
            }
            None => false,
        }
    }

    pub fn add_descriptor(
        &mut self,
        service_index: usize,
        char_index: usize,
        uuid: Uuid,
    ) -> Option<usize> {
        self.services
            .get_mut(service_index)
            .and_then(|service| service.characteristic_mut(char_index))
            .and_then(|characteristic| characteristic.push_descriptor(uuid))
    }
}
