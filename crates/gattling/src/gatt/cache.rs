//! The client-side attribute cache.
//!
//! A tree of discovered services, their characteristics, and their
//! descriptors, keyed by UUID at every level. No parent pointers are stored;
//! enclosing-entity lookups go by handle range, which keeps the tree free of
//! ownership cycles.
//!
//! Entries are created and refreshed only by successful discovery
//! completion. A complete-set insert (full-range scan) evicts entries whose
//! UUIDs are absent from the new list; a partial insert (discovery by UUID)
//! only upserts and never touches unrelated entries.

use std::collections::HashMap;

use super::types::{Characteristic, Descriptor, Service, Uuid};

#[derive(Debug)]
struct CharacteristicEntry {
    characteristic: Characteristic,
    descriptors: HashMap<Uuid, Descriptor>,
    /// Whether descriptor discovery has run for this characteristic; an
    /// empty descriptor map is ambiguous without it.
    descriptors_discovered: bool,
    /// Shadow of the last written Client Characteristic Configuration bits.
    client_config: u16,
}

impl CharacteristicEntry {
    fn new(characteristic: Characteristic) -> Self {
        CharacteristicEntry {
            characteristic,
            descriptors: HashMap::new(),
            descriptors_discovered: false,
            client_config: 0,
        }
    }
}

#[derive(Debug)]
struct ServiceEntry {
    service: Service,
    characteristics: HashMap<Uuid, CharacteristicEntry>,
}

/// The discovered view of a remote GATT server.
#[derive(Debug, Default)]
pub struct ServiceCache {
    services: HashMap<Uuid, ServiceEntry>,
}

impl ServiceCache {
    pub fn new() -> Self {
        ServiceCache::default()
    }

    /// Upserts discovered services. With `complete_set`, services absent
    /// from `list` are evicted. A service whose handle range moved drops its
    /// cached characteristics.
    pub fn insert_services(&mut self, list: &[Service], complete_set: bool) {
        if complete_set {
            self.services
                .retain(|uuid, _| list.iter().any(|s| s.uuid == *uuid));
        }
        for service in list {
            match self.services.get_mut(&service.uuid) {
                Some(entry) => {
                    if entry.service.start_handle != service.start_handle
                        || entry.service.end_handle != service.end_handle
                    {
                        entry.characteristics.clear();
                    }
                    entry.service = service.clone();
                }
                None => {
                    self.services.insert(
                        service.uuid,
                        ServiceEntry {
                            service: service.clone(),
                            characteristics: HashMap::new(),
                        },
                    );
                }
            }
        }
    }

    /// Upserts discovered characteristics under a service. With
    /// `complete_set`, characteristics absent from `list` are evicted.
    /// Returns false when the service is not cached.
    pub fn insert_characteristics(
        &mut self,
        service_uuid: &Uuid,
        list: &[Characteristic],
        complete_set: bool,
    ) -> bool {
        let Some(entry) = self.services.get_mut(service_uuid) else {
            return false;
        };
        if complete_set {
            entry
                .characteristics
                .retain(|uuid, _| list.iter().any(|c| c.uuid == *uuid));
        }
        for characteristic in list {
            match entry.characteristics.get_mut(&characteristic.uuid) {
                Some(existing) => {
                    if existing.characteristic.value_handle != characteristic.value_handle {
                        existing.descriptors.clear();
                        existing.descriptors_discovered = false;
                    }
                    existing.characteristic = characteristic.clone();
                }
                None => {
                    entry.characteristics.insert(
                        characteristic.uuid,
                        CharacteristicEntry::new(characteristic.clone()),
                    );
                }
            }
        }
        true
    }

    /// Replaces the descriptor set of a characteristic and marks descriptor
    /// discovery complete for it. Returns false when the characteristic is
    /// not cached.
    pub fn insert_descriptors(&mut self, characteristic: &Characteristic, list: &[Descriptor]) -> bool {
        let Some(entry) = self.characteristic_entry_mut(characteristic) else {
            return false;
        };
        entry.descriptors = list.iter().map(|d| (d.uuid, d.clone())).collect();
        entry.descriptors_discovered = true;
        true
    }

    /// The last handle belonging to a characteristic: one below the next
    /// characteristic's declaration within the same service, or the
    /// service's end handle when it is the last. This is the upper bound for
    /// descriptor discovery.
    pub fn end_handle_of(&self, characteristic: &Characteristic) -> Option<u16> {
        let entry = self.service_entry_containing(characteristic.declaration_handle)?;
        let next_declaration = entry
            .characteristics
            .values()
            .map(|c| c.characteristic.declaration_handle)
            .filter(|&h| h > characteristic.declaration_handle)
            .min();
        Some(match next_declaration {
            Some(declaration) => declaration - 1,
            None => entry.service.end_handle,
        })
    }

    /// The cached descriptors of a characteristic, or `None` when descriptor
    /// discovery has not run for it.
    pub fn descriptors_of(&self, characteristic: &Characteristic) -> Option<Vec<Descriptor>> {
        let entry = self.characteristic_entry(characteristic)?;
        if !entry.descriptors_discovered {
            return None;
        }
        Some(entry.descriptors.values().cloned().collect())
    }

    /// Looks up a cached descriptor of a characteristic by UUID.
    pub fn descriptor(&self, characteristic: &Characteristic, uuid: &Uuid) -> Option<Descriptor> {
        self.characteristic_entry(characteristic)?
            .descriptors
            .get(uuid)
            .cloned()
    }

    /// Records the Client Characteristic Configuration bits last written for
    /// a characteristic. Returns false when the characteristic is not
    /// cached.
    pub fn update_client_config(&mut self, characteristic: &Characteristic, bits: u16) -> bool {
        match self.characteristic_entry_mut(characteristic) {
            Some(entry) => {
                entry.client_config = bits;
                true
            }
            None => false,
        }
    }

    /// The Client Characteristic Configuration bits last written for a
    /// characteristic.
    pub fn client_config(&self, characteristic: &Characteristic) -> Option<u16> {
        self.characteristic_entry(characteristic)
            .map(|entry| entry.client_config)
    }

    /// All cached services.
    pub fn services(&self) -> Vec<Service> {
        self.services.values().map(|e| e.service.clone()).collect()
    }

    /// Looks up a cached service by UUID.
    pub fn service(&self, uuid: &Uuid) -> Option<Service> {
        self.services.get(uuid).map(|e| e.service.clone())
    }

    /// All cached characteristics of a service.
    pub fn characteristics(&self, service_uuid: &Uuid) -> Vec<Characteristic> {
        self.services
            .get(service_uuid)
            .map(|entry| {
                entry
                    .characteristics
                    .values()
                    .map(|c| c.characteristic.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up a cached characteristic by service and characteristic UUID.
    pub fn characteristic(&self, service_uuid: &Uuid, uuid: &Uuid) -> Option<Characteristic> {
        self.services
            .get(service_uuid)?
            .characteristics
            .get(uuid)
            .map(|c| c.characteristic.clone())
    }

    fn service_entry_containing(&self, handle: u16) -> Option<&ServiceEntry> {
        self.services.values().find(|e| e.service.contains(handle))
    }

    fn characteristic_entry(&self, characteristic: &Characteristic) -> Option<&CharacteristicEntry> {
        self.service_entry_containing(characteristic.declaration_handle)?
            .characteristics
            .get(&characteristic.uuid)
    }

    fn characteristic_entry_mut(
        &mut self,
        characteristic: &Characteristic,
    ) -> Option<&mut CharacteristicEntry> {
        let service_uuid = self
            .service_entry_containing(characteristic.declaration_handle)
            .map(|e| e.service.uuid)?;
        self.services
            .get_mut(&service_uuid)?
            .characteristics
            .get_mut(&characteristic.uuid)
    }
}
