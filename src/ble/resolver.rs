//! Characteristic resolution.
//!
//! Maps a service's well-known characteristic UUIDs onto whatever the
//! firmware actually exposed during discovery.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::ble::radio::CharacteristicHandle;
use crate::ble::uuids::ServiceKind;
use crate::error::{Error, Result};

/// Resolves named characteristic accessors for one discovered service.
#[derive(Debug, Clone)]
pub struct CharacteristicResolver {
    kind: ServiceKind,
    handles: HashMap<Uuid, CharacteristicHandle>,
}

impl CharacteristicResolver {
    /// Build a resolver from the characteristic UUIDs found on the device.
    ///
    /// Characteristics outside the service's well-known table are ignored.
    pub fn new(kind: ServiceKind, discovered: &[Uuid]) -> Self {
        let service = kind.uuid();
        let handles: HashMap<_, _> = kind
            .characteristics()
            .iter()
            .filter(|(uuid, _)| discovered.contains(uuid))
            .map(|(uuid, _)| (*uuid, CharacteristicHandle::new(service, *uuid)))
            .collect();

        for (uuid, name) in kind.characteristics() {
            if !handles.contains_key(uuid) {
                debug!("{} service: characteristic {} ({}) missing", kind, name, uuid);
            }
        }

        Self { kind, handles }
    }

    /// The service this resolver belongs to.
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Look up a characteristic handle.
    pub fn resolve(&self, uuid: &Uuid) -> Option<CharacteristicHandle> {
        self.handles.get(uuid).copied()
    }

    /// Look up a characteristic handle, failing with a named error if absent.
    pub fn require(&self, uuid: &Uuid, name: &'static str) -> Result<CharacteristicHandle> {
        self.resolve(uuid)
            .ok_or(Error::CharacteristicNotDiscovered { name })
    }

    /// All resolved handles.
    pub fn handles(&self) -> impl Iterator<Item = CharacteristicHandle> + '_ {
        self.handles.values().copied()
    }

    /// Names of well-known characteristics the firmware did not expose.
    pub fn missing(&self) -> Vec<&'static str> {
        self.kind
            .characteristics()
            .iter()
            .filter(|(uuid, _)| !self.handles.contains_key(uuid))
            .map(|(_, name)| *name)
            .collect()
    }
}
