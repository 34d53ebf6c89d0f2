//! Process-wide record of last known service availability

use std::collections::{BTreeMap, HashSet};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::{services, ServiceAvailability};

/// Keyed store of availability records
///
/// Constructed once per process and shared via `Arc`. Entries are created
/// lazily on the first probe and never removed; the set of service names is
/// small and fixed at deploy time.
pub struct AvailabilityRegistry {
    records: DashMap<String, ServiceAvailability>,
    local_indicators: HashSet<String>,
}

impl AvailabilityRegistry {
    /// Registry whose local-capability indicators are the given names
    pub fn new<I, S>(local_indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: DashMap::new(),
            local_indicators: local_indicators.into_iter().map(Into::into).collect(),
        }
    }

    /// Registry using the built-in indicator list
    pub fn with_default_indicators() -> Self {
        Self::new(services::LOCAL_INDICATORS.iter().copied())
    }

    pub fn get(&self, service_name: &str) -> Option<ServiceAvailability> {
        self.records.get(service_name).map(|r| r.value().clone())
    }

    /// Store a record, last write wins.
    ///
    /// `checked_at` never moves backwards: a record older than the one
    /// already held is dropped. Returns whether the record was stored.
    pub fn set(&self, service_name: &str, record: ServiceAvailability) -> bool {
        match self.records.entry(service_name.to_string()) {
            Entry::Occupied(mut existing) => {
                if record.checked_at < existing.get().checked_at {
                    return false;
                }
                existing.insert(record);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Snapshot of every record, ordered by name
    pub fn all(&self) -> BTreeMap<String, ServiceAvailability> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// Names of services currently reported available
    pub fn available_service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.value().available)
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn is_available(&self, service_name: &str) -> bool {
        self.records
            .get(service_name)
            .map(|r| r.available)
            .unwrap_or(false)
    }

    pub fn is_local_indicator(&self, service_name: &str) -> bool {
        self.local_indicators.contains(service_name)
    }

    pub fn local_indicators(&self) -> impl Iterator<Item = &str> {
        self.local_indicators.iter().map(String::as_str)
    }

    /// True iff an allow-listed indicator's latest record says available.
    ///
    /// Reads the last record regardless of its age; re-probing is explicit.
    pub fn any_local_service_available(&self) -> bool {
        self.local_indicators
            .iter()
            .any(|name| self.is_available(name))
    }
}

impl Default for AvailabilityRegistry {
    fn default() -> Self {
        Self::with_default_indicators()
    }
}
