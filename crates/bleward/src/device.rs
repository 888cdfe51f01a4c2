//! Device records exchanged between discovery, classification and persistence.

use std::fmt;

use chrono::NaiveDateTime;

/// Placeholder for a missing display name or an unmatched tag.
pub const UNKNOWN: &str = "Unknown";

/// Canonical device address.
///
/// Addresses are trimmed and uppercased on construction, so two `DeviceId`s compare equal
/// whenever their raw forms differ only in case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Advertisement metadata, kept in the order the scanner reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair.
    ///
    /// Re-inserting an existing key replaces its value without moving it.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Flatten into `key=value` pairs joined by `;`.
    pub fn flatten(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

/// A device as reported by one discovery pass, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDevice {
    /// Raw address as reported by the scanner (any case)
    pub address: String,

    /// Advertised name, if the device broadcast one
    pub name: Option<String>,

    /// Received signal strength in dBm
    pub rssi: i16,

    pub metadata: Option<Metadata>,
}

impl DiscoveredDevice {
    pub fn new(address: impl Into<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi,
            metadata: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The advertised name, or [`UNKNOWN`] when it is missing or blank.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN,
        }
    }
}

/// One immutable row of the observation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub id: DeviceId,
    pub name: String,
    pub rssi: i16,
    pub tag: String,
    /// Flattened metadata (`k=v;k=v`), empty when the device reported none
    pub details: String,
}

impl Observation {
    /// Whether the device matched an entry in the known registry.
    pub fn is_known(&self) -> bool {
        self.tag != UNKNOWN
    }
}

/// An identifier newly appended to the unknown registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDevice {
    pub id: DeviceId,
    pub name: String,
}
