use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::StoreError;
use crate::device::DeviceId;

/// Operator-maintained mapping from device address to a human-readable tag.
///
/// Backed by a two-column CSV file (`address,tag`) with no required header. The registry is
/// read-only from this process's point of view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownRegistry {
    tags: HashMap<DeviceId, String>,
}

impl KnownRegistry {
    /// Load the registry from `path`.
    ///
    /// Never fails: a missing or unreadable file yields an empty registry, in which case every
    /// device is classified as unknown.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(registry) => {
                info!(
                    "Loaded {} known devices from {}",
                    registry.len(),
                    path.display()
                );
                registry
            }
            Err(StoreError::Io(_, e)) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Known device file {} not found, all devices will be tagged unknown",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                warn!("Failed to load known devices, continuing without them: {}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> super::Result<Self> {
        let file = File::open(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
        Self::from_reader(file).map_err(|e| StoreError::Csv(path.to_path_buf(), e))
    }

    /// Parse registry rows from any reader.
    ///
    /// Rows that do not have exactly two columns, or whose address is blank, are skipped. Later
    /// rows win over earlier ones for the same address.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut tags = HashMap::new();

        for (idx, record) in super::lenient_reader(reader).records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e),
                Err(e) => {
                    debug!("Skipping unreadable known device row {}: {}", idx + 1, e);
                    continue;
                }
            };

            if record.len() != 2 {
                debug!(
                    "Skipping known device row {}: expected 2 columns, found {}",
                    idx + 1,
                    record.len()
                );
                continue;
            }

            let id = DeviceId::new(&record[0]);
            if id.is_empty() {
                debug!("Skipping known device row {}: empty address", idx + 1);
                continue;
            }
            tags.insert(id, record[1].trim().to_string());
        }

        Ok(Self { tags })
    }

    /// Look up the tag for a device.
    pub fn lookup(&self, id: &DeviceId) -> Option<&str> {
        self.tags.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &str)> {
        self.tags.iter().map(|(id, tag)| (id, tag.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for KnownRegistry
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tags: iter
                .into_iter()
                .map(|(id, tag)| (DeviceId::new(id.as_ref()), tag.into()))
                .collect(),
        }
    }
}
