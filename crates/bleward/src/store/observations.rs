use std::path::Path;
use std::path::PathBuf;

use super::StoreError;
use crate::device::Observation;

/// Header row of the observation log.
pub const HEADER: [&str; 6] = [
    "Timestamp",
    "DeviceIdentifier",
    "DisplayName",
    "SignalStrength",
    "Tag",
    "MetadataDetails",
];

/// Timestamp format used in the observation log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only CSV log with one row per device per scan cycle.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single observation.
    pub fn append(&self, observation: &Observation) -> super::Result<()> {
        self.append_all(std::slice::from_ref(observation))
    }

    /// Append a batch of observations in order, flushing once at the end.
    ///
    /// The header row is written first if the log is missing or empty. Any write error is
    /// returned; rows already written are left in place.
    pub fn append_all(&self, observations: &[Observation]) -> super::Result<()> {
        let mut writer = super::open_writer(&self.path, &HEADER)?;
        for observation in observations {
            writer
                .write_record(to_record(observation))
                .map_err(|e| StoreError::Csv(self.path.clone(), e))?;
        }
        super::finish(&self.path, writer)
    }
}

fn to_record(observation: &Observation) -> [String; 6] {
    [
        observation.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        observation.id.to_string(),
        observation.name.clone(),
        observation.rssi.to_string(),
        observation.tag.clone(),
        observation.details.clone(),
    ]
}
