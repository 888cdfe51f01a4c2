use chrono::NaiveDateTime;
use tracing::debug;

use crate::device::DeviceId;
use crate::device::DiscoveredDevice;
use crate::device::Observation;
use crate::device::UnknownDevice;
use crate::device::UNKNOWN;
use crate::store;
use crate::store::KnownRegistry;
use crate::store::UnknownRegistry;

/// Result of classifying one discovery batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// One observation per discovered device, in batch order
    pub observations: Vec<Observation>,

    /// Devices appended to the unknown registry during this batch
    pub new_unknowns: Vec<UnknownDevice>,
}

impl Classification {
    pub fn known_count(&self) -> usize {
        self.observations.iter().filter(|o| o.is_known()).count()
    }
}

/// Classify a discovery batch against the known registry.
///
/// Every device produces exactly one observation stamped with `timestamp`. Devices without a
/// known tag are registered in `unknown` as they are encountered, so an identifier repeated
/// within the batch is logged each time but registered once.
///
/// Stops at the first registry write error.
pub fn classify(
    batch: &[DiscoveredDevice],
    known: &KnownRegistry,
    unknown: &mut UnknownRegistry,
    timestamp: NaiveDateTime,
) -> store::Result<Classification> {
    let mut result = Classification {
        observations: Vec::with_capacity(batch.len()),
        new_unknowns: Vec::new(),
    };

    for device in batch {
        let id = DeviceId::new(&device.address);
        let name = device.display_name().to_string();
        let tag = known.lookup(&id).unwrap_or(UNKNOWN).to_string();
        let details = device
            .metadata
            .as_ref()
            .map(|m| m.flatten())
            .unwrap_or_default();

        debug!("Classified {} ({}) as {}", id, name, tag);

        let observation = Observation {
            timestamp,
            id,
            name,
            rssi: device.rssi,
            tag,
            details,
        };

        if !observation.is_known() && unknown.record_if_new(&observation.id, &observation.name)? {
            result.new_unknowns.push(UnknownDevice {
                id: observation.id.clone(),
                name: observation.name.clone(),
            });
        }

        result.observations.push(observation);
    }

    Ok(result)
}
