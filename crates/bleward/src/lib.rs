//! bleward: periodic BLE discovery with known/unknown device triage.
//!
//! Each cycle takes one discovery batch, tags every device against an operator-maintained
//! known registry, records untagged devices once in an unknown registry, and appends one row
//! per device to an observation log.

pub mod config;
pub mod device;
pub mod engine;
pub mod integrations;
pub mod store;

pub use config::Config;
pub use config::LogLevel;
pub use device::DeviceId;
pub use device::DiscoveredDevice;
pub use device::Metadata;
pub use device::Observation;
pub use engine::classify;
pub use engine::Classification;
pub use engine::CycleError;
pub use engine::CycleReport;
pub use engine::Monitor;
pub use integrations::notify::Notifier;
pub use integrations::scanner::ScanError;
pub use integrations::scanner::Scanner;
pub use store::KnownRegistry;
pub use store::ObservationLog;
pub use store::StoreError;
pub use store::UnknownRegistry;
