use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Local;
use chrono::NaiveDateTime;
use tracing::debug;
use tracing::info;

use super::classify::classify;
use super::classify::Classification;
use crate::config::RegistryConfig;
use crate::integrations::notify::Events;
use crate::integrations::notify::Notifier;
use crate::integrations::scanner::ScanError;
use crate::integrations::scanner::Scanner;
use crate::store::KnownRegistry;
use crate::store::ObservationLog;
use crate::store::StoreError;
use crate::store::UnknownRegistry;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Discovery failed: {0}")]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// 1-based cycle number since start-up
    pub cycle: u64,
    pub timestamp: NaiveDateTime,
    pub observed: usize,
    pub known: usize,
    pub new_unknowns: usize,
}

/// Owns the registries, the observation log and the collaborators, and runs scan cycles.
///
/// The classification engine itself is stateless; all persistent state lives here and is lent
/// to it for the duration of a cycle.
pub struct Monitor {
    known_path: PathBuf,
    known: KnownRegistry,
    known_reload_cycles: u32,
    unknown: UnknownRegistry,
    log: ObservationLog,
    scanner: Box<dyn Scanner>,
    notifier: Box<dyn Notifier>,
    events: Events,
    /// Prefix for outgoing notifications
    origin: String,
    cycles: u64,
}

impl Monitor {
    /// Initialize the persisted stores and load the known registry.
    pub fn open(
        registry: &RegistryConfig,
        scanner: Box<dyn Scanner>,
        notifier: Box<dyn Notifier>,
        events: Events,
    ) -> Result<Self, StoreError> {
        let unknown = UnknownRegistry::open(&registry.unknown_path)?;
        let known = KnownRegistry::load(&registry.known_path);
        let origin = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "bleward".to_string());

        info!(
            "Monitor ready: scanner={}, notifier={}, log={}",
            scanner.name(),
            notifier.name(),
            registry.log_path.display()
        );

        Ok(Self {
            known_path: registry.known_path.clone(),
            known,
            known_reload_cycles: registry.known_reload_cycles,
            unknown,
            log: ObservationLog::new(&registry.log_path),
            scanner,
            notifier,
            events,
            origin,
            cycles: 0,
        })
    }

    /// Override the notification prefix (defaults to the host name).
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn known(&self) -> &KnownRegistry {
        &self.known
    }

    pub fn unknown(&self) -> &UnknownRegistry {
        &self.unknown
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one discovery → classify → persist cycle.
    ///
    /// A discovery failure aborts the cycle before anything is written. A store failure aborts
    /// it mid-way; the observation log is only written after classification succeeds.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.cycles += 1;
        let cycle = self.cycles;

        if self.known_reload_due(cycle) {
            self.known = KnownRegistry::load(&self.known_path);
        }

        debug!("[cycle {}] Starting discovery via {}", cycle, self.scanner.name());
        let batch = self.scanner.discover().await?;

        let timestamp = Local::now().naive_local();
        self.unknown.refresh()?;
        let classification = classify(&batch, &self.known, &mut self.unknown, timestamp)?;
        self.log.append_all(&classification.observations)?;

        let report = CycleReport {
            cycle,
            timestamp,
            observed: classification.observations.len(),
            known: classification.known_count(),
            new_unknowns: classification.new_unknowns.len(),
        };
        info!(
            "[cycle {}] Logged {} devices ({} known, {} new unknown)",
            cycle, report.observed, report.known, report.new_unknowns
        );

        self.send_notifications(&classification, &report).await;
        Ok(report)
    }

    fn known_reload_due(&self, cycle: u64) -> bool {
        let every = u64::from(self.known_reload_cycles);
        every > 0 && cycle > 1 && (cycle - 1) % every == 0
    }

    async fn send_notifications(&self, classification: &Classification, report: &CycleReport) {
        if self.events.on_known {
            let mut seen = HashSet::new();
            for observation in classification.observations.iter().filter(|o| o.is_known()) {
                if !seen.insert(&observation.id) {
                    continue;
                }
                let message = format!(
                    "[{}] {} detected: {} ({}) rssi {}",
                    self.origin, observation.tag, observation.id, observation.name, observation.rssi
                );
                self.notifier.notify(&message).await;
            }
        }

        if self.events.on_new_unknown {
            for device in &classification.new_unknowns {
                let message = format!(
                    "[{}] New unknown device: {} ({})",
                    self.origin, device.id, device.name
                );
                self.notifier.notify(&message).await;
            }
        }

        if self.events.on_cycle {
            let message = format!(
                "[{}] Cycle {} at {}: {} devices, {} known, {} new unknown",
                self.origin,
                report.cycle,
                report.timestamp.format(crate::store::TIMESTAMP_FORMAT),
                report.observed,
                report.known,
                report.new_unknowns
            );
            self.notifier.notify(&message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::device::DiscoveredDevice;
    use crate::integrations::notify::MockNotifier;
    use crate::integrations::scanner::MockScanner;

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: RegistryConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let registry = RegistryConfig {
                known_path: dir.path().join("known.csv"),
                unknown_path: dir.path().join("unknown.csv"),
                log_path: dir.path().join("ble_log.csv"),
                known_reload_cycles: 0,
            };
            std::fs::write(&registry.known_path, "D4:CA:6E:12:34:56,Axon Taser\n").unwrap();
            Self { _dir: dir, registry }
        }

        fn monitor(
            &self,
            scanner: MockScanner,
            events: Events,
        ) -> (Monitor, Arc<Mutex<Vec<String>>>) {
            let notifier = MockNotifier::new();
            let messages = notifier.messages.clone();
            let monitor =
                Monitor::open(&self.registry, Box::new(scanner), Box::new(notifier), events)
                    .unwrap()
                    .with_origin("test");
            (monitor, messages)
        }

        fn log_lines(&self) -> Vec<String> {
            std::fs::read_to_string(&self.registry.log_path)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn unknown_lines(&self) -> Vec<String> {
            std::fs::read_to_string(&self.registry.unknown_path)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_cycle_logs_and_registers() {
        let fixture = Fixture::new();
        let mut scanner = MockScanner::new();
        scanner.push_batch(vec![
            DiscoveredDevice::new("d4:ca:6e:12:34:56", -65),
            DiscoveredDevice::new("aa:bb:cc:dd:ee:ff", -80).with_name("Tile"),
            DiscoveredDevice::new("AA:BB:CC:DD:EE:FF", -81).with_name("Tile"),
        ]);
        let (mut monitor, messages) = fixture.monitor(scanner, Events::default());

        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.observed, 3);
        assert_eq!(report.known, 1);
        assert_eq!(report.new_unknowns, 1);

        let log = fixture.log_lines();
        assert_eq!(log.len(), 4);
        assert!(log[1].ends_with(",D4:CA:6E:12:34:56,Unknown,-65,Axon Taser,"));
        assert!(log[2].ends_with(",AA:BB:CC:DD:EE:FF,Tile,-80,Unknown,"));
        assert!(log[3].ends_with(",AA:BB:CC:DD:EE:FF,Tile,-81,Unknown,"));

        assert_eq!(
            fixture.unknown_lines(),
            vec!["DeviceIdentifier,DisplayName", "AA:BB:CC:DD:EE:FF,Tile"]
        );

        let messages = messages.lock().unwrap();
        assert_eq!(
            *messages,
            vec!["[test] Axon Taser detected: D4:CA:6E:12:34:56 (Unknown) rssi -65"]
        );
    }

    #[tokio::test]
    async fn test_scan_failure_writes_nothing() {
        let fixture = Fixture::new();
        let mut scanner = MockScanner::new();
        scanner.push_error(ScanError::Unavailable("adapter powered off".to_string()));
        let (mut monitor, messages) = fixture.monitor(scanner, Events::default());

        let err = monitor.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Scan(ScanError::Unavailable(_))));
        assert!(fixture.log_lines().is_empty());
        assert_eq!(fixture.unknown_lines().len(), 1);
        assert!(messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_cycles_register_once() {
        let fixture = Fixture::new();
        let mut scanner = MockScanner::new();
        for _ in 0..3 {
            scanner.push_batch(vec![DiscoveredDevice::new("11:22:33:44:55:66", -70)]);
        }
        let events = Events {
            on_known: false,
            on_new_unknown: true,
            on_cycle: false,
        };
        let (mut monitor, messages) = fixture.monitor(scanner, events);

        for _ in 0..3 {
            monitor.run_cycle().await.unwrap();
        }

        assert_eq!(monitor.cycles(), 3);
        assert_eq!(fixture.log_lines().len(), 4);
        assert_eq!(fixture.unknown_lines().len(), 2);
        assert_eq!(
            *messages.lock().unwrap(),
            vec!["[test] New unknown device: 11:22:33:44:55:66 (Unknown)"]
        );
    }

    #[tokio::test]
    async fn test_unknown_registry_edits_between_cycles_are_respected() {
        let fixture = Fixture::new();
        let mut scanner = MockScanner::new();
        scanner.push_batch(vec![DiscoveredDevice::new("11:22:33:44:55:66", -70)]);
        let (mut monitor, _) = fixture.monitor(scanner, Events::default());

        // Another tool registers the device before the first cycle runs
        std::fs::write(
            &fixture.registry.unknown_path,
            "DeviceIdentifier,DisplayName\n11:22:33:44:55:66,Triaged\n",
        )
        .unwrap();

        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.new_unknowns, 0);
        assert_eq!(fixture.unknown_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_known_registry_reload_policy() {
        let mut fixture = Fixture::new();
        fixture.registry.known_reload_cycles = 2;
        let mut scanner = MockScanner::new();
        for _ in 0..3 {
            scanner.push_batch(vec![DiscoveredDevice::new("aa:aa:aa:aa:aa:aa", -50)]);
        }
        let (mut monitor, _) = fixture.monitor(scanner, Events::default());

        std::fs::write(&fixture.registry.known_path, "AA:AA:AA:AA:AA:AA,Drone\n").unwrap();

        // Cycle 1 and 2 use the start-up snapshot, cycle 3 reloads
        assert_eq!(monitor.run_cycle().await.unwrap().known, 0);
        assert_eq!(monitor.run_cycle().await.unwrap().known, 0);
        assert_eq!(monitor.run_cycle().await.unwrap().known, 1);
        assert_eq!(monitor.known().len(), 1);
    }

    #[tokio::test]
    async fn test_known_registry_loaded_once_by_default() {
        let fixture = Fixture::new();
        let mut scanner = MockScanner::new();
        for _ in 0..3 {
            scanner.push_batch(vec![DiscoveredDevice::new("aa:aa:aa:aa:aa:aa", -50)]);
        }
        let (mut monitor, _) = fixture.monitor(scanner, Events::default());
        std::fs::write(&fixture.registry.known_path, "AA:AA:AA:AA:AA:AA,Drone\n").unwrap();

        for _ in 0..3 {
            assert_eq!(monitor.run_cycle().await.unwrap().known, 0);
        }
    }

    #[tokio::test]
    async fn test_cycle_summary_notification() {
        let fixture = Fixture::new();
        let events = Events {
            on_known: false,
            on_new_unknown: false,
            on_cycle: true,
        };
        let (mut monitor, messages) = fixture.monitor(MockScanner::new(), events);

        let report = monitor.run_cycle().await.unwrap();
        assert_eq!(report.observed, 0);

        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("[test] Cycle 1 at "));
        assert!(messages[0].ends_with(": 0 devices, 0 known, 0 new unknown"));
    }
}
