use std::collections::HashSet;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;

use super::StoreError;
use crate::device::DeviceId;

/// Header row of the unknown registry file.
pub const HEADER: [&str; 2] = ["DeviceIdentifier", "DisplayName"];

/// Deduplicated, append-only registry of devices seen without a known tag.
///
/// The in-memory set mirrors the identifiers persisted in the backing file. Every successful
/// [`record_if_new`](Self::record_if_new) appends exactly one row and inserts into the set, so
/// the two never diverge within a process.
#[derive(Debug)]
pub struct UnknownRegistry {
    path: PathBuf,
    ids: HashSet<DeviceId>,
}

impl UnknownRegistry {
    /// Create the backing file with its header row if it is missing or empty.
    pub fn ensure_exists(path: impl AsRef<Path>) -> super::Result<()> {
        let path = path.as_ref();
        let writer = super::open_writer(path, &HEADER)?;
        super::finish(path, writer)
    }

    /// Read the set of identifiers persisted at `path`.
    ///
    /// Pure read: a missing file is an empty set and is not created. The header row and rows
    /// with a blank first column are ignored; columns after the first are not inspected.
    pub fn load(path: impl AsRef<Path>) -> super::Result<HashSet<DeviceId>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(StoreError::Io(path.to_path_buf(), e)),
        };

        let mut ids = HashSet::new();
        for (idx, record) in super::lenient_reader(file).records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(StoreError::Csv(path.to_path_buf(), e)),
                Err(e) => {
                    debug!("Skipping unreadable unknown device row {}: {}", idx + 1, e);
                    continue;
                }
            };

            let Some(first) = record.get(0) else {
                continue;
            };
            if first.is_empty() || first.eq_ignore_ascii_case(HEADER[0]) {
                continue;
            }
            ids.insert(DeviceId::new(first));
        }

        Ok(ids)
    }

    /// Initialize the backing file and load its contents.
    pub fn open(path: impl Into<PathBuf>) -> super::Result<Self> {
        let path = path.into();
        Self::ensure_exists(&path)?;
        let ids = Self::load(&path)?;
        info!(
            "Loaded {} unknown devices from {}",
            ids.len(),
            path.display()
        );
        Ok(Self { path, ids })
    }

    /// Re-read the backing file, picking up edits made by other tools between cycles.
    pub fn refresh(&mut self) -> super::Result<()> {
        self.ids = Self::load(&self.path)?;
        Ok(())
    }

    /// Append `id` unless it is already registered.
    ///
    /// Returns `true` if a row was written. The header row is written first if the file is
    /// missing or empty.
    pub fn record_if_new(&mut self, id: &DeviceId, name: &str) -> super::Result<bool> {
        if self.ids.contains(id) {
            return Ok(false);
        }

        let mut writer = super::open_writer(&self.path, &HEADER)?;
        writer
            .write_record([id.as_str(), name])
            .map_err(|e| StoreError::Csv(self.path.clone(), e))?;
        super::finish(&self.path, writer)?;

        self.ids.insert(id.clone());
        debug!("Registered new unknown device {} ({})", id, name);
        Ok(true)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_load_missing_file_has_no_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");

        let ids = UnknownRegistry::load(&path).unwrap();
        assert!(ids.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");

        let registry = UnknownRegistry::open(&path).unwrap();
        assert!(registry.is_empty());
        assert_eq!(read(&path), "DeviceIdentifier,DisplayName\n");

        // Opening again must not duplicate the header
        UnknownRegistry::open(&path).unwrap();
        assert_eq!(read(&path), "DeviceIdentifier,DisplayName\n");
    }

    #[test]
    fn test_record_if_new_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let mut registry = UnknownRegistry::open(&path).unwrap();

        let id = DeviceId::new("aa:bb:cc:dd:ee:ff");
        assert!(registry.record_if_new(&id, "Tracker").unwrap());
        assert!(!registry
            .record_if_new(&DeviceId::new("AA:BB:CC:DD:EE:FF"), "Tracker")
            .unwrap());

        assert_eq!(
            read(&path),
            "DeviceIdentifier,DisplayName\nAA:BB:CC:DD:EE:FF,Tracker\n"
        );
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_record_if_new_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");

        let mut registry = UnknownRegistry::open(&path).unwrap();
        let id = DeviceId::new("AA:BB:CC:DD:EE:FF");
        assert!(registry.record_if_new(&id, "Tracker").unwrap());
        drop(registry);

        let mut registry = UnknownRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.record_if_new(&id, "Tracker").unwrap());
        assert_eq!(read(&path).lines().count(), 2);
    }

    #[test]
    fn test_header_written_before_first_row_when_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let mut registry = UnknownRegistry::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        registry
            .record_if_new(&DeviceId::new("11:22:33:44:55:66"), "Unknown")
            .unwrap();
        assert_eq!(
            read(&path),
            "DeviceIdentifier,DisplayName\n11:22:33:44:55:66,Unknown\n"
        );
    }

    #[test]
    fn test_refresh_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let mut registry = UnknownRegistry::open(&path).unwrap();

        std::fs::write(
            &path,
            "DeviceIdentifier,DisplayName\nde:ad:be:ef:00:01,Beacon,extra\n\n,orphan\n",
        )
        .unwrap();
        registry.refresh().unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&DeviceId::new("DE:AD:BE:EF:00:01")));
    }

    #[test]
    fn test_record_after_edit_without_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown.csv");
        let mut registry = UnknownRegistry::open(&path).unwrap();

        // Saved by an editor that drops the final line break
        std::fs::write(&path, "DeviceIdentifier,DisplayName\nAA:AA:AA:AA:AA:AA,Triaged").unwrap();
        registry.refresh().unwrap();

        let id = DeviceId::new("bb:bb:bb:bb:bb:bb");
        assert!(registry.record_if_new(&id, "Tile").unwrap());
        registry.refresh().unwrap();
        assert!(registry.contains(&id));
        assert!(registry.contains(&DeviceId::new("AA:AA:AA:AA:AA:AA")));
        assert!(!registry.record_if_new(&id, "Tile").unwrap());

        assert_eq!(
            read(&path),
            "DeviceIdentifier,DisplayName\nAA:AA:AA:AA:AA:AA,Triaged\nBB:BB:BB:BB:BB:BB,Tile\n"
        );
    }
}
