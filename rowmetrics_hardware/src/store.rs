//! `SessionStore` adapters.
//!
//! The real NVS key-value store is out of scope; these are
//! concrete stand-ins so a binary has something to persist to.
//! [`FileSessionStore`] lays the three keys (`count`, `s{slot}`, `d{slot}`)
//! out as files under a base directory, one file per key, matching the
//! granularity NVS would give a real driver. [`InMemorySessionStore`] is the
//! same contract over a `Mutex<HashMap>`, for tests and for `rowmetrics_cli`
//! runs with no writable storage.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rowmetrics_traits::SessionStore;

use crate::error::HwError;

/// Lays out `sessions/count`, `sessions/s{slot}`, `sessions/d{slot}` under a
/// base directory, one flat file per key.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HwError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn count_path(&self) -> PathBuf {
        self.dir.join("count")
    }

    fn record_path(&self, slot: u32) -> PathBuf {
        self.dir.join(format!("s{slot}"))
    }

    fn samples_path(&self, slot: u32) -> PathBuf {
        self.dir.join(format!("d{slot}"))
    }

    fn read_count(&self) -> Result<u32, HwError> {
        match fs::read(self.count_path()) {
            Ok(bytes) => {
                let arr: [u8; 4] = bytes
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or_else(|| HwError::Store("corrupt count key".into()))?;
                Ok(u32::from_le_bytes(arr))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), HwError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    type Error = HwError;

    fn next_id(&self) -> Result<u32, HwError> {
        let next = self.read_count()? + 1;
        self.write_atomic(&self.count_path(), &next.to_le_bytes())?;
        Ok(next)
    }

    fn save_record(&self, slot: u32, bytes: &[u8]) -> Result<(), HwError> {
        self.write_atomic(&self.record_path(slot), bytes)
    }

    fn load_record(&self, slot: u32) -> Result<Option<Vec<u8>>, HwError> {
        match fs::read(self.record_path(slot)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_samples(&self, slot: u32, bytes: &[u8]) -> Result<(), HwError> {
        self.write_atomic(&self.samples_path(slot), bytes)
    }

    fn load_samples(&self, slot: u32) -> Result<Option<Vec<u8>>, HwError> {
        match fs::read(self.samples_path(slot)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, slot: u32) -> Result<(), HwError> {
        for path in [self.record_path(slot), self.samples_path(slot)] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Same `sessions/` contract as [`FileSessionStore`], kept entirely in
/// memory. Used by tests and by a `rowmetrics_cli` run with no configured
/// data directory.
#[derive(Default)]
pub struct InMemorySessionStore {
    count: Mutex<u32>,
    records: Mutex<HashMap<u32, Vec<u8>>>,
    samples: Mutex<HashMap<u32, Vec<u8>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    type Error = HwError;

    fn next_id(&self) -> Result<u32, HwError> {
        let mut count = self
            .count
            .lock()
            .map_err(|_| HwError::Store("count mutex poisoned".into()))?;
        *count += 1;
        Ok(*count)
    }

    fn save_record(&self, slot: u32, bytes: &[u8]) -> Result<(), HwError> {
        self.records
            .lock()
            .map_err(|_| HwError::Store("records mutex poisoned".into()))?
            .insert(slot, bytes.to_vec());
        Ok(())
    }

    fn load_record(&self, slot: u32) -> Result<Option<Vec<u8>>, HwError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| HwError::Store("records mutex poisoned".into()))?
            .get(&slot)
            .cloned())
    }

    fn save_samples(&self, slot: u32, bytes: &[u8]) -> Result<(), HwError> {
        self.samples
            .lock()
            .map_err(|_| HwError::Store("samples mutex poisoned".into()))?
            .insert(slot, bytes.to_vec());
        Ok(())
    }

    fn load_samples(&self, slot: u32) -> Result<Option<Vec<u8>>, HwError> {
        Ok(self
            .samples
            .lock()
            .map_err(|_| HwError::Store("samples mutex poisoned".into()))?
            .get(&slot)
            .cloned())
    }

    fn delete(&self, slot: u32) -> Result<(), HwError> {
        self.records
            .lock()
            .map_err(|_| HwError::Store("records mutex poisoned".into()))?
            .remove(&slot);
        self.samples
            .lock()
            .map_err(|_| HwError::Store("samples mutex poisoned".into()))?
            .remove(&slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrips_record_and_samples() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions")).unwrap();
        let id = store.next_id().unwrap();
        assert_eq!(id, 1);
        store.save_record(id, b"record-bytes").unwrap();
        store.save_samples(id, b"sample-bytes").unwrap();
        assert_eq!(store.load_record(id).unwrap().unwrap(), b"record-bytes");
        assert_eq!(store.load_samples(id).unwrap().unwrap(), b"sample-bytes");
    }

    #[test]
    fn file_store_next_id_is_monotone_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::new(dir.path()).unwrap();
            assert_eq!(store.next_id().unwrap(), 1);
            assert_eq!(store.next_id().unwrap(), 2);
        }
        let reopened = FileSessionStore::new(dir.path()).unwrap();
        assert_eq!(reopened.next_id().unwrap(), 3);
    }

    #[test]
    fn file_store_delete_erases_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        let id = store.next_id().unwrap();
        store.save_record(id, b"r").unwrap();
        store.save_samples(id, b"d").unwrap();
        store.delete(id).unwrap();
        assert!(store.load_record(id).unwrap().is_none());
        assert!(store.load_samples(id).unwrap().is_none());
    }

    #[test]
    fn missing_record_is_ok_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.load_record(99).unwrap().is_none());
    }

    #[test]
    fn in_memory_store_roundtrips() {
        let store = InMemorySessionStore::new();
        let id = store.next_id().unwrap();
        store.save_record(id, b"r").unwrap();
        store.save_samples(id, b"d").unwrap();
        assert_eq!(store.load_record(id).unwrap().unwrap(), b"r");
        store.delete(id).unwrap();
        assert!(store.load_record(id).unwrap().is_none());
    }
}
