use crate::storage::format::{LoadedStore, StoreFile, StoreShape};
use crate::storage::{RecordStore, StorageError, StorageResult};
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads a store file in either shape and reports how it was read
///
/// # Returns
///
/// * `Ok(LoadedStore)` - The coerced store plus its on-disk shape
/// * `Err(StorageError::EmptyStore)` - No file exists at `path`
/// * `Err(StorageError)` - The file exists but could not be read or parsed
pub fn read_store(path: &Path) -> StorageResult<LoadedStore> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::EmptyStore(path.to_path_buf()));
        }
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let parsed: StoreFile =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StorageError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let loaded = parsed.into_store(Utc::now());
    if loaded.shape == StoreShape::Legacy {
        tracing::info!(
            "Converted {} legacy entries from {}",
            loaded.store.len(),
            path.display()
        );
    }
    Ok(loaded)
}

/// Loads a record store
///
/// A missing file is reported as the recoverable
/// [`StorageError::EmptyStore`]; see [`load_or_default`].
pub fn load(path: &Path) -> StorageResult<RecordStore> {
    read_store(path).map(|loaded| loaded.store)
}

/// Loads a record store, starting empty when no file exists yet
pub fn load_or_default(path: &Path) -> StorageResult<RecordStore> {
    match load(path) {
        Err(StorageError::EmptyStore(_)) => {
            tracing::info!("No existing data at {}, starting fresh", path.display());
            Ok(RecordStore::new())
        }
        other => other,
    }
}

/// Path of the scratch file a save writes before renaming
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("records"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the store in the current shape, atomically
///
/// The JSON goes to a sibling temporary file which is flushed to disk and
/// then renamed over `path`. A crash at any point leaves either the old
/// file or the new one, never a partial write.
pub fn save(path: &Path, store: &RecordStore) -> StorageResult<()> {
    let temp_file = temp_path(path);

    let result = write_json(&temp_file, store).and_then(|()| {
        fs::rename(&temp_file, path).map_err(|source| StorageError::Persistence {
            path: path.to_path_buf(),
            source,
        })
    });

    if result.is_err() && temp_file.exists() {
        let _ = fs::remove_file(&temp_file);
    }

    if result.is_ok() {
        tracing::debug!("Saved {} records to {}", store.len(), path.display());
    }
    result
}

fn write_json(path: &Path, store: &RecordStore) -> StorageResult<()> {
    let persistence = |source| StorageError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(persistence)?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, store.as_map()).map_err(|e| {
        StorageError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    writer.write_all(b"\n").map_err(persistence)?;

    let file = writer
        .into_inner()
        .map_err(|e| persistence(e.into_error()))?;
    file.sync_all().map_err(persistence)?;
    Ok(())
}

/// Checks that a store can be written at `path`
///
/// Creates and removes the temporary file a save would use, so a bad output
/// path is reported before any crawling happens.
pub fn check_writable(path: &Path) -> StorageResult<()> {
    let temp_file = temp_path(path);
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_file)
        .map_err(|source| StorageError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
    let _ = fs::remove_file(&temp_file);
    Ok(())
}

/// What a migration did
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Shape the input was read in
    pub shape: StoreShape,

    /// Records written (or that would have been written)
    pub entries: usize,

    /// Legacy rows dropped as malformed
    pub skipped: usize,

    /// False when the input was already current and migrated in place
    pub written: bool,
}

/// Rewrites a store file in the current shape
///
/// # Arguments
///
/// * `input` - File to read, in either shape
/// * `output` - Destination; the input is rewritten in place when equal
///
/// # Returns
///
/// * `Ok(MigrationReport)` - Migration summary
/// * `Err(StorageError)` - The input is missing or invalid, or the write failed
pub fn migrate(input: &Path, output: &Path) -> StorageResult<MigrationReport> {
    let loaded = read_store(input)?;

    let in_place = input == output;
    let written = !(in_place && loaded.shape == StoreShape::Current);
    if written {
        save(output, &loaded.store)?;
    } else {
        tracing::info!("{} is already in the current format", input.display());
    }

    Ok(MigrationReport {
        shape: loaded.shape,
        entries: loaded.store.len(),
        skipped: loaded.skipped,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PageRecord;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_store() -> RecordStore {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap();
        let mut store = RecordStore::new();
        store.merge(PageRecord::new("example.com", "Home", t1));
        store.merge(PageRecord::new("example.com/docs", "Docs – ü", t1));
        store.merge(PageRecord::new("example.com", "Home v2", t2));
        store
    }

    #[test]
    fn test_load_missing_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StorageError::EmptyStore(_)));
        assert!(err.is_recoverable());

        assert!(load_or_default(&path).unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let store = sample_store();

        save(&path, &store).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded, store);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_saved_file_is_keyed_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        save(&path, &sample_store()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let object = raw.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["example.com"]["title"], "Home v2");
        assert_eq!(
            object["example.com"]["first_crawled"],
            "2024-01-01T10:00:00.000000Z"
        );
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "[]").unwrap();

        save(&path, &sample_store()).unwrap();
        assert_eq!(load(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_save_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no/such/dir/data.json");

        let err = save(&path, &sample_store()).unwrap_err();
        assert!(matches!(err, StorageError::Persistence { .. }));
        assert!(check_writable(&path).is_err());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_or_default(&path).unwrap_err();
        assert!(matches!(err, StorageError::Serialization { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_migrate_legacy_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"[["example.com", "Home"], ["example.com/a", "A"], ["bad"]]"#).unwrap();

        let report = migrate(&path, &path).unwrap();
        assert_eq!(report.shape, StoreShape::Legacy);
        assert_eq!(report.entries, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.written);

        let reread = read_store(&path).unwrap();
        assert_eq!(reread.shape, StoreShape::Current);
        let record = reread.store.get("example.com/a").unwrap();
        assert_eq!(record.title, "A");
        assert_eq!(record.first_crawled, record.last_crawled);
    }

    #[test]
    fn test_migrate_current_in_place_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        save(&path, &sample_store()).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let report = migrate(&path, &path).unwrap();
        assert!(!report.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_migrate_to_new_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("old.json");
        let output = dir.path().join("new.json");
        fs::write(&input, r#"[["example.com", "Home"]]"#).unwrap();

        let report = migrate(&input, &output).unwrap();
        assert!(report.written);
        assert_eq!(load(&output).unwrap().len(), 1);
        // Input is left untouched
        assert!(fs::read_to_string(&input).unwrap().starts_with('['));
    }
}
