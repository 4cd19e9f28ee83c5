use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DumpError, Result};
use crate::progress::DumpProgress;
use crate::provider::file_stem_for;

/// Persistence for progress records. A save must be all-or-nothing per dialog.
pub trait ProgressStore {
    /// Load the record for `dialog_id`, or the empty record if none exists
    fn load(&mut self, dialog_id: &str) -> Result<DumpProgress>;

    fn save(&mut self, dialog_id: &str, progress: &DumpProgress) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryProgressStore {
    records: BTreeMap<String, DumpProgress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dialog_id: &str) -> Option<&DumpProgress> {
        self.records.get(dialog_id)
    }

    pub fn insert(&mut self, dialog_id: impl Into<String>, progress: DumpProgress) {
        self.records.insert(dialog_id.into(), progress);
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&mut self, dialog_id: &str) -> Result<DumpProgress> {
        Ok(self.records.get(dialog_id).cloned().unwrap_or_default())
    }

    fn save(&mut self, dialog_id: &str, progress: &DumpProgress) -> Result<()> {
        self.records.insert(dialog_id.to_string(), progress.clone());
        Ok(())
    }
}

/// On-disk record: the progress plus the dialog id it belongs to, so that
/// listing does not depend on reversing the file name mapping.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoredProgress {
    dialog_id: String,
    #[serde(flatten)]
    progress: DumpProgress,
}

/// File-backed store: one JSON file per dialog under `<dir>/progress/`.
///
/// Records are written to a temp file, synced and renamed into place, so a
/// crash leaves either the old or the new record. A lock file guards the
/// directory against concurrent sessions for as long as the store is alive.
pub struct JsonProgressStore {
    dir: PathBuf,
    lock_path: PathBuf,
    lock_file: Option<File>,
}

impl JsonProgressStore {
    pub fn open(state_dir: &Path) -> Result<Self> {
        let dir = state_dir.join("progress");
        fs::create_dir_all(&dir)
            .map_err(|err| DumpError::store(&dir, format!("failed to create directory: {err}")))?;
        Ok(Self {
            lock_path: state_dir.join("progress.lock"),
            dir,
            lock_file: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take the session lock. Fails if another session holds it.
    pub fn acquire_lock(&mut self) -> Result<()> {
        if self.lock_file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .map_err(|err| {
                DumpError::store(
                    &self.lock_path,
                    format!("failed to acquire progress lock (is another backup running?): {err}"),
                )
            })?;
        self.lock_file = Some(file);
        Ok(())
    }

    fn record_path(&self, dialog_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem_for(dialog_id)))
    }

    /// Every stored record, sorted by dialog id
    pub fn list(&self) -> Result<Vec<(String, DumpProgress)>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| DumpError::store(&self.dir, format!("failed to list records: {err}")))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let stored = read_record(&path)?;
            records.push((stored.dialog_id, stored.progress));
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    /// Forget a dialog's progress. Returns whether a record existed.
    pub fn remove(&mut self, dialog_id: &str) -> Result<bool> {
        let path = self.record_path(dialog_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(DumpError::store(&path, format!("failed to remove record: {err}"))),
        }
    }
}

fn read_record(path: &Path) -> Result<StoredProgress> {
    let data = fs::read_to_string(path)
        .map_err(|err| DumpError::store(path, format!("failed to read record: {err}")))?;
    serde_json::from_str(&data)
        .map_err(|err| DumpError::store(path, format!("failed to parse record: {err}")))
}

impl ProgressStore for JsonProgressStore {
    fn load(&mut self, dialog_id: &str) -> Result<DumpProgress> {
        let path = self.record_path(dialog_id);
        if !path.exists() {
            return Ok(DumpProgress::default());
        }
        let stored = read_record(&path)?;
        if stored.dialog_id != dialog_id {
            return Err(DumpError::store(
                &path,
                format!(
                    "record belongs to dialog '{}', not '{dialog_id}'",
                    stored.dialog_id
                ),
            ));
        }
        Ok(stored.progress)
    }

    fn save(&mut self, dialog_id: &str, progress: &DumpProgress) -> Result<()> {
        let path = self.record_path(dialog_id);
        let tmp_path = path.with_extension("json.tmp");
        let stored = StoredProgress {
            dialog_id: dialog_id.to_string(),
            progress: progress.clone(),
        };
        let data = serde_json::to_vec_pretty(&stored)
            .map_err(|err| DumpError::json(format!("progress for '{dialog_id}'"), err))?;
        {
            let mut file = File::create(&tmp_path).map_err(|err| {
                DumpError::store(&tmp_path, format!("failed to write temp record: {err}"))
            })?;
            file.write_all(&data)?;
            file.sync_all()
                .map_err(|err| DumpError::store(&tmp_path, format!("failed to sync: {err}")))?;
        }

        fs::rename(&tmp_path, &path)
            .map_err(|err| DumpError::store(&path, format!("failed to replace record: {err}")))?;
        debug!(dialog_id, last_id = ?progress.last_id, "saved progress");
        Ok(())
    }
}

impl Drop for JsonProgressStore {
    fn drop(&mut self) {
        if let Some(lock) = self.lock_file.take() {
            drop(lock);
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
