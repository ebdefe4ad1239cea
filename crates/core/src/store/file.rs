//! File-backed store.
//!
//! Each collection lives in its own JSON file under the data directory (see
//! [`crate::constants`]); a missing file reads as an empty collection. Commits rewrite only
//! the files a batch touched and restore the previous contents if any write fails. The
//! audit trail is a JSON-lines file that is only ever appended to.
//!
//! Readers take the store lock shared and writers take it exclusively, so a load never
//! observes a batch half applied. Each file is replaced by writing a sibling temp file and
//! renaming it over the original, so no reader ever sees a truncated file.

use super::{apply_batch, StagedWrites, Store, StoreData};
use crate::constants::{
    AUDIT_FILENAME, BEDS_FILENAME, INFECTIONS_FILENAME, PATIENTS_FILENAME,
    REGULATION_HISTORY_FILENAME, ROOMS_FILENAME, SECTORS_FILENAME,
};
use crate::error::{StoreError, StoreResult};
use crate::normalize::RawCollections;
use chrono::Utc;
use leito_records::{AuditDocument, Collection, Document, RegulationHistoryDocument};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    /// Open (creating if needed) the data directory.
    pub fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(StoreError::DataDirCreation)?;
        Ok(Self {
            data_dir,
            lock: RwLock::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Every audit document appended so far, oldest first.
    pub fn audit_trail(&self) -> StoreResult<Vec<AuditDocument>> {
        let _guard = self.read_guard()?;
        let Some(text) = self.read_file(AUDIT_FILENAME)? else {
            return Ok(Vec::new());
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Collection::parse_document_json(line).map_err(StoreError::from))
            .collect()
    }

    fn read_guard(&self) -> StoreResult<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| StoreError::Poisoned)
    }

    fn write_guard(&self) -> StoreResult<RwLockWriteGuard<'_, ()>> {
        self.lock.write().map_err(|_| StoreError::Poisoned)
    }

    fn path(&self, filename: &str) -> PathBuf {
        self.data_dir.join(filename)
    }

    fn read_file(&self, filename: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path(filename)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::FileRead(err)),
        }
    }

    fn read_collection<T>(&self, filename: &str) -> StoreResult<Vec<T>>
    where
        T: Document + DeserializeOwned,
    {
        match self.read_file(filename)? {
            Some(text) if !text.trim().is_empty() => Ok(Collection::parse_json(&text)?),
            _ => Ok(Vec::new()),
        }
    }

    fn read_data(&self) -> StoreResult<StoreData> {
        Ok(StoreData {
            collections: RawCollections {
                patients: self.read_collection(PATIENTS_FILENAME)?,
                beds: self.read_collection(BEDS_FILENAME)?,
                sectors: self.read_collection(SECTORS_FILENAME)?,
                rooms: self.read_collection(ROOMS_FILENAME)?,
                infections: self.read_collection(INFECTIONS_FILENAME)?,
            },
            regulation_history: self.read_collection(REGULATION_HISTORY_FILENAME)?,
        })
    }

    fn render<T: Document + Serialize>(
        &self,
        filename: &str,
        documents: &[T],
    ) -> StoreResult<PendingFile> {
        Ok(PendingFile {
            path: self.path(filename),
            content: Collection::render_json(documents)?,
        })
    }
}

impl Store for FileStore {
    fn load(&self) -> StoreResult<RawCollections> {
        let _guard = self.read_guard()?;
        Ok(self.read_data()?.collections)
    }

    fn commit(&self, batch: StagedWrites) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.write_guard()?;

        let mut data = self.read_data()?;
        let changes = apply_batch(&mut data, &batch, Utc::now())?;

        let mut files = Vec::new();
        if changes.patients {
            files.push(self.render(PATIENTS_FILENAME, &data.collections.patients)?);
        }
        if changes.beds {
            files.push(self.render(BEDS_FILENAME, &data.collections.beds)?);
        }
        if changes.regulation_history {
            files.push(self.render(REGULATION_HISTORY_FILENAME, &data.regulation_history)?);
        }

        write_files_with_rollback(&files)?;
        tracing::debug!(
            files = files.len(),
            data_dir = %self.data_dir.display(),
            "committed batch"
        );
        Ok(())
    }

    fn append_audit(&self, entries: &[AuditDocument]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.write_guard()?;

        let mut buffer = String::new();
        for entry in entries {
            buffer.push_str(&Collection::render_line(entry)?);
            buffer.push('\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(AUDIT_FILENAME))
            .map_err(StoreError::FileWrite)?;
        file.write_all(buffer.as_bytes())
            .map_err(StoreError::FileWrite)?;
        Ok(())
    }

    fn regulation_history(&self) -> StoreResult<Vec<RegulationHistoryDocument>> {
        let _guard = self.read_guard()?;
        self.read_collection(REGULATION_HISTORY_FILENAME)
    }
}

struct PendingFile {
    path: PathBuf,
    content: String,
}

/// Write every file, restoring earlier contents (or removing new files) if any write fails.
fn write_files_with_rollback(files: &[PendingFile]) -> StoreResult<()> {
    let mut written: Vec<(&Path, Option<String>)> = Vec::new();

    let result: StoreResult<()> = (|| {
        for file in files {
            let old_content = match fs::read_to_string(&file.path) {
                Ok(text) => Some(text),
                Err(err) if err.kind() == ErrorKind::NotFound => None,
                Err(err) => return Err(StoreError::FileRead(err)),
            };
            replace_file(&file.path, &file.content)?;
            written.push((file.path.as_path(), old_content));
        }
        Ok(())
    })();

    if let Err(err) = result {
        for (path, old_content) in written.iter().rev() {
            let restored = match old_content {
                Some(contents) => replace_file(path, contents),
                None => fs::remove_file(path).map_err(StoreError::FileWrite),
            };
            if let Err(restore_err) = restored {
                tracing::warn!(
                    path = %path.display(),
                    error = %restore_err,
                    "failed to roll back store file"
                );
            }
        }
        return Err(err);
    }

    Ok(())
}

/// Write `content` to a sibling temp file and rename it over `path`.
fn replace_file(path: &Path, content: &str) -> StoreResult<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let written = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::FileWrite(err));
    }
    Ok(())
}
