//! Filesystem and in-memory `SheetStore` backends.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::spec::{C_FILE_EXTENSION_XLSX, SheetStore, StoreError};
use crate::util::validate_sheet_file_name;

////////////////////////////////////////////////////////////////////////////////
// #region FsSheetStore

/// Workbooks stored as files directly under one root directory.
#[derive(Debug, Clone)]
pub struct FsSheetStore {
    path_dir_root: PathBuf,
}

impl FsSheetStore {
    /// Store rooted at `path_dir_root`. The directory is created on first save.
    pub fn new(path_dir_root: impl Into<PathBuf>) -> Self {
        Self {
            path_dir_root: path_dir_root.into(),
        }
    }

    /// Directory holding the workbooks.
    pub fn root(&self) -> &Path {
        &self.path_dir_root
    }

    /// Absolute-or-relative path of the workbook `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_sheet_file_name(name)?;
        Ok(self.path_dir_root.join(name))
    }

    /// Sorted `.xlsx` file names in the root. A missing root lists nothing.
    pub fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let c_root = self.path_dir_root.display().to_string();
        let entries = match fs::read_dir(&self.path_dir_root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&c_root, err)),
        };

        let mut l_names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&c_root, e))?;
            let file_type = entry.file_type().map_err(|e| StoreError::io(&c_root, e))?;
            if !file_type.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(C_FILE_EXTENSION_XLSX) && !name.starts_with('.') {
                l_names.push(name);
            }
        }
        l_names.sort();
        Ok(l_names)
    }

    fn write_atomic(&self, name: &str, path_dst: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.path_dir_root)?;
        let path_tmp = self.path_dir_root.join(format!(".{name}.tmp"));
        let result = (|| {
            let mut file = fs::File::create(&path_tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&path_tmp, path_dst)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&path_tmp);
        }
        result
    }
}

impl SheetStore for FsSheetStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_of(name)?;
        match fs::read(&path) {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded workbook");
                Ok(Some(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "workbook not found");
                Ok(None)
            }
            Err(err) => Err(StoreError::io(name, err)),
        }
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_of(name)?;
        self.write_atomic(name, &path, bytes)
            .map_err(|e| StoreError::io(name, e))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved workbook");
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemorySheetStore

/// Workbooks kept in process memory, keyed by name.
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    dict_bytes: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.dict_bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SheetStore for MemorySheetStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_sheet_file_name(name)?;
        Ok(self.lock().get(name).cloned())
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_sheet_file_name(name)?;
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
