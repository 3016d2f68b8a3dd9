//! Flat-file record storage.
//!
//! Layout under the data directory:
//!
//! ```text
//! scenarios/<save>/<module>.txt               converged record
//! scenarios/<save>/<module>_users/<user>.txt  per-user snapshot
//! ```
//!
//! Writes go to a temp file first and are renamed into place, so readers
//! never see a half-written record.

use crate::error::{Error, Result};
use concord_format::decode_lossy;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "txt";
const USERS_SUFFIX: &str = "_users";

/// Address of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey<'a> {
    pub save: &'a str,
    pub module: &'a str,
    pub user: Option<&'a str>,
}

impl<'a> RecordKey<'a> {
    /// Converged record of a module.
    pub fn module(save: &'a str, module: &'a str) -> Self {
        Self {
            save,
            module,
            user: None,
        }
    }

    /// One user's snapshot of a module.
    pub fn user(save: &'a str, module: &'a str, user: &'a str) -> Self {
        Self {
            save,
            module,
            user: Some(user),
        }
    }
}

/// Durable text records.
pub trait RecordStore: Send + Sync {
    /// Record text, or `None` if nothing is stored.
    fn read(&self, key: &RecordKey<'_>) -> Result<Option<String>>;

    /// Replace a record.
    fn write(&self, key: &RecordKey<'_>, text: &str) -> Result<()>;

    /// Users with a snapshot of `module`, sorted.
    fn users(&self, save: &str, module: &str) -> Result<Vec<String>>;

    /// Converged record file names of a save (`<module>.txt`), sorted.
    fn records(&self, save: &str) -> Result<Vec<String>>;
}

/// Keep `[A-Za-z0-9_.-]`. Segments that would be empty or all dots become `_`.
pub fn sanitize_segment(segment: &str) -> String {
    let clean: String = segment
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    if clean.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        clean
    }
}

/// [`RecordStore`] over plain files.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open or create storage under `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let root = data_dir.as_ref().join("scenarios");
        if root.exists() && !root.is_dir() {
            return Err(Error::Storage(format!("{} is not a directory", root.display())));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn save_dir(&self, save: &str) -> PathBuf {
        self.root.join(sanitize_segment(save))
    }

    fn users_dir(&self, save: &str, module: &str) -> PathBuf {
        self.save_dir(save)
            .join(format!("{}{}", sanitize_segment(module), USERS_SUFFIX))
    }

    fn path(&self, key: &RecordKey<'_>) -> PathBuf {
        match key.user {
            None => self
                .save_dir(key.save)
                .join(format!("{}.{}", sanitize_segment(key.module), EXTENSION)),
            Some(user) => self
                .users_dir(key.save, key.module)
                .join(format!("{}.{}", sanitize_segment(user), EXTENSION)),
        }
    }
}

/// Stems or names of `*.txt` files in `dir`, sorted. A missing dir is empty.
fn list_txt(dir: &Path, keep_extension: bool) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let name = if keep_extension {
            path.file_name()
        } else {
            path.file_stem()
        };
        if let Some(name) = name.and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

impl RecordStore for FileStore {
    fn read(&self, key: &RecordKey<'_>) -> Result<Option<String>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(decode_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &RecordKey<'_>, text: &str) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("txt.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn users(&self, save: &str, module: &str) -> Result<Vec<String>> {
        list_txt(&self.users_dir(save, module), false)
    }

    fn records(&self, save: &str) -> Result<Vec<String>> {
        list_txt(&self.save_dir(save), true)
    }
}
