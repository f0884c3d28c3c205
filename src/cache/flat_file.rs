//! Flat-file cache backend
//!
//! One file per resource under a single cache directory. The file name is the
//! escaped resource key, the contents are the raw payload text, and freshness
//! comes from the file's modification time.
//!
//! Writes go to a dot-prefixed temporary file in the same directory and are
//! renamed into place, so readers observe either the old payload or the new
//! one. Escaped keys never start with a dot, so temporary files cannot shadow
//! an entry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::key_escape::{escape_key, unescape_key};
use super::DataCache;
use crate::constants::cache_layout::{TEMP_FILE_PREFIX, TEMP_FILE_SUFFIX};
use crate::error::{CacheError, CacheResult};
use crate::requests::ResourceId;

/// Cache persisted as plain files in one directory
#[derive(Debug)]
pub struct FlatFileCache {
    cache_dir: PathBuf,
}

impl FlatFileCache {
    /// The directory is created on first write if it does not exist
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Location of the file backing `key`
    pub fn entry_path(&self, key: &ResourceId) -> PathBuf {
        self.cache_dir.join(escape_key(key.as_str()))
    }

    /// Unique per call, across instances and processes sharing the directory
    fn temp_path(&self) -> PathBuf {
        self.cache_dir.join(format!(
            "{TEMP_FILE_PREFIX}{}{TEMP_FILE_SUFFIX}",
            Uuid::new_v4().simple()
        ))
    }

    fn ensure_cache_dir(&self, key: &ResourceId) -> CacheResult<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            CacheError::not_accessible(
                key.as_str(),
                format!("cannot create {}: {e}", self.cache_dir.display()),
            )
        })
    }

    fn write_temp_file(path: &Path, payload: &str) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(payload.as_bytes())?;
        file.sync_all()
    }

    /// Keys currently stored, decoded from file names
    pub fn keys(&self) -> CacheResult<Vec<ResourceId>> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::not_accessible(
                    self.cache_dir.display().to_string(),
                    e.to_string(),
                ))
            }
        };

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(unescape_key) {
                keys.push(ResourceId::new(key));
            }
        }
        Ok(keys)
    }
}

impl DataCache for FlatFileCache {
    fn name(&self) -> &'static str {
        "flat_file"
    }

    fn contains_item(&self, key: &ResourceId) -> bool {
        self.entry_path(key).is_file()
    }

    fn last_modified(&self, key: &ResourceId) -> CacheResult<SystemTime> {
        let metadata = match fs::metadata(self.entry_path(key)) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(CacheError::not_found(key.as_str())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::not_found(key.as_str()))
            }
            Err(e) => return Err(CacheError::not_accessible(key.as_str(), e.to_string())),
        };

        metadata
            .modified()
            .map_err(|e| CacheError::not_accessible(key.as_str(), e.to_string()))
    }

    fn read_sync(&self, key: &ResourceId) -> CacheResult<Option<String>> {
        let path = self.entry_path(key);
        debug!(resource_id = %key, path = %path.display(), "Reading cache entry");

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(CacheError::not_accessible(key.as_str(), e.to_string()))
            }
            Err(e) => return Err(CacheError::corrupt_or_unreadable(key.as_str(), e.to_string())),
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| CacheError::corrupt_or_unreadable(key.as_str(), e.to_string()))
    }

    fn write_sync(&self, key: &ResourceId, payload: &str) -> CacheResult<()> {
        self.ensure_cache_dir(key)?;

        let target = self.entry_path(key);
        let temp = self.temp_path();
        debug!(
            resource_id = %key,
            path = %target.display(),
            bytes = payload.len(),
            "Writing cache entry"
        );

        if let Err(e) = Self::write_temp_file(&temp, payload) {
            let _ = fs::remove_file(&temp);
            return Err(match e.kind() {
                io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound => {
                    CacheError::not_accessible(key.as_str(), e.to_string())
                }
                _ => CacheError::write_failed(key.as_str(), e.to_string()),
            });
        }

        if let Err(e) = fs::rename(&temp, &target) {
            warn!(resource_id = %key, error = %e, "Failed to publish cache entry");
            let _ = fs::remove_file(&temp);
            return Err(CacheError::write_failed(key.as_str(), e.to_string()));
        }

        Ok(())
    }

    fn remove_sync(&self, key: &ResourceId) -> CacheResult<bool> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::not_accessible(key.as_str(), e.to_string())),
        }
    }
}
