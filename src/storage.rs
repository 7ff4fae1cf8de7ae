use crate::error::StorageError;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::warn;

const KEYRING_SERVICE: &str = "com.magio.dashboard";

/// String key-value persistence. Each call is atomic on its own; callers get
/// no read-modify-write guarantees beyond that.
pub trait Storage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStorage {
  values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Storage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let guard = self.values.read().map_err(|_| StorageError::Poisoned)?;
    Ok(guard.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut guard = self.values.write().map_err(|_| StorageError::Poisoned)?;
    guard.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let mut guard = self.values.write().map_err(|_| StorageError::Poisoned)?;
    guard.remove(key);
    Ok(())
  }
}

/// One JSON object on disk, rewritten through a sibling temp file on every
/// mutation.
pub struct FileStorage {
  path: PathBuf,
  lock: Mutex<()>,
}

impl FileStorage {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      lock: Mutex::new(()),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn read_map(&self) -> Result<JsonMap<String, JsonValue>, StorageError> {
    let data = match std::fs::read_to_string(&self.path) {
      Ok(data) => data,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(JsonMap::new()),
      Err(e) => return Err(e.into()),
    };
    if data.trim().is_empty() {
      return Ok(JsonMap::new());
    }
    match serde_json::from_str::<JsonValue>(&data)? {
      JsonValue::Object(map) => Ok(map),
      _ => Ok(JsonMap::new()),
    }
  }

  /// Like `read_map`, but a file that no longer parses is discarded so the
  /// next write replaces it instead of failing forever.
  fn read_map_for_update(&self) -> Result<JsonMap<String, JsonValue>, StorageError> {
    match self.read_map() {
      Err(StorageError::Json(e)) => {
        warn!(path = %self.path.display(), error = %e, "session file is corrupt; starting over");
        Ok(JsonMap::new())
      }
      other => other,
    }
  }

  fn write_map(&self, map: &JsonMap<String, JsonValue>) -> Result<(), StorageError> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let mut tmp = self.path.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    write_private(&tmp, &serde_json::to_vec_pretty(map)?)?;
    std::fs::rename(&tmp, &self.path)?;
    Ok(())
  }
}

impl Storage for FileStorage {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
    let map = self.read_map()?;
    Ok(map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string()))
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
    let mut map = self.read_map_for_update()?;
    map.insert(key.to_string(), JsonValue::String(value.to_string()));
    self.write_map(&map)
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
    let mut map = match self.read_map() {
      Err(StorageError::Json(e)) => {
        warn!(path = %self.path.display(), error = %e, "session file is corrupt; clearing it");
        return self.write_map(&JsonMap::new());
      }
      other => other?,
    };
    if map.remove(key).is_some() {
      self.write_map(&map)?;
    }
    Ok(())
  }
}

/// Tokens live in this file, so it is only readable by the owner.
#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
  use std::io::Write;
  use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

  let mut file = std::fs::OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .mode(0o600)
    .open(path)?;
  // `mode` only applies on creation; a leftover temp file keeps its old bits.
  file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
  file.write_all(data)?;
  file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
  std::fs::write(path, data)
}

/// OS keychain / secret service, one entry per key.
pub struct KeyringStorage {
  service: String,
}

impl KeyringStorage {
  pub fn new() -> Self {
    Self::with_service(KEYRING_SERVICE)
  }

  pub fn with_service(service: impl Into<String>) -> Self {
    Self {
      service: service.into(),
    }
  }

  fn entry(&self, key: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(&self.service, key)
  }

  pub fn is_available(&self) -> bool {
    let Ok(entry) = self.entry(crate::session::KEY_ACCESS_TOKEN) else {
      return false;
    };

    // Reading the real session key proves the store answers; a missing
    // entry is still a working keyring.
    matches!(
      entry.get_password(),
      Ok(_) | Err(keyring::Error::NoEntry | keyring::Error::BadEncoding(_) | keyring::Error::Ambiguous(_))
    )
  }
}

impl Default for KeyringStorage {
  fn default() -> Self {
    Self::new()
  }
}

impl Storage for KeyringStorage {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    match self.entry(key)?.get_password() {
      Ok(value) => Ok(Some(value)),
      Err(keyring::Error::NoEntry) => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.entry(key)?.set_password(value)?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    match self.entry(key)?.delete_credential() {
      Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
