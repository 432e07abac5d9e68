//! Persisted peripheral identifiers.
//!
//! Only the platform identifiers of stored peripherals survive a restart.
//! Every add or remove is followed by a synchronous [`IdentifierStore::save`].

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;

/// Load/save a list of peripheral identifiers.
#[cfg_attr(test, mockall::automock)]
pub trait IdentifierStore: Send + Sync {
    /// Load the persisted identifiers.
    fn load(&self) -> Result<Vec<Uuid>>;

    /// Replace the persisted identifiers.
    fn save(&self, identifiers: &[Uuid]) -> Result<()>;
}

/// In-memory store, used when nothing should outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identifiers: Mutex<Vec<Uuid>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    /// Create a store pre-populated with `identifiers`.
    pub fn with_identifiers(identifiers: Vec<Uuid>) -> Self {
        Self {
            identifiers: Mutex::new(identifiers),
            saves: Mutex::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Current contents.
    pub fn identifiers(&self) -> Vec<Uuid> {
        self.identifiers.lock().clone()
    }
}

impl IdentifierStore for MemoryStore {
    fn load(&self) -> Result<Vec<Uuid>> {
        Ok(self.identifiers.lock().clone())
    }

    fn save(&self, identifiers: &[Uuid]) -> Result<()> {
        *self.identifiers.lock() = identifiers.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

impl<S: IdentifierStore + ?Sized> IdentifierStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Vec<Uuid>> {
        (**self).load()
    }

    fn save(&self, identifiers: &[Uuid]) -> Result<()> {
        (**self).save(identifiers)
    }
}

#[cfg(feature = "json-store")]
pub use json::JsonFileStore;

#[cfg(feature = "json-store")]
mod json {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use tracing::debug;
    use uuid::Uuid;

    use super::IdentifierStore;
    use crate::error::Result;

    /// Stores identifiers as a JSON array in a file.
    ///
    /// Writes go to a sibling temporary file that is renamed over the
    /// target, so a crash never leaves a half-written list.
    #[derive(Debug, Clone)]
    pub struct JsonFileStore {
        path: PathBuf,
    }

    impl JsonFileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut name = self.path.file_name().unwrap_or_default().to_os_string();
            name.push(".tmp");
            self.path.with_file_name(name)
        }
    }

    impl IdentifierStore for JsonFileStore {
        fn load(&self) -> Result<Vec<Uuid>> {
            match fs::read_to_string(&self.path) {
                Ok(data) => Ok(serde_json::from_str(&data)?),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("No identifier store at {}", self.path.display());
                    Ok(Vec::new())
                }
                Err(e) => Err(e.into()),
            }
        }

        fn save(&self, identifiers: &[Uuid]) -> Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_string_pretty(identifiers)?;
            let temp = self.temp_path();
            fs::write(&temp, data)?;
            fs::rename(&temp, &self.path)?;
            debug!(
                "Saved {} identifiers to {}",
                identifiers.len(),
                self.path.display()
            );
            Ok(())
        }
    }

}
