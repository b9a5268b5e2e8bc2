use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Flat key/value configuration provider consulted during bootstrap.
pub trait ConfigSource: Send + Sync {
    /// Value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Short description used in log lines.
    fn name(&self) -> &str;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn name(&self) -> &str {
        "process environment"
    }
}

/// In-memory source, mostly for tests and composition.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut source = MapSource::new("map");
        for (k, v) in iter {
            source.set(k, v);
        }
        source
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A `.env` file, parsed once without touching the process environment.
#[derive(Debug, Clone)]
pub struct DotenvSource {
    path: PathBuf,
    label: String,
    values: HashMap<String, String>,
}

impl DotenvSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let read_err = |source| ConfigError::EnvFile {
            path: path.clone(),
            source,
        };

        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(&path).map_err(read_err)? {
            let (key, value) = item.map_err(read_err)?;
            values.insert(key, value);
        }

        Ok(Self {
            label: path.display().to_string(),
            path,
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for DotenvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn name(&self) -> &str {
        &self.label
    }
}
