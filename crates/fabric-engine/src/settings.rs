// Deployment settings
//
// TOML-backed key/value store handed to resource-type hooks through
// `HookCtx`. Hooks look up site-specific knobs (image names, network
// prefixes, credential paths) by dotted key; absent keys fall back to
// the caller-supplied default.

use std::path::Path;

use fabric_error::{EngineError, EngineResult};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: toml::Table,
}

impl Settings {
    pub fn from_str(text: &str) -> EngineResult<Self> {
        let root = text
            .parse::<toml::Table>()
            .map_err(|e| EngineError::Settings(e.to_string()))?;
        Ok(Settings { root })
    }

    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Settings(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded settings");
        Self::from_str(&text)
    }

    /// Dotted-key lookup into nested tables
    fn lookup(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.lookup(key).and_then(|v| v.as_str())
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.lookup(key).and_then(|v| v.as_integer())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.lookup(key).and_then(|v| v.as_bool())
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }
}
