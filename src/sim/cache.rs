//! Content-addressed result cache.
//!
//! A cache entry is keyed by a hash of the template version, every resampled
//! boundary series and the simulation window, so a hit only ever returns
//! results computed from identical inputs. Entries are JSON arrays of
//! [`NodeResult`] written atomically through a temp file and rename.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xxhash_rust::xxh3::Xxh3;

use super::types::{NodeResult, NodeResults};
use crate::error::{PipelineError, Result};
use crate::series::{Boundaries, SimulationWindow, TimeSeries};

/// 64-bit cache key, rendered as 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Hashes every input that determines a run's output.
    pub fn derive(
        template_version: u64,
        series: &Boundaries<TimeSeries>,
        window: &SimulationWindow,
    ) -> Self {
        let mut hasher = Xxh3::new();
        hasher.update(&template_version.to_le_bytes());
        for (name, ts) in series.named() {
            hasher.update(name.as_bytes());
            hasher.update(&(ts.len() as u64).to_le_bytes());
            for (t, v) in ts {
                hasher.update(&t.and_utc().timestamp().to_le_bytes());
                hasher.update(&v.to_bits().to_le_bytes());
            }
        }
        hasher.update(&window.start.and_utc().timestamp().to_le_bytes());
        hasher.update(&window.end.and_utc().timestamp().to_le_bytes());
        Self(hasher.digest())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Directory of cached run results.
#[derive(Debug)]
pub struct ResultCache {
    dir: PathBuf,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn entry_path(&self, key: CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Looks up `key`. Unreadable or corrupt entries count as a miss.
    pub fn load(&self, key: CacheKey) -> Option<NodeResults> {
        if !self.enabled {
            return None;
        }
        let path = self.entry_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(%key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(%key, path = %path.display(), error = %e, "cache entry unreadable, treating as miss");
                return None;
            }
        };
        match serde_json::from_str::<Vec<NodeResult>>(&text) {
            Ok(entries) => {
                info!(%key, nodes = entries.len(), "cache hit");
                Some(
                    entries
                        .into_iter()
                        .map(|result| (result.node.clone(), result))
                        .collect(),
                )
            }
            Err(e) => {
                warn!(%key, error = %e, "cache entry corrupt, treating as miss");
                None
            }
        }
    }

    /// Persists `results` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cache`] if the entry cannot be written.
    pub fn store(&self, key: CacheKey, results: &NodeResults) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let entries: Vec<&NodeResult> = results.values().collect();
        let json = serde_json::to_string(&entries)
            .map_err(|e| PipelineError::Cache(format!("serialize {key}: {e}")))?;

        let _guard = self.write_lock.lock();
        fs::create_dir_all(&self.dir).map_err(|e| cache_io(&self.dir, e))?;
        let target = self.entry_path(key);
        let temp = self.dir.join(format!("{key}.json.{}.tmp", Uuid::new_v4()));
        fs::write(&temp, json).map_err(|e| cache_io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(cache_io(&target, e));
        }
        info!(%key, nodes = results.len(), "stored results in cache");
        Ok(())
    }
}

fn cache_io(path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Cache(format!("{}: {e}", path.display()))
}
