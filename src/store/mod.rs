//! Durable checkpoint storage for the pipeline phases.
//!
//! Checkpoints are versioned JSON files keyed by (phase, iteration) so any
//! phase can resume after interruption and the payloads stay inspectable
//! with ordinary tools. Writes are atomic: serialize to a temp file in the
//! same directory, then rename into place. A crash mid-write never leaves a
//! partial checkpoint visible to the loader; on failure the temp file is
//! removed and the previous checkpoint remains the latest valid one.
//!
//! File layout: `phase{P}_iteration_{N}.json` for periodic checkpoints and
//! `phase{P}_final.json` for the unconditional end-of-phase record. A final
//! checkpoint, once written, is always the latest for its phase.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Graph-construction phase identifier.
pub const PHASE_BUILD: u8 = 1;
/// Edge-scoring phase identifier.
pub const PHASE_SCORE: u8 = 2;

/// Envelope schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Checkpoint envelope as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    phase: u8,
    /// None marks the final checkpoint of the phase.
    iteration: Option<u64>,
    /// Seconds since UNIX epoch at write time.
    timestamp: u64,
    data: T,
}

/// Envelope header only, for cheap enumeration.
#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    version: u32,
    phase: u8,
    iteration: Option<u64>,
    timestamp: u64,
}

/// Metadata describing one stored checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointMeta {
    pub phase: u8,
    /// None for a final checkpoint.
    pub iteration: Option<u64>,
    /// Seconds since UNIX epoch at write time.
    pub timestamp: u64,
    pub path: PathBuf,
}

impl CheckpointMeta {
    /// Whether this is the phase's final checkpoint.
    pub fn is_final(&self) -> bool {
        self.iteration.is_none()
    }
}

/// File-backed checkpoint store.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (creating if needed) a checkpoint store in the given directory.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Directory the checkpoints live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically save a checkpoint. `iteration = None` marks the phase's
    /// final checkpoint. Returns the path of the written file.
    pub fn save<T: Serialize>(
        &self,
        phase: u8,
        iteration: Option<u64>,
        data: &T,
    ) -> StoreResult<PathBuf> {
        let envelope = Envelope {
            version: CHECKPOINT_VERSION,
            phase,
            iteration,
            timestamp: unix_now(),
            data,
        };
        let bytes =
            serde_json::to_vec_pretty(&envelope).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;

        let path = self.dir.join(file_name(phase, iteration));
        let tmp = self.dir.join(format!("{}.tmp", file_name(phase, iteration)));

        if let Err(e) = std::fs::write(&tmp, &bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io {
                path: tmp,
                source: e,
            });
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io {
                path: path.clone(),
                source: e,
            });
        }
        Ok(path)
    }

    /// Load a checkpoint's payload.
    ///
    /// With `iteration` given, loads that exact checkpoint (or None if it
    /// does not exist). Without it, loads the latest for the phase: the
    /// final checkpoint when present, otherwise the highest iteration.
    /// Unreadable or malformed payloads are a fatal [`StoreError::Corrupt`];
    /// the caller decides between falling back to fresh state and halting.
    pub fn load<T: DeserializeOwned>(
        &self,
        phase: u8,
        iteration: Option<u64>,
    ) -> StoreResult<Option<T>> {
        let path = match iteration {
            Some(_) => {
                let p = self.dir.join(file_name(phase, iteration));
                if !p.is_file() {
                    return Ok(None);
                }
                p
            }
            None => match self.latest_path(phase)? {
                Some(p) => p,
                None => return Ok(None),
            },
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        let envelope: Envelope<T> =
            serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if envelope.version != CHECKPOINT_VERSION || envelope.phase != phase {
            return Err(StoreError::Corrupt {
                path,
                message: format!(
                    "envelope mismatch: version {} phase {}",
                    envelope.version, envelope.phase
                ),
            });
        }
        Ok(Some(envelope.data))
    }

    /// Enumerate stored checkpoints, optionally filtered by phase, sorted by
    /// write time (final checkpoints after periodic ones on timestamp ties).
    /// Unreadable entries are skipped with a warning.
    pub fn list(&self, phase: Option<u8>) -> StoreResult<Vec<CheckpointMeta>> {
        let mut metas = Vec::new();
        for entry in self.read_dir()? {
            let path = entry;
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable checkpoint: {e}");
                    continue;
                }
            };
            let header: EnvelopeHeader = match serde_json::from_str(&contents) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping malformed checkpoint: {e}");
                    continue;
                }
            };
            if header.version != CHECKPOINT_VERSION {
                tracing::warn!(
                    path = %path.display(),
                    version = header.version,
                    "skipping checkpoint with unsupported version"
                );
                continue;
            }
            if let Some(wanted) = phase {
                if header.phase != wanted {
                    continue;
                }
            }
            metas.push(CheckpointMeta {
                phase: header.phase,
                iteration: header.iteration,
                timestamp: header.timestamp,
                path,
            });
        }
        metas.sort_by_key(|m| (m.timestamp, m.is_final(), m.iteration));
        Ok(metas)
    }

    /// Delete one checkpoint, or every checkpoint for a phase when
    /// `iteration` is omitted.
    pub fn delete(&self, phase: u8, iteration: Option<u64>) -> StoreResult<()> {
        match iteration {
            Some(_) => {
                let path = self.dir.join(file_name(phase, iteration));
                if path.is_file() {
                    std::fs::remove_file(&path).map_err(|e| StoreError::Io { path, source: e })?;
                }
                Ok(())
            }
            None => {
                let prefix = format!("phase{phase}_");
                for path in self.read_dir()? {
                    let matches = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix));
                    if matches {
                        std::fs::remove_file(&path)
                            .map_err(|e| StoreError::Io { path, source: e })?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Most recent checkpoint across all phases, for operator resume info.
    pub fn latest(&self) -> StoreResult<Option<CheckpointMeta>> {
        Ok(self.list(None)?.into_iter().next_back())
    }

    /// Path of the latest checkpoint for a phase: final wins, otherwise the
    /// highest iteration number.
    fn latest_path(&self, phase: u8) -> StoreResult<Option<PathBuf>> {
        let final_path = self.dir.join(file_name(phase, None));
        if final_path.is_file() {
            return Ok(Some(final_path));
        }

        let prefix = format!("phase{phase}_iteration_");
        let mut best: Option<(u64, PathBuf)> = None;
        for path in self.read_dir()? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(iter_str) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            let Ok(iteration) = iter_str.parse::<u64>() else {
                continue;
            };
            if best.as_ref().is_none_or(|(n, _)| iteration > *n) {
                best = Some((iteration, path));
            }
        }
        Ok(best.map(|(_, p)| p))
    }

    /// All `.json` checkpoint files in the store directory (temp files and
    /// foreign entries excluded).
    fn read_dir(&self) -> StoreResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "json")
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("phase"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("dir", &self.dir)
            .finish()
    }
}

fn file_name(phase: u8, iteration: Option<u64>) -> String {
    match iteration {
        Some(n) => format!("phase{phase}_iteration_{n}.json"),
        None => format!("phase{phase}_final.json"),
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
