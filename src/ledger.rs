// src/ledger.rs
//! Durable per-topic record of delivered paper identifiers.
//!
//! The ledger is a JSON document `{ "<topic>": ["<id>", ...] }`. Every accepted insert rewrites
//! the whole file before returning, so a crash can lose at most the page being processed,
//! never a paper that was already handed to the caller.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{LedgerError, OrdinalError};

/// Known ordinal range of a topic's ledger. `latest` is the maximum, `oldest` the minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub latest: f64,
    pub oldest: f64,
}

impl Boundary {
    /// The boundary of an empty ledger; filters nothing.
    pub const OPEN: Boundary = Boundary {
        latest: f64::NEG_INFINITY,
        oldest: f64::INFINITY,
    };

    pub fn is_open(&self) -> bool {
        !self.latest.is_finite()
    }

    /// True when `ordinal` lies inside the already scanned `[oldest, latest]` window.
    pub fn covers(&self, ordinal: f64) -> bool {
        !self.is_open() && ordinal >= self.oldest && ordinal <= self.latest
    }
}

static VERSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v\d+$").expect("version suffix regex"));

/// Numeric ordinal of an identifier such as `http://arxiv.org/abs/2403.12345v2` (→ 2403.12345).
///
/// Takes the last path segment, strips a trailing `vN` version and parses the rest as a float.
pub fn parse_ordinal(id: &str) -> Result<f64, OrdinalError> {
    let segment = id.trim_end_matches('/').rsplit('/').next().unwrap_or(id);
    let bare = VERSION_SUFFIX.replace(segment, "");
    match bare.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(OrdinalError { id: id.to_string() }),
    }
}

#[derive(Debug)]
pub struct DedupLedger {
    path: PathBuf,
    inner: Mutex<HashMap<String, HashSet<String>>>,
}

impl DedupLedger {
    /// Read the ledger from `path`. A missing file yields an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let topics = match fs::read_to_string(&path) {
            Ok(raw) => {
                let stored: HashMap<String, Vec<String>> =
                    serde_json::from_str(&raw).map_err(|source| LedgerError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                stored
                    .into_iter()
                    .map(|(topic, ids)| (topic, ids.into_iter().collect()))
                    .collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "ledger", path = %path.display(), "no ledger yet, starting empty");
                HashMap::new()
            }
            Err(source) => return Err(LedgerError::Io { path, source }),
        };

        Ok(Self {
            path,
            inner: Mutex::new(topics),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, topic: &str, id: &str) -> bool {
        let guard = self.inner.lock().expect("ledger mutex poisoned");
        guard.get(topic).is_some_and(|ids| ids.contains(id))
    }

    /// Record `id` for `topic` and flush to disk before returning.
    ///
    /// Returns `Ok(false)` when the id was already present (nothing is written). If the flush
    /// fails the id is removed again so memory never runs ahead of disk.
    pub fn insert(&self, topic: &str, id: &str) -> Result<bool, LedgerError> {
        let mut guard = self.inner.lock().expect("ledger mutex poisoned");
        let added = guard
            .entry(topic.to_string())
            .or_default()
            .insert(id.to_string());
        if !added {
            return Ok(false);
        }

        if let Err(e) = write_ledger(&self.path, &guard) {
            if let Some(ids) = guard.get_mut(topic) {
                ids.remove(id);
                if ids.is_empty() {
                    guard.remove(topic);
                }
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Ordinal window of everything stored for `topic`.
    ///
    /// Fails open: an empty topic or any identifier without a numeric ordinal yields
    /// [`Boundary::OPEN`], which disables boundary filtering for the run.
    pub fn boundary(&self, topic: &str) -> Boundary {
        let guard = self.inner.lock().expect("ledger mutex poisoned");
        let Some(ids) = guard.get(topic).filter(|ids| !ids.is_empty()) else {
            return Boundary::OPEN;
        };

        let mut bounds = Boundary::OPEN;
        for id in ids {
            match parse_ordinal(id) {
                Ok(ord) => {
                    bounds.latest = bounds.latest.max(ord);
                    bounds.oldest = bounds.oldest.min(ord);
                }
                Err(e) => {
                    warn!(target: "ledger", topic, error = %e, "boundary disabled for this run");
                    return Boundary::OPEN;
                }
            }
        }
        bounds
    }

    pub fn len(&self, topic: &str) -> usize {
        let guard = self.inner.lock().expect("ledger mutex poisoned");
        guard.get(topic).map_or(0, HashSet::len)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }
}

fn write_ledger(path: &Path, topics: &HashMap<String, HashSet<String>>) -> Result<(), LedgerError> {
    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Sorted output keeps rewrites diff-friendly; readers ignore order.
    let snapshot: BTreeMap<&str, Vec<&str>> = topics
        .iter()
        .map(|(topic, ids)| {
            let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            (topic.as_str(), ids)
        })
        .collect();
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).map_err(io_err)?;
    f.write_all(json.as_bytes()).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
