//! LRU cache of open cubes.
//!
//! Tools that visit many cubes (the control-network check, serial-number lists) reopen the same
//! files repeatedly. [`CubeCache`] keeps the most recently used handles open, up to a capacity
//! derived from the process open-file limit.

use std::collections::VecDeque;

use ahash::AHashMap;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

use super::file::CubeInfo;
use crate::ingest_errors::IngestError;

/// Share of the open-file soft limit a cache may use.
const OPEN_FILE_SHARE: f64 = 0.6;

/// Soft limit assumed when it cannot be read.
const DEFAULT_OPEN_FILES: u64 = 1024;

/// Opens cubes for a [`CubeCache`].
pub trait CubeOpener {
    type Handle;

    fn open(&self, path: &Utf8Path) -> Result<Self::Handle, IngestError>;

    /// Release a handle evicted from the cache.
    fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Opens cube labels with [`CubeInfo::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelOpener;

impl CubeOpener for LabelOpener {
    type Handle = CubeInfo;

    fn open(&self, path: &Utf8Path) -> Result<CubeInfo, IngestError> {
        CubeInfo::open(path)
    }
}

/// Filename → open handle, least recently used first out.
pub struct CubeCache<O: CubeOpener> {
    opener: O,
    capacity: usize,
    handles: AHashMap<Utf8PathBuf, O::Handle>,
    /// Least recently used at the front.
    order: VecDeque<Utf8PathBuf>,
}

impl<O: CubeOpener> CubeCache<O> {
    /// A cache sized from the open-file limit of the process.
    pub fn new(opener: O) -> Self {
        Self::with_capacity(opener, default_capacity())
    }

    pub fn with_capacity(opener: O, capacity: usize) -> Self {
        CubeCache {
            opener,
            capacity: capacity.max(1),
            handles: AHashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.handles.contains_key(path)
    }

    /// Handle for `path`, opened on a miss and promoted to most recently used.
    ///
    /// A failed open is returned as is and nothing is cached.
    pub fn open(&mut self, path: &Utf8Path) -> Result<&O::Handle, IngestError> {
        if self.handles.contains_key(path) {
            self.promote(path);
        } else {
            let handle = self.opener.open(path)?;
            while self.handles.len() >= self.capacity {
                self.evict_oldest();
            }
            self.handles.insert(path.to_path_buf(), handle);
            self.order.push_back(path.to_path_buf());
        }
        self.handles
            .get(path)
            .ok_or_else(|| IngestError::DataFileNotFound(path.to_string()))
    }

    /// Close every cached handle.
    pub fn clear(&mut self) {
        while !self.order.is_empty() {
            self.evict_oldest();
        }
    }

    fn promote(&mut self, path: &Utf8Path) {
        if let Some(index) = self.order.iter().position(|p| p == path) {
            if let Some(p) = self.order.remove(index) {
                self.order.push_back(p);
            }
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.order.pop_front() {
            if let Some(handle) = self.handles.remove(&oldest) {
                debug!("Closing cached cube {oldest}");
                self.opener.close(handle);
            }
        }
    }
}

impl<O: CubeOpener> Drop for CubeCache<O> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// 60 % of the open-file soft limit, at least 1.
pub fn default_capacity() -> usize {
    let limit = std::fs::read_to_string("/proc/self/limits")
        .ok()
        .and_then(|text| parse_open_file_limit(&text))
        .unwrap_or(DEFAULT_OPEN_FILES);
    ((limit as f64 * OPEN_FILE_SHARE) as usize).max(1)
}

/// Soft limit of the `Max open files` row of `/proc/self/limits`.
fn parse_open_file_limit(limits: &str) -> Option<u64> {
    let row = limits.lines().find(|l| l.starts_with("Max open files"))?;
    let soft = row.trim_start_matches("Max open files").split_whitespace().next()?;
    if soft == "unlimited" {
        return Some(DEFAULT_OPEN_FILES);
    }
    soft.parse().ok()
}
