//! Cross-platform duplicate detection (local files + cloud drive).
//!
//! Pure bookkeeping: records are pooled by content checksum and checksums
//! seen on both platforms become duplicate groups. Nothing here touches
//! the filesystem.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{DuplicateGroup, FileRecord, Platform};

/// Aggregate figures over all cross-platform groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStatistics {
    pub duplicate_groups: usize,
    pub total_files: usize,
    pub local_space: u64,
    pub remote_space: u64,
    /// Bytes reclaimable while one copy survives somewhere: min(local, remote)
    pub potential_savings: u64,
}

/// Pools local and remote records by checksum and intersects the pools
#[derive(Debug, Clone, Default)]
pub struct CrossPlatformReconciler {
    /// Every accepted record, in insertion order
    records: Vec<FileRecord>,
    local: HashMap<String, Vec<usize>>,
    remote: HashMap<String, Vec<usize>>,
}

impl CrossPlatformReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a local record. Records without a checksum are ignored.
    pub fn add_local(&mut self, mut record: FileRecord) -> bool {
        record.platform = Platform::Local;
        self.add(record)
    }

    /// Add a remote record. Records without a checksum are ignored.
    pub fn add_remote(&mut self, mut record: FileRecord) -> bool {
        record.platform = Platform::Remote;
        self.add(record)
    }

    /// Add a record to the pool of its own platform
    pub fn add(&mut self, record: FileRecord) -> bool {
        let Some(checksum) = record.checksum_key().map(str::to_owned) else {
            debug!(
                "File {} has no checksum, skipping",
                record.display_name
            );
            return false;
        };

        let index = self.records.len();
        let pool = match record.platform {
            Platform::Local => &mut self.local,
            Platform::Remote => &mut self.remote,
        };
        pool.entry(checksum).or_default().push(index);
        self.records.push(record);
        true
    }

    pub fn local_checksums(&self) -> usize {
        self.local.len()
    }

    pub fn remote_checksums(&self) -> usize {
        self.remote.len()
    }

    /// Groups of files present on both platforms, largest first.
    ///
    /// Members appear in the order they were added; groups of equal size keep
    /// the order in which their checksum was first seen.
    pub fn reconcile(&self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<(usize, DuplicateGroup)> = self
            .local
            .iter()
            .filter_map(|(checksum, locals)| {
                let remotes = self.remote.get(checksum)?;

                let mut indices: Vec<usize> = locals.iter().chain(remotes).copied().collect();
                indices.sort_unstable();

                let members = indices.iter().map(|&i| self.records[i].clone()).collect();
                let group = DuplicateGroup::new(checksum.clone(), members)?;
                Some((indices[0], group))
            })
            .collect();

        groups.sort_by_key(|(first_seen, _)| *first_seen);
        groups.sort_by(|(_, a), (_, b)| b.total_size().cmp(&a.total_size()));

        info!(
            "Found {} cross-platform duplicate groups (local: {}, remote: {})",
            groups.len(),
            self.local.len(),
            self.remote.len()
        );

        groups.into_iter().map(|(_, group)| group).collect()
    }

    /// Space figures over the current cross-platform groups
    pub fn statistics(&self) -> ReconcileStatistics {
        let groups = self.reconcile();

        let mut stats = ReconcileStatistics {
            duplicate_groups: groups.len(),
            ..ReconcileStatistics::default()
        };
        for group in &groups {
            let space = group.space_by_platform();
            stats.total_files += group.total_files();
            stats.local_space += space.local;
            stats.remote_space += space.remote;
        }
        stats.potential_savings = stats.local_space.min(stats.remote_space);
        stats
    }

    /// Clear all stored records
    pub fn reset(&mut self) {
        self.records.clear();
        self.local.clear();
        self.remote.clear();
    }
}

// -- Tests --
