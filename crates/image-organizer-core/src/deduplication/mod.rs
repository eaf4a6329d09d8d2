//! Exact duplicate grouping and review decisions.
//!
//! A scan produces a [`CandidateMap`]: each reference image mapped to the
//! images that look like it. A [`ReviewDecision`] turns that map into the
//! two lists the staging engine consumes.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DuplicateGroup, FileRecord};
use crate::utils::fs::write_json_atomic;

/// Group records sharing a checksum.
///
/// Groups and their members keep first-seen order. Records without a
/// checksum never match anything.
pub fn find_exact_duplicates(records: &[FileRecord]) -> Vec<DuplicateGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_checksum: HashMap<&str, Vec<FileRecord>> = HashMap::new();

    for record in records {
        let Some(checksum) = record.checksum_key() else {
            continue;
        };
        by_checksum
            .entry(checksum)
            .or_insert_with(|| {
                order.push(checksum);
                Vec::new()
            })
            .push(record.clone());
    }

    let groups: Vec<DuplicateGroup> = order
        .into_iter()
        .filter_map(|checksum| {
            let members = by_checksum.remove(checksum)?;
            DuplicateGroup::new(checksum, members)
        })
        .collect();

    info!(
        "Found {} exact duplicate groups among {} records",
        groups.len(),
        records.len()
    );
    groups
}

/// Reference image -> (candidate, similarity score) as written by a scan
pub type CandidateMap = BTreeMap<PathBuf, Vec<(PathBuf, f64)>>;

/// Read a candidate map from its JSON file
pub fn load_candidates(path: &Path) -> Result<CandidateMap> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Which files survive and which get staged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    #[serde(default)]
    pub keep: Vec<PathBuf>,
    #[serde(default)]
    pub delete: Vec<PathBuf>,
}

impl ReviewDecision {
    /// Default decision for a candidate map: keep every reference, delete its
    /// candidates.
    ///
    /// Files that are kept anywhere are never deleted, so symmetric entries
    /// (A lists B and B lists A) keep the first reference only.
    pub fn from_candidates(candidates: &CandidateMap) -> Self {
        let mut keep: BTreeSet<&Path> = BTreeSet::new();
        let mut delete: BTreeSet<&Path> = BTreeSet::new();

        for (reference, matches) in candidates {
            if delete.contains(reference.as_path()) {
                debug!("{} already marked as a duplicate", reference.display());
                continue;
            }
            keep.insert(reference.as_path());
            for (candidate, _) in matches {
                if !keep.contains(candidate.as_path()) {
                    delete.insert(candidate.as_path());
                }
            }
        }

        Self {
            keep: keep.into_iter().map(Path::to_path_buf).collect(),
            delete: delete.into_iter().map(Path::to_path_buf).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let mut decision: Self = serde_json::from_str(&text)?;
        decision.drop_kept_from_delete();
        Ok(decision)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        Ok(())
    }

    /// A file listed in both lists is kept
    fn drop_kept_from_delete(&mut self) {
        let keep: BTreeSet<&PathBuf> = self.keep.iter().collect();
        let before = self.delete.len();
        self.delete.retain(|p| !keep.contains(p));
        if self.delete.len() < before {
            debug!(
                "Dropped {} kept files from the delete list",
                before - self.delete.len()
            );
        }
    }
}

// -- Tests --
