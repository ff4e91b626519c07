//! Demand-driven mesh extraction from the client's content archives

use crate::demand::DemandSet;
use crate::placement::SECOND_STATE_SUFFIX;
use aion_cgf::{Geometry, MeshRecord};
use aion_pak::{DecryptKey, PakArchive, PakEntry};
use hashbrown::HashSet;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

/// Folders under the client root holding mesh archives
pub const CONTENT_DIRS: &[&str] = &["Levels/common", "Levels/idabpro", "Objects"];

/// Whether a file name is a mesh archive
///
/// Matches `Mesh_Meshes_NNN.pak`, `*_Meshes.pak` and `*idabpro.pak`,
/// ignoring case.
pub fn is_content_archive(file_name: &str) -> bool {
    let name = file_name.to_ascii_lowercase();
    let numbered = name
        .strip_prefix("mesh_meshes_")
        .and_then(|rest| rest.strip_suffix(".pak"))
        .is_some_and(|n| n.len() == 3 && n.bytes().all(|b| b.is_ascii_digit()));
    numbered || name.ends_with("_meshes.pak") || name.ends_with("idabpro.pak")
}

/// Every content archive under the client root, in a stable order
pub fn find_content_archives(client: &Path) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    for dir in CONTENT_DIRS {
        let root = client.join(dir);
        if !root.is_dir() {
            tracing::debug!(dir = ?root, "content folder not present");
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| is_content_archive(&e.file_name().to_string_lossy()))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        archives.extend(found);
    }
    archives
}

/// What decoding one claimed name produced
#[derive(Debug)]
enum Outcome {
    Mesh(Vec<MeshRecord>),
    Empty,
    Failed,
}

#[derive(Debug)]
struct Decoded {
    name: String,
    /// Only demanded as optional
    optional: bool,
    outcome: Outcome,
}

/// Raw meshes gathered from all archives
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Traversal output, not yet canonical
    pub meshes: Vec<(String, Vec<MeshRecord>)>,
    /// Decoded without collision geometry
    pub empty: Vec<String>,
    /// Claimed but failed to unpack or decode, with their optional flag
    pub failed: Vec<(String, bool)>,
    pub archives_opened: usize,
    /// Opened, then abandoned after an archive-wide unpack error
    pub archives_abandoned: usize,
}

impl ScanResult {
    fn merge(mut self, other: Self) -> Self {
        self.meshes.extend(other.meshes);
        self.empty.extend(other.empty);
        self.failed.extend(other.failed);
        self.archives_opened += other.archives_opened;
        self.archives_abandoned += other.archives_abandoned;
        self
    }
}

pub struct ArchiveScanner<'a> {
    pub client: &'a Path,
    pub keys: &'a [DecryptKey],
    pub materials: &'a aion_cgf::MaterialTable,
    pub demand: &'a DemandSet,
    /// Meshes that also need their opened state
    pub doors: &'a HashSet<String>,
    pub second_state_tick: i32,
}

impl ArchiveScanner<'_> {
    /// Decode every demanded mesh found in `archives`
    ///
    /// One task per archive, with the entries of each archive decoded in
    /// parallel as well. Archives starting after the demand is satisfied are
    /// not opened.
    pub fn scan(&self, archives: &[PathBuf]) -> ScanResult {
        archives
            .par_iter()
            .map(|path| self.scan_archive(path))
            .reduce(ScanResult::default, ScanResult::merge)
    }

    fn scan_archive(&self, path: &Path) -> ScanResult {
        let mut result = ScanResult::default();
        if self.demand.is_empty() {
            tracing::trace!(archive = ?path, "demand satisfied, archive skipped");
            return result;
        }

        let archive = match PakArchive::open_with_prefix(path, self.client, self.keys) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::warn!(archive = ?path, "archive skipped: {e}");
                return result;
            }
        };
        result.archives_opened = 1;

        let abandoned = AtomicBool::new(false);
        let decoded: Vec<Decoded> = archive
            .entries()
            .par_iter()
            .filter(|_| !abandoned.load(Ordering::Acquire))
            .filter_map(|entry| {
                self.demand
                    .claim(&entry.name)
                    .map(|optional| (entry, optional))
            })
            .flat_map_iter(|(entry, optional)| self.decode(&archive, entry, optional, &abandoned))
            .collect();

        // nothing from an archive with a bad key or bad offsets is kept
        if abandoned.load(Ordering::Acquire) {
            tracing::warn!(archive = ?path, claimed = decoded.len(), "archive abandoned");
            result.archives_abandoned = 1;
            result.failed = decoded.into_iter().map(|d| (d.name, d.optional)).collect();
            return result;
        }

        if !decoded.is_empty() {
            tracing::debug!(archive = ?path, meshes = decoded.len(), "archive scanned");
        }
        for Decoded {
            name,
            optional,
            outcome,
        } in decoded
        {
            match outcome {
                Outcome::Mesh(slots) => result.meshes.push((name, slots)),
                Outcome::Empty => result.empty.push(name),
                Outcome::Failed => result.failed.push((name, optional)),
            }
        }
        result
    }

    fn decode(
        &self,
        archive: &PakArchive,
        entry: &PakEntry,
        optional: bool,
        abandoned: &AtomicBool,
    ) -> Vec<Decoded> {
        let name = &entry.name;
        let failed = |name: &str| Decoded {
            name: name.to_string(),
            optional,
            outcome: Outcome::Failed,
        };

        let data = match archive.unpack_entry(entry) {
            Ok(data) => data,
            Err(e) => {
                if e.is_fatal_for_archive() {
                    abandoned.store(true, Ordering::Release);
                }
                tracing::warn!(mesh = %name, "unpack failed: {e}");
                return vec![failed(name.as_str())];
            }
        };
        let geometry = match Geometry::load(&data, self.materials) {
            Ok(geometry) => geometry,
            Err(e) => {
                tracing::warn!(mesh = %name, "decode failed: {e}");
                return vec![failed(name.as_str())];
            }
        };

        let mut outcomes = vec![classify(name.clone(), optional, geometry.traverse())];
        if self.doors.contains(name) {
            let opened = format!("{name}{SECOND_STATE_SUFFIX}");
            match geometry.snapshot_at_tick(self.second_state_tick) {
                Ok(snapshot) => outcomes.push(classify(opened, optional, snapshot.traverse())),
                Err(e) => {
                    tracing::warn!(mesh = %name, "opened state failed: {e}");
                    outcomes.push(failed(opened.as_str()));
                }
            }
        }
        outcomes
    }
}

fn classify(name: String, optional: bool, slots: Vec<MeshRecord>) -> Decoded {
    let outcome = if slots.iter().all(MeshRecord::is_empty) {
        Outcome::Empty
    } else {
        Outcome::Mesh(slots)
    };
    Decoded {
        name,
        optional,
        outcome,
    }
}
