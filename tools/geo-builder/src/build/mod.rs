//! Build orchestration
//!
//! A build runs these stages, each logged when entered:
//!
//! 1. discover levels from the level map and the `Levels/` folder
//! 2. parse every level pak in parallel and publish mesh demand
//! 3. scan content archives, decoding each demanded mesh once
//! 4. canonicalize and deduplicate the decoded meshes
//! 5. write `geo.mesh`
//! 6. write one `<id>.geo` per level in parallel
//!
//! Failures inside a level or archive are logged and the run continues;
//! only setup problems (paths, level listing, output folder) abort it.

mod discover;
mod level;
mod scan;

pub use discover::{Discovery, LevelRecord, discover, parse_level_map};
pub use level::{LevelParser, ParsedLevel};
pub use scan::{ArchiveScanner, CONTENT_DIRS, ScanResult, find_content_archives, is_content_archive};

use crate::config::GeoConfig;
use crate::demand::DemandSet;
use crate::images::ImageExporter;
use crate::report::BuildReport;
use crate::writer::{MESH_LIBRARY_FILE, MeshLibrary, limit_violation, write_geo};
use aion_cgf::{CollisionIntention, MaterialTable, MeshRecord, canonicalize};
use aion_pak::DecryptKey;
use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    DiscoverLevels,
    ParseLevels,
    ScanArchives,
    Canonicalize,
    WriteMeshLibrary,
    WriteGeoFiles,
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::DiscoverLevels => "discover levels",
            BuildStage::ParseLevels => "parse levels",
            BuildStage::ScanArchives => "scan archives",
            BuildStage::Canonicalize => "canonicalize meshes",
            BuildStage::WriteMeshLibrary => "write mesh library",
            BuildStage::WriteGeoFiles => "write geo files",
            BuildStage::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(stage: BuildStage) {
    tracing::info!(stage = %stage, "build stage");
}

/// Resolved build settings
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub client: PathBuf,
    pub output: PathBuf,
    pub world_maps: Option<PathBuf>,
    pub level: Option<String>,
    /// None uses the available parallelism
    pub threads: Option<usize>,
    pub second_state_tick: i32,
    pub ignore: Vec<String>,
    pub all_terrain_materials: bool,
    pub export_images: bool,
    pub optimizer: Option<String>,
}

impl BuildOptions {
    pub fn from_config(config: &GeoConfig) -> Result<Self> {
        let Some(client) = config.client.path.clone() else {
            bail!("No client path configured (set [client] path or pass --client)");
        };
        Ok(Self {
            client,
            output: config.output.path.clone(),
            world_maps: config.client.world_maps.clone(),
            level: config.build.level.clone(),
            threads: config.build.threads,
            second_state_tick: config.build.second_state_tick,
            ignore: config.build.ignore.clone(),
            all_terrain_materials: config.build.all_terrain_materials,
            export_images: config.terrain.export_images,
            optimizer: config.terrain.optimizer.clone(),
        })
    }
}

/// Runs a complete build
pub struct GeoBuilder {
    options: BuildOptions,
    keys: Vec<DecryptKey>,
    materials: MaterialTable,
}

impl GeoBuilder {
    pub fn new(options: BuildOptions, keys: Vec<DecryptKey>, materials: MaterialTable) -> Self {
        Self {
            options,
            keys,
            materials,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn run(&self) -> Result<BuildReport> {
        let started = Instant::now();
        if !self.options.client.is_dir() {
            bail!("Client path is not a folder: {}", self.options.client.display());
        }
        std::fs::create_dir_all(&self.options.output).with_context(|| {
            format!("Failed to create output folder: {}", self.options.output.display())
        })?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.unwrap_or(0))
            .build()
            .context("Failed to build worker pool")?;
        tracing::info!(threads = pool.current_num_threads(), "worker pool ready");

        let mut report = pool.install(|| self.run_stages())?;
        report.elapsed = started.elapsed();
        enter(BuildStage::Done);
        report.log();
        Ok(report)
    }

    fn run_stages(&self) -> Result<BuildReport> {
        let mut report = BuildReport::default();

        enter(BuildStage::DiscoverLevels);
        let discovery = discover(&self.options, &self.keys)?;
        report.mismatches = discovery.mismatches.clone();
        if discovery.levels.is_empty() {
            bail!("No level to build");
        }

        enter(BuildStage::ParseLevels);
        let parser = LevelParser {
            keys: &self.keys,
            materials: &self.materials,
            addresses: &discovery.addresses,
            all_terrain_materials: self.options.all_terrain_materials,
        };
        let parsed: Vec<Result<ParsedLevel>> = discovery
            .levels
            .par_iter()
            .map(|record| parser.parse(record))
            .collect();

        let mut levels = Vec::with_capacity(parsed.len());
        for (record, result) in discovery.levels.iter().zip(parsed) {
            match result {
                Ok(level) => levels.push(level),
                Err(e) => {
                    tracing::error!(level = %record.id, "level skipped: {e:#}");
                    report.levels_without_output.insert(record.id.clone());
                }
            }
        }

        let images = self
            .options
            .export_images
            .then(|| ImageExporter::spawn(self.options.output.clone(), self.options.optimizer.clone()));
        if let Some(images) = &images {
            for level in &levels {
                if let Some(terrain) = &level.terrain {
                    images.submit(&level.record.id, terrain.clone());
                }
            }
        }

        let demand = DemandSet::new();
        let (events, doors) = self.publish(&levels, &demand);
        tracing::info!(meshes = demand.len(), "mesh demand collected");

        enter(BuildStage::ScanArchives);
        let archives = find_content_archives(&self.options.client);
        let scanner = ArchiveScanner {
            client: &self.options.client,
            keys: &self.keys,
            materials: &self.materials,
            demand: &demand,
            doors: &doors,
            second_state_tick: self.options.second_state_tick,
        };
        let scan = scanner.scan(&archives);
        tracing::info!(
            archives = archives.len(),
            opened = scan.archives_opened,
            abandoned = scan.archives_abandoned,
            decoded = scan.meshes.len(),
            "archives scanned"
        );

        enter(BuildStage::Canonicalize);
        report.empty.extend(scan.empty);
        let library = self.canonicalize(scan.meshes, &events, &mut report);

        enter(BuildStage::WriteMeshLibrary);
        let path = self.options.output.join(MESH_LIBRARY_FILE);
        write_file(&path, |w| library.write(w))?;
        report.mesh_records = library.len();
        report.mesh_names = library.name_count();
        tracing::info!(records = library.len(), names = library.name_count(), "mesh library written");

        enter(BuildStage::WriteGeoFiles);
        let written: Vec<(String, bool)> = levels
            .par_iter()
            .map(|level| (level.record.id.clone(), self.write_level(level, &library)))
            .collect();
        for (id, ok) in written {
            if ok {
                report.levels_written += 1;
            } else {
                report.levels_without_output.insert(id);
            }
        }

        for (name, optional) in scan.failed {
            report.add_missing(name, optional);
        }
        let remaining = demand.into_remaining();
        for name in remaining.required {
            report.add_missing(name, false);
        }
        for name in remaining.optional {
            report.add_missing(name, true);
        }

        if let Some(images) = images {
            let written = images.finish();
            tracing::info!(images = written, "heightmap images written");
        }
        Ok(report)
    }

    /// Publish every level's demand; returns event meshes and doors
    fn publish(&self, levels: &[ParsedLevel], demand: &DemandSet) -> (HashSet<String>, HashSet<String>) {
        let ignore: HashSet<&str> = self.options.ignore.iter().map(String::as_str).collect();
        let mut events = HashSet::new();
        let mut doors = HashSet::new();

        for level in levels {
            let test_level = level.record.is_test();
            let names = level
                .demand
                .required
                .iter()
                .map(|name| (name, test_level))
                .chain(level.demand.optional.iter().map(|name| (name, true)));
            for (name, optional) in names {
                if !ignore.contains(name.as_str()) {
                    demand.insert(name, optional);
                }
            }
            events.extend(level.demand.event.iter().cloned());
            doors.extend(level.demand.doors.iter().cloned());
        }
        (events, doors)
    }

    /// Canonical library from raw meshes; over-limit meshes are reported
    fn canonicalize(
        &self,
        meshes: Vec<(String, Vec<MeshRecord>)>,
        events: &HashSet<String>,
        report: &mut BuildReport,
    ) -> MeshLibrary {
        let canonical: Vec<(String, Vec<MeshRecord>)> = meshes
            .into_par_iter()
            .map(|(name, mut slots)| {
                // second states inherit the event flag of their door
                let base = name.strip_suffix(crate::placement::SECOND_STATE_SUFFIX).unwrap_or(&name);
                if events.contains(base) {
                    for slot in &mut slots {
                        slot.intention |= CollisionIntention::EVENT;
                    }
                }
                canonicalize(&mut slots);
                (name, slots)
            })
            .collect();

        let mut kept = Vec::with_capacity(canonical.len());
        for (name, slots) in canonical {
            if slots.is_empty() {
                report.empty.insert(name);
            } else if let Some(reason) = limit_violation(&slots) {
                tracing::warn!(mesh = %name, "mesh excluded: {reason}");
                report.over_limit.insert(name);
            } else {
                kept.push((name, slots));
            }
        }
        MeshLibrary::from_meshes(kept)
    }

    /// Write one geo file; false when the level has nothing to write or fails
    fn write_level(&self, level: &ParsedLevel, library: &MeshLibrary) -> bool {
        let id = &level.record.id;
        if !level.has_output() {
            tracing::warn!(level = %id, "level has neither terrain nor placements");
            return false;
        }
        let path = self.options.output.join(format!("{id}.geo"));
        let result = write_file(&path, |w| {
            write_geo(w, level.terrain.as_ref(), &level.placements, library)
        });
        match result {
            Ok(stats) => {
                tracing::info!(
                    level = %id,
                    folder = %level.record.folder,
                    placements = stats.written,
                    skipped = stats.skipped,
                    terrain = stats.terrain_points,
                    "geo file written"
                );
                true
            }
            Err(e) => {
                tracing::error!(level = %id, "geo file not written: {e:#}");
                false
            }
        }
    }
}

fn write_file<T>(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<T>) -> Result<T> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let value = write(&mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(value)
}
