//! Per-level parsing: one level pak into terrain, placements and demand

use super::discover::LevelRecord;
use crate::placement::{
    HouseAddresses, LevelData, MeshDemand, Placement, decode_brush_list, decode_level_data,
    decode_mission, decode_objects, object_placements,
};
use crate::terrain::{Terrain, decode_terrain};
use crate::xml;
use aion_cgf::MaterialTable;
use aion_pak::{DecryptKey, PakArchive};
use anyhow::{Context, Result};

const LAND_MAP: &str = "land_map.h32";
const BRUSH_LIST: &str = "brush.lst";
const OBJECTS_LIST: &str = "objects.lst";
const LEVEL_DATA: &str = "leveldata.xml";
const MISSION: &str = "mission_mission0.xml";

/// Everything one level contributes to the build
#[derive(Debug)]
pub struct ParsedLevel {
    pub record: LevelRecord,
    pub terrain: Option<Terrain>,
    /// Brushes, then vegetation, then entities
    pub placements: Vec<Placement>,
    pub demand: MeshDemand,
}

impl ParsedLevel {
    pub fn has_output(&self) -> bool {
        self.terrain.is_some() || !self.placements.is_empty()
    }
}

/// Shared inputs of level parsing
pub struct LevelParser<'a> {
    pub keys: &'a [DecryptKey],
    pub materials: &'a MaterialTable,
    pub addresses: &'a HouseAddresses,
    pub all_terrain_materials: bool,
}

impl LevelParser<'_> {
    /// Parse one level
    ///
    /// Only failing to open the level pak is an error; a broken list is
    /// logged and leaves just that part out.
    pub fn parse(&self, record: &LevelRecord) -> Result<ParsedLevel> {
        let archive = PakArchive::open(&record.pak, self.keys)
            .with_context(|| format!("Failed to open {}", record.pak.display()))?;
        let level = &record.id;
        let read = |suffix: &str| read_part(&archive, level, suffix);

        let level_data = read(LEVEL_DATA).and_then(|data| {
            let decoded = xml::parse(&data)
                .map_err(anyhow::Error::from)
                .and_then(|root| Ok(decode_level_data(&root)?));
            warn_on_error(decoded, level, LEVEL_DATA)
        });

        let terrain = read(LAND_MAP).filter(|data| !data.is_empty()).and_then(|data| {
            let materials = level_data
                .as_ref()
                .map(|l| l.terrain_materials(self.materials, self.all_terrain_materials))
                .unwrap_or_default();
            warn_on_error(decode_terrain(&data, &materials), level, LAND_MAP)
        });

        let mut placements = Vec::new();
        let mut demand = MeshDemand::default();

        if let Some(data) = read(BRUSH_LIST)
            && let Some(list) = warn_on_error(decode_brush_list(&data), level, BRUSH_LIST)
        {
            placements.extend(list.placements());
            demand.extend(list.demand());
        }

        if let Some(data) = read(OBJECTS_LIST) {
            match &level_data {
                Some(level_data) => self.objects(&data, level_data, level, &mut placements, &mut demand),
                None => tracing::warn!(level = %level, "{OBJECTS_LIST} without level data, vegetation skipped"),
            }
        }

        if let Some(data) = read(MISSION) {
            let decoded = xml::parse(&data)
                .map_err(anyhow::Error::from)
                .and_then(|root| Ok(decode_mission(&root, self.addresses)?));
            if let Some((entities, entity_demand)) = warn_on_error(decoded, level, MISSION) {
                placements.extend(entities);
                demand.extend(entity_demand);
            }
        }

        tracing::debug!(
            level = %level,
            placements = placements.len(),
            terrain = terrain.as_ref().map_or(0, Terrain::len),
            "level parsed"
        );
        Ok(ParsedLevel {
            record: record.clone(),
            terrain,
            placements,
            demand,
        })
    }

    fn objects(
        &self,
        data: &[u8],
        level_data: &LevelData,
        level: &str,
        placements: &mut Vec<Placement>,
        demand: &mut MeshDemand,
    ) {
        if let Some(entries) = warn_on_error(decode_objects(data, level_data), level, OBJECTS_LIST) {
            let (vegetation, vegetation_demand) = object_placements(&entries, level_data);
            placements.extend(vegetation);
            demand.extend(vegetation_demand);
        }
    }
}

/// Unpack the first entry whose name ends with `suffix`
fn read_part(archive: &PakArchive, level: &str, suffix: &str) -> Option<Vec<u8>> {
    let entry = archive.entries().iter().find(|e| e.name.ends_with(suffix))?;
    match archive.unpack_entry(entry) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(level = %level, entry = %entry.name, "unpack failed: {e}");
            None
        }
    }
}

fn warn_on_error<T, E: std::fmt::Display>(result: Result<T, E>, level: &str, part: &str) -> Option<T> {
    result
        .map_err(|e| tracing::warn!(level = %level, "{part}: {e:#}"))
        .ok()
}
