//! Level discovery: level map, level folders and house addresses

use super::BuildOptions;
use crate::placement::{HouseAddresses, parse_house_addresses};
use crate::xml::{self, XmlNode};
use aion_pak::{DecryptKey, PakArchive};
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Level map inside the client's world archive
const WORLD_PAK: &str = "Data/World/World.pak";
const WORLD_ID_XML: &str = "worldid.xml";

const HOUSING_PAK: &str = "Data/Housing/Housing.pak";
const HOUSE_ADDRESS_XML: &str = "client_housing_address.xml";

/// Shared content folder, never a level
const COMMON_FOLDER: &str = "common";

/// Prison levels carry no geometry
const PRISON_SUFFIX: &str = "_prison";

const LEVEL_PAK: &str = "level.pak";

/// One level to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRecord {
    /// Numeric level id, used as the geo file name
    pub id: String,
    /// Folder under `Levels/` as spelled on disk
    pub folder: String,
    pub pak: PathBuf,
}

impl LevelRecord {
    /// Test levels only publish optional demand
    pub fn is_test(&self) -> bool {
        self.folder.to_ascii_lowercase().starts_with("test")
    }
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub levels: Vec<LevelRecord>,
    /// Level map entries without a folder or level pak
    pub mismatches: Vec<String>,
    pub addresses: HouseAddresses,
}

/// Find every level to build under the client root
pub fn discover(options: &BuildOptions, keys: &[DecryptKey]) -> Result<Discovery> {
    let level_map = match &options.world_maps {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read level map: {}", path.display()))?;
            let root = xml::parse(&data)
                .with_context(|| format!("Failed to parse level map: {}", path.display()))?;
            parse_level_map(&root)
        }
        None => load_client_level_map(&options.client, keys)?,
    };
    if level_map.is_empty() {
        bail!("Level map lists no levels");
    }

    let levels_dir = options.client.join("Levels");
    let folders = level_folders(&levels_dir)?;

    let mut discovery = Discovery {
        addresses: load_house_addresses(&options.client, keys),
        ..Discovery::default()
    };

    for (id, folder) in level_map {
        if options.level.as_ref().is_some_and(|level| *level != id) {
            continue;
        }
        let Some(folder) = folders.iter().find(|f| f.eq_ignore_ascii_case(&folder)) else {
            discovery
                .mismatches
                .push(format!("level {id}: folder {folder} does not exist"));
            continue;
        };
        if folder.to_ascii_lowercase().ends_with(PRISON_SUFFIX) {
            tracing::info!(level = %id, folder = %folder, "skipping prison level");
            continue;
        }
        let Some(pak) = find_level_pak(&levels_dir.join(folder)) else {
            discovery
                .mismatches
                .push(format!("level {id}: {folder} has no {LEVEL_PAK}"));
            continue;
        };
        discovery.levels.push(LevelRecord {
            id,
            folder: folder.clone(),
            pak,
        });
    }

    tracing::info!(
        levels = discovery.levels.len(),
        mismatches = discovery.mismatches.len(),
        houses = discovery.addresses.len(),
        "levels discovered"
    );
    Ok(discovery)
}

/// Level id to folder name, sorted by id
///
/// Accepts the client's `world_id/data` layout (id attribute, folder as
/// text) and the server's `map` layout (`id` and `cName` attributes).
pub fn parse_level_map(root: &XmlNode) -> Vec<(String, String)> {
    let mut map = BTreeMap::new();
    let entries: Box<dyn Iterator<Item = (Option<&str>, Option<&str>)> + '_> =
        if root.name.eq_ignore_ascii_case("world_id") {
            Box::new(
                root.children_named("data")
                    .map(|data| (data.attr("id"), Some(data.text()))),
            )
        } else {
            Box::new(
                root.children_named("map")
                    .map(|map| (map.attr("id"), map.attr("cName"))),
            )
        };

    for (id, folder) in entries {
        let (Some(id), Some(folder)) = (id.map(str::trim), folder.map(str::trim)) else {
            continue;
        };
        if id.is_empty() || folder.is_empty() {
            continue;
        }
        map.entry(id.to_string()).or_insert_with(|| folder.to_string());
    }
    map.into_iter().collect()
}

fn load_client_level_map(client: &Path, keys: &[DecryptKey]) -> Result<Vec<(String, String)>> {
    let path = client.join(WORLD_PAK);
    let archive = PakArchive::open(&path, keys)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let data = archive
        .unpack(WORLD_ID_XML)
        .with_context(|| format!("Failed to unpack {WORLD_ID_XML}"))?
        .with_context(|| format!("{} has no {WORLD_ID_XML}", path.display()))?;
    let root = xml::parse(&data).with_context(|| format!("Failed to parse {WORLD_ID_XML}"))?;
    Ok(parse_level_map(&root))
}

/// House addresses; a missing or broken housing archive leaves the map empty
fn load_house_addresses(client: &Path, keys: &[DecryptKey]) -> HouseAddresses {
    let path = client.join(HOUSING_PAK);
    if !path.is_file() {
        tracing::info!(archive = ?path, "no housing archive, house addresses unavailable");
        return HouseAddresses::new();
    }

    let root = PakArchive::open(&path, keys)
        .map_err(anyhow::Error::from)
        .and_then(|archive| {
            archive
                .unpack(HOUSE_ADDRESS_XML)?
                .with_context(|| format!("no {HOUSE_ADDRESS_XML}"))
        })
        .and_then(|data| Ok(xml::parse(&data)?));

    match root {
        Ok(root) => parse_house_addresses(&root),
        Err(e) => {
            tracing::warn!(archive = ?path, "house addresses unavailable: {e:#}");
            HouseAddresses::new()
        }
    }
}

/// Directory names under `Levels/`, minus the shared content folder
fn level_folders(levels_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(levels_dir)
        .with_context(|| format!("Failed to list levels: {}", levels_dir.display()))?;
    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.eq_ignore_ascii_case(COMMON_FOLDER) {
            folders.push(name);
        }
    }
    folders.sort();
    Ok(folders)
}

fn find_level_pak(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(LEVEL_PAK))
        .map(|entry| entry.path())
}
