//! geobuilder.toml configuration
//!
//! Every section is optional; command-line flags override the file.

use aion_cgf::{DEFAULT_SECOND_STATE_TICK, MaterialTable};
use aion_pak::DecryptKey;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default config file name looked up by the CLI
pub const DEFAULT_CONFIG_FILE: &str = "geobuilder.toml";

/// Meshes that decode but must never end up in the output
pub const DEFAULT_IGNORED_MESHES: &[&str] = &[
    "objects/npc/level_object/idyun_bridge/idyun_bridge_01a.cga",
    "levels/common/light/structures/props/exterior/pr_l_caldron.cgf",
];

/// geobuilder.toml structure
#[derive(Debug, Default, Deserialize)]
pub struct GeoConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub archive: ArchiveSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub materials: MaterialsSection,
    #[serde(default)]
    pub terrain: TerrainSection,
}

/// Client installation
#[derive(Debug, Default, Deserialize)]
pub struct ClientSection {
    /// Root of the client installation (contains `Levels/`, `Data/`, `Objects/`)
    pub path: Option<PathBuf>,

    /// Server `world_maps.xml` replacing the client's `worldid.xml`
    pub world_maps: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("out")
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveSection {
    /// Candidate decryption keys, tried in order
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

/// One decryption key table
#[derive(Debug, Deserialize)]
pub struct KeyEntry {
    /// Raw binary key table
    pub table: PathBuf,

    /// Mask applied to the compressed size to find the table offset
    pub offset_mask: u32,
}

#[derive(Debug, Deserialize)]
pub struct BuildSection {
    /// Restrict the run to one level id
    pub level: Option<String>,

    /// Worker threads (default: available parallelism)
    pub threads: Option<usize>,

    /// Animation tick sampled for the opened state of doors
    #[serde(default = "default_second_state_tick")]
    pub second_state_tick: i32,

    /// Mesh names never published to the demand set
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Keep every terrain surface material, not only intention materials
    #[serde(default)]
    pub all_terrain_materials: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            level: None,
            threads: None,
            second_state_tick: default_second_state_tick(),
            ignore: default_ignore(),
            all_terrain_materials: false,
        }
    }
}

fn default_second_state_tick() -> i32 {
    DEFAULT_SECOND_STATE_TICK
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORED_MESHES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialsSection {
    /// TOML dictionary replacing the built-in material table
    pub dictionary: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TerrainSection {
    /// Write `<id>.png` heightmaps next to the geo files
    #[serde(default)]
    pub export_images: bool,

    /// Command run on each written image, e.g. "oxipng -o 4"
    pub optimizer: Option<String>,
}

/// Material dictionary file
///
/// ```toml
/// intention = [11, 12, 13]
///
/// [materials]
/// mat_default = 0
/// mat_lava = 11
/// ```
#[derive(Debug, Deserialize)]
struct MaterialDictionary {
    #[serde(default)]
    intention: Vec<i32>,
    materials: BTreeMap<String, i32>,
}

impl GeoConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse config from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse geobuilder.toml")
    }

    /// Validate config fields
    pub fn validate(&self) -> Result<()> {
        if self.archive.keys.is_empty() {
            anyhow::bail!("No decryption keys configured (add [[archive.keys]] entries)");
        }
        if self.build.threads == Some(0) {
            anyhow::bail!("Invalid build.threads 0 (must be at least 1)");
        }
        if let Some(level) = &self.build.level
            && (level.is_empty() || !level.chars().all(|c| c.is_ascii_digit()))
        {
            anyhow::bail!("Invalid build.level {level:?} (must be a numeric level id)");
        }
        if let Some(optimizer) = &self.terrain.optimizer
            && optimizer.split_whitespace().next().is_none()
        {
            anyhow::bail!("terrain.optimizer is set but empty");
        }
        Ok(())
    }

    /// Read every configured key table
    pub fn load_keys(&self) -> Result<Vec<DecryptKey>> {
        self.archive
            .keys
            .iter()
            .map(|entry| {
                DecryptKey::from_file(&entry.table, entry.offset_mask)
                    .with_context(|| format!("Failed to load key table: {}", entry.table.display()))
            })
            .collect()
    }

    /// Material table from the configured dictionary, or the built-in one
    pub fn material_table(&self) -> Result<MaterialTable> {
        match &self.materials.dictionary {
            Some(path) => load_material_table(path),
            None => Ok(MaterialTable::builtin()),
        }
    }
}

/// Load a TOML material dictionary
pub fn load_material_table(path: &Path) -> Result<MaterialTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read material dictionary: {}", path.display()))?;
    parse_material_table(&content)
        .with_context(|| format!("Invalid material dictionary: {}", path.display()))
}

fn parse_material_table(content: &str) -> Result<MaterialTable> {
    let dictionary: MaterialDictionary = toml::from_str(content)?;
    if let Some(id) = dictionary.intention.iter().find(|&&id| !(0..=255).contains(&id)) {
        anyhow::bail!("intention id {id} does not fit in a byte");
    }
    Ok(MaterialTable::new(dictionary.materials, dictionary.intention))
}
