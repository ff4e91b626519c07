//! leveldata.xml: heightmap metrics, vegetation and surface materials

use super::{PlacementError, format_err, sanitize_path};
use crate::xml::XmlNode;
use aion_cgf::MaterialTable;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelData {
    pub heightmap_x: u32,
    pub heightmap_y: u32,
    pub unit_size: u32,
    /// Vegetation meshes indexed by objects.lst records
    pub vegetation: Vec<String>,
    /// Terrain surface material names indexed by the h32 surface byte
    pub surface_materials: Vec<String>,
}

impl LevelData {
    /// World extent covered by the heightmap
    pub fn map_size(&self) -> (f32, f32) {
        (
            self.heightmap_x as f32 * self.unit_size as f32,
            self.heightmap_y as f32 * self.unit_size as f32,
        )
    }

    /// Material id per surface index
    ///
    /// Only intention materials are kept unless `all` is set; everything else
    /// (and unknown names) becomes 0.
    pub fn terrain_materials(&self, table: &MaterialTable, all: bool) -> Vec<u8> {
        self.surface_materials
            .iter()
            .map(|name| {
                let id = table.id_of(name);
                if all || table.is_intention(id) {
                    u8::try_from(id).unwrap_or(0)
                } else {
                    0
                }
            })
            .collect()
    }
}

/// Read level data from its document root
pub fn decode_level_data(root: &XmlNode) -> Result<LevelData, PlacementError> {
    let info = if root.name == "LevelInfo" {
        root
    } else {
        root.child("LevelInfo")
            .ok_or_else(|| format_err("leveldata has no LevelInfo"))?
    };

    let heightmap_x = dimension(info, "HeightmapXSize")?;
    let heightmap_y = dimension(info, "HeightmapYSize")?;
    let unit_size = dimension(info, "HeightmapUnitSize")?;

    let vegetation = root
        .child("Vegetation")
        .map(|v| {
            v.children_named("Object")
                .map(|o| sanitize_path(o.attr("FileName").unwrap_or("")))
                .collect()
        })
        .unwrap_or_default();

    let surface_materials = root
        .child("SurfaceTypes")
        .map(|s| {
            s.children
                .iter()
                .map(|t| t.attr("Material").unwrap_or("").trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(LevelData {
        heightmap_x,
        heightmap_y,
        unit_size,
        vegetation,
        surface_materials,
    })
}

fn dimension(info: &XmlNode, name: &str) -> Result<u32, PlacementError> {
    let raw = info
        .attr(name)
        .ok_or_else(|| format_err(format!("LevelInfo is missing {name}")))?;
    raw.trim()
        .parse()
        .map_err(|_| format_err(format!("LevelInfo {name} is not a size: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    const LEVEL_DATA: &str = r#"<LevelData>
  <LevelInfo HeightmapXSize="1024" HeightmapYSize="512" HeightmapUnitSize="2"/>
  <SurfaceTypes>
    <SurfaceType Name="grass" Material="mat_grass"/>
    <SurfaceType Name="lava" Material=" mat_lava "/>
    <SurfaceType Name="unknown" Material="does_not_exist"/>
  </SurfaceTypes>
  <Vegetation>
    <Object FileName="Levels\Common\Tree_A.cgf"/>
    <Object FileName="levels/common/bush.cgf."/>
  </Vegetation>
</LevelData>"#;

    #[test]
    fn test_decode_level_data() {
        let level = decode_level_data(&xml::parse(LEVEL_DATA.as_bytes()).unwrap()).unwrap();

        assert_eq!(level.heightmap_x, 1024);
        assert_eq!(level.heightmap_y, 512);
        assert_eq!(level.map_size(), (2048.0, 1024.0));
        assert_eq!(level.vegetation, ["levels/common/tree_a.cgf", "levels/common/bush.cgf"]);
        assert_eq!(level.surface_materials, ["mat_grass", "mat_lava", "does_not_exist"]);
    }

    #[test]
    fn test_terrain_materials() {
        let level = decode_level_data(&xml::parse(LEVEL_DATA.as_bytes()).unwrap()).unwrap();
        let table = MaterialTable::new(
            [("mat_grass".to_string(), 3), ("mat_lava".to_string(), 11)],
            [11],
        );

        assert_eq!(level.terrain_materials(&table, false), [0, 11, 0]);
        assert_eq!(level.terrain_materials(&table, true), [3, 11, 0]);
    }

    #[test]
    fn test_missing_level_info() {
        let root = xml::parse(b"<LevelData/>").unwrap();
        assert!(matches!(decode_level_data(&root), Err(PlacementError::Format(_))));
    }
}
