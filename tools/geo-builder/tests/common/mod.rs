//! Synthetic client installation for integration tests
//!
//! Layout written by [`Fixture::new`]:
//!
//! ```text
//! client/Data/World/World.pak            WorldId.xml: DF1, Test_Level, DF2 (no folder)
//! client/Levels/DF1/Level.pak            brush.lst, leveldata.xml, mission, land_map.h32
//! client/Levels/Test_Level/level.PAK     brush.lst referencing a mesh nobody ships
//! client/Objects/props/Mesh_Meshes_000.pak  Rock.cgf, Door.cga
//! client/Objects/props/Mesh_Meshes_001.pak  Rock.cgf again
//! keys/test.bin
//! geobuilder.toml
//! ```

#![allow(dead_code)]

use aion_cgf::{CONTROLLER_TCB3, CgfBuilder, NodeSpec};
use aion_pak::{DecryptKey, PakWriter};
use geo_builder::GeoConfig;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DF1: &str = "110010000";
pub const TEST_LEVEL: &str = "110020000";

pub const ROCK: &str = "objects/props/rock.cgf";
pub const DOOR: &str = "objects/props/door.cga";
pub const MISSING: &str = "objects/props/missing.cgf";
pub const OPTIONAL: &str = "objects/props/optional.cgf";

pub const DOOR_ENTITY_ID: u16 = 42;

const OFFSET_MASK: u32 = 31;

pub fn key_table() -> Vec<u8> {
    (0..64u32).map(|i| (i * 7 + 3) as u8).collect()
}

pub fn key() -> DecryptKey {
    DecryptKey::new("test", key_table(), OFFSET_MASK).expect("key table is long enough")
}

pub struct Fixture {
    pub dir: TempDir,
    pub client: PathBuf,
    pub output: PathBuf,
    pub config_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let client = root.join("client");
        let output = root.join("out");

        let key_path = root.join("keys").join("test.bin");
        write(&key_path, &key_table());

        write_pak(
            &client.join("Data/World/World.pak"),
            &[(
                "WorldId.xml",
                br#"<?xml version="1.0" encoding="utf-8"?>
<world_id>
  <data id="110010000">DF1</data>
  <data id="110020000">Test_Level</data>
  <data id="120010000">DF2</data>
</world_id>"#
                    .to_vec(),
            )],
        );

        write_pak(
            &client.join("Levels/DF1/Level.pak"),
            &[
                ("leveldata.xml", LEVEL_DATA.as_bytes().to_vec()),
                ("land_map.h32", flat_heightmap(4, 100)),
                (
                    "brush.lst",
                    encode_brush_list(
                        &["Objects\\Props\\Rock.cgf", "objects/props/missing.cgf."],
                        &[
                            (0, identity_at(10.0, 20.0, 30.0), 0),
                            (1, identity_at(0.0, 0.0, 0.0), 0),
                            (1, identity_at(1.0, 1.0, 1.0), 0),
                        ],
                    ),
                ),
                ("mission_mission0.xml", MISSION.as_bytes().to_vec()),
            ],
        );

        write_pak(
            &client.join("Levels/Test_Level/level.PAK"),
            &[(
                "brush.lst",
                encode_brush_list(&[OPTIONAL], &[(0, identity_at(0.0, 0.0, 0.0), 0)]),
            )],
        );
        std::fs::create_dir_all(client.join("Levels/Common")).expect("Failed to create folder");

        write_pak(
            &client.join("Objects/props/Mesh_Meshes_000.pak"),
            &[("Rock.cgf", rock_cgf()), ("Door.cga", door_cga())],
        );
        write_pak(
            &client.join("Objects/props/Mesh_Meshes_001.pak"),
            &[("Rock.cgf", rock_cgf())],
        );

        let config_path = root.join("geobuilder.toml");
        let config = format!(
            "[client]\npath = '{}'\n\n[output]\npath = '{}'\n\n[[archive.keys]]\ntable = '{}'\noffset_mask = {OFFSET_MASK}\n",
            client.display(),
            output.display(),
            key_path.display()
        );
        write(&config_path, config.as_bytes());

        Self {
            dir,
            client,
            output,
            config_path,
        }
    }

    pub fn config(&self) -> GeoConfig {
        GeoConfig::load(&self.config_path).expect("Failed to load fixture config")
    }

    pub fn geo_file(&self, level: &str) -> PathBuf {
        self.output.join(format!("{level}.geo"))
    }
}

const LEVEL_DATA: &str = r#"<LevelData>
  <LevelInfo HeightmapXSize="2" HeightmapYSize="2" HeightmapUnitSize="1"/>
  <SurfaceTypes><SurfaceType Material="mat_default"/></SurfaceTypes>
</LevelData>"#;

const MISSION: &str = r#"<Mission>
  <Objects>
    <Entity EntityClass="Door" EntityId="42" Pos="5,6,7">
      <Properties object_AnimatedModel="Objects\Props\Door.cga"/>
    </Entity>
    <Entity EntityClass="BasicEntity" EntityId="43" Pos="0,0,0">
      <Properties object_Model="objects/props/missing.cgf"/>
    </Entity>
  </Objects>
</Mission>"#;

fn write(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create folder");
    }
    std::fs::write(path, data).expect("Failed to write fixture file");
}

pub fn write_pak(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let mut writer = PakWriter::new(key());
    for (i, (name, data)) in entries.iter().enumerate() {
        if i % 2 == 0 {
            writer.add_deflated(name, data).expect("Failed to deflate");
        } else {
            writer.add_stored(name, data);
        }
    }
    write(path, &writer.finish());
}

/// `side * side` points of the same height, no cutouts
pub fn flat_heightmap(side: usize, height: i16) -> Vec<u8> {
    let [a, b] = height.to_le_bytes();
    [a, b, 0].repeat(side * side)
}

pub fn identity_at(x: f32, y: f32, z: f32) -> [f32; 12] {
    [1.0, 0.0, 0.0, x, 0.0, 1.0, 0.0, y, 0.0, 0.0, 1.0, z]
}

/// Brush list with block size 17: entries are `(mesh index, matrix, event)`
pub fn encode_brush_list(meshes: &[&str], entries: &[(i32, [f32; 12], i32)]) -> Vec<u8> {
    fn put(out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    let mut out = b"CRY".to_vec();
    put(&mut out, 0);
    put(&mut out, 17);
    put(&mut out, 0);

    put(&mut out, meshes.len() as i32);
    for mesh in meshes {
        put(&mut out, 0);
        let mut name = [0u8; 128];
        name[..mesh.len()].copy_from_slice(mesh.as_bytes());
        out.extend_from_slice(&name);
        put(&mut out, 0);
        out.extend_from_slice(&[0u8; 24]);
    }

    put(&mut out, entries.len() as i32);
    for (mesh_index, matrix, event) in entries {
        put(&mut out, 0);
        put(&mut out, 0);
        put(&mut out, *mesh_index);
        out.extend_from_slice(&[0u8; 12]);
        for v in matrix {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&[0u8; 12]);
        put(&mut out, *event);
        put(&mut out, 0);
        put(&mut out, 0);
    }
    out
}

const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]];

pub fn rock_cgf() -> Vec<u8> {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let mut node = NodeSpec::new("rock", mesh);
    node.material = mat;
    b.node(&node);
    b.build()
}

/// Same triangle as the rock, sliding 3 units along x when opened
pub fn door_cga() -> Vec<u8> {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let slide = b.controller(
        CONTROLLER_TCB3,
        &[
            (0, [0.0; 9]),
            (100, [300.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ],
    );
    let mut node = NodeSpec::new("door", mesh);
    node.material = mat;
    node.controllers[0] = slide;
    b.node(&node);
    b.build()
}

/// One placement record of a geo file
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord {
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 9],
    pub scale: [f32; 3],
    pub kind: u8,
    pub field: u16,
    pub sub_level: u8,
}

struct Reader<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.at..self.at + n];
        self.at += n;
        slice
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take(2).try_into().unwrap())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take(2).try_into().unwrap())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take(4).try_into().unwrap())
    }

    fn f32s<const N: usize>(&mut self) -> [f32; N] {
        std::array::from_fn(|_| f32::from_le_bytes(self.take(4).try_into().unwrap()))
    }

    fn name(&mut self) -> String {
        let len = self.u16() as usize;
        String::from_utf8(self.take(len).to_vec()).unwrap()
    }

    fn done(&self) -> bool {
        self.at >= self.data.len()
    }
}

/// Terrain block kind, flat height or point count, and the placements
pub fn read_geo(data: &[u8]) -> (u8, i32, Vec<GeoRecord>) {
    let mut r = Reader { data, at: 0 };
    let kind = r.u8();
    let terrain = if kind == 0 {
        i32::from(r.i16())
    } else {
        let count = r.i32();
        r.take(count as usize * 3);
        count
    };

    let mut records = Vec::new();
    while !r.done() {
        let name = r.name();
        let position = r.f32s::<3>();
        let rotation = r.f32s::<9>();
        let scale = r.f32s::<3>();
        let kind = r.u8();
        let field = r.u16();
        let sub_level = r.u8();
        assert_eq!(r.u8(), 0, "padding");
        records.push(GeoRecord {
            name,
            position,
            rotation,
            scale,
            kind,
            field,
            sub_level,
        });
    }
    (kind, terrain, records)
}

/// Mesh library keys with the first vertex of their first slot
pub fn read_mesh_library(data: &[u8]) -> Vec<(String, [f32; 3])> {
    let mut r = Reader { data, at: 0 };
    let mut meshes = Vec::new();
    while !r.done() {
        let name = r.name();
        let slots = r.u8();
        let mut first = None;
        for _ in 0..slots {
            let vertices = r.u16() as usize;
            for _ in 0..vertices {
                let v = r.f32s::<3>();
                first.get_or_insert(v);
            }
            let faces = r.u16() as usize;
            let width = r.u8() as usize;
            r.take(faces * 3 * width);
            r.take(2);
        }
        meshes.push((name, first.unwrap_or_default()));
    }
    meshes
}
