//! mission_mission0.xml entities

use super::{
    MeshDemand, Placement, PlacementError, PlacementKind, SECOND_STATE_SUFFIX, format_err, from_rows,
    sanitize_path,
};
use crate::xml::XmlNode;
use glam::{Mat3, Vec3};
use hashbrown::HashMap;

/// House address name to id, from client_housing_address.xml
pub type HouseAddresses = HashMap<String, i32>;

/// Entity classes placed like a plain placeable object
const PLACEABLE_CLASSES: &[&str] = &[
    "PlaceableObject",
    "AbyssArtifacts",
    "AbyssShield",
    "AbyssDoor",
    "tailoring",
    "weapon_craft",
    "handiwork",
    "armor_craft",
    "menuisier",
    "alchemy",
    "cooking",
];

/// Highest town growth stage
pub const MAX_TOWN_STAGE: u8 = 5;

/// Position, angles (degrees) and scale shared by all entities
#[derive(Debug, Clone, Copy, PartialEq)]
struct EntityTransform {
    position: Vec3,
    /// Pitch, yaw and roll
    angles: Vec3,
    scale: Vec3,
}

impl EntityTransform {
    fn read(entity: &XmlNode) -> Result<Self, PlacementError> {
        let position = entity
            .attr("Pos")
            .ok_or_else(|| format_err("entity without Pos"))
            .and_then(|raw| parse_vec3(raw, "Pos"))?;
        let angles = match entity.attr("Angles") {
            Some(raw) => parse_vec3(raw, "Angles")?,
            None => Vec3::ZERO,
        };
        let scale = match entity.attr("Scale") {
            Some(raw) => parse_vec3(raw, "Scale")?,
            None => Vec3::ONE,
        };
        Ok(Self {
            position,
            angles,
            scale,
        })
    }

    /// `yaw * pitch * roll` in the document's row-vector convention, as a
    /// column-vector rotation
    fn rotation(&self) -> Mat3 {
        let (sp, cp) = self.angles.x.to_radians().sin_cos();
        let (sy, cy) = self.angles.y.to_radians().sin_cos();
        let (sr, cr) = self.angles.z.to_radians().sin_cos();
        let pitch = from_rows([[1.0, 0.0, 0.0], [0.0, cp, sp], [0.0, -sp, cp]]);
        let yaw = from_rows([[cy, 0.0, -sy], [0.0, 1.0, 0.0], [sy, 0.0, cy]]);
        let roll = from_rows([[cr, sr, 0.0], [-sr, cr, 0.0], [0.0, 0.0, 1.0]]);
        (yaw * pitch * roll).transpose()
    }

    fn place(&self, mesh: &str, kind: PlacementKind, field: u16, sub_level: u8) -> Placement {
        Placement {
            mesh: mesh.to_string(),
            position: self.position,
            rotation: self.rotation(),
            scale: self.scale,
            kind,
            field,
            sub_level,
        }
    }
}

fn parse_vec3(raw: &str, what: &str) -> Result<Vec3, PlacementError> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format_err(format!("{what} is not a float list: {raw:?}")))?;
    match values[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(format_err(format!("{what} needs 3 components: {raw:?}"))),
    }
}

fn parse_int(node: &XmlNode, name: &str) -> Result<i32, PlacementError> {
    let raw = node
        .attr(name)
        .ok_or_else(|| format_err(format!("{} without {name}", node.name)))?;
    raw.trim()
        .parse()
        .map_err(|_| format_err(format!("{name} is not an integer: {raw:?}")))
}

/// Non-empty sanitized attribute value
fn mesh_attr(node: &XmlNode, name: &str) -> Option<String> {
    node.attr(name)
        .map(sanitize_path)
        .filter(|mesh| !mesh.is_empty())
}

/// Stage `stage` of a town mesh (names reference stage 1)
pub fn town_stage_mesh(base: &str, stage: u8) -> String {
    base.replace("_01.cgf", &format!("_0{stage}.cgf"))
}

/// Collects placements and demand while walking entities
#[derive(Default)]
struct MissionDecoder {
    placements: Vec<Placement>,
    demand: MeshDemand,
}

/// Decode the entities of a mission document
pub fn decode_mission(
    root: &XmlNode,
    addresses: &HouseAddresses,
) -> Result<(Vec<Placement>, MeshDemand), PlacementError> {
    let mut decoder = MissionDecoder::default();
    let Some(objects) = root.child("Objects") else {
        return Ok((decoder.placements, decoder.demand));
    };

    for entity in objects.children_named("Entity") {
        let class = entity.attr("EntityClass").unwrap_or("");
        let Some(properties) = entity.child("Properties") else {
            continue;
        };

        if class.eq_ignore_ascii_case("Door") {
            decoder.door(entity, properties)?;
        } else if PLACEABLE_CLASSES.iter().any(|c| c.eq_ignore_ascii_case(class)) {
            decoder.placeable(entity, properties)?;
        } else if class.eq_ignore_ascii_case("BasicEntity") {
            decoder.basic(entity, properties)?;
        } else if class.eq_ignore_ascii_case("TownObject") {
            decoder.town(entity, properties)?;
        } else if class.eq_ignore_ascii_case("HousingBuilding") {
            decoder.house(entity, properties, addresses)?;
        }
    }
    Ok((decoder.placements, decoder.demand))
}

impl MissionDecoder {
    fn door(&mut self, entity: &XmlNode, properties: &XmlNode) -> Result<(), PlacementError> {
        let Some(mesh) = mesh_attr(properties, "object_AnimatedModel") else {
            return Ok(());
        };
        let id = parse_int(entity, "EntityId")? as u16;
        let transform = EntityTransform::read(entity)?;

        self.placements.push(transform.place(&mesh, PlacementKind::Door, id, 0));
        let opened = format!("{mesh}{SECOND_STATE_SUFFIX}");
        self.placements.push(transform.place(&opened, PlacementKind::Door2, id, 0));
        self.demand.required.push(mesh.clone());
        self.demand.doors.push(mesh);
        Ok(())
    }

    fn placeable(&mut self, entity: &XmlNode, properties: &XmlNode) -> Result<(), PlacementError> {
        let Some(mesh) = mesh_attr(properties, "fileLadderCGF").filter(|m| !m.ends_with(".saf"))
        else {
            return Ok(());
        };
        let id = parse_int(entity, "EntityId")? as u16;
        let transform = EntityTransform::read(entity)?;
        self.placements.push(transform.place(&mesh, PlacementKind::Placeable, id, 0));
        self.demand.required.push(mesh);
        Ok(())
    }

    fn basic(&mut self, entity: &XmlNode, properties: &XmlNode) -> Result<(), PlacementError> {
        let Some(mesh) = mesh_attr(properties, "object_Model").filter(|m| !m.ends_with(".saf"))
        else {
            return Ok(());
        };
        if mesh.ends_with(".cga") {
            return Ok(());
        }
        let transform = EntityTransform::read(entity)?;

        let event = entity.attr("EventType").filter(|e| !e.is_empty());
        let placement = match event {
            Some(event) => {
                let mask = match event.rsplit_once('_').map(|(_, mask)| mask) {
                    Some("1") => 1,
                    Some("2") => 2,
                    Some("4") => 4,
                    Some("8") => 8,
                    _ => {
                        return Err(format_err(format!(
                            "unknown event type {event:?} on basic entity {}",
                            entity.attr("EntityId").unwrap_or("?")
                        )));
                    }
                };
                self.demand.event.push(mesh.clone());
                transform.place(&mesh, PlacementKind::Event, mask, 0)
            }
            None => transform.place(&mesh, PlacementKind::None, 0, 0),
        };
        self.placements.push(placement);
        self.demand.required.push(mesh);
        Ok(())
    }

    fn town(&mut self, entity: &XmlNode, properties: &XmlNode) -> Result<(), PlacementError> {
        let Some(mesh) = mesh_attr(properties, "object_Model").filter(|m| !m.ends_with(".saf"))
        else {
            return Ok(());
        };
        let transform = EntityTransform::read(entity)?;
        let level = parse_int(properties, "Level")?.clamp(1, i32::from(MAX_TOWN_STAGE)) as u8;
        let town_id = parse_int(properties, "TownID")? as u16;

        self.placements.push(transform.place(&mesh, PlacementKind::Town, town_id, level));
        self.demand.required.push(town_stage_mesh(&mesh, level));
        for stage in level + 1..=MAX_TOWN_STAGE {
            self.demand.optional.push(town_stage_mesh(&mesh, stage));
        }
        Ok(())
    }

    fn house(
        &mut self,
        entity: &XmlNode,
        properties: &XmlNode,
        addresses: &HouseAddresses,
    ) -> Result<(), PlacementError> {
        let transform = EntityTransform::read(entity)?;
        let address = match properties.attr("address_Address").filter(|a| !a.is_empty()) {
            Some(name) => addresses.get(name).copied().unwrap_or_else(|| {
                tracing::debug!(address = name, "house address not found");
                -1
            }),
            None => -1,
        };
        let field = address as u16;

        let Some(parts) = properties.child("PartsInfo") else {
            return Ok(());
        };
        let land: Vec<String> = parts
            .child("Land")
            .map(|land| {
                ["housingobjFence", "housingobjGarden"]
                    .iter()
                    .filter_map(|attr| mesh_attr(land, attr))
                    .collect()
            })
            .unwrap_or_default();

        let mut door = None;
        let mut build = Vec::new();
        let mut build_transform = transform;
        if let Some(parts_build) = parts.child("Build") {
            let offset = match properties
                .child("BuildInfo")
                .and_then(|info| info.attr("vectorBuild_Offset"))
                .filter(|raw| !raw.is_empty())
            {
                Some(raw) => parse_vec3(raw, "vectorBuild_Offset")?,
                None => Vec3::ZERO,
            };
            build_transform.position += transform.rotation() * offset;

            door = mesh_attr(parts_build, "housingobjDoor");
            build.extend(door.clone());
            for attr in ["housingobjFrame", "housingobjOutWall", "housingobjRoof"] {
                build.extend(mesh_attr(parts_build, attr));
            }
            for i in 1..=5 {
                build.extend(mesh_attr(parts_build, &format!("housingobjInFloor{i}")));
                build.extend(mesh_attr(parts_build, &format!("housingobjInWall{i}")));
            }
        }

        for (meshes, placed) in [(&land, &transform), (&build, &build_transform)] {
            for mesh in meshes {
                let kind = if door.as_ref() == Some(mesh) {
                    PlacementKind::HouseDoor
                } else {
                    PlacementKind::House
                };
                self.placements.push(placed.place(mesh, kind, field, 0));
                self.demand.required.push(mesh.clone());
            }
        }
        Ok(())
    }
}

/// Read client_housing_address.xml
///
/// Entries without a name or id are skipped; for duplicated names the first
/// entry wins.
pub fn parse_house_addresses(root: &XmlNode) -> HouseAddresses {
    let mut addresses = HouseAddresses::new();
    for entry in root.children_named("client_housing_address") {
        let (Some(name), Some(id)) = (entry.child_text("name"), entry.child_text("id")) else {
            continue;
        };
        let name = name.trim();
        let Ok(id) = id.trim().parse::<i32>() else {
            tracing::warn!(name, id, "house address id is not a number");
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if addresses.contains_key(name) {
            tracing::warn!(name, "duplicate house name in client_housing_address.xml");
            continue;
        }
        addresses.insert(name.to_string(), id);
    }
    addresses
}
