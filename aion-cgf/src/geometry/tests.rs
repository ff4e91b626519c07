//! Tests for geometry decoding and traversal

use glam::Vec3;

use crate::*;

const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]];

fn table() -> MaterialTable {
    MaterialTable::builtin()
}

fn load(builder: &CgfBuilder) -> Result<Geometry, CgfError> {
    Geometry::load(&builder.build(), &table())
}

/// One collideable triangle on a top-level node
fn single_triangle() -> (CgfBuilder, i32) {
    let mut b = CgfBuilder::new();
    let mat = b.material("lib/mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let mut node = NodeSpec::new("box", mesh);
    node.material = mat;
    let node = b.node(&node);
    (b, node)
}

fn assert_close(a: Vec3, b: Vec3) {
    assert!(a.abs_diff_eq(b, 1e-5), "{a} != {b}");
}

#[test]
fn test_invalid_magic() {
    let result = Geometry::load(b"NotAion\0\0\0\0\0", &table());
    assert!(matches!(result, Err(CgfError::InvalidMagic)));
}

#[test]
fn test_animation_file_rejected() {
    let data = CgfBuilder::new().build_with_type(FILE_TYPE_ANIMATION);
    assert!(matches!(
        Geometry::load(&data, &table()),
        Err(CgfError::AnimationUnsupported)
    ));

    let data = CgfBuilder::new().build_with_type(0x1234_5678);
    assert!(matches!(Geometry::load(&data, &table()), Err(CgfError::Format(_))));
}

#[test]
fn test_truncated_file() {
    let (b, _) = single_triangle();
    let data = b.build();
    let result = Geometry::load(&data[..data.len() / 2], &table());
    assert!(result.is_err());
}

#[test]
fn test_single_triangle() {
    let (b, _) = single_triangle();
    let geometry = load(&b).unwrap();
    assert_eq!(geometry.roots().len(), 1);

    let records = geometry.traverse();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.material_id, 0);
    assert_eq!(record.intention, CollisionIntention::PHYSICAL);
    assert_eq!(record.faces, vec![[0, 1, 2]]);
    assert_close(record.vertices[1], Vec3::new(1.0, 0.0, 0.0));
    assert_close(record.vertices[2], Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_faces_split_by_material() {
    let mut b = CgfBuilder::new();
    let plain = b.material("mat_default", 1, true, &[]);
    let _lava = b.material("lib/mats/mat_lava\u{5}glow", 1, false, &[]);
    let _ignored = b.material("mat_grass", 1, false, &[]);
    let mesh = b.mesh(
        &[[0.0; 3], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0], [0.0, 0.0, 100.0]],
        &[([0, 1, 2], 1), ([0, 1, 3], 0), ([0, 2, 3], 1), ([1, 2, 3], 2)],
    );
    let mut node = NodeSpec::new("mixed", mesh);
    node.material = plain;
    b.node(&node);

    let geometry = load(&b).unwrap();
    let records = geometry.traverse();
    assert_eq!(records.len(), 2);
    // first seen: lava
    assert_eq!(records[0].material_id, 12);
    assert_eq!(records[0].intention, CollisionIntention::MATERIAL);
    assert_eq!(records[0].faces, vec![[0, 1, 2], [0, 2, 3]]);
    assert_eq!(records[1].material_id, 0);
    assert_eq!(records[1].intention, CollisionIntention::PHYSICAL);
    assert_eq!(records[1].faces, vec![[0, 1, 3]]);
}

#[test]
fn test_irrelevant_node_skipped() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_grass", 1, false, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let mut node = NodeSpec::new("decoration", mesh);
    node.material = mat;
    b.node(&node);

    let geometry = load(&b).unwrap();
    assert!(geometry.traverse().is_empty());
    // the face was filtered at load
    let NodePayload::Mesh(mesh) = &geometry.nodes()[0].payload else {
        panic!("expected mesh payload");
    };
    assert!(mesh.faces.is_empty());
}

#[test]
fn test_composite_material_resolution() {
    let mut b = CgfBuilder::new();
    let unknown = b.material("mat_whatever", 0, false, &[]);
    let lava = b.material("mat_lava", 1, false, &[]);
    let solid = b.material("mat_stone_tough", 1, true, &[]);
    let inner = b.material("inner", 2, false, &[solid]);
    let outer = b.material("outer", 2, false, &[-1, unknown, inner, lava]);

    let geometry = load(&b).unwrap();
    let outer = geometry.material(outer as usize).unwrap();
    assert!(outer.collideable);
    assert_eq!(outer.semantic_id, Some(12));
    // composites never take face slots
    assert_eq!(geometry.slots(), &[0, 1, 2]);
}

#[test]
fn test_material_cycle_rejected() {
    let mut b = CgfBuilder::new();
    // a composite listing itself as a child
    b.material("loop", 2, false, &[0]);
    assert!(matches!(load(&b), Err(CgfError::Format(_))));
}

#[test]
fn test_unhandled_material_type_rejected() {
    let mut b = CgfBuilder::new();
    let odd = b.material("odd", 7, false, &[]);
    b.material("outer", 2, false, &[odd]);
    assert!(matches!(load(&b), Err(CgfError::Format(_))));
}

#[test]
fn test_face_index_out_of_range() {
    let mut b = CgfBuilder::new();
    b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 3], 0)]);
    b.node(&NodeSpec::new("bad", mesh));
    assert!(matches!(load(&b), Err(CgfError::Format(_))));

    let mut b = CgfBuilder::new();
    b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 4)]);
    b.node(&NodeSpec::new("bad", mesh));
    assert!(matches!(load(&b), Err(CgfError::Format(_))));
}

#[test]
fn test_node_object_must_be_mesh_or_helper() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    b.node(&NodeSpec::new("broken", mat));
    assert!(matches!(load(&b), Err(CgfError::Format(_))));
}

#[test]
fn test_node_linking() {
    let (mut b, root) = single_triangle();
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);

    let mut child = NodeSpec::new("child", mesh);
    child.parent = root;
    b.node(&child);
    let mut orphan = NodeSpec::new("orphan", mesh);
    orphan.parent = 77;
    b.node(&orphan);

    let geometry = load(&b).unwrap();
    assert_eq!(geometry.roots(), &[0]);
    assert_eq!(geometry.nodes()[0].children, vec![1]);
    assert!(geometry.nodes()[2].children.is_empty());
}

#[test]
fn test_self_parent_rejected() {
    let mut b = CgfBuilder::new();
    let mesh = b.mesh(&TRIANGLE, &[]);
    let mut node = NodeSpec::new("selfish", mesh);
    // the node will be chunk 1
    node.parent = 1;
    b.node(&node);
    assert!(matches!(load(&b), Err(CgfError::Format(_))));
}

#[test]
fn test_dummy_helper_offsets_children() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let dummy = b.helper(HELPER_DUMMY, [0.0; 3]);

    let mut pivot = NodeSpec::new("pivot", dummy);
    pivot.position = [200.0, 0.0, 0.0];
    let pivot = b.node(&pivot);

    let mut child = NodeSpec::new("child", mesh);
    child.parent = pivot;
    child.material = mat;
    child.position = [0.0, 0.0, 100.0];
    b.node(&child);

    let records = load(&b).unwrap().traverse();
    assert_eq!(records.len(), 1);
    assert_close(records[0].vertices[0], Vec3::new(2.0, 0.0, 1.0));
}

#[test]
fn test_group_head_unscales_offset() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let dummy = b.helper(HELPER_DUMMY, [0.0; 3]);

    let mut pivot = NodeSpec::new("pivot", dummy);
    pivot.position = [200.0, 0.0, 0.0];
    pivot.scale = [2.0, 1.0, 1.0];
    pivot.group_head = true;
    let pivot = b.node(&pivot);

    let mut child = NodeSpec::new("child", mesh);
    child.parent = pivot;
    child.material = mat;
    b.node(&child);

    let geometry = load(&b).unwrap();
    // collideable through its child
    assert!(geometry.is_collideable(0));
    let records = geometry.traverse();
    assert_close(records[0].vertices[0], Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_non_dummy_helper_skipped() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let light = b.helper(3, [0.0; 3]);
    let parent = b.node(&NodeSpec::new("light", light));
    let mut child = NodeSpec::new("child", mesh);
    child.parent = parent;
    child.material = mat;
    b.node(&child);

    assert!(load(&b).unwrap().traverse().is_empty());
}

fn door(position_keys: &[(i32, [f32; 9])]) -> CgfBuilder {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let controller = b.controller(CONTROLLER_TCB3, position_keys);
    let mut node = NodeSpec::new("door", mesh);
    node.material = mat;
    node.controllers[0] = controller;
    b.node(&node);
    b
}

fn key(time: i32, x: f32) -> (i32, [f32; 9]) {
    (time, [x, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
}

#[test]
fn test_snapshot_moves_node() {
    let b = door(&[key(0, 0.0), key(100, 300.0), key(2_000_000, 900.0)]);
    let geometry = load(&b).unwrap();

    let closed = geometry.traverse();
    let opened = geometry.snapshot_at_tick(DEFAULT_SECOND_STATE_TICK).unwrap().traverse();
    assert_close(closed[0].vertices[0], Vec3::ZERO);
    assert_close(opened[0].vertices[0], Vec3::new(3.0, 0.0, 0.0));

    // the original is untouched
    assert_eq!(geometry.traverse(), closed);
}

#[test]
fn test_snapshot_before_first_key_is_unchanged() {
    let b = door(&[key(10, 500.0)]);
    let geometry = load(&b).unwrap();
    let early = geometry.snapshot_at_tick(5).unwrap();
    assert_eq!(early.traverse(), geometry.traverse());
}

#[test]
fn test_snapshot_rotation_rebuilds_basis() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    let half_turn = std::f32::consts::FRAC_PI_2;
    let rotation = b.controller(
        CONTROLLER_TCBQ,
        &[(0, [0.0, 0.0, 1.0, half_turn, 0.0, 0.0, 0.0, 0.0, 0.0])],
    );
    let mut node = NodeSpec::new("hinge", mesh);
    node.material = mat;
    node.controllers[1] = rotation;
    b.node(&node);

    let geometry = load(&b).unwrap();
    let opened = geometry.snapshot_at_tick(0).unwrap().traverse();
    assert_close(opened[0].vertices[1], Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_invalid_track_fails_only_when_sampled() {
    let mut b = CgfBuilder::new();
    let mat = b.material("mat_default", 1, true, &[]);
    let mesh = b.mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    // wrong controller type for a position track
    let controller = b.controller(CONTROLLER_TCBQ, &[(0, [0.0; 9])]);
    let mut node = NodeSpec::new("door", mesh);
    node.material = mat;
    node.controllers[0] = controller;
    b.node(&node);

    let geometry = load(&b).unwrap();
    assert_eq!(geometry.traverse().len(), 1);
    assert!(matches!(
        geometry.nodes()[0].position_track.as_deref(),
        Some(Track::Invalid(_))
    ));
    assert!(matches!(geometry.snapshot_at_tick(10), Err(CgfError::Format(_))));
}

#[test]
fn test_bones_filtered_and_transformed() {
    let mut b = CgfBuilder::new();
    b.material("mat_default", 1, true, &[]);
    let names = ["Bone01", "FX_spark", "hitbox"];
    b.bone_names(&names);
    let offset = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 500.0];
    b.bone_initial(&[offset, offset, offset]);
    let mesh = b.bone_mesh(&TRIANGLE, &[([0, 1, 2], 0)]);
    b.bone_anim(&[(1, -1, mesh), (2, 1, mesh), (3, 1, mesh)]);

    let geometry = load(&b).unwrap();
    assert_eq!(geometry.bones().len(), 1);
    assert_eq!(geometry.bones()[0].name, "Bone01");

    let records = geometry.traverse();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].intention, CollisionIntention::PHYSICAL);
    assert_close(records[0].vertices[0], Vec3::new(0.0, 0.0, 5.0));
}

#[test]
fn test_semantic_name() {
    use super::load::semantic_name;
    assert_eq!(semantic_name("lib/mats/mat_lava"), "mat_lava");
    assert_eq!(semantic_name("a/b/mat_lava\u{5}suffix"), "mat_lava");
    assert_eq!(semantic_name("mat-wo od!"), "matwood");
}
