//! Near-plane clipping in surface tiling
//!
//! Camera at the origin looking down -Z with a 90 degree field of view. The
//! screen plane sits half a unit in front of the eye, and the 64x64 pixel
//! output is an 8x8 grid of tiles.
use glam::Vec3;
use tile_visibility::camera::{Camera, TileProjection};
use tile_visibility::config::{SceneConfig, TilingConfig};
use tile_visibility::rendering::projection::{project_bounds, stile, SurfaceGeometry, VertexScratch};
use tile_visibility::rendering::{ElementSource, FrameArena, TileBounds};
use tile_visibility::scene::{BoundingPolyhedron, DescriptorId, NodeId};

fn setup() -> (TileProjection, TileBounds, VertexScratch) {
    let config = SceneConfig {
        x_res: 64,
        y_res: 64,
        ..Default::default()
    };
    let projection = TileProjection::new(&Camera::new(Vec3::ZERO), &config);
    let bounds = TileBounds::new(config.tiles_in_row(), config.tiles_in_col());
    (projection, bounds, VertexScratch::new(32))
}

fn tile(bounds: &mut TileBounds, poly: &BoundingPolyhedron) {
    let (projection, _, mut scratch) = setup();
    project_bounds(
        bounds,
        &mut scratch,
        &projection,
        &TilingConfig::default(),
        &poly.verts,
        &poly.edges,
    );
}

#[test]
fn test_floor_crossing_the_screen_plane() {
    // A strip of floor from far in front of the camera to behind it
    let floor = BoundingPolyhedron::cuboid(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, -1.0, 5.0));
    let (_, mut bounds, _) = setup();
    tile(&mut bounds, &floor);

    // Far edge sits just below the horizon
    assert!(bounds.is_covered(4, 4));
    assert!(!bounds.is_covered(3, 4));
    // The bottom row is reached only through the clip points on the plane
    assert!(bounds.is_covered(7, 1));
    assert!(bounds.is_covered(7, 4));
    assert!(bounds.is_covered(7, 6));
    // Upper corners stay empty
    assert!(!bounds.is_covered(0, 0));
    assert!(!bounds.is_covered(2, 7));
}

#[test]
fn test_camera_inside_box_covers_every_tile() {
    let room = BoundingPolyhedron::cuboid(Vec3::splat(-1.0), Vec3::splat(1.0));
    let (_, mut bounds, _) = setup();
    tile(&mut bounds, &room);

    for row in 0..8 {
        for col in 0..8 {
            assert!(bounds.is_covered(row, col), "tile ({row}, {col}) not covered");
        }
    }
}

#[test]
fn test_box_entirely_behind_covers_nothing() {
    let behind = BoundingPolyhedron::cuboid(Vec3::new(-3.0, -3.0, 1.0), Vec3::new(3.0, 3.0, 4.0));
    let (_, mut bounds, _) = setup();
    tile(&mut bounds, &behind);
    assert_eq!(bounds.spans().count(), 0);
}

#[test]
fn test_behind_vertices_do_not_mirror_into_view() {
    // Near end in front and left of center, far end behind and to the
    // right. Projecting the behind end directly would mirror it to the left.
    let slab = BoundingPolyhedron::quad(
        Vec3::new(2.55, 0.25, 2.0),
        Vec3::new(3.45, 0.0, 6.0),
        Vec3::new(0.0, 0.25, 0.0),
    );
    let (_, mut bounds, _) = setup();
    tile(&mut bounds, &slab);

    let covered: Vec<_> = bounds.spans().collect();
    assert!(!covered.is_empty());
    assert!(covered.iter().all(|&(_, lo, _)| lo >= 3), "mirrored coverage: {covered:?}");
    // The crossing edges meet the plane past the right border
    assert!(covered.iter().any(|&(_, _, hi)| hi == 7));
}

#[test]
fn test_stile_emits_row_major_elements() {
    let (projection, mut bounds, mut scratch) = setup();
    let mut arena = FrameArena::new(0, 256);
    let floor = BoundingPolyhedron::cuboid(Vec3::new(-1.0, -1.0, -10.0), Vec3::new(1.0, -1.0, 5.0));
    let geometry = SurfaceGeometry {
        node: NodeId(3),
        descriptor: DescriptorId(11),
        verts: &floor.verts,
        edges: &floor.edges,
    };
    let head = stile(
        &mut arena,
        &mut bounds,
        &mut scratch,
        &projection,
        &TilingConfig::default(),
        &geometry,
    );

    let coords: Vec<_> = arena
        .iter_list(head)
        .map(|(_, e)| {
            let t = e.tile.expect("tile element without coordinate");
            (t.row, t.col)
        })
        .collect();
    assert!(!coords.is_empty());
    assert!(coords.windows(2).all(|w| w[0] < w[1]), "not row-major: {coords:?}");
    assert!(arena
        .iter_list(head)
        .all(|(_, e)| e.payload.node() == NodeId(3) && e.payload.descriptor() == Some(DescriptorId(11))));
}
