//! Full frames through the worker pool
use glam::{Affine3A, Vec3};
use std::collections::HashMap;
use std::sync::Mutex;
use tile_visibility::rendering::{partition, ElemRef, FrameView, ListSlot, RenderBackend, Scene};
use tile_visibility::scene::{BoundingPolyhedron, DescriptorId, NodeId, Registry, SurfaceDesc};
use tile_visibility::{Camera, SceneConfig, SceneError};

/// Leaf surfaces of every tile in a row, per worker call
#[derive(Default)]
struct Recorder {
    rows: Mutex<HashMap<usize, (usize, Vec<Vec<u32>>)>>,
    repeats: Mutex<usize>,
}

impl RenderBackend for Recorder {
    fn render_tile_row(&self, worker: usize, row: usize, frame: &FrameView<'_>) {
        let tiles = (0..frame.cols()).map(|col| leaves(frame, frame.tile(row, col))).collect();
        let previous = self.rows.lock().unwrap().insert(row, (worker, tiles));
        if previous.is_some() {
            *self.repeats.lock().unwrap() += 1;
        }
    }
}

fn leaves(frame: &FrameView<'_>, head: Option<ElemRef>) -> Vec<u32> {
    frame
        .list(head)
        .filter(|(_, e)| !e.payload.is_group())
        .map(|(_, e)| e.payload.node().0)
        .collect()
}

fn add_box(reg: &mut Registry, parent: NodeId, center: Vec3, half: f32) -> NodeId {
    let desc = SurfaceDesc {
        descriptor: DescriptorId(reg.len() as u32),
        two_sided: false,
        facing: None,
    };
    let bounds = BoundingPolyhedron::cuboid(center - Vec3::splat(half), center + Vec3::splat(half));
    reg.add_surface(parent, desc, Affine3A::IDENTITY, bounds).unwrap()
}

struct Fixture {
    center: NodeId,
    left: NodeId,
    back: NodeId,
    light: NodeId,
}

/// Camera at the origin looking down -Z over an 8x6 tile grid
fn scene(threads: usize, tiling: bool) -> (Scene, Fixture) {
    let config = SceneConfig {
        x_res: 64,
        y_res: 48,
        threads,
        tiling,
        ..Default::default()
    };
    let mut reg = Registry::new();
    let root = reg.root();
    let center = add_box(&mut reg, root, Vec3::new(0.0, 0.0, -5.0), 0.5);
    let left = add_box(&mut reg, root, Vec3::new(-3.0, 0.0, -6.0), 0.5);
    let group = reg.add_group(root, true, false, Affine3A::IDENTITY).unwrap();
    add_box(&mut reg, group, Vec3::new(2.0, 1.0, -8.0), 0.5);
    add_box(&mut reg, group, Vec3::new(2.5, -1.0, -9.0), 0.5);
    let back = add_box(&mut reg, root, Vec3::new(0.0, 0.0, -15.0), 2.0);
    let light = reg.add_light(root, DescriptorId(100), Vec3::new(0.0, 5.0, 0.0)).unwrap();

    let scene = Scene::new(config, reg, Camera::new(Vec3::ZERO)).unwrap();
    (
        scene,
        Fixture {
            center,
            left,
            back,
            light,
        },
    )
}

fn is_subsequence(needle: &[u32], haystack: &[u32]) -> bool {
    let mut it = haystack.iter();
    needle.iter().all(|n| it.any(|h| h == n))
}

#[test]
fn test_partition_covers_every_index_once() {
    for workers in 1..=8 {
        for count in [0usize, 1, 5, 8, 37] {
            let mut seen = vec![0u32; count];
            for w in 0..workers {
                for i in partition(count, workers, w) {
                    assert_eq!(i % workers, w);
                    seen[i] += 1;
                }
            }
            assert!(seen.iter().all(|&n| n == 1), "workers={workers} count={count}");
        }
    }
}

#[test]
fn test_tiles_follow_camera_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut scene, fx) = scene(3, true);
    scene.prepare_frame().unwrap();

    let frame = scene.frame();
    let camera_order = leaves(&frame, frame.camera_surfaces());
    assert_eq!(camera_order.len(), scene.registry().surfaces().len());
    assert_eq!(camera_order[0], fx.center.0);

    let mut left_cols = Vec::new();
    for row in 0..frame.rows() {
        for col in 0..frame.cols() {
            let tile = leaves(&frame, frame.tile(row, col));
            assert!(is_subsequence(&tile, &camera_order), "tile ({row}, {col}) = {tile:?}");
            if tile.contains(&fx.left.0) {
                left_cols.push(col);
            }
        }
    }

    let center_tile = leaves(&frame, frame.tile(3, 4));
    assert_eq!(center_tile.first(), Some(&fx.center.0));
    assert!(center_tile.contains(&fx.back.0));
    assert!(!left_cols.is_empty());
    assert!(left_cols.iter().all(|&c| c < 4), "left box reached columns {left_cols:?}");

    assert!(frame.surface_lists(fx.center).is_some());
    assert!(frame.surface_lists(fx.light).is_none());
    let lights: Vec<_> = frame.list(frame.camera_lights()).map(|(_, e)| e.payload.node()).collect();
    assert_eq!(lights, vec![fx.light]);
}

#[test]
fn test_surface_lists_see_the_light() {
    let (mut scene, fx) = scene(2, true);
    scene.prepare_frame().unwrap();
    let frame = scene.frame();

    let lists = frame.surface_lists(fx.center).unwrap();
    let outer: Vec<_> = frame.list(lists.get(ListSlot::OuterSurfaces)).collect();
    assert!(!outer.is_empty());
    assert!(outer.iter().all(|(_, e)| e.payload.node() != fx.center));

    let lights: Vec<_> = frame
        .list(lists.get(ListSlot::OuterLights))
        .map(|(_, e)| e.payload.node())
        .collect();
    assert_eq!(lights, vec![fx.light]);
}

#[test]
fn test_rows_rendered_once_by_their_worker() {
    for threads in 1..=4 {
        let (mut scene, _) = scene(threads, true);
        let recorder = Recorder::default();
        scene.render(&recorder).unwrap();

        let rows = recorder.rows.lock().unwrap();
        assert_eq!(rows.len(), 6, "threads={threads}");
        assert_eq!(*recorder.repeats.lock().unwrap(), 0);
        for (&row, &(worker, ref tiles)) in rows.iter() {
            assert_eq!(worker, row % threads);
            assert_eq!(tiles.len(), 8);
        }
    }
}

#[test]
fn test_frames_repeat_identically() {
    let (mut scene, _) = scene(3, true);
    let first = Recorder::default();
    let second = Recorder::default();
    scene.render(&first).unwrap();
    scene.render(&second).unwrap();
    assert_eq!(*first.rows.lock().unwrap(), *second.rows.lock().unwrap());
}

#[test]
fn test_moving_a_surface_between_frames() {
    let (mut scene, fx) = scene(2, true);
    scene.prepare_frame().unwrap();
    assert!(leaves(&scene.frame(), scene.frame().tile(3, 4)).contains(&fx.center.0));

    scene
        .registry_mut()
        .set_local_transform(fx.center, Affine3A::from_translation(Vec3::new(0.0, 0.0, 30.0)))
        .unwrap();
    scene.prepare_frame().unwrap();
    let frame = scene.frame();
    for row in 0..frame.rows() {
        for col in 0..frame.cols() {
            assert!(!leaves(&frame, frame.tile(row, col)).contains(&fx.center.0));
        }
    }
}

#[test]
fn test_tiling_off_lists_everything_everywhere() {
    let (mut scene, _) = scene(2, false);
    scene.prepare_frame().unwrap();
    let frame = scene.frame();
    let camera_order = leaves(&frame, frame.camera_surfaces());
    for row in 0..frame.rows() {
        for col in 0..frame.cols() {
            assert_eq!(leaves(&frame, frame.tile(row, col)), camera_order);
        }
    }
}

#[test]
fn test_invalid_setup_is_rejected() {
    let config = SceneConfig {
        threads: 0,
        ..Default::default()
    };
    let err = Scene::new(config, Registry::new(), Camera::new(Vec3::ZERO)).unwrap_err();
    assert!(matches!(err, SceneError::Config(_)));

    let mut reg = Registry::new();
    let root = reg.root();
    let xform = reg.add_group(root, true, false, Affine3A::IDENTITY).unwrap();
    let volume = reg.add_group(root, false, true, Affine3A::IDENTITY).unwrap();
    let s = add_box(&mut reg, xform, Vec3::new(0.0, 0.0, -5.0), 0.5);
    reg.assign_groups(s, Some(xform), Some(volume)).unwrap();
    let err = Scene::new(SceneConfig::default(), reg, Camera::new(Vec3::ZERO)).unwrap_err();
    assert!(matches!(err, SceneError::GroupChain { .. }));
}

fn dangling_edge_bounds() -> BoundingPolyhedron {
    BoundingPolyhedron {
        verts: vec![Vec3::new(0.0, 0.0, -5.0), Vec3::new(1.0, 0.0, -5.0)],
        edges: vec![[0, 7]],
    }
}

#[test]
fn test_malformed_bounds_rejected_at_construction() {
    let mut reg = Registry::new();
    let root = reg.root();
    let desc = SurfaceDesc {
        descriptor: DescriptorId(0),
        two_sided: false,
        facing: None,
    };
    let s = reg
        .add_surface(root, desc, Affine3A::IDENTITY, dangling_edge_bounds())
        .unwrap();

    let err = Scene::new(SceneConfig::default(), reg, Camera::new(Vec3::ZERO)).unwrap_err();
    assert!(matches!(err, SceneError::InvalidBounds { node, .. } if node == s));
}

#[test]
fn test_malformed_bounds_rejected_before_tiling() {
    let (mut scene, fx) = scene(2, true);
    scene
        .registry_mut()
        .set_bounds(fx.center, dangling_edge_bounds())
        .unwrap();

    let err = scene.prepare_frame().unwrap_err();
    assert!(matches!(err, SceneError::InvalidBounds { node, .. } if node == fx.center));
}
