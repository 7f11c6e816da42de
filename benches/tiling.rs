use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tile_visibility::camera::{Camera, TileProjection};
use tile_visibility::config::{SceneConfig, TilingConfig};
use tile_visibility::rendering::projection::{stile, SurfaceGeometry, VertexScratch};
use tile_visibility::rendering::{FrameArena, TileBounds};
use tile_visibility::scene::{BoundingPolyhedron, DescriptorId, NodeId};

/// Benchmark raw edge walking on a 100x60 grid
fn bench_tile_edge(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let edges: Vec<(Vec2, Vec2)> = (0..1024)
        .map(|_| {
            (
                Vec2::new(rng.gen_range(-10.0..110.0), rng.gen_range(-10.0..70.0)),
                Vec2::new(rng.gen_range(-10.0..110.0), rng.gen_range(-10.0..70.0)),
            )
        })
        .collect();

    let mut group = c.benchmark_group("tile_edge");
    for extended in [false, true] {
        let params = TilingConfig {
            extended,
            ..Default::default()
        };
        let mut bounds = TileBounds::new(100, 60);
        let name = if extended { "extended" } else { "plain" };
        group.bench_with_input(BenchmarkId::from_parameter(name), &params, |b, params| {
            b.iter(|| {
                bounds.reset_empty();
                for &(p1, p2) in &edges {
                    bounds.tile_edge(black_box(p1), black_box(p2), params);
                }
            })
        });
    }
    group.finish();
}

/// Benchmark full surface tiling, including near clipping and element emission
fn bench_stile(c: &mut Criterion) {
    let config = SceneConfig::default();
    let projection = TileProjection::new(&Camera::new(Vec3::ZERO), &config);
    let params = config.tiling_params;
    let mut bounds = TileBounds::new(config.tiles_in_row(), config.tiles_in_col());
    let mut scratch = VertexScratch::new(config.vertex_capacity);
    let mut arena = FrameArena::new(0, config.arena_capacity);

    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let boxes: Vec<BoundingPolyhedron> = (0..256)
        .map(|_| {
            let center = Vec3::new(rng.gen_range(-8.0..8.0), rng.gen_range(-5.0..5.0), rng.gen_range(-30.0..2.0));
            BoundingPolyhedron::cuboid(center - Vec3::splat(0.75), center + Vec3::splat(0.75))
        })
        .collect();

    c.bench_function("stile_256_boxes", |b| {
        b.iter(|| {
            arena.reset();
            for (i, poly) in boxes.iter().enumerate() {
                let geometry = SurfaceGeometry {
                    node: NodeId(i as u32),
                    descriptor: DescriptorId(i as u32),
                    verts: &poly.verts,
                    edges: &poly.edges,
                };
                black_box(stile(&mut arena, &mut bounds, &mut scratch, &projection, &params, &geometry));
            }
        })
    });
}

criterion_group!(benches, bench_tile_edge, bench_stile);
criterion_main!(benches);
