//! loreweave Benchmark Suite
//!
//! Performance targets:
//!   demux_content_64_byte_chunks ..... < 200μs per 16 KiB response
//!   demux_enveloped_token_stream ..... < 1ms per 16 KiB response
//!   dice_roll_3d6_plus_2 ............. < 200ns
//!   reachability_radius_4_cold ....... < 50μs on a 400-node grid
//!   reachability_radius_4_cached ..... < 1μs

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use loreweave_core::resolution::{Mulberry32, roll_dice};
use loreweave_core::types::LocationId;
use loreweave_core::world::{LocationGraph, LocationNode};
use loreweave_stream::Demultiplexer;

/// A response of alternating narrative and data segments, about 16 KiB.
fn response() -> String {
    let mut text = String::new();
    let mut turn = 0;
    while text.len() < 16 * 1024 {
        text.push_str("<narrative>The lantern swings as the ship rolls; somewhere below, ");
        text.push_str("a rope creaks and a voice mutters about the weather.</narrative>");
        text.push_str(&format!(
            "<data>{{\"hp\": {}, \"choices\": [\"Climb\", \"Wait\"]}}</data>",
            turn % 100
        ));
        turn += 1;
    }
    text
}

fn enveloped(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(6)
        .map(|token| {
            let token: String = token.iter().collect();
            format!("{}\n", serde_json::json!({"type": "token", "text": token}))
        })
        .collect()
}

fn split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Square grid, each cell linked right and down.
fn grid(side: usize) -> Vec<LocationNode> {
    let id = |x: usize, y: usize| LocationId::new(format!("{x}-{y}"));
    let mut nodes = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let mut neighbors = Vec::new();
            if x + 1 < side {
                neighbors.push(id(x + 1, y));
            }
            if y + 1 < side {
                neighbors.push(id(x, y + 1));
            }
            nodes.push(LocationNode {
                id: id(x, y),
                name: format!("Cell {x},{y}"),
                neighbors,
            });
        }
    }
    nodes
}

fn bench_demux(c: &mut Criterion) {
    let content = response();
    let content_chunks = split(&content, 64);
    let raw_chunks = split(&enveloped(&content), 64);

    let mut group = c.benchmark_group("demux");
    group.throughput(Throughput::Bytes(content.len() as u64));
    group.bench_function("demux_content_64_byte_chunks", |b| {
        b.iter(|| {
            let mut demux = Demultiplexer::new();
            let mut items = 0;
            for chunk in &content_chunks {
                items += demux.push_content(black_box(chunk)).len();
            }
            items += demux.finish().len();
            black_box(items);
        });
    });
    group.bench_function("demux_enveloped_token_stream", |b| {
        b.iter(|| {
            let mut demux = Demultiplexer::new();
            let mut items = 0;
            for chunk in &raw_chunks {
                items += demux.push_raw(black_box(chunk)).len();
            }
            items += demux.finish().len();
            black_box(items);
        });
    });
    group.finish();
}

fn bench_dice(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    c.bench_function("dice_roll_3d6_plus_2", |b| {
        b.iter(|| black_box(roll_dice(&mut rng, black_box("3d6+2"))));
    });

    c.bench_function("dice_roll_seeded_2d8", |b| {
        let mut seed = 0u32;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            black_box(Mulberry32::new(seed).roll_dice(black_box("2d8")))
        });
    });
}

fn bench_reachability(c: &mut Criterion) {
    let nodes = grid(20);
    let origin = LocationId::new("10-10");

    c.bench_function("reachability_radius_4_cold", |b| {
        b.iter_batched(
            || LocationGraph::new(nodes.clone(), 1),
            |graph| black_box(graph.reachable_within(&origin, 4).len()),
            BatchSize::SmallInput,
        );
    });

    let graph = LocationGraph::new(nodes.clone(), 64);
    c.bench_function("reachability_radius_4_cached", |b| {
        b.iter(|| black_box(graph.reachable_within(black_box(&origin), 4).len()));
    });
}

criterion_group!(benches, bench_demux, bench_dice, bench_reachability);
criterion_main!(benches);
