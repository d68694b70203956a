//! # Memory System Benchmarks
//!
//! Allocator hot paths: level-load style forward allocation with state
//! push/pop, effects churn in the dynamic pool, and compressed segment loads.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spore_core::{
    compress_segment, Alignment, DynamicPool, MainPool, MemoryContext, Ram, RomImage, RomLoader,
    RomRange, VirtAddr, MAIN_REGION,
};
use spore_shared::MemoryConfig;

// =============================================================================
// REGION ALLOCATOR
// =============================================================================

fn bench_forward_with_state(c: &mut Criterion) {
    let mut pool = MainPool::new(Ram::new(0x80_0000), &[(VirtAddr(0x8020_0000), VirtAddr(0x8080_0000))])
        .expect("pool");

    c.bench_function("region_push_1000_allocs_pop", |b| {
        b.iter(|| {
            pool.push_state();
            for i in 0..1000u32 {
                black_box(pool.alloc(16 + (i & 0xFF)));
            }
            pool.pop_state().expect("pop");
        });
    });
}

fn bench_freeable_lifo(c: &mut Criterion) {
    let mut pool = MainPool::new(Ram::new(0x80_0000), &[(VirtAddr(0x8020_0000), VirtAddr(0x8080_0000))])
        .expect("pool");

    c.bench_function("region_freeable_alloc_free", |b| {
        b.iter(|| {
            let block = pool
                .try_alloc_freeable(MAIN_REGION, 0x400, Alignment::To(16))
                .expect("alloc");
            black_box(pool.free_freeable(block).expect("free"))
        });
    });
}

// =============================================================================
// DYNAMIC POOL
// =============================================================================

fn bench_effects_churn(c: &mut Criterion) {
    let mut main = MainPool::new(Ram::new(0x10_0000), &[(VirtAddr(0x8001_0000), VirtAddr(0x8010_0000))])
        .expect("pool");
    let mut pool = DynamicPool::init(&mut main, 0x4000).expect("effects pool");
    let mut rng = StdRng::seed_from_u64(0xEFFEC7);
    let sizes: Vec<u32> = (0..256).map(|_| rng.gen_range(8..160)).collect();

    c.bench_function("dynamic_pool_churn_256", |b| {
        b.iter(|| {
            let ram = main.ram_mut();
            let mut live = Vec::with_capacity(sizes.len());
            for &size in &sizes {
                if let Some(addr) = pool.alloc(ram, size).expect("alloc") {
                    live.push(addr);
                }
            }
            // Free every other block first to exercise coalescing.
            for addr in live.iter().step_by(2) {
                pool.free(ram, *addr).expect("free");
            }
            for addr in live.iter().skip(1).step_by(2) {
                pool.free(ram, *addr).expect("free");
            }
            black_box(live.len())
        });
    });
}

// =============================================================================
// ROM LOADER
// =============================================================================

fn bench_decompress_segment(c: &mut Criterion) {
    let raw: Vec<u8> = (0..0x2_0000u32).map(|i| (i % 251) as u8 ^ (i >> 9) as u8).collect();
    let block = compress_segment(&raw);
    let range = RomRange::at(0, block.len() as u32);
    let config = MemoryConfig::default();
    let loader = RomLoader::new(RomImage::new(block), &config);
    let mut ctx = MemoryContext::new(&config).expect("context");

    c.bench_function("load_segment_decompress_128k", |b| {
        b.iter(|| {
            ctx.pool.push_state();
            black_box(loader.load_segment_decompress(&mut ctx, 0x0E, range).expect("load"));
            ctx.pool.pop_state().expect("pop");
        });
    });
}

criterion_group!(
    benches,
    bench_forward_with_state,
    bench_freeable_lifo,
    bench_effects_churn,
    bench_decompress_segment,
);
criterion_main!(benches);
