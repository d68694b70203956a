//! Integration test for a full level memory cycle: load segments, run
//! effects, unload.

use spore_core::{
    compress_segment, MemoryContext, RomImage, RomLoader, RomRange, SegmentedAddr, MAIN_REGION,
};
use spore_shared::MemoryConfig;

struct TestRom {
    image: RomImage,
    geometry: RomRange,
    textures: RomRange,
    code: RomRange,
}

fn build_rom() -> TestRom {
    let geometry: Vec<u8> = (0..0x800u32).map(|i| (i & 0xFF) as u8).collect();
    let textures: Vec<u8> = (0..0x3000u32).map(|i| (i / 64) as u8).collect();
    let packed = compress_segment(&textures);
    let code = vec![0xC0u8; 0x600];

    let mut bytes = Vec::new();
    let geometry_at = bytes.len() as u32;
    bytes.extend_from_slice(&geometry);
    let textures_at = bytes.len() as u32;
    bytes.extend_from_slice(&packed);
    bytes.resize(bytes.len().next_multiple_of(16), 0);
    let code_at = bytes.len() as u32;
    bytes.extend_from_slice(&code);

    TestRom {
        image: RomImage::new(bytes),
        geometry: RomRange::at(geometry_at, geometry.len() as u32),
        textures: RomRange::at(textures_at, packed.len() as u32),
        code: RomRange::at(code_at, code.len() as u32),
    }
}

fn config() -> MemoryConfig {
    MemoryConfig {
        ram_size: 0x10_0000,
        pool_start: 0x4_0000,
        ..MemoryConfig::default()
    }
}

#[test]
fn test_level_cycle_restores_pool() {
    let rom = build_rom();
    let config = config();
    let loader = RomLoader::new(&rom.image, &config);
    let mut ctx = MemoryContext::new(&config).unwrap();
    ctx.init_effects_pool().unwrap();

    let initial = ctx.pool.context();
    let available = ctx.pool.available();

    ctx.pool.push_state();
    let geo = loader.load_segment(&mut ctx, 0x07, rom.geometry, None).unwrap();
    let tex = loader.load_segment_decompress(&mut ctx, 0x09, rom.textures).unwrap();
    let bss = RomRange::at(0x0, 0x400);
    let code = loader.load_segment(&mut ctx, 0x04, rom.code, Some(bss)).unwrap();

    assert!(geo < tex && tex < code);
    assert_eq!(ctx.segments.base(0x07).unwrap(), geo);

    // Asset pointers resolve into the loaded data.
    let p = SegmentedAddr::new(0x07, 0x123).resolve(&ctx.segments).unwrap();
    assert_eq!(ctx.pool.ram().bytes(p, 1).unwrap(), &[0x23]);
    let t = SegmentedAddr::new(0x09, 0x2000).resolve(&ctx.segments).unwrap();
    assert_eq!(ctx.pool.ram().bytes(t, 1).unwrap(), &[0x80]);
    assert!(ctx.tlb.translate(SegmentedAddr::new(0x04, 0x10)).is_some());

    // Effects come and go independently of the level.
    let spark = ctx.alloc_effect(40).unwrap().unwrap();
    let smoke = ctx.alloc_effect(120).unwrap().unwrap();
    ctx.free_effect(spark).unwrap();
    ctx.free_effect(smoke).unwrap();

    ctx.pool.pop_state().unwrap();
    assert_eq!(ctx.pool.context(), initial);
    assert_eq!(ctx.pool.available(), available);
    assert_eq!(ctx.pool.state_depth(), 0);
}

#[test]
fn test_levels_reuse_the_same_memory() {
    let rom = build_rom();
    let config = config();
    let loader = RomLoader::new(&rom.image, &config);
    let mut ctx = MemoryContext::new(&config).unwrap();

    let mut bases = Vec::new();
    for _ in 0..3 {
        ctx.pool.push_state();
        bases.push(loader.load_segment(&mut ctx, 0x07, rom.geometry, None).unwrap());
        ctx.pool.pop_state().unwrap();
    }
    assert!(bases.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(ctx.pool.region(MAIN_REGION).unwrap().start, 0x8004_0000);
}
