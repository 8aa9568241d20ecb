//! Performance benchmarks for the emulation core:
//! - full-frame stepping (CPU + PPU + APU)
//! - ROM loading and reset
//! - memory peeks
//! - mapper variations, where real test ROMs are available

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nescore::System;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Get the workspace root directory.
fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Load a test ROM if available.
fn load_test_rom(name: &str) -> Option<Vec<u8>> {
    let root = workspace_root();
    let path = root.join("test-roms").join(name);
    if path.exists() {
        fs::read(&path).ok()
    } else {
        None
    }
}

/// Create a minimal valid NES ROM for benchmarking.
fn create_minimal_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 16 + 32768 + 8192]; // Header + 32KB PRG + 8KB CHR

    rom[0] = 0x4E; // 'N'
    rom[1] = 0x45; // 'E'
    rom[2] = 0x53; // 'S'
    rom[3] = 0x1A; // EOF
    rom[4] = 2; // 32KB PRG-ROM (2 x 16KB)
    rom[5] = 1; // 8KB CHR-ROM
    rom[6] = 0x01; // Mapper 0, vertical mirroring

    // Reset vector at $FFFC-$FFFD points to $8000
    rom[16 + 0x7FFC] = 0x00;
    rom[16 + 0x7FFD] = 0x80;

    // Infinite loop at $8000: JMP $8000
    rom[16] = 0x4C;
    rom[17] = 0x00;
    rom[18] = 0x80;

    rom
}

fn new_system(rom_data: &[u8]) -> System {
    let mut system = System::new();
    system.load(rom_data).expect("failed to load ROM");
    system
}

/// Benchmark full-frame stepping (CPU + PPU + APU all clocked together).
fn bench_frame_stepping(c: &mut Criterion) {
    let rom_data = create_minimal_rom();
    let mut system = new_system(&rom_data);

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_frame", |b| {
        b.iter(|| {
            system.run_frame();
            black_box(system.framebuffer());
        });
    });

    group.bench_function("60_frames", |b| {
        b.iter(|| {
            for _ in 0..60 {
                system.run_frame();
            }
            black_box(system.framebuffer());
        });
    });

    group.finish();
}

/// Benchmark full emulation with a real test ROM, where available.
fn bench_real_rom_execution(c: &mut Criterion) {
    let rom_data = load_test_rom("cpu/nestest.nes").unwrap_or_else(create_minimal_rom);
    let mut system = new_system(&rom_data);

    let mut group = c.benchmark_group("real_rom");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("nestest_frame", |b| {
        b.iter(|| {
            system.run_frame();
            black_box(system.framebuffer());
        });
    });

    group.finish();
}

/// Benchmark ROM loading and reset.
fn bench_rom_loading(c: &mut Criterion) {
    let rom_data = create_minimal_rom();

    let mut group = c.benchmark_group("initialization");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("load", |b| {
        b.iter(|| {
            let mut system = System::new();
            system.load(black_box(&rom_data)).expect("load failed");
            black_box(system);
        });
    });

    group.bench_function("reset", |b| {
        let mut system = new_system(&rom_data);
        b.iter(|| {
            system.reset();
            black_box(system.frame_count());
        });
    });

    group.finish();
}

/// Benchmark frame stepping across mappers, where real test ROMs are
/// available. Falls back to NROM-only if none are present.
fn bench_mapper_variations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mappers");
    group.measurement_time(Duration::from_secs(5));

    let rom_data = create_minimal_rom();
    let mut system = new_system(&rom_data);
    group.bench_with_input(BenchmarkId::new("frame", "NROM"), &(), |b, ()| {
        b.iter(|| {
            system.run_frame();
            black_box(system.framebuffer());
        });
    });

    if let Some(rom_data) = load_test_rom("mappers/mapper_holymapperel_1_P128K.nes") {
        let mut system = System::new();
        if system.load(&rom_data).is_ok() {
            group.bench_with_input(BenchmarkId::new("frame", "MMC1"), &(), |b, ()| {
                b.iter(|| {
                    system.run_frame();
                    black_box(system.framebuffer());
                });
            });
        }
    }

    if let Some(rom_data) = load_test_rom("mappers/mapper_holymapperel_4_P128K.nes") {
        let mut system = System::new();
        if system.load(&rom_data).is_ok() {
            group.bench_with_input(BenchmarkId::new("frame", "MMC3"), &(), |b, ()| {
                b.iter(|| {
                    system.run_frame();
                    black_box(system.framebuffer());
                });
            });
        }
    }

    group.finish();
}

/// Benchmark memory access patterns.
fn bench_memory_access(c: &mut Criterion) {
    let rom_data = create_minimal_rom();
    let system = new_system(&rom_data);

    let mut group = c.benchmark_group("memory");
    group.throughput(Throughput::Bytes(1));
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("peek_ram", |b| {
        b.iter(|| {
            black_box(system.peek_memory(black_box(0x0000)));
        });
    });

    group.bench_function("peek_prg", |b| {
        b.iter(|| {
            black_box(system.peek_memory(black_box(0x8000)));
        });
    });

    group.bench_function("peek_sequential_256", |b| {
        b.iter(|| {
            for addr in 0..256u16 {
                black_box(system.peek_memory(addr));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_stepping,
    bench_real_rom_execution,
    bench_rom_loading,
    bench_mapper_variations,
    bench_memory_access,
);
criterion_main!(benches);
