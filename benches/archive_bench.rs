use backupd::archive::{Archiver, ZipArchiver};
use backupd::config::CompressionMethod;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::fs;
use std::hint::black_box;
use tempfile::tempdir;

fn benchmark_compression_methods(c: &mut Criterion) {
    let src = tempdir().unwrap();
    for i in 0..50 {
        let content = format!("line {i} of a fairly repetitive text file\n").repeat(200);
        fs::write(src.path().join(format!("file_{i}.txt")), content).unwrap();
    }
    let dest = tempdir().unwrap();

    let mut group = c.benchmark_group("archive_write");
    group.sample_size(20);

    for method in [
        CompressionMethod::Stored,
        CompressionMethod::Deflate,
        CompressionMethod::Zstd,
    ] {
        let archiver = ZipArchiver::new(method, None);
        group.bench_with_input(BenchmarkId::from_parameter(method), &archiver, |b, archiver| {
            b.iter(|| {
                let record = archiver.write(black_box(src.path()), dest.path()).unwrap();
                fs::remove_file(record.destination_file).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_compression_methods);
criterion_main!(benches);
