use camino::Utf8PathBuf;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use pds2cube::config::IngestConfig;
use pds2cube::drivers::MemoryOutputs;
use pds2cube::ingest::Ingest;

const LABEL_BYTES: usize = 1024;

/// Attached `samples`×`lines` product of LSB 16-bit pixels with line prefixes.
fn write_product(dir: &Utf8PathBuf, samples: usize, lines: usize) -> Utf8PathBuf {
    let label = format!(
        "PDS_VERSION_ID = PDS3\n\
^IMAGE = {} <BYTES>\n\
OBJECT = IMAGE\n\
  LINES = {lines}\n\
  LINE_SAMPLES = {samples}\n\
  LINE_PREFIX_BYTES = 12\n\
  SAMPLE_TYPE = LSB_INTEGER\n\
  SAMPLE_BITS = 16\n\
  NULL = -32768\n\
END_OBJECT = IMAGE\n\
END\n",
        LABEL_BYTES + 1
    );
    let mut bytes = label.into_bytes();
    bytes.resize(LABEL_BYTES, b' ');
    for line in 0..lines {
        bytes.extend_from_slice(&[0u8; 12]);
        for sample in 0..samples {
            let dn = ((line * 7 + sample * 3) % 4000) as i16 - 2000;
            bytes.extend_from_slice(&dn.to_le_bytes());
        }
    }
    let path = dir.join("bench.img");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn bench_import(c: &mut Criterion) {
    let guard = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(guard.path().to_path_buf()).unwrap();
    let from = write_product(&dir, 1024, 1024);
    let ingest = Ingest::new(IngestConfig::default());

    c.bench_function("pixel_import/s16_1024x1024_memory", |b| {
        b.iter_batched(
            || MemoryOutputs::new(dir.join("bench.cub")),
            |mut outputs| {
                let report = ingest.run_into(black_box(&from), &mut outputs).unwrap();
                black_box((report, outputs));
            },
            BatchSize::LargeInput,
        )
    });

    let to = dir.join("bench.cub");
    c.bench_function("pixel_import/s16_1024x1024_file", |b| {
        b.iter(|| black_box(ingest.run(black_box(&from), &to).unwrap()))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_import
);
criterion_main!(benches);
