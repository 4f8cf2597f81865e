use criterion::{Criterion, criterion_group, criterion_main};
use std::fs::{self};
use std::hint::black_box;
use std::path::Path;
use story_search::segmenter::{SegmenterConfig, segment_book};

pub fn criterion_benchmark(c: &mut Criterion) {
    let book_path = Path::new(env!("CARGO_MANIFEST_DIR")).join("benches/aesop_fables.txt");
    let book = fs::read_to_string(book_path).expect("can read test file");
    let config = SegmenterConfig::default();
    c.bench_function("segmentation", |b| {
        b.iter(|| {
            segment_book(
                black_box("Aesops_Fables"),
                black_box(&book),
                black_box(&config),
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
