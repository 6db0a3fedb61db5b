use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::path::Path;

use mhtml::{parse_archive, DetachedResource, HeaderTable};

fn fixture_bytes() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mhtml");
    std::fs::read(path).unwrap()
}

/// Archive with `count` small resources.
fn synthetic_archive(count: usize) -> Vec<u8> {
    let mut out = b"Content-Type: multipart/related; boundary=\"----bench----\"\r\n\r\n\r\n".to_vec();
    for i in 0..count {
        out.extend_from_slice(b"------bench----\r\n");
        out.extend_from_slice(
            format!("Content-Type: text/plain\r\nContent-Location: https://example.com/{i}.txt\r\n\r\n")
                .as_bytes(),
        );
        out.extend_from_slice(&[b'x'; 512]);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"------bench------\r\n");
    out
}

fn bench_parse(c: &mut Criterion) {
    let simple = fixture_bytes();
    c.bench_function("parse_simple_mhtml", |b| {
        b.iter_batched(
            || simple.clone(),
            |bytes| parse_archive(bytes, false).unwrap(),
            BatchSize::SmallInput,
        )
    });

    let large = synthetic_archive(1000);
    c.bench_function("parse_1000_resources", |b| {
        b.iter_batched(
            || large.clone(),
            |bytes| parse_archive(bytes, false).unwrap(),
            BatchSize::LargeInput,
        )
    });
}

fn bench_mutate(c: &mut Criterion) {
    let archive = parse_archive(synthetic_archive(1000), false).unwrap();
    let donor = DetachedResource::new(
        HeaderTable::from_iter([("Content-Type", "text/plain")]),
        b"inserted\r\n",
    );

    c.bench_function("insert_front_1000", |b| {
        b.iter_batched(
            || archive.clone(),
            |mut a| a.insert_resource(0, &donor),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("remove_front_1000", |b| {
        b.iter_batched(
            || archive.clone(),
            |mut a| a.remove_resource(0),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_parse, bench_mutate);
criterion_main!(benches);
