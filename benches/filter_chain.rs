use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use wav2train::audio::MockAudioTool;
use wav2train::filter::{FilterChain, FilterOptions, Range};
use wav2train::manifest::{ManifestLine, parse_lines};
use wav2train::process::MockProcessRunner;

/// Synthetic manifest lines with varied durations and transcripts.
fn manifest(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let duration = 200 + (i * 37) % 20_000;
            let words = 1 + i % 40;
            let text = (0..words)
                .map(|w| if (i + w) % 97 == 0 { "x1" } else { "word" })
                .collect::<Vec<_>>()
                .join(" ");
            format!("clip-{i} /data/clips/clip-{i}.flac {duration}.5 {text}")
        })
        .collect()
}

fn chain(options: FilterOptions) -> FilterChain {
    FilterChain::new(
        options,
        Arc::new(MockAudioTool::new()),
        Arc::new(MockProcessRunner::succeeding()),
    )
    .unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let raw = manifest(10_000);
    c.bench_function("parse_10k_lines", |b| {
        b.iter(|| {
            let lines: Vec<ManifestLine> = parse_lines(black_box(raw.clone())).collect();
            black_box(lines)
        })
    });
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_stages");
    let configs = [
        (
            "audio",
            FilterOptions {
                audio: Some(Range::new(1000, 15_000)),
                ..FilterOptions::default()
            },
        ),
        (
            "audio_chars_regex",
            FilterOptions {
                audio: Some(Range::new(1000, 15_000)),
                chars: Some(Range::new(10, 150)),
                regex: Some("[a-z' ]+$".to_string()),
                ..FilterOptions::default()
            },
        ),
    ];

    for size in [1_000, 10_000] {
        let raw = manifest(size);
        for (name, options) in &configs {
            let chain = chain(options.clone());
            group.bench_with_input(BenchmarkId::new(*name, size), &raw, |b, raw| {
                b.iter(|| black_box(chain.run(raw.clone()).unwrap().lines.len()))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_stages);
criterion_main!(benches);
