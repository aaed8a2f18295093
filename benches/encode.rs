//! Benchmarks for training and encoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use segmentar::config::TokenizerConfig;
use segmentar::Tokenizer;

fn corpus_lines(words: usize) -> Vec<String> {
    let stems = ["low", "lower", "newest", "widest", "token", "piece"];
    (0..words)
        .map(|i| {
            format!(
                "{} {} {}",
                stems[i % stems.len()],
                stems[(i + 1) % stems.len()],
                stems[(i + 2) % stems.len()]
            )
        })
        .collect()
}

fn trained_tokenizer() -> Tokenizer {
    let config = TokenizerConfig {
        vocab_size: 200,
        min_frequency: 1,
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config");
    let lines = corpus_lines(64);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    tokenizer.train(&refs).expect("train");
    tokenizer
}

fn bench_bpe_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("bpe_train");

    for &lines in &[16, 64, 256] {
        let corpus = corpus_lines(lines);
        let refs: Vec<&str> = corpus.iter().map(String::as_str).collect();
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
            b.iter(|| {
                let config = TokenizerConfig {
                    vocab_size: 120,
                    min_frequency: 1,
                    ..TokenizerConfig::default()
                };
                let mut tokenizer = Tokenizer::new(config).expect("config");
                tokenizer
                    .train(black_box(&refs))
                    .expect("training should succeed");
            });
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let tokenizer = trained_tokenizer();

    let text = "the newest lowest token piece in the widest corpus";
    group.bench_function("single", |b| {
        b.iter(|| {
            tokenizer
                .encode(black_box(text))
                .expect("encode should succeed")
        });
    });

    for &rows in &[8, 64] {
        let batch: Vec<String> = (0..rows).map(|_| text.to_string()).collect();
        group.bench_with_input(BenchmarkId::new("batch", rows), &rows, |b, _| {
            b.iter(|| {
                tokenizer
                    .encode_batch(black_box(&batch))
                    .expect("encode should succeed")
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let tokenizer = trained_tokenizer();
    let ids = tokenizer
        .encode("the newest lowest token piece")
        .expect("encode")
        .input_ids
        .remove(0);

    c.bench_function("decode", |b| {
        b.iter(|| {
            tokenizer
                .decode(black_box(&ids), true)
                .expect("decode should succeed")
        });
    });
}

criterion_group!(benches, bench_bpe_train, bench_encode, bench_decode);
criterion_main!(benches);
