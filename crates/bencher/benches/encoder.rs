use std::hint::black_box;

use bencher::response_heads;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::Version;
use plumb_http::codec::{HeaderEncoder, LineBuffer, Negotiation};
use plumb_http::protocol::ConnectionToken;

fn benchmark_header_encoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("header_encoder");
    let negotiations = [
        ("http11", Negotiation::new(false, Version::HTTP_11, ConnectionToken::Unspecified)),
        ("http10_keep_alive", Negotiation::new(false, Version::HTTP_10, ConnectionToken::KeepAlive)),
    ];

    for (head_name, head) in response_heads() {
        for (negotiation_name, negotiation) in &negotiations {
            let id = BenchmarkId::new(head_name, negotiation_name);
            group.bench_with_input(id, &head, |b, head| {
                let mut lines = LineBuffer::with_capacity(512);
                b.iter(|| {
                    lines.clear();
                    let framing = HeaderEncoder.encode(negotiation, head, &mut lines);
                    black_box((framing, lines.len()));
                });
            });
        }
    }

    group.finish();
}

criterion_group!(encoder, benchmark_header_encoder);
criterion_main!(encoder);
